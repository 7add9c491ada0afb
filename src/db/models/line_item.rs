// src/db/models/line_item.rs

//! LineItem model - one billable row on a ticket

use crate::error::{Error, Result};
use crate::ids::{ActorId, LineItemId, PackageId, PrestationId, TicketId};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

/// What a line item bills for
///
/// A row is either a standalone prestation or a whole package, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineItemKind {
    Prestation { prestation_id: PrestationId },
    Package { package_id: PackageId },
}

impl LineItemKind {
    pub fn as_str(&self) -> &str {
        match self {
            LineItemKind::Prestation { .. } => "prestation",
            LineItemKind::Package { .. } => "package",
        }
    }

    fn from_columns(
        kind: &str,
        prestation_id: Option<PrestationId>,
        package_id: Option<PackageId>,
    ) -> std::result::Result<Self, String> {
        match (kind, prestation_id, package_id) {
            ("prestation", Some(prestation_id), None) => Ok(Self::Prestation { prestation_id }),
            ("package", None, Some(package_id)) => Ok(Self::Package { package_id }),
            _ => Err(format!(
                "Inconsistent line item: kind={kind}, prestation_id={prestation_id:?}, package_id={package_id:?}"
            )),
        }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, ticket_id, kind, prestation_id, package_id, is_convention, base_price, final_price, created_by, created_at FROM line_items";

/// A billable row belonging to exactly one ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Option<LineItemId>,
    pub ticket_id: TicketId,
    pub kind: LineItemKind,
    /// Priced under an insurance/contract schedule; never a matching candidate
    pub is_convention: bool,
    pub base_price: i64,
    pub final_price: i64,
    pub created_by: Option<ActorId>,
    pub created_at: Option<String>,
}

impl LineItem {
    /// A standalone prestation row
    pub fn prestation(ticket_id: TicketId, prestation_id: PrestationId, price: i64) -> Self {
        Self::new(ticket_id, LineItemKind::Prestation { prestation_id }, price)
    }

    /// A package row priced at the bundle price
    pub fn package(ticket_id: TicketId, package_id: PackageId, price: i64) -> Self {
        Self::new(ticket_id, LineItemKind::Package { package_id }, price)
    }

    fn new(ticket_id: TicketId, kind: LineItemKind, price: i64) -> Self {
        Self {
            id: None,
            ticket_id,
            kind,
            is_convention: false,
            base_price: price,
            final_price: price,
            created_by: None,
            created_at: None,
        }
    }

    pub fn prestation_id(&self) -> Option<PrestationId> {
        match self.kind {
            LineItemKind::Prestation { prestation_id } => Some(prestation_id),
            LineItemKind::Package { .. } => None,
        }
    }

    pub fn package_id(&self) -> Option<PackageId> {
        match self.kind {
            LineItemKind::Package { package_id } => Some(package_id),
            LineItemKind::Prestation { .. } => None,
        }
    }

    pub fn is_package(&self) -> bool {
        matches!(self.kind, LineItemKind::Package { .. })
    }

    /// Whether package matching may consider this row at all
    pub fn is_match_candidate(&self) -> bool {
        !self.is_convention
    }

    /// The persisted id, or an error for rows that were never inserted
    pub fn require_id(&self) -> Result<LineItemId> {
        self.id
            .ok_or_else(|| Error::InvalidLineItem("line item has no ID".to_string()))
    }

    /// Insert this line item into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<LineItemId> {
        conn.execute(
            "INSERT INTO line_items (ticket_id, kind, prestation_id, package_id, is_convention, base_price, final_price, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                self.ticket_id,
                self.kind.as_str(),
                self.prestation_id(),
                self.package_id(),
                self.is_convention as i32,
                self.base_price,
                self.final_price,
                self.created_by,
            ],
        )?;

        let id = LineItemId(conn.last_insert_rowid());
        self.id = Some(id);
        Ok(id)
    }

    /// Find a line item by ID
    pub fn find_by_id(conn: &Connection, id: LineItemId) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
        let item = stmt.query_row([id], Self::from_row).optional()?;
        Ok(item)
    }

    /// All line items of a ticket in insertion order
    pub fn find_by_ticket(conn: &Connection, ticket_id: TicketId) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE ticket_id = ?1 ORDER BY id"))?;
        let items = stmt
            .query_map([ticket_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Update both price fields of a line item
    pub fn update_prices(
        conn: &Connection,
        id: LineItemId,
        base_price: i64,
        final_price: i64,
    ) -> Result<()> {
        conn.execute(
            "UPDATE line_items SET base_price = ?1, final_price = ?2 WHERE id = ?3",
            params![base_price, final_price, id],
        )?;
        Ok(())
    }

    /// Delete a line item by ID
    pub fn delete(conn: &Connection, id: LineItemId) -> Result<()> {
        conn.execute("DELETE FROM line_items WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Sum of final prices over a ticket's line items
    pub fn sum_final_prices(conn: &Connection, ticket_id: TicketId) -> Result<i64> {
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(final_price), 0) FROM line_items WHERE ticket_id = ?1",
            [ticket_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let kind_str: String = row.get(2)?;
        let kind = LineItemKind::from_columns(&kind_str, row.get(3)?, row.get(4)?).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        })?;
        let is_convention: i32 = row.get(5)?;

        Ok(Self {
            id: Some(row.get(0)?),
            ticket_id: row.get(1)?,
            kind,
            is_convention: is_convention != 0,
            base_price: row.get(6)?,
            final_price: row.get(7)?,
            created_by: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}
