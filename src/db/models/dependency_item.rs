// src/db/models/dependency_item.rs

//! DependencyItem model - ancillary items tied to a parent line item

use crate::error::Result;
use crate::ids::{DependencyItemId, LineItemId, PrestationId, TicketId};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};

/// An ancillary item required by a parent line item
///
/// Never a package-matching candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyItem {
    pub id: Option<DependencyItemId>,
    pub parent_line_item_id: LineItemId,
    pub dependent_prestation_id: PrestationId,
    pub base_price: i64,
    pub final_price: i64,
    pub created_at: Option<String>,
}

impl DependencyItem {
    /// Create a new DependencyItem
    pub fn new(
        parent_line_item_id: LineItemId,
        dependent_prestation_id: PrestationId,
        price: i64,
    ) -> Self {
        Self {
            id: None,
            parent_line_item_id,
            dependent_prestation_id,
            base_price: price,
            final_price: price,
            created_at: None,
        }
    }

    /// Insert this dependency item into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<DependencyItemId> {
        conn.execute(
            "INSERT INTO dependency_items (parent_line_item_id, dependent_prestation_id, base_price, final_price)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.parent_line_item_id,
                self.dependent_prestation_id,
                self.base_price,
                self.final_price,
            ],
        )?;

        let id = DependencyItemId(conn.last_insert_rowid());
        self.id = Some(id);
        Ok(id)
    }

    /// Dependencies of one line item
    pub fn find_by_parent(conn: &Connection, parent_line_item_id: LineItemId) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, parent_line_item_id, dependent_prestation_id, base_price, final_price, created_at
             FROM dependency_items WHERE parent_line_item_id = ?1 ORDER BY id",
        )?;

        let items = stmt
            .query_map([parent_line_item_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Every dependency item on a ticket, ordered by parent then id
    pub fn find_by_ticket(conn: &Connection, ticket_id: TicketId) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT d.id, d.parent_line_item_id, d.dependent_prestation_id, d.base_price, d.final_price, d.created_at
             FROM dependency_items d
             JOIN line_items l ON l.id = d.parent_line_item_id
             WHERE l.ticket_id = ?1
             ORDER BY d.parent_line_item_id, d.id",
        )?;

        let items = stmt
            .query_map([ticket_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Delete every dependency of a line item, returning how many went
    pub fn delete_by_parent(conn: &Connection, parent_line_item_id: LineItemId) -> Result<usize> {
        let deleted = conn.execute(
            "DELETE FROM dependency_items WHERE parent_line_item_id = ?1",
            [parent_line_item_id],
        )?;
        Ok(deleted)
    }

    /// Move every dependency of one line item onto another
    pub fn reparent(conn: &Connection, from: LineItemId, to: LineItemId) -> Result<usize> {
        let moved = conn.execute(
            "UPDATE dependency_items SET parent_line_item_id = ?1 WHERE parent_line_item_id = ?2",
            params![to, from],
        )?;
        Ok(moved)
    }

    /// Delete a dependency item by ID
    pub fn delete(conn: &Connection, id: DependencyItemId) -> Result<()> {
        conn.execute("DELETE FROM dependency_items WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Sum of final prices over a ticket's dependency items
    pub fn sum_final_prices(conn: &Connection, ticket_id: TicketId) -> Result<i64> {
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(d.final_price), 0)
             FROM dependency_items d
             JOIN line_items l ON l.id = d.parent_line_item_id
             WHERE l.ticket_id = ?1",
            [ticket_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            parent_line_item_id: row.get(1)?,
            dependent_prestation_id: row.get(2)?,
            base_price: row.get(3)?,
            final_price: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}
