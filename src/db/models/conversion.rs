// src/db/models/conversion.rs

//! Conversion audit records

use crate::error::Result;
use crate::ids::{ActorId, LineItemId, PackageId, PrestationId, TicketId};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};

/// One applied package conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub id: Option<i64>,
    pub ticket_id: TicketId,
    pub package_id: PackageId,
    pub new_line_item_id: LineItemId,
    pub removed_line_item_ids: Vec<LineItemId>,
    pub new_prestation_ids: Vec<PrestationId>,
    pub is_cascading: bool,
    pub actor_id: ActorId,
    pub created_at: Option<String>,
}

impl ConversionRecord {
    /// Insert this record into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        let removed = serde_json::to_string(&self.removed_line_item_ids)?;
        let new_ids = serde_json::to_string(&self.new_prestation_ids)?;

        conn.execute(
            "INSERT INTO conversions (ticket_id, package_id, new_line_item_id, removed_line_item_ids, new_prestation_ids, is_cascading, actor_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.ticket_id,
                self.package_id,
                self.new_line_item_id,
                removed,
                new_ids,
                self.is_cascading as i32,
                self.actor_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Conversion history of a ticket, oldest first
    pub fn find_by_ticket(conn: &Connection, ticket_id: TicketId) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, ticket_id, package_id, new_line_item_id, removed_line_item_ids, new_prestation_ids, is_cascading, actor_id, created_at
             FROM conversions WHERE ticket_id = ?1 ORDER BY id",
        )?;

        let records = stmt
            .query_map([ticket_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let removed: String = row.get(4)?;
        let new_ids: String = row.get(5)?;
        let is_cascading: i32 = row.get(6)?;

        Ok(Self {
            id: Some(row.get(0)?),
            ticket_id: row.get(1)?,
            package_id: row.get(2)?,
            new_line_item_id: row.get(3)?,
            removed_line_item_ids: parse_json_column(4, &removed)?,
            new_prestation_ids: parse_json_column(5, &new_ids)?,
            is_cascading: is_cascading != 0,
            actor_id: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

fn parse_json_column<T: serde::de::DeserializeOwned>(idx: usize, text: &str) -> rusqlite::Result<T> {
    serde_json::from_str(text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
