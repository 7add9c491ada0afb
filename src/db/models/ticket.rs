// src/db/models/ticket.rs

//! Ticket model - the per-visit aggregate root

use crate::error::{Error, Result};
use crate::ids::{ActorId, TicketId};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

/// A patient-visit ticket (fiche)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Option<TicketId>,
    pub reference: Option<String>,
    /// Derived from the line items; never authoritative for prices
    pub total_amount: i64,
    /// Bumped on every locked write
    pub version: i64,
    pub created_by: Option<ActorId>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Ticket {
    /// Create a new Ticket
    pub fn new(reference: Option<String>) -> Self {
        Self {
            id: None,
            reference,
            total_amount: 0,
            version: 0,
            created_by: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Insert this ticket into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<TicketId> {
        conn.execute(
            "INSERT INTO tickets (reference, total_amount, created_by) VALUES (?1, ?2, ?3)",
            params![&self.reference, self.total_amount, self.created_by],
        )?;

        let id = TicketId(conn.last_insert_rowid());
        self.id = Some(id);
        Ok(id)
    }

    /// Find a ticket by ID
    pub fn find_by_id(conn: &Connection, id: TicketId) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, reference, total_amount, version, created_by, created_at, updated_at
             FROM tickets WHERE id = ?1",
        )?;

        let ticket = stmt.query_row([id], Self::from_row).optional()?;
        Ok(ticket)
    }

    /// Find a ticket by ID or fail with `TicketNotFound`
    pub fn require(conn: &Connection, id: TicketId) -> Result<Self> {
        Self::find_by_id(conn, id)?.ok_or(Error::TicketNotFound(id))
    }

    /// Take the ticket's write lock for the rest of the enclosing transaction
    ///
    /// SQLite has no row locks: the version bump is the first write of the
    /// transaction, so it acquires the database write lock and every
    /// concurrent writer on this ticket observes the new version.
    pub fn lock(conn: &Connection, id: TicketId) -> Result<i64> {
        let updated = conn.execute(
            "UPDATE tickets SET version = version + 1, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
            [id],
        )?;
        if updated == 0 {
            return Err(Error::TicketNotFound(id));
        }

        let version = conn.query_row("SELECT version FROM tickets WHERE id = ?1", [id], |row| {
            row.get(0)
        })?;
        Ok(version)
    }

    /// Persist a recomputed total
    pub fn set_total(conn: &Connection, id: TicketId, total_amount: i64) -> Result<()> {
        let updated = conn.execute(
            "UPDATE tickets SET total_amount = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
            params![total_amount, id],
        )?;
        if updated == 0 {
            return Err(Error::TicketNotFound(id));
        }
        Ok(())
    }

    /// Delete a ticket; line items, dependencies and audit rows go with it
    pub fn delete(conn: &Connection, id: TicketId) -> Result<()> {
        conn.execute("DELETE FROM tickets WHERE id = ?1", [id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            reference: row.get(1)?,
            total_amount: row.get(2)?,
            version: row.get(3)?,
            created_by: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}
