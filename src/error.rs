// src/error.rs

//! Error types for the package conversion engine

use crate::ids::{PackageId, TicketId};
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the catalog, the ticket store and the conversion engine
///
/// "No package matches" is never an error: the planner reports it as a
/// plan with `should_convert = false`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ticket {0} not found")]
    TicketNotFound(TicketId),

    #[error("Package {0} not found in catalog")]
    PackageNotFound(PackageId),

    #[error("Conversion plan for ticket {ticket_id} is stale: {reason}")]
    StalePlan { ticket_id: TicketId, reason: String },

    #[error("Invalid line item: {0}")]
    InvalidLineItem(String),
}

impl Error {
    /// Whether the caller should compute a fresh plan and try again
    pub fn is_retryable_by_replanning(&self) -> bool {
        matches!(self, Error::StalePlan { .. })
    }

    pub(crate) fn stale(ticket_id: TicketId, reason: impl Into<String>) -> Self {
        Error::StalePlan {
            ticket_id,
            reason: reason.into(),
        }
    }
}
