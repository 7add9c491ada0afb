// src/db/mod.rs

//! Database layer: connection setup, transactions, schema and models
//!
//! All ticket and catalog state lives in SQLite. Connections are cheap to
//! open, so callers open one per request and pass it (or a transaction
//! borrowed from it) explicitly into the engine.

pub mod models;
pub mod schema;

use crate::error::{Error, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Default wait for a competing writer
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create the database (and parent directories) and bring the schema up to date
pub fn init(db_path: impl AsRef<Path>) -> Result<()> {
    let db_path = db_path.as_ref();
    info!("Initializing database at {}", db_path.display());

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path)?;
    configure(&conn, DEFAULT_BUSY_TIMEOUT)?;
    schema::migrate(&conn)?;
    Ok(())
}

/// Open an existing database
pub fn open(db_path: impl AsRef<Path>) -> Result<Connection> {
    open_with_timeout(db_path, DEFAULT_BUSY_TIMEOUT)
}

/// Open an existing database with an explicit busy timeout
pub fn open_with_timeout(db_path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Connection> {
    let db_path = db_path.as_ref();
    if !db_path.exists() {
        return Err(Error::InitError(format!(
            "Database not found at {}; run init first",
            db_path.display()
        )));
    }

    let conn = Connection::open(db_path)?;
    configure(&conn, busy_timeout)?;
    Ok(conn)
}

fn configure(conn: &Connection, busy_timeout: Duration) -> Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    debug!("Connection configured (journal_mode={})", mode);
    Ok(())
}

/// Run `f` inside a deferred transaction
///
/// Commits when `f` returns Ok; any error drops the transaction, which
/// rolls back every write made through it.
pub fn transaction<F, T>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

/// Run `f` inside a transaction that takes the write lock immediately
pub fn immediate_transaction<F, T>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_requires_init() {
        let dir = TempDir::new().unwrap();
        let err = open(dir.path().join("missing.db")).unwrap_err();
        assert!(matches!(err, Error::InitError(_)));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fiche.db");
        init(&path).unwrap();
        let mut conn = open(&path).unwrap();

        let result: Result<()> = transaction(&mut conn, |tx| {
            tx.execute("INSERT INTO tickets (reference) VALUES ('rollback-me')", [])?;
            Err(Error::NotFound("forced".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tickets", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_immediate_transaction_commits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fiche.db");
        init(&path).unwrap();
        let mut conn = open(&path).unwrap();

        immediate_transaction(&mut conn, |tx| {
            tx.execute("INSERT INTO tickets (reference) VALUES ('kept')", [])?;
            Ok(())
        })
        .unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tickets", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
