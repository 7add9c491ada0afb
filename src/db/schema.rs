// src/db/schema.rs

//! Database schema definitions and migrations
//!
//! Migrations are numbered and recorded in `schema_version`; `migrate`
//! applies whatever is missing, in order, and is safe to call on every
//! startup.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version: Option<i32> = conn.query_row(
        "SELECT MAX(version) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        debug!("Schema is up to date");
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!("Schema migration complete. Now at version {}", SCHEMA_VERSION);
    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(Error::InitError(format!("Unknown migration version: {version}"))),
    }
}

/// Initial schema - Version 1
///
/// - packages / package_members: the bundle catalog
/// - tickets: per-visit aggregate with running total and lock version
/// - line_items: one billable row, either a prestation or a package
/// - dependency_items: ancillary items owned by a line item
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE packages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            price INTEGER NOT NULL CHECK(price >= 0),
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE package_members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL,
            prestation_id INTEGER NOT NULL CHECK(prestation_id > 0),
            UNIQUE(package_id, prestation_id),
            FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_package_members_package_id ON package_members(package_id);

        CREATE TABLE tickets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            reference TEXT,
            total_amount INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL DEFAULT 0,
            created_by INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        -- A prestation row never names a package and vice versa
        CREATE TABLE line_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticket_id INTEGER NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('prestation', 'package')),
            prestation_id INTEGER,
            package_id INTEGER,
            is_convention INTEGER NOT NULL DEFAULT 0,
            base_price INTEGER NOT NULL DEFAULT 0,
            final_price INTEGER NOT NULL DEFAULT 0,
            created_by INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (
                (kind = 'prestation' AND prestation_id IS NOT NULL AND package_id IS NULL)
                OR (kind = 'package' AND package_id IS NOT NULL AND prestation_id IS NULL)
            ),
            FOREIGN KEY (ticket_id) REFERENCES tickets(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_line_items_ticket_id ON line_items(ticket_id);
        CREATE INDEX idx_line_items_package_id ON line_items(package_id);

        CREATE TABLE dependency_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            parent_line_item_id INTEGER NOT NULL,
            dependent_prestation_id INTEGER NOT NULL,
            base_price INTEGER NOT NULL DEFAULT 0,
            final_price INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (parent_line_item_id) REFERENCES line_items(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_dependency_items_parent ON dependency_items(parent_line_item_id);
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}

/// Schema Version 2: conversion audit trail
///
/// One row per applied conversion; id lists are stored as JSON arrays.
fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Migrating to schema version 2");

    conn.execute_batch(
        "
        CREATE TABLE conversions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticket_id INTEGER NOT NULL,
            package_id INTEGER NOT NULL,
            new_line_item_id INTEGER NOT NULL,
            removed_line_item_ids TEXT NOT NULL,
            new_prestation_ids TEXT NOT NULL,
            is_cascading INTEGER NOT NULL DEFAULT 0,
            actor_id INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (ticket_id) REFERENCES tickets(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_conversions_ticket_id ON conversions(ticket_id);
        ",
    )?;

    info!("Schema version 2 applied successfully");
    Ok(())
}
