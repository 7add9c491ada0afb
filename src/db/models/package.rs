// src/db/models/package.rs

//! Package model - a catalog bundle of prestations sold at one price

use crate::error::{Error, Result};
use crate::ids::{PackageId, PrestationId};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named bundle with a flat price and a fixed membership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: Option<PackageId>,
    pub name: String,
    /// Bundle price in minor currency units
    pub price: i64,
    pub is_active: bool,
    /// Member prestations, sorted ascending
    pub member_prestation_ids: Vec<PrestationId>,
    pub created_at: Option<String>,
}

impl Package {
    /// Create a new, not yet persisted package
    pub fn new(name: String, price: i64, mut member_prestation_ids: Vec<PrestationId>) -> Self {
        member_prestation_ids.sort();
        Self {
            id: None,
            name,
            price,
            is_active: true,
            member_prestation_ids,
            created_at: None,
        }
    }

    /// Insert the package and its members
    ///
    /// Membership must be non-empty and free of duplicates.
    pub fn insert(&mut self, conn: &Connection) -> Result<PackageId> {
        if self.member_prestation_ids.is_empty() {
            return Err(Error::InitError(format!(
                "Package '{}' must have at least one member",
                self.name
            )));
        }

        conn.execute(
            "INSERT INTO packages (name, price, is_active) VALUES (?1, ?2, ?3)",
            params![&self.name, self.price, self.is_active as i32],
        )?;
        let id = PackageId(conn.last_insert_rowid());

        let mut stmt =
            conn.prepare("INSERT INTO package_members (package_id, prestation_id) VALUES (?1, ?2)")?;
        for member in &self.member_prestation_ids {
            stmt.execute(params![id, member])?;
        }

        self.id = Some(id);
        Ok(id)
    }

    /// Convenience: build and insert in one step
    pub fn create(
        conn: &Connection,
        name: &str,
        price: i64,
        member_prestation_ids: Vec<PrestationId>,
    ) -> Result<Self> {
        let mut package = Self::new(name.to_string(), price, member_prestation_ids);
        package.insert(conn)?;
        Ok(package)
    }

    /// Find a package by ID, active or not
    pub fn find_by_id(conn: &Connection, id: PackageId) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, price, is_active, created_at FROM packages WHERE id = ?1",
        )?;

        let package = stmt.query_row([id], Self::from_row).optional()?;

        match package {
            Some(mut package) => {
                package.member_prestation_ids = Self::load_members(conn, id)?;
                Ok(Some(package))
            }
            None => Ok(None),
        }
    }

    /// List every package with its members, ordered by id
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn
            .prepare("SELECT id, name, price, is_active, created_at FROM packages ORDER BY id")?;
        let mut packages = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // One pass over the member table instead of a query per package
        let mut members: HashMap<PackageId, Vec<PrestationId>> = HashMap::new();
        let mut stmt = conn.prepare(
            "SELECT package_id, prestation_id FROM package_members ORDER BY package_id, prestation_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, PackageId>(0)?, row.get::<_, PrestationId>(1)?))
        })?;
        for row in rows {
            let (package_id, prestation_id) = row?;
            members.entry(package_id).or_default().push(prestation_id);
        }

        for package in &mut packages {
            if let Some(id) = package.id {
                package.member_prestation_ids = members.remove(&id).unwrap_or_default();
            }
        }

        Ok(packages)
    }

    /// Activate or retire a package
    pub fn set_active(conn: &Connection, id: PackageId, active: bool) -> Result<()> {
        let updated = conn.execute(
            "UPDATE packages SET is_active = ?1 WHERE id = ?2",
            params![active as i32, id],
        )?;
        if updated == 0 {
            return Err(Error::PackageNotFound(id));
        }
        Ok(())
    }

    /// Delete a package; members go with it
    pub fn delete(conn: &Connection, id: PackageId) -> Result<()> {
        conn.execute("DELETE FROM packages WHERE id = ?1", [id])?;
        Ok(())
    }

    pub fn member_count(&self) -> usize {
        self.member_prestation_ids.len()
    }

    fn load_members(conn: &Connection, id: PackageId) -> Result<Vec<PrestationId>> {
        let mut stmt = conn.prepare(
            "SELECT prestation_id FROM package_members WHERE package_id = ?1 ORDER BY prestation_id",
        )?;
        let members = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(members)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let is_active: i32 = row.get(3)?;

        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            price: row.get(2)?,
            is_active: is_active != 0,
            member_prestation_ids: Vec::new(),
            created_at: row.get(4)?,
        })
    }
}
