// src/catalog.rs

//! Read-only access to the package catalog
//!
//! The catalog is owned by the configuration subsystem. The engine only
//! ever lists packages or looks one up by id, and every call reads the
//! latest committed state: nothing is cached here.

use crate::db::models::Package;
use crate::error::Result;
use crate::ids::PackageId;
use rusqlite::Connection;

/// Lookup surface the planner and executor need from the catalog
pub trait PackageCatalog {
    /// Every package, active or not, ordered by id
    fn find_all(&self) -> Result<Vec<Package>>;

    /// One package by id, active or not
    fn find_by_id(&self, id: PackageId) -> Result<Option<Package>>;
}

impl<C: PackageCatalog + ?Sized> PackageCatalog for &C {
    fn find_all(&self) -> Result<Vec<Package>> {
        (**self).find_all()
    }

    fn find_by_id(&self, id: PackageId) -> Result<Option<Package>> {
        (**self).find_by_id(id)
    }
}

/// Catalog backed by the `packages` tables
///
/// Built over a transaction, it reads inside that transaction.
pub struct SqliteCatalog<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCatalog<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl PackageCatalog for SqliteCatalog<'_> {
    fn find_all(&self) -> Result<Vec<Package>> {
        Package::list_all(self.conn)
    }

    fn find_by_id(&self, id: PackageId) -> Result<Option<Package>> {
        Package::find_by_id(self.conn, id)
    }
}

/// In-memory catalog snapshot
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    packages: Vec<Package>,
}

impl StaticCatalog {
    pub fn new(mut packages: Vec<Package>) -> Self {
        packages.sort_by_key(|p| p.id);
        Self { packages }
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl PackageCatalog for StaticCatalog {
    fn find_all(&self) -> Result<Vec<Package>> {
        Ok(self.packages.clone())
    }

    fn find_by_id(&self, id: PackageId) -> Result<Option<Package>> {
        Ok(self.packages.iter().find(|p| p.id == Some(id)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::ids::PrestationId;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_sqlite_catalog_sees_latest_state() {
        let (_temp, conn) = create_test_db();
        let catalog = SqliteCatalog::new(&conn);
        assert!(catalog.find_all().unwrap().is_empty());

        let package =
            Package::create(&conn, "Bilan", 500, vec![PrestationId(5), PrestationId(87)]).unwrap();
        let id = package.id.unwrap();

        assert_eq!(catalog.find_all().unwrap().len(), 1);
        assert_eq!(catalog.find_by_id(id).unwrap().unwrap().price, 500);

        Package::delete(&conn, id).unwrap();
        assert!(catalog.find_by_id(id).unwrap().is_none());
    }

    #[test]
    fn test_static_catalog_lookup() {
        let mut small = Package::new("Small".to_string(), 500, vec![PrestationId(5)]);
        small.id = Some(PackageId(8));
        let mut large = Package::new("Large".to_string(), 800, vec![PrestationId(5), PrestationId(6)]);
        large.id = Some(PackageId(2));

        let catalog = StaticCatalog::new(vec![small, large]);
        assert_eq!(catalog.len(), 2);

        let all = catalog.find_all().unwrap();
        assert_eq!(all[0].id, Some(PackageId(2)));
        assert_eq!(catalog.find_by_id(PackageId(8)).unwrap().unwrap().name, "Small");
        assert!(catalog.find_by_id(PackageId(3)).unwrap().is_none());
    }
}
