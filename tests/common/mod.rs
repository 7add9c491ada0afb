// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use fiche_packages::db;
use fiche_packages::{
    ActorId, ConversionService, EngineConfig, Package, PrestationId, TicketId, TicketLineStore,
};
use std::path::PathBuf;
use tempfile::TempDir;

pub const RECEPTIONIST: ActorId = ActorId(1);
pub const NURSE: ActorId = ActorId(2);

/// The catalog used by most scenarios
pub struct SeededCatalog {
    /// Package 8 in production data: {5, 87} @ 500
    pub simple: Package,
    /// Package 11 in production data: {5, 87, 88} @ 800
    pub complet: Package,
}

/// Create a test database with the two "bilan" packages.
///
/// Returns (TempDir, db_path, catalog) - keep the TempDir alive to prevent cleanup.
pub fn setup_test_db() -> (TempDir, PathBuf, SeededCatalog) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("fiche.db");

    db::init(&db_path).unwrap();
    let mut conn = db::open(&db_path).unwrap();

    let catalog = db::transaction(&mut conn, |tx| {
        let simple = Package::create(tx, "Bilan simple", 500, ids(&[5, 87]))?;
        let complet = Package::create(tx, "Bilan complet", 800, ids(&[5, 87, 88]))?;
        Ok(SeededCatalog { simple, complet })
    })
    .unwrap();

    (temp_dir, db_path, catalog)
}

/// A service over a freshly seeded database
pub fn setup_service() -> (TempDir, ConversionService, SeededCatalog) {
    let (temp_dir, db_path, catalog) = setup_test_db();
    let service = ConversionService::new(EngineConfig::for_database(db_path));
    (temp_dir, service, catalog)
}

/// Open an empty ticket
pub fn create_ticket(service: &ConversionService) -> TicketId {
    let conn = service.open().unwrap();
    TicketLineStore::new(&conn)
        .create_ticket(RECEPTIONIST, None)
        .unwrap()
        .id
        .unwrap()
}

pub fn ids(raw: &[i64]) -> Vec<PrestationId> {
    raw.iter().copied().map(PrestationId).collect()
}
