// src/lib.rs

//! Fiche package conversion engine
//!
//! Collapses the prestations on a patient-visit ticket (fiche) into a
//! catalog package when they match its membership exactly, including the
//! cascading case where a package already on the ticket is upgraded to a
//! larger one.
//!
//! # Architecture
//!
//! - Database-first: tickets, line items and the package catalog live in SQLite
//! - Plan, then execute: planning never writes; execution re-validates the
//!   plan inside one transaction holding the ticket's lock
//! - Typed identifiers and money in minor units; no floats, no open maps
//! - Explicit actor and unit of work on every call, no ambient globals

pub mod catalog;
pub mod config;
pub mod conversion;
pub mod db;
mod error;
pub mod ids;
pub mod logging;
pub mod ticket_store;

pub use catalog::{PackageCatalog, SqliteCatalog, StaticCatalog};
pub use config::EngineConfig;
pub use conversion::{
    ConversionExecutor, ConversionOutcome, ConversionPlan, ConversionPlanner, ConversionService,
    ExecutionRequest, MatchSemantics, PackageMatcher, PrestationIdMultiset,
    SupersededDependencies, TicketLocks,
};
pub use db::models::{ConversionRecord, DependencyItem, LineItem, LineItemKind, Package, Ticket};
pub use error::{Error, Result};
pub use ids::{ActorId, DependencyItemId, LineItemId, PackageId, PrestationId, TicketId};
pub use ticket_store::{TicketAggregate, TicketLine, TicketLineStore};
