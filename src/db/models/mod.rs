// src/db/models/mod.rs

//! Data models for ticket and catalog entities
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, updating, and deleting records.

mod conversion;
mod dependency_item;
mod line_item;
mod package;
mod ticket;

pub use conversion::ConversionRecord;
pub use dependency_item::DependencyItem;
pub use line_item::{LineItem, LineItemKind};
pub use package::Package;
pub use ticket::Ticket;
