// src/conversion/mod.rs

//! Package auto-conversion engine
//!
//! Three stages with one-directional data flow:
//!
//! 1. [`PackageMatcher`] compares a candidate prestation collection with
//!    catalog memberships (exact equality only).
//! 2. [`ConversionPlanner`] unwinds package lines already on the ticket,
//!    combines them with the newly added prestations and produces a
//!    [`ConversionPlan`] without writing.
//! 3. [`ConversionExecutor`] re-validates an [`ExecutionRequest`] inside a
//!    transaction and rewrites the ticket.
//!
//! [`ConversionService`] wires the stages to a database path with
//! per-ticket locking.

mod executor;
mod locks;
mod matcher;
mod multiset;
mod plan;
mod planner;
mod service;

pub use executor::{ConversionExecutor, SupersededDependencies};
pub use locks::TicketLocks;
pub use matcher::PackageMatcher;
pub use multiset::{MatchSemantics, PrestationIdMultiset};
pub use plan::{ConversionPlan, ExecutionRequest, PlanSummary};
pub use planner::ConversionPlanner;
pub use service::{ConversionOutcome, ConversionService};
