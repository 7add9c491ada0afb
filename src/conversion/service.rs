// src/conversion/service.rs

//! In-process entry point for the item-addition workflow
//!
//! Each call opens its own connection from the configured database path.
//! Planning runs without locks; execution takes the ticket's in-process
//! lock and an IMMEDIATE transaction, and commits only when the executor
//! succeeds.

use super::executor::ConversionExecutor;
use super::locks::TicketLocks;
use super::plan::{ConversionPlan, ExecutionRequest};
use super::planner::ConversionPlanner;
use crate::catalog::SqliteCatalog;
use crate::config::EngineConfig;
use crate::db;
use crate::db::models::ConversionRecord;
use crate::error::Result;
use crate::ids::{ActorId, PrestationId, TicketId};
use crate::ticket_store::{TicketAggregate, TicketLineStore};
use rusqlite::Connection;
use tracing::{debug, info};

/// Result of `ConversionService::convert`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// No package matched; the ticket was not touched
    Unchanged(ConversionPlan),
    /// The plan was applied
    Converted {
        plan: ConversionPlan,
        ticket: TicketAggregate,
    },
}

impl ConversionOutcome {
    pub fn plan(&self) -> &ConversionPlan {
        match self {
            ConversionOutcome::Unchanged(plan) => plan,
            ConversionOutcome::Converted { plan, .. } => plan,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, ConversionOutcome::Converted { .. })
    }
}

/// Plans and applies package conversions against one database
pub struct ConversionService {
    config: EngineConfig,
    locks: TicketLocks,
}

impl ConversionService {
    pub fn new(config: EngineConfig) -> Self {
        info!(
            "Conversion service on {} (semantics={}, superseded dependencies={})",
            config.database.path.display(),
            config.matching.semantics.as_str(),
            config.conversion.superseded_dependencies.as_str()
        );
        Self {
            config,
            locks: TicketLocks::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn locks(&self) -> &TicketLocks {
        &self.locks
    }

    /// Open a connection to the configured database
    pub fn open(&self) -> Result<Connection> {
        db::open_with_timeout(&self.config.database.path, self.config.database.busy_timeout())
    }

    /// Plan a conversion; never writes
    pub fn plan(
        &self,
        actor: ActorId,
        ticket_id: TicketId,
        new_ids: &[PrestationId],
        existing_ids: &[PrestationId],
    ) -> Result<ConversionPlan> {
        let conn = self.open()?;
        let planner = ConversionPlanner::new(
            &conn,
            SqliteCatalog::new(&conn),
            self.config.matching.semantics,
        );
        planner.plan(actor, ticket_id, new_ids, existing_ids)
    }

    /// Apply a request under the ticket's lock, atomically
    pub fn execute(&self, actor: ActorId, request: &ExecutionRequest) -> Result<TicketAggregate> {
        let executor = ConversionExecutor::from_config(&self.config);
        self.locks.with_ticket(request.ticket_id, || {
            let mut conn = self.open()?;
            db::immediate_transaction(&mut conn, |tx| {
                executor.execute(tx, &SqliteCatalog::new(tx), actor, request)
            })
        })
    }

    /// Plan, then apply the plan when it converts
    pub fn convert(
        &self,
        actor: ActorId,
        ticket_id: TicketId,
        new_ids: &[PrestationId],
        existing_ids: &[PrestationId],
    ) -> Result<ConversionOutcome> {
        let plan = self.plan(actor, ticket_id, new_ids, existing_ids)?;
        let Some(request) = ExecutionRequest::from_plan(&plan) else {
            debug!("Ticket {} unchanged: {}", ticket_id, plan.message);
            return Ok(ConversionOutcome::Unchanged(plan));
        };

        let ticket = self.execute(actor, &request)?;
        Ok(ConversionOutcome::Converted { plan, ticket })
    }

    /// Current state of a ticket
    pub fn load_ticket(&self, ticket_id: TicketId) -> Result<TicketAggregate> {
        let conn = self.open()?;
        TicketLineStore::new(&conn)
            .with_dependencies_in_total(self.config.conversion.include_dependencies_in_total)
            .load(ticket_id)
    }

    /// Audit trail of conversions applied to a ticket, oldest first
    pub fn history(&self, ticket_id: TicketId) -> Result<Vec<ConversionRecord>> {
        let conn = self.open()?;
        ConversionRecord::find_by_ticket(&conn, ticket_id)
    }
}
