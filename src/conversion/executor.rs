// src/conversion/executor.rs

//! Conversion executor
//!
//! Applies an `ExecutionRequest` to one ticket inside the caller's
//! transaction. Every check runs before the first structural write, and
//! any error leaves the transaction to be rolled back by its owner, so a
//! failed call never applies part of a plan.

use super::multiset::{MatchSemantics, PrestationIdMultiset};
use super::plan::ExecutionRequest;
use crate::catalog::PackageCatalog;
use crate::config::EngineConfig;
use crate::db::models::{ConversionRecord, DependencyItem, LineItem, LineItemKind, Package, Ticket};
use crate::error::{Error, Result};
use crate::ids::{ActorId, LineItemId, PrestationId};
use crate::ticket_store::{TicketAggregate, TicketLineStore};
use rusqlite::Transaction;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

/// What happens to dependency items whose parent line is superseded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupersededDependencies {
    /// Delete them together with their parent line
    #[default]
    Cascade,
    /// Move them onto the new package line
    Reattach,
}

impl SupersededDependencies {
    pub fn as_str(&self) -> &str {
        match self {
            SupersededDependencies::Cascade => "cascade",
            SupersededDependencies::Reattach => "reattach",
        }
    }
}

/// Applies accepted conversion plans
#[derive(Debug, Clone, Copy)]
pub struct ConversionExecutor {
    semantics: MatchSemantics,
    superseded_dependencies: SupersededDependencies,
    include_dependencies_in_total: bool,
}

impl Default for ConversionExecutor {
    fn default() -> Self {
        Self {
            semantics: MatchSemantics::default(),
            superseded_dependencies: SupersededDependencies::default(),
            include_dependencies_in_total: false,
        }
    }
}

impl ConversionExecutor {
    pub fn new(semantics: MatchSemantics, superseded_dependencies: SupersededDependencies) -> Self {
        Self {
            semantics,
            superseded_dependencies,
            ..Self::default()
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            semantics: config.matching.semantics,
            superseded_dependencies: config.conversion.superseded_dependencies,
            include_dependencies_in_total: config.conversion.include_dependencies_in_total,
        }
    }

    pub fn with_dependencies_in_total(mut self, include: bool) -> Self {
        self.include_dependencies_in_total = include;
        self
    }

    /// Convert a ticket according to `request`
    ///
    /// Locks the ticket row first, then re-validates the request against
    /// the current rows. Fails with `StalePlan` when any named line is gone,
    /// belongs elsewhere, is convention-priced, or when the removed lines
    /// plus the new prestations no longer compose the package. Fails with
    /// `PackageNotFound` when the package is missing or inactive.
    pub fn execute<C: PackageCatalog>(
        &self,
        tx: &Transaction<'_>,
        catalog: &C,
        actor: ActorId,
        request: &ExecutionRequest,
    ) -> Result<TicketAggregate> {
        let ticket_id = request.ticket_id;
        let span = info_span!("execute_conversion", ticket = %ticket_id, actor = %actor);
        let _enter = span.enter();

        let version = Ticket::lock(tx, ticket_id)?;
        if let Some(expected) = request.expected_ticket_version
            && version - 1 != expected
        {
            return Err(Error::stale(
                ticket_id,
                format!("ticket changed since planning (version {expected}, now {})", version - 1),
            ));
        }

        let package = catalog
            .find_by_id(request.package_id)?
            .filter(|package| package.is_active)
            .ok_or(Error::PackageNotFound(request.package_id))?;

        let removed = self.validate(tx, catalog, request, &package)?;

        let mut new_line = LineItem::package(ticket_id, request.package_id, package.price);
        new_line.created_by = Some(actor);
        let new_line_id = new_line.insert(tx)?;

        for item in &removed {
            let line_id = item.require_id()?;
            let moved = match self.superseded_dependencies {
                SupersededDependencies::Cascade => DependencyItem::delete_by_parent(tx, line_id)?,
                SupersededDependencies::Reattach => {
                    DependencyItem::reparent(tx, line_id, new_line_id)?
                }
            };
            if moved > 0 {
                debug!(
                    "{} {} dependency items of line {}",
                    self.superseded_dependencies.as_str(),
                    moved,
                    line_id
                );
            }
            LineItem::delete(tx, line_id)?;
        }

        let store = TicketLineStore::new(tx).with_dependencies_in_total(self.include_dependencies_in_total);
        let total = store.recompute_total(ticket_id)?;

        let mut record = ConversionRecord {
            id: None,
            ticket_id,
            package_id: request.package_id,
            new_line_item_id: new_line_id,
            removed_line_item_ids: removed.iter().filter_map(|item| item.id).collect(),
            new_prestation_ids: sorted(&request.new_prestation_ids),
            is_cascading: removed.iter().any(LineItem::is_package),
            actor_id: actor,
            created_at: None,
        };
        record.insert(tx)?;

        info!(
            "Ticket {} converted to package {} '{}' ({} lines removed, total {})",
            ticket_id,
            request.package_id,
            package.name,
            removed.len(),
            total
        );

        store.load(ticket_id)
    }

    /// Reload every line named for removal and check the request still holds
    fn validate<C: PackageCatalog>(
        &self,
        tx: &Transaction<'_>,
        catalog: &C,
        request: &ExecutionRequest,
        package: &Package,
    ) -> Result<Vec<LineItem>> {
        let ticket_id = request.ticket_id;

        if let Some(bad) = request.new_prestation_ids.iter().find(|id| !id.is_valid()) {
            return Err(Error::InvalidLineItem(format!("invalid prestation id {bad}")));
        }

        let mut ids: Vec<LineItemId> = request.line_item_ids_to_remove.clone();
        ids.sort_unstable();
        if ids.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(Error::stale(ticket_id, "line item named twice for removal"));
        }

        let mut composed = PrestationIdMultiset::from(request.new_prestation_ids.as_slice());
        let mut removed = Vec::with_capacity(ids.len());

        for id in ids {
            let item = LineItem::find_by_id(tx, id)?
                .ok_or_else(|| Error::stale(ticket_id, format!("line item {id} no longer exists")))?;
            if item.ticket_id != ticket_id {
                return Err(Error::stale(
                    ticket_id,
                    format!("line item {id} belongs to ticket {}", item.ticket_id),
                ));
            }
            if !item.is_match_candidate() {
                return Err(Error::stale(
                    ticket_id,
                    format!("line item {id} is convention-priced"),
                ));
            }

            match item.kind {
                LineItemKind::Prestation { prestation_id } => composed.insert(prestation_id),
                LineItemKind::Package { package_id } => {
                    let unwound = catalog
                        .find_by_id(package_id)?
                        .ok_or(Error::PackageNotFound(package_id))?;
                    for member in unwound.member_prestation_ids {
                        composed.insert(member);
                    }
                }
            }
            removed.push(item);
        }

        let members = PrestationIdMultiset::from(package.member_prestation_ids.as_slice());
        if !composed.matches(&members, self.semantics) {
            return Err(Error::stale(
                ticket_id,
                format!(
                    "prestations {:?} no longer compose package {}",
                    composed.as_slice(),
                    request.package_id
                ),
            ));
        }

        Ok(removed)
    }
}

fn sorted(ids: &[PrestationId]) -> Vec<PrestationId> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids
}
