// src/conversion/planner.rs

//! Conversion planner
//!
//! Builds a `ConversionPlan` for one ticket without writing anything. Any
//! package line already on the ticket is unwound into its catalog members
//! for matching purposes, so a ticket holding package A can be upgraded to
//! a larger package B once the missing prestations are added.
//!
//! Convention-priced lines and dependency items never take part.

use super::matcher::PackageMatcher;
use super::multiset::{MatchSemantics, PrestationIdMultiset};
use super::plan::ConversionPlan;
use crate::catalog::PackageCatalog;
use crate::db::models::{LineItem, LineItemKind, Ticket};
use crate::error::{Error, Result};
use crate::ids::{ActorId, LineItemId, PackageId, PrestationId, TicketId};
use rusqlite::Connection;
use tracing::{debug, info_span, warn};

pub(crate) const NO_MATCH_MESSAGE: &str = "no package matches the current combination";

/// The ticket's match-eligible lines, with package lines unwound
#[derive(Debug, Default)]
pub(crate) struct UnwoundTicket {
    /// Effective prestation ids of every eligible line
    pub(crate) effective: PrestationIdMultiset,
    pub(crate) standalone_line_ids: Vec<LineItemId>,
    pub(crate) package_line_ids: Vec<LineItemId>,
    pub(crate) unwound_package_ids: Vec<PackageId>,
    /// Names of the packages that were unwound, in line order
    pub(crate) unwound_package_names: Vec<String>,
}

impl UnwoundTicket {
    /// Unwind the eligible lines among `items`
    ///
    /// A package line whose package is gone from the catalog is an invariant
    /// violation and fails with `PackageNotFound`.
    pub(crate) fn from_items<C: PackageCatalog>(catalog: &C, items: &[LineItem]) -> Result<Self> {
        let mut unwound = Self::default();

        for item in items.iter().filter(|item| item.is_match_candidate()) {
            let id = item.require_id()?;
            match item.kind {
                LineItemKind::Prestation { prestation_id } => {
                    unwound.effective.insert(prestation_id);
                    unwound.standalone_line_ids.push(id);
                }
                LineItemKind::Package { package_id } => {
                    let package = catalog
                        .find_by_id(package_id)?
                        .ok_or(Error::PackageNotFound(package_id))?;
                    debug!(
                        "Unwinding line {} (package {} '{}') into {:?}",
                        id, package_id, package.name, package.member_prestation_ids
                    );
                    for member in &package.member_prestation_ids {
                        unwound.effective.insert(*member);
                    }
                    unwound.package_line_ids.push(id);
                    unwound.unwound_package_ids.push(package_id);
                    unwound.unwound_package_names.push(package.name);
                }
            }
        }

        Ok(unwound)
    }

    /// True when the ticket holds exactly one eligible line, a package line of `package_id`
    fn is_only(&self, package_id: Option<PackageId>) -> bool {
        self.standalone_line_ids.is_empty()
            && self.unwound_package_ids.len() == 1
            && package_id == self.unwound_package_ids.first().copied()
    }

    fn removal_ids(&self) -> Vec<LineItemId> {
        let mut ids: Vec<LineItemId> = self
            .standalone_line_ids
            .iter()
            .chain(self.package_line_ids.iter())
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// Read-only planner over one connection and one catalog
pub struct ConversionPlanner<'a, C: PackageCatalog> {
    conn: &'a Connection,
    catalog: C,
    matcher: PackageMatcher,
}

impl<'a, C: PackageCatalog> ConversionPlanner<'a, C> {
    pub fn new(conn: &'a Connection, catalog: C, semantics: MatchSemantics) -> Self {
        debug!("Conversion planner using {} semantics", semantics.as_str());
        Self {
            conn,
            catalog,
            matcher: PackageMatcher::new(semantics),
        }
    }

    pub fn semantics(&self) -> MatchSemantics {
        self.matcher.semantics()
    }

    /// Plan the conversion triggered by adding `new_ids` to a ticket
    ///
    /// `existing_ids` is the caller's view of the standard prestations
    /// already on the ticket. The ticket's own unwound state wins; caller
    /// ids it cannot account for are reported and otherwise ignored.
    pub fn plan(
        &self,
        actor: ActorId,
        ticket_id: TicketId,
        new_ids: &[PrestationId],
        existing_ids: &[PrestationId],
    ) -> Result<ConversionPlan> {
        let span = info_span!("plan_conversion", ticket = %ticket_id, actor = %actor);
        let _enter = span.enter();

        let ticket = Ticket::require(self.conn, ticket_id)?;

        if new_ids.is_empty() {
            return Ok(ConversionPlan::no_op(
                ticket_id,
                ticket.version,
                "no new prestations to convert",
            ));
        }
        if let Some(bad) = new_ids
            .iter()
            .chain(existing_ids.iter())
            .find(|id| !id.is_valid())
        {
            debug!("Rejecting input with invalid prestation id {}", bad);
            return Ok(ConversionPlan::no_op(
                ticket_id,
                ticket.version,
                format!("invalid prestation id {bad}"),
            ));
        }

        let items = LineItem::find_by_ticket(self.conn, ticket_id)?;
        let unwound = UnwoundTicket::from_items(&self.catalog, &items)?;

        let unreconciled = reconcile(&unwound.effective, existing_ids);
        if !unreconciled.is_empty() {
            warn!(
                "Ticket {} does not account for caller-supplied prestations {:?}; ignoring them",
                ticket_id, unreconciled
            );
        }

        let new_ids = PrestationIdMultiset::from(new_ids);
        let mut combined = unwound.effective.clone();
        combined.extend_from(&new_ids);
        debug!("Matching combined prestations {:?}", combined.as_slice());

        let mut plan = ConversionPlan::no_op(ticket_id, ticket.version, NO_MATCH_MESSAGE);
        plan.new_prestation_ids = new_ids.into();
        plan.unreconciled_existing_ids = unreconciled;

        let Some(package) = self.matcher.find_exact_match_in(&self.catalog, &combined)? else {
            debug!("No package matches ticket {}", ticket_id);
            return Ok(plan);
        };

        // Repeats collapse under set semantics, so the match can be the bundle already held
        if unwound.is_only(package.id) {
            debug!("Ticket {} already holds package '{}'", ticket_id, package.name);
            plan.message = format!("ticket already holds package '{}'", package.name);
            return Ok(plan);
        }

        plan.is_cascading = !unwound.package_line_ids.is_empty();
        plan.message = if plan.is_cascading {
            format!(
                "package '{}' upgraded to package '{}'",
                unwound.unwound_package_names.join("', '"),
                package.name
            )
        } else {
            format!("prestations converted to package '{}'", package.name)
        };
        plan.line_item_ids_to_remove = unwound.removal_ids();
        plan.should_convert = true;
        plan.package = Some(package);

        debug!("Planned: {}", plan.summary());
        Ok(plan)
    }
}

/// Caller ids left over once every id of the ticket's view is consumed
fn reconcile(effective: &PrestationIdMultiset, existing_ids: &[PrestationId]) -> Vec<PrestationId> {
    let mut remaining = effective.clone();
    let mut unreconciled: Vec<PrestationId> = existing_ids
        .iter()
        .copied()
        .filter(|id| !remaining.remove_one(*id))
        .collect();
    unreconciled.sort_unstable();
    unreconciled
}
