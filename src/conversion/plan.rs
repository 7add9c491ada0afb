// src/conversion/plan.rs

//! Conversion plans and execution requests
//!
//! A plan is advisory: it is computed without locks and may be held by the
//! caller between the planning and execution requests. The executor never
//! trusts it blindly and re-validates everything it names.

use crate::db::models::Package;
use crate::ids::{LineItemId, PackageId, PrestationId, TicketId};
use serde::{Deserialize, Serialize};

/// Outcome of planning a conversion for one ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionPlan {
    pub ticket_id: TicketId,
    /// Ticket version observed while planning
    pub ticket_version: i64,
    pub should_convert: bool,
    /// The matched package, present exactly when `should_convert` is set
    pub package: Option<Package>,
    /// Sorted ascending
    pub line_item_ids_to_remove: Vec<LineItemId>,
    /// At least one removed line is itself a package line
    pub is_cascading: bool,
    pub message: String,
    /// The newly added prestations, sorted ascending
    pub new_prestation_ids: Vec<PrestationId>,
    /// Caller-supplied existing ids the ticket could not account for
    pub unreconciled_existing_ids: Vec<PrestationId>,
}

impl ConversionPlan {
    /// A plan that changes nothing
    pub fn no_op(ticket_id: TicketId, ticket_version: i64, message: impl Into<String>) -> Self {
        Self {
            ticket_id,
            ticket_version,
            should_convert: false,
            package: None,
            line_item_ids_to_remove: Vec::new(),
            is_cascading: false,
            message: message.into(),
            new_prestation_ids: Vec::new(),
            unreconciled_existing_ids: Vec::new(),
        }
    }

    pub fn package_id(&self) -> Option<PackageId> {
        self.package.as_ref().and_then(|package| package.id)
    }

    /// Get a summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            should_convert: self.should_convert,
            package_id: self.package_id(),
            lines_removed: self.line_item_ids_to_remove.len(),
            prestations_added: self.new_prestation_ids.len(),
            is_cascading: self.is_cascading,
        }
    }
}

/// Summary of a conversion plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    pub should_convert: bool,
    pub package_id: Option<PackageId>,
    pub lines_removed: usize,
    pub prestations_added: usize,
    pub is_cascading: bool,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.package_id {
            Some(package_id) if self.should_convert => write!(
                f,
                "convert to package {}: {} lines removed, {} prestations absorbed{}",
                package_id,
                self.lines_removed,
                self.prestations_added,
                if self.is_cascading { " (cascading)" } else { "" }
            ),
            _ => write!(f, "no conversion"),
        }
    }
}

/// What the executor is asked to apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub ticket_id: TicketId,
    pub package_id: PackageId,
    pub line_item_ids_to_remove: Vec<LineItemId>,
    pub new_prestation_ids: Vec<PrestationId>,
    /// When set, any locked write since planning makes the request stale
    #[serde(default)]
    pub expected_ticket_version: Option<i64>,
}

impl ExecutionRequest {
    pub fn new(
        ticket_id: TicketId,
        package_id: PackageId,
        line_item_ids_to_remove: Vec<LineItemId>,
        new_prestation_ids: Vec<PrestationId>,
    ) -> Self {
        Self {
            ticket_id,
            package_id,
            line_item_ids_to_remove,
            new_prestation_ids,
            expected_ticket_version: None,
        }
    }

    /// The request a converting plan stands for; `None` for no-op plans
    pub fn from_plan(plan: &ConversionPlan) -> Option<Self> {
        if !plan.should_convert {
            return None;
        }
        let package_id = plan.package_id()?;
        Some(Self {
            ticket_id: plan.ticket_id,
            package_id,
            line_item_ids_to_remove: plan.line_item_ids_to_remove.clone(),
            new_prestation_ids: plan.new_prestation_ids.clone(),
            expected_ticket_version: Some(plan.ticket_version),
        })
    }
}
