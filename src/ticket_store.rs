// src/ticket_store.rs

//! Ticket line store
//!
//! CRUD over a ticket's line items and their dependency items. Every
//! structural mutation finishes by recomputing the ticket total, so the
//! stored total is always derived from the rows, never the other way
//! round.

use crate::db::models::{DependencyItem, LineItem, Package, Ticket};
use crate::error::{Error, Result};
use crate::ids::{ActorId, LineItemId, PrestationId, TicketId};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// A line item together with its dependency items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketLine {
    pub item: LineItem,
    pub dependencies: Vec<DependencyItem>,
}

/// A ticket with all of its lines, as handed back to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketAggregate {
    pub ticket: Ticket,
    pub lines: Vec<TicketLine>,
}

impl TicketAggregate {
    pub fn line_items(&self) -> impl Iterator<Item = &LineItem> {
        self.lines.iter().map(|line| &line.item)
    }

    pub fn dependency_items(&self) -> impl Iterator<Item = &DependencyItem> {
        self.lines.iter().flat_map(|line| line.dependencies.iter())
    }

    pub fn find_line(&self, id: LineItemId) -> Option<&TicketLine> {
        self.lines.iter().find(|line| line.item.id == Some(id))
    }

    /// Package lines only
    pub fn package_lines(&self) -> impl Iterator<Item = &LineItem> {
        self.line_items().filter(|item| item.is_package())
    }
}

/// Line-item CRUD scoped to one connection or transaction
pub struct TicketLineStore<'a> {
    conn: &'a Connection,
    include_dependencies_in_total: bool,
}

impl<'a> TicketLineStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            include_dependencies_in_total: false,
        }
    }

    /// Whether dependency item prices count towards the ticket total
    pub fn with_dependencies_in_total(mut self, include: bool) -> Self {
        self.include_dependencies_in_total = include;
        self
    }

    /// Open a new, empty ticket
    pub fn create_ticket(&self, actor: ActorId, reference: Option<&str>) -> Result<Ticket> {
        let mut ticket = Ticket::new(reference.map(String::from));
        ticket.created_by = Some(actor);
        let id = ticket.insert(self.conn)?;
        debug!("Created ticket {} for actor {}", id, actor);
        Ticket::require(self.conn, id)
    }

    /// Load the ticket with every line and dependency
    pub fn load(&self, ticket_id: TicketId) -> Result<TicketAggregate> {
        let ticket = Ticket::require(self.conn, ticket_id)?;
        let items = LineItem::find_by_ticket(self.conn, ticket_id)?;
        let mut by_parent: HashMap<LineItemId, Vec<DependencyItem>> = HashMap::new();
        for dependency in DependencyItem::find_by_ticket(self.conn, ticket_id)? {
            by_parent
                .entry(dependency.parent_line_item_id)
                .or_default()
                .push(dependency);
        }

        let lines = items
            .into_iter()
            .map(|item| {
                let dependencies = item
                    .id
                    .and_then(|id| by_parent.remove(&id))
                    .unwrap_or_default();
                TicketLine { item, dependencies }
            })
            .collect();

        Ok(TicketAggregate { ticket, lines })
    }

    /// Current line items of a ticket, without dependencies
    pub fn line_items(&self, ticket_id: TicketId) -> Result<Vec<LineItem>> {
        Ticket::require(self.conn, ticket_id)?;
        LineItem::find_by_ticket(self.conn, ticket_id)
    }

    /// Add a standalone prestation
    pub fn add_prestation(
        &self,
        actor: ActorId,
        ticket_id: TicketId,
        prestation_id: PrestationId,
        price: i64,
        is_convention: bool,
    ) -> Result<LineItem> {
        Ticket::require(self.conn, ticket_id)?;

        let mut item = LineItem::prestation(ticket_id, prestation_id, price);
        item.is_convention = is_convention;
        item.created_by = Some(actor);
        item.insert(self.conn)?;

        self.recompute_total(ticket_id)?;
        Ok(item)
    }

    /// Add a whole package as one line priced at the bundle price
    pub fn add_package(&self, actor: ActorId, ticket_id: TicketId, package: &Package) -> Result<LineItem> {
        Ticket::require(self.conn, ticket_id)?;
        let package_id = package
            .id
            .ok_or_else(|| Error::InvalidLineItem(format!("package '{}' has no ID", package.name)))?;

        let mut item = LineItem::package(ticket_id, package_id, package.price);
        item.created_by = Some(actor);
        item.insert(self.conn)?;

        self.recompute_total(ticket_id)?;
        Ok(item)
    }

    /// Attach a dependency item to a line of this ticket
    pub fn add_dependency(
        &self,
        ticket_id: TicketId,
        parent_line_item_id: LineItemId,
        dependent_prestation_id: PrestationId,
        price: i64,
    ) -> Result<DependencyItem> {
        self.require_owned(ticket_id, parent_line_item_id)?;

        let mut dependency = DependencyItem::new(parent_line_item_id, dependent_prestation_id, price);
        dependency.insert(self.conn)?;

        self.recompute_total(ticket_id)?;
        Ok(dependency)
    }

    /// Reprice a line item of this ticket
    pub fn update_line_item_price(
        &self,
        ticket_id: TicketId,
        line_item_id: LineItemId,
        base_price: i64,
        final_price: i64,
    ) -> Result<()> {
        self.require_owned(ticket_id, line_item_id)?;
        LineItem::update_prices(self.conn, line_item_id, base_price, final_price)?;
        self.recompute_total(ticket_id)?;
        Ok(())
    }

    /// Remove a line item of this ticket; its dependencies go with it
    pub fn remove_line_item(&self, ticket_id: TicketId, line_item_id: LineItemId) -> Result<()> {
        self.require_owned(ticket_id, line_item_id)?;
        let dropped = DependencyItem::delete_by_parent(self.conn, line_item_id)?;
        LineItem::delete(self.conn, line_item_id)?;
        debug!(
            "Removed line item {} from ticket {} ({} dependencies)",
            line_item_id, ticket_id, dropped
        );
        self.recompute_total(ticket_id)?;
        Ok(())
    }

    /// Recompute and persist the ticket total from its rows
    pub fn recompute_total(&self, ticket_id: TicketId) -> Result<i64> {
        let mut total = LineItem::sum_final_prices(self.conn, ticket_id)?;
        if self.include_dependencies_in_total {
            total += DependencyItem::sum_final_prices(self.conn, ticket_id)?;
        }
        Ticket::set_total(self.conn, ticket_id, total)?;
        Ok(total)
    }

    /// Load a line item and check that it belongs to `ticket_id`
    fn require_owned(&self, ticket_id: TicketId, line_item_id: LineItemId) -> Result<LineItem> {
        let item = LineItem::find_by_id(self.conn, line_item_id)?
            .ok_or_else(|| Error::NotFound(format!("line item {line_item_id}")))?;
        if item.ticket_id != ticket_id {
            return Err(Error::InvalidLineItem(format!(
                "line item {line_item_id} belongs to ticket {}, not {ticket_id}",
                item.ticket_id
            )));
        }
        Ok(item)
    }
}
