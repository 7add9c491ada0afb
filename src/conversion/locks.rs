// src/conversion/locks.rs
//! Per-ticket in-process locks
//!
//! Serializes conversions of the same ticket within one process before they
//! reach the database, so two staff members converting the same ticket wait
//! on a mutex instead of a SQLite busy timeout. Different tickets never share
//! a lock. The database lock taken by the executor remains the authority
//! across processes.

use crate::ids::TicketId;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Registry of per-ticket mutexes
#[derive(Default)]
pub struct TicketLocks {
    /// Ticket -> mutex; entries are dropped once nobody holds them
    locks: DashMap<TicketId, Arc<Mutex<()>>>,
    /// Count of acquisitions that found the ticket already locked
    contended_count: AtomicU64,
}

impl TicketLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `ticket_id`
    pub fn with_ticket<T>(&self, ticket_id: TicketId, f: impl FnOnce() -> T) -> T {
        // Declared first so it drops last, after the mutex guard and the Arc
        let _prune = PruneOnDrop {
            locks: self,
            ticket_id,
        };
        // Clone the Arc so the shard guard is released before blocking
        let lock = self.locks.entry(ticket_id).or_default().value().clone();

        let _guard = match lock.try_lock() {
            Some(guard) => guard,
            None => {
                self.contended_count.fetch_add(1, Ordering::Relaxed);
                debug!("Waiting for ticket {} lock", ticket_id);
                lock.lock()
            }
        };

        f()
    }

    /// Tickets with a live registry entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// How many acquisitions had to wait for another holder
    pub fn contended_count(&self) -> u64 {
        self.contended_count.load(Ordering::Relaxed)
    }

    fn prune(&self, ticket_id: TicketId) {
        // Only the map holds the Arc: no holder and no waiter
        self.locks
            .remove_if(&ticket_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Prunes the registry entry when `with_ticket` returns or unwinds
struct PruneOnDrop<'a> {
    locks: &'a TicketLocks,
    ticket_id: TicketId,
}

impl Drop for PruneOnDrop<'_> {
    fn drop(&mut self) {
        self.locks.prune(self.ticket_id);
    }
}
