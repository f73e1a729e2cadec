//! Discarding results of superseded requests.
//!
//! Requests are not cancelled at the transport level; each one takes a ticket
//! from a monotonically increasing counter, and a result is accepted only if
//! its ticket is still the latest issued.

use std::sync::atomic::{AtomicU64, Ordering};

/// Ticket identifying one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTicket(u64);

impl RequestTicket {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct RequestSequencer {
    pending: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new ticket, superseding every earlier one.
    pub fn begin(&self) -> RequestTicket {
        RequestTicket(self.pending.fetch_add(1, Ordering::SeqCst).saturating_add(1))
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.pending.load(Ordering::SeqCst) == ticket.0
    }

    /// Returns `value` only when `ticket` is still the latest request.
    pub fn accept<T>(&self, ticket: RequestTicket, value: T) -> Option<T> {
        self.is_current(ticket).then_some(value)
    }
}
