//! Events emitted by ledger operations for subscribers.

use serde::{Deserialize, Serialize};

use cert_types::{Address, Tag, Timestamp};

/// Observable side effects of ledger operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// Fungible-style transfer total. Mint uses a zero `from`, burn a
    /// zero `to`.
    Transfer {
        from: Address,
        to: Address,
        value: u64,
    },
    /// Per-range delta committed by a transfer, mint, or burn.
    TransferRange {
        from: Address,
        to: Address,
        start: u64,
        stop: u64,
        amount: u64,
    },
    /// Range metadata applied by mint or a modify operation.
    RangeSet {
        tag: Tag,
        start: u64,
        stop: u64,
        time: Timestamp,
    },
}

/// Synchronous fan-out event bus for ledger events.
///
/// Listeners are invoked inline on the emitting thread; keep handlers
/// fast to avoid stalling ledger operations.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Box<dyn Fn(&LedgerEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&LedgerEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &LedgerEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }
}
