//! Nullable custodian — records received transfers, answers with a
//! scripted verdict.

use std::sync::{Arc, Mutex};

use cert_compliance::CustodianHandler;
use cert_types::Address;

#[derive(Default)]
struct Inner {
    accept: bool,
    received: Vec<(Address, u64)>,
}

/// Custodian double. Clones share state, so tests can keep a handle
/// while the ledger owns the boxed handler.
#[derive(Clone)]
pub struct NullCustodian {
    inner: Arc<Mutex<Inner>>,
}

impl NullCustodian {
    pub fn accepting() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                accept: true,
                received: Vec::new(),
            })),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                accept: false,
                received: Vec::new(),
            })),
        }
    }

    pub fn received(&self) -> Vec<(Address, u64)> {
        self.inner
            .lock()
            .expect("custodian state poisoned")
            .received
            .clone()
    }
}

impl CustodianHandler for NullCustodian {
    fn receive_transfer(&mut self, beneficiary: Address, value: u64) -> bool {
        let mut inner = self.inner.lock().expect("custodian state poisoned");
        let accept = inner.accept;
        if accept {
            inner.received.push((beneficiary, value));
        }
        accept
    }
}
