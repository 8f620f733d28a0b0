//! Nullable policy hook — records every call, answers with a scripted
//! verdict.

use std::sync::{Arc, Mutex};

use cert_compliance::{HookCall, PolicyHook};

#[derive(Default)]
struct Inner {
    allow: bool,
    calls: Vec<HookCall>,
}

/// Hook double. Clones share state, so tests can keep a handle while the
/// registry owns the boxed hook.
#[derive(Clone)]
pub struct NullHook {
    inner: Arc<Mutex<Inner>>,
}

impl NullHook {
    pub fn allowing() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                allow: true,
                calls: Vec::new(),
            })),
        }
    }

    pub fn denying() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                allow: false,
                calls: Vec::new(),
            })),
        }
    }

    pub fn set_allow(&self, allow: bool) {
        self.inner.lock().expect("hook state poisoned").allow = allow;
    }

    pub fn calls(&self) -> Vec<HookCall> {
        self.inner.lock().expect("hook state poisoned").calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().expect("hook state poisoned").calls.len()
    }
}

impl PolicyHook for NullHook {
    fn on_call(&mut self, call: &HookCall) -> bool {
        let mut inner = self.inner.lock().expect("hook state poisoned");
        inner.calls.push(call.clone());
        inner.allow
    }
}
