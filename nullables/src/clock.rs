//! Nullable clock — injectable "now" for exercising time locks.
//!
//! The ledger never reads wall-clock time: every operation takes an
//! explicit `now`, and lock expiry happens lazily when that instant is
//! observed. Tests drive the injected value through a `NullClock` so
//! the lock boundaries (blocked one second before `time`, free at
//! `time` exactly) are explicit in the test body.

use std::cell::Cell;

use cert_types::Timestamp;

/// Deterministic time source for tests.
pub struct NullClock {
    current: Cell<Timestamp>,
}

impl NullClock {
    /// Start the clock at an arbitrary instant.
    pub fn starting_at(now: Timestamp) -> Self {
        Self {
            current: Cell::new(now),
        }
    }

    /// The instant to pass as `now` into ledger operations.
    pub fn now(&self) -> Timestamp {
        self.current.get()
    }

    /// Advance by a number of seconds.
    pub fn advance(&self, secs: u64) {
        self.current
            .set(Timestamp::new(self.current.get().as_secs() + secs));
    }

    /// Jump straight to an instant, typically a lock's release time.
    pub fn reach(&self, instant: Timestamp) {
        self.current.set(instant);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_and_reaches_lock_instants() {
        let clock = NullClock::starting_at(Timestamp::new(1000));
        assert_eq!(clock.now(), Timestamp::new(1000));

        clock.advance(500);
        assert_eq!(clock.now(), Timestamp::new(1500));

        let lock = Timestamp::new(5000);
        clock.reach(lock);
        assert!(lock.is_past(clock.now()));
    }
}
