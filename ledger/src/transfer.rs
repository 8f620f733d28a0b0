//! Range commit routines: rewriting ownership of contiguous
//! sub-intervals while keeping the tiling, the pointer grid, and the
//! balance-ranges indexes intact.

use cert_compliance::HookCall;
use cert_types::{Address, Timestamp};

use crate::engine::RangeLedger;
use crate::events::LedgerEvent;

impl RangeLedger {
    /// Commit `value` across the planner's selected ranges: one
    /// fungible-style event, then per-range ownership rewrites in stored
    /// order. The planner guarantees the selection covers `value`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn transfer_multiple_ranges(
        &mut self,
        event_from: Address,
        event_to: Address,
        owner_from: Address,
        owner_to: Address,
        custodian: Address,
        value: u64,
        selected: &[u64],
        now: Timestamp,
    ) {
        self.events.emit(&LedgerEvent::Transfer {
            from: event_from,
            to: event_to,
            value,
        });
        let mut remaining = value;
        for &pointer in selected {
            let Some(r) = self.store.range(pointer) else {
                continue;
            };
            let (range_stop, tag) = (r.stop, r.tag);
            let stop = range_stop.min(pointer + remaining);
            self.transfer_single_range(
                pointer,
                owner_from,
                owner_to,
                pointer,
                stop,
                custodian,
                (event_from, event_to),
                now,
            );
            self.hooks.notify(&HookCall::TransferTokenRange {
                from: event_from,
                to: event_to,
                start: pointer,
                stop,
                tag,
            });
            remaining -= stop - pointer;
            if remaining == 0 {
                return;
            }
        }
        debug_assert_eq!(remaining, 0, "planner selection must cover the value");
    }

    /// Rewrite ownership of `[start, stop)` inside the enclosing range
    /// `[pointer, range_stop)`.
    ///
    /// The moved interval keeps its tag, drops its time lock, and takes
    /// `custodian`; residual slices keep the source metadata. Neighbors
    /// matching the moved interval's `(owner, time=0, tag, custodian)`
    /// are joined so the store stays canonical.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn transfer_single_range(
        &mut self,
        pointer: u64,
        from: Address,
        to: Address,
        start: u64,
        stop: u64,
        custodian: Address,
        parties: (Address, Address),
        now: Timestamp,
    ) {
        let r = self
            .store
            .range(pointer)
            .expect("commit on a missing range")
            .clone();
        let range_stop = r.stop;
        let tag = r.tag;
        let zero = Timestamp::EPOCH;

        self.events.emit(&LedgerEvent::TransferRange {
            from: parties.0,
            to: parties.1,
            start,
            stop,
            amount: stop - start,
        });
        tracing::trace!(start, stop, %to, "committing range transfer");

        let prev = if start > 1 { self.store.grid_at(start - 1) } else { 0 };

        if pointer == start && range_stop == stop {
            // Exact match: the whole range moves.
            let left = self.store.compare_ranges(prev, to, zero, tag, custodian, now);
            let right = stop <= self.store.upper_bound()
                && self.store.compare_ranges(stop, to, zero, tag, custodian, now);

            match (left, right) {
                (false, false) => {
                    if let Some(rm) = self.store.range_mut(pointer) {
                        rm.owner = to;
                        rm.time = zero;
                        rm.custodian = custodian;
                    }
                    if from != to {
                        self.store.replace_in_balance_range(from, start, 0);
                        self.store.replace_in_balance_range(to, 0, start);
                    }
                }
                (true, false) => {
                    self.store.set_range_pointers(pointer, stop, 0);
                    self.store.remove_range(pointer);
                    self.store.replace_in_balance_range(from, start, 0);
                    self.store.set_range(prev, to, stop, zero, tag, custodian);
                }
                (false, true) => {
                    let next_stop = self
                        .store
                        .range(stop)
                        .map(|n| n.stop)
                        .unwrap_or(stop);
                    self.store.set_range_pointers(stop, next_stop, 0);
                    self.store.remove_range(stop);
                    self.store.replace_in_balance_range(to, stop, start);
                    self.store.replace_in_balance_range(from, start, 0);
                    self.store.set_range(start, to, next_stop, zero, tag, custodian);
                }
                (true, true) => {
                    let next_stop = self
                        .store
                        .range(stop)
                        .map(|n| n.stop)
                        .unwrap_or(stop);
                    self.store.set_range_pointers(pointer, stop, 0);
                    self.store.set_range_pointers(stop, next_stop, 0);
                    self.store.remove_range(pointer);
                    self.store.remove_range(stop);
                    self.store.replace_in_balance_range(from, start, 0);
                    self.store.replace_in_balance_range(to, stop, 0);
                    self.store.set_range(prev, to, next_stop, zero, tag, custodian);
                }
            }
            return;
        }

        if pointer == start {
            // Left-aligned: a residual `[stop, range_stop)` stays behind.
            let left = self.store.compare_ranges(prev, to, zero, tag, custodian, now);
            self.store.set_range_pointers(pointer, range_stop, 0);
            if left {
                self.store.remove_range(pointer);
                self.store.set_range(prev, to, stop, zero, tag, custodian);
                self.store.replace_in_balance_range(from, start, stop);
            } else {
                self.store.set_range(start, to, stop, zero, tag, custodian);
                self.store.replace_in_balance_range(from, start, stop);
                self.store.replace_in_balance_range(to, 0, start);
            }
            self.store.set_range(stop, from, range_stop, r.time, tag, r.custodian);
            return;
        }

        if range_stop == stop {
            // Right-aligned: the original shrinks to `[pointer, start)`.
            let right = stop <= self.store.upper_bound()
                && self.store.compare_ranges(stop, to, zero, tag, custodian, now);
            self.store.set_range_pointers(pointer, range_stop, 0);
            self.store.set_range(pointer, from, start, r.time, tag, r.custodian);
            if right {
                let next_stop = self
                    .store
                    .range(stop)
                    .map(|n| n.stop)
                    .unwrap_or(stop);
                self.store.set_range_pointers(stop, next_stop, 0);
                self.store.remove_range(stop);
                self.store.set_range(start, to, next_stop, zero, tag, custodian);
                self.store.replace_in_balance_range(to, stop, start);
            } else {
                self.store.set_range(start, to, stop, zero, tag, custodian);
                self.store.replace_in_balance_range(to, 0, start);
            }
            return;
        }

        // Strictly interior: residuals on both sides keep the source
        // metadata, so no neighbor can match the moved interval.
        self.store.set_range_pointers(pointer, range_stop, 0);
        self.store.set_range(pointer, from, start, r.time, tag, r.custodian);
        self.store.set_range(start, to, stop, zero, tag, custodian);
        self.store.set_range(stop, from, range_stop, r.time, tag, r.custodian);
        self.store.replace_in_balance_range(to, 0, start);
        self.store.replace_in_balance_range(from, 0, stop);
    }
}
