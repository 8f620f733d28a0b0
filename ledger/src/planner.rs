//! Transfer planner: selects which ranges satisfy a transfer.

use cert_compliance::{HookCall, TransferAuthority};
use cert_types::{Address, Timestamp};

use crate::engine::RangeLedger;
use crate::error::LedgerError;

impl RangeLedger {
    /// Select a prefix of `candidates` whose combined length covers
    /// `value`, honoring time locks, custodian scoping, and the
    /// per-range policy hook.
    ///
    /// Candidates are visited in their stored order — the insertion order
    /// of the owner's balance-ranges index — which gives plain transfers
    /// their oldest-ranges-first semantics. Tombstones are skipped;
    /// elapsed time locks are lazily cleared on observation.
    pub(crate) fn find_transferable(
        &mut self,
        auth: &TransferAuthority,
        cust: Address,
        from: Address,
        to: Address,
        value: u64,
        candidates: &[u64],
        now: Timestamp,
    ) -> Result<Vec<u64>, LedgerError> {
        let mut selected = Vec::new();
        let mut remaining = value;
        for &pointer in candidates {
            if pointer == 0 {
                continue;
            }
            if !self.store.check_time(pointer, now) {
                continue;
            }
            let Some(r) = self.store.range(pointer) else {
                continue;
            };
            if r.custodian != cust {
                continue;
            }
            let (stop, tag) = (r.stop, r.tag);
            let call = HookCall::CheckTransferRange {
                auth_id: auth.auth_id,
                member_ids: auth.member_ids,
                from,
                to,
                ratings: auth.ratings,
                countries: auth.countries,
                start: pointer,
                stop,
                tag,
            };
            if !self.hooks.check(&call) {
                continue;
            }
            selected.push(pointer);
            let length = stop - pointer;
            if length >= remaining {
                return Ok(selected);
            }
            remaining -= length;
        }
        Err(LedgerError::InsufficientTransferable {
            needed: value,
            found: value - remaining,
        })
    }

    /// Non-mutating admissibility probe mirroring [`find_transferable`]:
    /// elapsed time locks count as expired but are not cleared, and no
    /// range is touched. Gating hooks are still consulted.
    pub(crate) fn find_transferable_dry(
        &mut self,
        auth: &TransferAuthority,
        cust: Address,
        from: Address,
        to: Address,
        value: u64,
        candidates: &[u64],
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        let mut remaining = value;
        for &pointer in candidates {
            if pointer == 0 {
                continue;
            }
            let Some(r) = self.store.range(pointer) else {
                continue;
            };
            if !r.time.is_zero() && !r.time.is_past(now) {
                continue;
            }
            if r.custodian != cust {
                continue;
            }
            let (stop, tag) = (r.stop, r.tag);
            let call = HookCall::CheckTransferRange {
                auth_id: auth.auth_id,
                member_ids: auth.member_ids,
                from,
                to,
                ratings: auth.ratings,
                countries: auth.countries,
                start: pointer,
                stop,
                tag,
            };
            if !self.hooks.check(&call) {
                continue;
            }
            let length = stop - pointer;
            if length >= remaining {
                return Ok(());
            }
            remaining -= length;
        }
        Err(LedgerError::InsufficientTransferable {
            needed: value,
            found: value - remaining,
        })
    }
}
