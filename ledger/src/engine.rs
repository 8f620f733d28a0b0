//! The range-ledger engine: one handle owning all ledger state and
//! coordinating the injected collaborators.
//!
//! Every public operation is atomic: all fallible validation (bounds,
//! balances, oracle, hooks, planner) runs before the first balance write,
//! balance writes precede the custodian callback so the custodian
//! observes post-conditions, and range-structure commits are infallible
//! once the planner has returned. The only side effect that survives a
//! failed operation is lazy expiry of elapsed time locks.

use std::collections::{HashMap, HashSet};

use cert_compliance::{ComplianceOracle, CustodianHandler, HookCall, HookRegistry};
use cert_types::{Address, Tag, Timestamp, MAX_TOKEN_VALUE, MAX_UPPER_BOUND};

use crate::error::LedgerError;
use crate::events::{EventBus, LedgerEvent};
use crate::range::Range;
use crate::store::RangeStore;

/// Static engine configuration.
pub struct LedgerConfig {
    /// The issuing entity. Issuer-held ranges live at this address and
    /// issuer identity normalizes to it at every entry point.
    pub issuer: Address,
    /// Addresses besides the issuer that satisfy the authority predicate
    /// for mint, burn, and modify operations.
    pub controllers: HashSet<Address>,
}

impl LedgerConfig {
    pub fn new(issuer: Address) -> Self {
        Self {
            issuer,
            controllers: HashSet::new(),
        }
    }
}

/// The range-ledger engine.
pub struct RangeLedger {
    config: LedgerConfig,
    oracle: Box<dyn ComplianceOracle>,
    pub(crate) hooks: HookRegistry,
    custodians: HashMap<Address, Box<dyn CustodianHandler>>,
    pub(crate) events: EventBus,
    pub(crate) store: RangeStore,
    total_supply: u64,
    /// `(owner, spender)` → approved amount.
    allowances: HashMap<(Address, Address), u64>,
    /// `(beneficiary, custodian)` → amount held in custody.
    cust_balances: HashMap<(Address, Address), u64>,
}

impl RangeLedger {
    pub fn new(config: LedgerConfig, oracle: Box<dyn ComplianceOracle>) -> Self {
        Self {
            config,
            oracle,
            hooks: HookRegistry::new(),
            custodians: HashMap::new(),
            events: EventBus::new(),
            store: RangeStore::new(),
            total_supply: 0,
            allowances: HashMap::new(),
            cust_balances: HashMap::new(),
        }
    }

    // ── Wiring ──────────────────────────────────────────────────────────

    pub fn issuer(&self) -> Address {
        self.config.issuer
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    /// Register the callback handler for a custodian address. Transfers
    /// into an unregistered custodian are rejected.
    pub fn register_custodian(&mut self, custodian: Address, handler: Box<dyn CustodianHandler>) {
        self.custodians.insert(custodian, handler);
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&LedgerEvent) + Send + Sync>) {
        self.events.subscribe(listener);
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    pub fn upper_bound(&self) -> u64 {
        self.store.upper_bound()
    }

    /// Un-custodied balance of an account.
    pub fn balance_of(&self, addr: &Address) -> u64 {
        self.store.balance(addr).map_or(0, |b| b.balance)
    }

    /// Amount an account holds under a specific custodian.
    pub fn custodial_balance_of(&self, owner: &Address, custodian: &Address) -> u64 {
        self.cust_balances
            .get(&(*owner, *custodian))
            .copied()
            .unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> u64 {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    /// Live `(start, stop)` pairs owned by an account.
    pub fn ranges_of(&self, addr: &Address) -> Vec<(u64, u64)> {
        self.store.ranges_of(addr)
    }

    /// Start pointer of the range enclosing `index`.
    pub fn pointer_of(&self, index: u64) -> Result<u64, LedgerError> {
        if index == 0 || index > self.store.upper_bound() {
            return Err(LedgerError::InvalidIndex(index));
        }
        Ok(self.store.get_pointer(index))
    }

    /// The enclosing range of `index` with its start pointer.
    pub fn get_range(&self, index: u64) -> Result<(u64, Range), LedgerError> {
        let pointer = self.pointer_of(index)?;
        let range = self
            .store
            .range(pointer)
            .cloned()
            .ok_or(LedgerError::InvalidIndex(index))?;
        Ok((pointer, range))
    }

    /// Read-only access to the underlying store.
    pub fn store(&self) -> &RangeStore {
        &self.store
    }

    // ── Allowances ──────────────────────────────────────────────────────

    /// Approve `spender` to move up to `value` of the caller's tokens.
    pub fn approve(&mut self, caller: Address, spender: Address, value: u64) {
        if value == 0 {
            self.allowances.remove(&(caller, spender));
        } else {
            self.allowances.insert((caller, spender), value);
        }
    }

    // ── Supply operations ───────────────────────────────────────────────

    /// Mint `value` new tokens to `owner`, appended at the right edge of
    /// the index space. Joins the leftmost neighbor when owner and
    /// metadata match.
    pub fn mint(
        &mut self,
        caller: Address,
        owner: Address,
        value: u64,
        time: Timestamp,
        tag: Tag,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        if !self.is_authority(&caller) {
            return Err(LedgerError::PermissionDenied);
        }
        if value == 0 {
            return Err(LedgerError::ZeroValue);
        }
        if value > MAX_TOKEN_VALUE {
            return Err(LedgerError::ValueTooLarge(value));
        }
        let upper_bound = self.store.upper_bound();
        if upper_bound
            .checked_add(value)
            .map_or(true, |nb| nb > MAX_UPPER_BOUND)
        {
            return Err(LedgerError::UpperBoundExceeded { value });
        }
        let time = Self::normalize_time(time, now);

        // Called for effect: the oracle must permit issuer → owner.
        let zero_flags = [false, self.balance_of(&owner) == 0, false, false];
        self.oracle
            .transfer_tokens(caller, self.config.issuer, owner, zero_flags)?;

        let start = upper_bound + 1;
        let stop = start + value;
        let left = if upper_bound > 0 {
            self.store.grid_at(upper_bound)
        } else {
            0
        };
        if left != 0 && self.store.compare_ranges(left, owner, time, tag, Address::ZERO, now) {
            self.store.set_range_pointers(left, start, 0);
            self.store.set_range(left, owner, stop, time, tag, Address::ZERO);
        } else {
            self.store
                .set_range(start, owner, stop, time, tag, Address::ZERO);
            self.store.replace_in_balance_range(owner, 0, start);
        }
        self.store.balance_mut(owner).balance += value;
        self.total_supply += value;
        self.store.set_upper_bound(stop - 1);

        tracing::debug!(owner = %owner, value, start, stop, "minted token range");
        self.events.emit(&LedgerEvent::RangeSet { tag, start, stop, time });
        self.events.emit(&LedgerEvent::Transfer {
            from: Address::ZERO,
            to: caller,
            value,
        });
        self.events.emit(&LedgerEvent::TransferRange {
            from: Address::ZERO,
            to: caller,
            start,
            stop,
            amount: value,
        });
        Ok(())
    }

    /// Burn `[start, stop)`, which must lie within a single un-custodied
    /// owned range. The slot stays behind as an owner-zero hole and the
    /// upper bound never decreases.
    pub fn burn(&mut self, caller: Address, start: u64, stop: u64) -> Result<(), LedgerError> {
        if !self.is_authority(&caller) {
            return Err(LedgerError::PermissionDenied);
        }
        self.validate_span(start, stop)?;
        let pointer = self.store.get_pointer(stop - 1);
        if pointer > start {
            return Err(LedgerError::InvalidIndex(start));
        }
        let r = self
            .store
            .range(pointer)
            .cloned()
            .ok_or(LedgerError::InvalidIndex(pointer))?;
        if !r.is_live() {
            return Err(LedgerError::UnallocatedRange(pointer));
        }
        if !r.custodian.is_zero() {
            return Err(LedgerError::RangeInCustody(pointer));
        }

        if r.stop > stop {
            self.store.split_range(stop);
        }
        if pointer < start {
            self.store.split_range(start);
        }
        let value = stop - start;
        let owner = r.owner;
        self.store.replace_in_balance_range(owner, start, 0);
        self.store.balance_mut(owner).balance -= value;
        self.total_supply -= value;
        self.store
            .set_range(start, Address::ZERO, stop, Timestamp::EPOCH, Tag::ZERO, Address::ZERO);

        tracing::debug!(owner = %owner, start, stop, value, "burned token range");
        self.events.emit(&LedgerEvent::Transfer {
            from: owner,
            to: Address::ZERO,
            value,
        });
        self.events.emit(&LedgerEvent::TransferRange {
            from: owner,
            to: Address::ZERO,
            start,
            stop,
            amount: value,
        });
        Ok(())
    }

    // ── Metadata operations ─────────────────────────────────────────────

    /// Change `(time, tag)` of the range starting exactly at `pointer`,
    /// then re-canonicalize against both neighbors.
    pub fn modify_range(
        &mut self,
        caller: Address,
        pointer: u64,
        time: Timestamp,
        tag: Tag,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        if !self.is_authority(&caller) {
            return Err(LedgerError::PermissionDenied);
        }
        if pointer == 0 || pointer > self.store.upper_bound() || !self.store.is_range_start(pointer)
        {
            return Err(LedgerError::InvalidIndex(pointer));
        }
        let time = Self::normalize_time(time, now);
        let stop = match self.store.range(pointer) {
            Some(r) if r.is_live() => r.stop,
            Some(_) => return Err(LedgerError::UnallocatedRange(pointer)),
            None => return Err(LedgerError::InvalidIndex(pointer)),
        };
        if let Some(rm) = self.store.range_mut(pointer) {
            rm.time = time;
            rm.tag = tag;
        }
        self.events.emit(&LedgerEvent::RangeSet {
            tag,
            start: pointer,
            stop,
            time,
        });
        let survivor = self.store.try_merge_left(pointer, now);
        self.store.try_merge_right(survivor, now);
        Ok(())
    }

    /// Apply `(time, tag)` to every index in `[start, stop)`, splitting
    /// at the boundaries where metadata would differ and re-merging
    /// consecutive same-owner ranges afterwards.
    pub fn modify_ranges(
        &mut self,
        caller: Address,
        start: u64,
        stop: u64,
        time: Timestamp,
        tag: Tag,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        if !self.is_authority(&caller) {
            return Err(LedgerError::PermissionDenied);
        }
        self.validate_span(start, stop)?;
        let time = Self::normalize_time(time, now);

        if !self.store.is_range_start(start) {
            let p = self.store.get_pointer(start);
            let differs = self
                .store
                .range(p)
                .map_or(false, |r| r.time != time || r.tag != tag);
            if differs {
                self.store.split_range(start);
            }
        }
        if stop <= self.store.upper_bound() && !self.store.is_range_start(stop) {
            let p = self.store.get_pointer(stop);
            let differs = self
                .store
                .range(p)
                .map_or(false, |r| r.time != time || r.tag != tag);
            if differs {
                self.store.split_range(stop);
            }
        }

        let mut pointer = if self.store.is_range_start(start) {
            start
        } else {
            self.store.get_pointer(start)
        };
        let mut last = pointer;
        while pointer < stop {
            let Some(r) = self.store.range(pointer) else {
                break;
            };
            let next = r.stop;
            if r.is_live() {
                if let Some(rm) = self.store.range_mut(pointer) {
                    rm.time = time;
                    rm.tag = tag;
                }
                last = self.store.try_merge_left(pointer, now);
            }
            pointer = next;
        }
        self.store.try_merge_right(last, now);

        self.events.emit(&LedgerEvent::RangeSet { tag, start, stop, time });
        Ok(())
    }

    // ── Transfer entry points ───────────────────────────────────────────

    /// Transfer `value` from the caller to `to`.
    pub fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        value: u64,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        self.do_transfer(caller, caller, to, value, now)
    }

    /// Transfer `value` from `from` to `to` on the caller's authority.
    /// The allowance is debited only when the caller is neither the
    /// sender nor the issuer.
    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        value: u64,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        self.do_transfer(caller, from, to, value, now)
    }

    fn do_transfer(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        value: u64,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        if value == 0 {
            return Err(LedgerError::ZeroValue);
        }
        if value > MAX_TOKEN_VALUE {
            return Err(LedgerError::ValueTooLarge(value));
        }
        if from == to {
            return Err(LedgerError::SelfTransfer);
        }
        let issuer = self.config.issuer;

        let zero_flags = [
            self.balance_of(&from) == value,
            self.balance_of(&to) == 0,
            self.custodial_balance_of(&to, &from) == value,
            self.custodial_balance_of(&from, &to) == 0,
        ];
        let auth = self.oracle.transfer_tokens(caller, from, to, zero_flags)?;

        if caller != from && caller != issuer {
            let allowed = self.allowance(&from, &caller);
            if allowed < value {
                return Err(LedgerError::InsufficientAllowance {
                    needed: value,
                    available: allowed,
                });
            }
        }

        let sender_is_custodian = auth.ratings[0] == 0 && from != issuer;
        let recipient_is_custodian = auth.ratings[1] == 0 && to != issuer;

        if sender_is_custodian {
            let available = self.custodial_balance_of(&to, &from);
            if available < value {
                return Err(LedgerError::InsufficientCustodialBalance {
                    needed: value,
                    available,
                });
            }
        } else {
            let available = self.balance_of(&from);
            if available < value {
                return Err(LedgerError::InsufficientBalance {
                    needed: value,
                    available,
                });
            }
        }

        let call = HookCall::CheckTransfer {
            auth_id: auth.auth_id,
            member_ids: auth.member_ids,
            from,
            to,
            ratings: auth.ratings,
            countries: auth.countries,
            value,
        };
        if !self.hooks.check(&call) {
            return Err(LedgerError::PolicyRejected);
        }

        // A custodian sender moves the recipient's own tokens held under
        // it; everyone else moves their un-custodied ranges.
        let (range_owner, cust_ctx) = if sender_is_custodian {
            (to, from)
        } else {
            (from, Address::ZERO)
        };
        let candidates = self
            .store
            .balance(&range_owner)
            .map(|b| b.ranges.clone())
            .unwrap_or_default();
        let selected =
            self.find_transferable(&auth, cust_ctx, from, to, value, &candidates, now)?;

        let (owner_from, owner_to, new_custodian) = if sender_is_custodian {
            // Custody release: ownership stays with the beneficiary.
            (to, to, Address::ZERO)
        } else if recipient_is_custodian {
            // Into custody: ownership stays with the sender.
            (from, from, to)
        } else {
            (from, to, Address::ZERO)
        };

        // Balance writes precede the custodian callback.
        if sender_is_custodian {
            self.debit_custodial(to, from, value);
            self.credit_balance(to, value);
        } else {
            self.debit_balance(from, value);
            if recipient_is_custodian {
                self.credit_custodial(from, to, value);
            } else {
                self.credit_balance(to, value);
            }
        }

        if recipient_is_custodian {
            let accepted = match self.custodians.get_mut(&to) {
                Some(handler) => handler.receive_transfer(from, value),
                None => false,
            };
            if !accepted {
                self.credit_balance(from, value);
                self.debit_custodial(from, to, value);
                return Err(LedgerError::CustodianRejected(to));
            }
        }

        if caller != from && caller != issuer {
            if let Some(allowed) = self.allowances.get_mut(&(from, caller)) {
                *allowed -= value;
            }
        }

        self.transfer_multiple_ranges(
            from,
            to,
            owner_from,
            owner_to,
            new_custodian,
            value,
            &selected,
            now,
        );
        tracing::debug!(from = %from, to = %to, value, ranges = selected.len(), "transferred");
        Ok(())
    }

    /// Transfer the explicit index range `[start, stop)` from the caller
    /// to `to`. The span must lie within one un-custodied, unlocked range
    /// the caller owns, and neither party may be a custodian.
    pub fn transfer_range(
        &mut self,
        caller: Address,
        to: Address,
        start: u64,
        stop: u64,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        let from = caller;
        self.validate_span(start, stop)?;
        if from == to {
            return Err(LedgerError::SelfTransfer);
        }
        let value = stop - start;
        let issuer = self.config.issuer;

        let zero_flags = [
            self.balance_of(&from) == value,
            self.balance_of(&to) == 0,
            false,
            false,
        ];
        let auth = self.oracle.transfer_tokens(caller, from, to, zero_flags)?;
        if auth.ratings[0] == 0 && from != issuer {
            return Err(LedgerError::CustodianSendDisallowed);
        }
        if auth.ratings[1] == 0 && to != issuer {
            return Err(LedgerError::CustodianSendDisallowed);
        }

        let pointer = self.store.get_pointer(stop - 1);
        if pointer > start {
            return Err(LedgerError::InvalidIndex(start));
        }
        let r = self
            .store
            .range(pointer)
            .cloned()
            .ok_or(LedgerError::InvalidIndex(pointer))?;
        if !r.is_live() {
            return Err(LedgerError::UnallocatedRange(pointer));
        }
        if r.owner != from {
            return Err(LedgerError::NotOwner {
                caller: from,
                pointer,
            });
        }
        if !r.custodian.is_zero() {
            return Err(LedgerError::RangeInCustody(pointer));
        }
        if !self.store.check_time(pointer, now) {
            return Err(LedgerError::TimeLocked {
                pointer,
                until: r.time.as_secs(),
            });
        }
        let call = HookCall::CheckRangeTransfer {
            from,
            to,
            start,
            stop,
            tag: r.tag,
        };
        if !self.hooks.check(&call) {
            return Err(LedgerError::PolicyRejected);
        }

        self.debit_balance(from, value);
        self.credit_balance(to, value);
        self.events.emit(&LedgerEvent::Transfer { from, to, value });
        self.transfer_single_range(pointer, from, to, start, stop, Address::ZERO, (from, to), now);
        tracing::debug!(from = %from, to = %to, start, stop, "transferred explicit range");
        Ok(())
    }

    /// Move beneficial ownership of `value` tokens between two accounts
    /// held under the calling custodian. The ranges keep their custodian;
    /// only custodial balances shift.
    pub fn transfer_custodian(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        value: u64,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        if value == 0 {
            return Err(LedgerError::ZeroValue);
        }
        if value > MAX_TOKEN_VALUE {
            return Err(LedgerError::ValueTooLarge(value));
        }
        if from == to {
            return Err(LedgerError::SelfTransfer);
        }
        if !self.custodians.contains_key(&caller) {
            return Err(LedgerError::PermissionDenied);
        }

        let zero_flags = [
            false,
            false,
            self.custodial_balance_of(&from, &caller) == value,
            self.custodial_balance_of(&to, &caller) == 0,
        ];
        let auth = self.oracle.transfer_tokens(caller, from, to, zero_flags)?;

        let available = self.custodial_balance_of(&from, &caller);
        if available < value {
            return Err(LedgerError::InsufficientCustodialBalance {
                needed: value,
                available,
            });
        }
        let call = HookCall::TransferTokensCustodian {
            custodian: caller,
            from,
            to,
            value,
        };
        if !self.hooks.check(&call) {
            return Err(LedgerError::PolicyRejected);
        }

        let candidates = self
            .store
            .balance(&from)
            .map(|b| b.ranges.clone())
            .unwrap_or_default();
        let selected = self.find_transferable(&auth, caller, from, to, value, &candidates, now)?;

        self.debit_custodial(from, caller, value);
        self.credit_custodial(to, caller, value);
        self.transfer_multiple_ranges(from, to, from, to, caller, value, &selected, now);
        tracing::debug!(custodian = %caller, from = %from, to = %to, value, "custodian internal transfer");
        Ok(())
    }

    /// Non-mutating transfer admissibility probe: runs the pure oracle
    /// query and a dry planner pass. Elapsed time locks count as expired
    /// but are not cleared.
    pub fn check_transfer(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        value: u64,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        if value == 0 {
            return Err(LedgerError::ZeroValue);
        }
        if value > MAX_TOKEN_VALUE {
            return Err(LedgerError::ValueTooLarge(value));
        }
        if from == to {
            return Err(LedgerError::SelfTransfer);
        }
        let issuer = self.config.issuer;
        let auth = self
            .oracle
            .check_transfer(caller, from, to, self.balance_of(&from) == value)?;

        let sender_is_custodian = auth.ratings[0] == 0 && from != issuer;
        if sender_is_custodian {
            let available = self.custodial_balance_of(&to, &from);
            if available < value {
                return Err(LedgerError::InsufficientCustodialBalance {
                    needed: value,
                    available,
                });
            }
        } else {
            let available = self.balance_of(&from);
            if available < value {
                return Err(LedgerError::InsufficientBalance {
                    needed: value,
                    available,
                });
            }
        }

        let (range_owner, cust_ctx) = if sender_is_custodian {
            (to, from)
        } else {
            (from, Address::ZERO)
        };
        let candidates = self
            .store
            .balance(&range_owner)
            .map(|b| b.ranges.clone())
            .unwrap_or_default();
        self.find_transferable_dry(&auth, cust_ctx, from, to, value, &candidates, now)
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn is_authority(&self, caller: &Address) -> bool {
        *caller == self.config.issuer || self.config.controllers.contains(caller)
    }

    fn validate_span(&self, start: u64, stop: u64) -> Result<(), LedgerError> {
        if start == 0 {
            return Err(LedgerError::InvalidIndex(start));
        }
        if stop <= start {
            return Err(LedgerError::InvalidIndex(stop));
        }
        if stop > self.store.upper_bound() + 1 {
            return Err(LedgerError::InvalidIndex(stop));
        }
        Ok(())
    }

    /// A lock instant already reached is indistinguishable from "no
    /// restriction" under lazy expiry; normalize it at the boundary.
    fn normalize_time(time: Timestamp, now: Timestamp) -> Timestamp {
        if !time.is_zero() && time.is_past(now) {
            Timestamp::EPOCH
        } else {
            time
        }
    }

    fn credit_balance(&mut self, addr: Address, value: u64) {
        self.store.balance_mut(addr).balance += value;
    }

    fn debit_balance(&mut self, addr: Address, value: u64) {
        self.store.balance_mut(addr).balance -= value;
    }

    fn credit_custodial(&mut self, owner: Address, custodian: Address, value: u64) {
        *self.cust_balances.entry((owner, custodian)).or_insert(0) += value;
    }

    fn debit_custodial(&mut self, owner: Address, custodian: Address, value: u64) {
        if let Some(held) = self.cust_balances.get_mut(&(owner, custodian)) {
            *held -= value;
            if *held == 0 {
                self.cust_balances.remove(&(owner, custodian));
            }
        }
    }
}
