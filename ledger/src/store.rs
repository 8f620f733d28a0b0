//! Packed-range storage: the range map, the sparse pointer grid, and the
//! per-account balance-ranges index.
//!
//! The grid writes a range's start pointer at its first index, its last
//! index, and one interior marker per base-16 level — the largest
//! multiple of 16^k at or below the last index that is not also a
//! multiple of 16^(k+1). [`RangeStore::get_pointer`] walks right with an
//! escalating stride and is guaranteed to land on one of those markers,
//! giving O(log₁₆ N) locate without an ordered map. The price is a
//! handful of level-boundary writes on every split, merge, and mint.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use cert_types::{Address, Tag, Timestamp};

use crate::range::{AccountBalance, Range};

/// Base of the grid's level hierarchy.
const GRID_BASE: u64 = 16;

/// The packed-range store.
///
/// Live ranges (plus burned owner-zero holes) tile `[1, upper_bound]`
/// contiguously; `upper_bound` never decreases.
#[derive(Default, Serialize, Deserialize)]
pub struct RangeStore {
    /// Range descriptors keyed by start pointer.
    ranges: HashMap<u64, Range>,
    /// Sparse pointer grid over the 48-bit index space.
    grid: HashMap<u64, u64>,
    /// Per-account balances and range indexes.
    balances: HashMap<Address, AccountBalance>,
    /// Highest allocated index.
    upper_bound: u64,
}

impl RangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upper_bound(&self) -> u64 {
        self.upper_bound
    }

    pub(crate) fn set_upper_bound(&mut self, upper_bound: u64) {
        self.upper_bound = upper_bound;
    }

    /// Grid cell value at `i`; zero when unmarked.
    pub fn grid_at(&self, i: u64) -> u64 {
        self.grid.get(&i).copied().unwrap_or(0)
    }

    /// Whether a range (live or burned) starts exactly at `i`.
    pub fn is_range_start(&self, i: u64) -> bool {
        i != 0 && self.grid_at(i) == i
    }

    pub fn range(&self, pointer: u64) -> Option<&Range> {
        self.ranges.get(&pointer)
    }

    pub(crate) fn range_mut(&mut self, pointer: u64) -> Option<&mut Range> {
        self.ranges.get_mut(&pointer)
    }

    pub(crate) fn remove_range(&mut self, pointer: u64) -> Option<Range> {
        self.ranges.remove(&pointer)
    }

    pub fn balance(&self, addr: &Address) -> Option<&AccountBalance> {
        self.balances.get(addr)
    }

    pub(crate) fn balance_mut(&mut self, addr: Address) -> &mut AccountBalance {
        self.balances.entry(addr).or_default()
    }

    /// Locate the start pointer of the range enclosing `i`.
    ///
    /// Walks right from `i`, multiplying the stride by 16 at every level
    /// boundary; terminates on the marker at the enclosing range's last
    /// index or on an interior level marker. Precondition:
    /// `1 <= i <= upper_bound`.
    pub fn get_pointer(&self, i: u64) -> u64 {
        debug_assert!(i >= 1 && i <= self.upper_bound);
        let mut i = i;
        let mut increment = 1u64;
        loop {
            let cell = self.grid_at(i);
            if cell != 0 {
                return cell;
            }
            if i % (increment * GRID_BASE) == 0 {
                increment *= GRID_BASE;
            }
            i += increment;
        }
    }

    /// Write `value` into the grid cells marking `[start, stop)`: the
    /// start cell, the last cell, and one marker per 16^k level. Writing
    /// zero clears a range's markers ahead of a merge or rewrite.
    pub(crate) fn set_range_pointers(&mut self, start: u64, stop: u64, value: u64) {
        self.grid_write(start, value);
        let last = stop - 1;
        if start == last {
            return;
        }
        self.grid_write(last, value);
        let mut interval = GRID_BASE;
        loop {
            let i = last / interval * interval;
            if i == 0 {
                return;
            }
            interval *= GRID_BASE;
            // Marked at the next level up instead.
            if i % interval == 0 {
                continue;
            }
            if i > start {
                self.grid_write(i, value);
            }
        }
    }

    fn grid_write(&mut self, i: u64, value: u64) {
        if value == 0 {
            self.grid.remove(&i);
        } else {
            self.grid.insert(i, value);
        }
    }

    /// Upsert the descriptor for `[pointer, stop)` and rewrite its grid
    /// markers.
    pub(crate) fn set_range(
        &mut self,
        pointer: u64,
        owner: Address,
        stop: u64,
        time: Timestamp,
        tag: Tag,
        custodian: Address,
    ) {
        self.ranges.insert(
            pointer,
            Range {
                owner,
                stop,
                time,
                tag,
                custodian,
            },
        );
        self.set_range_pointers(pointer, stop, pointer);
    }

    /// Split the enclosing range at `split`, creating `[split, old_stop)`
    /// with inherited metadata and indexing it for the owner. No-op when
    /// a range already starts there.
    pub(crate) fn split_range(&mut self, split: u64) {
        if self.is_range_start(split) {
            return;
        }
        let pointer = self.get_pointer(split);
        let r = self
            .ranges
            .get(&pointer)
            .expect("pointer grid references a missing range")
            .clone();
        let old_stop = r.stop;
        if !r.owner.is_zero() {
            self.replace_in_balance_range(r.owner, 0, split);
        }
        self.set_range_pointers(pointer, old_stop, 0);
        if let Some(head) = self.ranges.get_mut(&pointer) {
            head.stop = split;
        }
        self.set_range_pointers(pointer, split, pointer);
        self.set_range(split, r.owner, old_stop, r.time, r.tag, r.custodian);
    }

    /// Whether the range at `pointer` is live and matches
    /// `(owner, time, tag, custodian)`. Lazily expires a past time lock
    /// on the compared range as a side effect.
    pub(crate) fn compare_ranges(
        &mut self,
        pointer: u64,
        owner: Address,
        time: Timestamp,
        tag: Tag,
        custodian: Address,
        now: Timestamp,
    ) -> bool {
        if pointer == 0 {
            return false;
        }
        let Some(r) = self.ranges.get_mut(&pointer) else {
            return false;
        };
        if !r.time.is_zero() && r.time.is_past(now) {
            r.time = Timestamp::EPOCH;
        }
        r.is_live() && r.owner == owner && r.time == time && r.tag == tag && r.custodian == custodian
    }

    /// Clear an expired time lock; `true` when the range at `pointer`
    /// carries no active time restriction.
    pub(crate) fn check_time(&mut self, pointer: u64, now: Timestamp) -> bool {
        let Some(r) = self.ranges.get_mut(&pointer) else {
            return false;
        };
        if r.time.is_zero() {
            return true;
        }
        if !r.time.is_past(now) {
            return false;
        }
        r.time = Timestamp::EPOCH;
        true
    }

    /// First-match replace in the owner's balance-ranges vector.
    ///
    /// `(old=X, new=0)` removes, `(old=0, new=Y)` fills a tombstone or
    /// appends, `(old=X, new=Y)` substitutes in place.
    pub(crate) fn replace_in_balance_range(&mut self, addr: Address, old: u64, new: u64) {
        let entry = self.balances.entry(addr).or_default();
        for slot in entry.ranges.iter_mut() {
            if *slot == old {
                *slot = new;
                return;
            }
        }
        if new != 0 {
            entry.ranges.push(new);
        }
    }

    /// Live `(start, stop)` pairs owned by an account, tombstones
    /// skipped.
    pub fn ranges_of(&self, addr: &Address) -> Vec<(u64, u64)> {
        match self.balances.get(addr) {
            Some(b) => b
                .live_ranges()
                .filter_map(|p| self.ranges.get(&p).map(|r| (p, r.stop)))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Merge the range at `pointer` into its left neighbor when owner and
    /// metadata match. Returns the surviving start pointer.
    pub(crate) fn try_merge_left(&mut self, pointer: u64, now: Timestamp) -> u64 {
        let Some(r) = self.ranges.get(&pointer) else {
            return pointer;
        };
        let (owner, stop, time, tag, custodian) = (r.owner, r.stop, r.time, r.tag, r.custodian);
        if pointer <= 1 {
            return pointer;
        }
        let prev = self.grid_at(pointer - 1);
        if !self.compare_ranges(prev, owner, time, tag, custodian, now) {
            return pointer;
        }
        self.set_range_pointers(prev, pointer, 0);
        self.set_range_pointers(pointer, stop, 0);
        self.remove_range(pointer);
        if !owner.is_zero() {
            self.replace_in_balance_range(owner, pointer, 0);
        }
        self.set_range(prev, owner, stop, time, tag, custodian);
        prev
    }

    /// Merge the right neighbor into the range at `pointer` when owner
    /// and metadata match.
    pub(crate) fn try_merge_right(&mut self, pointer: u64, now: Timestamp) {
        let Some(r) = self.ranges.get(&pointer) else {
            return;
        };
        let (owner, stop, time, tag, custodian) = (r.owner, r.stop, r.time, r.tag, r.custodian);
        if stop > self.upper_bound {
            return;
        }
        if !self.compare_ranges(stop, owner, time, tag, custodian, now) {
            return;
        }
        let next_stop = match self.ranges.get(&stop) {
            Some(next) => next.stop,
            None => return,
        };
        self.set_range_pointers(pointer, stop, 0);
        self.set_range_pointers(stop, next_stop, 0);
        self.remove_range(stop);
        if !owner.is_zero() {
            self.replace_in_balance_range(owner, stop, 0);
        }
        self.set_range(pointer, owner, next_stop, time, tag, custodian);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    /// Seed a store with one range `[1, stop)` and a matching upper bound.
    fn seeded(owner: Address, stop: u64) -> RangeStore {
        let mut store = RangeStore::new();
        store.set_range(1, owner, stop, Timestamp::EPOCH, Tag::ZERO, Address::ZERO);
        store.replace_in_balance_range(owner, 0, 1);
        store.set_upper_bound(stop - 1);
        store
    }

    #[test]
    fn get_pointer_finds_start_from_any_index() {
        let store = seeded(addr(1), 30_001);
        assert_eq!(store.get_pointer(1), 1);
        assert_eq!(store.get_pointer(2), 1);
        assert_eq!(store.get_pointer(16), 1);
        assert_eq!(store.get_pointer(4096), 1);
        assert_eq!(store.get_pointer(29_999), 1);
        assert_eq!(store.get_pointer(30_000), 1);
    }

    #[test]
    fn get_pointer_distinguishes_adjacent_ranges() {
        let mut store = seeded(addr(1), 10_001);
        store.set_range(10_001, addr(2), 20_001, Timestamp::EPOCH, Tag::ZERO, Address::ZERO);
        store.replace_in_balance_range(addr(2), 0, 10_001);
        store.set_upper_bound(20_000);

        assert_eq!(store.get_pointer(10_000), 1);
        assert_eq!(store.get_pointer(10_001), 10_001);
        assert_eq!(store.get_pointer(15_000), 10_001);
        assert_eq!(store.get_pointer(20_000), 10_001);
    }

    #[test]
    fn single_index_range_is_locatable() {
        let mut store = seeded(addr(1), 5);
        store.set_range(5, addr(2), 6, Timestamp::EPOCH, Tag::ZERO, Address::ZERO);
        store.set_upper_bound(5);
        assert_eq!(store.get_pointer(5), 5);
        assert_eq!(store.get_pointer(4), 1);
    }

    #[test]
    fn clearing_pointers_removes_exactly_the_written_cells() {
        let mut store = RangeStore::new();
        store.set_range_pointers(100, 10_000, 100);
        store.set_range_pointers(100, 10_000, 0);
        for i in 100..10_000 {
            assert_eq!(store.grid_at(i), 0, "stale marker at {i}");
        }
    }

    #[test]
    fn split_range_preserves_metadata_and_index() {
        let owner = addr(1);
        let mut store = seeded(owner, 101);
        store.split_range(41);

        assert_eq!(store.range(1).unwrap().stop, 41);
        let tail = store.range(41).unwrap();
        assert_eq!(tail.stop, 101);
        assert_eq!(tail.owner, owner);
        assert_eq!(store.get_pointer(40), 1);
        assert_eq!(store.get_pointer(41), 41);
        assert_eq!(store.get_pointer(100), 41);
        assert_eq!(store.ranges_of(&owner), vec![(1, 41), (41, 101)]);
    }

    #[test]
    fn split_at_existing_start_is_noop() {
        let owner = addr(1);
        let mut store = seeded(owner, 101);
        store.split_range(41);
        store.split_range(41);
        assert_eq!(store.ranges_of(&owner), vec![(1, 41), (41, 101)]);
    }

    #[test]
    fn merge_left_rejoins_equal_neighbors() {
        let owner = addr(1);
        let mut store = seeded(owner, 101);
        store.split_range(41);
        let survivor = store.try_merge_left(41, Timestamp::new(1000));

        assert_eq!(survivor, 1);
        assert_eq!(store.range(1).unwrap().stop, 101);
        assert!(store.range(41).is_none());
        assert_eq!(store.get_pointer(60), 1);
        assert_eq!(store.ranges_of(&owner), vec![(1, 101)]);
    }

    #[test]
    fn merge_right_rejoins_equal_neighbors() {
        let owner = addr(1);
        let mut store = seeded(owner, 101);
        store.split_range(41);
        store.try_merge_right(1, Timestamp::new(1000));

        assert_eq!(store.range(1).unwrap().stop, 101);
        assert!(store.range(41).is_none());
        assert_eq!(store.get_pointer(100), 1);
    }

    #[test]
    fn merge_refuses_differing_owner_or_tag() {
        let mut store = seeded(addr(1), 101);
        store.split_range(41);
        store.range_mut(41).unwrap().tag = Tag::from(0xBEEF);
        assert_eq!(store.try_merge_left(41, Timestamp::new(1000)), 41);

        store.range_mut(41).unwrap().tag = Tag::ZERO;
        store.range_mut(41).unwrap().owner = addr(2);
        assert_eq!(store.try_merge_left(41, Timestamp::new(1000)), 41);
    }

    #[test]
    fn compare_ranges_lazily_expires_past_locks() {
        let owner = addr(1);
        let mut store = seeded(owner, 101);
        store.range_mut(1).unwrap().time = Timestamp::new(500);

        let now = Timestamp::new(1000);
        assert!(store.compare_ranges(1, owner, Timestamp::EPOCH, Tag::ZERO, Address::ZERO, now));
        assert!(store.range(1).unwrap().time.is_zero());
    }

    #[test]
    fn check_time_blocks_future_and_clears_past() {
        let mut store = seeded(addr(1), 101);
        store.range_mut(1).unwrap().time = Timestamp::new(2000);

        assert!(!store.check_time(1, Timestamp::new(1000)));
        assert_eq!(store.range(1).unwrap().time, Timestamp::new(2000));

        assert!(store.check_time(1, Timestamp::new(2000)));
        assert!(store.range(1).unwrap().time.is_zero());
        assert!(store.check_time(1, Timestamp::new(1)));
    }

    #[test]
    fn replace_in_balance_range_semantics() {
        let owner = addr(1);
        let mut store = RangeStore::new();

        // append
        store.replace_in_balance_range(owner, 0, 7);
        store.replace_in_balance_range(owner, 0, 9);
        assert_eq!(store.balance(&owner).unwrap().ranges, vec![7, 9]);

        // substitute
        store.replace_in_balance_range(owner, 7, 11);
        assert_eq!(store.balance(&owner).unwrap().ranges, vec![11, 9]);

        // remove leaves a tombstone, next append reuses it
        store.replace_in_balance_range(owner, 9, 0);
        assert_eq!(store.balance(&owner).unwrap().ranges, vec![11, 0]);
        store.replace_in_balance_range(owner, 0, 13);
        assert_eq!(store.balance(&owner).unwrap().ranges, vec![11, 13]);
    }
}
