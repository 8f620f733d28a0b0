//! Range descriptor and per-account balance entry.

use serde::{Deserialize, Serialize};

use cert_types::{Address, Tag, Timestamp};

/// A contiguous half-open interval `[start, stop)` of token indices held
/// by one owner with uniform metadata, keyed in the store by its start
/// pointer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    /// Beneficial owner; [`Address::ZERO`] marks a burned (unallocated)
    /// slot.
    pub owner: Address,
    /// Exclusive upper bound of the interval.
    pub stop: u64,
    /// Transfers are blocked until this instant; zero means unlocked.
    /// Expired locks are lazily zeroed on observation.
    pub time: Timestamp,
    /// Opaque classifier routing policy-hook scoping.
    pub tag: Tag,
    /// Custodian holding this range, or zero.
    pub custodian: Address,
}

impl Range {
    /// Whether this slot is owned rather than a burned hole.
    pub fn is_live(&self) -> bool {
        !self.owner.is_zero()
    }
}

/// Per-account balance entry: the un-custodied balance plus the
/// balance-ranges index — start pointers of every range the account
/// owns, with `0` tombstones left by in-place removals.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccountBalance {
    pub balance: u64,
    pub ranges: Vec<u64>,
}

impl AccountBalance {
    /// Live start pointers, skipping tombstones.
    pub fn live_ranges(&self) -> impl Iterator<Item = u64> + '_ {
        self.ranges.iter().copied().filter(|&p| p != 0)
    }
}
