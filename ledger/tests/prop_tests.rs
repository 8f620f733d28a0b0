//! Property tests for the range-ledger invariants: tiling of the index
//! space, balance identity, canonical form, grid agreement, round-trip
//! explicit transfers, time-lock expiry, and mint overflow.

use std::collections::HashMap;

use proptest::prelude::*;

use cert_ledger::{LedgerConfig, RangeLedger};
use cert_nullables::NullOracle;
use cert_types::{Address, Tag, Timestamp, MAX_UPPER_BOUND};

fn addr(n: u8) -> Address {
    Address::new([n; 20])
}

fn issuer() -> Address {
    addr(0xEE)
}

fn ledger() -> RangeLedger {
    RangeLedger::new(LedgerConfig::new(issuer()), Box::new(NullOracle::new()))
}

const ACCOUNTS: [u8; 4] = [1, 2, 3, 4];

fn account(seed: u8) -> Address {
    addr(ACCOUNTS[(seed as usize) % ACCOUNTS.len()])
}

#[derive(Clone, Debug)]
enum Op {
    Mint { owner: u8, value: u64, tag: u8 },
    Transfer { from: u8, to: u8, value: u64 },
    TransferRange { from: u8, to: u8, start: u64, len: u64 },
    Burn { start: u64, len: u64 },
    ModifyRanges { start: u64, len: u64, tag: u8 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..4, 1u64..64, 0u8..3).prop_map(|(owner, value, tag)| Op::Mint { owner, value, tag }),
        (0u8..4, 0u8..4, 1u64..96)
            .prop_map(|(from, to, value)| Op::Transfer { from, to, value }),
        (0u8..4, 0u8..4, 0u64..512, 1u64..48)
            .prop_map(|(from, to, start, len)| Op::TransferRange { from, to, start, len }),
        (0u64..512, 1u64..32).prop_map(|(start, len)| Op::Burn { start, len }),
        (0u64..512, 1u64..64, 0u8..3)
            .prop_map(|(start, len, tag)| Op::ModifyRanges { start, len, tag }),
    ]
}

/// Apply an op, mapping raw seeds into the currently allocated index
/// space. Rejected operations are fine; the invariants must hold either
/// way.
fn apply(l: &mut RangeLedger, op: &Op, now: Timestamp) {
    let ub = l.upper_bound();
    match op {
        Op::Mint { owner, value, tag } => {
            let _ = l.mint(
                issuer(),
                account(*owner),
                *value,
                Timestamp::EPOCH,
                Tag::from(*tag as u16),
                now,
            );
        }
        Op::Transfer { from, to, value } => {
            let _ = l.transfer_from(issuer(), account(*from), account(*to), *value, now);
        }
        Op::TransferRange { from, to, start, len } => {
            if ub == 0 {
                return;
            }
            let start = 1 + start % ub;
            let stop = (start + len).min(ub + 1);
            if stop <= start {
                return;
            }
            let _ = l.transfer_range(account(*from), account(*to), start, stop, now);
        }
        Op::Burn { start, len } => {
            if ub == 0 {
                return;
            }
            let start = 1 + start % ub;
            let stop = (start + len).min(ub + 1);
            if stop <= start {
                return;
            }
            let _ = l.burn(issuer(), start, stop);
        }
        Op::ModifyRanges { start, len, tag } => {
            if ub == 0 {
                return;
            }
            let start = 1 + start % ub;
            let stop = (start + len).min(ub + 1);
            if stop <= start {
                return;
            }
            let _ = l.modify_ranges(
                issuer(),
                start,
                stop,
                Timestamp::EPOCH,
                Tag::from(*tag as u16),
                now,
            );
        }
    }
}

/// Walk the whole index space and check every structural invariant.
///
/// `canonical` additionally asserts that no two adjacent live ranges
/// share `(owner, time, tag, custodian)` — valid whenever no time locks
/// are in play.
fn assert_invariants(l: &RangeLedger, canonical: bool) {
    let ub = l.upper_bound();
    let mut owned: HashMap<Address, u64> = HashMap::new();
    let mut starts: HashMap<Address, Vec<(u64, u64)>> = HashMap::new();
    let mut live_total = 0u64;
    let mut prev: Option<(u64, cert_ledger::Range)> = None;

    let mut i = 1u64;
    while i <= ub {
        let (start, r) = l.get_range(i).expect("tiling gap");
        assert_eq!(start, i, "range does not start at the walk position");
        assert!(r.stop > i && r.stop <= ub + 1, "range stop out of bounds");
        if r.is_live() {
            *owned.entry(r.owner).or_default() += r.stop - i;
            starts.entry(r.owner).or_default().push((i, r.stop));
            live_total += r.stop - i;
        }
        if canonical {
            if let Some((_, p)) = &prev {
                let adjacent_equal = p.is_live()
                    && r.is_live()
                    && p.owner == r.owner
                    && p.time == r.time
                    && p.tag == r.tag
                    && p.custodian == r.custodian;
                assert!(!adjacent_equal, "uncanonical neighbors at {i}");
            }
        }
        prev = Some((i, r.clone()));
        i = r.stop;
    }

    assert_eq!(live_total, l.total_supply(), "supply mismatch");

    for n in ACCOUNTS {
        let a = addr(n);
        let custodial: u64 = ACCOUNTS.iter().map(|c| l.custodial_balance_of(&a, &addr(*c))).sum();
        assert_eq!(
            l.balance_of(&a) + custodial,
            owned.get(&a).copied().unwrap_or(0),
            "balance identity broken for {a}"
        );

        let mut indexed = l.ranges_of(&a);
        indexed.sort_unstable();
        assert_eq!(
            indexed,
            starts.get(&a).cloned().unwrap_or_default(),
            "balance-ranges index out of sync for {a}"
        );
    }

    // Grid agreement: sampled lookups land inside their claimed range.
    let step = (ub / 64).max(1);
    let mut i = 1u64;
    while i <= ub {
        let p = l.pointer_of(i).expect("grid lookup failed");
        let (start, r) = l.get_range(p).expect("grid points at nothing");
        assert_eq!(start, p);
        assert!(p <= i && i < r.stop, "grid landed outside the range");
        i += step;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Random unlocked op sequences keep the tiling, balances, indexes,
    /// and canonical form intact after every step.
    #[test]
    fn random_ops_preserve_invariants(ops in proptest::collection::vec(op_strategy(), 1..24)) {
        let mut l = ledger();
        let now = Timestamp::new(1000);
        for op in &ops {
            apply(&mut l, op, now);
            assert_invariants(&l, true);
        }
    }

    /// An explicit range transfer followed by its inverse restores
    /// ranges and balances exactly.
    #[test]
    fn transfer_range_round_trip_restores_state(
        value in 10u64..200,
        cut in (0u64..200, 0u64..200),
    ) {
        let (a, b) = (addr(1), addr(2));
        let mut l = ledger();
        let now = Timestamp::new(1000);
        l.mint(issuer(), a, value, Timestamp::EPOCH, Tag::ZERO, now).unwrap();

        let start = 1 + cut.0 % value;
        let stop = (start + 1 + cut.1 % value).min(value + 1);
        prop_assume!(start < stop);

        l.transfer_range(a, b, start, stop, now).unwrap();
        l.transfer_range(b, a, start, stop, now).unwrap();

        prop_assert_eq!(l.ranges_of(&a), vec![(1, value + 1)]);
        prop_assert_eq!(l.ranges_of(&b), vec![]);
        prop_assert_eq!(l.balance_of(&a), value);
        prop_assert_eq!(l.balance_of(&b), 0);
        assert_invariants(&l, true);
    }

    /// A lock blocks strictly before its instant, unlocks at it, and the
    /// first unlocking observation clears the stored time for good.
    #[test]
    fn time_locks_expire_on_observation(
        lock in 2000u64..100_000,
        early in 1u64..1000,
    ) {
        let (a, b) = (addr(1), addr(2));
        let mut l = ledger();
        l.mint(issuer(), a, 100, Timestamp::new(lock), Tag::ZERO, Timestamp::new(1000)).unwrap();

        prop_assert!(l.transfer(a, b, 10, Timestamp::new(lock - early)).is_err());

        l.transfer(a, b, 10, Timestamp::new(lock)).unwrap();
        let (_, r) = l.get_range(50).unwrap();
        prop_assert!(r.time.is_zero());

        // Still transferable at an earlier "now": the lock is gone.
        l.transfer(a, b, 10, Timestamp::new(1)).unwrap();
    }

    /// Mint fails exactly when it would push the upper bound past the
    /// index space.
    #[test]
    fn mint_overflow_boundary(
        first in (MAX_UPPER_BOUND - 100)..=MAX_UPPER_BOUND,
        second in 1u64..200,
    ) {
        let mut l = ledger();
        let now = Timestamp::new(1000);
        l.mint(issuer(), addr(1), first, Timestamp::EPOCH, Tag::ZERO, now).unwrap();

        let result = l.mint(issuer(), addr(1), second, Timestamp::EPOCH, Tag::ZERO, now);
        if first + second > MAX_UPPER_BOUND {
            prop_assert!(result.is_err());
            prop_assert_eq!(l.upper_bound(), first);
        } else {
            prop_assert!(result.is_ok());
            prop_assert_eq!(l.upper_bound(), first + second);
        }
    }
}
