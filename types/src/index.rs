//! Token index-space constants.
//!
//! Token indices are 48-bit unsigned integers carried in `u64`. Index `0`
//! is reserved as the null-pointer sentinel, so valid allocated indices
//! lie in `[1, MAX_UPPER_BOUND]`.

/// Highest index the ledger may ever allocate (`2^48 - 2`).
pub const MAX_UPPER_BOUND: u64 = (1 << 48) - 2;

/// Largest amount a single transfer may carry (`2^48 - 1`).
pub const MAX_TOKEN_VALUE: u64 = (1 << 48) - 1;
