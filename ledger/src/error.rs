//! Ledger operation errors.

use thiserror::Error;

use cert_compliance::ComplianceError;
use cert_types::Address;

/// Terminal failures of ledger operations.
///
/// Any error aborts the operation with no net state change; the one
/// exception is lazy expiry of elapsed time locks observed on the way,
/// which is idempotent and persists.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("index {0} is outside the allocated token space")]
    InvalidIndex(u64),

    #[error("value {0} does not fit the 48-bit amount space")]
    ValueTooLarge(u64),

    #[error("zero-value transfer")]
    ZeroValue,

    #[error("sender and recipient are the same account")]
    SelfTransfer,

    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u64, available: u64 },

    #[error("insufficient custodial balance: need {needed}, have {available}")]
    InsufficientCustodialBalance { needed: u64, available: u64 },

    #[error("insufficient allowance: need {needed}, have {available}")]
    InsufficientAllowance { needed: u64, available: u64 },

    #[error("time, custody and policy constraints leave too little transferable: need {needed}, found {found}")]
    InsufficientTransferable { needed: u64, found: u64 },

    #[error("range starting at {pointer} is time-locked until {until}")]
    TimeLocked { pointer: u64, until: u64 },

    #[error("custodian accounts cannot make explicit range transfers")]
    CustodianSendDisallowed,

    #[error("{caller} does not own the range starting at {pointer}")]
    NotOwner { caller: Address, pointer: u64 },

    #[error("policy hook rejected the operation")]
    PolicyRejected,

    #[error("compliance oracle rejected the transfer")]
    ComplianceRejected(#[from] ComplianceError),

    #[error("mint of {value} would push the upper bound past the index space")]
    UpperBoundExceeded { value: u64 },

    #[error("caller lacks authority for this operation")]
    PermissionDenied,

    #[error("range starting at {0} is held by a custodian")]
    RangeInCustody(u64),

    #[error("custodian {0} rejected the incoming transfer")]
    CustodianRejected(Address),

    #[error("range starting at {0} is unallocated")]
    UnallocatedRange(u64),
}
