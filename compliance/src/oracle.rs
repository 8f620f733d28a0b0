//! Compliance oracle interface.

use serde::{Deserialize, Serialize};

use cert_types::{Address, MemberId};

use crate::error::ComplianceError;

/// Identity metadata the oracle returns for the two transfer parties.
///
/// Index `0` is the sender side, index `1` the recipient side. A rating
/// of `0` marks a custodian rather than an investor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferAuthority {
    /// Member id of the authority the oracle attributed the call to.
    pub auth_id: MemberId,
    /// Member ids of sender and recipient.
    pub member_ids: [MemberId; 2],
    /// Investor ratings; `0` marks a custodian.
    pub ratings: [u8; 2],
    /// ISO country codes of sender and recipient.
    pub countries: [u16; 2],
}

/// The issuing entity's compliance oracle.
///
/// `check_transfer` is a pure query. `transfer_tokens` records commit
/// intent and is called exactly once per state-changing transfer, before
/// any ledger mutation. Both may reject.
pub trait ComplianceOracle {
    fn check_transfer(
        &self,
        auth: Address,
        from: Address,
        to: Address,
        sender_will_be_zero: bool,
    ) -> Result<TransferAuthority, ComplianceError>;

    /// `zero_flags` carry four post-condition hints, in order: sender
    /// balance will be zero, recipient balance was zero, sender custodial
    /// balance will be zero, recipient custodial balance was zero.
    fn transfer_tokens(
        &mut self,
        auth: Address,
        from: Address,
        to: Address,
        zero_flags: [bool; 4],
    ) -> Result<TransferAuthority, ComplianceError>;
}
