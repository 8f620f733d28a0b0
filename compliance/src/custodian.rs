//! Custodian callback interface.

use cert_types::Address;

/// A custodian contract holding token ranges on behalf of beneficial
/// owners.
///
/// When a transfer's destination is a custodian, the ledger credits the
/// custodial balance first and then invokes [`receive_transfer`]; a
/// `false` return aborts the transfer.
///
/// [`receive_transfer`]: CustodianHandler::receive_transfer
pub trait CustodianHandler {
    fn receive_transfer(&mut self, beneficiary: Address, value: u64) -> bool;
}
