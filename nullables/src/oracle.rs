//! Nullable compliance oracle — answers from a scripted member table.

use std::collections::HashMap;

use cert_compliance::{ComplianceError, ComplianceOracle, TransferAuthority};
use cert_types::{Address, MemberId};

/// Scripted member profile.
#[derive(Clone, Copy, Debug)]
pub struct MemberProfile {
    pub rating: u8,
    pub country: u16,
}

/// Oracle double answering from a scripted member table.
///
/// Unregistered addresses default to investor rating 1, country 0, with a
/// member id derived from the address. The zero address is never a
/// member. Specific `(from, to)` pairs can be scripted to reject.
pub struct NullOracle {
    members: HashMap<Address, MemberProfile>,
    rejects: Vec<(Address, Address)>,
    /// Recorded `transfer_tokens` commits: parties and zero flags.
    pub commits: Vec<((Address, Address), [bool; 4])>,
}

impl NullOracle {
    pub fn new() -> Self {
        Self {
            members: HashMap::new(),
            rejects: Vec::new(),
            commits: Vec::new(),
        }
    }

    /// Script a member profile (builder form).
    pub fn with_member(mut self, addr: Address, rating: u8, country: u16) -> Self {
        self.register(addr, rating, country);
        self
    }

    pub fn register(&mut self, addr: Address, rating: u8, country: u16) {
        self.members.insert(addr, MemberProfile { rating, country });
    }

    /// Script the oracle to reject transfers from `from` to `to`.
    pub fn reject_between(&mut self, from: Address, to: Address) {
        self.rejects.push((from, to));
    }

    fn profile(&self, addr: &Address) -> MemberProfile {
        self.members.get(addr).copied().unwrap_or(MemberProfile {
            rating: 1,
            country: 0,
        })
    }

    fn member_id(addr: &Address) -> MemberId {
        let mut bytes = [0u8; 32];
        bytes[..20].copy_from_slice(addr.as_bytes());
        MemberId::new(bytes)
    }

    fn authority(
        &self,
        auth: Address,
        from: Address,
        to: Address,
    ) -> Result<TransferAuthority, ComplianceError> {
        if from.is_zero() {
            return Err(ComplianceError::UnknownMember(from.to_string()));
        }
        if to.is_zero() {
            return Err(ComplianceError::UnknownMember(to.to_string()));
        }
        if self.rejects.contains(&(from, to)) {
            return Err(ComplianceError::Rejected(format!("{from} -> {to}")));
        }
        let from_profile = self.profile(&from);
        let to_profile = self.profile(&to);
        Ok(TransferAuthority {
            auth_id: Self::member_id(&auth),
            member_ids: [Self::member_id(&from), Self::member_id(&to)],
            ratings: [from_profile.rating, to_profile.rating],
            countries: [from_profile.country, to_profile.country],
        })
    }
}

impl Default for NullOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl ComplianceOracle for NullOracle {
    fn check_transfer(
        &self,
        auth: Address,
        from: Address,
        to: Address,
        _sender_will_be_zero: bool,
    ) -> Result<TransferAuthority, ComplianceError> {
        self.authority(auth, from, to)
    }

    fn transfer_tokens(
        &mut self,
        auth: Address,
        from: Address,
        to: Address,
        zero_flags: [bool; 4],
    ) -> Result<TransferAuthority, ComplianceError> {
        let result = self.authority(auth, from, to)?;
        self.commits.push(((from, to), zero_flags));
        Ok(result)
    }
}
