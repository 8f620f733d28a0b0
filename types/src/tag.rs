//! Range classification tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 2-byte opaque classifier attached to every token range.
///
/// Tags route policy-hook scoping; the ledger itself never interprets
/// them, but ranges only merge when their tags match.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag([u8; 2]);

impl Tag {
    pub const ZERO: Self = Self([0u8; 2]);

    pub fn new(bytes: [u8; 2]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 2] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 2]
    }
}

impl From<u16> for Tag {
    fn from(raw: u16) -> Self {
        Self(raw.to_be_bytes())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag(0x{:02x}{:02x})", self.0[0], self.0[1])
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}{:02x}", self.0[0], self.0[1])
    }
}
