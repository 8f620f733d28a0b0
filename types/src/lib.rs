//! Fundamental types for the CertShare ledger.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: account addresses, range tags, member identifiers, timestamps,
//! and the token index-space constants.

pub mod address;
pub mod id;
pub mod index;
pub mod tag;
pub mod time;

pub use address::Address;
pub use id::MemberId;
pub use index::{MAX_TOKEN_VALUE, MAX_UPPER_BOUND};
pub use tag::Tag;
pub use time::Timestamp;
