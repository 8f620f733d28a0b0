//! Black-box collaborator interfaces for the CertShare ledger.
//!
//! The range-ledger engine coordinates with three kinds of external
//! collaborators, all consumed behind the traits defined here:
//! - the issuing entity's **compliance oracle**, which authorizes
//!   transfers and supplies identity metadata,
//! - optional tag-scoped **policy hooks**,
//! - **custodian** contracts notified when tokens enter their custody.

pub mod custodian;
pub mod error;
pub mod hooks;
pub mod oracle;

pub use custodian::CustodianHandler;
pub use error::ComplianceError;
pub use hooks::{HookCall, HookPoint, HookRegistry, PolicyHook};
pub use oracle::{ComplianceOracle, TransferAuthority};
