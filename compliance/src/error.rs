//! Compliance collaborator errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error("transfer rejected by compliance oracle: {0}")]
    Rejected(String),

    #[error("account {0} is not a registered member")]
    UnknownMember(String),
}
