//! Error types for provisioning operations

/// Errors from account provisioning.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to spawn provisioning command: {0}")]
    Spawn(String),

    #[error("provisioning command failed: {0}")]
    CommandFailed(String),

    #[error("provisioning request failed: {0}")]
    Http(String),

    #[error("provisioning credentials rejected: {0}")]
    Rejected(String),

    #[error("invalid provisioning response: {0}")]
    InvalidResponse(String),

    #[error("empty account id: {0}")]
    EmptyAccountId(String),
}

/// Result alias for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;
