//! Error types for pool and store operations

use crate::account::AccountStatus;

/// Errors from the account store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("account not found: {0}")]
    NotFound(String),

    #[error("account already exists: {0}")]
    Duplicate(String),

    #[error("account {id} is {status}, not in use")]
    NotInUse { id: String, status: AccountStatus },

    #[error("store I/O error: {0}")]
    Io(String),

    #[error("store parse error: {0}")]
    Parse(String),
}

/// Errors from pool operations.
///
/// Every variant returned by `PoolManager::allocate` means the same thing to
/// the caller: no account right now. The variants only exist so logs and
/// metrics can tell exhaustion apart from upstream trouble.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("provisioning failed: {0}")]
    Provisioning(String),

    #[error("store inconsistency: {0}")]
    Inconsistent(String),

    #[error("account not found: {0}")]
    NotFound(String),

    #[error("account {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: AccountStatus,
        to: AccountStatus,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_names_both_states() {
        let err = Error::InvalidTransition {
            id: "acct-1".into(),
            from: AccountStatus::Cooldown,
            to: AccountStatus::Cooldown,
        };
        assert_eq!(
            err.to_string(),
            "account acct-1 cannot move from cooldown to cooldown"
        );
    }

    #[test]
    fn store_error_passes_through() {
        let err: Error = StoreError::Io("disk full".into()).into();
        assert_eq!(err.to_string(), "store I/O error: disk full");
    }
}
