//! Provisioning backends for pooled randomness accounts
//!
//! Defines the `Provisioner` trait that decouples the pool from how a backing
//! account is actually created. The pool only needs one capability: create
//! exactly one new account and hand back its identifier.
//!
//! Two backends ship with the crate:
//! - `CommandProvisioner` runs an external program (e.g. a Node script that
//!   talks to the randomness network) and reads the account id from stdout
//! - `HttpProvisioner` POSTs to a provisioning endpoint and reads the id from
//!   the JSON response

pub mod api_key;
pub mod command;
pub mod error;
pub mod http;

pub use api_key::ApiKey;
pub use command::CommandProvisioner;
pub use error::{Error, Result};
pub use http::HttpProvisioner;

use std::future::Future;
use std::pin::Pin;

/// Creates backing accounts for the pool.
///
/// Calls are assumed to be rate-limited upstream and may fail transiently.
/// Implementations must never report success without an identifier.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Provisioner>`).
pub trait Provisioner: Send + Sync {
    /// Backend label for logging and metrics (e.g. "command", "http")
    fn id(&self) -> &str;

    /// Create exactly one new backing account and return its identifier.
    fn create_account(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;
}

/// Normalize an identifier reported by a backend.
///
/// Trims surrounding whitespace; an empty result is an error.
pub(crate) fn normalize_account_id(raw: &str) -> Result<String> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(Error::EmptyAccountId(
            "provisioner returned an empty account id".into(),
        ));
    }
    Ok(id.to_owned())
}
