//! Durable record of pooled accounts
//!
//! `AccountStore` is the narrow capability the pool manager needs. It does not
//! enforce lifecycle rules; the pool manager does. It only guarantees that a
//! single record update is atomic.
//!
//! `JsonStore` keeps every account in memory behind a tokio Mutex and, when
//! given a path, persists the whole set after each mutation using an atomic
//! temp-file + rename write. Without a path it is a purely in-memory store.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::account::{AccountStatus, PooledAccount};
use crate::error::{StoreError, StoreResult};

/// Boxed future returned by store methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Query/mutate operations over the set of pooled accounts.
///
/// Mutations on an unknown id fail with `StoreError::NotFound`.
/// Uses boxed futures for dyn-compatibility (`Arc<dyn AccountStore>`).
pub trait AccountStore: Send + Sync {
    /// Any one Available account. Which one is unspecified.
    fn get_one_available(&self) -> StoreFuture<'_, Option<PooledAccount>>;

    fn get<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<PooledAccount>>;

    /// Set status to InUse and stamp `last_used_at`.
    fn mark_in_use<'a>(&'a self, id: &'a str, at: u64) -> StoreFuture<'a, ()>;

    /// Move an InUse account to Cooldown until the given unix millisecond
    /// timestamp. The status check and the write are one atomic update; any
    /// other current status fails with `NotInUse` and changes nothing.
    fn mark_cooldown<'a>(&'a self, id: &'a str, until: u64) -> StoreFuture<'a, ()>;

    fn total_count(&self) -> StoreFuture<'_, usize>;

    fn count_by_status(&self, status: AccountStatus) -> StoreFuture<'_, usize>;

    /// Insert a new account. Fails with `Duplicate` if the id already exists.
    fn create(&self, account: PooledAccount) -> StoreFuture<'_, ()>;

    /// Every Cooldown account whose `cooldown_until <= now`.
    fn get_cooldown_expired(&self, now: u64) -> StoreFuture<'_, Vec<PooledAccount>>;

    /// Set status directly. Leaving Cooldown clears `cooldown_until`.
    fn update_status<'a>(&'a self, id: &'a str, status: AccountStatus) -> StoreFuture<'a, ()>;
}

/// Account store backed by an in-memory map, optionally persisted as JSON.
pub struct JsonStore {
    path: Option<PathBuf>,
    state: Mutex<HashMap<String, PooledAccount>>,
}

impl JsonStore {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Load accounts from the given file path.
    ///
    /// If the file doesn't exist, creates it as `[]` (cold start with zero
    /// accounts). Accounts keep whatever status they were persisted with.
    pub async fn load(path: PathBuf) -> StoreResult<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| StoreError::Io(format!("reading account file: {e}")))?;
            let accounts: Vec<PooledAccount> = serde_json::from_str(&contents)
                .map_err(|e| StoreError::Parse(format!("parsing account file: {e}")))?;

            let mut state = HashMap::with_capacity(accounts.len());
            for account in accounts {
                let id = account.id.clone();
                if state.insert(id.clone(), account).is_some() {
                    return Err(StoreError::Parse(format!(
                        "account file lists {id} more than once"
                    )));
                }
            }
            info!(path = %path.display(), accounts = state.len(), "loaded pool accounts");
            state
        } else {
            info!(path = %path.display(), "account file not found, starting with empty pool");
            let state = HashMap::new();
            write_atomic(&path, &state).await?;
            state
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// Apply `mutate` to a copy of the state, persist it, then commit.
    ///
    /// The in-memory state only changes once the file write succeeded, so a
    /// failed write never leaves memory and disk disagreeing.
    async fn update<T>(
        &self,
        mutate: impl FnOnce(&mut HashMap<String, PooledAccount>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut state = self.state.lock().await;
        match &self.path {
            Some(path) => {
                let mut next = (*state).clone();
                let out = mutate(&mut next)?;
                write_atomic(path, &next).await?;
                *state = next;
                Ok(out)
            }
            None => mutate(&mut *state),
        }
    }
}

impl AccountStore for JsonStore {
    fn get_one_available(&self) -> StoreFuture<'_, Option<PooledAccount>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .values()
                .find(|a| a.status == AccountStatus::Available)
                .cloned())
        })
    }

    fn get<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<PooledAccount>> {
        Box::pin(async move { Ok(self.state.lock().await.get(id).cloned()) })
    }

    fn mark_in_use<'a>(&'a self, id: &'a str, at: u64) -> StoreFuture<'a, ()> {
        Box::pin(self.update(move |state| {
            let account = lookup(state, id)?;
            account.status = AccountStatus::InUse;
            account.last_used_at = Some(at);
            account.cooldown_until = None;
            debug!(account_id = id, "marked in use");
            Ok(())
        }))
    }

    fn mark_cooldown<'a>(&'a self, id: &'a str, until: u64) -> StoreFuture<'a, ()> {
        Box::pin(self.update(move |state| {
            let account = lookup(state, id)?;
            if account.status != AccountStatus::InUse {
                return Err(StoreError::NotInUse {
                    id: id.to_string(),
                    status: account.status,
                });
            }
            account.status = AccountStatus::Cooldown;
            account.cooldown_until = Some(until);
            debug!(account_id = id, until, "marked cooldown");
            Ok(())
        }))
    }

    fn total_count(&self) -> StoreFuture<'_, usize> {
        Box::pin(async move { Ok(self.state.lock().await.len()) })
    }

    fn count_by_status(&self, status: AccountStatus) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.values().filter(|a| a.status == status).count())
        })
    }

    fn create(&self, account: PooledAccount) -> StoreFuture<'_, ()> {
        Box::pin(self.update(move |state| {
            if state.contains_key(&account.id) {
                return Err(StoreError::Duplicate(account.id));
            }
            debug!(account_id = %account.id, "created account record");
            state.insert(account.id.clone(), account);
            Ok(())
        }))
    }

    fn get_cooldown_expired(&self, now: u64) -> StoreFuture<'_, Vec<PooledAccount>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .values()
                .filter(|a| a.is_cooldown_expired(now))
                .cloned()
                .collect())
        })
    }

    fn update_status<'a>(&'a self, id: &'a str, status: AccountStatus) -> StoreFuture<'a, ()> {
        Box::pin(self.update(move |state| {
            let account = lookup(state, id)?;
            account.status = status;
            if status != AccountStatus::Cooldown {
                account.cooldown_until = None;
            }
            debug!(account_id = id, status = status.label(), "updated status");
            Ok(())
        }))
    }
}

fn lookup<'a>(
    state: &'a mut HashMap<String, PooledAccount>,
    id: &str,
) -> StoreResult<&'a mut PooledAccount> {
    state
        .get_mut(id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
}

/// Write accounts to a file atomically.
///
/// Accounts are written as a JSON array ordered by creation time so the file
/// diffs cleanly. Writes go to a temporary file in the same directory which is
/// then renamed over the target. Permissions are 0600 on unix.
async fn write_atomic(path: &Path, data: &HashMap<String, PooledAccount>) -> StoreResult<()> {
    let mut accounts: Vec<&PooledAccount> = data.values().collect();
    accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

    let json = serde_json::to_string_pretty(&accounts)
        .map_err(|e| StoreError::Parse(format!("serializing accounts: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| StoreError::Io("account path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".accounts.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| StoreError::Io(format!("writing temp account file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| StoreError::Io(format!("setting account file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| StoreError::Io(format!("renaming temp account file: {e}")))?;

    debug!(path = %path.display(), accounts = accounts.len(), "persisted pool accounts");
    Ok(())
}
