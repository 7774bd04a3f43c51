//! Pool manager: allocation, return, lazy growth, bootstrap and cooldown reconciliation
//!
//! The allocation lock serializes the whole find-or-create decision, including
//! the provisioning call. Two callers can therefore never both see "room for one
//! more" and both create an account, and never both claim the same account.
//! Return and reconcile only touch InUse and Cooldown accounts, which allocate
//! never reads, so they run without that lock.
//!
//! The lock is in-process only. Several replicas sharing one store are not
//! protected against double allocation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use provisioner::Provisioner;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::account::{AccountStatus, Clock, PooledAccount, millis_after};
use crate::error::{Error, Result, StoreError};
use crate::metrics;
use crate::store::AccountStore;

/// Pool sizing and pacing.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Hard cap on the number of accounts ever created
    pub max_size: usize,
    /// Pause between successive provisioning calls during bootstrap
    pub creation_delay: Duration,
}

/// Outcome of a bootstrap run. Partial success is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    pub attempted: usize,
    pub created: usize,
}

/// Account counts by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub available: usize,
    pub in_use: usize,
    pub cooling_down: usize,
    pub max_size: usize,
}

impl PoolStats {
    /// No account to hand out and no room to create one.
    pub fn is_exhausted(&self) -> bool {
        self.available == 0 && self.total >= self.max_size
    }
}

/// Where an allocated account came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Reused,
    Created,
}

/// Shared pool of randomness accounts.
pub struct PoolManager {
    store: Arc<dyn AccountStore>,
    provisioner: Arc<dyn Provisioner>,
    settings: PoolSettings,
    clock: Arc<dyn Clock>,
    allocation_lock: Mutex<()>,
    /// Serializes overlapping sweeps so one sweep cannot revive an account
    /// another sweep already released and allocate has since claimed.
    sweep_lock: Mutex<()>,
}

impl PoolManager {
    pub fn new(
        store: Arc<dyn AccountStore>,
        provisioner: Arc<dyn Provisioner>,
        settings: PoolSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!(
            max_size = settings.max_size,
            provisioner = provisioner.id(),
            "pool manager initialized"
        );
        Self {
            store,
            provisioner,
            settings,
            clock,
            allocation_lock: Mutex::new(()),
            sweep_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Hand out one account, marking it InUse.
    ///
    /// Reuses any Available account; otherwise grows the pool by one if it is
    /// below `max_size`. Any `Err` means "no account right now" and leaves the
    /// pool consistent; the variant only says why.
    pub async fn allocate(&self) -> Result<String> {
        let started = Instant::now();
        let result = {
            let _guard = self.allocation_lock.lock().await;
            self.allocate_locked().await
        };

        let outcome = match &result {
            Ok((_, Source::Reused)) => "reused",
            Ok((_, Source::Created)) => "created",
            Err(Error::PoolExhausted(_)) => "exhausted",
            Err(Error::Provisioning(_)) => "provisioning_failed",
            Err(Error::Inconsistent(_)) => "inconsistent",
            Err(_) => "store_error",
        };
        metrics::record_allocation(outcome, started.elapsed().as_secs_f64());

        result.map(|(id, _)| id)
    }

    /// Allocation body. Caller must hold `allocation_lock`.
    async fn allocate_locked(&self) -> Result<(String, Source)> {
        if let Some(account) = self.store.get_one_available().await.inspect_err(|e| {
            warn!(error = %e, "failed to query available accounts");
        })? {
            let id = self.claim(account).await?;
            info!(account_id = %id, "allocated account");
            return Ok((id, Source::Reused));
        }

        let total = self.store.total_count().await?;
        if total >= self.settings.max_size {
            warn!(total, max_size = self.settings.max_size, "pool exhausted");
            return Err(Error::PoolExhausted(format!(
                "{total} of {} accounts in use or cooling down",
                self.settings.max_size
            )));
        }

        info!(total, "no available accounts, creating new one");
        self.create_account().await?;

        // The store is authoritative: re-query rather than claiming the new id directly.
        let Some(account) = self.store.get_one_available().await? else {
            warn!("account created but none available on re-query");
            return Err(Error::Inconsistent(
                "created account not found as available".into(),
            ));
        };
        let id = self.claim(account).await?;
        info!(account_id = %id, "allocated newly created account");
        Ok((id, Source::Created))
    }

    /// Move an account the store reported as Available to InUse.
    async fn claim(&self, account: PooledAccount) -> Result<String> {
        if !account.status.can_transition_to(AccountStatus::InUse) {
            warn!(
                account_id = %account.id,
                status = account.status.label(),
                "store returned a non-available account"
            );
            return Err(Error::Inconsistent(format!(
                "store returned {} account {} as available",
                account.status, account.id
            )));
        }
        self.store
            .mark_in_use(&account.id, self.clock.now_millis())
            .await?;
        Ok(account.id)
    }

    /// Provision one account and record it as Available.
    ///
    /// Nothing is recorded if provisioning fails. Shared by allocate's growth
    /// path and bootstrap; callers hold `allocation_lock`.
    async fn create_account(&self) -> Result<String> {
        let account_id = match self.provisioner.create_account().await {
            Ok(id) => id,
            Err(e) => {
                warn!(provisioner = self.provisioner.id(), error = %e, "failed to provision account");
                metrics::record_account_created(false);
                return Err(Error::Provisioning(e.to_string()));
            }
        };

        let account = PooledAccount::new(account_id.clone(), self.clock.now_millis());
        if let Err(e) = self.store.create(account).await {
            warn!(account_id = %account_id, error = %e, "provisioned account could not be recorded");
            metrics::record_account_created(false);
            return Err(e.into());
        }

        metrics::record_account_created(true);
        info!(account_id = %account_id, "created and added account to pool");
        Ok(account_id)
    }

    /// Put an InUse account into cooldown for `cooldown`.
    ///
    /// Best effort: unknown ids, accounts that are not InUse, and store errors
    /// are logged and dropped. Match completion must never fail on pool
    /// bookkeeping.
    pub async fn return_account(&self, account_id: &str, cooldown: Duration) {
        match self.try_return(account_id, cooldown).await {
            Ok(until) => {
                metrics::record_return("ok");
                info!(
                    account_id,
                    cooldown_secs = cooldown.as_secs(),
                    cooldown_until = until,
                    "account returned to pool"
                );
            }
            Err(e @ (Error::NotFound(_) | Error::InvalidTransition { .. })) => {
                metrics::record_return("ignored");
                warn!(account_id, error = %e, "ignoring return");
            }
            Err(e) => {
                metrics::record_return("error");
                warn!(account_id, error = %e, "failed to return account to pool");
            }
        }
    }

    /// The InUse check and the write are one store update, never a read
    /// followed by a separate write.
    async fn try_return(&self, account_id: &str, cooldown: Duration) -> Result<u64> {
        let until = millis_after(self.clock.now_millis(), cooldown);
        match self.store.mark_cooldown(account_id, until).await {
            Ok(()) => Ok(until),
            Err(StoreError::NotFound(id)) => Err(Error::NotFound(id)),
            Err(StoreError::NotInUse { id, status }) => Err(Error::InvalidTransition {
                id,
                from: status,
                to: AccountStatus::Cooldown,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Grow the pool to `min(target_size, max_size)` accounts.
    ///
    /// Holds the allocation lock for the whole run. Individual provisioning
    /// failures are logged and the run continues; the report says how many of
    /// the attempted creations succeeded.
    pub async fn initialize_pool(&self, target_size: usize) -> BootstrapReport {
        let _guard = self.allocation_lock.lock().await;

        info!(target_size, "initializing pool");
        let current = match self.store.total_count().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "cannot read pool size, skipping initialization");
                return BootstrapReport {
                    attempted: 0,
                    created: 0,
                };
            }
        };

        let goal = target_size.min(self.settings.max_size);
        let attempted = goal.saturating_sub(current);
        if attempted == 0 {
            info!(current, "pool already initialized");
            return BootstrapReport {
                attempted: 0,
                created: 0,
            };
        }

        info!(current, to_create = attempted, "creating randomness accounts");
        let mut created = 0;
        for i in 0..attempted {
            if i > 0 && !self.settings.creation_delay.is_zero() {
                tokio::time::sleep(self.settings.creation_delay).await;
            }
            if self.create_account().await.is_ok() {
                created += 1;
            }
        }

        info!(created, attempted, "pool initialization complete");
        BootstrapReport { attempted, created }
    }

    /// Move every Cooldown account whose deadline has passed back to Available.
    ///
    /// Returns how many accounts were moved. A failing update is logged and
    /// skipped; the rest of the sweep continues.
    pub async fn reconcile_cooldowns(&self) -> usize {
        let _sweep = self.sweep_lock.lock().await;
        let now = self.clock.now_millis();

        let expired = match self.store.get_cooldown_expired(now).await {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!(error = %e, "failed to query cooldown-expired accounts");
                return 0;
            }
        };
        if expired.is_empty() {
            return 0;
        }

        info!(count = expired.len(), "processing cooldown-expired accounts");
        let mut reconciled = 0;
        for account in expired {
            if !account.is_cooldown_expired(now) {
                warn!(
                    account_id = %account.id,
                    status = account.status.label(),
                    "store returned an account that is not cooling down, skipping"
                );
                continue;
            }
            match self
                .store
                .update_status(&account.id, AccountStatus::Available)
                .await
            {
                Ok(()) => {
                    reconciled += 1;
                    debug!(account_id = %account.id, "account moved from cooldown to available");
                }
                Err(e) => {
                    warn!(account_id = %account.id, error = %e, "failed to release account from cooldown");
                }
            }
        }

        metrics::record_reconciled(reconciled);
        reconciled
    }

    /// Account counts by status.
    pub async fn stats(&self) -> Result<PoolStats> {
        Ok(PoolStats {
            total: self.store.total_count().await?,
            available: self
                .store
                .count_by_status(AccountStatus::Available)
                .await?,
            in_use: self.store.count_by_status(AccountStatus::InUse).await?,
            cooling_down: self.store.count_by_status(AccountStatus::Cooldown).await?,
            max_size: self.settings.max_size,
        })
    }

    /// Pool health summary for the health endpoint.
    ///
    /// Status mapping: an account available → healthy, none available but room
    /// to grow → degraded, exhausted or store unreadable → unhealthy.
    pub async fn health(&self) -> serde_json::Value {
        let stats = match self.stats().await {
            Ok(stats) => stats,
            Err(e) => {
                return serde_json::json!({
                    "status": "unhealthy",
                    "error": e.to_string(),
                });
            }
        };

        let status = if stats.available > 0 {
            "healthy"
        } else if !stats.is_exhausted() {
            "degraded"
        } else {
            "unhealthy"
        };

        serde_json::json!({
            "status": status,
            "accounts_total": stats.total,
            "accounts_available": stats.available,
            "accounts_in_use": stats.in_use,
            "accounts_cooling_down": stats.cooling_down,
            "max_size": stats.max_size,
        })
    }
}
