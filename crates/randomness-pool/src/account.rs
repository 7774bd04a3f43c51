//! Pooled account model and lifecycle states
//!
//! Timestamps are unix milliseconds. Time is read through the `Clock` trait so
//! cooldown expiry can be tested without sleeping.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a pooled account.
///
/// Transitions:
/// - (created) → Available
/// - Available → InUse (allocate)
/// - InUse → Cooldown (return)
/// - Cooldown → Available (reconcile, once the cooldown has elapsed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Available,
    InUse,
    Cooldown,
}

impl AccountStatus {
    /// Status label for health/logging.
    pub fn label(&self) -> &'static str {
        match self {
            AccountStatus::Available => "available",
            AccountStatus::InUse => "in_use",
            AccountStatus::Cooldown => "cooldown",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: AccountStatus) -> bool {
        matches!(
            (self, next),
            (AccountStatus::Available, AccountStatus::InUse)
                | (AccountStatus::InUse, AccountStatus::Cooldown)
                | (AccountStatus::Cooldown, AccountStatus::Available)
        )
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A pre-provisioned randomness account tracked by the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PooledAccount {
    /// External account identifier, immutable once created
    pub id: String,
    pub status: AccountStatus,
    pub created_at: u64,
    /// Stamped on every allocation; `None` until first use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<u64>,
    /// Only meaningful while `status == Cooldown`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<u64>,
}

impl PooledAccount {
    /// A freshly provisioned account, ready for allocation.
    pub fn new(id: impl Into<String>, created_at: u64) -> Self {
        Self {
            id: id.into(),
            status: AccountStatus::Available,
            created_at,
            last_used_at: None,
            cooldown_until: None,
        }
    }

    /// Whether this account is cooling down and its cooldown has elapsed at `now`.
    pub fn is_cooldown_expired(&self, now: u64) -> bool {
        self.status == AccountStatus::Cooldown
            && self.cooldown_until.is_some_and(|until| until <= now)
    }
}

/// Source of wall-clock time in unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(start_millis),
        }
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// `now + duration` in unix milliseconds, saturating instead of overflowing.
pub(crate) fn millis_after(now: u64, duration: Duration) -> u64 {
    let delta = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    now.saturating_add(delta)
}
