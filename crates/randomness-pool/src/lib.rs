//! Pool of pre-provisioned randomness accounts
//!
//! Game matches each need an exclusive randomness account for their lifetime.
//! Creating one is slow and costs money, so accounts are created once and
//! reused. The pool hands accounts out, grows lazily up to a hard cap, and
//! holds returned accounts in a cooldown before they can be reused.
//!
//! Account lifecycle:
//! 1. Bootstrap or lazy growth provisions an account → `Available`
//! 2. A match allocates it → `InUse`
//! 3. The match returns it → `Cooldown` until its deadline
//! 4. The background sweep finds the deadline passed → `Available`

pub mod account;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod store;
pub mod sweeper;

pub use account::{AccountStatus, Clock, ManualClock, PooledAccount, SystemClock};
pub use error::{Error, Result, StoreError, StoreResult};
pub use pool::{BootstrapReport, PoolManager, PoolSettings, PoolStats};
pub use store::{AccountStore, JsonStore, StoreFuture};
pub use sweeper::spawn_cooldown_sweeper;
