//! Store configuration.
//!
//! # Responsibility
//! - Carry connection tuning and delete policies into store/repository setup.
//!
//! # Invariants
//! - `busy_timeout` bounds how long a writer waits on a held lock before the
//!   call fails with `RepoError::LockTimeout`.

use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// What happens to owned members when a team is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TeamDeletePolicy {
    /// Owned members are deleted in the same transaction as the team.
    Cascade,
    /// Deleting a team that still owns members fails with a constraint error.
    #[default]
    Reject,
}

/// Connection and repository settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Maximum wait on a locked database before giving up.
    pub busy_timeout: Duration,
    /// Team deletion behavior used by `TeamRepository`.
    pub team_delete_policy: TeamDeletePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            team_delete_policy: TeamDeletePolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Returns a copy with a different busy timeout.
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// Returns a copy with a different team delete policy.
    pub fn with_team_delete_policy(mut self, policy: TeamDeletePolicy) -> Self {
        self.team_delete_policy = policy;
        self
    }
}
