//! Model-version readiness polling
//!
//! A freshly created model version is registered asynchronously:
//!
//! ```text
//! Created ──poll──> Pending ──poll──> Ready
//!                      │ ╲
//!                      │  ╲──poll──> Failed
//!                      └─(attempts exhausted)──> VersionNotReady
//! ```
//!
//! Transitions are driven purely by observed status; sleeping between polls
//! goes through [`Sleeper`] so tests run without wall-clock waits.

use std::time::Duration;

use crate::client::TrackingClient;
use crate::entity::{ModelVersion, ModelVersionStatus};
use crate::{Error, Result};

/// Default pause between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of status polls before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Blocking pause between polls.
pub trait Sleeper {
    /// Block for `duration`.
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Bounded polling schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    interval: Duration,
    max_attempts: u32,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReadinessPolicy {
    /// Policy polling every `interval`, at most `max_attempts` times (at
    /// least once).
    #[must_use]
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Set the pause between polls.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the poll budget (at least one poll).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Pause between polls.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll budget.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Import-side state of one model version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionState {
    /// Created, not polled yet
    Created,
    /// Registration still running after `attempts` polls
    Pending {
        /// Polls performed so far
        attempts: u32,
    },
    /// Registered and usable
    Ready,
    /// Registration failed on the server
    Failed {
        /// Server status message
        message: String,
    },
}

impl VersionState {
    /// Next state after observing `version` once.
    #[must_use]
    pub fn observe(self, version: &ModelVersion) -> Self {
        let attempts = match self {
            Self::Created => 0,
            Self::Pending { attempts } => attempts,
            terminal @ (Self::Ready | Self::Failed { .. }) => return terminal,
        };
        match version.status {
            ModelVersionStatus::Ready => Self::Ready,
            ModelVersionStatus::FailedRegistration => Self::Failed {
                message: version
                    .status_message
                    .clone()
                    .unwrap_or_else(|| "registration failed".to_string()),
            },
            ModelVersionStatus::PendingRegistration => Self::Pending {
                attempts: attempts + 1,
            },
        }
    }

    /// Whether polling is over.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed { .. })
    }
}

/// Poll `name`/`version` until it leaves `PENDING_REGISTRATION`.
///
/// Sleeps `policy.interval()` between polls, never after the last one.
///
/// # Errors
///
/// - [`Error::RegistrationFailed`] when the server reports a failure
/// - [`Error::VersionNotReady`] when the poll budget runs out
/// - any client error from `get_model_version`
pub fn wait_until_ready(
    client: &dyn TrackingClient,
    name: &str,
    version: u32,
    policy: &ReadinessPolicy,
    sleeper: &dyn Sleeper,
) -> Result<ModelVersion> {
    let mut state = VersionState::Created;
    for attempt in 1..=policy.max_attempts() {
        let current = client.get_model_version(name, version)?;
        state = state.observe(&current);
        match &state {
            VersionState::Ready => {
                tracing::debug!(name, version, attempt, "model version ready");
                return Ok(current);
            }
            VersionState::Failed { message } => {
                return Err(Error::RegistrationFailed {
                    name: name.to_string(),
                    version: version.to_string(),
                    message: message.clone(),
                });
            }
            VersionState::Created | VersionState::Pending { .. } => {
                if attempt < policy.max_attempts() {
                    tracing::debug!(name, version, attempt, "model version pending");
                    sleeper.sleep(policy.interval());
                }
            }
        }
    }
    Err(Error::VersionNotReady {
        name: name.to_string(),
        version: version.to_string(),
        attempts: policy.max_attempts(),
    })
}
