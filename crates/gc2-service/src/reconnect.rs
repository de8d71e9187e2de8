//! Auto-reconnection with bounded exponential backoff, shared by the USB and
//! TCP transports.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

/// Progress reports from a supervisor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectStatus {
    /// About to wait out the backoff for attempt `n` (1-based).
    Attempting(u32),
    Connected,
    /// All attempts exhausted; an explicit retry is required.
    Failed,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ReconnectError {
    #[error("reconnection failed after {attempts} attempts")]
    Exhausted { attempts: u32 },
    #[error("reconnection cancelled")]
    Cancelled,
}

/// Exponential-backoff reconnection supervisor.
///
/// Each incident gets a fresh schedule: attempt `n` waits
/// `min(base * 2^(n-1), max_backoff)` before trying the factory. A successful
/// connection returns immediately, so the next incident starts again at
/// attempt 1.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectSupervisor {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReconnectSupervisor {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(16),
        }
    }
}

impl ReconnectSupervisor {
    /// Backoff before attempt `attempt` (1-based): `min(base * 2^(n-1), cap)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        let delay = self.base_backoff.saturating_mul(1u32 << shift);
        delay.min(self.max_backoff)
    }

    /// Run the schedule until `factory` yields a session, retries are
    /// exhausted, or `cancel` flips to true.
    ///
    /// Cancellation is honored during every backoff sleep and never produces
    /// a `Connected` status.
    pub async fn run<T, E, F, Fut>(
        &self,
        mut factory: F,
        mut on_status: impl FnMut(ReconnectStatus),
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<T, ReconnectError>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        for attempt in 1..=self.max_retries {
            if *cancel.borrow() {
                on_status(ReconnectStatus::Cancelled);
                return Err(ReconnectError::Cancelled);
            }

            on_status(ReconnectStatus::Attempting(attempt));
            let delay = self.delay_for_attempt(attempt);
            tracing::info!(attempt, max = self.max_retries, ?delay, "reconnecting");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        on_status(ReconnectStatus::Cancelled);
                        return Err(ReconnectError::Cancelled);
                    }
                }
            }

            if *cancel.borrow() {
                on_status(ReconnectStatus::Cancelled);
                return Err(ReconnectError::Cancelled);
            }

            match factory().await {
                Ok(session) => {
                    tracing::info!(attempt, "reconnected");
                    on_status(ReconnectStatus::Connected);
                    return Ok(session);
                }
                Err(error) => {
                    tracing::warn!(attempt, %error, "reconnection attempt failed");
                }
            }
        }

        on_status(ReconnectStatus::Failed);
        Err(ReconnectError::Exhausted {
            attempts: self.max_retries,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
