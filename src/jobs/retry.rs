use std::fmt::Display;
use std::thread;
use std::time::Duration;

use tracing::warn;

use super::registry::{JobRegistry, JobState};

/// Re-invokes a fallible operation with bounded attempts and exponential
/// backoff.
///
/// The policy is a plain decorator over any unit of work: it knows nothing
/// about what it wraps beyond "may fail with a displayable error". When an
/// upload id is supplied, each non-final failure is reported into the
/// registry (`retry_count`, `Retrying` + message) and the final failure
/// marks the record `Failed`; without an id the registry is never touched.
///
/// A terminal failure is never swallowed: after the last attempt the error
/// is handed back to the caller. Success returns the value without setting
/// `Completed` — the caller may still have work to do before the job is
/// truly done.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run an untracked operation.
    pub fn run<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
    {
        self.run_inner(None, op)
    }

    /// Run an operation on behalf of a tracked upload, reporting each
    /// failure into the registry.
    pub fn run_tracked<T, E, F>(
        &self,
        registry: &JobRegistry,
        upload_id: &str,
        op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
    {
        self.run_inner(Some((registry, upload_id)), op)
    }

    fn run_inner<T, E, F>(&self, job: Option<(&JobRegistry, &str)>, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
    {
        let mut attempts = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempts += 1;
                    let message = err.to_string();

                    if attempts >= self.max_attempts {
                        warn!(attempts, error = %message, "operation failed, giving up");
                        if let Some((registry, upload_id)) = job {
                            registry.set_state(upload_id, JobState::Failed, Some(&message));
                        }
                        return Err(err);
                    }

                    warn!(attempts, error = %message, "operation failed, retrying");
                    if let Some((registry, upload_id)) = job {
                        registry.increment_retry(upload_id);
                        registry.set_state(upload_id, JobState::Retrying, Some(&message));
                    }

                    // Exponential backoff: base, 2*base, 4*base, ...
                    // Sleeps on the attempting thread; the registry lock is
                    // never held here.
                    thread::sleep(self.backoff(attempts - 1));
                }
            }
        }
    }

    fn backoff(&self, attempt_index: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt_index))
    }
}
