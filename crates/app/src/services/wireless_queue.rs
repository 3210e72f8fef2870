//! Single-flight queue for wireless jobs.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until, timeout};

use hearthlink_domain::error::BridgeError;

use crate::error::QueueError;

/// Hard limit on a single wireless job.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs wireless jobs one at a time, in submission order.
///
/// Job starts are spaced at least `interval` apart. A job that runs longer
/// than the job timeout is dropped and reported as [`QueueError::Timeout`];
/// the next job starts as soon as the spacing allows.
#[derive(Debug)]
pub struct WirelessQueue {
    interval: Duration,
    job_timeout: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl WirelessQueue {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self::with_timeout(interval, DEFAULT_JOB_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeout(interval: Duration, job_timeout: Duration) -> Self {
        Self {
            interval,
            job_timeout,
            last_start: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run `job` once every earlier job has finished and the spacing has
    /// elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Timeout`] when the job exceeds the job timeout
    /// and [`QueueError::Job`] when it fails on its own.
    pub async fn run<F, T>(&self, job: F) -> Result<T, QueueError>
    where
        F: Future<Output = Result<T, BridgeError>>,
    {
        // tokio's mutex is fair, so waiters are served in FIFO order
        let mut last_start = self.last_start.lock().await;
        if let Some(previous) = *last_start {
            sleep_until(previous + self.interval).await;
        }
        *last_start = Some(Instant::now());

        match timeout(self.job_timeout, job).await {
            Ok(result) => result.map_err(QueueError::Job),
            Err(_elapsed) => {
                tracing::warn!(timeout = ?self.job_timeout, "wireless job timed out");
                Err(QueueError::Timeout(self.job_timeout))
            }
        }
    }
}
