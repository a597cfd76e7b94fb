use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{PromptQlError, Result};
use crate::traits::ThreadApi;
use crate::types::ThreadStatusReport;

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Wall-clock budget and cadence for completion polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_POLL_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Fetch until `done` accepts a value or the deadline passes
///
/// At least one fetch is started. Each fetch is bounded by the deadline, so a
/// held-open status stream cannot overrun the budget. A fetch error ends the
/// wait immediately and is returned as-is; running out of time yields `Ok(None)`.
pub async fn poll_until<T, F, Fut, P>(config: &PollConfig, mut fetch: F, done: P) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&T) -> bool,
{
    let deadline = Instant::now() + config.timeout;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let value = match tokio::time::timeout_at(deadline, fetch()).await {
            Ok(value) => value?,
            Err(_) => {
                tracing::debug!(attempt, "Fetch cut off by the poll deadline");
                return Ok(None);
            }
        };
        if done(&value) {
            tracing::debug!(attempt, "Poll condition satisfied");
            return Ok(Some(value));
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(config.interval.min(deadline - now)).await;
    }
}

/// Poll a thread's status until its latest interaction is complete
pub async fn wait_for_completion<A>(
    api: &A,
    thread_id: &str,
    config: &PollConfig,
) -> Result<ThreadStatusReport>
where
    A: ThreadApi + ?Sized,
{
    wait_for_interaction(api, thread_id, None, config).await
}

/// Like `wait_for_completion`, but when `interaction_id` is given the latest
/// interaction must also be that one
pub async fn wait_for_interaction<A>(
    api: &A,
    thread_id: &str,
    interaction_id: Option<&str>,
    config: &PollConfig,
) -> Result<ThreadStatusReport>
where
    A: ThreadApi + ?Sized,
{
    tracing::info!(
        thread_id,
        interaction_id,
        timeout_secs = config.timeout.as_secs(),
        interval_ms = config.interval.as_millis() as u64,
        "Waiting for thread completion"
    );

    let outcome = poll_until(
        config,
        || api.get_thread_status(thread_id),
        |report: &ThreadStatusReport| report.is_complete() && is_latest(report, interaction_id),
    )
    .await?;

    match outcome {
        Some(report) => {
            tracing::info!(thread_id, "Thread completed");
            Ok(report)
        }
        None => {
            tracing::warn!(thread_id, "Thread did not complete within the poll budget");
            Err(PromptQlError::Timeout {
                thread_id: thread_id.to_string(),
                waited: config.timeout,
            })
        }
    }
}

fn is_latest(report: &ThreadStatusReport, interaction_id: Option<&str>) -> bool {
    let Some(expected) = interaction_id else {
        return true;
    };
    let latest = report
        .state()
        .latest_interaction()
        .map(|interaction| interaction.interaction_id.as_str());
    if latest != Some(expected) {
        tracing::debug!(
            expected,
            latest = ?latest,
            "Latest interaction is not the one being waited for yet"
        );
        return false;
    }
    true
}
