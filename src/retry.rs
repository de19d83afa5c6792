//! Asynchronous exponential backoff with jitter, applied uniformly at
//! agent, tool, and external-service boundaries.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Parameters for [`retry`].
///
/// Defaults mirror the values used throughout the orchestrator:
/// `retries=3, base_delay=0.5s, backoff=2.0, jitter=0.1`.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Number of retries *after* the first attempt. Total attempts = retries + 1.
    pub retries: u32,
    pub base_delay: Duration,
    pub backoff: f64,
    /// Fractional jitter added on top of the computed delay, drawn from `U[0, jitter]`.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_millis(500),
            backoff: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn new(retries: u32) -> Self {
        Self { retries, ..Default::default() }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_backoff(mut self, backoff: f64) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64() * self.backoff.powi(attempt as i32);
        let jittered = if self.jitter > 0.0 {
            let extra: f64 = rand::thread_rng().gen_range(0.0..self.jitter);
            base * (1.0 + extra)
        } else {
            base
        };
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Runs `op` up to `config.retries + 1` times, sleeping between attempts
/// according to [`RetryConfig`]. `is_retryable` decides, per error, whether
/// another attempt should be made; errors for which it returns `false` are
/// surfaced immediately without consuming further retries.
///
/// `cancellation` is raced against the backoff sleep: a cancelled token
/// stops pending retries immediately instead of waiting out the remaining
/// backoff, surfacing the last observed error right away.
///
/// On exhaustion, the last observed error is returned unchanged.
pub async fn retry<T, E, Op, Fut>(
    config: RetryConfig,
    cancellation: &CancellationToken,
    is_retryable: impl Fn(&E) -> bool,
    mut op: Op,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= config.retries || !is_retryable(&err) || cancellation.is_cancelled() {
                    return Err(err);
                }
                let wait = config.delay_for(attempt);
                tracing::warn!(attempt = attempt + 1, retries = config.retries, wait_s = wait.as_secs_f64(), "retrying after transient failure");
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = cancellation.cancelled() => {
                        tracing::warn!("retry cancelled during backoff, stopping with last error");
                        return Err(err);
                    }
                }
                attempt += 1;
            }
        }
    }
}

/// Convenience wrapper for the common case where every error is retryable.
pub async fn retry_always<T, E, Op, Fut>(config: RetryConfig, cancellation: &CancellationToken, op: Op) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry(config, cancellation, |_| true, op).await
}
