use std::future::Future;
use std::time::Duration;

use log::{debug, info, warn};
use rollout_defs::StepError;
use tokio::time::{Instant, sleep, timeout};

const MIN_INTERVAL: Duration = Duration::from_millis(10);
/// Longest a single probe may take before it counts as unanswered.
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a poll loop may keep trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    /// Stop once this much time has elapsed since the loop was entered.
    Timeout(Duration),
    /// Stop after this many probes.
    Attempts(u32),
}

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    Ready(T),
    /// Not there yet, with a human readable description of what was seen.
    Pending(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Waited<T> {
    Ready(T),
    Exhausted {
        last_status: String,
        attempts: u32,
        elapsed: Duration,
    },
}

/// Drives `probe` until it reports ready, fails, or the budget runs out.
///
/// With `Budget::Timeout(t)` neither a sleep nor a probe runs past the
/// deadline, so the loop returns within `t + interval` of being entered even
/// when a probe hangs. A probe that does not answer within `QUERY_TIMEOUT`
/// counts as pending. A fatal probe error ends the loop immediately.
pub async fn poll_until<T, F, Fut>(
    subject: &str,
    interval: Duration,
    budget: Budget,
    mut probe: F,
) -> Result<Waited<T>, StepError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>, StepError>>,
{
    let interval = interval.max(MIN_INTERVAL);
    let started = Instant::now();
    let mut attempts = 0u32;
    let mut last_status: Option<String> = None;

    loop {
        attempts += 1;
        let bound = match budget {
            Budget::Timeout(total) => total
                .saturating_sub(started.elapsed())
                .min(QUERY_TIMEOUT)
                .max(MIN_INTERVAL),
            Budget::Attempts(_) => QUERY_TIMEOUT,
        };
        match timeout(bound, probe()).await {
            Ok(answer) => match answer? {
                Probe::Ready(value) => return Ok(Waited::Ready(value)),
                Probe::Pending(status) => {
                    if last_status.as_deref() == Some(status.as_str()) {
                        debug!("{}: still {} (attempt {})", subject, status, attempts);
                    } else {
                        info!("{}: {}", subject, status);
                    }
                    last_status = Some(status);
                }
            },
            Err(_) => {
                warn!("{}: no answer within {:?} (attempt {})", subject, bound, attempts);
                // A stall never replaces an answered status.
                if last_status.is_none() {
                    last_status = Some(format!("no answer within {:?}", bound));
                }
            }
        }

        let pause = match budget {
            Budget::Timeout(total) => {
                let elapsed = started.elapsed();
                if elapsed >= total {
                    None
                } else {
                    Some(interval.min(total - elapsed))
                }
            }
            Budget::Attempts(max) => (attempts < max).then_some(interval),
        };

        match pause {
            Some(pause) => sleep(pause).await,
            None => {
                return Ok(Waited::Exhausted {
                    last_status: last_status.unwrap_or_default(),
                    attempts,
                    elapsed: started.elapsed(),
                });
            }
        }
    }
}
