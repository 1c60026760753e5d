//! Bounded worker pool and collaborator calls
//!
//! Every collaborator trait is synchronous, so each call runs on a blocking
//! thread under a deadline and is retried with exponential backoff. Fan-out
//! stages hand their units to [`run_bounded`], which caps parallelism with a
//! semaphore and returns only once every unit has finished.

use crate::config::RetryPolicy;
use crate::error::ResearchError;
use scrivener_domain::traits::LlmProvider;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Outcome of one pool unit
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome<R> {
    /// The unit ran to completion
    Completed(R),
    /// The unit panicked or was aborted
    Panicked(String),
}

impl<R> UnitOutcome<R> {
    /// The unit's result, if it completed
    pub fn completed(self) -> Option<R> {
        match self {
            UnitOutcome::Completed(r) => Some(r),
            UnitOutcome::Panicked(_) => None,
        }
    }
}

/// Run `op` on a blocking thread with a deadline, retrying on failure
///
/// A timed-out attempt is abandoned, not interrupted: the blocking thread
/// finishes on its own and its result is discarded.
pub async fn call_blocking<T, E, F>(
    policy: &RetryPolicy,
    label: &str,
    op: F,
) -> Result<T, ResearchError>
where
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    let op = Arc::new(op);
    let attempts = policy.max_attempts.max(1);
    let mut last_error = ResearchError::Collaborator(format!("{}: no attempt made", label));

    for attempt in 1..=attempts {
        let task_op = Arc::clone(&op);
        let outcome = timeout(
            policy.call_timeout(),
            tokio::task::spawn_blocking(move || task_op()),
        )
        .await;

        last_error = match outcome {
            Ok(Ok(Ok(value))) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", label, attempt);
                }
                return Ok(value);
            }
            Ok(Ok(Err(e))) => ResearchError::Collaborator(format!("{}: {}", label, e)),
            Ok(Err(e)) => ResearchError::Collaborator(format!("{}: task join error: {}", label, e)),
            Err(_) => ResearchError::Timeout(format!(
                "{} exceeded {}s",
                label, policy.call_timeout_secs
            )),
        };

        if attempt < attempts {
            warn!(
                "{} failed (attempt {}/{}): {}",
                label, attempt, attempts, last_error
            );
            sleep(policy.backoff(attempt)).await;
        }
    }

    warn!("{} gave up after {} attempts: {}", label, attempts, last_error);
    Err(last_error)
}

/// One structured reasoning call under the retry policy
pub async fn reason<L>(
    llm: &Arc<L>,
    policy: &RetryPolicy,
    label: &str,
    prompt: String,
    schema: &'static str,
) -> Result<String, ResearchError>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
{
    let llm = Arc::clone(llm);
    call_blocking(policy, label, move || llm.generate_structured(&prompt, schema)).await
}

/// Run `work` over every unit with at most `concurrency` in flight
///
/// Results come back in unit order once all units have finished. A unit
/// that panics yields [`UnitOutcome::Panicked`] and does not disturb the
/// others.
pub async fn run_bounded<T, R, F, Fut>(
    units: Vec<T>,
    concurrency: usize,
    work: F,
) -> Vec<UnitOutcome<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut join_set = JoinSet::new();
    let total = units.len();

    for (index, unit) in units.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let future = work(unit);
        join_set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            (index, future.await)
        });
    }

    let mut results: Vec<Option<UnitOutcome<R>>> = (0..total).map(|_| None).collect();
    let mut failures = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, value)) => results[index] = Some(UnitOutcome::Completed(value)),
            Err(e) => {
                warn!("Pool unit failed: {}", e);
                failures.push(e.to_string());
            }
        }
    }

    // A failed task loses its index; every slot still empty belongs to one
    let mut failures = failures.into_iter();
    results
        .into_iter()
        .map(|r| {
            r.unwrap_or_else(|| {
                UnitOutcome::Panicked(failures.next().unwrap_or_else(|| "unit lost".to_string()))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            call_timeout_secs: 5,
            max_attempts,
            backoff_base_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_call_blocking_succeeds() {
        let result = call_blocking(&fast_policy(1), "ok", || Ok::<_, String>(42)).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_call_blocking_retries_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result = call_blocking(&fast_policy(3), "flaky", move || {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err("transient".to_string())
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_call_blocking_gives_up() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), _> = call_blocking(&fast_policy(2), "broken", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("down".to_string())
        })
        .await;

        assert!(matches!(result, Err(ResearchError::Collaborator(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_call_blocking_times_out() {
        let policy = RetryPolicy {
            call_timeout_secs: 1,
            max_attempts: 1,
            backoff_base_ms: 1,
        };
        let result = call_blocking(&policy, "slow", || {
            std::thread::sleep(Duration::from_millis(1500));
            Ok::<_, String>(())
        })
        .await;

        assert!(matches!(result, Err(ResearchError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_run_bounded_preserves_order() {
        let results = run_bounded(vec![3u64, 1, 2], 2, |n| async move {
            sleep(Duration::from_millis(n * 10)).await;
            n * 100
        })
        .await;

        let values: Vec<u64> = results.into_iter().filter_map(UnitOutcome::completed).collect();
        assert_eq!(values, vec![300, 100, 200]);
    }

    #[tokio::test]
    async fn test_run_bounded_respects_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = run_bounded((0..8).collect::<Vec<u32>>(), 3, |_| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;

        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_run_bounded_isolates_panics() {
        let results = run_bounded(vec![1, 2, 3], 2, |n| async move {
            if n == 2 {
                panic!("unit {} exploded", n);
            }
            n
        })
        .await;

        assert_eq!(results[0], UnitOutcome::Completed(1));
        assert!(matches!(results[1], UnitOutcome::Panicked(_)));
        assert_eq!(results[2], UnitOutcome::Completed(3));
    }
}
