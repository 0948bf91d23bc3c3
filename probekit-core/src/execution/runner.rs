//! Scheduled probe execution

use std::sync::Arc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::{ExecutionError, Executor};
use crate::concurrency::{ParallelOptions, RateLimiter, run_parallel, with_retry_notify};
use crate::config::ExecutionConfig;
use crate::context::RunContext;
use crate::model::{ExecutionRecord, ExecutionResult, Probe};

/// Runs probes through an [`Executor`] with the run's scheduling policy
///
/// Each attempt waits for a rate-limiter slot, then races the executor
/// against the configured timeout. Transient failures are retried; timeouts
/// are not.
pub struct ProbeRunner {
    executor: Arc<dyn Executor>,
    config: ExecutionConfig,
    rate_limiter: Option<RateLimiter>,
}

impl std::fmt::Debug for ProbeRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeRunner")
            .field("config", &self.config)
            .field("rate_limiter", &self.rate_limiter)
            .finish()
    }
}

impl ProbeRunner {
    pub fn new(executor: Arc<dyn Executor>, ctx: &RunContext) -> Self {
        Self::with_config(executor, ctx.config.execution.clone())
    }

    pub fn with_config(executor: Arc<dyn Executor>, config: ExecutionConfig) -> Self {
        let rate_limiter = config.requests_per_second.map(RateLimiter::new);
        Self {
            executor,
            config,
            rate_limiter,
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub async fn preflight(&self) -> Result<(), ExecutionError> {
        self.executor.preflight().await
    }

    /// One attempt, bounded by the per-attempt timeout
    async fn attempt(&self, probe: &Probe) -> Result<ExecutionResult, ExecutionError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire().await;
        }

        let cancel = CancellationToken::new();
        match timeout(self.config.timeout, self.executor.execute(probe, cancel.clone())).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(ExecutionError::timeout(self.config.timeout))
            }
        }
    }

    /// Execute one probe with retries
    pub async fn execute(&self, probe: &Probe) -> Result<ExecutionResult, ExecutionError> {
        let mut result = with_retry_notify(
            &self.config.retry,
            || self.attempt(probe),
            |error: &ExecutionError, attempt, delay| {
                tracing::warn!(
                    probe_id = %probe.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Probe execution failed, retrying"
                );
            },
        )
        .await?;

        result.probe_id.clone_from(&probe.id);
        Ok(result)
    }

    /// Execute every probe `repetitions` times
    ///
    /// Records come back ordered by probe, then repetition. With
    /// `continue_on_error` failures become failed records; otherwise the first
    /// failure aborts the batch and is returned.
    pub async fn run_batch(
        &self,
        probes: &[Probe],
    ) -> Result<Vec<ExecutionRecord>, ExecutionError> {
        let repetitions = self.config.repetitions.max(1);
        let jobs: Vec<(&Probe, u32)> = probes
            .iter()
            .flat_map(|probe| (0..repetitions).map(move |rep| (probe, rep)))
            .collect();
        let keys: Vec<(String, u32)> = jobs.iter().map(|(p, rep)| (p.id.clone(), *rep)).collect();

        let options = ParallelOptions::new(self.config.max_concurrency)
            .continue_on_error(self.config.continue_on_error)
            .on_complete(|index, _: &ExecutionResult| {
                tracing::debug!(
                    probe_id = %keys[index].0,
                    repetition = keys[index].1,
                    "Probe executed"
                );
            })
            .on_error(|index, error: &ExecutionError| {
                tracing::warn!(
                    probe_id = %keys[index].0,
                    repetition = keys[index].1,
                    category = %error.category,
                    error = %error.message,
                    "Probe execution failed"
                );
            });

        let outcome = run_parallel(jobs, &options, |_, (probe, _)| self.execute(probe)).await?;

        tracing::info!(
            probes = probes.len(),
            repetitions,
            succeeded = outcome.success_count(),
            failed = outcome.error_count(),
            "Execution batch finished"
        );

        Ok(outcome
            .into_results()
            .into_iter()
            .zip(&keys)
            .map(|(result, (probe_id, rep))| match result {
                Ok(result) => ExecutionRecord::completed(result, *rep),
                Err(error) => ExecutionRecord::failed(probe_id.clone(), *rep, error.to_failure()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::RetryConfig;
    use crate::model::{ComponentRef, ErrorCategory, ExecutionOutcome};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Fails each probe a scripted number of times before succeeding
    #[derive(Default)]
    struct FlakyExecutor {
        failures: Mutex<HashMap<String, (usize, ExecutionError)>>,
        calls: Mutex<Vec<(String, Instant)>>,
        hang: Vec<String>,
    }

    impl FlakyExecutor {
        fn fail(self, id: &str, times: usize, error: ExecutionError) -> Self {
            self.failures.lock().unwrap().insert(id.to_string(), (times, error));
            self
        }

        fn calls_for(&self, id: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|(p, _)| p == id).count()
        }
    }

    #[async_trait]
    impl Executor for FlakyExecutor {
        async fn execute(
            &self,
            probe: &Probe,
            cancel: CancellationToken,
        ) -> Result<ExecutionResult, ExecutionError> {
            self.calls
                .lock()
                .unwrap()
                .push((probe.id.clone(), Instant::now()));

            if self.hang.contains(&probe.id) {
                cancel.cancelled().await;
                return Err(ExecutionError::cancelled());
            }

            let scripted = {
                let mut failures = self.failures.lock().unwrap();
                match failures.get_mut(&probe.id) {
                    Some((remaining, error)) if *remaining > 0 => {
                        *remaining -= 1;
                        Some(error.clone())
                    }
                    _ => None,
                }
            };
            match scripted {
                Some(error) => Err(error),
                None => Ok(ExecutionResult::new("").with_cost(0.01, 100)),
            }
        }
    }

    fn probes(n: usize) -> Vec<Probe> {
        (0..n)
            .map(|i| Probe::new(format!("p{i}"), ComponentRef::skill("commit"), true, "go"))
            .collect()
    }

    fn config() -> ExecutionConfig {
        ExecutionConfig {
            timeout: Duration::from_secs(10),
            retry: RetryConfig::default()
                .with_initial_delay(Duration::from_millis(10))
                .with_jitter(0.0),
            ..ExecutionConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let executor = Arc::new(FlakyExecutor::default().fail(
            "p0",
            2,
            ExecutionError::api("overloaded").with_status(529),
        ));
        let runner = ProbeRunner::with_config(executor.clone(), config());

        let records = runner.run_batch(&probes(1)).await.unwrap();
        assert_eq!(executor.calls_for("p0"), 3);
        assert!(!records[0].is_failed());
        assert_eq!(records[0].result().unwrap().probe_id, "p0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_recorded_and_not_retried() {
        let executor = Arc::new(FlakyExecutor {
            hang: vec!["p1".to_string()],
            ..Default::default()
        });
        let runner = ProbeRunner::with_config(executor.clone(), config());

        let records = runner.run_batch(&probes(3)).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(executor.calls_for("p1"), 1);

        match &records[1].outcome {
            ExecutionOutcome::Failed(failure) => {
                assert_eq!(failure.category, ErrorCategory::Timeout)
            }
            other => panic!("expected timeout failure, got {other:?}"),
        }
        assert!(!records[0].is_failed());
        assert!(!records[2].is_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_isolated() {
        let executor = Arc::new(FlakyExecutor::default().fail(
            "p2",
            9,
            ExecutionError::api("invalid request").with_status(400),
        ));
        let runner = ProbeRunner::with_config(executor.clone(), config());

        let records = runner.run_batch(&probes(4)).await.unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records.iter().filter(|r| r.is_failed()).count(), 1);
        assert_eq!(executor.calls_for("p2"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_fast_returns_error() {
        let executor = Arc::new(FlakyExecutor::default().fail(
            "p0",
            1,
            ExecutionError::api("bad input").with_status(400),
        ));
        let runner = ProbeRunner::with_config(
            executor,
            ExecutionConfig {
                continue_on_error: false,
                ..config()
            },
        );

        let error = runner.run_batch(&probes(2)).await.unwrap_err();
        assert_eq!(error.status, Some(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repetitions_and_rate_limit() {
        let executor = Arc::new(FlakyExecutor::default());
        let runner = ProbeRunner::with_config(
            executor.clone(),
            ExecutionConfig {
                repetitions: 2,
                requests_per_second: Some(5.0),
                ..config()
            },
        );

        let records = runner.run_batch(&probes(2)).await.unwrap();
        let keys: Vec<(&str, u32)> = records
            .iter()
            .map(|r| (r.probe_id.as_str(), r.repetition))
            .collect();
        assert_eq!(keys, vec![("p0", 0), ("p0", 1), ("p1", 0), ("p1", 1)]);

        let mut stamps: Vec<Instant> =
            executor.calls.lock().unwrap().iter().map(|(_, t)| *t).collect();
        stamps.sort();
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(200));
        }
    }
}
