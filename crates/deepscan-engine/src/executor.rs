//! Bounded analyzer execution.
//!
//! Every analyzer call runs on its own tokio task under a hard deadline and
//! comes back as a tagged `AnalyzerOutcome`; nothing an analyzer does
//! (error, panic, hang) escapes past this module.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::{watch, Semaphore};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use deepscan_models::{AnalyzerOutcome, OutcomeKind, VideoHandle};

use crate::analyzer::{Analyzer, AnalyzerContext};
use crate::metrics::record_analyzer_run;

/// Outcome of one bounded call plus its wall-clock duration.
#[derive(Debug, Clone)]
pub struct BoundedRun {
    pub outcome: AnalyzerOutcome,
    pub elapsed: Duration,
}

/// Cancels and aborts the worker unless disarmed.
///
/// Dropping the guard (for example when the whole pipeline future is dropped
/// on the outer timeout) stops a worker that would otherwise be detached.
struct CancelGuard {
    tx: Option<watch::Sender<bool>>,
    worker: Option<AbortHandle>,
}

impl CancelGuard {
    fn new(tx: watch::Sender<bool>) -> Self {
        Self {
            tx: Some(tx),
            worker: None,
        }
    }

    fn watch(&mut self, worker: AbortHandle) {
        self.worker = Some(worker);
    }

    fn disarm(&mut self) {
        self.tx = None;
        self.worker = None;
    }

    fn cancel(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(true);
        }
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Runs analyzer calls on a bounded worker pool.
///
/// The orchestrator creates one executor per analysis, so the pool only
/// bounds the analyzers of a single call.
#[derive(Debug, Clone)]
pub struct BoundedExecutor {
    permits: Arc<Semaphore>,
    release_timeout: Duration,
}

impl BoundedExecutor {
    /// Create an executor allowing `max_in_flight` concurrent analyzer calls.
    pub fn new(max_in_flight: usize, release_timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            release_timeout,
        }
    }

    /// Number of idle worker slots.
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run one analyzer call, waiting at most `timeout` once a worker slot
    /// is free.
    ///
    /// Waiting for the slot itself is unbounded here; the caller's outer
    /// deadline covers it.
    pub async fn run_bounded(
        &self,
        analyzer: Arc<dyn Analyzer>,
        video: &VideoHandle,
        ctx: AnalyzerContext,
        timeout: Duration,
    ) -> BoundedRun {
        let start = Instant::now();
        let name = analyzer.name();

        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return self.finish(name, AnalyzerOutcome::failure("Worker pool closed"), start);
            }
        };
        let deadline = tokio::time::Instant::now() + timeout;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut guard = CancelGuard::new(cancel_tx);
        let ctx = ctx.with_cancel(cancel_rx);

        let worker = Arc::clone(&analyzer);
        let worker_video = video.clone();
        let mut handle = tokio::spawn(async move {
            let _permit = permit;
            worker.analyze(&worker_video, &ctx).await
        });
        guard.watch(handle.abort_handle());

        let result = tokio::time::timeout_at(deadline, &mut handle).await;
        let outcome = match result {
            Ok(Ok(Ok(payload))) => {
                guard.disarm();
                AnalyzerOutcome::success(payload)
            }
            Ok(Ok(Err(e))) => {
                guard.disarm();
                debug!(analyzer = name, error = %e, "Analyzer returned an error");
                AnalyzerOutcome::failure(e.to_string())
            }
            Ok(Err(join_err)) => {
                guard.disarm();
                if join_err.is_panic() {
                    let message = panic_message(join_err.into_panic());
                    warn!(analyzer = name, panic = %message, "Analyzer panicked");
                    AnalyzerOutcome::failure(format!("Analyzer panicked: {}", message))
                } else {
                    AnalyzerOutcome::failure("Analyzer task was cancelled")
                }
            }
            Err(_) => {
                warn!(
                    analyzer = name,
                    timeout_secs = timeout.as_secs_f64(),
                    "Analyzer timed out, abandoning worker"
                );
                guard.cancel();
                self.release(analyzer.as_ref(), video).await;
                AnalyzerOutcome::Timeout
            }
        };

        self.finish(name, outcome, start)
    }

    /// Best-effort cleanup after a timeout. Failures are logged, never raised.
    async fn release(&self, analyzer: &dyn Analyzer, video: &VideoHandle) {
        let name = analyzer.name();
        let release = AssertUnwindSafe(analyzer.release(video)).catch_unwind();

        match tokio::time::timeout(self.release_timeout, release).await {
            Ok(Ok(Ok(()))) => debug!(analyzer = name, "Released analyzer resources"),
            Ok(Ok(Err(e))) => {
                warn!(analyzer = name, error = %e, "Analyzer cleanup failed after timeout")
            }
            Ok(Err(panic)) => warn!(
                analyzer = name,
                panic = %panic_message(panic),
                "Analyzer cleanup panicked after timeout"
            ),
            Err(_) => warn!(
                analyzer = name,
                timeout_secs = self.release_timeout.as_secs_f64(),
                "Analyzer cleanup did not finish in time"
            ),
        }
    }

    fn finish(&self, name: &'static str, outcome: AnalyzerOutcome, start: Instant) -> BoundedRun {
        let elapsed = start.elapsed();
        record_analyzer_run(name, OutcomeKind::from(&outcome), elapsed.as_secs_f64());
        BoundedRun { outcome, elapsed }
    }
}

/// Extract a printable message from a panic payload.
pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use deepscan_models::{AnalyzerPayload, SignalKind};

    use crate::error::AnalyzerError;

    enum Behavior {
        Succeed,
        Fail,
        Panic,
        Hang,
    }

    struct TestAnalyzer {
        behavior: Behavior,
        released: AtomicBool,
        fail_release: bool,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl TestAnalyzer {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                released: AtomicBool::new(false),
                fail_release: false,
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Analyzer for TestAnalyzer {
        fn name(&self) -> &'static str {
            "test"
        }

        fn kind(&self) -> SignalKind {
            SignalKind::Frame
        }

        async fn analyze(
            &self,
            _video: &VideoHandle,
            ctx: &AnalyzerContext,
        ) -> Result<AnalyzerPayload, AnalyzerError> {
            match self.behavior {
                Behavior::Succeed => {
                    let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
                    self.peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    self.running.fetch_sub(1, Ordering::SeqCst);
                    Ok(AnalyzerPayload::new().with("stride", ctx.frame_stride() as f64))
                }
                Behavior::Fail => Err(AnalyzerError::failed("decoder exploded")),
                Behavior::Panic => panic!("index out of bounds"),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(AnalyzerPayload::new())
                }
            }
        }

        async fn release(&self, _video: &VideoHandle) -> Result<(), AnalyzerError> {
            self.released.store(true, Ordering::SeqCst);
            if self.fail_release {
                Err(AnalyzerError::failed("handle already closed"))
            } else {
                Ok(())
            }
        }
    }

    fn ctx() -> AnalyzerContext {
        AnalyzerContext::new("test-analysis", 5, std::env::temp_dir())
    }

    fn video() -> VideoHandle {
        VideoHandle::new("/tmp/sample.mp4").with_size(1024)
    }

    #[tokio::test]
    async fn test_success_wraps_payload() {
        let executor = BoundedExecutor::new(2, Duration::from_secs(1));
        let analyzer = Arc::new(TestAnalyzer::new(Behavior::Succeed));

        let run = executor
            .run_bounded(analyzer, &video(), ctx(), Duration::from_secs(2))
            .await;

        let payload = run.outcome.payload().expect("success");
        assert_eq!(payload.get("stride"), Some(5.0));
    }

    #[tokio::test]
    async fn test_error_becomes_failure() {
        let executor = BoundedExecutor::new(2, Duration::from_secs(1));
        let analyzer = Arc::new(TestAnalyzer::new(Behavior::Fail));

        let run = executor
            .run_bounded(analyzer, &video(), ctx(), Duration::from_secs(2))
            .await;

        assert_eq!(run.outcome, AnalyzerOutcome::failure("decoder exploded"));
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let executor = BoundedExecutor::new(2, Duration::from_secs(1));
        let analyzer = Arc::new(TestAnalyzer::new(Behavior::Panic));

        let run = executor
            .run_bounded(analyzer, &video(), ctx(), Duration::from_secs(2))
            .await;

        match run.outcome {
            AnalyzerOutcome::Failure { reason } => {
                assert!(reason.contains("index out of bounds"), "{}", reason)
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(executor.available_workers(), 2);
    }

    #[tokio::test]
    async fn test_timeout_releases_and_returns_promptly() {
        let executor = BoundedExecutor::new(2, Duration::from_secs(1));
        let analyzer = Arc::new(TestAnalyzer::new(Behavior::Hang));

        let run = executor
            .run_bounded(analyzer.clone(), &video(), ctx(), Duration::from_millis(50))
            .await;

        assert_eq!(run.outcome, AnalyzerOutcome::Timeout);
        assert!(run.elapsed < Duration::from_secs(5));
        assert!(analyzer.released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_release_failure_is_swallowed() {
        let executor = BoundedExecutor::new(1, Duration::from_secs(1));
        let mut analyzer = TestAnalyzer::new(Behavior::Hang);
        analyzer.fail_release = true;
        let analyzer = Arc::new(analyzer);

        let run = executor
            .run_bounded(analyzer.clone(), &video(), ctx(), Duration::from_millis(30))
            .await;

        assert_eq!(run.outcome, AnalyzerOutcome::Timeout);
        assert!(analyzer.released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_pool_bounds_concurrency() {
        let executor = BoundedExecutor::new(1, Duration::from_secs(1));
        let analyzer = Arc::new(TestAnalyzer::new(Behavior::Succeed));

        let video = video();
        let (a, b, c) = tokio::join!(
            executor.run_bounded(analyzer.clone(), &video, ctx(), Duration::from_secs(2)),
            executor.run_bounded(analyzer.clone(), &video, ctx(), Duration::from_secs(2)),
            executor.run_bounded(analyzer.clone(), &video, ctx(), Duration::from_secs(2)),
        );

        assert!(a.outcome.is_success() && b.outcome.is_success() && c.outcome.is_success());
        assert_eq!(analyzer.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_queue_wait_does_not_consume_timeout() {
        let executor = BoundedExecutor::new(1, Duration::from_secs(1));
        let analyzer = Arc::new(TestAnalyzer::new(Behavior::Succeed));

        // Each call takes 30ms; the last one queues behind two others for
        // longer than its own 50ms budget.
        let video = video();
        let timeout = Duration::from_millis(50);
        let (a, b, c) = tokio::join!(
            executor.run_bounded(analyzer.clone(), &video, ctx(), timeout),
            executor.run_bounded(analyzer.clone(), &video, ctx(), timeout),
            executor.run_bounded(analyzer.clone(), &video, ctx(), timeout),
        );

        for run in [a, b, c] {
            assert!(run.outcome.is_success(), "{:?}", run.outcome);
        }
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(Box::new("static str")), "static str");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42_u8)), "Unknown panic");
    }
}
