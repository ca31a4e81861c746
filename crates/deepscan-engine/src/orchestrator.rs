//! Analysis orchestration.
//!
//! One `analyze` call runs the whole pipeline for a single video:
//!
//! 1. Input checks (exists, non-empty, under the size limit)
//! 2. Timeout budget from the input size
//! 3. Scratch workspace creation
//! 4. Face, frame and audio analyzers through the bounded executor
//! 5. Normalization, fusion and risk classification
//! 6. Report assembly and workspace cleanup
//!
//! Every exit path yields a well-formed `AnalysisReport`; nothing is thrown
//! to the caller.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::Instrument;

use deepscan_models::{
    round2, AnalysisId, AnalysisReport, AnalysisStatus, OutcomeKind, SignalDetail, SignalKind,
    SignalScores, VideoHandle,
};

use crate::analyzer::{Analyzer, AnalyzerContext};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::executor::{panic_message, BoundedExecutor, BoundedRun};
use crate::fusion::{FusionOutcome, FusionPolicy};
use crate::guard::InputGuard;
use crate::logging::AnalysisLogger;
use crate::metrics::record_analysis;
use crate::normalizer::{NormalizedSet, ScoredSignal, SignalNormalizer};
use crate::risk::classify;
use crate::workspace::AnalysisWorkspace;

/// Runs completed so far, kept for partial reports on the outer timeout.
type CompletedRuns = Mutex<BTreeMap<SignalKind, BoundedRun>>;

/// How the guarded pipeline future ended.
enum PipelineEnd {
    Finished(EngineResult<(NormalizedSet, FusionOutcome)>),
    Panicked(Box<dyn Any + Send>),
    TimedOut(Duration),
}

/// Builder for [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: Option<EngineConfig>,
    analyzers: BTreeMap<SignalKind, Arc<dyn Analyzer>>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Register an analyzer in the slot for its signal kind. A later
    /// registration for the same kind replaces the earlier one.
    pub fn analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzers.insert(analyzer.kind(), analyzer);
        self
    }

    pub fn build(mut self) -> EngineResult<Orchestrator> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let mut take = |kind: SignalKind| {
            self.analyzers.remove(&kind).ok_or_else(|| {
                EngineError::invalid_config(format!("no analyzer registered for {} signal", kind))
            })
        };
        let face = take(SignalKind::Face)?;
        let frame = take(SignalKind::Frame)?;
        let audio = take(SignalKind::Audio)?;

        Ok(Orchestrator {
            guard: InputGuard::from_config(&config),
            normalizer: SignalNormalizer::new(config.audio_weights)?,
            fusion: FusionPolicy::from_config(&config)?,
            face,
            frame,
            audio,
            config,
        })
    }
}

/// Coordinates one analysis end to end.
///
/// Holds no per-call state, so one instance can serve concurrent calls.
/// Each call gets its own worker pool.
pub struct Orchestrator {
    config: EngineConfig,
    guard: InputGuard,
    normalizer: SignalNormalizer,
    fusion: FusionPolicy,
    face: Arc<dyn Analyzer>,
    frame: Arc<dyn Analyzer>,
    audio: Arc<dyn Analyzer>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn analyzer(&self, kind: SignalKind) -> &Arc<dyn Analyzer> {
        match kind {
            SignalKind::Face => &self.face,
            SignalKind::Frame => &self.frame,
            SignalKind::Audio => &self.audio,
        }
    }

    /// Analyze the video at `path`.
    pub async fn analyze_path(&self, path: impl Into<PathBuf>) -> AnalysisReport {
        self.analyze(VideoHandle::new(path)).await
    }

    /// Run the full pipeline. Never fails: errors become a report with
    /// `status = Failed`.
    pub async fn analyze(&self, video: VideoHandle) -> AnalysisReport {
        let analysis_id = AnalysisId::new();
        let logger = AnalysisLogger::new(&analysis_id, &video.path().display().to_string());
        let span = logger.create_span();

        let report = self.run(analysis_id, video, &logger).instrument(span).await;

        record_analysis(
            report.status,
            report.processing_time_seconds,
            report.confidence_score,
        );
        report
    }

    async fn run(
        &self,
        analysis_id: AnalysisId,
        video: VideoHandle,
        logger: &AnalysisLogger,
    ) -> AnalysisReport {
        let start = Instant::now();
        let completed = CompletedRuns::default();

        let video = match self.guard.inspect(&video).await {
            Ok(video) => video,
            Err(e) => {
                return self.failed_report(analysis_id, e.into(), start, &completed, logger);
            }
        };

        let budget = self.config.timeouts_for(video.size_bytes);
        logger.log_start(&format!(
            "{} bytes, analyzer timeout {}s, pipeline timeout {}s",
            video.size_bytes,
            budget.analyzer.as_secs_f64(),
            budget.pipeline.as_secs_f64()
        ));

        let workspace =
            match AnalysisWorkspace::create(self.config.work_dir.as_deref(), analysis_id.as_str()) {
                Ok(workspace) => workspace,
                Err(e) => {
                    return self.failed_report(analysis_id, e.into(), start, &completed, logger);
                }
            };

        let executor =
            BoundedExecutor::new(self.config.max_parallel_analyzers, self.config.release_timeout);
        let pipeline = AssertUnwindSafe(self.execute(
            &executor,
            &analysis_id,
            &video,
            workspace.path(),
            budget.analyzer,
            &completed,
            logger,
        ))
        .catch_unwind();

        let end = match tokio::time::timeout(budget.pipeline, pipeline).await {
            Ok(Ok(result)) => PipelineEnd::Finished(result),
            Ok(Err(panic)) => PipelineEnd::Panicked(panic),
            Err(_) => PipelineEnd::TimedOut(budget.pipeline),
        };
        self.conclude(analysis_id, end, workspace, start, &completed, logger)
    }

    /// Map the pipeline's end state to a report and remove the workspace.
    fn conclude(
        &self,
        analysis_id: AnalysisId,
        end: PipelineEnd,
        workspace: AnalysisWorkspace,
        start: Instant,
        completed: &CompletedRuns,
        logger: &AnalysisLogger,
    ) -> AnalysisReport {
        let report = match end {
            PipelineEnd::Finished(Ok((signals, fusion))) => {
                self.assemble(analysis_id, completed, &signals, fusion, start, logger)
            }
            PipelineEnd::Finished(Err(e)) => {
                self.failed_report(analysis_id, e, start, completed, logger)
            }
            PipelineEnd::Panicked(panic) => {
                let error = EngineError::internal(panic_message(panic));
                self.failed_report(analysis_id, error, start, completed, logger)
            }
            PipelineEnd::TimedOut(limit) => {
                let error = EngineError::PipelineTimeout(limit.as_secs_f64());
                self.failed_report(analysis_id, error, start, completed, logger)
            }
        };

        workspace.close();
        report
    }

    /// Analyzers, normalization and fusion. Completed runs are recorded in
    /// `completed` as they finish.
    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        executor: &BoundedExecutor,
        analysis_id: &AnalysisId,
        video: &VideoHandle,
        scratch_dir: &Path,
        analyzer_timeout: Duration,
        completed: &CompletedRuns,
        logger: &AnalysisLogger,
    ) -> EngineResult<(NormalizedSet, FusionOutcome)> {
        let run = |kind: SignalKind| {
            self.run_signal(
                executor,
                kind,
                analysis_id,
                video,
                scratch_dir,
                analyzer_timeout,
                completed,
            )
        };

        if self.config.run_concurrently {
            tokio::join!(
                run(SignalKind::Face),
                run(SignalKind::Frame),
                run(SignalKind::Audio)
            );
        } else {
            for kind in SignalKind::ALL {
                run(*kind).await;
            }
        }
        logger.log_progress("analyzers finished");

        let outcome = |kind: SignalKind| {
            lock(completed)
                .get(&kind)
                .map(|run| run.outcome.clone())
                .ok_or_else(|| EngineError::internal(format!("missing {} analyzer result", kind)))
        };
        let face = outcome(SignalKind::Face)?;
        let frame = outcome(SignalKind::Frame)?;
        let audio = outcome(SignalKind::Audio)?;

        let signals = self.normalizer.normalize(&face, &frame, &audio);
        for kind in SignalKind::ALL {
            let scored = signals.get(*kind);
            if !scored.reliable() {
                logger.log_warning(&format!(
                    "{} signal degraded: {}",
                    kind,
                    scored.note.as_deref().unwrap_or("unreliable")
                ));
            }
        }

        let fusion = self.fusion.fuse(&signals)?;
        Ok((signals, fusion))
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_signal(
        &self,
        executor: &BoundedExecutor,
        kind: SignalKind,
        analysis_id: &AnalysisId,
        video: &VideoHandle,
        scratch_dir: &Path,
        timeout: Duration,
        completed: &CompletedRuns,
    ) {
        let ctx = AnalyzerContext::new(
            analysis_id.as_str(),
            self.config.sampling.stride_for(kind),
            scratch_dir,
        );

        let run = executor
            .run_bounded(Arc::clone(self.analyzer(kind)), video, ctx, timeout)
            .await;
        lock(completed).insert(kind, run);
    }

    fn assemble(
        &self,
        analysis_id: AnalysisId,
        completed: &CompletedRuns,
        signals: &NormalizedSet,
        fusion: FusionOutcome,
        start: Instant,
        logger: &AnalysisLogger,
    ) -> AnalysisReport {
        let runs = lock(completed);
        let (risk_level, verdict) = classify(fusion.confidence_score);

        let mut signal_details = BTreeMap::new();
        for kind in SignalKind::ALL {
            if let Some(run) = runs.get(kind) {
                let summary = match kind {
                    SignalKind::Audio => signals.audio_summary.clone(),
                    _ => None,
                };
                signal_details.insert(*kind, signal_detail(run, signals.get(*kind), summary));
            }
        }
        let analysis_error = |kind: SignalKind| runs.get(&kind).and_then(|run| run.outcome.error_message());

        let report = AnalysisReport {
            analysis_id,
            confidence_score: fusion.confidence_score,
            risk_level: Some(risk_level),
            verdict: Some(verdict.to_string()),
            per_signal_scores: SignalScores {
                face: round2(signals.face.score()),
                frame: round2(signals.frame.score()),
                audio: round2(signals.audio.score()),
            },
            fusion_weights: Some(fusion.weights),
            signal_details,
            processing_time_seconds: round2(start.elapsed().as_secs_f64()),
            status: AnalysisStatus::Ok,
            error: None,
            face_analysis_error: analysis_error(SignalKind::Face),
            frame_analysis_error: analysis_error(SignalKind::Frame),
            audio_analysis_error: analysis_error(SignalKind::Audio),
            created_at: chrono::Utc::now(),
        };

        logger.log_completion(&format!(
            "confidence {:.2}, risk {}",
            report.confidence_score, risk_level
        ));
        report
    }

    /// Failed report carrying whatever analyzers finished before the error.
    fn failed_report(
        &self,
        analysis_id: AnalysisId,
        error: EngineError,
        start: Instant,
        completed: &CompletedRuns,
        logger: &AnalysisLogger,
    ) -> AnalysisReport {
        logger.log_error(&format!("{} ({})", error, error.kind()));

        let mut report = AnalysisReport::failed(
            analysis_id,
            error.to_string(),
            start.elapsed().as_secs_f64(),
        );

        let runs = lock(completed);
        let audio = runs.get(&SignalKind::Audio).map(|run| &run.outcome);
        for (kind, run) in runs.iter() {
            let scored = self.normalizer.normalize_one(*kind, &run.outcome, audio);
            let score = round2(scored.score());
            match kind {
                SignalKind::Face => {
                    report.per_signal_scores.face = score;
                    report.face_analysis_error = run.outcome.error_message();
                }
                SignalKind::Frame => {
                    report.per_signal_scores.frame = score;
                    report.frame_analysis_error = run.outcome.error_message();
                }
                SignalKind::Audio => {
                    report.per_signal_scores.audio = score;
                    report.audio_analysis_error = run.outcome.error_message();
                }
            }
            report
                .signal_details
                .insert(*kind, signal_detail(run, &scored, None));
        }
        report
    }
}

fn signal_detail(run: &BoundedRun, scored: &ScoredSignal, summary: Option<String>) -> SignalDetail {
    SignalDetail {
        score: round2(scored.score()),
        reliable: scored.reliable(),
        outcome: OutcomeKind::from(&run.outcome),
        error: run.outcome.error_message().or_else(|| scored.note.clone()),
        metrics: run.outcome.payload().cloned().unwrap_or_default(),
        elapsed_seconds: round2(run.elapsed.as_secs_f64()),
        summary,
    }
}

/// The map only holds plain data, so a poisoned lock is still usable.
fn lock(completed: &CompletedRuns) -> std::sync::MutexGuard<'_, BTreeMap<SignalKind, BoundedRun>> {
    completed
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
