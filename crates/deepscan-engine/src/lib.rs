//! Multi-signal fusion engine for video authenticity analysis.
//!
//! This crate provides:
//! - The `Analyzer` trait implemented by the face, frame and audio detectors
//! - A bounded executor that turns every analyzer call into a tagged outcome
//! - Signal normalization, weighted fusion and risk classification
//! - The `Orchestrator` that runs one analysis end to end and always
//!   returns a well-formed `AnalysisReport`

pub mod analyzer;
pub mod config;
pub mod error;
pub mod executor;
pub mod fusion;
pub mod guard;
pub mod logging;
pub mod metrics;
pub mod normalizer;
pub mod orchestrator;
pub mod replay;
pub mod risk;
pub mod workspace;

pub use analyzer::{Analyzer, AnalyzerContext};
pub use config::{EngineConfig, SamplingConfig, TimeoutBudget};
pub use error::{AnalyzerError, EngineError, EngineResult, InputError};
pub use executor::{BoundedExecutor, BoundedRun};
pub use fusion::{FusionOutcome, FusionPolicy};
pub use guard::{InputGuard, SUPPORTED_EXTENSIONS};
pub use logging::AnalysisLogger;
pub use normalizer::{AudioSubWeights, NormalizedSet, ScoredSignal, SignalNormalizer};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use replay::ReplayAnalyzer;
pub use risk::classify;
pub use workspace::AnalysisWorkspace;

pub use deepscan_models;
