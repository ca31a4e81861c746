//! Sampling quality presets.
//!
//! A preset trades analysis time for coverage by choosing the frame-sampling
//! stride handed to every analyzer:
//!
//! - `Low`: every 4th frame
//! - `Medium`: every 2nd frame
//! - `High`: every frame

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl AnalysisQuality {
    pub const ALL: &'static [AnalysisQuality] = &[
        AnalysisQuality::Low,
        AnalysisQuality::Medium,
        AnalysisQuality::High,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisQuality::Low => "low",
            AnalysisQuality::Medium => "medium",
            AnalysisQuality::High => "high",
        }
    }

    /// Frame-sampling stride for this preset (analyze every n-th frame).
    pub fn frame_stride(&self) -> u32 {
        match self {
            AnalysisQuality::Low => 4,
            AnalysisQuality::Medium => 2,
            AnalysisQuality::High => 1,
        }
    }
}

impl fmt::Display for AnalysisQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AnalysisQuality {
    type Err = QualityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "fast" => Ok(AnalysisQuality::Low),
            "medium" | "balanced" => Ok(AnalysisQuality::Medium),
            "high" | "thorough" => Ok(AnalysisQuality::High),
            _ => Err(QualityParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown analysis quality: {0}")]
pub struct QualityParseError(String);
