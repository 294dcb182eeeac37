//! Declarative schedule definitions.
//!
//! Schedules can be described in YAML or JSON and turned into a frozen
//! [`Schedule`]:
//!
//! ```yaml
//! max_tokens: 100000
//! segments:
//!   - duration_secs: 10
//!     pattern: { kind: constant, rate: 10000 }
//!   - duration_secs: 5
//!     pattern: { kind: linear, start_rate: 100, end_rate: 0 }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{RampgateError, Result};
use crate::ratelimit::{Constant, Linear, RatePattern, Schedule, DEFAULT_MAX_TOKENS};

/// A complete schedule definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Cap on accumulated tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: f64,

    /// Segments in time order
    #[serde(default)]
    pub segments: Vec<SegmentConfig>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            segments: Vec::new(),
        }
    }
}

fn default_max_tokens() -> f64 {
    DEFAULT_MAX_TOKENS
}

/// One segment of a schedule definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// How long the segment lasts, in seconds
    pub duration_secs: u64,
    /// The rate pattern for the segment
    pub pattern: PatternConfig,
}

/// Rate pattern definitions, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PatternConfig {
    /// Fixed rate in tokens per second
    Constant { rate: f64 },
    /// Linear ramp; defaults to ramping over the whole segment
    Linear {
        start_rate: f64,
        end_rate: f64,
        #[serde(default)]
        duration_secs: Option<u64>,
    },
}

impl PatternConfig {
    /// Build the pattern for a segment lasting `segment_secs`.
    pub fn to_pattern(&self, segment_secs: u64) -> Result<Arc<dyn RatePattern>> {
        let pattern: Arc<dyn RatePattern> = match *self {
            PatternConfig::Constant { rate } => Arc::new(Constant::new(rate)?),
            PatternConfig::Linear {
                start_rate,
                end_rate,
                duration_secs,
            } => Arc::new(Linear::over_secs(
                start_rate,
                end_rate,
                duration_secs.unwrap_or(segment_secs),
            )?),
        };
        Ok(pattern)
    }
}

impl ScheduleConfig {
    /// Load a schedule definition from a file.
    ///
    /// Files ending in `.json` are parsed as JSON, anything else as YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading schedule configuration");

        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&contents)
        } else {
            Self::from_yaml(&contents)
        }
    }

    /// Parse a schedule definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| RampgateError::Config(format!("Failed to parse schedule: {}", e)))
    }

    /// Parse a schedule definition from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| RampgateError::Config(format!("Failed to parse schedule: {}", e)))
    }

    /// Validate the definition and freeze it into a [`Schedule`].
    pub fn build(&self) -> Result<Schedule> {
        let builder = self
            .segments
            .iter()
            .try_fold(Schedule::builder(), |builder, segment| {
                let pattern = segment.pattern.to_pattern(segment.duration_secs)?;
                Ok::<_, RampgateError>(builder.shared_segment(pattern, segment.duration_secs))
            })?;
        builder.max_tokens(self.max_tokens).build()
    }
}
