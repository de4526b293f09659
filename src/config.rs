//! Analysis configuration
//!
//! One immutable value threaded through every pipeline stage. Loaded from an
//! optional JSON file, then overridden from the environment (`.env` is read by
//! the binary before this runs).

use crate::dataset::Dimension;
use crate::error::{InsightError, Result};
use crate::metrics::Metric;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Allowed comparison window lengths, in days
    pub time_windows: Vec<u32>,

    /// Minimum final score for an insight to be validated
    pub confidence_min: f64,

    /// Dimensions available for segment analysis, in configured order
    pub segment_dims: Vec<Dimension>,

    /// KPIs to prioritize after the ones the task mentions
    pub kpis: Vec<Metric>,

    pub ranking: RankingConfig,
    pub scoring: ScoringConfig,
    pub creative: CreativeConfig,
    pub llm: LlmConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            time_windows: vec![7, 14, 28],
            confidence_min: 0.6,
            segment_dims: vec![
                Dimension::CampaignName,
                Dimension::AdsetName,
                Dimension::CreativeType,
                Dimension::AudienceType,
                Dimension::Platform,
                Dimension::Country,
            ],
            kpis: vec![Metric::Roas, Metric::Revenue, Metric::Cpa, Metric::Ctr],
            ranking: RankingConfig::default(),
            scoring: ScoringConfig::default(),
            creative: CreativeConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactMetric {
    RevenueDelta,
    RoasDeltaWeighted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub impact_metric: ImpactMetric,
    pub top_n: usize,

    /// Allow new/dropped segments in the loser list
    pub include_flagged_losers: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            impact_metric: ImpactMetric::RevenueDelta,
            top_n: 5,
            include_flagged_losers: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisWeights {
    pub correctness: f64,
    pub specificity: f64,
    pub actionability: f64,
    pub alignment: f64,
}

impl Default for AxisWeights {
    fn default() -> Self {
        Self {
            correctness: 1.0,
            specificity: 1.0,
            actionability: 1.0,
            alignment: 1.0,
        }
    }
}

impl AxisWeights {
    pub fn total(&self) -> f64 {
        self.correctness + self.specificity + self.actionability + self.alignment
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Relative error at or below which a claim scores 1.0
    pub tolerance: f64,

    /// Absolute error at or below which a claim scores 1.0 (display rounding)
    pub absolute_tolerance: f64,

    /// Relative error at or above which a claim scores 0.0
    pub max_error: f64,

    pub weights: AxisWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            absolute_tolerance: 0.005,
            max_error: 0.25,
            weights: AxisWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CtrThreshold {
    /// Median CTR of the candidate distribution, scaled by `factor`
    Median { factor: f64 },
    Fixed { floor: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CreativeConfig {
    pub dimension: Dimension,
    pub threshold: CtrThreshold,
    pub min_spend: f64,
    pub improvement_factor: f64,
    pub max_recommendations: usize,
}

impl Default for CreativeConfig {
    fn default() -> Self {
        Self {
            dimension: Dimension::CampaignName,
            threshold: CtrThreshold::Median { factor: 1.0 },
            min_spend: 1000.0,
            improvement_factor: 0.4,
            max_recommendations: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "openai" enables the LLM drafter; anything else keeps the rule-based path
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub timeout_seconds: u64,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub max_revisions: u32,

    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.2,
            timeout_seconds: 10,
            max_attempts: 2,
            backoff_ms: 500,
            max_revisions: 1,
            api_key: None,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn enabled(&self) -> bool {
        self.provider.eq_ignore_ascii_case("openai") && self.api_key.is_some()
    }
}

impl AnalysisConfig {
    /// Load from a JSON file when given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                info!("Loading configuration from {:?}", p);
                let text = std::fs::read_to_string(p)?;
                serde_json::from_str::<AnalysisConfig>(&text)?
            }
            None => AnalysisConfig::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(raw) = std::env::var("ADSIGHT_CONFIDENCE_MIN") {
            match raw.trim().parse::<f64>() {
                Ok(v) => self.confidence_min = v,
                Err(_) => warn!("Ignoring unparsable ADSIGHT_CONFIDENCE_MIN '{}'", raw),
            }
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            self.llm.model = model;
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.time_windows.is_empty() || self.time_windows.contains(&0) {
            return Err(InsightError::Config(
                "time_windows must be a non-empty list of positive day counts".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_min) {
            return Err(InsightError::Config(format!(
                "confidence_min must be within [0, 1], got {}",
                self.confidence_min
            )));
        }
        if self.segment_dims.is_empty() {
            return Err(InsightError::Config("segment_dims must not be empty".to_string()));
        }
        let s = &self.scoring;
        if s.tolerance < 0.0 || s.absolute_tolerance < 0.0 || s.max_error <= s.tolerance {
            return Err(InsightError::Config(format!(
                "scoring tolerances must satisfy 0 <= tolerance < max_error (got {} / {})",
                s.tolerance, s.max_error
            )));
        }
        let w = &s.weights;
        if [w.correctness, w.specificity, w.actionability, w.alignment]
            .iter()
            .any(|v| *v < 0.0)
            || w.total() <= 0.0
        {
            return Err(InsightError::Config(
                "axis weights must be non-negative with a positive sum".to_string(),
            ));
        }
        if self.ranking.top_n == 0 {
            return Err(InsightError::Config("ranking.top_n must be at least 1".to_string()));
        }
        if self.creative.improvement_factor < 0.0 {
            return Err(InsightError::Config(
                "creative.improvement_factor must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn smallest_window(&self) -> u32 {
        self.time_windows.iter().copied().min().unwrap_or(7)
    }
}
