//! Insight model
//!
//! Insights arrive from a drafter (rule-based or LLM) and are read-only from
//! then on. Claimed numbers are keyed by measure names such as `roas_cur` or
//! `revenue_delta` so that they can be recomputed from evidence.

use crate::dataset::Dimension;
use crate::error::{InsightError, Result};
use crate::metrics::{Metric, Ratio};
use crate::window::{ComparisonResult, SegmentKey, WindowPair};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const OVERVIEW_REF: &str = "overview";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reasoning {
    #[serde(default)]
    pub think: String,
    #[serde(default)]
    pub analyze: String,
    #[serde(default)]
    pub conclude: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

impl ImpactLevel {
    /// Thresholds on absolute revenue delta, spend share and ROAS delta.
    pub fn classify(revenue_delta: f64, roas_delta: f64, spend_share: f64) -> Self {
        let rev = revenue_delta.abs();
        let roas = roas_delta.abs();
        if (rev > 10_000.0 && spend_share > 0.1) || roas > 2.0 {
            ImpactLevel::High
        } else if (rev > 5_000.0 && spend_share > 0.05) || roas > 1.0 {
            ImpactLevel::Medium
        } else {
            ImpactLevel::Low
        }
    }
}

impl Default for ImpactLevel {
    fn default() -> Self {
        ImpactLevel::Low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,

    /// Measure name (`roas_cur`, `revenue_delta`, ...) -> claimed value
    #[serde(default)]
    pub claimed_numbers: BTreeMap<String, f64>,

    #[serde(default)]
    pub segment_filters: BTreeMap<Dimension, String>,

    #[serde(default)]
    pub evidence_refs: Vec<String>,

    #[serde(default)]
    pub confidence: f64,

    #[serde(default)]
    pub impact: ImpactLevel,

    #[serde(default)]
    pub reasoning: Option<Reasoning>,
}

impl Insight {
    /// The segment this insight is about, if any. Only the first filter is
    /// returned; `resolve_evidence` rejects insights with more than one.
    pub fn segment_key(&self) -> Option<SegmentKey> {
        let (dim, value) = self.segment_filters.iter().next()?;
        Some(SegmentKey::new(*dim, value.clone()))
    }

    pub fn is_overview(&self) -> bool {
        self.segment_filters.is_empty()
    }

    /// Title and reasoning joined for text heuristics.
    pub fn text(&self) -> String {
        match &self.reasoning {
            Some(r) => format!("{}\n{}\n{}\n{}", self.title, r.think, r.analyze, r.conclude),
            None => self.title.clone(),
        }
    }

    /// The conclusion if present, otherwise the title.
    pub fn conclusion(&self) -> &str {
        match &self.reasoning {
            Some(r) if !r.conclude.trim().is_empty() => &r.conclude,
            _ => &self.title,
        }
    }

    /// Resolve the evidence this insight points at. The error is a note for
    /// the evaluator, never a fatal condition.
    pub fn resolve_evidence<'a>(
        &self,
        comparison: &'a ComparisonResult,
    ) -> std::result::Result<&'a WindowPair, String> {
        if self.segment_filters.len() > 1 {
            let filters = self
                .segment_filters
                .iter()
                .map(|(dim, value)| format!("{}={}", dim, value))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(format!(
                "insight filters on several segments ({}); evidence covers one segment per insight",
                filters
            ));
        }
        match self.segment_key() {
            Some(key) => comparison.segment(&key).ok_or_else(|| {
                let hint = comparison
                    .dimension(key.dimension)
                    .and_then(|pairs| closest_name(&key.value, pairs.keys()))
                    .map(|s| format!(" (did you mean '{}'?)", s))
                    .unwrap_or_default();
                format!("segment {} not found in evidence{}", key, hint)
            }),
            None if self.evidence_refs.is_empty() || self.evidence_refs.iter().any(|r| r == OVERVIEW_REF) => {
                Ok(&comparison.global)
            }
            None => Err(format!(
                "evidence refs {:?} do not name a segment or the overview",
                self.evidence_refs
            )),
        }
    }
}

fn closest_name<'a>(target: &str, candidates: impl Iterator<Item = &'a String>) -> Option<&'a String> {
    let lowered = target.to_lowercase();
    candidates
        .map(|c| (c, strsim::jaro_winkler(&lowered, &c.to_lowercase())))
        .filter(|(_, score)| *score >= 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
}

/// Which side of a window pair a claim refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Current(Metric),
    Baseline(Metric),
    Delta(Metric),
    PctChange(Metric),
    SpendShare,
}

impl Measure {
    /// Recompute from evidence. `None` when the value is undefined there.
    pub fn evaluate(&self, pair: &WindowPair) -> Option<f64> {
        match self {
            Measure::Current(m) => pair.current.ratio(*m).value(),
            Measure::Baseline(m) => pair.baseline.ratio(*m).value(),
            Measure::Delta(m) => Some(pair.delta(*m)),
            Measure::PctChange(m) => pair.pct_change(*m).value(),
            Measure::SpendShare => Some(pair.spend_share),
        }
    }

    /// Flag for a current/baseline ratio the report shows as 0.00, `None`
    /// when the value is defined or the measure is not a window ratio.
    pub fn sentinel_flag(&self, pair: &WindowPair) -> Option<&'static str> {
        let ratio = match self {
            Measure::Current(m) => pair.current.ratio(*m),
            Measure::Baseline(m) => pair.baseline.ratio(*m),
            _ => return None,
        };
        match ratio {
            Ratio::Undefined => Some(self.metric().undefined_flag()),
            Ratio::Defined(_) => None,
        }
    }

    pub fn metric(&self) -> Metric {
        match self {
            Measure::Current(m) | Measure::Baseline(m) | Measure::Delta(m) | Measure::PctChange(m) => *m,
            Measure::SpendShare => Metric::Spend,
        }
    }

    /// Claim for a ratio that may be undefined; undefined values are not claimed.
    pub fn claim(&self, pair: &WindowPair) -> Option<(String, f64)> {
        self.evaluate(pair).map(|v| (self.to_string(), v))
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::Current(m) => write!(f, "{}_cur", m),
            Measure::Baseline(m) => write!(f, "{}_base", m),
            Measure::Delta(m) => write!(f, "{}_delta", m),
            Measure::PctChange(m) => write!(f, "{}_pct_change", m),
            Measure::SpendShare => f.write_str("spend_share"),
        }
    }
}

impl FromStr for Measure {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_lowercase();
        if name == "spend_share" {
            return Ok(Measure::SpendShare);
        }
        let suffixes: [(&str, fn(Metric) -> Measure); 6] = [
            ("_pct_change", Measure::PctChange),
            ("_pct", Measure::PctChange),
            ("_delta", Measure::Delta),
            ("_cur", Measure::Current),
            ("_current", Measure::Current),
            ("_base", Measure::Baseline),
        ];
        for (suffix, build) in suffixes {
            if let Some(metric) = name.strip_suffix(suffix) {
                return Ok(build(metric.parse::<Metric>()?));
            }
        }
        if let Some(metric) = name.strip_suffix("_baseline") {
            return Ok(Measure::Baseline(metric.parse::<Metric>()?));
        }
        Err(InsightError::Config(format!("Unknown measure: {}", s)))
    }
}

/// Display helper for ratios at the report boundary.
pub fn format_ratio(ratio: Ratio, flag: &str) -> String {
    match ratio {
        Ratio::Defined(v) => format!("{:.2}", v),
        Ratio::Undefined => format!("0.00 ({})", flag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricSet;
    use crate::window::ComparisonWindows;
    use chrono::NaiveDate;

    fn comparison() -> ComparisonResult {
        let pair = WindowPair::new(
            MetricSet::from_totals(1, 100.0, 1000.0, 20.0, 2.0, 529.0),
            MetricSet::from_totals(1, 100.0, 1000.0, 20.0, 2.0, 545.0),
            100.0,
            -16.0,
        );
        let mut campaigns = BTreeMap::new();
        campaigns.insert("Summer Sale".to_string(), pair.clone());
        ComparisonResult {
            windows: ComparisonWindows::ending_at(NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(), 1).unwrap(),
            global: pair,
            segments: BTreeMap::from([(Dimension::CampaignName, campaigns)]),
        }
    }

    fn insight(filters: Vec<(Dimension, &str)>, refs: Vec<&str>) -> Insight {
        Insight {
            title: "t".to_string(),
            claimed_numbers: BTreeMap::new(),
            segment_filters: filters.into_iter().map(|(d, v)| (d, v.to_string())).collect(),
            evidence_refs: refs.into_iter().map(String::from).collect(),
            confidence: 0.5,
            impact: ImpactLevel::Low,
            reasoning: None,
        }
    }

    #[test]
    fn test_measure_round_trips_names() {
        for name in ["roas_cur", "roas_base", "revenue_delta", "roas_pct_change", "spend_share"] {
            assert_eq!(name.parse::<Measure>().unwrap().to_string(), name);
        }
        assert_eq!("ctr_current".parse::<Measure>().unwrap(), Measure::Current(Metric::Ctr));
        assert!("mood_cur".parse::<Measure>().is_err());
        assert!("roas".parse::<Measure>().is_err());
    }

    #[test]
    fn test_measure_evaluate() {
        let c = comparison();
        assert_eq!(Measure::Current(Metric::Roas).evaluate(&c.global), Some(5.29));
        assert_eq!(Measure::Delta(Metric::Revenue).evaluate(&c.global), Some(-16.0));
        let zero = WindowPair::new(MetricSet::zero(), MetricSet::zero(), 0.0, 0.0);
        assert_eq!(Measure::Current(Metric::Roas).evaluate(&zero), None);
        assert_eq!(Measure::PctChange(Metric::Revenue).evaluate(&zero), None);
    }

    #[test]
    fn test_resolve_evidence() {
        let c = comparison();
        let overview = insight(vec![], vec!["overview"]);
        assert_eq!(overview.resolve_evidence(&c).unwrap(), &c.global);

        let seg = insight(vec![(Dimension::CampaignName, "Summer Sale")], vec!["segments:campaign_name:top_losers"]);
        assert!(seg.resolve_evidence(&c).is_ok());

        let typo = insight(vec![(Dimension::CampaignName, "Sumer Sale")], vec![]);
        let msg = typo.resolve_evidence(&c).unwrap_err();
        assert!(msg.contains("did you mean 'Summer Sale'"));

        let dangling = insight(vec![], vec!["segments:platform"]);
        assert!(dangling.resolve_evidence(&c).is_err());

        let crossed = insight(
            vec![(Dimension::CampaignName, "Summer Sale"), (Dimension::Country, "US")],
            vec![],
        );
        let msg = crossed.resolve_evidence(&c).unwrap_err();
        assert!(msg.contains("several segments"));
        assert!(msg.contains("country=US"));
    }

    #[test]
    fn test_impact_level() {
        assert_eq!(ImpactLevel::classify(-12_000.0, 0.1, 0.2), ImpactLevel::High);
        assert_eq!(ImpactLevel::classify(100.0, 2.5, 0.0), ImpactLevel::High);
        assert_eq!(ImpactLevel::classify(6_000.0, 0.0, 0.06), ImpactLevel::Medium);
        assert_eq!(ImpactLevel::classify(-16.0, -0.16, 1.0), ImpactLevel::Low);
    }

    #[test]
    fn test_deserialize_llm_shaped_insight() {
        let json = r#"{
            "title": "campaign_name: 'Summer Sale' lost $16 revenue",
            "claimed_numbers": {"revenue_delta": -16, "roas_cur": 5.29},
            "segment_filters": {"campaign_name": "Summer Sale"},
            "evidence_refs": ["segments:campaign_name:top_losers"],
            "confidence": 0.7,
            "impact": "low"
        }"#;
        let parsed: Insight = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.claimed_numbers["revenue_delta"], -16.0);
        assert_eq!(parsed.segment_key(), Some(SegmentKey::new(Dimension::CampaignName, "Summer Sale")));
        assert!(parsed.reasoning.is_none());
    }

    #[test]
    fn test_format_ratio() {
        assert_eq!(format_ratio(Ratio::Defined(5.289), "zero spend"), "5.29");
        assert_eq!(format_ratio(Ratio::Undefined, "zero spend"), "0.00 (zero spend)");
    }
}
