//! Creative selection
//!
//! Pairs segments whose CTR sits below a threshold with a high-CTR "donor"
//! segment and proposes reusing the donor's creative pattern.

use crate::config::{CreativeConfig, CtrThreshold};
use crate::dataset::{Dimension, Record};
use crate::metrics::{DateRange, MetricAggregator, MetricSet, Ratio};
use crate::window::SegmentKey;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// One segment's current-window metrics plus its dominant creative attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeCandidate {
    pub key: SegmentKey,
    pub metrics: MetricSet,
    pub platform: String,
    pub creative_message: String,
    pub creative_type: String,
}

impl CreativeCandidate {
    /// Group the window's records by `dimension`; attributes are the ones
    /// carrying the most spend within each group.
    pub fn collect(records: &[Record], window: DateRange, dimension: Dimension) -> Vec<CreativeCandidate> {
        let metrics = MetricAggregator::new(records).aggregate_by(dimension, window);

        let mut attrs: BTreeMap<&str, [BTreeMap<&str, f64>; 3]> = BTreeMap::new();
        for r in records.iter().filter(|r| window.contains(r.date)) {
            let entry = attrs.entry(r.attribute(dimension)).or_default();
            *entry[0].entry(r.platform.as_str()).or_insert(0.0) += r.spend;
            *entry[1].entry(r.creative_message.as_str()).or_insert(0.0) += r.spend;
            *entry[2].entry(r.creative_type.as_str()).or_insert(0.0) += r.spend;
        }

        metrics
            .into_iter()
            .map(|(value, metrics)| {
                let [platform, message, creative_type] = match attrs.get(value.as_str()) {
                    Some([p, m, t]) => [dominant(p), dominant(m), dominant(t)],
                    None => [String::new(), String::new(), String::new()],
                };
                CreativeCandidate {
                    key: SegmentKey::new(dimension, value),
                    metrics,
                    platform,
                    creative_message: message,
                    creative_type,
                }
            })
            .collect()
    }
}

/// Highest-spend value; ties go to the lexically smaller one.
fn dominant(spend_by_value: &BTreeMap<&str, f64>) -> String {
    spend_by_value
        .iter()
        .max_by(|a, b| a.1.total_cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(v, _)| v.to_string())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeIdea {
    pub hook: String,
    pub body: String,
    pub cta: String,
    pub strategy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeRecommendation {
    pub target: SegmentKey,
    pub donor: SegmentKey,
    pub platform: String,
    pub platform_match: bool,
    pub donor_creative_message: String,
    pub donor_creative_type: String,
    pub current_ctr: f64,
    pub current_roas: Ratio,
    pub current_spend: f64,
    pub donor_ctr: f64,
    pub target_ctr: f64,
    pub idea: CreativeIdea,
    pub rationale: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    DonorNotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTarget {
    pub target: SegmentKey,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreativeSelection {
    pub threshold: f64,
    pub recommendations: Vec<CreativeRecommendation>,
    pub skipped: Vec<SkippedTarget>,
}

pub struct CreativeSelector<'a> {
    config: &'a CreativeConfig,
}

impl<'a> CreativeSelector<'a> {
    pub fn new(config: &'a CreativeConfig) -> Self {
        Self { config }
    }

    /// CTR threshold over candidates with delivery.
    pub fn threshold(&self, candidates: &[CreativeCandidate]) -> f64 {
        match self.config.threshold {
            CtrThreshold::Fixed { floor } => floor,
            CtrThreshold::Median { factor } => {
                let ctrs: Vec<f64> = candidates
                    .iter()
                    .filter(|c| c.metrics.impressions > 0.0)
                    .map(|c| c.metrics.ctr)
                    .collect();
                median(ctrs) * factor
            }
        }
    }

    pub fn select(&self, candidates: &[CreativeCandidate]) -> CreativeSelection {
        let threshold = self.threshold(candidates);

        let mut targets: Vec<&CreativeCandidate> = candidates
            .iter()
            .filter(|c| c.metrics.ctr < threshold && c.metrics.spend >= self.config.min_spend)
            .collect();
        targets.sort_by(|a, b| by_spend(a, b));

        let donors: Vec<&CreativeCandidate> = candidates
            .iter()
            .filter(|c| c.metrics.impressions > 0.0 && c.metrics.ctr > threshold)
            .collect();

        info!(
            "Creative selection: threshold CTR {:.4}, {} target(s), {} donor(s)",
            threshold,
            targets.len(),
            donors.len()
        );

        let mut selection = CreativeSelection {
            threshold,
            ..Default::default()
        };
        for target in targets {
            if selection.recommendations.len() >= self.config.max_recommendations {
                break;
            }
            match pick_donor(target, &donors) {
                Some(donor) => selection.recommendations.push(self.recommend(target, donor)),
                None => {
                    debug!("No donor for {}", target.key);
                    selection.skipped.push(SkippedTarget {
                        target: target.key.clone(),
                        reason: SkipReason::DonorNotFound,
                    });
                }
            }
        }
        selection
    }

    fn recommend(&self, target: &CreativeCandidate, donor: &CreativeCandidate) -> CreativeRecommendation {
        let current_ctr = target.metrics.ctr;
        let target_ctr = (current_ctr * (1.0 + self.config.improvement_factor)).min(donor.metrics.ctr);
        let platform_match = target.platform == donor.platform;

        let rationale = format!(
            "{} runs at {:.2}% CTR on ${:.0} spend; {} reaches {:.2}% with a {} '{}' creative{}",
            target.key.value,
            current_ctr * 100.0,
            target.metrics.spend,
            donor.key.value,
            donor.metrics.ctr * 100.0,
            donor.creative_type,
            donor.creative_message,
            if platform_match {
                format!(" on the same platform ({})", donor.platform)
            } else {
                String::new()
            }
        );

        CreativeRecommendation {
            target: target.key.clone(),
            donor: donor.key.clone(),
            platform: target.platform.clone(),
            platform_match,
            donor_creative_message: donor.creative_message.clone(),
            donor_creative_type: donor.creative_type.clone(),
            current_ctr,
            current_roas: target.metrics.roas,
            current_spend: target.metrics.spend,
            donor_ctr: donor.metrics.ctr,
            target_ctr,
            idea: idea_for(&target.metrics, donor),
            rationale,
            confidence: if current_ctr < 0.012 { 0.7 } else { 0.6 },
        }
    }
}

fn by_spend(a: &CreativeCandidate, b: &CreativeCandidate) -> Ordering {
    b.metrics
        .spend
        .total_cmp(&a.metrics.spend)
        .then_with(|| a.key.value.cmp(&b.key.value))
}

/// Same-platform donor with the highest CTR, else the best overall.
fn pick_donor<'c>(target: &CreativeCandidate, donors: &[&'c CreativeCandidate]) -> Option<&'c CreativeCandidate> {
    let best = |pool: &mut dyn Iterator<Item = &&'c CreativeCandidate>| {
        pool.min_by(|a, b| b.metrics.ctr.total_cmp(&a.metrics.ctr).then_with(|| by_spend(a, b)))
            .copied()
    };
    best(&mut donors.iter().filter(|d| d.platform == target.platform && d.key != target.key))
        .or_else(|| best(&mut donors.iter().filter(|d| d.key != target.key)))
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn idea_for(target: &MetricSet, donor: &CreativeCandidate) -> CreativeIdea {
    let roas = target.roas.or_zero();
    let ctr = target.ctr;
    let angle = if donor.creative_message.is_empty() {
        "the top performer's message".to_string()
    } else {
        format!("the '{}' angle", donor.creative_message)
    };

    let (hook, body, cta, strategy) = if roas < 2.0 {
        (
            "Thousands of customers already made the switch".to_string(),
            format!("Lead with reviews and ratings, framed around {}.", angle),
            "See why they chose us",
            "social_proof",
        )
    } else if ctr < 0.01 {
        (
            "Still dealing with the same problem?".to_string(),
            format!("Name the pain point up front, then resolve it using {}.", angle),
            "Find your fix",
            "problem_solve",
        )
    } else if roas < 3.0 {
        (
            "Try it risk-free".to_string(),
            format!("Pair {} with a clear guarantee to lower purchase hesitation.", angle),
            "Shop with confidence",
            "guarantee",
        )
    } else {
        (
            "See the difference for yourself".to_string(),
            format!("Show the product benefit visually in a {} format using {}.", donor.creative_type, angle),
            "Shop now",
            "visual_benefit",
        )
    };

    CreativeIdea {
        hook,
        body,
        cta: cta.to_string(),
        strategy: strategy.to_string(),
    }
}
