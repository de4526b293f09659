//! Segment ranking
//!
//! Orders one dimension's window pairs by signed impact into gainers and
//! losers. Dropped segments are reported as their own category rather than
//! mixed in with gradual decline.

use crate::config::{ImpactMetric, RankingConfig};
use crate::dataset::Dimension;
use crate::metrics::Metric;
use crate::window::{SegmentFlag, SegmentKey, WindowPair};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSegment {
    pub key: SegmentKey,
    pub impact: f64,
    pub pair: WindowPair,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSegments {
    pub dimension: Dimension,
    pub impact_metric: ImpactMetric,
    pub gainers: Vec<RankedSegment>,
    pub losers: Vec<RankedSegment>,
    pub dropped: Vec<RankedSegment>,
}

impl RankedSegments {
    pub fn is_empty(&self) -> bool {
        self.gainers.is_empty() && self.losers.is_empty() && self.dropped.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SegmentRanker {
    impact_metric: ImpactMetric,
    top_n: usize,
    include_flagged_losers: bool,
}

impl SegmentRanker {
    pub fn new(impact_metric: ImpactMetric, top_n: usize) -> Self {
        Self {
            impact_metric,
            top_n,
            include_flagged_losers: false,
        }
    }

    pub fn from_config(config: &RankingConfig) -> Self {
        Self::new(config.impact_metric, config.top_n).include_flagged_losers(config.include_flagged_losers)
    }

    pub fn include_flagged_losers(mut self, include: bool) -> Self {
        self.include_flagged_losers = include;
        self
    }

    pub fn impact(&self, pair: &WindowPair) -> f64 {
        match self.impact_metric {
            ImpactMetric::RevenueDelta => pair.delta(Metric::Revenue),
            ImpactMetric::RoasDeltaWeighted => pair.delta(Metric::Roas) * pair.spend_share,
        }
    }

    pub fn rank(&self, dimension: Dimension, pairs: &BTreeMap<String, WindowPair>) -> RankedSegments {
        let scored: Vec<RankedSegment> = pairs
            .iter()
            .map(|(value, pair)| RankedSegment {
                key: SegmentKey::new(dimension, value.clone()),
                impact: self.impact(pair),
                pair: pair.clone(),
            })
            .collect();

        let mut gainers: Vec<RankedSegment> = scored
            .iter()
            .filter(|s| s.impact > 0.0)
            .cloned()
            .collect();
        gainers.sort_by(|a, b| b.impact.total_cmp(&a.impact).then_with(|| tie_break(a, b)));
        gainers.truncate(self.top_n);

        let mut losers: Vec<RankedSegment> = scored
            .iter()
            .filter(|s| s.impact < 0.0)
            .filter(|s| self.include_flagged_losers || !s.pair.is_flagged())
            .cloned()
            .collect();
        losers.sort_by(|a, b| a.impact.total_cmp(&b.impact).then_with(|| tie_break(a, b)));
        losers.truncate(self.top_n);

        let mut dropped: Vec<RankedSegment> = scored
            .into_iter()
            .filter(|s| s.pair.flag == Some(SegmentFlag::DroppedSegment))
            .collect();
        dropped.sort_by(|a, b| {
            b.pair
                .baseline
                .revenue
                .total_cmp(&a.pair.baseline.revenue)
                .then_with(|| tie_break(a, b))
        });
        dropped.truncate(self.top_n);

        RankedSegments {
            dimension,
            impact_metric: self.impact_metric,
            gainers,
            losers,
            dropped,
        }
    }
}

/// Larger spend first, then segment value for a total order.
fn tie_break(a: &RankedSegment, b: &RankedSegment) -> Ordering {
    b.pair
        .current
        .spend
        .total_cmp(&a.pair.current.spend)
        .then_with(|| b.pair.baseline.spend.total_cmp(&a.pair.baseline.spend))
        .then_with(|| a.key.value.cmp(&b.key.value))
}
