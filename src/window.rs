//! Window comparison
//!
//! Aggregates the same records over a current and a baseline window and joins
//! the two sides per segment, the way a population/data diff joins two systems
//! on their grain.

use crate::dataset::{Dimension, Record};
use crate::error::{InsightError, Result};
use crate::metrics::{DateRange, Metric, MetricAggregator, MetricSet, Ratio};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info};

/// Current and baseline windows: equal length, non-overlapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonWindows {
    pub current: DateRange,
    pub baseline: DateRange,
}

impl ComparisonWindows {
    pub fn new(current: DateRange, baseline: DateRange) -> Result<Self> {
        if current.end < current.start || baseline.end < baseline.start {
            return Err(InsightError::InvalidWindow(format!(
                "window ends before it starts (current {}, baseline {})",
                current, baseline
            )));
        }
        if current.days() != baseline.days() {
            return Err(InsightError::InvalidWindow(format!(
                "windows differ in length: current {} days, baseline {} days",
                current.days(),
                baseline.days()
            )));
        }
        if current.overlaps(&baseline) {
            return Err(InsightError::InvalidWindow(format!(
                "current window {} overlaps baseline {}",
                current, baseline
            )));
        }
        Ok(Self { current, baseline })
    }

    /// Current window ends on `latest`; the baseline is the `window_days` before it.
    pub fn ending_at(latest: NaiveDate, window_days: u32) -> Result<Self> {
        if window_days == 0 {
            return Err(InsightError::InvalidWindow("time_window_days must be positive".to_string()));
        }
        let out_of_range = || {
            InsightError::InvalidWindow(format!(
                "{} day windows ending {} reach before the earliest representable date",
                window_days, latest
            ))
        };
        let span = Duration::days(i64::from(window_days) - 1);
        let current_start = latest.checked_sub_signed(span).ok_or_else(out_of_range)?;
        let baseline_end = current_start.checked_sub_signed(Duration::days(1)).ok_or_else(out_of_range)?;
        let baseline_start = baseline_end.checked_sub_signed(span).ok_or_else(out_of_range)?;
        Self::new(
            DateRange::new(current_start, latest),
            DateRange::new(baseline_start, baseline_end),
        )
    }

    pub fn window_days(&self) -> i64 {
        self.current.days()
    }
}

/// (dimension, value) identifying one group within one dimension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentKey {
    pub dimension: Dimension,
    pub value: String,
}

impl SegmentKey {
    pub fn new(dimension: Dimension, value: impl Into<String>) -> Self {
        Self {
            dimension,
            value: value.into(),
        }
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.dimension, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentFlag {
    NewSegment,
    DroppedSegment,
}

/// Matched (current, baseline) metrics for one segment or the whole dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowPair {
    pub current: MetricSet,
    pub baseline: MetricSet,

    /// current - baseline, undefined ratios collapsed to 0
    pub delta: BTreeMap<Metric, f64>,

    /// delta / baseline * 100; undefined when the baseline is 0
    pub pct_change: BTreeMap<Metric, Ratio>,

    /// Share of the current window's global spend
    pub spend_share: f64,

    /// Share of the global revenue change attributable to this segment
    pub revenue_contribution: Ratio,

    pub flag: Option<SegmentFlag>,
}

impl WindowPair {
    pub fn new(
        current: MetricSet,
        baseline: MetricSet,
        global_current_spend: f64,
        global_revenue_delta: f64,
    ) -> Self {
        let mut delta = BTreeMap::new();
        let mut pct_change = BTreeMap::new();
        for metric in Metric::ALL {
            let cur = current.value(metric);
            let base = baseline.value(metric);
            let diff = cur - base;
            delta.insert(metric, diff);
            pct_change.insert(metric, Ratio::of(diff * 100.0, base));
        }

        let flag = match (baseline.is_inactive(), current.is_inactive()) {
            (true, false) => Some(SegmentFlag::NewSegment),
            (false, true) => Some(SegmentFlag::DroppedSegment),
            _ => None,
        };

        let revenue_delta = current.revenue - baseline.revenue;
        Self {
            spend_share: Ratio::of(current.spend, global_current_spend).or_zero(),
            revenue_contribution: Ratio::of(revenue_delta, global_revenue_delta),
            current,
            baseline,
            delta,
            pct_change,
            flag,
        }
    }

    pub fn delta(&self, metric: Metric) -> f64 {
        self.delta.get(&metric).copied().unwrap_or(0.0)
    }

    pub fn pct_change(&self, metric: Metric) -> Ratio {
        self.pct_change.get(&metric).copied().unwrap_or(Ratio::Undefined)
    }

    pub fn is_flagged(&self) -> bool {
        self.flag.is_some()
    }
}

/// Global pair plus per-dimension segment pairs for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub windows: ComparisonWindows,
    pub global: WindowPair,
    pub segments: BTreeMap<Dimension, BTreeMap<String, WindowPair>>,
}

impl ComparisonResult {
    pub fn segment(&self, key: &SegmentKey) -> Option<&WindowPair> {
        self.segments.get(&key.dimension)?.get(&key.value)
    }

    pub fn dimension(&self, dimension: Dimension) -> Option<&BTreeMap<String, WindowPair>> {
        self.segments.get(&dimension)
    }
}

pub struct WindowComparator<'a> {
    aggregator: MetricAggregator<'a>,
}

impl<'a> WindowComparator<'a> {
    pub fn new(records: &'a [Record]) -> Self {
        Self {
            aggregator: MetricAggregator::new(records),
        }
    }

    pub fn compare(
        &self,
        windows: ComparisonWindows,
        dimensions: &[Dimension],
    ) -> Result<ComparisonResult> {
        info!(
            "Comparing current {} against baseline {}",
            windows.current, windows.baseline
        );

        let current = self
            .aggregator
            .aggregate_global(windows.current)
            .map_err(|e| annotate_window(e, "current"))?;
        let baseline = self
            .aggregator
            .aggregate_global(windows.baseline)
            .map_err(|e| annotate_window(e, "baseline"))?;

        let global_revenue_delta = current.revenue - baseline.revenue;
        let global = WindowPair::new(current, baseline, current.spend, global_revenue_delta);

        let mut segments = BTreeMap::new();
        for &dim in dimensions {
            let pairs = self.compare_dimension(dim, windows, current.spend, global_revenue_delta);
            debug!("Dimension {} has {} segments", dim, pairs.len());
            segments.insert(dim, pairs);
        }

        Ok(ComparisonResult {
            windows,
            global,
            segments,
        })
    }

    fn compare_dimension(
        &self,
        dimension: Dimension,
        windows: ComparisonWindows,
        global_current_spend: f64,
        global_revenue_delta: f64,
    ) -> BTreeMap<String, WindowPair> {
        let cur = self.aggregator.aggregate_by(dimension, windows.current);
        let base = self.aggregator.aggregate_by(dimension, windows.baseline);

        // Outer join on segment value
        let keys: BTreeSet<&String> = cur.keys().chain(base.keys()).collect();
        keys.into_iter()
            .map(|key| {
                let c = cur.get(key).copied().unwrap_or_else(MetricSet::zero);
                let b = base.get(key).copied().unwrap_or_else(MetricSet::zero);
                (
                    key.clone(),
                    WindowPair::new(c, b, global_current_spend, global_revenue_delta),
                )
            })
            .collect()
    }
}

fn annotate_window(err: InsightError, which: &str) -> InsightError {
    match err {
        InsightError::EmptyDataset(msg) => {
            InsightError::EmptyDataset(format!("{} window: {}", which, msg))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn record(campaign: &str, day: NaiveDate, spend: f64, revenue: f64) -> Record {
        Record {
            campaign_name: campaign.to_string(),
            adset_name: "Set".to_string(),
            date: day,
            spend,
            impressions: 1000.0,
            clicks: 20.0,
            purchases: 2.0,
            revenue,
            creative_type: "Image".to_string(),
            creative_message: "Comfort".to_string(),
            audience_type: "Broad".to_string(),
            platform: "Facebook".to_string(),
            country: "US".to_string(),
        }
    }

    fn one_day_windows() -> ComparisonWindows {
        ComparisonWindows::ending_at(date(3, 2), 1).unwrap()
    }

    #[test]
    fn test_windows_ending_at() {
        let w = ComparisonWindows::ending_at(date(3, 14), 7).unwrap();
        assert_eq!(w.current, DateRange::new(date(3, 8), date(3, 14)));
        assert_eq!(w.baseline, DateRange::new(date(3, 1), date(3, 7)));
        assert_eq!(w.window_days(), 7);
    }

    #[test]
    fn test_oversized_window_is_invalid_not_a_panic() {
        let result = ComparisonWindows::ending_at(date(3, 2), 200_000_000);
        assert!(matches!(result, Err(InsightError::InvalidWindow(ref msg)) if msg.contains("200000000 day")));
    }

    #[test]
    fn test_windows_reject_overlap_and_unequal_length() {
        let overlap = ComparisonWindows::new(
            DateRange::new(date(3, 5), date(3, 11)),
            DateRange::new(date(3, 1), date(3, 7)),
        );
        assert!(matches!(overlap, Err(InsightError::InvalidWindow(_))));

        let unequal = ComparisonWindows::new(
            DateRange::new(date(3, 8), date(3, 14)),
            DateRange::new(date(3, 1), date(3, 6)),
        );
        assert!(matches!(unequal, Err(InsightError::InvalidWindow(_))));
        assert!(ComparisonWindows::ending_at(date(3, 1), 0).is_err());
    }

    #[test]
    fn test_campaign_a_scenario() {
        let records = vec![
            record("A", date(3, 1), 100.0, 545.0),
            record("A", date(3, 2), 100.0, 529.0),
        ];
        let result = WindowComparator::new(&records)
            .compare(one_day_windows(), &[Dimension::CampaignName])
            .unwrap();
        let pair = result
            .segment(&SegmentKey::new(Dimension::CampaignName, "A"))
            .unwrap();

        assert_eq!(pair.delta(Metric::Revenue), -16.0);
        let pct = pair.pct_change(Metric::Revenue).value().unwrap();
        assert!((pct - (-2.9357798)).abs() < 1e-6);
        assert_eq!(pair.current.roas, Ratio::Defined(5.29));
        assert_eq!(pair.baseline.roas, Ratio::Defined(5.45));
        assert_eq!(pair.spend_share, 1.0);
        assert_eq!(pair.flag, None);
        assert_eq!(result.global.delta(Metric::Revenue), -16.0);
    }

    #[test]
    fn test_dropped_segment_scenario() {
        let records = vec![
            record("A", date(3, 1), 100.0, 545.0),
            record("A", date(3, 2), 100.0, 529.0),
            record("Gone", date(3, 1), 1000.0, 8480.0),
        ];
        let result = WindowComparator::new(&records)
            .compare(one_day_windows(), &[Dimension::CampaignName])
            .unwrap();
        let pair = result
            .segment(&SegmentKey::new(Dimension::CampaignName, "Gone"))
            .unwrap();

        assert_eq!(pair.flag, Some(SegmentFlag::DroppedSegment));
        assert_eq!(pair.current, MetricSet::zero());
        assert_eq!(pair.current.roas, Ratio::Undefined);
        assert_eq!(pair.current.value(Metric::Roas), 0.0);
        assert_eq!(pair.delta(Metric::Revenue), -8480.0);
        assert_eq!(pair.spend_share, 0.0);
    }

    #[test]
    fn test_zero_activity_rows_still_count_as_dropped() {
        let records = vec![
            record("A", date(3, 1), 100.0, 545.0),
            record("A", date(3, 2), 100.0, 529.0),
            record("Paused", date(3, 1), 1000.0, 8480.0),
            Record {
                impressions: 0.0,
                clicks: 0.0,
                purchases: 0.0,
                ..record("Paused", date(3, 2), 0.0, 0.0)
            },
        ];
        let result = WindowComparator::new(&records)
            .compare(one_day_windows(), &[Dimension::CampaignName])
            .unwrap();
        let pair = result
            .segment(&SegmentKey::new(Dimension::CampaignName, "Paused"))
            .unwrap();
        assert_eq!(pair.flag, Some(SegmentFlag::DroppedSegment));
        assert!(pair.current.zero_spend());
    }

    #[test]
    fn test_new_segment_has_zero_baseline_and_undefined_pct() {
        let records = vec![
            record("A", date(3, 1), 100.0, 545.0),
            record("Fresh", date(3, 2), 50.0, 200.0),
        ];
        let result = WindowComparator::new(&records)
            .compare(one_day_windows(), &[Dimension::CampaignName])
            .unwrap();
        let pair = result
            .segment(&SegmentKey::new(Dimension::CampaignName, "Fresh"))
            .unwrap();
        assert_eq!(pair.flag, Some(SegmentFlag::NewSegment));
        assert_eq!(pair.baseline, MetricSet::zero());
        assert_eq!(pair.pct_change(Metric::Revenue), Ratio::Undefined);
    }

    #[test]
    fn test_compare_is_idempotent() {
        let records = vec![
            record("A", date(3, 1), 100.0, 545.0),
            record("B", date(3, 1), 80.0, 300.0),
            record("A", date(3, 2), 100.0, 529.0),
            record("B", date(3, 2), 90.0, 410.0),
        ];
        let comparator = WindowComparator::new(&records);
        let dims = [Dimension::CampaignName, Dimension::Platform];
        let first = comparator.compare(one_day_windows(), &dims).unwrap();
        let second = comparator.compare(one_day_windows(), &dims).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_empty_baseline_is_fatal() {
        let records = vec![record("A", date(3, 2), 100.0, 529.0)];
        let err = WindowComparator::new(&records)
            .compare(one_day_windows(), &[Dimension::CampaignName])
            .unwrap_err();
        match err {
            InsightError::EmptyDataset(msg) => assert!(msg.starts_with("baseline window")),
            other => panic!("expected EmptyDataset, got {:?}", other),
        }
    }
}
