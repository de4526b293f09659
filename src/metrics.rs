//! Metric aggregation
//!
//! Sums raw counters over a group of records and derives the ratio KPIs with
//! safe division. Undefined ratios are carried as `Ratio::Undefined` until the
//! rendering boundary.

use crate::dataset::{Dimension, Record};
use crate::error::{InsightError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Group key used for the whole-dataset aggregate.
pub const GLOBAL_GROUP: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Spend,
    Impressions,
    Clicks,
    Purchases,
    Revenue,
    Ctr,
    Cvr,
    Cpc,
    Cpa,
    Roas,
}

impl Metric {
    pub const ALL: [Metric; 10] = [
        Metric::Spend,
        Metric::Impressions,
        Metric::Clicks,
        Metric::Purchases,
        Metric::Revenue,
        Metric::Ctr,
        Metric::Cvr,
        Metric::Cpc,
        Metric::Cpa,
        Metric::Roas,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Spend => "spend",
            Metric::Impressions => "impressions",
            Metric::Clicks => "clicks",
            Metric::Purchases => "purchases",
            Metric::Revenue => "revenue",
            Metric::Ctr => "ctr",
            Metric::Cvr => "cvr",
            Metric::Cpc => "cpc",
            Metric::Cpa => "cpa",
            Metric::Roas => "roas",
        }
    }

    /// Flag shown next to the 0.00 sentinel when this ratio is undefined.
    pub fn undefined_flag(&self) -> &'static str {
        match self {
            Metric::Roas => "zero spend",
            Metric::Cpa => "no purchases",
            Metric::Cvr | Metric::Cpc => "no clicks",
            _ => "undefined",
        }
    }

    /// Words that count as a mention of this metric in free text.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Metric::Spend => &["spend", "budget", "cost"],
            Metric::Impressions => &["impressions", "reach"],
            Metric::Clicks => &["clicks"],
            Metric::Purchases => &["purchases", "conversions", "orders"],
            Metric::Revenue => &["revenue", "sales"],
            Metric::Ctr => &["ctr", "click-through", "click through"],
            Metric::Cvr => &["cvr", "conversion rate"],
            Metric::Cpc => &["cpc", "cost per click"],
            Metric::Cpa => &["cpa", "cost per acquisition", "cost per purchase"],
            Metric::Roas => &["roas", "return on ad spend"],
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == lowered)
            .ok_or_else(|| InsightError::Config(format!("Unknown metric: {}", s)))
    }
}

/// Result of a safe division.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Ratio {
    Defined(f64),
    Undefined,
}

impl Ratio {
    pub fn of(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 {
            Ratio::Undefined
        } else {
            Ratio::Defined(numerator / denominator)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Ratio::Defined(v) => Some(*v),
            Ratio::Undefined => None,
        }
    }

    /// Collapses `Undefined` to the 0.00 sentinel.
    pub fn or_zero(&self) -> f64 {
        self.value().unwrap_or(0.0)
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Ratio::Defined(_))
    }
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Summed counters plus derived KPIs for one group of records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub records: usize,
    pub spend: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub purchases: f64,
    pub revenue: f64,
    pub ctr: f64,
    pub cvr: Ratio,
    pub cpc: Ratio,
    pub cpa: Ratio,
    pub roas: Ratio,
}

impl MetricSet {
    pub fn zero() -> Self {
        Self::from_totals(0, 0.0, 0.0, 0.0, 0.0, 0.0)
    }

    pub fn from_totals(
        records: usize,
        spend: f64,
        impressions: f64,
        clicks: f64,
        purchases: f64,
        revenue: f64,
    ) -> Self {
        Self {
            records,
            spend,
            impressions,
            clicks,
            purchases,
            revenue,
            ctr: Ratio::of(clicks, impressions).or_zero(),
            cvr: Ratio::of(purchases, clicks),
            cpc: Ratio::of(spend, clicks),
            cpa: Ratio::of(spend, purchases),
            roas: Ratio::of(revenue, spend),
        }
    }

    fn add(&mut self, record: &Record) {
        self.records += 1;
        self.spend += record.spend;
        self.impressions += record.impressions;
        self.clicks += record.clicks;
        self.purchases += record.purchases;
        self.revenue += record.revenue;
    }

    fn finish(self) -> Self {
        Self::from_totals(
            self.records,
            self.spend,
            self.impressions,
            self.clicks,
            self.purchases,
            self.revenue,
        )
    }

    pub fn ratio(&self, metric: Metric) -> Ratio {
        match metric {
            Metric::Spend => Ratio::Defined(self.spend),
            Metric::Impressions => Ratio::Defined(self.impressions),
            Metric::Clicks => Ratio::Defined(self.clicks),
            Metric::Purchases => Ratio::Defined(self.purchases),
            Metric::Revenue => Ratio::Defined(self.revenue),
            Metric::Ctr => Ratio::Defined(self.ctr),
            Metric::Cvr => self.cvr,
            Metric::Cpc => self.cpc,
            Metric::Cpa => self.cpa,
            Metric::Roas => self.roas,
        }
    }

    /// Metric value with undefined ratios collapsed to 0.
    pub fn value(&self, metric: Metric) -> f64 {
        self.ratio(metric).or_zero()
    }

    pub fn zero_spend(&self) -> bool {
        self.spend == 0.0
    }

    pub fn zero_purchases(&self) -> bool {
        self.purchases == 0.0
    }

    /// No delivery and no outcomes at all.
    pub fn is_inactive(&self) -> bool {
        self.spend == 0.0
            && self.impressions == 0.0
            && self.clicks == 0.0
            && self.purchases == 0.0
            && self.revenue == 0.0
    }
}

/// Aggregates a borrowed record slice; owns nothing.
pub struct MetricAggregator<'a> {
    records: &'a [Record],
}

impl<'a> MetricAggregator<'a> {
    pub fn new(records: &'a [Record]) -> Self {
        Self { records }
    }

    /// Group value -> MetricSet for records within `range`. With no grouping
    /// dimension the single key is [`GLOBAL_GROUP`] and an empty range is an error.
    pub fn aggregate(
        &self,
        group: Option<Dimension>,
        range: DateRange,
    ) -> Result<BTreeMap<String, MetricSet>> {
        match group {
            Some(dim) => Ok(self.aggregate_by(dim, range)),
            None => {
                let global = self.aggregate_global(range)?;
                Ok(BTreeMap::from([(GLOBAL_GROUP.to_string(), global)]))
            }
        }
    }

    pub fn aggregate_global(&self, range: DateRange) -> Result<MetricSet> {
        let mut acc = MetricSet::zero();
        for record in self.records.iter().filter(|r| range.contains(r.date)) {
            acc.add(record);
        }
        if acc.records == 0 {
            return Err(InsightError::EmptyDataset(format!(
                "no records between {}",
                range
            )));
        }
        let set = acc.finish();
        log_undefined(GLOBAL_GROUP, &set);
        Ok(set)
    }

    /// Groups with no records in range are simply absent.
    pub fn aggregate_by(&self, dimension: Dimension, range: DateRange) -> BTreeMap<String, MetricSet> {
        let mut groups: BTreeMap<String, MetricSet> = BTreeMap::new();
        for record in self.records.iter().filter(|r| range.contains(r.date)) {
            groups
                .entry(record.attribute(dimension).to_string())
                .or_insert_with(MetricSet::zero)
                .add(record);
        }
        groups
            .into_iter()
            .map(|(key, acc)| {
                let set = acc.finish();
                log_undefined(&key, &set);
                (key, set)
            })
            .collect()
    }
}

fn log_undefined(group: &str, set: &MetricSet) {
    if !set.roas.is_defined() {
        debug!("Undefined ROAS for group '{}' (zero spend)", group);
    }
    if !set.cpa.is_defined() {
        debug!("Undefined CPA for group '{}' (zero purchases)", group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn record(campaign: &str, day: u32, spend: f64, revenue: f64) -> Record {
        Record {
            campaign_name: campaign.to_string(),
            adset_name: format!("{} set", campaign),
            date: date(day),
            spend,
            impressions: spend * 10.0,
            clicks: spend / 10.0,
            purchases: revenue / 50.0,
            revenue,
            creative_type: "Image".to_string(),
            creative_message: "Comfort".to_string(),
            audience_type: "Broad".to_string(),
            platform: "Facebook".to_string(),
            country: "US".to_string(),
        }
    }

    #[test]
    fn test_ratio_safe_division() {
        assert_eq!(Ratio::of(10.0, 4.0), Ratio::Defined(2.5));
        assert_eq!(Ratio::of(10.0, 0.0), Ratio::Undefined);
        assert_eq!(Ratio::Undefined.or_zero(), 0.0);
    }

    #[test]
    fn test_zero_spend_roas_is_undefined_not_a_failure() {
        let records = vec![record("A", 1, 0.0, 0.0), record("A", 2, 0.0, 0.0)];
        let agg = MetricAggregator::new(&records);
        let set = agg.aggregate_global(DateRange::new(date(1), date(2))).unwrap();
        assert!(set.zero_spend());
        assert_eq!(set.roas, Ratio::Undefined);
        assert_eq!(set.value(Metric::Roas), 0.0);
        assert_eq!(set.ctr, 0.0);
    }

    #[test]
    fn test_out_of_range_records_are_excluded() {
        let records = vec![
            record("A", 1, 100.0, 500.0),
            record("A", 5, 200.0, 300.0),
            record("B", 9, 50.0, 20.0),
        ];
        let range = DateRange::new(date(1), date(5));
        let agg = MetricAggregator::new(&records);
        let with_outliers = agg.aggregate(Some(Dimension::CampaignName), range).unwrap();

        let filtered: Vec<Record> = records.iter().filter(|r| range.contains(r.date)).cloned().collect();
        let without = MetricAggregator::new(&filtered)
            .aggregate(Some(Dimension::CampaignName), range)
            .unwrap();

        assert_eq!(with_outliers, without);
        assert!(!with_outliers.contains_key("B"));
        assert_eq!(with_outliers["A"].spend, 300.0);
        assert_eq!(with_outliers["A"].records, 2);
    }

    #[test]
    fn test_global_empty_range_is_error() {
        let records = vec![record("A", 1, 100.0, 500.0)];
        let agg = MetricAggregator::new(&records);
        let err = agg.aggregate(None, DateRange::new(date(10), date(12))).unwrap_err();
        assert!(matches!(err, InsightError::EmptyDataset(_)));
        assert!(agg.aggregate_by(Dimension::Platform, DateRange::new(date(10), date(12))).is_empty());
    }

    #[test]
    fn test_derived_ratios() {
        let set = MetricSet::from_totals(1, 100.0, 2000.0, 40.0, 4.0, 529.0);
        assert!((set.ctr - 0.02).abs() < 1e-12);
        assert_eq!(set.roas, Ratio::Defined(5.29));
        assert_eq!(set.cpa, Ratio::Defined(25.0));
        assert_eq!(set.cvr, Ratio::Defined(0.1));
        assert_eq!(set.cpc, Ratio::Defined(2.5));
    }

    #[test]
    fn test_date_range() {
        let a = DateRange::new(date(1), date(7));
        let b = DateRange::new(date(8), date(14));
        assert_eq!(a.days(), 7);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&DateRange::new(date(7), date(9))));
    }
}
