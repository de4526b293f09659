//! Dataset loading
//!
//! The single load boundary for ad-performance CSVs. Shape is validated once
//! here; everything downstream works on typed, immutable `Record`s.

use crate::error::{InsightError, Result};
use crate::metrics::{DateRange, MetricAggregator, MetricSet};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

pub const EXPECTED_COLUMNS: [&str; 15] = [
    "campaign_name",
    "adset_name",
    "date",
    "spend",
    "impressions",
    "clicks",
    "ctr",
    "purchases",
    "revenue",
    "roas",
    "creative_type",
    "creative_message",
    "audience_type",
    "platform",
    "country",
];

/// Categorical attribute a segment can be cut on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    CampaignName,
    AdsetName,
    CreativeType,
    CreativeMessage,
    AudienceType,
    Platform,
    Country,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::CampaignName,
        Dimension::AdsetName,
        Dimension::CreativeType,
        Dimension::CreativeMessage,
        Dimension::AudienceType,
        Dimension::Platform,
        Dimension::Country,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::CampaignName => "campaign_name",
            Dimension::AdsetName => "adset_name",
            Dimension::CreativeType => "creative_type",
            Dimension::CreativeMessage => "creative_message",
            Dimension::AudienceType => "audience_type",
            Dimension::Platform => "platform",
            Dimension::Country => "country",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Dimension::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == normalized)
            .ok_or_else(|| InsightError::Config(format!("Unknown segment dimension: {}", s)))
    }
}

/// One ad-performance row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub campaign_name: String,
    pub adset_name: String,
    pub date: NaiveDate,
    pub spend: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub purchases: f64,
    pub revenue: f64,
    pub creative_type: String,
    pub creative_message: String,
    pub audience_type: String,
    pub platform: String,
    pub country: String,
}

impl Record {
    pub fn attribute(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::CampaignName => &self.campaign_name,
            Dimension::AdsetName => &self.adset_name,
            Dimension::CreativeType => &self.creative_type,
            Dimension::CreativeMessage => &self.creative_message,
            Dimension::AudienceType => &self.audience_type,
            Dimension::Platform => &self.platform,
            Dimension::Country => &self.country,
        }
    }
}

/// Loaded, validated dataset plus the data-quality notes collected while loading.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Vec<Record>,
    pub source: PathBuf,
    pub notes: Vec<String>,
}

impl Dataset {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading dataset from {:?}", path);
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, path.to_path_buf())
    }

    pub fn from_reader<R: Read>(reader: R, source: PathBuf) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        let index: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), i))
            .collect();

        let missing: Vec<&str> = EXPECTED_COLUMNS
            .iter()
            .copied()
            .filter(|c| !index.contains_key(c))
            .collect();
        if !missing.is_empty() {
            return Err(InsightError::InvalidSchema(format!(
                "missing required columns: {}",
                missing.join(", ")
            )));
        }

        let mut records = Vec::new();
        let mut coerced_cells = 0usize;
        let mut negative_cells = 0usize;
        let mut bad_dates = 0usize;

        for row in rdr.records() {
            let row = row?;
            let text = |name: &str| -> String {
                row.get(index[name]).unwrap_or("").trim().to_string()
            };
            let mut number = |name: &str| -> f64 {
                match parse_number(row.get(index[name]).unwrap_or("")) {
                    Some(v) if v < 0.0 => {
                        negative_cells += 1;
                        0.0
                    }
                    Some(v) => v,
                    None => {
                        coerced_cells += 1;
                        0.0
                    }
                }
            };

            let spend = number("spend");
            let impressions = number("impressions");
            let clicks = number("clicks");
            let purchases = number("purchases");
            let revenue = number("revenue");

            let date = match parse_date(&text("date")) {
                Some(d) => d,
                None => {
                    bad_dates += 1;
                    continue;
                }
            };

            records.push(Record {
                campaign_name: normalize_campaign_name(&text("campaign_name")),
                adset_name: text("adset_name"),
                date,
                spend,
                impressions,
                clicks,
                purchases,
                revenue,
                creative_type: text("creative_type"),
                creative_message: text("creative_message"),
                audience_type: text("audience_type"),
                platform: text("platform"),
                country: text("country"),
            });
        }

        let mut notes = Vec::new();
        if coerced_cells > 0 {
            notes.push(format!(
                "{} empty or non-numeric metric cells were coerced to 0.",
                coerced_cells
            ));
        }
        if negative_cells > 0 {
            notes.push(format!(
                "{} negative metric cells were treated as malformed and clamped to 0.",
                negative_cells
            ));
        }
        if bad_dates > 0 {
            notes.push(format!("Dropped {} rows with missing or invalid dates.", bad_dates));
        }
        let zero_spend = records.iter().filter(|r| r.spend == 0.0).count();
        if zero_spend > 0 {
            notes.push(format!("{} rows have spend == 0.", zero_spend));
        }
        for note in &notes {
            warn!("{}", note);
        }

        if records.is_empty() {
            return Err(InsightError::EmptyDataset(format!(
                "no usable rows in {}",
                source.display()
            )));
        }

        info!("Loaded {} records", records.len());
        Ok(Self {
            records,
            source,
            notes,
        })
    }

    pub fn date_range(&self) -> Option<DateRange> {
        let min = self.records.iter().map(|r| r.date).min()?;
        let max = self.records.iter().map(|r| r.date).max()?;
        Some(DateRange::new(min, max))
    }

    pub fn summary(&self, top_n: usize) -> Result<DatasetSummary> {
        let range = self
            .date_range()
            .ok_or_else(|| InsightError::EmptyDataset("dataset has no records".to_string()))?;
        let aggregator = MetricAggregator::new(&self.records);
        let totals = aggregator.aggregate_global(range)?;

        let mut top_by_spend = BTreeMap::new();
        for dim in Dimension::ALL {
            let groups = aggregator.aggregate_by(dim, range);
            let top = groups
                .into_iter()
                .sorted_by(|a, b| b.1.spend.total_cmp(&a.1.spend).then_with(|| a.0.cmp(&b.0)))
                .take(top_n)
                .map(|(name, m)| SegmentShare {
                    share_of_spend: if totals.spend > 0.0 { m.spend / totals.spend } else { 0.0 },
                    name,
                    spend: m.spend,
                    revenue: m.revenue,
                    roas: m.roas.or_zero(),
                })
                .collect::<Vec<_>>();
            top_by_spend.insert(dim, top);
        }

        let distinct = |dim: Dimension| -> usize {
            self.records
                .iter()
                .map(|r| r.attribute(dim))
                .collect::<HashSet<_>>()
                .len()
        };

        Ok(DatasetSummary {
            rows: self.records.len(),
            date_min: range.start,
            date_max: range.end,
            days_covered: range.days(),
            zero_spend_rows: self.records.iter().filter(|r| r.spend == 0.0).count(),
            unique_campaigns: distinct(Dimension::CampaignName),
            unique_platforms: distinct(Dimension::Platform),
            unique_countries: distinct(Dimension::Country),
            totals,
            top_by_spend,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub date_min: NaiveDate,
    pub date_max: NaiveDate,
    pub days_covered: i64,
    pub zero_spend_rows: usize,
    pub unique_campaigns: usize,
    pub unique_platforms: usize,
    pub unique_countries: usize,
    pub totals: MetricSet,
    pub top_by_spend: BTreeMap<Dimension, Vec<SegmentShare>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentShare {
    pub name: String,
    pub spend: f64,
    pub revenue: f64,
    pub roas: f64,
    pub share_of_spend: f64,
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rows: {} | {} to {} ({} days)", self.rows, self.date_min, self.date_max, self.days_covered)?;
        writeln!(
            f,
            "Campaigns: {} | Platforms: {} | Countries: {} | Zero-spend rows: {}",
            self.unique_campaigns, self.unique_platforms, self.unique_countries, self.zero_spend_rows
        )?;
        writeln!(
            f,
            "Spend ${:.2} | Revenue ${:.2} | Purchases {:.0} | ROAS {:.2} | CTR {:.2}%",
            self.totals.spend,
            self.totals.revenue,
            self.totals.purchases,
            self.totals.roas.or_zero(),
            self.totals.ctr * 100.0
        )?;

        for (dim, shares) in &self.top_by_spend {
            writeln!(f, "\n=== Top {} by spend ===", dim)?;
            for s in shares {
                writeln!(
                    f,
                    "- {}: ${:.2} ({:.1}% of spend), ROAS {:.2}",
                    s.name,
                    s.spend,
                    s.share_of_spend * 100.0,
                    s.roas
                )?;
            }
        }
        Ok(())
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',' && *c != '$').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// `summer_sale  2024` -> `Summer Sale 2024`
pub fn normalize_campaign_name(name: &str) -> String {
    name.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .join(" ")
}
