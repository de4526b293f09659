//! Evidence tables
//!
//! Per-dimension window pairs flattened into polars frames for the
//! `segments_<dimension>.csv` artifacts. Undefined ratios become nulls.

use crate::dataset::Dimension;
use crate::error::Result;
use crate::metrics::{Metric, Ratio};
use crate::window::{SegmentFlag, WindowPair};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

fn value_col(name: &str, pairs: &BTreeMap<String, WindowPair>, f: impl Fn(&WindowPair) -> f64) -> Series {
    Series::new(name, pairs.values().map(f).collect::<Vec<f64>>())
}

fn ratio_col(name: &str, pairs: &BTreeMap<String, WindowPair>, f: impl Fn(&WindowPair) -> Ratio) -> Series {
    Series::new(name, pairs.values().map(|p| f(p).value()).collect::<Vec<Option<f64>>>())
}

pub fn segment_frame(dimension: Dimension, pairs: &BTreeMap<String, WindowPair>) -> Result<DataFrame> {
    let flags: Vec<&str> = pairs
        .values()
        .map(|p| match p.flag {
            Some(SegmentFlag::NewSegment) => "new_segment",
            Some(SegmentFlag::DroppedSegment) => "dropped_segment",
            None => "",
        })
        .collect();

    let df = DataFrame::new(vec![
        Series::new(dimension.as_str(), pairs.keys().cloned().collect::<Vec<String>>()),
        Series::new("flag", flags),
        value_col("spend_cur", pairs, |p| p.current.spend),
        value_col("spend_base", pairs, |p| p.baseline.spend),
        value_col("revenue_cur", pairs, |p| p.current.revenue),
        value_col("revenue_base", pairs, |p| p.baseline.revenue),
        value_col("revenue_delta", pairs, |p| p.delta(Metric::Revenue)),
        ratio_col("revenue_pct_change", pairs, |p| p.pct_change(Metric::Revenue)),
        ratio_col("roas_cur", pairs, |p| p.current.roas),
        ratio_col("roas_base", pairs, |p| p.baseline.roas),
        value_col("roas_delta", pairs, |p| p.delta(Metric::Roas)),
        value_col("ctr_cur", pairs, |p| p.current.ctr),
        value_col("ctr_base", pairs, |p| p.baseline.ctr),
        ratio_col("cpa_cur", pairs, |p| p.current.cpa),
        ratio_col("cpa_base", pairs, |p| p.baseline.cpa),
        value_col("purchases_cur", pairs, |p| p.current.purchases),
        value_col("purchases_base", pairs, |p| p.baseline.purchases),
        value_col("spend_share", pairs, |p| p.spend_share),
        ratio_col("revenue_contribution", pairs, |p| p.revenue_contribution),
    ])?;
    Ok(df)
}

pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).finish(df)?;
    Ok(())
}
