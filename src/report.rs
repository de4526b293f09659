//! Run report and artifacts
//!
//! Undefined ratios stay tagged all the way here and are collapsed to the
//! `0.00 (flag)` rendering only at this boundary.

use crate::creative::CreativeSelection;
use crate::dataset::Dimension;
use crate::error::Result;
use crate::evidence;
use crate::insight::format_ratio;
use crate::metrics::{Metric, Ratio};
use crate::planner::AnalysisPlan;
use crate::ranking::{RankedSegment, RankedSegments};
use crate::scorer::{EvaluatedInsight, EvaluationSummary};
use crate::window::{ComparisonWindows, WindowPair};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub plan: AnalysisPlan,
    pub windows: ComparisonWindows,
    pub global: WindowPair,
    pub rankings: Vec<RankedSegments>,

    /// Drafter that produced the insights and how many attempts it took
    pub draft_source: String,
    pub draft_attempts: u32,

    pub insights: Vec<EvaluatedInsight>,
    pub summary: EvaluationSummary,
    pub creatives: CreativeSelection,
    pub data_notes: Vec<String>,

    /// Full per-dimension evidence, exported as CSV rather than JSON
    #[serde(skip)]
    pub segments: BTreeMap<Dimension, BTreeMap<String, WindowPair>>,
}

const OVERVIEW_METRICS: [Metric; 10] = [
    Metric::Spend,
    Metric::Revenue,
    Metric::Roas,
    Metric::Purchases,
    Metric::Cpa,
    Metric::Impressions,
    Metric::Clicks,
    Metric::Ctr,
    Metric::Cvr,
    Metric::Cpc,
];

fn format_value(metric: Metric, ratio: Ratio) -> String {
    match (metric, ratio) {
        (Metric::Ctr | Metric::Cvr, Ratio::Defined(v)) => format!("{:.2}%", v * 100.0),
        (Metric::Spend | Metric::Revenue | Metric::Cpa | Metric::Cpc, Ratio::Defined(v)) => format!("${:.2}", v),
        (Metric::Impressions | Metric::Clicks | Metric::Purchases, Ratio::Defined(v)) => format!("{:.0}", v),
        _ => format_ratio(ratio, metric.undefined_flag()),
    }
}

fn format_pct(ratio: Ratio) -> String {
    match ratio {
        Ratio::Defined(v) => format!("{:+.1}%", v),
        Ratio::Undefined => "n/a".to_string(),
    }
}

impl Report {
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = self.write_markdown(&mut out);
        out
    }

    fn write_markdown(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "# Ad performance report")?;
        writeln!(out)?;
        writeln!(out, "- Run: `{}`", self.run_id)?;
        writeln!(out, "- Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(out, "- Source: {}", self.source)?;
        writeln!(out, "- Task: {}", self.plan.task)?;
        writeln!(out, "- Problem type: {}", self.plan.problem_type)?;
        writeln!(
            out,
            "- Current window: {} | Baseline window: {} ({} days)",
            self.windows.current,
            self.windows.baseline,
            self.windows.window_days()
        )?;
        writeln!(out, "- Primary KPIs: {}", self.plan.primary_kpis.iter().join(", "))?;
        writeln!(out, "- Insights drafted by: {} ({} attempt(s))", self.draft_source, self.draft_attempts)?;

        writeln!(out, "\n## Hypotheses\n")?;
        for h in &self.plan.hypotheses {
            writeln!(out, "- {}", h)?;
        }

        writeln!(out, "\n## Overview\n")?;
        writeln!(out, "| Metric | Current | Baseline | Delta | Change |")?;
        writeln!(out, "|---|---|---|---|---|")?;
        for metric in OVERVIEW_METRICS {
            writeln!(
                out,
                "| {} | {} | {} | {:+.2} | {} |",
                metric.as_str().to_uppercase(),
                format_value(metric, self.global.current.ratio(metric)),
                format_value(metric, self.global.baseline.ratio(metric)),
                self.global.delta(metric),
                format_pct(self.global.pct_change(metric))
            )?;
        }

        writeln!(out, "\n## Segments\n")?;
        for ranked in &self.rankings {
            if ranked.is_empty() {
                continue;
            }
            writeln!(out, "### {}\n", ranked.dimension)?;
            write_segment_table(out, "Top gainers", &ranked.gainers)?;
            write_segment_table(out, "Top losers", &ranked.losers)?;
            write_segment_table(out, "Dropped segments", &ranked.dropped)?;
        }

        writeln!(out, "\n## Insights\n")?;
        writeln!(
            out,
            "{} insight(s): {} validated, {} need revision, average confidence {:.2}\n",
            self.summary.total, self.summary.validated, self.summary.needs_revision, self.summary.avg_confidence
        )?;
        for (i, item) in self.insights.iter().enumerate() {
            let eval = &item.evaluation;
            writeln!(out, "### {}. {}\n", i + 1, item.insight.title)?;
            writeln!(
                out,
                "- Decision: **{}** (final {:.2}; correctness {:.2}, specificity {:.2}, actionability {:.2}, alignment {:.2})",
                eval.decision,
                eval.final_score,
                eval.scores.correctness,
                eval.scores.specificity,
                eval.scores.actionability,
                eval.scores.alignment
            )?;
            writeln!(out, "- Impact: {:?}", item.insight.impact)?;
            if item.revisions > 0 {
                writeln!(out, "- Revised {} time(s)", item.revisions)?;
            }
            if let Some(r) = &item.insight.reasoning {
                writeln!(out, "- Think: {}", r.think)?;
                writeln!(out, "- Analyze: {}", r.analyze)?;
                writeln!(out, "- Conclude: {}", r.conclude)?;
            }
            if !item.insight.claimed_numbers.is_empty() {
                let claims = item
                    .insight
                    .claimed_numbers
                    .iter()
                    .map(|(k, v)| format!("{}={:.4}", k, v))
                    .join(", ");
                writeln!(out, "- Claims: {}", claims)?;
            }
            for improvement in &eval.feedback.improvements {
                writeln!(out, "- To improve: {}", improvement)?;
            }
            writeln!(out)?;
        }

        writeln!(out, "## Creative recommendations\n")?;
        if self.creatives.recommendations.is_empty() {
            writeln!(out, "No segment below the CTR threshold ({:.2}%) qualified.", self.creatives.threshold * 100.0)?;
        }
        for rec in &self.creatives.recommendations {
            writeln!(
                out,
                "- **{}**: CTR {:.2}% -> target {:.2}% using {} (CTR {:.2}%), ROAS {}",
                rec.target.value,
                rec.current_ctr * 100.0,
                rec.target_ctr * 100.0,
                rec.donor.value,
                rec.donor_ctr * 100.0,
                format_ratio(rec.current_roas, "zero spend")
            )?;
            writeln!(
                out,
                "  - {} / {} / {} ({})",
                rec.idea.hook, rec.idea.body, rec.idea.cta, rec.idea.strategy
            )?;
            writeln!(out, "  - {}", rec.rationale)?;
        }
        for skipped in &self.creatives.skipped {
            writeln!(out, "- Skipped {}: no donor above the threshold", skipped.target)?;
        }

        if !self.data_notes.is_empty() {
            writeln!(out, "\n## Data notes\n")?;
            for note in &self.data_notes {
                writeln!(out, "- {}", note)?;
            }
        }
        Ok(())
    }

    /// Write every artifact into `out_dir` and return the written paths.
    pub fn write_artifacts(&self, out_dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(out_dir)?;
        let mut written = Vec::new();

        let md = out_dir.join("report.md");
        fs::write(&md, self.render_markdown())?;
        written.push(md);

        let json = out_dir.join("report.json");
        fs::write(&json, serde_json::to_string_pretty(self)?)?;
        written.push(json);

        let insights = out_dir.join("insights.json");
        fs::write(
            &insights,
            serde_json::to_string_pretty(&serde_json::json!({
                "summary": self.summary,
                "insights": self.insights,
            }))?,
        )?;
        written.push(insights);

        let creatives = out_dir.join("creatives.json");
        fs::write(&creatives, serde_json::to_string_pretty(&self.creatives)?)?;
        written.push(creatives);

        for (dim, pairs) in &self.segments {
            let path = out_dir.join(format!("segments_{}.csv", dim));
            let mut df = evidence::segment_frame(*dim, pairs)?;
            evidence::write_csv(&mut df, &path)?;
            written.push(path);
        }

        info!("Wrote {} artifact(s) to {:?}", written.len(), out_dir);
        Ok(written)
    }
}

fn write_segment_table(out: &mut String, heading: &str, list: &[RankedSegment]) -> fmt::Result {
    if list.is_empty() {
        return Ok(());
    }
    writeln!(out, "**{}**\n", heading)?;
    writeln!(out, "| Segment | Impact | Revenue (cur / base) | ROAS (cur / base) | Spend share |")?;
    writeln!(out, "|---|---|---|---|---|")?;
    for s in list {
        writeln!(
            out,
            "| {} | {:+.2} | ${:.2} / ${:.2} | {} / {} | {:.1}% |",
            s.key.value,
            s.impact,
            s.pair.current.revenue,
            s.pair.baseline.revenue,
            format_ratio(s.pair.current.roas, "zero spend"),
            format_ratio(s.pair.baseline.roas, "zero spend"),
            s.pair.spend_share * 100.0
        )?;
    }
    writeln!(out)
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Report {} for: {}", self.run_id, self.plan.task)?;
        writeln!(
            f,
            "Problem: {} | Window: {} days | Current: {} | Baseline: {}",
            self.plan.problem_type,
            self.windows.window_days(),
            self.windows.current,
            self.windows.baseline
        )?;
        writeln!(
            f,
            "ROAS {} vs {} | Revenue ${:.2} vs ${:.2}",
            format_ratio(self.global.current.roas, "zero spend"),
            format_ratio(self.global.baseline.roas, "zero spend"),
            self.global.current.revenue,
            self.global.baseline.revenue
        )?;

        writeln!(f, "\n=== Insights ({} validated / {}) ===", self.summary.validated, self.summary.total)?;
        for item in &self.insights {
            writeln!(
                f,
                "- [{} {:.2}] {}",
                item.evaluation.decision, item.evaluation.final_score, item.insight.title
            )?;
        }

        writeln!(f, "\n=== Creative recommendations ===")?;
        for rec in &self.creatives.recommendations {
            writeln!(
                f,
                "- {} -> {} (CTR {:.2}% -> {:.2}%)",
                rec.target.value,
                rec.donor.value,
                rec.current_ctr * 100.0,
                rec.target_ctr * 100.0
            )?;
        }
        Ok(())
    }
}
