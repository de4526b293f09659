//! Rule-based analysis planner
//!
//! Turns the analyst's task text into a plan: problem type, hypotheses,
//! window length, KPI priority and segment dimension order. The plan is what
//! the evaluator's alignment axis scores insights against.

use crate::config::AnalysisConfig;
use crate::dataset::Dimension;
use crate::error::{InsightError, Result};
use crate::metrics::Metric;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

lazy_static! {
    static ref WINDOW_RE: Regex = Regex::new(r"(?:last|past)\s*(\d{1,3})\s*(?:days|day|d)\b").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    RoasDrop,
    RevenueDecline,
    CpaSpike,
    CtrDecline,
    BudgetAllocation,
    CreativePerformance,
    AudienceQuality,
    SeasonalAnalysis,
    PerformanceIssue,
}

impl ProblemType {
    /// The KPI this problem is about, if it is about one.
    pub fn focus_metric(&self) -> Option<Metric> {
        match self {
            ProblemType::RoasDrop => Some(Metric::Roas),
            ProblemType::RevenueDecline => Some(Metric::Revenue),
            ProblemType::CpaSpike => Some(Metric::Cpa),
            ProblemType::CtrDecline => Some(Metric::Ctr),
            ProblemType::BudgetAllocation => Some(Metric::Spend),
            _ => None,
        }
    }

    fn hypotheses(&self) -> &'static [&'static str] {
        match self {
            ProblemType::RoasDrop => &[
                "Budget shifted to lower-ROAS segments",
                "Creative fatigue: older creatives losing effectiveness",
                "Audience dilution: targeting broadened, quality declined",
                "Platform mix changed toward lower-ROAS platforms",
                "Conversion rate or order value declined while spend grew",
            ],
            ProblemType::RevenueDecline => &[
                "Total spend decreased",
                "ROAS declined across segments",
                "High-revenue segments underperforming",
                "Fewer purchases at similar spend",
            ],
            ProblemType::CpaSpike => &[
                "CTR or CVR declined along the funnel",
                "Audience quality dropped",
                "Creative messages stopped resonating",
                "Spend moved to higher-CPA channels",
            ],
            ProblemType::CtrDecline => &[
                "Creative fatigue",
                "Audience mismatch",
                "More competition for attention",
                "Lower platform delivery quality",
            ],
            ProblemType::BudgetAllocation => &[
                "Budget concentrated in low-ROAS segments",
                "High-performing segments underfunded",
                "Platform budget mix suboptimal",
            ],
            ProblemType::CreativePerformance => &[
                "Older creatives declining",
                "Creative type mix suboptimal",
                "Message relevance declining",
            ],
            ProblemType::AudienceQuality => &[
                "Targeting too broad",
                "Lookalike audiences underperforming",
                "Retargeting effectiveness declining",
            ],
            ProblemType::SeasonalAnalysis => &[
                "Seasonal patterns affecting performance",
                "Cyclical trends in metrics",
            ],
            ProblemType::PerformanceIssue => &[
                "Check ROAS, revenue, CPA and CTR together",
                "Spend mix shifted",
                "Specific campaigns, adsets or platforms underperforming",
            ],
        }
    }

    fn kpis(&self) -> Vec<Metric> {
        match self {
            ProblemType::RoasDrop => vec![Metric::Roas, Metric::Revenue, Metric::Cpa],
            ProblemType::RevenueDecline => vec![Metric::Revenue, Metric::Roas, Metric::Cpa],
            ProblemType::CpaSpike => vec![Metric::Cpa, Metric::Ctr, Metric::Cvr, Metric::Roas],
            ProblemType::CtrDecline => vec![Metric::Ctr, Metric::Cvr, Metric::Cpa],
            _ => vec![Metric::Roas, Metric::Revenue],
        }
    }

    fn dimension_priority(&self) -> [Dimension; 6] {
        use Dimension::*;
        match self {
            ProblemType::RoasDrop => [CampaignName, AdsetName, CreativeType, Platform, AudienceType, Country],
            ProblemType::RevenueDecline => [CampaignName, AdsetName, Platform, Country, CreativeType, AudienceType],
            ProblemType::CpaSpike => [AudienceType, CreativeType, CampaignName, AdsetName, Platform, Country],
            ProblemType::CtrDecline => [CreativeType, AudienceType, CampaignName, Platform, AdsetName, Country],
            _ => [CampaignName, AdsetName, CreativeType, AudienceType, Platform, Country],
        }
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProblemType::RoasDrop => "roas_drop",
            ProblemType::RevenueDecline => "revenue_decline",
            ProblemType::CpaSpike => "cpa_spike",
            ProblemType::CtrDecline => "ctr_decline",
            ProblemType::BudgetAllocation => "budget_allocation",
            ProblemType::CreativePerformance => "creative_performance",
            ProblemType::AudienceQuality => "audience_quality",
            ProblemType::SeasonalAnalysis => "seasonal_analysis",
            ProblemType::PerformanceIssue => "performance_issue",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPlan {
    pub task: String,
    pub problem_type: ProblemType,
    pub hypotheses: Vec<String>,
    pub window_days: u32,
    pub primary_kpis: Vec<Metric>,
    pub segment_dims: Vec<Dimension>,
}

impl AnalysisPlan {
    pub fn primary_kpi(&self) -> Option<Metric> {
        self.primary_kpis.first().copied()
    }
}

pub struct Planner<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> Planner<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// `window_override` must be one of the configured windows.
    pub fn plan(&self, task: &str, window_override: Option<u32>) -> Result<AnalysisPlan> {
        let problem_type = classify_problem(task);
        let window_days = match window_override {
            Some(days) if self.config.time_windows.contains(&days) => days,
            Some(days) => {
                return Err(InsightError::InvalidWindow(format!(
                    "{} days is not an allowed window (allowed: {:?})",
                    days, self.config.time_windows
                )))
            }
            None => extract_window_days(task, &self.config.time_windows),
        };

        let plan = AnalysisPlan {
            task: task.to_string(),
            problem_type,
            hypotheses: problem_type.hypotheses().iter().map(|h| h.to_string()).collect(),
            window_days,
            primary_kpis: self.choose_kpis(task, problem_type),
            segment_dims: self.choose_segments(problem_type),
        };
        info!(
            "Plan: problem_type={} window={}d kpis={:?}",
            plan.problem_type, plan.window_days, plan.primary_kpis
        );
        Ok(plan)
    }

    fn choose_kpis(&self, task: &str, problem_type: ProblemType) -> Vec<Metric> {
        let task_l = task.to_lowercase();
        let explicit = [Metric::Roas, Metric::Revenue, Metric::Cpa, Metric::Ctr]
            .into_iter()
            .filter(|m| m.aliases().iter().any(|a| task_l.contains(a)));

        let mut kpis: Vec<Metric> = Vec::new();
        for kpi in explicit
            .chain(problem_type.kpis())
            .chain(self.config.kpis.iter().copied())
        {
            if !kpis.contains(&kpi) {
                kpis.push(kpi);
            }
        }
        kpis
    }

    fn choose_segments(&self, problem_type: ProblemType) -> Vec<Dimension> {
        let available = &self.config.segment_dims;
        let mut dims: Vec<Dimension> = problem_type
            .dimension_priority()
            .into_iter()
            .filter(|d| available.contains(d))
            .collect();
        for d in available {
            if !dims.contains(d) {
                dims.push(*d);
            }
        }
        dims
    }
}

pub fn classify_problem(task: &str) -> ProblemType {
    let t = task.to_lowercase();
    let any = |keys: &[&str]| keys.iter().any(|k| t.contains(k));

    if any(&["roas", "return on ad spend", "return on spend"]) {
        ProblemType::RoasDrop
    } else if any(&["revenue", "sales", "income"]) {
        ProblemType::RevenueDecline
    } else if any(&["cpa", "cost per acquisition", "cost per purchase", "acquisition cost"]) {
        ProblemType::CpaSpike
    } else if any(&["ctr", "click-through", "click rate", "engagement"]) {
        ProblemType::CtrDecline
    } else if any(&["budget", "spend allocation", "spend distribution"]) {
        ProblemType::BudgetAllocation
    } else if any(&["creative"]) {
        ProblemType::CreativePerformance
    } else if any(&["audience", "targeting"]) {
        ProblemType::AudienceQuality
    } else if any(&["seasonal", "season", "month over month", "yoy"]) {
        ProblemType::SeasonalAnalysis
    } else {
        ProblemType::PerformanceIssue
    }
}

/// Closest allowed window to an explicit "last N days", else keyword hints,
/// else the smallest allowed window.
pub fn extract_window_days(task: &str, allowed: &[u32]) -> u32 {
    let smallest = allowed.iter().copied().min().unwrap_or(7);
    let closest_to = |target: u32| {
        allowed
            .iter()
            .copied()
            .min_by_key(|w| (w.abs_diff(target), *w))
            .unwrap_or(smallest)
    };

    let t = task.to_lowercase();
    if let Some(caps) = WINDOW_RE.captures(&t) {
        if let Ok(n) = caps[1].parse::<u32>() {
            return closest_to(n);
        }
    }
    if t.contains("fortnight") || t.contains("2 weeks") || t.contains("14d") {
        return closest_to(14);
    }
    if t.contains("month") || t.contains("28d") || t.contains("30d") {
        return if allowed.contains(&28) { 28 } else { closest_to(30) };
    }
    if t.contains("week") || t.contains("7d") {
        return closest_to(7);
    }
    smallest
}
