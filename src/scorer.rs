//! Insight evaluation
//!
//! Scores one insight on four axes (correctness, specificity, actionability,
//! alignment) against the evidence it cites and the plan it was drafted for.
//! The scorer is stateless; retries are the caller's business.

use crate::config::ScoringConfig;
use crate::insight::{Insight, Measure};
use crate::metrics::Metric;
use crate::planner::AnalysisPlan;
use crate::window::WindowPair;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

const EPSILON: f64 = 1e-9;

lazy_static! {
    static ref NUMBER_RE: Regex = Regex::new(r"\d+(?:[.,]\d+)*").unwrap();
    static ref MAGNITUDE_RE: Regex =
        Regex::new(r"(?:\d+(?:\.\d+)?\s*(?:-\s*\d+(?:\.\d+)?\s*)?%|\$\s?\d[\d,]*(?:\.\d+)?|\d+(?:\.\d+)?x\b)").unwrap();
    static ref ACTION_RE: Regex = Regex::new(
        r"\b(?:reallocate|increase|decrease|reduce|pause|scale|refresh|shift|adjust|cut|raise|test|launch|rotate|move)\b"
    )
    .unwrap();
    static ref CHANGE_RE: Regex = Regex::new(
        r"\b(?:gained|lost|drop(?:ped)?|rise|rose|declined?|improved?|fell|grew|surged)\b"
    )
    .unwrap();
    static ref VAGUE_RE: Regex = Regex::new(
        r"\b(?:significant(?:ly)?|substantial(?:ly)?|considerabl[ey]|some|many|several|various|a lot|somewhat|notabl[ey])\b"
    )
    .unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisScores {
    pub correctness: f64,
    pub specificity: f64,
    pub actionability: f64,
    pub alignment: f64,
}

impl AxisScores {
    fn named(&self) -> [(&'static str, f64); 4] {
        [
            ("correctness", self.correctness),
            ("specificity", self.specificity),
            ("actionability", self.actionability),
            ("alignment", self.alignment),
        ]
    }

    /// Lowest-scoring axis; earlier axes win ties.
    pub fn weakest(&self) -> (&'static str, f64) {
        self.named()
            .into_iter()
            .fold(("correctness", f64::INFINITY), |acc, cur| if cur.1 < acc.1 { cur } else { acc })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Validated,
    NeedsRevision,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Validated => f.write_str("validated"),
            Decision::NeedsRevision => f.write_str("needs_revision"),
        }
    }
}

/// Recomputation of one claimed number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimCheck {
    pub name: String,
    pub claimed: f64,
    pub actual: Option<f64>,
    pub relative_error: Option<f64>,
    pub score: f64,

    /// Within tolerance; a failed check is an evidence mismatch
    pub passed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub scores: AxisScores,
    pub final_score: f64,
    pub confidence: f64,
    pub decision: Decision,
    pub feedback: Feedback,
    pub claims: Vec<ClaimCheck>,
}

impl EvaluationResult {
    pub fn is_validated(&self) -> bool {
        self.decision == Decision::Validated
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &ClaimCheck> {
        self.claims.iter().filter(|c| !c.passed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatedInsight {
    pub insight: Insight,
    pub evaluation: EvaluationResult,

    /// Revision rounds this insight went through
    #[serde(default)]
    pub revisions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub total: usize,
    pub validated: usize,
    pub needs_revision: usize,
    pub avg_confidence: f64,
}

impl EvaluationSummary {
    pub fn from_results(results: &[EvaluatedInsight]) -> Self {
        let total = results.len();
        let validated = results.iter().filter(|r| r.evaluation.is_validated()).count();
        let avg_confidence = if total == 0 {
            0.0
        } else {
            results.iter().map(|r| r.evaluation.confidence).sum::<f64>() / total as f64
        };
        Self {
            total,
            validated,
            needs_revision: total - validated,
            avg_confidence,
        }
    }
}

pub struct InsightScorer {
    config: ScoringConfig,
    confidence_min: f64,
}

impl InsightScorer {
    pub fn new(config: ScoringConfig, confidence_min: f64) -> Self {
        Self {
            config,
            confidence_min,
        }
    }

    /// `evidence` is `Err(note)` when the insight's references could not be resolved.
    pub fn score(
        &self,
        insight: &Insight,
        evidence: std::result::Result<&WindowPair, String>,
        plan: &AnalysisPlan,
    ) -> EvaluationResult {
        let mut feedback = Feedback::default();

        let (correctness, claims) = match evidence {
            Ok(pair) => self.correctness(insight, pair, &mut feedback.notes),
            Err(note) => {
                feedback.notes.push(note);
                (0.0, unverifiable(insight))
            }
        };
        let text = insight.text();
        let text_l = text.to_lowercase();
        let metrics = mentioned_metrics(insight, &text_l);

        let scores = AxisScores {
            correctness,
            specificity: specificity(insight, &text_l, &metrics),
            actionability: actionability(insight),
            alignment: alignment(insight, &metrics, plan),
        };

        let w = &self.config.weights;
        let final_score = (scores.correctness * w.correctness
            + scores.specificity * w.specificity
            + scores.actionability * w.actionability
            + scores.alignment * w.alignment)
            / w.total();

        let has_mismatch = claims.iter().any(|c| !c.passed);
        let decision = if final_score >= self.confidence_min && !has_mismatch {
            Decision::Validated
        } else {
            Decision::NeedsRevision
        };

        collect_feedback(&scores, &claims, decision, &mut feedback);
        debug!(
            "Scored '{}': final={:.2} decision={}",
            insight.title, final_score, decision
        );

        EvaluationResult {
            scores,
            final_score,
            confidence: final_score,
            decision,
            feedback,
            claims,
        }
    }

    fn correctness(
        &self,
        insight: &Insight,
        pair: &WindowPair,
        notes: &mut Vec<String>,
    ) -> (f64, Vec<ClaimCheck>) {
        if insight.claimed_numbers.is_empty() {
            notes.push("No claimed numbers to verify".to_string());
            return (0.0, Vec::new());
        }

        let checks: Vec<ClaimCheck> = insight
            .claimed_numbers
            .iter()
            .map(|(name, &claimed)| self.check_claim(name, claimed, pair, notes))
            .collect();

        for c in &checks {
            match (c.actual, c.passed) {
                (Some(actual), true) => notes.push(format!("{} validated: {:.4}", c.name, actual)),
                (Some(actual), false) => notes.push(format!(
                    "{} mismatch: claimed {:.4}, evidence shows {:.4}",
                    c.name, c.claimed, actual
                )),
                (None, _) => notes.push(format!("{} cannot be recomputed from evidence", c.name)),
            }
        }

        let avg = checks.iter().map(|c| c.score).sum::<f64>() / checks.len() as f64;
        (avg, checks)
    }

    fn check_claim(&self, name: &str, claimed: f64, pair: &WindowPair, notes: &mut Vec<String>) -> ClaimCheck {
        let measure = name.parse::<Measure>().ok();
        let actual = match measure {
            Some(m) => m.evaluate(pair).or_else(|| {
                // undefined ratios are reported as 0.00 with a flag
                let flag = m.sentinel_flag(pair)?;
                notes.push(format!("{} is undefined ({}); checked against 0.00", name, flag));
                Some(0.0)
            }),
            None => None,
        };
        let Some(actual) = actual else {
            return unverified(name, claimed);
        };

        let abs_err = (claimed - actual).abs();
        let rel_err = abs_err / actual.abs().max(EPSILON);
        let cfg = &self.config;
        let score = if abs_err <= cfg.absolute_tolerance || rel_err <= cfg.tolerance {
            1.0
        } else if rel_err >= cfg.max_error {
            0.0
        } else {
            1.0 - (rel_err - cfg.tolerance) / (cfg.max_error - cfg.tolerance)
        };

        ClaimCheck {
            name: name.to_string(),
            claimed,
            actual: Some(actual),
            relative_error: Some(rel_err),
            score,
            passed: score >= 1.0,
        }
    }

    /// Score a batch; results come back sorted by final score, best first.
    pub fn evaluate_all<'a, F>(
        &self,
        insights: Vec<Insight>,
        plan: &AnalysisPlan,
        mut resolve: F,
    ) -> (Vec<EvaluatedInsight>, EvaluationSummary)
    where
        F: FnMut(&Insight) -> std::result::Result<&'a WindowPair, String>,
    {
        let mut results: Vec<EvaluatedInsight> = insights
            .into_iter()
            .map(|insight| {
                let evaluation = self.score(&insight, resolve(&insight), plan);
                EvaluatedInsight {
                    insight,
                    evaluation,
                    revisions: 0,
                }
            })
            .collect();
        sort_by_final(&mut results);
        let summary = EvaluationSummary::from_results(&results);
        (results, summary)
    }
}

fn unverified(name: &str, claimed: f64) -> ClaimCheck {
    ClaimCheck {
        name: name.to_string(),
        claimed,
        actual: None,
        relative_error: None,
        score: 0.0,
        passed: false,
    }
}

/// Every claim fails when the insight's evidence cannot be found.
fn unverifiable(insight: &Insight) -> Vec<ClaimCheck> {
    insight
        .claimed_numbers
        .iter()
        .map(|(name, &claimed)| unverified(name, claimed))
        .collect()
}

pub fn sort_by_final(results: &mut [EvaluatedInsight]) {
    results.sort_by(|a, b| b.evaluation.final_score.total_cmp(&a.evaluation.final_score));
}

/// Metrics the insight touches through claims or text.
fn mentioned_metrics(insight: &Insight, text_l: &str) -> BTreeSet<Metric> {
    let mut metrics: BTreeSet<Metric> = insight
        .claimed_numbers
        .keys()
        .filter_map(|k| k.parse::<Measure>().ok())
        .map(|m| m.metric())
        .collect();
    for metric in Metric::ALL {
        if metric.aliases().iter().any(|a| contains_word(text_l, a)) {
            metrics.insert(metric);
        }
    }
    metrics
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(i, _)| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + needle.len()..].chars().next();
        !before.map_or(false, |c| c.is_alphanumeric()) && !after.map_or(false, |c| c.is_alphanumeric())
    })
}

fn specificity(insight: &Insight, text_l: &str, metrics: &BTreeSet<Metric>) -> f64 {
    let title_l = insight.title.to_lowercase();
    let names_segment = match insight.segment_key() {
        Some(key) => title_l.contains(&key.value.to_lowercase()),
        None => title_l.contains("overall") || title_l.contains("aggregate") || title_l.contains("account"),
    };
    let title_has_number = NUMBER_RE.is_match(&title_l);
    let text_has_number = NUMBER_RE.is_match(text_l);

    // points out of 100
    let mut points: i32 = 0;
    if names_segment {
        points += 35;
    }
    points += 15 * metrics.len().min(2) as i32;
    if title_has_number {
        points += 35;
    }
    if VAGUE_RE.is_match(text_l) && !text_has_number {
        points -= 30;
    }
    f64::from(points.clamp(0, 100)) / 100.0
}

fn actionability(insight: &Insight) -> f64 {
    let conclusion = insight.conclusion().to_lowercase();
    let has_action = ACTION_RE.is_match(&conclusion);
    let has_magnitude = MAGNITUDE_RE.is_match(&conclusion);

    if has_action && has_magnitude {
        1.0
    } else if has_action {
        0.6
    } else if CHANGE_RE.is_match(&insight.title.to_lowercase()) {
        0.4
    } else {
        0.1
    }
}

fn alignment(insight: &Insight, metrics: &BTreeSet<Metric>, plan: &AnalysisPlan) -> f64 {
    let mut points: i32 = 0;

    if plan.primary_kpi().map_or(false, |k| metrics.contains(&k)) {
        points += 50;
    } else if plan.primary_kpis.iter().any(|k| metrics.contains(k)) {
        points += 35;
    }

    let dimension_planned = match insight.segment_key() {
        Some(key) => plan.segment_dims.contains(&key.dimension),
        None => true,
    };
    if dimension_planned {
        points += 30;
    }

    let relevant = match plan.problem_type.focus_metric() {
        Some(focus) => metrics.contains(&focus),
        None => true,
    };
    if relevant {
        points += 20;
    }
    f64::from(points) / 100.0
}

fn collect_feedback(scores: &AxisScores, claims: &[ClaimCheck], decision: Decision, feedback: &mut Feedback) {
    if scores.correctness >= 0.8 {
        feedback.strengths.push("Numbers validated against evidence".to_string());
    }
    if scores.specificity >= 0.8 {
        feedback.strengths.push("Names the segment and quotes concrete figures".to_string());
    }
    if scores.actionability >= 0.8 {
        feedback.strengths.push("Clear action with a magnitude".to_string());
    }
    if scores.alignment >= 0.8 {
        feedback.strengths.push("Targets the plan's primary KPI".to_string());
    }
    if feedback.strengths.is_empty() {
        feedback.strengths.push("Insight structure is present".to_string());
    }

    for c in claims.iter().filter(|c| !c.passed) {
        let msg = match (c.actual, c.relative_error) {
            (Some(actual), Some(err)) => format!(
                "Claimed {} = {:.4} does not match evidence {:.4} ({:.1}% off)",
                c.name,
                c.claimed,
                actual,
                err * 100.0
            ),
            _ => format!("Claimed {} = {:.4} cannot be verified; cite a recomputable measure", c.name, c.claimed),
        };
        feedback.improvements.push(msg);
    }
    if scores.specificity < 0.8 {
        feedback
            .improvements
            .push("Include the segment name and numeric values in the title".to_string());
    }
    if scores.actionability < 0.8 {
        feedback
            .improvements
            .push("Add a specific action with a magnitude (e.g. 'reallocate 20% of budget')".to_string());
    }
    if decision == Decision::NeedsRevision && claims.iter().all(|c| c.passed) {
        let (axis, value) = scores.weakest();
        feedback
            .improvements
            .push(format!("Weakest axis: {} ({:.2})", axis, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dimension;
    use crate::insight::{ImpactLevel, Reasoning};
    use crate::metrics::{MetricSet, Ratio};
    use crate::planner::ProblemType;
    use std::collections::BTreeMap;

    fn plan() -> AnalysisPlan {
        AnalysisPlan {
            task: "Why did ROAS drop?".to_string(),
            problem_type: ProblemType::RoasDrop,
            hypotheses: vec![],
            window_days: 7,
            primary_kpis: vec![Metric::Roas, Metric::Revenue, Metric::Cpa],
            segment_dims: vec![Dimension::CampaignName, Dimension::Platform],
        }
    }

    fn evidence() -> WindowPair {
        // current roas 11.87, baseline 12.50
        WindowPair::new(
            MetricSet::from_totals(10, 1000.0, 50_000.0, 900.0, 90.0, 11_870.0),
            MetricSet::from_totals(10, 1000.0, 50_000.0, 950.0, 95.0, 12_500.0),
            4000.0,
            -630.0,
        )
    }

    fn insight(claims: &[(&str, f64)]) -> Insight {
        Insight {
            title: "campaign_name: 'Summer Sale' lost $630 revenue (ROAS 11.87 vs 12.50)".to_string(),
            claimed_numbers: claims.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            segment_filters: BTreeMap::from([(Dimension::CampaignName, "Summer Sale".to_string())]),
            evidence_refs: vec!["segments:campaign_name:top_losers".to_string()],
            confidence: 0.7,
            impact: ImpactLevel::Low,
            reasoning: Some(Reasoning {
                think: "ROAS fell from 12.50 to 11.87.".to_string(),
                analyze: "Spend held flat while purchases declined.".to_string(),
                conclude: "Reallocate 20% of budget from this campaign to the top gainers.".to_string(),
            }),
        }
    }

    fn scorer() -> InsightScorer {
        InsightScorer::new(ScoringConfig::default(), 0.6)
    }

    #[test]
    fn test_exact_claims_score_full_correctness() {
        let pair = evidence();
        let claims = [
            ("roas_cur", pair.current.roas.or_zero()),
            ("roas_base", pair.baseline.roas.or_zero()),
            ("revenue_delta", pair.delta(Metric::Revenue)),
            ("spend_share", pair.spend_share),
        ];
        let result = scorer().score(&insight(&claims), Ok(&pair), &plan());
        assert_eq!(result.scores.correctness, 1.0);
        assert!(result.claims.iter().all(|c| c.passed));
    }

    #[test]
    fn test_roas_11_87_scenario_is_validated() {
        let pair = evidence();
        let result = scorer().score(&insight(&[("roas_cur", 11.87)]), Ok(&pair), &plan());
        assert_eq!(result.scores.correctness, 1.0);
        assert_eq!(result.decision, Decision::Validated);
        assert!(result.final_score >= 0.6);

        // 11.88 is well inside the 1% relative tolerance
        let result = scorer().score(&insight(&[("roas_cur", 11.88)]), Ok(&pair), &plan());
        assert_eq!(result.scores.correctness, 1.0);
    }

    #[test]
    fn test_mismatch_degrades_linearly_and_demotes() {
        let pair = evidence();
        // 13% relative error: halfway between 1% and 25%
        let claimed = 11.87 * 1.13;
        let result = scorer().score(&insight(&[("roas_cur", claimed)]), Ok(&pair), &plan());
        assert!((result.scores.correctness - 0.5).abs() < 1e-6);
        assert_eq!(result.decision, Decision::NeedsRevision);
        assert!(result.feedback.improvements.iter().any(|m| m.contains("roas_cur")));

        let result = scorer().score(&insight(&[("roas_cur", 30.0)]), Ok(&pair), &plan());
        assert_eq!(result.scores.correctness, 0.0);
    }

    #[test]
    fn test_unknown_measure_and_missing_evidence() {
        let pair = evidence();
        let result = scorer().score(&insight(&[("mood_cur", 1.0)]), Ok(&pair), &plan());
        assert_eq!(result.scores.correctness, 0.0);
        assert!(result.feedback.notes.iter().any(|n| n.contains("cannot be recomputed")));

        let result = scorer().score(
            &insight(&[("roas_cur", 11.87)]),
            Err("segment campaign_name=Summer Sale not found in evidence".to_string()),
            &plan(),
        );
        assert_eq!(result.scores.correctness, 0.0);
        assert_eq!(result.claims.len(), 1);
        assert!(result.feedback.notes[0].contains("not found"));
    }

    #[test]
    fn test_claims_without_evidence_need_revision() {
        let mut fabricated = insight(&[("roas_cur", 99.0), ("revenue_delta", -123_456.0)]);
        fabricated.segment_filters = BTreeMap::from([(Dimension::CampaignName, "Totally Fabricated".to_string())]);
        let result = scorer().score(
            &fabricated,
            Err("segment campaign_name=Totally Fabricated not found in evidence".to_string()),
            &plan(),
        );

        // the other axes alone clear the threshold
        assert!(result.final_score >= 0.6);
        assert_eq!(result.decision, Decision::NeedsRevision);
        assert_eq!(result.claims.len(), 2);
        assert!(result.claims.iter().all(|c| !c.passed && c.actual.is_none()));
        for name in ["roas_cur", "revenue_delta"] {
            assert!(
                result.feedback.improvements.iter().any(|m| m.contains(name)),
                "no improvement names {}",
                name
            );
        }
    }

    #[test]
    fn test_zero_spend_roas_claimed_as_zero_passes() {
        // segment B dropped: 1000 spend / 8480 revenue in baseline, nothing now
        let dropped = WindowPair::new(
            MetricSet::zero(),
            MetricSet::from_totals(1, 1000.0, 50_000.0, 500.0, 40.0, 8480.0),
            200.0,
            -8900.0,
        );
        assert_eq!(dropped.current.roas, Ratio::Undefined);

        let result = scorer().score(
            &insight(&[("roas_cur", 0.0), ("revenue_delta", -8480.0)]),
            Ok(&dropped),
            &plan(),
        );
        assert_eq!(result.scores.correctness, 1.0);
        assert!(result.claims.iter().all(|c| c.passed));
        assert!(result
            .feedback
            .notes
            .iter()
            .any(|n| n == "roas_cur is undefined (zero spend); checked against 0.00"));

        // a non-zero ROAS on a zero-spend window is still a mismatch
        let result = scorer().score(&insight(&[("roas_cur", 5.0)]), Ok(&dropped), &plan());
        assert_eq!(result.decision, Decision::NeedsRevision);
        assert_eq!(result.claims[0].actual, Some(0.0));
    }

    #[test]
    fn test_vague_insight_scores_low_and_names_weakest_axis() {
        let pair = evidence();
        let vague = Insight {
            title: "Some campaigns are doing significantly worse".to_string(),
            claimed_numbers: BTreeMap::from([("roas_cur".to_string(), 11.87)]),
            segment_filters: BTreeMap::new(),
            evidence_refs: vec!["overview".to_string()],
            confidence: 0.3,
            impact: ImpactLevel::Low,
            reasoning: None,
        };
        let result = scorer().score(&vague, Ok(&pair), &plan());
        assert_eq!(result.scores.specificity, 0.0);
        assert!(result.scores.actionability <= 0.1 + 1e-9);
        assert_eq!(result.decision, Decision::NeedsRevision);
        assert!(result
            .feedback
            .improvements
            .iter()
            .any(|m| m.starts_with("Weakest axis: specificity")));
    }

    #[test]
    fn test_specific_actionable_insight_axes() {
        let pair = evidence();
        let result = scorer().score(&insight(&[("roas_cur", 11.87)]), Ok(&pair), &plan());
        assert_eq!(result.scores.specificity, 1.0);
        assert_eq!(result.scores.actionability, 1.0);
        assert_eq!(result.scores.alignment, 1.0);
    }

    #[test]
    fn test_alignment_drops_for_unplanned_dimension_and_kpi() {
        let pair = evidence();
        let mut off_plan = insight(&[("clicks_delta", pair.delta(Metric::Clicks))]);
        off_plan.title = "country: 'Summer Sale' saw 50 fewer clicks".to_string();
        off_plan.reasoning = None;
        off_plan.segment_filters = BTreeMap::from([(Dimension::Country, "Summer Sale".to_string())]);
        let result = scorer().score(&off_plan, Ok(&pair), &plan());
        assert_eq!(result.scores.alignment, 0.0);
    }

    #[test]
    fn test_custom_weights() {
        let mut config = ScoringConfig::default();
        config.weights.specificity = 0.0;
        config.weights.actionability = 0.0;
        config.weights.alignment = 0.0;
        let pair = evidence();
        let result = InsightScorer::new(config, 0.6).score(&insight(&[("roas_cur", 11.87)]), Ok(&pair), &plan());
        assert_eq!(result.final_score, 1.0);
    }

    #[test]
    fn test_evaluate_all_sorts_and_summarizes() {
        let pair = evidence();
        let good = insight(&[("roas_cur", 11.87)]);
        let mut bad = insight(&[("roas_cur", 30.0)]);
        bad.title = "bad".to_string();
        let (results, summary) = scorer().evaluate_all(vec![bad, good], &plan(), |_| Ok(&pair));
        assert_eq!(results[0].insight.claimed_numbers["roas_cur"], 11.87);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.validated, 1);
        assert_eq!(summary.needs_revision, 1);
        assert!(summary.avg_confidence > 0.0);
    }

    #[test]
    fn test_contains_word() {
        assert!(contains_word("roas fell", "roas"));
        assert!(!contains_word("electric", "ctr"));
        assert!(contains_word("ctr: 1.2%", "ctr"));
    }
}
