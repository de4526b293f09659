//! Insight drafting
//!
//! A drafter turns comparison evidence into candidate insights. The pipeline
//! owns the retry/timeout policy; when the configured drafter keeps failing,
//! the deterministic rule-based drafter takes over so a run always completes.

use crate::error::{InsightError, Result};
use crate::insight::{ImpactLevel, Insight, Measure, Reasoning, OVERVIEW_REF};
use crate::metrics::Metric;
use crate::planner::AnalysisPlan;
use crate::ranking::{RankedSegment, RankedSegments};
use crate::scorer::EvaluationResult;
use crate::window::{ComparisonResult, WindowPair};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

/// Evidence handed to a drafter.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DraftContext<'a> {
    pub plan: &'a AnalysisPlan,
    pub comparison: &'a ComparisonResult,
    pub rankings: &'a [RankedSegments],
}

#[async_trait]
pub trait InsightDrafter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn draft(&self, ctx: &DraftContext<'_>) -> Result<Vec<Insight>>;

    /// Replacement for an insight that needs revision; `None` keeps the original.
    async fn revise(
        &self,
        _ctx: &DraftContext<'_>,
        _insight: &Insight,
        _evaluation: &EvaluationResult,
    ) -> Result<Option<Insight>> {
        Ok(None)
    }
}

/// Insights per direction (gainers, losers, dropped) per dimension.
const PER_DIMENSION: usize = 2;

/// Deterministic drafter built straight from the ranked evidence.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedDrafter;

impl RuleBasedDrafter {
    pub fn new() -> Self {
        Self
    }

    pub fn draft_sync(&self, ctx: &DraftContext<'_>) -> Vec<Insight> {
        let mut insights = vec![overview_insight(ctx.plan, &ctx.comparison.global)];
        let global_roas = ctx.comparison.global.current.roas.or_zero();

        for dim in &ctx.plan.segment_dims {
            let Some(ranked) = ctx.rankings.iter().find(|r| r.dimension == *dim) else {
                continue;
            };
            for seg in ranked.losers.iter().take(PER_DIMENSION) {
                insights.push(segment_insight(seg, Direction::Loser, global_roas));
            }
            for seg in ranked.gainers.iter().take(PER_DIMENSION) {
                insights.push(segment_insight(seg, Direction::Gainer, global_roas));
            }
            for seg in ranked.dropped.iter().take(PER_DIMENSION) {
                insights.push(dropped_insight(seg));
            }
        }
        insights
    }

    /// Re-derive the claimed numbers from evidence. Claims that cannot be
    /// recomputed are dropped, mismatched ones are corrected.
    pub fn repair(&self, ctx: &DraftContext<'_>, insight: &Insight) -> Option<Insight> {
        let pair = insight.resolve_evidence(ctx.comparison).ok()?;
        let mut claims = BTreeMap::new();
        for name in insight.claimed_numbers.keys() {
            if let Some((key, value)) = name.parse::<Measure>().ok().and_then(|m| m.claim(pair)) {
                claims.insert(key, value);
            }
        }
        if claims.is_empty() {
            for measure in [Measure::Current(Metric::Roas), Measure::Delta(Metric::Revenue)] {
                claims.extend(measure.claim(pair));
            }
        }
        if claims == insight.claimed_numbers {
            return None;
        }
        Some(Insight {
            claimed_numbers: claims,
            ..insight.clone()
        })
    }
}

#[async_trait]
impl InsightDrafter for RuleBasedDrafter {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    async fn draft(&self, ctx: &DraftContext<'_>) -> Result<Vec<Insight>> {
        Ok(self.draft_sync(ctx))
    }

    async fn revise(
        &self,
        ctx: &DraftContext<'_>,
        insight: &Insight,
        evaluation: &EvaluationResult,
    ) -> Result<Option<Insight>> {
        if evaluation.mismatches().next().is_none() {
            return Ok(None);
        }
        Ok(self.repair(ctx, insight))
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Gainer,
    Loser,
}

fn claims_for(pair: &WindowPair, measures: &[Measure]) -> BTreeMap<String, f64> {
    measures.iter().filter_map(|m| m.claim(pair)).collect()
}

fn signed_money(v: f64) -> String {
    if v < 0.0 {
        format!("-${:.0}", v.abs())
    } else {
        format!("+${:.0}", v)
    }
}

fn impact_of(pair: &WindowPair) -> ImpactLevel {
    ImpactLevel::classify(pair.delta(Metric::Revenue), pair.delta(Metric::Roas), pair.spend_share)
}

fn overview_insight(plan: &AnalysisPlan, global: &WindowPair) -> Insight {
    let focus = plan.primary_kpi().unwrap_or(Metric::Roas);
    let measures = [
        Measure::Current(Metric::Roas),
        Measure::Baseline(Metric::Roas),
        Measure::Delta(Metric::Revenue),
        Measure::Delta(Metric::Spend),
        Measure::Current(focus),
        Measure::Baseline(focus),
    ];
    let claimed_numbers = claims_for(global, &measures);

    let roas_cur = global.current.roas.or_zero();
    let roas_base = global.baseline.roas.or_zero();
    let revenue_delta = global.delta(Metric::Revenue);
    let spend_delta = global.delta(Metric::Spend);
    let pct = global
        .pct_change(Metric::Roas)
        .value()
        .map(|p| format!(" ({:+.1}%)", p))
        .unwrap_or_default();

    let title = format!(
        "Overall ROAS {:.2} vs {:.2}{}, revenue {}",
        roas_cur,
        roas_base,
        pct,
        signed_money(revenue_delta)
    );
    let conclude = if revenue_delta < 0.0 {
        "Shift 10-20% of budget from the top losing segments to the top gainers and re-check ROAS next window."
            .to_string()
    } else {
        "Scale the top gaining segments by 10-15% while ROAS holds and keep the losers under review.".to_string()
    };

    Insight {
        title,
        claimed_numbers,
        segment_filters: BTreeMap::new(),
        evidence_refs: vec![OVERVIEW_REF.to_string()],
        confidence: 0.75,
        impact: impact_of(global),
        reasoning: Some(Reasoning {
            think: format!(
                "Task '{}' is a {} problem; overall ROAS moved from {:.2} to {:.2}.",
                plan.task, plan.problem_type, roas_base, roas_cur
            ),
            analyze: format!(
                "Spend changed by {} and revenue by {} between the baseline and current windows.",
                signed_money(spend_delta),
                signed_money(revenue_delta)
            ),
            conclude,
        }),
    }
}

fn segment_insight(seg: &RankedSegment, direction: Direction, global_roas: f64) -> Insight {
    let pair = &seg.pair;
    let key = &seg.key;
    let measures = [
        Measure::Delta(Metric::Revenue),
        Measure::Current(Metric::Roas),
        Measure::Baseline(Metric::Roas),
        Measure::SpendShare,
    ];
    let revenue_delta = pair.delta(Metric::Revenue);
    let roas_cur = pair.current.roas.or_zero();
    let roas_base = pair.baseline.roas.or_zero();

    let verb = match direction {
        Direction::Gainer => "gained",
        Direction::Loser => "lost",
    };
    let title = format!(
        "{}: '{}' {} ${:.0} revenue (ROAS {:.2} vs {:.2})",
        key.dimension,
        key.value,
        verb,
        revenue_delta.abs(),
        roas_cur,
        roas_base
    );

    let analyze = format!(
        "Spend {} with {:.1}% of current spend; purchases {} and ROAS {:.2} is {} the account's {:.2}.",
        signed_money(pair.delta(Metric::Spend)),
        pair.spend_share * 100.0,
        pair.delta(Metric::Purchases),
        roas_cur,
        if roas_cur >= global_roas { "at or above" } else { "below" },
        global_roas
    );
    let conclude = match direction {
        Direction::Gainer => format!(
            "Increase '{}' budget by 15-20% while ROAS stays above {:.2}.",
            key.value, global_roas
        ),
        Direction::Loser if roas_cur < global_roas => format!(
            "Reduce '{}' budget by 20% and reallocate it to the top gainers in {}.",
            key.value, key.dimension
        ),
        Direction::Loser => format!(
            "Refresh '{}' creatives and hold budget; revenue fell {:.0}% on efficient ROAS.",
            key.value,
            pair.pct_change(Metric::Revenue).or_zero().abs()
        ),
    };
    let list = match direction {
        Direction::Gainer => "top_gainers",
        Direction::Loser => "top_losers",
    };

    Insight {
        title,
        claimed_numbers: claims_for(pair, &measures),
        segment_filters: BTreeMap::from([(key.dimension, key.value.clone())]),
        evidence_refs: vec![format!("segments:{}:{}", key.dimension, list)],
        confidence: if pair.spend_share >= 0.05 { 0.75 } else { 0.65 },
        impact: impact_of(pair),
        reasoning: Some(Reasoning {
            think: format!(
                "{} '{}' moved revenue by {} between windows.",
                key.dimension,
                key.value,
                signed_money(revenue_delta)
            ),
            analyze,
            conclude,
        }),
    }
}

fn dropped_insight(seg: &RankedSegment) -> Insight {
    let pair = &seg.pair;
    let key = &seg.key;
    let measures = [
        Measure::Baseline(Metric::Revenue),
        Measure::Baseline(Metric::Spend),
        Measure::Delta(Metric::Revenue),
    ];
    Insight {
        title: format!(
            "{}: '{}' stopped delivering and lost ${:.0} baseline revenue",
            key.dimension, key.value, pair.baseline.revenue
        ),
        claimed_numbers: claims_for(pair, &measures),
        segment_filters: BTreeMap::from([(key.dimension, key.value.clone())]),
        evidence_refs: vec![format!("segments:{}:dropped", key.dimension)],
        confidence: 0.65,
        impact: impact_of(pair),
        reasoning: Some(Reasoning {
            think: format!("'{}' had ${:.0} spend in the baseline and none now.", key.value, pair.baseline.spend),
            analyze: "The segment has no delivery in the current window, so the loss is not gradual decline."
                .to_string(),
            conclude: format!(
                "Check whether '{}' was stopped on purpose; if not, relaunch and scale it to 50% of its baseline ${:.0} budget.",
                key.value, pair.baseline.spend
            ),
        }),
    }
}

/// Caller-owned bounds for a fallible drafter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DraftingPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub backoff: Duration,
}

impl DraftingPolicy {
    pub fn from_config(config: &crate::config::LlmConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            timeout: config.timeout(),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DraftOutcome {
    pub insights: Vec<Insight>,

    /// Name of the drafter that produced the insights
    pub source: &'static str,
    pub attempts: u32,
}

/// Draft with `primary` under `policy`, falling back to the rule-based drafter.
pub async fn draft_with_fallback(
    primary: Option<&dyn InsightDrafter>,
    ctx: &DraftContext<'_>,
    policy: DraftingPolicy,
) -> DraftOutcome {
    let mut attempts = 0;
    if let Some(drafter) = primary {
        for attempt in 1..=policy.max_attempts {
            attempts = attempt;
            let error = match tokio::time::timeout(policy.timeout, drafter.draft(ctx)).await {
                Ok(Ok(insights)) if !insights.is_empty() => {
                    info!("{} drafted {} insight(s) on attempt {}", drafter.name(), insights.len(), attempt);
                    return DraftOutcome {
                        insights,
                        source: drafter.name(),
                        attempts,
                    };
                }
                Ok(Ok(_)) => InsightError::Llm("drafter returned no insights".to_string()),
                Ok(Err(e)) => e,
                Err(_) => InsightError::Llm(format!("timed out after {:?}", policy.timeout)),
            };
            warn!("{} attempt {}/{} failed: {}", drafter.name(), attempt, policy.max_attempts, error);
            // only provider failures are worth another attempt
            if error.is_fatal() {
                break;
            }
            if attempt < policy.max_attempts {
                tokio::time::sleep(policy.backoff_for(attempt)).await;
            }
        }
        warn!("Falling back to rule-based drafting");
    }

    let fallback = RuleBasedDrafter::new();
    DraftOutcome {
        insights: fallback.draft_sync(ctx),
        source: fallback.name(),
        attempts,
    }
}

/// One bounded revision call; failures keep the original insight.
pub async fn revise_with_policy(
    drafter: &dyn InsightDrafter,
    ctx: &DraftContext<'_>,
    insight: &Insight,
    evaluation: &EvaluationResult,
    policy: DraftingPolicy,
) -> Option<Insight> {
    match tokio::time::timeout(policy.timeout, drafter.revise(ctx, insight, evaluation)).await {
        Ok(Ok(revised)) => revised,
        Ok(Err(e)) => {
            warn!("{} revision of '{}' failed: {}", drafter.name(), insight.title, e);
            None
        }
        Err(_) => {
            warn!("{} revision of '{}' timed out", drafter.name(), insight.title);
            None
        }
    }
}
