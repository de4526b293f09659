//! End-to-end analysis run
//!
//! plan -> compare windows -> rank -> draft -> score (+ bounded revision)
//! -> select creatives -> report. Every stage consumes the previous stage's
//! values and produces new ones.

use crate::config::AnalysisConfig;
use crate::creative::{CreativeCandidate, CreativeSelector};
use crate::dataset::Dataset;
use crate::drafter::{draft_with_fallback, revise_with_policy, DraftContext, DraftingPolicy, InsightDrafter, RuleBasedDrafter};
use crate::error::{InsightError, Result};
use crate::llm::LlmDrafter;
use crate::planner::{AnalysisPlan, Planner};
use crate::ranking::{RankedSegments, SegmentRanker};
use crate::report::Report;
use crate::scorer::{sort_by_final, EvaluatedInsight, EvaluationSummary, InsightScorer};
use crate::window::{ComparisonResult, ComparisonWindows, WindowComparator};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

pub struct Pipeline {
    config: AnalysisConfig,
    drafter: Option<Box<dyn InsightDrafter>>,
}

impl Pipeline {
    /// Rule-based drafting only.
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config, drafter: None }
    }

    /// Uses the LLM drafter when the configuration enables one.
    pub fn from_config(config: AnalysisConfig) -> Self {
        let drafter = LlmDrafter::from_config(&config.llm).map(|d| Box::new(d) as Box<dyn InsightDrafter>);
        Self { config, drafter }
    }

    pub fn with_drafter(mut self, drafter: Box<dyn InsightDrafter>) -> Self {
        self.drafter = Some(drafter);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub async fn run(&self, dataset: &Dataset, task: &str, window_override: Option<u32>) -> Result<Report> {
        let run_id = Uuid::new_v4();
        info!("Starting run {} on {:?}: {}", run_id, dataset.source, task);

        // Step 1: Plan
        let plan = Planner::new(&self.config).plan(task, window_override)?;

        // Step 2: Windows ending on the latest date in the data
        let latest = dataset
            .date_range()
            .ok_or_else(|| InsightError::EmptyDataset("dataset has no dated records".to_string()))?
            .end;
        let windows = ComparisonWindows::ending_at(latest, plan.window_days)?;

        // Step 3: Compare windows
        let comparison = WindowComparator::new(&dataset.records).compare(windows, &plan.segment_dims)?;

        // Step 4: Rank segments per planned dimension
        let rankings = self.rank(&plan, &comparison);

        // Step 5: Draft insights
        let ctx = DraftContext {
            plan: &plan,
            comparison: &comparison,
            rankings: &rankings,
        };
        let policy = DraftingPolicy::from_config(&self.config.llm);
        let outcome = draft_with_fallback(self.drafter.as_deref(), &ctx, policy).await;

        // Step 6: Score against evidence
        let scorer = InsightScorer::new(self.config.scoring.clone(), self.config.confidence_min);
        let (mut insights, _) = scorer.evaluate_all(outcome.insights, &plan, |i| i.resolve_evidence(&comparison));

        // Step 7: Bounded revision of rejected insights
        let fallback = RuleBasedDrafter::new();
        let reviser: &dyn InsightDrafter = match self.drafter.as_deref() {
            Some(d) if d.name() == outcome.source => d,
            _ => &fallback,
        };
        self.revise(&scorer, reviser, &ctx, policy, &mut insights).await;
        let summary = EvaluationSummary::from_results(&insights);
        info!(
            "Insights: {} total, {} validated, {} need revision",
            summary.total, summary.validated, summary.needs_revision
        );

        // Step 8: Creative recommendations from the current window
        let candidates = CreativeCandidate::collect(&dataset.records, windows.current, self.config.creative.dimension);
        let creatives = CreativeSelector::new(&self.config.creative).select(&candidates);

        // Step 9: Report
        let ComparisonResult { global, segments, .. } = comparison;
        Ok(Report {
            run_id,
            generated_at: Utc::now(),
            source: dataset.source.display().to_string(),
            plan,
            windows,
            global,
            rankings,
            draft_source: outcome.source.to_string(),
            draft_attempts: outcome.attempts,
            insights,
            summary,
            creatives,
            data_notes: dataset.notes.clone(),
            segments,
        })
    }

    fn rank(&self, plan: &AnalysisPlan, comparison: &ComparisonResult) -> Vec<RankedSegments> {
        let ranker = SegmentRanker::from_config(&self.config.ranking);
        let empty = BTreeMap::new();
        plan.segment_dims
            .iter()
            .map(|&dim| ranker.rank(dim, comparison.dimension(dim).unwrap_or(&empty)))
            .collect()
    }

    async fn revise(
        &self,
        scorer: &InsightScorer,
        reviser: &dyn InsightDrafter,
        ctx: &DraftContext<'_>,
        policy: DraftingPolicy,
        insights: &mut Vec<EvaluatedInsight>,
    ) {
        for round in 1..=self.config.llm.max_revisions {
            let mut improved = 0;
            for item in insights.iter_mut().filter(|i| !i.evaluation.is_validated()) {
                let Some(revised) = revise_with_policy(reviser, ctx, &item.insight, &item.evaluation, policy).await
                else {
                    continue;
                };
                let evaluation = scorer.score(&revised, revised.resolve_evidence(ctx.comparison), ctx.plan);
                debug!(
                    "Revision round {} for '{}': {:.2} -> {:.2}",
                    round, item.insight.title, item.evaluation.final_score, evaluation.final_score
                );
                // keep whichever version scores better
                if evaluation.final_score > item.evaluation.final_score
                    || (evaluation.is_validated() && !item.evaluation.is_validated())
                {
                    item.insight = revised;
                    item.evaluation = evaluation;
                    item.revisions += 1;
                    improved += 1;
                }
            }
            if improved == 0 {
                break;
            }
        }
        sort_by_final(insights);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dimension, Record};
    use crate::insight::{ImpactLevel, Insight};
    use crate::scorer::EvaluationResult;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn record(day: u32, campaign: &str, platform: &str, clicks: f64, purchases: f64, revenue: f64) -> Record {
        Record {
            campaign_name: campaign.to_string(),
            adset_name: format!("{} Adset", campaign),
            date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            spend: 100.0,
            impressions: 10_000.0,
            clicks,
            purchases,
            revenue,
            creative_type: "Video".to_string(),
            creative_message: "Limited Offer".to_string(),
            audience_type: "Broad".to_string(),
            platform: platform.to_string(),
            country: "US".to_string(),
        }
    }

    fn dataset() -> Dataset {
        let mut records = Vec::new();
        for day in 1..=14 {
            let current = day > 7;
            records.push(record(
                day,
                "Summer Sale",
                "Meta",
                if current { 100.0 } else { 200.0 },
                if current { 3.0 } else { 5.0 },
                if current { 240.0 } else { 500.0 },
            ));
            records.push(record(
                day,
                "Winter Promo",
                "Google",
                150.0,
                if current { 6.0 } else { 4.0 },
                if current { 600.0 } else { 400.0 },
            ));
        }
        Dataset {
            records,
            source: PathBuf::from("fixture.csv"),
            notes: vec![],
        }
    }

    /// Drafts one insight with a wrong number, then fixes it on revision.
    struct SloppyDrafter;

    #[async_trait]
    impl InsightDrafter for SloppyDrafter {
        fn name(&self) -> &'static str {
            "sloppy"
        }

        async fn draft(&self, _ctx: &DraftContext<'_>) -> Result<Vec<Insight>> {
            Ok(vec![Insight {
                title: "campaign_name: 'Summer Sale' lost $1820 revenue (ROAS 2.40 vs 5.00)".to_string(),
                claimed_numbers: BTreeMap::from([("roas_cur".to_string(), 3.1), ("revenue_delta".to_string(), -1820.0)]),
                segment_filters: BTreeMap::from([(Dimension::CampaignName, "Summer Sale".to_string())]),
                evidence_refs: vec!["segments:campaign_name:top_losers".to_string()],
                confidence: 0.8,
                impact: ImpactLevel::Low,
                reasoning: None,
            }])
        }

        async fn revise(
            &self,
            _ctx: &DraftContext<'_>,
            insight: &Insight,
            _evaluation: &EvaluationResult,
        ) -> Result<Option<Insight>> {
            let mut fixed = insight.clone();
            fixed.claimed_numbers.insert("roas_cur".to_string(), 2.4);
            fixed.title = format!("{}; reduce its budget by 20%", insight.title);
            Ok(Some(fixed))
        }
    }

    #[tokio::test]
    async fn test_rule_based_run() {
        let report = Pipeline::new(AnalysisConfig::default())
            .run(&dataset(), "Why did ROAS drop last week?", None)
            .await
            .unwrap();
        assert_eq!(report.plan.window_days, 7);
        assert_eq!(report.windows.current.start, NaiveDate::from_ymd_opt(2025, 3, 8).unwrap());
        assert_eq!(report.draft_source, "rule_based");
        assert_eq!(report.draft_attempts, 0);
        assert!(report.summary.total >= 3);
        assert_eq!(report.summary.validated, report.summary.total);

        let campaigns = &report.rankings[0];
        assert_eq!(campaigns.dimension, Dimension::CampaignName);
        assert_eq!(campaigns.losers[0].key.value, "Summer Sale");
        assert_eq!(campaigns.losers[0].impact, -1820.0);
        assert_eq!(campaigns.gainers[0].key.value, "Winter Promo");
    }

    #[tokio::test]
    async fn test_revision_keeps_better_version() {
        let report = Pipeline::new(AnalysisConfig::default())
            .with_drafter(Box::new(SloppyDrafter))
            .run(&dataset(), "Why did ROAS drop last week?", None)
            .await
            .unwrap();
        assert_eq!(report.draft_source, "sloppy");
        assert_eq!(report.insights.len(), 1);
        let item = &report.insights[0];
        assert_eq!(item.revisions, 1);
        assert_eq!(item.insight.claimed_numbers["roas_cur"], 2.4);
        assert_eq!(item.evaluation.scores.correctness, 1.0);
    }

    #[tokio::test]
    async fn test_window_override_must_be_allowed() {
        let err = Pipeline::new(AnalysisConfig::default())
            .run(&dataset(), "ROAS review", Some(10))
            .await
            .unwrap_err();
        assert!(matches!(err, InsightError::InvalidWindow(_)));
    }

    #[tokio::test]
    async fn test_short_history_is_fatal() {
        let err = Pipeline::new(AnalysisConfig::default())
            .run(&dataset(), "ROAS over the last 14 days", None)
            .await
            .unwrap_err();
        assert!(matches!(err, InsightError::EmptyDataset(ref msg) if msg.starts_with("baseline window")));
    }
}
