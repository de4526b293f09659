use crate::config::LlmConfig;
use crate::drafter::{DraftContext, InsightDrafter};
use crate::error::{InsightError, Result};
use crate::insight::{Insight, Measure};
use crate::metrics::Metric;
use crate::ranking::RankedSegment;
use crate::scorer::EvaluationResult;
use crate::window::WindowPair;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub struct LlmClient {
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self::from_config(api_key, &LlmConfig::default())
    }

    pub fn from_config(api_key: String, config: &LlmConfig) -> Self {
        Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            http: reqwest::Client::new(),
        }
    }

    pub async fn call_llm(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": "You are a precise JSON-only responder. Always return valid JSON, no other text."},
                {"role": "user", "content": prompt}
            ],
            "temperature": self.temperature,
            "max_tokens": 2000
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| InsightError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(InsightError::Llm(format!("LLM API returned {}: {}", status, text)));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| InsightError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| InsightError::Llm("No content in LLM response".to_string()))?;

        Ok(content.to_string())
    }
}

/// Extract JSON from an LLM response (handles markdown code blocks).
pub fn extract_json_from_response(response: &str) -> &str {
    if let Some(start) = response.find("```json") {
        let after_start = &response[start + 7..];
        if let Some(end) = after_start.find("```") {
            return after_start[..end].trim();
        }
    }
    if let Some(start) = response.find("```") {
        let after_start = &response[start + 3..];
        if let Some(end) = after_start.find("```") {
            return after_start[..end].trim();
        }
    }

    let json_start = match (response.find('{'), response.find('[')) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    let json_end = match (response.rfind('}'), response.rfind(']')) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
    match (json_start, json_end) {
        (Some(start), Some(end)) if start < end => &response[start..=end],
        _ => response.trim(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InsightPayload {
    Batch { insights: Vec<Insight> },
    Single { insight: Insight },
    List(Vec<Insight>),
}

/// Parse `{"insights": [...]}`, `{"insight": {...}}` or a bare array.
pub fn parse_insights(response: &str) -> Result<Vec<Insight>> {
    let payload: InsightPayload = serde_json::from_str(extract_json_from_response(response))
        .map_err(|e| InsightError::Llm(format!("Failed to parse insights: {}", e)))?;
    Ok(match payload {
        InsightPayload::Batch { insights } | InsightPayload::List(insights) => insights,
        InsightPayload::Single { insight } => vec![insight],
    })
}

const CLAIM_MEASURES: [Measure; 7] = [
    Measure::Current(Metric::Roas),
    Measure::Baseline(Metric::Roas),
    Measure::Delta(Metric::Revenue),
    Measure::PctChange(Metric::Revenue),
    Measure::Current(Metric::Cpa),
    Measure::Current(Metric::Ctr),
    Measure::SpendShare,
];

fn claimable(pair: &WindowPair) -> Value {
    let map: serde_json::Map<String, Value> = CLAIM_MEASURES
        .iter()
        .filter_map(|m| m.claim(pair))
        .map(|(k, v)| (k, json!((v * 10_000.0).round() / 10_000.0)))
        .collect();
    Value::Object(map)
}

fn segment_entries(list: &[RankedSegment]) -> Vec<Value> {
    list.iter()
        .map(|s| {
            json!({
                "segment_filters": { s.key.dimension.as_str(): s.key.value },
                "impact": s.impact,
                "flag": s.pair.flag,
                "measures": claimable(&s.pair),
            })
        })
        .collect()
}

/// Compact evidence digest sent to the model.
fn evidence_digest(ctx: &DraftContext<'_>) -> Value {
    let segments: Vec<Value> = ctx
        .rankings
        .iter()
        .map(|r| {
            json!({
                "dimension": r.dimension,
                "top_gainers": segment_entries(&r.gainers),
                "top_losers": segment_entries(&r.losers),
                "dropped": segment_entries(&r.dropped),
            })
        })
        .collect();
    json!({
        "windows": ctx.comparison.windows,
        "overview": claimable(&ctx.comparison.global),
        "segments": segments,
    })
}

const INSIGHT_FORMAT: &str = r#"{
  "insights": [
    {
      "title": "campaign_name: 'Summer Sale' lost $630 revenue (ROAS 11.87 vs 12.50)",
      "claimed_numbers": {"revenue_delta": -630.0, "roas_cur": 11.87, "roas_base": 12.5},
      "segment_filters": {"campaign_name": "Summer Sale"},
      "evidence_refs": ["segments:campaign_name:top_losers"],
      "confidence": 0.7,
      "impact": "medium",
      "reasoning": {
        "think": "What changed and where",
        "analyze": "Which numbers explain it",
        "conclude": "Reduce the campaign budget by 20% and move it to the top gainer"
      }
    }
  ]
}"#;

fn draft_prompt(ctx: &DraftContext<'_>) -> Result<String> {
    let plan = serde_json::to_string_pretty(ctx.plan)?;
    let evidence = serde_json::to_string_pretty(&evidence_digest(ctx))?;
    Ok(format!(
        r#"You are a performance marketing analyst. Write 3 to 6 insights that answer the task below.

Analysis plan:
{}

Evidence (current vs baseline window):
{}

Rules:
1. Every number in claimed_numbers must be copied from a "measures" object in the evidence, using the same key.
2. segment_filters must name exactly one segment from the evidence, or be empty for an account-level insight with evidence_refs ["overview"].
3. Put the segment name and its numbers in the title.
4. The conclusion must name a concrete action with a magnitude (a percentage or a dollar amount).

Return JSON in this exact format:
{}

Only return the JSON, no other text."#,
        plan, evidence, INSIGHT_FORMAT
    ))
}

fn revise_prompt(ctx: &DraftContext<'_>, insight: &Insight, evaluation: &EvaluationResult) -> Result<String> {
    let evidence = match insight.resolve_evidence(ctx.comparison) {
        Ok(pair) => claimable(pair),
        Err(note) => json!({ "error": note }),
    };
    Ok(format!(
        r#"An evaluator rejected this insight. Fix it.

Insight:
{}

Evaluator feedback:
{}

Evidence measures for its segment:
{}

Keep the same segment unless the feedback says it does not exist. Copy numbers exactly from the evidence measures.
Return JSON: {{"insight": {{...same fields as the input...}}}}

Only return the JSON, no other text."#,
        serde_json::to_string_pretty(insight)?,
        serde_json::to_string_pretty(&evaluation.feedback)?,
        serde_json::to_string_pretty(&evidence)?
    ))
}

/// Chat-completions backed drafter.
pub struct LlmDrafter {
    client: LlmClient,
}

impl LlmDrafter {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    /// `None` unless the configuration enables an LLM provider with a key.
    pub fn from_config(config: &LlmConfig) -> Option<Self> {
        if !config.enabled() {
            return None;
        }
        let key = config.api_key.clone()?;
        Some(Self::new(LlmClient::from_config(key, config)))
    }
}

#[async_trait]
impl InsightDrafter for LlmDrafter {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn draft(&self, ctx: &DraftContext<'_>) -> Result<Vec<Insight>> {
        let prompt = draft_prompt(ctx)?;
        let response = self.client.call_llm(&prompt).await?;
        debug!("LLM draft response: {} chars", response.len());
        parse_insights(&response)
    }

    async fn revise(
        &self,
        ctx: &DraftContext<'_>,
        insight: &Insight,
        evaluation: &EvaluationResult,
    ) -> Result<Option<Insight>> {
        let prompt = revise_prompt(ctx, insight, evaluation)?;
        let response = self.client.call_llm(&prompt).await?;
        Ok(parse_insights(&response)?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dimension;

    #[test]
    fn test_extract_json_from_markdown() {
        let response = "Here you go:\n```json\n{\"insights\": []}\n```\nThanks";
        assert_eq!(extract_json_from_response(response), "{\"insights\": []}");
        assert_eq!(extract_json_from_response("noise [1, 2] tail"), "[1, 2]");
        assert_eq!(extract_json_from_response("  plain  "), "plain");
    }

    #[test]
    fn test_parse_insight_shapes() {
        let batch = r#"{"insights": [{"title": "a", "claimed_numbers": {"roas_cur": 2.0}}]}"#;
        let parsed = parse_insights(batch).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].claimed_numbers["roas_cur"], 2.0);

        let single = r#"```json
{"insight": {"title": "b", "segment_filters": {"platform": "Meta"}}}
```"#;
        let parsed = parse_insights(single).unwrap();
        assert_eq!(parsed[0].segment_filters[&Dimension::Platform], "Meta");

        let list = r#"[{"title": "c"}, {"title": "d"}]"#;
        assert_eq!(parse_insights(list).unwrap().len(), 2);

        assert!(matches!(parse_insights("no json here"), Err(InsightError::Llm(_))));
    }

    #[test]
    fn test_disabled_without_key() {
        let config = LlmConfig::default();
        assert!(LlmDrafter::from_config(&config).is_none());

        let mut keyed = LlmConfig::default();
        keyed.api_key = Some("sk-test".to_string());
        assert!(LlmDrafter::from_config(&keyed).is_some());

        keyed.provider = "none".to_string();
        assert!(LlmDrafter::from_config(&keyed).is_none());
    }
}
