//! Classification Queue Consumer (§4.9): drains pending classification
//! jobs, calls the generative LLM, parses and validates its response, and
//! persists the result. The scheduler separately enqueues unclassified
//! agents and resets stuck jobs.

use chrono::Utc;
use gateway_core::{Classification, ClassificationEntry, ClassificationJob, ClassificationSource, JobStatus};
use gateway_db::{ClassificationRepository, JobRepository};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::context::AppContext;
use crate::error::{RunResult, WorkerError};

/// Batch size drained per call to [`run`] (§4.15 "Classification enqueue
/// batch (cap 50)" bounds how many jobs exist to drain per hour; this
/// bounds how many the consumer pulls off the queue in one pass).
const DRAIN_BATCH_SIZE: i64 = 50;

const SYSTEM_PROMPT: &str = "You are an OASF taxonomy classifier. Given an agent's name, description, and \
declared capabilities, return a JSON object with `skills` and `domains` arrays. Each entry is \
`{\"slug\": string, \"confidence\": number between 0 and 1, \"reasoning\": string (optional)}`. \
Respond with JSON only.";

#[derive(Debug, Default)]
pub struct ClassificationQueueSummary {
    pub completed: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub reset_stuck: u64,
    pub errors: Vec<WorkerError>,
}

/// Drain up to [`DRAIN_BATCH_SIZE`] pending jobs (§4.9).
#[instrument(skip(ctx), name = "classification_queue")]
pub async fn run(ctx: &AppContext) -> RunResult<ClassificationQueueSummary> {
    let job_repo = JobRepository::new(&ctx.pool);
    let jobs = job_repo.fetch_pending(DRAIN_BATCH_SIZE).await?;

    let mut summary = ClassificationQueueSummary::default();

    if jobs.is_empty() {
        let reset = job_repo.reset_stuck_jobs().await?;
        summary.reset_stuck = reset;
        if reset > 0 {
            info!(worker = "classification_queue", reset, "no pending work, reset stuck jobs");
        }
        return Ok(summary);
    }

    for mut job in jobs {
        match process_one(ctx, &mut job).await {
            Ok(()) => {
                job.complete();
                job_repo.save(&job).await?;
                summary.completed += 1;
            }
            Err(e) => {
                let should_retry = job.fail(e.to_string(), ctx.classification_max_attempts);
                if should_retry {
                    job.status = JobStatus::Pending;
                    summary.retried += 1;
                } else {
                    summary.dead_lettered += 1;
                    warn!(worker = "classification_queue", agent_id = %job.agent_id, attempts = job.attempts, "job moved to dead-letter queue");
                }
                job_repo.save(&job).await?;
                summary.errors.push(WorkerError::new(Some(job.agent_id.clone()), e.to_string()));
            }
        }
    }

    info!(
        worker = "classification_queue",
        completed = summary.completed,
        retried = summary.retried,
        dead_lettered = summary.dead_lettered,
        "run complete"
    );

    Ok(summary)
}

/// Process one job end to end: transition to processing, call the LLM,
/// parse and validate its response, persist the classification.
async fn process_one(ctx: &AppContext, job: &mut ClassificationJob) -> RunResult<()> {
    job.start_attempt();

    let generative = ctx
        .generative
        .as_ref()
        .ok_or_else(|| gateway_core::GatewayError::UpstreamPermanent("no generative provider configured".to_string()))?;

    let pull = gateway_upstream::pull_agents(&ctx.upstream).await?;
    let record = pull
        .agents
        .into_iter()
        .find(|p| p.record.id == job.agent_id)
        .map(|p| p.record)
        .ok_or_else(|| gateway_core::GatewayError::NotFound(job.agent_id.to_string()))?;

    let user_prompt = format!(
        "Name: {}\nDescription: {}\nMCP tools: {:?}\nA2A skills: {:?}\nDeclared skills: {:?}\nDeclared domains: {:?}",
        record.name, record.description, record.mcp_tools, record.a2a_skills, record.declared_skills, record.declared_domains
    );

    let raw = generative
        .complete(SYSTEM_PROMPT, &user_prompt)
        .await
        .map_err(|e| gateway_core::GatewayError::UpstreamTransient(e.to_string()))?;

    let parsed = parse_llm_response(&raw)?;

    let classification = Classification {
        skills: parsed.skills,
        domains: parsed.domains,
        overall_confidence: parsed.overall_confidence(),
        source: ClassificationSource::LlmClassification,
        model_version: None,
        classified_at: Utc::now(),
    };

    ClassificationRepository::new(&ctx.pool).upsert(&job.agent_id, &classification).await?;

    Ok(())
}

struct ParsedClassification {
    skills: Vec<ClassificationEntry>,
    domains: Vec<ClassificationEntry>,
}

impl ParsedClassification {
    fn overall_confidence(&self) -> f64 {
        let entries: Vec<&ClassificationEntry> = self.skills.iter().chain(self.domains.iter()).collect();
        if entries.is_empty() {
            return 0.0;
        }
        entries.iter().map(|e| e.confidence).sum::<f64>() / entries.len() as f64
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    slug: String,
    confidence: f64,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawClassification {
    #[serde(default)]
    skills: Vec<RawEntry>,
    #[serde(default)]
    domains: Vec<RawEntry>,
}

/// Parse the LLM's JSON response, tolerating a fenced code block wrapper
/// (```json ... ``` or plain ``` ... ```) around the object (§4.9).
fn parse_llm_response(raw: &str) -> RunResult<ParsedClassification> {
    let json_text = strip_code_fence(raw);
    let parsed: RawClassification = serde_json::from_str(json_text)
        .map_err(|e| crate::error::RunError::Gateway(gateway_core::GatewayError::Serialization(e.to_string())))?;

    let to_entries = |raw: Vec<RawEntry>| -> Vec<ClassificationEntry> {
        raw.into_iter()
            .filter(|e| (0.0..=1.0).contains(&e.confidence))
            .map(|e| ClassificationEntry { slug: e.slug, confidence: e.confidence, reasoning: e.reasoning })
            .collect()
    };

    Ok(ParsedClassification { skills: to_entries(parsed.skills), domains: to_entries(parsed.domains) })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\n', '\r']);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_code_fence_handles_json_tagged_fence() {
        let raw = "```json\n{\"skills\": []}\n```";
        assert_eq!(strip_code_fence(raw), "{\"skills\": []}");
    }

    #[test]
    fn strip_code_fence_handles_bare_fence() {
        let raw = "```\n{\"skills\": []}\n```";
        assert_eq!(strip_code_fence(raw), "{\"skills\": []}");
    }

    #[test]
    fn strip_code_fence_is_a_no_op_on_plain_json() {
        let raw = "{\"skills\": []}";
        assert_eq!(strip_code_fence(raw), raw);
    }

    #[test]
    fn parse_llm_response_filters_out_of_range_confidence() {
        let raw = r#"{"skills": [{"slug": "nlp", "confidence": 0.9}, {"slug": "bogus", "confidence": 1.5}], "domains": []}"#;
        let parsed = parse_llm_response(raw).expect("valid json");
        assert_eq!(parsed.skills.len(), 1);
        assert_eq!(parsed.skills[0].slug, "nlp");
    }

    #[test]
    fn parse_llm_response_rejects_malformed_json() {
        let raw = "not json at all";
        assert!(parse_llm_response(raw).is_err());
    }

    #[test]
    fn overall_confidence_averages_all_entries() {
        let parsed = ParsedClassification {
            skills: vec![ClassificationEntry { slug: "a".into(), confidence: 0.8, reasoning: None }],
            domains: vec![ClassificationEntry { slug: "b".into(), confidence: 0.4, reasoning: None }],
        };
        assert_eq!(parsed.overall_confidence(), 0.6);
    }
}
