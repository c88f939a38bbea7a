// SPDX-License-Identifier: MIT OR Apache-2.0
//! Family F: runtime-issue monitoring skills.

use crate::skill::{
    Skill, SkillExample, load_for_query, object_schema, parse_input, require_repo_mut, success,
    with_degraded,
};
use async_trait::async_trait;
use chrono::Utc;
use nexus_auth::Identity;
use nexus_core::{IssueSeverity, IssueStatus, IssueType, ProductionMetrics, RuntimeIssue};
use nexus_error::{NexusCode, NexusError, Result};
use nexus_similarity::{pattern_health, similar_issues};
use nexus_store::KnowledgeBase;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// add_runtime_issue
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct AddIssueRequest {
    repository: String,
    service_type: String,
    issue_type: IssueType,
    severity: IssueSeverity,
    log_snippet: String,
    #[serde(default)]
    root_cause: Option<String>,
    #[serde(default)]
    suggested_fix: Option<String>,
    #[serde(default)]
    pattern_reference: Option<String>,
    #[serde(default)]
    github_issue_url: Option<String>,
    #[serde(default)]
    metrics: Option<Value>,
}

/// Report a production-observed issue and surface similar prior issues.
pub struct AddRuntimeIssueSkill {
    kb: Arc<KnowledgeBase>,
}

impl AddRuntimeIssueSkill {
    /// Construct with the shared knowledge base.
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Skill for AddRuntimeIssueSkill {
    fn id(&self) -> &'static str {
        "add_runtime_issue"
    }

    fn name(&self) -> &'static str {
        "Add Runtime Issue"
    }

    fn description(&self) -> &'static str {
        "Record a production issue and return similar prior issues"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["monitoring", "issues", "write"]
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "repository": { "type": "string" },
                "service_type": { "type": "string" },
                "issue_type": {
                    "type": "string",
                    "enum": ["error", "performance", "crash", "security"],
                },
                "severity": {
                    "type": "string",
                    "enum": ["low", "medium", "high", "critical"],
                },
                "log_snippet": { "type": "string", "minLength": 1 },
                "root_cause": { "type": "string" },
                "suggested_fix": { "type": "string" },
                "pattern_reference": { "type": "string" },
                "github_issue_url": { "type": "string" },
                "metrics": { "type": "object" },
            }),
            &["repository", "service_type", "issue_type", "severity", "log_snippet"],
        )
    }

    fn requires_authentication(&self) -> bool {
        true
    }

    fn examples(&self) -> Vec<SkillExample> {
        vec![SkillExample {
            input: json!({
                "repository": "acme/widget",
                "service_type": "api",
                "issue_type": "performance",
                "severity": "high",
                "log_snippet": "p99 latency 4200ms on /checkout",
                "pattern_reference": "Redis caching",
            }),
            description: "Report a latency regression attributed to a pattern".into(),
        }]
    }

    async fn execute(&self, input: Value, _identity: &Identity) -> Result<Value> {
        let request: AddIssueRequest = parse_input(input)?;

        let message = format!("runtime issue: {}", request.repository);
        let (issue_id, similar) = self
            .kb
            .mutate(&message, move |doc| {
                // Rank against prior issues before the new one is added so
                // it cannot match itself.
                let similar = similar_issues(
                    doc,
                    request.issue_type,
                    request.severity,
                    &request.log_snippet,
                );

                let record = require_repo_mut(doc, &request.repository)?;
                let issue_id = format!("issue-{}", Uuid::new_v4());
                record.runtime_issues.push(RuntimeIssue {
                    id: issue_id.clone(),
                    detected_at: Utc::now(),
                    issue_type: request.issue_type,
                    severity: request.severity,
                    service_type: request.service_type,
                    logs: request.log_snippet,
                    root_cause: request.root_cause,
                    fix: request.suggested_fix,
                    pattern_reference: request.pattern_reference,
                    github_issue_url: request.github_issue_url,
                    status: IssueStatus::Open,
                    metrics: request.metrics,
                    resolution_time: None,
                });
                Ok((issue_id, similar))
            })
            .await?;

        Ok(success(json!({
            "issue_id": issue_id,
            "similar_issues": similar,
        })))
    }
}

// ---------------------------------------------------------------------------
// query_known_issues
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct QueryIssuesRequest {
    #[serde(default)]
    issue_type: Option<IssueType>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    severity: Option<IssueSeverity>,
    #[serde(default)]
    repository: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    10
}

/// Query recorded issues across the knowledge base.
pub struct QueryKnownIssuesSkill {
    kb: Arc<KnowledgeBase>,
}

impl QueryKnownIssuesSkill {
    /// Construct with the shared knowledge base.
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Skill for QueryKnownIssuesSkill {
    fn id(&self) -> &'static str {
        "query_known_issues"
    }

    fn name(&self) -> &'static str {
        "Query Known Issues"
    }

    fn description(&self) -> &'static str {
        "Recorded production issues, newest first, filterable by type, severity, pattern, and repository"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["monitoring", "issues", "query"]
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "issue_type": {
                    "type": "string",
                    "enum": ["error", "performance", "crash", "security"],
                },
                "pattern": { "type": "string" },
                "severity": {
                    "type": "string",
                    "enum": ["low", "medium", "high", "critical"],
                },
                "repository": { "type": "string" },
                "limit": { "type": "integer", "minimum": 1, "maximum": 100 },
            }),
            &[],
        )
    }

    async fn execute(&self, input: Value, _identity: &Identity) -> Result<Value> {
        let request: QueryIssuesRequest = parse_input(input)?;
        let (doc, degraded) = load_for_query(&self.kb).await?;

        let mut issues: Vec<(String, &RuntimeIssue)> = doc
            .repositories
            .iter()
            .filter(|(id, _)| {
                request
                    .repository
                    .as_deref()
                    .is_none_or(|only| only == id.as_str())
            })
            .flat_map(|(id, record)| {
                record.runtime_issues.iter().map(move |issue| (id.clone(), issue))
            })
            .filter(|(_, issue)| {
                request.issue_type.is_none_or(|t| issue.issue_type == t)
                    && request.severity.is_none_or(|s| issue.severity == s)
                    && request
                        .pattern
                        .as_deref()
                        .is_none_or(|p| issue.pattern_reference.as_deref() == Some(p))
            })
            .collect();

        // Newest first; repository then id break exact timestamp ties.
        issues.sort_by(|(ra, a), (rb, b)| {
            b.detected_at
                .cmp(&a.detected_at)
                .then_with(|| ra.cmp(rb))
                .then_with(|| a.id.cmp(&b.id))
        });
        issues.truncate(request.limit);

        let issues: Vec<Value> = issues
            .into_iter()
            .map(|(repository, issue)| {
                let mut value = serde_json::to_value(issue).unwrap_or_default();
                value["repository"] = json!(repository);
                value
            })
            .collect();

        Ok(with_degraded(
            success(json!({ "count": issues.len(), "issues": issues })),
            degraded,
        ))
    }
}

// ---------------------------------------------------------------------------
// get_pattern_health
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct PatternHealthRequest {
    pattern_name: String,
    #[serde(default = "default_time_range")]
    time_range_days: i64,
}

fn default_time_range() -> i64 {
    30
}

/// Reliability rollup for one pattern over a time window.
pub struct PatternHealthSkill {
    kb: Arc<KnowledgeBase>,
}

impl PatternHealthSkill {
    /// Construct with the shared knowledge base.
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Skill for PatternHealthSkill {
    fn id(&self) -> &'static str {
        "get_pattern_health"
    }

    fn name(&self) -> &'static str {
        "Pattern Health"
    }

    fn description(&self) -> &'static str {
        "Share of pattern-using repositories without recent issues against it"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["monitoring", "patterns", "health"]
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "pattern_name": { "type": "string", "minLength": 1 },
                "time_range_days": { "type": "integer", "minimum": 1, "maximum": 365 },
            }),
            &["pattern_name"],
        )
    }

    async fn execute(&self, input: Value, _identity: &Identity) -> Result<Value> {
        let request: PatternHealthRequest = parse_input(input)?;
        let (doc, degraded) = load_for_query(&self.kb).await?;
        let health = pattern_health(&doc, &request.pattern_name, request.time_range_days, Utc::now());
        Ok(with_degraded(
            success(serde_json::to_value(health).unwrap_or_default()),
            degraded,
        ))
    }
}

// ---------------------------------------------------------------------------
// update_issue_status
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct UpdateIssueStatusRequest {
    repository: String,
    issue_id: String,
    status: IssueStatus,
    #[serde(default)]
    root_cause: Option<String>,
    #[serde(default)]
    fix: Option<String>,
    #[serde(default)]
    resolution_time: Option<String>,
}

/// Move a recorded issue through its lifecycle.
pub struct UpdateIssueStatusSkill {
    kb: Arc<KnowledgeBase>,
}

impl UpdateIssueStatusSkill {
    /// Construct with the shared knowledge base.
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Skill for UpdateIssueStatusSkill {
    fn id(&self) -> &'static str {
        "update_issue_status"
    }

    fn name(&self) -> &'static str {
        "Update Issue Status"
    }

    fn description(&self) -> &'static str {
        "Update a recorded issue's status, root cause, and fix"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["monitoring", "issues", "write"]
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "repository": { "type": "string" },
                "issue_id": { "type": "string" },
                "status": {
                    "type": "string",
                    "enum": ["open", "investigating", "fixed", "false_positive"],
                },
                "root_cause": { "type": "string" },
                "fix": { "type": "string" },
                "resolution_time": { "type": "string" },
            }),
            &["repository", "issue_id", "status"],
        )
    }

    fn requires_authentication(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, _identity: &Identity) -> Result<Value> {
        let request: UpdateIssueStatusRequest = parse_input(input)?;

        let message = format!("issue status: {}", request.repository);
        let updated = self
            .kb
            .mutate(&message, move |doc| {
                let record = require_repo_mut(doc, &request.repository)?;
                let issue = record
                    .runtime_issues
                    .iter_mut()
                    .find(|issue| issue.id == request.issue_id)
                    .ok_or_else(|| {
                        NexusError::new(NexusCode::IssueNotFound, "issue not found")
                            .with_context("issue_id", &request.issue_id)
                    })?;

                issue.status = request.status;
                if let Some(root_cause) = request.root_cause {
                    issue.root_cause = Some(root_cause);
                }
                if let Some(fix) = request.fix {
                    issue.fix = Some(fix);
                }
                if let Some(resolution_time) = request.resolution_time {
                    issue.resolution_time = Some(resolution_time);
                }
                Ok(issue.clone())
            })
            .await?;

        Ok(success(json!({ "issue": updated })))
    }
}

// ---------------------------------------------------------------------------
// update_production_metrics
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct UpdateMetricsRequest {
    repository: String,
    #[serde(default)]
    error_rate: Option<f64>,
    #[serde(default)]
    latency_p50: Option<f64>,
    #[serde(default)]
    latency_p95: Option<f64>,
    #[serde(default)]
    latency_p99: Option<f64>,
    #[serde(default)]
    throughput_rps: Option<f64>,
}

/// Replace a repository's production telemetry rollup, field by field.
pub struct UpdateProductionMetricsSkill {
    kb: Arc<KnowledgeBase>,
}

impl UpdateProductionMetricsSkill {
    /// Construct with the shared knowledge base.
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Skill for UpdateProductionMetricsSkill {
    fn id(&self) -> &'static str {
        "update_production_metrics"
    }

    fn name(&self) -> &'static str {
        "Update Production Metrics"
    }

    fn description(&self) -> &'static str {
        "Record error-rate, latency, and throughput telemetry for a repository"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["monitoring", "metrics", "write"]
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "repository": { "type": "string" },
                "error_rate": { "type": "number", "minimum": 0 },
                "latency_p50": { "type": "number", "minimum": 0 },
                "latency_p95": { "type": "number", "minimum": 0 },
                "latency_p99": { "type": "number", "minimum": 0 },
                "throughput_rps": { "type": "number", "minimum": 0 },
            }),
            &["repository"],
        )
    }

    fn requires_authentication(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, _identity: &Identity) -> Result<Value> {
        let request: UpdateMetricsRequest = parse_input(input)?;

        let message = format!("metrics: {}", request.repository);
        self.kb
            .mutate(&message, move |doc| {
                let record = require_repo_mut(doc, &request.repository)?;
                let metrics = record
                    .production_metrics
                    .get_or_insert_with(ProductionMetrics::default);

                if request.error_rate.is_some() {
                    metrics.error_rate = request.error_rate;
                }
                if request.latency_p50.is_some() {
                    metrics.latency_p50 = request.latency_p50;
                }
                if request.latency_p95.is_some() {
                    metrics.latency_p95 = request.latency_p95;
                }
                if request.latency_p99.is_some() {
                    metrics.latency_p99 = request.latency_p99;
                }
                if request.throughput_rps.is_some() {
                    metrics.throughput_rps = request.throughput_rps;
                }
                metrics.last_updated = Some(Utc::now());
                Ok(())
            })
            .await?;

        Ok(success(json!({})))
    }
}
