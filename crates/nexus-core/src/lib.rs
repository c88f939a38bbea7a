// SPDX-License-Identifier: MIT OR Apache-2.0
//! nexus-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The knowledge-base document model for Dev-Nexus.
//!
//! The knowledge base is a single logical JSON document: a map from
//! repository id ("owner/name") to a [`RepoRecord`] carrying extracted
//! patterns, deployment knowledge, dependency edges, testing and security
//! metadata, runtime issues, and an append-only history of analysis
//! snapshots.  Everything here is plain data; persistence lives in
//! `nexus-store` and derived queries in `nexus-similarity`.

/// Schema migration from v1 documents to the current shape.
pub mod migrate;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version written by every save.
pub const SCHEMA_VERSION: &str = "2.0";

/// Legacy schema version still accepted on load and migrated in-memory.
pub const SCHEMA_VERSION_V1: &str = "1.0";

/// The whole knowledge base as one versioned document.
///
/// `repositories` is a `BTreeMap`, so iteration order (and therefore every
/// derived ranking with an id tie-break) is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    /// Document schema version ("1.0" or "2.0"; always "2.0" after load).
    pub schema_version: String,

    /// Tracked repositories keyed by "owner/name". Case-sensitive.
    #[serde(default)]
    pub repositories: BTreeMap<String, RepoRecord>,

    /// Timestamp of the last successful mutation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl KnowledgeDocument {
    /// The empty v2 document, returned when the remote file does not exist yet.
    pub fn empty() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            repositories: BTreeMap::new(),
            last_updated: None,
        }
    }
}

impl Default for KnowledgeDocument {
    fn default() -> Self {
        Self::empty()
    }
}

/// Everything the knowledge base tracks about one repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoRecord {
    /// Most recent extraction result for this repository.
    #[serde(default)]
    pub latest_patterns: PatternSnapshot,

    /// v1 documents stored the snapshot under `patterns`; kept only so the
    /// migration can move it, never written back out.
    #[serde(rename = "patterns", default, skip_serializing_if = "Option::is_none")]
    pub legacy_patterns: Option<PatternSnapshot>,

    /// Deployment scripts, platform, and lessons learned.
    #[serde(default)]
    pub deployment: DeploymentInfo,

    /// Cross-repository dependency edges.
    #[serde(default)]
    pub dependencies: DependencyInfo,

    /// Test frameworks and coverage.
    #[serde(default)]
    pub testing: TestingInfo,

    /// Security patterns and compliance standards.
    #[serde(default)]
    pub security: SecurityInfo,

    /// Production-observed issues, in report order.
    #[serde(default)]
    pub runtime_issues: Vec<RuntimeIssue>,

    /// Optional production telemetry rollup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_metrics: Option<ProductionMetrics>,

    /// Append-only analysis snapshots. Existing entries are never mutated.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// One extraction result: patterns, decisions, components, and keywords.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternSnapshot {
    /// Named architectural or implementation motifs.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Design decisions recorded alongside the patterns.
    #[serde(default)]
    pub decisions: Vec<String>,

    /// Components worth reusing elsewhere.
    #[serde(default)]
    pub reusable_components: Vec<Component>,

    /// External dependencies observed in the change set.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Free-form problem-domain label.
    #[serde(default)]
    pub problem_domain: String,

    /// Search keywords for similarity scoring.
    #[serde(default)]
    pub keywords: Vec<String>,

    /// When the extraction ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<DateTime<Utc>>,

    /// Commit the extraction was computed against.
    #[serde(default)]
    pub commit_sha: String,
}

/// Deployment knowledge for a repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentInfo {
    /// Deployment script paths or names.
    #[serde(default)]
    pub scripts: Vec<String>,

    /// Operational lessons recorded against this repository.
    #[serde(default)]
    pub lessons_learned: Vec<Lesson>,

    /// Deployment-related reusable components.
    #[serde(default)]
    pub reusable_components: Vec<Component>,

    /// CI/CD platform identifier (e.g. "github-actions").
    #[serde(default)]
    pub ci_cd_platform: String,

    /// Free-form infrastructure description.
    #[serde(default)]
    pub infrastructure: BTreeMap<String, serde_json::Value>,
}

/// Cross-repository dependency edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyInfo {
    /// Repositories that consume this one.
    #[serde(default)]
    pub consumers: Vec<Edge>,

    /// Repositories derived from this one.
    #[serde(default)]
    pub derivatives: Vec<Edge>,

    /// External (non-tracked) dependencies.
    #[serde(default)]
    pub external_dependencies: Vec<String>,
}

/// Testing metadata for a repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestingInfo {
    /// Test frameworks in use.
    #[serde(default)]
    pub test_frameworks: Vec<String>,

    /// Coverage percentage in `[0, 100]`.
    #[serde(default)]
    pub coverage_percentage: f64,

    /// Recurring test patterns.
    #[serde(default)]
    pub test_patterns: Vec<String>,
}

/// Security metadata for a repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityInfo {
    /// Security patterns in use.
    #[serde(default)]
    pub security_patterns: Vec<String>,

    /// Authentication methods in use.
    #[serde(default)]
    pub authentication_methods: Vec<String>,

    /// Compliance standards the repository claims.
    #[serde(default)]
    pub compliance_standards: Vec<String>,
}

/// Production telemetry rollup. Fields are independent so partial updates
/// only replace what the caller provided.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionMetrics {
    /// Error rate, as a fraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,

    /// Median latency in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_p50: Option<f64>,

    /// 95th-percentile latency in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_p95: Option<f64>,

    /// 99th-percentile latency in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_p99: Option<f64>,

    /// Sustained requests per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput_rps: Option<f64>,

    /// When any field was last replaced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// One append-only analysis snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the snapshot was recorded.
    pub timestamp: DateTime<Utc>,

    /// Commit the snapshot was computed against.
    #[serde(default)]
    pub commit_sha: String,

    /// Pattern names at that point in time.
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// An operational lesson recorded against a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    /// What the lesson is about.
    pub category: LessonCategory,

    /// The lesson itself.
    pub lesson: String,

    /// The situation it was learned in.
    pub context: String,

    /// How urgently others should care.
    #[serde(default)]
    pub severity: LessonSeverity,

    /// Who recorded it (subject string), if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_by: Option<String>,

    /// When it was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Lesson subject area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonCategory {
    /// Throughput, latency, resource use.
    Performance,
    /// Vulnerabilities, hardening, secrets.
    Security,
    /// Outages, retries, failover.
    Reliability,
    /// Spend and budget.
    Cost,
    /// Logging, metrics, tracing.
    Observability,
    /// Release and rollout mechanics.
    Deployment,
}

/// Lesson urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonSeverity {
    /// Worth knowing.
    #[default]
    Info,
    /// Act before it bites.
    Warning,
    /// Already bit someone.
    Critical,
}

/// A reusable component extracted from a repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Component name.
    pub name: String,

    /// What it does.
    #[serde(default)]
    pub description: String,

    /// Files that make it up.
    #[serde(default)]
    pub files: Vec<String>,
}

/// A directed relationship to another tracked repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// The other repository's id ("owner/name").
    pub repository: String,

    /// Nature of the relationship (free-form, e.g. "imports-client").
    #[serde(default)]
    pub relationship: String,
}

/// A production-observed failure or anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeIssue {
    /// Unique issue id.
    pub id: String,

    /// When the issue was detected.
    pub detected_at: DateTime<Utc>,

    /// Kind of failure.
    pub issue_type: IssueType,

    /// How bad it is.
    pub severity: IssueSeverity,

    /// Service or runtime the issue was observed in.
    #[serde(default)]
    pub service_type: String,

    /// Log excerpt that evidences the issue.
    #[serde(default)]
    pub logs: String,

    /// Root cause, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<String>,

    /// Applied or suggested fix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,

    /// Pattern the issue is attributed to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_reference: Option<String>,

    /// Tracking issue URL, if one was opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_issue_url: Option<String>,

    /// Investigation status.
    #[serde(default)]
    pub status: IssueStatus,

    /// Free-form metrics captured at detection time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,

    /// How long resolution took, once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_time: Option<String>,
}

/// Kind of runtime failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    /// Application error.
    Error,
    /// Latency or throughput regression.
    Performance,
    /// Process or container crash.
    Crash,
    /// Security-relevant anomaly.
    Security,
}

/// Runtime issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Cosmetic or negligible.
    Low,
    /// Noticeable, not urgent.
    Medium,
    /// Needs prompt attention.
    High,
    /// Drop everything.
    Critical,
}

/// Runtime issue lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    /// Newly reported.
    #[default]
    Open,
    /// Someone is looking at it.
    Investigating,
    /// Resolved.
    Fixed,
    /// Not actually an issue.
    FalsePositive,
}
