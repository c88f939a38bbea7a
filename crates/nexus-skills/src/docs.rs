// SPDX-License-Identifier: MIT OR Apache-2.0
//! Family E: documentation-standards skills.
//!
//! The core never fetches or parses repository sources, so documentation
//! standards are evaluated against the knowledge record itself: a tracked
//! repository is well-documented when its domain is stated, its reusable
//! components are described and point at files, its deployment pipeline is
//! named, and operational lessons exist.

use crate::skill::{Skill, object_schema, parse_input, require_repo, success};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use nexus_auth::Identity;
use nexus_core::{Component, RepoRecord};
use nexus_error::Result;
use nexus_store::KnowledgeBase;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Violations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ViolationSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ViolationSeverity {
    fn weight(self) -> f64 {
        match self {
            Self::Low => 0.1,
            Self::Medium => 0.3,
            Self::High => 0.6,
            Self::Critical => 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Violation {
    rule: &'static str,
    severity: ViolationSeverity,
    message: String,
}

#[derive(Debug, Clone, Serialize)]
struct FileResult {
    name: String,
    files: Vec<String>,
    violations: Vec<Violation>,
}

fn check_component(component: &Component) -> FileResult {
    let mut violations = Vec::new();
    if component.description.trim().is_empty() {
        violations.push(Violation {
            rule: "component-description",
            severity: ViolationSeverity::High,
            message: format!("component '{}' has no description", component.name),
        });
    }
    if component.files.is_empty() {
        violations.push(Violation {
            rule: "component-files",
            severity: ViolationSeverity::Medium,
            message: format!("component '{}' lists no files", component.name),
        });
    }
    FileResult {
        name: component.name.clone(),
        files: component.files.clone(),
        violations,
    }
}

fn check_record(record: &RepoRecord, check_all_docs: bool) -> FileResult {
    let mut violations = Vec::new();

    if record.latest_patterns.problem_domain.trim().is_empty() {
        violations.push(Violation {
            rule: "problem-domain",
            severity: ViolationSeverity::High,
            message: "problem domain is not stated".into(),
        });
    }
    if record.deployment.ci_cd_platform.trim().is_empty() {
        violations.push(Violation {
            rule: "ci-cd-platform",
            severity: ViolationSeverity::Medium,
            message: "CI/CD platform is not named".into(),
        });
    }
    if record.deployment.lessons_learned.is_empty() {
        violations.push(Violation {
            rule: "lessons-learned",
            severity: ViolationSeverity::Low,
            message: "no operational lessons recorded".into(),
        });
    }

    if check_all_docs {
        if record.testing.test_frameworks.is_empty() {
            violations.push(Violation {
                rule: "test-frameworks",
                severity: ViolationSeverity::Medium,
                message: "no test frameworks documented".into(),
            });
        }
        if record.security.security_patterns.is_empty()
            && record.security.authentication_methods.is_empty()
        {
            violations.push(Violation {
                rule: "security-section",
                severity: ViolationSeverity::Low,
                message: "security section is empty".into(),
            });
        }
        let deps = &record.dependencies;
        if deps.consumers.is_empty()
            && deps.derivatives.is_empty()
            && deps.external_dependencies.is_empty()
        {
            violations.push(Violation {
                rule: "dependency-edges",
                severity: ViolationSeverity::Low,
                message: "no dependency relationships annotated".into(),
            });
        }
    }

    FileResult {
        name: "repository_metadata".into(),
        files: Vec::new(),
        violations,
    }
}

fn recommendation_for(rule: &str) -> Option<&'static str> {
    match rule {
        "problem-domain" => Some("State the repository's problem domain so queries can find it"),
        "ci-cd-platform" => Some("Name the CI/CD platform in the deployment section"),
        "lessons-learned" => Some("Record operational lessons as they are learned"),
        "component-description" => Some("Describe every reusable component"),
        "component-files" => Some("List the files that make up each reusable component"),
        "test-frameworks" => Some("Document the test frameworks in use"),
        "security-section" => Some("Document security patterns and authentication methods"),
        "dependency-edges" => Some("Annotate consumer and dependency relationships"),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// check_documentation_standards
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CheckStandardsRequest {
    repository: String,
    #[serde(default)]
    check_all_docs: bool,
}

/// Grade a repository's knowledge record against documentation standards.
pub struct CheckDocumentationStandardsSkill {
    kb: Arc<KnowledgeBase>,
}

impl CheckDocumentationStandardsSkill {
    /// Construct with the shared knowledge base.
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Skill for CheckDocumentationStandardsSkill {
    fn id(&self) -> &'static str {
        "check_documentation_standards"
    }

    fn name(&self) -> &'static str {
        "Check Documentation Standards"
    }

    fn description(&self) -> &'static str {
        "Grade a repository's recorded knowledge against documentation standards"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["documentation", "standards"]
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "repository": { "type": "string" },
                "check_all_docs": { "type": "boolean" },
            }),
            &["repository"],
        )
    }

    async fn execute(&self, input: Value, _identity: &Identity) -> Result<Value> {
        let request: CheckStandardsRequest = parse_input(input)?;
        let doc = self.kb.load().await?;
        let record = require_repo(&doc, &request.repository)?;

        let mut file_results = vec![check_record(record, request.check_all_docs)];
        for component in record
            .latest_patterns
            .reusable_components
            .iter()
            .chain(record.deployment.reusable_components.iter())
        {
            file_results.push(check_component(component));
        }

        let mut by_severity = [0usize; 4]; // critical, high, medium, low
        let mut weighted = 0.0;
        let mut total_checks = 0usize;
        let mut recommendations: Vec<&str> = Vec::new();

        for result in &file_results {
            // Each unit is graded on a fixed rule count; components on two,
            // the record itself on three (or six with check_all_docs).
            total_checks += if result.name == "repository_metadata" {
                if request.check_all_docs { 6 } else { 3 }
            } else {
                2
            };
            for violation in &result.violations {
                weighted += violation.severity.weight();
                match violation.severity {
                    ViolationSeverity::Critical => by_severity[0] += 1,
                    ViolationSeverity::High => by_severity[1] += 1,
                    ViolationSeverity::Medium => by_severity[2] += 1,
                    ViolationSeverity::Low => by_severity[3] += 1,
                }
                if let Some(rec) = recommendation_for(violation.rule)
                    && !recommendations.contains(&rec)
                {
                    recommendations.push(rec);
                }
            }
        }

        let total_violations = by_severity.iter().sum::<usize>();
        let compliance_score = if total_checks == 0 {
            1.0
        } else {
            (1.0 - weighted / total_checks as f64).clamp(0.0, 1.0)
        };
        let status = if by_severity[0] == 0 && by_severity[1] == 0 {
            "compliant"
        } else {
            "non_compliant"
        };

        Ok(success(json!({
            "repository": request.repository,
            "status": status,
            "compliance_score": compliance_score,
            "file_results": file_results,
            "summary": {
                "total_files_checked": file_results.len(),
                "total_violations": total_violations,
                "by_severity": {
                    "critical": by_severity[0],
                    "high": by_severity[1],
                    "medium": by_severity[2],
                    "low": by_severity[3],
                },
            },
            "recommendations": recommendations,
        })))
    }
}

// ---------------------------------------------------------------------------
// validate_documentation_update
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ValidateUpdateRequest {
    repository: String,
    #[serde(default = "default_days")]
    days: i64,
}

fn default_days() -> i64 {
    7
}

/// Flag repositories whose code kept moving while their documentation
/// stood still.
pub struct ValidateDocumentationUpdateSkill {
    kb: Arc<KnowledgeBase>,
}

impl ValidateDocumentationUpdateSkill {
    /// Construct with the shared knowledge base.
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Skill for ValidateDocumentationUpdateSkill {
    fn id(&self) -> &'static str {
        "validate_documentation_update"
    }

    fn name(&self) -> &'static str {
        "Validate Documentation Update"
    }

    fn description(&self) -> &'static str {
        "Compare recent analysis activity against documentation freshness"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["documentation", "freshness"]
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "repository": { "type": "string" },
                "days": { "type": "integer", "minimum": 1, "maximum": 365 },
            }),
            &["repository"],
        )
    }

    async fn execute(&self, input: Value, _identity: &Identity) -> Result<Value> {
        let request: ValidateUpdateRequest = parse_input(input)?;
        let doc = self.kb.load().await?;
        let record = require_repo(&doc, &request.repository)?;

        let window_start = Utc::now() - Duration::days(request.days);
        let code_files = record
            .history
            .iter()
            .filter(|entry| entry.timestamp >= window_start)
            .count();
        let doc_files = record
            .deployment
            .lessons_learned
            .iter()
            .filter(|lesson| lesson.recorded_at >= window_start)
            .count();

        let mut warnings: Vec<String> = Vec::new();
        if code_files > 0 && doc_files == 0 {
            warnings.push(format!(
                "{code_files} analysis snapshot(s) in the last {} day(s) with no documentation updates",
                request.days
            ));
        }

        let (status, message) = if warnings.is_empty() {
            (
                "ok",
                "documentation activity matches code activity".to_string(),
            )
        } else {
            (
                "stale",
                format!(
                    "documentation for '{}' lags recent code changes",
                    request.repository
                ),
            )
        };

        Ok(success(json!({
            "validation": { "status": status, "message": message },
            "changes": { "code_files": code_files, "doc_files": doc_files },
            "warnings": warnings,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::{DeploymentInfo, HistoryEntry, Lesson, LessonCategory, LessonSeverity, PatternSnapshot};
    use nexus_store::MemoryStore;

    fn documented_record() -> RepoRecord {
        RepoRecord {
            latest_patterns: PatternSnapshot {
                problem_domain: "api clients".into(),
                reusable_components: vec![Component {
                    name: "retry-wrapper".into(),
                    description: "shared retry middleware".into(),
                    files: vec!["src/retry.rs".into()],
                }],
                ..Default::default()
            },
            deployment: DeploymentInfo {
                ci_cd_platform: "github-actions".into(),
                lessons_learned: vec![Lesson {
                    category: LessonCategory::Deployment,
                    lesson: "canary first".into(),
                    context: "rollout incident".into(),
                    severity: LessonSeverity::Info,
                    recorded_by: None,
                    recorded_at: Utc::now(),
                }],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn kb_with(record: RepoRecord) -> Arc<KnowledgeBase> {
        let kb = Arc::new(KnowledgeBase::new(Arc::new(MemoryStore::new())));
        kb.mutate("seed", move |doc| {
            doc.repositories.insert("a/b".into(), record);
            Ok(())
        })
        .await
        .unwrap();
        kb
    }

    #[tokio::test]
    async fn documented_repository_is_compliant() {
        let kb = kb_with(documented_record()).await;
        let skill = CheckDocumentationStandardsSkill::new(kb);
        let output = skill
            .execute(json!({ "repository": "a/b" }), &Identity::anonymous())
            .await
            .unwrap();

        assert_eq!(output["status"], "compliant");
        assert_eq!(output["summary"]["total_violations"], 0);
        assert_eq!(output["compliance_score"], 1.0);
        assert_eq!(output["summary"]["total_files_checked"], 2);
    }

    #[tokio::test]
    async fn bare_repository_is_non_compliant_with_recommendations() {
        let kb = kb_with(RepoRecord::default()).await;
        let skill = CheckDocumentationStandardsSkill::new(kb);
        let output = skill
            .execute(
                json!({ "repository": "a/b", "check_all_docs": true }),
                &Identity::anonymous(),
            )
            .await
            .unwrap();

        assert_eq!(output["status"], "non_compliant");
        let score = output["compliance_score"].as_f64().unwrap();
        assert!((0.0..1.0).contains(&score));
        assert!(output["summary"]["by_severity"]["high"].as_u64().unwrap() >= 1);
        assert!(
            output["recommendations"]
                .as_array()
                .unwrap()
                .iter()
                .any(|r| r.as_str().unwrap().contains("problem domain"))
        );
    }

    #[tokio::test]
    async fn undocumented_component_is_flagged() {
        let mut record = documented_record();
        record.latest_patterns.reusable_components.push(Component {
            name: "mystery".into(),
            description: String::new(),
            files: vec![],
        });
        let kb = kb_with(record).await;
        let skill = CheckDocumentationStandardsSkill::new(kb);
        let output = skill
            .execute(json!({ "repository": "a/b" }), &Identity::anonymous())
            .await
            .unwrap();

        assert_eq!(output["status"], "non_compliant");
        let file_results = output["file_results"].as_array().unwrap();
        let mystery = file_results
            .iter()
            .find(|r| r["name"] == "mystery")
            .unwrap();
        assert_eq!(mystery["violations"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn fresh_docs_validate_ok() {
        let mut record = documented_record();
        record.history.push(HistoryEntry {
            timestamp: Utc::now(),
            commit_sha: "abc".into(),
            patterns: vec![],
        });
        let kb = kb_with(record).await;
        let skill = ValidateDocumentationUpdateSkill::new(kb);
        let output = skill
            .execute(json!({ "repository": "a/b" }), &Identity::anonymous())
            .await
            .unwrap();

        assert_eq!(output["validation"]["status"], "ok");
        assert_eq!(output["changes"]["code_files"], 1);
        assert_eq!(output["changes"]["doc_files"], 1);
        assert!(output["warnings"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn code_without_docs_is_stale() {
        let mut record = RepoRecord::default();
        record.history.push(HistoryEntry {
            timestamp: Utc::now(),
            commit_sha: "abc".into(),
            patterns: vec![],
        });
        let kb = kb_with(record).await;
        let skill = ValidateDocumentationUpdateSkill::new(kb);
        let output = skill
            .execute(
                json!({ "repository": "a/b", "days": 14 }),
                &Identity::anonymous(),
            )
            .await
            .unwrap();

        assert_eq!(output["validation"]["status"], "stale");
        assert_eq!(output["warnings"].as_array().unwrap().len(), 1);
    }
}
