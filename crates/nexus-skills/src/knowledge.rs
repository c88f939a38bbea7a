// SPDX-License-Identifier: MIT OR Apache-2.0
//! Family C: authenticated knowledge-management skills.

use crate::skill::{Skill, SkillExample, object_schema, parse_input, require_repo_mut, success};
use async_trait::async_trait;
use chrono::Utc;
use nexus_auth::Identity;
use nexus_core::{Edge, Lesson, LessonCategory, LessonSeverity};
use nexus_error::Result;
use nexus_store::KnowledgeBase;
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// add_lesson_learned
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct AddLessonRequest {
    repository: String,
    category: LessonCategory,
    lesson: String,
    context: String,
    #[serde(default)]
    severity: LessonSeverity,
    #[serde(default)]
    recorded_by: Option<String>,
}

/// Append an operational lesson to a repository's deployment section.
pub struct AddLessonLearnedSkill {
    kb: Arc<KnowledgeBase>,
}

impl AddLessonLearnedSkill {
    /// Construct with the shared knowledge base.
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

/// Deterministic lesson id: repository, category, lesson text, and the
/// record timestamp truncated to whole seconds.
fn lesson_id(repository: &str, category: LessonCategory, lesson: &str, epoch_secs: i64) -> String {
    let category = serde_json::to_string(&category).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(repository.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(category.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(lesson.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(epoch_secs.to_be_bytes());
    let digest = hasher.finalize();
    format!("lesson-{:x}", digest)[..23].to_string()
}

#[async_trait]
impl Skill for AddLessonLearnedSkill {
    fn id(&self) -> &'static str {
        "add_lesson_learned"
    }

    fn name(&self) -> &'static str {
        "Add Lesson Learned"
    }

    fn description(&self) -> &'static str {
        "Record an operational lesson against a tracked repository"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["knowledge", "lessons", "write"]
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "repository": { "type": "string" },
                "category": {
                    "type": "string",
                    "enum": ["performance", "security", "reliability", "cost", "observability", "deployment"],
                },
                "lesson": { "type": "string", "minLength": 1 },
                "context": { "type": "string" },
                "severity": { "type": "string", "enum": ["info", "warning", "critical"] },
                "recorded_by": { "type": "string" },
            }),
            &["repository", "category", "lesson", "context"],
        )
    }

    fn requires_authentication(&self) -> bool {
        true
    }

    fn examples(&self) -> Vec<SkillExample> {
        vec![SkillExample {
            input: json!({
                "repository": "acme/widget",
                "category": "reliability",
                "lesson": "Always set connection pool timeouts",
                "context": "Outage on 2026-03-14 from pool exhaustion",
                "severity": "critical",
            }),
            description: "Record a reliability lesson from an outage".into(),
        }]
    }

    async fn execute(&self, input: Value, identity: &Identity) -> Result<Value> {
        let request: AddLessonRequest = parse_input(input)?;
        let recorded_by = request.recorded_by.clone().or_else(|| identity.subject.clone());

        let message = format!("lesson: {}", request.repository);
        let id = self
            .kb
            .mutate(&message, move |doc| {
                let record = require_repo_mut(doc, &request.repository)?;
                let recorded_at = Utc::now();
                let id = lesson_id(
                    &request.repository,
                    request.category,
                    &request.lesson,
                    recorded_at.timestamp(),
                );
                record.deployment.lessons_learned.push(Lesson {
                    category: request.category,
                    lesson: request.lesson,
                    context: request.context,
                    severity: request.severity,
                    recorded_by,
                    recorded_at,
                });
                Ok(id)
            })
            .await?;

        Ok(success(json!({ "lesson_id": id })))
    }
}

// ---------------------------------------------------------------------------
// update_dependency_info
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct DependencyUpdate {
    #[serde(default)]
    consumers: Option<Vec<Edge>>,
    #[serde(default)]
    derivatives: Option<Vec<Edge>>,
    #[serde(default)]
    external_dependencies: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct UpdateDependencyRequest {
    repository: String,
    dependency_info: DependencyUpdate,
}

/// Replace a repository's dependency edges, sub-array by sub-array.
pub struct UpdateDependencyInfoSkill {
    kb: Arc<KnowledgeBase>,
}

impl UpdateDependencyInfoSkill {
    /// Construct with the shared knowledge base.
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Skill for UpdateDependencyInfoSkill {
    fn id(&self) -> &'static str {
        "update_dependency_info"
    }

    fn name(&self) -> &'static str {
        "Update Dependency Info"
    }

    fn description(&self) -> &'static str {
        "Replace a repository's consumers, derivatives, or external dependencies"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["knowledge", "dependencies", "write"]
    }

    fn input_schema(&self) -> Value {
        let edge = json!({
            "type": "object",
            "properties": {
                "repository": { "type": "string" },
                "relationship": { "type": "string" },
            },
            "required": ["repository"],
        });
        object_schema(
            json!({
                "repository": { "type": "string" },
                "dependency_info": {
                    "type": "object",
                    "properties": {
                        "consumers": { "type": "array", "items": edge },
                        "derivatives": { "type": "array", "items": edge },
                        "external_dependencies": {
                            "type": "array",
                            "items": { "type": "string" },
                        },
                    },
                },
            }),
            &["repository", "dependency_info"],
        )
    }

    fn requires_authentication(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, _identity: &Identity) -> Result<Value> {
        let request: UpdateDependencyRequest = parse_input(input)?;

        let message = format!("dependencies: {}", request.repository);
        let updated = self
            .kb
            .mutate(&message, move |doc| {
                let record = require_repo_mut(doc, &request.repository)?;
                let mut updated = Vec::new();

                if let Some(consumers) = request.dependency_info.consumers {
                    record.dependencies.consumers = consumers;
                    updated.push("consumers");
                }
                if let Some(derivatives) = request.dependency_info.derivatives {
                    record.dependencies.derivatives = derivatives;
                    updated.push("derivatives");
                }
                if let Some(external) = request.dependency_info.external_dependencies {
                    record.dependencies.external_dependencies = external;
                    updated.push("external_dependencies");
                }
                Ok(updated)
            })
            .await?;

        Ok(success(json!({ "updated": updated })))
    }
}
