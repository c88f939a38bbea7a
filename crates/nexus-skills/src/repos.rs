// SPDX-License-Identifier: MIT OR Apache-2.0
//! Family B: public repository-information skills.

use crate::skill::{
    Skill, load_for_query, object_schema, parse_input, require_repo, success, with_degraded,
};
use async_trait::async_trait;
use nexus_auth::Identity;
use nexus_error::Result;
use nexus_store::KnowledgeBase;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// get_repository_list
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RepositoryListRequest {
    #[serde(default = "default_true")]
    include_metadata: bool,
}

fn default_true() -> bool {
    true
}

/// Enumerate tracked repositories.
pub struct RepositoryListSkill {
    kb: Arc<KnowledgeBase>,
}

impl RepositoryListSkill {
    /// Construct with the shared knowledge base.
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Skill for RepositoryListSkill {
    fn id(&self) -> &'static str {
        "get_repository_list"
    }

    fn name(&self) -> &'static str {
        "Repository List"
    }

    fn description(&self) -> &'static str {
        "All tracked repositories, optionally with pattern counts and domains"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["repositories", "query"]
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "include_metadata": { "type": "boolean" },
            }),
            &[],
        )
    }

    async fn execute(&self, input: Value, _identity: &Identity) -> Result<Value> {
        let request: RepositoryListRequest = parse_input(input)?;
        let (doc, degraded) = load_for_query(&self.kb).await?;

        let repositories: Vec<Value> = doc
            .repositories
            .iter()
            .map(|(id, record)| {
                if request.include_metadata {
                    json!({
                        "name": id,
                        "pattern_count": record.latest_patterns.patterns.len(),
                        "last_updated": record.latest_patterns.analyzed_at,
                        "problem_domain": record.latest_patterns.problem_domain,
                    })
                } else {
                    json!({ "name": id })
                }
            })
            .collect();

        Ok(with_degraded(
            success(json!({
                "count": repositories.len(),
                "repositories": repositories,
            })),
            degraded,
        ))
    }
}

// ---------------------------------------------------------------------------
// get_deployment_info
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct DeploymentInfoRequest {
    repository: String,
    #[serde(default = "default_true")]
    include_lessons: bool,
    #[serde(default)]
    include_history: bool,
}

/// Return one repository's deployment knowledge.
pub struct DeploymentInfoSkill {
    kb: Arc<KnowledgeBase>,
    max_history_entries: usize,
}

impl DeploymentInfoSkill {
    /// Construct with the shared knowledge base and the history cap.
    pub fn new(kb: Arc<KnowledgeBase>, max_history_entries: usize) -> Self {
        Self {
            kb,
            max_history_entries,
        }
    }
}

#[async_trait]
impl Skill for DeploymentInfoSkill {
    fn id(&self) -> &'static str {
        "get_deployment_info"
    }

    fn name(&self) -> &'static str {
        "Deployment Info"
    }

    fn description(&self) -> &'static str {
        "Deployment scripts, platform, lessons, and recent history for a repository"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["repositories", "deployment"]
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "repository": { "type": "string" },
                "include_lessons": { "type": "boolean" },
                "include_history": { "type": "boolean" },
            }),
            &["repository"],
        )
    }

    async fn execute(&self, input: Value, _identity: &Identity) -> Result<Value> {
        let request: DeploymentInfoRequest = parse_input(input)?;
        let doc = self.kb.load().await?;
        let record = require_repo(&doc, &request.repository)?;

        let mut payload = json!({
            "repository": request.repository,
            "deployment": {
                "scripts": record.deployment.scripts,
                "ci_cd_platform": record.deployment.ci_cd_platform,
                "infrastructure": record.deployment.infrastructure,
                "reusable_components": record.deployment.reusable_components,
            },
        });

        if request.include_lessons {
            payload["lessons_learned"] = json!(record.deployment.lessons_learned);
        }
        if request.include_history {
            let start = record.history.len().saturating_sub(self.max_history_entries);
            payload["history"] = json!(record.history[start..]);
        }

        Ok(success(payload))
    }
}
