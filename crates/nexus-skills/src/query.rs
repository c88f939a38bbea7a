// SPDX-License-Identifier: MIT OR Apache-2.0
//! Family A: public pattern-query skills.

use crate::skill::{
    Skill, SkillExample, load_for_query, object_schema, parse_input, require_repo, success,
    with_degraded,
};
use async_trait::async_trait;
use nexus_auth::Identity;
use nexus_error::Result;
use nexus_similarity::{PatternQuery, cross_repo_patterns, query_patterns, similar_repos};
use nexus_store::KnowledgeBase;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// query_patterns
// ---------------------------------------------------------------------------

/// Score repositories against requested keywords, patterns, and problem
/// domain.
pub struct QueryPatternsSkill {
    kb: Arc<KnowledgeBase>,
}

impl QueryPatternsSkill {
    /// Construct with the shared knowledge base.
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Skill for QueryPatternsSkill {
    fn id(&self) -> &'static str {
        "query_patterns"
    }

    fn name(&self) -> &'static str {
        "Query Patterns"
    }

    fn description(&self) -> &'static str {
        "Find repositories whose patterns and keywords overlap the query"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["patterns", "query", "similarity"]
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "keywords": { "type": "array", "items": { "type": "string" } },
                "patterns": { "type": "array", "items": { "type": "string" } },
                "problem_domain": { "type": "string" },
                "repository": { "type": "string" },
                "min_matches": { "type": "integer", "minimum": 1 },
                "limit": { "type": "integer", "minimum": 1, "maximum": 100 },
            }),
            &[],
        )
    }

    fn examples(&self) -> Vec<SkillExample> {
        vec![SkillExample {
            input: json!({ "keywords": ["retry"], "patterns": ["Retry with backoff"] }),
            description: "Repositories that retry HTTP calls with backoff".into(),
        }]
    }

    async fn execute(&self, input: Value, _identity: &Identity) -> Result<Value> {
        let query: PatternQuery = parse_input(input)?;
        let (doc, degraded) = load_for_query(&self.kb).await?;
        let matches = query_patterns(&doc, &query);
        Ok(with_degraded(
            success(json!({ "count": matches.len(), "patterns": matches })),
            degraded,
        ))
    }
}

// ---------------------------------------------------------------------------
// get_cross_repo_patterns
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CrossRepoRequest {
    #[serde(default = "default_min_repos")]
    min_repos: usize,
    #[serde(default)]
    pattern_type: Option<String>,
}

fn default_min_repos() -> usize {
    2
}

/// Aggregate patterns that recur across repositories.
pub struct CrossRepoPatternsSkill {
    kb: Arc<KnowledgeBase>,
}

impl CrossRepoPatternsSkill {
    /// Construct with the shared knowledge base.
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Skill for CrossRepoPatternsSkill {
    fn id(&self) -> &'static str {
        "get_cross_repo_patterns"
    }

    fn name(&self) -> &'static str {
        "Cross-Repository Patterns"
    }

    fn description(&self) -> &'static str {
        "Patterns shared by at least N repositories, most widespread first"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["patterns", "aggregation"]
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "min_repos": { "type": "integer", "minimum": 1 },
                "pattern_type": { "type": "string" },
            }),
            &[],
        )
    }

    async fn execute(&self, input: Value, _identity: &Identity) -> Result<Value> {
        let request: CrossRepoRequest = parse_input(input)?;
        let (doc, degraded) = load_for_query(&self.kb).await?;
        let patterns =
            cross_repo_patterns(&doc, request.min_repos, request.pattern_type.as_deref());
        Ok(with_degraded(
            success(json!({ "count": patterns.len(), "patterns": patterns })),
            degraded,
        ))
    }
}

// ---------------------------------------------------------------------------
// find_similar_repositories
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SimilarReposRequest {
    repository: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
}

fn default_top_k() -> usize {
    5
}

/// Rank the repositories most similar to a given one.
pub struct SimilarRepositoriesSkill {
    kb: Arc<KnowledgeBase>,
}

impl SimilarRepositoriesSkill {
    /// Construct with the shared knowledge base.
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Skill for SimilarRepositoriesSkill {
    fn id(&self) -> &'static str {
        "find_similar_repositories"
    }

    fn name(&self) -> &'static str {
        "Find Similar Repositories"
    }

    fn description(&self) -> &'static str {
        "Repositories with overlapping keywords and patterns, best match first"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["similarity", "query"]
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "repository": { "type": "string" },
                "top_k": { "type": "integer", "minimum": 1, "maximum": 50 },
            }),
            &["repository"],
        )
    }

    async fn execute(&self, input: Value, _identity: &Identity) -> Result<Value> {
        let request: SimilarReposRequest = parse_input(input)?;
        let (doc, degraded) = load_for_query(&self.kb).await?;
        if !degraded {
            require_repo(&doc, &request.repository)?;
        }
        let similar = similar_repos(&doc, &request.repository, request.top_k);
        Ok(with_degraded(
            success(json!({
                "repository": request.repository,
                "count": similar.len(),
                "similar": similar,
            })),
            degraded,
        ))
    }
}
