// SPDX-License-Identifier: MIT OR Apache-2.0
//! nexus-similarity
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Derived queries over the knowledge document: set-overlap similarity
//! between repositories, cross-repository pattern aggregation, pattern
//! health over a time window, and similar-issue ranking.
//!
//! Everything here is a pure function of a document snapshot.  All
//! orderings are total (score first, then a fixed lexicographic
//! tie-break), so two invocations against the same snapshot return
//! bit-identical results.  Set membership is case-sensitive throughout.

use chrono::{DateTime, Duration, Utc};
use nexus_core::{Component, IssueSeverity, IssueStatus, IssueType, KnowledgeDocument};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Repository similarity
// ---------------------------------------------------------------------------

/// One repository scored against a similarity target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarRepo {
    /// The similar repository's id.
    pub repository: String,
    /// `|shared keywords| + |shared patterns|`.
    pub score: usize,
    /// Keywords present in both repositories, sorted.
    pub shared_keywords: Vec<String>,
    /// Patterns present in both repositories, sorted.
    pub shared_patterns: Vec<String>,
}

/// Rank every other repository against `target` by keyword and pattern
/// overlap, equal weight, keeping only strictly positive scores.
///
/// Ties are broken by repository id ascending.  An untracked target yields
/// an empty result, not an error.
pub fn similar_repos(doc: &KnowledgeDocument, target: &str, k: usize) -> Vec<SimilarRepo> {
    let Some(record) = doc.repositories.get(target) else {
        return Vec::new();
    };
    let keywords: BTreeSet<&str> = record
        .latest_patterns
        .keywords
        .iter()
        .map(String::as_str)
        .collect();
    let patterns: BTreeSet<&str> = record
        .latest_patterns
        .patterns
        .iter()
        .map(String::as_str)
        .collect();

    let mut ranked: Vec<SimilarRepo> = doc
        .repositories
        .iter()
        .filter(|(id, _)| id.as_str() != target)
        .filter_map(|(id, other)| {
            let shared_keywords: Vec<String> = other
                .latest_patterns
                .keywords
                .iter()
                .filter(|kw| keywords.contains(kw.as_str()))
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let shared_patterns: Vec<String> = other
                .latest_patterns
                .patterns
                .iter()
                .filter(|p| patterns.contains(p.as_str()))
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            let score = shared_keywords.len() + shared_patterns.len();
            (score > 0).then(|| SimilarRepo {
                repository: id.clone(),
                score,
                shared_keywords,
                shared_patterns,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.repository.cmp(&b.repository))
    });
    ranked.truncate(k);
    ranked
}

// ---------------------------------------------------------------------------
// Pattern queries
// ---------------------------------------------------------------------------

/// A pattern-affinity query against the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternQuery {
    /// Keywords to intersect with each repository's keyword set.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Patterns to intersect with each repository's pattern set.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Substring match against each repository's problem domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_domain: Option<String>,
    /// Restrict the query to a single repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Minimum score to include a repository (raises the `> 0` floor).
    #[serde(default = "default_min_matches")]
    pub min_matches: usize,
    /// Maximum repositories to return.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_min_matches() -> usize {
    1
}

fn default_limit() -> usize {
    10
}

impl Default for PatternQuery {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            patterns: Vec::new(),
            problem_domain: None,
            repository: None,
            min_matches: default_min_matches(),
            limit: default_limit(),
        }
    }
}

/// One repository matched by a [`PatternQuery`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    /// Matched repository id.
    pub repository: String,
    /// Overlap score that ranked this repository.
    pub score: usize,
    /// The repository's full pattern list.
    pub patterns: Vec<String>,
    /// The repository's full keyword list.
    pub keywords: Vec<String>,
    /// The repository's reusable components.
    pub reusable_components: Vec<Component>,
    /// The repository's problem domain.
    pub problem_domain: String,
}

/// Score every repository against the query.
///
/// `score = |keywords ∩ query.keywords| + |patterns ∩ query.patterns|`,
/// plus one when the query's problem domain is a substring of the
/// repository's.  Repositories scoring at least `min_matches` are ranked
/// by score descending with id-ascending tie-break and truncated to
/// `limit`.
pub fn query_patterns(doc: &KnowledgeDocument, query: &PatternQuery) -> Vec<PatternMatch> {
    let want_keywords: BTreeSet<&str> = query.keywords.iter().map(String::as_str).collect();
    let want_patterns: BTreeSet<&str> = query.patterns.iter().map(String::as_str).collect();
    let min_matches = query.min_matches.max(1);

    let mut matches: Vec<PatternMatch> = doc
        .repositories
        .iter()
        .filter(|(id, _)| {
            query
                .repository
                .as_deref()
                .is_none_or(|only| only == id.as_str())
        })
        .filter_map(|(id, record)| {
            let snapshot = &record.latest_patterns;
            let keyword_hits = snapshot
                .keywords
                .iter()
                .filter(|kw| want_keywords.contains(kw.as_str()))
                .collect::<BTreeSet<_>>()
                .len();
            let pattern_hits = snapshot
                .patterns
                .iter()
                .filter(|p| want_patterns.contains(p.as_str()))
                .collect::<BTreeSet<_>>()
                .len();
            let domain_hit = query
                .problem_domain
                .as_deref()
                .is_some_and(|d| !d.is_empty() && snapshot.problem_domain.contains(d));

            let score = keyword_hits + pattern_hits + usize::from(domain_hit);
            (score >= min_matches).then(|| PatternMatch {
                repository: id.clone(),
                score,
                patterns: snapshot.patterns.clone(),
                keywords: snapshot.keywords.clone(),
                reusable_components: snapshot.reusable_components.clone(),
                problem_domain: snapshot.problem_domain.clone(),
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.repository.cmp(&b.repository))
    });
    matches.truncate(query.limit);
    matches
}

// ---------------------------------------------------------------------------
// Cross-repository aggregation
// ---------------------------------------------------------------------------

/// A pattern used by multiple repositories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossRepoPattern {
    /// The pattern name.
    pub pattern: String,
    /// How many repositories use it.
    pub repo_count: usize,
    /// The repositories that use it, sorted.
    pub repositories: Vec<String>,
}

/// Invert the repo→patterns map and keep patterns appearing in at least
/// `min_repos` repositories, ordered by repo-count descending then pattern
/// ascending.  An optional case-insensitive substring narrows the pattern
/// names considered.
pub fn cross_repo_patterns(
    doc: &KnowledgeDocument,
    min_repos: usize,
    pattern_filter: Option<&str>,
) -> Vec<CrossRepoPattern> {
    let filter = pattern_filter.map(str::to_lowercase);
    let mut by_pattern: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for (id, record) in &doc.repositories {
        for pattern in &record.latest_patterns.patterns {
            if let Some(ref f) = filter
                && !pattern.to_lowercase().contains(f)
            {
                continue;
            }
            by_pattern.entry(pattern.as_str()).or_default().insert(id);
        }
    }

    let mut aggregated: Vec<CrossRepoPattern> = by_pattern
        .into_iter()
        .filter(|(_, repos)| repos.len() >= min_repos.max(1))
        .map(|(pattern, repos)| CrossRepoPattern {
            pattern: pattern.to_string(),
            repo_count: repos.len(),
            repositories: repos.into_iter().map(str::to_owned).collect(),
        })
        .collect();

    aggregated.sort_by(|a, b| {
        b.repo_count
            .cmp(&a.repo_count)
            .then_with(|| a.pattern.cmp(&b.pattern))
    });
    aggregated
}

// ---------------------------------------------------------------------------
// Pattern health
// ---------------------------------------------------------------------------

/// Health rollup for one pattern over a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternHealth {
    /// The pattern examined.
    pub pattern: String,
    /// Repositories whose latest snapshot contains the pattern.
    pub total_repos: usize,
    /// Of those, repositories with at least one in-window issue referencing
    /// the pattern.
    pub repos_with_issues: usize,
    /// `1 − repos_with_issues / total_repos`, in `[0, 1]`.
    pub health_score: f64,
    /// Coarse guidance derived from the score.
    pub recommendation: String,
    /// The repositories counted in `total_repos`, sorted.
    pub repositories: Vec<String>,
}

/// Score threshold above which a pattern is considered healthy.
const HEALTHY_THRESHOLD: f64 = 0.7;

/// Score threshold below which a pattern is considered unhealthy.
const UNHEALTHY_THRESHOLD: f64 = 0.5;

/// Compute the health of `pattern` over the trailing `window_days`.
///
/// A pattern no repository uses scores 1.0; absence of evidence is not
/// held against it.
pub fn pattern_health(
    doc: &KnowledgeDocument,
    pattern: &str,
    window_days: i64,
    now: DateTime<Utc>,
) -> PatternHealth {
    let window_start = now - Duration::days(window_days.max(0));

    let using: Vec<(&String, &nexus_core::RepoRecord)> = doc
        .repositories
        .iter()
        .filter(|(_, record)| {
            record
                .latest_patterns
                .patterns
                .iter()
                .any(|p| p == pattern)
        })
        .collect();

    let total_repos = using.len();
    let repos_with_issues = using
        .iter()
        .filter(|(_, record)| {
            record.runtime_issues.iter().any(|issue| {
                issue.pattern_reference.as_deref() == Some(pattern)
                    && issue.detected_at >= window_start
            })
        })
        .count();

    let health_score = if total_repos == 0 {
        1.0
    } else {
        1.0 - repos_with_issues as f64 / total_repos as f64
    };

    let recommendation = if health_score >= HEALTHY_THRESHOLD {
        format!("'{pattern}' is healthy across tracked repositories; safe to adopt")
    } else if health_score >= UNHEALTHY_THRESHOLD {
        format!("'{pattern}' is showing elevated issue rates; review recent runtime issues before adopting")
    } else {
        format!("'{pattern}' is unhealthy; investigate affected repositories before further adoption")
    };

    PatternHealth {
        pattern: pattern.to_string(),
        total_repos,
        repos_with_issues,
        health_score,
        recommendation,
        repositories: using.iter().map(|(id, _)| (*id).clone()).collect(),
    }
}

// ---------------------------------------------------------------------------
// Similar issues
// ---------------------------------------------------------------------------

/// A prior issue ranked against a newly reported one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarIssue {
    /// Repository the prior issue was reported against.
    pub repository: String,
    /// Prior issue id.
    pub issue_id: String,
    /// Prior issue type.
    pub issue_type: IssueType,
    /// Prior issue severity.
    pub severity: IssueSeverity,
    /// Prior issue status.
    pub status: IssueStatus,
    /// When the prior issue was detected.
    pub detected_at: DateTime<Utc>,
    /// Pattern the prior issue was attributed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_reference: Option<String>,
    /// Root cause, when known. Surfacing known causes is the point of this ranking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<String>,
    /// Applied or suggested fix, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

/// Maximum prior issues returned by [`similar_issues`].
const SIMILAR_ISSUE_LIMIT: usize = 10;

/// Rank prior issues across the whole knowledge base against a new report.
///
/// Ordering: same issue type first, then same severity, then log token
/// overlap, then recency; id ascending as the final tie-break.
pub fn similar_issues(
    doc: &KnowledgeDocument,
    issue_type: IssueType,
    severity: IssueSeverity,
    logs: &str,
) -> Vec<SimilarIssue> {
    let new_tokens = log_tokens(logs);

    let mut ranked: Vec<(SimilarIssue, (bool, bool, usize))> = doc
        .repositories
        .iter()
        .flat_map(|(id, record)| {
            let new_tokens = new_tokens.clone();
            record.runtime_issues.iter().map(move |issue| {
                let overlap = log_tokens(&issue.logs)
                    .intersection(&new_tokens)
                    .count();
                (
                    SimilarIssue {
                        repository: id.clone(),
                        issue_id: issue.id.clone(),
                        issue_type: issue.issue_type,
                        severity: issue.severity,
                        status: issue.status,
                        detected_at: issue.detected_at,
                        pattern_reference: issue.pattern_reference.clone(),
                        root_cause: issue.root_cause.clone(),
                        fix: issue.fix.clone(),
                    },
                    (
                        issue.issue_type == issue_type,
                        issue.severity == severity,
                        overlap,
                    ),
                )
            })
        })
        .collect();

    ranked.sort_by(|(a, ka), (b, kb)| {
        kb.cmp(ka)
            .then_with(|| b.detected_at.cmp(&a.detected_at))
            .then_with(|| a.issue_id.cmp(&b.issue_id))
    });

    ranked
        .into_iter()
        .take(SIMILAR_ISSUE_LIMIT)
        .map(|(issue, _)| issue)
        .collect()
}

/// Lowercased whitespace tokens of a log excerpt.
fn log_tokens(logs: &str) -> BTreeSet<String> {
    logs.split_whitespace()
        .map(str::to_lowercase)
        .collect()
}
