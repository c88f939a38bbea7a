// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end scenarios through the real router with the in-memory store.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use nexus_auth::{AuthContext, AuthMode};
use nexus_config::{ENV_KNOWLEDGE_BASE_REPO, NexusConfig};
use nexus_core::{IssueSeverity, IssueStatus, IssueType, PatternSnapshot, RepoRecord, RuntimeIssue};
use nexus_peers::IntegrationClient;
use nexus_server::{AppState, build_app};
use nexus_skills::{SkillRegistry, build_registry};
use nexus_skills::{knowledge::AddLessonLearnedSkill, query::QueryPatternsSkill};
use nexus_skills::integration::HealthCheckExternalSkill;
use nexus_store::{DocumentStore, KnowledgeBase, MemoryStore};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn peers() -> Arc<IntegrationClient> {
    Arc::new(IntegrationClient::new(BTreeMap::new(), Duration::from_millis(200)).unwrap())
}

fn config() -> Arc<NexusConfig> {
    Arc::new(
        NexusConfig::from_vars(vec![(
            ENV_KNOWLEDGE_BASE_REPO.to_string(),
            "acme/knowledge".to_string(),
        )])
        .unwrap(),
    )
}

fn app_with(registry: SkillRegistry, kb: Arc<KnowledgeBase>, auth: AuthContext) -> axum::Router {
    let state = Arc::new(AppState {
        config: config(),
        registry: Arc::new(registry),
        auth: Arc::new(auth),
        kb,
    });
    build_app(state)
}

fn full_app(kb: Arc<KnowledgeBase>, auth: AuthContext) -> axum::Router {
    let registry = build_registry(kb.clone(), peers(), 50).unwrap();
    app_with(registry, kb, auth)
}

fn bearer_for(subject: &str) -> String {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&json!({ "email": subject })).unwrap());
    format!("Bearer {header}.{payload}.sig")
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_execute(
    app: &axum::Router,
    body: Value,
    authorization: Option<&str>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri("/a2a/execute")
        .header("content-type", "application/json");
    if let Some(auth) = authorization {
        request = request.header("authorization", auth);
    }
    let resp = app
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ---------------------------------------------------------------------------
// Scenario 1: register-and-describe
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_and_describe() {
    let kb = Arc::new(KnowledgeBase::new(Arc::new(MemoryStore::new())));
    let mut registry = SkillRegistry::new();
    registry
        .register(Arc::new(QueryPatternsSkill::new(kb.clone())))
        .unwrap();
    registry
        .register(Arc::new(AddLessonLearnedSkill::new(kb.clone())))
        .unwrap();
    registry
        .register(Arc::new(HealthCheckExternalSkill::new(peers())))
        .unwrap();

    let app = app_with(registry, kb, AuthContext::default());
    let (status, card) = get_json(&app, "/.well-known/agent.json").await;
    assert_eq!(status, StatusCode::OK);

    let skills = card["skills"].as_array().unwrap();
    assert_eq!(skills.len(), 3);

    let mut ids: Vec<&str> = skills.iter().map(|s| s["id"].as_str().unwrap()).collect();
    ids.sort_unstable();
    assert_eq!(
        ids,
        vec!["add_lesson_learned", "health_check_external", "query_patterns"]
    );

    for skill in skills {
        let expected = skill["id"] == "add_lesson_learned";
        assert_eq!(
            skill["requires_authentication"], expected,
            "auth flag wrong for {}",
            skill["id"]
        );
    }
}

// ---------------------------------------------------------------------------
// Scenario 2: validation rejection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validation_rejection_names_every_problem() {
    let store = Arc::new(MemoryStore::new());
    let kb = Arc::new(KnowledgeBase::new(store.clone()));
    kb.mutate("seed", |doc| {
        doc.repositories.insert("a/b".into(), RepoRecord::default());
        Ok(())
    })
    .await
    .unwrap();
    let before = store.load().await.unwrap().unwrap().version;

    let app = full_app(kb, AuthContext::new(AuthMode::ServiceAccount, vec![]));
    let (status, body) = post_execute(
        &app,
        json!({
            "skill_id": "add_lesson_learned",
            "input": { "repository": "a/b", "category": "unknown" },
        }),
        Some(&bearer_for("alice@x")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("lesson"));
    assert!(error.contains("context"));
    assert!(error.contains("unknown"));

    // No KB write happened.
    assert_eq!(store.load().await.unwrap().unwrap().version, before);
}

// ---------------------------------------------------------------------------
// Scenario 3: similarity ordering with alphabetical tie-break
// ---------------------------------------------------------------------------

#[tokio::test]
async fn similarity_orders_ties_alphabetically() {
    let kb = Arc::new(KnowledgeBase::new(Arc::new(MemoryStore::new())));
    kb.mutate("seed", |doc| {
        for (id, keywords, patterns) in [
            ("u/x", vec!["retry", "http"], vec!["Retry with backoff"]),
            (
                "u/y",
                vec!["retry", "cache"],
                vec!["Retry with backoff", "LRU cache"],
            ),
            ("u/z", vec!["logging"], vec!["Structured logging"]),
        ] {
            doc.repositories.insert(
                id.into(),
                RepoRecord {
                    latest_patterns: PatternSnapshot {
                        keywords: keywords.into_iter().map(String::from).collect(),
                        patterns: patterns.into_iter().map(String::from).collect(),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            );
        }
        Ok(())
    })
    .await
    .unwrap();

    let app = full_app(kb, AuthContext::default());
    let request = json!({
        "skill_id": "query_patterns",
        "input": { "keywords": ["retry"], "patterns": ["Retry with backoff"] },
    });

    let (status, body) = post_execute(&app, request.clone(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["patterns"][0]["repository"], "u/x");
    assert_eq!(body["patterns"][0]["score"], 2);
    assert_eq!(body["patterns"][1]["repository"], "u/y");
    assert_eq!(body["patterns"][1]["score"], 2);
    assert!(
        !body["patterns"]
            .as_array()
            .unwrap()
            .iter()
            .any(|m| m["repository"] == "u/z")
    );

    // Ranking determinism: a second identical invocation is bit-identical.
    let (_, again) = post_execute(&app, request, None).await;
    assert_eq!(again, body);
}

// ---------------------------------------------------------------------------
// Scenario 4: pattern health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pattern_health_three_quarters() {
    let kb = Arc::new(KnowledgeBase::new(Arc::new(MemoryStore::new())));
    kb.mutate("seed", |doc| {
        for id in ["h/a", "h/b", "h/c", "h/d"] {
            doc.repositories.insert(
                id.into(),
                RepoRecord {
                    latest_patterns: PatternSnapshot {
                        patterns: vec!["Redis caching".into()],
                        ..Default::default()
                    },
                    ..Default::default()
                },
            );
        }
        doc.repositories
            .get_mut("h/b")
            .unwrap()
            .runtime_issues
            .push(RuntimeIssue {
                id: "i-1".into(),
                detected_at: chrono::Utc::now() - chrono::Duration::days(3),
                issue_type: IssueType::Performance,
                severity: IssueSeverity::High,
                service_type: "api".into(),
                logs: "redis timeout".into(),
                root_cause: None,
                fix: None,
                pattern_reference: Some("Redis caching".into()),
                github_issue_url: None,
                status: IssueStatus::Open,
                metrics: None,
                resolution_time: None,
            });
        Ok(())
    })
    .await
    .unwrap();

    let app = full_app(kb, AuthContext::default());
    let (status, body) = post_execute(
        &app,
        json!({
            "skill_id": "get_pattern_health",
            "input": { "pattern_name": "Redis caching", "time_range_days": 30 },
        }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_repos"], 4);
    assert_eq!(body["repos_with_issues"], 1);
    assert_eq!(body["health_score"], 0.75);
    assert!(!body["recommendation"].as_str().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Scenario 5: v1 migration on load
// ---------------------------------------------------------------------------

#[tokio::test]
async fn v1_document_migrates_on_load() {
    let store = Arc::new(MemoryStore::new());
    let v1 = json!({
        "schema_version": "1.0",
        "repositories": {
            "a/b": {
                "patterns": {
                    "patterns": ["Retry with backoff"],
                    "keywords": ["retry"],
                    "problem_domain": "api clients",
                    "commit_sha": "abc123",
                },
                "history": [{
                    "timestamp": "2025-06-01T12:00:00Z",
                    "commit_sha": "abc123",
                    "patterns": ["Retry with backoff"],
                }],
            },
        },
    });
    store.save(&v1.to_string(), "seed", None).await.unwrap();

    let kb = KnowledgeBase::new(store);
    let doc = kb.load().await.unwrap();

    assert_eq!(doc.schema_version, "2.0");
    let record = &doc.repositories["a/b"];
    assert_eq!(record.latest_patterns.patterns, vec!["Retry with backoff"]);
    assert_eq!(record.latest_patterns.keywords, vec!["retry"]);
    assert_eq!(record.deployment, Default::default());
    assert_eq!(record.dependencies, Default::default());
    assert_eq!(record.testing, Default::default());
    assert_eq!(record.security, Default::default());
    assert!(record.runtime_issues.is_empty());
    assert_eq!(record.history.len(), 1);
    assert_eq!(record.history[0].commit_sha, "abc123");
}

// ---------------------------------------------------------------------------
// Scenario 6: service-account auth gate end to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn auth_gate_allows_alice_and_rejects_bob() {
    let kb = Arc::new(KnowledgeBase::new(Arc::new(MemoryStore::new())));
    kb.mutate("seed", |doc| {
        doc.repositories.insert("a/b".into(), RepoRecord::default());
        Ok(())
    })
    .await
    .unwrap();

    let app = full_app(
        kb.clone(),
        AuthContext::new(AuthMode::ServiceAccount, vec!["alice@x".into()]),
    );
    let request = json!({
        "skill_id": "add_lesson_learned",
        "input": {
            "repository": "a/b",
            "category": "reliability",
            "lesson": "set pool timeouts",
            "context": "outage",
        },
    });

    let (status, _body) = post_execute(&app, request.clone(), Some(&bearer_for("bob@x"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let doc = kb.load().await.unwrap();
    assert!(doc.repositories["a/b"].deployment.lessons_learned.is_empty());

    let (status, body) = post_execute(&app, request, Some(&bearer_for("alice@x"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["lesson_id"].as_str().unwrap().starts_with("lesson-"));

    let doc = kb.load().await.unwrap();
    let lessons = &doc.repositories["a/b"].deployment.lessons_learned;
    assert_eq!(lessons.len(), 1);
    assert_eq!(lessons[0].recorded_by.as_deref(), Some("alice@x"));
}

// ---------------------------------------------------------------------------
// Append-only history across mutation skills
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mutations_never_rewrite_history() {
    let kb = Arc::new(KnowledgeBase::new(Arc::new(MemoryStore::new())));
    kb.record_analysis(
        "a/b",
        PatternSnapshot {
            patterns: vec!["Retry with backoff".into()],
            commit_sha: "c1".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let before = kb.load().await.unwrap().repositories["a/b"].history.clone();

    let app = full_app(kb.clone(), AuthContext::new(AuthMode::ServiceAccount, vec![]));
    post_execute(
        &app,
        json!({
            "skill_id": "add_runtime_issue",
            "input": {
                "repository": "a/b",
                "service_type": "api",
                "issue_type": "error",
                "severity": "low",
                "log_snippet": "blip",
            },
        }),
        Some(&bearer_for("monitor@x")),
    )
    .await;

    let after = kb.load().await.unwrap().repositories["a/b"].history.clone();
    assert_eq!(&after[..before.len()], &before[..]);
}
