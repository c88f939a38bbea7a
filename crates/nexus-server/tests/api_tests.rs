// SPDX-License-Identifier: MIT OR Apache-2.0
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL};
use http_body_util::BodyExt;
use nexus_auth::{AuthContext, AuthMode};
use nexus_config::{ENV_KNOWLEDGE_BASE_REPO, NexusConfig};
use nexus_core::RepoRecord;
use nexus_peers::IntegrationClient;
use nexus_server::{AppState, build_app};
use nexus_skills::build_registry;
use nexus_store::{KnowledgeBase, MemoryStore};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_config() -> NexusConfig {
    NexusConfig::from_vars(vec![(
        ENV_KNOWLEDGE_BASE_REPO.to_string(),
        "acme/knowledge".to_string(),
    )])
    .unwrap()
}

struct Harness {
    store: Arc<MemoryStore>,
    kb: Arc<KnowledgeBase>,
    app: axum::Router,
}

fn harness_with(mode: AuthMode, allow_list: Vec<String>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let kb = Arc::new(KnowledgeBase::new(store.clone()));
    let peers = Arc::new(
        IntegrationClient::new(BTreeMap::new(), Duration::from_millis(200)).unwrap(),
    );
    let config = Arc::new(test_config());
    let registry = Arc::new(
        build_registry(kb.clone(), peers, config.limits.max_history_entries).unwrap(),
    );
    let state = Arc::new(AppState {
        config,
        registry,
        auth: Arc::new(AuthContext::new(mode, allow_list)),
        kb: kb.clone(),
    });
    Harness {
        store,
        kb,
        app: build_app(state),
    }
}

fn harness() -> Harness {
    harness_with(AuthMode::ServiceAccount, vec![])
}

fn bearer_for(subject: &str) -> String {
    let header = BASE64_URL.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = BASE64_URL.encode(
        serde_json::to_vec(&json!({ "email": subject })).unwrap(),
    );
    format!("Bearer {header}.{payload}.sig")
}

async fn seed_repo(kb: &KnowledgeBase, id: &str) {
    let id = id.to_string();
    kb.mutate("seed", move |doc| {
        doc.repositories.insert(id, RepoRecord::default());
        Ok(())
    })
    .await
    .unwrap();
}

async fn execute(
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
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

// ---------------------------------------------------------------------------
// Discovery and liveness
// ---------------------------------------------------------------------------

#[tokio::test]
async fn root_summarizes_the_service() {
    let h = harness();
    let (status, body) = get(&h.app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "dev-nexus");
    assert_eq!(body["skills_registered"], 15);
    assert!(
        body["skills"]
            .as_array()
            .unwrap()
            .iter()
            .any(|s| s == "query_patterns")
    );
    assert_eq!(body["endpoints"]["execute"], "/a2a/execute");
}

#[tokio::test]
async fn health_reports_accessible_knowledge_base() {
    let h = harness();
    let (status, body) = get(&h.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["knowledge_base_accessible"], true);
}

#[tokio::test]
async fn health_stays_200_when_store_is_down() {
    let h = harness();
    h.store.set_unavailable(true);
    let (status, body) = get(&h.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["knowledge_base_accessible"], false);
}

#[tokio::test]
async fn agent_card_lists_every_skill_once() {
    let h = harness();
    let (status, body) = get(&h.app, "/.well-known/agent.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["capabilities"]["streaming"], false);
    assert_eq!(body["capabilities"]["multimodal"], false);

    let skills = body["skills"].as_array().unwrap();
    assert_eq!(skills.len(), 15);
    let mut ids: Vec<&str> = skills.iter().map(|s| s["id"].as_str().unwrap()).collect();
    let before = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), before, "duplicate ids in AgentCard");
}

// ---------------------------------------------------------------------------
// Execute: lookup, auth, validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_skill_id_is_rejected() {
    let h = harness();
    let (status, body) = execute(&h.app, json!({ "input": {} }), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unknown_skill_is_404_with_catalog() {
    let h = harness();
    let (status, body) =
        execute(&h.app, json!({ "skill_id": "not_a_skill", "input": {} }), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(
        body["available_skills"]
            .as_array()
            .unwrap()
            .iter()
            .any(|s| s == "get_pattern_health")
    );
}

#[tokio::test]
async fn public_skill_executes_without_credentials() {
    let h = harness();
    let (status, body) = execute(
        &h.app,
        json!({ "skill_id": "query_patterns", "input": { "keywords": ["retry"] } }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn protected_skill_without_credentials_is_401_and_writes_nothing() {
    let h = harness();
    seed_repo(&h.kb, "a/b").await;

    let (status, body) = execute(
        &h.app,
        json!({
            "skill_id": "add_lesson_learned",
            "input": {
                "repository": "a/b",
                "category": "security",
                "lesson": "rotate tokens",
                "context": "incident",
            },
        }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("add_lesson_learned"));

    let doc = h.kb.load().await.unwrap();
    assert!(doc.repositories["a/b"].deployment.lessons_learned.is_empty());
}

#[tokio::test]
async fn allow_listed_subject_can_write() {
    let h = harness_with(AuthMode::ServiceAccount, vec!["alice@x".into()]);
    seed_repo(&h.kb, "a/b").await;

    let (status, body) = execute(
        &h.app,
        json!({
            "skill_id": "add_lesson_learned",
            "input": {
                "repository": "a/b",
                "category": "security",
                "lesson": "rotate tokens",
                "context": "incident",
            },
        }),
        Some(&bearer_for("alice@x")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["lesson_id"].as_str().unwrap().starts_with("lesson-"));

    let doc = h.kb.load().await.unwrap();
    assert_eq!(doc.repositories["a/b"].deployment.lessons_learned.len(), 1);
}

#[tokio::test]
async fn unlisted_subject_is_403_and_writes_nothing() {
    let h = harness_with(AuthMode::ServiceAccount, vec!["alice@x".into()]);
    seed_repo(&h.kb, "a/b").await;

    let (status, body) = execute(
        &h.app,
        json!({
            "skill_id": "add_lesson_learned",
            "input": {
                "repository": "a/b",
                "category": "security",
                "lesson": "rotate tokens",
                "context": "incident",
            },
        }),
        Some(&bearer_for("bob@x")),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let doc = h.kb.load().await.unwrap();
    assert!(doc.repositories["a/b"].deployment.lessons_learned.is_empty());
}

#[tokio::test]
async fn schema_violations_are_400_before_execution() {
    let h = harness();
    seed_repo(&h.kb, "a/b").await;

    let (status, body) = execute(
        &h.app,
        json!({
            "skill_id": "add_lesson_learned",
            "input": { "repository": "a/b", "category": "unknown" },
        }),
        Some(&bearer_for("alice@x")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    let violations = body["violations"].as_array().unwrap();
    assert!(violations.iter().any(|v| v.as_str().unwrap().contains("lesson")));
    assert!(violations.iter().any(|v| v.as_str().unwrap().contains("context")));
    assert!(violations.iter().any(|v| v.as_str().unwrap().contains("unknown")));

    let doc = h.kb.load().await.unwrap();
    assert!(doc.repositories["a/b"].deployment.lessons_learned.is_empty());
}

#[tokio::test]
async fn recovered_skill_failure_is_200_with_failure_envelope() {
    let h = harness();
    let (status, body) = execute(
        &h.app,
        json!({
            "skill_id": "get_deployment_info",
            "input": { "repository": "nobody/home" },
        }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "repository not tracked");
}

#[tokio::test]
async fn mutation_against_unreachable_store_is_retryable() {
    let h = harness();
    seed_repo(&h.kb, "a/b").await;
    h.store.set_unavailable(true);

    let (status, body) = execute(
        &h.app,
        json!({
            "skill_id": "add_lesson_learned",
            "input": {
                "repository": "a/b",
                "category": "cost",
                "lesson": "x",
                "context": "y",
            },
        }),
        Some(&bearer_for("alice@x")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["retryable"], true);
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_is_an_acknowledging_stub() {
    let h = harness();
    let (status, body) = execute_cancel(&h.app, json!({ "task_id": "task-9" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "cancelled");
    assert_eq!(body["task_id"], "task-9");
}

#[tokio::test]
async fn cancel_requires_task_id() {
    let h = harness();
    let (status, body) = execute_cancel(&h.app, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

async fn execute_cancel(app: &axum::Router, body: Value) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/a2a/cancel")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ---------------------------------------------------------------------------
// Request deadline
// ---------------------------------------------------------------------------

struct SlowSkill;

#[async_trait::async_trait]
impl nexus_skills::Skill for SlowSkill {
    fn id(&self) -> &'static str {
        "slow_skill"
    }
    fn name(&self) -> &'static str {
        "Slow Skill"
    }
    fn description(&self) -> &'static str {
        "sleeps past the request deadline"
    }
    fn input_schema(&self) -> Value {
        json!({ "type": "object" })
    }
    async fn execute(
        &self,
        _input: Value,
        _identity: &nexus_auth::Identity,
    ) -> nexus_error::Result<Value> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(json!({ "success": true }))
    }
}

#[tokio::test]
async fn expired_deadline_is_504() {
    let mut config = test_config();
    config.limits.request_deadline_secs = 1;

    let kb = Arc::new(KnowledgeBase::new(Arc::new(MemoryStore::new())));
    let mut registry = nexus_skills::SkillRegistry::new();
    registry.register(Arc::new(SlowSkill)).unwrap();

    let state = Arc::new(AppState {
        config: Arc::new(config),
        registry: Arc::new(registry),
        auth: Arc::new(AuthContext::new(AuthMode::Public, vec![])),
        kb,
    });
    let app = build_app(state);

    let (status, body) =
        execute(&app, json!({ "skill_id": "slow_skill", "input": {} }), None).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["success"], false);
    assert_eq!(body["retryable"], true);
}

// ---------------------------------------------------------------------------
// Request id propagation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn responses_carry_a_request_id_header() {
    let h = harness();
    let resp = h
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let header = resp.headers().get("x-request-id").unwrap();
    assert!(uuid::Uuid::parse_str(header.to_str().unwrap()).is_ok());
}
