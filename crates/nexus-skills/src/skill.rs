// SPDX-License-Identifier: MIT OR Apache-2.0
//! The skill abstraction.

use async_trait::async_trait;
use nexus_auth::Identity;
use nexus_error::{NexusCode, NexusError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A worked example attached to a skill's descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillExample {
    /// Example input for the skill.
    pub input: Value,
    /// What the example demonstrates.
    pub description: String,
}

/// A named, schema-validated, optionally authenticated operation.
///
/// Skills are instantiated once at startup with the dependencies they need
/// and live behind `Arc<dyn Skill>` in the registry.  `execute` receives
/// input that already passed the declared schema; its output is always a
/// JSON object, and the dispatcher adds the `success` envelope semantics
/// for errors.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Unique skill identifier; duplicate ids are a fatal startup error.
    fn id(&self) -> &'static str;

    /// Human-readable skill name.
    fn name(&self) -> &'static str;

    /// One-sentence description for the AgentCard.
    fn description(&self) -> &'static str;

    /// Discovery tags.
    fn tags(&self) -> &'static [&'static str] {
        &[]
    }

    /// JSON-schema fragment the input must satisfy.
    fn input_schema(&self) -> Value;

    /// Whether callers must be authenticated.
    fn requires_authentication(&self) -> bool {
        false
    }

    /// Worked examples for the AgentCard.
    fn examples(&self) -> Vec<SkillExample> {
        Vec::new()
    }

    /// Execute with schema-validated input.
    async fn execute(&self, input: Value, identity: &Identity) -> Result<Value>;
}

/// Wrap a skill payload in the success envelope.
///
/// `payload` must serialize to a JSON object; `success: true` is inserted
/// unless the skill already set it.
pub(crate) fn success(payload: Value) -> Value {
    let mut payload = payload;
    if let Some(object) = payload.as_object_mut() {
        object
            .entry("success")
            .or_insert(Value::Bool(true));
    }
    payload
}

/// Deserialize validated input into a skill's request type.
///
/// Inputs have already passed schema validation, so a failure here is an
/// input the schema was too loose for; it is still reported as a validation
/// error, never an internal one.
pub(crate) fn parse_input<T: serde::de::DeserializeOwned>(input: Value) -> Result<T> {
    serde_json::from_value(input).map_err(|e| {
        NexusError::new(NexusCode::InputInvalid, format!("invalid input: {e}"))
    })
}

/// The canonical missing-repository error.
pub(crate) fn repo_not_tracked(repository: &str) -> NexusError {
    NexusError::new(NexusCode::RepoNotTracked, "repository not tracked")
        .with_context("repository", repository)
}

/// Fetch the repository record or fail with the canonical error.
pub(crate) fn require_repo<'a>(
    doc: &'a nexus_core::KnowledgeDocument,
    repository: &str,
) -> Result<&'a nexus_core::RepoRecord> {
    doc.repositories
        .get(repository)
        .ok_or_else(|| repo_not_tracked(repository))
}

/// Mutable variant of [`require_repo`].
pub(crate) fn require_repo_mut<'a>(
    doc: &'a mut nexus_core::KnowledgeDocument,
    repository: &str,
) -> Result<&'a mut nexus_core::RepoRecord> {
    doc.repositories
        .get_mut(repository)
        .ok_or_else(|| repo_not_tracked(repository))
}

/// Load the document for a read-only query, degrading to the empty
/// document when the remote store is unreachable.
///
/// Returns the document and whether it is degraded; callers set a
/// `degraded: true` flag on their response instead of failing.
pub(crate) async fn load_for_query(
    kb: &nexus_store::KnowledgeBase,
) -> Result<(nexus_core::KnowledgeDocument, bool)> {
    match kb.load().await {
        Ok(doc) => Ok((doc, false)),
        Err(err) if err.code == NexusCode::RemoteUnavailable => {
            tracing::warn!(error = %err, "knowledge base unreachable, serving degraded result");
            Ok((nexus_core::KnowledgeDocument::empty(), true))
        }
        Err(err) => Err(err),
    }
}

/// Attach the degraded flag to a query response when set.
pub(crate) fn with_degraded(mut payload: Value, degraded: bool) -> Value {
    if degraded && let Some(object) = payload.as_object_mut() {
        object.insert("degraded".into(), Value::Bool(true));
    }
    payload
}

/// Shorthand for an empty JSON object schema with the given properties and
/// required list.
pub(crate) fn object_schema(properties: Value, required: &[&str]) -> Value {
    let mut schema = json!({
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}
