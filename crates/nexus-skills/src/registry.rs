// SPDX-License-Identifier: MIT OR Apache-2.0
//! Skill registry and AgentCard synthesis.
//!
//! The registry is an ordered mapping built once at startup; registration
//! of a duplicate id is fatal.  The AgentCard is a pure function of the
//! registry and the service's public URL, recomputed on demand so it can
//! never drift from what is actually registered.

use crate::skill::{Skill, SkillExample};
use nexus_error::{NexusCode, NexusError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

/// Service name advertised in the AgentCard.
pub const SERVICE_NAME: &str = "dev-nexus";

/// Service version advertised in the AgentCard and health responses.
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered collection of skills with unique ids.
#[derive(Default)]
pub struct SkillRegistry {
    skills: Vec<Arc<dyn Skill>>,
    index: HashMap<&'static str, usize>,
}

impl SkillRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skill, preserving registration order.
    ///
    /// A duplicate id is a configuration error; startup aborts on it.
    pub fn register(&mut self, skill: Arc<dyn Skill>) -> Result<()> {
        let id = skill.id();
        if self.index.contains_key(id) {
            return Err(NexusError::new(
                NexusCode::ConfigInvalid,
                format!("duplicate skill id '{id}'"),
            ));
        }
        self.index.insert(id, self.skills.len());
        self.skills.push(skill);
        Ok(())
    }

    /// Look up a skill by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Skill>> {
        self.index.get(id).map(|&i| self.skills[i].clone())
    }

    /// Iterate skills in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Skill>> {
        self.skills.iter()
    }

    /// All skill ids, in registration order.
    pub fn skill_ids(&self) -> Vec<&'static str> {
        self.skills.iter().map(|s| s.id()).collect()
    }

    /// Number of registered skills.
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Synthesize the AgentCard served at `/.well-known/agent.json`.
    pub fn agent_card(&self, url: &str) -> AgentCard {
        AgentCard {
            name: SERVICE_NAME.to_string(),
            description: "Multi-tenant knowledge base for software-engineering patterns, \
                          exposed over the A2A protocol"
                .to_string(),
            version: SERVICE_VERSION.to_string(),
            url: url.to_string(),
            capabilities: AgentCapabilities::default(),
            skills: self.skills.iter().map(|s| describe(s.as_ref())).collect(),
            metadata: json!({
                "protocol": "a2a",
                "skills_registered": self.skills.len(),
            }),
        }
    }
}

fn describe(skill: &dyn Skill) -> SkillDescriptor {
    SkillDescriptor {
        id: skill.id().to_string(),
        name: skill.name().to_string(),
        description: skill.description().to_string(),
        tags: skill.tags().iter().map(|t| t.to_string()).collect(),
        requires_authentication: skill.requires_authentication(),
        input_schema: skill.input_schema(),
        examples: skill.examples(),
    }
}

// ---------------------------------------------------------------------------
// AgentCard
// ---------------------------------------------------------------------------

/// Capability flags advertised for discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCapabilities {
    /// Whether responses can stream.  They cannot.
    pub streaming: bool,
    /// Whether multi-modal input is accepted.  It is not.
    pub multimodal: bool,
    /// How authentication is applied across skills.
    pub authentication: String,
}

impl Default for AgentCapabilities {
    fn default() -> Self {
        Self {
            streaming: false,
            multimodal: false,
            authentication: "optional".to_string(),
        }
    }
}

/// One skill's entry in the AgentCard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDescriptor {
    /// Skill id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// One-sentence description.
    pub description: String,
    /// Discovery tags.
    pub tags: Vec<String>,
    /// Whether the dispatcher demands authentication.
    pub requires_authentication: bool,
    /// The declared input schema, verbatim.
    pub input_schema: Value,
    /// Worked examples.
    #[serde(default)]
    pub examples: Vec<SkillExample>,
}

/// The capability descriptor served at `/.well-known/agent.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCard {
    /// Service name.
    pub name: String,
    /// Service description.
    pub description: String,
    /// Service version.
    pub version: String,
    /// Public base URL of this service.
    pub url: String,
    /// Capability flags.
    pub capabilities: AgentCapabilities,
    /// Every registered skill, in registration order.
    pub skills: Vec<SkillDescriptor>,
    /// Free-form service metadata.
    pub metadata: Value,
}
