// SPDX-License-Identifier: MIT OR Apache-2.0
//! nexus-skills
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The typed capability plane of Dev-Nexus.
//!
//! A [`Skill`] declares its id, metadata, a JSON-schema fragment for its
//! input, and whether it requires authentication; the [`SkillRegistry`]
//! holds every skill instantiated at startup and synthesizes the AgentCard
//! served for discovery.  The concrete skills live in one module per
//! family.

/// Skills around documentation standards.
pub mod docs;
/// Outbound integration skills.
pub mod integration;
/// Authenticated knowledge-management skills.
pub mod knowledge;
/// Public pattern-query skills.
pub mod query;
/// Skill registry and AgentCard synthesis.
pub mod registry;
/// Public repository-information skills.
pub mod repos;
/// Runtime-issue monitoring skills.
pub mod runtime;
/// Core skill abstraction.
pub mod skill;
/// Declarative JSON-schema input validation.
pub mod validate;

pub use registry::{
    AgentCapabilities, AgentCard, SERVICE_NAME, SERVICE_VERSION, SkillDescriptor, SkillRegistry,
};
pub use skill::{Skill, SkillExample};
pub use validate::validate_input;

use nexus_error::Result;
use nexus_peers::IntegrationClient;
use nexus_store::KnowledgeBase;
use std::sync::Arc;

/// Instantiate every skill once and register it, in a fixed order.
///
/// This is the explicit construction list the dispatcher serves: the
/// registry is built at startup, rejects duplicate ids fatally, and is
/// immutable thereafter.
pub fn build_registry(
    kb: Arc<KnowledgeBase>,
    peers: Arc<IntegrationClient>,
    max_history_entries: usize,
) -> Result<SkillRegistry> {
    let mut registry = SkillRegistry::new();

    // Family A: pattern query.
    registry.register(Arc::new(query::QueryPatternsSkill::new(kb.clone())))?;
    registry.register(Arc::new(query::CrossRepoPatternsSkill::new(kb.clone())))?;
    registry.register(Arc::new(query::SimilarRepositoriesSkill::new(kb.clone())))?;

    // Family B: repository info.
    registry.register(Arc::new(repos::RepositoryListSkill::new(kb.clone())))?;
    registry.register(Arc::new(repos::DeploymentInfoSkill::new(
        kb.clone(),
        max_history_entries,
    )))?;

    // Family C: knowledge management.
    registry.register(Arc::new(knowledge::AddLessonLearnedSkill::new(kb.clone())))?;
    registry.register(Arc::new(knowledge::UpdateDependencyInfoSkill::new(
        kb.clone(),
    )))?;

    // Family D: integration.
    registry.register(Arc::new(integration::HealthCheckExternalSkill::new(peers)))?;

    // Family E: documentation standards.
    registry.register(Arc::new(docs::CheckDocumentationStandardsSkill::new(
        kb.clone(),
    )))?;
    registry.register(Arc::new(docs::ValidateDocumentationUpdateSkill::new(
        kb.clone(),
    )))?;

    // Family F: runtime monitoring.
    registry.register(Arc::new(runtime::AddRuntimeIssueSkill::new(kb.clone())))?;
    registry.register(Arc::new(runtime::QueryKnownIssuesSkill::new(kb.clone())))?;
    registry.register(Arc::new(runtime::PatternHealthSkill::new(kb.clone())))?;
    registry.register(Arc::new(runtime::UpdateIssueStatusSkill::new(kb.clone())))?;
    registry.register(Arc::new(runtime::UpdateProductionMetricsSkill::new(kb)))?;

    Ok(registry)
}
