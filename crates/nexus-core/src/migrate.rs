// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory schema migration.
//!
//! A v1 document keeps each repository's extraction snapshot under a
//! `patterns` key and predates the deployment, dependency, testing,
//! security, and runtime-issue sections.  [`migrate`] lifts such a document
//! to the current shape; it is a pure function and idempotent, so callers
//! can apply it unconditionally after every load.

use crate::{KnowledgeDocument, SCHEMA_VERSION};
use chrono::Utc;

/// Lift a document to schema v2.
///
/// A document already at [`SCHEMA_VERSION`] is returned untouched.  For
/// anything else: each repository's legacy `patterns` snapshot moves to
/// `latest_patterns`, the sections v1 lacked stay at their defaults,
/// `history` is preserved verbatim, and the version and `last_updated`
/// stamps are set.
pub fn migrate(mut doc: KnowledgeDocument) -> KnowledgeDocument {
    if doc.schema_version == SCHEMA_VERSION {
        return doc;
    }

    for record in doc.repositories.values_mut() {
        if let Some(legacy) = record.legacy_patterns.take() {
            record.latest_patterns = legacy;
        }
    }

    doc.schema_version = SCHEMA_VERSION.to_string();
    doc.last_updated = Some(Utc::now());
    doc
}
