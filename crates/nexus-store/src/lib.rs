// SPDX-License-Identifier: MIT OR Apache-2.0
//! nexus-store
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Persistence for the knowledge document.
//!
//! The backing medium is abstracted behind [`DocumentStore`]: a load/save
//! pair over one remote file, with an opaque [`VersionTag`] so stale writes
//! are detectable.  Production uses [`GitHubStore`] (every save is a commit
//! against the configured repository); tests and the dashboard/CLI
//! collaborators use [`MemoryStore`].  [`KnowledgeBase`] layers parsing,
//! migration, and serialized mutation on top.

/// GitHub contents-API implementation of [`DocumentStore`].
pub mod github;
/// In-memory implementation of [`DocumentStore`].
pub mod memory;

pub use github::GitHubStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::Utc;
use nexus_core::{KnowledgeDocument, PatternSnapshot, SCHEMA_VERSION, SCHEMA_VERSION_V1, migrate};
use nexus_error::{NexusCode, NexusError, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

/// Opaque revision token for the stored file (the blob sha on GitHub, a
/// counter in memory).  Saving with a stale tag is a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag(
    /// The backing store's revision string, opaque to callers.
    pub String,
);

/// The raw stored file plus its revision.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    /// File content, UTF-8 JSON.
    pub content: String,
    /// Revision the content was read at.
    pub version: VersionTag,
}

/// One remote file with compare-and-swap semantics.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the file.  `None` means it does not exist yet.
    async fn load(&self) -> Result<Option<StoredDocument>>;

    /// Write the file, carrying a commit message.
    ///
    /// `expected` is the revision the caller read; `None` asserts a first
    /// write.  A mismatch yields [`NexusCode::RemoteConflict`].
    async fn save(
        &self,
        content: &str,
        message: &str,
        expected: Option<&VersionTag>,
    ) -> Result<VersionTag>;
}

// ---------------------------------------------------------------------------
// KnowledgeBase
// ---------------------------------------------------------------------------

/// Typed access to the knowledge document.
///
/// Reads always re-fetch; there is no in-process long-lived copy.  Writes
/// go through [`KnowledgeBase::mutate`], which serializes concurrent
/// mutations within the process; across processes the store's version tag
/// is the only guard and the last writer wins when it is unsupported.
pub struct KnowledgeBase {
    store: Arc<dyn DocumentStore>,
    write_lock: Mutex<()>,
}

impl KnowledgeBase {
    /// Wrap a document store.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Load the current document, migrated to the current schema.
    ///
    /// A missing file is the empty document, not an error.
    pub async fn load(&self) -> Result<KnowledgeDocument> {
        self.load_with_version().await.map(|(doc, _)| doc)
    }

    async fn load_with_version(&self) -> Result<(KnowledgeDocument, Option<VersionTag>)> {
        match self.store.load().await? {
            None => Ok((KnowledgeDocument::empty(), None)),
            Some(stored) => {
                let doc = parse_document(&stored.content)?;
                Ok((migrate::migrate(doc), Some(stored.version)))
            }
        }
    }

    /// Load, apply `f`, save, the whole cycle under the per-process lock.
    ///
    /// `f` sees the migrated document and returns the value handed back to
    /// the caller.  If `f` errors, nothing is written and the remote copy
    /// is untouched.  A load failure is fatal to the mutation.
    pub async fn mutate<T>(
        &self,
        message: &str,
        f: impl FnOnce(&mut KnowledgeDocument) -> Result<T> + Send,
    ) -> Result<T> {
        let _guard = self.write_lock.lock().await;

        let (mut doc, version) = self.load_with_version().await?;
        let result = f(&mut doc)?;
        doc.last_updated = Some(Utc::now());

        let content = serialize_document(&doc)?;
        let new_version = self
            .store
            .save(&content, message, version.as_ref())
            .await?;
        debug!(commit = message, version = %new_version.0, "knowledge base saved");
        Ok(result)
    }

    /// Record a fresh extraction for `repo_id`: replace `latest_patterns`
    /// and append a history snapshot in a single commit.
    ///
    /// This is the write path of the external analyzer; existing history
    /// entries are never touched.
    pub async fn record_analysis(
        &self,
        repo_id: &str,
        snapshot: PatternSnapshot,
    ) -> Result<()> {
        let message = format!("analysis: {repo_id}");
        self.mutate(&message, move |doc| {
            let record = doc.repositories.entry(repo_id.to_string()).or_default();
            record.history.push(nexus_core::HistoryEntry {
                timestamp: Utc::now(),
                commit_sha: snapshot.commit_sha.clone(),
                patterns: snapshot.patterns.clone(),
            });
            record.latest_patterns = snapshot;
            Ok(())
        })
        .await
    }
}

/// Parse the stored file, rejecting unknown schema versions.
pub fn parse_document(content: &str) -> Result<KnowledgeDocument> {
    let doc: KnowledgeDocument = serde_json::from_str(content).map_err(|e| {
        NexusError::new(
            NexusCode::DocumentParseFailed,
            "knowledge base file is not valid JSON",
        )
        .with_source(e)
    })?;

    if doc.schema_version != SCHEMA_VERSION && doc.schema_version != SCHEMA_VERSION_V1 {
        return Err(NexusError::new(
            NexusCode::DocumentParseFailed,
            format!("unknown schema version '{}'", doc.schema_version),
        )
        .with_context("schema_version", &doc.schema_version));
    }
    Ok(doc)
}

fn serialize_document(doc: &KnowledgeDocument) -> Result<String> {
    serde_json::to_string_pretty(doc).map_err(|e| {
        NexusError::new(NexusCode::Internal, "knowledge base serialization failed").with_source(e)
    })
}
