// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory [`DocumentStore`] with the same compare-and-swap behavior as
//! the remote implementation.  Used by tests and by the dashboard/CLI
//! collaborators that share the store layer without going through HTTP.

use crate::{DocumentStore, StoredDocument, VersionTag};
use async_trait::async_trait;
use nexus_error::{NexusCode, NexusError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    content: Option<String>,
    revision: u64,
}

/// Map-backed store with a monotonic revision counter.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`NexusCode::RemoteUnavailable`],
    /// for exercising degraded paths.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(NexusError::new(
                NexusCode::RemoteUnavailable,
                "memory store marked unavailable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self) -> Result<Option<StoredDocument>> {
        self.check_available()?;
        let inner = self.inner.lock().await;
        Ok(inner.content.as_ref().map(|content| StoredDocument {
            content: content.clone(),
            version: VersionTag(inner.revision.to_string()),
        }))
    }

    async fn save(
        &self,
        content: &str,
        _message: &str,
        expected: Option<&VersionTag>,
    ) -> Result<VersionTag> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;

        let current = inner
            .content
            .is_some()
            .then(|| VersionTag(inner.revision.to_string()));
        if expected != current.as_ref() {
            return Err(NexusError::new(
                NexusCode::RemoteConflict,
                "version tag does not match stored revision",
            )
            .with_context("expected", expected.map(|v| v.0.clone()))
            .with_context("current", current.map(|v| v.0)));
        }

        inner.content = Some(content.to_string());
        inner.revision += 1;
        Ok(VersionTag(inner.revision.to_string()))
    }
}
