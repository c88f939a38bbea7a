// SPDX-License-Identifier: MIT OR Apache-2.0
//! nexus-extractor
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Opaque wrapper over the external LLM pattern extractor.
//!
//! The extractor is the only place the system touches a foundation-model
//! vendor, so it hides behind [`PatternExtractor`]: one method, one fixed
//! JSON contract.  Before a request leaves the process, diffs that cannot
//! carry signal (lock files, minified bundles, source maps, caches, vendor
//! trees) are filtered out and the rest is truncated to hard bounds.  A
//! failing extractor never fails the caller: the result degrades to an
//! empty snapshot with an `error` field attached.

use async_trait::async_trait;
use chrono::Utc;
use globset::{Glob, GlobSet, GlobSetBuilder};
use nexus_core::PatternSnapshot;
use nexus_error::{NexusCode, NexusError, Result};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::warn;

/// Maximum changed files sent in one extraction request.
pub const MAX_FILES_PER_EXTRACTION: usize = 10;

/// Maximum diff characters kept per file.
pub const MAX_DIFF_CHARS: usize = 2_000;

/// Default extractor call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Contract types
// ---------------------------------------------------------------------------

/// One changed file in a commit range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedFile {
    /// Path relative to the repository root.
    pub path: String,
    /// Unified diff text for that file.
    pub diff_text: String,
}

/// The extraction request wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Repository id ("owner/name").
    pub repository: String,
    /// Commit the diff was taken at.
    pub commit_sha: String,
    /// Filtered, truncated changed files.
    pub changed_files: Vec<ChangedFile>,
}

/// The extraction result: a pattern snapshot plus an optional error marker
/// when the extractor degraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// The extracted snapshot (empty when degraded).
    #[serde(flatten)]
    pub snapshot: PatternSnapshot,
    /// Set when the extractor failed and the snapshot is a placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    /// The degraded result substituted when the extractor errors.
    pub fn degraded(commit_sha: &str, reason: impl Into<String>) -> Self {
        Self {
            snapshot: PatternSnapshot {
                analyzed_at: Some(Utc::now()),
                commit_sha: commit_sha.to_string(),
                ..Default::default()
            },
            error: Some(reason.into()),
        }
    }
}

/// The extractor seam.  Implementations are expected to be cheap to clone
/// behind an `Arc` and safe to call concurrently.
#[async_trait]
pub trait PatternExtractor: Send + Sync {
    /// Run one extraction.  Implementations must uphold the degraded-result
    /// contract rather than erroring on extractor-side failures; `Err` is
    /// reserved for request-shaping bugs on our side.
    async fn extract(&self, request: ExtractionRequest) -> Result<ExtractionResult>;
}

// ---------------------------------------------------------------------------
// File filtering
// ---------------------------------------------------------------------------

/// Paths whose diffs carry no architectural signal.
static NOISE_PATHS: LazyLock<GlobSet> = LazyLock::new(|| {
    let patterns = [
        // Lock files.
        "**/*.lock",
        "**/package-lock.json",
        "**/yarn.lock",
        "**/pnpm-lock.yaml",
        "**/Cargo.lock",
        "**/poetry.lock",
        "**/go.sum",
        // Minified bundles and source maps.
        "**/*.min.js",
        "**/*.min.css",
        "**/*.map",
        // Compiled caches.
        "**/__pycache__/**",
        "**/*.pyc",
        "**/target/**",
        "**/dist/**",
        "**/build/**",
        // VCS and OS metadata.
        "**/.git/**",
        "**/.DS_Store",
        "**/Thumbs.db",
        // Vendored trees.
        "**/node_modules/**",
        "**/vendor/**",
    ];
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).expect("static glob"));
    }
    builder.build().expect("static glob set")
});

/// Whether a changed file is worth sending to the extractor.
pub fn is_meaningful_path(path: &str) -> bool {
    !NOISE_PATHS.is_match(path)
}

/// Drop noise files, cap the file count, and truncate each diff.
pub fn prepare_changed_files(files: Vec<ChangedFile>) -> Vec<ChangedFile> {
    files
        .into_iter()
        .filter(|f| is_meaningful_path(&f.path))
        .take(MAX_FILES_PER_EXTRACTION)
        .map(|mut f| {
            if f.diff_text.len() > MAX_DIFF_CHARS {
                let mut end = MAX_DIFF_CHARS;
                while !f.diff_text.is_char_boundary(end) {
                    end -= 1;
                }
                f.diff_text.truncate(end);
            }
            f
        })
        .collect()
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// HTTP extractor client.
///
/// Posts the request to the extractor service and expects the fixed result
/// shape back.  One retry on transport errors; none on semantic failures.
pub struct HttpExtractor {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpExtractor {
    /// Build a client for the extractor at `endpoint`.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                NexusError::new(NexusCode::Internal, "failed to build HTTP client").with_source(e)
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    async fn post_once(&self, request: &ExtractionRequest) -> reqwest::Result<reqwest::Response> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder.send().await
    }
}

#[async_trait]
impl PatternExtractor for HttpExtractor {
    async fn extract(&self, mut request: ExtractionRequest) -> Result<ExtractionResult> {
        request.changed_files = prepare_changed_files(std::mem::take(&mut request.changed_files));

        let response = match self.post_once(&request).await {
            Ok(response) => response,
            // One retry, transport errors only.
            Err(first) => {
                warn!(error = %first, "extractor transport error, retrying once");
                match self.post_once(&request).await {
                    Ok(response) => response,
                    Err(second) => {
                        return Ok(ExtractionResult::degraded(
                            &request.commit_sha,
                            format!("extractor unreachable: {second}"),
                        ));
                    }
                }
            }
        };

        if !response.status().is_success() {
            return Ok(ExtractionResult::degraded(
                &request.commit_sha,
                format!("extractor returned status {}", response.status()),
            ));
        }

        match response.json::<PatternSnapshot>().await {
            Ok(snapshot) => Ok(ExtractionResult {
                snapshot,
                error: None,
            }),
            Err(e) => Ok(ExtractionResult::degraded(
                &request.commit_sha,
                format!("extractor returned invalid JSON: {e}"),
            )),
        }
    }
}
