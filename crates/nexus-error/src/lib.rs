// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy with stable error codes for Dev-Nexus.
//!
//! Every error carries a [`NexusCode`] (a machine-readable, stable string
//! tag), a human-readable message, an optional cause chain, and arbitrary
//! key-value context.  The code determines the HTTP status the dispatcher
//! answers with and whether the caller may retry.  Use the builder returned
//! by [`NexusError::new`] to construct errors fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that a [`NexusCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Input failed a declarative schema check.
    Validation,
    /// Missing or insufficient credentials.
    Auth,
    /// A referenced skill, repository, or issue does not exist.
    NotFound,
    /// The remote knowledge-base store or a peer could not be reached.
    Remote,
    /// A detectable write conflict against the remote store.
    Conflict,
    /// Startup configuration errors.
    Config,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Auth => "auth",
            Self::NotFound => "not_found",
            Self::Remote => "remote",
            Self::Conflict => "conflict",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// NexusCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NexusCode {
    // -- Validation --
    /// Skill input failed its declared JSON schema.
    InputInvalid,

    // -- Auth --
    /// A protected skill was called without valid credentials.
    AuthRequired,
    /// The caller is authenticated but not on the allow-list.
    AuthForbidden,

    // -- NotFound --
    /// The requested skill id is not registered.
    SkillNotFound,
    /// The requested repository is not tracked in the knowledge base.
    RepoNotTracked,
    /// The requested runtime issue id does not exist.
    IssueNotFound,

    // -- Remote --
    /// The remote knowledge-base store could not be reached.
    RemoteUnavailable,
    /// The stored document is not valid JSON or has an unknown schema version.
    DocumentParseFailed,
    /// The external pattern extractor failed or returned garbage.
    ExtractorFailed,
    /// An outbound peer call failed after its retry.
    PeerUnavailable,

    // -- Conflict --
    /// The remote store rejected a save because the version tag was stale.
    RemoteConflict,

    // -- Config --
    /// Startup configuration is missing or malformed.
    ConfigInvalid,

    // -- Internal --
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl NexusCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InputInvalid => ErrorCategory::Validation,

            Self::AuthRequired | Self::AuthForbidden => ErrorCategory::Auth,

            Self::SkillNotFound | Self::RepoNotTracked | Self::IssueNotFound => {
                ErrorCategory::NotFound
            }

            Self::RemoteUnavailable
            | Self::DocumentParseFailed
            | Self::ExtractorFailed
            | Self::PeerUnavailable => ErrorCategory::Remote,

            Self::RemoteConflict => ErrorCategory::Conflict,

            Self::ConfigInvalid => ErrorCategory::Config,

            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"REMOTE_CONFLICT"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputInvalid => "INPUT_INVALID",
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::AuthForbidden => "AUTH_FORBIDDEN",
            Self::SkillNotFound => "SKILL_NOT_FOUND",
            Self::RepoNotTracked => "REPO_NOT_TRACKED",
            Self::IssueNotFound => "ISSUE_NOT_FOUND",
            Self::RemoteUnavailable => "REMOTE_UNAVAILABLE",
            Self::DocumentParseFailed => "DOCUMENT_PARSE_FAILED",
            Self::ExtractorFailed => "EXTRACTOR_FAILED",
            Self::PeerUnavailable => "PEER_UNAVAILABLE",
            Self::RemoteConflict => "REMOTE_CONFLICT",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::Internal => "INTERNAL",
        }
    }

    /// Whether the caller may usefully retry the failed operation.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable | Self::RemoteConflict)
    }

    /// HTTP status the dispatcher answers with for this code.
    ///
    /// Remote and conflict failures in query paths are recovered into a
    /// `success: false` body, so they map to 200 rather than a 5xx.
    pub fn http_status(&self) -> u16 {
        match self.category() {
            ErrorCategory::Validation => 400,
            ErrorCategory::Auth => match self {
                Self::AuthForbidden => 403,
                _ => 401,
            },
            ErrorCategory::NotFound => match self {
                Self::SkillNotFound => 404,
                // Missing repos/issues are a recovered skill-level failure.
                _ => 200,
            },
            ErrorCategory::Remote | ErrorCategory::Conflict => 200,
            ErrorCategory::Config | ErrorCategory::Internal => 500,
        }
    }
}

impl fmt::Display for NexusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// NexusError
// ---------------------------------------------------------------------------

/// Unified Dev-Nexus error.
///
/// Carries a stable [`NexusCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use nexus_error::{NexusError, NexusCode};
///
/// let err = NexusError::new(NexusCode::PeerUnavailable, "probe timed out")
///     .with_context("peer", "orchestrator")
///     .with_context("timeout_ms", 30_000);
/// ```
pub struct NexusError {
    /// Machine-readable error code.
    pub code: NexusCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl NexusError {
    /// Create a new error with the given code and message.
    pub fn new(code: NexusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Shorthand for `self.code.retryable()`.
    pub fn retryable(&self) -> bool {
        self.code.retryable()
    }
}

impl fmt::Debug for NexusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("NexusError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for NexusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for NexusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, NexusError>;

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`NexusError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NexusErrorDto {
    /// Error code.
    pub code: NexusCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&NexusError> for NexusErrorDto {
    fn from(err: &NexusError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<NexusErrorDto> for NexusError {
    fn from(dto: NexusErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
