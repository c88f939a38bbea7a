// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading and validation for Dev-Nexus.
//!
//! This crate provides [`NexusConfig`], the immutable process-wide settings
//! assembled once at startup, together with helpers for building it from
//! environment variables and producing advisory [`ConfigWarning`]s.  The
//! parsing core is pure ([`NexusConfig::from_vars`]) so tests never touch
//! the process environment.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use nexus_auth::AuthMode;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is absent.
    #[error("missing required configuration: {key}")]
    MissingRequired {
        /// The variable that was expected.
        key: String,
    },

    /// A variable is present but malformed.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// The offending variable.
        key: String,
        /// Human-readable detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A recommended optional variable is missing.
    MissingOptionalField {
        /// Name of the missing variable.
        field: String,
        /// Why it matters.
        hint: String,
    },

    /// An allow-list was configured but the auth mode never authenticates.
    AllowListIgnored {
        /// The configured mode.
        mode: AuthMode,
    },

    /// A peer has no base URL and is therefore disabled.
    PeerDisabled {
        /// Peer name.
        peer: String,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional variable '{field}': {hint}")
            }
            ConfigWarning::AllowListIgnored { mode } => {
                write!(
                    f,
                    "ALLOWED_SERVICE_ACCOUNTS has no effect in auth mode '{mode}'"
                )
            }
            ConfigWarning::PeerDisabled { peer } => {
                write!(f, "peer '{peer}' has no URL configured and is disabled")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Environment keys
// ---------------------------------------------------------------------------

/// Remote repository holding the knowledge-base file ("owner/name").
pub const ENV_KNOWLEDGE_BASE_REPO: &str = "KNOWLEDGE_BASE_REPO";
/// Path of the knowledge-base file inside that repository.
pub const ENV_KNOWLEDGE_BASE_FILE: &str = "KNOWLEDGE_BASE_FILE";
/// Credential for the remote repository client.
pub const ENV_REMOTE_TOKEN: &str = "REMOTE_TOKEN";
/// Credential for the external pattern extractor.
pub const ENV_EXTRACTOR_API_KEY: &str = "EXTRACTOR_API_KEY";
/// Trust mode: public, workload_identity, or service_account.
pub const ENV_AUTH_MODE: &str = "AUTH_MODE";
/// Comma-separated subject allow-list for protected skills.
pub const ENV_ALLOWED_SERVICE_ACCOUNTS: &str = "ALLOWED_SERVICE_ACCOUNTS";
/// Orchestrator peer base URL.
pub const ENV_ORCHESTRATOR_URL: &str = "ORCHESTRATOR_URL";
/// Miner peer base URL.
pub const ENV_MINER_URL: &str = "MINER_URL";
/// Log-attacker peer base URL.
pub const ENV_LOG_ATTACKER_URL: &str = "LOG_ATTACKER_URL";
/// Comma-separated `peer=token` pairs for outbound bearer auth.
pub const ENV_PEER_TOKENS: &str = "PEER_TOKENS";
/// Public URL advertised in the AgentCard.
pub const ENV_HOST_OVERRIDE: &str = "HOST_OVERRIDE";
/// Listening port.
pub const ENV_PORT: &str = "PORT";
/// Comma-separated allowed CORS origins; unset means permissive.
pub const ENV_CORS_ORIGINS: &str = "CORS_ORIGINS";

/// Default knowledge-base file path within the remote repository.
pub const DEFAULT_KNOWLEDGE_BASE_FILE: &str = "knowledge_base.json";

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Bounded-resource knobs.  These have fixed defaults rather than
/// environment bindings; tests lower them directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeLimits {
    /// Concurrent in-flight HTTP requests before the service sheds load.
    pub max_in_flight: usize,
    /// Whole-request deadline in seconds.
    pub request_deadline_secs: u64,
    /// Knowledge-base I/O timeout in seconds.
    pub kb_io_timeout_secs: u64,
    /// Extractor call timeout in seconds.
    pub extractor_timeout_secs: u64,
    /// Peer A2A call timeout in seconds.
    pub peer_timeout_secs: u64,
    /// Maximum history entries returned in a single call.
    pub max_history_entries: usize,
}

impl Default for RuntimeLimits {
    fn default() -> Self {
        Self {
            max_in_flight: 80,
            request_deadline_secs: 300,
            kb_io_timeout_secs: 30,
            extractor_timeout_secs: 60,
            peer_timeout_secs: 30,
            max_history_entries: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Top-level runtime configuration, built once at startup and immutable
/// thereafter.  Sub-components receive only the fields they need.
#[derive(Debug, Clone, PartialEq)]
pub struct NexusConfig {
    /// Remote repository "owner/name" holding the knowledge-base file.
    pub knowledge_base_repo: String,

    /// Path of the knowledge-base file inside that repository.
    pub knowledge_base_file: String,

    /// Credential for the remote repository client.
    pub remote_token: Option<String>,

    /// Credential for the external pattern extractor.
    pub extractor_api_key: Option<String>,

    /// Trust mode for inbound callers.
    pub auth_mode: AuthMode,

    /// Subject allow-list for protected skills; empty accepts any
    /// authenticated subject.
    pub allowed_service_accounts: Vec<String>,

    /// Orchestrator peer base URL; `None` disables the peer.
    pub orchestrator_url: Option<String>,

    /// Miner peer base URL; `None` disables the peer.
    pub miner_url: Option<String>,

    /// Log-attacker peer base URL; `None` disables the peer.
    pub log_attacker_url: Option<String>,

    /// Outbound bearer tokens keyed by peer name.
    pub peer_tokens: BTreeMap<String, String>,

    /// Public URL advertised in the AgentCard, when behind a proxy.
    pub host_override: Option<String>,

    /// Listening port.
    pub port: u16,

    /// Allowed CORS origins; `None` means permissive.
    pub cors_origins: Option<Vec<String>>,

    /// Bounded-resource knobs.
    pub limits: RuntimeLimits,
}

impl NexusConfig {
    /// Build a configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Build a configuration from an explicit variable set.
    ///
    /// This is the pure core of [`Self::from_env`]; tests pass maps instead
    /// of mutating the process environment.
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self, ConfigError> {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        let get = |key: &str| vars.get(key).map(|v| v.trim().to_string());

        let knowledge_base_repo =
            get(ENV_KNOWLEDGE_BASE_REPO).ok_or_else(|| ConfigError::MissingRequired {
                key: ENV_KNOWLEDGE_BASE_REPO.into(),
            })?;

        let auth_mode = match get(ENV_AUTH_MODE) {
            Some(raw) => raw
                .parse::<AuthMode>()
                .map_err(|reason| ConfigError::InvalidValue {
                    key: ENV_AUTH_MODE.into(),
                    reason,
                })?,
            None => AuthMode::default(),
        };

        let port = match get(ENV_PORT) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: ENV_PORT.into(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let peer_tokens = match get(ENV_PEER_TOKENS) {
            Some(raw) => parse_peer_tokens(&raw)?,
            None => BTreeMap::new(),
        };

        Ok(Self {
            knowledge_base_repo,
            knowledge_base_file: get(ENV_KNOWLEDGE_BASE_FILE)
                .unwrap_or_else(|| DEFAULT_KNOWLEDGE_BASE_FILE.into()),
            remote_token: get(ENV_REMOTE_TOKEN),
            extractor_api_key: get(ENV_EXTRACTOR_API_KEY),
            auth_mode,
            allowed_service_accounts: get(ENV_ALLOWED_SERVICE_ACCOUNTS)
                .map(|raw| split_csv(&raw))
                .unwrap_or_default(),
            orchestrator_url: get(ENV_ORCHESTRATOR_URL),
            miner_url: get(ENV_MINER_URL),
            log_attacker_url: get(ENV_LOG_ATTACKER_URL),
            peer_tokens,
            host_override: get(ENV_HOST_OVERRIDE),
            port,
            cors_origins: get(ENV_CORS_ORIGINS).map(|raw| split_csv(&raw)),
            limits: RuntimeLimits::default(),
        })
    }

    /// The URL published in the AgentCard.
    pub fn public_url(&self) -> String {
        match &self.host_override {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }
}

/// Split a comma-separated value, dropping empty segments.
fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Parse `peer=token` pairs out of `PEER_TOKENS`.
fn parse_peer_tokens(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut tokens = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((peer, token)) = pair.split_once('=') else {
            return Err(ConfigError::InvalidValue {
                key: ENV_PEER_TOKENS.into(),
                reason: format!("expected 'peer=token', got '{pair}'"),
            });
        };
        tokens.insert(peer.trim().to_string(), token.trim().to_string());
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (malformed repo id, zero limits) come back as a
/// [`ConfigError::ValidationError`]; soft issues come back as warnings.
pub fn validate_config(config: &NexusConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if !is_repo_id(&config.knowledge_base_repo) {
        errors.push(format!(
            "{ENV_KNOWLEDGE_BASE_REPO} must be 'owner/name', got '{}'",
            config.knowledge_base_repo
        ));
    }

    if config.knowledge_base_file.trim().is_empty() {
        errors.push(format!("{ENV_KNOWLEDGE_BASE_FILE} must not be blank"));
    }

    if config.limits.max_in_flight == 0 {
        errors.push("limits.max_in_flight must be at least 1".into());
    }
    if config.limits.request_deadline_secs == 0 {
        errors.push("limits.request_deadline_secs must be at least 1".into());
    }

    for peer in config.peer_tokens.keys() {
        if peer_url(config, peer).is_none() && known_peer(peer) {
            warnings.push(ConfigWarning::PeerDisabled { peer: peer.clone() });
        }
        if !known_peer(peer) {
            errors.push(format!("{ENV_PEER_TOKENS} names unknown peer '{peer}'"));
        }
    }

    if config.remote_token.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: ENV_REMOTE_TOKEN.into(),
            hint: "knowledge-base writes will be rejected by the remote repository".into(),
        });
    }

    if config.auth_mode == AuthMode::Public && !config.allowed_service_accounts.is_empty() {
        warnings.push(ConfigWarning::AllowListIgnored {
            mode: config.auth_mode,
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

/// Two non-empty segments separated by exactly one slash.
fn is_repo_id(raw: &str) -> bool {
    match raw.split_once('/') {
        Some((owner, name)) => {
            !owner.is_empty() && !name.is_empty() && !name.contains('/')
        }
        None => false,
    }
}

fn known_peer(name: &str) -> bool {
    matches!(name, "orchestrator" | "miner" | "log_attacker")
}

fn peer_url<'a>(config: &'a NexusConfig, peer: &str) -> Option<&'a String> {
    match peer {
        "orchestrator" => config.orchestrator_url.as_ref(),
        "miner" => config.miner_url.as_ref(),
        "log_attacker" => config.log_attacker_url.as_ref(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn minimal() -> Vec<(String, String)> {
        vars(&[(ENV_KNOWLEDGE_BASE_REPO, "acme/knowledge")])
    }

    // -- from_vars ---------------------------------------------------------

    #[test]
    fn minimal_config_gets_defaults() {
        let config = NexusConfig::from_vars(minimal()).unwrap();
        assert_eq!(config.knowledge_base_repo, "acme/knowledge");
        assert_eq!(config.knowledge_base_file, DEFAULT_KNOWLEDGE_BASE_FILE);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.auth_mode, AuthMode::Public);
        assert!(config.allowed_service_accounts.is_empty());
        assert!(config.cors_origins.is_none());
        assert_eq!(config.limits, RuntimeLimits::default());
    }

    #[test]
    fn missing_repo_is_fatal() {
        let err = NexusConfig::from_vars(vec![]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { key } if key == ENV_KNOWLEDGE_BASE_REPO));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let mut v = minimal();
        v.push((ENV_REMOTE_TOKEN.into(), "   ".into()));
        let config = NexusConfig::from_vars(v).unwrap();
        assert!(config.remote_token.is_none());
    }

    #[test]
    fn auth_mode_and_allow_list_parse() {
        let mut v = minimal();
        v.push((ENV_AUTH_MODE.into(), "service_account".into()));
        v.push((
            ENV_ALLOWED_SERVICE_ACCOUNTS.into(),
            "alice@x, bob@x ,".into(),
        ));
        let config = NexusConfig::from_vars(v).unwrap();
        assert_eq!(config.auth_mode, AuthMode::ServiceAccount);
        assert_eq!(config.allowed_service_accounts, vec!["alice@x", "bob@x"]);
    }

    #[test]
    fn bad_auth_mode_is_fatal() {
        let mut v = minimal();
        v.push((ENV_AUTH_MODE.into(), "anything-goes".into()));
        let err = NexusConfig::from_vars(v).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == ENV_AUTH_MODE));
    }

    #[test]
    fn bad_port_is_fatal() {
        let mut v = minimal();
        v.push((ENV_PORT.into(), "eighty".into()));
        let err = NexusConfig::from_vars(v).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == ENV_PORT));
    }

    #[test]
    fn peer_tokens_parse_into_map() {
        let mut v = minimal();
        v.push((
            ENV_PEER_TOKENS.into(),
            "orchestrator=tok-1, miner=tok-2".into(),
        ));
        let config = NexusConfig::from_vars(v).unwrap();
        assert_eq!(config.peer_tokens["orchestrator"], "tok-1");
        assert_eq!(config.peer_tokens["miner"], "tok-2");
    }

    #[test]
    fn malformed_peer_tokens_are_fatal() {
        let mut v = minimal();
        v.push((ENV_PEER_TOKENS.into(), "orchestrator".into()));
        let err = NexusConfig::from_vars(v).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == ENV_PEER_TOKENS));
    }

    #[test]
    fn public_url_prefers_host_override() {
        let mut v = minimal();
        v.push((ENV_HOST_OVERRIDE.into(), "https://nexus.example.com/".into()));
        let config = NexusConfig::from_vars(v).unwrap();
        assert_eq!(config.public_url(), "https://nexus.example.com");

        let config = NexusConfig::from_vars(minimal()).unwrap();
        assert_eq!(config.public_url(), "http://localhost:8080");
    }

    // -- validate_config ---------------------------------------------------

    #[test]
    fn valid_config_yields_only_warnings() {
        let config = NexusConfig::from_vars(minimal()).unwrap();
        let warnings = validate_config(&config).unwrap();
        // No remote token configured: advisory, not fatal.
        assert!(warnings.iter().any(|w| matches!(
            w,
            ConfigWarning::MissingOptionalField { field, .. } if field == ENV_REMOTE_TOKEN
        )));
    }

    #[test]
    fn malformed_repo_id_rejected() {
        for repo in ["acme", "acme/", "/knowledge", "a/b/c"] {
            let config = NexusConfig::from_vars(vars(&[(ENV_KNOWLEDGE_BASE_REPO, repo)])).unwrap();
            let err = validate_config(&config).unwrap_err();
            assert!(
                matches!(err, ConfigError::ValidationError { .. }),
                "accepted {repo:?}"
            );
        }
    }

    #[test]
    fn allow_list_in_public_mode_warns() {
        let mut v = minimal();
        v.push((ENV_ALLOWED_SERVICE_ACCOUNTS.into(), "alice@x".into()));
        let config = NexusConfig::from_vars(v).unwrap();
        let warnings = validate_config(&config).unwrap();
        assert!(warnings
            .iter()
            .any(|w| matches!(w, ConfigWarning::AllowListIgnored { .. })));
    }

    #[test]
    fn token_for_unknown_peer_rejected() {
        let mut v = minimal();
        v.push((ENV_PEER_TOKENS.into(), "warehouse=tok".into()));
        let config = NexusConfig::from_vars(v).unwrap();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn token_for_unconfigured_peer_warns() {
        let mut v = minimal();
        v.push((ENV_PEER_TOKENS.into(), "miner=tok".into()));
        let config = NexusConfig::from_vars(v).unwrap();
        let warnings = validate_config(&config).unwrap();
        assert!(warnings
            .iter()
            .any(|w| matches!(w, ConfigWarning::PeerDisabled { peer } if peer == "miner")));
    }

    #[test]
    fn zero_limits_rejected() {
        let mut config = NexusConfig::from_vars(minimal()).unwrap();
        config.limits.max_in_flight = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn warning_display_is_readable() {
        let w = ConfigWarning::PeerDisabled {
            peer: "miner".into(),
        };
        assert_eq!(
            w.to_string(),
            "peer 'miner' has no URL configured and is disabled"
        );
    }
}
