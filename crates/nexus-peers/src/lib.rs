// SPDX-License-Identifier: MIT OR Apache-2.0
//! nexus-peers
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Outbound A2A calls to the peer agents (orchestrator, miner,
//! log-attacker) with health probing and graceful degradation.
//!
//! A peer with no configured URL is *disabled*: calls against it come back
//! as a failed envelope, never an error.  Transport failures get exactly
//! one retry; 4xx responses get none.  Nothing in this crate can fail an
//! enclosing skill; callers that require a peer check the envelope
//! themselves.

use chrono::{DateTime, Utc};
use nexus_error::{NexusCode, NexusError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Peers
// ---------------------------------------------------------------------------

/// The peer agents this service coordinates with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Peer {
    /// Workflow orchestrator.
    Orchestrator,
    /// Repository miner.
    Miner,
    /// Log analysis agent.
    LogAttacker,
}

impl Peer {
    /// All peers, in a fixed order.
    pub const ALL: [Peer; 3] = [Peer::Orchestrator, Peer::Miner, Peer::LogAttacker];

    /// Stable string form, matching configuration keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orchestrator => "orchestrator",
            Self::Miner => "miner",
            Self::LogAttacker => "log_attacker",
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how to reach one peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerEndpoint {
    /// Base URL; `None` disables the peer.
    pub base_url: Option<String>,
    /// Outbound bearer token, when the peer requires one.
    pub token: Option<String>,
}

// ---------------------------------------------------------------------------
// Call results
// ---------------------------------------------------------------------------

/// Envelope for one outbound skill execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerCallResult {
    /// Whether the peer reported success.
    pub success: bool,
    /// The peer's response body (empty object on failure).
    #[serde(default)]
    pub output: Value,
    /// Failure description, when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PeerCallResult {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: json!({}),
            error: Some(error.into()),
        }
    }
}

/// Probe status of one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerStatus {
    /// The peer answered its health endpoint.
    Healthy,
    /// The peer is configured but did not answer cleanly.
    Unhealthy,
    /// The peer has no configured URL.
    Disabled,
}

/// Result of one health probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerHealthReport {
    /// Which peer was probed.
    pub peer: Peer,
    /// Probe outcome.
    pub status: PeerStatus,
    /// The probed base URL, when configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Probe round-trip time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    /// Last successful interaction with this peer, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_interaction: Option<DateTime<Utc>>,
    /// Failure description for unhealthy peers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// IntegrationClient
// ---------------------------------------------------------------------------

/// Outbound A2A client for all configured peers.
pub struct IntegrationClient {
    client: reqwest::Client,
    endpoints: BTreeMap<Peer, PeerEndpoint>,
    last_interaction: RwLock<BTreeMap<Peer, DateTime<Utc>>>,
}

impl IntegrationClient {
    /// Build a client over the configured endpoints.
    pub fn new(endpoints: BTreeMap<Peer, PeerEndpoint>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                NexusError::new(NexusCode::Internal, "failed to build HTTP client").with_source(e)
            })?;
        Ok(Self {
            client,
            endpoints,
            last_interaction: RwLock::new(BTreeMap::new()),
        })
    }

    fn endpoint(&self, peer: Peer) -> PeerEndpoint {
        self.endpoints.get(&peer).cloned().unwrap_or_default()
    }

    async fn touch(&self, peer: Peer) {
        self.last_interaction.write().await.insert(peer, Utc::now());
    }

    /// Execute a skill on a peer.
    ///
    /// Never errors: disabled peers, transport failures (after one retry),
    /// and 4xx responses all come back as a failed [`PeerCallResult`].
    pub async fn execute(&self, peer: Peer, skill_id: &str, input: Value) -> PeerCallResult {
        let endpoint = self.endpoint(peer);
        let Some(base_url) = endpoint.base_url else {
            return PeerCallResult::failed("disabled");
        };

        let url = format!("{}/a2a/execute", base_url.trim_end_matches('/'));
        let body = json!({ "skill_id": skill_id, "input": input });

        let response = match self.post(&url, &body, endpoint.token.as_deref()).await {
            Ok(response) => response,
            Err(first) => {
                // One retry, transport errors only.
                warn!(peer = %peer, error = %first, "peer transport error, retrying once");
                match self.post(&url, &body, endpoint.token.as_deref()).await {
                    Ok(response) => response,
                    Err(second) => {
                        return PeerCallResult::failed(format!("peer unreachable: {second}"));
                    }
                }
            }
        };

        let status = response.status();
        if status.is_client_error() {
            // The peer understood us and said no; retrying cannot help.
            return PeerCallResult::failed(format!("peer rejected call with status {status}"));
        }
        if !status.is_success() {
            return PeerCallResult::failed(format!("peer returned status {status}"));
        }

        let output = match response.json::<Value>().await {
            Ok(output) => output,
            Err(e) => return PeerCallResult::failed(format!("peer returned invalid JSON: {e}")),
        };

        self.touch(peer).await;
        debug!(peer = %peer, skill_id, "peer call completed");
        let success = output
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        PeerCallResult {
            success,
            error: output
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_owned),
            output,
        }
    }

    /// Probe a single peer's health endpoint.
    pub async fn health(&self, peer: Peer) -> PeerHealthReport {
        let endpoint = self.endpoint(peer);
        let last_interaction = self.last_interaction.read().await.get(&peer).copied();

        let Some(base_url) = endpoint.base_url else {
            return PeerHealthReport {
                peer,
                status: PeerStatus::Disabled,
                url: None,
                response_time_ms: None,
                last_interaction,
                error: None,
            };
        };

        let url = format!("{}/health", base_url.trim_end_matches('/'));
        let started = Instant::now();
        let mut request = self.client.get(&url);
        if let Some(token) = &endpoint.token {
            request = request.bearer_auth(token);
        }

        let (status, error) = match request.send().await {
            Ok(response) if response.status().is_success() => (PeerStatus::Healthy, None),
            Ok(response) => (
                PeerStatus::Unhealthy,
                Some(format!("health endpoint returned {}", response.status())),
            ),
            Err(e) => (PeerStatus::Unhealthy, Some(e.to_string())),
        };
        let response_time_ms = started.elapsed().as_millis() as u64;

        if status == PeerStatus::Healthy {
            self.touch(peer).await;
        }

        PeerHealthReport {
            peer,
            status,
            url: Some(base_url),
            response_time_ms: Some(response_time_ms),
            last_interaction,
            error,
        }
    }

    /// Probe every peer, in [`Peer::ALL`] order.
    pub async fn health_all(&self) -> Vec<PeerHealthReport> {
        let mut reports = Vec::with_capacity(Peer::ALL.len());
        for peer in Peer::ALL {
            reports.push(self.health(peer).await);
        }
        reports
    }

    async fn post(
        &self,
        url: &str,
        body: &Value,
        token: Option<&str>,
    ) -> reqwest::Result<reqwest::Response> {
        let mut request = self.client.post(url).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await
    }
}
