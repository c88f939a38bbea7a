// SPDX-License-Identifier: MIT OR Apache-2.0
//! Family D: outbound integration skills.

use crate::skill::{Skill, object_schema, parse_input, success};
use async_trait::async_trait;
use nexus_auth::Identity;
use nexus_error::Result;
use nexus_peers::{IntegrationClient, Peer};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;

#[derive(Deserialize)]
struct HealthCheckRequest {
    #[serde(default)]
    agent: Option<Peer>,
}

/// Probe the configured peer agents.
pub struct HealthCheckExternalSkill {
    peers: Arc<IntegrationClient>,
}

impl HealthCheckExternalSkill {
    /// Construct with the shared integration client.
    pub fn new(peers: Arc<IntegrationClient>) -> Self {
        Self { peers }
    }
}

#[async_trait]
impl Skill for HealthCheckExternalSkill {
    fn id(&self) -> &'static str {
        "health_check_external"
    }

    fn name(&self) -> &'static str {
        "External Health Check"
    }

    fn description(&self) -> &'static str {
        "Probe peer agents and report status, latency, and last interaction"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["integration", "health"]
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "agent": {
                    "type": "string",
                    "enum": ["orchestrator", "miner", "log_attacker"],
                },
            }),
            &[],
        )
    }

    async fn execute(&self, input: Value, _identity: &Identity) -> Result<Value> {
        let request: HealthCheckRequest = parse_input(input)?;

        let reports = match request.agent {
            Some(peer) => vec![self.peers.health(peer).await],
            None => self.peers.health_all().await,
        };

        let mut agents = Map::new();
        for report in reports {
            let mut entry = json!({
                "status": report.status,
                "url": report.url,
                "response_time_ms": report.response_time_ms,
            });
            if let Some(last) = report.last_interaction {
                entry["last_interaction"] = json!(last);
            }
            if let Some(error) = report.error {
                entry["error"] = json!(error);
            }
            agents.insert(report.peer.as_str().to_string(), entry);
        }

        Ok(success(json!({ "agents": Value::Object(agents) })))
    }
}
