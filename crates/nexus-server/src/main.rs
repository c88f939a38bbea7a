// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use anyhow::{Context, Result};
use clap::Parser;
use nexus_auth::AuthContext;
use nexus_config::{NexusConfig, validate_config};
use nexus_peers::{IntegrationClient, Peer, PeerEndpoint};
use nexus_server::{AppState, build_app};
use nexus_skills::build_registry;
use nexus_store::{GitHubStore, KnowledgeBase};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nexus-server", version, about = "Dev-Nexus A2A knowledge-base service")]
struct Args {
    /// Bind address; defaults to 0.0.0.0 on the configured PORT.
    #[arg(long)]
    bind: Option<String>,

    /// Enable request/response debug logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("info,nexus_server=debug,nexus_skills=debug,nexus_store=debug,nexus_peers=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = NexusConfig::from_env().context("load configuration")?;
    let warnings = validate_config(&config).context("validate configuration")?;
    for warning in &warnings {
        warn!(%warning, "configuration warning");
    }

    let state = build_state(config)?;
    let app = build_app(state.clone());

    let bind = args
        .bind
        .unwrap_or_else(|| format!("0.0.0.0:{}", state.config.port));
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!(
        bind = %bind,
        skills = state.registry.len(),
        knowledge_base = %state.config.knowledge_base_repo,
        auth_mode = %state.config.auth_mode,
        "nexus-server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")
}

fn build_state(config: NexusConfig) -> Result<Arc<AppState>> {
    let config = Arc::new(config);

    let store = GitHubStore::new(
        config.knowledge_base_repo.clone(),
        config.knowledge_base_file.clone(),
        config.remote_token.clone(),
        Duration::from_secs(config.limits.kb_io_timeout_secs),
    )
    .context("build knowledge-base store")?;
    let kb = Arc::new(KnowledgeBase::new(Arc::new(store)));

    let peers = Arc::new(
        IntegrationClient::new(
            peer_endpoints(&config),
            Duration::from_secs(config.limits.peer_timeout_secs),
        )
        .context("build integration client")?,
    );

    let registry = Arc::new(
        build_registry(kb.clone(), peers, config.limits.max_history_entries)
            .context("build skill registry")?,
    );

    let auth = Arc::new(AuthContext::new(
        config.auth_mode,
        config.allowed_service_accounts.clone(),
    ));

    Ok(Arc::new(AppState {
        config,
        registry,
        auth,
        kb,
    }))
}

fn peer_endpoints(config: &NexusConfig) -> BTreeMap<Peer, PeerEndpoint> {
    let mut endpoints = BTreeMap::new();
    for (peer, base_url) in [
        (Peer::Orchestrator, config.orchestrator_url.clone()),
        (Peer::Miner, config.miner_url.clone()),
        (Peer::LogAttacker, config.log_attacker_url.clone()),
    ] {
        endpoints.insert(
            peer,
            PeerEndpoint {
                base_url,
                token: config.peer_tokens.get(peer.as_str()).cloned(),
            },
        );
    }
    endpoints
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install ctrl-c handler");
    }
}
