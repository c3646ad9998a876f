//! Startup wiring: builds the gateway configuration from parsed flags.
use std::sync::Arc;

use anyhow::{Context, Result};

use parley_access::{AuthMode, AuthSettings};
use parley_agent_core::{AgentRuntime, DialogueAgent};
use parley_gateway::{
    run_gateway_server, DialogueAgentLoader, GatewayServerConfig, ModelLoadRequest,
    RemoteDialogueAgentLoader,
};
use parley_multi_channel::ChannelRegistry;
use parley_session::{FileTrackerStore, InMemoryTrackerStore, TrackerStore};

use crate::{Cli, CliTrackerStore};

/// Maps auth flags onto the gate's [`AuthMode`].
pub fn resolve_auth_mode(cli: &Cli) -> Result<AuthMode> {
    AuthMode::from_settings(&AuthSettings {
        auth_token: cli.auth_token.clone(),
        jwt_secret: cli.jwt_secret.clone(),
        jwt_method: cli.jwt_method.clone(),
    })
    .context("invalid gateway authentication settings")
}

pub fn build_tracker_store(cli: &Cli) -> Result<Arc<dyn TrackerStore>> {
    let store: Arc<dyn TrackerStore> = match cli.tracker_store {
        CliTrackerStore::Memory => Arc::new(InMemoryTrackerStore::new()),
        CliTrackerStore::File => Arc::new(
            FileTrackerStore::open(&cli.state_dir).with_context(|| {
                format!("failed to open tracker store at {}", cli.state_dir.display())
            })?,
        ),
    };
    tracing::info!(
        tracker_store = cli.tracker_store.as_str(),
        "tracker store ready"
    );
    Ok(store)
}

pub fn build_channel_registry(cli: &Cli) -> Result<ChannelRegistry> {
    let Some(path) = cli.channels_file.as_deref() else {
        return Ok(ChannelRegistry::default());
    };
    ChannelRegistry::load(path)
        .with_context(|| format!("failed to load channels file {}", path.display()))
}

/// Loads the startup agent when `--agent-url` is set.
pub fn build_startup_agent(
    cli: &Cli,
    loader: &dyn DialogueAgentLoader,
) -> Result<Option<Arc<dyn DialogueAgent>>> {
    let Some(agent_url) = cli.agent_url.as_deref() else {
        return Ok(None);
    };
    let request = ModelLoadRequest {
        agent_url: agent_url.to_string(),
        fingerprint: cli.agent_fingerprint.clone(),
    };
    loader.load(&request).map(Some)
}

pub fn build_gateway_server_config(cli: &Cli) -> Result<GatewayServerConfig> {
    let auth_mode = resolve_auth_mode(cli)?;
    let tracker_store = build_tracker_store(cli)?;
    let channels = build_channel_registry(cli)?;
    let agent_loader: Arc<dyn DialogueAgentLoader> = Arc::new(RemoteDialogueAgentLoader {
        http_timeout_ms: cli.agent_timeout_ms,
    });
    let agent = build_startup_agent(cli, agent_loader.as_ref())?;
    Ok(GatewayServerConfig {
        bind: cli.bind.clone(),
        auth_mode,
        cors_origins: cli.cors_origins.clone(),
        request_timeout_ms: cli.request_timeout_ms,
        runtime: AgentRuntime::new(agent, Some(tracker_store)),
        channels,
        agent_loader,
    })
}

pub async fn run_cli(cli: Cli) -> Result<()> {
    let config = build_gateway_server_config(&cli)?;
    run_gateway_server(config).await
}
