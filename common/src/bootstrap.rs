// Bootstrap utilities for binary initialization

use crate::approve::Reconciler;
use crate::chain::{unlock_wallet, ChainClient, RpcChainClient, Wallet};
use crate::config::Settings;
use crate::dispatch::{DispatchContext, Dispatcher, HttpTrigger, TriggerFactory};
use crate::queue::{NatsClient, NatsConfig};
use crate::worker::JobRunner;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Load and validate settings
/// Used by: API server, Worker, CLI
pub fn load_settings() -> Result<Settings> {
    let settings = Settings::load().context("Failed to load configuration")?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(settings)
}

/// Initialize NATS client for the named queue
/// Used by: API server, Worker, CLI
///
/// # Errors
/// Returns error if the connection fails
#[tracing::instrument(skip(settings))]
pub async fn init_nats_client(settings: &Settings, queue: &str) -> Result<NatsClient> {
    info!(queue = %queue, "Initializing NATS client");

    let nats_client = NatsClient::new(NatsConfig::from_settings(settings, queue))
        .await
        .context("Failed to initialize NATS client")?;

    info!("NATS client initialized");
    Ok(nats_client)
}

/// Initialize the JSON-RPC chain client and unlock its wallet
/// Used by: Worker
///
/// # Errors
/// Returns error if the passphrase is missing, the wallet was never created,
/// or unlocking fails
#[tracing::instrument(skip(settings))]
pub async fn init_chain_client(settings: &Settings) -> Result<Arc<RpcChainClient>> {
    info!(
        node_url = %settings.chain.node_url,
        wallet_url = %settings.chain.wallet_url,
        "Initializing chain client"
    );

    let chain = Arc::new(
        RpcChainClient::new(&settings.chain).context("Failed to create chain client")?,
    );

    unlock_wallet(chain.as_ref() as &dyn Wallet, settings.bookie.passphrase.as_deref())
        .await
        .context("Failed to unlock wallet")?;

    Ok(chain)
}

/// Build the job runner from its collaborators
/// Used by: Worker
pub fn init_job_runner(
    settings: Arc<Settings>,
    chain: Arc<dyn ChainClient>,
    triggers: Arc<dyn TriggerFactory>,
) -> JobRunner {
    let defaults = DispatchContext::from_config(&settings.bookie);
    let reconciler = Reconciler::new(chain, &settings.bookie, &settings.chain);
    let sticky_accounts = settings.worker.sticky_accounts;
    let dispatcher = Dispatcher::new(triggers, settings);

    JobRunner::new(dispatcher, reconciler, defaults, sticky_accounts)
}

/// Build the HTTP trigger set
/// Used by: Worker
pub fn init_triggers(settings: &Settings) -> Result<Arc<dyn TriggerFactory>> {
    let triggers =
        HttpTrigger::trigger_set(&settings.triggers).context("Failed to create trigger client")?;
    info!(base_url = %settings.triggers.base_url, "Trigger backend configured");
    Ok(Arc::new(triggers))
}
