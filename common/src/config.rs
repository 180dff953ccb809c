// Configuration management with layered configuration (file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub nats: NatsConfig,
    pub bookie: BookieConfig,
    pub chain: ChainConfig,
    pub triggers: TriggersConfig,
    pub worker: WorkerConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsConfig {
    pub url: String,
    pub stream_name: String,
    pub consumer_name: String,
}

/// Accounts and wallet secret used when building proposals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookieConfig {
    pub proposer: Option<String>,
    pub approver: Option<String>,
    #[serde(default)]
    pub passphrase: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Node JSON-RPC endpoint used for reads
    pub node_url: String,
    /// Wallet JSON-RPC endpoint used for unlocking and signing
    pub wallet_url: String,
    /// Account whose pending proposals are scanned for approval
    #[serde(default = "default_review_account")]
    pub review_account: String,
    pub timeout_seconds: u64,
}

fn default_review_account() -> String {
    "witness-account".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggersConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub queue: String,
    /// Keep the active proposer/approver from the previous message when the
    /// next one does not name any
    #[serde(default = "default_sticky_accounts")]
    pub sticky_accounts: bool,
}

fn default_sticky_accounts() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// Prometheus listener of the api binary
    pub api_metrics_port: u16,
    /// Prometheus listener of the worker binary
    pub worker_metrics_port: u16,
    pub tracing_endpoint: Option<String>,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let defaults = Config::try_from(&Settings::default())?;

        let builder = Config::builder()
            .add_source(defaults)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if self.nats.url.is_empty() {
            return Err("NATS URL cannot be empty".to_string());
        }
        if self.nats.stream_name.is_empty() {
            return Err("NATS stream_name cannot be empty".to_string());
        }

        if self.chain.node_url.is_empty() {
            return Err("Chain node_url cannot be empty".to_string());
        }
        if self.chain.wallet_url.is_empty() {
            return Err("Chain wallet_url cannot be empty".to_string());
        }
        if self.chain.review_account.is_empty() {
            return Err("Chain review_account cannot be empty".to_string());
        }

        if self.triggers.base_url.is_empty() {
            return Err("Triggers base_url cannot be empty".to_string());
        }

        if self.worker.queue.is_empty() {
            return Err("Worker queue cannot be empty".to_string());
        }

        // api and worker usually share a host
        if self.observability.api_metrics_port == self.observability.worker_metrics_port {
            return Err("api_metrics_port and worker_metrics_port must differ".to_string());
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8010,
            },
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                stream_name: "BOOKIE".to_string(),
                consumer_name: "bookie-workers".to_string(),
            },
            bookie: BookieConfig {
                proposer: None,
                approver: None,
                passphrase: None,
            },
            chain: ChainConfig {
                node_url: "http://localhost:8090/rpc".to_string(),
                wallet_url: "http://localhost:8093/rpc".to_string(),
                review_account: default_review_account(),
                timeout_seconds: 30,
            },
            triggers: TriggersConfig {
                base_url: "http://localhost:8011/triggers".to_string(),
                timeout_seconds: 120,
            },
            worker: WorkerConfig {
                queue: "default".to_string(),
                sticky_accounts: true,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                api_metrics_port: 9090,
                worker_metrics_port: 9091,
                tracing_endpoint: None,
            },
        }
    }
}
