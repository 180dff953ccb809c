// JSON-RPC chain client
//
// Reads go to the node API (`call` into the `database` API), signing goes to
// the wallet API.

use super::{ChainClient, Wallet};
use crate::config::ChainConfig;
use crate::errors::ChainError;
use crate::models::{Account, Proposal};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    message: String,
}

/// Chain client speaking JSON-RPC 2.0 over HTTP to a node and a wallet
pub struct RpcChainClient {
    client: Client,
    node_url: String,
    wallet_url: String,
    next_id: AtomicU64,
    account_id_pattern: OnceLock<Regex>,
}

impl RpcChainClient {
    pub fn new(config: &ChainConfig) -> Result<Self, ChainError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ChainError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            node_url: config.node_url.clone(),
            wallet_url: config.wallet_url.clone(),
            next_id: AtomicU64::new(1),
            account_id_pattern: OnceLock::new(),
        })
    }

    fn is_account_id(&self, candidate: &str) -> bool {
        self.account_id_pattern
            .get_or_init(|| Regex::new(r"^1\.2\.\d+$").expect("Invalid regex pattern"))
            .is_match(candidate)
    }

    async fn rpc(&self, url: &str, method: &str, params: Value) -> Result<Value, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(url = url, method = method, rpc_id = id, "Sending RPC request");

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        let status = response.status();
        let payload: RpcResponse = response.json().await.map_err(|e| {
            ChainError::InvalidResponse {
                method: method.to_string(),
                reason: format!("HTTP {}: {}", status, e),
            }
        })?;

        if let Some(error) = payload.error {
            return Err(ChainError::Rpc {
                method: method.to_string(),
                message: error.message,
            });
        }

        Ok(payload.result.unwrap_or(Value::Null))
    }

    /// Call a method of the node's database API
    async fn database<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ChainError> {
        let result = self
            .rpc(&self.node_url, "call", json!(["database", method, params]))
            .await?;
        decode(method, result)
    }
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, ChainError> {
    serde_json::from_value(value).map_err(|e| ChainError::InvalidResponse {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl ChainClient for RpcChainClient {
    #[instrument(skip(self))]
    async fn pending_proposals(&self, scope: &str) -> Result<Vec<Proposal>, ChainError> {
        let account = self.account(scope).await?;
        self.database("get_proposed_transactions", json!([account.id]))
            .await
    }

    #[instrument(skip(self))]
    async fn account(&self, name_or_id: &str) -> Result<Account, ChainError> {
        let found: Option<Account> = if self.is_account_id(name_or_id) {
            let accounts: Vec<Option<Account>> = self
                .database("get_accounts", json!([[name_or_id]]))
                .await?;
            accounts.into_iter().flatten().next()
        } else {
            self.database("get_account_by_name", json!([name_or_id]))
                .await?
        };

        found.ok_or_else(|| ChainError::AccountNotFound(name_or_id.to_string()))
    }

    #[instrument(skip(self))]
    async fn approve_proposal(
        &self,
        proposal_id: &str,
        approver: &str,
    ) -> Result<Value, ChainError> {
        self.rpc(
            &self.wallet_url,
            "approve_proposal",
            json!([
                approver,
                proposal_id,
                {"active_approvals_to_add": [approver]},
                true
            ]),
        )
        .await
    }
}

#[async_trait]
impl Wallet for RpcChainClient {
    async fn created(&self) -> Result<bool, ChainError> {
        let is_new = self.rpc(&self.wallet_url, "is_new", json!([])).await?;
        let is_new: bool = decode("is_new", is_new)?;
        Ok(!is_new)
    }

    async fn unlock(&self, passphrase: &str) -> Result<(), ChainError> {
        self.rpc(&self.wallet_url, "unlock", json!([passphrase]))
            .await?;
        Ok(())
    }
}
