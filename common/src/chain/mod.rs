// Chain client and wallet interfaces
//
// Proposal enumeration, account lookup and signing are reached only through
// these traits; `RpcChainClient` is the JSON-RPC implementation.

pub mod rpc;

use crate::errors::ChainError;
use crate::models::{Account, Proposal};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, instrument};

pub use rpc::RpcChainClient;

/// Read and approve access to pending proposals
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Pending proposals visible to the given account scope
    async fn pending_proposals(&self, scope: &str) -> Result<Vec<Proposal>, ChainError>;

    /// Resolve an account by name or object id
    async fn account(&self, name_or_id: &str) -> Result<Account, ChainError>;

    /// Sign and broadcast an approval of `proposal_id` by `approver`, returning the receipt
    async fn approve_proposal(&self, proposal_id: &str, approver: &str)
        -> Result<Value, ChainError>;
}

/// Local signing wallet
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn created(&self) -> Result<bool, ChainError>;

    async fn unlock(&self, passphrase: &str) -> Result<(), ChainError>;
}

/// Startup guard: the wallet must exist and be unlocked before any dispatch.
#[instrument(skip_all)]
pub async fn unlock_wallet(wallet: &dyn Wallet, passphrase: Option<&str>) -> Result<(), ChainError> {
    let Some(passphrase) = passphrase.filter(|p| !p.is_empty()) else {
        let err = ChainError::MissingPassphrase;
        error!(severity = "critical", "{}", err);
        return Err(err);
    };

    if !wallet.created().await? {
        let err = ChainError::WalletNotCreated;
        error!(severity = "critical", "{}", err);
        return Err(err);
    }

    wallet.unlock(passphrase).await?;
    info!("Wallet unlocked");
    Ok(())
}
