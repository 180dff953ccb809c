// Self-approval reconciler
//
// Proposals created by our proposer are not implicitly approved by our
// approver; this pass finds those still missing the approval and submits it.
// Errors are not isolated: any chain failure fails the whole job.

use crate::chain::ChainClient;
use crate::config::{BookieConfig, ChainConfig};
use crate::dispatch::context::resolve_account;
use crate::errors::ChainError;
use crate::models::Account;
use crate::telemetry;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Pending proposals listed in the review scope
    pub inspected: usize,
    /// Proposal ids approved during this pass
    pub approved: Vec<String>,
}

pub struct Reconciler {
    chain: Arc<dyn ChainClient>,
    default_proposer: Option<String>,
    default_approver: Option<String>,
    review_account: String,
}

impl Reconciler {
    pub fn new(chain: Arc<dyn ChainClient>, bookie: &BookieConfig, chain_config: &ChainConfig) -> Self {
        Self {
            chain,
            default_proposer: bookie.proposer.clone(),
            default_approver: bookie.approver.clone(),
            review_account: chain_config.review_account.clone(),
        }
    }

    /// Approve every pending proposal created by the effective proposer that
    /// the effective approver has not approved yet.
    ///
    /// Overrides win over the configured accounts. Running it again right
    /// after a successful pass submits nothing.
    #[instrument(skip(self))]
    pub async fn reconcile(
        &self,
        override_approver: Option<&str>,
        override_proposer: Option<&str>,
    ) -> Result<ReconcileReport, ChainError> {
        let approver_name = resolve_account(override_approver, self.default_approver.as_deref())
            .ok_or(ChainError::MissingAccount { role: "approver" })?;
        let proposer_name = resolve_account(override_proposer, self.default_proposer.as_deref())
            .ok_or(ChainError::MissingAccount { role: "proposer" })?;

        info!(
            proposer = proposer_name,
            approver = approver_name,
            "Testing for pending proposals created by {} that we could approve by {}",
            proposer_name,
            approver_name
        );

        let proposals = self.chain.pending_proposals(&self.review_account).await?;
        let approver = self.chain.account(approver_name).await?;

        let mut proposers: HashMap<String, Account> = HashMap::new();
        let mut report = ReconcileReport {
            inspected: proposals.len(),
            approved: Vec::new(),
        };

        for proposal in proposals {
            let proposer = match proposers.get(&proposal.proposer) {
                Some(account) => account.clone(),
                None => {
                    let account = self.chain.account(&proposal.proposer).await?;
                    proposers.insert(proposal.proposer.clone(), account.clone());
                    account
                }
            };

            if proposer.name != proposer_name || proposal.is_approved_by(&approver.id) {
                debug!(proposal_id = %proposal.id, proposer = %proposer.name, "Skipping proposal");
                continue;
            }

            info!(
                proposal_id = %proposal.id,
                proposer = proposer_name,
                "Proposal {} has been proposed by {}. Approving it!",
                proposal.id,
                proposer_name
            );
            let receipt = self
                .chain
                .approve_proposal(&proposal.id, approver_name)
                .await?;
            info!(proposal_id = %proposal.id, receipt = %receipt, "Approval submitted");

            telemetry::record_approval(proposer_name);
            report.approved.push(proposal.id);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainClient;
    use crate::config::Settings;
    use crate::models::Proposal;
    use mockall::predicate::eq;
    use serde_json::json;

    fn account(id: &str, name: &str) -> Account {
        Account {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn proposal(id: &str, proposer: &str, approvals: &[&str]) -> Proposal {
        Proposal {
            id: id.to_string(),
            proposer: proposer.to_string(),
            available_active_approvals: approvals.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn reconciler(chain: MockChainClient) -> Reconciler {
        let mut settings = Settings::default();
        settings.bookie.proposer = Some("init0".to_string());
        settings.bookie.approver = Some("init1".to_string());
        Reconciler::new(Arc::new(chain), &settings.bookie, &settings.chain)
    }

    fn expect_accounts(chain: &mut MockChainClient) {
        chain.expect_account().returning(|name| match name {
            "init0" | "1.2.7" => Ok(account("1.2.7", "init0")),
            "init1" | "1.2.8" => Ok(account("1.2.8", "init1")),
            "1.2.9" => Ok(account("1.2.9", "someone-else")),
            other => Err(ChainError::AccountNotFound(other.to_string())),
        });
    }

    #[tokio::test]
    async fn test_approves_only_own_unapproved_proposals() {
        let mut chain = MockChainClient::new();
        chain
            .expect_pending_proposals()
            .with(eq("witness-account"))
            .times(1)
            .returning(|_| {
                Ok(vec![
                    proposal("1.10.1", "1.2.7", &[]),
                    proposal("1.10.2", "1.2.7", &["1.2.8"]),
                    proposal("1.10.3", "1.2.9", &[]),
                ])
            });
        expect_accounts(&mut chain);
        chain
            .expect_approve_proposal()
            .with(eq("1.10.1"), eq("init1"))
            .times(1)
            .returning(|_, _| Ok(json!({"ref_block_num": 1})));

        let report = reconciler(chain).reconcile(None, None).await.unwrap();
        assert_eq!(report.inspected, 3);
        assert_eq!(report.approved, vec!["1.10.1".to_string()]);
    }

    #[tokio::test]
    async fn test_overrides_replace_configured_accounts() {
        let mut chain = MockChainClient::new();
        chain
            .expect_pending_proposals()
            .returning(|_| Ok(vec![proposal("1.10.5", "1.2.9", &[])]));
        expect_accounts(&mut chain);
        chain
            .expect_approve_proposal()
            .with(eq("1.10.5"), eq("init0"))
            .times(1)
            .returning(|_, _| Ok(json!({})));

        let report = reconciler(chain)
            .reconcile(Some("init0"), Some("someone-else"))
            .await
            .unwrap();
        assert_eq!(report.approved, vec!["1.10.5".to_string()]);
    }

    #[tokio::test]
    async fn test_chain_errors_propagate() {
        let mut chain = MockChainClient::new();
        chain
            .expect_pending_proposals()
            .returning(|_| Ok(vec![proposal("1.10.1", "1.2.7", &[])]));
        expect_accounts(&mut chain);
        chain.expect_approve_proposal().returning(|_, _| {
            Err(ChainError::Rpc {
                method: "approve_proposal".to_string(),
                message: "wallet is locked".to_string(),
            })
        });

        let err = reconciler(chain).reconcile(None, None).await.unwrap_err();
        assert!(matches!(err, ChainError::Rpc { .. }));
    }

    #[tokio::test]
    async fn test_missing_accounts_are_reported() {
        let chain = MockChainClient::new();
        let reconciler = Reconciler::new(
            Arc::new(chain),
            &BookieConfig {
                proposer: Some("init0".to_string()),
                approver: None,
                passphrase: None,
            },
            &Settings::default().chain,
        );

        let err = reconciler.reconcile(None, None).await.unwrap_err();
        assert!(matches!(err, ChainError::MissingAccount { role: "approver" }));
    }
}
