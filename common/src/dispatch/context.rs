// Active proposer/approver accounts for dispatch

use crate::config::BookieConfig;
use crate::models::Message;

/// The proposing and approving accounts triggers act on behalf of.
///
/// Owned by the caller and passed into every dispatch. A dispatch only
/// overwrites an account when the call or the message names one, so values
/// carry over to later messages unless the caller resets the context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchContext {
    proposing_account: Option<String>,
    approving_account: Option<String>,
}

impl DispatchContext {
    pub fn new(proposing_account: Option<String>, approving_account: Option<String>) -> Self {
        Self {
            proposing_account,
            approving_account,
        }
    }

    pub fn from_config(config: &BookieConfig) -> Self {
        Self::new(config.proposer.clone(), config.approver.clone())
    }

    pub fn proposing_account(&self) -> Option<&str> {
        self.proposing_account.as_deref()
    }

    pub fn approving_account(&self) -> Option<&str> {
        self.approving_account.as_deref()
    }

    pub fn set_proposing_account(&mut self, account: impl Into<String>) {
        self.proposing_account = Some(account.into());
    }

    pub fn set_approving_account(&mut self, account: impl Into<String>) {
        self.approving_account = Some(account.into());
    }

    /// Apply call-time overrides, falling back to accounts embedded in the
    /// message. Absent or empty values leave the current account untouched.
    pub fn apply_overrides(
        &mut self,
        message: &Message,
        override_approver: Option<&str>,
        override_proposer: Option<&str>,
    ) {
        if let Some(approver) = resolve_account(override_approver, message.approver.as_deref()) {
            self.set_approving_account(approver);
        }
        if let Some(proposer) = resolve_account(override_proposer, message.proposer.as_deref()) {
            self.set_proposing_account(proposer);
        }
    }
}

/// Non-empty override, else non-empty fallback
pub fn resolve_account<'a>(
    override_account: Option<&'a str>,
    fallback: Option<&'a str>,
) -> Option<&'a str> {
    override_account
        .filter(|account| !account.is_empty())
        .or_else(|| fallback.filter(|account| !account.is_empty()))
}
