// Job runner - executes one dequeued job

use crate::approve::{ReconcileReport, Reconciler};
use crate::dispatch::{DispatchContext, DispatchOutcome, Dispatcher};
use crate::errors::ChainError;
use crate::models::{JobEnvelope, Message, QueuedJob};
use tokio::sync::Mutex;
use tracing::{info, instrument};

/// Runs dispatch and approval jobs against one shared account context.
///
/// The context sits behind a mutex so dispatches sharing it never overlap.
pub struct JobRunner {
    dispatcher: Dispatcher,
    reconciler: Reconciler,
    context: Mutex<DispatchContext>,
    defaults: DispatchContext,
    sticky_accounts: bool,
}

impl JobRunner {
    pub fn new(
        dispatcher: Dispatcher,
        reconciler: Reconciler,
        defaults: DispatchContext,
        sticky_accounts: bool,
    ) -> Self {
        Self {
            dispatcher,
            reconciler,
            context: Mutex::new(defaults.clone()),
            defaults,
            sticky_accounts,
        }
    }

    /// Run a job. Only approval failures are returned as errors; dispatch
    /// isolates its own failures.
    #[instrument(skip_all, fields(job_id = %envelope.job_id, job = envelope.job.name()))]
    pub async fn run(&self, envelope: JobEnvelope) -> Result<(), ChainError> {
        match envelope.job {
            QueuedJob::Process {
                message,
                approver,
                proposer,
            } => {
                self.process(&message, approver.as_deref(), proposer.as_deref())
                    .await;
                Ok(())
            }
            QueuedJob::Approve { approver, proposer } => {
                let report = self
                    .approve(approver.as_deref(), proposer.as_deref())
                    .await?;
                info!(
                    inspected = report.inspected,
                    approved = report.approved.len(),
                    "Approval pass finished"
                );
                Ok(())
            }
        }
    }

    pub async fn process(
        &self,
        message: &Message,
        approver: Option<&str>,
        proposer: Option<&str>,
    ) -> DispatchOutcome {
        let mut ctx = self.context.lock().await;
        if !self.sticky_accounts {
            *ctx = self.defaults.clone();
        }
        self.dispatcher
            .dispatch(&mut ctx, message, approver, proposer)
            .await
    }

    pub async fn approve(
        &self,
        approver: Option<&str>,
        proposer: Option<&str>,
    ) -> Result<ReconcileReport, ChainError> {
        self.reconciler.reconcile(approver, proposer).await
    }

    /// Snapshot of the active accounts
    pub async fn active_accounts(&self) -> DispatchContext {
        self.context.lock().await.clone()
    }
}
