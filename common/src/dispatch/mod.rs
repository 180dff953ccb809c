// Job dispatcher: routes inbound messages to their trigger
//
// Dispatch never fails its caller. Business-rule conditions are absorbed,
// anything else is logged as critical and absorbed as well, so one bad
// message cannot stop the worker loop.

pub mod context;
pub mod trigger;

use crate::config::Settings;
use crate::errors::{DomainError, TriggerError};
use crate::models::{CallKind, Message, TriggerKind};
use crate::telemetry;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

pub use context::DispatchContext;
pub use trigger::{HttpTrigger, Trigger, TriggerFactory, TriggerRequest, TriggerResult, TriggerSet};

/// What happened to a dispatched message. None of these is a failure of the
/// dispatch itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The trigger ran to completion
    Triggered(TriggerKind),
    /// `unknown` call, nothing to do
    Skipped,
    /// Call not recognised, logged as an error
    Unrecognized(String),
    /// The trigger reported an expected business-rule condition
    Absorbed(TriggerKind, DomainError),
    /// The trigger failed unexpectedly, logged as critical
    Failed(TriggerKind),
}

impl DispatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Triggered(_) => "triggered",
            DispatchOutcome::Skipped => "skipped",
            DispatchOutcome::Unrecognized(_) => "unrecognized",
            DispatchOutcome::Absorbed(..) => "absorbed",
            DispatchOutcome::Failed(_) => "failed",
        }
    }
}

pub struct Dispatcher {
    triggers: Arc<dyn TriggerFactory>,
    settings: Arc<Settings>,
}

impl Dispatcher {
    pub fn new(triggers: Arc<dyn TriggerFactory>, settings: Arc<Settings>) -> Self {
        Self { triggers, settings }
    }

    /// Resolve the active accounts into `ctx` and run the trigger for the
    /// message's call.
    ///
    /// Call-time overrides win over accounts embedded in the message; when
    /// neither names an account, `ctx` keeps its previous value.
    #[instrument(skip_all, fields(message_id = %message.id, call = %message.call))]
    pub async fn dispatch(
        &self,
        ctx: &mut DispatchContext,
        message: &Message,
        override_approver: Option<&str>,
        override_proposer: Option<&str>,
    ) -> DispatchOutcome {
        ctx.apply_overrides(message, override_approver, override_proposer);

        debug!(
            proposer = ctx.proposing_account(),
            approver = ctx.approving_account(),
            "Active accounts"
        );

        let call = message.call_kind();
        let label = call_label(&call);
        info!(
            call = call.as_str(),
            arguments = %message.arguments,
            "Processing call"
        );

        let outcome = match call {
            CallKind::Trigger(kind) => self.run_trigger(kind, ctx, message).await,
            CallKind::Unknown => DispatchOutcome::Skipped,
            CallKind::Unrecognized(call) => {
                error!(
                    call = %call,
                    payload = %message.to_value(),
                    "Received an unknown trigger"
                );
                DispatchOutcome::Unrecognized(call)
            }
        };

        telemetry::record_dispatch(label, outcome.label());

        outcome
    }

    async fn run_trigger(
        &self,
        kind: TriggerKind,
        ctx: &DispatchContext,
        message: &Message,
    ) -> DispatchOutcome {
        let trigger = self.triggers.trigger_for(kind);
        let request = TriggerRequest {
            message,
            arguments: &message.arguments,
            accounts: ctx,
            settings: &self.settings,
        };

        let started = Instant::now();
        let result = AssertUnwindSafe(trigger.trigger(request))
            .catch_unwind()
            .await;
        telemetry::record_dispatch_duration(kind.as_str(), started.elapsed().as_secs_f64());

        match result {
            Ok(Ok(())) => DispatchOutcome::Triggered(kind),
            Ok(Err(TriggerError::Domain(domain))) => {
                debug!(kind = %kind, condition = %domain, "Trigger reported business condition");
                DispatchOutcome::Absorbed(kind, domain)
            }
            Ok(Err(TriggerError::Unexpected(err))) => {
                error!(
                    severity = "critical",
                    kind = %kind,
                    error = ?err,
                    "Uncaught exception: {}",
                    err
                );
                DispatchOutcome::Failed(kind)
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(
                    severity = "critical",
                    kind = %kind,
                    panic = %reason,
                    "Trigger panicked"
                );
                DispatchOutcome::Failed(kind)
            }
        }
    }
}

fn call_label(call: &CallKind) -> &'static str {
    match call {
        CallKind::Trigger(kind) => kind.as_str(),
        CallKind::Unknown => "unknown",
        CallKind::Unrecognized(_) => "unrecognized",
    }
}
