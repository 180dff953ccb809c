// Property-based tests for message dispatch and self-approval
// Feature: bookied

use async_trait::async_trait;
use common::approve::Reconciler;
use common::chain::ChainClient;
use common::config::Settings;
use common::dispatch::{
    DispatchContext, DispatchOutcome, Dispatcher, Trigger, TriggerRequest, TriggerResult,
    TriggerSet,
};
use common::errors::{ChainError, DomainError, MessageError, TriggerError};
use common::models::{Account, Message, Proposal, TriggerKind};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// What a scripted trigger does when invoked
#[derive(Clone)]
enum Behaviour {
    Succeed,
    Domain(DomainError),
    Fail,
}

struct ScriptedTrigger {
    kind: TriggerKind,
    behaviour: Behaviour,
    calls: Arc<Mutex<Vec<(TriggerKind, Value)>>>,
}

#[async_trait]
impl Trigger for ScriptedTrigger {
    async fn trigger(&self, request: TriggerRequest<'_>) -> TriggerResult {
        self.calls
            .lock()
            .unwrap()
            .push((self.kind, request.arguments.clone()));
        match &self.behaviour {
            Behaviour::Succeed => Ok(()),
            Behaviour::Domain(err) => Err(TriggerError::Domain(*err)),
            Behaviour::Fail => Err(anyhow::anyhow!("rpc connection reset").into()),
        }
    }
}

fn dispatcher(behaviour: Behaviour) -> (Dispatcher, Arc<Mutex<Vec<(TriggerKind, Value)>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let build = |kind| -> Arc<dyn Trigger> {
        Arc::new(ScriptedTrigger {
            kind,
            behaviour: behaviour.clone(),
            calls: Arc::clone(&calls),
        })
    };
    let set = TriggerSet {
        create: build(TriggerKind::Create),
        in_progress: build(TriggerKind::InProgress),
        finish: build(TriggerKind::Finish),
        result: build(TriggerKind::Result),
    };
    (
        Dispatcher::new(Arc::new(set), Arc::new(Settings::default())),
        calls,
    )
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn trigger_kind() -> impl Strategy<Value = TriggerKind> {
    prop::sample::select(TriggerKind::ALL.to_vec())
}

fn domain_error() -> impl Strategy<Value = DomainError> {
    prop::sample::select(DomainError::ALL.to_vec())
}

fn arguments() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,12}".prop_map(Value::from),
        ("[a-z]{1,8}", any::<u32>()).prop_map(|(k, v)| json!({ k: v, "nested": [v] })),
    ]
}

/// Randomly flip ASCII case so routing must be case-insensitive
fn mixed_case(call: &str, mask: u64) -> String {
    call.chars()
        .enumerate()
        .map(|(i, c)| {
            if mask & (1 << (i % 64)) != 0 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

/// For any trigger call, exactly the matching trigger runs once with the
/// message arguments unchanged.
#[test]
fn property_trigger_calls_route_exactly_once() {
    proptest!(|(kind in trigger_kind(), mask in any::<u64>(), args in arguments())| {
        let (dispatcher, calls) = dispatcher(Behaviour::Succeed);
        let message = Message::from_value(json!({
            "id": "evt-1",
            "call": mixed_case(kind.as_str(), mask),
            "arguments": args.clone(),
        })).unwrap();

        let mut ctx = DispatchContext::default();
        let outcome = block_on(dispatcher.dispatch(&mut ctx, &message, None, None));

        prop_assert_eq!(outcome, DispatchOutcome::Triggered(kind));
        let calls = calls.lock().unwrap();
        prop_assert_eq!(calls.len(), 1);
        prop_assert_eq!(calls[0].0, kind);
        prop_assert_eq!(&calls[0].1, &args);
    });
}

/// `unknown` never triggers; unrecognized calls are reported but never fail.
#[test]
fn property_unknown_and_unrecognized_calls_do_not_trigger() {
    proptest!(|(call in "[a-z_]{1,16}", mask in any::<u64>())| {
        prop_assume!(!["create", "in_progress", "finish", "result"].contains(&call.as_str()));

        let (dispatcher, calls) = dispatcher(Behaviour::Succeed);
        let message = Message::from_value(json!({
            "id": 1,
            "call": mixed_case(&call, mask),
        })).unwrap();

        let mut ctx = DispatchContext::default();
        let outcome = block_on(dispatcher.dispatch(&mut ctx, &message, None, None));

        if call == "unknown" {
            prop_assert_eq!(outcome, DispatchOutcome::Skipped);
        } else {
            prop_assert_eq!(outcome, DispatchOutcome::Unrecognized(call.clone()));
        }
        prop_assert!(calls.lock().unwrap().is_empty());
    });
}

/// Every business-rule condition is absorbed; unexpected failures are
/// absorbed as well and reported as failed.
#[test]
fn property_trigger_failures_are_isolated() {
    proptest!(|(kind in trigger_kind(), domain in domain_error(), unexpected in any::<bool>())| {
        let behaviour = if unexpected { Behaviour::Fail } else { Behaviour::Domain(domain) };
        let (dispatcher, calls) = dispatcher(behaviour);
        let message = Message::from_value(json!({"id": 7, "call": kind.as_str()})).unwrap();

        let mut ctx = DispatchContext::default();
        let outcome = block_on(dispatcher.dispatch(&mut ctx, &message, None, None));

        if unexpected {
            prop_assert_eq!(outcome, DispatchOutcome::Failed(kind));
        } else {
            prop_assert_eq!(outcome, DispatchOutcome::Absorbed(kind, domain));
        }
        prop_assert_eq!(calls.lock().unwrap().len(), 1);
    });
}

/// Override > message value > previous value, for both accounts.
#[test]
fn property_account_override_precedence() {
    let account = || proptest::option::of("[a-z0-9-]{1,12}");
    proptest!(|(
        previous in account(),
        embedded in account(),
        override_account in account(),
    )| {
        let (dispatcher, _) = dispatcher(Behaviour::Succeed);
        let mut raw = json!({"id": 1, "call": "unknown"});
        if let Some(embedded) = &embedded {
            raw["approver"] = json!(embedded);
            raw["proposer"] = json!(embedded);
        }
        let message = Message::from_value(raw).unwrap();

        let mut ctx = DispatchContext::new(previous.clone(), previous.clone());
        block_on(dispatcher.dispatch(
            &mut ctx,
            &message,
            override_account.as_deref(),
            override_account.as_deref(),
        ));

        let expected = override_account.or(embedded).or(previous);
        prop_assert_eq!(ctx.approving_account(), expected.as_deref());
        prop_assert_eq!(ctx.proposing_account(), expected.as_deref());
    });
}

/// Missing `id` is a contract violation, distinct from any business rule.
#[test]
fn property_missing_id_is_a_precondition_failure() {
    proptest!(|(kind in trigger_kind(), args in arguments())| {
        let result = Message::from_value(json!({"call": kind.as_str(), "arguments": args}));
        prop_assert_eq!(result.unwrap_err(), MessageError::MissingId);
    });
}

/// In-memory chain: approving adds the approver to the proposal's approvals.
struct LedgerChain {
    accounts: HashMap<String, Account>,
    proposals: Mutex<Vec<Proposal>>,
    submissions: Mutex<Vec<String>>,
}

impl LedgerChain {
    fn new(accounts: &[(&str, &str)], proposals: Vec<Proposal>) -> Self {
        let mut by_key = HashMap::new();
        for (id, name) in accounts {
            let account = Account {
                id: id.to_string(),
                name: name.to_string(),
            };
            by_key.insert(id.to_string(), account.clone());
            by_key.insert(name.to_string(), account);
        }
        Self {
            accounts: by_key,
            proposals: Mutex::new(proposals),
            submissions: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChainClient for LedgerChain {
    async fn pending_proposals(&self, _scope: &str) -> Result<Vec<Proposal>, ChainError> {
        Ok(self.proposals.lock().unwrap().clone())
    }

    async fn account(&self, name_or_id: &str) -> Result<Account, ChainError> {
        self.accounts
            .get(name_or_id)
            .cloned()
            .ok_or_else(|| ChainError::AccountNotFound(name_or_id.to_string()))
    }

    async fn approve_proposal(
        &self,
        proposal_id: &str,
        approver: &str,
    ) -> Result<Value, ChainError> {
        let approver_id = self.account(approver).await?.id;
        let mut proposals = self.proposals.lock().unwrap();
        let proposal = proposals
            .iter_mut()
            .find(|p| p.id == proposal_id)
            .ok_or_else(|| ChainError::Rpc {
                method: "approve_proposal".to_string(),
                message: format!("unknown proposal {}", proposal_id),
            })?;
        proposal.available_active_approvals.push(approver_id);
        self.submissions.lock().unwrap().push(proposal_id.to_string());
        Ok(json!({"proposal": proposal_id}))
    }
}

fn reconciler(chain: Arc<LedgerChain>) -> Reconciler {
    let mut settings = Settings::default();
    settings.bookie.proposer = Some("init0".to_string());
    settings.bookie.approver = Some("init1".to_string());
    Reconciler::new(chain, &settings.bookie, &settings.chain)
}

/// A second pass right after a successful one submits nothing, and proposals
/// from other proposers are never approved.
#[test]
fn property_reconcile_is_idempotent_and_scoped() {
    proptest!(|(shapes in prop::collection::vec((any::<bool>(), any::<bool>()), 0..12))| {
        let proposals: Vec<Proposal> = shapes
            .iter()
            .enumerate()
            .map(|(i, (ours, approved))| Proposal {
                id: format!("1.10.{}", i),
                proposer: if *ours { "1.2.7".to_string() } else { "1.2.9".to_string() },
                available_active_approvals: if *approved { vec!["1.2.8".to_string()] } else { vec![] },
            })
            .collect();
        let expected: Vec<String> = proposals
            .iter()
            .zip(&shapes)
            .filter(|(_, (ours, approved))| *ours && !*approved)
            .map(|(p, _)| p.id.clone())
            .collect();

        let chain = Arc::new(LedgerChain::new(
            &[("1.2.7", "init0"), ("1.2.8", "init1"), ("1.2.9", "outsider")],
            proposals,
        ));
        let reconciler = reconciler(Arc::clone(&chain));

        let first = block_on(reconciler.reconcile(None, None)).unwrap();
        prop_assert_eq!(&first.approved, &expected);

        let second = block_on(reconciler.reconcile(None, None)).unwrap();
        prop_assert!(second.approved.is_empty());
        prop_assert_eq!(chain.submissions.lock().unwrap().len(), expected.len());

        for proposal in chain.proposals.lock().unwrap().iter() {
            if proposal.proposer == "1.2.9" {
                prop_assert!(!expected.contains(&proposal.id));
            } else {
                prop_assert!(proposal.is_approved_by("1.2.8"));
            }
        }
    });
}
