//! The authorization callback handed to the backend for one dispatch.

use crate::transport::{SignalSink, emit};
use agentlink_permissions::{ApprovalGate, ApprovalOutcome, PermissionDecision, ToolPolicy};
use agentlink_types::{AuthorizeOutcome, Authorizer, BoxFuture, Signal, ToolRequest, preview};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const TIMED_OUT_REASON: &str = "Permission request timed out";
pub const ABORTED_REASON: &str = "Session aborted";
pub const DENIED_REASON: &str = "User denied tool use";
pub const DUPLICATE_REASON: &str = "Duplicate approval request";

/// The session identity of a dispatch, filled in once the backend assigns it.
///
/// The callback may fire before initialization completes, so readers must
/// cope with `None`.
#[derive(Debug, Clone, Default)]
pub struct SessionBinding(Arc<Mutex<Option<String>>>);

impl SessionBinding {
    pub fn new(session_id: Option<String>) -> Self {
        Self(Arc::new(Mutex::new(session_id)))
    }

    pub fn get(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, session_id: impl Into<String>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(session_id.into());
    }
}

/// Entries the peer asked to remember, kept per session for the life of the
/// coordinator and layered onto every later dispatch of that session.
#[derive(Debug, Default)]
pub struct RememberedEntries(Mutex<HashMap<String, Vec<String>>>);

impl RememberedEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, session_id: &str, entry: &str) {
        let mut sessions = self.lock();
        let entries = sessions.entry(session_id.to_string()).or_default();
        if !entries.iter().any(|e| e == entry) {
            entries.push(entry.to_string());
        }
    }

    pub fn entries(&self, session_id: &str) -> Vec<String> {
        self.lock().get(session_id).cloned().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<String>>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Work done before the session identity was known.
#[derive(Debug, Default)]
struct Unbound {
    /// Approval requests parked without a session.
    requests: Vec<String>,
    /// Entries remembered without a session.
    remembered: Vec<String>,
}

/// Decides tool calls for one dispatch: policy first, then the peer.
pub struct ToolAuthorizer {
    policy: Arc<ToolPolicy>,
    gate: Arc<ApprovalGate>,
    sink: Arc<dyn SignalSink>,
    session: SessionBinding,
    timeout: Duration,
    remembered: Option<Arc<RememberedEntries>>,
    unbound: Mutex<Unbound>,
}

impl ToolAuthorizer {
    pub fn new(
        policy: Arc<ToolPolicy>,
        gate: Arc<ApprovalGate>,
        sink: Arc<dyn SignalSink>,
        session: SessionBinding,
        timeout: Duration,
    ) -> Self {
        Self {
            policy,
            gate,
            sink,
            session,
            timeout,
            remembered: None,
            unbound: Mutex::new(Unbound::default()),
        }
    }

    /// Also record remembered entries under the session, so later dispatches
    /// of the same session start with them.
    pub fn with_remembered(mut self, remembered: Arc<RememberedEntries>) -> Self {
        self.remembered = Some(remembered);
        self
    }

    /// Assign the session identity.
    ///
    /// Approvals already waiting without one are moved under it, so aborting
    /// the session reaches them. Entries remembered before now are recorded.
    pub fn bind_session(&self, session_id: &str) {
        let mut unbound = self.lock_unbound();
        self.session.set(session_id);
        for request_id in unbound.requests.drain(..) {
            self.gate.assign_session(&request_id, session_id);
        }
        let entries = std::mem::take(&mut unbound.remembered);
        if let Some(remembered) = &self.remembered {
            for entry in &entries {
                remembered.record(session_id, entry);
            }
        }
    }

    /// Decide one tool call.
    ///
    /// Evaluation order:
    /// 1. Skip-all flag, disallowed entries, allowed entries (see [`ToolPolicy::check`]).
    /// 2. Otherwise send an `approval-request` and wait on the gate.
    pub async fn authorize(&self, request: ToolRequest) -> AuthorizeOutcome {
        match self.policy.check(&request.tool_name, &request.input) {
            PermissionDecision::Permit => return AuthorizeOutcome::allow(),
            PermissionDecision::Block { reason } => return AuthorizeOutcome::deny(reason),
            PermissionDecision::Prompt => {}
        }

        let request_id = ApprovalGate::new_request_id();
        // Park before the request goes out so an immediate answer finds it.
        let (parked, session_id) = {
            let mut unbound = self.lock_unbound();
            let session_id = self.session.get();
            let Some(parked) = self.gate.park(&request_id, session_id.as_deref()) else {
                return AuthorizeOutcome::deny(DUPLICATE_REASON);
            };
            if session_id.is_none() {
                unbound.requests.push(request_id.clone());
            }
            (parked, session_id)
        };
        tracing::debug!(
            request_id,
            ?session_id,
            tool = %request.tool_name,
            input = %preview(&request.input.to_string(), 120),
            "asking peer for approval"
        );

        emit(
            self.sink.as_ref(),
            Signal::ApprovalRequest {
                request_id: request_id.clone(),
                tool_name: request.tool_name.clone(),
                input: request.input.clone(),
                session_id: session_id.clone(),
            },
        );

        let outcome = parked
            .wait(self.timeout, |reason| {
                emit(
                    self.sink.as_ref(),
                    Signal::ApprovalCancelled {
                        request_id: request_id.clone(),
                        reason,
                        session_id: self.session.get(),
                    },
                );
            })
            .await;
        if session_id.is_none() {
            self.lock_unbound().requests.retain(|id| id != &request_id);
        }

        self.interpret(outcome)
    }

    fn interpret(&self, outcome: ApprovalOutcome) -> AuthorizeOutcome {
        let decision = match outcome {
            ApprovalOutcome::Decided(decision) => decision,
            ApprovalOutcome::TimedOut => return AuthorizeOutcome::deny(TIMED_OUT_REASON),
            ApprovalOutcome::Aborted => return AuthorizeOutcome::deny(ABORTED_REASON),
            ApprovalOutcome::Duplicate => return AuthorizeOutcome::deny(DUPLICATE_REASON),
        };

        if !decision.allow {
            return AuthorizeOutcome::deny(
                decision
                    .message
                    .unwrap_or_else(|| DENIED_REASON.to_string()),
            );
        }

        if let Some(entry) = decision.remember_entry.filter(|e| !e.trim().is_empty()) {
            tracing::info!(entry, "remembering allowed entry");
            self.policy.remember(&entry);
            self.record_remembered(&entry);
        }

        AuthorizeOutcome::Allow {
            updated_input: decision.updated_input,
        }
    }

    fn record_remembered(&self, entry: &str) {
        let Some(remembered) = &self.remembered else {
            return;
        };
        let mut unbound = self.lock_unbound();
        match self.session.get() {
            Some(session_id) => remembered.record(&session_id, entry),
            None => unbound.remembered.push(entry.to_string()),
        }
    }

    fn lock_unbound(&self) -> MutexGuard<'_, Unbound> {
        self.unbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wrap into the capability the backend receives.
    pub fn into_authorizer(self: Arc<Self>) -> Authorizer {
        Arc::new(move |request: ToolRequest| {
            let this = Arc::clone(&self);
            Box::pin(async move { this.authorize(request).await }) as BoxFuture<'static, _>
        })
    }
}
