//! Approval gate: correlates approval requests with the peer's decisions.
//!
//! Each request is parked under a fresh request id until exactly one of these
//! settles it: the peer resolves it, the timeout elapses, or its session is
//! aborted. Whichever happens first wins; later attempts are no-ops.

use crate::types::{ApprovalDecision, ApprovalOutcome};
use agentlink_types::CancelReason;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

/// Default time the peer has to answer an approval request.
pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_millis(55_000);

enum Settlement {
    Decided(ApprovalDecision),
    Aborted,
}

struct PendingApproval {
    tx: oneshot::Sender<Settlement>,
    session_id: Option<String>,
}

/// Pending approval requests, shared by every session in the process.
#[derive(Default)]
pub struct ApprovalGate {
    pending: Mutex<HashMap<String, PendingApproval>>,
}

/// A request parked in the gate and not yet settled.
///
/// Dropping it before [`ParkedApproval::wait`] returns withdraws the request,
/// so a caller that goes away never leaves an entry behind.
pub struct ParkedApproval<'a> {
    gate: &'a ApprovalGate,
    request_id: String,
    rx: oneshot::Receiver<Settlement>,
    finished: bool,
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh, unique request id.
    pub fn new_request_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Register `request_id` as pending without waiting on it yet.
    ///
    /// Returns `None` if a request with the same id is already pending; the
    /// existing request is left untouched.
    pub fn park(&self, request_id: &str, session_id: Option<&str>) -> Option<ParkedApproval<'_>> {
        let (tx, rx) = oneshot::channel();
        match self.lock().entry(request_id.to_string()) {
            Entry::Occupied(_) => {
                tracing::warn!(request_id, "approval request id already pending");
                return None;
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingApproval {
                    tx,
                    session_id: session_id.map(str::to_string),
                });
            }
        }
        tracing::debug!(request_id, ?session_id, "approval requested");
        Some(ParkedApproval {
            gate: self,
            request_id: request_id.to_string(),
            rx,
            finished: false,
        })
    }

    /// Park a request under `request_id` and wait for it to settle.
    ///
    /// `on_cancel` runs once, before returning, when the request ends without
    /// a decision (timeout or session abort). It never runs after a decision,
    /// nor for a duplicate id.
    pub async fn request_approval<F>(
        &self,
        request_id: &str,
        session_id: Option<&str>,
        timeout: Duration,
        on_cancel: F,
    ) -> ApprovalOutcome
    where
        F: FnOnce(CancelReason),
    {
        match self.park(request_id, session_id) {
            Some(parked) => parked.wait(timeout, on_cancel).await,
            None => ApprovalOutcome::Duplicate,
        }
    }

    /// Attach a pending request to `session_id` so [`Self::cancel_session`]
    /// reaches it. Returns false if the request is no longer pending.
    pub fn assign_session(&self, request_id: &str, session_id: &str) -> bool {
        match self.lock().get_mut(request_id) {
            Some(entry) => {
                entry.session_id = Some(session_id.to_string());
                true
            }
            None => false,
        }
    }

    /// Deliver the peer's decision. Returns false if `request_id` is unknown
    /// or already settled.
    pub fn resolve_approval(&self, request_id: &str, decision: ApprovalDecision) -> bool {
        let mut pending = self.lock();
        match pending.remove(request_id) {
            Some(entry) => {
                let _ = entry.tx.send(Settlement::Decided(decision));
                true
            }
            None => {
                tracing::debug!(request_id, "ignoring decision for unknown request");
                false
            }
        }
    }

    /// Settle every outstanding request of `session_id` as aborted.
    /// Returns how many requests were settled.
    pub fn cancel_session(&self, session_id: &str) -> usize {
        let mut pending = self.lock();
        let ids: Vec<String> = pending
            .iter()
            .filter(|(_, p)| p.session_id.as_deref() == Some(session_id))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &ids {
            if let Some(entry) = pending.remove(id) {
                let _ = entry.tx.send(Settlement::Aborted);
            }
        }
        ids.len()
    }

    pub fn is_pending(&self, request_id: &str) -> bool {
        self.lock().contains_key(request_id)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingApproval>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ParkedApproval<'_> {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Wait until the request is settled or `timeout` elapses.
    ///
    /// See [`ApprovalGate::request_approval`] for when `on_cancel` runs.
    pub async fn wait<F>(mut self, timeout: Duration, on_cancel: F) -> ApprovalOutcome
    where
        F: FnOnce(CancelReason),
    {
        let settlement = match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(settlement)) => Some(settlement),
            // Sender dropped without settling: the entry was discarded.
            Ok(Err(_)) => Some(Settlement::Aborted),
            Err(_) => {
                // Settlers send while holding the lock, so once the entry is
                // gone any settlement is already in the channel.
                if self.gate.lock().remove(&self.request_id).is_some() {
                    None
                } else {
                    self.rx.try_recv().ok()
                }
            }
        };
        self.finished = true;

        let request_id = self.request_id.as_str();
        match settlement {
            Some(Settlement::Decided(decision)) => ApprovalOutcome::Decided(decision),
            Some(Settlement::Aborted) => {
                tracing::info!(request_id, "approval request aborted with its session");
                on_cancel(CancelReason::Aborted);
                ApprovalOutcome::Aborted
            }
            None => {
                tracing::warn!(
                    request_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "approval request timed out"
                );
                on_cancel(CancelReason::Timeout);
                ApprovalOutcome::TimedOut
            }
        }
    }
}

impl Drop for ParkedApproval<'_> {
    fn drop(&mut self) {
        if !self.finished && self.gate.lock().remove(&self.request_id).is_some() {
            tracing::debug!(request_id = %self.request_id, "approval request withdrawn");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SHORT: Duration = Duration::from_millis(50);
    const LONG: Duration = Duration::from_secs(5);

    async fn wait_until_pending(gate: &ApprovalGate, request_id: &str) {
        while !gate.is_pending(request_id) {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_resolves_with_decision() {
        let gate = Arc::new(ApprovalGate::new());
        let g = gate.clone();
        let waiter =
            tokio::spawn(async move { g.request_approval("req-1", Some("s1"), LONG, |_| {}).await });

        wait_until_pending(&gate, "req-1").await;
        assert!(gate.resolve_approval("req-1", ApprovalDecision::allow()));

        let outcome = waiter.await.unwrap();
        assert_eq!(outcome, ApprovalOutcome::Decided(ApprovalDecision::allow()));
        assert_eq!(gate.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_times_out_and_cancels_once() {
        let gate = ApprovalGate::new();
        let cancels = AtomicUsize::new(0);
        let outcome = gate
            .request_approval("req-1", None, SHORT, |reason| {
                assert_eq!(reason, CancelReason::Timeout);
                cancels.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert_eq!(outcome, ApprovalOutcome::TimedOut);
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
        assert!(!gate.is_pending("req-1"));
    }

    #[tokio::test]
    async fn test_resolve_after_timeout_is_noop() {
        let gate = ApprovalGate::new();
        let outcome = gate.request_approval("req-1", None, SHORT, |_| {}).await;
        assert_eq!(outcome, ApprovalOutcome::TimedOut);
        assert!(!gate.resolve_approval("req-1", ApprovalDecision::allow()));
    }

    #[tokio::test]
    async fn test_second_resolve_is_noop_and_no_cancel_after_decision() {
        let gate = Arc::new(ApprovalGate::new());
        let cancels = Arc::new(AtomicUsize::new(0));
        let g = gate.clone();
        let c = cancels.clone();
        let waiter = tokio::spawn(async move {
            g.request_approval("req-1", None, Duration::from_millis(200), move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await
        });

        wait_until_pending(&gate, "req-1").await;
        assert!(gate.resolve_approval("req-1", ApprovalDecision::deny("no")));
        assert!(!gate.resolve_approval("req-1", ApprovalDecision::allow()));

        let outcome = waiter.await.unwrap();
        assert_eq!(outcome, ApprovalOutcome::Decided(ApprovalDecision::deny("no")));

        // Well past the original timeout: the cancel callback must stay silent.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(cancels.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_request_is_noop() {
        let gate = ApprovalGate::new();
        assert!(!gate.resolve_approval("missing", ApprovalDecision::allow()));
    }

    #[tokio::test]
    async fn test_cancel_session_aborts_only_its_requests() {
        let gate = Arc::new(ApprovalGate::new());
        let reasons = Arc::new(Mutex::new(Vec::new()));

        let (g, r) = (gate.clone(), reasons.clone());
        let a = tokio::spawn(async move {
            g.request_approval("req-a", Some("s1"), LONG, move |reason| {
                r.lock().unwrap().push(reason);
            })
            .await
        });
        let g = gate.clone();
        let b =
            tokio::spawn(async move { g.request_approval("req-b", Some("s2"), LONG, |_| {}).await });

        wait_until_pending(&gate, "req-a").await;
        wait_until_pending(&gate, "req-b").await;

        assert_eq!(gate.cancel_session("s1"), 1);
        assert_eq!(a.await.unwrap(), ApprovalOutcome::Aborted);
        assert_eq!(*reasons.lock().unwrap(), vec![CancelReason::Aborted]);

        assert!(gate.is_pending("req-b"));
        assert!(gate.resolve_approval("req-b", ApprovalDecision::allow()));
        assert!(matches!(b.await.unwrap(), ApprovalOutcome::Decided(_)));
    }

    #[tokio::test]
    async fn test_independent_requests_settle_independently() {
        let gate = Arc::new(ApprovalGate::new());
        let mut waiters = Vec::new();
        for i in 0..8 {
            let g = gate.clone();
            waiters.push(tokio::spawn(async move {
                let id = format!("req-{i}");
                g.request_approval(&id, None, LONG, |_| {}).await
            }));
        }
        for i in 0..8 {
            wait_until_pending(&gate, &format!("req-{i}")).await;
        }
        for i in 0..8 {
            let decision = if i % 2 == 0 {
                ApprovalDecision::allow()
            } else {
                ApprovalDecision::deny("odd")
            };
            assert!(gate.resolve_approval(&format!("req-{i}"), decision));
        }
        for (i, waiter) in waiters.into_iter().enumerate() {
            let decision = waiter.await.unwrap().decision().unwrap();
            assert_eq!(decision.allow, i % 2 == 0);
        }
        assert_eq!(gate.pending_count(), 0);
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(ApprovalGate::new_request_id(), ApprovalGate::new_request_id());
    }

    #[tokio::test]
    async fn test_dropped_waiter_withdraws_request() {
        let gate = Arc::new(ApprovalGate::new());
        let g = gate.clone();
        let waiter = tokio::spawn(async move {
            g.request_approval("req-x", Some("s1"), Duration::from_secs(60), |_| {})
                .await
        });

        wait_until_pending(&gate, "req-x").await;
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());

        assert!(!gate.is_pending("req-x"));
        assert_eq!(gate.pending_count(), 0);
        assert!(!gate.resolve_approval("req-x", ApprovalDecision::allow()));
        assert_eq!(gate.cancel_session("s1"), 0);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_refused_and_original_survives() {
        let gate = Arc::new(ApprovalGate::new());
        let cancels = Arc::new(AtomicUsize::new(0));
        let g = gate.clone();
        let original =
            tokio::spawn(async move { g.request_approval("req-1", None, LONG, |_| {}).await });
        wait_until_pending(&gate, "req-1").await;

        let c = cancels.clone();
        let outcome = gate
            .request_approval("req-1", None, SHORT, move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert_eq!(outcome, ApprovalOutcome::Duplicate);
        assert_eq!(cancels.load(Ordering::SeqCst), 0);

        assert!(gate.is_pending("req-1"));
        assert!(gate.resolve_approval("req-1", ApprovalDecision::allow()));
        assert_eq!(
            original.await.unwrap(),
            ApprovalOutcome::Decided(ApprovalDecision::allow())
        );
    }

    #[tokio::test]
    async fn test_assigned_session_can_be_cancelled() {
        let gate = ApprovalGate::new();
        let parked = gate.park("req-1", None).unwrap();
        assert_eq!(parked.request_id(), "req-1");
        assert_eq!(gate.cancel_session("s1"), 0);

        assert!(gate.assign_session("req-1", "s1"));
        assert_eq!(gate.cancel_session("s1"), 1);
        assert_eq!(parked.wait(LONG, |_| {}).await, ApprovalOutcome::Aborted);
        assert!(!gate.assign_session("req-1", "s1"));
    }

    #[test]
    fn test_parked_request_withdrawn_on_drop() {
        let gate = ApprovalGate::new();
        let parked = gate.park("req-1", Some("s1")).unwrap();
        assert!(gate.is_pending("req-1"));
        drop(parked);
        assert!(!gate.is_pending("req-1"));
    }
}
