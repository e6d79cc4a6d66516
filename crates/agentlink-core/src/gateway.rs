//! Inbound router: turns peer messages into coordinator work.

use crate::coordinator::SessionCoordinator;
use crate::transport::{SignalSink, emit};
use agentlink_permissions::ApprovalDecision;
use agentlink_types::{Inbound, Signal};
use std::sync::Arc;
use tokio_util::task::TaskTracker;

/// Routes each inbound message. Dispatches and aborts run as tracked tasks so
/// that approval responses keep flowing while a session streams.
pub struct Gateway {
    coordinator: Arc<SessionCoordinator>,
    sink: Arc<dyn SignalSink>,
    tasks: TaskTracker,
}

impl Gateway {
    pub fn new(coordinator: Arc<SessionCoordinator>, sink: Arc<dyn SignalSink>) -> Self {
        Self {
            coordinator,
            sink,
            tasks: TaskTracker::new(),
        }
    }

    pub fn coordinator(&self) -> &Arc<SessionCoordinator> {
        &self.coordinator
    }

    /// Parse and route one line of input. Blank lines are ignored; malformed
    /// ones are answered with an `error` signal.
    pub fn handle_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match serde_json::from_str::<Inbound>(line) {
            Ok(inbound) => self.handle(inbound),
            Err(e) => {
                tracing::warn!(error = %e, "malformed inbound message");
                emit(
                    self.sink.as_ref(),
                    Signal::error(format!("Invalid message: {e}"), None),
                );
            }
        }
    }

    pub fn handle(&self, inbound: Inbound) {
        match inbound {
            Inbound::AgentCommand { command, options } => {
                let coordinator = Arc::clone(&self.coordinator);
                let sink = Arc::clone(&self.sink);
                self.tasks.spawn(async move {
                    coordinator.dispatch(&command, options, sink).await;
                });
            }
            Inbound::ApprovalResponse(response) => {
                let request_id = response.request_id.clone();
                let settled = self
                    .coordinator
                    .gate()
                    .resolve_approval(&request_id, ApprovalDecision::from(response));
                tracing::debug!(request_id, settled, "approval response");
            }
            Inbound::AbortSession { session_id } => {
                let coordinator = Arc::clone(&self.coordinator);
                let sink = Arc::clone(&self.sink);
                self.tasks.spawn(async move {
                    let success = coordinator.abort(&session_id).await;
                    emit(
                        sink.as_ref(),
                        Signal::SessionAborted {
                            session_id,
                            success,
                        },
                    );
                });
            }
            Inbound::CheckSessionStatus { session_id } => {
                let is_active = self.coordinator.registry().is_active(&session_id);
                emit(
                    self.sink.as_ref(),
                    Signal::SessionStatus {
                        session_id,
                        is_active,
                    },
                );
            }
            Inbound::GetActiveSessions => {
                emit(
                    self.sink.as_ref(),
                    Signal::ActiveSessions {
                        sessions: self.coordinator.registry().list_active(),
                    },
                );
            }
        }
    }

    /// Abort every session, then wait for in-flight tasks to finish.
    pub async fn shutdown(&self) {
        self.coordinator.abort_all().await;
        self.tasks.close();
        self.tasks.wait().await;
        tracing::debug!("gateway stopped");
    }

    /// Wait for in-flight tasks without aborting anything.
    pub async fn drain(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }
}
