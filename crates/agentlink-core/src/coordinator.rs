//! Session coordinator: one dispatch from open to terminal event.
//!
//! ```text
//! Initializing ──ok──▶ Streaming ──result──▶ Completed
//!      │                   │
//!      └──err──▶ Failed ◀──┘ (send/stream error, stream ended early)
//! ```

use crate::authorize::{RememberedEntries, SessionBinding, ToolAuthorizer};
use crate::error::CoordinatorError;
use crate::registry::{SessionRecord, SessionRegistry};
use crate::transport::{SignalSink, emit};
use crate::translate::{Translation, translate};
use agentlink_permissions::{ApprovalGate, DEFAULT_APPROVAL_TIMEOUT, ToolPolicy};
use agentlink_types::{
    AgentBackend, AgentSession, DispatchOptions, PermissionMode, SessionInfo, SessionOptions,
    Signal, ToolsSettings, preview,
};
use futures_util::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Where a dispatch is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Initializing,
    Streaming,
    Completed,
    Failed,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Outcome of one [`SessionCoordinator::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// `None` when the session never got an identity.
    pub session_id: Option<String>,
    pub phase: SessionPhase,
}

/// Process-level defaults applied to every dispatch.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub approval_timeout: Duration,
    /// Used when a dispatch names no permission mode.
    pub permission_mode: PermissionMode,
    /// Used when a dispatch names neither `cwd` nor `projectPath`.
    pub default_cwd: Option<PathBuf>,
    pub model: Option<String>,
    /// Used when a dispatch carries no `toolsSettings`.
    pub default_tools: ToolsSettings,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            approval_timeout: DEFAULT_APPROVAL_TIMEOUT,
            permission_mode: PermissionMode::Default,
            default_cwd: None,
            model: None,
            default_tools: ToolsSettings::default(),
        }
    }
}

/// Drives dispatches against one backend, sharing a registry and an approval gate.
pub struct SessionCoordinator {
    backend: Arc<dyn AgentBackend>,
    registry: Arc<SessionRegistry>,
    gate: Arc<ApprovalGate>,
    remembered: Arc<RememberedEntries>,
    config: CoordinatorConfig,
}

impl SessionCoordinator {
    pub fn new(
        backend: Arc<dyn AgentBackend>,
        registry: Arc<SessionRegistry>,
        gate: Arc<ApprovalGate>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            backend,
            registry,
            gate,
            remembered: Arc::new(RememberedEntries::new()),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn gate(&self) -> &Arc<ApprovalGate> {
        &self.gate
    }

    /// Entries remembered from approval decisions, per session.
    pub fn remembered(&self) -> &Arc<RememberedEntries> {
        &self.remembered
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Run one dispatch to a terminal phase, reporting everything through `sink`.
    ///
    /// Failures never escape: they become an `error` signal and a
    /// [`SessionPhase::Failed`] report.
    pub async fn dispatch(
        &self,
        command: &str,
        options: DispatchOptions,
        sink: Arc<dyn SignalSink>,
    ) -> DispatchReport {
        let cwd = self.resolve_cwd(&options);
        let tools = options
            .tools_settings
            .clone()
            .unwrap_or_else(|| self.config.default_tools.clone());
        let permission_mode = effective_permission_mode(
            options.permission_mode.unwrap_or(self.config.permission_mode),
            tools.skip_permissions,
        );
        let model = options.model.clone().or_else(|| self.config.model.clone());

        let policy = ToolPolicy::from(tools);
        if let Some(resume_id) = options.session_id.as_deref() {
            for entry in self.remembered.entries(resume_id) {
                policy.remember(&entry);
            }
        }

        let binding = SessionBinding::new(options.session_id.clone());
        let authorizer = Arc::new(
            ToolAuthorizer::new(
                Arc::new(policy),
                Arc::clone(&self.gate),
                Arc::clone(&sink),
                binding.clone(),
                self.config.approval_timeout,
            )
            .with_remembered(Arc::clone(&self.remembered)),
        );
        let session_options = SessionOptions {
            cwd: cwd.clone(),
            permission_mode,
            model,
            authorize: Arc::clone(&authorizer).into_authorizer(),
        };

        tracing::debug!(
            phase = ?SessionPhase::Initializing,
            backend = self.backend.name(),
            resume = ?options.session_id,
            cwd = %cwd.display(),
            mode = permission_mode.as_str(),
            "dispatch started"
        );

        let (handle, info, session_id) = match self
            .initialize(options.session_id.as_deref(), session_options)
            .await
        {
            Ok(opened) => opened,
            Err(e) => {
                tracing::debug!(phase = ?SessionPhase::Failed, error = %e, "initialization failed");
                emit(sink.as_ref(), Signal::error(e.to_string(), binding.get()));
                return DispatchReport {
                    session_id: None,
                    phase: SessionPhase::Failed,
                };
            }
        };

        self.registry.register(
            session_id.clone(),
            SessionRecord::new(Arc::clone(&handle), info.conversation_id.clone(), cwd),
        );
        authorizer.bind_session(&session_id);
        sink.bind_session(&session_id);
        emit(
            sink.as_ref(),
            Signal::SessionCreated {
                session_id: session_id.clone(),
                agent_id: info.agent_id.clone(),
                conversation_id: info.conversation_id.clone(),
            },
        );
        tracing::debug!(phase = ?SessionPhase::Streaming, session_id, "session ready");

        let phase = match stream_dispatch(
            handle.as_ref(),
            command,
            &session_id,
            info.conversation_id.as_deref(),
            sink.as_ref(),
        )
        .await
        {
            Ok(()) => SessionPhase::Completed,
            Err(e) => {
                emit(
                    sink.as_ref(),
                    Signal::error(e.to_string(), Some(session_id.clone())),
                );
                tracing::debug!(session_id, error = %e, "stream failed");
                SessionPhase::Failed
            }
        };

        tracing::debug!(?phase, session_id, "dispatch finished");
        DispatchReport {
            session_id: Some(session_id),
            phase,
        }
    }

    /// Abort a session: settle its outstanding approvals as aborted, then
    /// abort, close, and unregister its handle. Returns whether it was registered.
    pub async fn abort(&self, session_id: &str) -> bool {
        let cancelled = self.gate.cancel_session(session_id);
        if cancelled > 0 {
            tracing::info!(session_id, cancelled, "settled pending approvals as aborted");
        }
        self.registry.abort(session_id).await
    }

    /// Abort every registered session.
    pub async fn abort_all(&self) {
        for session_id in self.registry.list_active() {
            self.abort(&session_id).await;
        }
    }

    async fn initialize(
        &self,
        resume_id: Option<&str>,
        options: SessionOptions,
    ) -> Result<(Arc<dyn AgentSession>, SessionInfo, String), CoordinatorError> {
        let handle = self
            .backend
            .open_session(resume_id, options)
            .await
            .map_err(CoordinatorError::Initialization)?;

        let info = match handle.initialize().await {
            Ok(info) => info,
            Err(e) => {
                close_quietly(handle.as_ref()).await;
                return Err(CoordinatorError::Initialization(e));
            }
        };

        match info.agent_id.clone().or_else(|| resume_id.map(str::to_string)) {
            Some(session_id) => Ok((handle, info, session_id)),
            None => {
                close_quietly(handle.as_ref()).await;
                Err(CoordinatorError::MissingIdentity)
            }
        }
    }

    fn resolve_cwd(&self, options: &DispatchOptions) -> PathBuf {
        options
            .cwd
            .clone()
            .or_else(|| options.project_path.clone())
            .or_else(|| self.config.default_cwd.clone())
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// A skip-all policy opens the session in `bypassPermissions`, except in plan mode.
pub fn effective_permission_mode(requested: PermissionMode, skip_permissions: bool) -> PermissionMode {
    if skip_permissions && requested != PermissionMode::Plan {
        PermissionMode::BypassPermissions
    } else {
        requested
    }
}

async fn stream_dispatch(
    handle: &dyn AgentSession,
    command: &str,
    session_id: &str,
    conversation_id: Option<&str>,
    sink: &dyn SignalSink,
) -> Result<(), CoordinatorError> {
    if !command.trim().is_empty() {
        tracing::debug!(session_id, prompt = %preview(command, 80), "sending prompt");
        handle.send(command).await.map_err(CoordinatorError::Stream)?;
    }

    let mut events = handle.stream();
    while let Some(item) = events.next().await {
        let event = item.map_err(CoordinatorError::Stream)?;
        tracing::trace!(session_id, kind = event.kind(), "backend event");
        match translate(event, session_id, conversation_id) {
            Translation::Forward(signal) => emit(sink, signal),
            Translation::Finish(signal) => {
                emit(sink, signal);
                return Ok(());
            }
        }
    }
    Err(CoordinatorError::StreamEnded)
}

async fn close_quietly(handle: &dyn AgentSession) {
    if let Err(e) = handle.close().await {
        tracing::debug!(error = %e, "close after failed initialization");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_permissions_bypasses_unless_planning() {
        assert_eq!(
            effective_permission_mode(PermissionMode::Default, true),
            PermissionMode::BypassPermissions
        );
        assert_eq!(
            effective_permission_mode(PermissionMode::AcceptEdits, true),
            PermissionMode::BypassPermissions
        );
        assert_eq!(
            effective_permission_mode(PermissionMode::Plan, true),
            PermissionMode::Plan
        );
        assert_eq!(
            effective_permission_mode(PermissionMode::AcceptEdits, false),
            PermissionMode::AcceptEdits
        );
    }

    #[test]
    fn test_only_completed_and_failed_are_terminal() {
        assert!(SessionPhase::Completed.is_terminal());
        assert!(SessionPhase::Failed.is_terminal());
        assert!(!SessionPhase::Initializing.is_terminal());
        assert!(!SessionPhase::Streaming.is_terminal());
    }
}
