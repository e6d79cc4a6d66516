//! Collaborator traits for the agent backend.
//!
//! The backend owns session creation, prompt submission, and the event stream.
//! AgentLink only drives it through these traits, which use
//! `Pin<Box<dyn Future>>` so that `Arc<dyn AgentBackend>` stays dyn-compatible.

use crate::{BackendError, BackendEvent, PermissionMode};
use futures_core::Stream;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A boxed async stream of events from one backend session.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<BackendEvent, BackendError>> + Send>>;

/// A tool invocation the backend wants authorized.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRequest {
    pub tool_name: String,
    pub input: serde_json::Value,
}

/// Answer to a [`ToolRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizeOutcome {
    /// Run the tool, optionally with a replacement input payload.
    Allow {
        updated_input: Option<serde_json::Value>,
    },
    /// Refuse the tool; `message` is reported back to the agent.
    Deny { message: String },
}

impl AuthorizeOutcome {
    pub fn allow() -> Self {
        Self::Allow {
            updated_input: None,
        }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self::Deny {
            message: message.into(),
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }
}

/// Authorization capability handed to the backend when a session is opened.
///
/// The backend calls it whenever a tool use needs a decision and awaits the
/// returned future; the session makes no forward progress while it is pending.
pub type Authorizer = Arc<dyn Fn(ToolRequest) -> BoxFuture<'static, AuthorizeOutcome> + Send + Sync>;

/// Options for opening or resuming a backend session.
#[derive(Clone)]
pub struct SessionOptions {
    pub cwd: PathBuf,
    pub permission_mode: PermissionMode,
    pub model: Option<String>,
    pub authorize: Authorizer,
}

impl std::fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOptions")
            .field("cwd", &self.cwd)
            .field("permission_mode", &self.permission_mode)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Identity assigned by the backend during initialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionInfo {
    pub agent_id: Option<String>,
    pub conversation_id: Option<String>,
}

/// One live backend session.
pub trait AgentSession: Send + Sync {
    /// Finish opening the session and report its identity.
    fn initialize(&self) -> BoxFuture<'_, Result<SessionInfo, BackendError>>;

    /// Submit a prompt.
    fn send<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<(), BackendError>>;

    /// The lazy, finite event sequence for the current dispatch.
    fn stream(&self) -> EventStream;

    fn abort(&self) -> BoxFuture<'_, Result<(), BackendError>>;

    fn close(&self) -> BoxFuture<'_, Result<(), BackendError>>;
}

/// Factory for backend sessions.
pub trait AgentBackend: Send + Sync {
    /// Open a new session, or resume `resume_id` when given.
    fn open_session<'a>(
        &'a self,
        resume_id: Option<&'a str>,
        options: SessionOptions,
    ) -> BoxFuture<'a, Result<Arc<dyn AgentSession>, BackendError>>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
