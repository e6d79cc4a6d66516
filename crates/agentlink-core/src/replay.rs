//! Replay backend: serves a recorded JSONL transcript of backend events.
//!
//! Tool-use events go through the session's authorization callback exactly
//! as a live agent would: the event is yielded, the callback is awaited
//! before anything else is replayed, and a denial replaces the recorded
//! tool result with an error result carrying the deny message.

use agentlink_types::{
    AgentBackend, AgentLinkError, AgentSession, AuthorizeOutcome, Authorizer, BackendError,
    BackendEvent, BoxFuture, EventStream, SessionInfo, SessionOptions, ToolRequest,
};
use futures_util::stream;
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Backend that replays the same event transcript for every session.
#[derive(Debug, Clone)]
pub struct ReplayBackend {
    events: Vec<BackendEvent>,
}

impl ReplayBackend {
    pub fn new(events: Vec<BackendEvent>) -> Self {
        Self { events }
    }

    /// Parse a transcript with one backend event object per line.
    pub fn from_jsonl(text: &str) -> Result<Self, AgentLinkError> {
        let mut events = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
                AgentLinkError::Protocol(format!("transcript line {}: {e}", index + 1))
            })?;
            events.push(BackendEvent::from_value(value));
        }
        Ok(Self::new(events))
    }

    pub async fn load(path: &Path) -> Result<Self, AgentLinkError> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::from_jsonl(&text)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl AgentBackend for ReplayBackend {
    fn open_session<'a>(
        &'a self,
        resume_id: Option<&'a str>,
        options: SessionOptions,
    ) -> BoxFuture<'a, Result<Arc<dyn AgentSession>, BackendError>> {
        Box::pin(async move {
            let session = ReplaySession {
                agent_id: resume_id
                    .map(str::to_string)
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                conversation_id: uuid::Uuid::new_v4().to_string(),
                events: self.events.clone(),
                authorize: options.authorize,
                stopped: Arc::new(AtomicBool::new(false)),
            };
            tracing::debug!(
                agent_id = %session.agent_id,
                events = session.events.len(),
                cwd = %options.cwd.display(),
                "replay session opened"
            );
            Ok(Arc::new(session) as Arc<dyn AgentSession>)
        })
    }

    fn name(&self) -> &str {
        "replay"
    }
}

struct ReplaySession {
    agent_id: String,
    conversation_id: String,
    events: Vec<BackendEvent>,
    authorize: Authorizer,
    stopped: Arc<AtomicBool>,
}

struct ReplayState {
    queue: VecDeque<BackendEvent>,
    authorize: Authorizer,
    stopped: Arc<AtomicBool>,
    /// Tool use yielded but not yet authorized.
    awaiting: Option<(String, ToolRequest)>,
    /// Tool uses that were denied; their recorded results are dropped.
    denied: HashSet<String>,
}

impl ReplayState {
    async fn next_event(&mut self) -> Option<BackendEvent> {
        loop {
            if self.stopped.load(Ordering::SeqCst) {
                return None;
            }

            if let Some((tool_use_id, request)) = self.awaiting.take() {
                match (self.authorize)(request).await {
                    AuthorizeOutcome::Allow { updated_input } => {
                        if updated_input.is_some() {
                            tracing::debug!(tool_use_id, "tool input replaced by approval");
                        }
                    }
                    AuthorizeOutcome::Deny { message } => {
                        self.denied.insert(tool_use_id.clone());
                        return Some(BackendEvent::ToolResult {
                            tool_use_id,
                            content: serde_json::Value::String(message),
                            is_error: true,
                        });
                    }
                }
                continue;
            }

            match self.queue.pop_front()? {
                BackendEvent::ToolUse { id, name, input } => {
                    self.awaiting = Some((
                        id.clone(),
                        ToolRequest {
                            tool_name: name.clone(),
                            input: input.clone(),
                        },
                    ));
                    return Some(BackendEvent::ToolUse { id, name, input });
                }
                BackendEvent::ToolResult { tool_use_id, .. }
                    if self.denied.contains(&tool_use_id) =>
                {
                    continue;
                }
                event => return Some(event),
            }
        }
    }
}

impl AgentSession for ReplaySession {
    fn initialize(&self) -> BoxFuture<'_, Result<SessionInfo, BackendError>> {
        Box::pin(async move {
            Ok(SessionInfo {
                agent_id: Some(self.agent_id.clone()),
                conversation_id: Some(self.conversation_id.clone()),
            })
        })
    }

    fn send<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            if self.stopped.load(Ordering::SeqCst) {
                return Err(BackendError::Send("session closed".into()));
            }
            tracing::trace!(agent_id = %self.agent_id, bytes = prompt.len(), "replay ignores prompt");
            Ok(())
        })
    }

    fn stream(&self) -> EventStream {
        let state = ReplayState {
            queue: self.events.iter().cloned().collect(),
            authorize: Arc::clone(&self.authorize),
            stopped: Arc::clone(&self.stopped),
            awaiting: None,
            denied: HashSet::new(),
        };
        Box::pin(stream::unfold(state, |mut state| async move {
            let event = state.next_event().await?;
            Some((Ok(event), state))
        }))
    }

    fn abort(&self) -> BoxFuture<'_, Result<(), BackendError>> {
        self.stopped.store(true, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), BackendError>> {
        self.stopped.store(true, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}
