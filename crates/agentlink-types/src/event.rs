//! Typed events produced by an agent backend session.

use serde::Deserialize;

/// One event from a backend session's stream.
///
/// Backends that speak JSON can build these with [`BackendEvent::from_value`],
/// which never fails: payloads with an unrecognized or malformed `type` land in
/// [`BackendEvent::Unknown`] so callers decide what to do with them.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// A raw streaming sub-event (partial message deltas and the like).
    StreamDelta(serde_json::Value),
    /// A complete piece of assistant text.
    AssistantText { text: String },
    /// The agent invoked a tool.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Result of a tool invocation, as recorded by the backend.
    ToolResult {
        tool_use_id: String,
        content: serde_json::Value,
        is_error: bool,
    },
    /// Terminal event: the dispatch has finished.
    Result(ResultEvent),
    /// Anything else, kept intact.
    Unknown {
        kind: String,
        payload: serde_json::Value,
    },
}

/// Payload of a terminal result event.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResultEvent {
    pub success: bool,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ResultEvent {
    pub fn success() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TaggedEvent {
    StreamEvent {
        event: serde_json::Value,
    },
    Assistant {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
    Result(ResultEvent),
}

impl BackendEvent {
    /// Classify a JSON payload by its `type` tag.
    pub fn from_value(value: serde_json::Value) -> Self {
        match serde_json::from_value::<TaggedEvent>(value.clone()) {
            Ok(TaggedEvent::StreamEvent { event }) => Self::StreamDelta(event),
            Ok(TaggedEvent::Assistant { text }) => Self::AssistantText { text },
            Ok(TaggedEvent::ToolUse { id, name, input }) => Self::ToolUse { id, name, input },
            Ok(TaggedEvent::ToolResult {
                tool_use_id,
                content,
                is_error,
            }) => Self::ToolResult {
                tool_use_id,
                content,
                is_error,
            },
            Ok(TaggedEvent::Result(result)) => Self::Result(result),
            Err(_) => {
                let kind = value
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("untagged")
                    .to_string();
                Self::Unknown {
                    kind,
                    payload: value,
                }
            }
        }
    }

    /// Short label for logging.
    pub fn kind(&self) -> &str {
        match self {
            Self::StreamDelta(_) => "stream_event",
            Self::AssistantText { .. } => "assistant",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
            Self::Result(_) => "result",
            Self::Unknown { kind, .. } => kind.as_str(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result(_))
    }
}
