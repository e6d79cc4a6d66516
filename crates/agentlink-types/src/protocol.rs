//! Wire protocol between AgentLink and the remote peer.
//!
//! Every message is a JSON object with a kebab-case `type` discriminant and
//! camelCase fields.

use crate::{Message, Role};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the backend should treat tool permissions for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    #[default]
    Default,
    AcceptEdits,
    BypassPermissions,
    Plan,
}

impl PermissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::BypassPermissions => "bypassPermissions",
            Self::Plan => "plan",
        }
    }
}

impl std::str::FromStr for PermissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "acceptEdits" => Ok(Self::AcceptEdits),
            "bypassPermissions" => Ok(Self::BypassPermissions),
            "plan" => Ok(Self::Plan),
            other => Err(format!("unknown permission mode '{other}'")),
        }
    }
}

/// Caller-supplied tool policy for one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsSettings {
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub disallowed_tools: Vec<String>,
    #[serde(default)]
    pub skip_permissions: bool,
}

/// Options of an `agent-command`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOptions {
    /// Resume this session instead of opening a new one.
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub project_path: Option<PathBuf>,
    #[serde(default)]
    pub permission_mode: Option<PermissionMode>,
    #[serde(default)]
    pub tools_settings: Option<ToolsSettings>,
    #[serde(default)]
    pub model: Option<String>,
}

/// The peer's answer to an `approval-request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponse {
    pub request_id: String,
    pub allow: bool,
    #[serde(default)]
    pub message: Option<String>,
    /// Policy entry to add to the allowed set for the rest of the dispatch.
    #[serde(default)]
    pub remember_entry: Option<String>,
    #[serde(default)]
    pub updated_input: Option<serde_json::Value>,
}

/// Messages received from the peer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Inbound {
    AgentCommand {
        #[serde(default)]
        command: String,
        #[serde(default)]
        options: DispatchOptions,
    },
    ApprovalResponse(ApprovalResponse),
    AbortSession {
        session_id: String,
    },
    CheckSessionStatus {
        session_id: String,
    },
    GetActiveSessions,
}

/// Why an approval request was withdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelReason {
    Timeout,
    Aborted,
}

/// A translated backend message, tagged with its role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    #[serde(rename = "type")]
    pub kind: Role,
    pub message: Message,
}

impl From<Message> for MessageEnvelope {
    fn from(message: Message) -> Self {
        Self {
            kind: message.role,
            message,
        }
    }
}

/// Payload of a `streamed-response` signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    Message(MessageEnvelope),
    /// Backend payload forwarded verbatim.
    Raw(serde_json::Value),
}

/// Messages sent to the peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Signal {
    SessionCreated {
        session_id: String,
        agent_id: Option<String>,
        conversation_id: Option<String>,
    },
    ApprovalRequest {
        request_id: String,
        tool_name: String,
        input: serde_json::Value,
        session_id: Option<String>,
    },
    ApprovalCancelled {
        request_id: String,
        reason: CancelReason,
        session_id: Option<String>,
    },
    StreamedResponse {
        data: ResponseData,
        session_id: Option<String>,
    },
    Completion {
        session_id: Option<String>,
        exit_code: i32,
        success: bool,
        duration_ms: Option<u64>,
        total_cost_usd: Option<f64>,
        conversation_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Error {
        error: String,
        session_id: Option<String>,
    },
    SessionStatus {
        session_id: String,
        is_active: bool,
    },
    ActiveSessions {
        sessions: Vec<String>,
    },
    SessionAborted {
        session_id: String,
        success: bool,
    },
}

impl Signal {
    /// The wire discriminant, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session-created",
            Self::ApprovalRequest { .. } => "approval-request",
            Self::ApprovalCancelled { .. } => "approval-cancelled",
            Self::StreamedResponse { .. } => "streamed-response",
            Self::Completion { .. } => "completion",
            Self::Error { .. } => "error",
            Self::SessionStatus { .. } => "session-status",
            Self::ActiveSessions { .. } => "active-sessions",
            Self::SessionAborted { .. } => "session-aborted",
        }
    }

    pub fn error(error: impl Into<String>, session_id: Option<String>) -> Self {
        Self::Error {
            error: error.into(),
            session_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_agent_command_with_options() {
        let inbound: Inbound = serde_json::from_value(json!({
            "type": "agent-command",
            "command": "list files",
            "options": {
                "sessionId": "abc",
                "cwd": "/work",
                "permissionMode": "bypassPermissions",
                "toolsSettings": {
                    "allowedTools": ["Read"],
                    "disallowedTools": ["Bash(rm:*)"],
                    "skipPermissions": false
                }
            }
        }))
        .unwrap();

        let Inbound::AgentCommand { command, options } = inbound else {
            panic!("expected agent-command");
        };
        assert_eq!(command, "list files");
        assert_eq!(options.session_id.as_deref(), Some("abc"));
        assert_eq!(options.cwd, Some(PathBuf::from("/work")));
        assert_eq!(options.permission_mode, Some(PermissionMode::BypassPermissions));
        let tools = options.tools_settings.unwrap();
        assert_eq!(tools.allowed_tools, vec!["Read"]);
        assert_eq!(tools.disallowed_tools, vec!["Bash(rm:*)"]);
    }

    #[test]
    fn test_agent_command_options_default_when_missing() {
        let inbound: Inbound =
            serde_json::from_value(json!({"type": "agent-command", "command": "hi"})).unwrap();
        assert_eq!(
            inbound,
            Inbound::AgentCommand {
                command: "hi".into(),
                options: DispatchOptions::default(),
            }
        );
    }

    #[test]
    fn test_parses_approval_response() {
        let inbound: Inbound = serde_json::from_value(json!({
            "type": "approval-response",
            "requestId": "req-1",
            "allow": true,
            "rememberEntry": "Bash(ls:*)"
        }))
        .unwrap();
        let Inbound::ApprovalResponse(resp) = inbound else {
            panic!("expected approval-response");
        };
        assert_eq!(resp.request_id, "req-1");
        assert!(resp.allow);
        assert_eq!(resp.remember_entry.as_deref(), Some("Bash(ls:*)"));
        assert!(resp.updated_input.is_none());
    }

    #[test]
    fn test_parses_unit_and_session_queries() {
        let inbound: Inbound =
            serde_json::from_value(json!({"type": "get-active-sessions"})).unwrap();
        assert_eq!(inbound, Inbound::GetActiveSessions);

        let inbound: Inbound =
            serde_json::from_value(json!({"type": "abort-session", "sessionId": "s1"})).unwrap();
        assert_eq!(
            inbound,
            Inbound::AbortSession {
                session_id: "s1".into()
            }
        );
    }

    #[test]
    fn test_rejects_unknown_permission_mode() {
        let result: Result<DispatchOptions, _> =
            serde_json::from_value(json!({"permissionMode": "yolo"}));
        assert!(result.is_err());
        assert!("yolo".parse::<PermissionMode>().is_err());
        assert_eq!("plan".parse::<PermissionMode>(), Ok(PermissionMode::Plan));
    }

    #[test]
    fn test_approval_request_wire_shape() {
        let signal = Signal::ApprovalRequest {
            request_id: "req-1".into(),
            tool_name: "Bash".into(),
            input: json!({"command": "ls"}),
            session_id: Some("s1".into()),
        };
        assert_eq!(
            serde_json::to_value(&signal).unwrap(),
            json!({
                "type": "approval-request",
                "requestId": "req-1",
                "toolName": "Bash",
                "input": {"command": "ls"},
                "sessionId": "s1"
            })
        );
    }

    #[test]
    fn test_completion_omits_missing_error_but_keeps_nulls() {
        let signal = Signal::Completion {
            session_id: Some("s1".into()),
            exit_code: 0,
            success: true,
            duration_ms: Some(10),
            total_cost_usd: None,
            conversation_id: None,
            error: None,
        };
        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value["type"], "completion");
        assert_eq!(value["exitCode"], 0);
        assert_eq!(value["durationMs"], 10);
        assert!(value["totalCostUsd"].is_null());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_streamed_message_envelope_shape() {
        let signal = Signal::StreamedResponse {
            data: ResponseData::Message(Message::assistant_text("hi").into()),
            session_id: Some("s1".into()),
        };
        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value["type"], "streamed-response");
        assert_eq!(value["data"]["type"], "assistant");
        assert_eq!(value["data"]["message"]["content"][0]["text"], "hi");
    }

    #[test]
    fn test_cancel_reason_is_lowercase() {
        let signal = Signal::ApprovalCancelled {
            request_id: "r".into(),
            reason: CancelReason::Timeout,
            session_id: None,
        };
        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value["reason"], "timeout");
        assert!(value["sessionId"].is_null());
        assert_eq!(signal.name(), "approval-cancelled");
    }
}
