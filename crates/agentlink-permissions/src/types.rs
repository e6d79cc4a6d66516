//! Core types for the permission system.

use agentlink_types::ApprovalResponse;

/// The policy verdict for a tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDecision {
    /// Run the tool without asking.
    Permit,
    /// Refuse the tool without asking.
    Block { reason: String },
    /// No entry matched: the peer has to decide.
    Prompt,
}

/// A decision delivered by the peer for one approval request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApprovalDecision {
    pub allow: bool,
    pub message: Option<String>,
    /// Entry to append to the allowed set for the rest of the session.
    pub remember_entry: Option<String>,
    pub updated_input: Option<serde_json::Value>,
}

impl ApprovalDecision {
    pub fn allow() -> Self {
        Self {
            allow: true,
            ..Self::default()
        }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            allow: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

impl From<ApprovalResponse> for ApprovalDecision {
    fn from(resp: ApprovalResponse) -> Self {
        Self {
            allow: resp.allow,
            message: resp.message,
            remember_entry: resp.remember_entry,
            updated_input: resp.updated_input,
        }
    }
}

/// How an approval request was settled.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalOutcome {
    Decided(ApprovalDecision),
    TimedOut,
    /// The owning session was aborted while the request was outstanding.
    Aborted,
    /// Another request with the same id was already pending; nothing was parked.
    Duplicate,
}

impl ApprovalOutcome {
    /// The decision, if the peer made one.
    pub fn decision(self) -> Option<ApprovalDecision> {
        match self {
            Self::Decided(decision) => Some(decision),
            Self::TimedOut | Self::Aborted | Self::Duplicate => None,
        }
    }
}
