//! Tool policy: the allow/deny lists consulted before asking the peer.

use crate::matcher::RuleMatcher;
use crate::types::PermissionDecision;
use agentlink_types::ToolsSettings;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Reason reported when a disallowed entry blocks a tool.
pub const DISALLOWED_REASON: &str = "Tool disallowed by settings";

#[derive(Debug, Default)]
struct PolicyLists {
    allowed: Vec<String>,
    disallowed: Vec<String>,
}

/// Allowed and disallowed entries for one dispatch, plus the skip-all flag.
///
/// Nothing is written back to configuration; carrying remembered entries
/// into later dispatches is up to the caller.
#[derive(Debug, Default)]
pub struct ToolPolicy {
    lists: Mutex<PolicyLists>,
    skip_permissions: bool,
}

impl ToolPolicy {
    pub fn new(allowed: Vec<String>, disallowed: Vec<String>, skip_permissions: bool) -> Self {
        Self {
            lists: Mutex::new(PolicyLists {
                allowed,
                disallowed,
            }),
            skip_permissions,
        }
    }

    /// A policy that permits every tool call.
    pub fn skip_all() -> Self {
        Self::new(Vec::new(), Vec::new(), true)
    }

    pub fn skip_permissions(&self) -> bool {
        self.skip_permissions
    }

    /// Decide a tool call from the lists alone.
    ///
    /// Evaluation order:
    /// 1. Skip-all flag: Permit.
    /// 2. Any disallowed entry matches: Block.
    /// 3. Any allowed entry matches: Permit.
    /// 4. Otherwise: Prompt.
    pub fn check(&self, tool_name: &str, tool_input: &serde_json::Value) -> PermissionDecision {
        if self.skip_permissions {
            return PermissionDecision::Permit;
        }

        let lists = self.lock();
        if let Some(entry) = RuleMatcher::find(&lists.disallowed, tool_name, tool_input) {
            tracing::debug!(tool = tool_name, entry, "blocked by disallowed entry");
            return PermissionDecision::Block {
                reason: DISALLOWED_REASON.to_string(),
            };
        }
        if let Some(entry) = RuleMatcher::find(&lists.allowed, tool_name, tool_input) {
            tracing::debug!(tool = tool_name, entry, "permitted by allowed entry");
            return PermissionDecision::Permit;
        }
        PermissionDecision::Prompt
    }

    /// Remember a granted entry: add it to the allowed set (once) and drop
    /// any identical disallowed entry.
    pub fn remember(&self, entry: &str) {
        let mut lists = self.lock();
        if !lists.allowed.iter().any(|e| e == entry) {
            lists.allowed.push(entry.to_string());
        }
        lists.disallowed.retain(|e| e != entry);
    }

    pub fn allowed(&self) -> Vec<String> {
        self.lock().allowed.clone()
    }

    pub fn disallowed(&self) -> Vec<String> {
        self.lock().disallowed.clone()
    }

    fn lock(&self) -> MutexGuard<'_, PolicyLists> {
        self.lists.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<ToolsSettings> for ToolPolicy {
    fn from(settings: ToolsSettings) -> Self {
        Self::new(
            settings.allowed_tools,
            settings.disallowed_tools,
            settings.skip_permissions,
        )
    }
}
