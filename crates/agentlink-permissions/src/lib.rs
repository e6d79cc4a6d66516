//! Tool policy and approval handling for AgentLink.
//!
//! Policy verdicts: permit / block / prompt.
//! A prompt verdict is settled through the [`ApprovalGate`]: by the peer's
//! decision, by timeout, or by a session abort.

pub mod gate;
pub mod matcher;
pub mod policy;
pub mod types;

pub use gate::{ApprovalGate, DEFAULT_APPROVAL_TIMEOUT, ParkedApproval};
pub use matcher::{PolicyEntry, RuleMatcher};
pub use policy::ToolPolicy;
pub use types::*;
