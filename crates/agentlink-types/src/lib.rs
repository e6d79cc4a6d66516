//! Wire protocol, backend collaborator traits, and shared error hierarchy for AgentLink.

pub mod backend;
pub mod error;
pub mod event;
pub mod message;
pub mod protocol;
pub mod util;

pub use backend::{
    AgentBackend, AgentSession, AuthorizeOutcome, Authorizer, BoxFuture, EventStream,
    SessionInfo, SessionOptions, ToolRequest,
};
pub use error::{AgentLinkError, BackendError, ConfigError, TransportError};
pub use event::{BackendEvent, ResultEvent};
pub use message::*;
pub use protocol::*;
pub use util::{preview, truncate_str};
