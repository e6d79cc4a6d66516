//! Backend event → outbound signal translation.

use agentlink_types::{BackendEvent, Message, ResponseData, ResultEvent, Signal};

/// What the stream loop should do with a translated event.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// Emit and keep draining.
    Forward(Signal),
    /// Emit and stop: the dispatch is complete.
    Finish(Signal),
}

/// Translate one backend event for `session_id`.
///
/// `conversation_id` is the identity reported at initialization; it fills in
/// the completion signal when the result event does not carry one.
pub fn translate(
    event: BackendEvent,
    session_id: &str,
    conversation_id: Option<&str>,
) -> Translation {
    let session_id = Some(session_id.to_string());
    let streamed = |data: ResponseData| Signal::StreamedResponse {
        data,
        session_id: session_id.clone(),
    };

    match event {
        BackendEvent::StreamDelta(raw) => Translation::Forward(streamed(ResponseData::Raw(raw))),
        BackendEvent::AssistantText { text } => Translation::Forward(streamed(
            ResponseData::Message(Message::assistant_text(text).into()),
        )),
        BackendEvent::ToolUse { id, name, input } => Translation::Forward(streamed(
            ResponseData::Message(Message::tool_use(id, name, input).into()),
        )),
        BackendEvent::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => Translation::Forward(streamed(ResponseData::Message(
            Message::tool_result(tool_use_id, content, is_error).into(),
        ))),
        BackendEvent::Unknown { kind, payload } => {
            tracing::debug!(kind, "forwarding unrecognized backend event");
            Translation::Forward(streamed(ResponseData::Raw(payload)))
        }
        BackendEvent::Result(result) => {
            Translation::Finish(completion(result, session_id.clone(), conversation_id))
        }
    }
}

fn completion(
    result: ResultEvent,
    session_id: Option<String>,
    conversation_id: Option<&str>,
) -> Signal {
    Signal::Completion {
        session_id,
        exit_code: if result.success { 0 } else { 1 },
        success: result.success,
        duration_ms: result.duration_ms,
        total_cost_usd: result.total_cost_usd,
        conversation_id: result
            .conversation_id
            .or_else(|| conversation_id.map(str::to_string)),
        error: result.error,
    }
}
