//! Stream assembler — consumes a delta stream into one finished message.
//!
//! Deltas are merged through [`merge_delta`] into a single accumulator. The
//! assembler commits to a tool-call interpretation as soon as any
//! accumulated call has a non-empty name. Some backends mis-emit a raw JSON
//! array of calls as plain text instead of using the structured channel, so
//! text that looks like such an array is withheld from live display until
//! either a structured call confirms the ambiguity is moot or enough plain
//! text rules it out; after stream end the withheld text is fallback-parsed
//! into synthetic calls. The heuristic is approximate by nature and can
//! briefly withhold genuine prose that starts with `[`.

use std::sync::Arc;

use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use tandem_core::events::{BaseEvent, EngineEvent, EventEmitter};
use tandem_core::messages::ToolCall;

use crate::backend::{BackendError, DeltaStream, ToolCallDelta};
use crate::merge::merge_delta;

/// Accumulated text length past which `[`-prefixed content stops being
/// treated as a possible tool-call array.
const WITHHOLD_LENGTH_LIMIT: usize = 256;

/// The finished product of one model stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssembledMessage {
    /// Accumulated assistant text.
    pub content: String,
    /// Structured or fallback-parsed tool calls, in emission order.
    pub tool_calls: Vec<ToolCall>,
    /// Whether assembly stopped on cancellation. Partial accumulation is
    /// discarded, not committed.
    pub cancelled: bool,
}

impl AssembledMessage {
    /// Whether the model requested any tool calls.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    fn cancelled_marker() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Accumulated {
    content: Option<String>,
    tool_calls: Vec<ToolCallDelta>,
}

/// Consume a delta stream into one [`AssembledMessage`].
///
/// Visible text fragments are emitted as [`EngineEvent::TextDelta`] along
/// the way, subject to the withholding heuristic. Cancellation is checked
/// once per chunk.
pub async fn assemble(
    mut stream: DeltaStream,
    session_id: &str,
    emitter: &Arc<EventEmitter>,
    cancel: &CancellationToken,
) -> Result<AssembledMessage, BackendError> {
    let mut acc = Value::Object(serde_json::Map::new());
    let mut emitted_len = 0usize;

    loop {
        // biased: prefer cancellation when both a delta and cancel are ready
        let delta = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(AssembledMessage::cancelled_marker()),
            delta = stream.next() => delta,
        };

        match delta {
            None => break,
            Some(Err(BackendError::Cancelled)) => {
                return Ok(AssembledMessage::cancelled_marker());
            }
            Some(Err(e)) => return Err(e),
            Some(Ok(chunk)) => {
                let value = serde_json::to_value(&chunk)
                    .map_err(|e| BackendError::MalformedDelta(e.to_string()))?;
                merge_delta(&mut acc, &value);

                let content = acc.get("content").and_then(Value::as_str).unwrap_or("");
                if !should_withhold(content, tool_call_committed(&acc)) {
                    emit_new_text(emitter, session_id, content, &mut emitted_len);
                }
            }
        }
    }

    let accumulated: Accumulated = serde_json::from_value(acc)
        .map_err(|e| BackendError::MalformedDelta(e.to_string()))?;
    let content = accumulated.content.unwrap_or_default();

    let structured: Vec<ToolCall> = accumulated
        .tool_calls
        .into_iter()
        .filter_map(finish_tool_call)
        .collect();

    if structured.is_empty() {
        if let Some(calls) = parse_tool_call_array(&content) {
            debug!(
                calls = calls.len(),
                "parsed mis-emitted tool-call array from plain content"
            );
            return Ok(AssembledMessage {
                content: String::new(),
                tool_calls: calls,
                cancelled: false,
            });
        }
    }

    // Flush anything still withheld; the ambiguity is resolved either way.
    emit_new_text(emitter, session_id, &content, &mut emitted_len);

    Ok(AssembledMessage {
        content,
        tool_calls: structured,
        cancelled: false,
    })
}

/// Whether any accumulated tool call has a non-empty name.
fn tool_call_committed(acc: &Value) -> bool {
    acc.get("toolCalls")
        .and_then(Value::as_array)
        .is_some_and(|calls| {
            calls.iter().any(|c| {
                c.get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|n| !n.is_empty())
            })
        })
}

/// Withhold visible text while it could still be a mis-emitted tool-call
/// array and no structured call has settled the question.
fn should_withhold(content: &str, committed: bool) -> bool {
    if committed {
        return false;
    }
    let trimmed = content.trim_start();
    trimmed.starts_with('[')
        && (trimmed.starts_with("[{")
            || trimmed.contains("\"name\"")
            || trimmed.contains("\"arguments\"")
            || trimmed.len() < WITHHOLD_LENGTH_LIMIT)
}

fn emit_new_text(
    emitter: &Arc<EventEmitter>,
    session_id: &str,
    content: &str,
    emitted_len: &mut usize,
) {
    if content.len() > *emitted_len {
        let fragment = content[*emitted_len..].to_owned();
        *emitted_len = content.len();
        let _ = emitter.emit(EngineEvent::TextDelta {
            base: BaseEvent::now(session_id),
            delta: fragment,
        });
    }
}

/// Turn an accumulated delta into a concrete call. Nameless entries are
/// dropped; missing ids get synthetic ones.
fn finish_tool_call(delta: ToolCallDelta) -> Option<ToolCall> {
    let name = delta.name.filter(|n| !n.is_empty())?;
    let id = delta
        .id
        .filter(|i| !i.is_empty())
        .unwrap_or_else(|| format!("call_{}", Uuid::new_v4()));
    Some(ToolCall::new(
        id,
        name,
        delta.arguments.unwrap_or_else(|| "{}".into()),
    ))
}

/// Fallback parse of plain content as a JSON array of `{name, arguments}`
/// objects. Returns `None` unless every element qualifies.
fn parse_tool_call_array(content: &str) -> Option<Vec<ToolCall>> {
    let value: Value = serde_json::from_str(content.trim()).ok()?;
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }

    let mut calls = Vec::with_capacity(items.len());
    for item in items {
        let obj = item.as_object()?;
        let name = obj.get("name")?.as_str()?;
        if name.is_empty() {
            return None;
        }
        let arguments = match obj.get("arguments") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "{}".to_owned(),
        };
        calls.push(ToolCall::new(
            format!("call_{}", Uuid::new_v4()),
            name,
            arguments,
        ));
    }
    Some(calls)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
