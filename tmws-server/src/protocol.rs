//! Wire frames: newline-delimited JSON.
//!
//! Requests carry `{id, tool, params}`; responses echo the id with either
//! `result` or `error {code, message}`. Notifications share the frame
//! shape without an id. Floats on the wire are finite; serde_json refuses
//! NaN/Infinity on its own.

use serde::Deserialize;
use serde_json::{json, Value};

use tmws_core::constants::MAX_FRAME_BYTES;
use tmws_core::errors::{TmwsError, TmwsResult};

/// An incoming tool call.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub id: Value,
    pub tool: String,
    #[serde(default)]
    pub params: Value,
}

/// Parse one frame into a request. Oversized or malformed frames are
/// validation errors; the caller answers them with a null-id error frame.
pub fn parse_request(frame: &str) -> TmwsResult<Request> {
    if frame.len() > MAX_FRAME_BYTES {
        return Err(TmwsError::Validation {
            reason: format!("frame exceeds {MAX_FRAME_BYTES} bytes"),
        });
    }
    let request: Request = serde_json::from_str(frame)
        .map_err(|e| TmwsError::validation(format!("malformed frame: {e}")))?;
    if request.tool.is_empty() {
        return Err(TmwsError::validation("frame has no tool name"));
    }
    Ok(request)
}

/// A success frame.
pub fn ok_response(id: &Value, result: Value) -> Value {
    json!({ "id": id, "result": result })
}

/// An error frame. Only the stable code and the client-safe message go on
/// the wire; `retry_after` rides along for rate-limit errors.
pub fn error_response(id: &Value, error: &TmwsError) -> Value {
    let mut body = json!({
        "code": error.code(),
        "message": error.wire_message(),
    });
    if let Some(retry_after) = error.retry_after() {
        body["retry_after"] = json!(retry_after);
    }
    json!({ "id": id, "error": body })
}

/// A server-initiated notification (no id).
pub fn notification(event: &str, params: Value) -> Value {
    json!({ "event": event, "params": params })
}
