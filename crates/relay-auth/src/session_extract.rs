//! Session identifier recovery from inbound requests.
//!
//! Attempts to pull a stable session id out of request headers or the JSON
//! payload so sticky selection works even for clients that never send an
//! explicit session header. Returns None on extraction failure (graceful
//! degradation).

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

const SESSION_HEADER_KEY: &str = "session_id";
const SESSION_HEADER_ALT_KEY: &str = "x-session-id";

/// Header values shorter than this are too generic to pin a session to.
const MIN_SESSION_ID_LEN: usize = 16;

/// Prefix for ids derived from a response-chaining field, so they cannot
/// collide with client-chosen session ids.
const RESPONSE_CHAIN_PREFIX: &str = "resp:";

/// Attempt to extract a session identifier for the request.
///
/// Priority: `session_id` header, `x-session-id` header, then
/// payload fields by request type. OpenAI-response-shaped payloads carry
/// `prompt_cache_key`, `metadata.session_id`, and `previous_response_id`
/// (chained behind a prefix); everything else is checked for a
/// `session_id` / `metadata.session_id` field.
pub fn extract_session_id(
    request_type: &str,
    body: &Value,
    headers: &HashMap<String, String>,
) -> Option<String> {
    if let Some(id) = header_value(headers, SESSION_HEADER_KEY) {
        return Some(id);
    }
    if let Some(id) = header_value(headers, SESSION_HEADER_ALT_KEY) {
        return Some(id);
    }

    match request_type {
        "openai-response" | "codex" => extract_openai_response(body),
        _ => extract_generic(body),
    }
}

fn header_value(headers: &HashMap<String, String>, key: &str) -> Option<String> {
    let value = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.trim())?;
    if value.len() < MIN_SESSION_ID_LEN {
        debug!(header = key, "session header too short, ignoring");
        return None;
    }
    Some(value.to_string())
}

fn extract_openai_response(body: &Value) -> Option<String> {
    if let Some(key) = non_empty_str(body.get("prompt_cache_key")) {
        return Some(key.to_string());
    }
    if let Some(id) = non_empty_str(body.pointer("/metadata/session_id")) {
        return Some(id.to_string());
    }
    if let Some(previous) = non_empty_str(body.get("previous_response_id")) {
        return Some(format!("{RESPONSE_CHAIN_PREFIX}{previous}"));
    }
    debug!("no session identifier in openai-response payload");
    None
}

fn extract_generic(body: &Value) -> Option<String> {
    if let Some(id) = non_empty_str(body.get("session_id")) {
        return Some(id.to_string());
    }
    if let Some(id) = non_empty_str(body.pointer("/metadata/session_id")) {
        return Some(id.to_string());
    }
    None
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
