//! Selector options metadata.
//!
//! Executor APIs that cannot carry a request context transport the session
//! id through options metadata under [`SESSION_ID_METADATA_KEY`]; this is
//! the second session-id read path next to
//! [`relay_auth::RequestContext`].

use std::collections::HashMap;

use serde_json::Value;

/// Stable metadata key carrying the session identifier.
pub const SESSION_ID_METADATA_KEY: &str = "session_id";

/// Per-pick options handed to a selector.
#[derive(Debug, Clone, Default)]
pub struct PickOptions {
    pub metadata: HashMap<String, Value>,
}

impl PickOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options carrying a session id in metadata.
    pub fn with_session_id(session_id: &str) -> Self {
        let mut options = Self::new();
        options.metadata.insert(
            SESSION_ID_METADATA_KEY.to_string(),
            Value::String(session_id.to_string()),
        );
        options
    }

    /// Trimmed, non-empty session id from metadata, if any. Non-string
    /// values are ignored.
    pub fn session_id(&self) -> Option<&str> {
        self.metadata
            .get(SESSION_ID_METADATA_KEY)?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
