//! Auth credential types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Request-provider tag meaning "any provider"; used by callers that route
/// several provider families through one endpoint.
pub const MIXED_PROVIDER: &str = "mixed";

/// Lifecycle status of a stored credential. Only `Active` auths are
/// selectable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    #[default]
    Active,
    Disabled,
    Invalid,
}

/// Quota exhaustion state for an auth as a whole or for one model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotaState {
    #[serde(default)]
    pub exceeded: bool,

    /// Short tag describing the limit (e.g. `codex_5h_limit`).
    #[serde(default)]
    pub reason: String,

    /// When the cooldown ends. `None` with `exceeded = true` means an
    /// indefinite cooldown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_recover_at: Option<DateTime<Utc>>,
}

/// Per-model override. An absent entry means "inherit the global quota".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelState {
    #[serde(default)]
    pub quota: QuotaState,
}

/// One upstream credential record; the unit of selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auth {
    /// Opaque unique id, often a file path. Assigned on registration when
    /// empty.
    pub id: String,

    /// Lowercased provider tag (`codex`, `claude`, `gemini`, ...).
    pub provider: String,

    /// Display-friendly basename; may be empty.
    #[serde(default)]
    pub file_name: String,

    #[serde(default)]
    pub status: AuthStatus,

    /// Quota state for the auth as a whole.
    #[serde(default)]
    pub quota: QuotaState,

    /// Per-model quota overrides keyed by model name.
    #[serde(default)]
    pub model_states: HashMap<String, ModelState>,
}

impl Auth {
    pub fn new(id: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider: provider.into().trim().to_lowercase(),
            file_name: String::new(),
            status: AuthStatus::Active,
            quota: QuotaState::default(),
            model_states: HashMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AuthStatus::Active
    }
}

/// Does a request-provider tag select this auth's provider?
///
/// An empty request provider and the umbrella tag match every provider.
pub fn provider_matches(requested: &str, auth_provider: &str) -> bool {
    requested.is_empty()
        || requested.eq_ignore_ascii_case(MIXED_PROVIDER)
        || requested.eq_ignore_ascii_case(auth_provider)
}

/// Upstream error attached to a failed request outcome.
#[derive(Debug, Clone)]
pub struct ExecError {
    pub http_status: u16,
    pub message: String,
}

/// Per-request outcome report fed back into the selection core.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub auth_id: String,
    pub provider: String,
    pub model: String,
    pub success: bool,
    pub error: Option<ExecError>,
}

impl ExecResult {
    /// HTTP status of the failure, or 0 when the request succeeded.
    pub fn http_status(&self) -> u16 {
        self.error.as_ref().map(|e| e.http_status).unwrap_or(0)
    }
}
