//! Live request log: a bounded FIFO of recent request entries for the
//! monitor surface.
//!
//! A process-wide default store backs the free functions; the store type
//! itself can be instantiated and injected instead, with the same contract.

use std::collections::{HashMap, VecDeque};
use std::sync::{LazyLock, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Retention bound; oldest entries are dropped in FIFO order past this.
pub const MAX_REQUEST_LOG_ENTRIES: usize = 500;

/// One live request entry. Field names are a stable JSON surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub id: String,
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: i64,
    pub pending: bool,
}

/// Optional fields to fill in on an open entry.
#[derive(Debug, Clone, Default)]
pub struct RequestLogUpdate {
    pub api_key: String,
    pub request_type: String,
    pub model: String,
    pub session_id: String,
}

#[derive(Default)]
struct LogState {
    order: VecDeque<String>,
    entries: HashMap<String, RequestLogEntry>,
}

/// Bounded FIFO of request entries behind a dedicated mutex. Snapshots copy
/// entries so readers never alias internal state.
#[derive(Default)]
pub struct RequestLogStore {
    state: Mutex<LogState>,
}

impl RequestLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a pending entry for a new request. On an existing id the
    /// method, path, start time, and pending flag are overwritten; fields
    /// filled by `update`/`finish` are preserved. No-op on an empty id.
    pub fn start(&self, id: &str, method: &str, path: &str, started_at: DateTime<Utc>) {
        if id.is_empty() {
            return;
        }
        let mut state = self.lock();
        let method = method.trim().to_uppercase();
        let path = path.trim().to_string();

        if let Some(existing) = state.entries.get_mut(id) {
            existing.method = method;
            existing.path = path;
            existing.started_at = started_at;
            existing.pending = true;
            return;
        }

        state.entries.insert(
            id.to_string(),
            RequestLogEntry {
                id: id.to_string(),
                method,
                path,
                api_key: String::new(),
                request_type: String::new(),
                model: String::new(),
                session_id: String::new(),
                status_code: 0,
                error_message: String::new(),
                started_at,
                completed_at: None,
                duration_ms: 0,
                pending: true,
            },
        );
        state.order.push_back(id.to_string());
        while state.order.len() > MAX_REQUEST_LOG_ENTRIES {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
            }
        }
    }

    /// Overwrite only the non-empty fields of `update`. No-op on an empty
    /// or unknown id.
    pub fn update(&self, id: &str, update: RequestLogUpdate) {
        if id.is_empty() {
            return;
        }
        let mut state = self.lock();
        let Some(entry) = state.entries.get_mut(id) else {
            return;
        };
        if !update.api_key.is_empty() {
            entry.api_key = update.api_key;
        }
        if !update.request_type.is_empty() {
            entry.request_type = update.request_type;
        }
        if !update.model.is_empty() {
            entry.model = update.model;
        }
        if !update.session_id.is_empty() {
            entry.session_id = update.session_id;
        }
    }

    /// Mark a request as completed and fill status/error details. No-op on
    /// an empty or unknown id.
    pub fn finish(&self, id: &str, status: u16, error_message: &str, completed_at: DateTime<Utc>) {
        if id.is_empty() {
            return;
        }
        let mut state = self.lock();
        let Some(entry) = state.entries.get_mut(id) else {
            return;
        };
        if status > 0 {
            entry.status_code = status;
        }
        let error_message = error_message.trim();
        if !error_message.is_empty() {
            entry.error_message = error_message.to_string();
        }
        entry.completed_at = Some(completed_at);
        entry.duration_ms = (completed_at - entry.started_at).num_milliseconds();
        entry.pending = false;
    }

    /// Copy of the most recent `limit` entries (all when `limit` is 0),
    /// sorted by start time descending.
    pub fn snapshot(&self, limit: usize) -> Vec<RequestLogEntry> {
        let state = self.lock();
        let limit = if limit == 0 || limit > state.order.len() {
            state.order.len()
        } else {
            limit
        };

        let mut entries: Vec<RequestLogEntry> = state
            .order
            .iter()
            .rev()
            .filter_map(|id| state.entries.get(id))
            .take(limit)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        entries
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

static DEFAULT_STORE: LazyLock<RequestLogStore> = LazyLock::new(RequestLogStore::new);

/// Insert a pending entry into the process-wide store.
pub fn start_request_log(id: &str, method: &str, path: &str, started_at: DateTime<Utc>) {
    DEFAULT_STORE.start(id, method, path, started_at);
}

/// Update optional fields on a process-wide entry.
pub fn update_request_log(id: &str, update: RequestLogUpdate) {
    DEFAULT_STORE.update(id, update);
}

/// Complete a process-wide entry.
pub fn finish_request_log(id: &str, status: u16, error_message: &str, completed_at: DateTime<Utc>) {
    DEFAULT_STORE.finish(id, status, error_message, completed_at);
}

/// Recent entries from the process-wide store, newest first.
pub fn snapshot_request_logs(limit: usize) -> Vec<RequestLogEntry> {
    DEFAULT_STORE.snapshot(limit)
}
