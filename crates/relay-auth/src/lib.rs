//! Auth registry and quota state for llm-relay.
//!
//! An [`Auth`] is one stored upstream credential (typically one file); the
//! [`AuthManager`] registers and enumerates them over a pluggable
//! [`AuthStore`], and the quota module decides which auths are currently in
//! cooldown. Selection itself lives in `relay-sched`.

pub mod context;
pub mod hooks;
pub mod manager;
pub mod model;
pub mod quota;
pub mod session_extract;
pub mod store;

pub use context::RequestContext;
pub use hooks::AuthHook;
pub use manager::{AuthFilter, AuthManager};
pub use model::{Auth, AuthStatus, ExecError, ExecResult, ModelState, QuotaState};
pub use quota::{
    filter_available, in_cooldown_for_model, quota_health, resolve_auth_cooldown, CooldownState,
};
pub use session_extract::extract_session_id;
pub use store::{AuthStore, FileAuthStore, MemoryAuthStore};
