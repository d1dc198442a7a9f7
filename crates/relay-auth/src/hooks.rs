//! Lifecycle and result hooks.

use crate::context::RequestContext;
use crate::model::{Auth, ExecResult};

/// Subscriber for auth lifecycle and request-result events.
///
/// All methods default to no-ops so implementations only override what they
/// observe. Hook calls are isolated by the dispatcher; a failing hook never
/// aborts the operation that triggered it.
pub trait AuthHook: Send + Sync {
    fn on_auth_registered(&self, _auth: &Auth) {}

    fn on_auth_updated(&self, _auth: &Auth) {}

    fn on_result(&self, _ctx: &RequestContext, _result: &ExecResult) {}
}
