//! Hook glue: forwards request outcomes into the session selector.

use std::sync::Arc;

use relay_auth::{AuthHook, ExecResult, RequestContext};
use tracing::debug;

use crate::session_selector::SessionSelector;

/// Adapter installed on the registry so execution results reach the
/// selector's health/failover state. Lifecycle events are no-ops.
pub struct SelectorResultHook {
    selector: Arc<SessionSelector>,
}

impl SelectorResultHook {
    pub fn new(selector: Arc<SessionSelector>) -> Self {
        Self { selector }
    }
}

impl AuthHook for SelectorResultHook {
    fn on_result(&self, ctx: &RequestContext, result: &ExecResult) {
        debug!(
            auth_id = %result.auth_id,
            success = result.success,
            "forwarding result to session selector"
        );
        self.selector.record_result(ctx, result);
    }
}
