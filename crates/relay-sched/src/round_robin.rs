//! Round-robin fallback selection.
//!
//! Used when session-aware selection is disabled or not installed: filter to
//! available auths and advance a monotonic counter over them.

use std::sync::atomic::{AtomicUsize, Ordering};

use relay_auth::quota::filter_available;
use relay_auth::{Auth, RequestContext};
use relay_core::{system_clock, Clock, RelayError};

use crate::options::PickOptions;
use crate::session_selector::AuthSelector;

pub struct RoundRobinSelector {
    next: AtomicUsize,
    clock: Clock,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self {
            next: AtomicUsize::new(0),
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for RoundRobinSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSelector for RoundRobinSelector {
    fn pick(
        &self,
        _ctx: &RequestContext,
        provider: &str,
        model: &str,
        _options: &PickOptions,
        candidates: &[Auth],
    ) -> Result<Auth, RelayError> {
        let now = (self.clock)();
        let available = filter_available(candidates, provider, model, now);
        if available.is_empty() {
            return Err(RelayError::NoAvailable {
                provider: provider.to_string(),
                model: model.to_string(),
            });
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % available.len();
        Ok(available[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_auth::AuthStatus;

    fn auths() -> Vec<Auth> {
        vec![
            Auth::new("auth-a", "codex"),
            Auth::new("auth-b", "codex"),
            Auth::new("auth-c", "codex"),
        ]
    }

    fn pick(selector: &RoundRobinSelector, candidates: &[Auth]) -> String {
        selector
            .pick(
                &RequestContext::new(),
                "codex",
                "test-model",
                &PickOptions::new(),
                candidates,
            )
            .unwrap()
            .id
    }

    #[test]
    fn test_cycles_in_insertion_order() {
        let selector = RoundRobinSelector::new();
        let auths = auths();
        assert_eq!(pick(&selector, &auths), "auth-a");
        assert_eq!(pick(&selector, &auths), "auth-b");
        assert_eq!(pick(&selector, &auths), "auth-c");
        assert_eq!(pick(&selector, &auths), "auth-a");
    }

    #[test]
    fn test_skips_unavailable() {
        let selector = RoundRobinSelector::new();
        let mut auths = auths();
        auths[1].status = AuthStatus::Disabled;

        assert_eq!(pick(&selector, &auths), "auth-a");
        assert_eq!(pick(&selector, &auths), "auth-c");
        assert_eq!(pick(&selector, &auths), "auth-a");
    }

    #[test]
    fn test_no_available() {
        let selector = RoundRobinSelector::new();
        let err = selector
            .pick(
                &RequestContext::new(),
                "codex",
                "test-model",
                &PickOptions::new(),
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, RelayError::NoAvailable { .. }));
    }
}
