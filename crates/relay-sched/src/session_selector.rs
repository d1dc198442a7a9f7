//! Session-aware auth selection with health/load scoring.
//!
//! One mutex guards bindings, stats, and the active config. The lock is
//! released before the chosen auth is returned; upstream I/O never happens
//! under it. The selector itself does not log on the pick path.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use relay_auth::quota::{filter_available, quota_health};
use relay_auth::{Auth, ExecResult, RequestContext};
use relay_core::time::{clamp01, prune_old_timestamps};
use relay_core::{system_clock, Clock, RelayError};

use crate::config::SessionSelectorConfig;
use crate::options::PickOptions;

/// Scores within this distance are considered tied.
const SCORE_EPSILON: f64 = 1e-4;

/// Common surface of the session selector and the round-robin fallback.
pub trait AuthSelector: Send + Sync {
    fn pick(
        &self,
        ctx: &RequestContext,
        provider: &str,
        model: &str,
        options: &PickOptions,
        candidates: &[Auth],
    ) -> Result<Auth, RelayError>;
}

/// A remembered (provider, session id) → auth pinning.
#[derive(Debug, Clone)]
struct SessionBinding {
    auth_id: String,
    last_used: DateTime<Utc>,
    fail_count: u32,
    /// Until when this binding must not be re-selected.
    cooldown_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
struct ResultSample {
    timestamp: DateTime<Utc>,
    success: bool,
    status: u16,
}

/// Rolling health and load samples for one auth.
#[derive(Debug, Default)]
struct AuthStats {
    recent_results: Vec<ResultSample>,
    recent_requests: Vec<DateTime<Utc>>,
    pending_requests: Vec<DateTime<Utc>>,
}

struct SelectorState {
    cfg: SessionSelectorConfig,
    sessions: HashMap<String, SessionBinding>,
    stats: HashMap<String, AuthStats>,
}

/// The scheduler: session stickiness, scoring, and cooldown failover.
pub struct SessionSelector {
    state: Mutex<SelectorState>,
    clock: Clock,
}

impl SessionSelector {
    pub fn new(cfg: SessionSelectorConfig) -> Self {
        Self {
            state: Mutex::new(SelectorState {
                cfg: cfg.normalise(),
                sessions: HashMap::new(),
                stats: HashMap::new(),
            }),
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Swap selector settings without clearing runtime state.
    pub fn update_config(&self, cfg: SessionSelectorConfig) {
        self.lock().cfg = cfg.normalise();
    }

    /// Update selector metrics and session failover state for a finished
    /// request.
    pub fn record_result(&self, ctx: &RequestContext, result: &ExecResult) {
        if result.auth_id.is_empty() {
            return;
        }
        let now = (self.clock)();
        let status = result.http_status();

        let mut guard = self.lock();
        let SelectorState {
            cfg,
            sessions,
            stats,
        } = &mut *guard;

        let auth_stats = stats.entry(result.auth_id.clone()).or_default();
        auth_stats.recent_results.push(ResultSample {
            timestamp: now,
            success: result.success,
            status,
        });
        if auth_stats.recent_results.len() > cfg.health_window {
            let excess = auth_stats.recent_results.len() - cfg.health_window;
            auth_stats.recent_results.drain(..excess);
        }
        if cfg.load_window > Duration::zero() {
            // The oldest pending dispatch is the one completing.
            if !auth_stats.pending_requests.is_empty() {
                auth_stats.pending_requests.remove(0);
            }
            auth_stats.recent_requests.push(now);
            let cutoff = now - cfg.load_window;
            prune_old_timestamps(&mut auth_stats.recent_requests, cutoff);
            prune_old_timestamps(&mut auth_stats.pending_requests, cutoff);
        }

        let Some(session_id) = ctx.session_id() else {
            return;
        };
        if !is_provider_enabled(cfg, &result.provider) {
            return;
        }
        let key = session_key(&result.provider, session_id);
        let Some(binding) = sessions.get_mut(&key) else {
            return;
        };
        if binding.auth_id != result.auth_id {
            return;
        }
        binding.last_used = now;
        if result.success {
            binding.fail_count = 0;
            binding.cooldown_until = None;
            return;
        }
        binding.fail_count += 1;
        if binding.fail_count >= cfg.failure_threshold {
            if cfg.cooldown > Duration::zero() {
                binding.cooldown_until = Some(now + cfg.cooldown);
            }
            binding.fail_count = 0;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SelectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binding scopes to consult for this request, in priority order.
    ///
    /// A session-enabled request provider scopes by itself (umbrella callers
    /// get umbrella-scoped bindings). Otherwise fall back to the enabled
    /// providers among the candidates, so umbrella requests against a
    /// configured allow-list still bind per auth provider. Empty means
    /// non-sticky.
    fn scope_providers(
        cfg: &SessionSelectorConfig,
        provider: &str,
        available: &[&Auth],
    ) -> Vec<String> {
        if is_provider_enabled(cfg, provider) {
            return vec![provider.to_string()];
        }
        let mut providers: Vec<String> = Vec::new();
        for auth in available {
            if is_provider_enabled(cfg, &auth.provider)
                && !providers
                    .iter()
                    .any(|p| p.eq_ignore_ascii_case(&auth.provider))
            {
                providers.push(auth.provider.clone());
            }
        }
        providers
    }

    fn cleanup_locked(state: &mut SelectorState, now: DateTime<Utc>) {
        let ttl_cutoff = now - state.cfg.ttl;
        state
            .sessions
            .retain(|_, binding| binding.last_used >= ttl_cutoff);
        if state.cfg.load_window <= Duration::zero() {
            return;
        }
        let cutoff = now - state.cfg.load_window;
        for stats in state.stats.values_mut() {
            prune_old_timestamps(&mut stats.recent_requests, cutoff);
            prune_old_timestamps(&mut stats.pending_requests, cutoff);
        }
    }

    fn note_pending(state: &mut SelectorState, auth_id: &str, now: DateTime<Utc>) {
        if state.cfg.load_window <= Duration::zero() {
            return;
        }
        let cutoff = now - state.cfg.load_window;
        let stats = state.stats.entry(auth_id.to_string()).or_default();
        stats.pending_requests.push(now);
        prune_old_timestamps(&mut stats.pending_requests, cutoff);
    }

    fn pick_best_locked(
        state: &mut SelectorState,
        pool: &[&Auth],
        model: &str,
        now: DateTime<Utc>,
    ) -> Auth {
        if pool.len() == 1 {
            return pool[0].clone();
        }
        let SelectorState { cfg, stats, .. } = state;
        let mut scored: Vec<(f64, usize, &Auth)> = pool
            .iter()
            .map(|auth| {
                let (score, load) = score_auth(cfg, stats, auth, model, now);
                (score, load, *auth)
            })
            .collect();
        scored.sort_by(|a, b| {
            if (a.0 - b.0).abs() > SCORE_EPSILON {
                return b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal);
            }
            a.1.cmp(&b.1).then_with(|| a.2.id.cmp(&b.2.id))
        });
        scored[0].2.clone()
    }
}

impl AuthSelector for SessionSelector {
    /// Select an auth for `(provider, model)` with session stickiness.
    fn pick(
        &self,
        _ctx: &RequestContext,
        provider: &str,
        model: &str,
        options: &PickOptions,
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

        let session_id = options.session_id();

        let mut guard = self.lock();
        let state = &mut *guard;
        Self::cleanup_locked(state, now);
        let cfg = state.cfg.clone();

        let mut excluded_auth_id: Option<String> = None;
        if let Some(session_id) = session_id {
            for scope in Self::scope_providers(&cfg, provider, &available) {
                let key = session_key(&scope, session_id);
                let Some(binding) = state.sessions.get(&key) else {
                    continue;
                };
                let live = binding.last_used + cfg.ttl > now;
                let cooling = binding.cooldown_until.is_some_and(|until| until > now);
                let bound_auth_id = binding.auth_id.clone();

                if live && cooling {
                    // Pinned but in failover cooldown: exclude it from the
                    // fresh selection below.
                    excluded_auth_id = Some(bound_auth_id);
                    break;
                }
                if live {
                    if let Some(auth) = available.iter().find(|a| a.id == bound_auth_id) {
                        let auth = (*auth).clone();
                        if let Some(binding) = state.sessions.get_mut(&key) {
                            binding.last_used = now;
                        }
                        Self::note_pending(state, &auth.id, now);
                        return Ok(auth);
                    }
                    // Bound auth left the candidate list; keep the binding
                    // and fall through to fresh selection.
                    break;
                }
                state.sessions.remove(&key);
                break;
            }
        }

        let mut pool: Vec<&Auth> = match &excluded_auth_id {
            Some(excluded) => available
                .iter()
                .copied()
                .filter(|auth| auth.id != *excluded)
                .collect(),
            None => available.clone(),
        };
        if pool.is_empty() {
            pool = available;
        }

        let selected = Self::pick_best_locked(state, &pool, model, now);

        if let Some(session_id) = session_id {
            let scope = if is_provider_enabled(&cfg, provider) {
                Some(provider.to_string())
            } else if is_provider_enabled(&cfg, &selected.provider) {
                Some(selected.provider.clone())
            } else {
                None
            };
            if let Some(scope) = scope {
                state.sessions.insert(
                    session_key(&scope, session_id),
                    SessionBinding {
                        auth_id: selected.id.clone(),
                        last_used: now,
                        fail_count: 0,
                        cooldown_until: None,
                    },
                );
            }
        }
        Self::note_pending(state, &selected.id, now);
        drop(guard);
        Ok(selected)
    }
}

fn is_provider_enabled(cfg: &SessionSelectorConfig, provider: &str) -> bool {
    cfg.providers.is_empty()
        || cfg
            .providers
            .iter()
            .any(|p| p.trim().eq_ignore_ascii_case(provider))
}

fn session_key(provider: &str, session_id: &str) -> String {
    format!("{}:{}", provider.to_lowercase(), session_id)
}

fn score_auth(
    cfg: &SessionSelectorConfig,
    stats: &mut HashMap<String, AuthStats>,
    auth: &Auth,
    model: &str,
    now: DateTime<Utc>,
) -> (f64, usize) {
    let mut success_rate = 0.5;
    let mut penalty_ratio = 0.0;
    let mut load_count = 0usize;

    if let Some(auth_stats) = stats.get_mut(&auth.id) {
        let samples = &auth_stats.recent_results;
        if !samples.is_empty() {
            let mut successes = 0usize;
            let (mut count_429, mut count_403, mut count_5xx) = (0usize, 0usize, 0usize);
            for sample in samples {
                if sample.success {
                    successes += 1;
                    continue;
                }
                match sample.status {
                    429 => count_429 += 1,
                    402 | 403 => count_403 += 1,
                    500..=599 => count_5xx += 1,
                    _ => {}
                }
            }
            let total = samples.len() as f64;
            success_rate = successes as f64 / total;
            penalty_ratio = clamp01(
                (count_429 as f64 * cfg.penalty_429
                    + count_403 as f64 * cfg.penalty_403
                    + count_5xx as f64 * cfg.penalty_5xx)
                    / total,
            );
        }
        if cfg.load_window > Duration::zero() {
            let cutoff = now - cfg.load_window;
            prune_old_timestamps(&mut auth_stats.recent_requests, cutoff);
            prune_old_timestamps(&mut auth_stats.pending_requests, cutoff);
            load_count = auth_stats.recent_requests.len() + auth_stats.pending_requests.len();
        }
    }

    let quota_score = quota_health(auth, model, now);
    let weight_total = cfg.weight_success + cfg.weight_quota;
    let weighted = if weight_total > 0.0 {
        (success_rate * cfg.weight_success + quota_score * cfg.weight_quota) / weight_total
    } else {
        0.0
    };
    let load_penalty = if load_count > 0 {
        load_count as f64 / (load_count as f64 + 1.0)
    } else {
        0.0
    };
    let score = (weighted - load_penalty * cfg.load_weight).max(0.0) * (1.0 - penalty_ratio);
    (score, load_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use relay_auth::{AuthStatus, ExecError};
    use std::sync::{Arc, Mutex as StdMutex};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn test_clock(start: DateTime<Utc>) -> (Clock, Arc<StdMutex<DateTime<Utc>>>) {
        let current = Arc::new(StdMutex::new(start));
        let handle = current.clone();
        let clock: Clock = Arc::new(move || *handle.lock().unwrap());
        (clock, current)
    }

    fn cfg(providers: &[&str], failure_threshold: u32) -> SessionSelectorConfig {
        SessionSelectorConfig {
            enabled: true,
            providers: providers.iter().map(|s| s.to_string()).collect(),
            failure_threshold,
            ..Default::default()
        }
    }

    fn selector(cfg: SessionSelectorConfig) -> (SessionSelector, Arc<StdMutex<DateTime<Utc>>>) {
        let (clock, handle) = test_clock(base());
        (SessionSelector::new(cfg).with_clock(clock), handle)
    }

    fn codex_auth(id: &str) -> Auth {
        Auth::new(id, "codex")
    }

    fn failure(auth_id: &str, provider: &str, status: u16) -> ExecResult {
        ExecResult {
            auth_id: auth_id.to_string(),
            provider: provider.to_string(),
            model: "test-model".to_string(),
            success: false,
            error: Some(ExecError {
                http_status: status,
                message: "upstream error".to_string(),
            }),
        }
    }

    fn success(auth_id: &str, provider: &str) -> ExecResult {
        ExecResult {
            auth_id: auth_id.to_string(),
            provider: provider.to_string(),
            model: "test-model".to_string(),
            success: true,
            error: None,
        }
    }

    fn binding_keys(selector: &SessionSelector) -> Vec<String> {
        let mut keys: Vec<String> = selector.lock().sessions.keys().cloned().collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_pick_no_available() {
        let (selector, _) = selector(cfg(&[], 3));
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

        let mut disabled = codex_auth("auth-a");
        disabled.status = AuthStatus::Disabled;
        let err = selector
            .pick(
                &RequestContext::new(),
                "codex",
                "test-model",
                &PickOptions::new(),
                &[disabled],
            )
            .unwrap_err();
        assert!(matches!(err, RelayError::NoAvailable { .. }));
    }

    #[test]
    fn test_session_key_uses_lowercased_request_provider() {
        let (selector, _) = selector(cfg(&[], 3));
        let auths = vec![codex_auth("auth-a")];
        let options = PickOptions::with_session_id("session-1");

        selector
            .pick(&RequestContext::new(), "Codex", "test-model", &options, &auths)
            .unwrap();
        assert_eq!(binding_keys(&selector), vec!["codex:session-1"]);
    }

    #[test]
    fn test_mixed_creates_provider_scoped_binding() {
        let (selector, _) = selector(cfg(&["codex"], 1));
        let auths = vec![codex_auth("auth-a")];
        let options = PickOptions::with_session_id("session-1");

        let selected = selector
            .pick(&RequestContext::new(), "mixed", "test-model", &options, &auths)
            .unwrap();
        assert_eq!(selected.id, "auth-a");

        let state = selector.lock();
        assert!(state.sessions.contains_key("codex:session-1"));
        assert!(!state.sessions.contains_key("mixed:session-1"));
    }

    #[test]
    fn test_mixed_cooldown_failover() {
        let (selector, _) = selector(cfg(&["codex"], 1));
        let auths = vec![codex_auth("auth-a"), codex_auth("auth-b")];
        let options = PickOptions::with_session_id("session-1");

        let first = selector
            .pick(&RequestContext::new(), "mixed", "test-model", &options, &auths)
            .unwrap();
        assert_eq!(first.id, "auth-a");

        let ctx = RequestContext::new().with_session_id("session-1");
        selector.record_result(&ctx, &failure("auth-a", "codex", 429));

        let second = selector
            .pick(&RequestContext::new(), "mixed", "test-model", &options, &auths)
            .unwrap();
        assert_eq!(second.id, "auth-b");
    }

    #[test]
    fn test_sticky_within_ttl() {
        let (selector, clock) = selector(cfg(&[], 3));
        let auths = vec![codex_auth("auth-a"), codex_auth("auth-b")];
        let options = PickOptions::with_session_id("session-1");
        let ctx = RequestContext::new();

        let first = selector
            .pick(&ctx, "codex", "test-model", &options, &auths)
            .unwrap();
        *clock.lock().unwrap() = base() + Duration::minutes(2);
        let second = selector
            .pick(&ctx, "codex", "test-model", &options, &auths)
            .unwrap();
        *clock.lock().unwrap() = base() + Duration::minutes(4);
        let third = selector
            .pick(&ctx, "codex", "test-model", &options, &auths)
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.id, third.id);
    }

    #[test]
    fn test_stale_binding_evicted_after_ttl() {
        let (selector, clock) = selector(cfg(&[], 3));
        let auths = vec![codex_auth("auth-a")];
        let options = PickOptions::with_session_id("session-1");

        selector
            .pick(&RequestContext::new(), "codex", "test-model", &options, &auths)
            .unwrap();
        assert_eq!(binding_keys(&selector).len(), 1);

        // Default TTL is 5 minutes; jump past it.
        *clock.lock().unwrap() = base() + Duration::minutes(6);
        let selected = selector
            .pick(&RequestContext::new(), "codex", "test-model", &options, &auths)
            .unwrap();
        assert_eq!(selected.id, "auth-a");

        let state = selector.lock();
        let binding = state.sessions.get("codex:session-1").unwrap();
        assert_eq!(binding.last_used, base() + Duration::minutes(6));
    }

    #[test]
    fn test_cooldown_with_single_candidate_falls_back() {
        let (selector, _) = selector(cfg(&[], 1));
        let auths = vec![codex_auth("auth-a")];
        let options = PickOptions::with_session_id("session-1");
        let ctx = RequestContext::new().with_session_id("session-1");

        selector
            .pick(&RequestContext::new(), "codex", "test-model", &options, &auths)
            .unwrap();
        selector.record_result(&ctx, &failure("auth-a", "codex", 429));

        // The only candidate is excluded; exclusion empties the pool, so the
        // full set is used again.
        let selected = selector
            .pick(&RequestContext::new(), "codex", "test-model", &options, &auths)
            .unwrap();
        assert_eq!(selected.id, "auth-a");
    }

    #[test]
    fn test_failure_below_threshold_keeps_binding() {
        let (selector, _) = selector(cfg(&[], 3));
        let auths = vec![codex_auth("auth-a"), codex_auth("auth-b")];
        let options = PickOptions::with_session_id("session-1");
        let ctx = RequestContext::new().with_session_id("session-1");

        let first = selector
            .pick(&RequestContext::new(), "codex", "test-model", &options, &auths)
            .unwrap();
        selector.record_result(&ctx, &failure(&first.id, "codex", 500));

        let second = selector
            .pick(&RequestContext::new(), "codex", "test-model", &options, &auths)
            .unwrap();
        assert_eq!(first.id, second.id, "one failure under threshold=3 stays sticky");
    }

    #[test]
    fn test_success_resets_failure_count_and_cooldown() {
        let (selector, _) = selector(cfg(&[], 2));
        let auths = vec![codex_auth("auth-a"), codex_auth("auth-b")];
        let options = PickOptions::with_session_id("session-1");
        let ctx = RequestContext::new().with_session_id("session-1");

        let first = selector
            .pick(&RequestContext::new(), "codex", "test-model", &options, &auths)
            .unwrap();
        selector.record_result(&ctx, &failure(&first.id, "codex", 429));
        selector.record_result(&ctx, &success(&first.id, "codex"));

        {
            let state = selector.lock();
            let binding = state.sessions.get("codex:session-1").unwrap();
            assert_eq!(binding.fail_count, 0);
            assert!(binding.cooldown_until.is_none());
        }

        let second = selector
            .pick(&RequestContext::new(), "codex", "test-model", &options, &auths)
            .unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_unknown_provider_with_allow_list_is_non_sticky() {
        let (selector, _) = selector(cfg(&["codex"], 1));
        let auths = vec![Auth::new("auth-a", "gemini")];
        let options = PickOptions::with_session_id("session-1");

        let selected = selector
            .pick(&RequestContext::new(), "gemini", "test-model", &options, &auths)
            .unwrap();
        assert_eq!(selected.id, "auth-a");
        assert!(binding_keys(&selector).is_empty());

        // Result reporting for a non-enabled provider leaves no binding state.
        let ctx = RequestContext::new().with_session_id("session-1");
        selector.record_result(&ctx, &failure("auth-a", "gemini", 429));
        assert!(binding_keys(&selector).is_empty());
    }

    #[test]
    fn test_record_result_ignores_mismatched_auth() {
        let (selector, _) = selector(cfg(&[], 1));
        let auths = vec![codex_auth("auth-a"), codex_auth("auth-b")];
        let options = PickOptions::with_session_id("session-1");
        let ctx = RequestContext::new().with_session_id("session-1");

        let first = selector
            .pick(&RequestContext::new(), "codex", "test-model", &options, &auths)
            .unwrap();
        assert_eq!(first.id, "auth-a");

        // A result for a different auth must not trip the binding's failover.
        selector.record_result(&ctx, &failure("auth-b", "codex", 429));
        let second = selector
            .pick(&RequestContext::new(), "codex", "test-model", &options, &auths)
            .unwrap();
        assert_eq!(second.id, "auth-a");
    }

    #[test]
    fn test_binding_survives_missing_auth_and_reselects() {
        let (selector, _) = selector(cfg(&[], 3));
        let both = vec![codex_auth("auth-a"), codex_auth("auth-b")];
        let only_b = vec![codex_auth("auth-b")];
        let options = PickOptions::with_session_id("session-1");

        let first = selector
            .pick(&RequestContext::new(), "codex", "test-model", &options, &both)
            .unwrap();
        assert_eq!(first.id, "auth-a");

        // auth-a disappeared from the candidates (e.g. disabled mid-session).
        let second = selector
            .pick(&RequestContext::new(), "codex", "test-model", &options, &only_b)
            .unwrap();
        assert_eq!(second.id, "auth-b");

        let state = selector.lock();
        assert_eq!(
            state.sessions.get("codex:session-1").unwrap().auth_id,
            "auth-b"
        );
    }

    #[test]
    fn test_tie_break_prefers_lower_load_then_id() {
        let (selector, _) = selector(cfg(&[], 3));
        let auths = vec![codex_auth("auth-b"), codex_auth("auth-a")];

        // No stats at all: scores tie, loads tie, smallest id wins.
        let first = selector
            .pick(
                &RequestContext::new(),
                "codex",
                "test-model",
                &PickOptions::new(),
                &auths,
            )
            .unwrap();
        assert_eq!(first.id, "auth-a");

        // auth-a now carries a pending request; equal score, lower load wins.
        let second = selector
            .pick(
                &RequestContext::new(),
                "codex",
                "test-model",
                &PickOptions::new(),
                &auths,
            )
            .unwrap();
        assert_eq!(second.id, "auth-b");
    }

    #[test]
    fn test_scoring_prefers_healthy_auth() {
        let (selector, _) = selector(cfg(&[], 3));
        let auths = vec![codex_auth("auth-a"), codex_auth("auth-b")];
        let ctx = RequestContext::new();

        for _ in 0..3 {
            selector.record_result(&ctx, &failure("auth-a", "codex", 429));
            selector.record_result(&ctx, &success("auth-b", "codex"));
        }

        let selected = selector
            .pick(&ctx, "codex", "test-model", &PickOptions::new(), &auths)
            .unwrap();
        assert_eq!(selected.id, "auth-b");
    }

    #[test]
    fn test_scoring_prefers_quota_headroom() {
        let (selector, _) = selector(cfg(&[], 3));
        let mut warned = codex_auth("auth-a");
        warned.quota.next_recover_at = Some(base() + Duration::hours(1));
        let auths = vec![warned, codex_auth("auth-b")];

        let selected = selector
            .pick(
                &RequestContext::new(),
                "codex",
                "test-model",
                &PickOptions::new(),
                &auths,
            )
            .unwrap();
        assert_eq!(selected.id, "auth-b");
    }

    #[test]
    fn test_load_never_improves_score() {
        let mut config = cfg(&[], 3);
        config.load_weight = 0.5;
        let (selector, _) = selector(config);
        let auths = vec![codex_auth("auth-a"), codex_auth("auth-b")];
        let ctx = RequestContext::new();

        // Same health for both, but auth-a accumulates completed requests.
        selector.record_result(&ctx, &success("auth-a", "codex"));
        selector.record_result(&ctx, &success("auth-b", "codex"));
        selector.record_result(&ctx, &success("auth-a", "codex"));
        selector.record_result(&ctx, &success("auth-a", "codex"));

        let selected = selector
            .pick(&ctx, "codex", "test-model", &PickOptions::new(), &auths)
            .unwrap();
        assert_eq!(selected.id, "auth-b");
    }

    #[test]
    fn test_health_window_caps_samples() {
        let mut config = cfg(&[], 3);
        config.health_window = 5;
        let (selector, _) = selector(config);
        let ctx = RequestContext::new();

        for _ in 0..12 {
            selector.record_result(&ctx, &failure("auth-a", "codex", 500));
        }

        let state = selector.lock();
        assert_eq!(state.stats.get("auth-a").unwrap().recent_results.len(), 5);
    }

    #[test]
    fn test_update_config_preserves_runtime_state() {
        let (selector, _) = selector(cfg(&[], 3));
        let auths = vec![codex_auth("auth-a")];
        let options = PickOptions::with_session_id("session-1");

        selector
            .pick(&RequestContext::new(), "codex", "test-model", &options, &auths)
            .unwrap();
        selector.update_config(cfg(&["codex"], 1));

        let state = selector.lock();
        assert!(state.sessions.contains_key("codex:session-1"));
        assert_eq!(state.cfg.failure_threshold, 1);
        // Normalisation still applied on the swap.
        assert_eq!(state.cfg.ttl, Duration::minutes(5));
    }

    #[test]
    fn test_model_cooldown_excludes_candidate() {
        let (selector, _) = selector(cfg(&[], 3));
        let mut cooled = codex_auth("auth-a");
        cooled.model_states.insert(
            "gpt-5".to_string(),
            relay_auth::ModelState {
                quota: relay_auth::QuotaState {
                    exceeded: true,
                    reason: "codex_5h_limit".into(),
                    next_recover_at: Some(base() + Duration::hours(5)),
                },
            },
        );
        let auths = vec![cooled, codex_auth("auth-b")];

        let selected = selector
            .pick(
                &RequestContext::new(),
                "codex",
                "gpt-5",
                &PickOptions::new(),
                &auths,
            )
            .unwrap();
        assert_eq!(selected.id, "auth-b");

        // The same auth is fine for a model without an exhausted override.
        let selected = selector
            .pick(
                &RequestContext::new(),
                "codex",
                "gpt-4",
                &PickOptions::new(),
                &auths,
            )
            .unwrap();
        assert_eq!(selected.id, "auth-a");
    }
}
