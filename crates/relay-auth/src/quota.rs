//! Quota/cooldown resolution.
//!
//! Pure decision functions over [`Auth`] quota state: whether an auth is in
//! cooldown right now, when it recovers, and how healthy its quota looks for
//! scoring.

use crate::model::{provider_matches, Auth, QuotaState};
use chrono::{DateTime, Utc};

/// An active cooldown with a known recovery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownState {
    pub reason: String,
    pub until: DateTime<Utc>,
}

/// Resolve the governing cooldown across the global quota and every
/// per-model override.
///
/// Overlapping limits (5-hour window, weekly window, per-model caps) can
/// fire simultaneously; the soonest-to-expire governs when the auth may be
/// tried again. Expired recovery times are ignored, so the result is never
/// in the past.
pub fn resolve_auth_cooldown(auth: &Auth, now: DateTime<Utc>) -> Option<CooldownState> {
    let candidates =
        std::iter::once(&auth.quota).chain(auth.model_states.values().map(|state| &state.quota));

    let mut earliest: Option<CooldownState> = None;
    for quota in candidates {
        if !quota.exceeded {
            continue;
        }
        let Some(until) = quota.next_recover_at else {
            continue;
        };
        if until <= now {
            continue;
        }
        if earliest.as_ref().is_none_or(|c| until < c.until) {
            earliest = Some(CooldownState {
                reason: quota.reason.clone(),
                until,
            });
        }
    }
    earliest
}

fn quota_in_cooldown(quota: &QuotaState, now: DateTime<Utc>) -> bool {
    if !quota.exceeded {
        return false;
    }
    // No recovery time on an exceeded quota means an indefinite cooldown.
    match quota.next_recover_at {
        Some(until) => until > now,
        None => true,
    }
}

/// Is the auth in cooldown for this model right now?
///
/// Checks the global quota plus the given model's override; other models'
/// overrides do not block.
pub fn in_cooldown_for_model(auth: &Auth, model: &str, now: DateTime<Utc>) -> bool {
    if quota_in_cooldown(&auth.quota, now) {
        return true;
    }
    if model.is_empty() {
        return false;
    }
    auth.model_states
        .get(model)
        .is_some_and(|state| quota_in_cooldown(&state.quota, now))
}

/// Quota health for scoring: 0 when exceeded, 0.2 in the warning zone (a
/// recovery time is still pending but the quota is no longer exceeded),
/// 1 otherwise.
pub fn quota_health(auth: &Auth, model: &str, now: DateTime<Utc>) -> f64 {
    let quota = if model.is_empty() {
        &auth.quota
    } else {
        auth.model_states
            .get(model)
            .map(|state| &state.quota)
            .unwrap_or(&auth.quota)
    };
    if quota.exceeded {
        return 0.0;
    }
    if quota.next_recover_at.is_some_and(|until| until > now) {
        return 0.2;
    }
    1.0
}

/// Filter candidates to those selectable for `(provider, model)` at `now`:
/// Active status, matching provider, no active cooldown for the model.
pub fn filter_available<'a>(
    auths: &'a [Auth],
    provider: &str,
    model: &str,
    now: DateTime<Utc>,
) -> Vec<&'a Auth> {
    auths
        .iter()
        .filter(|auth| {
            auth.is_active()
                && provider_matches(provider, &auth.provider)
                && !in_cooldown_for_model(auth, model, now)
        })
        .collect()
}
