//! Auth registry: registration, lookup, enumeration, hook fan-out.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use relay_core::{system_clock, Clock, RelayError};
use tracing::{debug, info, warn};

use crate::context::RequestContext;
use crate::hooks::AuthHook;
use crate::model::{Auth, AuthStatus, ExecResult};
use crate::quota::in_cooldown_for_model;
use crate::store::AuthStore;

/// Filter for [`AuthManager::list`].
///
/// Provider and status are exact matches; a model filter keeps auths with no
/// active cooldown for that model right now, which makes `list` the
/// candidate-enumeration step for a `(provider, model)` request.
#[derive(Debug, Clone, Default)]
pub struct AuthFilter {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub status: Option<AuthStatus>,
}

/// Registry of stored credentials over a pluggable [`AuthStore`].
///
/// The in-memory index is the source of truth for reads; every mutation goes
/// through the store first so a storage failure never leaves the index ahead
/// of the persisted state. Hook fan-out happens outside the index lock.
pub struct AuthManager {
    store: Arc<dyn AuthStore>,
    index: Mutex<HashMap<String, Auth>>,
    hooks: Mutex<Vec<Arc<dyn AuthHook>>>,
    clock: Clock,
}

impl AuthManager {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self {
            store,
            index: Mutex::new(HashMap::new()),
            hooks: Mutex::new(Vec::new()),
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Fill the index from the store. Returns the number of auths loaded.
    pub fn load(&self) -> Result<usize, RelayError> {
        let auths = self.store.list().map_err(RelayError::storage)?;
        let count = auths.len();
        let mut index = self.lock_index();
        index.clear();
        for auth in auths {
            index.insert(auth.id.clone(), auth);
        }
        drop(index);
        debug!(count, "loaded auths from store");
        Ok(count)
    }

    pub fn add_hook(&self, hook: Arc<dyn AuthHook>) {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }

    /// Register a new auth. Assigns a ULID id when the id is empty and
    /// lowercases the provider tag.
    pub fn register(&self, mut auth: Auth) -> Result<Auth, RelayError> {
        if auth.id.trim().is_empty() {
            auth.id = ulid::Ulid::new().to_string();
        }
        auth.provider = auth.provider.trim().to_lowercase();

        {
            let mut index = self.lock_index();
            if index.contains_key(&auth.id) {
                return Err(RelayError::AlreadyExists(auth.id));
            }
            self.store.put(&auth).map_err(RelayError::storage)?;
            index.insert(auth.id.clone(), auth.clone());
        }

        info!(auth_id = %auth.id, provider = %auth.provider, "registered auth");
        self.fan_out(|hook| hook.on_auth_registered(&auth));
        Ok(auth)
    }

    /// Replace an existing auth.
    pub fn update(&self, mut auth: Auth) -> Result<Auth, RelayError> {
        auth.provider = auth.provider.trim().to_lowercase();

        {
            let mut index = self.lock_index();
            if !index.contains_key(&auth.id) {
                return Err(RelayError::NotFound(auth.id));
            }
            self.store.put(&auth).map_err(RelayError::storage)?;
            index.insert(auth.id.clone(), auth.clone());
        }

        debug!(auth_id = %auth.id, "updated auth");
        self.fan_out(|hook| hook.on_auth_updated(&auth));
        Ok(auth)
    }

    /// Flip an auth's lifecycle status (enable/disable/invalidate).
    pub fn set_status(&self, id: &str, status: AuthStatus) -> Result<Auth, RelayError> {
        let mut auth = self
            .get(id)
            .ok_or_else(|| RelayError::NotFound(id.to_string()))?;
        auth.status = status;
        self.update(auth)
    }

    pub fn get(&self, id: &str) -> Option<Auth> {
        self.lock_index().get(id).cloned()
    }

    /// Enumerate auths matching the filter, sorted by id.
    pub fn list(&self, filter: &AuthFilter) -> Vec<Auth> {
        let now = (self.clock)();
        let index = self.lock_index();
        let mut auths: Vec<Auth> = index
            .values()
            .filter(|auth| {
                if let Some(provider) = &filter.provider {
                    if !provider.eq_ignore_ascii_case(&auth.provider) {
                        return false;
                    }
                }
                if let Some(status) = filter.status {
                    if auth.status != status {
                        return false;
                    }
                }
                if let Some(model) = &filter.model {
                    if in_cooldown_for_model(auth, model, now) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        drop(index);
        auths.sort_by(|a, b| a.id.cmp(&b.id));
        auths
    }

    /// Fan a per-request outcome out to every hook.
    pub fn dispatch_result(&self, ctx: &RequestContext, result: &ExecResult) {
        self.fan_out(|hook| hook.on_result(ctx, result));
    }

    fn lock_index(&self) -> std::sync::MutexGuard<'_, HashMap<String, Auth>> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Call every hook, isolating each call: one panicking hook must not
    /// starve the rest or abort the triggering operation.
    fn fan_out(&self, call: impl Fn(&dyn AuthHook)) {
        let hooks: Vec<Arc<dyn AuthHook>> = self
            .hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for hook in hooks {
            if catch_unwind(AssertUnwindSafe(|| call(hook.as_ref()))).is_err() {
                warn!("auth hook panicked");
            }
        }
    }
}
