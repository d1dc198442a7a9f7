//! Pluggable auth persistence.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use tracing::warn;

use crate::model::Auth;

/// Storage collaborator for the registry. Failures are propagated verbatim;
/// the manager does not interpret them.
pub trait AuthStore: Send + Sync {
    fn put(&self, auth: &Auth) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<Auth>>;
    fn delete(&self, id: &str) -> Result<()>;
    fn list(&self) -> Result<Vec<Auth>>;
}

/// In-memory store, the default collaborator and the test double.
#[derive(Debug, Default)]
pub struct MemoryAuthStore {
    entries: Mutex<HashMap<String, Auth>>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthStore for MemoryAuthStore {
    fn put(&self, auth: &Auth) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(auth.id.clone(), auth.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Auth>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Auth>> {
        let mut auths: Vec<Auth> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        auths.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(auths)
    }
}

/// File-backed store: one pretty-printed JSON file per auth under `base_dir`.
///
/// Writes go through a temp file and an atomic rename so readers never see a
/// partial auth. Unparseable files are skipped on list.
#[derive(Debug, Clone)]
pub struct FileAuthStore {
    base_dir: PathBuf,
}

impl FileAuthStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn auth_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", sanitize_id(id)))
    }
}

/// Auth ids are often file paths themselves; flatten separators so every id
/// maps to a single file name inside the store directory.
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect()
}

impl AuthStore for FileAuthStore {
    fn put(&self, auth: &Auth) -> Result<()> {
        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "failed to create auth store directory: {}",
                self.base_dir.display()
            )
        })?;

        let path = self.auth_path(&auth.id);
        let tmp_path = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(auth).context("failed to serialize auth")?;
        fs::write(&tmp_path, contents)
            .with_context(|| format!("failed to write auth file: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path).with_context(|| {
            format!("failed to atomically replace auth file {}", path.display())
        })?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Auth>> {
        let path = self.auth_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read auth file: {}", path.display()))?;
        let auth: Auth = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse auth file: {}", path.display()))?;
        Ok(Some(auth))
    }

    fn delete(&self, id: &str) -> Result<()> {
        let path = self.auth_path(id);
        if !path.exists() {
            return Ok(());
        }
        fs::remove_file(&path)
            .with_context(|| format!("failed to remove auth file: {}", path.display()))
    }

    fn list(&self) -> Result<Vec<Auth>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.base_dir).with_context(|| {
            format!(
                "failed to read auth store directory: {}",
                self.base_dir.display()
            )
        })?;

        let mut auths = Vec::new();
        for entry in entries {
            let entry = entry.context("failed to read directory entry")?;
            let path = entry.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            match read_auth(&path) {
                Ok(auth) => auths.push(auth),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unparseable auth file");
                }
            }
        }
        auths.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(auths)
    }
}

fn read_auth(path: &Path) -> Result<Auth> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read auth file: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse auth file: {}", path.display()))
}
