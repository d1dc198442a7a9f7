//! Session selector configuration.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Duration;
use relay_core::time::{clamp01, duration_secs};
use serde::{Deserialize, Serialize};

/// Tuning knobs for session-aware routing.
///
/// Zero/negative fields mean "unset" and are replaced by defaults in
/// [`SessionSelectorConfig::normalise`]; the selector normalises on every
/// config swap, so runtime state never sees an unset value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSelectorConfig {
    pub enabled: bool,

    /// Provider allow-list for session stickiness. Empty means every
    /// provider is session-enabled.
    pub providers: Vec<String>,

    /// How long a session binding stays live without use.
    #[serde(with = "duration_secs")]
    pub ttl: Duration,

    /// Consecutive failures before a binding enters failover cooldown.
    pub failure_threshold: u32,

    /// How long a cooled binding is barred from re-selection.
    #[serde(with = "duration_secs")]
    pub cooldown: Duration,

    /// Rolling window over which request counts contribute to load.
    #[serde(with = "duration_secs")]
    pub load_window: Duration,

    /// Weight of the load penalty in scoring, clamped to [0, 1].
    pub load_weight: f64,

    /// Rolling sample count used to compute success rate.
    pub health_window: usize,

    pub weight_success: f64,
    pub weight_quota: f64,

    pub penalty_429: f64,
    pub penalty_403: f64,
    pub penalty_5xx: f64,
}

impl Default for SessionSelectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            providers: Vec::new(),
            ttl: Duration::zero(),
            failure_threshold: 0,
            cooldown: Duration::zero(),
            load_window: Duration::zero(),
            load_weight: 0.0,
            health_window: 0,
            weight_success: 0.0,
            weight_quota: 0.0,
            penalty_429: 0.0,
            penalty_403: 0.0,
            penalty_5xx: 0.0,
        }
    }
}

impl SessionSelectorConfig {
    /// Apply defaults to unset fields. Idempotent.
    pub fn normalise(mut self) -> Self {
        if self.ttl <= Duration::zero() {
            self.ttl = Duration::minutes(5);
        }
        if self.failure_threshold == 0 {
            self.failure_threshold = 3;
        }
        if self.cooldown <= Duration::zero() {
            self.cooldown = Duration::minutes(5);
        }
        if self.load_window <= Duration::zero() {
            self.load_window = Duration::minutes(10);
        }
        self.load_weight = clamp01(self.load_weight);
        if self.health_window == 0 {
            self.health_window = 50;
        }
        if self.weight_success <= 0.0 && self.weight_quota <= 0.0 {
            self.weight_success = 0.6;
            self.weight_quota = 0.4;
        }
        if self.penalty_429 <= 0.0 {
            self.penalty_429 = 1.0;
        }
        if self.penalty_403 <= 0.0 {
            self.penalty_403 = 0.7;
        }
        if self.penalty_5xx <= 0.0 {
            self.penalty_5xx = 0.4;
        }
        self
    }

    /// Parse a TOML document and normalise the result.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).context("failed to parse session selector config")?;
        Ok(config.normalise())
    }

    /// Load from a TOML file. Returns None if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&contents).map(Some)
    }
}
