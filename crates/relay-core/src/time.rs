//! Injectable clock and timestamp helpers.

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A source of "now", overridable in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The wall clock.
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Drop every timestamp strictly before `cutoff`.
///
/// Lists are kept monotonically non-decreasing by their owners, so a single
/// scan from the front suffices.
pub fn prune_old_timestamps(values: &mut Vec<DateTime<Utc>>, cutoff: DateTime<Utc>) {
    let keep_from = values
        .iter()
        .position(|ts| *ts >= cutoff)
        .unwrap_or(values.len());
    if keep_from > 0 {
        values.drain(..keep_from);
    }
}

/// Clamp a value to [0, 1].
pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Serde adapter mapping `chrono::Duration` to whole seconds in config files.
pub mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(value.num_seconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(secs))
    }
}
