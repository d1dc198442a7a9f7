//! Scheduler: session-sticky auth selection, scoring, and cooldown failover.

pub mod config;
pub mod hook;
pub mod options;
pub mod round_robin;
pub mod session_selector;

pub use config::SessionSelectorConfig;
pub use hook::SelectorResultHook;
pub use options::{PickOptions, SESSION_ID_METADATA_KEY};
pub use round_robin::RoundRobinSelector;
pub use session_selector::{AuthSelector, SessionSelector};
