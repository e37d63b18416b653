//! Event loop configuration.

use serde::Deserialize;

/// Settings for an [`EventLoop`](crate::EventLoop).
///
/// Deserializable so a host can keep it alongside its own settings; missing
/// fields fall back to the defaults.
///
/// # Examples
///
/// ```
/// use async_runtime::EventLoopConfig;
///
/// let config = EventLoopConfig::default().with_name("io").with_max_tasks_per_turn(64);
/// assert_eq!(config.name, "io");
/// assert_eq!(config.max_tasks_per_turn, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventLoopConfig {
    /// Name used in log events emitted by the loop
    pub name: String,
    /// Upper bound on tasks run by a single `run_pending` call
    pub max_tasks_per_turn: usize,
}

impl EventLoopConfig {
    /// Sets the loop name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the per-turn task budget. Zero is treated as one.
    pub fn with_max_tasks_per_turn(mut self, max: usize) -> Self {
        self.max_tasks_per_turn = max.max(1);
        self
    }
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            name: "event-loop".to_string(),
            max_tasks_per_turn: 1024,
        }
    }
}
