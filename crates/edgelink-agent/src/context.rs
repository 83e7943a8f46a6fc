//! Agent-local state threaded through every subsystem

use edgelink_client::ConfigBlob;

/// Color channel state driven by the `set-rgb` RPC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
}

/// All mutable agent state, owned by the event loop's task
///
/// One value per agent instance; subsystem operations take it explicitly, so
/// independent agents (and tests) never share state.
#[derive(Debug, Default)]
pub struct AgentContext {
    /// Current color channels reported by heartbeat telemetry
    pub rgb: Rgb,
    /// At most one pending configuration blob; latest delivery wins
    pub pending_config: Option<ConfigBlob>,
}

impl AgentContext {
    /// Create a fresh context with zeroed channels and nothing pending
    pub fn new() -> Self {
        Self::default()
    }
}
