//! # Edgelink Agent
//!
//! Device-side application agent: the event dispatch loop, RPC dispatch,
//! configuration delivery, heartbeat telemetry and the sensor-variant loop.

#![warn(missing_docs)]

/// Event dispatch loop
pub mod agent;

/// Agent-local state threaded through every subsystem
pub mod context;

/// RPC dispatch: decode inbound calls and update agent state
pub mod rpc;

/// Configuration delivery: latest-wins buffering and echo drain
pub mod config;

/// Telemetry publication: heartbeat batches, submission and completion
pub mod telemetry;

/// Sensor-variant loop: stream lifecycle around the frame pipeline
#[cfg(feature = "sensor")]
pub mod sensor;

pub use agent::{Agent, HEARTBEAT_PERIOD, POLL_TIMEOUT};
pub use context::{AgentContext, Rgb};
