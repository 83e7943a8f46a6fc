//! Error types for runtime client operations

use thiserror::Error;

/// Errors surfaced by the poll side of a runtime client
///
/// A poll error is terminal for the event loop: once the client cannot
/// guarantee event delivery, the agent must stop driving it.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The link to the runtime client is gone
    #[error("link to the runtime client is gone")]
    Disconnected,

    /// The poll operation failed inside the client
    #[error("poll failed: {0}")]
    Poll(String),
}
