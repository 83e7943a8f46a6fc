//! # Edgelink Client
//!
//! Runtime-client boundary for Edgelink device agents: event and telemetry
//! types, the client trait the event loop drives, and an in-process link
//! implementation used by tests and the loopback binary.

#![warn(missing_docs)]

/// Message and event types exchanged with the runtime client
pub mod message;

/// Runtime client trait and the in-process link implementation
pub mod client;

/// Blob/object-storage provider boundary
pub mod blob;

/// Error types for runtime client operations
pub mod error;

pub use client::{link, link_with_capacity, LinkClient, LinkHub, RuntimeClient, SubmitError};
pub use error::ClientError;
pub use message::{
    ClientEvent, CompletionReason, ConfigBlob, Poll, RpcRequest, TelemetryBatch, TelemetryEntry,
};
