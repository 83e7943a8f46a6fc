//! Message and event types exchanged with the runtime client

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One owned key/value pair pending send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryEntry {
    /// Topic key the entry is published under
    pub key: String,
    /// Payload bytes (UTF-8 JSON by convention)
    pub value: Bytes,
}

impl TelemetryEntry {
    /// Create a new entry from an owned key and value
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An ordered sequence of entries submitted atomically as one publish request
///
/// Ownership of the batch moves into [`crate::RuntimeClient::submit_telemetry`]
/// on success and moves back out in the eventual
/// [`ClientEvent::TelemetryDone`], so the buffers cannot be touched while the
/// transport may still read them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryBatch {
    /// Correlation token tying the completion back to this batch
    pub token: Uuid,
    /// Optional time reference (e.g. a sensor frame timestamp)
    pub timestamp: Option<u64>,
    /// Entries published by this batch, in order
    pub entries: Vec<TelemetryEntry>,
}

impl TelemetryBatch {
    /// Create a batch from a sequence of entries
    pub fn new(entries: Vec<TelemetryEntry>) -> Self {
        Self {
            token: Uuid::new_v4(),
            timestamp: None,
            entries,
        }
    }

    /// Create a one-entry batch
    pub fn single(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self::new(vec![TelemetryEntry::new(key, value)])
    }

    /// Attach a time reference to the batch
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Check that every entry carries a non-empty key and value
    pub fn is_well_formed(&self) -> bool {
        !self.entries.is_empty()
            && self
                .entries
                .iter()
                .all(|e| !e.key.is_empty() && !e.value.is_empty())
    }
}

/// Reason code delivered with a telemetry completion
///
/// Whatever the reason, the completion hands the batch back for release; an
/// unexpected reason is released first and logged after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionReason {
    /// The batch was handed to the transport
    Sent,
    /// The transport gave up on the batch
    Error,
    /// The client is shutting down before the batch could be sent
    Exit,
}

/// An inbound remote-procedure call
///
/// Transient: state needed past the dispatch must be extracted before the
/// event is dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Opaque correlation id assigned by the management plane
    pub id: u64,
    /// Method name
    pub method: String,
    /// Serialized structured payload (UTF-8 JSON)
    pub params: String,
}

impl RpcRequest {
    /// Create a new RPC request
    pub fn new(id: u64, method: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            id,
            method: method.into(),
            params: params.into(),
        }
    }
}

/// A configuration payload delivered for one subscribed topic
///
/// Always an owned copy; the client never hands out borrows of its own
/// buffers past the delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigBlob {
    /// Topic the blob was delivered for
    pub topic: String,
    /// Owned payload bytes
    pub payload: Bytes,
}

impl ConfigBlob {
    /// Create a new configuration blob from owned storage
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// One event delivered by a poll step
#[derive(Debug)]
pub enum ClientEvent {
    /// An inbound remote-procedure call is ready for dispatch
    Rpc(RpcRequest),
    /// A configuration blob arrived for a subscribed topic
    Config(ConfigBlob),
    /// A peer-to-peer message arrived on a subscribed topic
    ///
    /// Transient like an RPC: the payload is an owned copy and anything
    /// needed past the dispatch must be extracted before the event is
    /// dropped.
    Message {
        /// Topic the message was published on
        topic: String,
        /// Owned message payload
        payload: Bytes,
    },
    /// A previously submitted batch completed; ownership moves back out
    TelemetryDone {
        /// Why the completion fired
        reason: CompletionReason,
        /// The batch originally given to `submit_telemetry`
        batch: TelemetryBatch,
    },
}

/// Outcome of one poll step
#[derive(Debug)]
pub enum Poll {
    /// An event was delivered and must be dispatched
    Event(ClientEvent),
    /// The bounded wait elapsed with nothing to deliver
    Idle,
    /// The management plane asked the agent to terminate
    ShouldExit,
}
