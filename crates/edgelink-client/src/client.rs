//! Runtime client trait and the in-process link implementation

use crate::error::ClientError;
use crate::message::{ClientEvent, CompletionReason, ConfigBlob, Poll, RpcRequest, TelemetryBatch};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::debug;
use uuid::Uuid;

/// Default capacity of the outbound telemetry queue
pub const DEFAULT_TELEMETRY_CAPACITY: usize = 16;

/// Synchronous failure of a telemetry submission
///
/// The batch is handed straight back to the caller, who releases it; no
/// completion event will ever reference it.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The outbound queue is full; retry after draining
    #[error("telemetry queue full")]
    QueueFull(TelemetryBatch),

    /// The client is not currently connected to the management plane
    #[error("not connected to the management plane")]
    NotConnected(TelemetryBatch),
}

impl SubmitError {
    /// Take the rejected batch back for local release
    pub fn into_batch(self) -> TelemetryBatch {
        match self {
            Self::QueueFull(batch) | Self::NotConnected(batch) => batch,
        }
    }
}

/// Capability granting access to one logical agent connection
///
/// Exactly one value per agent; the `&mut` receivers confine all operations
/// against it to a single owner at a time.
#[async_trait]
pub trait RuntimeClient: Send {
    /// Wait up to `timeout` for the next event or loop-control signal
    async fn poll(&mut self, timeout: Duration) -> Result<Poll, ClientError>;

    /// Hand a batch to the client for asynchronous publication
    ///
    /// On `Ok` the batch is owned by the client until a
    /// [`ClientEvent::TelemetryDone`] hands it back; on `Err` the batch is
    /// returned immediately and no completion will fire.
    fn submit_telemetry(&mut self, batch: TelemetryBatch) -> Result<Uuid, SubmitError>;
}

/// Agent-side endpoint of an in-process link
pub struct LinkClient {
    events: mpsc::UnboundedReceiver<ClientEvent>,
    telemetry: mpsc::Sender<TelemetryBatch>,
    shutdown: watch::Receiver<bool>,
}

/// Transport-side endpoint of an in-process link
///
/// Stands in for the management-plane transport: it injects RPCs and
/// configuration, dequeues submitted telemetry, and fires completions.
/// Dropping the hub makes further submissions fail `NotConnected` and poll
/// report [`ClientError::Disconnected`].
pub struct LinkHub {
    events: mpsc::UnboundedSender<ClientEvent>,
    telemetry: mpsc::Receiver<TelemetryBatch>,
    shutdown: watch::Sender<bool>,
    next_rpc_id: u64,
}

/// Create a connected in-process client/hub pair with default capacity
pub fn link() -> (LinkClient, LinkHub) {
    link_with_capacity(DEFAULT_TELEMETRY_CAPACITY)
}

/// Create a connected in-process client/hub pair with a bounded telemetry queue
pub fn link_with_capacity(capacity: usize) -> (LinkClient, LinkHub) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (telemetry_tx, telemetry_rx) = mpsc::channel(capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let client = LinkClient {
        events: event_rx,
        telemetry: telemetry_tx,
        shutdown: shutdown_rx,
    };
    let hub = LinkHub {
        events: event_tx,
        telemetry: telemetry_rx,
        shutdown: shutdown_tx,
        next_rpc_id: 1,
    };
    (client, hub)
}

#[async_trait]
impl RuntimeClient for LinkClient {
    async fn poll(&mut self, timeout: Duration) -> Result<Poll, ClientError> {
        if *self.shutdown.borrow() {
            return Ok(Poll::ShouldExit);
        }

        // Exit and event delivery take precedence over the idle timeout so a
        // zero timeout still drains what is already queued.
        tokio::select! {
            biased;

            changed = self.shutdown.changed() => match changed {
                Ok(()) if *self.shutdown.borrow() => Ok(Poll::ShouldExit),
                Ok(()) => Ok(Poll::Idle),
                Err(_) => Err(ClientError::Disconnected),
            },

            event = self.events.recv() => match event {
                Some(event) => Ok(Poll::Event(event)),
                None => Err(ClientError::Disconnected),
            },

            _ = tokio::time::sleep(timeout) => Ok(Poll::Idle),
        }
    }

    fn submit_telemetry(&mut self, batch: TelemetryBatch) -> Result<Uuid, SubmitError> {
        let token = batch.token;
        match self.telemetry.try_send(batch) {
            Ok(()) => {
                debug!("Telemetry batch queued: token={}", token);
                Ok(token)
            }
            Err(mpsc::error::TrySendError::Full(batch)) => Err(SubmitError::QueueFull(batch)),
            Err(mpsc::error::TrySendError::Closed(batch)) => Err(SubmitError::NotConnected(batch)),
        }
    }
}

impl LinkHub {
    /// Deliver an inbound RPC to the agent; returns the assigned correlation id
    pub fn send_rpc(
        &mut self,
        method: impl Into<String>,
        params: impl Into<String>,
    ) -> Result<u64, ClientError> {
        let id = self.next_rpc_id;
        self.next_rpc_id += 1;
        self.events
            .send(ClientEvent::Rpc(RpcRequest::new(id, method, params)))
            .map_err(|_| ClientError::Disconnected)?;
        Ok(id)
    }

    /// Deliver a configuration blob for a subscribed topic
    pub fn send_config(
        &self,
        topic: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Result<(), ClientError> {
        self.events
            .send(ClientEvent::Config(ConfigBlob::new(topic, payload)))
            .map_err(|_| ClientError::Disconnected)
    }

    /// Deliver a peer-to-peer message on a subscribed topic
    pub fn send_message(
        &self,
        topic: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Result<(), ClientError> {
        self.events
            .send(ClientEvent::Message {
                topic: topic.into(),
                payload: payload.into(),
            })
            .map_err(|_| ClientError::Disconnected)
    }

    /// Wait for the next submitted telemetry batch
    ///
    /// Returns `None` once the agent side is gone and the queue is drained.
    pub async fn next_telemetry(&mut self) -> Option<TelemetryBatch> {
        self.telemetry.recv().await
    }

    /// Dequeue a submitted batch without waiting
    pub fn try_next_telemetry(&mut self) -> Option<TelemetryBatch> {
        self.telemetry.try_recv().ok()
    }

    /// Fire the completion for a dequeued batch, handing ownership back
    ///
    /// Consumes the batch: a completion can only be fired once per batch.
    pub fn complete_telemetry(
        &self,
        batch: TelemetryBatch,
        reason: CompletionReason,
    ) -> Result<(), ClientError> {
        self.events
            .send(ClientEvent::TelemetryDone { reason, batch })
            .map_err(|_| ClientError::Disconnected)
    }

    /// Signal the agent to leave its event loop
    pub fn shutdown(&self) {
        // Ignore the error: a client that already went away has nothing to stop.
        let _ = self.shutdown.send(true);
    }
}
