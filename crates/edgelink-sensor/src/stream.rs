//! Sensor streaming boundary: frames, channels and the stream traits

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Well-known channel id carrying the on-sensor inference output tensor
pub const CHANNEL_ID_OUTPUT_TENSOR: u32 = 0x8000_0001;

/// Default stream key opened by the sensor-variant agent
pub const DEFAULT_STREAM_KEY: &str = "inference_stream";

/// Raw data extracted from one channel of a frame
///
/// Only reachable through the owning [`Frame`]; releasing the frame consumes
/// it, so the data cannot be read after release.
#[derive(Debug, Clone)]
pub struct RawData {
    /// Channel payload bytes
    pub data: Bytes,
    /// Capture timestamp in nanoseconds
    pub timestamp: u64,
    /// Type tag describing the payload layout
    pub kind: String,
}

/// One identified sub-stream within a frame
#[derive(Debug, Clone)]
pub struct ChannelData {
    /// Channel identifier
    pub id: u32,
    /// Raw data carried by the channel
    pub raw: RawData,
}

/// One in-flight sensor capture
///
/// Must be handed back to [`SensorStream::release_frame`] exactly once;
/// release takes the frame by value, so double-release and use-after-release
/// do not compile.
#[derive(Debug)]
pub struct Frame {
    sequence: u64,
    channels: Vec<ChannelData>,
}

impl Frame {
    /// Create a frame from its channels
    pub fn new(sequence: u64, channels: Vec<ChannelData>) -> Self {
        Self { sequence, channels }
    }

    /// Capture sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Look up a channel by its identifier
    pub fn channel(&self, id: u32) -> Option<&ChannelData> {
        self.channels.iter().find(|c| c.id == id)
    }
}

/// Failure of a frame acquisition attempt
#[derive(Debug, Error)]
pub enum AcquireError {
    /// No frame was ready within the wait window; retry, nothing to release
    #[error("no frame ready within the wait window")]
    Timeout,

    /// The stream failed; stop pulling frames and tear it down
    #[error("device error: {0}")]
    Device(String),
}

impl AcquireError {
    /// Whether this failure is the non-fatal timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Failure of a stream-management operation
#[derive(Debug, Error)]
pub enum StreamError {
    /// Opening the stream failed
    #[error("open failed: {0}")]
    Open(String),

    /// Starting the stream failed
    #[error("start failed: {0}")]
    Start(String),

    /// A non-timeout acquisition failure ended the stream
    #[error("frame acquisition failed: {0}")]
    Acquire(String),

    /// Releasing a frame failed; the stream can no longer be trusted
    #[error("frame release failed: {0}")]
    Release(String),

    /// Stopping the stream failed
    #[error("stop failed: {0}")]
    Stop(String),

    /// Closing the stream failed
    #[error("close failed: {0}")]
    Close(String),

    /// Shutting down the core stream-management handle failed
    #[error("core shutdown failed: {0}")]
    Shutdown(String),
}

/// One opened sensor stream
#[async_trait]
pub trait SensorStream: Send {
    /// Start frame delivery
    async fn start(&mut self) -> Result<(), StreamError>;

    /// Wait for the next frame; `None` waits indefinitely
    async fn get_frame(&mut self, wait: Option<Duration>) -> Result<Frame, AcquireError>;

    /// Hand a frame back to the stream
    fn release_frame(&mut self, frame: Frame) -> Result<(), StreamError>;

    /// Stop frame delivery
    async fn stop(&mut self) -> Result<(), StreamError>;
}

/// The core stream-management handle
#[async_trait]
pub trait SensorCore: Send {
    /// Stream type opened by this core
    type Stream: SensorStream;

    /// Open the stream designated by `key`
    async fn open_stream(&mut self, key: &str) -> Result<Self::Stream, StreamError>;

    /// Close a previously opened stream
    fn close_stream(&mut self, stream: Self::Stream) -> Result<(), StreamError>;

    /// Release the core handle itself
    fn shutdown(&mut self) -> Result<(), StreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(id: u32) -> ChannelData {
        ChannelData {
            id,
            raw: RawData {
                data: Bytes::from_static(b"\x01\x02"),
                timestamp: 7,
                kind: "raw".to_string(),
            },
        }
    }

    #[test]
    fn test_channel_lookup() {
        let frame = Frame::new(1, vec![channel(3), channel(CHANNEL_ID_OUTPUT_TENSOR)]);
        assert!(frame.channel(CHANNEL_ID_OUTPUT_TENSOR).is_some());
        assert!(frame.channel(99).is_none());
        assert_eq!(frame.sequence(), 1);
    }

    #[test]
    fn test_timeout_classification() {
        assert!(AcquireError::Timeout.is_timeout());
        assert!(!AcquireError::Device("gone".to_string()).is_timeout());
    }
}
