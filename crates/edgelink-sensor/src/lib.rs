//! # Edgelink Sensor
//!
//! Sensor-streaming boundary and the frame acquisition pipeline: frame and
//! channel types, the timeout-vs-fatal acquisition error taxonomy, the
//! acquire-extract-forward-release cycle, and a scripted simulator backend.

#![warn(missing_docs)]

/// Sensor streaming boundary: frames, channels and the stream traits
pub mod stream;

/// Frame acquisition-and-forward pipeline
pub mod pipeline;

/// Scripted sensor simulator
pub mod sim;

pub use pipeline::{pull_and_forward, PullOutcome, FORWARD_KEY, FORWARD_PAYLOAD};
pub use stream::{
    AcquireError, ChannelData, Frame, RawData, SensorCore, SensorStream, StreamError,
    CHANNEL_ID_OUTPUT_TENSOR, DEFAULT_STREAM_KEY,
};
