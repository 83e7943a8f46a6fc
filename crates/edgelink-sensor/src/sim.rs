//! Scripted sensor simulator
//!
//! A deterministic stand-in for a real streaming backend, used by the
//! pipeline's tests, the agent's sensor tests and the binary's demo mode.
//! Acquisition outcomes are scripted ahead of time; an exhausted script
//! reports timeouts, modeling a quiet sensor.

use crate::stream::{AcquireError, ChannelData, Frame, RawData, SensorCore, SensorStream, StreamError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::Duration;

/// Build a one-channel frame for scripting
pub fn frame_with_channel(sequence: u64, channel_id: u32, data: &[u8], timestamp: u64) -> Frame {
    Frame::new(
        sequence,
        vec![ChannelData {
            id: channel_id,
            raw: RawData {
                data: Bytes::copy_from_slice(data),
                timestamp,
                kind: "inference_output".to_string(),
            },
        }],
    )
}

/// Scripted stream backend with release/stop accounting
#[derive(Default)]
pub struct SimStream {
    script: VecDeque<Result<Frame, AcquireError>>,
    /// Frames handed out and not yet released
    pub live: u64,
    /// Frames released so far
    pub released: u64,
    /// Whether the stream is currently started
    pub started: bool,
    /// Make the next release fail
    pub fail_release: bool,
    /// Make stop fail
    pub fail_stop: bool,
}

impl SimStream {
    /// Script a successful acquisition
    pub fn push_frame(&mut self, frame: Frame) {
        self.script.push_back(Ok(frame));
    }

    /// Script an acquisition timeout
    pub fn push_timeout(&mut self) {
        self.script.push_back(Err(AcquireError::Timeout));
    }

    /// Script a fatal acquisition error
    pub fn push_error(&mut self, reason: &str) {
        self.script
            .push_back(Err(AcquireError::Device(reason.to_string())));
    }
}

#[async_trait]
impl SensorStream for SimStream {
    async fn start(&mut self) -> Result<(), StreamError> {
        self.started = true;
        Ok(())
    }

    async fn get_frame(&mut self, wait: Option<Duration>) -> Result<Frame, AcquireError> {
        match self.script.pop_front() {
            Some(Ok(frame)) => {
                self.live += 1;
                Ok(frame)
            }
            Some(Err(e)) => Err(e),
            None => match wait {
                // Quiet sensor: run the wait out, then time out.
                Some(wait) => {
                    tokio::time::sleep(wait).await;
                    Err(AcquireError::Timeout)
                }
                // An unbounded wait on a quiet sensor never resolves.
                None => std::future::pending().await,
            },
        }
    }

    fn release_frame(&mut self, frame: Frame) -> Result<(), StreamError> {
        drop(frame);
        self.live = self.live.saturating_sub(1);
        self.released += 1;
        if self.fail_release {
            return Err(StreamError::Release("simulated release failure".to_string()));
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), StreamError> {
        self.started = false;
        if self.fail_stop {
            return Err(StreamError::Stop("simulated stop failure".to_string()));
        }
        Ok(())
    }
}

/// Scripted core handle dispensing at most one prepared stream
#[derive(Default)]
pub struct SimCore {
    /// Stream handed out by the next `open_stream`
    pub next_stream: Option<SimStream>,
    /// Streams closed so far
    pub closed: u32,
    /// Whether the core has been shut down
    pub shut_down: bool,
    /// Make open fail
    pub fail_open: bool,
    /// Make close fail
    pub fail_close: bool,
    /// Make shutdown fail
    pub fail_shutdown: bool,
}

impl SimCore {
    /// Prepare the stream the next `open_stream` hands out
    pub fn with_stream(stream: SimStream) -> Self {
        Self {
            next_stream: Some(stream),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SensorCore for SimCore {
    type Stream = SimStream;

    async fn open_stream(&mut self, key: &str) -> Result<SimStream, StreamError> {
        if self.fail_open {
            return Err(StreamError::Open(format!("simulated open failure: {}", key)));
        }
        Ok(self.next_stream.take().unwrap_or_default())
    }

    fn close_stream(&mut self, stream: SimStream) -> Result<(), StreamError> {
        drop(stream);
        self.closed += 1;
        if self.fail_close {
            return Err(StreamError::Close("simulated close failure".to_string()));
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), StreamError> {
        self.shut_down = true;
        if self.fail_shutdown {
            return Err(StreamError::Shutdown("simulated shutdown failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_order_and_accounting() {
        let mut stream = SimStream::default();
        stream.push_frame(frame_with_channel(1, 7, b"a", 1));
        stream.push_timeout();

        let frame = stream.get_frame(None).await.unwrap();
        assert_eq!(frame.sequence(), 1);
        assert_eq!(stream.live, 1);
        stream.release_frame(frame).unwrap();
        assert_eq!(stream.released, 1);

        let err = stream.get_frame(None).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_exhausted_script_times_out() {
        let mut stream = SimStream::default();
        let err = stream
            .get_frame(Some(Duration::from_millis(1)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_script_unbounded_wait_pends() {
        let mut stream = SimStream::default();
        let outcome =
            tokio::time::timeout(Duration::from_secs(3600), stream.get_frame(None)).await;
        assert!(outcome.is_err(), "unbounded wait resolved: {outcome:?}");
    }

    #[tokio::test]
    async fn test_core_lifecycle() {
        let mut core = SimCore::with_stream(SimStream::default());
        let mut stream = core.open_stream("key").await.unwrap();
        stream.start().await.unwrap();
        stream.stop().await.unwrap();
        core.close_stream(stream).unwrap();
        core.shutdown().unwrap();
        assert_eq!(core.closed, 1);
        assert!(core.shut_down);
    }
}
