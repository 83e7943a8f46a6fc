//! Blob/object-storage provider boundary
//!
//! A parallel upload channel for payloads larger than telemetry is meant to
//! carry. The ownership contract mirrors telemetry: a buffer accepted by
//! [`BlobSink::send_data`] is owned by the provider until the completion hands
//! it back; a synchronous rejection returns the buffer immediately and no
//! completion will reference it.

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Default capacity of the outbound upload queue
pub const DEFAULT_UPLOAD_CAPACITY: usize = 8;

/// Synchronous failure of a blob upload
#[derive(Debug, Error)]
pub enum SendDataError {
    /// The provider is not currently streaming; the buffer comes back
    #[error("provider not streaming")]
    NotStreaming(Bytes),

    /// The provider rejected the upload; the buffer comes back
    #[error("provider rejected the upload")]
    Rejected(Bytes),
}

impl SendDataError {
    /// Take the rejected buffer back for local release
    pub fn into_data(self) -> Bytes {
        match self {
            Self::NotStreaming(data) | Self::Rejected(data) => data,
        }
    }
}

/// Result delivered with an upload completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendDataResult {
    /// The upload reached the provider
    Ok,
    /// The upload failed after the buffer was accepted
    Error,
}

/// One accepted upload awaiting transfer
#[derive(Debug)]
pub struct BlobUpload {
    /// Buffer owned by the provider until completion
    pub data: Bytes,
    /// Time reference supplied by the caller (e.g. a frame timestamp)
    pub timestamp: u64,
}

/// Completion of a previously accepted upload; ownership moves back out
#[derive(Debug)]
pub struct SendDone {
    /// The buffer originally given to `send_data`
    pub data: Bytes,
    /// Outcome of the transfer
    pub result: SendDataResult,
}

/// Upload channel toward a blob/object-storage provider
pub trait BlobSink: Send {
    /// Hand a buffer to the provider for asynchronous upload
    fn send_data(&mut self, data: Bytes, timestamp: u64) -> Result<(), SendDataError>;

    /// Dequeue the next completion, if one has fired
    fn next_done(&mut self) -> Option<SendDone>;
}

/// Agent-side endpoint of an in-process blob link
pub struct LinkBlobSink {
    uploads: mpsc::Sender<BlobUpload>,
    done: mpsc::UnboundedReceiver<SendDone>,
    streaming: bool,
}

/// Provider-side endpoint of an in-process blob link
pub struct BlobDriver {
    uploads: mpsc::Receiver<BlobUpload>,
    done: mpsc::UnboundedSender<SendDone>,
}

/// Create a connected in-process sink/driver pair
pub fn blob_link() -> (LinkBlobSink, BlobDriver) {
    let (upload_tx, upload_rx) = mpsc::channel(DEFAULT_UPLOAD_CAPACITY);
    let (done_tx, done_rx) = mpsc::unbounded_channel();
    let sink = LinkBlobSink {
        uploads: upload_tx,
        done: done_rx,
        streaming: true,
    };
    let driver = BlobDriver {
        uploads: upload_rx,
        done: done_tx,
    };
    (sink, driver)
}

impl LinkBlobSink {
    /// Mark the provider as streaming or not
    ///
    /// While not streaming, every `send_data` is rejected synchronously with
    /// `NotStreaming` and the buffer returned.
    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }
}

impl BlobSink for LinkBlobSink {
    fn send_data(&mut self, data: Bytes, timestamp: u64) -> Result<(), SendDataError> {
        if !self.streaming {
            return Err(SendDataError::NotStreaming(data));
        }
        match self.uploads.try_send(BlobUpload { data, timestamp }) {
            Ok(()) => {
                debug!("Blob upload queued: timestamp={}", timestamp);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(upload))
            | Err(mpsc::error::TrySendError::Closed(upload)) => {
                Err(SendDataError::Rejected(upload.data))
            }
        }
    }

    fn next_done(&mut self) -> Option<SendDone> {
        self.done.try_recv().ok()
    }
}

impl BlobDriver {
    /// Wait for the next accepted upload
    pub async fn next_upload(&mut self) -> Option<BlobUpload> {
        self.uploads.recv().await
    }

    /// Dequeue an accepted upload without waiting
    pub fn try_next_upload(&mut self) -> Option<BlobUpload> {
        self.uploads.try_recv().ok()
    }

    /// Fire the completion for a dequeued upload, handing the buffer back
    pub fn complete(&self, upload: BlobUpload, result: SendDataResult) {
        // The sink may already be gone; the buffer is dropped either way.
        let _ = self.done.send(SendDone {
            data: upload.data,
            result,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_and_complete_round_trip() {
        let (mut sink, mut driver) = blob_link();
        sink.send_data(Bytes::from("tensor-bytes"), 99).unwrap();

        let upload = driver.next_upload().await.unwrap();
        assert_eq!(upload.timestamp, 99);
        driver.complete(upload, SendDataResult::Ok);

        let done = sink.next_done().unwrap();
        assert_eq!(done.result, SendDataResult::Ok);
        assert_eq!(done.data, Bytes::from("tensor-bytes"));
    }

    #[tokio::test]
    async fn test_not_streaming_returns_buffer() {
        let (mut sink, _driver) = blob_link();
        sink.set_streaming(false);
        let err = sink.send_data(Bytes::from("payload"), 1).unwrap_err();
        match err {
            SendDataError::NotStreaming(data) => assert_eq!(data, Bytes::from("payload")),
            other => panic!("expected NotStreaming, got {:?}", other),
        }
        assert!(sink.next_done().is_none());
    }

    #[tokio::test]
    async fn test_driver_gone_rejects_synchronously() {
        let (mut sink, driver) = blob_link();
        drop(driver);
        let err = sink.send_data(Bytes::from("payload"), 1).unwrap_err();
        assert!(matches!(err, SendDataError::Rejected(_)));
    }
}
