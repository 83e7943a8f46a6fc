//! Frame acquisition-and-forward pipeline
//!
//! One call runs a single `Acquiring -> Acquired -> Extracting -> Releasing`
//! cycle. A timeout loops the caller back to acquisition; any other
//! acquisition failure, and any release failure, is fatal for the stream.
//! Release is the single unconditional exit point of the acquired region:
//! every extraction branch flows through it.

use crate::stream::{AcquireError, Frame, SensorStream, StreamError};
use bytes::Bytes;
use edgelink_client::blob::{BlobSink, SendDataError};
use edgelink_client::{RuntimeClient, SubmitError, TelemetryBatch};
use std::time::Duration;
use tracing::{debug, warn};

/// Telemetry key the derived frame payload is published under
pub const FORWARD_KEY: &str = "inference-result";

/// Fixed derived payload forwarded for every successfully extracted frame
pub const FORWARD_PAYLOAD: &str = "{\"my_topic\": 1234}";

/// Outcome of one pull cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// A frame was extracted and handed to the forwarding path
    Forwarded,
    /// The wait window elapsed without a frame; retry
    NoFrame,
    /// A frame was acquired and released, but nothing was forwarded
    Skipped,
}

/// Run one acquire-extract-forward-release cycle
///
/// The derived JSON payload goes out as a one-entry telemetry batch stamped
/// with the frame timestamp; when a blob sink is wired, the raw tensor bytes
/// go out through it as well. A synchronous rejection on either path releases
/// the payload locally and the cycle still counts the frame as handled.
pub async fn pull_and_forward<S, C>(
    stream: &mut S,
    client: &mut C,
    blob: Option<&mut (dyn BlobSink + '_)>,
    channel_id: u32,
    wait: Option<Duration>,
) -> Result<PullOutcome, StreamError>
where
    S: SensorStream,
    C: RuntimeClient,
{
    let frame = match stream.get_frame(wait).await {
        Ok(frame) => frame,
        Err(AcquireError::Timeout) => {
            debug!("No frame within the wait window");
            return Ok(PullOutcome::NoFrame);
        }
        Err(AcquireError::Device(reason)) => {
            return Err(StreamError::Acquire(reason));
        }
    };

    let outcome = match extract(&frame, channel_id) {
        Some((raw, timestamp)) => {
            forward(client, blob, raw, timestamp);
            PullOutcome::Forwarded
        }
        None => PullOutcome::Skipped,
    };

    // Unconditional: the frame goes back whether extraction produced anything
    // or not. Release consumes it, so nothing derived can outlive this point
    // without having been copied out above.
    stream.release_frame(frame)?;
    Ok(outcome)
}

/// Look up the designated channel and pull its raw data out of the frame
fn extract(frame: &Frame, channel_id: u32) -> Option<(Bytes, u64)> {
    let Some(channel) = frame.channel(channel_id) else {
        warn!(
            "Frame {} has no channel {:#x}; skipping",
            frame.sequence(),
            channel_id
        );
        return None;
    };

    let raw = &channel.raw;
    if raw.data.is_empty() {
        warn!("Frame {} channel {:#x} carries no data", frame.sequence(), channel_id);
        return None;
    }

    debug!(
        "Raw data: size={} timestamp={} kind={}",
        raw.data.len(),
        raw.timestamp,
        raw.kind
    );
    Some((raw.data.clone(), raw.timestamp))
}

/// Submit the derived payload as telemetry and the raw bytes to the blob sink
fn forward<C: RuntimeClient>(
    client: &mut C,
    blob: Option<&mut (dyn BlobSink + '_)>,
    raw: Bytes,
    timestamp: u64,
) {
    let batch = TelemetryBatch::single(FORWARD_KEY, FORWARD_PAYLOAD).with_timestamp(timestamp);
    match client.submit_telemetry(batch) {
        Ok(token) => debug!("Frame telemetry submitted: token={}", token),
        Err(SubmitError::NotConnected(batch)) => {
            debug!("Not connected; dropping frame telemetry {}", batch.token);
        }
        Err(SubmitError::QueueFull(batch)) => {
            warn!("Telemetry queue full; dropping frame telemetry {}", batch.token);
        }
    }

    if let Some(sink) = blob {
        match sink.send_data(raw, timestamp) {
            Ok(()) => debug!("Raw tensor upload queued: timestamp={}", timestamp),
            Err(SendDataError::NotStreaming(data)) => {
                debug!("Provider not streaming; dropping {} raw bytes", data.len());
            }
            Err(SendDataError::Rejected(data)) => {
                warn!("Provider rejected upload; dropping {} raw bytes", data.len());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{frame_with_channel, SimStream};
    use crate::stream::CHANNEL_ID_OUTPUT_TENSOR;
    use edgelink_client::blob::blob_link;
    use edgelink_client::{link, link_with_capacity};

    const WAIT: Option<Duration> = Some(Duration::from_millis(10));

    #[tokio::test]
    async fn test_forwarded_frame_reaches_telemetry() {
        let (mut client, mut hub) = link();
        let mut stream = SimStream::default();
        stream.push_frame(frame_with_channel(1, CHANNEL_ID_OUTPUT_TENSOR, b"tensor", 42));

        let outcome =
            pull_and_forward(&mut stream, &mut client, None, CHANNEL_ID_OUTPUT_TENSOR, WAIT)
                .await
                .unwrap();
        assert_eq!(outcome, PullOutcome::Forwarded);
        assert_eq!(stream.released, 1);
        assert_eq!(stream.live, 0);

        let batch = hub.next_telemetry().await.unwrap();
        assert_eq!(batch.timestamp, Some(42));
        assert_eq!(batch.entries[0].key, FORWARD_KEY);
        assert_eq!(batch.entries[0].value, Bytes::from(FORWARD_PAYLOAD));
    }

    #[tokio::test]
    async fn test_timeout_releases_nothing_and_is_not_fatal() {
        let (mut client, _hub) = link();
        let mut stream = SimStream::default();
        stream.push_timeout();

        let outcome =
            pull_and_forward(&mut stream, &mut client, None, CHANNEL_ID_OUTPUT_TENSOR, WAIT)
                .await
                .unwrap();
        assert_eq!(outcome, PullOutcome::NoFrame);
        assert_eq!(stream.released, 0);
    }

    #[tokio::test]
    async fn test_channel_miss_still_releases() {
        let (mut client, mut hub) = link();
        let mut stream = SimStream::default();
        stream.push_frame(frame_with_channel(1, 5, b"tensor", 42));

        let outcome =
            pull_and_forward(&mut stream, &mut client, None, CHANNEL_ID_OUTPUT_TENSOR, WAIT)
                .await
                .unwrap();
        assert_eq!(outcome, PullOutcome::Skipped);
        assert_eq!(stream.released, 1);
        assert!(hub.try_next_telemetry().is_none());
    }

    #[tokio::test]
    async fn test_empty_raw_data_still_releases() {
        let (mut client, mut hub) = link();
        let mut stream = SimStream::default();
        stream.push_frame(frame_with_channel(1, CHANNEL_ID_OUTPUT_TENSOR, b"", 42));

        let outcome =
            pull_and_forward(&mut stream, &mut client, None, CHANNEL_ID_OUTPUT_TENSOR, WAIT)
                .await
                .unwrap();
        assert_eq!(outcome, PullOutcome::Skipped);
        assert_eq!(stream.released, 1);
        assert!(hub.try_next_telemetry().is_none());
    }

    #[tokio::test]
    async fn test_device_error_is_fatal() {
        let (mut client, _hub) = link();
        let mut stream = SimStream::default();
        stream.push_error("sensor unplugged");

        let err =
            pull_and_forward(&mut stream, &mut client, None, CHANNEL_ID_OUTPUT_TENSOR, WAIT)
                .await
                .unwrap_err();
        assert!(matches!(err, StreamError::Acquire(_)));
        assert_eq!(stream.released, 0);
    }

    #[tokio::test]
    async fn test_release_failure_is_fatal() {
        let (mut client, _hub) = link();
        let mut stream = SimStream::default();
        stream.push_frame(frame_with_channel(1, CHANNEL_ID_OUTPUT_TENSOR, b"tensor", 42));
        stream.fail_release = true;

        let err =
            pull_and_forward(&mut stream, &mut client, None, CHANNEL_ID_OUTPUT_TENSOR, WAIT)
                .await
                .unwrap_err();
        assert!(matches!(err, StreamError::Release(_)));
    }

    #[tokio::test]
    async fn test_not_connected_drops_locally() {
        let (mut client, hub) = link();
        drop(hub);
        let mut stream = SimStream::default();
        stream.push_frame(frame_with_channel(1, CHANNEL_ID_OUTPUT_TENSOR, b"tensor", 42));

        // Submission fails synchronously; the frame is still released and the
        // cycle is not fatal.
        let outcome =
            pull_and_forward(&mut stream, &mut client, None, CHANNEL_ID_OUTPUT_TENSOR, WAIT)
                .await
                .unwrap();
        assert_eq!(outcome, PullOutcome::Forwarded);
        assert_eq!(stream.released, 1);
    }

    #[tokio::test]
    async fn test_queue_full_drops_locally() {
        let (mut client, _hub) = link_with_capacity(1);
        client
            .submit_telemetry(TelemetryBatch::single("k", "v"))
            .unwrap();
        let mut stream = SimStream::default();
        stream.push_frame(frame_with_channel(1, CHANNEL_ID_OUTPUT_TENSOR, b"tensor", 42));

        let outcome =
            pull_and_forward(&mut stream, &mut client, None, CHANNEL_ID_OUTPUT_TENSOR, WAIT)
                .await
                .unwrap();
        assert_eq!(outcome, PullOutcome::Forwarded);
        assert_eq!(stream.released, 1);
    }

    #[tokio::test]
    async fn test_raw_bytes_reach_blob_sink() {
        let (mut client, _hub) = link();
        let (mut sink, mut driver) = blob_link();
        let mut stream = SimStream::default();
        stream.push_frame(frame_with_channel(1, CHANNEL_ID_OUTPUT_TENSOR, b"tensor", 42));

        pull_and_forward(
            &mut stream,
            &mut client,
            Some(&mut sink),
            CHANNEL_ID_OUTPUT_TENSOR,
            WAIT,
        )
        .await
        .unwrap();

        let upload = driver.next_upload().await.unwrap();
        assert_eq!(upload.data, Bytes::from_static(b"tensor"));
        assert_eq!(upload.timestamp, 42);
    }
}
