//! Sensor-variant loop: stream lifecycle around the frame pipeline

use crate::agent::{Agent, LoopControl};
use anyhow::Result;
use edgelink_client::blob::BlobSink;
use edgelink_client::RuntimeClient;
use edgelink_sensor::{pull_and_forward, PullOutcome, SensorCore, SensorStream};
use std::time::Duration;
use tracing::{debug, error, info};

/// Bounded wait for each frame acquisition, keeping the exit check responsive
pub const FRAME_WAIT: Duration = Duration::from_millis(1000);

impl<C: RuntimeClient> Agent<C> {
    /// Run the sensor-variant loop: open and start the stream, interleave
    /// event dispatch with frame pulls, then tear everything down
    ///
    /// Teardown runs unconditionally in reverse order of setup, whatever ended
    /// the loop; each step's failure is logged independently and never stops
    /// the remaining steps.
    pub async fn run_with_sensor<Core>(
        &mut self,
        core: &mut Core,
        stream_key: &str,
        mut blob: Option<&mut dyn BlobSink>,
        channel_id: u32,
    ) -> Result<()>
    where
        Core: SensorCore,
    {
        info!("Opening sensor stream: key={}", stream_key);
        let mut stream = match core.open_stream(stream_key).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to open stream: {}", e);
                if let Err(e) = core.shutdown() {
                    error!("Failed to shut down sensor core: {}", e);
                }
                return Err(e.into());
            }
        };

        if let Err(e) = stream.start().await {
            error!("Failed to start stream: {}", e);
            if let Err(e) = core.close_stream(stream) {
                error!("Failed to close stream: {}", e);
            }
            if let Err(e) = core.shutdown() {
                error!("Failed to shut down sensor core: {}", e);
            }
            return Err(e.into());
        }

        let mut exit_result = Ok(());
        loop {
            // Zero-wait poll: the frame acquisition below is the blocking
            // point of this variant.
            match self.poll_step(Duration::ZERO).await {
                Ok(LoopControl::Exit) => {
                    info!("Exiting the sensor loop");
                    break;
                }
                Ok(LoopControl::Continue) => {}
                Err(e) => {
                    error!("Poll failed, stopping sensor loop: {}", e);
                    exit_result = Err(e.into());
                    break;
                }
            }

            // Heartbeat and config drain stay live in the sensor variant.
            self.tick();

            match pull_and_forward(
                &mut stream,
                &mut self.client,
                blob.as_mut().map(|s| &mut **s),
                channel_id,
                Some(FRAME_WAIT),
            )
            .await
            {
                Ok(PullOutcome::Forwarded) => debug!("Frame forwarded"),
                Ok(PullOutcome::NoFrame) | Ok(PullOutcome::Skipped) => {}
                Err(e) => {
                    error!("Stream is fatal, stopping sensor loop: {}", e);
                    exit_result = Err(e.into());
                    break;
                }
            }

            // Upload completions hand their buffers back; dropping them here
            // is the release.
            if let Some(sink) = blob.as_mut() {
                while let Some(done) = sink.next_done() {
                    debug!(
                        "Blob upload finished: {:?}, {} bytes released",
                        done.result,
                        done.data.len()
                    );
                }
            }
        }

        if let Err(e) = stream.stop().await {
            error!("Failed to stop stream: {}", e);
        }
        if let Err(e) = core.close_stream(stream) {
            error!("Failed to close stream: {}", e);
        }
        if let Err(e) = core.shutdown() {
            error!("Failed to shut down sensor core: {}", e);
        }

        self.ctx.pending_config.take();
        exit_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgelink_client::link;
    use edgelink_sensor::sim::{frame_with_channel, SimCore, SimStream};
    use edgelink_sensor::{CHANNEL_ID_OUTPUT_TENSOR, DEFAULT_STREAM_KEY, FORWARD_KEY};

    #[tokio::test(start_paused = true)]
    async fn test_frames_forwarded_until_shutdown() {
        let (client, mut hub) = link();
        let mut stream = SimStream::default();
        stream.push_frame(frame_with_channel(1, CHANNEL_ID_OUTPUT_TENSOR, b"t1", 10));
        stream.push_frame(frame_with_channel(2, CHANNEL_ID_OUTPUT_TENSOR, b"t2", 20));
        let mut core = SimCore::with_stream(stream);

        let mut agent = Agent::new(client);
        let task = tokio::spawn(async move {
            let result = agent
                .run_with_sensor(&mut core, DEFAULT_STREAM_KEY, None, CHANNEL_ID_OUTPUT_TENSOR)
                .await;
            (result, core)
        });

        let first = hub.next_telemetry().await.unwrap();
        assert_eq!(first.entries[0].key, FORWARD_KEY);
        assert_eq!(first.timestamp, Some(10));
        let second = hub.next_telemetry().await.unwrap();
        assert_eq!(second.timestamp, Some(20));

        hub.shutdown();
        let (result, core) = task.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(core.closed, 1);
        assert!(core.shut_down);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_acquire_tears_down_stream() {
        let (client, _hub) = link();
        let mut stream = SimStream::default();
        stream.push_error("sensor unplugged");
        let mut core = SimCore::with_stream(stream);

        let mut agent = Agent::new(client);
        let result = agent
            .run_with_sensor(&mut core, DEFAULT_STREAM_KEY, None, CHANNEL_ID_OUTPUT_TENSOR)
            .await;
        assert!(result.is_err());
        // Teardown still ran to completion.
        assert_eq!(core.closed, 1);
        assert!(core.shut_down);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_failure_still_shuts_down_core() {
        let (client, _hub) = link();
        let mut core = SimCore {
            fail_open: true,
            ..SimCore::default()
        };

        let mut agent = Agent::new(client);
        let result = agent
            .run_with_sensor(&mut core, DEFAULT_STREAM_KEY, None, CHANNEL_ID_OUTPUT_TENSOR)
            .await;
        assert!(result.is_err());
        assert!(core.shut_down);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_teardown_steps_do_not_stop_later_ones() {
        let (client, hub) = link();
        let mut stream = SimStream::default();
        stream.push_error("sensor unplugged");
        stream.fail_stop = true;
        let mut core = SimCore::with_stream(stream);
        core.fail_close = true;

        let mut agent = Agent::new(client);
        let result = agent
            .run_with_sensor(&mut core, DEFAULT_STREAM_KEY, None, CHANNEL_ID_OUTPUT_TENSOR)
            .await;
        assert!(result.is_err());
        // stop and close both failed, shutdown still happened.
        assert_eq!(core.closed, 1);
        assert!(core.shut_down);
        drop(hub);
    }
}
