//! Edgelink Agent Binary
//!
//! Runs the agent against an in-process loopback hub: telemetry is completed
//! locally and ctrl-c maps to the exit signal. Set `EDGELINK_SENSOR=1` for the
//! sensor variant over the scripted simulator backend.

use anyhow::Result;
use edgelink_agent::Agent;
use edgelink_client::{link, CompletionReason, LinkHub, RuntimeClient};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting Edgelink agent");

    let (client, hub) = link();
    let driver = tokio::spawn(drive_hub(hub));

    let mut agent = Agent::new(client);
    let result = if std::env::var("EDGELINK_SENSOR").is_ok() {
        run_sensor_variant(&mut agent).await
    } else {
        agent.run().await.map_err(Into::into)
    };

    if let Err(e) = result {
        error!("Agent error: {}", e);
        std::process::exit(1);
    }

    driver.abort();
    info!("Agent shut down cleanly");
    Ok(())
}

/// Loopback management plane: completes telemetry and maps ctrl-c to exit
async fn drive_hub(mut hub: LinkHub) {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, requesting agent exit");
                hub.shutdown();
            }
            batch = hub.next_telemetry() => match batch {
                Some(batch) => {
                    info!(
                        "Hub delivering batch {} ({} entries)",
                        batch.token,
                        batch.entries.len()
                    );
                    let _ = hub.complete_telemetry(batch, CompletionReason::Sent);
                }
                // Agent side gone and queue drained: nothing left to drive.
                None => break,
            }
        }
    }
}

#[cfg(feature = "sensor")]
async fn run_sensor_variant<C: RuntimeClient>(agent: &mut Agent<C>) -> Result<()> {
    use edgelink_client::blob::{blob_link, SendDataResult};
    use edgelink_sensor::sim::{frame_with_channel, SimCore, SimStream};
    use edgelink_sensor::{CHANNEL_ID_OUTPUT_TENSOR, DEFAULT_STREAM_KEY};

    // Demo backend: a handful of scripted frames, then a quiet sensor.
    let mut stream = SimStream::default();
    for seq in 0..3u64 {
        stream.push_frame(frame_with_channel(
            seq,
            CHANNEL_ID_OUTPUT_TENSOR,
            &[0u8; 16],
            seq * 1_000_000,
        ));
    }
    let mut core = SimCore::with_stream(stream);

    let (mut sink, mut blob_driver) = blob_link();
    let blob_task = tokio::spawn(async move {
        while let Some(upload) = blob_driver.next_upload().await {
            info!("Provider stored {} bytes", upload.data.len());
            blob_driver.complete(upload, SendDataResult::Ok);
        }
    });

    let result = agent
        .run_with_sensor(
            &mut core,
            DEFAULT_STREAM_KEY,
            Some(&mut sink),
            CHANNEL_ID_OUTPUT_TENSOR,
        )
        .await;
    blob_task.abort();
    result
}

#[cfg(not(feature = "sensor"))]
async fn run_sensor_variant<C: RuntimeClient>(_agent: &mut Agent<C>) -> Result<()> {
    Err(anyhow::anyhow!("built without sensor support"))
}
