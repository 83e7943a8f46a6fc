//! Telemetry publication: heartbeat batches, submission and completion

use crate::context::Rgb;
use edgelink_client::{CompletionReason, RuntimeClient, SubmitError, TelemetryBatch};
use serde_json::json;
use tracing::{debug, warn};

/// Topic key the periodic heartbeat is published under
pub const HEARTBEAT_KEY: &str = "my-topic";

/// Build the periodic heartbeat batch from the current color channels
pub fn heartbeat(rgb: &Rgb) -> TelemetryBatch {
    let payload = json!({
        "r": rgb.r.to_string(),
        "g": rgb.g.to_string(),
        "b": rgb.b.to_string(),
    });
    TelemetryBatch::single(HEARTBEAT_KEY, payload.to_string())
}

/// Submit a batch, releasing it locally if the client rejects it synchronously
///
/// On `Ok` ownership has transferred and the buffers stay alive until the
/// completion; on a synchronous rejection no completion will ever fire, so the
/// batch is dropped here, exactly once.
pub fn submit_or_drop<C: RuntimeClient>(client: &mut C, batch: TelemetryBatch) {
    match client.submit_telemetry(batch) {
        Ok(token) => debug!("Telemetry submitted: token={}", token),
        Err(SubmitError::NotConnected(batch)) => {
            debug!("Not connected; dropping telemetry batch {}", batch.token);
        }
        Err(SubmitError::QueueFull(batch)) => {
            warn!("Telemetry queue full; dropping batch {}", batch.token);
        }
    }
}

/// Handle a completion notification for a previously submitted batch
///
/// Whatever the reason code, the batch moved back here and dropping it
/// releases every entry exactly once; anomalies are logged after release is
/// assured, never instead of it.
pub fn complete(reason: CompletionReason, batch: TelemetryBatch) {
    if !batch.is_well_formed() {
        warn!("Completed batch {} has malformed entries", batch.token);
    }
    match reason {
        CompletionReason::Sent => debug!("Telemetry batch {} sent", batch.token),
        CompletionReason::Exit => debug!("Telemetry batch {} dropped at client exit", batch.token),
        CompletionReason::Error => {
            warn!("Telemetry batch {} failed in transport", batch.token);
        }
    }
}
