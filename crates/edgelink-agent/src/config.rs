//! Configuration delivery: latest-wins buffering and echo drain

use crate::context::AgentContext;
use edgelink_client::{ConfigBlob, TelemetryBatch};
use tracing::{debug, info};

/// Buffer a newly delivered configuration blob
///
/// Latest value wins: a blob arriving before the previous one was drained
/// supersedes it, and the superseded payload is dropped here, at arrival time.
pub fn store(ctx: &mut AgentContext, blob: ConfigBlob) {
    info!(
        "Configuration received: topic={} len={}",
        blob.topic,
        blob.payload.len()
    );
    if let Some(prev) = ctx.pending_config.replace(blob) {
        debug!("Superseded pending configuration for topic {}", prev.topic);
    }
}

/// Take at most one pending blob and build its echo batch
///
/// Clears the pending slot so the same blob is never echoed twice.
pub fn drain(ctx: &mut AgentContext) -> Option<TelemetryBatch> {
    let blob = ctx.pending_config.take()?;
    debug!("Echoing configuration for topic {}", blob.topic);
    Some(TelemetryBatch::single(blob.topic, blob.payload))
}
