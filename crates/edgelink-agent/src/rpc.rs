//! RPC dispatch: decode inbound calls and update agent state

use crate::context::{AgentContext, Rgb};
use edgelink_client::RpcRequest;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct RgbParams {
    rgb: String,
}

/// Dispatch one inbound RPC against the agent context
///
/// Runs inside the event loop between polls; it never blocks and never calls
/// back into the client. A malformed payload is logged and leaves prior state
/// untouched.
pub fn dispatch(ctx: &mut AgentContext, request: &RpcRequest) {
    info!("RPC: id={} method={}", request.id, request.method);
    match parse_rgb(&request.params) {
        Ok(rgb) => {
            ctx.rgb = rgb;
            info!("r={} g={} b={}", rgb.r, rgb.g, rgb.b);
        }
        Err(reason) => {
            warn!("Ignoring malformed RPC params: {}", reason);
        }
    }
}

/// Parse `{"rgb": "<6 hex digits>"}` into a color triple
fn parse_rgb(params: &str) -> Result<Rgb, String> {
    let parsed: RgbParams =
        serde_json::from_str(params).map_err(|e| format!("invalid JSON: {}", e))?;
    let bytes = hex::decode(&parsed.rgb).map_err(|e| format!("invalid hex: {}", e))?;
    match bytes.as_slice() {
        &[r, g, b] => Ok(Rgb { r, g, b }),
        other => Err(format!("expected 3 color bytes, got {}", other.len())),
    }
}
