//! Event dispatch loop

use crate::config;
use crate::context::AgentContext;
use crate::rpc;
use crate::telemetry;
use edgelink_client::{ClientError, ClientEvent, Poll, RuntimeClient, TelemetryBatch};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info};

/// Bounded wait handed to each poll step
pub const POLL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Interval between periodic heartbeat batches
pub const HEARTBEAT_PERIOD: Duration = Duration::from_millis(2000);

/// Loop-control signal produced by one poll step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    /// Resume the loop body
    Continue,
    /// Terminate the loop cleanly, no further work
    Exit,
}

/// The top-level event-processing driver for one runtime client handle
///
/// Owns the client and the agent context outright; everything runs on the
/// owning task, so no event arm ever blocks or re-enters the client.
pub struct Agent<C: RuntimeClient> {
    pub(crate) client: C,
    pub(crate) ctx: AgentContext,
    next_heartbeat: Instant,
}

impl<C: RuntimeClient> Agent<C> {
    /// Create an agent driving the given client
    pub fn new(client: C) -> Self {
        Self {
            client,
            ctx: AgentContext::new(),
            next_heartbeat: Instant::now() + HEARTBEAT_PERIOD,
        }
    }

    /// Current agent state, for inspection
    pub fn context(&self) -> &AgentContext {
        &self.ctx
    }

    /// Run the event dispatch loop until exit or a poll error
    ///
    /// A clean `ShouldExit` returns `Ok`; a poll error is terminal because the
    /// loop cannot assume event delivery still functions.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        info!("Starting agent loop");

        loop {
            match self.poll_step(POLL_TIMEOUT).await {
                Ok(LoopControl::Exit) => {
                    info!("Exiting the main loop");
                    break;
                }
                Ok(LoopControl::Continue) => self.tick(),
                Err(e) => {
                    error!("Poll failed, stopping agent loop: {}", e);
                    self.ctx.pending_config.take();
                    return Err(e);
                }
            }
        }

        // Exit is terminal: nothing owned locally survives the loop.
        self.ctx.pending_config.take();
        info!("Agent loop stopped");
        Ok(())
    }

    /// One poll step: wait up to `timeout` for an event, then drain whatever
    /// else is already queued before yielding control
    ///
    /// Mirrors a poll that may invoke several callbacks before returning its
    /// loop-control signal: periodic work never runs between two events that
    /// were delivered together.
    pub(crate) async fn poll_step(&mut self, timeout: Duration) -> Result<LoopControl, ClientError> {
        let mut wait = timeout;
        loop {
            match self.client.poll(wait).await? {
                Poll::ShouldExit => return Ok(LoopControl::Exit),
                Poll::Idle => return Ok(LoopControl::Continue),
                Poll::Event(event) => {
                    self.dispatch(event);
                    wait = Duration::ZERO;
                }
            }
        }
    }

    /// Route one delivered event to its subsystem
    pub(crate) fn dispatch(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Rpc(request) => rpc::dispatch(&mut self.ctx, &request),
            ClientEvent::Config(blob) => config::store(&mut self.ctx, blob),
            ClientEvent::Message { topic, payload } => {
                info!("Message received: topic={} ({} bytes)", topic, payload.len());
                telemetry::submit_or_drop(&mut self.client, TelemetryBatch::single(topic, payload));
            }
            ClientEvent::TelemetryDone { reason, batch } => telemetry::complete(reason, batch),
        }
    }

    /// Periodic and queued work performed between polls
    pub(crate) fn tick(&mut self) {
        let now = Instant::now();
        if now >= self.next_heartbeat {
            // Advance by whole periods: a late poll fires one heartbeat, not
            // a burst of catch-ups.
            while self.next_heartbeat <= now {
                self.next_heartbeat += HEARTBEAT_PERIOD;
            }
            info!("Sending heartbeat telemetry");
            telemetry::submit_or_drop(&mut self.client, telemetry::heartbeat(&self.ctx.rgb));
        }

        if let Some(echo) = config::drain(&mut self.ctx) {
            telemetry::submit_or_drop(&mut self.client, echo);
        }
    }
}
