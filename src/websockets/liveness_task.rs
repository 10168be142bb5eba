use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, instrument};

use super::connection_manager::OutboundFrame;
use super::handler::disconnect_connection;
use crate::shared::AppState;

/// Configuration for the connection liveness monitor
#[derive(Debug, Clone)]
pub struct LivenessConfig {
    /// How often to probe connections
    pub probe_interval: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(30),
        }
    }
}

/// Starts the background task that probes every connection each tick.
///
/// A connection gets two ticks to answer a ping. The first tick marks it
/// unresponsive and sends a probe; a pong clears the mark through the
/// transport. A connection still marked unresponsive on the next tick is
/// terminated and its room membership released.
#[instrument(skip(state))]
pub async fn start_liveness_task(state: AppState, config: LivenessConfig) {
    info!(
        probe_interval_secs = config.probe_interval.as_secs(),
        "Starting connection liveness monitor"
    );

    let mut probe_interval = interval(config.probe_interval);

    loop {
        probe_interval.tick().await;

        let terminated = sweep_connections(&state).await;
        if terminated > 0 {
            info!(terminated, "Terminated unresponsive connections");
        }
    }
}

/// One probe pass over all connections. Returns how many were terminated.
///
/// Kept separate from the interval loop so tests can drive ticks directly.
pub async fn sweep_connections(state: &AppState) -> usize {
    let snapshot = state.connection_manager.liveness_snapshot().await;
    let mut terminated = 0;

    for (connection_id, alive) in snapshot {
        if alive {
            // Arm the mark and probe; the pong handler disarms it
            state.connection_manager.mark_unresponsive(connection_id).await;
            state
                .connection_manager
                .send_frame(connection_id, OutboundFrame::Ping)
                .await;
        } else {
            debug!(connection_id, "Connection missed a probe, terminating");
            state
                .connection_manager
                .send_frame(connection_id, OutboundFrame::Close)
                .await;
            disconnect_connection(state, connection_id).await;
            terminated += 1;
        }
    }

    terminated
}
