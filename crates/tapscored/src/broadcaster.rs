//! Best-player broadcaster.
//!
//! Once per period, finds the highest score among recently active sessions
//! and sends it to every connected session. A best of exactly 0 (which
//! includes "nobody active") is not broadcast.
//!
//! The scan and the sends run inside the registry actor as one command, so
//! every recipient sees the same snapshot. The periodic task only paces the
//! requests: it waits for each one to complete, then sleeps the full period,
//! so a slow tick delays the next one instead of piling up.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tapscore_core::Score;
use tapscore_protocol::ServerMessage;

use crate::registry::{RegistryError, RegistryHandle, SessionRegistry};
use crate::router::fan_out;

/// Delay between the end of one best broadcast and the start of the next.
pub const BEST_INTERVAL: Duration = Duration::from_millis(1000);

/// How recently a session must have sent something to count as active.
pub const ACTIVE_WINDOW_MS: i64 = 5000;

/// Timing parameters for the broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Sleep after each completed broadcast
    pub period: Duration,

    /// Recency window for the active set
    pub active_window: chrono::Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            period: BEST_INTERVAL,
            active_window: chrono::Duration::milliseconds(ACTIVE_WINDOW_MS),
        }
    }
}

/// Outcome of a best broadcast that was actually sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestBroadcast {
    /// The score that was broadcast
    pub best: Score,

    /// Sessions the frame was queued on
    pub recipients: usize,
}

/// Highest score among sessions active within `window` of `now`, or 0.
pub fn best_active_score(
    registry: &SessionRegistry,
    window: chrono::Duration,
    now: DateTime<Utc>,
) -> Score {
    registry
        .all_active(window, now)
        .map(|session| session.score())
        .max()
        .unwrap_or(0)
}

/// Computes the best active score and sends it to every session.
///
/// Returns `None` when the broadcast was suppressed because the best is 0.
pub fn broadcast_best(
    registry: &SessionRegistry,
    window: chrono::Duration,
    now: DateTime<Utc>,
) -> Option<BestBroadcast> {
    let best = best_active_score(registry, window, now);
    if best == 0 {
        return None;
    }

    let recipients = fan_out(registry.all_except(None), &ServerMessage::best(best));
    Some(BestBroadcast { best, recipients })
}

/// Spawns the periodic best broadcaster.
///
/// The first scan runs immediately. The task ends when `cancel_token` fires
/// or the registry actor goes away.
pub fn spawn_best_broadcaster(
    registry: RegistryHandle,
    config: BroadcastConfig,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            period_ms = config.period.as_millis() as u64,
            window_ms = config.active_window.num_milliseconds(),
            "Best broadcaster started"
        );

        loop {
            match registry.broadcast_best(config.active_window).await {
                Ok(Some(outcome)) => {
                    debug!(
                        best = outcome.best,
                        recipients = outcome.recipients,
                        "Broadcast best score"
                    );
                }
                Ok(None) => {}
                Err(RegistryError::ChannelClosed) => {
                    warn!("Registry gone, stopping best broadcaster");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Best broadcast failed");
                }
            }

            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    info!("Best broadcaster shutting down");
                    break;
                }

                _ = tokio::time::sleep(config.period) => {}
            }
        }

        debug!("Best broadcaster task completed");
    })
}
