//! Position source abstraction.
//!
//! [`PositionSource`] decouples the session logic from any concrete
//! geolocation backend: a platform binding, a GNSS receiver, or the
//! [`SimulatedPositionSource`] used by the demo binary and tests. Continuous
//! watching is modelled as a channel-backed [`PositionWatch`]; dropping the
//! watch cancels the subscription, after which no further update can be
//! consumed.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use geo_types::Point;
use journey_tracker_lib::Position;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors reported by a position source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    /// The location capability was denied or revoked.
    #[error("location permission denied")]
    PermissionDenied,

    /// No position can be determined (no fix, no provider).
    #[error("position unavailable: {0}")]
    Unavailable(String),

    /// The source did not produce a fix in time.
    #[error("timed out waiting for a position fix")]
    Timeout,
}

/// One delivery on an open watch: a sample or a typed source error.
pub type WatchUpdate = Result<Position, PositionError>;

/// Abstraction over "get the position once" and "watch the position".
pub trait PositionSource: Send + Sync {
    /// One-shot position fix. Single attempt, no retry.
    fn current_position(&self) -> impl Future<Output = Result<Position, PositionError>> + Send;

    /// Open a continuous subscription.
    ///
    /// Updates arrive in capture order. Delivery ends when the returned
    /// watch is dropped.
    fn watch(&self) -> PositionWatch;
}

/// Handle for an open continuous subscription.
///
/// Dropping the watch is the cancellation: the feeding side observes the
/// closed channel and stops, and nothing can be received afterwards.
pub struct PositionWatch {
    rx: mpsc::Receiver<WatchUpdate>,
}

impl PositionWatch {
    pub fn new(rx: mpsc::Receiver<WatchUpdate>) -> Self {
        Self { rx }
    }

    /// Next update, or `None` once the source side has gone away.
    pub async fn next(&mut self) -> Option<WatchUpdate> {
        self.rx.recv().await
    }

    /// Cancel the subscription explicitly.
    pub fn cancel(self) {
        drop(self);
    }
}

/// Replays a fixed route on a timer.
///
/// `current_position` reports the sample the replay has reached; `watch`
/// spawns a feeder task that advances along the route at the configured
/// interval.
pub struct SimulatedPositionSource {
    route: Vec<Point>,
    interval: Duration,
    cursor: Arc<AtomicUsize>,
}

impl SimulatedPositionSource {
    pub fn new(route: Vec<Point>, interval: Duration) -> Self {
        Self {
            route,
            interval,
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl PositionSource for SimulatedPositionSource {
    async fn current_position(&self) -> Result<Position, PositionError> {
        let index = self
            .cursor
            .load(Ordering::SeqCst)
            .min(self.route.len().saturating_sub(1));
        match self.route.get(index) {
            Some(point) => Ok(Position::new(*point, Utc::now())),
            None => Err(PositionError::Unavailable("empty simulated route".into())),
        }
    }

    fn watch(&self) -> PositionWatch {
        let (tx, rx) = mpsc::channel(16);
        let route = self.route.clone();
        let cursor = Arc::clone(&self.cursor);
        let interval = self.interval;

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let index = cursor.load(Ordering::SeqCst) + 1;
                if index >= route.len() {
                    // Route exhausted; go quiet but keep the subscription
                    // open until the watch is dropped.
                    tracing::debug!("simulated route exhausted");
                    tx.closed().await;
                    break;
                }
                cursor.store(index, Ordering::SeqCst);
                if tx
                    .send(Ok(Position::new(route[index], Utc::now())))
                    .await
                    .is_err()
                {
                    // Watch dropped: subscription cancelled.
                    break;
                }
            }
        });

        PositionWatch::new(rx)
    }
}
