//! Tracking session state machine.
//!
//! A session runs Idle -> Tracking -> Stopped and owns the location history
//! for its lifetime. Observers get [`SessionSnapshot`] values over a
//! `tokio::sync::watch` channel, so a presentation layer can render the
//! current state without touching the session itself.
//!
//! Ordering discipline: the watch subscription is dropped before any await
//! point in `stop`, so no sample can be appended once the transition out of
//! Tracking has begun.

use journey_tracker_lib::{LocationHistory, Position, TrackingState};
use thiserror::Error;
use tokio::sync::watch;

use crate::aggregator::{AggregationError, DistanceAggregator};
use crate::route_client::RouteClient;
use crate::source::{PositionError, PositionSource, PositionWatch};
use crate::WatchUpdate;

/// Illegal operations on a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The requested operation is not allowed in the current state.
    #[error("{op} is not allowed while {from:?}")]
    InvalidTransition {
        from: TrackingState,
        op: &'static str,
    },

    /// The initial position fetch failed; the session stays Idle.
    #[error(transparent)]
    Position(#[from] PositionError),

    /// The driving service task is gone.
    #[error("session service is no longer running")]
    ServiceClosed,
}

/// Observable state published to the presentation layer.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub state: TrackingState,
    pub current_position: Option<Position>,
    pub history: LocationHistory,
    pub distance_km: f64,
    pub degraded: bool,
}

/// Outcome of ending a session.
///
/// `distance_km` is always the last known good value; when
/// `aggregation_error` is set the distance was left untouched by the failed
/// computation.
#[derive(Debug, Clone)]
pub struct StopSummary {
    pub distance_km: f64,
    pub degraded: bool,
    pub aggregation_error: Option<AggregationError>,
}

/// The tracking session: state, history and cumulative distance.
pub struct TrackingSession<S, C> {
    source: S,
    aggregator: DistanceAggregator<C>,
    state: TrackingState,
    history: LocationHistory,
    distance_km: f64,
    degraded: bool,
    subscription: Option<PositionWatch>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl<S: PositionSource, C: RouteClient> TrackingSession<S, C> {
    pub fn new(source: S, aggregator: DistanceAggregator<C>) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        Self {
            source,
            aggregator,
            state: TrackingState::Idle,
            history: LocationHistory::new(),
            distance_km: 0.0,
            degraded: false,
            subscription: None,
            snapshot_tx,
        }
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn history(&self) -> &LocationHistory {
        &self.history
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Subscribe to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Begin a new session.
    ///
    /// Allowed from Idle or Stopped. All per-session state is reset before
    /// the first fix is requested; on a failed fix the session is left Idle
    /// with an empty history and the error is surfaced to the caller.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if !self.state.can_start() {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                op: "start",
            });
        }

        self.history.clear();
        self.distance_km = 0.0;
        self.degraded = false;
        self.state = TrackingState::Idle;
        self.publish();

        let first = match self.source.current_position().await {
            Ok(position) => position,
            Err(err) => {
                tracing::warn!(error = %err, "could not get an initial fix, session not started");
                return Err(err.into());
            }
        };

        self.history.push(first);
        self.subscription = Some(self.source.watch());
        self.state = TrackingState::Tracking;
        self.publish();

        tracing::info!(
            lat = first.latitude(),
            lon = first.longitude(),
            "tracking started"
        );
        Ok(())
    }

    /// Await the next watch update without acting on it.
    ///
    /// Cancel-safe: dropping the returned future loses no update, so it can
    /// sit in a `select!` against other work. Pends forever when no
    /// subscription is open.
    pub async fn next_update(&mut self) -> Option<WatchUpdate> {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.next().await,
            None => std::future::pending().await,
        }
    }

    /// Apply one watch update.
    ///
    /// Returns `true` while the session keeps tracking. Source errors other
    /// than a transient timeout end the session as degraded, which runs the
    /// aggregation; callers must let this future finish rather than racing
    /// it against cancellation.
    pub async fn apply_update(&mut self, update: Option<WatchUpdate>) -> bool {
        match update {
            Some(Ok(sample)) => {
                self.history.push(sample);
                self.publish();
                tracing::debug!(
                    lat = sample.latitude(),
                    lon = sample.longitude(),
                    samples = self.history.len(),
                    "position sample"
                );
                true
            }
            Some(Err(PositionError::Timeout)) => {
                tracing::warn!("position watch timed out, still tracking");
                true
            }
            Some(Err(err)) => {
                tracing::warn!(error = %err, "position source failed, ending session");
                self.finish(true).await;
                false
            }
            None => {
                tracing::warn!("position source closed the watch, ending session");
                self.finish(true).await;
                false
            }
        }
    }

    /// Consume the next watch update: [`next_update`](Self::next_update)
    /// followed by [`apply_update`](Self::apply_update).
    ///
    /// Not cancel-safe as a whole; use the two halves separately when the
    /// await has to race other work.
    pub async fn process_next(&mut self) -> bool {
        if self.subscription.is_none() {
            return false;
        }
        let update = self.next_update().await;
        self.apply_update(update).await
    }

    /// End the session explicitly.
    ///
    /// The watch subscription is cancelled before the final one-shot fix is
    /// awaited. The final fix closes the history when it succeeds; otherwise
    /// the last watched sample already does.
    pub async fn stop(&mut self) -> Result<StopSummary, SessionError> {
        if !self.state.is_tracking() {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                op: "stop",
            });
        }

        self.subscription = None;

        match self.source.current_position().await {
            Ok(position) => self.history.push(position),
            Err(err) => {
                tracing::warn!(error = %err, "no final fix, closing history with the last sample");
            }
        }

        Ok(self.finish(false).await)
    }

    /// Shared tail of explicit and implicit stops: transition to Stopped and
    /// aggregate over whatever history exists.
    ///
    /// An upstream failure leaves the stored distance untouched; a partial
    /// sum is never kept.
    async fn finish(&mut self, degraded: bool) -> StopSummary {
        self.subscription = None;
        self.state = TrackingState::Stopped;
        self.degraded = degraded;

        let mut aggregation_error = None;
        if self.history.is_empty() {
            tracing::debug!("no samples captured, skipping aggregation");
        } else {
            match self.aggregator.compute(&self.history).await {
                Ok(distance_km) => self.distance_km = distance_km,
                Err(AggregationError::InsufficientData) => {
                    tracing::debug!("single-sample session, distance is zero");
                }
                Err(err) => {
                    tracing::error!(error = %err, "aggregation failed, keeping previous distance");
                    aggregation_error = Some(err);
                }
            }
        }

        self.publish();
        tracing::info!(
            samples = self.history.len(),
            distance_km = self.distance_km,
            degraded,
            "tracking stopped"
        );

        StopSummary {
            distance_km: self.distance_km,
            degraded,
            aggregation_error,
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(SessionSnapshot {
            state: self.state,
            current_position: self.history.last().copied(),
            history: self.history.clone(),
            distance_km: self.distance_km,
            degraded: self.degraded,
        });
    }
}
