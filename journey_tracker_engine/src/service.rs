//! Spawned driver exposing a session to the presentation layer.
//!
//! [`SessionService::spawn`] moves a [`TrackingSession`] onto its own task;
//! the returned [`SessionHandle`] carries start/stop commands over an mpsc
//! channel with oneshot replies, plus the snapshot subscription. The task
//! interleaves command handling with sample intake, so both run on a single
//! logical thread and never in parallel.

use tokio::sync::{mpsc, oneshot, watch};

use crate::route_client::RouteClient;
use crate::session::{SessionError, SessionSnapshot, StopSummary, TrackingSession};
use crate::source::{PositionSource, WatchUpdate};

enum SessionCommand {
    Start(oneshot::Sender<Result<(), SessionError>>),
    Stop(oneshot::Sender<Result<StopSummary, SessionError>>),
}

enum ServiceEvent {
    Command(Option<SessionCommand>),
    Update(Option<WatchUpdate>),
}

pub struct SessionService;

impl SessionService {
    /// Spawn the driving task for `session` and hand back its handle.
    pub fn spawn<S, C>(mut session: TrackingSession<S, C>) -> SessionHandle
    where
        S: PositionSource + 'static,
        C: RouteClient + 'static,
    {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<SessionCommand>(8);
        let snapshot_rx = session.subscribe();

        tokio::spawn(async move {
            loop {
                // Only cancel-safe receives sit in the select. Applying an
                // update can await the aggregation (implicit degraded stop),
                // so it runs below where a queued command cannot drop it
                // halfway through.
                let event = if session.state().is_tracking() {
                    tokio::select! {
                        cmd = cmd_rx.recv() => ServiceEvent::Command(cmd),
                        update = session.next_update() => ServiceEvent::Update(update),
                    }
                } else {
                    ServiceEvent::Command(cmd_rx.recv().await)
                };

                match event {
                    ServiceEvent::Update(update) => {
                        session.apply_update(update).await;
                    }
                    ServiceEvent::Command(Some(SessionCommand::Start(reply))) => {
                        let _ = reply.send(session.start().await);
                    }
                    ServiceEvent::Command(Some(SessionCommand::Stop(reply))) => {
                        let _ = reply.send(session.stop().await);
                    }
                    ServiceEvent::Command(None) => {
                        // All handles dropped.
                        break;
                    }
                }
            }
            tracing::debug!("session service stopped");
        });

        SessionHandle {
            cmd_tx,
            snapshot_rx,
        }
    }
}

/// Presentation-side handle on a running session service.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub async fn start(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::Start(tx))
            .await
            .map_err(|_| SessionError::ServiceClosed)?;
        rx.await.map_err(|_| SessionError::ServiceClosed)?
    }

    pub async fn stop(&self) -> Result<StopSummary, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::Stop(tx))
            .await
            .map_err(|_| SessionError::ServiceClosed)?;
        rx.await.map_err(|_| SessionError::ServiceClosed)?
    }

    /// Change-notified snapshot stream for the UI.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::Utc;
    use journey_tracker_lib::{Position, TrackingState};

    use super::*;
    use crate::aggregator::DistanceAggregator;
    use crate::route_client::{DistanceMatrix, TransportError};
    use crate::source::{PositionError, PositionWatch, WatchUpdate};

    struct ScriptedSource {
        fixes: Mutex<VecDeque<Result<Position, PositionError>>>,
        watches: Mutex<VecDeque<mpsc::Receiver<WatchUpdate>>>,
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self {
                fixes: Mutex::new(VecDeque::new()),
                watches: Mutex::new(VecDeque::new()),
            }
        }
    }

    impl PositionSource for ScriptedSource {
        async fn current_position(&self) -> Result<Position, PositionError> {
            self.fixes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(PositionError::Unavailable("no scripted fix".into())))
        }

        fn watch(&self) -> PositionWatch {
            let rx = self
                .watches
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted watch");
            PositionWatch::new(rx)
        }
    }

    struct StaticClient(Result<DistanceMatrix, TransportError>);

    impl RouteClient for StaticClient {
        async fn fetch_distance_matrix(
            &self,
            _origins: &[Position],
            _destinations: &[Position],
        ) -> Result<DistanceMatrix, TransportError> {
            self.0.clone()
        }
    }

    struct SlowClient {
        delay: Duration,
        response: Result<DistanceMatrix, TransportError>,
    }

    impl RouteClient for SlowClient {
        async fn fetch_distance_matrix(
            &self,
            _origins: &[Position],
            _destinations: &[Position],
        ) -> Result<DistanceMatrix, TransportError> {
            tokio::time::sleep(self.delay).await;
            self.response.clone()
        }
    }

    fn pos(lat: f64, lon: f64) -> Position {
        Position::from_lat_lon(lat, lon, Utc::now())
    }

    #[tokio::test]
    async fn drives_a_full_session_through_the_handle() {
        let source = ScriptedSource::new();
        source.fixes.lock().unwrap().push_back(Ok(pos(28.70, 77.10)));
        let (watch_tx, watch_rx) = mpsc::channel(16);
        source.watches.lock().unwrap().push_back(watch_rx);
        source.fixes.lock().unwrap().push_back(Ok(pos(28.72, 77.12)));

        let session = TrackingSession::new(
            source,
            DistanceAggregator::new(StaticClient(Ok(vec![
                vec![Some(1200.0), Some(3000.0)],
                vec![Some(3000.0), Some(1200.0)],
            ]))),
        );
        let handle = SessionService::spawn(session);

        handle.start().await.unwrap();
        let mut rx = handle.subscribe();
        rx.wait_for(|s| s.state == TrackingState::Tracking)
            .await
            .unwrap();

        // Sample delivered while the service is running gets appended.
        watch_tx.send(Ok(pos(28.71, 77.11))).await.unwrap();
        rx.wait_for(|s| s.history.len() == 2).await.unwrap();

        let summary = handle.stop().await.unwrap();
        assert!((summary.distance_km - 2.40).abs() < 1e-9);

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.state, TrackingState::Stopped);
        assert_eq!(snapshot.history.len(), 3);
    }

    #[tokio::test]
    async fn command_during_degraded_stop_waits_for_the_aggregation() {
        let source = ScriptedSource::new();
        source.fixes.lock().unwrap().push_back(Ok(pos(28.70, 77.10)));
        let (watch_tx, watch_rx) = mpsc::channel(16);
        source.watches.lock().unwrap().push_back(watch_rx);

        let session = TrackingSession::new(
            source,
            DistanceAggregator::new(SlowClient {
                delay: Duration::from_millis(300),
                response: Ok(vec![vec![Some(1200.0)]]),
            }),
        );
        let handle = SessionService::spawn(session);

        handle.start().await.unwrap();
        let mut rx = handle.subscribe();
        watch_tx.send(Ok(pos(28.71, 77.11))).await.unwrap();
        rx.wait_for(|s| s.history.len() == 2).await.unwrap();

        // A source failure triggers an implicit degraded stop whose
        // aggregation call is still in flight when the command lands.
        watch_tx
            .send(Err(PositionError::PermissionDenied))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // The session already stopped; the command must queue behind the
        // running aggregation instead of cancelling it.
        let err = handle.stop().await.unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                from: TrackingState::Stopped,
                op: "stop",
            }
        );

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.state, TrackingState::Stopped);
        assert!(snapshot.degraded);
        assert!((snapshot.distance_km - 1.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn invalid_transitions_come_back_through_the_handle() {
        let source = ScriptedSource::new();
        let session =
            TrackingSession::new(source, DistanceAggregator::new(StaticClient(Ok(Vec::new()))));
        let handle = SessionService::spawn(session);

        let err = handle.stop().await.unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                from: TrackingState::Idle,
                op: "stop",
            }
        );
        assert_eq!(handle.snapshot().state, TrackingState::Idle);
    }
}
