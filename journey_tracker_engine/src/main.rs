//! Demo run: a simulated route tracked start to stop, with the cumulative
//! distance fetched from the configured routing service.

use std::time::Duration;

use geo_types::Point;
use journey_tracker_engine::{
    DistanceAggregator, HttpRouteClient, RouteApiConfig, SessionService, SimulatedPositionSource,
    TrackingSession,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RouteApiConfig::from_env();
    tracing::info!(base_url = %config.base_url, "starting journey tracker demo");

    // Short loop through Delhi, ending back at the start.
    let route = vec![
        Point::new(77.10, 28.70),
        Point::new(77.11, 28.71),
        Point::new(77.12, 28.72),
        Point::new(77.10, 28.70),
    ];
    let source = SimulatedPositionSource::new(route, Duration::from_secs(1));
    let client = HttpRouteClient::new(config).expect("failed to build HTTP client");
    let session = TrackingSession::new(source, DistanceAggregator::new(client));
    let handle = SessionService::spawn(session);

    let mut snapshots = handle.subscribe();
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow().clone();
            if let Some(position) = snapshot.current_position {
                tracing::info!(
                    lat = position.latitude(),
                    lon = position.longitude(),
                    samples = snapshot.history.len(),
                    "position update"
                );
            }
        }
    });

    if let Err(err) = handle.start().await {
        tracing::error!(error = %err, "failed to start tracking");
        return;
    }

    tokio::time::sleep(Duration::from_secs(5)).await;

    match handle.stop().await {
        Ok(summary) if summary.aggregation_error.is_none() => {
            tracing::info!(
                distance_km = format!("{:.2}", summary.distance_km),
                degraded = summary.degraded,
                "session finished"
            );
        }
        Ok(summary) => {
            tracing::error!(
                error = %summary.aggregation_error.expect("checked above"),
                last_known_km = summary.distance_km,
                "distance lookup failed, keeping last known value"
            );
        }
        Err(err) => tracing::error!(error = %err, "failed to stop tracking"),
    }
}
