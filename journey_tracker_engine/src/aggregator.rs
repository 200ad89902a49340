//! Reduction of a location history into a cumulative travel distance.
//!
//! The history is turned into its chronologically consecutive legs; legs
//! whose endpoints share coordinates are settled locally as zero and never
//! sent upstream. The remaining legs go out as one batched distance-matrix
//! query in which leg `i` is origin `i` -> destination `i`, so the leg
//! distances sit on the matrix diagonal.

use journey_tracker_lib::{LocationHistory, Position};
use thiserror::Error;

use crate::route_client::{RouteClient, TransportError};

/// Failures while computing a cumulative distance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    /// Fewer than two samples; there is no leg to sum.
    #[error("not enough samples to form a travel leg")]
    InsufficientData,

    /// The service resolved the matrix but left a required leg empty.
    #[error("distance matrix has no value for leg {leg}")]
    MatrixGap { leg: usize },

    /// The transport failed after its retry policy was exhausted.
    #[error("distance lookup failed: {0}")]
    Upstream(#[from] TransportError),
}

/// Computes the cumulative distance of a session, in kilometres.
pub struct DistanceAggregator<C> {
    client: C,
}

impl<C: RouteClient> DistanceAggregator<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Sum of the consecutive-leg distances of `history`, in kilometres.
    ///
    /// Either the whole computation succeeds or an error is returned; a
    /// partial sum is never produced.
    pub async fn compute(&self, history: &LocationHistory) -> Result<f64, AggregationError> {
        if history.len() < 2 {
            return Err(AggregationError::InsufficientData);
        }

        let legs: Vec<(Position, Position)> = history
            .legs()
            .filter(|(from, to)| !from.same_coordinates(to))
            .map(|(from, to)| (*from, *to))
            .collect();

        if legs.is_empty() {
            tracing::debug!("every leg is zero-length, skipping distance lookup");
            return Ok(0.0);
        }

        let origins: Vec<Position> = legs.iter().map(|(from, _)| *from).collect();
        let destinations: Vec<Position> = legs.iter().map(|(_, to)| *to).collect();

        let matrix = self
            .client
            .fetch_distance_matrix(&origins, &destinations)
            .await?;

        let mut total_km = 0.0;
        for leg in 0..legs.len() {
            let metres = matrix
                .get(leg)
                .and_then(|row| row.get(leg))
                .copied()
                .flatten()
                .ok_or(AggregationError::MatrixGap { leg })?;
            total_km += metres / 1000.0;
        }

        tracing::info!(legs = legs.len(), total_km, "cumulative distance computed");

        Ok(total_km)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::route_client::DistanceMatrix;

    struct FakeClient {
        response: Result<DistanceMatrix, TransportError>,
        calls: Mutex<Vec<(Vec<Position>, Vec<Position>)>>,
    }

    impl FakeClient {
        fn returning(response: Result<DistanceMatrix, TransportError>) -> Self {
            Self {
                response,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl RouteClient for FakeClient {
        async fn fetch_distance_matrix(
            &self,
            origins: &[Position],
            destinations: &[Position],
        ) -> Result<DistanceMatrix, TransportError> {
            self.calls
                .lock()
                .unwrap()
                .push((origins.to_vec(), destinations.to_vec()));
            self.response.clone()
        }
    }

    fn history_of(coords: &[(f64, f64)]) -> LocationHistory {
        let mut history = LocationHistory::new();
        for (lat, lon) in coords {
            history.push(Position::from_lat_lon(*lat, *lon, Utc::now()));
        }
        history
    }

    #[tokio::test]
    async fn sums_consecutive_legs_in_kilometres() {
        // Out and back: two legs of 1200 m each.
        let client = FakeClient::returning(Ok(vec![
            vec![Some(1200.0), Some(3000.0)],
            vec![Some(3000.0), Some(1200.0)],
        ]));
        let aggregator = DistanceAggregator::new(client);

        let history = history_of(&[(28.70, 77.10), (28.71, 77.11), (28.70, 77.10)]);
        let total = aggregator.compute(&history).await.unwrap();
        assert!((total - 2.40).abs() < 1e-9);

        // One batched call, shaped as consecutive pairs, not all combinations.
        let calls = aggregator.client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (origins, destinations) = &calls[0];
        assert_eq!(origins.len(), 2);
        assert_eq!(destinations.len(), 2);
        assert_eq!(origins[0].latitude(), 28.70);
        assert_eq!(destinations[0].latitude(), 28.71);
        assert_eq!(origins[1].latitude(), 28.71);
        assert_eq!(destinations[1].latitude(), 28.70);
    }

    #[tokio::test]
    async fn single_sample_is_insufficient() {
        let client = FakeClient::returning(Ok(Vec::new()));
        let aggregator = DistanceAggregator::new(client);

        let history = history_of(&[(28.70, 77.10)]);
        let err = aggregator.compute(&history).await.unwrap_err();
        assert_eq!(err, AggregationError::InsufficientData);
        assert_eq!(aggregator.client.call_count(), 0);
    }

    #[tokio::test]
    async fn zero_length_legs_never_reach_the_service() {
        let client = FakeClient::returning(Ok(vec![vec![Some(500.0)]]));
        let aggregator = DistanceAggregator::new(client);

        // Stationary in the middle: A, A, B has one real leg.
        let history = history_of(&[(28.70, 77.10), (28.70, 77.10), (28.71, 77.11)]);
        let total = aggregator.compute(&history).await.unwrap();
        assert!((total - 0.5).abs() < 1e-9);

        let calls = aggregator.client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.len(), 1);
    }

    #[tokio::test]
    async fn fully_stationary_history_is_zero_with_no_call() {
        let client = FakeClient::returning(Ok(Vec::new()));
        let aggregator = DistanceAggregator::new(client);

        let history = history_of(&[(28.70, 77.10), (28.70, 77.10), (28.70, 77.10)]);
        let total = aggregator.compute(&history).await.unwrap();
        assert_eq!(total, 0.0);
        assert_eq!(aggregator.client.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_diagonal_entry_is_a_gap() {
        let client = FakeClient::returning(Ok(vec![
            vec![Some(1200.0), None],
            vec![Some(900.0), None],
        ]));
        let aggregator = DistanceAggregator::new(client);

        let history = history_of(&[(28.70, 77.10), (28.71, 77.11), (28.72, 77.12)]);
        let err = aggregator.compute(&history).await.unwrap_err();
        assert_eq!(err, AggregationError::MatrixGap { leg: 1 });
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_upstream() {
        let client = FakeClient::returning(Err(TransportError::Server { status: 503 }));
        let aggregator = DistanceAggregator::new(client);

        let history = history_of(&[(28.70, 77.10), (28.71, 77.11)]);
        let err = aggregator.compute(&history).await.unwrap_err();
        assert_eq!(
            err,
            AggregationError::Upstream(TransportError::Server { status: 503 })
        );
    }
}
