//! Transport to the remote distance/routing service.
//!
//! [`RouteClient`] abstracts the distance-matrix call so the aggregator can
//! be exercised against fakes; [`HttpRouteClient`] is the real
//! implementation over `reqwest`. Failures are classified into
//! [`TransportError`] variants, and only server failures and timeouts are
//! retried (fixed backoff, bounded attempts).

use std::future::Future;

use journey_tracker_lib::Position;
use serde::Deserialize;
use thiserror::Error;

use crate::config::RouteApiConfig;

/// Distance matrix in metres, mirroring the query shape.
///
/// `None` marks an unresolved pair (the service returned no distance or a
/// non-OK element status).
pub type DistanceMatrix = Vec<Vec<Option<f64>>>;

/// Classified transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No response at all (DNS, connect, broken transfer).
    #[error("no response from routing service: {0}")]
    Network(String),

    /// 4xx - the request shape or credential was rejected. Never retried.
    #[error("routing service rejected the request ({status}): {body}")]
    Client { status: u16, body: String },

    /// 5xx - service-side failure, eligible for retry.
    #[error("routing service failure ({status})")]
    Server { status: u16 },

    /// The request did not complete within the configured timeout.
    #[error("routing request timed out")]
    Timeout,

    /// A response arrived but could not be decoded. Never retried.
    #[error("malformed routing response: {0}")]
    MalformedResponse(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Server { .. } | TransportError::Timeout)
    }
}

/// Single external call boundary to the distance service.
pub trait RouteClient: Send + Sync {
    /// Fetch the origins x destinations distance matrix, in metres.
    fn fetch_distance_matrix(
        &self,
        origins: &[Position],
        destinations: &[Position],
    ) -> impl Future<Output = Result<DistanceMatrix, TransportError>> + Send;
}

#[derive(Deserialize)]
struct MatrixResponse {
    rows: Vec<MatrixRow>,
}

#[derive(Deserialize)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

/// One matrix cell. The service reports metres; cells may carry a non-OK
/// status or omit the distance entirely.
#[derive(Deserialize)]
struct MatrixElement {
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    status: Option<String>,
}

impl MatrixResponse {
    fn into_matrix(self) -> DistanceMatrix {
        self.rows
            .into_iter()
            .map(|row| {
                row.elements
                    .into_iter()
                    .map(|element| match element.status.as_deref() {
                        None | Some("OK") => element.distance,
                        Some(_) => None,
                    })
                    .collect()
            })
            .collect()
    }
}

/// "lat,lng|lat,lng|..." query form expected by the matrix endpoint.
fn join_coordinate_pairs(positions: &[Position]) -> String {
    positions
        .iter()
        .map(|p| format!("{},{}", p.latitude(), p.longitude()))
        .collect::<Vec<_>>()
        .join("|")
}

/// Distance-matrix client over HTTP.
///
/// Holds a reusable `reqwest::Client` with connection pooling and the
/// configured timeout. Every request carries the bearer credential and a
/// fresh random `X-Request-Id` for correlation on the service side.
pub struct HttpRouteClient {
    http: reqwest::Client,
    config: RouteApiConfig,
}

impl HttpRouteClient {
    pub fn new(config: RouteApiConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    fn matrix_url(&self) -> String {
        format!(
            "{}/routing/v1/distanceMatrix/basic",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn fetch_once(
        &self,
        origins: &str,
        destinations: &str,
    ) -> Result<DistanceMatrix, TransportError> {
        let request_id = hex::encode(rand::random::<[u8; 8]>());

        let response = self
            .http
            .get(self.matrix_url())
            .query(&[("origins", origins), ("destinations", destinations)])
            .bearer_auth(&self.config.api_key)
            .header("X-Request-Id", &request_id)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Client {
                status: status.as_u16(),
                body,
            });
        }
        if status.is_server_error() {
            return Err(TransportError::Server {
                status: status.as_u16(),
            });
        }

        let body: MatrixResponse = response
            .json()
            .await
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        tracing::debug!(request_id, rows = body.rows.len(), "distance matrix fetched");

        Ok(body.into_matrix())
    }
}

impl RouteClient for HttpRouteClient {
    async fn fetch_distance_matrix(
        &self,
        origins: &[Position],
        destinations: &[Position],
    ) -> Result<DistanceMatrix, TransportError> {
        let origins = join_coordinate_pairs(origins);
        let destinations = join_coordinate_pairs(destinations);

        let mut attempt: u32 = 0;
        loop {
            match self.fetch_once(&origins, &destinations).await {
                Ok(matrix) => return Ok(matrix),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(error = %err, attempt, "retrying distance matrix request");
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn classify_send_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}
