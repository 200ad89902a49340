pub mod aggregator;
pub mod config;
pub mod route_client;
pub mod service;
pub mod session;
pub mod source;

pub use aggregator::{AggregationError, DistanceAggregator};
pub use config::RouteApiConfig;
pub use route_client::{DistanceMatrix, HttpRouteClient, RouteClient, TransportError};
pub use service::{SessionHandle, SessionService};
pub use session::{SessionError, SessionSnapshot, StopSummary, TrackingSession};
pub use source::{PositionError, PositionSource, PositionWatch, SimulatedPositionSource, WatchUpdate};
