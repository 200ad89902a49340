pub mod location_history;
pub mod position;
pub mod tracking_state;

pub use location_history::LocationHistory;
pub use position::Position;
pub use tracking_state::TrackingState;
