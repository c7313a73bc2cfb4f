//! HTTP ingestion surface for the insight sink.

pub mod response;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
