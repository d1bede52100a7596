//! HTTP API: engine control, status, health and metrics endpoints.

pub mod handlers;
pub mod routes;

pub use handlers::{AppState, StartRequest};
pub use routes::create_router;
