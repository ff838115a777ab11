//! HTTP delivery surface for spool.
//!
//! - Claim and stream endpoints with range, HEAD and download support
//! - Status classification of player failures
//! - Runtime throttle settings behind basic auth
//! - Prometheus metrics

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod range;
pub mod report;
pub mod routes;
pub mod state;

pub use auth::TraceId;
pub use error::{ApiError, ApiResult};
pub use report::{ErrorReporter, LogReporter};
pub use routes::create_router;
pub use state::AppState;
