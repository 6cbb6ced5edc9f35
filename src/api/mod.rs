//! REST API over the forecast service.
//!
//! Endpoints:
//! - `GET /health`
//! - `GET /systems`: configured systems and devices
//! - `GET /systems/{id}/forecast?days=N`
//! - `GET /systems/{id}/optimal-window?device=ID&days_lookahead=N`
//! - `GET /systems/{id}/excess?consumption_kw=X&days=N`

mod handlers;
mod types;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::service::ForecastService;

pub use types::ErrorResponse;

/// Application state shared across all request handlers.
pub struct AppState {
    pub service: ForecastService,
    /// Source of the reference instant for each request.
    pub clock: fn() -> DateTime<Utc>,
}

impl AppState {
    /// State using the wall clock.
    pub fn new(service: ForecastService) -> Self {
        Self {
            service,
            clock: Utc::now,
        }
    }
}

/// Builds the axum router with all API routes.
///
/// # Arguments
///
/// * `state` - Shared application state
///
/// # Returns
///
/// Configured `Router` ready to serve.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/systems", get(handlers::list_systems))
        .route("/systems/{id}/forecast", get(handlers::get_forecast))
        .route("/systems/{id}/optimal-window", get(handlers::get_optimal_window))
        .route("/systems/{id}/excess", get(handlers::get_excess))
        .with_state(state)
}

/// Binds to the given address and serves the API until the server stops.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on http://{addr}");
    axum::serve(listener, app).await
}
