//! Liveness probe.

use axum::http::StatusCode;

/// Returns 200 with the text "OK" whenever the process is serving requests.
/// Checks neither the store nor the ticketing system.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
