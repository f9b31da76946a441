//! HTTP server for the ticket bridge.
//!
//! # Endpoints
//!
//! - `POST /webhook` - Verifies and mirrors a GitHub delivery (200 or 400)
//! - `GET /health` - Returns 200 if the server is running

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};

use crate::handler::RequestHandler;
use crate::store::CorrelationStore;
use crate::tickets::TicketingConnector;

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::webhook_handler;

/// Largest delivery accepted. GitHub caps webhook payloads at 25 MB.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Shared application state, passed to handlers via axum's `State` extractor.
pub struct AppState<S, C> {
    inner: Arc<RequestHandler<S, C>>,
}

// Manual impl: cloning shares the handler and needs no bounds on `S` or `C`.
impl<S, C> Clone for AppState<S, C> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, C> AppState<S, C>
where
    S: CorrelationStore,
    C: TicketingConnector,
{
    pub fn new(handler: RequestHandler<S, C>) -> Self {
        AppState {
            inner: Arc::new(handler),
        }
    }

    pub fn handler(&self) -> &RequestHandler<S, C> {
        &self.inner
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<S, C>(app_state: AppState<S, C>) -> Router
where
    S: CorrelationStore,
    C: TicketingConnector,
{
    Router::new()
        .route("/webhook", post(webhook_handler::<S, C>))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state)
}
