//! Webhook endpoint.
//!
//! Adapts axum's request pieces to a [`SignedRequest`] and the handler's
//! [`HandlerResponse`] back to HTTP. All decisions live in
//! [`RequestHandler`](crate::handler::RequestHandler).

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use super::AppState;
use crate::handler::{HandlerResponse, SignedRequest};
use crate::store::CorrelationStore;
use crate::tickets::TicketingConnector;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

impl IntoResponse for HandlerResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_REQUEST);
        (
            status,
            [(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN))],
            self.body,
        )
            .into_response()
    }
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Headers: `X-GitHub-Event` (`issues` or `issue_comment`) and
///   `X-Hub-Signature-256` or `X-Hub-Signature`
/// - Body: JSON webhook payload, verified byte-for-byte
///
/// # Response
///
/// - 200 OK, empty body: event mirrored into the ticketing system
/// - 400 Bad Request, `text/plain`: `<Kind>: <message>`
///
/// # Example
///
/// ```ignore
/// POST /webhook HTTP/1.1
/// X-GitHub-Event: issues
/// X-Hub-Signature-256: sha256=...
/// Content-Type: application/json
///
/// {"action": "closed", "issue": {...}, "repository": {...}, "sender": {...}}
///
/// HTTP/1.1 400 Bad Request
/// Content-Type: text/plain; charset=utf-8
///
/// CorrelationNotFound: no ticket recorded for o/r / issue id 1
/// ```
pub async fn webhook_handler<S, C>(
    State(app_state): State<AppState<S, C>>,
    headers: HeaderMap,
    body: Bytes,
) -> HandlerResponse
where
    S: CorrelationStore,
    C: TicketingConnector,
{
    let request = SignedRequest::new(extract_headers(&headers), body.to_vec());
    app_state.handler().handle(&request).await
}

/// Collects headers whose values are valid UTF-8. Others are dropped and
/// therefore treated as absent.
fn extract_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}
