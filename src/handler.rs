//! Request handling: signature check → decode → route → response.
//!
//! [`RequestHandler::handle`] never fails. Every error becomes a 400 response
//! whose body is `<Kind>: <message>`; success is a 200 with an empty body.
//! Verbose mode adds the event body and the full error chain to the log, never
//! to the response.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{ErrorKind, error_chain};
use crate::router::{EventRouter, RouteError, RouteOutcome};
use crate::store::CorrelationStore;
use crate::tickets::TicketingConnector;
use crate::webhooks::{DecodeError, SignatureError, decode_webhook, verify_signature};

/// Header carrying the GitHub event type.
pub const HEADER_EVENT: &str = "x-github-event";
/// Preferred signature header (HMAC-SHA256).
pub const HEADER_SIGNATURE_256: &str = "x-hub-signature-256";
/// Legacy signature header (HMAC-SHA1).
pub const HEADER_SIGNATURE: &str = "x-hub-signature";

pub const STATUS_OK: u16 = 200;
pub const STATUS_REJECTED: u16 = 400;

/// An inbound request as received: headers plus the exact body bytes.
#[derive(Debug, Clone, Default)]
pub struct SignedRequest {
    headers: HashMap<String, String>,
    raw_body: Vec<u8>,
}

impl SignedRequest {
    /// Header names are matched case-insensitively.
    pub fn new<K, V>(headers: impl IntoIterator<Item = (K, V)>, raw_body: impl Into<Vec<u8>>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        SignedRequest {
            headers: headers
                .into_iter()
                .map(|(name, value)| (name.as_ref().to_ascii_lowercase(), value.into()))
                .collect(),
            raw_body: raw_body.into(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.raw_body
    }
}

/// Status and plain-text body returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerResponse {
    pub status: u16,
    pub body: String,
}

impl HandlerResponse {
    pub fn ok() -> Self {
        HandlerResponse {
            status: STATUS_OK,
            body: String::new(),
        }
    }

    /// 400 response naming the failure kind. Kept to one line.
    pub fn rejected(err: &HandlerError) -> Self {
        let message = err.to_string().replace(['\r', '\n'], " ");
        HandlerResponse {
            status: STATUS_REJECTED,
            body: format!("{}: {}", err.kind(), message),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Any failure while handling a request.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Route(#[from] RouteError),
}

impl HandlerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::MissingHeader(_) => ErrorKind::MalformedHeader,
            HandlerError::Signature(e) => e.kind(),
            HandlerError::Decode(e) => e.kind(),
            HandlerError::Route(e) => e.kind(),
        }
    }
}

/// Entry point for webhook deliveries.
pub struct RequestHandler<S, C> {
    secret: Vec<u8>,
    router: EventRouter<S, C>,
    verbose: bool,
}

impl<S, C> RequestHandler<S, C>
where
    S: CorrelationStore,
    C: TicketingConnector,
{
    pub fn new(secret: impl Into<Vec<u8>>, router: EventRouter<S, C>, verbose: bool) -> Self {
        RequestHandler {
            secret: secret.into(),
            router,
            verbose,
        }
    }

    pub fn router(&self) -> &EventRouter<S, C> {
        &self.router
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Processes one delivery and produces its response.
    pub async fn handle(&self, request: &SignedRequest) -> HandlerResponse {
        match self.process(request).await {
            Ok(outcome) => {
                debug!(?outcome, "Webhook handled");
                HandlerResponse::ok()
            }
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "Rejected webhook");
                if self.verbose {
                    warn!(chain = %error_chain(&e), "Failure detail");
                }
                HandlerResponse::rejected(&e)
            }
        }
    }

    async fn process(&self, request: &SignedRequest) -> Result<RouteOutcome, HandlerError> {
        let event_type = request
            .header(HEADER_EVENT)
            .ok_or(HandlerError::MissingHeader(HEADER_EVENT))?;
        let signature = request
            .header(HEADER_SIGNATURE_256)
            .or_else(|| request.header(HEADER_SIGNATURE))
            .ok_or(HandlerError::MissingHeader(HEADER_SIGNATURE_256))?;

        // Authenticate the exact bytes before anything looks at them.
        verify_signature(request.body(), signature, &self.secret)?;

        if self.verbose {
            warn!(
                event_type,
                body = %String::from_utf8_lossy(request.body()),
                "Received event"
            );
        }

        let envelope = decode_webhook(event_type, request.body())?;
        debug!(
            event_type = %envelope.event_type(),
            action = envelope.action(),
            repo = %envelope.repository().full_name,
            issue_id = %envelope.issue().id,
            "Decoded webhook"
        );

        Ok(self.router.route(&envelope).await?)
    }
}
