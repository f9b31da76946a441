//! Failure taxonomy shared by every stage of request processing.
//!
//! Each module defines its own error enum; all of them map onto an
//! [`ErrorKind`], which is what the caller sees in a rejected response.

use std::fmt;

/// The kind of failure that ended a webhook invocation.
///
/// `Display` renders the stable kind name (e.g. `SignatureMismatch`), which is
/// the prefix of every client-error response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Signature or event-type header missing or not `algorithm=hexdigest`.
    MalformedHeader,
    /// Signature header names an algorithm outside the approved set.
    UnsupportedAlgorithm,
    /// Computed digest differs from the supplied one.
    SignatureMismatch,
    /// Event-type header is neither `issues` nor `issue_comment`.
    UnrecognizedEventType,
    /// Body is not JSON, or a required field is absent or mistyped.
    MalformedPayload,
    /// The event's action has no route.
    UnsupportedAction,
    /// No ticket is recorded for the issue the event refers to.
    CorrelationNotFound,
    /// The ticketing system refused to create a ticket.
    TicketCreationFailed,
    /// The ticketing system refused a reply.
    ReplyFailed,
    /// The ticketing system refused to resolve a ticket.
    ResolveFailed,
    /// Ticketing login was rejected.
    AuthenticationFailed,
    /// An external call exceeded its time bound.
    Timeout,
    /// The correlation store could not be read or written.
    StoreUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedHeader => "MalformedHeader",
            ErrorKind::UnsupportedAlgorithm => "UnsupportedAlgorithm",
            ErrorKind::SignatureMismatch => "SignatureMismatch",
            ErrorKind::UnrecognizedEventType => "UnrecognizedEventType",
            ErrorKind::MalformedPayload => "MalformedPayload",
            ErrorKind::UnsupportedAction => "UnsupportedAction",
            ErrorKind::CorrelationNotFound => "CorrelationNotFound",
            ErrorKind::TicketCreationFailed => "TicketCreationFailed",
            ErrorKind::ReplyFailed => "ReplyFailed",
            ErrorKind::ResolveFailed => "ResolveFailed",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::StoreUnavailable => "StoreUnavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders an error and its `source()` chain on one line, outermost first.
///
/// Used for verbose diagnostics only; response bodies carry the outermost
/// message alone.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
