//! Ticketing system access.
//!
//! Ticket operations are described as data ([`TicketEffect`]) and executed by a
//! [`TicketingClient`]. Clients are obtained per invocation from a
//! [`TicketingConnector`], so no session state is shared between requests.
//!
//! The trait-based design enables:
//! - Fake clients for testing the router without a ticketing server
//! - Logging the intended operation before it runs

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::TicketId;

pub mod rt;

pub use rt::{RtClient, RtConfig, RtConnector, TlsVerification};

/// MIME type of issue and comment bodies attached to tickets.
pub const MARKDOWN_MIME: &str = "text/plain; charset=UTF-8";

/// A file attached to a ticket or reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content: String,
    pub mime_type: String,
}

impl Attachment {
    /// A UTF-8 text attachment holding GitHub-flavoured markdown.
    pub fn markdown(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Attachment {
            filename: filename.into(),
            content: content.into(),
            mime_type: MARKDOWN_MIME.to_string(),
        }
    }
}

/// Fields for a new ticket. The queue is chosen by the client's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    pub requestor: String,
    pub subject: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

/// Correspondence added to an existing ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketReply {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

/// A ticketing operation to perform inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum TicketEffect {
    Create(NewTicket),
    Reply { ticket: TicketId, reply: TicketReply },
    Resolve { ticket: TicketId },
}

impl TicketEffect {
    /// Short operation name for logs and timeout messages.
    pub fn name(&self) -> &'static str {
        match self {
            TicketEffect::Create(_) => "create",
            TicketEffect::Reply { .. } => "reply",
            TicketEffect::Resolve { .. } => "resolve",
        }
    }
}

/// Outcome of a [`TicketEffect`] the ticketing system accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketResponse {
    Created(TicketId),
    Replied,
    Resolved,
}

/// Errors talking to the ticketing system.
///
/// A request the system understood and refused is not an error at this level;
/// the client methods report refusals through their return values.
#[derive(Debug, Error)]
pub enum TicketError {
    /// The HTTP request could not be made or its body read.
    #[error("ticketing request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success HTTP status.
    #[error("ticketing system returned HTTP {status}")]
    HttpStatus { status: u16 },

    /// The client could not be configured (bad URL, unreadable CA bundle, ...).
    #[error("invalid ticketing configuration: {0}")]
    Config(String),
}

/// A logged-in (or about to be) connection to the ticketing system.
pub trait TicketingClient: Send + Sync {
    /// Authenticates. `Ok(false)` means the credentials were rejected.
    fn login(&self) -> impl Future<Output = Result<bool, TicketError>> + Send;

    /// Creates a ticket. `Ok(None)` means the system refused to create it.
    fn create(
        &self,
        ticket: &NewTicket,
    ) -> impl Future<Output = Result<Option<TicketId>, TicketError>> + Send;

    /// Adds correspondence to a ticket. `Ok(false)` means it was refused.
    fn reply(
        &self,
        ticket: TicketId,
        reply: &TicketReply,
    ) -> impl Future<Output = Result<bool, TicketError>> + Send;

    /// Marks a ticket resolved. `Ok(false)` means it was refused.
    fn resolve(&self, ticket: TicketId) -> impl Future<Output = Result<bool, TicketError>> + Send;

    /// Ends the session.
    fn logout(&self) -> impl Future<Output = Result<(), TicketError>> + Send;
}

/// Produces a fresh [`TicketingClient`] for each invocation.
pub trait TicketingConnector: Send + Sync + 'static {
    type Client: TicketingClient;

    fn connect(&self) -> Result<Self::Client, TicketError>;
}
