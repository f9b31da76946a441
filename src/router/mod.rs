//! Event routing: decoded webhook → ticket operations.
//!
//! | Event | Action | Requires record | Effect |
//! |-------|--------|-----------------|--------|
//! | `issues` | `opened` | no | create ticket, record it |
//! | `issues` | `closed` | yes | resolve ticket |
//! | `issue_comment` | `created`, `edited`, `deleted` | yes | reply with comment attached |
//!
//! Any other action fails with `UnsupportedAction`. A missing record fails
//! with `CorrelationNotFound` before the ticketing system is contacted.
//!
//! # Duplicate "opened" deliveries
//!
//! An existing record means the event was already handled; no ticket is
//! created. If two invocations both see no record, both create tickets and the
//! store's insert-if-absent keeps the first; the second ticket is reported as
//! an orphan in the logs.

mod compose;
mod session;

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::error::ErrorKind;
use crate::store::{CorrelationStore, PutOutcome, StoreError};
use crate::tickets::{TicketEffect, TicketError, TicketResponse, TicketingConnector};
use crate::types::{CorrelationKey, TicketId};
use crate::webhooks::{
    CommentAction, EventType, IssueAction, IssueCommentEvent, IssueEvent, WebhookEnvelope,
};

pub use compose::{attachment_filename, comment_reply, new_ticket};

/// Ticketing steps, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketOperation {
    Connect,
    Login,
    Create,
    Reply,
    Resolve,
}

impl fmt::Display for TicketOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TicketOperation::Connect => "connect",
            TicketOperation::Login => "log in",
            TicketOperation::Create => "create ticket",
            TicketOperation::Reply => "reply to ticket",
            TicketOperation::Resolve => "resolve ticket",
        })
    }
}

/// Errors that can occur while routing an event.
#[derive(Debug, Error)]
pub enum RouteError {
    /// No route for this action.
    #[error("unsupported {event_type} action \"{action}\"")]
    UnsupportedAction {
        event_type: EventType,
        action: String,
    },

    /// The issue was never opened through the bridge (or that event was lost).
    #[error("no ticket recorded for {0}")]
    CorrelationNotFound(CorrelationKey),

    /// The ticketing system understood the request and refused it.
    #[error("ticketing system refused to {operation}")]
    Refused { operation: TicketOperation },

    /// The ticketing system could not be reached or answered with an error.
    #[error("failed to {operation}")]
    Ticketing {
        operation: TicketOperation,
        #[source]
        source: TicketError,
    },

    /// An external call exceeded its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RouteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouteError::UnsupportedAction { .. } => ErrorKind::UnsupportedAction,
            RouteError::CorrelationNotFound(_) => ErrorKind::CorrelationNotFound,
            RouteError::Refused { operation } | RouteError::Ticketing { operation, .. } => {
                match operation {
                    TicketOperation::Connect | TicketOperation::Login => {
                        ErrorKind::AuthenticationFailed
                    }
                    TicketOperation::Create => ErrorKind::TicketCreationFailed,
                    TicketOperation::Reply => ErrorKind::ReplyFailed,
                    TicketOperation::Resolve => ErrorKind::ResolveFailed,
                }
            }
            RouteError::Timeout { .. } => ErrorKind::Timeout,
            RouteError::Store(e) => e.kind(),
        }
    }
}

/// What routing did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A ticket was created and recorded.
    TicketCreated { ticket: TicketId },
    /// The issue already had a ticket; nothing was created.
    AlreadyTracked { ticket: TicketId },
    /// A concurrent invocation recorded `kept` first; `orphan` was created
    /// but is not tracked.
    DuplicateTicket { kept: TicketId, orphan: TicketId },
    Replied { ticket: TicketId },
    Resolved { ticket: TicketId },
}

/// Settings shared by every routed event.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Requestor address on created tickets.
    pub requestor: String,
    /// Upper bound for each store or ticketing call.
    pub timeout: Duration,
}

/// Dispatches decoded events to ticket operations.
pub struct EventRouter<S, C> {
    store: S,
    connector: C,
    settings: RouterSettings,
}

impl<S, C> EventRouter<S, C>
where
    S: CorrelationStore,
    C: TicketingConnector,
{
    pub fn new(store: S, connector: C, settings: RouterSettings) -> Self {
        Self {
            store,
            connector,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Routes one event.
    pub async fn route(&self, envelope: &WebhookEnvelope) -> Result<RouteOutcome, RouteError> {
        match envelope {
            WebhookEnvelope::Issue(event) => match &event.action {
                IssueAction::Opened => self.open_ticket(event).await,
                IssueAction::Closed => self.resolve_ticket(event).await,
                IssueAction::Other(action) => Err(RouteError::UnsupportedAction {
                    event_type: EventType::Issues,
                    action: action.clone(),
                }),
            },
            WebhookEnvelope::IssueComment(event) => match &event.action {
                CommentAction::Created | CommentAction::Edited | CommentAction::Deleted => {
                    self.reply_with_comment(event).await
                }
                CommentAction::Other(action) => Err(RouteError::UnsupportedAction {
                    event_type: EventType::IssueComment,
                    action: action.clone(),
                }),
            },
        }
    }

    async fn open_ticket(&self, event: &IssueEvent) -> Result<RouteOutcome, RouteError> {
        let key = CorrelationKey::new(event.repository.full_name.clone(), event.issue.id);

        if let Some(ticket) = self.lookup(&key).await? {
            info!(%key, %ticket, "Issue already has a ticket; treating as redelivery");
            return Ok(RouteOutcome::AlreadyTracked { ticket });
        }

        info!(%key, "Creating ticket");
        let ticket = new_ticket(&self.settings.requestor, event);
        let created = self.run(TicketEffect::Create(ticket)).await?;
        let TicketResponse::Created(ticket) = created else {
            return Err(RouteError::Refused {
                operation: TicketOperation::Create,
            });
        };

        match session::bounded(self.settings.timeout, "store put", self.store.put(&key, ticket))
            .await??
        {
            PutOutcome::Inserted => {
                info!(%key, %ticket, "Stored ticket");
                Ok(RouteOutcome::TicketCreated { ticket })
            }
            PutOutcome::Existing(kept) => {
                warn!(
                    %key,
                    kept = %kept,
                    orphan = %ticket,
                    "Another delivery recorded a ticket first; created ticket is untracked"
                );
                Ok(RouteOutcome::DuplicateTicket {
                    kept,
                    orphan: ticket,
                })
            }
        }
    }

    async fn resolve_ticket(&self, event: &IssueEvent) -> Result<RouteOutcome, RouteError> {
        let key = CorrelationKey::new(event.repository.full_name.clone(), event.issue.id);
        let ticket = self.require_ticket(&key).await?;

        info!(%key, %ticket, "Resolving ticket");
        self.run(TicketEffect::Resolve { ticket }).await?;
        Ok(RouteOutcome::Resolved { ticket })
    }

    async fn reply_with_comment(
        &self,
        event: &IssueCommentEvent,
    ) -> Result<RouteOutcome, RouteError> {
        let key = CorrelationKey::new(event.repository.full_name.clone(), event.issue.id);
        let ticket = self.require_ticket(&key).await?;

        info!(%key, %ticket, comment_id = %event.comment.id, "Replying to ticket");
        let reply = comment_reply(event);
        self.run(TicketEffect::Reply { ticket, reply }).await?;
        Ok(RouteOutcome::Replied { ticket })
    }

    async fn lookup(&self, key: &CorrelationKey) -> Result<Option<TicketId>, RouteError> {
        Ok(session::bounded(self.settings.timeout, "store get", self.store.get(key)).await??)
    }

    async fn require_ticket(&self, key: &CorrelationKey) -> Result<TicketId, RouteError> {
        self.lookup(key)
            .await?
            .ok_or_else(|| RouteError::CorrelationNotFound(key.clone()))
    }

    async fn run(&self, effect: TicketEffect) -> Result<TicketResponse, RouteError> {
        session::run_effect(&self.connector, effect, self.settings.timeout).await
    }
}
