//! Decoded GitHub webhook events.
//!
//! The bridge handles two event types:
//!
//! - `issues` - issue lifecycle (opened, closed, ...)
//! - `issue_comment` - comments created, edited, or deleted on an issue
//!
//! Both carry the same repository/issue/sender context; comment events add the
//! comment itself. Envelopes are immutable once decoded.

use serde::{Deserialize, Serialize};

use crate::types::{CommentId, CorrelationKey, IssueId, IssueNumber};

/// The `X-GitHub-Event` values the bridge accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// `issues`
    Issues,
    /// `issue_comment`
    IssueComment,
}

impl EventType {
    /// Maps an `X-GitHub-Event` header value to an event type.
    pub fn from_header(value: &str) -> Option<Self> {
        match value {
            "issues" => Some(EventType::Issues),
            "issue_comment" => Some(EventType::IssueComment),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Issues => "issues",
            EventType::IssueComment => "issue_comment",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action on an `issues` event.
///
/// Actions the bridge does not route are kept verbatim in `Other` so the
/// router can name them when it rejects the event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueAction {
    Opened,
    Closed,
    Other(String),
}

impl IssueAction {
    pub fn parse(action: &str) -> Self {
        match action {
            "opened" => IssueAction::Opened,
            "closed" => IssueAction::Closed,
            other => IssueAction::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            IssueAction::Opened => "opened",
            IssueAction::Closed => "closed",
            IssueAction::Other(other) => other,
        }
    }
}

/// Action on an `issue_comment` event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentAction {
    Created,
    Edited,
    Deleted,
    Other(String),
}

impl CommentAction {
    pub fn parse(action: &str) -> Self {
        match action {
            "created" => CommentAction::Created,
            "edited" => CommentAction::Edited,
            "deleted" => CommentAction::Deleted,
            other => CommentAction::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CommentAction::Created => "created",
            CommentAction::Edited => "edited",
            CommentAction::Deleted => "deleted",
            CommentAction::Other(other) => other,
        }
    }
}

/// Repository the event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// `owner/name`
    pub full_name: String,
    /// Short name, used in ticket subjects.
    pub name: String,
}

/// The issue an event refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub number: IssueNumber,
    pub title: String,
    /// Empty when GitHub sends `null`.
    pub body: String,
    pub html_url: String,
}

/// A comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    /// Empty when GitHub sends `null`.
    pub body: String,
    pub html_url: String,
}

/// An `issues` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueEvent {
    pub action: IssueAction,
    pub repository: Repository,
    pub issue: Issue,
    /// Login of the user who triggered the event.
    pub sender: String,
}

/// An `issue_comment` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCommentEvent {
    pub action: CommentAction,
    pub repository: Repository,
    pub issue: Issue,
    pub comment: Comment,
    /// Login of the user who triggered the event.
    pub sender: String,
}

/// A decoded, validated webhook event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEnvelope {
    Issue(IssueEvent),
    IssueComment(IssueCommentEvent),
}

impl WebhookEnvelope {
    pub fn event_type(&self) -> EventType {
        match self {
            WebhookEnvelope::Issue(_) => EventType::Issues,
            WebhookEnvelope::IssueComment(_) => EventType::IssueComment,
        }
    }

    /// The raw action string.
    pub fn action(&self) -> &str {
        match self {
            WebhookEnvelope::Issue(e) => e.action.as_str(),
            WebhookEnvelope::IssueComment(e) => e.action.as_str(),
        }
    }

    pub fn repository(&self) -> &Repository {
        match self {
            WebhookEnvelope::Issue(e) => &e.repository,
            WebhookEnvelope::IssueComment(e) => &e.repository,
        }
    }

    pub fn issue(&self) -> &Issue {
        match self {
            WebhookEnvelope::Issue(e) => &e.issue,
            WebhookEnvelope::IssueComment(e) => &e.issue,
        }
    }

    /// The comment, for `issue_comment` events.
    pub fn comment(&self) -> Option<&Comment> {
        match self {
            WebhookEnvelope::Issue(_) => None,
            WebhookEnvelope::IssueComment(e) => Some(&e.comment),
        }
    }

    pub fn sender(&self) -> &str {
        match self {
            WebhookEnvelope::Issue(e) => &e.sender,
            WebhookEnvelope::IssueComment(e) => &e.sender,
        }
    }

    /// The key under which this issue's ticket is recorded.
    pub fn correlation_key(&self) -> CorrelationKey {
        CorrelationKey::new(self.repository().full_name.clone(), self.issue().id)
    }
}
