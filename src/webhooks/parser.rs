//! GitHub webhook payload decoder.
//!
//! Turns a verified request body into a typed [`WebhookEnvelope`].
//!
//! # Decoding Strategy
//!
//! 1. The event type is determined from the `X-GitHub-Event` header; anything
//!    other than `issues` or `issue_comment` is rejected
//! 2. The body is parsed as a JSON object
//! 3. The object is deserialized into the raw payload structs below; the
//!    first failure is reported with its dotted path (`issue.title`)
//! 4. Unknown actions decode into `Other(..)` and are rejected by the router,
//!    not here
//!
//! Extra fields in the payload are ignored.

use serde::Deserialize;
use serde_json::Value;
use serde_path_to_error::Segment;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::types::{CommentId, IssueId, IssueNumber};

use super::events::{
    Comment, CommentAction, EventType, Issue, IssueAction, IssueCommentEvent, IssueEvent,
    Repository, WebhookEnvelope,
};

/// Error type for webhook decoding failures.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The `X-GitHub-Event` value is not handled by the bridge.
    #[error("GitHub event type \"{0}\" is not handled")]
    UnrecognizedEventType(String),

    /// The body is not valid JSON.
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The body is valid JSON but not an object.
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// A required field is absent.
    #[error("missing required field `{field}`")]
    MissingField { field: String },

    /// A required field is present with the wrong JSON type.
    #[error("field `{field}` must be {expected}")]
    WrongType { field: String, expected: String },

    /// Any other rejection of a field's value.
    #[error("invalid field value for {field}: {message}")]
    InvalidField { field: String, message: String },
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::UnrecognizedEventType(_) => ErrorKind::UnrecognizedEventType,
            DecodeError::InvalidJson(_)
            | DecodeError::NotAnObject
            | DecodeError::MissingField { .. }
            | DecodeError::WrongType { .. }
            | DecodeError::InvalidField { .. } => ErrorKind::MalformedPayload,
        }
    }
}

/// Decodes a webhook payload into a typed envelope.
///
/// # Arguments
///
/// * `event_type` - The value of the `X-GitHub-Event` header
/// * `payload` - The raw JSON payload bytes (already signature-verified)
///
/// # Examples
///
/// ```
/// use ticket_bridge::webhooks::{WebhookEnvelope, decode_webhook};
///
/// let payload = br#"{
///     "action": "opened",
///     "issue": {
///         "id": 1, "number": 1, "title": "Bug", "body": "desc",
///         "html_url": "https://github.com/o/r/issues/1"
///     },
///     "repository": { "full_name": "o/r", "name": "r" },
///     "sender": { "login": "alice" }
/// }"#;
///
/// let envelope = decode_webhook("issues", payload).unwrap();
/// assert!(matches!(envelope, WebhookEnvelope::Issue(_)));
/// ```
pub fn decode_webhook(event_type: &str, payload: &[u8]) -> Result<WebhookEnvelope, DecodeError> {
    let event_type = EventType::from_header(event_type)
        .ok_or_else(|| DecodeError::UnrecognizedEventType(event_type.to_string()))?;

    let value: Value = serde_json::from_slice(payload)?;
    if !value.is_object() {
        return Err(DecodeError::NotAnObject);
    }

    match event_type {
        EventType::Issues => {
            let raw: RawIssuesPayload = deserialize(value)?;
            Ok(WebhookEnvelope::Issue(raw.into()))
        }
        EventType::IssueComment => {
            let raw: RawIssueCommentPayload = deserialize(value)?;
            Ok(WebhookEnvelope::IssueComment(raw.into()))
        }
    }
}

// ============================================================================
// Raw payload structures for deserialization
//
// These match the parts of GitHub's webhook JSON the bridge reads. Bodies are
// required but nullable: `Option::deserialize` keeps the key mandatory while
// accepting `null`.
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawIssuesPayload {
    action: String,
    issue: RawIssue,
    repository: RawRepository,
    sender: RawSender,
}

#[derive(Debug, Deserialize)]
struct RawIssueCommentPayload {
    action: String,
    issue: RawIssue,
    comment: RawComment,
    repository: RawRepository,
    sender: RawSender,
}

#[derive(Debug, Deserialize)]
#[serde(expecting = "an object")]
struct RawIssue {
    id: u64,
    number: u64,
    title: String,
    #[serde(deserialize_with = "Option::deserialize")]
    body: Option<String>,
    html_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(expecting = "an object")]
struct RawComment {
    id: u64,
    #[serde(deserialize_with = "Option::deserialize")]
    body: Option<String>,
    html_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(expecting = "an object")]
struct RawRepository {
    full_name: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(expecting = "an object")]
struct RawSender {
    login: String,
}

impl From<RawIssuesPayload> for IssueEvent {
    fn from(raw: RawIssuesPayload) -> Self {
        IssueEvent {
            action: IssueAction::parse(&raw.action),
            repository: raw.repository.into(),
            issue: raw.issue.into(),
            sender: raw.sender.login,
        }
    }
}

impl From<RawIssueCommentPayload> for IssueCommentEvent {
    fn from(raw: RawIssueCommentPayload) -> Self {
        IssueCommentEvent {
            action: CommentAction::parse(&raw.action),
            repository: raw.repository.into(),
            issue: raw.issue.into(),
            comment: raw.comment.into(),
            sender: raw.sender.login,
        }
    }
}

impl From<RawIssue> for Issue {
    fn from(raw: RawIssue) -> Self {
        Issue {
            id: IssueId(raw.id),
            number: IssueNumber(raw.number),
            title: raw.title,
            body: raw.body.unwrap_or_default(),
            html_url: raw.html_url,
        }
    }
}

impl From<RawComment> for Comment {
    fn from(raw: RawComment) -> Self {
        Comment {
            id: CommentId(raw.id),
            body: raw.body.unwrap_or_default(),
            html_url: raw.html_url,
        }
    }
}

impl From<RawRepository> for Repository {
    fn from(raw: RawRepository) -> Self {
        Repository {
            full_name: raw.full_name,
            name: raw.name,
        }
    }
}

// ============================================================================
// Error paths
// ============================================================================

/// Deserializes `value`, naming the dotted path of the first bad field.
fn deserialize<T>(value: Value) -> Result<T, DecodeError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_path_to_error::deserialize(value).map_err(|err| {
        let path = dotted_path(err.path());
        field_error(path, &err.into_inner().to_string())
    })
}

fn dotted_path(path: &serde_path_to_error::Path) -> String {
    path.iter()
        .map(|segment| match segment {
            Segment::Seq { index } => index.to_string(),
            Segment::Map { key } => key.clone(),
            Segment::Enum { variant } => variant.clone(),
            Segment::Unknown => "?".to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Classifies a serde message reported at `path`.
///
/// A missing field is reported at its parent, so the field name is appended.
fn field_error(path: String, message: &str) -> DecodeError {
    if let Some(rest) = message.strip_prefix("missing field `") {
        let name = rest.split('`').next().unwrap_or(rest);
        let field = if path.is_empty() {
            name.to_string()
        } else {
            format!("{path}.{name}")
        };
        return DecodeError::MissingField { field };
    }

    if path.is_empty() {
        return DecodeError::NotAnObject;
    }

    match message.rsplit_once(", expected ") {
        Some((_, expected)) => DecodeError::WrongType {
            field: path,
            expected: describe_expected(expected),
        },
        None => DecodeError::InvalidField {
            field: path,
            message: message.to_string(),
        },
    }
}

fn describe_expected(expected: &str) -> String {
    match expected {
        "u64" => "a non-negative integer".to_string(),
        other => other.to_string(),
    }
}
