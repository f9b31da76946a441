//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC over the raw body)
//! - Typed event envelopes for `issues` and `issue_comment`
//! - Decoding with per-field validation

pub mod events;
pub mod parser;
pub mod signature;

pub use events::{
    Comment, CommentAction, EventType, Issue, IssueAction, IssueCommentEvent, IssueEvent,
    Repository, WebhookEnvelope,
};
pub use parser::{DecodeError, decode_webhook};
pub use signature::{
    SignatureAlgorithm, SignatureError, compute_signature, format_signature_header,
    parse_signature_header, verify_signature,
};
