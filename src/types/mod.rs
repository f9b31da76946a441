//! Core domain types for the ticket bridge.

pub mod ids;

pub use ids::{CommentId, CorrelationKey, IssueId, IssueNumber, TicketId};
