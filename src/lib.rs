//! Ticket Bridge - mirrors GitHub issue activity into an RT ticket queue.
//!
//! A signed `issues` or `issue_comment` webhook is verified, decoded, and
//! routed: opening an issue creates a ticket, comments become ticket
//! correspondence, and closing the issue resolves the ticket. The issue →
//! ticket mapping lives in a [`store::CorrelationStore`].

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod store;
pub mod tickets;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub mod test_utils;
