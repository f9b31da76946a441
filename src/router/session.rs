//! Scoped ticketing sessions.
//!
//! [`run_effect`] is the only way the router touches the ticketing system:
//! connect, log in, execute one effect, log out. Logout is attempted on every
//! path once a client exists, including login refusal, effect failure, and
//! timeouts. Logout problems are logged and never replace the effect's result.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::{RouteError, TicketOperation};
use crate::tickets::{TicketEffect, TicketResponse, TicketingClient, TicketingConnector};

/// Runs `fut` with a deadline, mapping expiry to [`RouteError::Timeout`].
pub(crate) async fn bounded<F: Future>(
    limit: Duration,
    operation: &'static str,
    fut: F,
) -> Result<F::Output, RouteError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| RouteError::Timeout {
            operation,
            after: limit,
        })
}

/// Executes one effect inside a fresh ticketing session.
pub(crate) async fn run_effect<C: TicketingConnector>(
    connector: &C,
    effect: TicketEffect,
    limit: Duration,
) -> Result<TicketResponse, RouteError> {
    let client = connector
        .connect()
        .map_err(|source| RouteError::Ticketing {
            operation: TicketOperation::Connect,
            source,
        })?;

    let result = login_and_execute(&client, effect, limit).await;
    release(&client, limit).await;
    result
}

async fn login_and_execute<T: TicketingClient>(
    client: &T,
    effect: TicketEffect,
    limit: Duration,
) -> Result<TicketResponse, RouteError> {
    match bounded(limit, "ticketing login", client.login()).await? {
        Ok(true) => debug!("Logged into ticketing system"),
        Ok(false) => {
            return Err(RouteError::Refused {
                operation: TicketOperation::Login,
            });
        }
        Err(source) => {
            return Err(RouteError::Ticketing {
                operation: TicketOperation::Login,
                source,
            });
        }
    }

    debug!(effect = effect.name(), "Executing ticket effect");
    execute(client, effect, limit).await
}

async fn execute<T: TicketingClient>(
    client: &T,
    effect: TicketEffect,
    limit: Duration,
) -> Result<TicketResponse, RouteError> {
    match effect {
        TicketEffect::Create(ticket) => {
            match bounded(limit, "ticketing create", client.create(&ticket)).await? {
                Ok(Some(id)) => Ok(TicketResponse::Created(id)),
                Ok(None) => Err(RouteError::Refused {
                    operation: TicketOperation::Create,
                }),
                Err(source) => Err(RouteError::Ticketing {
                    operation: TicketOperation::Create,
                    source,
                }),
            }
        }
        TicketEffect::Reply { ticket, reply } => {
            match bounded(limit, "ticketing reply", client.reply(ticket, &reply)).await? {
                Ok(true) => Ok(TicketResponse::Replied),
                Ok(false) => Err(RouteError::Refused {
                    operation: TicketOperation::Reply,
                }),
                Err(source) => Err(RouteError::Ticketing {
                    operation: TicketOperation::Reply,
                    source,
                }),
            }
        }
        TicketEffect::Resolve { ticket } => {
            match bounded(limit, "ticketing resolve", client.resolve(ticket)).await? {
                Ok(true) => Ok(TicketResponse::Resolved),
                Ok(false) => Err(RouteError::Refused {
                    operation: TicketOperation::Resolve,
                }),
                Err(source) => Err(RouteError::Ticketing {
                    operation: TicketOperation::Resolve,
                    source,
                }),
            }
        }
    }
}

async fn release<T: TicketingClient>(client: &T, limit: Duration) {
    match bounded(limit, "ticketing logout", client.logout()).await {
        Ok(Ok(())) => debug!("Logged out of ticketing system"),
        Ok(Err(e)) => warn!(error = %e, "Ticketing logout failed"),
        Err(e) => warn!(error = %e, "Ticketing logout did not complete"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::{FakeConnector, TicketCall};
    use crate::tickets::{NewTicket, TicketError, TicketReply};
    use crate::types::TicketId;

    const LIMIT: Duration = Duration::from_secs(5);

    fn new_ticket() -> NewTicket {
        NewTicket {
            requestor: "r@example.com".into(),
            subject: "[r] Bug".into(),
            text: "text".into(),
            attachments: vec![],
        }
    }

    #[tokio::test]
    async fn create_logs_in_and_out_around_effect() {
        let connector = FakeConnector::new();
        let response = run_effect(&connector, TicketEffect::Create(new_ticket()), LIMIT)
            .await
            .unwrap();

        assert_eq!(response, TicketResponse::Created(TicketId(1)));
        assert_eq!(
            connector.calls(),
            vec![
                TicketCall::Login,
                TicketCall::Create(new_ticket()),
                TicketCall::Logout
            ]
        );
    }

    #[tokio::test]
    async fn rejected_login_skips_effect_but_still_logs_out() {
        let connector = FakeConnector::new();
        connector.script(|s| s.login_accepted = false);

        let err = run_effect(&connector, TicketEffect::Resolve { ticket: TicketId(3) }, LIMIT)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert_eq!(connector.calls(), vec![TicketCall::Login, TicketCall::Logout]);
    }

    #[tokio::test]
    async fn login_transport_error_is_authentication_failure() {
        let connector = FakeConnector::new();
        connector.script(|s| s.login_error = Some(503));

        let err = run_effect(&connector, TicketEffect::Resolve { ticket: TicketId(3) }, LIMIT)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert!(matches!(
            err,
            RouteError::Ticketing {
                source: TicketError::HttpStatus { status: 503 },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn refused_effect_still_logs_out() {
        let connector = FakeConnector::new();
        connector.script(|s| s.reply_accepted = false);

        let effect = TicketEffect::Reply {
            ticket: TicketId(8),
            reply: TicketReply {
                text: "t".into(),
                attachments: vec![],
            },
        };
        let err = run_effect(&connector, effect, LIMIT).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ReplyFailed);
        assert_eq!(connector.calls().last(), Some(&TicketCall::Logout));
    }

    #[tokio::test]
    async fn connect_failure_makes_no_calls() {
        let connector = FakeConnector::new();
        connector.script(|s| s.connect_fails = true);

        let err = run_effect(&connector, TicketEffect::Create(new_ticket()), LIMIT)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert!(connector.calls().is_empty());
    }

    #[tokio::test]
    async fn slow_effect_times_out_and_logs_out() {
        let connector = FakeConnector::new();
        connector.script(|s| s.effect_delay = Some(Duration::from_millis(500)));

        let err = run_effect(
            &connector,
            TicketEffect::Create(new_ticket()),
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(matches!(
            err,
            RouteError::Timeout {
                operation: "ticketing create",
                ..
            }
        ));
        assert_eq!(connector.calls().last(), Some(&TicketCall::Logout));
    }

    #[tokio::test]
    async fn logout_failure_does_not_mask_result() {
        let connector = FakeConnector::new();
        connector.script(|s| s.logout_fails = true);

        let response = run_effect(&connector, TicketEffect::Resolve { ticket: TicketId(4) }, LIMIT)
            .await
            .unwrap();

        assert_eq!(response, TicketResponse::Resolved);
    }
}
