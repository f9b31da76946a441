//! Shared test doubles and payload builders.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use proptest::prelude::*;
use serde_json::{Value, json};

use crate::store::{CorrelationStore, PutOutcome, StoreError};
use crate::tickets::{
    NewTicket, TicketError, TicketReply, TicketingClient, TicketingConnector,
};
use crate::types::{CorrelationKey, TicketId};
use crate::webhooks::{SignatureAlgorithm, compute_signature, format_signature_header};

// =============================================================================
// Ticketing fake
// =============================================================================

/// A call made against [`FakeClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketCall {
    Login,
    Create(NewTicket),
    Reply(TicketId, TicketReply),
    Resolve(TicketId),
    Logout,
}

/// How [`FakeClient`] answers.
#[derive(Debug, Clone)]
pub struct FakeScript {
    pub connect_fails: bool,
    pub login_accepted: bool,
    /// Login fails with this HTTP status instead of answering.
    pub login_error: Option<u16>,
    pub create_accepted: bool,
    pub reply_accepted: bool,
    pub resolve_accepted: bool,
    pub logout_fails: bool,
    /// Ticket number handed out by the next successful create.
    pub next_ticket: u64,
    /// Delay before create, reply, or resolve answers.
    pub effect_delay: Option<Duration>,
}

impl Default for FakeScript {
    fn default() -> Self {
        FakeScript {
            connect_fails: false,
            login_accepted: true,
            login_error: None,
            create_accepted: true,
            reply_accepted: true,
            resolve_accepted: true,
            logout_fails: false,
            next_ticket: 1,
            effect_delay: None,
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    script: FakeScript,
    calls: Vec<TicketCall>,
}

/// Connector handing out [`FakeClient`]s that share one call log.
#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<FakeState>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, f: impl FnOnce(&mut FakeScript)) {
        f(&mut self.state.lock().unwrap().script);
    }

    pub fn calls(&self) -> Vec<TicketCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn create_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, TicketCall::Create(_)))
            .count()
    }
}

impl TicketingConnector for FakeConnector {
    type Client = FakeClient;

    fn connect(&self) -> Result<FakeClient, TicketError> {
        if self.state.lock().unwrap().script.connect_fails {
            return Err(TicketError::Config("fake connect failure".into()));
        }
        Ok(FakeClient {
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct FakeClient {
    state: Arc<Mutex<FakeState>>,
}

impl FakeClient {
    /// Records `call` and returns the script as it stood at that moment.
    fn record(&self, call: TicketCall) -> FakeScript {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state.script.clone()
    }

    async fn pause(script: &FakeScript) {
        if let Some(delay) = script.effect_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl TicketingClient for FakeClient {
    async fn login(&self) -> Result<bool, TicketError> {
        let script = self.record(TicketCall::Login);
        match script.login_error {
            Some(status) => Err(TicketError::HttpStatus { status }),
            None => Ok(script.login_accepted),
        }
    }

    async fn create(&self, ticket: &NewTicket) -> Result<Option<TicketId>, TicketError> {
        let script = self.record(TicketCall::Create(ticket.clone()));
        Self::pause(&script).await;
        if !script.create_accepted {
            return Ok(None);
        }
        let mut state = self.state.lock().unwrap();
        let id = TicketId(state.script.next_ticket);
        state.script.next_ticket += 1;
        Ok(Some(id))
    }

    async fn reply(&self, ticket: TicketId, reply: &TicketReply) -> Result<bool, TicketError> {
        let script = self.record(TicketCall::Reply(ticket, reply.clone()));
        Self::pause(&script).await;
        Ok(script.reply_accepted)
    }

    async fn resolve(&self, ticket: TicketId) -> Result<bool, TicketError> {
        let script = self.record(TicketCall::Resolve(ticket));
        Self::pause(&script).await;
        Ok(script.resolve_accepted)
    }

    async fn logout(&self) -> Result<(), TicketError> {
        let script = self.record(TicketCall::Logout);
        if script.logout_fails {
            return Err(TicketError::HttpStatus { status: 500 });
        }
        Ok(())
    }
}

// =============================================================================
// Store fake
// =============================================================================

/// A call made against [`RecordingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Get(CorrelationKey),
    Put(CorrelationKey, TicketId),
}

#[derive(Debug, Default)]
struct RecordingState {
    records: HashMap<CorrelationKey, TicketId>,
    calls: Vec<StoreCall>,
    fail: bool,
    delay: Option<Duration>,
    /// Inserted right after the next `get` answers, simulating a concurrent writer.
    pending: Option<(CorrelationKey, TicketId)>,
}

/// In-memory store that logs calls and can be made slow or unavailable.
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, key: CorrelationKey, ticket: TicketId) {
        self.state.lock().unwrap().records.insert(key, ticket);
    }

    pub fn seed_after_first_get(&self, key: CorrelationKey, ticket: TicketId) {
        self.state.lock().unwrap().pending = Some((key, ticket));
    }

    pub fn fail_all(&self) {
        self.state.lock().unwrap().fail = true;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn puts(&self) -> Vec<(CorrelationKey, TicketId)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Put(key, ticket) => Some((key, ticket)),
                StoreCall::Get(_) => None,
            })
            .collect()
    }

    pub fn get_now(&self, key: &CorrelationKey) -> Option<TicketId> {
        self.state.lock().unwrap().records.get(key).copied()
    }

    /// Logs `call`, then applies failure and delay settings.
    async fn enter(&self, call: StoreCall, operation: &'static str) -> Result<(), StoreError> {
        let (fail, delay) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            (state.fail, state.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(StoreError::unavailable(operation, "store offline"));
        }
        Ok(())
    }
}

impl CorrelationStore for RecordingStore {
    async fn get(&self, key: &CorrelationKey) -> Result<Option<TicketId>, StoreError> {
        self.enter(StoreCall::Get(key.clone()), "get").await?;
        let mut state = self.state.lock().unwrap();
        let found = state.records.get(key).copied();
        if let Some((pending_key, ticket)) = state.pending.take() {
            state.records.entry(pending_key).or_insert(ticket);
        }
        Ok(found)
    }

    async fn put(&self, key: &CorrelationKey, ticket: TicketId) -> Result<PutOutcome, StoreError> {
        self.enter(StoreCall::Put(key.clone(), ticket), "put").await?;
        let mut state = self.state.lock().unwrap();
        Ok(match state.records.get(key) {
            Some(existing) => PutOutcome::Existing(*existing),
            None => {
                state.records.insert(key.clone(), ticket);
                PutOutcome::Inserted
            }
        })
    }
}

// =============================================================================
// Log capture
// =============================================================================

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Installs a plain-text subscriber writing every level to a fresh buffer,
/// as the default for the current thread until the guard drops.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}

// =============================================================================
// Payloads
// =============================================================================

pub const TEST_SECRET: &[u8] = b"It's a Secret to Everybody";

/// An `issues` event body for issue id 1, number 1, in `o/r`.
pub fn issues_payload(action: &str) -> Value {
    json!({
        "action": action,
        "repository": { "full_name": "o/r", "name": "r" },
        "issue": {
            "id": 1,
            "number": 1,
            "title": "Bug",
            "body": "desc",
            "html_url": "https://github.com/o/r/issues/1"
        },
        "sender": { "login": "alice" }
    })
}

/// An `issue_comment` event body on the same issue as [`issues_payload`].
pub fn comment_payload(action: &str) -> Value {
    let mut payload = issues_payload(action);
    payload["comment"] = json!({
        "id": 42,
        "body": "me too",
        "html_url": "https://github.com/o/r/issues/1#issuecomment-42"
    });
    payload["sender"] = json!({ "login": "bob" });
    payload
}

/// `x-hub-signature-256` value for `body` under [`TEST_SECRET`].
pub fn sign(body: &[u8]) -> String {
    let algorithm = SignatureAlgorithm::Sha256;
    format_signature_header(algorithm, &compute_signature(algorithm, body, TEST_SECRET))
}

pub fn arb_event_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("issues".to_string()),
        Just("issue_comment".to_string()),
        "[a-z_]{1,20}",
    ]
}

pub fn arb_action() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("opened".to_string()),
        Just("closed".to_string()),
        Just("created".to_string()),
        Just("edited".to_string()),
        Just("deleted".to_string()),
        "[a-z_]{1,12}",
    ]
}
