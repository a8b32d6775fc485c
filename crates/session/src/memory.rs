//! In-process router and transport.
//!
//! [`MemoryRouter`] stands in for the real router: procedures are async
//! closures, topics fan out to every subscriber, and every call is logged.
//! [`MemoryTransport`] opens connections against it and lets the caller
//! decide when (and whether) each connection opens or closes.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use px_identity::{address_from_public_key_hex, network_version_of, verify};
use px_protocol::{
    uri, CloseDetails, ConnectOptions, Event, EventDetails, OpenDetails, RemoteError,
    ANONYMOUS_AUTHID, CHALLENGE_PREFIX,
};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::transport::{
    ConnectionEvent, EventHandler, Session, Subscription, Transport, TransportError,
};

type Procedure = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value, RemoteError>> + Send + Sync>;

const EVENT_BUFFER: usize = 16;

/// One call as the router saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub authid: String,
    pub procedure: String,
    pub args: Vec<Value>,
}

#[derive(Default)]
struct RouterState {
    procedures: HashMap<String, Procedure>,
    subscriptions: HashMap<String, Vec<(u64, EventHandler)>>,
    calls: Vec<RecordedCall>,
}

/// Shared in-process router.  Clones refer to the same router.
#[derive(Clone, Default)]
pub struct MemoryRouter {
    state: Arc<Mutex<RouterState>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the callee for `procedure`.
    pub fn register<F, Fut>(&self, procedure: impl Into<String>, callee: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RemoteError>> + Send + 'static,
    {
        let boxed: Procedure = Arc::new(move |args: Vec<Value>| callee(args).boxed());
        self.state.lock().procedures.insert(procedure.into(), boxed);
    }

    pub fn unregister(&self, procedure: &str) -> bool {
        self.state.lock().procedures.remove(procedure).is_some()
    }

    /// Deliver a message to every subscriber of `topic`.  Returns how many
    /// handlers were invoked.
    pub fn publish(&self, topic: &str, args: Vec<Value>, publisher: Option<&str>) -> usize {
        self.publish_with(topic, args, Map::new(), publisher)
    }

    pub fn publish_with(
        &self,
        topic: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        publisher: Option<&str>,
    ) -> usize {
        let handlers: Vec<EventHandler> = self
            .state
            .lock()
            .subscriptions
            .get(topic)
            .map(|subs| subs.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        for handler in &handlers {
            handler(Event {
                args: args.clone(),
                kwargs: kwargs.clone(),
                details: EventDetails {
                    publisher_authid: publisher.map(str::to_owned),
                    topic: Some(topic.to_owned()),
                },
            });
        }
        handlers.len()
    }

    /// Every call routed so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Calls routed to `procedure`, oldest first.
    pub fn calls_to(&self, procedure: &str) -> Vec<RecordedCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.procedure == procedure)
            .cloned()
            .collect()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.state
            .lock()
            .subscriptions
            .get(topic)
            .map_or(0, Vec::len)
    }

    async fn route_call(
        &self,
        authid: &str,
        procedure: &str,
        args: Vec<Value>,
    ) -> Result<Value, RemoteError> {
        let callee = {
            let mut state = self.state.lock();
            state.calls.push(RecordedCall {
                authid: authid.to_owned(),
                procedure: procedure.to_owned(),
                args: args.clone(),
            });
            state.procedures.get(procedure).cloned()
        };
        match callee {
            Some(callee) => callee(args).await,
            None => Err(RemoteError::no_such_procedure(procedure)),
        }
    }

    fn add_subscription(&self, topic: &str, handler: EventHandler) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.state
            .lock()
            .subscriptions
            .entry(topic.to_owned())
            .or_default()
            .push((id, handler));
        id
    }

    fn drop_subscriptions(&self, ids: &[u64]) {
        let mut state = self.state.lock();
        for subs in state.subscriptions.values_mut() {
            subs.retain(|(id, _)| !ids.contains(id));
        }
        state.subscriptions.retain(|_, subs| !subs.is_empty());
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// A session on a [`MemoryRouter`].
pub struct MemorySession {
    router: MemoryRouter,
    authid: String,
    events: mpsc::Sender<ConnectionEvent>,
    subscriptions: Mutex<Vec<u64>>,
    closed: AtomicBool,
}

impl MemorySession {
    fn leave(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let ids = std::mem::take(&mut *self.subscriptions.lock());
        self.router.drop_subscriptions(&ids);
        true
    }
}

#[async_trait::async_trait]
impl Session for MemorySession {
    async fn call(&self, procedure: &str, args: Vec<Value>) -> Result<Value, RemoteError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RemoteError::new(uri::CANCELED, "session closed"));
        }
        self.router.route_call(&self.authid, procedure, args).await
    }

    async fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<Subscription, RemoteError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RemoteError::new(uri::CANCELED, "session closed"));
        }
        let id = self.router.add_subscription(topic, handler);
        self.subscriptions.lock().push(id);
        Ok(Subscription {
            id,
            topic: topic.to_owned(),
        })
    }

    async fn close(&self) -> Result<(), RemoteError> {
        if self.leave() {
            let _ = self
                .events
                .send(ConnectionEvent::Closed {
                    reason: uri::CLOSE_NORMAL.into(),
                    details: CloseDetails::new(self.authid.clone()),
                })
                .await;
        }
        Ok(())
    }
}

// ── Transport ────────────────────────────────────────────────────────

struct Connection {
    options: ConnectOptions,
    events: mpsc::Sender<ConnectionEvent>,
    session: Option<Arc<MemorySession>>,
}

/// Transport that connects to a [`MemoryRouter`].
///
/// By default every connection opens immediately.  With
/// [`manual_open`](Self::manual_open) connections stay pending until
/// [`open`](Self::open) is called.
pub struct MemoryTransport {
    router: MemoryRouter,
    auto_open: bool,
    verify_challenges: bool,
    connections: Mutex<HashMap<String, Connection>>,
    history: Mutex<Vec<ConnectOptions>>,
    next_session: AtomicU64,
}

impl MemoryTransport {
    pub fn new(router: MemoryRouter) -> Self {
        Self {
            router,
            auto_open: true,
            verify_challenges: false,
            connections: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
            next_session: AtomicU64::new(0),
        }
    }

    /// Keep new connections pending until [`open`](Self::open).
    pub fn manual_open(mut self) -> Self {
        self.auto_open = false;
        self
    }

    /// Check every signed handshake: the signature must verify and the
    /// public key must hash to the claimed address.  Failures close the
    /// connection with `wamp.error.authentication_failed`.
    pub fn verify_challenges(mut self) -> Self {
        self.verify_challenges = true;
        self
    }

    pub fn router(&self) -> &MemoryRouter {
        &self.router
    }

    /// Options of every connection attempt, oldest first.
    pub fn connections(&self) -> Vec<ConnectOptions> {
        self.history.lock().clone()
    }

    /// Open the pending connection for `authid`.  Returns `false` if there
    /// is no connection or it is already open.
    pub async fn open(&self, authid: &str) -> bool {
        let (events, session) = {
            let mut connections = self.connections.lock();
            let Some(conn) = connections.get_mut(authid) else {
                return false;
            };
            if conn.session.as_ref().is_some_and(|s| !s.closed.load(Ordering::Acquire)) {
                return false;
            }
            let session = Arc::new(MemorySession {
                router: self.router.clone(),
                authid: conn.options.authid.clone(),
                events: conn.events.clone(),
                subscriptions: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            });
            conn.session = Some(session.clone());
            (conn.events.clone(), session)
        };

        let details = OpenDetails {
            authid: session.authid.clone(),
            authrole: Some(role_of(&session.authid).into()),
            session_id: Some(self.next_session.fetch_add(1, Ordering::Relaxed) + 1),
        };
        events
            .send(ConnectionEvent::Opened {
                session,
                details,
            })
            .await
            .is_ok()
    }

    /// Close the connection for `authid` from the router side.
    pub async fn close(&self, authid: &str, reason: &str) -> bool {
        let (events, session) = {
            let connections = self.connections.lock();
            let Some(conn) = connections.get(authid) else {
                return false;
            };
            (conn.events.clone(), conn.session.clone())
        };
        if let Some(session) = session {
            session.leave();
        }
        events
            .send(ConnectionEvent::Closed {
                reason: reason.to_owned(),
                details: CloseDetails::new(authid),
            })
            .await
            .is_ok()
    }

    /// Simulate a lost network connection.
    pub async fn drop_connection(&self, authid: &str) -> bool {
        self.close(authid, uri::CLOSE_LOST).await
    }

    fn check_handshake(options: &ConnectOptions) -> Result<(), String> {
        let extra = &options.authextra;
        if options.authid == ANONYMOUS_AUTHID {
            return Ok(());
        }
        let (Some(challenge), Some(signature), Some(public_key)) =
            (&extra.challenge, &extra.signature, &extra.public_key)
        else {
            return Err("missing challenge signature".into());
        };
        if !challenge.starts_with(CHALLENGE_PREFIX) {
            return Err("malformed challenge".into());
        }
        match verify(challenge, signature, public_key) {
            Ok(true) => {}
            Ok(false) => return Err("signature does not verify".into()),
            Err(e) => return Err(e.to_string()),
        }
        let version = network_version_of(&options.authid).map_err(|e| e.to_string())?;
        let derived = address_from_public_key_hex(public_key, version).map_err(|e| e.to_string())?;
        if derived != options.authid {
            return Err("public key does not match address".into());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn connect(
        &self,
        options: ConnectOptions,
    ) -> Result<mpsc::Receiver<ConnectionEvent>, TransportError> {
        if options.url.is_empty() {
            return Err(TransportError("empty url".into()));
        }
        self.history.lock().push(options.clone());

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let authid = options.authid.clone();

        if self.verify_challenges {
            if let Err(message) = Self::check_handshake(&options) {
                tracing::debug!(authid = %authid, error = %message, "handshake rejected");
                let mut details = CloseDetails::new(authid);
                details.message = Some(message);
                let _ = tx
                    .send(ConnectionEvent::Closed {
                        reason: uri::AUTHENTICATION_FAILED.into(),
                        details,
                    })
                    .await;
                return Ok(rx);
            }
        }

        let previous = self.connections.lock().insert(
            authid.clone(),
            Connection {
                options,
                events: tx,
                session: None,
            },
        );
        if let Some(session) = previous.and_then(|c| c.session) {
            session.leave();
        }

        if self.auto_open {
            self.open(&authid).await;
        }
        Ok(rx)
    }
}

fn role_of(authid: &str) -> &'static str {
    if authid == ANONYMOUS_AUTHID {
        "anonymous"
    } else {
        "ledger"
    }
}
