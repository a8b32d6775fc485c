//! Integration tests: drive a real [`SessionManager`] against the
//! in-process router and check the lifecycle end to end.
//!
//! - the start callback fires once, with the router-confirmed address
//! - a closed connection leaves new waiters suspended and invalidates handles
//! - closure is per ledger
//! - superseded, shut-down and abandoned connections are closed and never
//!   touch the current registry entry
//! - keepalive cadence, failure tolerance and cancellation
//! - queued calls respect the concurrency limit and submission order
//! - subscription handlers cannot break delivery

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use px_identity::verify;
use px_protocol::{
    uri, CloseDetails, ConnectOptions, EffectRequest, OpenDetails, RemoteError, RunEffectResult,
    CHALLENGE_PREFIX, RPC_PING, RPC_RUN_EFFECT,
};
use px_session::memory::{MemoryRouter, MemoryTransport};
use px_session::{
    call_queued, run_effect, run_effect_queued, subscribe, subscribe_queued, CallQueue,
    ConnectionEvent, ConnectionState, EventHandler, Ledger, Session, SessionError, SessionHandle,
    SessionManager, SessionManagerBuilder, Subscription, Transport, TransportError,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;

// ── Helpers ─────────────────────────────────────────────────────────────

type Starts = mpsc::UnboundedReceiver<(SessionHandle, String)>;

fn manager_with(transport: Arc<MemoryTransport>) -> SessionManager {
    SessionManagerBuilder::new()
        .url("wss://router.test/ws")
        .transport_arc(transport)
        .build()
        .unwrap()
}

/// Initialize `ledger` and return a channel that receives every start
/// callback invocation.
async fn start(manager: &SessionManager, ledger: &Ledger) -> Starts {
    let (tx, rx) = mpsc::unbounded_channel();
    manager
        .initialize(ledger, move |session, address| {
            let _ = tx.send((session, address));
        })
        .await
        .unwrap();
    rx
}

async fn next_start(starts: &mut Starts) -> (SessionHandle, String) {
    tokio::time::timeout(Duration::from_secs(1), starts.recv())
        .await
        .expect("start callback did not fire")
        .expect("start channel closed")
}

async fn wait_for_state(manager: &SessionManager, address: &str, want: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while manager.state(address) != want {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{address} never reached {want}"));
}

async fn stays_pending(manager: &SessionManager, address: &str) -> bool {
    tokio::time::timeout(Duration::from_millis(100), manager.session(address))
        .await
        .is_err()
}

fn alpha() -> Ledger {
    Ledger::from_mnemonic("alpha", 23).unwrap()
}

// ── Open / close ────────────────────────────────────────────────────────

#[tokio::test]
async fn start_callback_fires_once_with_confirmed_address() {
    let router = MemoryRouter::new();
    let transport = Arc::new(MemoryTransport::new(router).verify_challenges());
    let manager = manager_with(transport.clone());
    let ledger = alpha();

    let mut starts = start(&manager, &ledger).await;
    let (session, address) = next_start(&mut starts).await;

    assert_eq!(address, ledger.address());
    assert_eq!(session.authid(), ledger.address());
    assert_eq!(manager.state(&address), ConnectionState::Open);

    let awaited = manager.session(&address).await.unwrap();
    assert!(awaited.same_session(&session));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(starts.try_recv().is_err(), "start callback fired twice");

    let attempts = transport.connections();
    assert_eq!(attempts.len(), 1);
    let ConnectOptions { authid, authextra, realm, .. } = &attempts[0];
    assert_eq!(authid, ledger.address());
    assert_eq!(realm, "realm-praxis");
    assert_eq!(authextra.ledger, ledger.address());
    let challenge = authextra.challenge.as_deref().unwrap();
    assert!(challenge.starts_with(&format!("{CHALLENGE_PREFIX}-")));
    assert!(verify(
        challenge,
        authextra.signature.as_deref().unwrap(),
        authextra.public_key.as_deref().unwrap(),
    )
    .unwrap());
}

#[tokio::test]
async fn waiter_before_open_resolves_on_open() {
    let transport = Arc::new(MemoryTransport::new(MemoryRouter::new()).manual_open());
    let manager = manager_with(transport.clone());
    let ledger = alpha();
    let _starts = start(&manager, &ledger).await;
    assert_eq!(manager.state(ledger.address()), ConnectionState::Connecting);

    let pending = manager.registry().pending(ledger.address()).unwrap();
    let waiter = tokio::spawn(pending.wait());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    assert!(transport.open(ledger.address()).await);
    let session = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.authid(), ledger.address());
}

#[tokio::test]
async fn close_suspends_new_waiters_and_invalidates_handle() {
    let router = MemoryRouter::new();
    router.register(RPC_PING, |_args: Vec<Value>| async { Ok::<_, RemoteError>(Value::Null) });
    let transport = Arc::new(MemoryTransport::new(router));
    let manager = manager_with(transport.clone());
    let ledger = alpha();

    let mut starts = start(&manager, &ledger).await;
    let (session, address) = next_start(&mut starts).await;
    session.call(RPC_PING, vec![json!(address)]).await.unwrap();

    assert!(transport.drop_connection(&address).await);
    wait_for_state(&manager, &address, ConnectionState::Closed).await;

    assert!(session.is_closed());
    assert!(matches!(
        session.call(RPC_PING, vec![]).await,
        Err(SessionError::SessionClosed)
    ));
    assert!(!manager.registry().is_resolved(&address));
    assert!(stays_pending(&manager, &address).await);

    // Nothing reconnects on its own.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.connections().len(), 1);
    assert_eq!(manager.state(&address), ConnectionState::Closed);
}

#[tokio::test]
async fn close_only_resets_the_closed_ledger() {
    let transport = Arc::new(MemoryTransport::new(MemoryRouter::new()));
    let manager = manager_with(transport.clone());
    let a = alpha();
    let b = manager.ledger("beta").unwrap();

    let mut sa = start(&manager, &a).await;
    let mut sb = start(&manager, &b).await;
    next_start(&mut sa).await;
    next_start(&mut sb).await;

    transport.close(a.address(), "wamp.close.system_shutdown").await;
    wait_for_state(&manager, a.address(), ConnectionState::Closed).await;

    assert!(!manager.registry().is_resolved(a.address()));
    assert!(manager.registry().is_resolved(b.address()));
    assert_eq!(manager.state(b.address()), ConnectionState::Open);
}

#[tokio::test]
async fn reinitialize_after_close_opens_again() {
    let transport = Arc::new(MemoryTransport::new(MemoryRouter::new()));
    let manager = manager_with(transport.clone());
    let ledger = alpha();

    let mut first = start(&manager, &ledger).await;
    let (old, _) = next_start(&mut first).await;
    transport.drop_connection(ledger.address()).await;
    wait_for_state(&manager, ledger.address(), ConnectionState::Closed).await;

    let mut second = start(&manager, &ledger).await;
    let (new, _) = next_start(&mut second).await;
    assert!(!new.same_session(&old));
    let awaited = manager.session(ledger.address()).await.unwrap();
    assert!(awaited.same_session(&new));
    assert_eq!(transport.connections().len(), 2);
}

#[tokio::test]
async fn anonymous_handshake_is_unsigned() {
    let transport = Arc::new(MemoryTransport::new(MemoryRouter::new()).verify_challenges());
    let manager = manager_with(transport.clone());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let ledger = manager
        .initialize_anonymous(move |s, a| {
            let _ = tx.send((s, a));
        })
        .await
        .unwrap();
    let (_, address) = next_start(&mut rx).await;

    assert!(ledger.is_anonymous());
    assert_eq!(address, "anonymous");
    let attempt = &transport.connections()[0];
    assert_eq!(attempt.authid, "anonymous");
    assert!(attempt.authextra.is_unsigned());
}

#[tokio::test]
async fn never_initialized_address_is_not_found() {
    let manager = manager_with(Arc::new(MemoryTransport::new(MemoryRouter::new())));
    assert!(matches!(
        manager.session("nobody").await,
        Err(SessionError::NotFound(a)) if a == "nobody"
    ));
    assert_eq!(manager.state("nobody"), ConnectionState::Uninitialized);
}

// ── Failure paths ───────────────────────────────────────────────────────

/// Breaks every signature before handing the attempt to a verifying
/// router.
struct Tampering(MemoryTransport);

#[async_trait::async_trait]
impl Transport for Tampering {
    async fn connect(
        &self,
        mut options: ConnectOptions,
    ) -> Result<mpsc::Receiver<ConnectionEvent>, TransportError> {
        options.authextra.signature = Some("00".repeat(64));
        self.0.connect(options).await
    }
}

#[tokio::test]
async fn rejected_handshake_leaves_waiters_suspended() {
    let inner = MemoryTransport::new(MemoryRouter::new()).verify_challenges();
    let manager = SessionManagerBuilder::new()
        .transport(Tampering(inner))
        .build()
        .unwrap();
    let ledger = alpha();

    let mut starts = start(&manager, &ledger).await;
    wait_for_state(&manager, ledger.address(), ConnectionState::Closed).await;

    assert!(stays_pending(&manager, ledger.address()).await);
    assert!(starts.try_recv().is_err());
}

struct Refusing;

#[async_trait::async_trait]
impl Transport for Refusing {
    async fn connect(
        &self,
        _options: ConnectOptions,
    ) -> Result<mpsc::Receiver<ConnectionEvent>, TransportError> {
        Err(TransportError("malformed endpoint".into()))
    }
}

#[tokio::test]
async fn refused_connection_surfaces_transport_error() {
    let manager = SessionManagerBuilder::new().transport(Refusing).build().unwrap();
    let err = manager.initialize(&alpha(), |_, _| {}).await.unwrap_err();
    assert!(matches!(err, SessionError::Transport(_)));
    assert_eq!(manager.state(alpha().address()), ConnectionState::Closed);
}

// ── Superseded and abandoned connections ────────────────────────────────

/// Session that only counts how often it was closed.
#[derive(Default)]
struct CountingSession {
    closes: AtomicUsize,
}

impl CountingSession {
    fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Session for CountingSession {
    async fn call(&self, _procedure: &str, _args: Vec<Value>) -> Result<Value, RemoteError> {
        Ok(Value::Null)
    }

    async fn subscribe(&self, topic: &str, _handler: EventHandler) -> Result<Subscription, RemoteError> {
        Ok(Subscription { id: 1, topic: topic.into() })
    }

    async fn close(&self) -> Result<(), RemoteError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands every connection attempt's event sender to the test.
#[derive(Default)]
struct Scripted {
    attempts: Mutex<Vec<mpsc::Sender<ConnectionEvent>>>,
}

impl Scripted {
    fn attempt(&self, n: usize) -> mpsc::Sender<ConnectionEvent> {
        self.attempts.lock()[n].clone()
    }

    /// Drop every sender, as a transport task that dies would.
    fn abandon_all(&self) {
        self.attempts.lock().clear();
    }
}

#[async_trait::async_trait]
impl Transport for Scripted {
    async fn connect(
        &self,
        _options: ConnectOptions,
    ) -> Result<mpsc::Receiver<ConnectionEvent>, TransportError> {
        let (tx, rx) = mpsc::channel(8);
        self.attempts.lock().push(tx);
        Ok(rx)
    }
}

fn scripted_manager(transport: Arc<Scripted>) -> SessionManager {
    SessionManagerBuilder::new()
        .transport_arc(transport)
        .build()
        .unwrap()
}

async fn send_open(tx: &mpsc::Sender<ConnectionEvent>, session: &Arc<CountingSession>, authid: &str) {
    let session: Arc<dyn Session> = session.clone();
    tx.send(ConnectionEvent::Opened {
        session,
        details: OpenDetails::new(authid),
    })
    .await
    .unwrap();
}

async fn send_close(tx: &mpsc::Sender<ConnectionEvent>, authid: &str) {
    tx.send(ConnectionEvent::Closed {
        reason: uri::CLOSE_LOST.into(),
        details: CloseDetails::new(authid),
    })
    .await
    .unwrap();
}

async fn wait_for_closes(session: &CountingSession, want: usize) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while session.closes() < want {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("session closed {} time(s), want {want}", session.closes()));
}

#[tokio::test]
async fn superseded_attempt_events_leave_current_attempt_alone() {
    let transport = Arc::new(Scripted::default());
    let manager = scripted_manager(transport.clone());
    let ledger = alpha();
    let address = ledger.address();

    let mut first = start(&manager, &ledger).await;
    let mut second = start(&manager, &ledger).await;
    let (old_tx, new_tx) = (transport.attempt(0), transport.attempt(1));

    let current = Arc::new(CountingSession::default());
    send_open(&new_tx, &current, address).await;
    let (live, _) = next_start(&mut second).await;

    let stale = Arc::new(CountingSession::default());
    send_open(&old_tx, &stale, address).await;
    wait_for_closes(&stale, 1).await;
    send_close(&old_tx, address).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(first.try_recv().is_err(), "superseded attempt ran its start callback");
    assert_eq!(manager.state(address), ConnectionState::Open);
    let awaited = manager.session(address).await.unwrap();
    assert!(awaited.same_session(&live));
    assert!(!live.is_closed());
    assert_eq!(current.closes(), 0);
}

#[tokio::test]
async fn open_after_shutdown_is_closed_and_not_registered() {
    let transport = Arc::new(Scripted::default());
    let manager = scripted_manager(transport.clone());
    let ledger = alpha();

    let mut starts = start(&manager, &ledger).await;
    assert!(manager.shutdown(ledger.address()).await.unwrap());

    let late = Arc::new(CountingSession::default());
    send_open(&transport.attempt(0), &late, ledger.address()).await;
    wait_for_closes(&late, 1).await;

    assert!(starts.try_recv().is_err());
    assert_eq!(manager.state(ledger.address()), ConnectionState::Closed);
    assert!(!manager.registry().is_resolved(ledger.address()));
}

#[tokio::test]
async fn reinitialize_closes_the_open_session() {
    let transport = Arc::new(Scripted::default());
    let manager = scripted_manager(transport.clone());
    let ledger = alpha();

    let mut first = start(&manager, &ledger).await;
    let open = Arc::new(CountingSession::default());
    send_open(&transport.attempt(0), &open, ledger.address()).await;
    let (old, _) = next_start(&mut first).await;

    let _second = start(&manager, &ledger).await;
    assert_eq!(open.closes(), 1);
    assert!(old.is_closed());
    assert_eq!(manager.state(ledger.address()), ConnectionState::Connecting);
    assert!(stays_pending(&manager, ledger.address()).await);
}

#[tokio::test]
async fn event_stream_ending_without_close_counts_as_closed() {
    let transport = Arc::new(Scripted::default());
    let manager = scripted_manager(transport.clone());
    let ledger = alpha();

    let mut starts = start(&manager, &ledger).await;
    send_open(&transport.attempt(0), &Arc::new(CountingSession::default()), ledger.address()).await;
    let (session, _) = next_start(&mut starts).await;

    transport.abandon_all();
    wait_for_state(&manager, ledger.address(), ConnectionState::Closed).await;

    assert!(session.is_closed());
    assert!(!manager.registry().is_resolved(ledger.address()));
    assert!(stays_pending(&manager, ledger.address()).await);
}

#[tokio::test]
async fn reopen_without_close_registers_the_new_session() {
    let transport = Arc::new(Scripted::default());
    let manager = scripted_manager(transport.clone());
    let ledger = alpha();

    let mut starts = start(&manager, &ledger).await;
    let tx = transport.attempt(0);
    send_open(&tx, &Arc::new(CountingSession::default()), ledger.address()).await;
    let (first, _) = next_start(&mut starts).await;
    send_open(&tx, &Arc::new(CountingSession::default()), ledger.address()).await;
    let (second, _) = next_start(&mut starts).await;

    assert!(first.is_closed());
    assert!(!second.is_closed());
    let awaited = manager.session(ledger.address()).await.unwrap();
    assert!(awaited.same_session(&second));
}

// ── Keepalive ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn keepalive_pings_every_interval_and_survives_failures() {
    let router = MemoryRouter::new();
    let pings = Arc::new(AtomicUsize::new(0));
    let counter = pings.clone();
    router.register(RPC_PING, move |_args: Vec<Value>| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                return Err(RemoteError::new("app.error.busy", "first ping fails"));
            }
            Ok(Value::Null)
        }
    });
    let transport = Arc::new(MemoryTransport::new(router.clone()));
    let manager = manager_with(transport);
    let ledger = alpha();
    let mut starts = start(&manager, &ledger).await;
    next_start(&mut starts).await;

    tokio::time::sleep(Duration::from_secs(61)).await;

    let calls = router.calls_to(RPC_PING);
    assert_eq!(calls.len(), 3);
    for call in &calls {
        assert_eq!(call.args, vec![json!(ledger.address())]);
        assert_eq!(call.authid, ledger.address());
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_keepalive_and_closes_session() {
    let router = MemoryRouter::new();
    let transport = Arc::new(MemoryTransport::new(router.clone()));
    let manager = manager_with(transport);
    let ledger = alpha();
    let mut starts = start(&manager, &ledger).await;
    let (session, _) = next_start(&mut starts).await;

    tokio::time::sleep(Duration::from_secs(21)).await;
    assert_eq!(router.calls_to(RPC_PING).len(), 1);

    assert!(manager.shutdown(ledger.address()).await.unwrap());
    assert!(session.is_closed());
    assert_eq!(manager.state(ledger.address()), ConnectionState::Closed);

    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(router.calls_to(RPC_PING).len(), 1);
    assert!(!manager.shutdown("nobody").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn reinitialize_replaces_previous_keepalive() {
    let router = MemoryRouter::new();
    let transport = Arc::new(MemoryTransport::new(router.clone()));
    let manager = manager_with(transport);
    let ledger = alpha();

    let mut first = start(&manager, &ledger).await;
    next_start(&mut first).await;
    let mut second = start(&manager, &ledger).await;
    next_start(&mut second).await;

    tokio::time::sleep(Duration::from_secs(41)).await;
    assert_eq!(router.calls_to(RPC_PING).len(), 2);
}

// ── Dispatch ────────────────────────────────────────────────────────────

async fn open_session(router: &MemoryRouter) -> (SessionManager, SessionHandle) {
    let manager = manager_with(Arc::new(MemoryTransport::new(router.clone())));
    let mut starts = start(&manager, &alpha()).await;
    let (session, _) = next_start(&mut starts).await;
    (manager, session)
}

#[tokio::test(start_paused = true)]
async fn queued_calls_with_limit_one_run_in_order() {
    let router = MemoryRouter::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    router.register("work.slow", move |args: Vec<Value>| {
        let sink = sink.clone();
        async move {
            let id = args[0].clone();
            sink.lock().push(format!("start {id}"));
            tokio::time::sleep(Duration::from_millis(100)).await;
            sink.lock().push(format!("end {id}"));
            Ok::<_, RemoteError>(id)
        }
    });
    let (_manager, session) = open_session(&router).await;
    let queue = CallQueue::new(1);

    let calls: Vec<_> = (1..=3)
        .map(|i| call_queued(&session, "work.slow", vec![json!(i)], &queue))
        .collect();
    let mut results = Vec::new();
    for c in calls {
        results.push(c.await.unwrap());
    }

    assert_eq!(results, vec![json!(1), json!(2), json!(3)]);
    assert_eq!(
        *log.lock(),
        vec!["start 1", "end 1", "start 2", "end 2", "start 3", "end 3"]
    );
}

#[tokio::test(start_paused = true)]
async fn queued_burst_never_exceeds_limit() {
    let router = MemoryRouter::new();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (r, p) = (running.clone(), peak.clone());
    router.register("work.track", move |_args: Vec<Value>| {
        let (r, p) = (r.clone(), p.clone());
        async move {
            let now = r.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            r.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, RemoteError>(Value::Null)
        }
    });
    let (_manager, session) = open_session(&router).await;
    let queue = CallQueue::new(2);

    let calls: Vec<_> = (0..8)
        .map(|_| call_queued(&session, "work.track", vec![], &queue))
        .collect();
    for c in calls {
        c.await.unwrap();
    }
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(router.calls_to("work.track").len(), 8);
}

#[tokio::test]
async fn remote_errors_reach_the_caller_verbatim() {
    let router = MemoryRouter::new();
    router.register("app.deny", |_args: Vec<Value>| async {
        Err::<Value, _>(RemoteError::new("app.error.denied", "not yours").with_args(vec![json!(7)]))
    });
    let (_manager, session) = open_session(&router).await;

    match session.call("app.deny", vec![]).await {
        Err(SessionError::Remote(e)) => {
            assert_eq!(e.uri, "app.error.denied");
            assert_eq!(e.args, vec![json!(7)]);
        }
        other => panic!("expected remote error, got {other:?}"),
    }
    match session.call("app.missing", vec![]).await {
        Err(SessionError::Remote(e)) => assert_eq!(e.uri, uri::NO_SUCH_PROCEDURE),
        other => panic!("expected remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn throwing_handler_does_not_interrupt_delivery() {
    let router = MemoryRouter::new();
    let (_manager, session) = open_session(&router).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    subscribe(&session, "ledger.news", move |args, publisher| {
        match args.first().and_then(Value::as_str) {
            Some("error") => anyhow::bail!("handler rejected message"),
            Some("panic") => panic!("handler blew up"),
            _ => {}
        }
        sink.lock().push((args, publisher));
        Ok(())
    })
    .await
    .unwrap();

    router.publish("ledger.news", vec![json!("error")], Some("bob"));
    router.publish("ledger.news", vec![json!("panic")], Some("bob"));
    router.publish("ledger.news", vec![json!("ok")], Some("carol"));

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], (vec![json!("ok")], Some("carol".to_string())));
}

#[tokio::test]
async fn queued_subscription_drains_on_idle() {
    let router = MemoryRouter::new();
    let (_manager, session) = open_session(&router).await;
    let queue = CallQueue::new(1);

    let order = Arc::new(Mutex::new(Vec::new()));
    let sink = order.clone();
    subscribe_queued(
        &session,
        "ledger.jobs",
        move |args, _publisher| {
            let sink = sink.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                sink.lock().push(args[0].clone());
                Ok::<(), anyhow::Error>(())
            }
        },
        &queue,
    )
    .await
    .unwrap();

    for i in 0..4 {
        router.publish("ledger.jobs", vec![json!(i)], None);
    }
    queue.idle().await;
    assert_eq!(*order.lock(), vec![json!(0), json!(1), json!(2), json!(3)]);
}

#[tokio::test]
async fn run_effect_distinguishes_effect_errors() {
    let router = MemoryRouter::new();
    router.register(RPC_RUN_EFFECT, |args: Vec<Value>| async move {
        if args[1] == json!("broken") {
            return Ok::<_, RemoteError>(json!({
                "msg": "unexpected end of input",
                "token": "EOF",
                "position": "1:9",
                "line": "reduce = ",
                "key": "reducer",
                "effect": "transfer"
            }));
        }
        Ok(json!({"state": args[2].clone()}))
    });
    let (_manager, session) = open_session(&router).await;

    let ok = run_effect(
        &session,
        EffectRequest::new(json!({}), "sum", json!({"n": 1}), json!({})),
    )
    .await
    .unwrap();
    assert!(matches!(ok, RunEffectResult::Dispatched(_)));

    let queue = CallQueue::new(1);
    let failed = run_effect_queued(
        &session,
        EffectRequest::new(json!({}), "broken", json!({}), json!({})),
        &queue,
    )
    .await
    .unwrap();
    let err = failed.into_result().unwrap_err();
    assert_eq!(err.effect, "transfer");
    assert_eq!(err.position, "1:9");

    let sent = router.calls_to(RPC_RUN_EFFECT);
    assert_eq!(sent[0].args.len(), 4);
    assert_eq!(sent[0].args[1], json!("sum"));
}
