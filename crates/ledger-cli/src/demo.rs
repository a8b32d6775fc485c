//! Loopback demo: a full session lifecycle against an in-process router.
//!
//! The router answers the heartbeat and effect procedures and verifies
//! every signed handshake, so the demo exercises the same path a real
//! deployment would, minus the network.

use std::time::Duration;

use anyhow::Context;
use px_domain::config::Config;
use px_protocol::{EffectRequest, RemoteError, RunEffectResult};
use px_session::memory::{MemoryRouter, MemoryTransport};
use px_session::{call_queued, run_effect_with, subscribe, CallQueue, Ledger, SessionManagerBuilder};
use serde_json::{json, Value};
use tokio::sync::mpsc;

const DEMO_TOPIC: &str = "network.m0.praxis.demo.news";
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Procedures the loopback router serves.
fn loopback_router(config: &Config) -> MemoryRouter {
    let router = MemoryRouter::new();

    router.register(config.keepalive.procedure.clone(), |args: Vec<Value>| async move {
        Ok::<_, RemoteError>(json!({ "pong": args.first().cloned().unwrap_or(Value::Null) }))
    });

    router.register(config.dispatch.effect_procedure.clone(), |args: Vec<Value>| async move {
        let reducer = args.get(1).and_then(Value::as_str).unwrap_or_default();
        if reducer.trim().is_empty() {
            return Ok::<_, RemoteError>(json!({
                "msg": "reducer is empty",
                "token": "",
                "position": "0:0",
                "line": "",
                "key": "reducer",
                "effect": "demo"
            }));
        }
        Ok(json!({
            "reducer": reducer,
            "state": args.get(2).cloned().unwrap_or(Value::Null),
        }))
    });

    router
}

pub async fn run(config: Config, ledger: Ledger) -> anyhow::Result<()> {
    let router = loopback_router(&config);
    let transport = MemoryTransport::new(router.clone()).verify_challenges();
    let manager = SessionManagerBuilder::from_config(&config)
        .transport(transport)
        .build()?;

    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    manager
        .initialize(&ledger, move |session, address| {
            tracing::info!(address = %address, "session started");
            let _ = started_tx.send(session);
        })
        .await?;

    let session = tokio::time::timeout(OPEN_TIMEOUT, started_rx.recv())
        .await
        .context("router did not open the session")?
        .context("session start channel closed")?;
    println!("session open for {}", session.authid());

    subscribe(&session, DEMO_TOPIC, |args, publisher| {
        println!(
            "event from {}: {}",
            publisher.as_deref().unwrap_or("<unknown>"),
            Value::Array(args)
        );
        Ok(())
    })
    .await?;
    router.publish(DEMO_TOPIC, vec![json!("hello from the router")], Some("router"));

    let queue = CallQueue::new(config.dispatch.queue_concurrency);
    let pong = call_queued(
        &session,
        &config.keepalive.procedure,
        vec![json!(ledger.address())],
        &queue,
    )
    .await?;
    println!("heartbeat reply: {pong}");

    let request = EffectRequest::new(json!({ "name": "demo" }), "sum", json!({ "n": 1 }), json!({}));
    match run_effect_with(&session, manager.effect_procedure(), request).await? {
        RunEffectResult::Dispatched(result) => println!("effect dispatched: {}", result.0),
        RunEffectResult::Failed(err) => println!("effect failed: {err}"),
    }

    manager.shutdown_all().await;
    println!("{} call(s) routed", router.calls().len());
    Ok(())
}
