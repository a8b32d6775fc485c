//! Call/subscribe wrappers used once a session is up.
//!
//! The plain variants act immediately.  The `_queued` variants route the
//! work through a [`CallQueue`] so that at most `queue.limit()` of them run
//! at once, in submission order.

use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use px_protocol::{EffectRequest, Event, RunEffectResult, RPC_RUN_EFFECT};
use serde_json::Value;

use crate::guard::{best_effort, best_effort_sync};
use crate::queue::CallQueue;
use crate::transport::{EventHandler, SessionHandle, Subscription};
use crate::types::SessionError;

/// Invoke `procedure` and return its result verbatim.
pub async fn call(
    session: &SessionHandle,
    procedure: &str,
    args: Vec<Value>,
) -> Result<Value, SessionError> {
    tracing::trace!(procedure = %procedure, "call");
    session.call(procedure, args).await
}

/// Same contract as [`call`], but the call only starts once `queue` admits
/// it.
///
/// The call is submitted when this function is invoked, not when the
/// returned future is first polled, so queue order follows call order.
pub fn call_queued(
    session: &SessionHandle,
    procedure: &str,
    args: Vec<Value>,
    queue: &CallQueue,
) -> impl Future<Output = Result<Value, SessionError>> + Send + 'static {
    let session = session.clone();
    let procedure = procedure.to_owned();
    let task = queue.submit(async move { call(&session, &procedure, args).await });
    task.map(|admitted| admitted.and_then(|result| result))
}

/// Subscribe `handler` to `topic`.
///
/// `handler` receives the positional arguments and the publisher's
/// address.  Errors and panics from the handler are swallowed so the next
/// message is still delivered.
pub async fn subscribe<F>(
    session: &SessionHandle,
    topic: &str,
    handler: F,
) -> Result<Subscription, SessionError>
where
    F: Fn(Vec<Value>, Option<String>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    let context: Arc<str> = Arc::from(topic);
    let on_event: EventHandler = Arc::new(move |event: Event| {
        best_effort_sync(&context, || handler(event.args, event.details.publisher_authid));
    });
    let sub = session.subscribe(topic, on_event).await?;
    tracing::debug!(topic = %topic, id = sub.id, "subscribed");
    Ok(sub)
}

/// Like [`subscribe`], but each delivery is handled as a task on `queue`
/// instead of inline.
pub async fn subscribe_queued<F, Fut>(
    session: &SessionHandle,
    topic: &str,
    handler: F,
    queue: &CallQueue,
) -> Result<Subscription, SessionError>
where
    F: Fn(Vec<Value>, Option<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let context: Arc<str> = Arc::from(topic);
    let queue = queue.clone();
    let on_event: EventHandler = Arc::new(move |event: Event| {
        let context = context.clone();
        let delivery = best_effort_sync(&context, || {
            Ok::<_, anyhow::Error>(handler(event.args, event.details.publisher_authid))
        });
        if let Some(fut) = delivery {
            queue.spawn(async move {
                best_effort(&context, fut).await;
            });
        }
    });
    let sub = session.subscribe(topic, on_event).await?;
    tracing::debug!(topic = %topic, id = sub.id, "subscribed (queued)");
    Ok(sub)
}

/// Run an effect through the well-known effect procedure.
pub async fn run_effect(
    session: &SessionHandle,
    request: EffectRequest,
) -> Result<RunEffectResult, SessionError> {
    run_effect_with(session, RPC_RUN_EFFECT, request).await
}

/// [`run_effect`] against an explicitly named procedure.
pub async fn run_effect_with(
    session: &SessionHandle,
    procedure: &str,
    request: EffectRequest,
) -> Result<RunEffectResult, SessionError> {
    let value = call(session, procedure, request.into_args()).await?;
    decode_effect(value)
}

/// [`run_effect`] admitted through `queue`.
pub fn run_effect_queued(
    session: &SessionHandle,
    request: EffectRequest,
    queue: &CallQueue,
) -> impl Future<Output = Result<RunEffectResult, SessionError>> + Send + 'static {
    run_effect_queued_with(session, RPC_RUN_EFFECT, request, queue)
}

/// [`run_effect_with`] admitted through `queue`.
pub fn run_effect_queued_with(
    session: &SessionHandle,
    procedure: &str,
    request: EffectRequest,
    queue: &CallQueue,
) -> impl Future<Output = Result<RunEffectResult, SessionError>> + Send + 'static {
    call_queued(session, procedure, request.into_args(), queue)
        .map(|result| result.and_then(decode_effect))
}

fn decode_effect(value: Value) -> Result<RunEffectResult, SessionError> {
    let result: RunEffectResult = serde_json::from_value(value)?;
    if let RunEffectResult::Failed(err) = &result {
        tracing::debug!(effect = %err.effect, key = %err.key, "effect reported an error");
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use px_protocol::{EventDetails, RemoteError};
    use serde_json::json;

    use crate::transport::Session;

    /// Echoes calls back and keeps subscriptions so tests can publish.
    #[derive(Default)]
    struct EchoSession {
        handlers: Mutex<Vec<EventHandler>>,
    }

    impl EchoSession {
        fn publish(&self, args: Vec<Value>, publisher: &str) {
            let handlers = self.handlers.lock().clone();
            for h in handlers {
                h(Event {
                    args: args.clone(),
                    details: EventDetails {
                        publisher_authid: Some(publisher.into()),
                        topic: None,
                    },
                    ..Default::default()
                });
            }
        }
    }

    #[async_trait::async_trait]
    impl Session for EchoSession {
        async fn call(&self, procedure: &str, args: Vec<Value>) -> Result<Value, RemoteError> {
            match procedure {
                "fail" => Err(RemoteError::new("app.error.failed", "no")),
                RPC_RUN_EFFECT => Ok(json!({"state": args[2].clone()})),
                _ => Ok(Value::Array(args)),
            }
        }

        async fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<Subscription, RemoteError> {
            self.handlers.lock().push(handler);
            Ok(Subscription { id: 7, topic: topic.into() })
        }

        async fn close(&self) -> Result<(), RemoteError> {
            Ok(())
        }
    }

    fn echo() -> (Arc<EchoSession>, SessionHandle) {
        let inner = Arc::new(EchoSession::default());
        let handle = SessionHandle::new(inner.clone(), "addr");
        (inner, handle)
    }

    #[tokio::test]
    async fn call_passes_remote_error_through() {
        let (_, s) = echo();
        assert_eq!(call(&s, "echo", vec![json!(1)]).await.unwrap(), json!([1]));
        match call(&s, "fail", vec![]).await {
            Err(SessionError::Remote(e)) => assert_eq!(e.uri, "app.error.failed"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn call_queued_returns_its_own_result() {
        let (_, s) = echo();
        let q = CallQueue::new(1);
        let a = call_queued(&s, "echo", vec![json!("a")], &q);
        let b = call_queued(&s, "echo", vec![json!("b")], &q);
        assert_eq!(b.await.unwrap(), json!(["b"]));
        assert_eq!(a.await.unwrap(), json!(["a"]));
    }

    #[tokio::test]
    async fn failing_handler_does_not_stop_delivery() {
        let (inner, s) = echo();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        subscribe(&s, "topic", move |args, publisher| {
            let n = args[0].as_i64().unwrap_or_default();
            if n == 1 {
                anyhow::bail!("bad message");
            }
            if n == 2 {
                panic!("worse message");
            }
            seen2.lock().push((n, publisher));
            Ok(())
        })
        .await
        .unwrap();

        inner.publish(vec![json!(1)], "p");
        inner.publish(vec![json!(2)], "p");
        inner.publish(vec![json!(3)], "p");
        assert_eq!(*seen.lock(), vec![(3, Some("p".to_string()))]);
    }

    #[tokio::test]
    async fn queued_subscription_handles_every_delivery() {
        let (inner, s) = echo();
        let q = CallQueue::new(1);
        let handled = Arc::new(AtomicUsize::new(0));
        let h = handled.clone();
        subscribe_queued(
            &s,
            "topic",
            move |args, _publisher| {
                let h = h.clone();
                async move {
                    if args.is_empty() {
                        anyhow::bail!("empty");
                    }
                    h.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), anyhow::Error>(())
                }
            },
            &q,
        )
        .await
        .unwrap();

        inner.publish(vec![json!(1)], "p");
        inner.publish(vec![], "p");
        inner.publish(vec![json!(2)], "p");
        q.idle().await;
        assert_eq!(handled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn run_effect_decodes_dispatch_result() {
        let (_, s) = echo();
        let req = EffectRequest::new(json!({}), "r", json!({"n": 1}), json!(null));
        let result = run_effect(&s, req.clone()).await.unwrap();
        assert!(!result.is_error());

        let q = CallQueue::new(1);
        let queued = run_effect_queued(&s, req, &q).await.unwrap();
        assert_eq!(queued, result);
    }

    #[tokio::test]
    async fn queued_effect_targets_named_procedure() {
        let (_, s) = echo();
        let q = CallQueue::new(1);
        let req = EffectRequest::new(json!({}), "sum", json!({"n": 2}), json!(null));

        // the echo session returns the raw args for anything but the default
        // effect procedure
        match run_effect_queued_with(&s, "deploy.effect.run", req, &q).await.unwrap() {
            RunEffectResult::Dispatched(result) => {
                assert_eq!(result.0[1], json!("sum"));
                assert_eq!(result.0[2], json!({"n": 2}));
            }
            other => panic!("expected dispatch, got {other:?}"),
        }
    }
}
