//! The transport collaborator: what this crate needs from any messaging
//! substrate, plus [`SessionHandle`], the invalidatable wrapper the rest of
//! the crate hands out.

use std::sync::Arc;

use px_protocol::{CloseDetails, ConnectOptions, Event, OpenDetails, RemoteError};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::SessionError;

/// Callback invoked for every message delivered on a subscribed topic.
pub type EventHandler = Arc<dyn Fn(Event) + Send + Sync>;

/// A live router session.
///
/// Implementations are provided by the transport; this crate only calls,
/// subscribes and closes through it.
#[async_trait::async_trait]
pub trait Session: Send + Sync + 'static {
    /// Invoke a remote procedure with positional arguments.
    async fn call(&self, procedure: &str, args: Vec<Value>) -> Result<Value, RemoteError>;

    /// Register `handler` for every message published on `topic`.
    async fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<Subscription, RemoteError>;

    /// Leave the session.  The transport follows up with a close event.
    async fn close(&self) -> Result<(), RemoteError>;
}

/// A confirmed subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: u64,
    pub topic: String,
}

/// Lifecycle events emitted by a connection.
pub enum ConnectionEvent {
    Opened {
        session: Arc<dyn Session>,
        details: OpenDetails,
    },
    Closed {
        reason: String,
        details: CloseDetails,
    },
}

impl std::fmt::Debug for ConnectionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opened { details, .. } => f.debug_struct("Opened").field("details", details).finish(),
            Self::Closed { reason, details } => f
                .debug_struct("Closed")
                .field("reason", reason)
                .field("details", details)
                .finish(),
        }
    }
}

/// The transport could not even start a connection attempt.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Opens connections.
///
/// `connect` returns as soon as the attempt has started.  Handshake
/// rejections and network failures are reported later as
/// [`ConnectionEvent::Closed`] on the returned stream, never as an `Err`.
/// A transport that reconnects on its own may emit several open/close
/// pairs on the same stream.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(
        &self,
        options: ConnectOptions,
    ) -> Result<mpsc::Receiver<ConnectionEvent>, TransportError>;
}

// ── Session handle ───────────────────────────────────────────────────

/// Shared handle to one open session.
///
/// Once its connection reports closure the handle is invalid: calls fail
/// with [`SessionError::SessionClosed`] even though callers may still hold it.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<dyn Session>,
    authid: Arc<str>,
    closed: CancellationToken,
}

impl SessionHandle {
    pub fn new(session: Arc<dyn Session>, authid: impl Into<String>) -> Self {
        Self {
            inner: session,
            authid: Arc::from(authid.into()),
            closed: CancellationToken::new(),
        }
    }

    /// Router-confirmed address this session is authenticated as.
    pub fn authid(&self) -> &str {
        &self.authid
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the session has been invalidated.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.cancel();
    }

    pub async fn call(&self, procedure: &str, args: Vec<Value>) -> Result<Value, SessionError> {
        if self.is_closed() {
            return Err(SessionError::SessionClosed);
        }
        tokio::select! {
            result = self.inner.call(procedure, args) => Ok(result?),
            _ = self.closed.cancelled() => Err(SessionError::SessionClosed),
        }
    }

    pub async fn subscribe(
        &self,
        topic: &str,
        handler: EventHandler,
    ) -> Result<Subscription, SessionError> {
        if self.is_closed() {
            return Err(SessionError::SessionClosed);
        }
        Ok(self.inner.subscribe(topic, handler).await?)
    }

    /// Close the session and invalidate this handle (and all its clones).
    pub async fn close(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            return Ok(());
        }
        self.mark_closed();
        Ok(self.inner.close().await?)
    }

    /// `true` if both handles wrap the same underlying session.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("authid", &self.authid)
            .field("closed", &self.is_closed())
            .finish()
    }
}
