//! Core types: connection state and the crate error.

use px_identity::IdentityError;
use px_protocol::RemoteError;

use crate::transport::TransportError;

/// Lifecycle state of one ledger's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// `initialize` has never been called for this ledger.
    Uninitialized,
    /// A connection attempt is in flight; the registry slot is unresolved.
    Connecting,
    /// The router accepted the handshake; the registry slot is resolved.
    Open,
    /// The connection closed.  Nothing reopens it automatically.
    Closed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level session error.
///
/// Identity, configuration and lookup failures surface to the immediate
/// caller.  Remote errors are passed through verbatim.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("identity: {0}")]
    Identity(#[from] IdentityError),
    #[error("session not found for {0}")]
    NotFound(String),
    #[error("remote: {0}")]
    Remote(#[from] RemoteError),
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("session closed")]
    SessionClosed,
    #[error("queue closed")]
    QueueClosed,
    #[error("queued task panicked")]
    TaskPanicked,
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("config: {0}")]
    Config(String),
}
