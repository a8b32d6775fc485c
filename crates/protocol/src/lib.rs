//! Router-facing data types: handshake options, lifecycle details, remote
//! errors, and the fixed procedures this client calls.
//!
//! These types describe what crosses the transport boundary.  The wire
//! encoding itself belongs to whichever transport implementation is
//! plugged in; everything here is plain serde data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Address used by the keyless anonymous identity.
pub const ANONYMOUS_AUTHID: &str = "anonymous";

/// Fixed prefix of every handshake challenge (`challengeme-<unix millis>`).
pub const CHALLENGE_PREFIX: &str = "challengeme";

/// Heartbeat procedure.  Called with the caller's address as its only argument.
pub const RPC_PING: &str = "network.incentum.praxis.code.ping";

/// Effect execution procedure.  Called with `[template, reducer, state, form]`.
pub const RPC_RUN_EFFECT: &str = "network.m0.praxis.code.effect.run";

/// Well-known error and close URIs.
pub mod uri {
    pub const NO_SUCH_PROCEDURE: &str = "wamp.error.no_such_procedure";
    pub const AUTHENTICATION_FAILED: &str = "wamp.error.authentication_failed";
    pub const CANCELED: &str = "wamp.error.canceled";
    pub const RUNTIME_ERROR: &str = "wamp.error.runtime_error";
    pub const CLOSE_NORMAL: &str = "wamp.close.normal";
    pub const CLOSE_LOST: &str = "wamp.close.lost";
}

// ── Handshake ────────────────────────────────────────────────────────

/// Extra authentication data presented during the handshake.
///
/// `challenge`, `signature` and `public_key` are absent for the anonymous
/// identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthExtra {
    pub ledger: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(
        rename = "publicKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub public_key: Option<String>,
}

impl AuthExtra {
    /// `true` when no signed challenge is attached.
    pub fn is_unsigned(&self) -> bool {
        self.challenge.is_none() && self.signature.is_none() && self.public_key.is_none()
    }
}

/// Everything a transport needs to open one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    pub url: String,
    pub realm: String,
    pub authid: String,
    pub authextra: AuthExtra,
}

// ── Lifecycle details ────────────────────────────────────────────────

/// Details attached to a successful open.  `authid` is the identity the
/// router confirmed, which is what the registry is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenDetails {
    pub authid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authrole: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<u64>,
}

impl OpenDetails {
    pub fn new(authid: impl Into<String>) -> Self {
        Self {
            authid: authid.into(),
            authrole: None,
            session_id: None,
        }
    }
}

/// Details attached to a close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseDetails {
    pub authid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CloseDetails {
    pub fn new(authid: impl Into<String>) -> Self {
        Self {
            authid: authid.into(),
            message: None,
        }
    }
}

// ── Pub/sub ──────────────────────────────────────────────────────────

/// Per-message delivery metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_authid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

/// One message delivered on a subscribed topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    #[serde(default)]
    pub details: EventDetails,
}

// ── Errors ───────────────────────────────────────────────────────────

/// Opaque failure reported by the router or the remote callee.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{uri}: {message}")]
pub struct RemoteError {
    pub uri: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
}

impl RemoteError {
    pub fn new(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            message: message.into(),
            args: Vec::new(),
        }
    }

    pub fn no_such_procedure(procedure: &str) -> Self {
        Self::new(uri::NO_SUCH_PROCEDURE, format!("no callee registered for {procedure}"))
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }
}

// ── Effects ──────────────────────────────────────────────────────────

/// Arguments of one `run_effect` call.  Sent positionally as
/// `[template, reducer, state, form]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectRequest {
    pub template: Value,
    pub reducer: String,
    pub state: Value,
    pub form: Value,
}

impl EffectRequest {
    pub fn new(template: Value, reducer: impl Into<String>, state: Value, form: Value) -> Self {
        Self {
            template,
            reducer: reducer.into(),
            state,
            form,
        }
    }

    pub fn into_args(self) -> Vec<Value> {
        vec![self.template, Value::String(self.reducer), self.state, self.form]
    }
}

/// Structured failure returned by the effect procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectError {
    pub msg: String,
    pub token: String,
    pub position: String,
    pub line: String,
    pub key: String,
    pub effect: String,
}

impl std::fmt::Display for EffectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "effect {} failed at {} (key {}): {}",
            self.effect, self.position, self.key, self.msg
        )
    }
}

/// Normal dispatch result.  Its schema belongs to the application, so it
/// is carried as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DispatchResult(pub Value);

/// Outcome of `run_effect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunEffectResult {
    Failed(EffectError),
    Dispatched(DispatchResult),
}

impl RunEffectResult {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn into_result(self) -> Result<DispatchResult, EffectError> {
        match self {
            Self::Dispatched(r) => Ok(r),
            Self::Failed(e) => Err(e),
        }
    }
}
