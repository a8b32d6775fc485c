//! `px-session` — per-ledger session lifecycle for the praxis router.
//!
//! Each ledger holds one authenticated, long-lived router session.  This
//! crate opens it, publishes it to callers that are waiting for it, keeps
//! it alive with periodic heartbeats, and provides the call/subscribe
//! wrappers (optionally funnelled through a bounded-concurrency queue)
//! that application code uses once the session is up.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  Your application                                         │
//! │                                                           │
//! │   let manager = SessionManagerBuilder::from_config(&cfg)  │
//! │       .transport(my_transport)                            │
//! │       .build()?;                                          │
//! │   let ledger = manager.ledger("my mnemonic")?;            │
//! │   manager.initialize(&ledger, |session, address| {        │
//! │       // subscribe / call                                 │
//! │   }).await?;                                              │
//! │   let session = manager.session(ledger.address()).await?;│
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Connection flow
//!
//! 1. Reset the ledger's registry entry (callers now wait on a fresh slot)
//! 2. Sign `challengeme-<unix millis>` with the ledger key (skipped for anonymous)
//! 3. Ask the [`Transport`] to connect with `authid` + `authextra`
//! 4. Start the keepalive loop for the ledger
//! 5. On open: resolve the registry slot, invoke the start callback
//! 6. On close: invalidate the session handle and reset the registry slot
//!
//! The manager never reconnects by itself.  Waiters on a closed ledger stay
//! suspended until someone calls [`SessionManager::initialize`] again, so
//! callers that need bounded waits wrap them in `tokio::time::timeout`.

pub mod builder;
pub mod dispatch;
pub mod guard;
pub mod keepalive;
pub mod manager;
pub mod memory;
pub mod queue;
pub mod registry;
pub mod transport;
pub mod types;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use builder::SessionManagerBuilder;
pub use dispatch::{
    call, call_queued, run_effect, run_effect_queued, run_effect_queued_with, run_effect_with,
    subscribe, subscribe_queued,
};
pub use guard::{best_effort, best_effort_sync};
pub use manager::SessionManager;
pub use queue::{CallQueue, QueuedTask};
pub use registry::{PendingSession, SessionRegistry};
pub use transport::{
    ConnectionEvent, EventHandler, Session, SessionHandle, Subscription, Transport,
    TransportError,
};
pub use types::{ConnectionState, SessionError};

// Re-export the identity and protocol types callers need alongside the manager.
pub use px_identity::Ledger;
pub use px_protocol::{EffectError, EffectRequest, RemoteError, RunEffectResult};
