//! Per-ledger connection lifecycle.
//!
//! [`SessionManager::initialize`] opens one connection for a ledger and
//! then drives it from the transport's event stream:
//!
//! ```text
//! Uninitialized ──initialize──▶ Connecting ──open──▶ Open ──close──▶ Closed
//!                                   ▲                                   │
//!                                   └──────────── initialize ───────────┘
//! ```
//!
//! Nothing moves from `Closed` back to `Connecting` except another call
//! to `initialize`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use px_identity::{Challenge, Ledger};
use px_protocol::{AuthExtra, ConnectOptions};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::guard::best_effort;
use crate::keepalive::{spawn_keepalive, KeepaliveSettings};
use crate::registry::SessionRegistry;
use crate::transport::{ConnectionEvent, SessionHandle, Transport};
use crate::types::{ConnectionState, SessionError};

/// Callback run once per successful open with the new session and the
/// router-confirmed address.
pub type StartCallback = Arc<dyn Fn(SessionHandle, String) + Send + Sync>;

/// Bookkeeping for one ledger's current connection attempt.
struct Lifecycle {
    state: ConnectionState,
    generation: u64,
    keepalive: CancellationToken,
    session: Option<SessionHandle>,
}

#[derive(Default)]
struct Lifecycles {
    by_address: HashMap<String, Lifecycle>,
    next_generation: u64,
}

impl Lifecycles {
    fn current_mut(&mut self, address: &str, generation: u64) -> Option<&mut Lifecycle> {
        self.by_address
            .get_mut(address)
            .filter(|l| l.generation == generation)
    }
}

/// Opens and tracks one authenticated session per ledger.
///
/// Create via [`SessionManagerBuilder`](crate::builder::SessionManagerBuilder).
pub struct SessionManager {
    pub(crate) url: String,
    pub(crate) realm: String,
    pub(crate) network_version: u8,
    pub(crate) keepalive: KeepaliveSettings,
    pub(crate) effect_procedure: String,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) registry: Arc<SessionRegistry>,
    lifecycles: Arc<Mutex<Lifecycles>>,
}

impl SessionManager {
    pub(crate) fn from_parts(
        url: String,
        realm: String,
        network_version: u8,
        keepalive: KeepaliveSettings,
        effect_procedure: String,
        transport: Arc<dyn Transport>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            url,
            realm,
            network_version,
            keepalive,
            effect_procedure,
            transport,
            registry,
            lifecycles: Arc::new(Mutex::new(Lifecycles::default())),
        }
    }

    /// Start a new builder.
    pub fn builder() -> crate::builder::SessionManagerBuilder {
        crate::builder::SessionManagerBuilder::new()
    }

    /// Open a session for `ledger`.
    ///
    /// Returns once the connection attempt has started.  The session
    /// becomes available through [`session`](Self::session) when the router
    /// accepts the handshake, at which point `on_start` runs.  A rejected
    /// handshake or an unreachable router leaves waiters suspended; this
    /// method does not report it.
    ///
    /// Calling this again for the same ledger supersedes the previous
    /// attempt: its keepalive stops, its open session is closed, and its
    /// events no longer touch the registry.
    pub async fn initialize<F>(&self, ledger: &Ledger, on_start: F) -> Result<(), SessionError>
    where
        F: Fn(SessionHandle, String) + Send + Sync + 'static,
    {
        let address = ledger.address().to_owned();
        let authextra = self.authextra(ledger)?;

        let (generation, keepalive, superseded) = self.begin(&address);
        if let Some(session) = superseded {
            best_effort("closing superseded session", session.close()).await;
        }
        tracing::info!(address = %address, url = %self.url, realm = %self.realm, "connecting");

        let options = ConnectOptions {
            url: self.url.clone(),
            realm: self.realm.clone(),
            authid: address.clone(),
            authextra,
        };
        let events = match self.transport.connect(options).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "transport refused connection");
                keepalive.cancel();
                if let Some(l) = self.lifecycles.lock().current_mut(&address, generation) {
                    l.state = ConnectionState::Closed;
                }
                return Err(e.into());
            }
        };

        let driver = Driver {
            address: address.clone(),
            generation,
            registry: self.registry.clone(),
            lifecycles: self.lifecycles.clone(),
            on_start: Arc::new(on_start),
        };
        tokio::spawn(driver.run(events));

        spawn_keepalive(
            self.registry.clone(),
            address,
            self.keepalive.clone(),
            keepalive,
        );
        Ok(())
    }

    /// [`initialize`](Self::initialize) for the keyless anonymous ledger.
    pub async fn initialize_anonymous<F>(&self, on_start: F) -> Result<Ledger, SessionError>
    where
        F: Fn(SessionHandle, String) + Send + Sync + 'static,
    {
        let ledger = Ledger::anonymous();
        self.initialize(&ledger, on_start).await?;
        Ok(ledger)
    }

    /// Wait for the session of `address`.
    ///
    /// Fails with [`SessionError::NotFound`] if `address` was never
    /// initialized.  Otherwise waits, possibly forever, until a connection
    /// for it is open.
    pub async fn session(&self, address: &str) -> Result<SessionHandle, SessionError> {
        self.registry.session(address).await
    }

    pub fn state(&self, address: &str) -> ConnectionState {
        self.lifecycles
            .lock()
            .by_address
            .get(address)
            .map_or(ConnectionState::Uninitialized, |l| l.state)
    }

    /// Stop the keepalive for `address` and close its live session.
    ///
    /// Returns `false` if the address was never initialized.
    pub async fn shutdown(&self, address: &str) -> Result<bool, SessionError> {
        let session = {
            let mut lifecycles = self.lifecycles.lock();
            let Some(l) = lifecycles.by_address.get_mut(address) else {
                return Ok(false);
            };
            l.keepalive.cancel();
            l.state = ConnectionState::Closed;
            l.session.take()
        };
        self.registry.reset(address);
        tracing::info!(address = %address, "shutdown");

        if let Some(session) = session {
            session.close().await?;
        }
        Ok(true)
    }

    /// [`shutdown`](Self::shutdown) every initialized address.  Close
    /// failures are logged and skipped.
    pub async fn shutdown_all(&self) {
        let addresses: Vec<String> = self.lifecycles.lock().by_address.keys().cloned().collect();
        for address in addresses {
            if let Err(e) = self.shutdown(&address).await {
                tracing::debug!(address = %address, error = %e, "close during shutdown failed");
            }
        }
    }

    /// Derive a ledger for `mnemonic` on this manager's network.
    pub fn ledger(&self, mnemonic: &str) -> Result<Ledger, SessionError> {
        Ok(Ledger::from_mnemonic(mnemonic, self.network_version)?)
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn network_version(&self) -> u8 {
        self.network_version
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn keepalive(&self) -> &KeepaliveSettings {
        &self.keepalive
    }

    /// Procedure used by [`run_effect`](crate::dispatch::run_effect_with)
    /// for this deployment.
    pub fn effect_procedure(&self) -> &str {
        &self.effect_procedure
    }

    fn authextra(&self, ledger: &Ledger) -> Result<AuthExtra, SessionError> {
        let mut extra = AuthExtra {
            ledger: ledger.address().to_owned(),
            ..Default::default()
        };
        if ledger.is_anonymous() {
            return Ok(extra);
        }
        let challenge = Challenge::now();
        let signed = ledger.sign_challenge(&challenge)?;
        extra.challenge = Some(challenge.into_string());
        extra.signature = Some(signed.signature);
        extra.public_key = Some(signed.public_key);
        Ok(extra)
    }

    /// Supersede any previous attempt for `address` and reset its registry
    /// slot.  Returns the new generation, its keepalive token and the
    /// previous attempt's open session, which the caller must close.
    fn begin(&self, address: &str) -> (u64, CancellationToken, Option<SessionHandle>) {
        let mut lifecycles = self.lifecycles.lock();
        lifecycles.next_generation += 1;
        let generation = lifecycles.next_generation;
        let keepalive = CancellationToken::new();

        let previous = lifecycles.by_address.insert(
            address.to_owned(),
            Lifecycle {
                state: ConnectionState::Connecting,
                generation,
                keepalive: keepalive.clone(),
                session: None,
            },
        );
        let superseded = previous.and_then(|previous| {
            previous.keepalive.cancel();
            tracing::debug!(address = %address, "superseding previous connection attempt");
            previous.session
        });
        self.registry.reset(address);
        (generation, keepalive, superseded)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        for l in self.lifecycles.lock().by_address.values() {
            l.keepalive.cancel();
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("url", &self.url)
            .field("realm", &self.realm)
            .field("network_version", &self.network_version)
            .finish_non_exhaustive()
    }
}

/// Consumes one connection's event stream.
struct Driver {
    address: String,
    generation: u64,
    registry: Arc<SessionRegistry>,
    lifecycles: Arc<Mutex<Lifecycles>>,
    on_start: StartCallback,
}

impl Driver {
    async fn run(self, mut events: mpsc::Receiver<ConnectionEvent>) {
        let mut current: Option<SessionHandle> = None;

        while let Some(event) = events.recv().await {
            match event {
                ConnectionEvent::Opened { session, details } => {
                    let handle = SessionHandle::new(session, details.authid.clone());
                    if self.opened(&details.authid, &handle) {
                        if let Some(old) = current.replace(handle.clone()) {
                            old.mark_closed();
                        }
                        tracing::info!(address = %details.authid, "session open");
                        (self.on_start)(handle, details.authid);
                    } else {
                        // nobody owns this connection any more
                        tracing::debug!(address = %self.address, "open from superseded attempt closed");
                        tokio::spawn(async move {
                            best_effort("closing unowned session", handle.close()).await;
                        });
                    }
                }
                ConnectionEvent::Closed { reason, details } => {
                    if let Some(old) = current.take() {
                        old.mark_closed();
                    }
                    if self.closed(&details.authid) {
                        tracing::info!(address = %details.authid, reason = %reason, "session closed");
                    } else {
                        tracing::debug!(address = %self.address, reason = %reason, "close from superseded attempt ignored");
                    }
                }
            }
        }

        let authid = match current {
            Some(old) => {
                old.mark_closed();
                old.authid().to_owned()
            }
            None => self.address.clone(),
        };
        if self.ended(&authid) {
            tracing::info!(address = %authid, "connection event stream ended without close");
        } else {
            tracing::debug!(address = %self.address, "connection event stream ended");
        }
    }

    /// Resolve the registry for `authid` if this attempt is still current.
    fn opened(&self, authid: &str, handle: &SessionHandle) -> bool {
        let mut lifecycles = self.lifecycles.lock();
        let Some(l) = lifecycles.current_mut(&self.address, self.generation) else {
            return false;
        };
        if l.state == ConnectionState::Closed && l.keepalive.is_cancelled() {
            // shut down before the router answered
            return false;
        }
        l.state = ConnectionState::Open;
        if let Some(previous) = l.session.replace(handle.clone()) {
            // reopened without an intervening close
            previous.mark_closed();
            self.registry.reset(authid);
        }
        self.registry.resolve(authid, handle.clone());
        true
    }

    fn closed(&self, authid: &str) -> bool {
        let mut lifecycles = self.lifecycles.lock();
        let Some(l) = lifecycles.current_mut(&self.address, self.generation) else {
            return false;
        };
        l.state = ConnectionState::Closed;
        l.session = None;
        self.registry.reset(authid);
        true
    }

    /// Treat a stream that ended without a close event as a close, unless
    /// this attempt was already closed or superseded.
    fn ended(&self, authid: &str) -> bool {
        let already_closed = self
            .lifecycles
            .lock()
            .current_mut(&self.address, self.generation)
            .map_or(true, |l| l.state == ConnectionState::Closed);
        !already_closed && self.closed(authid)
    }
}
