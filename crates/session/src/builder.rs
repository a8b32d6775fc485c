//! Builder pattern for constructing a [`SessionManager`].

use std::sync::Arc;
use std::time::Duration;

use px_domain::config::{Config, Network};

use crate::keepalive::KeepaliveSettings;
use crate::manager::SessionManager;
use crate::registry::SessionRegistry;
use crate::transport::Transport;
use crate::types::SessionError;

/// Fluent builder for [`SessionManager`].
///
/// # Example
///
/// ```rust,no_run
/// # use px_session::SessionManagerBuilder;
/// # use px_session::memory::{MemoryRouter, MemoryTransport};
/// let router = MemoryRouter::new();
/// let manager = SessionManagerBuilder::new()
///     .url("wss://router.example.com/ws")
///     .realm("realm-praxis")
///     .network_version(23)
///     .keepalive_interval(std::time::Duration::from_secs(20))
///     .transport(MemoryTransport::new(router))
///     .build()
///     .unwrap();
/// ```
pub struct SessionManagerBuilder {
    url: String,
    realm: String,
    network_version: u8,
    keepalive: KeepaliveSettings,
    effect_procedure: String,
    transport: Option<Arc<dyn Transport>>,
    registry: Option<Arc<SessionRegistry>>,
}

impl SessionManagerBuilder {
    /// A builder preloaded with the default configuration.
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    /// A builder preloaded from `config`.  The transport still has to be
    /// supplied.
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.connection.url.clone(),
            realm: config.connection.realm.clone(),
            network_version: config.network_version(),
            keepalive: KeepaliveSettings {
                interval: config.keepalive.interval(),
                procedure: config.keepalive.procedure.clone(),
            },
            effect_procedure: config.dispatch.effect_procedure.clone(),
            transport: None,
            registry: None,
        }
    }

    // ── Connection ───────────────────────────────────────────────────

    /// Router endpoint (e.g. `wss://m0n3t1z3.com/ws`).
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// Version byte used when deriving ledger addresses.
    pub fn network_version(mut self, version: u8) -> Self {
        self.network_version = version;
        self
    }

    /// Shorthand for [`network_version`](Self::network_version) with a
    /// named network.
    pub fn network(self, network: Network) -> Self {
        self.network_version(network.version())
    }

    // ── Behavior ─────────────────────────────────────────────────────

    /// Override the heartbeat interval (default 20s).
    pub fn keepalive_interval(mut self, d: Duration) -> Self {
        self.keepalive.interval = d;
        self
    }

    /// Override the heartbeat procedure.
    pub fn keepalive_procedure(mut self, procedure: impl Into<String>) -> Self {
        self.keepalive.procedure = procedure.into();
        self
    }

    pub fn effect_procedure(mut self, procedure: impl Into<String>) -> Self {
        self.effect_procedure = procedure.into();
        self
    }

    // ── Collaborators ────────────────────────────────────────────────

    pub fn transport(self, transport: impl Transport) -> Self {
        self.transport_arc(Arc::new(transport))
    }

    pub fn transport_arc(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Share an existing registry instead of creating a private one.
    pub fn registry(mut self, registry: Arc<SessionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the [`SessionManager`].
    pub fn build(self) -> Result<SessionManager, SessionError> {
        let transport = self
            .transport
            .ok_or_else(|| SessionError::Config("a transport is required".into()))?;
        if self.url.is_empty() {
            return Err(SessionError::Config("url is required".into()));
        }
        if self.realm.is_empty() {
            return Err(SessionError::Config("realm is required".into()));
        }
        if self.keepalive.interval.is_zero() {
            return Err(SessionError::Config("keepalive interval must be > 0".into()));
        }
        if self.keepalive.procedure.is_empty() {
            return Err(SessionError::Config("keepalive procedure is required".into()));
        }

        Ok(SessionManager::from_parts(
            self.url,
            self.realm,
            self.network_version,
            self.keepalive,
            self.effect_procedure,
            transport,
            self.registry.unwrap_or_default(),
        ))
    }
}

impl Default for SessionManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
