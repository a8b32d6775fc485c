//! Per-ledger heartbeat loop.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::guard::best_effort;
use crate::registry::SessionRegistry;
use crate::types::SessionError;

/// Heartbeat settings shared by every ledger of one manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepaliveSettings {
    pub interval: Duration,
    pub procedure: String,
}

impl Default for KeepaliveSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
            procedure: px_protocol::RPC_PING.into(),
        }
    }
}

/// Spawn the keepalive loop for `address`.
///
/// Every `interval` the loop waits for the ledger's session, then calls
/// the heartbeat procedure with the address as its only argument.  Any
/// failure is swallowed and the loop carries on.  It only ends when
/// `cancel` fires.
pub fn spawn_keepalive(
    registry: Arc<SessionRegistry>,
    address: String,
    settings: KeepaliveSettings,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!(
            address = %address,
            interval_secs = settings.interval.as_secs_f64(),
            "keepalive started"
        );
        loop {
            tokio::select! {
                _ = tokio::time::sleep(settings.interval) => {}
                _ = cancel.cancelled() => break,
            }

            let beat = best_effort(
                &address,
                heartbeat(&registry, &address, &settings.procedure),
            );
            tokio::select! {
                _ = beat => {}
                _ = cancel.cancelled() => break,
            }
        }
        tracing::debug!(address = %address, "keepalive stopped");
    })
}

async fn heartbeat(
    registry: &SessionRegistry,
    address: &str,
    procedure: &str,
) -> Result<Value, SessionError> {
    let session = registry.session(address).await?;
    let reply = session
        .call(procedure, vec![Value::String(address.to_owned())])
        .await?;
    tracing::trace!(address = %address, "heartbeat acknowledged");
    Ok(reply)
}
