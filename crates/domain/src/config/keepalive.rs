use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Keepalive
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Heartbeat settings.  One heartbeat call is made per identity every
/// `interval_secs`, carrying the identity's address as its only argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    #[serde(default = "d_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "d_procedure")]
    pub procedure: String,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            interval_secs: d_interval_secs(),
            procedure: d_procedure(),
        }
    }
}

impl KeepaliveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn d_interval_secs() -> u64 {
    20
}

fn d_procedure() -> String {
    "network.incentum.praxis.code.ping".into()
}
