//! Timestamped handshake challenges.

use chrono::Utc;
use px_protocol::CHALLENGE_PREFIX;

/// A challenge string of the form `challengeme-<unix millis>`.
///
/// The timestamp makes each handshake's signed payload unique, so a
/// captured signature cannot be replayed for a later session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Challenge(String);

impl Challenge {
    /// Challenge for the current instant.
    pub fn now() -> Self {
        Self::at(Utc::now().timestamp_millis())
    }

    /// Challenge for a fixed timestamp.
    pub fn at(unix_millis: i64) -> Self {
        Self(format!("{CHALLENGE_PREFIX}-{unix_millis}"))
    }

    /// Timestamp embedded in the challenge, if it carries the expected prefix.
    pub fn timestamp_millis(&self) -> Option<i64> {
        self.0
            .strip_prefix(CHALLENGE_PREFIX)?
            .strip_prefix('-')?
            .parse()
            .ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Challenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Challenge {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}
