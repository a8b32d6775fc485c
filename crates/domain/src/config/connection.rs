use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where and how to open the router connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Router WebSocket endpoint.
    #[serde(default = "d_url")]
    pub url: String,
    /// Realm (namespace) joined on the router.
    #[serde(default = "d_realm")]
    pub realm: String,
    /// Network whose version byte is baked into ledger addresses.
    #[serde(default)]
    pub network: Network,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: d_url(),
            realm: d_realm(),
            network: Network::default(),
        }
    }
}

fn d_url() -> String {
    "wss://m0n3t1z3.com/ws".into()
}

fn d_realm() -> String {
    "realm-praxis".into()
}

/// Known networks.  Each maps to the version byte used when deriving
/// addresses, so the same mnemonic yields different addresses on devnet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Local,
    #[default]
    Testnet,
    Devnet,
    Mainnet,
}

impl Network {
    pub fn version(self) -> u8 {
        match self {
            Self::Local | Self::Testnet | Self::Mainnet => 23,
            Self::Devnet => 30,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Testnet => "testnet",
            Self::Devnet => "devnet",
            Self::Mainnet => "mainnet",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Network {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "testnet" => Ok(Self::Testnet),
            "devnet" => Ok(Self::Devnet),
            "mainnet" => Ok(Self::Mainnet),
            other => Err(crate::Error::Config(format!("unknown network: {other}"))),
        }
    }
}
