use serde::{Deserialize, Serialize};

/// Configuration from corkboard.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub user: UserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the persistence API, e.g. "http://localhost:3000/api"
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardConfig {
    /// The board this working directory is bound to
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    /// Email as reported by the identity provider. Informational only; the
    /// client never authenticates; sessions are handled upstream.
    #[serde(default)]
    pub email: String,
}

fn default_timeout_secs() -> u64 {
    30
}
