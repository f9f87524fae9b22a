use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One record of the claims feed.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Claim {
    #[serde(rename = "GameID")]
    pub game_id: u64,
    #[serde(rename = "ConsoleName", default)]
    pub console_name: String,
    /// Opaque, lexicographically sortable completion timestamp.
    #[serde(rename = "DoneTime", default)]
    pub done_time: Option<String>,
}

impl Claim {
    pub fn done_time(&self) -> &str {
        self.done_time.as_deref().unwrap_or_default()
    }
}

/// Response from the per-game hash endpoint
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GameHashes {
    #[serde(rename = "Results", default)]
    pub results: Vec<HashResult>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct HashResult {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "PatchUrl", default)]
    pub patch_url: Option<String>,
}

impl HashResult {
    pub fn is_patched(&self) -> bool {
        self.patch_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub user_agent: String,
    /// Ceiling for a whole mirror listing request.
    pub listing_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://retroachievements.org/API".to_string(),
            user_agent: "RetroAchievements-ROM-Collector/1.0".to_string(),
            listing_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
        }
    }
}
