use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_CACHE_DIR: &str = ".droneworld";

/// Client settings read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_url: String,
    pub cache_dir: PathBuf,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        ClientConfig {
            api_url: lookup("DRONEWORLD_API_URL")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            cache_dir: PathBuf::from(
                lookup("DRONEWORLD_CACHE_DIR")
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string()),
            ),
        }
    }
}
