// crates/cityscope-core/src/config.rs

use crate::cache::{CITIES_FILE_NAME, DEFAULT_CACHE_EXPIRY};
use crate::source::DEFAULT_CITIES_URL;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding [`RepositoryConfig::default_data_dir`].
pub const DATA_DIR_ENV: &str = "CITYSCOPE_DATA_DIR";

/// Transport timeouts for the HTTP collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpTimeouts {
    pub connect_secs: u64,
    /// Longest wait for any single read of the response. A slow download
    /// that keeps making progress is never cut off.
    pub read_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: 30,
            read_secs: 120,
        }
    }
}

impl HttpTimeouts {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    #[cfg(feature = "http")]
    pub(crate) fn client_builder(&self) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .connect_timeout(self.connect())
            .read_timeout(self.read())
            .user_agent(concat!("cityscope/", env!("CARGO_PKG_VERSION")))
    }
}

/// Where the city catalogue comes from and where it is cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub cities_url: String,
    pub cache_path: PathBuf,
    pub cache_expiry_secs: u64,
    pub timeouts: HttpTimeouts,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            cities_url: DEFAULT_CITIES_URL.to_string(),
            cache_path: Self::default_data_dir().join(CITIES_FILE_NAME),
            cache_expiry_secs: DEFAULT_CACHE_EXPIRY.as_secs(),
            timeouts: HttpTimeouts::default(),
        }
    }
}

impl RepositoryConfig {
    /// `$CITYSCOPE_DATA_DIR`, or `./data` when unset.
    pub fn default_data_dir() -> PathBuf {
        std::env::var_os(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"))
    }

    /// Same defaults, everything stored under `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: dir.into().join(CITIES_FILE_NAME),
            ..Self::default()
        }
    }

    pub fn cache_expiry(&self) -> Duration {
        Duration::from_secs(self.cache_expiry_secs)
    }

    /// Parse a JSON config; missing keys take their defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// OpenWeatherMap access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeouts: HttpTimeouts,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openweathermap.org/data/2.5/".to_string(),
            api_key: String::new(),
            timeouts: HttpTimeouts::default(),
        }
    }
}
