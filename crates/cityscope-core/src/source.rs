// crates/cityscope-core/src/source.rs

//! Where the raw city blob comes from when the cache can't serve it.

use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Public dataset of ~200k cities (`[{"_id", "name", "country", "coord"}]`).
pub const DEFAULT_CITIES_URL: &str = "https://gist.githubusercontent.com/hernan-uala/dce8843a8edbe0b0018b32e137bc2b3a/raw/0996accf70cb0ca0e16f9a99e0ee185fafca7af1/cities.json";

/// Fetches the complete city blob in one go.
///
/// The bytes are returned undecoded so the caller can cache them verbatim.
#[async_trait]
pub trait CitySource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

/// Reads the blob from a local file, e.g. a dataset shipped next to the binary.
#[derive(Debug, Clone)]
pub struct FileCitySource {
    path: PathBuf,
}

impl FileCitySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CitySource for FileCitySource {
    async fn fetch(&self) -> Result<Vec<u8>> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            crate::error::CityError::NotFound(format!(
                "Dataset not found at {}: {}",
                self.path.display(),
                e
            ))
        })?;
        if bytes.is_empty() {
            return Err(crate::error::CityError::EmptyBody);
        }
        debug!(path = %self.path.display(), bytes = bytes.len(), "read dataset file");
        Ok(bytes)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

#[cfg(feature = "http")]
pub use self::http::HttpCitySource;

#[cfg(feature = "http")]
mod http {
    use super::CitySource;
    use crate::config::HttpTimeouts;
    use crate::error::{CityError, Result};
    use async_trait::async_trait;
    use tracing::debug;

    /// One GET against a fixed URL.
    #[derive(Debug, Clone)]
    pub struct HttpCitySource {
        client: reqwest::Client,
        url: String,
    }

    impl HttpCitySource {
        pub fn new(url: impl Into<String>, timeouts: HttpTimeouts) -> Result<Self> {
            let client = timeouts.client_builder().build()?;
            Ok(Self::with_client(client, url))
        }

        /// Share an already configured client.
        pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
            Self {
                client,
                url: url.into(),
            }
        }
    }

    #[async_trait]
    impl CitySource for HttpCitySource {
        async fn fetch(&self) -> Result<Vec<u8>> {
            debug!(url = %self.url, "downloading cities JSON");

            let response = self.client.get(&self.url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(CityError::Status(status.as_u16()));
            }

            let body = response.bytes().await?;
            if body.is_empty() {
                return Err(CityError::EmptyBody);
            }
            debug!(bytes = body.len(), "downloaded cities JSON");
            Ok(body.to_vec())
        }

        fn describe(&self) -> String {
            format!("GET {}", self.url)
        }
    }
}
