// crates/cityscope-core/src/cache.rs

//! # Cache File
//!
//! The last successfully fetched city blob, stored verbatim on disk. The
//! file's modification time is its only metadata: a blob is fresh while it
//! is younger than the configured expiry window.

use crate::error::Result;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Default freshness window of the cached blob.
pub const DEFAULT_CACHE_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Conventional file name of the cached city list.
pub const CITIES_FILE_NAME: &str = "cities.json";

#[derive(Debug, Clone)]
pub struct CacheFile {
    path: PathBuf,
    expiry: Duration,
}

impl CacheFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_expiry(path, DEFAULT_CACHE_EXPIRY)
    }

    pub fn with_expiry(path: impl Into<PathBuf>, expiry: Duration) -> Self {
        Self {
            path: path.into(),
            expiry,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Time since the blob was last written, `None` if there is no blob.
    pub async fn age(&self) -> Option<Duration> {
        self.age_at(SystemTime::now()).await
    }

    async fn age_at(&self, now: SystemTime) -> Option<Duration> {
        let modified = tokio::fs::metadata(&self.path)
            .await
            .and_then(|m| m.modified())
            .ok()?;
        // An mtime in the future counts as brand new.
        Some(now.duration_since(modified).unwrap_or(Duration::ZERO))
    }

    /// Whether a blob exists and is younger than the expiry window.
    pub async fn is_valid(&self) -> bool {
        self.is_valid_at(SystemTime::now()).await
    }

    pub async fn is_valid_at(&self, now: SystemTime) -> bool {
        match self.age_at(now).await {
            Some(age) => {
                let valid = age < self.expiry;
                debug!(
                    path = %self.path.display(),
                    age_hours = age.as_secs() / 3600,
                    valid,
                    "cache age checked"
                );
                valid
            }
            None => {
                debug!(path = %self.path.display(), "cache file doesn't exist");
                false
            }
        }
    }

    pub async fn read(&self) -> Result<Vec<u8>> {
        let bytes = tokio::fs::read(&self.path).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "read cache file");
        Ok(bytes)
    }

    /// Replace the blob. Creates the parent directory when missing.
    pub async fn write(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, bytes).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "cached to file");
        Ok(())
    }

    /// Remove the blob, forcing the next load to hit the network.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Inflate a gzip blob; anything else passes through untouched.
///
/// Without the `compact` feature a gzip blob is rejected instead.
pub fn inflate(bytes: Vec<u8>) -> Result<Vec<u8>> {
    const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(bytes);
    }

    #[cfg(feature = "compact")]
    {
        use flate2::read::GzDecoder;
        use std::io::Read;

        let mut out = Vec::with_capacity(bytes.len() * 4);
        GzDecoder::new(bytes.as_slice()).read_to_end(&mut out)?;
        Ok(out)
    }

    #[cfg(not(feature = "compact"))]
    {
        Err(crate::error::CityError::InvalidData(
            "gzip blob received but 'compact' disabled".into(),
        ))
    }
}
