// crates/cityscope-core/src/lib.rs

//! # cityscope-core
//!
//! City catalogue with an in-memory prefix search index, a cached
//! download of the city dataset, persisted favorites and distance
//! annotation.
//!
//! ```no_run
//! use cityscope_core::{CacheFile, CityRepository, FileCitySource, SqliteFavoritesStore};
//! use std::sync::Arc;
//!
//! # async fn demo() -> cityscope_core::Result<()> {
//! let favorites = Arc::new(SqliteFavoritesStore::open("data/favorites.sqlite")?);
//! let source = Arc::new(FileCitySource::new("data/cities.json"));
//! let repo = CityRepository::new(source, CacheFile::new("data/cache/cities.json"), favorites);
//!
//! for city in repo.search_cities("Alb").await {
//!     println!("{} ({})", city.display_name(), city.coordinates());
//! }
//! # Ok(())
//! # }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cache;
pub mod config;
pub mod error;
pub mod favorites;
pub mod geo;
pub mod index; // The prefix search structure
pub mod model;
pub mod repository; // Load / search / favorites orchestration
pub mod source;
pub mod weather;

// Re-exports
pub use crate::cache::CacheFile;
pub use crate::config::{HttpTimeouts, RepositoryConfig, WeatherConfig};
pub use crate::error::{CityError, Result};
pub use crate::favorites::{FavoriteIds, FavoritesStore, SqliteFavoritesStore};
pub use crate::index::CityIndex;
pub use crate::model::{City, Location, Weather};
pub use crate::repository::{CatalogStats, CityRepository, CityWatch, LoadState};
pub use crate::source::{CitySource, FileCitySource};
pub use crate::weather::{WeatherProvider, WeatherRepository};

#[cfg(feature = "http")]
pub use crate::source::HttpCitySource;
#[cfg(feature = "http")]
pub use crate::weather::HttpWeatherClient;
