// crates/cityscope-core/src/repository.rs

//! # City Repository
//!
//! Single source of truth for the city catalogue.
//!
//! The collection is loaded at most once per process (single-flight):
//! the first caller that finds the repository [`LoadState::Empty`] flips it
//! to [`LoadState::Loading`] and spawns the load as its own task, so a caller
//! that gives up never cancels a load other callers are waiting on. Everyone
//! else waits for the state to settle and re-reads the collection.
//!
//! One lock guards the collection, the load state and the published index.
//! Decoding, index builds and distance transforms run on the blocking pool;
//! only the final swap happens under the lock.

use crate::cache::{inflate, CacheFile};
use crate::error::{CityError, Result};
use crate::favorites::{FavoriteIds, FavoritesStore};
use crate::geo::with_distances;
use crate::index::CityIndex;
use crate::model::{decode_cities, City, Location};
use crate::source::CitySource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// Where the in-memory collection stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    /// Nothing loaded, nothing in flight.
    Empty,
    /// One download/decode/index build is running.
    Loading,
    /// Cities are in memory. Terminal for the process lifetime.
    Loaded,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Empty => write!(f, "empty"),
            LoadState::Loading => write!(f, "loading"),
            LoadState::Loaded => write!(f, "loaded"),
        }
    }
}

/// Snapshot of the repository for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStats {
    pub state: LoadState,
    pub cities: usize,
    pub index_built: bool,
    pub index_buckets: usize,
    pub cache_age: Option<Duration>,
}

struct Shared {
    cities: Arc<Vec<City>>,
    state: LoadState,
    /// Valid only while it covers `cities`.
    index: Option<Arc<CityIndex>>,
}

impl Shared {
    fn current_index(&self) -> Option<Arc<CityIndex>> {
        self.index
            .as_ref()
            .filter(|ix| ix.covers(&self.cities))
            .cloned()
    }
}

struct Inner {
    shared: Mutex<Shared>,
    /// Mirrors `Shared::state`; written only while `shared` is held.
    load_state: watch::Sender<LoadState>,
    /// Bumped whenever the collection is replaced.
    revision: watch::Sender<u64>,
    /// Serializes index builds so concurrent searches don't build twice.
    index_build: Mutex<()>,
    /// Serializes bulk transforms of the collection.
    transform: Mutex<()>,
    source: Arc<dyn CitySource>,
    cache: CacheFile,
    favorites: Arc<dyn FavoritesStore>,
}

/// Cheap to clone; clones share one collection.
#[derive(Clone)]
pub struct CityRepository {
    inner: Arc<Inner>,
}

impl CityRepository {
    pub fn new(
        source: Arc<dyn CitySource>,
        cache: CacheFile,
        favorites: Arc<dyn FavoritesStore>,
    ) -> Self {
        let (load_state, _) = watch::channel(LoadState::Empty);
        let (revision, _) = watch::channel(0);

        Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared {
                    cities: Arc::new(Vec::new()),
                    state: LoadState::Empty,
                    index: None,
                }),
                load_state,
                revision,
                index_build: Mutex::new(()),
                transform: Mutex::new(()),
                source,
                cache,
                favorites,
            }),
        }
    }

    /// Repository over the configured HTTP source and cache file.
    #[cfg(feature = "http")]
    pub fn from_config(
        config: &crate::config::RepositoryConfig,
        favorites: Arc<dyn FavoritesStore>,
    ) -> Result<Self> {
        let source = crate::source::HttpCitySource::new(&config.cities_url, config.timeouts)?;
        let cache = CacheFile::with_expiry(&config.cache_path, config.cache_expiry());
        Ok(Self::new(Arc::new(source), cache, favorites))
    }

    // -----------------------------------------------------------------------
    // Read paths
    // -----------------------------------------------------------------------

    /// Load the collection if nothing is in memory yet and report where the
    /// load settled: [`LoadState::Loaded`] on success, [`LoadState::Empty`]
    /// after a failure (already logged). Never copies the collection.
    pub async fn load(&self) -> LoadState {
        self.ensure_loaded().await;
        self.load_state()
    }

    /// Every city with the current favorite flags.
    ///
    /// Triggers the load if nothing is in memory yet. A failed load is
    /// logged and yields an empty list; the next call retries.
    pub async fn get_cities(&self) -> Vec<City> {
        let cities = self.ensure_loaded().await;
        if cities.is_empty() {
            return Vec::new();
        }
        let favorites = self.favorite_ids_or_empty().await;
        merge_favorites(&cities, &favorites)
    }

    /// Cities whose name starts with `query`, case-insensitive, sorted by
    /// name. An empty query yields the whole collection.
    pub async fn search_cities(&self, query: &str) -> Vec<City> {
        let cities = self.ensure_loaded().await;
        if cities.is_empty() {
            return Vec::new();
        }

        let hits = if query.is_empty() {
            cities.as_ref().clone()
        } else {
            match self.search_index(query).await {
                Ok(hits) => hits,
                Err(e) => {
                    error!(error = %e, query, "search failed");
                    return Vec::new();
                }
            }
        };

        let favorites = self.favorite_ids_or_empty().await;
        merge_favorites(&hits, &favorites)
    }

    /// Favorite cities, sorted by name.
    pub async fn get_favorites(&self) -> Vec<City> {
        let cities = self.ensure_loaded().await;
        let favorites = self.favorite_ids_or_empty().await;

        let mut out: Vec<City> = cities
            .iter()
            .filter(|c| favorites.contains(&c.id))
            .map(|c| c.with_favorite(true))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// In-memory lookup only; never triggers a load.
    pub async fn get_city_by_id(&self, id: &str) -> Option<City> {
        let city = {
            let shared = self.lock().await;
            shared.cities.iter().find(|c| c.id == id).cloned()
        }?;

        let is_favorite = match self.inner.favorites.is_favorite(id).await {
            Ok(flag) => flag,
            Err(e) => {
                warn!(error = %e, id, "favorite lookup failed, assuming not favorite");
                false
            }
        };
        Some(city.with_favorite(is_favorite))
    }

    // -----------------------------------------------------------------------
    // Write paths
    // -----------------------------------------------------------------------

    /// Flip the favorite flag of `city_id`; `true` means it is now a favorite.
    pub async fn toggle_favorite(&self, city_id: &str) -> Result<bool> {
        self.inner.favorites.toggle(city_id).await
    }

    /// Annotate every city with its distance in km from `(latitude, longitude)`.
    ///
    /// Best effort: an invalid reference point or an empty collection leaves
    /// distances untouched.
    pub async fn update_distances(&self, latitude: f64, longitude: f64) {
        let origin = Location::new(latitude, longitude);
        if !origin.is_valid() {
            warn!(latitude, longitude, "invalid reference location, distances unchanged");
            return;
        }

        let _exclusive = self.inner.transform.lock().await;

        let snapshot = self.lock().await.cities.clone();
        if snapshot.is_empty() {
            debug!("no cities in memory, distances unchanged");
            return;
        }

        let source = Arc::clone(&snapshot);
        let updated =
            match tokio::task::spawn_blocking(move || with_distances(&source, origin)).await {
                Ok(cities) => Arc::new(cities),
                Err(e) => {
                    warn!(error = %e, "distance update failed");
                    return;
                }
            };

        let had_index = {
            let mut shared = self.lock().await;
            if !Arc::ptr_eq(&shared.cities, &snapshot) {
                warn!("collection replaced during distance update, discarding");
                return;
            }
            shared.cities = Arc::clone(&updated);
            shared.index.take().is_some()
        };
        self.bump_revision();
        debug!(count = updated.len(), latitude, longitude, "distances updated");

        if had_index {
            if let Err(e) = self.current_index().await {
                warn!(error = %e, "search index rebuild after distance update failed");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn load_state(&self) -> LoadState {
        *self.inner.load_state.borrow()
    }

    /// Whether an index over the current collection is published.
    pub async fn is_index_built(&self) -> bool {
        self.lock().await.current_index().is_some()
    }

    pub async fn stats(&self) -> CatalogStats {
        let (state, cities, index) = {
            let shared = self.lock().await;
            (shared.state, shared.cities.len(), shared.current_index())
        };
        CatalogStats {
            state,
            cities,
            index_built: index.is_some(),
            index_buckets: index.map(|ix| ix.bucket_count()).unwrap_or(0),
            cache_age: self.inner.cache.age().await,
        }
    }

    pub fn cache(&self) -> &CacheFile {
        &self.inner.cache
    }

    /// Live view of the whole collection; see [`CityWatch`].
    pub fn watch_cities(&self) -> CityWatch {
        CityWatch::new(self.clone(), None)
    }

    /// Live view of one search; see [`CityWatch`].
    pub fn watch_search(&self, query: impl Into<String>) -> CityWatch {
        CityWatch::new(self.clone(), Some(query.into()))
    }

    // -----------------------------------------------------------------------
    // Single-flight load
    // -----------------------------------------------------------------------

    async fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.shared.lock().await
    }

    /// The loaded collection, loading it first if needed. Empty on failure.
    async fn ensure_loaded(&self) -> Arc<Vec<City>> {
        // Subscribe before looking so the settle notification can't be missed.
        let mut state_rx = self.inner.load_state.subscribe();

        {
            let mut shared = self.lock().await;
            match shared.state {
                LoadState::Loaded => return Arc::clone(&shared.cities),
                LoadState::Loading => {}
                LoadState::Empty => {
                    shared.state = LoadState::Loading;
                    self.inner.load_state.send_replace(LoadState::Loading);
                    tokio::spawn(Inner::load(Arc::clone(&self.inner)));
                }
            }
        }

        if state_rx
            .wait_for(|state| *state != LoadState::Loading)
            .await
            .is_err()
        {
            return Arc::new(Vec::new());
        }
        Arc::clone(&self.lock().await.cities)
    }

    // -----------------------------------------------------------------------
    // Search index
    // -----------------------------------------------------------------------

    async fn search_index(&self, query: &str) -> Result<Vec<City>> {
        let index = self.current_index().await?;
        let query = query.to_owned();
        Ok(tokio::task::spawn_blocking(move || index.search(&query)).await?)
    }

    /// The index over the current collection, building it if needed.
    async fn current_index(&self) -> Result<Arc<CityIndex>> {
        if let Some(index) = self.lock().await.current_index() {
            return Ok(index);
        }

        let _building = self.inner.index_build.lock().await;
        let cities = {
            let shared = self.lock().await;
            if let Some(index) = shared.current_index() {
                return Ok(index);
            }
            Arc::clone(&shared.cities)
        };

        let index = Arc::new(
            tokio::task::spawn_blocking(move || CityIndex::from_cities(cities)).await?,
        );
        self.lock().await.publish_index(&index);
        Ok(index)
    }

    // -----------------------------------------------------------------------
    // Favorites merge
    // -----------------------------------------------------------------------

    async fn favorite_ids_or_empty(&self) -> FavoriteIds {
        match self.inner.favorites.favorite_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "favorites unavailable, merging as not favorite");
                FavoriteIds::new()
            }
        }
    }

    fn bump_revision(&self) {
        self.inner.revision.send_modify(|rev| *rev += 1);
    }
}

impl Shared {
    /// Publish `index` unless the collection moved on while it was built.
    fn publish_index(&mut self, index: &Arc<CityIndex>) {
        if index.covers(&self.cities) {
            self.index = Some(Arc::clone(index));
        } else {
            debug!("discarding index built over a replaced collection");
        }
    }
}

impl Inner {
    /// The spawned half of the single-flight load. Always leaves `Loading`.
    async fn load(inner: Arc<Inner>) {
        debug!(source = %inner.source.describe(), "loading cities");

        // Run the pipeline as its own task so a panic in it still settles the state.
        let loaded = match tokio::spawn(Self::fetch_cities(Arc::clone(&inner))).await {
            Ok(Ok(cities)) => Some(Arc::new(cities)),
            Ok(Err(e)) => {
                error!(error = %e, "failed to load cities");
                None
            }
            Err(e) => {
                error!(error = %e, "city load task aborted");
                None
            }
        };

        let Some(cities) = loaded else {
            let mut shared = inner.shared.lock().await;
            shared.state = LoadState::Empty;
            inner.load_state.send_replace(LoadState::Empty);
            return;
        };

        {
            let mut shared = inner.shared.lock().await;
            shared.cities = Arc::clone(&cities);
            shared.index = None;
        }
        inner.revision.send_modify(|rev| *rev += 1);

        let count = cities.len();
        let built = tokio::task::spawn_blocking(move || CityIndex::from_cities(cities)).await;

        let mut shared = inner.shared.lock().await;
        match built {
            Ok(index) => shared.publish_index(&Arc::new(index)),
            // Searches build lazily when nothing was published.
            Err(e) => warn!(error = %e, "search index build failed"),
        }
        shared.state = LoadState::Loaded;
        inner.load_state.send_replace(LoadState::Loaded);
        info!(count, "loaded cities successfully");
    }

    /// Cache if fresh, network otherwise. The raw network body is cached
    /// before decoding; a body that fails to decode, or decodes to no cities,
    /// is evicted again and the load fails.
    async fn fetch_cities(inner: Arc<Inner>) -> Result<Vec<City>> {
        if inner.cache.is_valid().await {
            debug!("loading from cache");
            match inner.cache.read().await {
                Ok(bytes) => match decode_blob(bytes).await {
                    Ok(cities) if !cities.is_empty() => return Ok(cities),
                    Ok(_) => warn!("cached blob holds no cities, downloading"),
                    Err(e) => warn!(error = %e, "cached blob unreadable, downloading"),
                },
                Err(e) => warn!(error = %e, "cache read failed, downloading"),
            }
        }

        debug!("downloading fresh data");
        let bytes = inner.source.fetch().await?;

        if let Err(e) = inner.cache.write(&bytes).await {
            warn!(error = %e, path = %inner.cache.path().display(), "failed to cache cities");
        }

        let decoded = match decode_blob(bytes).await {
            Ok(cities) if cities.is_empty() => Err(CityError::EmptyBody),
            other => other,
        };
        if decoded.is_err() {
            if let Err(clear_err) = inner.cache.clear().await {
                warn!(error = %clear_err, "failed to evict unusable cache blob");
            }
        }
        decoded
    }
}

async fn decode_blob(bytes: Vec<u8>) -> Result<Vec<City>> {
    tokio::task::spawn_blocking(move || -> Result<Vec<City>> {
        let cities = decode_cities(&inflate(bytes)?)?;
        debug!(count = cities.len(), "parsed cities");
        Ok(cities)
    })
    .await?
}

fn merge_favorites(cities: &[City], favorites: &FavoriteIds) -> Vec<City> {
    cities
        .iter()
        .map(|c| c.with_favorite(favorites.contains(&c.id)))
        .collect()
}

// ---------------------------------------------------------------------------
// Reactive view
// ---------------------------------------------------------------------------

/// Recomputes a merged city list whenever favorites or the collection change.
///
/// The first [`CityWatch::next`] yields immediately (loading if needed);
/// later calls wait for an upstream change and skip results equal to the
/// previous emission. Dropping the watch never cancels an in-flight load.
///
/// A watch does not retry a failed load by itself. After a failure it yields
/// an empty list and re-emits once a later load, driven by any caller of the
/// repository, replaces the collection.
pub struct CityWatch {
    repo: CityRepository,
    query: Option<String>,
    favorites: watch::Receiver<u64>,
    favorites_open: bool,
    revision: watch::Receiver<u64>,
    last: Option<Vec<City>>,
}

impl CityWatch {
    fn new(repo: CityRepository, query: Option<String>) -> Self {
        let favorites = repo.inner.favorites.subscribe();
        let revision = repo.inner.revision.subscribe();
        Self {
            repo,
            query,
            favorites,
            favorites_open: true,
            revision,
            last: None,
        }
    }

    /// The next distinct merged view.
    pub async fn next(&mut self) -> Option<Vec<City>> {
        loop {
            if self.last.is_some() && !self.wait_for_change().await {
                return None;
            }

            self.favorites.borrow_and_update();
            self.revision.borrow_and_update();

            let view = match &self.query {
                Some(q) => self.repo.search_cities(q).await,
                None => self.repo.get_cities().await,
            };

            if self.last.as_ref() != Some(&view) {
                self.last = Some(view.clone());
                return Some(view);
            }
        }
    }

    /// `false` once no upstream can change any more.
    async fn wait_for_change(&mut self) -> bool {
        loop {
            tokio::select! {
                changed = self.favorites.changed(), if self.favorites_open => {
                    if changed.is_ok() {
                        return true;
                    }
                    self.favorites_open = false;
                }
                changed = self.revision.changed() => return changed.is_ok(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::favorites::SqliteFavoritesStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        body: Vec<u8>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CitySource for Fixed {
        async fn fetch(&self) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }

        fn describe(&self) -> String {
            "fixed".into()
        }
    }

    struct BrokenFavorites;

    #[async_trait]
    impl FavoritesStore for BrokenFavorites {
        async fn is_favorite(&self, _: &str) -> Result<bool> {
            Err(CityError::InvalidData("store offline".into()))
        }
        async fn favorite_ids(&self) -> Result<FavoriteIds> {
            Err(CityError::InvalidData("store offline".into()))
        }
        async fn toggle(&self, _: &str) -> Result<bool> {
            Err(CityError::InvalidData("store offline".into()))
        }
        fn subscribe(&self) -> watch::Receiver<u64> {
            watch::channel(0).1
        }
    }

    const BODY: &str = r#"[
        {"_id": 1, "name": "Sydney", "country": "AU", "coord": {"lon": 151.2, "lat": -33.8}},
        {"_id": 2, "name": "Alabama", "country": "US", "coord": {"lon": -86.7, "lat": 32.7}},
        {"_id": 3, "name": "Albuquerque", "country": "US", "coord": {"lon": -106.6, "lat": 35.1}}
    ]"#;

    fn repo_with(favorites: Arc<dyn FavoritesStore>) -> (CityRepository, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(Fixed {
            body: BODY.as_bytes().to_vec(),
            calls: AtomicUsize::new(0),
        });
        let cache = CacheFile::new(dir.path().join("cities.json"));
        (CityRepository::new(source, cache, favorites), dir)
    }

    #[tokio::test]
    async fn load_settles_and_publishes_index() {
        let store = Arc::new(SqliteFavoritesStore::open_in_memory().unwrap());
        let (repo, _dir) = repo_with(store);

        assert_eq!(repo.load_state(), LoadState::Empty);
        assert_eq!(repo.get_cities().await.len(), 3);
        assert_eq!(repo.load_state(), LoadState::Loaded);
        assert!(repo.is_index_built().await);

        let stats = repo.stats().await;
        assert_eq!(stats.cities, 3);
        assert!(stats.index_built);
        assert!(stats.cache_age.is_some());
    }

    #[tokio::test]
    async fn broken_favorites_degrade_reads_but_fail_toggle() {
        let (repo, _dir) = repo_with(Arc::new(BrokenFavorites));

        let cities = repo.get_cities().await;
        assert_eq!(cities.len(), 3);
        assert!(cities.iter().all(|c| !c.is_favorite));

        let city = repo.get_city_by_id("2").await.unwrap();
        assert!(!city.is_favorite);

        assert!(repo.toggle_favorite("2").await.is_err());
    }

    #[tokio::test]
    async fn invalid_reference_point_is_ignored() {
        let store = Arc::new(SqliteFavoritesStore::open_in_memory().unwrap());
        let (repo, _dir) = repo_with(store);
        repo.get_cities().await;

        repo.update_distances(f64::NAN, 0.0).await;
        repo.update_distances(120.0, 0.0).await;
        assert!(repo.get_cities().await.iter().all(|c| c.distance.is_none()));
    }

    #[tokio::test]
    async fn distance_update_before_load_is_a_noop() {
        let store = Arc::new(SqliteFavoritesStore::open_in_memory().unwrap());
        let (repo, _dir) = repo_with(store);

        repo.update_distances(0.0, 0.0).await;
        assert_eq!(repo.load_state(), LoadState::Empty);
        assert!(repo.get_city_by_id("1").await.is_none());
    }

    #[tokio::test]
    async fn load_reports_where_it_settled() {
        let store = Arc::new(SqliteFavoritesStore::open_in_memory().unwrap());
        let (repo, _dir) = repo_with(store);
        assert_eq!(repo.load().await, LoadState::Loaded);
        assert_eq!(repo.load().await, LoadState::Loaded);

        let dir = tempfile::tempdir().unwrap();
        let cache = CacheFile::new(dir.path().join("cities.json"));
        let empty = Arc::new(Fixed {
            body: b"[]".to_vec(),
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(SqliteFavoritesStore::open_in_memory().unwrap());
        let repo = CityRepository::new(empty.clone(), cache, store);

        assert_eq!(repo.load().await, LoadState::Empty);
        assert!(!dir.path().join("cities.json").exists());
        assert_eq!(repo.load().await, LoadState::Empty);
        assert_eq!(empty.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_index_requests_share_one_build() {
        let store = Arc::new(SqliteFavoritesStore::open_in_memory().unwrap());
        let (repo, _dir) = repo_with(store);
        repo.load().await;
        repo.lock().await.index = None;
        assert!(!repo.is_index_built().await);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.current_index().await.unwrap() })
            })
            .collect();
        let mut built = Vec::new();
        for h in handles {
            built.push(h.await.unwrap());
        }

        let published = repo.lock().await.current_index().unwrap();
        assert!(built.iter().all(|ix| Arc::ptr_eq(ix, &published)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_calls_read_cache_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("cities.json");
        std::fs::write(&cache_path, BODY).unwrap();

        let source = Arc::new(Fixed {
            body: b"[]".to_vec(),
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(SqliteFavoritesStore::open_in_memory().unwrap());
        let repo = CityRepository::new(source.clone(), CacheFile::new(&cache_path), store);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.get_cities().await })
            })
            .collect();
        for h in handles {
            assert_eq!(h.await.unwrap().len(), 3);
        }

        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        // One decoded collection swapped in, once.
        assert_eq!(*repo.inner.revision.borrow(), 1);
    }

    #[test]
    fn load_state_display() {
        assert_eq!(LoadState::Empty.to_string(), "empty");
        assert_eq!(LoadState::Loading.to_string(), "loading");
        assert_eq!(LoadState::Loaded.to_string(), "loaded");
    }
}
