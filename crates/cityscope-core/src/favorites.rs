// crates/cityscope-core/src/favorites.rs

//! # Favorites Store
//!
//! Durable set of favorite city ids. Presence of a row means "favorite";
//! un-favoriting deletes the row. Every committed change bumps a revision
//! counter that subscribers can watch.

use crate::error::Result;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

pub type FavoriteIds = HashSet<String>;

#[async_trait]
pub trait FavoritesStore: Send + Sync {
    async fn is_favorite(&self, city_id: &str) -> Result<bool>;

    async fn favorite_ids(&self) -> Result<FavoriteIds>;

    /// Flip membership atomically and return the new state (`true` = favorite).
    async fn toggle(&self, city_id: &str) -> Result<bool>;

    /// Revision counter, bumped after every committed membership change.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS favorites (
    id TEXT PRIMARY KEY NOT NULL
)";

/// SQLite-backed store. All statements run on the blocking pool.
#[derive(Clone)]
pub struct SqliteFavoritesStore {
    conn: Arc<Mutex<Connection>>,
    changes: Arc<watch::Sender<u64>>,
}

impl SqliteFavoritesStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])?;
        let (changes, _) = watch::channel(0);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            changes: Arc::new(changes),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn);
            f(&mut guard)
        })
        .await?
    }
}

/// A panic mid-statement leaves SQLite itself consistent, so a poisoned lock
/// is still usable.
fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl FavoritesStore for SqliteFavoritesStore {
    async fn is_favorite(&self, city_id: &str) -> Result<bool> {
        let id = city_id.to_owned();
        self.with_conn(move |conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM favorites WHERE id = ?1",
                    params![id],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn favorite_ids(&self) -> Result<FavoriteIds> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM favorites")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<FavoriteIds, _>>()?;
            Ok(ids)
        })
        .await
    }

    async fn toggle(&self, city_id: &str) -> Result<bool> {
        let id = city_id.to_owned();
        let now_favorite = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let removed = tx.execute("DELETE FROM favorites WHERE id = ?1", params![id])?;
                let now_favorite = if removed == 0 {
                    tx.execute("INSERT INTO favorites (id) VALUES (?1)", params![id])?;
                    true
                } else {
                    false
                };
                tx.commit()?;
                Ok(now_favorite)
            })
            .await?;

        self.changes.send_modify(|rev| *rev += 1);
        debug!(city_id, now_favorite, "favorite toggled");
        Ok(now_favorite)
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn toggle_flips_membership() {
        let store = SqliteFavoritesStore::open_in_memory().unwrap();

        assert!(!store.is_favorite("42").await.unwrap());
        assert!(store.toggle("42").await.unwrap());
        assert!(store.is_favorite("42").await.unwrap());
        assert!(!store.toggle("42").await.unwrap());
        assert!(!store.is_favorite("42").await.unwrap());
    }

    #[tokio::test]
    async fn lists_all_ids() {
        let store = SqliteFavoritesStore::open_in_memory().unwrap();
        store.toggle("a").await.unwrap();
        store.toggle("b").await.unwrap();
        store.toggle("c").await.unwrap();
        store.toggle("b").await.unwrap();

        let ids = store.favorite_ids().await.unwrap();
        assert_eq!(ids, FavoriteIds::from(["a".to_string(), "c".to_string()]));
    }

    #[tokio::test]
    async fn subscribers_see_every_change() {
        let store = SqliteFavoritesStore::open_in_memory().unwrap();
        let mut rx = store.subscribe();
        assert_eq!(*rx.borrow_and_update(), 0);

        store.toggle("x").await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);

        store.toggle("x").await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_toggles_of_one_id_are_serialized() {
        let store = SqliteFavoritesStore::open_in_memory().unwrap();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.toggle("same").await.unwrap() })
            })
            .collect();

        let mut became_favorite = 0;
        for h in handles {
            if h.await.unwrap() {
                became_favorite += 1;
            }
        }

        // Ten strictly alternating flips: five on, five off.
        assert_eq!(became_favorite, 5);
        assert!(!store.is_favorite("same").await.unwrap());
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("favorites.sqlite");

        {
            let store = SqliteFavoritesStore::open(&path).unwrap();
            store.toggle("707860").await.unwrap();
        }

        let store = SqliteFavoritesStore::open(&path).unwrap();
        assert!(store.is_favorite("707860").await.unwrap());
    }
}
