// crates/cityscope-core/src/index.rs

//! # Prefix Index
//!
//! Buckets cities by the first [`PREFIX_LENGTH`] characters of their
//! lowercased name. A bucket is only a coarse pre-filter: every query still
//! checks the full prefix and sorts its hits by name, so bucket order carries
//! no meaning.

use crate::model::City;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Characters of a name that make up its bucket key.
pub const PREFIX_LENGTH: usize = 3;

/// Cities are indexed in batches of this size.
pub const CHUNK_SIZE: usize = 1000;

/// Bucket key for a name or a query: the first [`PREFIX_LENGTH`] characters
/// of its lowercase form. Shorter inputs yield shorter keys (possibly empty).
pub fn prefix_key(s: &str) -> String {
    s.to_lowercase().chars().take(PREFIX_LENGTH).collect()
}

/// In-memory prefix search over one city collection.
#[derive(Debug, Clone, Default)]
pub struct CityIndex {
    cities: Arc<Vec<City>>,
    /// key -> positions in `cities`
    buckets: BTreeMap<String, Vec<usize>>,
    built: bool,
}

impl CityIndex {
    /// An empty, unbuilt index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ready index over `cities`.
    pub fn from_cities(cities: Arc<Vec<City>>) -> Self {
        let mut index = Self::new();
        index.build(cities);
        index
    }

    /// Replace the indexed collection and rebuild all buckets.
    ///
    /// An empty collection still leaves the index marked built.
    pub fn build(&mut self, cities: Arc<Vec<City>>) {
        debug!(count = cities.len(), "building search index");

        self.buckets.clear();
        self.built = false;

        for (chunk_no, chunk) in cities.chunks(CHUNK_SIZE).enumerate() {
            let offset = chunk_no * CHUNK_SIZE;
            for (i, city) in chunk.iter().enumerate() {
                self.buckets
                    .entry(prefix_key(&city.name))
                    .or_default()
                    .push(offset + i);
            }
        }

        self.cities = cities;
        self.built = true;
        debug!(buckets = self.buckets.len(), "search index built");
    }

    /// Cities whose name starts with `query` (case-insensitive), sorted by name.
    pub fn search(&self, query: &str) -> Vec<City> {
        let needle = query.to_lowercase();
        let key = prefix_key(query);

        let mut hits: Vec<&City> = if key.chars().count() < PREFIX_LENGTH {
            // Short key: it is a prefix of every longer key it can match.
            self.buckets
                .range(key.clone()..)
                .take_while(|(k, _)| k.starts_with(key.as_str()))
                .flat_map(|(_, positions)| positions.iter())
                .map(|&i| &self.cities[i])
                .filter(|city| city.name.to_lowercase().starts_with(&needle))
                .collect()
        } else {
            match self.buckets.get(&key) {
                Some(positions) => positions
                    .iter()
                    .map(|&i| &self.cities[i])
                    .filter(|city| city.name.to_lowercase().starts_with(&needle))
                    .collect(),
                None => Vec::new(),
            }
        };

        hits.sort_by(|a, b| a.name.cmp(&b.name));
        hits.into_iter().cloned().collect()
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// The collection this index was built from.
    pub fn cities(&self) -> &Arc<Vec<City>> {
        &self.cities
    }

    /// Whether this index was built from exactly `cities` (same allocation).
    pub fn covers(&self, cities: &Arc<Vec<City>>) -> bool {
        self.built && Arc::ptr_eq(&self.cities, cities)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city(id: &str, name: &str) -> City {
        City::new(id, name, "US", 0.0, 0.0)
    }

    fn names(cities: &[City]) -> Vec<&str> {
        cities.iter().map(|c| c.name.as_str()).collect()
    }

    fn sample() -> Arc<Vec<City>> {
        Arc::new(vec![
            city("1", "Sydney"),
            city("2", "Arizona"),
            city("3", "Albuquerque"),
            city("4", "Anaheim"),
            city("5", "Alabama"),
        ])
    }

    #[test]
    fn prefix_keys() {
        assert_eq!(prefix_key("Albuquerque"), "alb");
        assert_eq!(prefix_key("Al"), "al");
        assert_eq!(prefix_key(""), "");
        assert_eq!(prefix_key("ÅLESUND"), "åle");
    }

    #[test]
    fn scenario_queries() {
        let index = CityIndex::from_cities(sample());

        assert_eq!(names(&index.search("Al")), ["Alabama", "Albuquerque"]);
        assert_eq!(names(&index.search("Alb")), ["Albuquerque"]);
        assert_eq!(names(&index.search("s")), ["Sydney"]);
        assert!(index.search("xyz").is_empty());
    }

    #[test]
    fn single_letter_spans_buckets() {
        let index = CityIndex::from_cities(sample());
        assert_eq!(
            names(&index.search("A")),
            ["Alabama", "Albuquerque", "Anaheim", "Arizona"]
        );
    }

    #[test]
    fn bucket_collisions_are_filtered() {
        let cities = Arc::new(vec![
            city("1", "Albany"),
            city("2", "Albuquerque"),
            city("3", "Alba"),
        ]);
        let index = CityIndex::from_cities(cities);
        assert_eq!(names(&index.search("albu")), ["Albuquerque"]);
        assert_eq!(names(&index.search("ALBA")), ["Alba", "Albany"]);
        assert!(index.search("albx").is_empty());
    }

    #[test]
    fn matches_linear_scan_for_every_prefix() {
        let cities = Arc::new(vec![
            city("1", "Bad Ems"),
            city("2", "Baden"),
            city("3", "Baden-Baden"),
            city("4", "Bo"),
            city("5", "B"),
            city("6", "Bordeaux"),
            city("7", "bordeaux"),
            city("8", ""),
        ]);
        let index = CityIndex::from_cities(cities.clone());

        for city in cities.iter() {
            let lower = city.name.to_lowercase();
            for end in 1..=lower.chars().count() {
                let query: String = lower.chars().take(end).collect();
                let mut expected: Vec<City> = cities
                    .iter()
                    .filter(|c| c.name.to_lowercase().starts_with(&query))
                    .cloned()
                    .collect();
                expected.sort_by(|a, b| a.name.cmp(&b.name));
                assert_eq!(index.search(&query), expected, "query {query:?}");
            }
        }
    }

    #[test]
    fn empty_collection_is_built() {
        let index = CityIndex::from_cities(Arc::new(Vec::new()));
        assert!(index.is_built());
        assert!(index.search("a").is_empty());
        assert_eq!(index.bucket_count(), 0);
    }

    #[test]
    fn rebuild_replaces_buckets() {
        let mut index = CityIndex::from_cities(sample());
        let replacement = Arc::new(vec![city("9", "Zurich")]);
        index.build(replacement.clone());

        assert!(index.covers(&replacement));
        assert!(index.search("Al").is_empty());
        assert_eq!(names(&index.search("zur")), ["Zurich"]);
    }

    #[test]
    fn build_order_does_not_change_results() {
        let forward = CityIndex::from_cities(sample());
        let mut reversed: Vec<City> = sample().as_ref().clone();
        reversed.reverse();
        let backward = CityIndex::from_cities(Arc::new(reversed));

        for q in ["a", "al", "ala", "s", "syd", "q"] {
            assert_eq!(forward.search(q), backward.search(q));
        }
    }

    #[test]
    fn large_input_is_chunked() {
        let cities: Vec<City> = (0..(CHUNK_SIZE * 2 + 17))
            .map(|i| city(&i.to_string(), &format!("City {i:05}")))
            .collect();
        let index = CityIndex::from_cities(Arc::new(cities));

        assert_eq!(index.search("city").len(), CHUNK_SIZE * 2 + 17);
        assert_eq!(names(&index.search("City 02016")), ["City 02016"]);
    }

    #[test]
    fn unbuilt_index_finds_nothing() {
        let index = CityIndex::new();
        assert!(!index.is_built());
        assert!(index.search("a").is_empty());
    }
}
