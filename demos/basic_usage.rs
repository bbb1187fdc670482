//! Basic usage example for cityscope
//!
//! Loads a small dataset through the repository, searches it by prefix and
//! annotates distances from a reference point.

use cityscope::{CacheFile, CityRepository, FileCitySource, Result, SqliteFavoritesStore};
use std::sync::Arc;

const DATASET: &str = r#"[
    {"_id": 4829764, "name": "Alabama", "country": "US", "coord": {"lon": -86.75026, "lat": 32.750408}},
    {"_id": 5454711, "name": "Albuquerque", "country": "US", "coord": {"lon": -106.651138, "lat": 35.084492}},
    {"_id": 5323810, "name": "Anaheim", "country": "US", "coord": {"lon": -117.914497, "lat": 33.835289}},
    {"_id": 5551752, "name": "Arizona", "country": "US", "coord": {"lon": -111.500977, "lat": 34.500301}},
    {"_id": 2147714, "name": "Sydney", "country": "AU", "coord": {"lon": 151.207321, "lat": -33.867851}}
]"#;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== cityscope Basic Usage Example ===\n");

    let dir = std::env::temp_dir().join("cityscope-basic-usage");
    std::fs::create_dir_all(&dir)?;
    let dataset = dir.join("dataset.json");
    std::fs::write(&dataset, DATASET)?;

    let repo = CityRepository::new(
        Arc::new(FileCitySource::new(&dataset)),
        CacheFile::new(dir.join("cache").join("cities.json")),
        Arc::new(SqliteFavoritesStore::open_in_memory()?),
    );

    // Example 1: everything
    println!("--- Example 1: All cities ---");
    for city in repo.get_cities().await {
        println!("  {} ({})", city.display_name(), city.coordinates());
    }
    println!();

    // Example 2: prefix search
    println!("--- Example 2: Prefix search ---");
    for query in ["A", "Al", "Alb", "s", "xyz"] {
        let hits: Vec<String> = repo
            .search_cities(query)
            .await
            .into_iter()
            .map(|c| c.name)
            .collect();
        println!("  {query:>4} -> {hits:?}");
    }
    println!();

    // Example 3: distances from Null Island
    println!("--- Example 3: Distances from (0, 0) ---");
    repo.update_distances(0.0, 0.0).await;
    for city in repo.get_cities().await {
        println!("  {:<12} {:>9.1} km", city.name, city.distance.unwrap_or_default());
    }

    let stats = repo.stats().await;
    println!("\nState: {}, cities: {}, index buckets: {}", stats.state, stats.cities, stats.index_buckets);

    Ok(())
}
