//! Favorites example for cityscope
//!
//! Shows favorite toggling and a live view that re-emits whenever the
//! favorites change.

use cityscope::{CacheFile, CityRepository, FileCitySource, Result, SqliteFavoritesStore};
use std::sync::Arc;

const DATASET: &str = r#"[
    {"_id": "707860", "name": "Hurzuf", "country": "UA", "coord": {"lon": 34.283333, "lat": 44.549999}},
    {"_id": "519188", "name": "Novinki", "country": "RU", "coord": {"lon": 37.666668, "lat": 55.683334}},
    {"_id": "1283378", "name": "Gorkhā", "country": "NP", "coord": {"lon": 84.633331, "lat": 28}}
]"#;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== cityscope Favorites Example ===\n");

    let dir = std::env::temp_dir().join("cityscope-favorites");
    std::fs::create_dir_all(&dir)?;
    let dataset = dir.join("dataset.json");
    std::fs::write(&dataset, DATASET)?;

    let repo = CityRepository::new(
        Arc::new(FileCitySource::new(&dataset)),
        CacheFile::new(dir.join("cache").join("cities.json")),
        Arc::new(SqliteFavoritesStore::open(dir.join("favorites.sqlite"))?),
    );

    let mut live = repo.watch_cities();
    if let Some(view) = live.next().await {
        print_view("initial", &view);
    }

    for id in ["707860", "1283378", "707860"] {
        let now_favorite = repo.toggle_favorite(id).await?;
        println!("toggled {id}: favorite = {now_favorite}");
        if let Some(view) = live.next().await {
            print_view("live", &view);
        }
    }

    match repo.get_city_by_id("1283378").await {
        Some(city) => println!("\n{} is favorite: {}", city.display_name(), city.is_favorite),
        None => println!("\ncity 1283378 not found"),
    }

    Ok(())
}

fn print_view(label: &str, view: &[cityscope::City]) {
    let marked: Vec<String> = view
        .iter()
        .map(|c| format!("{}{}", if c.is_favorite { "★" } else { "" }, c.name))
        .collect();
    println!("  [{label}] {marked:?}");
}
