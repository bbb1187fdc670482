//! cityscope: command-line interface for cityscope-core
//!
//! Usage examples
//! --------------
//!
//! - Show catalogue and cache status
//!   $ cityscope stats
//!
//! - Search cities by prefix
//!   $ cityscope search alb
//!
//! - Toggle and list favorites
//!   $ cityscope favorite 4829764
//!   $ cityscope favorites
//!
//! - Ten closest cities to a point
//!   $ cityscope nearby --lat 52.52 --lon 13.40
//!
//! - Weather for a city (needs OPENWEATHER_API_KEY)
//!   $ cityscope weather 2950159
//!
//! Data source
//! -----------
//!
//! The dataset is downloaded once and cached under the data directory for
//! seven days. Use `--input <path>` to read a local JSON file instead and
//! `--data-dir` to move the cache and the favorites database.
mod args;

use crate::args::{CliArgs, Commands};
use anyhow::{bail, Context};
use cityscope_core::{
    CacheFile, City, CityRepository, CitySource, FileCitySource, HttpCitySource, LoadState,
    RepositoryConfig, SqliteFavoritesStore, WeatherConfig, WeatherRepository,
};
use clap::Parser;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_city(city: &City) {
    let star = if city.is_favorite { "★" } else { " " };
    match city.distance {
        Some(km) => println!(
            "{star} {:>10}  {}  ({})  {:.1} km",
            city.id,
            city.display_name(),
            city.coordinates(),
            km
        ),
        None => println!(
            "{star} {:>10}  {}  ({})",
            city.id,
            city.display_name(),
            city.coordinates()
        ),
    }
}

async fn require_loaded(repo: &CityRepository) -> anyhow::Result<()> {
    match repo.load().await {
        LoadState::Loaded => Ok(()),
        state => bail!("no cities available, catalogue is {state} (see -v for details)"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    let mut config = match &args.data_dir {
        Some(dir) => RepositoryConfig::in_dir(dir),
        None => RepositoryConfig::default(),
    };
    if let Some(url) = &args.url {
        config.cities_url = url.clone();
    }

    let data_dir = config
        .cache_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();
    let favorites_path = args
        .favorites_db
        .clone()
        .unwrap_or_else(|| data_dir.join("favorites.sqlite"));
    let favorites = Arc::new(
        SqliteFavoritesStore::open(&favorites_path)
            .with_context(|| format!("opening favorites at {}", favorites_path.display()))?,
    );

    let source: Arc<dyn CitySource> = match &args.input {
        Some(path) => Arc::new(FileCitySource::new(path)),
        None => Arc::new(HttpCitySource::new(&config.cities_url, config.timeouts)?),
    };
    let cache = CacheFile::with_expiry(&config.cache_path, config.cache_expiry());
    debug!(
        source = %source.describe(),
        cache = %config.cache_path.display(),
        favorites = %favorites_path.display(),
        "cityscope starting"
    );
    let repo = CityRepository::new(source, cache, favorites);

    match args.command {
        Commands::Stats => {
            repo.load().await;
            let favorites = repo.get_favorites().await;
            let stats = repo.stats().await;
            println!("Catalogue statistics:");
            println!("  State: {}", stats.state);
            println!("  Cities: {}", stats.cities);
            println!("  Favorites: {}", favorites.len());
            println!(
                "  Search index: {} ({} buckets)",
                if stats.index_built { "built" } else { "not built" },
                stats.index_buckets
            );
            match stats.cache_age {
                Some(age) => println!(
                    "  Cache: {} ({} h old)",
                    repo.cache().path().display(),
                    age.as_secs() / 3600
                ),
                None => println!("  Cache: none"),
            }
        }

        Commands::List { limit } => {
            let cities = repo.get_cities().await;
            if cities.is_empty() {
                bail!("no cities available (see -v for details)");
            }
            for city in cities.iter().take(limit) {
                print_city(city);
            }
        }

        Commands::Search { query, limit } => {
            let query = query.trim();
            let matches = repo.search_cities(query).await;
            if matches.is_empty() {
                println!("No cities found matching: {query}");
            } else {
                for city in matches.iter().take(limit) {
                    print_city(city);
                }
                if matches.len() > limit {
                    println!("… {} more", matches.len() - limit);
                }
            }
        }

        Commands::Show { id } => {
            require_loaded(&repo).await?;
            match repo.get_city_by_id(&id).await {
                Some(city) => {
                    println!("City: {}", city.name);
                    println!("Id: {}", city.id);
                    println!("Country: {}", city.country);
                    if let Some(state) = &city.state {
                        println!("State: {state}");
                    }
                    if let Some(sub) = &city.subcountry {
                        println!("Subcountry: {sub}");
                    }
                    println!("Coordinates: {}", city.coordinates());
                    println!("Favorite: {}", if city.is_favorite { "yes" } else { "no" });
                }
                None => eprintln!("No city found for: {id}"),
            }
        }

        Commands::Favorite { id } => {
            // The name is cosmetic; toggling works without the catalogue.
            repo.load().await;
            let name = repo
                .get_city_by_id(&id)
                .await
                .map(|c| c.display_name())
                .unwrap_or_else(|| id.clone());
            let now_favorite = repo.toggle_favorite(&id).await?;
            if now_favorite {
                println!("★ {name} added to favorites");
            } else {
                println!("  {name} removed from favorites");
            }
        }

        Commands::Favorites => {
            let favorites = repo.get_favorites().await;
            if favorites.is_empty() {
                println!("No favorites yet.");
            }
            for city in &favorites {
                print_city(city);
            }
        }

        Commands::Nearby { lat, lon, limit } => {
            require_loaded(&repo).await?;
            repo.update_distances(lat, lon).await;
            let mut cities = repo.get_cities().await;
            cities.retain(|c| c.distance.is_some());
            if cities.is_empty() {
                bail!("no distances available for {lat}, {lon}");
            }
            cities.sort_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            for city in cities.iter().take(limit) {
                print_city(city);
            }
        }

        Commands::Weather { id } => {
            let Some(api_key) = args.api_key else {
                bail!("an API key is required (--api-key or OPENWEATHER_API_KEY)");
            };
            require_loaded(&repo).await?;
            let Some(city) = repo.get_city_by_id(&id).await else {
                bail!("No city found for: {id}");
            };

            let weather = WeatherRepository::from_config(&WeatherConfig {
                api_key,
                ..WeatherConfig::default()
            })?;
            let w = weather.get_weather(city.latitude, city.longitude).await?;
            println!("Weather in {}:", city.display_name());
            println!("  {:.1} °C, {}", w.temperature, w.description);
            println!("  Humidity: {}%", w.humidity);
            println!("  Wind: {:.1} m/s", w.wind_speed);
            println!("  Icon: {}", w.icon);
        }
    }

    Ok(())
}
