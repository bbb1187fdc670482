use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for cityscope
#[derive(Debug, Parser)]
#[command(
    name = "cityscope",
    version,
    about = "CLI for browsing, searching and bookmarking cities"
)]
pub struct CliArgs {
    /// Directory holding the cached dataset and the favorites database
    /// (default: $CITYSCOPE_DATA_DIR or ./data)
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// URL of the cities JSON dataset
    #[arg(short = 'u', long = "url", global = true)]
    pub url: Option<String>,

    /// Read the dataset from a local JSON file instead of the network
    #[arg(short = 'i', long = "input", global = true, conflicts_with = "url")]
    pub input: Option<PathBuf>,

    /// Path to the favorites database (default: <data-dir>/favorites.sqlite)
    #[arg(long = "favorites-db", global = true)]
    pub favorites_db: Option<PathBuf>,

    /// OpenWeatherMap API key, used by `weather`
    #[arg(long = "api-key", env = "OPENWEATHER_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show a summary of the catalogue and its cache
    Stats,

    /// List cities in dataset order
    List {
        /// Maximum number of cities to print
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Search cities by name prefix (case-insensitive)
    Search {
        /// Prefix to search, e.g. "Alb"
        query: String,

        /// Maximum number of cities to print
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Show one city by id
    Show {
        /// City id (e.g. 707860)
        id: String,
    },

    /// Toggle a city's favorite flag
    Favorite {
        /// City id
        id: String,
    },

    /// List favorite cities
    Favorites,

    /// List cities closest to a point
    Nearby {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Maximum number of cities to print
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Current weather for a city
    Weather {
        /// City id
        id: String,
    },
}
