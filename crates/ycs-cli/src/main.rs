//! YouTube Control Suite CLI
//!
//! Developer tool for inspecting settings records, testing the members-only
//! response filter and checking quality selection outside the browser.

use std::fs;

use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::Value;

use ycs_core::filters::{filter_sponsored, should_intercept};
use ycs_core::player::closest_available_quality;
use ycs_core::store::decode_settings;
use ycs_core::{ExtensionSettings, PageKind, Quality, SettingsStorage, SettingsStore, StoreConfig};

mod response;
mod storage;

use response::ResponseSource;
use storage::FileStorage;

#[derive(Parser)]
#[command(name = "ycs-cli")]
#[command(about = "YouTube Control Suite settings and filter tools")]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the default settings record
    Defaults {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Write default settings into a storage file when none are stored
    Init {
        /// Storage area JSON file
        #[arg(short, long)]
        storage: String,
    },

    /// Backfill a stored settings record against the defaults
    Migrate {
        /// Storage area JSON file
        #[arg(short, long)]
        storage: String,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove members-only items from an intercepted API response
    Filter {
        /// Response body file, or an API URL to fetch
        #[arg(short, long)]
        input: String,

        /// Write the filtered body here
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Show which quality the player would be set to
    Quality {
        /// Preferred quality, e.g. hd1080
        #[arg(short, long)]
        preferred: String,

        /// Levels the player offers, e.g. hd720 large medium
        #[arg(short, long, num_args = 1.., required = true)]
        available: Vec<String>,
    },

    /// Classify a YouTube URL
    Classify {
        url: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Commands::Defaults { output } => cmd_defaults(output.as_deref()),
        Commands::Init { storage } => cmd_init(&storage).await,
        Commands::Migrate { storage, dry_run } => cmd_migrate(&storage, dry_run).await,
        Commands::Filter { input, output } => cmd_filter(&input, output.as_deref()).await,
        Commands::Quality { preferred, available } => cmd_quality(&preferred, &available),
        Commands::Classify { url } => cmd_classify(&url),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_defaults(output: Option<&str>) -> Result<(), String> {
    let text = serde_json::to_string_pretty(&ExtensionSettings::default())
        .map_err(|e| format!("Failed to encode defaults: {}", e))?;
    match output {
        Some(path) => {
            fs::write(path, text).map_err(|e| format!("Failed to write '{}': {}", path, e))?;
            println!("Wrote default settings to '{}'", path);
        }
        None => println!("{}", text),
    }
    Ok(())
}

async fn cmd_init(path: &str) -> Result<(), String> {
    let store = SettingsStore::new(FileStorage::new(path));
    if store.initialize().await {
        println!("Initialized '{}' with default settings", path);
    } else {
        println!("'{}' already holds settings; nothing written", path);
    }
    Ok(())
}

async fn cmd_migrate(path: &str, dry_run: bool) -> Result<(), String> {
    let storage = FileStorage::new(path);
    let key = StoreConfig::default().storage_key;
    let raw = storage
        .get(&key)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("No '{}' record in '{}'", key, path))?;

    let (settings, migration) = decode_settings(&raw);
    if !migration.changed() {
        println!("Settings in '{}' are up to date", path);
        return Ok(());
    }

    println!("Settings in '{}' need {} change(s):", path, migration.added.len());
    for added in &migration.added {
        println!("  + {}", added);
    }
    println!("  Player features enabled: {}", settings.any_player_feature_enabled());
    println!("  Content filters enabled: {}", settings.any_filter_enabled());

    if dry_run {
        println!("Dry run; nothing written");
        return Ok(());
    }

    storage
        .set(&key, migration.settings)
        .await
        .map_err(|e| e.to_string())?;
    println!("Wrote migrated settings to '{}'", storage.path().display());
    Ok(())
}

async fn cmd_filter(input: &str, output: Option<&str>) -> Result<(), String> {
    let source = ResponseSource::parse(input);
    if let Some(url) = source.endpoint() {
        if !should_intercept(url) {
            return Err(format!("'{}' is not a filtered API endpoint", url));
        }
    }

    let body = source.load(&Client::new()).await?;
    let mut value: Value = serde_json::from_str(&body).map_err(|e| format!("Response is not JSON: {}", e))?;
    let removed = filter_sponsored(&mut value);

    println!("Removed {} members-only item(s)", removed.len());
    for title in &removed {
        println!("  - {}", title);
    }

    if let Some(path) = output {
        let text = serde_json::to_string(&value).map_err(|e| format!("Failed to encode response: {}", e))?;
        fs::write(path, text).map_err(|e| format!("Failed to write '{}': {}", path, e))?;
        println!("Wrote filtered response to '{}'", path);
    }
    Ok(())
}

fn cmd_quality(preferred: &str, available: &[String]) -> Result<(), String> {
    let preferred = Quality::parse(preferred).ok_or_else(|| format!("Unknown quality '{}'", preferred))?;
    let mut levels = Vec::with_capacity(available.len());
    for level in available {
        match Quality::parse(level) {
            Some(q) => levels.push(q),
            None => log::warn!(target: "ycs::quality", "Ignoring unknown quality level '{}'", level),
        }
    }

    match closest_available_quality(preferred, &levels) {
        Some(q) => println!("{} -> {} ({})", preferred, q.as_str(), q.label()),
        None => println!("{} -> no usable level; quality left unchanged", preferred),
    }
    Ok(())
}

fn cmd_classify(url: &str) -> Result<(), String> {
    let kind = PageKind::classify(url);
    println!("{}", kind.name());
    println!("  Grid page:  {}", kind.is_grid());
    Ok(())
}
