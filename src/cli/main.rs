//! Command-line access to the dashboard core.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use casadash::aggregate::AggregationEngine;
use casadash::config::{CacheConfig, Config, GeorefConfig};
use casadash::georef::GeorefClient;
use casadash::listings::PostgrestClient;
use casadash::resolver::AdminIndexCache;
use casadash::typology::infer_typology;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "casadash-cli")]
#[command(about = "Resolve locations and build dashboard snapshots from the command line")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "casadash.toml", global = true)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a free-text location to district / municipality / parish
    Resolve {
        text: String,
    },
    /// Infer the typology label for a listing
    Typology {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        bedrooms: Option<f64>,
    },
    /// Aggregate every active listing and print the snapshot as JSON
    Snapshot,
    /// Build the admin index and print its size per level
    IndexStats,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays pipeable JSON
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    match args.command {
        Command::Typology { title, bedrooms } => {
            println!("{}", infer_typology(title.as_deref(), bedrooms));
        }
        Command::Resolve { text } => {
            let (georef, cache) = admin_config(&args.config)?;
            let cache = admin_cache(&georef, &cache)?;
            let resolved = cache.resolver().await?.resolve(&text);
            println!("{}", serde_json::to_string_pretty(&resolved)?);
        }
        Command::IndexStats => {
            let (georef, cache) = admin_config(&args.config)?;
            let cache = admin_cache(&georef, &cache)?;
            let stats = cache.get().await?.stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Snapshot => {
            let config = load_config(&args.config)?;
            let cache = Arc::new(admin_cache(&config.georef, &config.cache)?);
            let store = PostgrestClient::new(&config.listings)?;
            let engine = AggregationEngine::new(Arc::new(store), cache, config.aggregation);

            let snapshot = engine.aggregate().await?;
            info!(
                "Snapshot of {} listings in {} pages",
                snapshot.rows_scanned, snapshot.pages_scanned
            );
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    Ok(())
}

fn load_config(path: &str) -> Result<Config> {
    Config::load_from_file(path).with_context(|| format!("loading config from {}", path))
}

/// Admin-only commands run without a config file, using defaults.
fn admin_config(path: &str) -> Result<(GeorefConfig, CacheConfig)> {
    if std::path::Path::new(path).exists() {
        let config = load_config(path)?;
        Ok((config.georef, config.cache))
    } else {
        info!("{} not found, using default georef and cache settings", path);
        Ok((GeorefConfig::default(), CacheConfig::default()))
    }
}

fn admin_cache(georef: &GeorefConfig, cache: &CacheConfig) -> Result<AdminIndexCache> {
    let client = GeorefClient::new(georef)?;
    Ok(AdminIndexCache::new(Arc::new(client), georef.page_size, cache.ttl()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_admin_cache_uses_configured_ttl() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[listings]
base_url = "http://localhost:54321/rest/v1"
api_key = "anon"

[cache]
ttl_hours = 3
"#
        )
        .unwrap();

        let (georef, cache) = admin_config(file.path().to_str().unwrap()).unwrap();
        let cache = admin_cache(&georef, &cache).unwrap();
        assert_eq!(cache.ttl(), chrono::Duration::hours(3));
    }

    #[test]
    fn test_admin_cache_defaults_without_config_file() {
        let (georef, cache) = admin_config("/nonexistent/casadash.toml").unwrap();
        let cache = admin_cache(&georef, &cache).unwrap();
        assert_eq!(cache.ttl(), CacheConfig::default().ttl());
        assert_eq!(cache.ttl(), chrono::Duration::hours(12));
    }
}
