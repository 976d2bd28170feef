//! Dashboard API server.
//!
//! Serves the aggregated listing snapshot, per-bucket drill-downs, location
//! resolution and admin boundaries over HTTP.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use casadash::aggregate::AggregationEngine;
use casadash::config::Config;
use casadash::georef::{GeometryFetcher, GeorefClient};
use casadash::listings::PostgrestClient;
use casadash::resolver::AdminIndexCache;

mod routes;
use routes::{router, AppState};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "dashboard")]
#[command(about = "Listings dashboard API server")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "casadash.toml")]
    config: String,

    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    listen: String,

    /// Build the admin index before accepting requests
    #[arg(long)]
    warm: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("Casadash Dashboard Server");
    let config = Config::load_from_file(&args.config)
        .with_context(|| format!("loading config from {}", args.config))?;

    let georef = GeorefClient::new(&config.georef)?;
    let store = PostgrestClient::new(&config.listings)?;
    info!("Listing store at {}", config.listings.base_url);

    let cache = Arc::new(AdminIndexCache::new(
        Arc::new(georef.clone()),
        config.georef.page_size,
        config.cache.ttl(),
    ));
    info!("Admin index cache TTL {}h", cache.ttl().num_hours());

    if args.warm {
        match cache.get().await {
            Ok(index) => info!("Admin index ready: {:?}", index.stats()),
            // The index is rebuilt on first use; serving can start without it.
            Err(e) => warn!("Admin index warm-up failed: {}", e),
        }
    }

    let state = Arc::new(AppState {
        engine: AggregationEngine::new(Arc::new(store), Arc::clone(&cache), config.aggregation),
        cache,
        geometry: GeometryFetcher::new(georef),
    });

    let app = router(state);

    info!("Starting server on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
