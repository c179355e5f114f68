//! Headless tile viewer.
//!
//! Drives the viewer state pipeline against a data server:
//! - Loads datasets, the palette catalog, descriptions and times
//! - Keeps the tiles covering the configured viewport fetched for the current frame
//! - Advances the animation on a fixed clock, pausing while tiles load
//! - Logs each frame as it is shown

mod config;
mod scheduler;
mod session;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tile_fetch::{FetchCache, HttpFetcher, ViewerApi};
use viewer_common::Endpoints;
use viewer_store::{Pipeline, State, Store};

use config::ViewerConfig;
use scheduler::AnimationScheduler;
use session::Session;

#[derive(Parser, Debug)]
#[command(name = "viewer")]
#[command(about = "Headless animated tile viewer")]
struct Args {
    /// Configuration file (YAML)
    #[arg(short, long, env = "VIEWER_CONFIG")]
    config: Option<PathBuf>,

    /// Data server base URL (overrides the config file)
    #[arg(long, env = "VIEWER_BASE_URL")]
    base_url: Option<String>,

    /// Animation period in milliseconds (overrides the config file)
    #[arg(long)]
    period_ms: Option<u64>,

    /// Number of most recent times to load per dataset
    #[arg(long)]
    times_limit: Option<usize>,

    /// Start playing as soon as times are loaded
    #[arg(long)]
    autoplay: bool,

    /// Print the tile URLs for the configured viewport and exit
    #[arg(long)]
    once: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(period_ms) = args.period_ms {
        config.animation.period_ms = period_ms;
    }
    if let Some(times_limit) = args.times_limit {
        config.times_limit = times_limit;
    }
    config.animation.autoplay |= args.autoplay;
    config.validate()?;

    info!(base_url = %config.base_url, "Starting tile viewer");

    let store = Store::new(State::default(), Pipeline::standard());
    let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(
        config.request_timeout_secs,
    ))?);
    let api = ViewerApi::new(Endpoints::new(config.base_url.as_str()), fetcher.clone());
    let cache = FetchCache::new(fetcher).with_store(store.clone());
    let period = Duration::from_millis(config.animation.period_ms);
    let session = Arc::new(Session::new(config, store.clone(), api, cache));

    if args.once {
        session.load_catalog().await?;
        if let Some(dataset) = session.store().state().dataset.clone() {
            session.load_dataset(&dataset).await?;
        }
        match session.wanted_urls(&session.store().state())? {
            Some(urls) => {
                for url in urls {
                    println!("{}", url);
                }
            }
            None => info!("Nothing to fetch: no viewport or no times"),
        }
        return Ok(());
    }

    let subscriptions = session.watch(Handle::current());
    session.load_catalog().await?;

    // Shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx_clone.send(()).ok();
    });

    let clock = AnimationScheduler::new(store.clone(), period).spawn(shutdown_tx.subscribe());
    clock.await?;

    drop(subscriptions);
    store.close();

    let stats = session.cache().stats();
    info!(
        requests = stats.requests(),
        deduplicated = stats.deduplicated(),
        reused = stats.reused(),
        failures = stats.failures(),
        "Viewer session complete"
    );

    Ok(())
}
