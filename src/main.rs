//! sweepcache demo
//!
//! Fills a cache with keys on staggered expiry times and watches the
//! sweeper and the eviction workers drain it.

use anyhow::Context;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sweepcache::{CacheConfig, Expirable, ExpiryCache};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Demo configuration
struct Config {
    /// Number of keys to insert
    keys: u64,
    /// Cache configuration
    cache: CacheConfig,
    /// Give up waiting after this long
    timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keys: 999,
            cache: CacheConfig::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> anyhow::Result<Self> {
        let mut config = Config::default();
        let mut args = std::env::args().skip(1);

        while let Some(arg) = args.next() {
            let mut value = |name: &str| {
                args.next()
                    .with_context(|| format!("{name} requires a value"))
            };

            match arg.as_str() {
                "--keys" | "-k" => {
                    config.keys = value("--keys")?.parse().context("invalid key count")?;
                }
                "--interval-ms" | "-i" => {
                    let ms: u64 = value("--interval-ms")?
                        .parse()
                        .context("invalid interval")?;
                    config.cache.sweep_interval = Duration::from_millis(ms);
                }
                "--shards" | "-s" => {
                    config.cache.shard_count =
                        value("--shards")?.parse().context("invalid shard count")?;
                }
                "--workers" | "-w" => {
                    config.cache.worker_count =
                        value("--workers")?.parse().context("invalid worker count")?;
                }
                "--hour" => {
                    config.cache.full_sweep_hour =
                        value("--hour")?.parse().context("invalid hour")?;
                }
                "--timeout" => {
                    let secs: u64 = value("--timeout")?.parse().context("invalid timeout")?;
                    config.timeout = Duration::from_secs(secs);
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("sweepcache version {}", sweepcache::VERSION);
                    std::process::exit(0);
                }
                other => {
                    print_help();
                    anyhow::bail!("unknown argument: {other}");
                }
            }
        }

        Ok(config)
    }
}

fn print_help() {
    println!(
        r#"
sweepcache - expiring u64 cache demo

USAGE:
    sweepcache [OPTIONS]

OPTIONS:
    -k, --keys <N>            Keys to insert (default: 999)
    -i, --interval-ms <MS>    Sweep interval in milliseconds (default: 500)
    -s, --shards <N>          Shard count (default: 16)
    -w, --workers <N>         Eviction callback workers (default: 4)
        --hour <H>            Local hour arming the daily full sweep (default: 3)
        --timeout <SECS>      Stop waiting after this long (default: 30)
    -v, --version             Print version information
        --help                Print this help message

Set RUST_LOG=sweepcache=debug to watch individual sweeps.
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args()?;

    // Set up logging
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let evicted = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&evicted);
    let cache = ExpiryCache::with_config(config.cache.clone(), move |_value: u64| {
        counter.fetch_add(1, Ordering::Relaxed);
    })
    .context("failed to build cache")?;

    // Three keys per second of lifetime, like a stream of sessions
    let now = Instant::now();
    for key in 1..=config.keys {
        cache.put(key, Expirable::new(key, now, key / 3));
    }
    info!(keys = cache.len(), "Cache populated");

    let deadline = Instant::now() + config.timeout;
    while !cache.is_empty() {
        if Instant::now() >= deadline {
            warn!(remaining = cache.len(), "Timed out waiting for the cache to drain");
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        info!(
            size = cache.len(),
            index = cache.index_len(),
            evicted = evicted.load(Ordering::Relaxed),
            "Progress"
        );
    }

    // Workers block the runtime thread while joining
    let cache = Arc::new(cache);
    let handle = Arc::clone(&cache);
    tokio::task::spawn_blocking(move || handle.shutdown()).await?;

    let stats = cache.stats();
    info!(
        evicted = evicted.load(Ordering::Relaxed),
        sample_sweeps = stats.sweeps.sample_sweeps,
        full_sweeps = stats.sweeps.full_sweeps,
        expired = stats.storage.expired,
        "Demo finished"
    );

    Ok(())
}
