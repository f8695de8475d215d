//! Command-line surface: `discover`, `list`, `stream`, `scrape`.
//!
//! Exit codes: 0 on success, 2 on usage errors (clap's default), 1 on
//! runtime errors bubbled out of [`run`].

use std::io::{BufRead, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::cache::{DiskCache, RedisCache};
use crate::catalog::{UrlCatalog, DEFAULT_CATALOG_PATH};
use crate::config::{FailureStrategy, ScraperBuilder};
use crate::discovery::{urls_from_csv, urls_from_txt};
use crate::extract;
use crate::sink::{default_file_name, ConsoleSink, FileSink};
use crate::stream::StreamDispatcher;

const BANNER: &str = r"
   _____ _______ _____  ______          __  __    _____  _____ _____            _____  ______ _____
  / ____|__   __|  __ \|  ____|   /\   |  \/  |  / ____|/ ____|  __ \     /\   |  __ \|  ____|  __ \
 | (___    | |  | |__) | |__     /  \  | \  / | | (___ | |    | |__) |   /  \  | |__) | |__  | |__) |
  \___ \   | |  |  _  /|  __|   / /\ \ | |\/| |  \___ \| |    |  _  /   / /\ \ |  ___/|  __| |  _  /
  ____) |  | |  | | \ \| |____ / ____ \| |  | |  ____) | |____| | \ \  / ____ \| |    | |____| | \ \
 |_____/   |_|  |_|  \_\______/_/    \_\_|  |_| |_____/ \_____|_|  \_\/_/    \_\_|    |______|_|  \_\
";

#[derive(Parser)]
#[command(name = "sx", version, about = "Host-scoped stream scraping toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceKind {
    Sitemap,
    Txt,
    Csv,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SinkKind {
    File,
    Console,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CacheKind {
    Disk,
    Redis,
}

#[derive(Subcommand)]
enum Command {
    /// Seed a host's catalog from an extractor hook or a builtin source
    Discover {
        /// Builtin source; omit to run a registered extractor's hook
        #[arg(long = "from", value_enum)]
        from: Option<SourceKind>,
        /// Host the URLs belong to (e.g. example.com)
        #[arg(long)]
        host: Option<String>,
        /// Extractor name (hook mode) or source file path (txt/csv)
        arg: Option<String>,
    },
    /// Print every URL in a host's catalog
    List {
        #[arg(long)]
        host: String,
    },
    /// Publish a host's catalog onto the durable stream
    Stream {
        #[arg(long)]
        host: String,
        #[arg(long, env = "SX_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
        redis_url: String,
    },
    /// Run the fetch engine for a host
    Scrape(ScrapeArgs),
}

#[derive(Args)]
struct ScrapeArgs {
    /// Registered extractor name
    extractor: String,
    #[arg(long)]
    host: String,
    /// Target requests per second
    #[arg(long, default_value_t = 10.0)]
    qps: f64,
    /// Maximum in-flight requests
    #[arg(long, default_value_t = 10)]
    concurrency: usize,
    /// Path regex; repeat for several filters
    #[arg(long = "filter")]
    filters: Vec<String>,
    /// Stop starting new work after the first fetch failure
    #[arg(long)]
    stop_on_fail: bool,
    /// Cache fetched bodies instead of extracting them
    #[arg(long, value_enum)]
    cache: Option<CacheKind>,
    #[arg(long, env = "SX_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,
    /// Consume from the shared stream instead of the local catalog
    #[arg(long)]
    distributed: bool,
    /// Consumer name override in distributed mode
    #[arg(long)]
    consumer: Option<String>,
    /// Show a progress bar
    #[arg(long)]
    progress: bool,
    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,
    /// Record destination
    #[arg(long, value_enum)]
    sink: Option<SinkKind>,
    /// Sink file path; defaults to <host-with-dashes>.csv
    #[arg(long)]
    out: Option<PathBuf>,
    /// Catalog store directory
    #[arg(long, default_value = DEFAULT_CATALOG_PATH)]
    store: PathBuf,
}

/// Parse arguments and dispatch. The binary's whole behavior lives here so
/// `main` stays a thin shim.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    eprintln!("{BANNER}");
    extract::register_builtins();

    match cli.command {
        Command::Discover { from, host, arg } => discover(from, host, arg).await,
        Command::List { host } => list(&host),
        Command::Stream { host, redis_url } => stream(&host, &redis_url).await,
        Command::Scrape(args) => scrape(args).await,
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn discover(
    from: Option<SourceKind>,
    host: Option<String>,
    arg: Option<String>,
) -> anyhow::Result<()> {
    let require_host =
        || host.clone().context("--host is required (e.g. --host example.com)");

    match from {
        None => {
            let name = arg.context(
                "extractor name required (e.g. `sx discover page-dump --host example.com`)",
            )?;
            let extractor = extract::resolve(&name).with_context(|| {
                format!(
                    "unknown extractor {name:?}; registered: {}",
                    extract::names().join(", ")
                )
            })?;
            let catalog = UrlCatalog::open(&require_host()?, DEFAULT_CATALOG_PATH)?;
            extractor.discover(&catalog)?;
            Ok(())
        }
        Some(SourceKind::Sitemap) => {
            let host = require_host()?;
            let scraper = ScraperBuilder::new().host(&host).qps(10.0).build()?;
            let added = scraper.discover_from_sitemap().await?;
            println!("discovered {added} urls for {host}");
            Ok(())
        }
        Some(kind) => {
            let host = require_host()?;
            let path = arg.with_context(|| format!("source path required for --from {kind:?}"))?;
            let urls = match kind {
                SourceKind::Txt => urls_from_txt(Path::new(&path))?,
                SourceKind::Csv => urls_from_csv(Path::new(&path))?,
                SourceKind::Sitemap => unreachable!("handled above"),
            };
            let catalog = UrlCatalog::open(&host, DEFAULT_CATALOG_PATH)?;
            for url in &urls {
                catalog.add(url)?;
            }
            println!("enqueued {} urls for {host}", urls.len());
            Ok(())
        }
    }
}

fn list(host: &str) -> anyhow::Result<()> {
    let catalog = UrlCatalog::open(host, DEFAULT_CATALOG_PATH)?;
    let mut count = 0;
    for entry in catalog.iterate(None) {
        let (_, url) = entry?;
        println!("{url}");
        count += 1;
    }
    println!("Total: {count} urls");
    Ok(())
}

async fn stream(host: &str, redis_url: &str) -> anyhow::Result<()> {
    let catalog = Arc::new(UrlCatalog::open(host, DEFAULT_CATALOG_PATH)?);
    let dispatcher = StreamDispatcher::connect(redis_url, catalog).await?;
    let produced = dispatcher.start_stream().await?;
    println!(
        "Stream started. name: {} ({produced} entries)",
        dispatcher.stream_name()
    );
    Ok(())
}

async fn scrape(args: ScrapeArgs) -> anyhow::Result<()> {
    let extractor = extract::resolve(&args.extractor).with_context(|| {
        format!(
            "unknown extractor {:?}; registered: {}",
            args.extractor,
            extract::names().join(", ")
        )
    })?;

    let mut builder = ScraperBuilder::new()
        .host(&args.host)
        .qps(args.qps)
        .max_concurrency(args.concurrency)
        .catalog_path(&args.store)
        .verify_tls(!args.insecure)
        .progress(args.progress)
        .redis_url(&args.redis_url)
        .extractor(extractor);
    if args.stop_on_fail {
        builder = builder.strategy(FailureStrategy::StopOnFail);
    }
    for pattern in &args.filters {
        builder = builder.filter(pattern);
    }
    builder = match args.sink {
        Some(SinkKind::Console) => builder.sink(Box::new(ConsoleSink::default())),
        _ => {
            let path = args
                .out
                .clone()
                .unwrap_or_else(|| PathBuf::from(default_file_name(&args.host)));
            builder.sink(Box::new(FileSink::new(path)))
        }
    };
    match args.cache {
        Some(CacheKind::Disk) => builder = builder.cache(Arc::new(DiskCache::default())),
        Some(CacheKind::Redis) => {
            builder = builder.cache(Arc::new(RedisCache::connect(&args.redis_url).await?));
        }
        None => {}
    }
    let scraper = builder.build()?;

    // A piped stdin feeds the catalog before the run.
    if !std::io::stdin().is_terminal() {
        let stdin = std::io::stdin();
        let mut enqueued = 0;
        for line in stdin.lock().lines() {
            let line = line?;
            let url = line.trim();
            if !url.is_empty() {
                scraper.enqueue(url)?;
                enqueued += 1;
            }
        }
        if enqueued > 0 {
            tracing::info!(enqueued, "enqueued urls from stdin");
        }
    }

    if args.distributed {
        let consumer = scraper.stream_consumer(args.consumer.clone()).await?;
        tracing::info!(
            consumer = consumer.consumer_name(),
            stream = consumer.stream_name(),
            "consuming from stream"
        );
        consumer.scrape().await?;
    } else {
        scraper.scrape().await?;
    }
    Ok(())
}
