//! Load command - load one parent region and write the merged collection.

use std::path::PathBuf;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::{info, warn};

use regionload::cache::{DiskCacheProvider, RegionCacheClient};
use regionload::config::ConfigFile;
use regionload::feature::FeatureCollection;
use regionload::loader::RegionLoader;
use regionload::region::{HttpKeyResolver, Partition};
use regionload::session::{LoadContext, LoaderConfig, SessionReport, SessionState};
use regionload::source::{HttpPageSource, ReqwestClient};
use regionload::writeback::{CacheWriteback, HttpWriteback};

use crate::error::CliError;

/// Arguments for the load command.
pub struct LoadArgs {
    pub parent: String,
    pub output: Option<PathBuf>,
    pub partition: Option<String>,
    pub base_url: Option<String>,
    pub resolver_url: Option<String>,
    pub no_writeback: bool,
    pub concurrency: Option<usize>,
}

/// Settings resolved from CLI arguments and the config file.
struct ResolvedLoad {
    base_url: String,
    resolver_url: String,
    partition: Partition,
    loader_config: LoaderConfig,
    writeback_url: Option<String>,
}

/// Run the load command.
///
/// `bar` is drawn on stderr while the session runs; console logging goes
/// through it so log lines do not tear the bar.
pub fn run(args: LoadArgs, config: &ConfigFile, bar: ProgressBar) -> Result<(), CliError> {
    let resolved = resolve(&args, config)?;

    println!("regionload v{}", regionload::VERSION);
    println!("Parent:    {}", args.parent);
    println!("Partition: {} ({} per page)", resolved.partition.name, resolved.partition.page_size);
    println!("Source:    {}", resolved.base_url);
    println!();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(load(&args.parent, config, &resolved, bar))?;

    print_summary(&report);

    if let Some(path) = &args.output {
        let body = FeatureCollection::new(&report.features)
            .to_json_vec()
            .map_err(|e| CliError::Output(e.to_string()))?;
        std::fs::write(path, body).map_err(|e| CliError::Output(format!("{}: {}", path.display(), e)))?;
        println!("Wrote {} features to {}", report.features.len(), path.display());
    }

    Ok(())
}

/// Merge CLI overrides with the config file.
fn resolve(args: &LoadArgs, config: &ConfigFile) -> Result<ResolvedLoad, CliError> {
    let base_url = args
        .base_url
        .clone()
        .or_else(|| config.source.base_url.clone())
        .ok_or_else(|| {
            CliError::Config(
                "No feature endpoint specified. Use --base-url or set base_url in config.ini [source] section."
                    .to_string(),
            )
        })?;
    let resolver_url = args
        .resolver_url
        .clone()
        .or_else(|| config.source.resolver_url.clone())
        .ok_or_else(|| {
            CliError::Config(
                "No region resolver specified. Use --resolver-url or set resolver_url in config.ini [source] section."
                    .to_string(),
            )
        })?;

    let mut partition = config.partition();
    if let Some(name) = &args.partition {
        partition = Partition::new(name.clone(), partition.page_size);
    }

    let mut loader_config = config.loader_config();
    if let Some(n) = args.concurrency {
        loader_config = loader_config.with_max_concurrent_keys(n);
    }

    let writeback_url = if args.no_writeback || !config.writeback.enabled {
        None
    } else {
        config.writeback.url.clone()
    };

    Ok(ResolvedLoad {
        base_url,
        resolver_url,
        partition,
        loader_config,
        writeback_url,
    })
}

async fn load(
    parent: &str,
    config: &ConfigFile,
    resolved: &ResolvedLoad,
    bar: ProgressBar,
) -> Result<SessionReport, CliError> {
    let http = ReqwestClient::new()?;
    let partition = resolved.partition.clone();

    let source = HttpPageSource::new(http.clone(), &resolved.base_url, partition.clone());
    let resolver = HttpKeyResolver::new(http.clone(), &resolved.resolver_url);
    let cache = RegionCacheClient::new(
        Arc::new(DiskCacheProvider::new(&config.cache.directory)),
        partition.name.clone(),
    );

    // The session's own writeback is fire-and-forget; the CLI submits after
    // the session so the process does not exit before the request finishes.
    let ctx = LoadContext::new(Arc::new(resolver), Arc::new(source), cache)
        .with_config(resolved.loader_config.clone());
    let loader = RegionLoader::detached(ctx);

    bar.set_draw_target(ProgressDrawTarget::stderr());
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
            .map_err(|e| CliError::Config(e.to_string()))?
            .progress_chars("=> "),
    );
    let progress_bar = bar.clone();
    loader.on_progress(move |event| {
        progress_bar.set_length(event.total_count as u64);
        progress_bar.set_position(event.loaded_count as u64);
        progress_bar.set_message(event.message.clone());
    });

    let handle = loader.start_load(parent).await;
    let cancel = handle.cancel_handle();
    ctrlc::set_handler(move || cancel.cancel())
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let result = handle.join().await;
    bar.finish_and_clear();
    let report = result?;

    if report.state == SessionState::Completed {
        if let Some(url) = &resolved.writeback_url {
            let writeback = HttpWriteback::new(http, url, partition.name.clone());
            match writeback.submit(parent, report.features.clone()).await {
                Ok(()) => info!(parent = %parent, "Writeback submitted"),
                Err(e) => warn!(parent = %parent, error = %e, "Writeback failed"),
            }
        }
    }

    Ok(report)
}

fn print_summary(report: &SessionReport) {
    let stats = &report.stats;
    match report.state {
        SessionState::Cancelled => println!(
            "Cancelled after {} of {} regions",
            stats.loaded_keys, report.total_keys
        ),
        _ => println!("Loaded {} regions", report.total_keys),
    }
    println!("  From cache: {}", stats.cached_keys);
    println!("  Fetched:    {} ({} pages)", stats.fetched_keys, stats.network_pages);
    if stats.failed_keys > 0 {
        println!("  Failed:     {}", stats.failed_keys);
    }
    println!("  Features:   {}", report.features.len());
}
