use std::time::Duration;

use cachet_engine::{CacheConfig, DownloadCoordinator, DownloaderConfig};
use clap::Parser;
use error::AppError;
use tracing::{Level, debug, error};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod error;
mod utils;

use cli::{CliArgs, Commands};
use commands::CommandExecutor;
use utils::parse_headers;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    let args = CliArgs::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // RUST_LOG wins over -v when set
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(args.verbose)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    let cache_config = cache_config(&args);

    let http_config = {
        let mut builder = DownloaderConfig::builder()
            .with_timeout(Duration::from_secs(args.timeout))
            .with_connect_timeout(Duration::from_secs(args.connect_timeout));
        if let Some(user_agent) = &args.user_agent {
            builder = builder.with_user_agent(user_agent);
        }
        builder.build()
    };

    debug!(
        cache_dir = %cache_config.cache_location.display(),
        query_params = ?args.query_params,
        timeout_s = args.timeout,
        connect_timeout_s = args.connect_timeout,
        "Configuration"
    );

    let coordinator = DownloadCoordinator::http(cache_config, &http_config)?;
    let executor = CommandExecutor::new(coordinator);

    match args.command {
        Commands::Resolve { urls } => executor.resolve(&urls).await?,
        Commands::Preload {
            urls,
            file,
            concurrency,
        } => executor.preload(urls, file.as_deref(), concurrency).await?,
        Commands::Key { url } => executor.key(&url)?,
        Commands::Seed { url, file } => executor.seed(&url, &file).await?,
        Commands::Delete { url } => executor.delete(&url).await?,
        Commands::Info => executor.info().await?,
        Commands::Clear => executor.clear().await?,
        Commands::Sweep => executor.sweep().await?,
    }

    Ok(())
}

/// Cache settings from the command line. Without `--cache-dir` the library
/// default location is used.
fn cache_config(args: &CliArgs) -> CacheConfig {
    let mut builder = CacheConfig::builder()
        .with_query_policy(args.query_params.clone())
        .with_headers(parse_headers(&args.headers));
    if let Some(cache_dir) = &args.cache_dir {
        builder = builder.with_cache_location(cache_dir);
    }
    builder.build()
}
