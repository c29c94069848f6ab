use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cachet_engine::QueryPolicy;

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    name = "cachet",
    author,
    version,
    about = "Download-once file cache for URL-addressed resources",
    long_about = "Resolves URLs to files in a local cache directory, downloading each resource\n\
                  at most once. Concurrent requests for the same resource share one download\n\
                  and files are written atomically."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    /// Cache root directory
    #[arg(long, global = true, env = "CACHET_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Query parameters that identify a resource
    #[arg(
        long,
        global = true,
        default_value = "none",
        value_parser = parse_query_policy,
        help = "Query parameters kept in the cache key: \"all\", \"none\" or a comma separated list of names"
    )]
    pub query_params: QueryPolicy,

    /// Custom HTTP headers
    #[arg(
        short = 'H',
        long = "header",
        global = true,
        help = "Add custom HTTP header (can be used multiple times). Format: 'Name: Value'"
    )]
    pub headers: Vec<String>,

    /// Overall request timeout in seconds
    #[arg(long, global = true, default_value = "0", help = "Overall request timeout in seconds (0 = no timeout)")]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(long, global = true, default_value = "10")]
    pub connect_timeout: u64,

    /// User agent sent with every request
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true, help = "Enable detailed debug logging")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve URLs to cached files, downloading missing ones
    Resolve {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Warm the cache for many URLs, ignoring individual failures
    Preload {
        urls: Vec<String>,

        /// File with one URL per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Number of workers, 0 = one per URL
        #[arg(short, long, default_value = "4", allow_negative_numbers = true)]
        concurrency: isize,
    },

    /// Print the cache location and cacheable URL without downloading
    Key { url: String },

    /// Store a local file as the cached copy of a URL
    Seed { url: String, file: PathBuf },

    /// Remove the cached copy of a URL
    Delete { url: String },

    /// Show cache usage
    Info,

    /// Remove every cached file
    Clear,

    /// Remove temp files left by interrupted downloads
    Sweep,
}

/// Parse `all`, `none`, or a comma separated list of parameter names
pub fn parse_query_policy(value: &str) -> Result<QueryPolicy, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "all" | "true" => Ok(QueryPolicy::All),
        "none" | "false" | "" => Ok(QueryPolicy::None),
        _ => {
            let names: Vec<&str> = value
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .collect();
            if names.is_empty() {
                return Err(format!("no parameter names in '{value}'"));
            }
            Ok(QueryPolicy::only(names))
        }
    }
}
