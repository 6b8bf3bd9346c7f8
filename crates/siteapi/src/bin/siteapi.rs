// ABOUTME: CLI binary for siteapi: serve a site as a JSON API, or resolve a single path.
// ABOUTME: Flags map onto ApiBuilder; item definitions come from a JSON items file.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use siteapi::{Api, CachePolicy, FetchStrategy, Resolution};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "siteapi")]
#[command(about = "Turn a website into a structured JSON API", version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve extracted items over HTTP
    Serve {
        #[command(flatten)]
        site: SiteArgs,

        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:5000")]
        addr: SocketAddr,
    },
    /// Resolve one request path and print the result as JSON
    Get {
        #[command(flatten)]
        site: SiteArgs,

        /// Request path, e.g. "/news?p=2"
        path: String,
    },
}

#[derive(Args, Debug)]
struct SiteArgs {
    /// Site the request paths are appended to, e.g. https://news.ycombinator.com
    #[arg(long)]
    base_url: String,

    /// JSON file with item definitions
    #[arg(long)]
    items: PathBuf,

    /// Render pages in headless Chromium instead of plain HTTP
    #[arg(long)]
    browser: bool,

    /// Chromium executable for --browser
    #[arg(long)]
    chromium: Option<PathBuf>,

    /// Directory for stored pages (default: user cache dir)
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Maximum number of cached results (default: unbounded)
    #[arg(long)]
    cache_capacity: Option<usize>,

    /// Expire cached results after this many seconds
    #[arg(long)]
    cache_ttl_secs: Option<u64>,

    /// Fetch timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Extra request header as "name: value" (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("header must look like \"name: value\": {}", raw))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

async fn build_api(site: &SiteArgs) -> Result<Api> {
    let definitions = siteapi::load_items_file(&site.items)?;

    let mut policy = match site.cache_capacity {
        Some(capacity) => CachePolicy::lru(capacity),
        None => CachePolicy::unbounded(),
    };
    if let Some(ttl) = site.cache_ttl_secs {
        policy = policy.with_ttl(Duration::from_secs(ttl));
    }

    let mut builder = Api::builder(&site.base_url)
        .register_all(definitions)
        .strategy(if site.browser {
            FetchStrategy::Browser
        } else {
            FetchStrategy::Direct
        })
        .timeout(Duration::from_secs(site.timeout_secs))
        .cache_policy(policy);
    if let Some(dir) = &site.store_dir {
        builder = builder.store_dir(dir);
    }
    if let Some(path) = &site.chromium {
        builder = builder.browser_executable(path);
    }
    for raw in &site.headers {
        let (name, value) = parse_header(raw)?;
        builder = builder.header(name, value);
    }

    builder.build().await.context("failed to build api")
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "siteapi=debug" } else { "siteapi=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Serve { site, addr } => {
            let api = Arc::new(build_api(&site).await?);
            tracing::info!(base_url = %site.base_url, items = api.registry().len(), "serving");
            siteapi::server::serve(api, addr).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Get { site, path } => {
            let api = build_api(&site).await?;
            match api.resolve(&siteapi::request_path(&path, None), &[]).await? {
                Resolution::Found(result) => {
                    println!("{}", serde_json::to_string_pretty(&*result)?);
                    Ok(ExitCode::SUCCESS)
                }
                Resolution::Unhandled => {
                    eprintln!("error: no item handles {}", path);
                    Ok(ExitCode::from(2))
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}
