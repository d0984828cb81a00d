mod config;
mod error;
mod instances;
mod link;
mod message;
mod store;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use tokio::io::AsyncReadExt;

use crate::config::{Config, CONFIG_FILE};
use crate::error::Yt2InvError;
use crate::instances::api::{InstanceApi, InvidiousApi};
use crate::instances::resolver::{now_ms, Resolver};
use crate::instances::select::Selection;
use crate::instances::{build_redirect_url, name_from_url};
use crate::link::scan::PageScanner;
use crate::link::VideoReference;
use crate::message::{format_candidates, format_health, format_probed, format_timestamp_ms};
use crate::store::{JsonFileStore, Store};

/// Redirect YouTube videos to Invidious instances
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file [default: yt2inv.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the video ID of a YouTube URL
    Check { url: String },
    /// Print the Invidious URL for a YouTube video
    Open {
        url: String,
        /// Pick an alternative instance by its number when the preferred one is down
        #[arg(long)]
        pick: Option<usize>,
        /// Save the picked instance as preferred
        #[arg(long, requires = "pick")]
        remember: bool,
    },
    /// Find embedded YouTube players in an HTML document (stdin if no file is given)
    Scan {
        file: Option<PathBuf>,
        /// Page URL that relative player sources are resolved against
        #[arg(long)]
        base: Option<url::Url>,
    },
    /// List healthy instances
    Instances {
        /// Probe every listed instance
        #[arg(long)]
        probe: bool,
    },
    /// Test the connection to an instance (the preferred one by default)
    Health { url: Option<String> },
    /// Save the preferred instance
    Prefer {
        url: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Show the preferred instance
    Preferred,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::get_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            let path = cli.config.unwrap_or_else(|| CONFIG_FILE.into());
            eprintln!("Error reading {}: {}", path.display(), e);
            std::process::exit(1);
        }
    };
    init_logging(config.debug || cli.debug);

    let resolver = Resolver::new(
        JsonFileStore::new(config.data_dir()),
        InvidiousApi::new(&config.directory_url),
        &config,
    );
    log::debug!("Using data directory {}", resolver.store().dir().display());

    if let Err(e) = run(&resolver, cli.command).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(format!("yt2inv={level}")))
        .format_timestamp(None)
        .init();
}

async fn run<S: Store, A: InstanceApi>(resolver: &Resolver<S, A>, command: Command) -> Result<()> {
    match command {
        Command::Check { url } => {
            let video = VideoReference::from_url(&url).ok_or(Yt2InvError::NoVideoId)?;
            println!("{}", video.video_id);
        }
        Command::Open {
            url,
            pick,
            remember,
        } => open(resolver, &url, pick, remember).await?,
        Command::Scan { file, base } => scan(resolver, file, base).await?,
        Command::Instances { probe } => {
            let instances = resolver.fetch_healthy_instances().await;
            if let Some(cache) = resolver.cached_instances().await {
                if cache.instances == instances {
                    log::info!(
                        "Instance list fetched at {} ({}s ago)",
                        format_timestamp_ms(cache.fetched_at_ms),
                        cache.age(now_ms()).as_secs()
                    );
                }
            }
            if probe {
                print!("{}", format_probed(&resolver.probe_candidates(instances).await));
            } else {
                print!("{}", format_candidates(&instances));
            }
        }
        Command::Health { url } => {
            let url = match url {
                Some(url) => url,
                None => resolver.preferred_instance().await,
            };
            let healthy = resolver
                .check_instance_health(&url, resolver.health_timeout())
                .await;
            println!("{}", format_health(&url, healthy));
        }
        Command::Prefer { url, name } => {
            let parsed = url::Url::parse(&url).with_context(|| format!("Invalid instance URL {url}"))?;
            if parsed.scheme() != "https" {
                log::warn!("{url} is not an https instance");
            }
            let url = url.trim_end_matches('/');
            let name = name.unwrap_or_else(|| name_from_url(url));
            resolver.save_preferred_instance(url, &name).await;
        }
        Command::Preferred => {
            println!(
                "{}  {}",
                resolver.preferred_instance_name().await,
                resolver.preferred_instance().await
            );
        }
    }
    Ok(())
}

async fn open<S: Store, A: InstanceApi>(
    resolver: &Resolver<S, A>,
    url: &str,
    pick: Option<usize>,
    remember: bool,
) -> Result<()> {
    let video = VideoReference::from_url(url).ok_or(Yt2InvError::NoVideoId)?;
    match resolver.select(&video.video_id).await? {
        Selection::Redirect(redirect) => println!("{redirect}"),
        Selection::Choose {
            preferred,
            candidates,
        } => match pick {
            Some(pick) => {
                let choice = pick
                    .checked_sub(1)
                    .and_then(|i| candidates.get(i))
                    .ok_or(Yt2InvError::BadPick(pick, candidates.len()))?;
                println!("{}", resolver.confirm(&video.video_id, choice, remember).await);
            }
            None => {
                eprintln!("{preferred} is not responding, choose an instance with --pick <N>:");
                print!("{}", format_candidates(&candidates));
            }
        },
    }
    Ok(())
}

async fn scan<S: Store, A: InstanceApi>(
    resolver: &Resolver<S, A>,
    file: Option<PathBuf>,
    base: Option<url::Url>,
) -> Result<()> {
    let html = match file {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut html = String::new();
            tokio::io::stdin()
                .read_to_string(&mut html)
                .await
                .context("Failed to read stdin")?;
            html
        }
    };

    let instance = resolver.preferred_instance().await;
    let mut scanner = match base {
        Some(base) => PageScanner::with_base(base),
        None => PageScanner::new(),
    };
    let found = scanner.scan(&html);
    log::info!("Found {} embedded videos", scanner.processed_count());
    for video in found {
        println!(
            "{}\t{}",
            video.src,
            build_redirect_url(&video.video.video_id, &instance)
        );
    }
    Ok(())
}
