use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keeper_archive::HttpFetcher;
use keeper_common::observability::init_logging;
use keeper_config::{KeeperConfig, KeeperConfigLoader};
use keeper_http::HttpClient;

use commands::{Session, StderrSink};
use settings::Overrides;

mod commands;
mod menu;
mod settings;

const DEFAULT_CONFIG_FILE: &str = "keeper.yaml";

/// Archive single articles as Markdown with a local tag catalog.
#[derive(Debug, Parser)]
#[command(name = "keeper", version)]
struct Cli {
    /// YAML config file (defaults to ./keeper.yaml when present)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Where documents, images and INDEX.json are written
    #[arg(long, short)]
    output_dir: Option<PathBuf>,

    /// Proxy pool as `host:port` entries separated by commas
    #[arg(long)]
    proxy: Option<String>,

    /// Skip the pause before each page request
    #[arg(long)]
    no_delay: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch and archive one article
    Crawl {
        url: String,
        /// Comma-separated tags
        #[arg(long, short, default_value = "")]
        tags: String,
    },
    /// List every archived article
    List,
    /// Tag counts, most used first
    Tags,
    /// Articles whose tags contain TAG (case-insensitive)
    Search { tag: String },
    /// Interactive menu
    Menu,
}

fn load_config(cli: &Cli) -> Result<KeeperConfig> {
    let loader = match &cli.config {
        Some(path) => KeeperConfigLoader::new().with_file(path),
        None => KeeperConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE),
    };
    let cfg = loader.load().context("loading configuration")?;
    Ok(settings::apply(
        cfg,
        &Overrides {
            output_dir: cli.output_dir.clone(),
            proxy: cli.proxy.clone(),
            no_delay: cli.no_delay,
        },
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli)?;

    let log_path = init_logging(settings::log_config(&cfg))?;
    tracing::info!(log = %log_path.display(), output = %cfg.output_dir.display(), "app.start");

    let client = HttpClient::new(settings::fetch_policy(&cfg)).context("building HTTP client")?;
    let mut session = Session::new(
        settings::archive_config(&cfg),
        HttpFetcher::new(client),
        Arc::new(StderrSink),
    );

    match cli.command.unwrap_or(Command::Menu) {
        Command::Crawl { url, tags } => commands::crawl(&session, &url, &tags).await,
        Command::List => commands::list(&session),
        Command::Tags => commands::tags(&session),
        Command::Search { tag } => commands::search(&session, &tag),
        Command::Menu => menu::run(&mut session).await,
    }
}
