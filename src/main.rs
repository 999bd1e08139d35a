use clap::Parser;
use convocatoria_crawler::config::{Config, DEFAULT_CONFIG_PATH};
use convocatoria_crawler::{run_extraction, ConvocatoriaData, CrawlerError, LlmExtractor};
use std::path::PathBuf;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

/// Crawl pages for convocatorias and store them in SQLite.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file, overrides the configured one.
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Skip records already stored with the same link, name and open date.
    #[arg(long)]
    dedup: bool,

    /// Pages to crawl, replacing the configured targets.
    urls: Vec<String>,
}

fn load_config(cli: Cli) -> Result<Config, CrawlerError> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None if PathBuf::from(DEFAULT_CONFIG_PATH).is_file() => {
            Config::load(DEFAULT_CONFIG_PATH)?
        }
        None => Config::default(),
    };

    if !cli.urls.is_empty() {
        config.targets = cli.urls;
    }
    if let Some(database) = cli.database {
        config.database = database;
    }
    config.dedup |= cli.dedup;

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "info,html5ever=error,selectors=error,hyper=warn,reqwest=info,sqlx=warn".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let config = load_config(Cli::parse())?;
    let api_key = config.resolve_credential()?;

    let storage = ConvocatoriaData::new(&config.database, config.dedup).await?;
    info!("Using database {}", storage.path);

    let extractor = LlmExtractor::new(api_key, &config.llm, config.word_count_threshold);
    let reports = run_extraction(&extractor, &storage, &config.job()).await?;

    println!();
    for report in &reports {
        println!("{}", report);
    }
    Ok(())
}
