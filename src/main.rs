use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info};

use caviar_digest::common::constants::DEFAULT_CONFIG_PATH;
use caviar_digest::fetch::{HttpListingSource, ListingSource};
use caviar_digest::{listings_from_json, logging, metrics, Config, Pipeline};

#[derive(Parser)]
#[command(name = "caviar_digest")]
#[command(about = "Caviar listing extraction and price-per-gram digest")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline over a JSON array of listings
    Digest {
        /// Path to a JSON file holding the listing array
        #[arg(long)]
        input: PathBuf,
        /// Optional TOML config overriding vocabularies and buckets
        #[arg(long)]
        config: Option<PathBuf>,
        /// Pretty-print the JSON report
        #[arg(long)]
        pretty: bool,
    },
    /// Show what the extractor and validator make of a single text
    Extract {
        #[arg(long)]
        text: String,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Fetch the configured vendor pages and run the pipeline over them
    Scrape {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Serialize)]
struct ExtractOutput<'a> {
    candidates: caviar_digest::pipeline::extract::FieldCandidates,
    bucket: Option<caviar_digest::BucketName>,
    accepted: Option<caviar_digest::RankedSelection>,
    rejected: Option<&'a str>,
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();
    metrics::init_metrics();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Digest {
            input,
            config,
            pretty,
        } => {
            let config = Config::load_or_default(config.as_deref())?;
            let pipeline = Pipeline::new(&config.pipeline)?;
            let json = std::fs::read_to_string(&input)
                .with_context(|| format!("reading listings from {}", input.display()))?;
            let listings = listings_from_json(&json)?;
            info!("Loaded {} listings from {}", listings.len(), input.display());
            let report = pipeline.run(&listings);
            print_json(&report, pretty)
        }
        Commands::Extract { text, config } => {
            let config = Config::load_or_default(config.as_deref())?;
            let pipeline = Pipeline::new(&config.pipeline)?;
            let listing = caviar_digest::RawListing::new(text.clone(), "cli");
            let outcome = pipeline.process_listing(&listing);
            let output = ExtractOutput {
                candidates: pipeline.extract(&text),
                bucket: outcome
                    .as_ref()
                    .ok()
                    .and_then(|record| pipeline.bucketer().assign(record)),
                accepted: outcome.as_ref().ok().map(Into::into),
                rejected: outcome.as_ref().err().map(|reason| reason.code()),
            };
            print_json(&output, true)
        }
        Commands::Scrape { config, pretty } => {
            let config = Config::load(&config)
                .with_context(|| format!("loading config {}", config.display()))?;
            let pipeline = Pipeline::new(&config.pipeline)?;
            let source = HttpListingSource::new(config.sites.clone())?;
            let listings = source.fetch_listings().await?;
            let report = pipeline.run(&listings);
            print_json(&report, pretty)
        }
    };

    if let Err(e) = &result {
        error!("caviar_digest failed: {:#}", e);
    }
    result
}
