use adsight::config::AnalysisConfig;
use adsight::dataset::Dataset;
use adsight::pipeline::Pipeline;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "adsight")]
#[command(about = "Ad performance analysis: window comparison, validated insights and creative recommendations")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a CSV export for a natural-language task
    Run {
        /// Ad performance CSV
        csv: PathBuf,

        /// The question to answer, e.g. "Why did ROAS drop last week?"
        task: String,

        /// Window length in days (must be one of the configured windows)
        #[arg(short, long)]
        window: Option<u32>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory for report artifacts (default: ./reports)
        #[arg(short, long, default_value = "reports")]
        out_dir: PathBuf,

        /// OpenAI API key (or set OPENAI_API_KEY env var)
        #[arg(long)]
        api_key: Option<String>,

        /// Skip the LLM drafter and use rule-based insights only
        #[arg(long)]
        no_llm: bool,
    },
    /// Print a summary of a CSV export
    Summary {
        /// Ad performance CSV
        csv: PathBuf,

        /// Segments to list per dimension
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Run {
            csv,
            task,
            window,
            config,
            out_dir,
            api_key,
            no_llm,
        } => run(csv, task, window, config, out_dir, api_key, no_llm).await,
        Commands::Summary { csv, top } => summary(csv, top),
    }
}

async fn run(
    csv: PathBuf,
    task: String,
    window: Option<u32>,
    config_path: Option<PathBuf>,
    out_dir: PathBuf,
    api_key: Option<String>,
    no_llm: bool,
) -> Result<()> {
    let mut config = AnalysisConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    if let Some(key) = api_key {
        config.llm.api_key = Some(key);
    }
    if no_llm {
        config.llm.api_key = None;
    }

    let dataset = Dataset::load(&csv).with_context(|| format!("Failed to load {:?}", csv))?;
    info!("Loaded {} records from {:?}", dataset.records.len(), csv);

    let pipeline = Pipeline::from_config(config);
    let report = pipeline.run(&dataset, &task, window).await?;
    let written = report.write_artifacts(&out_dir)?;

    println!("\n=== Analysis Results ===");
    println!("{}", report);
    println!("Artifacts:");
    for path in written {
        println!("  {}", path.display());
    }
    Ok(())
}

fn summary(csv: PathBuf, top: usize) -> Result<()> {
    let dataset = Dataset::load(&csv).with_context(|| format!("Failed to load {:?}", csv))?;
    let summary = dataset.summary(top)?;
    println!("{}", summary);
    for note in &dataset.notes {
        println!("note: {}", note);
    }
    Ok(())
}
