use clap::{Parser, Subcommand};
use feedlens::Result;
use feedlens::commands::{
    ClassifyOverrides, apply_settings, classify_history, clear_cache, fetch_feeds, save_interests,
    show_recommendations, show_status, watch,
};
use feedlens::config::{run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "feedlens")]
#[command(about = "Feed recommendations weighted by your browsing interests, using local embeddings")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and classification defaults
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Fetch all configured feeds and refresh recommendations
    Fetch,
    /// Classify a browsing-history export and update the interest summary
    Classify {
        /// Path to the exported history JSON
        export: PathBuf,
        /// Embed titles and hosts only, without fetching page descriptions
        #[arg(long)]
        shallow: bool,
        /// Maximum labels per history item
        #[arg(long)]
        top_n: Option<usize>,
        /// Minimum similarity for a label to count
        #[arg(long)]
        threshold: Option<f32>,
        /// Taxonomy depth interests are grouped at (1-3)
        #[arg(long)]
        granularity: Option<u8>,
        /// Number of interest labels to keep
        #[arg(long)]
        sampling_count: Option<usize>,
    },
    /// Show the latest recommendations
    Recommendations,
    /// Replace the edited interest summary and refresh recommendations
    SaveInterests {
        /// Path to the interest summary JSON
        file: PathBuf,
    },
    /// Save feed settings, prune the article history and refresh recommendations
    Settings {
        /// Path to the feed settings JSON
        file: PathBuf,
    },
    /// Delete fetched articles, cached embeddings and recommendations
    ClearCache,
    /// Show Ollama, taxonomy and article history status
    Status,
    /// Run automatic updates until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Fetch => {
            fetch_feeds().await?;
        }
        Commands::Classify {
            export,
            shallow,
            top_n,
            threshold,
            granularity,
            sampling_count,
        } => {
            let overrides = ClassifyOverrides {
                shallow,
                top_n,
                threshold,
                granularity,
                sampling_count,
            };
            classify_history(&export, &overrides).await?;
        }
        Commands::Recommendations => {
            show_recommendations()?;
        }
        Commands::SaveInterests { file } => {
            save_interests(&file).await?;
        }
        Commands::Settings { file } => {
            apply_settings(&file).await?;
        }
        Commands::ClearCache => {
            clear_cache().await?;
        }
        Commands::Status => {
            show_status()?;
        }
        Commands::Watch => {
            watch().await?;
        }
    }

    Ok(())
}
