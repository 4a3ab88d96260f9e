use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pdf_qa::Result;
use pdf_qa::commands::{ask_question, ingest_documents, serve_web, show_status};
use pdf_qa::config::{Config, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "pdf-qa")]
#[command(about = "Ask questions about a folder of PDF reports and get answers with sources")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the vector store (defaults to ~/.pdf-qa)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding service, language model and ingestion settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Rebuild the vector store from a directory of PDFs
    Ingest {
        /// Directory containing the PDFs (defaults to the configured pdf_directory)
        dir: Option<PathBuf>,
        /// Fail the whole run on the first unreadable PDF instead of skipping it
        #[arg(long)]
        abort_on_error: bool,
    },
    /// Start the web form
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Answer a single question on the terminal
    Ask {
        question: String,
    },
    /// Show vector store size and service health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let base_dir = match cli.base_dir {
        Some(dir) => dir,
        None => Config::default_base_dir().map_err(anyhow::Error::from)?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&base_dir)?;
            } else {
                run_interactive_config(&base_dir)?;
            }
        }
        Commands::Ingest {
            dir,
            abort_on_error,
        } => {
            let config = Config::load(&base_dir)?;
            ingest_documents(&config, dir, abort_on_error).await?;
        }
        Commands::Serve { host, port } => {
            let config = Config::load(&base_dir)?;
            serve_web(&config, host, port).await?;
        }
        Commands::Ask { question } => {
            let config = Config::load(&base_dir)?;
            ask_question(&config, &question).await?;
        }
        Commands::Status => {
            let config = Config::load(&base_dir)?;
            show_status(&config).await?;
        }
    }

    Ok(())
}
