//! wdlink CLI - Command-line interface
//!
//! Usage:
//!   wdlink process <file>
//!   wdlink resolve <keyword>...
//!   wdlink query <qid>
//!   wdlink config
//!
//! Author: hephaex@gmail.com

mod output;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use wdlink_core::{AppConfig, Keyword, LoggingConfig, ProcessStatus};
use wdlink_parser::ParserRegistry;
use wdlink_resolver::LinkingPipeline;

#[derive(Parser)]
#[command(name = "wdlink")]
#[command(about = "Link document keywords to Wikidata entities")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables still take precedence)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract keywords from a PDF or text file and resolve them
    Process {
        /// Path to the document
        path: PathBuf,

        /// Maximum number of keywords to resolve
        #[arg(long)]
        max_keywords: Option<usize>,

        /// Concurrent entity searches
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Resolve keywords given on the command line
    Resolve {
        /// Keywords to resolve
        #[arg(required = true)]
        keywords: Vec<String>,

        /// Extractor confidence assigned to every keyword
        #[arg(long, default_value_t = 1.0)]
        score: f32,
    },
    /// Show all relations of an entity
    Query {
        /// Entity ID, e.g. Q90
        qid: String,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    init_logging(&config.logging)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Process {
            path,
            max_keywords,
            concurrency,
        } => {
            if let Some(n) = max_keywords {
                config.extractor.max_keywords = n;
            }
            if let Some(n) = concurrency {
                config.resolver.max_concurrency = n;
            }

            let document = ParserRegistry::with_defaults()
                .parse(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            tracing::info!(
                file = %path.display(),
                pages = ?document.page_count,
                title = ?document.title,
                words = document.word_count(),
                "document loaded"
            );

            let pipeline = LinkingPipeline::from_config(&config)?;
            let progress = (!cli.json).then(|| spawn_progress(&pipeline));
            let report = pipeline.process_document(&document.content, &cancel).await;
            if let Some(progress) = progress {
                progress.abort();
                eprintln!();
            }
            let report = report?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", output::keyword_table(&report.rows, &config.wikidata.entity_base_url));
                println!();
                println!(
                    "{}: {} keywords, {} resolved, {} failed",
                    report.status,
                    report.rows.len(),
                    report.resolved_count(),
                    report.failed_count()
                );
            }
        }
        Commands::Resolve { keywords, score } => {
            let pipeline = LinkingPipeline::from_config(&config)?;
            let keywords = keywords
                .into_iter()
                .map(|text| Keyword::new(text, score))
                .collect();
            let rows = pipeline.resolve_keywords(keywords, &cancel).await;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                println!("{}", output::keyword_table(&rows, &config.wikidata.entity_base_url));
            }
        }
        Commands::Query { qid } => {
            let pipeline = LinkingPipeline::from_config(&config)?;
            let relations = pipeline.query_entity(&qid, &cancel).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&relations)?);
            } else {
                println!("{}", output::relation_table(&relations));
                println!();
                println!("{} relations", relations.len());
            }
        }
        Commands::Config => {
            config.validate()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

/// Initialize tracing on stderr; `RUST_LOG` overrides the configured level.
fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.level))
        .context("Invalid log level")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let result = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}

/// Echo `completed/total` to stderr while keywords resolve
fn spawn_progress(pipeline: &LinkingPipeline) -> tokio::task::JoinHandle<()> {
    let mut status = pipeline.status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            if current.is_terminal() {
                break;
            }
            if let ProcessStatus::Running { completed, total } = current {
                if total > 0 {
                    eprint!("\rresolving {completed}/{total}");
                }
            }
        }
    })
}
