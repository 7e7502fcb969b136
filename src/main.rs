//! # Stock Context CLI (`stx`)
//!
//! ## Usage
//!
//! ```bash
//! stx --config ./config/stx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `stx init` | Create the metrics database schema |
//! | `stx documents` | List indexed company documents |
//! | `stx find <SYMBOL>` | Rank documents for a symbol and explain the match |
//! | `stx analyze <FILENAME>` | Summary, highlights, key metrics or full text of one document |
//! | `stx fundamentals <SYMBOL>` | Technical metrics plus document highlights |
//! | `stx metrics <SYMBOL>` | Latest technical metrics only |
//! | `stx search <PATTERN>` | Find stocks by symbol or company name |
//! | `stx screen` | Filter stocks by sector, Sharpe ratio, volatility and RSI |
//! | `stx serve` | Start the HTTP API and MCP endpoint |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use stock_context::engine::Engine;
use stock_context::metrics::ScreenCriteria;
use stock_context::models::{AnalysisMode, OutputFormat};
use stock_context::{commands, config, logging, server};

/// Stock Context: company documents and technical metrics for AI tools.
#[derive(Parser)]
#[command(
    name = "stx",
    about = "Stock Context: find, analyze and combine company documents with technical metrics",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/stx.toml")]
    config: PathBuf,

    /// Print JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the metrics database schema (idempotent).
    Init,

    /// List the documents in the configured directory.
    Documents,

    /// Rank the documents that best match a symbol.
    Find {
        /// Stock symbol, e.g. AARTIIND.
        symbol: String,
    },

    /// Analyze one document.
    Analyze {
        /// File name relative to the document directory.
        filename: String,

        /// summary, financial_highlights, key_metrics or full_text.
        #[arg(long, default_value = "financial_highlights")]
        mode: AnalysisMode,

        /// text, json or structured.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Combine technical metrics with highlights from the best documents.
    Fundamentals {
        /// Stock symbol.
        symbol: String,

        /// Analyze only files matching this glob or substring.
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Latest technical metrics for a symbol.
    Metrics {
        symbol: String,

        /// short, medium or long; defaults to [metrics].timeframe.
        #[arg(long)]
        timeframe: Option<String>,
    },

    /// Search stocks by part of the symbol or company name.
    Search {
        pattern: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Screen stocks on their latest metrics.
    Screen {
        #[arg(long)]
        sector: Option<String>,

        /// short, medium or long.
        #[arg(long)]
        timeframe: Option<String>,

        #[arg(long)]
        min_sharpe: Option<f64>,

        #[arg(long)]
        max_volatility: Option<f64>,

        #[arg(long)]
        min_rsi: Option<f64>,

        #[arg(long)]
        max_rsi: Option<f64>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Start the HTTP API (with MCP at /mcp).
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    logging::init_logging(&cfg.logging);

    if let Commands::Init = cli.command {
        return commands::run_init(&cfg).await;
    }

    let engine = Arc::new(Engine::from_config(cfg).await?);

    match cli.command {
        Commands::Init => {}
        Commands::Documents => commands::run_documents(&engine, cli.json)?,
        Commands::Find { symbol } => commands::run_find(&engine, &symbol, cli.json).await?,
        Commands::Analyze {
            filename,
            mode,
            format,
        } => commands::run_analyze(&engine, &filename, mode, format).await?,
        Commands::Fundamentals { symbol, pattern } => {
            commands::run_fundamentals(&engine, &symbol, pattern.as_deref(), cli.json).await?
        }
        Commands::Metrics { symbol, timeframe } => {
            commands::run_metrics(&engine, &symbol, timeframe.as_deref(), cli.json).await?
        }
        Commands::Search { pattern, limit } => {
            commands::run_search(&engine, &pattern, limit, cli.json).await?
        }
        Commands::Screen {
            sector,
            timeframe,
            min_sharpe,
            max_volatility,
            min_rsi,
            max_rsi,
            limit,
        } => {
            let criteria = ScreenCriteria {
                sector,
                timeframe,
                min_sharpe_ratio: min_sharpe,
                max_volatility,
                min_rsi,
                max_rsi,
                limit,
            };
            commands::run_screen(&engine, &criteria, cli.json).await?
        }
        Commands::Serve => server::run_server(engine).await?,
    }

    Ok(())
}
