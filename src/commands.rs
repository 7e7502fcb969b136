//! CLI renderers, one per engine operation.
//!
//! Human-readable tables go to stdout by default; `--json` prints the same
//! value the HTTP API returns.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::engine::Engine;
use crate::metrics::ScreenCriteria;
use crate::models::{AnalysisMode, MetricsStatus, OutputFormat};
use crate::{db, migrate};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Create the metrics database schema.
pub async fn run_init(config: &Config) -> Result<()> {
    let Some(metrics) = &config.metrics else {
        println!("No [metrics] section configured; nothing to initialize.");
        return Ok(());
    };
    let pool = db::connect(&metrics.db_path).await?;
    migrate::run_migrations(&pool).await?;
    println!(
        "Metrics database initialized at {}.",
        metrics.db_path.display()
    );
    Ok(())
}

pub fn run_documents(engine: &Engine, json: bool) -> Result<()> {
    let documents = engine.list_documents();
    if json {
        return print_json(&documents);
    }
    if documents.is_empty() {
        println!(
            "No documents in {}.",
            engine.config().documents.dir.display()
        );
        return Ok(());
    }

    println!(
        "{:<40} {:<14} {:<12} {:>10}  MODIFIED",
        "FILENAME", "TYPE", "SYMBOL", "SIZE"
    );
    for d in &documents {
        println!(
            "{:<40} {:<14} {:<12} {:>10}  {}",
            d.filename,
            d.doc_type.to_string(),
            d.symbol_token.as_deref().unwrap_or("-"),
            d.size_bytes,
            d.modified_at
        );
    }
    println!();
    println!("{} document(s)", documents.len());
    Ok(())
}

pub async fn run_find(engine: &Engine, symbol: &str, json: bool) -> Result<()> {
    let matches = engine.find_company_documents(symbol).await;
    if json {
        return print_json(&matches);
    }

    println!(
        "Documents for {} ({:?}, {} indexed)",
        matches.symbol, matches.outcome, matches.total_documents
    );
    if let Some(name) = &matches.company_name {
        println!("  company: {} (aliases: {})", name, matches.aliases.join(", "));
    }
    println!();

    if matches.candidates.is_empty() {
        println!("No documents.");
    }
    for (i, c) in matches.candidates.iter().enumerate() {
        println!(
            "{}. [{:>3}] {}  ({})",
            i + 1,
            c.score,
            c.record.filename,
            c.match_reason
        );
    }

    for note in &matches.notes {
        println!("note: {}", note);
    }

    if !matches.suggestions.is_empty() {
        println!();
        println!("Name files like these to match {}:", matches.symbol);
        for s in &matches.suggestions {
            println!("  {}", s);
        }
    }
    Ok(())
}

pub async fn run_analyze(
    engine: &Engine,
    filename: &str,
    mode: AnalysisMode,
    format: OutputFormat,
) -> Result<()> {
    let rendered = engine.analyze_document(filename, mode, format).await?;
    match rendered {
        Value::String(text) => print!("{}", text),
        other => print_json(&other)?,
    }
    Ok(())
}

pub async fn run_fundamentals(
    engine: &Engine,
    symbol: &str,
    pattern: Option<&str>,
    json: bool,
) -> Result<()> {
    let result = engine.get_company_fundamentals(symbol, pattern).await;
    if json {
        return print_json(&result);
    }

    println!("Fundamentals for {}", result.symbol);
    if let Some(name) = &result.company_name {
        println!("  company:   {}", name);
    }
    println!(
        "  documents: {} matched / {} total ({:?})",
        result.matched_document_count, result.total_document_count, result.document_outcome
    );
    println!();

    println!("--- Technical metrics ({:?}) ---", result.metrics_status);
    if result.metrics_status == MetricsStatus::Available {
        for (key, value) in &result.technical_metrics {
            if !value.is_null() {
                println!("  {:<18} {}", key, value);
            }
        }
    }
    println!();

    for insight in &result.document_insights {
        println!("--- {} ({} pages) ---", insight.filename, insight.page_count);
        if insight.highlights.is_empty() {
            println!("  (no financial highlights found)");
        }
        for h in &insight.highlights {
            println!("  [p{}] {}", h.page, h.text);
        }
        println!();
    }

    for failure in &result.document_errors {
        println!("! {} [{}]: {}", failure.filename, failure.code, failure.error);
    }
    for note in &result.notes {
        println!("note: {}", note);
    }
    Ok(())
}

pub async fn run_metrics(
    engine: &Engine,
    symbol: &str,
    timeframe: Option<&str>,
    json: bool,
) -> Result<()> {
    let metrics = engine.get_metrics(symbol, timeframe).await?;
    if json {
        return print_json(&metrics);
    }
    for (key, value) in &metrics {
        if !value.is_null() {
            println!("{:<18} {}", key, value);
        }
    }
    Ok(())
}

pub async fn run_search(engine: &Engine, pattern: &str, limit: usize, json: bool) -> Result<()> {
    let stocks = engine.search_stocks(pattern, limit).await?;
    if json {
        return print_json(&stocks);
    }
    if stocks.is_empty() {
        println!("No stocks found matching: {}", pattern);
        return Ok(());
    }

    println!("{:<12} {:<40} SECTOR", "SYMBOL", "COMPANY");
    for s in &stocks {
        println!(
            "{:<12} {:<40} {}",
            s.symbol,
            s.company_name.as_deref().unwrap_or("-"),
            s.sector.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn cell(value: Option<f64>, scale: f64) -> String {
    value
        .map(|v| format!("{:.2}", v * scale))
        .unwrap_or_else(|| "-".to_string())
}

pub async fn run_screen(engine: &Engine, criteria: &ScreenCriteria, json: bool) -> Result<()> {
    criteria.validate()?;
    let stocks = engine.screen_stocks(criteria).await?;
    if json {
        return print_json(&stocks);
    }
    if stocks.is_empty() {
        println!("No stocks matched the criteria.");
        return Ok(());
    }

    println!(
        "{:<12} {:<14} {:>7} {:>7} {:>8} {:>6} {:>6}",
        "SYMBOL", "SECTOR", "SHARPE", "VOL%", "RETURN%", "RSI", "BETA"
    );
    for s in &stocks {
        println!(
            "{:<12} {:<14} {:>7} {:>7} {:>8} {:>6} {:>6}",
            s.symbol,
            s.sector.as_deref().unwrap_or("-"),
            cell(s.sharpe_ratio, 1.0),
            cell(s.volatility, 100.0),
            cell(s.total_return, 100.0),
            cell(s.rsi_14, 1.0),
            cell(s.beta, 1.0)
        );
    }
    println!();
    println!("{} stock(s)", stocks.len());
    Ok(())
}
