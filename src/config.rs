//! TOML configuration parsing and validation.
//!
//! Only configuration-level problems are fatal: a missing document
//! directory, an invalid glob, or an out-of-range limit stops startup.
//! Everything that can go wrong per request is reported in the result
//! instead (see [`crate::fundamentals`]).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Cap on ranked candidates returned by the selector.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_include_globs() -> Vec<String> {
    vec!["*.pdf".to_string()]
}
fn default_max_results() -> usize {
    5
}

/// Point values used by the relevance scorer.
///
/// The defaults reproduce the documented ranking; only the order they
/// induce matters, so deployments may retune them freely.
#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    #[serde(default = "default_exact_symbol")]
    pub exact_symbol: i64,
    #[serde(default = "default_company_alias")]
    pub company_alias: i64,
    #[serde(default = "default_transcript")]
    pub transcript: i64,
    #[serde(default = "default_earnings")]
    pub earnings: i64,
    #[serde(default = "default_earnings")]
    pub results: i64,
    #[serde(default = "default_annual_report")]
    pub annual_report: i64,
    #[serde(default = "default_generic")]
    pub generic: i64,
    /// Shortest company-name word that may be used as an alias token.
    #[serde(default = "default_min_alias_len")]
    pub min_alias_len: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            exact_symbol: default_exact_symbol(),
            company_alias: default_company_alias(),
            transcript: default_transcript(),
            earnings: default_earnings(),
            results: default_earnings(),
            annual_report: default_annual_report(),
            generic: default_generic(),
            min_alias_len: default_min_alias_len(),
        }
    }
}

fn default_exact_symbol() -> i64 {
    100
}
fn default_company_alias() -> i64 {
    60
}
fn default_transcript() -> i64 {
    50
}
fn default_earnings() -> i64 {
    40
}
fn default_annual_report() -> i64 {
    30
}
fn default_generic() -> i64 {
    10
}
fn default_min_alias_len() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_summary_pages")]
    pub summary_pages: usize,
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,
    #[serde(default = "default_max_highlights")]
    pub max_highlights: usize,
    #[serde(default = "default_min_snippet_chars")]
    pub min_snippet_chars: usize,
    #[serde(default = "default_max_snippet_chars")]
    pub max_snippet_chars: usize,
    #[serde(default = "default_max_metric_lines")]
    pub max_metric_lines: usize,
    #[serde(default = "default_extraction_timeout_secs")]
    pub extraction_timeout_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// How many of the ranked candidates the aggregator actually analyzes.
    #[serde(default = "default_fundamentals_documents")]
    pub fundamentals_documents: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            summary_pages: default_summary_pages(),
            summary_chars: default_summary_chars(),
            max_highlights: default_max_highlights(),
            min_snippet_chars: default_min_snippet_chars(),
            max_snippet_chars: default_max_snippet_chars(),
            max_metric_lines: default_max_metric_lines(),
            extraction_timeout_secs: default_extraction_timeout_secs(),
            cache_capacity: default_cache_capacity(),
            fundamentals_documents: default_fundamentals_documents(),
        }
    }
}

fn default_summary_pages() -> usize {
    3
}
fn default_summary_chars() -> usize {
    500
}
fn default_max_highlights() -> usize {
    10
}
fn default_min_snippet_chars() -> usize {
    40
}
fn default_max_snippet_chars() -> usize {
    400
}
fn default_max_metric_lines() -> usize {
    20
}
fn default_extraction_timeout_secs() -> u64 {
    30
}
fn default_cache_capacity() -> usize {
    32
}
fn default_fundamentals_documents() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
}

fn default_timeframe() -> String {
    "medium".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Config rooted at `dir` with every other setting at its default.
    pub fn for_directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            documents: DocumentsConfig {
                dir: dir.into(),
                include_globs: default_include_globs(),
                exclude_globs: Vec::new(),
                recursive: false,
                follow_symlinks: false,
                max_results: default_max_results(),
            },
            scoring: ScoringConfig::default(),
            analysis: AnalysisConfig::default(),
            metrics: None,
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    let dir = &config.documents.dir;
    if !dir.is_dir() {
        bail!(
            "documents.dir does not exist or is not a directory: {}",
            dir.display()
        );
    }

    if config.documents.max_results == 0 {
        bail!("documents.max_results must be >= 1");
    }

    for pattern in config
        .documents
        .include_globs
        .iter()
        .chain(config.documents.exclude_globs.iter())
    {
        globset::Glob::new(pattern)
            .with_context(|| format!("invalid glob in [documents]: '{}'", pattern))?;
    }

    let analysis = &config.analysis;
    if analysis.summary_pages == 0 {
        bail!("analysis.summary_pages must be >= 1");
    }
    if analysis.max_highlights == 0 {
        bail!("analysis.max_highlights must be >= 1");
    }
    if analysis.max_metric_lines == 0 {
        bail!("analysis.max_metric_lines must be >= 1");
    }
    if analysis.fundamentals_documents == 0 {
        bail!("analysis.fundamentals_documents must be >= 1");
    }
    if analysis.min_snippet_chars > analysis.max_snippet_chars {
        bail!(
            "analysis.min_snippet_chars ({}) must not exceed analysis.max_snippet_chars ({})",
            analysis.min_snippet_chars,
            analysis.max_snippet_chars
        );
    }
    if analysis.cache_capacity == 0 {
        bail!("analysis.cache_capacity must be >= 1");
    }
    if analysis.extraction_timeout_secs == 0 {
        bail!("analysis.extraction_timeout_secs must be >= 1");
    }

    if let Some(metrics) = &config.metrics {
        match metrics.timeframe.as_str() {
            "short" | "medium" | "long" => {}
            other => bail!(
                "Unknown metrics.timeframe: '{}'. Must be short, medium, or long.",
                other
            ),
        }
    }

    match config.logging.format.as_str() {
        "pretty" | "json" => {}
        other => bail!(
            "Unknown logging.format: '{}'. Must be pretty or json.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(toml_src: &str) -> Config {
        toml::from_str(toml_src).unwrap()
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let tmp = TempDir::new().unwrap();
        let cfg = parse(&format!(
            "[documents]\ndir = \"{}\"\n",
            tmp.path().display()
        ));
        assert_eq!(cfg.documents.include_globs, vec!["*.pdf"]);
        assert_eq!(cfg.documents.max_results, 5);
        assert_eq!(cfg.scoring.exact_symbol, 100);
        assert_eq!(cfg.scoring.transcript, 50);
        assert_eq!(cfg.analysis.summary_pages, 3);
        assert!(cfg.metrics.is_none());
        assert_eq!(cfg.server.bind, "127.0.0.1:7340");
        validate(&cfg).unwrap();
    }

    #[test]
    fn missing_directory_is_fatal() {
        let cfg = Config::for_directory("/definitely/not/here");
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("documents.dir"));
    }

    #[test]
    fn rejects_zero_caps_and_inverted_snippet_bounds() {
        let tmp = TempDir::new().unwrap();
        let base = Config::for_directory(tmp.path());
        validate(&base).unwrap();

        let mut cfg = base.clone();
        cfg.analysis.max_metric_lines = 0;
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("max_metric_lines"));

        let mut cfg = base.clone();
        cfg.analysis.fundamentals_documents = 0;
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("fundamentals_documents"));

        let mut cfg = base.clone();
        cfg.analysis.min_snippet_chars = 300;
        cfg.analysis.max_snippet_chars = 200;
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("min_snippet_chars"));

        let mut cfg = base;
        cfg.analysis.min_snippet_chars = 120;
        cfg.analysis.max_snippet_chars = 120;
        validate(&cfg).unwrap();
    }

    #[test]
    fn rejects_unknown_timeframe() {
        let tmp = TempDir::new().unwrap();
        let cfg = parse(&format!(
            "[documents]\ndir = \"{}\"\n\n[metrics]\ndb_path = \"m.sqlite\"\ntimeframe = \"weekly\"\n",
            tmp.path().display()
        ));
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn rejects_bad_glob() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = Config::for_directory(tmp.path());
        cfg.documents.include_globs = vec!["[".to_string()];
        assert!(validate(&cfg).is_err());
    }
}
