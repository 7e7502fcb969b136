//! The operations exposed to the CLI, HTTP API and MCP bridge.
//!
//! [`Engine`] wires the index, selector, analyzer and aggregator together
//! once per process. Every transport holds it behind an `Arc` and calls
//! the same methods, so the CLI and the server cannot drift apart.

use anyhow::Result;
use serde_json::Value;
use std::path::{Component, Path};
use std::sync::Arc;
use std::time::Duration;

use crate::analyze::{render, DocumentAnalyzer};
use crate::config::Config;
use crate::error::{DocumentError, StoreError};
use crate::extract::{DocumentTextExtractor, PageLoader, PdfTextExtractor};
use crate::fundamentals::FundamentalsAggregator;
use crate::index::DocumentIndex;
use crate::metrics::{
    MetricsStore, ScreenCriteria, ScreenedStock, SqliteMetricsStore, StockListing,
    TechnicalMetrics, UnavailableMetricsStore,
};
use crate::models::{
    AnalysisInsight, AnalysisMode, DocumentMatches, DocumentRecord, DocumentSummary,
    FundamentalsResult, MatchOutcome, OutputFormat,
};
use crate::score::RelevanceScorer;
use crate::select::DocumentSelector;

pub struct Engine {
    config: Config,
    selector: Arc<DocumentSelector>,
    analyzer: Arc<DocumentAnalyzer>,
    aggregator: FundamentalsAggregator,
    store: Option<Arc<dyn MetricsStore>>,
}

impl Engine {
    /// Build an engine with explicit collaborators.
    pub fn new(
        config: Config,
        extractor: Arc<dyn DocumentTextExtractor>,
        store: Option<Arc<dyn MetricsStore>>,
    ) -> Result<Self> {
        let index = Arc::new(DocumentIndex::new(&config.documents)?);
        let stats = index.refresh()?;
        tracing::info!(
            dir = %config.documents.dir.display(),
            documents = stats.scanned,
            "document index ready"
        );

        let selector = Arc::new(DocumentSelector::new(
            index,
            RelevanceScorer::new(config.scoring.clone()),
            config.documents.max_results,
        ));

        let loader = PageLoader::new(
            extractor,
            config.analysis.cache_capacity,
            Duration::from_secs(config.analysis.extraction_timeout_secs),
        );
        let analyzer = Arc::new(DocumentAnalyzer::new(loader, config.analysis.clone()));

        let aggregator = FundamentalsAggregator::new(
            selector.clone(),
            analyzer.clone(),
            store.clone(),
            config.scoring.min_alias_len,
            config.analysis.fundamentals_documents,
        );

        Ok(Self {
            config,
            selector,
            analyzer,
            aggregator,
            store,
        })
    }

    /// Build the production engine: PDF extraction plus the configured SQLite store.
    ///
    /// A store that cannot be opened does not stop startup; lookups then
    /// report it as unavailable.
    pub async fn from_config(config: Config) -> Result<Self> {
        let store: Option<Arc<dyn MetricsStore>> = match &config.metrics {
            None => None,
            Some(metrics) => match SqliteMetricsStore::open(metrics).await {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    tracing::warn!(
                        db = %metrics.db_path.display(),
                        error = %e,
                        "metrics store could not be opened"
                    );
                    Some(Arc::new(UnavailableMetricsStore::new(format!("{:#}", e))))
                }
            },
        };

        Self::new(config, Arc::new(PdfTextExtractor), store)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Every indexed document, ordered by filename.
    pub fn list_documents(&self) -> Vec<DocumentSummary> {
        let index = self.selector.index();
        if let Err(e) = index.refresh() {
            tracing::warn!(error = %e, "index refresh failed, listing cached records");
        }
        index.list_all().iter().map(|r| r.summary()).collect()
    }

    /// Ranked candidates for `symbol`, with the reasoning behind them.
    pub async fn find_company_documents(&self, symbol: &str) -> DocumentMatches {
        let symbol = symbol.trim().to_uppercase();
        let lookup = self.aggregator.lookup_company(&symbol).await;
        let aliases = self.aggregator.aliases_for(lookup.name.as_deref());

        let selection = self.selector.select(&symbol, &aliases);

        let suggestions = match selection.outcome {
            MatchOutcome::Symbol => Vec::new(),
            _ => naming_suggestions(&symbol, &aliases),
        };

        let notes = lookup.failure_note().into_iter().collect();

        DocumentMatches {
            symbol,
            outcome: selection.outcome,
            total_documents: selection.total_documents,
            company_name: lookup.name,
            company_lookup: lookup.status,
            aliases,
            candidates: selection.candidates,
            suggestions,
            notes,
        }
    }

    /// Analyze one document and return the insight itself.
    pub async fn analyze_insight(
        &self,
        filename: &str,
        mode: AnalysisMode,
    ) -> Result<AnalysisInsight, DocumentError> {
        let record = self.resolve_document(filename)?;
        self.analyzer.analyze(&record, mode).await
    }

    /// Analyze one document and render it in `format`.
    pub async fn analyze_document(
        &self,
        filename: &str,
        mode: AnalysisMode,
        format: OutputFormat,
    ) -> Result<Value, DocumentError> {
        let insight = self.analyze_insight(filename, mode).await?;
        Ok(render(&insight, format))
    }

    pub async fn get_company_fundamentals(
        &self,
        symbol: &str,
        document_pattern: Option<&str>,
    ) -> FundamentalsResult {
        self.aggregator
            .get_company_fundamentals(symbol, document_pattern)
            .await
    }

    /// Latest metrics for `symbol`; `timeframe` overrides the configured one.
    pub async fn get_metrics(
        &self,
        symbol: &str,
        timeframe: Option<&str>,
    ) -> Result<TechnicalMetrics, StoreError> {
        self.store()?.get_metrics(symbol, timeframe).await
    }

    pub async fn search_stocks(
        &self,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<StockListing>, StoreError> {
        self.store()?.search_stocks(pattern, limit).await
    }

    pub async fn screen_stocks(
        &self,
        criteria: &ScreenCriteria,
    ) -> Result<Vec<ScreenedStock>, StoreError> {
        let rows = self.store()?.screen_stocks(criteria).await?;
        tracing::debug!(matched = rows.len(), "screen served");
        Ok(rows)
    }

    fn store(&self) -> Result<&Arc<dyn MetricsStore>, StoreError> {
        self.store
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("no metrics store configured".to_string()))
    }

    /// Map a caller-supplied name to an indexed document inside the document directory.
    fn resolve_document(&self, filename: &str) -> Result<Arc<DocumentRecord>, DocumentError> {
        let name = filename.trim();
        if name.is_empty() {
            return Err(DocumentError::InvalidName("filename must not be empty".to_string()));
        }
        let escapes = Path::new(name)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(DocumentError::InvalidName(format!(
                "'{}' must be a path relative to the document directory",
                name
            )));
        }

        let index = self.selector.index();
        if let Err(e) = index.refresh() {
            tracing::warn!(error = %e, "index refresh failed");
        }
        index
            .find_by_name(name)
            .ok_or_else(|| DocumentError::NotFound(name.to_string()))
    }
}

/// Filenames that would make a symbol's documents discoverable.
pub fn naming_suggestions(symbol: &str, aliases: &[String]) -> Vec<String> {
    let mut out = vec![
        format!("{}_Transcript.pdf", symbol),
        format!("{}_Annual_Report.pdf", symbol),
    ];
    if let Some(alias) = aliases.first() {
        out.push(format!("{}_Earnings.pdf", alias));
    }
    out.push(format!("{}_Results.pdf", symbol));
    out
}

/// Ticker-like: non-empty, letters, digits and `& - _ .` only.
pub fn is_valid_symbol(symbol: &str) -> bool {
    let s = symbol.trim();
    !s.is_empty()
        && s.len() <= 32
        && s.chars().any(|c| c.is_alphanumeric())
        && s
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '&' | '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricsConfig;
    use crate::error::ExtractionError;
    use crate::models::MetricsStatus;

    struct OnePage;

    impl DocumentTextExtractor for OnePage {
        fn extract(&self, _path: &Path) -> Result<Vec<String>, ExtractionError> {
            Ok(vec!["Revenue grew 10% in the quarter on higher volumes.".to_string()])
        }
    }

    fn engine(dir: &Path) -> Engine {
        Engine::new(Config::for_directory(dir), Arc::new(OnePage), None).unwrap()
    }

    #[tokio::test]
    async fn analyze_rejects_paths_outside_the_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("TCS.pdf"), b"%PDF").unwrap();
        let e = engine(tmp.path());

        for bad in ["../TCS.pdf", "/etc/passwd", "", "./TCS.pdf"] {
            let err = e.analyze_insight(bad, AnalysisMode::Summary).await.unwrap_err();
            assert!(matches!(err, DocumentError::InvalidName(_)), "{}", bad);
        }

        let err = e
            .analyze_insight("INFY.pdf", AnalysisMode::Summary)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");

        let ok = e.analyze_insight("TCS.pdf", AnalysisMode::Summary).await.unwrap();
        assert_eq!(ok.page_count, 1);
    }

    #[tokio::test]
    async fn find_explains_fallback_with_suggestions() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("INFY.pdf"), b"%PDF").unwrap();

        let matches = engine(tmp.path()).find_company_documents("tcs").await;
        assert_eq!(matches.symbol, "TCS");
        assert_eq!(matches.outcome, MatchOutcome::Fallback);
        assert_eq!(matches.total_documents, 1);
        assert!(matches.suggestions.contains(&"TCS_Transcript.pdf".to_string()));
    }

    #[tokio::test]
    async fn metrics_without_store_is_unavailable() {
        let tmp = tempfile::TempDir::new().unwrap();
        let e = engine(tmp.path());
        let err = e.get_metrics("TCS", None).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(e.search_stocks("TCS", 5).await.is_err());
        assert!(e.screen_stocks(&ScreenCriteria::default()).await.is_err());
    }

    #[tokio::test]
    async fn mistyped_metrics_path_is_unavailable_and_creates_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("typo").join("screener.db");
        let mut config = Config::for_directory(tmp.path());
        config.metrics = Some(MetricsConfig {
            db_path: db_path.clone(),
            timeframe: "medium".to_string(),
        });

        let e = Engine::from_config(config).await.unwrap();
        let result = e.get_company_fundamentals("TCS", None).await;

        assert_eq!(result.metrics_status, MetricsStatus::Unavailable);
        assert!(result.notes.iter().any(|n| n.contains("screener.db")));
        assert!(!db_path.exists());
        assert!(!tmp.path().join("typo").exists());
    }

    #[tokio::test]
    async fn find_reports_unreachable_company_lookup() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("Aarti_Earnings.pdf"), b"%PDF").unwrap();
        let store: Arc<dyn MetricsStore> = Arc::new(UnavailableMetricsStore::new("disk I/O error"));
        let e = Engine::new(Config::for_directory(tmp.path()), Arc::new(OnePage), Some(store)).unwrap();

        let matches = e.find_company_documents("AARTIIND").await;
        assert_eq!(matches.company_lookup, MetricsStatus::Unavailable);
        assert!(matches.aliases.is_empty());
        assert_eq!(matches.notes.len(), 1);
        assert!(matches.notes[0].contains("disk I/O error"));
        assert!(matches.notes[0].contains("alias matching skipped"));

        let none = engine(tmp.path()).find_company_documents("AARTIIND").await;
        assert_eq!(none.company_lookup, MetricsStatus::NotConfigured);
        assert!(none.notes.is_empty());
    }

    #[test]
    fn suggestions_use_first_alias() {
        let s = naming_suggestions("AARTIIND", &["AARTI".to_string()]);
        assert_eq!(
            s,
            vec![
                "AARTIIND_Transcript.pdf",
                "AARTIIND_Annual_Report.pdf",
                "AARTI_Earnings.pdf",
                "AARTIIND_Results.pdf"
            ]
        );
    }

    #[test]
    fn symbol_syntax() {
        assert!(is_valid_symbol("M&M"));
        assert!(is_valid_symbol("BAJAJ-AUTO"));
        assert!(!is_valid_symbol("  "));
        assert!(!is_valid_symbol("TCS; DROP"));
        assert!(!is_valid_symbol("--"));
    }
}
