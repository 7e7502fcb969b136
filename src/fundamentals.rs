//! Fundamentals aggregation: technical metrics joined with document insights.
//!
//! Nothing here returns an error. A missing store, an unknown symbol, an
//! empty directory or a broken PDF each become a status field or a note in
//! the [`FundamentalsResult`], so a caller can always tell what is missing
//! and why.

use std::sync::Arc;

use crate::analyze::DocumentAnalyzer;
use crate::error::StoreError;
use crate::metrics::{MetricsStore, TechnicalMetrics};
use crate::models::{
    AnalysisInsight, AnalysisMode, DocumentFailure, FundamentalsResult, MatchOutcome,
    MetricsStatus,
};
use crate::score::alias_tokens;
use crate::select::{DocumentSelector, Selection};

/// Result of a company-name lookup. `error` is set only when the store failed.
#[derive(Debug, Clone)]
pub struct CompanyLookup {
    pub status: MetricsStatus,
    pub name: Option<String>,
    pub error: Option<String>,
}

impl CompanyLookup {
    /// Note explaining that alias matching was skipped, if the store failed.
    pub fn failure_note(&self) -> Option<String> {
        self.error.as_ref().map(|e| {
            format!("company name lookup failed ({}); alias matching skipped", e)
        })
    }
}

pub struct FundamentalsAggregator {
    selector: Arc<DocumentSelector>,
    analyzer: Arc<DocumentAnalyzer>,
    store: Option<Arc<dyn MetricsStore>>,
    min_alias_len: usize,
    documents_to_analyze: usize,
}

impl FundamentalsAggregator {
    pub fn new(
        selector: Arc<DocumentSelector>,
        analyzer: Arc<DocumentAnalyzer>,
        store: Option<Arc<dyn MetricsStore>>,
        min_alias_len: usize,
        documents_to_analyze: usize,
    ) -> Self {
        Self {
            selector,
            analyzer,
            store,
            min_alias_len,
            documents_to_analyze,
        }
    }

    /// Ask the store for the company name behind `symbol`.
    pub async fn lookup_company(&self, symbol: &str) -> CompanyLookup {
        let Some(store) = &self.store else {
            return CompanyLookup {
                status: MetricsStatus::NotConfigured,
                name: None,
                error: None,
            };
        };
        match store.resolve_company_name(symbol).await {
            Ok(name) => CompanyLookup {
                status: MetricsStatus::Available,
                name: Some(name),
                error: None,
            },
            Err(StoreError::NotFound(_)) => CompanyLookup {
                status: MetricsStatus::NotFound,
                name: None,
                error: None,
            },
            Err(e) => {
                tracing::warn!(symbol, error = %e, "company name lookup failed");
                CompanyLookup {
                    status: MetricsStatus::Unavailable,
                    name: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Alias tokens derived from the company name, or none.
    pub fn aliases_for(&self, company_name: Option<&str>) -> Vec<String> {
        company_name
            .map(|name| alias_tokens(name, self.min_alias_len))
            .unwrap_or_default()
    }

    pub async fn get_company_fundamentals(
        &self,
        symbol: &str,
        document_pattern: Option<&str>,
    ) -> FundamentalsResult {
        let symbol = symbol.trim().to_uppercase();
        let mut notes = Vec::new();

        let (metrics_status, technical_metrics) = self.fetch_metrics(&symbol, &mut notes).await;

        // An unavailable or missing store was already noted by fetch_metrics.
        let company_name = match metrics_status {
            MetricsStatus::Unavailable | MetricsStatus::NotConfigured => None,
            _ => {
                let lookup = self.lookup_company(&symbol).await;
                notes.extend(lookup.failure_note());
                lookup.name
            }
        };

        let pattern = document_pattern.map(str::trim).filter(|p| !p.is_empty());
        let selection = match pattern {
            Some(p) => self.selector.select_by_pattern(p),
            None => {
                let aliases = self.aliases_for(company_name.as_deref());
                self.selector.select(&symbol, &aliases)
            }
        };

        match selection.outcome {
            MatchOutcome::NoDocuments => notes.push("no documents available".to_string()),
            MatchOutcome::Fallback => notes.push(format!(
                "no document matched {}; showing the most recent documents instead",
                symbol
            )),
            MatchOutcome::Pattern if selection.candidates.is_empty() => notes.push(format!(
                "no documents matched pattern '{}'",
                pattern.unwrap_or_default()
            )),
            _ => {}
        }

        let matched_document_count = match selection.outcome {
            MatchOutcome::Symbol | MatchOutcome::Alias | MatchOutcome::Pattern => {
                selection.candidates.len()
            }
            MatchOutcome::Fallback | MatchOutcome::NoDocuments => 0,
        };

        let (document_insights, document_errors) = self.analyze_top(&selection, &mut notes).await;

        tracing::info!(
            symbol = %symbol,
            metrics = ?metrics_status,
            outcome = ?selection.outcome,
            analyzed = document_insights.len(),
            failed = document_errors.len(),
            "fundamentals assembled"
        );

        FundamentalsResult {
            symbol,
            company_name,
            metrics_status,
            technical_metrics,
            document_outcome: selection.outcome,
            candidates: selection.candidates,
            document_insights,
            document_errors,
            matched_document_count,
            total_document_count: selection.total_documents,
            notes,
        }
    }

    async fn fetch_metrics(
        &self,
        symbol: &str,
        notes: &mut Vec<String>,
    ) -> (MetricsStatus, TechnicalMetrics) {
        let Some(store) = &self.store else {
            notes.push("no metrics store configured; technical metrics omitted".to_string());
            return (MetricsStatus::NotConfigured, TechnicalMetrics::new());
        };

        match store.get_metrics(symbol, None).await {
            Ok(metrics) => (MetricsStatus::Available, metrics),
            Err(StoreError::NotFound(_)) => {
                notes.push(format!("no technical metrics for {}", symbol));
                (MetricsStatus::NotFound, TechnicalMetrics::new())
            }
            Err(e @ StoreError::Unavailable(_)) => {
                tracing::warn!(symbol, error = %e, "metrics store unavailable, continuing with documents only");
                notes.push(e.to_string());
                (MetricsStatus::Unavailable, TechnicalMetrics::new())
            }
        }
    }

    /// Analyze the leading candidates concurrently, reporting results in rank order.
    async fn analyze_top(
        &self,
        selection: &Selection,
        notes: &mut Vec<String>,
    ) -> (Vec<AnalysisInsight>, Vec<DocumentFailure>) {
        let top = selection
            .candidates
            .iter()
            .take(self.documents_to_analyze)
            .map(|c| c.record.clone());

        let handles: Vec<_> = top
            .map(|record| {
                let analyzer = self.analyzer.clone();
                let handle = tokio::spawn({
                    let record = record.clone();
                    async move {
                        analyzer
                            .analyze(&record, AnalysisMode::FinancialHighlights)
                            .await
                    }
                });
                (record, handle)
            })
            .collect();

        let mut insights = Vec::new();
        let mut errors = Vec::new();
        for (record, handle) in handles {
            match handle.await {
                Ok(Ok(insight)) => insights.push(insight),
                Ok(Err(e)) => {
                    tracing::warn!(file = %record.filename, error = %e, "document analysis failed");
                    errors.push(DocumentFailure {
                        filename: record.filename.clone(),
                        code: e.code().to_string(),
                        error: e.to_string(),
                    });
                }
                Err(join_err) => {
                    tracing::error!(file = %record.filename, error = %join_err, "analysis task failed");
                    errors.push(DocumentFailure {
                        filename: record.filename.clone(),
                        code: "extraction_failed".to_string(),
                        error: join_err.to_string(),
                    });
                }
            }
        }

        if selection.candidates.len() > self.documents_to_analyze {
            notes.push(format!(
                "analyzed the top {} of {} candidate documents",
                self.documents_to_analyze,
                selection.candidates.len()
            ));
        }
        if !errors.is_empty() {
            notes.push(format!(
                "{} document(s) could not be analyzed; see document_errors",
                errors.len()
            ));
        }

        (insights, errors)
    }
}
