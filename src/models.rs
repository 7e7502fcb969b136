//! Core data types shared by the discovery, analysis, and aggregation stages.
//!
//! [`DocumentRecord`]s are owned by the document index and handed out as
//! `Arc`s; everything else here is request-scoped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::metrics::TechnicalMetrics;

/// Document category inferred from filename keywords.
///
/// Variants are listed in classification priority order; the first
/// category whose keywords appear in a filename wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocType {
    Transcript,
    Earnings,
    Results,
    AnnualReport,
    Generic,
    Unknown,
}

impl DocType {
    /// Human-readable tag used in match reasons.
    pub fn label(&self) -> &'static str {
        match self {
            DocType::Transcript => "earnings transcript",
            DocType::Earnings => "earnings document",
            DocType::Results => "results document",
            DocType::AnnualReport => "annual report",
            DocType::Generic => "main company document",
            DocType::Unknown => "unclassified document",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocType::Transcript => "TRANSCRIPT",
            DocType::Earnings => "EARNINGS",
            DocType::Results => "RESULTS",
            DocType::AnnualReport => "ANNUAL_REPORT",
            DocType::Generic => "GENERIC",
            DocType::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Derived, cached view of a filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Every upper-cased token of the file stem, in filename order.
    pub tokens: Vec<String>,
    /// Tokens that could name a company (not numeric, not a type keyword).
    pub symbol_tokens: Vec<String>,
    /// First candidate symbol token, if any.
    pub matched_symbol_token: Option<String>,
    pub doc_type: DocType,
}

/// One file in the document directory.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub path: PathBuf,
    pub filename: String,
    pub modified_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub classification: Classification,
}

impl DocumentRecord {
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            filename: self.filename.clone(),
            path: self.path.display().to_string(),
            size_bytes: self.size_bytes,
            modified_at: self.modified_at.to_rfc3339(),
            doc_type: self.classification.doc_type,
            symbol_token: self.classification.matched_symbol_token.clone(),
            symbol_tokens: self.classification.symbol_tokens.clone(),
        }
    }
}

/// Listing entry returned by `list_documents`.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub filename: String,
    pub path: String,
    pub size_bytes: u64,
    pub modified_at: String,
    pub doc_type: DocType,
    pub symbol_token: Option<String>,
    pub symbol_tokens: Vec<String>,
}

/// A ranked document for one symbol query.
#[derive(Debug, Clone, Serialize)]
pub struct MatchCandidate {
    #[serde(serialize_with = "serialize_record")]
    pub record: Arc<DocumentRecord>,
    pub score: i64,
    pub match_reason: String,
}

fn serialize_record<S: Serializer>(
    record: &Arc<DocumentRecord>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    record.summary().serialize(serializer)
}

/// How a candidate list was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    /// At least one filename carried the symbol itself.
    Symbol,
    /// Only company-name aliases matched.
    Alias,
    /// Caller supplied an explicit filename pattern.
    Pattern,
    /// Nothing matched; every indexed document returned at score 0.
    Fallback,
    /// The document directory is empty.
    NoDocuments,
}

/// Result of `find_company_documents`.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentMatches {
    pub symbol: String,
    pub outcome: MatchOutcome,
    pub total_documents: usize,
    pub company_name: Option<String>,
    /// Whether the company name (and so the alias pass) was available.
    pub company_lookup: MetricsStatus,
    pub aliases: Vec<String>,
    pub candidates: Vec<MatchCandidate>,
    pub suggestions: Vec<String>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    Summary,
    FinancialHighlights,
    KeyMetrics,
    FullText,
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "summary" => Ok(AnalysisMode::Summary),
            "financial_highlights" | "highlights" => Ok(AnalysisMode::FinancialHighlights),
            "key_metrics" | "metrics" => Ok(AnalysisMode::KeyMetrics),
            "full_text" | "full" => Ok(AnalysisMode::FullText),
            other => Err(format!(
                "invalid analysis mode '{}': use summary, financial_highlights, key_metrics, or full_text",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Text,
    Json,
    Structured,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "structured" => Ok(OutputFormat::Structured),
            other => Err(format!(
                "invalid output format '{}': use text, json, or structured",
                other
            )),
        }
    }
}

/// Sentence or paragraph that mentions a financial keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Highlight {
    /// 1-based page number.
    pub page: usize,
    pub keywords: Vec<String>,
    pub text: String,
}

/// Leading text of one page, used by summary mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageExcerpt {
    pub page: usize,
    pub text: String,
    pub truncated: bool,
}

/// Number-bearing line found near a financial keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricMention {
    pub page: usize,
    pub line: String,
    pub values: Vec<String>,
}

/// What the analyzer extracted from one document.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisInsight {
    pub source_document: PathBuf,
    pub filename: String,
    pub mode: AnalysisMode,
    pub page_count: usize,
    pub raw_text_length: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<Highlight>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<PageExcerpt>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub key_metrics: Vec<MetricMention>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    /// Set for best-effort scans whose output may be incomplete.
    pub heuristic: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// Availability of the technical side of a fundamentals result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsStatus {
    Available,
    NotFound,
    Unavailable,
    NotConfigured,
}

/// A document that was selected but could not be analyzed.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentFailure {
    pub filename: String,
    pub code: String,
    pub error: String,
}

/// Combined technical + fundamental view for one symbol.
#[derive(Debug, Clone, Serialize)]
pub struct FundamentalsResult {
    pub symbol: String,
    pub company_name: Option<String>,
    pub metrics_status: MetricsStatus,
    pub technical_metrics: TechnicalMetrics,
    pub document_outcome: MatchOutcome,
    pub candidates: Vec<MatchCandidate>,
    pub document_insights: Vec<AnalysisInsight>,
    pub document_errors: Vec<DocumentFailure>,
    pub matched_document_count: usize,
    pub total_document_count: usize,
    pub notes: Vec<String>,
}
