//! Relevance scoring of one document against one symbol query.
//!
//! A document scores only if the symbol (or, failing that, a company-name
//! alias) appears as a whole token run in its filename. The document-type
//! bonus is added on top of that base; it never rescues a document that
//! has no textual match.

use crate::classify::tokenize;
use crate::config::ScoringConfig;
use crate::models::{DocType, DocumentRecord};

/// Corporate suffixes that never identify a company on their own.
const ALIAS_STOPWORDS: &[&str] = &[
    "LIMITED",
    "LTD",
    "COMPANY",
    "CORPORATION",
    "CORP",
    "INCORPORATED",
    "INC",
    "PRIVATE",
    "PVT",
    "PLC",
];

/// What a document is scored against.
#[derive(Debug, Clone, Default)]
pub struct ScoreQuery {
    /// Tokenized symbol; must appear contiguously. Empty disables the symbol check.
    pub symbol: Vec<String>,
    /// Company-name alias tokens; any single one counts.
    pub aliases: Vec<String>,
}

impl ScoreQuery {
    pub fn symbol(symbol: &str) -> Self {
        Self {
            symbol: tokenize(symbol),
            aliases: Vec::new(),
        }
    }

    pub fn aliases(aliases: &[String]) -> Self {
        Self {
            symbol: Vec::new(),
            aliases: aliases.to_vec(),
        }
    }
}

/// Points plus a human-readable explanation. `points == 0` means no match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scored {
    pub points: i64,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    weights: ScoringConfig,
}

impl RelevanceScorer {
    pub fn new(weights: ScoringConfig) -> Self {
        Self { weights }
    }

    pub fn type_bonus(&self, doc_type: DocType) -> i64 {
        match doc_type {
            DocType::Transcript => self.weights.transcript,
            DocType::Earnings => self.weights.earnings,
            DocType::Results => self.weights.results,
            DocType::AnnualReport => self.weights.annual_report,
            DocType::Generic => self.weights.generic,
            DocType::Unknown => 0,
        }
    }

    pub fn score(&self, record: &DocumentRecord, query: &ScoreQuery) -> i64 {
        self.evaluate(record, query).map(|s| s.points).unwrap_or(0)
    }

    /// Score with explanation, or `None` when neither symbol nor alias matched.
    pub fn evaluate(&self, record: &DocumentRecord, query: &ScoreQuery) -> Option<Scored> {
        let tokens = &record.classification.tokens;

        let (base, base_reason) = if contains_run(tokens, &query.symbol) {
            (self.weights.exact_symbol, "exact symbol match".to_string())
        } else if let Some(alias) = query.aliases.iter().find(|a| tokens.contains(a)) {
            (
                self.weights.company_alias,
                format!("company name match ({})", alias),
            )
        } else {
            return None;
        };

        let doc_type = record.classification.doc_type;
        let reason = match doc_type {
            DocType::Unknown => base_reason,
            _ => format!("{}, {}", base_reason, doc_type.label()),
        };

        Some(Scored {
            points: base + self.type_bonus(doc_type),
            reason,
        })
    }
}

/// True when `run` occurs as consecutive elements of `tokens`.
fn contains_run(tokens: &[String], run: &[String]) -> bool {
    !run.is_empty() && run.len() <= tokens.len() && tokens.windows(run.len()).any(|w| w == run)
}

/// Significant words of a company name, usable as filename aliases.
pub fn alias_tokens(company_name: &str, min_len: usize) -> Vec<String> {
    let mut aliases: Vec<String> = Vec::new();
    for token in tokenize(company_name) {
        if token.chars().count() < min_len || ALIAS_STOPWORDS.contains(&token.as_str()) {
            continue;
        }
        if !aliases.contains(&token) {
            aliases.push(token);
        }
    }
    aliases
}
