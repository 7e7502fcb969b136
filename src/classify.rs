//! Filename classification.
//!
//! A filename is reduced to upper-cased alphanumeric tokens (the extension
//! is dropped). Document type comes from fixed keyword sets checked in
//! priority order: transcript, earnings, results, annual report. Files with
//! no type keyword are `GENERIC` when some token could be a symbol, else
//! `UNKNOWN`.
//!
//! The classifier never decides *which* symbol a file belongs to; it only
//! reports the candidate tokens. Confirming a symbol is the scorer's job.

use crate::models::{Classification, DocType};

const TRANSCRIPT_KEYWORDS: &[&str] = &["TRANSCRIPT", "CALL", "CONCALL"];
const EARNINGS_KEYWORDS: &[&str] = &["EARNINGS", "Q1", "Q2", "Q3", "Q4", "QUARTERLY"];
const RESULTS_KEYWORDS: &[&str] = &["RESULTS", "RESULT"];
const ANNUAL_REPORT_KEYWORDS: &[&str] = &["ANNUAL", "REPORT"];

/// Keyword sets in priority order.
const CATEGORIES: &[(DocType, &[&str])] = &[
    (DocType::Transcript, TRANSCRIPT_KEYWORDS),
    (DocType::Earnings, EARNINGS_KEYWORDS),
    (DocType::Results, RESULTS_KEYWORDS),
    (DocType::AnnualReport, ANNUAL_REPORT_KEYWORDS),
];

/// Split on every non-alphanumeric character and upper-case the pieces.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_uppercase())
        .collect()
}

/// Filename without its final extension. Dotfiles keep their name.
pub fn file_stem(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(0) | None => filename,
        Some(idx) => &filename[..idx],
    }
}

fn is_type_keyword(token: &str) -> bool {
    CATEGORIES
        .iter()
        .any(|(_, keywords)| keywords.contains(&token))
}

pub fn classify(filename: &str) -> Classification {
    let tokens = tokenize(file_stem(filename));

    let symbol_tokens: Vec<String> = tokens
        .iter()
        .filter(|t| !is_type_keyword(t))
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .cloned()
        .collect();

    let keyword_type = CATEGORIES
        .iter()
        .find(|(_, keywords)| tokens.iter().any(|t| keywords.contains(&t.as_str())))
        .map(|(doc_type, _)| *doc_type);

    let doc_type = match keyword_type {
        Some(doc_type) => doc_type,
        None if !symbol_tokens.is_empty() => DocType::Generic,
        None => DocType::Unknown,
    };

    Classification {
        matched_symbol_token: symbol_tokens.first().cloned(),
        symbol_tokens,
        tokens,
        doc_type,
    }
}
