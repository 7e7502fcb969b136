//! Document analysis over extracted page text.
//!
//! Four modes share one extraction:
//!
//! | Mode | Output |
//! |------|--------|
//! | `summary` | leading text of the first N pages |
//! | `financial_highlights` | sentences mentioning a financial keyword, in document order |
//! | `key_metrics` | number-bearing lines near financial keywords (heuristic) |
//! | `full_text` | all page text, concatenated unchanged |
//!
//! Output formats ([`render`]) only change presentation; the
//! [`AnalysisInsight`] they are built from is the same.

use regex::Regex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use crate::config::AnalysisConfig;
use crate::error::DocumentError;
use crate::extract::PageLoader;
use crate::models::{
    AnalysisInsight, AnalysisMode, DocumentRecord, Highlight, MetricMention, OutputFormat,
    PageExcerpt,
};

/// Keywords that mark a sentence as a financial highlight.
pub const FINANCIAL_KEYWORDS: &[&str] = &[
    "revenue",
    "profit",
    "earnings",
    "ebitda",
    "margin",
    "growth",
    "cash flow",
    "debt",
    "equity",
    "roi",
    "roe",
    "roce",
    "eps",
    "dividend",
    "net income",
    "gross profit",
    "operating profit",
    "balance sheet",
    "guidance",
    "outlook",
    "order book",
    "capex",
    "pat",
    "quarter",
];

static KEYWORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = FINANCIAL_KEYWORDS
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})s?\b", alternation)).expect("keyword pattern is valid")
});

static NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:(?:rs\.?|inr|usd|₹|\$)\s*)?\b\d[\d,]*(?:\.\d+)?(?:\s*%|\s*(?:crores?|cr|lakhs?|million|mn|billion|bn)\b)?",
    )
    .expect("number pattern is valid")
});

const KEY_METRICS_NOTE: &str = "key metrics are a best-effort scan of number-bearing lines near \
    financial keywords; tables are not reconstructed and values may be incomplete";

const MAX_VALUES_PER_LINE: usize = 10;

pub struct DocumentAnalyzer {
    loader: PageLoader,
    settings: AnalysisConfig,
}

impl DocumentAnalyzer {
    pub fn new(loader: PageLoader, settings: AnalysisConfig) -> Self {
        Self { loader, settings }
    }

    pub fn settings(&self) -> &AnalysisConfig {
        &self.settings
    }

    pub async fn analyze(
        &self,
        record: &DocumentRecord,
        mode: AnalysisMode,
    ) -> Result<AnalysisInsight, DocumentError> {
        let pages = self.loader.load(record).await?;
        let insight = analyze_pages(record, &pages, mode, &self.settings);
        tracing::debug!(
            file = %record.filename,
            mode = ?mode,
            pages = insight.page_count,
            highlights = insight.highlights.len(),
            "document analyzed"
        );
        Ok(insight)
    }
}

/// Pure analysis of already-extracted pages.
pub fn analyze_pages(
    record: &DocumentRecord,
    pages: &[String],
    mode: AnalysisMode,
    settings: &AnalysisConfig,
) -> AnalysisInsight {
    let mut insight = AnalysisInsight {
        source_document: record.path.clone(),
        filename: record.filename.clone(),
        mode,
        page_count: pages.len(),
        raw_text_length: pages.iter().map(|p| p.len()).sum(),
        highlights: Vec::new(),
        pages: Vec::new(),
        key_metrics: Vec::new(),
        full_text: None,
        heuristic: false,
        notes: Vec::new(),
    };

    match mode {
        AnalysisMode::Summary => {
            insight.pages = summarize(pages, settings.summary_pages, settings.summary_chars);
        }
        AnalysisMode::FinancialHighlights => {
            insight.highlights = financial_highlights(pages, settings);
        }
        AnalysisMode::KeyMetrics => {
            insight.key_metrics = key_metrics(pages, settings);
            insight.heuristic = true;
            insight.notes.push(KEY_METRICS_NOTE.to_string());
        }
        AnalysisMode::FullText => {
            insight.full_text = Some(pages.concat());
        }
    }

    if insight.raw_text_length == 0 {
        insight
            .notes
            .push("no extractable text (scanned or image-only document?)".to_string());
    }

    insight
}

/// Collapse intra-line whitespace and runs of blank lines.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(&collapsed);
        blank_run = 0;
    }
    out
}

fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (text[..idx].trim_end().to_string(), true),
        None => (text.to_string(), false),
    }
}

fn summarize(pages: &[String], max_pages: usize, max_chars: usize) -> Vec<PageExcerpt> {
    pages
        .iter()
        .take(max_pages)
        .enumerate()
        .filter_map(|(i, page)| {
            let normalized = normalize(page);
            if normalized.is_empty() {
                return None;
            }
            let (text, truncated) = truncate_chars(&normalized, max_chars);
            Some(PageExcerpt {
                page: i + 1,
                text,
                truncated,
            })
        })
        .collect()
}

/// Split a paragraph into sentences at `.`, `!` or `?` followed by
/// whitespace and an upper-case letter. `Rs. 5` stays in one piece.
fn sentences(paragraph: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = paragraph.char_indices().collect();
    let mut out = Vec::new();
    let mut start = 0;

    for i in 0..chars.len() {
        let (idx, c) = chars[i];
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let next_is_space = chars.get(i + 1).is_some_and(|(_, n)| n.is_whitespace());
        let after_is_start = chars
            .get(i + 2)
            .is_some_and(|(_, n)| n.is_uppercase());
        if next_is_space && after_is_start {
            let end = idx + c.len_utf8();
            out.push(paragraph[start..end].trim());
            start = end;
        }
    }
    let tail = paragraph[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

/// Canonical keywords found in `text`, in order of first appearance.
fn keyword_hits(text: &str) -> Vec<String> {
    let mut hits: Vec<String> = Vec::new();
    for m in KEYWORD_PATTERN.find_iter(text) {
        let lower = m.as_str().to_lowercase();
        let canonical = match lower.strip_suffix('s') {
            Some(singular) if FINANCIAL_KEYWORDS.contains(&singular) => singular.to_string(),
            _ => lower,
        };
        if !hits.contains(&canonical) {
            hits.push(canonical);
        }
    }
    hits
}

fn financial_highlights(pages: &[String], settings: &AnalysisConfig) -> Vec<Highlight> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for (i, page) in pages.iter().enumerate() {
        let normalized = normalize(page);
        for paragraph in normalized.split("\n\n") {
            let joined = paragraph.lines().collect::<Vec<_>>().join(" ");
            for sentence in sentences(&joined) {
                if sentence.chars().count() < settings.min_snippet_chars {
                    continue;
                }
                let keywords = keyword_hits(sentence);
                if keywords.is_empty() {
                    continue;
                }
                if !seen.insert(sentence.to_lowercase()) {
                    continue;
                }
                let (mut text, truncated) = truncate_chars(sentence, settings.max_snippet_chars);
                if truncated {
                    text.push_str("...");
                }
                out.push(Highlight {
                    page: i + 1,
                    keywords,
                    text,
                });
                if out.len() >= settings.max_highlights {
                    return out;
                }
            }
        }
    }
    out
}

fn key_metrics(pages: &[String], settings: &AnalysisConfig) -> Vec<MetricMention> {
    let mut out = Vec::new();

    for (i, page) in pages.iter().enumerate() {
        for line in normalize(page).lines() {
            if out.len() >= settings.max_metric_lines {
                return out;
            }
            if !KEYWORD_PATTERN.is_match(line) {
                continue;
            }
            let values: Vec<String> = NUMBER_PATTERN
                .find_iter(line)
                .map(|m| m.as_str().trim().to_string())
                .take(MAX_VALUES_PER_LINE)
                .collect();
            if values.is_empty() {
                continue;
            }
            let (line, _) = truncate_chars(line, settings.max_snippet_chars);
            out.push(MetricMention {
                page: i + 1,
                line,
                values,
            });
        }
    }
    out
}

/// Present an insight in the requested format.
pub fn render(insight: &AnalysisInsight, format: OutputFormat) -> Value {
    match format {
        OutputFormat::Text => Value::String(render_text(insight)),
        OutputFormat::Json => serde_json::to_value(insight).unwrap_or(Value::Null),
        OutputFormat::Structured => render_structured(insight),
    }
}

/// Plain-text rendering. Full-text mode returns the extracted text verbatim.
pub fn render_text(insight: &AnalysisInsight) -> String {
    if let Some(text) = &insight.full_text {
        return text.clone();
    }

    let mut out = String::new();
    match insight.mode {
        AnalysisMode::Summary => {
            out.push_str(&format!("Document: {}\n", insight.filename));
            out.push_str(&format!("Pages: {}\n", insight.page_count));
            for excerpt in &insight.pages {
                out.push_str(&format!("\nPage {}:\n{}", excerpt.page, excerpt.text));
                if excerpt.truncated {
                    out.push_str("...");
                }
                out.push('\n');
            }
        }
        AnalysisMode::FinancialHighlights => {
            out.push_str(&format!("Financial highlights from {}\n", insight.filename));
            if insight.highlights.is_empty() {
                out.push_str("(no financial highlights found)\n");
            }
            for h in &insight.highlights {
                out.push_str(&format!("[Page {}] {}\n", h.page, h.text));
            }
        }
        AnalysisMode::KeyMetrics => {
            out.push_str(&format!("Key metrics from {} (heuristic)\n", insight.filename));
            if insight.key_metrics.is_empty() {
                out.push_str("(no number-bearing lines found)\n");
            }
            for m in &insight.key_metrics {
                out.push_str(&format!(
                    "[Page {}] {}  ->  {}\n",
                    m.page,
                    m.line,
                    m.values.join(", ")
                ));
            }
        }
        AnalysisMode::FullText => {}
    }
    for note in &insight.notes {
        out.push_str(&format!("note: {}\n", note));
    }
    out
}

/// Page-grouped JSON for consumers that lay results out per page.
fn render_structured(insight: &AnalysisInsight) -> Value {
    let mut by_page: BTreeMap<usize, Vec<Value>> = BTreeMap::new();
    for h in &insight.highlights {
        by_page
            .entry(h.page)
            .or_default()
            .push(json!({ "kind": "highlight", "text": h.text, "keywords": h.keywords }));
    }
    for e in &insight.pages {
        by_page
            .entry(e.page)
            .or_default()
            .push(json!({ "kind": "excerpt", "text": e.text, "truncated": e.truncated }));
    }
    for m in &insight.key_metrics {
        by_page
            .entry(m.page)
            .or_default()
            .push(json!({ "kind": "metric", "text": m.line, "values": m.values }));
    }

    let sections: Vec<Value> = by_page
        .into_iter()
        .map(|(page, items)| json!({ "page": page, "items": items }))
        .collect();

    json!({
        "document": {
            "filename": insight.filename,
            "path": insight.source_document.display().to_string(),
            "mode": insight.mode,
            "page_count": insight.page_count,
            "raw_text_length": insight.raw_text_length,
            "heuristic": insight.heuristic,
        },
        "sections": sections,
        "full_text": insight.full_text,
        "notes": insight.notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use chrono::Utc;
    use std::path::PathBuf;

    fn record() -> DocumentRecord {
        DocumentRecord {
            path: PathBuf::from("/docs/TCS_Transcript.pdf"),
            filename: "TCS_Transcript.pdf".to_string(),
            modified_at: Utc::now(),
            size_bytes: 1,
            classification: classify("TCS_Transcript.pdf"),
        }
    }

    fn pages() -> Vec<String> {
        vec![
            "Welcome to the   Q3 earnings call.\n\nOur revenue grew 12.5% year on year to Rs 5,400 crore in the quarter. \
             The weather was pleasant throughout the entire quarter period.\n"
                .to_string(),
            "EBITDA margin expanded by 120 bps to 26.1% driven by operating leverage.\n\
             Our revenue grew 12.5% year on year to Rs 5,400 crore in the quarter.\n\
             Thank you all for joining us today on this call.\n"
                .to_string(),
        ]
    }

    #[test]
    fn normalize_collapses_whitespace_and_blank_runs() {
        assert_eq!(normalize("  a   b \n\n\n c\r\nd  "), "a b\n\nc\nd");
    }

    #[test]
    fn sentences_split_on_terminal_punctuation() {
        let s = sentences("Revenue was Rs. 5.4 bn. Margins rose! Why? Because.");
        assert_eq!(s, vec!["Revenue was Rs. 5.4 bn.", "Margins rose!", "Why?", "Because."]);
    }

    #[test]
    fn highlights_are_ordered_deduplicated_and_capped() {
        let settings = AnalysisConfig::default();
        let insight = analyze_pages(&record(), &pages(), AnalysisMode::FinancialHighlights, &settings);

        let texts: Vec<&str> = insight.highlights.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Our revenue grew 12.5% year on year to Rs 5,400 crore in the quarter.",
                "The weather was pleasant throughout the entire quarter period.",
                "EBITDA margin expanded by 120 bps to 26.1% driven by operating leverage.",
            ]
        );
        assert_eq!(insight.highlights[0].page, 1);
        assert_eq!(insight.highlights[0].keywords, vec!["revenue", "quarter"]);
        assert_eq!(insight.highlights[2].page, 2);

        let capped = AnalysisConfig {
            max_highlights: 1,
            ..AnalysisConfig::default()
        };
        let insight = analyze_pages(&record(), &pages(), AnalysisMode::FinancialHighlights, &capped);
        assert_eq!(insight.highlights.len(), 1);
    }

    #[test]
    fn short_sentences_are_ignored() {
        let settings = AnalysisConfig::default();
        let insight = analyze_pages(
            &record(),
            &["Revenue up.".to_string()],
            AnalysisMode::FinancialHighlights,
            &settings,
        );
        assert!(insight.highlights.is_empty());
    }

    #[test]
    fn keyword_matching_is_whole_word() {
        assert_eq!(keyword_hits("Dividends declared"), vec!["dividend"]);
        assert!(keyword_hits("the path was patented").is_empty());
        assert_eq!(keyword_hits("PAT and EPS rose"), vec!["pat", "eps"]);
    }

    #[test]
    fn key_metrics_pick_numbers_near_keywords() {
        let settings = AnalysisConfig::default();
        let insight = analyze_pages(&record(), &pages(), AnalysisMode::KeyMetrics, &settings);
        assert!(insight.heuristic);
        assert!(!insight.notes.is_empty());

        let first = &insight.key_metrics[0];
        assert_eq!(first.page, 1);
        assert!(first.values.contains(&"12.5%".to_string()));
        assert!(first.values.contains(&"Rs 5,400 crore".to_string()));
        assert!(insight
            .key_metrics
            .iter()
            .all(|m| !m.values.iter().any(|v| v == "3")));
    }

    #[test]
    fn key_metrics_respect_line_cap() {
        let one = AnalysisConfig {
            max_metric_lines: 1,
            ..AnalysisConfig::default()
        };
        let insight = analyze_pages(&record(), &pages(), AnalysisMode::KeyMetrics, &one);
        assert_eq!(insight.key_metrics.len(), 1);

        let none = AnalysisConfig {
            max_metric_lines: 0,
            ..AnalysisConfig::default()
        };
        let insight = analyze_pages(&record(), &pages(), AnalysisMode::KeyMetrics, &none);
        assert!(insight.key_metrics.is_empty());
    }

    #[test]
    fn summary_truncates_per_page() {
        let settings = AnalysisConfig {
            summary_pages: 1,
            summary_chars: 20,
            ..AnalysisConfig::default()
        };
        let insight = analyze_pages(&record(), &pages(), AnalysisMode::Summary, &settings);
        assert_eq!(insight.pages.len(), 1);
        assert_eq!(insight.pages[0].text, "Welcome to the Q3 ea");
        assert!(insight.pages[0].truncated);
        assert_eq!(insight.page_count, 2);
    }

    #[test]
    fn full_text_round_trips_length() {
        let settings = AnalysisConfig::default();
        let p = pages();
        let insight = analyze_pages(&record(), &p, AnalysisMode::FullText, &settings);
        let text = render_text(&insight);
        let expected: usize = p.iter().map(|s| s.len()).sum();
        assert_eq!(text.len(), expected);
        assert_eq!(insight.raw_text_length, expected);
        assert_eq!(render(&insight, OutputFormat::Text), Value::String(text));
    }

    #[test]
    fn formats_share_the_same_analysis() {
        let settings = AnalysisConfig::default();
        let insight = analyze_pages(&record(), &pages(), AnalysisMode::FinancialHighlights, &settings);

        let as_json = render(&insight, OutputFormat::Json);
        assert_eq!(
            as_json["highlights"].as_array().unwrap().len(),
            insight.highlights.len()
        );

        let structured = render(&insight, OutputFormat::Structured);
        let items: usize = structured["sections"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["items"].as_array().unwrap().len())
            .sum();
        assert_eq!(items, insight.highlights.len());

        let text = render_text(&insight);
        for h in &insight.highlights {
            assert!(text.contains(&h.text));
        }
    }

    #[test]
    fn empty_document_gets_a_note() {
        let settings = AnalysisConfig::default();
        let insight = analyze_pages(&record(), &[String::new()], AnalysisMode::Summary, &settings);
        assert!(insight.pages.is_empty());
        assert_eq!(insight.notes.len(), 1);
    }
}
