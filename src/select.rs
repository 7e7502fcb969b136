//! Document selection for a symbol.
//!
//! Order of attempts: symbol tokens, then company-name aliases, then the
//! fallback (every document at score 0, newest first). A non-empty
//! directory therefore never yields an empty candidate list.

use globset::GlobBuilder;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::index::DocumentIndex;
use crate::models::{DocumentRecord, MatchCandidate, MatchOutcome};
use crate::score::{RelevanceScorer, ScoreQuery};

pub const FALLBACK_REASON: &str = "fallback: no symbol match";
pub const PATTERN_REASON: &str = "pattern match";

/// Ranked candidates plus how they were produced.
#[derive(Debug, Clone)]
pub struct Selection {
    pub outcome: MatchOutcome,
    pub total_documents: usize,
    pub candidates: Vec<MatchCandidate>,
}

pub struct DocumentSelector {
    index: Arc<DocumentIndex>,
    scorer: RelevanceScorer,
    max_results: usize,
}

impl DocumentSelector {
    pub fn new(index: Arc<DocumentIndex>, scorer: RelevanceScorer, max_results: usize) -> Self {
        Self {
            index,
            scorer,
            max_results,
        }
    }

    pub fn index(&self) -> &DocumentIndex {
        &self.index
    }

    /// Refresh the index, keeping the previous records if the scan fails.
    fn current_records(&self) -> Vec<Arc<DocumentRecord>> {
        if let Err(e) = self.index.refresh() {
            tracing::warn!(error = %e, "index refresh failed, using cached records");
        }
        self.index.list_all()
    }

    /// Rank documents for `symbol`, trying `aliases` only if the symbol matched nothing.
    pub fn select(&self, symbol: &str, aliases: &[String]) -> Selection {
        let records = self.current_records();
        let total_documents = records.len();

        if records.is_empty() {
            return Selection {
                outcome: MatchOutcome::NoDocuments,
                total_documents,
                candidates: Vec::new(),
            };
        }

        let mut outcome = MatchOutcome::Symbol;
        let mut candidates = self.score_all(&records, &ScoreQuery::symbol(symbol));

        if candidates.is_empty() && !aliases.is_empty() {
            outcome = MatchOutcome::Alias;
            candidates = self.score_all(&records, &ScoreQuery::aliases(aliases));
        }

        if candidates.is_empty() {
            tracing::info!(symbol, total_documents, "no document matched, using fallback");
            outcome = MatchOutcome::Fallback;
            candidates = records
                .iter()
                .map(|r| MatchCandidate {
                    record: r.clone(),
                    score: 0,
                    match_reason: FALLBACK_REASON.to_string(),
                })
                .collect();
        }

        rank(&mut candidates);
        candidates.truncate(self.max_results);

        tracing::debug!(
            symbol,
            outcome = ?outcome,
            candidates = candidates.len(),
            "documents selected"
        );

        Selection {
            outcome,
            total_documents,
            candidates,
        }
    }

    /// Documents whose filename matches `pattern`, newest first.
    ///
    /// A pattern containing `*`, `?` or `[` is a case-insensitive glob;
    /// anything else is a case-insensitive substring.
    pub fn select_by_pattern(&self, pattern: &str) -> Selection {
        let records = self.current_records();
        let total_documents = records.len();

        if records.is_empty() {
            return Selection {
                outcome: MatchOutcome::NoDocuments,
                total_documents,
                candidates: Vec::new(),
            };
        }

        let matcher = FilenameMatcher::new(pattern);
        let mut candidates: Vec<MatchCandidate> = records
            .iter()
            .filter(|r| matcher.is_match(&r.filename))
            .map(|r| MatchCandidate {
                record: r.clone(),
                score: 0,
                match_reason: PATTERN_REASON.to_string(),
            })
            .collect();

        rank(&mut candidates);
        candidates.truncate(self.max_results);

        Selection {
            outcome: MatchOutcome::Pattern,
            total_documents,
            candidates,
        }
    }

    fn score_all(&self, records: &[Arc<DocumentRecord>], query: &ScoreQuery) -> Vec<MatchCandidate> {
        records
            .iter()
            .filter_map(|r| {
                self.scorer.evaluate(r, query).map(|s| MatchCandidate {
                    record: r.clone(),
                    score: s.points,
                    match_reason: s.reason,
                })
            })
            .filter(|c| c.score > 0)
            .collect()
    }
}

enum FilenameMatcher {
    Glob(globset::GlobMatcher),
    Substring(String),
}

impl FilenameMatcher {
    fn new(pattern: &str) -> Self {
        if pattern.contains(['*', '?', '[']) {
            match GlobBuilder::new(pattern).case_insensitive(true).build() {
                Ok(glob) => return FilenameMatcher::Glob(glob.compile_matcher()),
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "invalid glob, matching as substring");
                }
            }
        }
        FilenameMatcher::Substring(pattern.to_lowercase())
    }

    fn is_match(&self, filename: &str) -> bool {
        match self {
            FilenameMatcher::Glob(glob) => glob.is_match(filename),
            FilenameMatcher::Substring(needle) => filename.to_lowercase().contains(needle),
        }
    }
}

/// Score desc, then newest first, then path for determinism.
fn compare(a: &MatchCandidate, b: &MatchCandidate) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.record.modified_at.cmp(&a.record.modified_at))
        .then_with(|| a.record.path.cmp(&b.record.path))
}

fn rank(candidates: &mut [MatchCandidate]) {
    candidates.sort_by(compare);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ScoringConfig};
    use std::fs;
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn touch(path: &Path, secs: u64) {
        fs::write(path, b"%PDF-1.4\n").unwrap();
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    fn selector(dir: &Path, max_results: usize) -> DocumentSelector {
        let config = Config::for_directory(dir);
        let index = Arc::new(DocumentIndex::new(&config.documents).unwrap());
        DocumentSelector::new(index, RelevanceScorer::new(ScoringConfig::default()), max_results)
    }

    fn names(selection: &Selection) -> Vec<(String, i64)> {
        selection
            .candidates
            .iter()
            .map(|c| (c.record.filename.clone(), c.score))
            .collect()
    }

    #[test]
    fn symbol_matches_rank_by_score() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("AARTIIND.pdf"), 1_000);
        touch(&tmp.path().join("AARTIIND_Transcript.pdf"), 2_000);
        touch(&tmp.path().join("TCS.pdf"), 3_000);

        let s = selector(tmp.path(), 5).select("AARTIIND", &[]);
        assert_eq!(s.outcome, MatchOutcome::Symbol);
        assert_eq!(s.total_documents, 3);
        assert_eq!(
            names(&s),
            vec![
                ("AARTIIND_Transcript.pdf".to_string(), 150),
                ("AARTIIND.pdf".to_string(), 110)
            ]
        );
    }

    #[test]
    fn equal_scores_break_on_recency() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("TCS_Q1.pdf"), 1_000);
        touch(&tmp.path().join("TCS_Q2.pdf"), 2_000);

        let s = selector(tmp.path(), 5).select("TCS", &[]);
        assert_eq!(
            names(&s),
            vec![("TCS_Q2.pdf".to_string(), 140), ("TCS_Q1.pdf".to_string(), 140)]
        );
    }

    #[test]
    fn aliases_used_only_when_symbol_misses() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("Aarti_Earnings.pdf"), 1_000);
        touch(&tmp.path().join("INFY.pdf"), 1_000);

        let aliases = vec!["AARTI".to_string()];
        let s = selector(tmp.path(), 5).select("AARTIIND", &aliases);
        assert_eq!(s.outcome, MatchOutcome::Alias);
        assert_eq!(names(&s), vec![("Aarti_Earnings.pdf".to_string(), 100)]);

        touch(&tmp.path().join("AARTIIND.pdf"), 500);
        let s = selector(tmp.path(), 5).select("AARTIIND", &aliases);
        assert_eq!(s.outcome, MatchOutcome::Symbol);
        assert_eq!(names(&s), vec![("AARTIIND.pdf".to_string(), 110)]);
    }

    #[test]
    fn fallback_returns_everything_at_zero_newest_first() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("AARTIIND.pdf"), 1_000);
        touch(&tmp.path().join("AARTIIND_Transcript.pdf"), 2_000);

        let s = selector(tmp.path(), 5).select("RELIANCE", &[]);
        assert_eq!(s.outcome, MatchOutcome::Fallback);
        assert_eq!(
            names(&s),
            vec![
                ("AARTIIND_Transcript.pdf".to_string(), 0),
                ("AARTIIND.pdf".to_string(), 0)
            ]
        );
        assert!(s.candidates.iter().all(|c| c.match_reason == FALLBACK_REASON));
    }

    #[test]
    fn results_are_capped() {
        let tmp = TempDir::new().unwrap();
        for i in 0..4 {
            touch(&tmp.path().join(format!("DOC{}.pdf", i)), 1_000 + i);
        }
        let s = selector(tmp.path(), 2).select("NOPE", &[]);
        assert_eq!(s.candidates.len(), 2);
        assert_eq!(s.total_documents, 4);
        assert_eq!(s.candidates[0].record.filename, "DOC3.pdf");
    }

    #[test]
    fn empty_directory_reports_no_documents() {
        let tmp = TempDir::new().unwrap();
        let s = selector(tmp.path(), 5).select("TCS", &[]);
        assert_eq!(s.outcome, MatchOutcome::NoDocuments);
        assert!(s.candidates.is_empty());
    }

    #[test]
    fn pattern_glob_and_substring() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("TCS_Transcript.pdf"), 1_000);
        touch(&tmp.path().join("TCS_Annual_Report.pdf"), 2_000);
        touch(&tmp.path().join("INFY.pdf"), 3_000);

        let sel = selector(tmp.path(), 5);
        let glob = sel.select_by_pattern("tcs_*.pdf");
        assert_eq!(glob.outcome, MatchOutcome::Pattern);
        assert_eq!(
            names(&glob),
            vec![
                ("TCS_Annual_Report.pdf".to_string(), 0),
                ("TCS_Transcript.pdf".to_string(), 0)
            ]
        );
        assert!(glob.candidates.iter().all(|c| c.match_reason == PATTERN_REASON));

        let sub = sel.select_by_pattern("transcript");
        assert_eq!(names(&sub), vec![("TCS_Transcript.pdf".to_string(), 0)]);

        assert!(sel.select_by_pattern("HDFC").candidates.is_empty());
    }

    #[test]
    fn ordering_is_total() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("TCS_B.pdf"), 1_000);
        touch(&tmp.path().join("TCS_A.pdf"), 1_000);
        let s = selector(tmp.path(), 5).select("TCS", &[]);
        assert_eq!(s.candidates[0].record.filename, "TCS_A.pdf");
        for pair in s.candidates.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
}
