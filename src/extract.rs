//! Page-level text extraction for company documents.
//!
//! The [`DocumentTextExtractor`] trait is the seam to the PDF parser.
//! [`PageLoader`] runs an extractor on the blocking pool under a timeout and
//! memoizes page text per (path, modification time) in a bounded LRU. A
//! cache miss re-extracts, so results never depend on what is cached.
//!
//! A timed-out extraction keeps running on its blocking thread until the
//! parser returns; only the waiting request gives up.

use chrono::{DateTime, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::ExtractionError;
use crate::models::DocumentRecord;

/// Turns a document on disk into one string per page.
pub trait DocumentTextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Vec<String>, ExtractionError>;
}

/// PDF extractor backed by `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl DocumentTextExtractor for PdfTextExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<String>, ExtractionError> {
        let bytes = std::fs::read(path).map_err(|e| ExtractionError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| ExtractionError::Pdf {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

type CacheKey = (PathBuf, DateTime<Utc>);

/// Bounded LRU of extracted pages.
pub struct ExtractionCache {
    entries: Mutex<LruCache<CacheKey, Arc<Vec<String>>>>,
}

impl ExtractionCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, path: &Path, modified_at: DateTime<Utc>) -> Option<Arc<Vec<String>>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(&(path.to_path_buf(), modified_at)).cloned()
    }

    pub fn put(&self, path: &Path, modified_at: DateTime<Utc>, pages: Arc<Vec<String>>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.put((path.to_path_buf(), modified_at), pages);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Extractor + cache + per-document timeout.
pub struct PageLoader {
    extractor: Arc<dyn DocumentTextExtractor>,
    cache: ExtractionCache,
    timeout: Duration,
}

impl PageLoader {
    pub fn new(
        extractor: Arc<dyn DocumentTextExtractor>,
        cache_capacity: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            cache: ExtractionCache::new(cache_capacity),
            timeout,
        }
    }

    pub fn cache(&self) -> &ExtractionCache {
        &self.cache
    }

    /// Page text for `record`, from cache when its modification time is unchanged.
    pub async fn load(&self, record: &DocumentRecord) -> Result<Arc<Vec<String>>, ExtractionError> {
        if let Some(pages) = self.cache.get(&record.path, record.modified_at) {
            tracing::debug!(file = %record.filename, "extraction cache hit");
            return Ok(pages);
        }

        let extractor = self.extractor.clone();
        let path = record.path.clone();
        let task = tokio::task::spawn_blocking(move || extractor.extract(&path));

        let pages = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_err)) => {
                tracing::error!(file = %record.filename, error = %join_err, "extractor task failed");
                return Err(ExtractionError::Panicked {
                    path: record.path.clone(),
                });
            }
            Err(_) => {
                return Err(ExtractionError::Timeout {
                    path: record.path.clone(),
                    secs: self.timeout.as_secs(),
                })
            }
        };

        let pages = Arc::new(pages);
        self.cache
            .put(&record.path, record.modified_at, pages.clone());
        tracing::debug!(file = %record.filename, pages = pages.len(), "extracted document text");
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingExtractor {
        calls: AtomicUsize,
    }

    impl DocumentTextExtractor for CountingExtractor {
        fn extract(&self, _path: &Path) -> Result<Vec<String>, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["page one".to_string(), "page two".to_string()])
        }
    }

    struct SlowExtractor;

    impl DocumentTextExtractor for SlowExtractor {
        fn extract(&self, _path: &Path) -> Result<Vec<String>, ExtractionError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(vec![])
        }
    }

    fn record(name: &str, secs: i64) -> DocumentRecord {
        DocumentRecord {
            path: PathBuf::from(format!("/docs/{}", name)),
            filename: name.to_string(),
            modified_at: DateTime::from_timestamp(secs, 0).unwrap(),
            size_bytes: 10,
            classification: classify(name),
        }
    }

    #[tokio::test]
    async fn cache_hit_skips_extraction_until_mtime_changes() {
        let extractor = Arc::new(CountingExtractor {
            calls: AtomicUsize::new(0),
        });
        let loader = PageLoader::new(extractor.clone(), 4, Duration::from_secs(5));

        let first = loader.load(&record("TCS.pdf", 100)).await.unwrap();
        let second = loader.load(&record("TCS.pdf", 100)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);

        loader.load(&record("TCS.pdf", 200)).await.unwrap();
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
    }

    /// Pages depend on the path so a mixed-up cache entry would show.
    struct NamedPages {
        calls: AtomicUsize,
    }

    impl DocumentTextExtractor for NamedPages {
        fn extract(&self, path: &Path) -> Result<Vec<String>, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = path.display();
            Ok(vec![format!("{} page 1", name), format!("{} page 2", name)])
        }
    }

    #[tokio::test]
    async fn evicted_entry_reextracts_identical_pages() {
        let extractor = Arc::new(NamedPages {
            calls: AtomicUsize::new(0),
        });
        let loader = PageLoader::new(extractor.clone(), 1, Duration::from_secs(5));

        let tcs = loader.load(&record("TCS.pdf", 100)).await.unwrap();
        let infy = loader.load(&record("INFY.pdf", 100)).await.unwrap();
        assert_ne!(tcs, infy);
        assert!(loader
            .cache()
            .get(Path::new("/docs/TCS.pdf"), DateTime::from_timestamp(100, 0).unwrap())
            .is_none());

        let again = loader.load(&record("TCS.pdf", 100)).await.unwrap();
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 3);
        assert_eq!(again, tcs);
        assert_eq!(again[0], "/docs/TCS.pdf page 1");
    }

    #[tokio::test]
    async fn slow_extraction_times_out() {
        let loader = PageLoader::new(Arc::new(SlowExtractor), 4, Duration::from_millis(50));
        let err = loader.load(&record("SLOW.pdf", 1)).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Timeout { .. }));
        assert!(loader.cache().is_empty());
    }

    #[test]
    fn lru_evicts_oldest_entry() {
        let cache = ExtractionCache::new(1);
        let t = DateTime::from_timestamp(1, 0).unwrap();
        cache.put(Path::new("/a.pdf"), t, Arc::new(vec![]));
        cache.put(Path::new("/b.pdf"), t, Arc::new(vec![]));
        assert!(cache.get(Path::new("/a.pdf"), t).is_none());
        assert!(cache.get(Path::new("/b.pdf"), t).is_some());
    }

    #[test]
    fn unreadable_file_is_io_error() {
        let err = PdfTextExtractor
            .extract(Path::new("/no/such/file.pdf"))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Io { .. }));
    }
}
