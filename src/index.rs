//! Document index over the configured directory.
//!
//! [`DocumentIndex::refresh`] rescans the directory and reclassifies only
//! files that are new or whose modification time or size changed; records
//! for files that disappeared are dropped. Classification runs outside the
//! lock, so concurrent refreshes may redo the same (pure) work and the last
//! writer wins. Readers see either the old or the new record for a path,
//! never a partial one.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use walkdir::WalkDir;

use crate::classify::classify;
use crate::config::DocumentsConfig;
use crate::models::DocumentRecord;

/// Counts from one [`DocumentIndex::refresh`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshStats {
    pub scanned: usize,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
}

/// File seen on disk during a scan, before classification.
struct ScannedFile {
    path: PathBuf,
    filename: String,
    modified_at: DateTime<Utc>,
    size_bytes: u64,
}

pub struct DocumentIndex {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    recursive: bool,
    follow_symlinks: bool,
    records: RwLock<HashMap<PathBuf, Arc<DocumentRecord>>>,
}

impl DocumentIndex {
    /// Build an empty index. Fails if the directory is missing or a glob is invalid.
    pub fn new(config: &DocumentsConfig) -> Result<Self> {
        if !config.dir.is_dir() {
            bail!(
                "document directory does not exist: {}",
                config.dir.display()
            );
        }

        Ok(Self {
            root: config.dir.clone(),
            include: build_globset(&config.include_globs)?,
            exclude: build_globset(&config.exclude_globs)?,
            recursive: config.recursive,
            follow_symlinks: config.follow_symlinks,
            records: RwLock::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rescan the directory and bring the cached records up to date.
    pub fn refresh(&self) -> Result<RefreshStats> {
        let scanned = self.scan()?;

        let stale: Vec<&ScannedFile> = {
            let records = self.records.read().unwrap_or_else(|e| e.into_inner());
            scanned
                .iter()
                .filter(|f| match records.get(&f.path) {
                    Some(r) => r.modified_at != f.modified_at || r.size_bytes != f.size_bytes,
                    None => true,
                })
                .collect()
        };

        let fresh: Vec<Arc<DocumentRecord>> = stale
            .iter()
            .map(|f| {
                Arc::new(DocumentRecord {
                    path: f.path.clone(),
                    filename: f.filename.clone(),
                    modified_at: f.modified_at,
                    size_bytes: f.size_bytes,
                    classification: classify(&f.filename),
                })
            })
            .collect();

        let present: HashSet<&Path> = scanned.iter().map(|f| f.path.as_path()).collect();

        let mut stats = RefreshStats {
            scanned: scanned.len(),
            ..Default::default()
        };

        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        for record in fresh {
            match records.insert(record.path.clone(), record) {
                Some(_) => stats.updated += 1,
                None => stats.added += 1,
            }
        }
        let before = records.len();
        records.retain(|path, _| present.contains(path.as_path()));
        stats.removed = before - records.len();
        stats.unchanged = scanned.len().saturating_sub(stats.added + stats.updated);
        drop(records);

        if stats.added + stats.updated + stats.removed > 0 {
            tracing::info!(
                root = %self.root.display(),
                scanned = stats.scanned,
                added = stats.added,
                updated = stats.updated,
                removed = stats.removed,
                "document index refreshed"
            );
        } else {
            tracing::debug!(scanned = stats.scanned, "document index unchanged");
        }

        Ok(stats)
    }

    /// All records, ordered by filename.
    pub fn list_all(&self) -> Vec<Arc<DocumentRecord>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<Arc<DocumentRecord>> = records.values().cloned().collect();
        all.sort_by(|a, b| a.filename.cmp(&b.filename).then(a.path.cmp(&b.path)));
        all
    }

    pub fn get(&self, path: &Path) -> Option<Arc<DocumentRecord>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(path).cloned()
    }

    /// Look up a record by its path relative to the index root.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<DocumentRecord>> {
        self.get(&self.root.join(name))
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn scan(&self) -> Result<Vec<ScannedFile>> {
        if !self.root.is_dir() {
            bail!("document directory is missing: {}", self.root.display());
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(&self.root)
            .follow_links(self.follow_symlinks)
            .max_depth(max_depth);

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().replace('\\', "/");

            if self.exclude.is_match(&rel_str) || !self.include.is_match(&rel_str) {
                continue;
            }

            // The file may vanish between the walk and the stat.
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping file without metadata");
                    continue;
                }
            };
            let modified = metadata
                .modified()
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);

            files.push(ScannedFile {
                path: path.to_path_buf(),
                filename: entry.file_name().to_string_lossy().to_string(),
                modified_at: DateTime::<Utc>::from(modified),
                size_bytes: metadata.len(),
            });
        }

        Ok(files)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("invalid glob: '{}'", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
