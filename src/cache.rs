//! Modification-time aware file cache.
//!
//! Entries are keyed by the include path as written in templates (after
//! [`normalize_reference`](crate::fs_utils::normalize_reference)). Every
//! [`FileCache::get`] stats the file through its [`FileSource`] and reloads
//! the content when the recorded timestamp no longer covers the file's
//! modification time. Nothing is evicted; the cache lives as long as its owner.

use crate::config::FreshnessCheck;
use crate::error::{Result, WeaveError};
use crate::fs_utils::{modified_time, read_file_contents};
use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Cached content of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub content: String,
    /// Freshness timestamp: the file's mtime when loaded, or the seed time
    pub last_checked: SystemTime,
    /// Whether the entry was seeded through [`FileCache::set`]
    pub seeded: bool,
}

/// Where the cache gets file metadata, content and the current time from
pub trait FileSource {
    /// Modification time of `path`; `WeaveError::NotFound` when absent
    fn modified(&self, path: &Path) -> Result<SystemTime>;

    fn read(&self, path: &Path) -> Result<String>;

    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Reads files from disk relative to a base directory
#[derive(Debug, Clone)]
pub struct DiskSource {
    base_dir: PathBuf,
}

impl DiskSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl FileSource for DiskSource {
    fn modified(&self, path: &Path) -> Result<SystemTime> {
        modified_time(&self.base_dir.join(path)).map_err(|e| relative_not_found(e, path))
    }

    fn read(&self, path: &Path) -> Result<String> {
        read_file_contents(&self.base_dir.join(path)).map_err(|e| relative_not_found(e, path))
    }
}

// Report the include path as written, not the joined absolute path.
fn relative_not_found(err: WeaveError, path: &Path) -> WeaveError {
    match err {
        WeaveError::NotFound { .. } => WeaveError::NotFound {
            path: path.to_path_buf(),
        },
        other => other,
    }
}

/// In-memory files with a settable clock.
///
/// Serves virtual files and makes freshness behaviour deterministic in tests.
#[derive(Debug)]
pub struct MemorySource {
    files: HashMap<PathBuf, (String, SystemTime)>,
    now: SystemTime,
    reads: Cell<usize>,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH)
    }
}

impl MemorySource {
    pub fn new(now: SystemTime) -> Self {
        Self {
            files: HashMap::new(),
            now,
            reads: Cell::new(0),
        }
    }

    /// Adds or replaces a file
    pub fn insert(
        &mut self,
        path: impl Into<PathBuf>,
        content: impl Into<String>,
        modified: SystemTime,
    ) {
        self.files.insert(path.into(), (content.into(), modified));
    }

    /// Changes a file's modification time without touching its content
    pub fn touch(&mut self, path: &Path, modified: SystemTime) {
        if let Some(file) = self.files.get_mut(path) {
            file.1 = modified;
        }
    }

    pub fn remove(&mut self, path: &Path) {
        self.files.remove(path);
    }

    pub fn set_now(&mut self, now: SystemTime) {
        self.now = now;
    }

    /// Number of content reads served so far
    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl FileSource for MemorySource {
    fn modified(&self, path: &Path) -> Result<SystemTime> {
        self.files
            .get(path)
            .map(|(_, modified)| *modified)
            .ok_or_else(|| WeaveError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn read(&self, path: &Path) -> Result<String> {
        self.reads.set(self.reads.get() + 1);
        self.files
            .get(path)
            .map(|(content, _)| content.clone())
            .ok_or_else(|| WeaveError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn now(&self) -> SystemTime {
        self.now
    }
}

/// Path → content cache invalidated by modification time
#[derive(Debug)]
pub struct FileCache<S = DiskSource> {
    source: S,
    freshness: FreshnessCheck,
    entries: HashMap<PathBuf, CacheEntry>,
    hits: usize,
    misses: usize,
}

impl<S: FileSource> FileCache<S> {
    pub fn new(source: S, freshness: FreshnessCheck) -> Self {
        Self {
            source,
            freshness,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Returns the content for `path`, reloading it when stale
    ///
    /// # Errors
    ///
    /// - `WeaveError::NotFound` if the file doesn't exist and no seeded entry covers it.
    /// - `WeaveError::Io` on read failures.
    pub fn get(&mut self, path: &Path) -> Result<&str> {
        Ok(&self.get_entry(path)?.content)
    }

    /// Returns the whole entry for `path`, reloading it when stale
    ///
    /// # Errors
    ///
    /// Same as [`FileCache::get`].
    pub fn get_entry(&mut self, path: &Path) -> Result<&CacheEntry> {
        let modified = match self.source.modified(path) {
            Ok(modified) => modified,
            Err(WeaveError::NotFound { .. })
                if self.entries.get(path).is_some_and(|entry| entry.seeded) =>
            {
                tracing::trace!(path = %path.display(), "serving seeded entry");
                self.hits += 1;
                return Ok(&self.entries[path]);
            }
            Err(e) => return Err(e),
        };

        let fresh = self
            .entries
            .get(path)
            .is_some_and(|entry| self.freshness.is_fresh(entry.last_checked, modified));
        if fresh {
            tracing::trace!(path = %path.display(), "cache hit");
            self.hits += 1;
            return Ok(&self.entries[path]);
        }

        tracing::debug!(path = %path.display(), "loading file into cache");
        self.misses += 1;
        let content = self.source.read(path)?;
        let entry = CacheEntry {
            path: path.to_path_buf(),
            content,
            last_checked: modified,
            seeded: false,
        };
        self.entries.insert(path.to_path_buf(), entry);
        Ok(&self.entries[path])
    }

    /// Seeds or overwrites an entry without reading the file.
    ///
    /// Without a timestamp the file's own modification time is recorded when
    /// it exists and is not in the future; otherwise the source clock's
    /// current time.
    pub fn set(
        &mut self,
        path: impl Into<PathBuf>,
        content: impl Into<String>,
        timestamp: Option<SystemTime>,
    ) {
        let path = path.into();
        let last_checked = timestamp.unwrap_or_else(|| {
            let now = self.source.now();
            match self.source.modified(&path) {
                Ok(modified) if modified <= now => modified,
                _ => now,
            }
        });
        let entry = CacheEntry {
            path: path.clone(),
            content: content.into(),
            last_checked,
            seeded: true,
        };
        self.entries.insert(path, entry);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cache statistics as `(hits, misses)`
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}
