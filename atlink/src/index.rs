use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::SystemTime;

use crate::search;
use crate::{AtlinkConfig, IndexedFileInfo};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("index build task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("invalid exclude pattern: {0}")]
    Pattern(#[from] globset::Error),
}

/// The file index the selection popup searches. Implement this per host.
///
/// An index that is not ready yet still answers with whatever it has; callers
/// treat that as degraded, not as an error.
#[async_trait::async_trait]
pub trait FileIndex: Send + Sync + 'static {
    async fn search_files(&self, query: &str, max_results: usize) -> Vec<IndexedFileInfo>;
    async fn recent_files(&self, max_results: usize) -> Vec<IndexedFileInfo>;
    fn is_index_ready(&self) -> bool;
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// A fixed list of entries, in recency order. Useful when the host already
/// holds its own snapshot.
#[derive(Clone, Debug, Default)]
pub struct MemoryIndex {
    files: Vec<IndexedFileInfo>,
}

impl MemoryIndex {
    pub fn new(files: Vec<IndexedFileInfo>) -> Self {
        Self { files }
    }
}

#[async_trait::async_trait]
impl FileIndex for MemoryIndex {
    async fn search_files(&self, query: &str, max_results: usize) -> Vec<IndexedFileInfo> {
        search::search(query, &self.files, max_results)
            .into_iter()
            .map(|r| r.item)
            .collect()
    }

    async fn recent_files(&self, max_results: usize) -> Vec<IndexedFileInfo> {
        self.files.iter().take(max_results).cloned().collect()
    }

    fn is_index_ready(&self) -> bool {
        true
    }
}

/// Entries become visible to searches in batches of this size while the
/// walk is still running.
const PUBLISH_BATCH: usize = 256;

#[derive(Clone, Debug)]
struct Entry {
    info: IndexedFileInfo,
    modified: SystemTime,
}

/// Index over a directory tree, walked with the `ignore` crate so
/// `.gitignore` rules apply.
pub struct WalkIndex {
    root: PathBuf,
    entries: RwLock<Vec<Entry>>,
    ready: AtomicBool,
    recent: Mutex<VecDeque<IndexedFileInfo>>,
    recent_limit: usize,
    ignore_hidden: bool,
    exclude: Option<globset::GlobSet>,
}

impl WalkIndex {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, IndexError> {
        Self::with_options(root, 20, true)
    }

    pub fn with_options(
        root: impl AsRef<Path>,
        recent_limit: usize,
        ignore_hidden: bool,
    ) -> Result<Self, IndexError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(IndexError::NotADirectory(root.to_path_buf()));
        }
        Ok(Self {
            root: root.canonicalize()?,
            entries: RwLock::new(Vec::new()),
            ready: AtomicBool::new(false),
            recent: Mutex::new(VecDeque::new()),
            recent_limit,
            ignore_hidden,
            exclude: None,
        })
    }

    /// Leave out entries whose root-relative path matches any of `patterns`.
    /// An excluded directory is not descended into.
    pub fn with_exclude(mut self, patterns: &[String]) -> Result<Self, IndexError> {
        if patterns.is_empty() {
            self.exclude = None;
            return Ok(self);
        }
        let mut builder = globset::GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(
                globset::GlobBuilder::new(pattern)
                    .literal_separator(false)
                    .build()?,
            );
        }
        self.exclude = Some(builder.build()?);
        Ok(self)
    }

    /// Build from stored settings.
    pub fn from_config(root: impl AsRef<Path>, config: &AtlinkConfig) -> Result<Self, IndexError> {
        Self::with_options(root, config.recent_limit, config.index_ignore_hidden)?
            .with_exclude(&config.index_exclude)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of entries indexed so far.
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, Vec<Entry>> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn publish(&self, batch: &mut Vec<Entry>) {
        if batch.is_empty() {
            return;
        }
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .append(batch);
    }

    /// Walk the tree on the current thread, replacing any previous snapshot.
    /// Returns the number of entries indexed.
    pub fn build_blocking(&self) -> usize {
        self.ready.store(false, Ordering::Release);
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();

        let root = self.root.clone();
        let exclude = self.exclude.clone();
        let walker = ignore::WalkBuilder::new(&self.root)
            .hidden(self.ignore_hidden)
            .git_ignore(true)
            .filter_entry(move |e| {
                if e.file_name() == ".git" {
                    return false;
                }
                match (&exclude, e.path().strip_prefix(&root)) {
                    (Some(set), Ok(rel)) if !rel.as_os_str().is_empty() => !set.is_match(rel),
                    _ => true,
                }
            })
            .build();

        let mut batch = Vec::with_capacity(PUBLISH_BATCH);
        let mut total = 0;
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("index walk error under {}: {e}", self.root.display());
                    continue;
                }
            };
            // depth 0 is the root itself
            if entry.depth() == 0 {
                continue;
            }
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            batch.push(Entry {
                info: IndexedFileInfo::from_path(&self.root, entry.path(), is_dir),
                modified,
            });
            total += 1;
            if batch.len() >= PUBLISH_BATCH {
                self.publish(&mut batch);
            }
        }
        self.publish(&mut batch);
        self.ready.store(true, Ordering::Release);
        tracing::info!("indexed {total} entries under {}", self.root.display());
        total
    }

    /// Walk the tree on tokio's blocking pool.
    pub async fn build(self: &Arc<Self>) -> Result<usize, IndexError> {
        let this = Arc::clone(self);
        Ok(tokio::task::spawn_blocking(move || this.build_blocking()).await?)
    }

    /// Start a walk in the background; searches see partial results until
    /// it finishes.
    pub fn spawn_build(self: &Arc<Self>) -> tokio::task::JoinHandle<usize> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.build_blocking())
    }

    /// Record that an entry was used, moving it to the front of the recent list.
    pub fn touch(&self, item: &IndexedFileInfo) {
        let mut recent = lock(&self.recent);
        recent.retain(|r| r.absolute_path != item.absolute_path);
        recent.push_front(item.clone());
        recent.truncate(self.recent_limit);
    }

    /// [`touch`](Self::touch) by relative or absolute path. Returns false
    /// when the path is not indexed.
    pub fn touch_path(&self, path: &str) -> bool {
        let found = self
            .read_entries()
            .iter()
            .find(|e| e.info.relative_path == path || e.info.absolute_path == path)
            .map(|e| e.info.clone());
        match found {
            Some(info) => {
                self.touch(&info);
                true
            }
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl FileIndex for WalkIndex {
    async fn search_files(&self, query: &str, max_results: usize) -> Vec<IndexedFileInfo> {
        if query.trim().is_empty() {
            return self.recent_files(max_results).await;
        }
        let snapshot: Vec<IndexedFileInfo> =
            self.read_entries().iter().map(|e| e.info.clone()).collect();
        search::search(query, &snapshot, max_results)
            .into_iter()
            .map(|r| r.item)
            .collect()
    }

    async fn recent_files(&self, max_results: usize) -> Vec<IndexedFileInfo> {
        let mut out: Vec<IndexedFileInfo> =
            lock(&self.recent).iter().take(max_results).cloned().collect();
        if out.len() >= max_results {
            return out;
        }
        // Fill with the newest-modified files.
        let mut files: Vec<Entry> = self
            .read_entries()
            .iter()
            .filter(|e| !e.info.is_directory)
            .cloned()
            .collect();
        files.sort_by(|a, b| b.modified.cmp(&a.modified));
        for e in files {
            if out.len() >= max_results {
                break;
            }
            if !out.iter().any(|r| r.absolute_path == e.info.absolute_path) {
                out.push(e.info);
            }
        }
        out
    }

    fn is_index_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}
