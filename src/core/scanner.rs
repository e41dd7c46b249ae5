/*!
 * Tree scanner: walks the source tree and feeds the inventory
 */

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::inventory::{FileRecord, InventoryStore};
use crate::error::{MirrorError, Result};

/// Outcome of one scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Regular files upserted into the inventory
    pub files_indexed: u64,
    /// Directories, symlinks and special files
    pub entries_skipped: u64,
    /// Entries lost to walk, metadata or store errors
    pub errors: u64,
    /// Sum of indexed file sizes
    pub bytes_indexed: u64,
}

/// Single-threaded walker; the inventory's only writer
pub struct TreeScanner {
    exclude: Option<PathBuf>,
}

impl TreeScanner {
    pub fn new() -> Self {
        Self { exclude: None }
    }

    /// Prune `dir` from the walk (used when the destination sits inside the source)
    pub fn excluding(mut self, dir: impl Into<PathBuf>) -> Self {
        self.exclude = Some(dir.into());
        self
    }

    /// Canonicalize `root`, walk it and upsert every regular file.
    ///
    /// Returns the canonical root alongside the stats so callers can relate
    /// stored absolute paths back to the tree.
    pub fn scan(&self, root: &Path, store: &dyn InventoryStore) -> Result<(PathBuf, ScanStats)> {
        let root = std::fs::canonicalize(root)
            .map_err(|_| MirrorError::SourceNotFound(root.to_path_buf()))?;
        if !root.is_dir() {
            return Err(MirrorError::SourceNotFound(root));
        }

        info!("Scanning {}", root.display());
        let mut stats = ScanStats::default();

        let walker = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| match &self.exclude {
                Some(excluded) => entry.path() != excluded.as_path(),
                None => true,
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    stats.errors += 1;
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                if entry.depth() > 0 {
                    stats.entries_skipped += 1;
                }
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Cannot stat {}: {}", entry.path().display(), e);
                    stats.errors += 1;
                    continue;
                }
            };

            let mtime = match metadata.modified() {
                Ok(time) => DateTime::<Utc>::from(time),
                Err(e) => {
                    warn!("No modification time for {}: {}", entry.path().display(), e);
                    stats.errors += 1;
                    continue;
                }
            };

            let record = FileRecord {
                path: entry.path().to_path_buf(),
                size: metadata.len(),
                mtime,
            };

            match store.upsert(&record) {
                Ok(()) => {
                    debug!("Indexed {} ({} bytes)", record.path.display(), record.size);
                    stats.files_indexed += 1;
                    stats.bytes_indexed += record.size;
                }
                Err(e) => {
                    warn!("Index update failed for {}: {}", record.path.display(), e);
                    stats.errors += 1;
                }
            }
        }

        info!(
            "Indexed {} files ({} skipped, {} errors)",
            stats.files_indexed, stats.entries_skipped, stats.errors
        );
        Ok((root, stats))
    }
}

impl Default for TreeScanner {
    fn default() -> Self {
        Self::new()
    }
}
