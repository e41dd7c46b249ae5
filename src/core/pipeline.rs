/*!
 * Pipeline orchestration: scan, archive small files, chunk-copy large files,
 * extract, report.
 *
 * Phases run strictly in sequence. Extraction starts only after every copy
 * worker of every large file has returned and the progress aggregator has
 * drained its last sample.
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::archive::{extract_archive, reserve_container, SmallFileArchiver};
use super::chunked::ChunkedCopier;
use super::inventory::InventoryStore;
use super::progress::{ProgressAggregator, ProgressPublisher};
use super::router::{FileRouter, SizeClass};
use super::scanner::TreeScanner;
use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::stats::{CopyFailure, RunSummary};

/// One mirroring run over an injected inventory store
pub struct Pipeline<'a> {
    config: MirrorConfig,
    store: &'a dyn InventoryStore,
    router: FileRouter,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: MirrorConfig, store: &'a dyn InventoryStore) -> Result<Self> {
        config.validate()?;
        let router = FileRouter::new(config.threshold);
        Ok(Self {
            config,
            store,
            router,
        })
    }

    pub fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary::default();

        let dest = self.prepare_destination()?;

        info!("[*] Updating file index...");
        let mut scanner = TreeScanner::new();
        if let Ok(src) = fs::canonicalize(&self.config.source) {
            if dest.starts_with(&src) {
                scanner = scanner.excluding(dest.clone());
            }
        }
        let (root, scan) = scanner.scan(&self.config.source, self.store)?;
        summary.files_indexed = scan.files_indexed;
        summary.entries_skipped = scan.entries_skipped;
        summary.bytes_indexed = scan.bytes_indexed;
        summary.scan_errors = scan.errors;
        match self.store.len() {
            Ok(records) => debug!("Inventory holds {} records", records),
            Err(e) => warn!("Cannot count inventory records: {}", e),
        }

        info!("[*] Archiving small files...");
        let container = self.archive_small_files(&root, &dest, &mut summary)?;

        info!("[*] Copying large files...");
        self.copy_large_files(&root, &dest, container.as_deref(), &mut summary);

        if let Some(container) = container {
            info!("[*] Extracting small files...");
            match extract_archive(&container, &dest) {
                Ok(stats) => summary.extracted = stats.extracted,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!("Extraction failed, keeping {}: {}", container.display(), e);
                    summary.archive_error = Some(e.to_string());
                }
            }
        }

        summary.elapsed = start.elapsed();
        Ok(summary)
    }

    fn prepare_destination(&self) -> Result<PathBuf> {
        let dest = &self.config.dest;
        fs::create_dir_all(dest).map_err(|e| {
            MirrorError::Config(format!(
                "Cannot create destination {}: {}",
                dest.display(),
                e
            ))
        })?;
        fs::canonicalize(dest).map_err(|_| MirrorError::InvalidPath(dest.clone()))
    }

    /// Pack small files into a fresh container. `None` means the phase failed
    /// and was recorded in `summary`; extraction is then skipped.
    fn archive_small_files(
        &self,
        root: &Path,
        dest: &Path,
        summary: &mut RunSummary,
    ) -> Result<Option<PathBuf>> {
        let outcome = reserve_container(dest).and_then(|container| {
            match SmallFileArchiver::new(self.router).archive(self.store, root, &container) {
                Ok(stats) => Ok((container, stats)),
                Err(e) => {
                    if let Err(cleanup) = fs::remove_file(&container) {
                        warn!("Could not remove {}: {}", container.display(), cleanup);
                    }
                    Err(e)
                }
            }
        });

        match outcome {
            Ok((container, stats)) => {
                summary.small_enumerated = stats.enumerated;
                summary.archived = stats.archived;
                summary.archive_skipped = stats.skipped;
                Ok(Some(container))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                error!(category = %e.category(), "Archive phase failed: {}", e);
                summary.archive_error = Some(e.to_string());
                Ok(None)
            }
        }
    }

    /// Large files go one at a time, each split across the worker pool.
    /// All of them report into one aggregator.
    fn copy_large_files(
        &self,
        root: &Path,
        dest: &Path,
        container: Option<&Path>,
        summary: &mut RunSummary,
    ) {
        let paths = match self.store.query_by_size(self.router.query(SizeClass::Large)) {
            Ok(paths) => paths,
            Err(e) => {
                error!("Cannot list large files: {}", e);
                summary.copy_error = Some(e.to_string());
                return;
            }
        };

        let mut jobs = Vec::new();
        let mut expected_bytes = 0u64;
        for path in paths {
            let Ok(relative) = path.strip_prefix(root) else {
                debug!("{} is outside {}, ignoring", path.display(), root.display());
                continue;
            };
            match self.store.get(&path) {
                Ok(Some(record)) => expected_bytes += record.size,
                Ok(None) => {}
                // Only the progress total depends on the record
                Err(e) => warn!("Cannot read record for {}: {}", path.display(), e),
            }
            let target = dest.join(relative);
            jobs.push((path, target));
        }
        summary.large_enumerated = jobs.len() as u64;

        let copier = ChunkedCopier::new(
            self.config.workers,
            self.config.buffer_size,
            self.config.write_strategy,
        );
        let (publisher, subscriber) = ProgressPublisher::new(self.config.progress_buffer);
        let aggregator =
            ProgressAggregator::spawn(subscriber, expected_bytes, self.config.show_progress);

        for (src, target) in jobs {
            if Some(target.as_path()) == container {
                warn!("{} collides with the archive container", target.display());
                summary.failures.push(CopyFailure {
                    path: src,
                    error: "destination is reserved for the archive container".to_string(),
                });
                continue;
            }
            if let Some(parent) = target.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    warn!("Cannot create {}: {}", parent.display(), e);
                    summary.failures.push(CopyFailure {
                        path: src,
                        error: e.to_string(),
                    });
                    continue;
                }
            }

            match copier.copy_large(&src, &target, &publisher) {
                Ok(bytes) => {
                    debug!("Copied {} ({} bytes)", src.display(), bytes);
                    summary.copied += 1;
                    summary.bytes_copied += bytes;
                }
                Err(e) => {
                    warn!(category = %e.category(), "{}", e);
                    summary.failures.push(CopyFailure {
                        path: src,
                        error: e.to_string(),
                    });
                }
            }
        }

        drop(publisher);
        let drained = aggregator.finish();
        debug!("Progress aggregator drained {} bytes", drained);
    }
}
