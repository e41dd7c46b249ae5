/*!
 * Small-file archive: pack files below the threshold into one tar container,
 * then unpack it under the destination.
 */

use std::fs::{self, File, Metadata};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use super::inventory::InventoryStore;
use super::router::{FileRouter, SizeClass};
use crate::error::{MirrorError, Result};

/// File name prefix of the transient container
pub const CONTAINER_PREFIX: &str = "_temp_archive";
/// File name suffix of the transient container
pub const CONTAINER_SUFFIX: &str = ".tar";

/// Create an empty, uniquely named container file under `dest_dir`.
/// The file is kept; the caller removes it.
pub fn reserve_container(dest_dir: &Path) -> Result<PathBuf> {
    tempfile::Builder::new()
        .prefix(CONTAINER_PREFIX)
        .suffix(CONTAINER_SUFFIX)
        .tempfile_in(dest_dir)
        .and_then(|file| file.into_temp_path().keep().map_err(|e| e.error))
        .map_err(|source| MirrorError::Archive {
            path: dest_dir.to_path_buf(),
            source,
        })
}

/// Outcome of the archive phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    /// Small records returned by the inventory for this source tree
    pub enumerated: u64,
    /// Entries written to the container
    pub archived: u64,
    /// Records that vanished, changed type or could not be opened
    pub skipped: u64,
    /// Payload bytes written
    pub bytes: u64,
}

/// Outcome of the extract phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub extracted: u64,
    pub bytes: u64,
}

/// Packs every small inventory record into a single tar container
pub struct SmallFileArchiver {
    router: FileRouter,
}

impl SmallFileArchiver {
    pub fn new(router: FileRouter) -> Self {
        Self { router }
    }

    /// Write `archive_path` with one entry per small file under `src_root`.
    ///
    /// Entry names are relative to `src_root`. The container is finished,
    /// flushed and synced before returning.
    pub fn archive(
        &self,
        store: &dyn InventoryStore,
        src_root: &Path,
        archive_path: &Path,
    ) -> Result<ArchiveStats> {
        let paths = store.query_by_size(self.router.query(SizeClass::Small))?;
        let mut stats = ArchiveStats::default();

        let container_error = |source: io::Error| MirrorError::Archive {
            path: archive_path.to_path_buf(),
            source,
        };

        if let Some(parent) = archive_path.parent() {
            fs::create_dir_all(parent).map_err(container_error)?;
        }
        let file = File::create(archive_path).map_err(container_error)?;
        let mut builder = tar::Builder::new(BufWriter::new(file));
        let mut staged = Vec::new();

        for path in paths {
            let Ok(relative) = path.strip_prefix(src_root) else {
                debug!("{} is outside {}, ignoring", path.display(), src_root.display());
                continue;
            };
            stats.enumerated += 1;

            // Re-stat right before packing; the record may be stale
            let (source, metadata) = match open_regular(&path) {
                Ok(opened) => opened,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    stats.skipped += 1;
                    continue;
                }
            };

            // The entry length must equal the header size, so the payload is
            // staged first and a file that shrank is skipped
            let size = metadata.len();
            if let Err(e) = read_exact_len(source, size, &mut staged) {
                warn!("Skipping {}: {}", path.display(), e);
                stats.skipped += 1;
                continue;
            }

            let mut header = tar::Header::new_gnu();
            header.set_metadata(&metadata);
            header.set_size(size);
            builder
                .append_data(&mut header, relative, staged.as_slice())
                .map_err(container_error)?;
            debug!("Archived {} ({} bytes)", relative.display(), size);
            stats.archived += 1;
            stats.bytes += size;
        }

        let mut writer = builder.into_inner().map_err(container_error)?;
        writer.flush().map_err(container_error)?;
        let file = writer
            .into_inner()
            .map_err(|e| container_error(e.into_error()))?;
        file.sync_all().map_err(container_error)?;

        info!(
            "Archived {} of {} small files ({} skipped)",
            stats.archived, stats.enumerated, stats.skipped
        );
        Ok(stats)
    }
}

fn open_regular(path: &Path) -> io::Result<(File, Metadata)> {
    let metadata = fs::symlink_metadata(path)?;
    if !metadata.file_type().is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "no longer a regular file",
        ));
    }
    Ok((File::open(path)?, metadata))
}

/// Read exactly `size` bytes of `source` into `buf`; bytes past `size` are ignored
fn read_exact_len(source: impl Read, size: u64, buf: &mut Vec<u8>) -> io::Result<()> {
    buf.clear();
    source.take(size).read_to_end(buf)?;
    if (buf.len() as u64) < size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("file shrank from {} to {} bytes", size, buf.len()),
        ));
    }
    Ok(())
}

/// Join an archive entry name onto `base`, rejecting names that could escape it
fn safe_join(base: &Path, name: &Path) -> Option<PathBuf> {
    let mut target = base.to_path_buf();
    let mut has_normal = false;
    for component in name.components() {
        match component {
            Component::Normal(part) => {
                target.push(part);
                has_normal = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    has_normal.then_some(target)
}

/// Unpack `archive_path` under `dest_dir`, recreating directories.
///
/// The container is deleted only when every entry was written; on failure it
/// is left in place for inspection.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<ExtractStats> {
    let container_error = |source: io::Error| MirrorError::Archive {
        path: archive_path.to_path_buf(),
        source,
    };

    let file = File::open(archive_path).map_err(container_error)?;
    let mut archive = tar::Archive::new(BufReader::new(file));
    let mut stats = ExtractStats::default();

    for entry in archive.entries().map_err(container_error)? {
        let mut entry = entry.map_err(container_error)?;
        if !entry.header().entry_type().is_file() {
            debug!("Skipping non-file archive entry");
            continue;
        }

        let name = entry.path().map_err(container_error)?.into_owned();
        let target = safe_join(dest_dir, &name).ok_or_else(|| MirrorError::InvalidPath(name.clone()))?;
        if target == archive_path {
            return Err(MirrorError::InvalidPath(name));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        let written = io::copy(&mut entry, &mut out)?;

        stats.extracted += 1;
        stats.bytes += written;
    }

    if let Err(e) = fs::remove_file(archive_path) {
        warn!("Could not remove {}: {}", archive_path.display(), e);
    }

    info!("Extracted {} small files", stats.extracted);
    Ok(stats)
}
