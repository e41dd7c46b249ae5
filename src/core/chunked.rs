/*!
 * Chunked copy engine for large files
 *
 * A file is split into `workers` contiguous segments covering `[0, size)`
 * exactly; the last segment takes the division remainder. Each segment is
 * copied by its own scoped thread with its own source handle. Destination
 * writes either go through per-worker handles (`WriteStrategy::Independent`)
 * or through one handle behind a mutex (`WriteStrategy::SharedLock`).
 */

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;
use std::thread;

use tracing::{debug, warn};

use super::progress::ProgressPublisher;
use crate::config::WriteStrategy;
use crate::error::{MirrorError, Result};

/// Byte range `[start, end)` of one file assigned to one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopySegment {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl CopySegment {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Partition `[0, size)` into `workers` contiguous segments.
///
/// `workers` below 1 is treated as 1. When `size < workers` every segment but
/// the last is empty.
pub fn plan_segments(size: u64, workers: usize) -> Vec<CopySegment> {
    let workers = workers.max(1) as u64;
    let chunk = size / workers;

    (0..workers)
        .map(|i| {
            let start = i * chunk;
            let end = if i == workers - 1 { size } else { start + chunk };
            CopySegment {
                index: i as usize,
                start,
                end,
            }
        })
        .collect()
}

/// Destination side of one worker
enum SegmentSink<'a> {
    Owned(File),
    Shared(&'a Mutex<File>),
}

impl SegmentSink<'_> {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        match self {
            SegmentSink::Owned(file) => file.write_all(data),
            SegmentSink::Shared(file) => {
                let mut file = file
                    .lock()
                    .map_err(|_| io::Error::other("destination lock poisoned"))?;
                file.seek(SeekFrom::Start(offset))?;
                file.write_all(data)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            SegmentSink::Owned(file) => file.flush(),
            SegmentSink::Shared(_) => Ok(()),
        }
    }
}

/// Copies one large file with a fixed pool of segment workers
#[derive(Debug, Clone)]
pub struct ChunkedCopier {
    workers: usize,
    buffer_size: usize,
    strategy: WriteStrategy,
}

impl ChunkedCopier {
    pub fn new(workers: usize, buffer_size: usize, strategy: WriteStrategy) -> Self {
        Self {
            workers: workers.max(1),
            buffer_size: buffer_size.max(1),
            strategy,
        }
    }

    /// Copy `src` to `dest`, blocking until every segment is done.
    ///
    /// Any segment failure fails the whole file: the error names the segment
    /// and the partial destination is removed.
    pub fn copy_large(
        &self,
        src: &Path,
        dest: &Path,
        progress: &ProgressPublisher,
    ) -> Result<u64> {
        let result = self.copy_segments(src, dest, progress);
        if result.is_err() {
            if let Err(e) = std::fs::remove_file(dest) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Could not remove partial {}: {}", dest.display(), e);
                }
            }
        }
        result
    }

    fn copy_segments(
        &self,
        src: &Path,
        dest: &Path,
        progress: &ProgressPublisher,
    ) -> Result<u64> {
        let segment_error = |segment: usize| {
            move |source: io::Error| MirrorError::Segment {
                path: src.to_path_buf(),
                segment,
                source,
            }
        };

        // Size comes from the open handle so the copy matches what is read
        let size = File::open(src)
            .and_then(|file| file.metadata())
            .map_err(segment_error(0))?
            .len();

        let dest_file = File::create(dest).map_err(segment_error(0))?;
        dest_file.set_len(size).map_err(segment_error(0))?;

        let segments = plan_segments(size, self.workers);
        debug!(
            "Copying {} ({} bytes) in {} segments",
            src.display(),
            size,
            segments.len()
        );

        let shared = match self.strategy {
            WriteStrategy::SharedLock => Some(Mutex::new(dest_file)),
            WriteStrategy::Independent => {
                drop(dest_file);
                None
            }
        };

        let results: Vec<Result<u64>> = thread::scope(|scope| {
            let handles: Vec<_> = segments
                .iter()
                .map(|segment| {
                    let shared = shared.as_ref();
                    let progress = progress.clone();
                    let segment = *segment;
                    let handle = thread::Builder::new()
                        .name(format!("copy-seg-{}", segment.index))
                        .spawn_scoped(scope, move || {
                            self.copy_segment(src, dest, segment, shared, &progress)
                                .map_err(segment_error(segment.index))
                        });
                    (segment.index, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(index, handle)| match handle {
                    Ok(handle) => handle.join().unwrap_or_else(|_| {
                        Err(MirrorError::WorkerPanicked {
                            path: src.to_path_buf(),
                            segment: index,
                        })
                    }),
                    Err(spawn_err) => Err(segment_error(index)(spawn_err)),
                })
                .collect()
        });

        let mut copied = 0u64;
        for result in results {
            copied += result?;
        }

        if let Some(file) = shared {
            let file = file
                .into_inner()
                .map_err(|_| segment_error(0)(io::Error::other("destination lock poisoned")))?;
            file.sync_all().map_err(segment_error(0))?;
        }

        Ok(copied)
    }

    fn copy_segment(
        &self,
        src: &Path,
        dest: &Path,
        segment: CopySegment,
        shared: Option<&Mutex<File>>,
        progress: &ProgressPublisher,
    ) -> io::Result<u64> {
        if segment.is_empty() {
            return Ok(0);
        }

        let mut reader = File::open(src)?;
        reader.seek(SeekFrom::Start(segment.start))?;

        let mut sink = match shared {
            Some(file) => SegmentSink::Shared(file),
            None => {
                let mut file = OpenOptions::new().write(true).open(dest)?;
                file.seek(SeekFrom::Start(segment.start))?;
                SegmentSink::Owned(file)
            }
        };

        let mut buf = vec![0u8; self.buffer_size.min(segment.len() as usize).max(1)];
        let mut pos = segment.start;

        while pos < segment.end {
            let want = (segment.end - pos).min(buf.len() as u64) as usize;
            let n = match reader.read(&mut buf[..want]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!(
                            "source ended at byte {} inside segment [{}, {})",
                            pos, segment.start, segment.end
                        ),
                    ))
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            sink.write_at(pos, &buf[..n])?;
            pos += n as u64;
            progress.publish(n as u64);
        }

        sink.flush()?;
        Ok(segment.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::progress::ProgressAggregator;
    use std::fs;
    use tempfile::tempdir;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    fn assert_exact_cover(size: u64, workers: usize) {
        let segments = plan_segments(size, workers);
        assert_eq!(segments.len(), workers.max(1));
        let mut expected_start = 0;
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.index, i);
            assert_eq!(segment.start, expected_start, "gap or overlap at {}", i);
            assert!(segment.start <= segment.end);
            expected_start = segment.end;
        }
        assert_eq!(expected_start, size);
    }

    #[test]
    fn test_segments_cover_exactly() {
        for workers in 1..=8 {
            for size in [0u64, 1, 2, 3, 7, 8, 9, 100, 4096, 1_000_003] {
                assert_exact_cover(size, workers);
            }
        }
    }

    #[test]
    fn test_last_segment_takes_remainder() {
        let segments = plan_segments(10, 4);
        let lens: Vec<u64> = segments.iter().map(|s| s.len()).collect();
        assert_eq!(lens, vec![2, 2, 2, 4]);
    }

    #[test]
    fn test_small_file_leaves_empty_segments() {
        let segments = plan_segments(3, 8);
        assert_eq!(segments.iter().filter(|s| s.is_empty()).count(), 7);
        assert_eq!(segments[7], CopySegment { index: 7, start: 0, end: 3 });
    }

    #[test]
    fn test_zero_workers_treated_as_one() {
        assert_eq!(
            plan_segments(5, 0),
            vec![CopySegment { index: 0, start: 0, end: 5 }]
        );
    }

    fn roundtrip(strategy: WriteStrategy) {
        let dir = tempdir().unwrap();
        let size = 10_007usize;
        let src = dir.path().join("source.bin");
        let content = pattern(size);
        fs::write(&src, &content).unwrap();

        for workers in [1, 2, 4, 8] {
            for buffer in [1, 4096, size + 1] {
                let dest = dir.path().join(format!("dest-{}-{}.bin", workers, buffer));
                let copier = ChunkedCopier::new(workers, buffer, strategy);
                let copied = copier
                    .copy_large(&src, &dest, &ProgressPublisher::noop())
                    .unwrap();
                assert_eq!(copied, size as u64);
                assert_eq!(
                    fs::read(&dest).unwrap(),
                    content,
                    "mismatch for workers={} buffer={}",
                    workers,
                    buffer
                );
            }
        }
    }

    #[test]
    fn test_roundtrip_independent_handles() {
        roundtrip(WriteStrategy::Independent);
    }

    #[test]
    fn test_roundtrip_shared_lock() {
        roundtrip(WriteStrategy::SharedLock);
    }

    #[test]
    fn test_empty_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("empty");
        let dest = dir.path().join("empty.copy");
        fs::write(&src, b"").unwrap();

        let copier = ChunkedCopier::new(4, 1024, WriteStrategy::Independent);
        assert_eq!(copier.copy_large(&src, &dest, &ProgressPublisher::noop()).unwrap(), 0);
        assert_eq!(fs::metadata(&dest).unwrap().len(), 0);
    }

    #[test]
    fn test_overwrites_longer_destination() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dest = dir.path().join("dest.bin");
        fs::write(&src, pattern(100)).unwrap();
        fs::write(&dest, vec![0xFFu8; 1000]).unwrap();

        let copier = ChunkedCopier::new(3, 16, WriteStrategy::Independent);
        copier.copy_large(&src, &dest, &ProgressPublisher::noop()).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), pattern(100));
    }

    #[test]
    fn test_progress_reports_every_byte() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dest = dir.path().join("dest.bin");
        fs::write(&src, pattern(50_000)).unwrap();

        let (publisher, subscriber) = ProgressPublisher::new(8);
        let aggregator = ProgressAggregator::spawn(subscriber, 50_000, false);
        let copier = ChunkedCopier::new(4, 1000, WriteStrategy::Independent);
        copier.copy_large(&src, &dest, &publisher).unwrap();
        drop(publisher);

        assert_eq!(aggregator.finish(), 50_000);
    }

    #[test]
    fn test_missing_source_is_segment_error() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("vanished.bin");
        let dest = dir.path().join("dest.bin");

        let copier = ChunkedCopier::new(4, 1024, WriteStrategy::Independent);
        let err = copier
            .copy_large(&src, &dest, &ProgressPublisher::noop())
            .unwrap_err();

        match err {
            MirrorError::Segment { path, source, .. } => {
                assert_eq!(path, src);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected segment error, got {:?}", other),
        }
        assert!(!dest.exists());
    }
}
