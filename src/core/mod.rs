/*!
 * Core mirroring pipeline
 */

pub mod archive;
pub mod chunked;
pub mod inventory;
pub mod pipeline;
pub mod progress;
pub mod router;
pub mod scanner;

pub use archive::{
    extract_archive, reserve_container, ArchiveStats, ExtractStats, SmallFileArchiver,
    CONTAINER_PREFIX, CONTAINER_SUFFIX,
};
pub use chunked::{plan_segments, ChunkedCopier, CopySegment};
pub use inventory::{FileRecord, InventoryStore, MemoryInventory, SizeQuery, SqliteInventory};
pub use pipeline::Pipeline;
pub use progress::{ProgressAggregator, ProgressPublisher, ProgressSample, ProgressSubscriber};
pub use router::{FileRouter, SizeClass};
pub use scanner::{ScanStats, TreeScanner};
