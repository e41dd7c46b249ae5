//! Size classification: decides archive vs. chunked-copy handling.
//!
//! Classification always uses the size recorded at scan time.

use super::inventory::SizeQuery;

/// Handling path for an indexed file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    /// Packed into the transient archive
    Small,
    /// Copied with the parallel chunked engine
    Large,
}

/// Routes files by a fixed byte threshold
#[derive(Debug, Clone, Copy)]
pub struct FileRouter {
    threshold: u64,
}

impl FileRouter {
    pub fn new(threshold: u64) -> Self {
        Self { threshold }
    }

    /// `size >= threshold` is Large; the boundary itself is Large
    pub fn classify(&self, size: u64) -> SizeClass {
        if size < self.threshold {
            SizeClass::Small
        } else {
            SizeClass::Large
        }
    }

    /// Inventory query selecting every file of `class`
    pub fn query(&self, class: SizeClass) -> SizeQuery {
        match class {
            SizeClass::Small => SizeQuery::Below(self.threshold),
            SizeClass::Large => SizeQuery::AtLeast(self.threshold),
        }
    }
}
