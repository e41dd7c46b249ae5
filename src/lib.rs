/*!
 * fastcopy - one-shot directory mirroring
 *
 * - Persistent file inventory (SQLite) populated by a tree scan
 * - Small files bundled into a single tar container and unpacked at the destination
 * - Large files copied with parallel chunked I/O and live progress
 */

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod stats;

// Re-export commonly used types
pub use config::{MirrorConfig, WriteStrategy};
pub use core::{Pipeline, SqliteInventory};
pub use error::{MirrorError, Result};
pub use stats::RunSummary;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
