/*!
 * Run summary and console formatting
 */

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// One large file that could not be copied
#[derive(Debug, Clone, Serialize)]
pub struct CopyFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Totals for one pipeline run.
///
/// Enumerated counts come from the inventory; archived/copied counts only
/// include files that actually made it, so a partial run is visible.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub files_indexed: u64,
    /// Directories and non-regular entries passed over by the scan
    pub entries_skipped: u64,
    pub bytes_indexed: u64,
    pub scan_errors: u64,
    pub small_enumerated: u64,
    pub archived: u64,
    pub archive_skipped: u64,
    pub extracted: u64,
    pub large_enumerated: u64,
    pub copied: u64,
    pub bytes_copied: u64,
    pub failures: Vec<CopyFailure>,
    /// Set when the archive or extract phase failed as a whole
    pub archive_error: Option<String>,
    /// Set when the large files could not be listed
    pub copy_error: Option<String>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl RunSummary {
    /// Every enumerated file was archived/extracted or copied
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
            && self.archive_error.is_none()
            && self.copy_error.is_none()
            && self.archive_skipped == 0
            && self.copied == self.large_enumerated
            && self.extracted == self.archived
    }

    /// Print formatted statistics
    pub fn print(&self) {
        println!("[+] Completed in {:.2} seconds", self.elapsed.as_secs_f64());
        println!(
            "    Indexed files: {} ({}, {} other entries skipped, {} errors)",
            self.files_indexed,
            format_bytes(self.bytes_indexed),
            self.entries_skipped,
            self.scan_errors
        );
        println!(
            "    Archived files: {} of {} ({} extracted)",
            self.archived, self.small_enumerated, self.extracted
        );
        println!(
            "    Copied large files: {} of {} ({})",
            self.copied,
            self.large_enumerated,
            format_bytes(self.bytes_copied)
        );
        if let Some(err) = &self.archive_error {
            println!("    Archive phase failed: {}", err);
        }
        if let Some(err) = &self.copy_error {
            println!("    Copy phase failed: {}", err);
        }
        if self.archive_skipped > 0 {
            println!("    Small files skipped: {}", self.archive_skipped);
        }
        for failure in &self.failures {
            println!("    Failed: {} ({})", failure.path.display(), failure.error);
        }
    }

    /// Print as a single JSON line
    pub fn print_json(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let base = 1024.0_f64;
    let exp = (bytes_f.ln() / base.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);

    let value = bytes_f / base.powi(exp as i32);

    if exp == 0 {
        format!("{} {}", bytes, UNITS[exp])
    } else {
        format!("{:.2} {}", value, UNITS[exp])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(100 * 1024 * 1024), "100.00 MB");
    }

    #[test]
    fn test_complete_run() {
        let summary = RunSummary {
            small_enumerated: 1,
            archived: 1,
            extracted: 1,
            large_enumerated: 1,
            copied: 1,
            ..Default::default()
        };
        assert!(summary.is_complete());
    }

    #[test]
    fn test_failed_copy_is_partial() {
        let summary = RunSummary {
            large_enumerated: 2,
            copied: 1,
            failures: vec![CopyFailure {
                path: PathBuf::from("/src/big.bin"),
                error: "gone".to_string(),
            }],
            ..Default::default()
        };
        assert!(!summary.is_complete());
    }

    #[test]
    fn test_unlisted_large_files_are_partial() {
        let summary = RunSummary {
            copy_error: Some("database is locked".to_string()),
            ..Default::default()
        };
        assert!(!summary.is_complete());
    }

    #[test]
    fn test_json_shape() {
        let summary = RunSummary {
            archived: 3,
            elapsed: Duration::from_millis(1500),
            ..Default::default()
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["archived"], 3);
        assert_eq!(value["elapsed"], 1.5);
        assert!(value["failures"].as_array().unwrap().is_empty());
    }
}
