/*!
 * Error types for fastcopy
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::core::inventory::InventoryError;

pub type Result<T> = std::result::Result<T, MirrorError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug)]
pub enum MirrorError {
    /// Source directory not found
    SourceNotFound(PathBuf),

    /// Invalid path (outside the source root, unsafe archive entry, ...)
    InvalidPath(PathBuf),

    /// I/O error
    Io(io::Error),

    /// Configuration error
    Config(String),

    /// Inventory store could not be opened or initialized
    StoreUnavailable { path: PathBuf, source: InventoryError },

    /// An inventory read or write failed after the store was opened
    Inventory(InventoryError),

    /// Archive container could not be written or read
    Archive { path: PathBuf, source: io::Error },

    /// A copy segment failed; fatal to the file it belongs to
    Segment {
        path: PathBuf,
        segment: usize,
        source: io::Error,
    },

    /// A copy worker thread panicked
    WorkerPanicked { path: PathBuf, segment: usize },
}

impl MirrorError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        if self.is_fatal() {
            EXIT_FATAL
        } else {
            EXIT_PARTIAL
        }
    }

    /// Whole-run failures; everything else is scoped to one file or phase
    pub fn is_fatal(&self) -> bool {
        match self {
            MirrorError::SourceNotFound(_) => true,
            MirrorError::Config(_) => true,
            MirrorError::StoreUnavailable { .. } => true,

            MirrorError::Inventory(_) => false,
            MirrorError::InvalidPath(_) => false,
            MirrorError::Io(_) => false,
            MirrorError::Archive { .. } => false,
            MirrorError::Segment { .. } => false,
            MirrorError::WorkerPanicked { .. } => false,
        }
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> ErrorCategory {
        match self {
            MirrorError::SourceNotFound(_) | MirrorError::InvalidPath(_) => {
                ErrorCategory::Validation
            }
            MirrorError::Io(_) => ErrorCategory::IoError,
            MirrorError::Config(_) => ErrorCategory::Configuration,
            MirrorError::StoreUnavailable { .. } | MirrorError::Inventory(_) => {
                ErrorCategory::Inventory
            }
            MirrorError::Archive { .. } => ErrorCategory::Archive,
            MirrorError::Segment { .. } => ErrorCategory::IoError,
            MirrorError::WorkerPanicked { .. } => ErrorCategory::Concurrency,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Path validation errors
    Validation,
    /// I/O operation errors
    IoError,
    /// Configuration errors
    Configuration,
    /// Inventory store errors
    Inventory,
    /// Archive container errors
    Archive,
    /// Worker thread failures
    Concurrency,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Inventory => write!(f, "inventory"),
            ErrorCategory::Archive => write!(f, "archive"),
            ErrorCategory::Concurrency => write!(f, "concurrency"),
        }
    }
}

impl fmt::Display for MirrorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorError::SourceNotFound(path) => {
                write!(f, "Source not found: {}", path.display())
            }
            MirrorError::InvalidPath(path) => {
                write!(f, "Invalid path: {}", path.display())
            }
            MirrorError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
            MirrorError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            MirrorError::StoreUnavailable { path, source } => {
                write!(f, "Cannot open inventory {}: {}", path.display(), source)
            }
            MirrorError::Inventory(err) => {
                write!(f, "Inventory error: {}", err)
            }
            MirrorError::Archive { path, source } => {
                write!(f, "Archive error on {}: {}", path.display(), source)
            }
            MirrorError::Segment {
                path,
                segment,
                source,
            } => {
                write!(
                    f,
                    "Copy of {} failed in segment {}: {}",
                    path.display(),
                    segment,
                    source
                )
            }
            MirrorError::WorkerPanicked { path, segment } => {
                write!(
                    f,
                    "Copy worker for segment {} of {} panicked",
                    segment,
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for MirrorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MirrorError::Io(err) => Some(err),
            MirrorError::StoreUnavailable { source, .. } => Some(source),
            MirrorError::Inventory(err) => Some(err),
            MirrorError::Archive { source, .. } => Some(source),
            MirrorError::Segment { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for MirrorError {
    fn from(err: io::Error) -> Self {
        MirrorError::Io(err)
    }
}

impl From<InventoryError> for MirrorError {
    fn from(err: InventoryError) -> Self {
        MirrorError::Inventory(err)
    }
}

impl From<toml::de::Error> for MirrorError {
    fn from(err: toml::de::Error) -> Self {
        MirrorError::Config(format!("TOML parse error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(MirrorError::SourceNotFound(PathBuf::from("/tmp")).is_fatal());
        assert!(MirrorError::Config("test".to_string()).is_fatal());
        assert!(MirrorError::StoreUnavailable {
            path: PathBuf::from("file_index.db"),
            source: InventoryError::Poisoned,
        }
        .is_fatal());
    }

    #[test]
    fn test_inventory_reads_are_not_fatal() {
        let err: MirrorError = InventoryError::Poisoned.into();
        assert!(!err.is_fatal());
        assert_eq!(err.exit_code(), EXIT_PARTIAL);
        assert_eq!(err.category(), ErrorCategory::Inventory);
    }

    #[test]
    fn test_file_scoped_errors_are_not_fatal() {
        let segment = MirrorError::Segment {
            path: PathBuf::from("/src/big.bin"),
            segment: 2,
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert!(!segment.is_fatal());
        assert_eq!(segment.exit_code(), EXIT_PARTIAL);
        assert!(!MirrorError::Io(io::Error::other("test")).is_fatal());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            MirrorError::SourceNotFound(PathBuf::from("/nope")).exit_code(),
            EXIT_FATAL
        );
        assert_eq!(
            MirrorError::WorkerPanicked {
                path: PathBuf::from("/src/big.bin"),
                segment: 0,
            }
            .exit_code(),
            EXIT_PARTIAL
        );
    }

    #[test]
    fn test_segment_error_display() {
        let err = MirrorError::Segment {
            path: PathBuf::from("/src/big.bin"),
            segment: 3,
            source: io::Error::new(io::ErrorKind::UnexpectedEof, "source shrank"),
        };
        assert_eq!(
            err.to_string(),
            "Copy of /src/big.bin failed in segment 3: source shrank"
        );
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            MirrorError::SourceNotFound(PathBuf::from("/tmp")).category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            MirrorError::Io(io::Error::other("test")).category(),
            ErrorCategory::IoError
        );
        assert_eq!(
            MirrorError::Archive {
                path: PathBuf::from("/dst/_temp_archive.tar"),
                source: io::Error::other("disk full"),
            }
            .category(),
            ErrorCategory::Archive
        );
        assert_eq!(ErrorCategory::Inventory.to_string(), "inventory");
    }

    #[test]
    fn test_io_error_conversion() {
        let err: MirrorError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, MirrorError::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
