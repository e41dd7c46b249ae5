/*!
 * Configuration types for fastcopy
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MirrorError, Result};

/// Main configuration for a mirroring run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Source directory to mirror
    #[serde(default)]
    pub source: PathBuf,

    /// Destination directory
    #[serde(default)]
    pub dest: PathBuf,

    /// Inventory database file
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Files of at least this many bytes take the chunked-copy path
    #[serde(default = "default_threshold")]
    pub threshold: u64,

    /// Read/write buffer per copy worker, in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Number of segments (and worker threads) per large file
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the progress channel; producers block when it is full
    #[serde(default = "default_progress_buffer")]
    pub progress_buffer: usize,

    /// How workers share the destination file
    #[serde(default)]
    pub write_strategy: WriteStrategy,

    /// Show the live progress bar
    #[serde(default = "default_true")]
    pub show_progress: bool,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            dest: PathBuf::new(),
            index_path: default_index_path(),
            threshold: default_threshold(),
            buffer_size: default_buffer_size(),
            workers: default_workers(),
            progress_buffer: default_progress_buffer(),
            write_strategy: WriteStrategy::Independent,
            show_progress: true,
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
        }
    }
}

/// Destination handle policy for the chunked copy engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WriteStrategy {
    /// Every worker opens its own destination handle at its own offset
    #[default]
    Independent,

    /// All workers share one destination handle guarded by a mutex.
    /// Serializes every write of a file onto one critical section.
    SharedLock,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_index_path() -> PathBuf {
    PathBuf::from("file_index.db")
}

fn default_threshold() -> u64 {
    100 * 1024 * 1024 // 100 MB
}

fn default_buffer_size() -> usize {
    1024 * 1024 // 1 MB
}

fn default_workers() -> usize {
    4
}

fn default_progress_buffer() -> usize {
    100
}

impl MirrorConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: MirrorConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(MirrorError::Config("workers must be at least 1".to_string()));
        }
        if self.buffer_size == 0 {
            return Err(MirrorError::Config(
                "buffer_size must be at least 1 byte".to_string(),
            ));
        }
        if self.progress_buffer == 0 {
            return Err(MirrorError::Config(
                "progress_buffer must be at least 1".to_string(),
            ));
        }
        if self.source.as_os_str().is_empty() {
            return Err(MirrorError::Config("Source path required".to_string()));
        }
        if self.dest.as_os_str().is_empty() {
            return Err(MirrorError::Config("Destination path required".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn paths(config: MirrorConfig) -> MirrorConfig {
        MirrorConfig {
            source: PathBuf::from("/src"),
            dest: PathBuf::from("/dst"),
            ..config
        }
    }

    #[test]
    fn test_default_config() {
        let config = MirrorConfig::default();
        assert_eq!(config.threshold, 100 * 1024 * 1024);
        assert_eq!(config.buffer_size, 1024 * 1024);
        assert_eq!(config.workers, 4);
        assert_eq!(config.progress_buffer, 100);
        assert_eq!(config.write_strategy, WriteStrategy::Independent);
        assert_eq!(config.index_path, PathBuf::from("file_index.db"));
        assert!(config.show_progress);
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = paths(MirrorConfig {
            workers: 0,
            ..Default::default()
        });
        assert!(matches!(config.validate(), Err(MirrorError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let config = paths(MirrorConfig {
            buffer_size: 0,
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_paths() {
        assert!(MirrorConfig::default().validate().is_err());
        assert!(paths(MirrorConfig::default()).validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
source = "/data/minecraft"
dest = "/backup"
workers = 8
write_strategy = "shared-lock"
"#;
        let config: MirrorConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.source, PathBuf::from("/data/minecraft"));
        assert_eq!(config.workers, 8);
        assert_eq!(config.write_strategy, WriteStrategy::SharedLock);
        assert_eq!(config.threshold, default_threshold());
        assert_eq!(config.buffer_size, default_buffer_size());
        assert!(config.show_progress);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fastcopy.toml");
        std::fs::write(
            &path,
            "source = \"/src\"\ndest = \"/dst\"\nthreshold = 4096\nlog_level = \"debug\"\n",
        )
        .unwrap();

        let loaded = MirrorConfig::from_file(&path).unwrap();
        assert_eq!(loaded.threshold, 4096);
        assert_eq!(loaded.log_level, LogLevel::Debug);
        assert_eq!(loaded.dest, PathBuf::from("/dst"));
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Info.to_tracing_level(), tracing::Level::INFO);
        assert_eq!(LogLevel::Trace.to_tracing_level(), tracing::Level::TRACE);
    }
}
