/*!
 * Logging and tracing initialization
 */

use std::fs::File;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};

/// Initialize structured logging based on configuration
pub fn init_logging(config: &MirrorConfig) -> Result<()> {
    let env_filter = build_filter(config)?;

    if let Some(ref log_path) = config.log_file {
        init_file_logging(log_path, env_filter)?;
    } else {
        init_stdout_logging(env_filter);
    }

    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn build_filter(config: &MirrorConfig) -> Result<EnvFilter> {
    let log_level = effective_level(config);
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("fastcopy={}", log_level)))
        .map_err(|e| MirrorError::Config(format!("Failed to create log filter: {}", e)))
}

fn effective_level(config: &MirrorConfig) -> Level {
    if config.verbose {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    }
}

fn init_stdout_logging(env_filter: EnvFilter) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn init_file_logging(log_path: &Path, env_filter: EnvFilter) -> Result<()> {
    let file = File::create(log_path)
        .map_err(|e| MirrorError::Config(format!("Failed to create log file: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_writer(file)
        .with_target(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}

/// Initialize logging with custom format for testing
#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fastcopy=debug"));

        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_verbose_overrides_log_level() {
        let config = MirrorConfig {
            log_level: LogLevel::Error,
            verbose: true,
            ..Default::default()
        };
        assert_eq!(effective_level(&config), Level::DEBUG);
    }

    #[test]
    fn test_configured_level_used() {
        let config = MirrorConfig {
            log_level: LogLevel::Warn,
            ..Default::default()
        };
        assert_eq!(effective_level(&config), Level::WARN);
    }

    #[test]
    fn test_filter_builds() {
        let config = MirrorConfig::default();
        assert!(build_filter(&config).is_ok());
    }
}
