/*!
 * fastcopy CLI
 */

use clap::{Parser, ValueEnum};
use fastcopy::{
    config::{LogLevel, MirrorConfig, WriteStrategy},
    error::{MirrorError, Result, EXIT_PARTIAL, EXIT_SUCCESS},
    logging, Pipeline, SqliteInventory,
};
use std::path::PathBuf;
use tracing::warn;

#[derive(Parser)]
#[command(name = "fastcopy")]
#[command(version, about = "Mirror a directory tree: archive small files, copy large files in parallel chunks", long_about = None)]
struct Cli {
    /// Source directory
    #[arg(short = 's', long = "source", value_name = "PATH")]
    source: Option<PathBuf>,

    /// Destination directory
    #[arg(short = 'd', long = "dest", value_name = "PATH")]
    destination: Option<PathBuf>,

    /// Files of at least this many bytes are copied in parallel chunks
    #[arg(long, value_name = "BYTES")]
    threshold: Option<u64>,

    /// Per-worker buffer size in bytes
    #[arg(long, value_name = "BYTES")]
    buffer_size: Option<usize>,

    /// Segments (worker threads) per large file
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Progress channel capacity
    #[arg(long, value_name = "SAMPLES")]
    progress_buffer: Option<usize>,

    /// Inventory database file
    #[arg(long = "index", value_name = "FILE")]
    index: Option<PathBuf>,

    /// How copy workers share the destination file
    #[arg(long, value_enum)]
    write_strategy: Option<WriteStrategyArg>,

    /// Hide the live progress bar
    #[arg(long)]
    no_progress: bool,

    /// Print the final summary as JSON
    #[arg(long)]
    json: bool,

    /// TOML configuration file (command-line flags take precedence)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum)]
    log_level: Option<LogLevelArg>,

    /// Write JSON logs to this file instead of the console
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WriteStrategyArg {
    Independent,
    SharedLock,
}

impl From<WriteStrategyArg> for WriteStrategy {
    fn from(arg: WriteStrategyArg) -> Self {
        match arg {
            WriteStrategyArg::Independent => WriteStrategy::Independent,
            WriteStrategyArg::SharedLock => WriteStrategy::SharedLock,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error [{}]: {}", e.category(), e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn build_config(cli: Cli) -> Result<(MirrorConfig, bool)> {
    let mut config = match cli.config {
        Some(ref path) => MirrorConfig::from_file(path)?,
        None => MirrorConfig::default(),
    };

    if let Some(source) = cli.source {
        config.source = source;
    }
    if let Some(dest) = cli.destination {
        config.dest = dest;
    }
    if let Some(threshold) = cli.threshold {
        config.threshold = threshold;
    }
    if let Some(buffer_size) = cli.buffer_size {
        config.buffer_size = buffer_size;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(progress_buffer) = cli.progress_buffer {
        config.progress_buffer = progress_buffer;
    }
    if let Some(index) = cli.index {
        config.index_path = index;
    }
    if let Some(strategy) = cli.write_strategy {
        config.write_strategy = strategy.into();
    }
    if cli.no_progress || cli.json {
        config.show_progress = false;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log.is_some() {
        config.log_file = cli.log;
    }
    config.verbose |= cli.verbose;

    config.validate()?;
    Ok((config, cli.json))
}

fn run() -> Result<i32> {
    let (config, json) = build_config(Cli::parse())?;

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let store = SqliteInventory::open(&config.index_path).map_err(|source| {
        MirrorError::StoreUnavailable {
            path: config.index_path.clone(),
            source,
        }
    })?;
    let summary = Pipeline::new(config, &store)?.run()?;
    if let Err(e) = store.close() {
        warn!("Failed to close inventory: {}", e);
    }

    if json {
        summary.print_json();
    } else {
        summary.print();
    }

    Ok(if summary.is_complete() {
        EXIT_SUCCESS
    } else {
        EXIT_PARTIAL
    })
}
