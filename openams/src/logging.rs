//! Console and durable-file logging.
//!
//! Two `tracing` layers share one subscriber:
//! - console: stderr, filtered by `RUST_LOG` (default `info`)
//! - file: the durable log, timestamped, no ANSI
//!
//! Subprocess output is logged under [`OUTPUT_TARGET`] and fatal errors under
//! [`REPORT_TARGET`]. Both reach the file only; the console already shows
//! them raw.
//!
//! The file is best-effort. When it cannot be opened or written, the writer
//! turns into a sink for the rest of the process and provisioning continues.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{LevelFilter, filter_fn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Target for lines produced by external commands.
pub const OUTPUT_TARGET: &str = "openams::output";

/// Target for the fatal error the binary already prints to the console.
pub const REPORT_TARGET: &str = "openams::report";

fn shown_on_console(target: &str) -> bool {
    target != OUTPUT_TARGET && target != REPORT_TARGET
}

/// Append-only log file that disables itself on the first failure.
#[derive(Debug)]
pub struct BestEffortFile {
    path: PathBuf,
    file: Option<File>,
    disabled: Arc<AtomicBool>,
}

impl BestEffortFile {
    /// Open `path` for appending, creating parent directories.
    ///
    /// Never fails: an unopenable path yields a disabled writer.
    pub fn open(path: &Path) -> Self {
        let disabled = Arc::new(AtomicBool::new(false));
        let opened = path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|_| OpenOptions::new().create(true).append(true).open(path));

        let file = match opened {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!(
                    "Warning: cannot open log file {} ({}). Logging to file disabled.",
                    path.display(),
                    e
                );
                disabled.store(true, Ordering::Relaxed);
                None
            }
        };

        Self {
            path: path.to_path_buf(),
            file,
            disabled,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    /// Shared flag, observable after the writer moved into the appender.
    pub fn disabled_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.disabled)
    }

    fn disable(&mut self, err: &io::Error) {
        if !self.disabled.swap(true, Ordering::Relaxed) {
            eprintln!(
                "Warning: failed to write log file {} ({}). Logging to file disabled.",
                self.path.display(),
                err
            );
        }
        self.file = None;
    }
}

impl Write for BestEffortFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.is_disabled() {
            return Ok(buf.len());
        }
        if let Some(file) = self.file.as_mut()
            && let Err(e) = file.write_all(buf)
        {
            self.disable(&e);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut()
            && let Err(e) = file.flush()
        {
            self.disable(&e);
        }
        Ok(())
    }
}

/// Keeps the background log writer alive; drop at process exit to flush.
pub struct LoggingGuard {
    _worker: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// `log_file` of `None` logs to the console only. Calling twice is harmless;
/// the second subscriber is ignored.
pub fn init(log_file: Option<&Path>, verbose: bool) -> LoggingGuard {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(filter_fn(|meta| shown_on_console(meta.target())))
        .with_filter(env_filter);

    let (file_layer, worker) = match log_file {
        Some(path) => {
            let (non_blocking, worker) = tracing_appender::non_blocking(BestEffortFile::open(path));
            (Some(file_layer(non_blocking, verbose)), Some(worker))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init();

    LoggingGuard { _worker: worker }
}

fn file_layer<S>(non_blocking: NonBlocking, verbose: bool) -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    fmt::layer()
        .with_writer(non_blocking)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(false)
        .with_filter(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_raw_targets_kept_off_console() {
        assert!(shown_on_console("openams::workflow"));
        assert!(!shown_on_console(OUTPUT_TARGET));
        assert!(!shown_on_console(REPORT_TARGET));
    }

    #[test]
    fn test_writes_append_to_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logs").join("openams.log");

        let mut writer = BestEffortFile::open(&path);
        writer.write_all(b"first\n").unwrap();
        drop(writer);
        let mut writer = BestEffortFile::open(&path);
        writer.write_all(b"second\n").unwrap();

        assert!(!writer.is_disabled());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_unopenable_path_degrades_to_sink() {
        let temp = TempDir::new().unwrap();
        // A directory cannot be opened as a log file.
        let mut writer = BestEffortFile::open(temp.path());

        assert!(writer.is_disabled());
        assert_eq!(writer.write(b"dropped\n").unwrap(), 8);
        writer.flush().unwrap();
    }

    #[test]
    fn test_disabled_flag_is_shared() {
        let temp = TempDir::new().unwrap();
        let writer = BestEffortFile::open(temp.path());
        let flag = writer.disabled_flag();
        drop(writer);
        assert!(flag.load(Ordering::Relaxed));
    }
}
