//! Logging for the CLI and library
//!
//! `log` records go through [`CodeflowLogger`], which stays silent until the
//! CLI enables it with `--log`. `tracing` events share the same sink through
//! the fmt layer installed by [`init`]. stdout is reserved for results
//! (`--json`, `render --svg`), so console logging always goes to stderr.

use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::LazyLock;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Where enabled log lines end up
#[derive(Default)]
struct Sink {
    enabled: bool,
    verbose: bool,
    to_stderr: bool,
    file: Option<File>,
}

impl Sink {
    fn write_line(&mut self, line: &[u8]) {
        if let Some(file) = self.file.as_mut() {
            let _ = file.write_all(line);
            let _ = file.flush();
        }
        if self.to_stderr {
            let _ = io::stderr().write_all(line);
        }
    }
}

static SINK: LazyLock<Mutex<Sink>> = LazyLock::new(|| Mutex::new(Sink::default()));

/// Targets that flood the log with connection, file-watch and SVG chatter
const NOISY_TARGETS: &[&str] = &[
    "reqwest", "hyper", "h2", "rustls", "want", "mio", "notify", "usvg", "resvg",
];

struct CodeflowLogger;

static LOGGER: CodeflowLogger = CodeflowLogger;

impl log::Log for CodeflowLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let sink = SINK.lock();
        if !sink.enabled || metadata.level() > Level::Debug {
            return false;
        }
        let target = metadata.target();
        sink.verbose
            || target.starts_with("codeflow")
            || !NOISY_TARGETS.iter().any(|noisy| target.starts_with(noisy))
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "{} {} [{}] - {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        );
        SINK.lock().write_line(line.as_bytes());
    }

    fn flush(&self) {}
}

/// `MakeWriter` handing tracing output to the shared sink
#[derive(Clone, Copy)]
struct SinkWriter;

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut sink = SINK.lock();
        if sink.enabled {
            sink.write_line(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> fmt::MakeWriter<'a> for SinkWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        *self
    }
}

/// Install the `log` and `tracing` backends. Safe to call more than once.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    use std::sync::OnceLock;
    static INIT_RESULT: OnceLock<Result<(), String>> = OnceLock::new();

    let result = INIT_RESULT.get_or_init(|| {
        if std::env::var_os("CODEFLOW_VERBOSE").is_some() {
            set_verbose_logging(true);
        }

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "codeflow=debug,warn".into());
        let fmt_layer = fmt::Layer::new()
            .with_target(true)
            .with_timer(fmt::time::ChronoUtc::rfc_3339())
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .with_writer(SinkWriter);

        let tracing_result = Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init();
        // tracing-subscriber may already have claimed the `log` facade
        let log_result =
            log::set_logger(&LOGGER).map(|()| log::set_max_level(LevelFilter::Debug));

        match (tracing_result, log_result) {
            (Err(tracing_err), Err(log_err)) => Err(format!(
                "Failed to initialize logging: tracing={tracing_err}, log={log_err}"
            )),
            _ => Ok(()),
        }
    });

    result.clone().map_err(Into::into)
}

pub fn enable_logging() {
    SINK.lock().enabled = true;
}

/// Let HTTP, file-watch and SVG internals through the log filter
pub fn set_verbose_logging(enabled: bool) {
    SINK.lock().verbose = enabled;
}

/// Append log lines to `file_path`
pub fn set_log_file(file_path: &str) -> io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file_path)?;
    SINK.lock().file = Some(file);
    Ok(())
}

pub fn set_log_to_stderr(enabled: bool) {
    SINK.lock().to_stderr = enabled;
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        log::debug!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        log::error!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        log::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        log::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! trace_debug {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[macro_export]
macro_rules! trace_info {
    ($($arg:tt)*) => {
        tracing::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! trace_warn {
    ($($arg:tt)*) => {
        tracing::warn!($($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;

    fn metadata(target: &str, level: Level) -> Metadata<'_> {
        Metadata::builder().target(target).level(level).build()
    }

    #[test]
    fn test_noisy_targets_need_verbose() {
        enable_logging();
        set_verbose_logging(false);
        assert!(!LOGGER.enabled(&metadata("hyper::proto", Level::Debug)));
        assert!(LOGGER.enabled(&metadata("codeflow::orchestrator", Level::Debug)));
        assert!(!LOGGER.enabled(&metadata("codeflow::client", Level::Trace)));

        set_verbose_logging(true);
        assert!(LOGGER.enabled(&metadata("hyper::proto", Level::Debug)));
        set_verbose_logging(false);
    }

    #[test]
    fn test_log_file_receives_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("codeflow.log");
        let path_str = path.to_str().expect("utf-8 temp path");

        enable_logging();
        set_log_file(path_str).expect("log file should open");
        LOGGER.log(
            &Record::builder()
                .target("codeflow::tests")
                .level(Level::Info)
                .args(format_args!("diagram exported"))
                .build(),
        );
        SINK.lock().file = None;

        let written = std::fs::read_to_string(&path).expect("read log file");
        assert!(written.contains("INFO [codeflow::tests] - diagram exported"));
    }
}
