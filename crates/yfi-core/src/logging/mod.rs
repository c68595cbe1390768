//! Structured logging foundation for yfi-core.
//!
//! Two sinks share one [`EnvFilter`]:
//! - a console layer on stderr (human or JSON lines), limited further by
//!   [`LogConfig::console_level`];
//! - a file layer that writes plain text into the report folder once
//!   [`LogFileSink::attach`] is called. Records emitted before that are dropped
//!   by the file layer.
//!
//! stdout is reserved for command payloads (digest, JSON, Markdown).

pub mod config;
pub mod events;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, LogContext, Stage};

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Layer, Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

type Base = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Base> + Send + Sync>;

/// Late-bound log file shared with the file layer.
#[derive(Debug, Clone, Default)]
pub struct LogFileSink {
    file: Arc<Mutex<Option<File>>>,
}

impl LogFileSink {
    /// A sink that discards everything until attached.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Start appending records to `path`, creating it if needed.
    pub fn attach(&self, path: &Path) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut slot = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log sink lock poisoned"))?;
        *slot = Some(file);
        Ok(())
    }

    /// Stop writing and close the file.
    pub fn detach(&self) {
        if let Ok(mut slot) = self.file.lock() {
            if let Some(mut file) = slot.take() {
                let _ = file.flush();
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.file.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }
}

/// Writer handed out per record by [`LogFileSink`].
pub struct SinkWriter {
    file: Arc<Mutex<Option<File>>>,
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut slot = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log sink lock poisoned"))?;
        match slot.as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut slot = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log sink lock poisoned"))?;
        match slot.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogFileSink {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter {
            file: Arc::clone(&self.file),
        }
    }
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let fallback = || {
        EnvFilter::new(format!(
            "yfi_core={level},yfi_config={level},yfi_bundle={level}",
            level = config.level
        ))
    };
    // YFI_LOG already shaped `config.level`; RUST_LOG directives only apply without it.
    if std::env::var_os("YFI_LOG").is_some() {
        return fallback();
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback())
}

fn console_layer(config: &LogConfig) -> Option<BoxedLayer> {
    if config.console_level == LogLevel::Off {
        return None;
    }
    let level = LevelFilter::from(config.console_level);
    let layer = match config.format {
        LogFormat::Human => {
            let base = fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_ansi(io::stderr().is_terminal());
            if config.timestamps {
                base.with_filter(level).boxed()
            } else {
                base.without_time().with_filter(level).boxed()
            }
        }
        LogFormat::Jsonl => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_writer(io::stderr)
            .with_filter(level)
            .boxed(),
    };
    Some(layer)
}

fn file_layer(sink: &LogFileSink) -> BoxedLayer {
    fmt::layer()
        .with_writer(sink.clone())
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .boxed()
}

/// Initialize the logging subsystem.
///
/// Must be called once at startup before any logging occurs. A second call
/// leaves the first subscriber in place and returns a sink that is never
/// written to.
pub fn init_logging(config: &LogConfig) -> LogFileSink {
    let sink = LogFileSink::detached();

    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);
    if let Some(console) = console_layer(config) {
        layers.push(console);
    }
    layers.push(file_layer(&sink));

    let installed = tracing_subscriber::registry()
        .with(build_filter(config))
        .with(layers)
        .try_init();
    if installed.is_err() {
        tracing::debug!("global subscriber already installed");
    }
    sink
}

/// Generate a unique run ID for this invocation.
pub fn generate_run_id() -> String {
    yfi_common::RunId::new().0
}

/// Structured event logging with the run's correlation fields.
///
/// ```ignore
/// log_event!(ctx, INFO, event_names::CAPTURE_STARTED, Stage::Capture, "capture started",
///     pid = child.id());
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, INFO, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::info!(
            event = $event,
            run_id = %$ctx.run_id,
            session_id = ?$ctx.session_id,
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
    ($ctx:expr, DEBUG, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::debug!(
            event = $event,
            run_id = %$ctx.run_id,
            session_id = ?$ctx.session_id,
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
    ($ctx:expr, WARN, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::warn!(
            event = $event,
            run_id = %$ctx.run_id,
            session_id = ?$ctx.session_id,
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
    ($ctx:expr, ERROR, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::error!(
            event = $event,
            run_id = %$ctx.run_id,
            session_id = ?$ctx.session_id,
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_run_id() {
        let id1 = generate_run_id();
        let id2 = generate_run_id();

        assert!(id1.starts_with("run-"));
        assert_ne!(id1, id2);
        // Format: run-<12 hex chars>
        assert_eq!(id1.len(), 16);
        assert!(id1[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_detached_sink_discards() {
        let sink = LogFileSink::detached();
        let mut writer = sink.make_writer();
        assert_eq!(writer.write(b"dropped").unwrap(), 7);
        assert!(!sink.is_attached());
    }

    #[test]
    fn test_attached_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1_logs_test.log");
        let sink = LogFileSink::detached();
        sink.make_writer().write_all(b"before\n").unwrap();
        sink.attach(&path).unwrap();
        sink.make_writer().write_all(b"after\n").unwrap();
        sink.detach();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "after\n");
    }
}
