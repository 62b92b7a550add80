//! Structured logging initialization.
//!
//! One console layer, plus an optional rolling file layer when
//! `logging.enable_file_logging` is set. Both honor the configured format;
//! layers are boxed so json/text share a single composition path.

use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};

type FilteredRegistry = tracing_subscriber::layer::Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Initialize the global subscriber. An explicit `logging.level` wins over
/// `RUST_LOG`; the fallback is "info".
pub fn init_with_config(cfg: &LoggingConfig) {
    let filter = match cfg.level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let mut layers = vec![console_layer(cfg.format)];
    if cfg.enable_file_logging {
        layers.extend(file_layer(cfg));
    }

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init();
}

fn console_layer(format: LogFormat) -> BoxedLayer {
    let base = tracing_subscriber::fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stdout);
    match format {
        LogFormat::Json => base.json().with_ansi(false).boxed(),
        LogFormat::Text => base.with_ansi(true).boxed(),
    }
}

/// Rolling file layer. Yields nothing (console-only logging) when the log
/// directory cannot be created.
fn file_layer(cfg: &LoggingConfig) -> Option<BoxedLayer> {
    if let Err(e) = std::fs::create_dir_all(&cfg.dir) {
        eprintln!(
            "Cannot create log directory '{}' ({e}); continuing without file logging",
            cfg.dir
        );
        return None;
    }

    let rotation = if cfg.rotation.eq_ignore_ascii_case("hourly") {
        tracing_appender::rolling::Rotation::HOURLY
    } else if cfg.rotation.eq_ignore_ascii_case("never") {
        tracing_appender::rolling::Rotation::NEVER
    } else {
        tracing_appender::rolling::Rotation::DAILY
    };

    let appender =
        tracing_appender::rolling::RollingFileAppender::new(rotation, &cfg.dir, &cfg.filename);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    // The guard flushes buffered lines on drop; it has to outlive every log
    // call, so it is leaked for the lifetime of the process.
    let _: &'static _ = Box::leak(Box::new(guard));

    Some(file_format_layer(cfg.format, writer))
}

fn file_format_layer(format: LogFormat, writer: NonBlocking) -> BoxedLayer {
    let base = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(writer);
    match format {
        LogFormat::Json => base.json().boxed(),
        LogFormat::Text => base.boxed(),
    }
}
