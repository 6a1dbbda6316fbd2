use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize logging: a console layer plus an optional rolling file
/// appender, both rendered in the configured format.
/// Filter precedence: config level, then `RUST_LOG`, then "info".
pub fn init_with_config(cfg: &LoggingConfig) {
    let filter = match &cfg.level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer(cfg.format))
        .with(file_layer(cfg))
        .try_init();
}

fn console_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = tracing_subscriber::fmt::layer().with_timer(UtcTime::rfc_3339());
    match format {
        LogFormat::Json => layer.json().with_ansi(false).boxed(),
        LogFormat::Text => layer.with_ansi(true).boxed(),
    }
}

/// `None` when file logging is off or the log directory cannot be created;
/// the console layer alone carries the logs then.
fn file_layer<S>(cfg: &LoggingConfig) -> Option<Box<dyn Layer<S> + Send + Sync>>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    if !cfg.enable_file_logging {
        return None;
    }
    if let Err(err) = std::fs::create_dir_all(&cfg.dir) {
        eprintln!(
            "Failed to create log directory '{}' ({err}); file logging disabled",
            cfg.dir
        );
        return None;
    }

    let rotation = match cfg.rotation.to_lowercase().as_str() {
        "hourly" => tracing_appender::rolling::Rotation::HOURLY,
        "never" => tracing_appender::rolling::Rotation::NEVER,
        _ => tracing_appender::rolling::Rotation::DAILY,
    };
    let appender =
        tracing_appender::rolling::RollingFileAppender::new(rotation, &cfg.dir, &cfg.filename);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    // The guard flushes the writer on drop; it must live as long as the
    // process does.
    let _leaked: &'static _ = Box::leak(Box::new(guard));

    let layer = tracing_subscriber::fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_ansi(false)
        .with_writer(writer);
    Some(match cfg.format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Text => layer.boxed(),
    })
}
