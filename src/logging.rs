//! Structured logging setup, console + optional rolling file appender.

use tracing_subscriber::{fmt::time::UtcTime, layer::Identity, prelude::*};

/// Where (if anywhere) the server should also write a rotating log file.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub file_dir: Option<String>,
}

/// Initialize the global tracing subscriber.
///
/// Filter precedence: `ROOMKEEPER_LOG` env var, then `RUST_LOG`, then `info`.
/// If `cfg.file_dir` is set, a daily-rotating file appender is added
/// alongside the console layer; failures to create the directory are
/// logged to stderr and swallowed so the process still runs with console
/// logging only.
pub fn init(cfg: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_env("ROOMKEEPER_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(std::io::stdout),
    );

    if let Some(dir) = &cfg.file_dir {
        if let Some(file_layer) = build_file_layer(dir) {
            let subscriber = registry.with(file_layer);
            let _ = subscriber.try_init();
            return;
        }
    }

    let _ = registry.with(Identity::new()).try_init();
}

fn build_file_layer(
    dir: &str,
) -> Option<impl tracing_subscriber::Layer<tracing_subscriber::Registry>> {
    if std::fs::create_dir_all(dir).is_err() {
        eprintln!("Failed to create log directory '{dir}', continuing with stdout logs");
        return None;
    }

    let file_appender =
        tracing_appender::rolling::RollingFileAppender::new(
            tracing_appender::rolling::Rotation::DAILY,
            dir,
            "roomkeeper.log",
        );
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

    // Keep the worker guard alive for the process lifetime.
    let _leaked: &'static _ = Box::leak(Box::new(file_guard));

    Some(
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(non_blocking),
    )
}
