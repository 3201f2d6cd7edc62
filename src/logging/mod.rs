/*!
 * Logging Module
 * Console plus daily rolling files, pretty in development and JSON in production
 */
pub mod config;
pub mod middleware;

use std::io;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use config::LogConfig;

/// Background writer guards. Dropping them flushes and stops the writers, so
/// the caller keeps them alive until shutdown.
#[must_use]
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// Installs the global subscriber.
pub fn init(config: &LogConfig) -> LogGuards {
    if let Err(e) = std::fs::create_dir_all(&config.dir) {
        eprintln!(
            "failed to create log directory {}: {}",
            config.dir.display(),
            e
        );
    }

    // File appender for all logs
    let file_appender = rolling::daily(&config.dir, "app.log");
    let (file_writer, file_guard) = non_blocking(file_appender);

    // Console writer
    let (console_writer, console_guard) = non_blocking(io::stdout());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter()));

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let mut guards = vec![file_guard, console_guard];

    if config.json {
        // Errors only
        let error_appender = rolling::daily(&config.dir, "error.log");
        let (error_writer, error_guard) = non_blocking(error_appender);
        guards.push(error_guard);

        let file_layer = fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        let error_layer = fmt::layer()
            .json()
            .with_writer(error_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

        let console_layer = fmt::layer()
            .json()
            .with_writer(console_writer)
            .with_target(false);

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .init();
    } else {
        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let console_layer = fmt::layer()
            .with_writer(console_writer)
            .with_target(true)
            .pretty();

        subscriber.with(file_layer).with(console_layer).init();
    }

    tracing::info!(
        level = %config.level,
        dir = %config.dir.display(),
        json = config.json,
        "logging initialized"
    );

    LogGuards { _guards: guards }
}
