//! Recut Core Library
//!
//! Editing engine behind prompt-based re-editing of generated videos.
//! Validates and applies edit plans to clip timelines, then tracks the
//! recompositions submitted to the rendering backend.

pub mod core;

use tracing_appender::non_blocking::WorkerGuard;

use crate::core::settings::LoggingSettings;

/// Installs the global tracing subscriber.
///
/// Logs go to stdout and, when `file_dir` is set, to a daily-rolling file.
/// `RUST_LOG` directives take precedence over `settings.level`. The returned
/// guard must be kept alive for file output to be flushed.
pub fn init_logging(settings: &LoggingSettings) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.level));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(cfg!(debug_assertions));

    let (file_layer, guard) = match &settings.file_dir {
        Some(dir) => {
            let _ = std::fs::create_dir_all(dir);
            let file_appender = tracing_appender::rolling::daily(dir, "recut.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer);

    // Already initialized (tests, embedding hosts)
    let _ = tracing::subscriber::set_global_default(subscriber);

    guard
}
