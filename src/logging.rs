use std::fs::OpenOptions;

use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing.
///
/// The filter comes from `RUST_LOG` (default `info`). Output goes to stderr
/// unless `CONFSTORE_LOG` names a file, which is appended to.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(log_path) = std::env::var("CONFSTORE_LOG").ok() else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true)
                    .with_timer(UtcTime::rfc_3339()),
            )
            .init();
        return;
    };

    let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) else {
        eprintln!("Warning: Failed to open log file: {}", log_path);
        return;
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_level(true)
                .with_timer(UtcTime::rfc_3339()),
        )
        .init();
}
