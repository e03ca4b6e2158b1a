use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::fmt::{self, time::ChronoUtc};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Where log events go for this run.
pub enum LogTarget<'a> {
    /// Command-line runs share the terminal with their output.
    Stderr,
    /// The full-screen UI owns the terminal, so events are appended to a file.
    File(&'a Path),
}

// 0 = quiet default, 1 = debug, 2+ = trace. RUST_LOG wins when set.
fn build_filter(verbose_level: u8, default_level: &str) -> EnvFilter {
    let level = match verbose_level {
        0 => default_level,
        1 => "debug,ureq=info,rustls=info",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

pub fn init_logging(verbose_level: u8, target: LogTarget<'_>) -> Result<()> {
    match target {
        LogTarget::Stderr => {
            let layer = fmt::layer()
                .with_timer(ChronoUtc::rfc_3339())
                .with_target(false)
                .with_writer(io::stderr);
            Registry::default()
                .with(build_filter(verbose_level, "warn"))
                .with(layer)
                .try_init()
                .context("failed to install log subscriber")?;
        }
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create log directory {}", parent.display())
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let layer = fmt::layer()
                .with_timer(ChronoUtc::rfc_3339())
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            Registry::default()
                .with(build_filter(verbose_level, "info"))
                .with(layer)
                .try_init()
                .context("failed to install log subscriber")?;
        }
    }
    Ok(())
}
