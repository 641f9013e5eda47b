//! Tracing subscriber setup.

use chrono::{DateTime, Local};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// Write a per-run log file here as well
    pub log_dir: Option<PathBuf>,
}

/// File name for a run started at `started`
pub fn session_log_file_name(started: DateTime<Local>) -> String {
    format!(
        "propresenter-kefas-bridge-{}.log",
        started.format("%Y-%m-%d-%H%M%S")
    )
}

/// Install the global subscriber.
///
/// Returns the log file path when one was opened. Calling this twice keeps
/// the first subscriber.
pub fn init(options: &LoggingOptions) -> std::io::Result<Option<PathBuf>> {
    let level = if options.level.trim().is_empty() {
        "info"
    } else {
        options.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, path) = match options.log_dir.as_deref() {
        Some(dir) => {
            let (file, path) = open_log_file(dir)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .boxed();
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init();

    Ok(path)
}

fn open_log_file(dir: &Path) -> std::io::Result<(File, PathBuf)> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(session_log_file_name(Local::now()));
    let file = File::create(&path)?;
    Ok((file, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_log_file_name() {
        let started = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();
        assert_eq!(
            session_log_file_name(started),
            "propresenter-kefas-bridge-2024-03-09-070502.log"
        );
    }

    #[test]
    fn test_open_log_file_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs");
        let (_file, path) = open_log_file(&nested).unwrap();
        assert!(path.exists());
        assert!(path.starts_with(&nested));
    }
}
