use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "atos.log";

/// Where log events go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// One-shot commands: stderr, quiet unless `RUST_LOG` says otherwise.
    Stderr,
    /// Full-screen UI: a file, so the terminal stays clean.
    File,
}

impl LogTarget {
    fn default_filter(self) -> &'static str {
        match self {
            LogTarget::Stderr => "warn",
            LogTarget::File => "info,atos_core=debug",
        }
    }
}

pub fn log_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("atos")
}

/// Install the global subscriber. Keep the returned guard alive for the
/// life of the program or buffered file output is lost.
pub fn init(target: LogTarget, json: bool) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(target.default_filter()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match target {
        LogTarget::Stderr => {
            let result = if json {
                builder.json().with_writer(std::io::stderr).try_init()
            } else {
                builder.with_writer(std::io::stderr).try_init()
            };
            result.map_err(|e| anyhow!(e))?;
            Ok(None)
        }
        LogTarget::File => {
            let dir = log_dir();
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::never(&dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let result = if json {
                builder.json().with_ansi(false).with_writer(writer).try_init()
            } else {
                builder.with_ansi(false).with_writer(writer).try_init()
            };
            result.map_err(|e| anyhow!(e))?;
            Ok(Some(guard))
        }
    }
}
