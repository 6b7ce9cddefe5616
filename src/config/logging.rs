use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

/// Where log lines go. Results are always printed to stdout by the presenter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogDestination {
    #[default]
    Stderr,
    Stdout,
    File(PathBuf),
}

impl LogDestination {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "stderr" | "-" => LogDestination::Stderr,
            "stdout" => LogDestination::Stdout,
            path => LogDestination::File(PathBuf::from(path)),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global tracing subscriber, filtered by `RUST_LOG` (default `warn`).
pub fn init_logging(destination: &LogDestination) -> Result<(), ConfigError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false);

    let installed = match destination {
        LogDestination::Stderr => builder.with_writer(std::io::stderr).try_init(),
        LogDestination::Stdout => builder.with_writer(std::io::stdout).try_init(),
        LogDestination::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ConfigError::Logging {
                    message: format!("cannot open {}: {e}", path.display()),
                })?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
    };

    installed.map_err(|e| ConfigError::Logging {
        message: e.to_string(),
    })
}
