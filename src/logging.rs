use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::Dispatch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

#[derive(Debug, Error)]
pub enum LogError {
    #[error("не удалось открыть лог-файл {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("некорректный фильтр логирования '{filter}': {source}")]
    Filter {
        filter: String,
        source: tracing_subscriber::filter::ParseError,
    },
}

/// Console + durable log sink for one process run.
///
/// The context is installed only for the duration of [`LogContext::in_scope`],
/// so nothing is registered as a process-wide global.
#[derive(Clone)]
pub struct LogContext {
    dispatch: Dispatch,
    file_path: Option<PathBuf>,
}

impl LogContext {
    /// Builds the context; `RUST_LOG`, when set, takes priority over `default_filter`.
    pub fn new(log_dir: &Path, file_stem: &str, default_filter: &str) -> Result<Self, LogError> {
        Self::build(log_dir, file_stem, env_filter(default_filter)?)
    }

    /// Console-only context for failures that happen before the log directory is known.
    pub fn console() -> Self {
        let filter = env_filter("info").unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = Registry::default()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        Self {
            dispatch: Dispatch::new(subscriber),
            file_path: None,
        }
    }

    pub(crate) fn build(
        log_dir: &Path,
        file_stem: &str,
        filter: EnvFilter,
    ) -> Result<Self, LogError> {
        let file_path = log_dir.join(format!("{file_stem}.log"));
        let open_err = |source| LogError::Open {
            path: file_path.display().to_string(),
            source,
        };
        fs::create_dir_all(log_dir).map_err(open_err)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .map_err(open_err)?;

        let subscriber = Registry::default()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)));

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            file_path: Some(file_path),
        })
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

fn env_filter(default_filter: &str) -> Result<EnvFilter, LogError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_filter).map_err(|source| LogError::Filter {
            filter: default_filter.to_string(),
            source,
        }),
    }
}
