//! Structured logging for the colmena binary.
//!
//! Diagnostics go to `stderr` through a global `tracing` subscriber so the
//! set assignments written to `stdout` stay machine-readable. Records emitted
//! through the `log` facade are forwarded into the same subscriber by the
//! `tracing-log` bridge that `try_init` installs.

use std::{
    env, io,
    sync::{Mutex, PoisonError},
};

use thiserror::Error;
use tracing_subscriber::{
    EnvFilter, Layer, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
};

const LOG_FORMAT_ENV: &str = "COLMENA_LOG_FORMAT";
const DEFAULT_DIRECTIVE: &str = "info";

static INSTALLED: Mutex<Option<LogFormat>> = Mutex::new(None);

/// Output style of the diagnostic stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human-readable records.
    #[default]
    Human,
    /// One JSON object per record, including the active span list.
    Json,
}

impl LogFormat {
    fn from_env() -> Result<Self, LoggingError> {
        match env::var(LOG_FORMAT_ENV) {
            Ok(raw) => raw.parse(),
            Err(env::VarError::NotPresent) => Ok(Self::default()),
            Err(source @ env::VarError::NotUnicode(_)) => Err(LoggingError::InvalidUnicode {
                name: LOG_FORMAT_ENV,
                source,
            }),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(LoggingError::UnsupportedFormat {
                provided: other.to_owned(),
            }),
        }
    }
}

/// Errors raised while installing the diagnostic subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The format variable held bytes that are not UTF-8.
    #[error("environment variable `{name}` contained invalid UTF-8: {source}")]
    InvalidUnicode {
        /// Name of the offending variable.
        name: &'static str,
        /// Underlying lookup failure.
        #[source]
        source: env::VarError,
    },
    /// `COLMENA_LOG_FORMAT` named a format we do not support.
    #[error("unsupported log format `{provided}`; expected `human` or `json`")]
    UnsupportedFormat {
        /// Normalised value supplied by the user.
        provided: String,
    },
    /// Another subscriber already owns the global slot.
    #[error("failed to install tracing subscriber: {source}")]
    InstallFailed {
        /// Error raised by `tracing_subscriber`.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
}

/// Installs the global subscriber on first call and returns the active
/// format. Later calls return the format chosen the first time.
///
/// The format comes from `COLMENA_LOG_FORMAT` (`human` or `json`) and the
/// level filter from `RUST_LOG`, defaulting to `info`.
///
/// # Errors
/// Returns [`LoggingError`] when the format variable is unreadable or names
/// an unknown format, or when a different subscriber is already installed.
pub fn init_logging() -> Result<LogFormat, LoggingError> {
    let mut installed = INSTALLED.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(format) = *installed {
        return Ok(format);
    }
    let format = LogFormat::from_env()?;
    install(format)?;
    *installed = Some(format);
    Ok(format)
}

fn install(format: LogFormat) -> Result<(), LoggingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let base = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(io::stderr);
    let output = match format {
        LogFormat::Human => base.boxed(),
        LogFormat::Json => base
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
        .map_err(|source| LoggingError::InstallFailed { source })
}
