//! ---
//! lic_section: "02-ambient-runtime"
//! lic_subsection: "module"
//! lic_type: "source"
//! lic_scope: "code"
//! lic_description: "Tracing subscriber setup and lifecycle events."
//! lic_version: "v0.1.0"
//! lic_owner: "tbd"
//! ---
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "LICENSOR_LOG";

/// Available log formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    StructuredJson,
    #[default]
    Pretty,
}

/// Keeps the file writer flushing until dropped.
#[derive(Debug, Default)]
pub struct TracingGuard {
    _file: Option<WorkerGuard>,
}

/// Initialize the tracing subscriber based on configuration and environment variables.
///
/// * `LICENSOR_LOG` overrides the filter; otherwise `RUST_LOG` is honoured,
///   finally falling back to the configured level.
/// * Events are written to stderr so stdout stays reserved for command output.
/// * When a log directory is configured, a daily-rolling JSON file is written too.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<TracingGuard> {
    let filter = match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!(
                "invalid {} directive ({}); using configured level {}",
                LOG_ENV, err, config.level
            );
            EnvFilter::new(&config.level)
        }),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level)),
    };

    let fmt_layer = match config.format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let mut guard = TracingGuard::default();
    let file_layer = match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).with_context(|| {
                format!("unable to create log directory {}", directory.display())
            })?;
            let prefix = config
                .file_prefix
                .clone()
                .unwrap_or_else(|| service_name.to_owned());
            let appender = daily(directory, format!("{prefix}-{service_name}.log"));
            let (writer, file_guard) = tracing_appender::non_blocking(appender);
            guard._file = Some(file_guard);
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_timer(fmt::time::UtcTime::rfc_3339())
                    .json()
                    .with_writer(writer)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(file_layer)
        .try_init()
        .ok();

    info!(service = %service_name, format = ?config.format, "tracing initialised");
    Ok(guard)
}

/// Structured context attached to lifecycle events.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Operation being performed (generate, verify).
    pub operation: Option<&'a str>,
    /// Input source description.
    pub source: Option<&'a str>,
    /// Number of licenses involved.
    pub licenses: Option<usize>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the operation name.
    pub fn with_operation(mut self, operation: &'a str) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Attach an input source description.
    pub fn with_source(mut self, source: &'a str) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach a license count.
    pub fn with_licenses(mut self, licenses: usize) -> Self {
        self.licenses = Some(licenses);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event with a success/fault outcome.
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let default = LogContext::default();
    let ctx = context.unwrap_or(&default);
    macro_rules! emit {
        ($level:expr) => {
            tracing::event!(
                $level,
                event,
                outcome = outcome.as_str(),
                operation = ctx.operation.unwrap_or(""),
                source = ctx.source.unwrap_or(""),
                licenses = ctx.licenses.unwrap_or_default(),
                message = %message
            )
        };
    }
    match outcome {
        SystemEventOutcome::Success => emit!(Level::INFO),
        SystemEventOutcome::Fault => emit!(Level::ERROR),
    }
}
