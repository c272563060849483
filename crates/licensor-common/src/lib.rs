//! ---
//! lic_section: "02-ambient-runtime"
//! lic_subsection: "module"
//! lic_type: "source"
//! lic_scope: "code"
//! lic_description: "Shared configuration and logging for licensor binaries."
//! lic_version: "v0.1.0"
//! lic_owner: "tbd"
//! ---
//! Shared runtime primitives for the licensor workspace.
//! This crate exposes configuration loading and tracing setup consumed by
//! the control CLI.

pub mod config;
pub mod logging;

pub use config::{LicensorConfig, LoadedConfig, LoggingConfig, SigningConfig};
pub use logging::{init_tracing, log_system_event, LogContext, LogFormat, SystemEventOutcome};
