//! ---
//! lic_section: "03-operator-interfaces"
//! lic_subsection: "binary"
//! lic_type: "source"
//! lic_scope: "code"
//! lic_description: "Control CLI for generating and verifying signed licenses."
//! lic_version: "v0.1.0"
//! lic_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use licensor_common::config::DEFAULT_CONFIG_CANDIDATES;
use licensor_common::{init_tracing, LicensorConfig};
use licensor_core::{ErrorClass, GenerationError, KeyLoadError, VerificationError};
use thiserror::Error;

mod generate;
mod verify;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Generate and verify signed feature licenses",
    long_about = None
)]
struct Cli {
    /// Configuration file (falls back to LICENSOR_CONFIG, then licensor.toml).
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sign license specs into one collection and print it.
    Generate(generate::GenerateArgs),
    /// Check every license in a collection against a public key.
    Verify(verify::VerifyArgs),
}

/// Invalid or missing operator input.
#[derive(Debug, Error)]
#[error("{0}")]
pub(crate) struct UsageError(pub(crate) String);

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match LicensorConfig::load_with_source(
        cli.config.as_deref(),
        &DEFAULT_CONFIG_CANDIDATES[..],
    ) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::from(ErrorClass::Usage.exit_code());
        }
    };
    let _guard = match init_tracing("licensorctl", &loaded.config.logging) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::from(ErrorClass::Failure.exit_code());
        }
    };
    if let Some(source) = &loaded.source {
        tracing::debug!(config = %source.display(), "configuration loaded");
    }

    let outcome = match cli.command {
        Commands::Generate(args) => generate::run(args, &loaded.config),
        Commands::Verify(args) => verify::run(args, &loaded.config),
    };
    match outcome {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(classify(&err).exit_code())
        }
    }
}

fn classify(err: &anyhow::Error) -> ErrorClass {
    for cause in err.chain() {
        if let Some(generation) = cause.downcast_ref::<GenerationError>() {
            return generation.class();
        }
        if let Some(KeyLoadError::NotFound(_)) = cause.downcast_ref::<KeyLoadError>() {
            return ErrorClass::Usage;
        }
        if let Some(VerificationError::MalformedKey(_)) = cause.downcast_ref::<VerificationError>() {
            return ErrorClass::Usage;
        }
        if cause.is::<UsageError>() {
            return ErrorClass::Usage;
        }
    }
    ErrorClass::Failure
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn errors_are_classified_through_context() {
        let usage = anyhow::Error::from(GenerationError::NoSpecs).context("generate failed");
        assert_eq!(classify(&usage), ErrorClass::Usage);

        let missing = anyhow::Error::from(KeyLoadError::NotFound(PathBuf::from("k")))
            .context("loading public key");
        assert_eq!(classify(&missing), ErrorClass::Usage);

        let flagged = anyhow::Error::from(UsageError("no key path".into()));
        assert_eq!(classify(&flagged), ErrorClass::Usage);

        let bad_key = anyhow::Error::from(VerificationError::MalformedKey("short".into()))
            .context("public key rejected");
        assert_eq!(classify(&bad_key), ErrorClass::Usage);

        assert_eq!(classify(&anyhow!("boom")), ErrorClass::Failure);
    }
}
