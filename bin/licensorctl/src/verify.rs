//! ---
//! lic_section: "03-operator-interfaces"
//! lic_subsection: "binary"
//! lic_type: "source"
//! lic_scope: "code"
//! lic_description: "verify subcommand: per-feature signature check of a collection."
//! lic_version: "v0.1.0"
//! lic_owner: "tbd"
//! ---
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use licensor_common::{log_system_event, LicensorConfig, LogContext, SystemEventOutcome};
use licensor_core::{ErrorClass, FileKeyStore, KeyStore, LicenseCollection};

use crate::generate::resolve_key_path;
use crate::UsageError;

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Signed license collection to check.
    #[arg(long = "licenses-file", value_name = "FILE")]
    licenses_file: PathBuf,

    /// Ed25519 public key (raw, hex, or base64).
    #[arg(long = "public-key-path", value_name = "FILE")]
    public_key_path: Option<PathBuf>,
}

/// Prints feature to accepted; exits non-zero if any license is rejected.
pub fn run(args: VerifyArgs, config: &LicensorConfig) -> Result<ExitCode> {
    let public_key_path = resolve_key_path(
        args.public_key_path,
        config.signing.public_key_path.as_ref(),
        "--public-key-path",
    )?;
    let blob = match fs::read(&args.licenses_file) {
        Ok(blob) => blob,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(UsageError(format!(
                "licenses file not found: {}",
                args.licenses_file.display()
            ))
            .into())
        }
        Err(err) => {
            return Err(err).with_context(|| {
                format!("unable to read licenses file {}", args.licenses_file.display())
            })
        }
    };
    let public_key = FileKeyStore
        .load(&public_key_path)
        .context("loading public key")?;

    let collection = LicenseCollection::parse(&blob).context("invalid licenses file")?;
    let results = collection
        .verify_all(&public_key)
        .context("public key rejected")?;

    let source = args.licenses_file.display().to_string();
    let context = LogContext::new()
        .with_operation("verify")
        .with_source(&source)
        .with_licenses(results.len());
    let all_valid = results.values().all(|valid| *valid);
    println!("{}", serde_json::to_string_pretty(&results)?);

    if all_valid {
        log_system_event(
            Some(&context),
            "license.verify",
            "all licenses verified",
            SystemEventOutcome::Success,
        );
        Ok(ExitCode::SUCCESS)
    } else {
        log_system_event(
            Some(&context),
            "license.verify",
            "one or more licenses failed verification",
            SystemEventOutcome::Fault,
        );
        Ok(ExitCode::from(ErrorClass::Failure.exit_code()))
    }
}
