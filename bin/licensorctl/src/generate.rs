//! ---
//! lic_section: "03-operator-interfaces"
//! lic_subsection: "binary"
//! lic_type: "source"
//! lic_scope: "code"
//! lic_description: "generate subcommand: sign specs and print the collection."
//! lic_version: "v0.1.0"
//! lic_owner: "tbd"
//! ---
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use licensor_common::{log_system_event, LicensorConfig, LogContext, SystemEventOutcome};
use licensor_core::{FileKeyStore, LicenseGenerator, SignatureScheme};

use crate::UsageError;

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Inline license spec JSON (object, array, or {"licenses": [...]}). Repeatable.
    #[arg(long = "license", value_name = "JSON")]
    licenses: Vec<String>,

    /// File holding license spec JSON. Repeatable.
    #[arg(long = "license-file", value_name = "FILE")]
    license_files: Vec<PathBuf>,

    /// Ed25519 private key (raw, hex, or base64).
    #[arg(long = "private-key-path", value_name = "FILE")]
    private_key_path: Option<PathBuf>,

    /// Ed25519 public key used for the post-signing self-check.
    #[arg(long = "public-key-path", value_name = "FILE")]
    public_key_path: Option<PathBuf>,

    /// Signature scheme for new licenses.
    #[arg(long, value_enum)]
    scheme: Option<SchemeArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SchemeArg {
    Ed25519,
    Ed25519Sha256,
}

impl From<SchemeArg> for SignatureScheme {
    fn from(value: SchemeArg) -> Self {
        match value {
            SchemeArg::Ed25519 => SignatureScheme::Ed25519,
            SchemeArg::Ed25519Sha256 => SignatureScheme::Ed25519Sha256,
        }
    }
}

pub fn run(args: GenerateArgs, config: &LicensorConfig) -> Result<ExitCode> {
    let private_key_path = resolve_key_path(
        args.private_key_path,
        config.signing.private_key_path.as_ref(),
        "--private-key-path",
    )?;
    let public_key_path = resolve_key_path(
        args.public_key_path,
        config.signing.public_key_path.as_ref(),
        "--public-key-path",
    )?;
    let scheme = args
        .scheme
        .map(SignatureScheme::from)
        .unwrap_or(config.signing.scheme);

    let mut sources = args.licenses;
    for path in &args.license_files {
        sources.push(read_spec_file(path)?);
    }

    let context = LogContext::new()
        .with_operation("generate")
        .with_licenses(sources.len());
    let generator = LicenseGenerator::new(FileKeyStore).with_scheme(scheme);
    match generator.generate(&sources, &private_key_path, &public_key_path) {
        Ok(blob) => {
            log_system_event(
                Some(&context),
                "license.generate",
                "license collection generated",
                SystemEventOutcome::Success,
            );
            println!("{blob}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            log_system_event(
                Some(&context),
                "license.generate",
                &err.to_string(),
                SystemEventOutcome::Fault,
            );
            Err(err).context("license generation failed")
        }
    }
}

pub(crate) fn resolve_key_path(
    flag: Option<PathBuf>,
    configured: Option<&PathBuf>,
    name: &str,
) -> Result<PathBuf> {
    flag.or_else(|| configured.cloned())
        .ok_or_else(|| UsageError(format!("{name} is required (flag or [signing] config)")).into())
}

fn read_spec_file(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            Err(UsageError(format!("license file not found: {}", path.display())).into())
        }
        Err(err) => Err(err).with_context(|| format!("unable to read license file {}", path.display())),
    }
}
