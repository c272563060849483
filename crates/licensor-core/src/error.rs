//! ---
//! lic_section: "01-license-core"
//! lic_subsection: "module"
//! lic_type: "source"
//! lic_scope: "code"
//! lic_description: "Error taxonomy for license generation and verification."
//! lic_version: "v0.1.0"
//! lic_owner: "tbd"
//! ---
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while parsing, signing, or aggregating licenses.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Spec input had a bad shape or invalid values.
    #[error("malformed license spec: {0}")]
    MalformedSpec(String),
    /// Two licenses in one batch or collection share a feature name.
    #[error("duplicate license for feature '{0}'")]
    DuplicateFeature(String),
    /// Signing failed for a key or primitive reason.
    #[error(transparent)]
    Signing(#[from] SigningError),
    /// The verifier could not run.
    #[error(transparent)]
    Verification(#[from] VerificationError),
    /// Serialized collection could not be decoded.
    #[error("malformed license collection: {0}")]
    MalformedCollection(String),
}

/// Failures raised by the signing engine.
#[derive(Debug, Error)]
pub enum SigningError {
    /// Private key bytes are not a usable Ed25519 key.
    #[error("malformed private key: {0}")]
    MalformedKey(String),
    /// Canonical encoding of the license failed.
    #[error("failed to canonicalize license: {0}")]
    Canonicalization(String),
    /// The signature primitive rejected the input.
    #[error("signature primitive failed: {0}")]
    Primitive(String),
}

/// Failures raised by the verification engine.
///
/// [`VerificationError::MalformedKey`] means the verifier is misconfigured;
/// the remaining variants mean the license itself is not valid.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// Public key bytes are not a usable Ed25519 key.
    #[error("malformed public key: {0}")]
    MalformedKey(String),
    /// Signature text is not a base64 encoded 64 byte signature.
    #[error("malformed signature encoding: {0}")]
    MalformedSignature(String),
    /// Signature does not match the license content.
    #[error("signature does not match license content")]
    Mismatch,
    /// Canonical encoding of the license failed.
    #[error("failed to canonicalize license: {0}")]
    Canonicalization(String),
}

impl VerificationError {
    /// Short label used for telemetry and log fields.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            VerificationError::MalformedKey(_) => "malformed_key",
            VerificationError::MalformedSignature(_) => "malformed_signature",
            VerificationError::Mismatch => "mismatch",
            VerificationError::Canonicalization(_) => "canonicalization",
        }
    }
}

/// Key storage failures, classified for the CLI layer.
#[derive(Debug, Error)]
pub enum KeyLoadError {
    /// No key exists at the given path.
    #[error("key file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// The key exists but could not be read.
    #[error("unable to read key file {}: {source}", path.display())]
    Unreadable {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
}

/// Terminal failure of one generation run.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No license spec source was supplied.
    #[error("at least one license spec is required")]
    NoSpecs,
    /// Key material could not be loaded.
    #[error(transparent)]
    KeyUnavailable(#[from] KeyLoadError),
    /// Parsing, uniqueness, or signing failed.
    #[error(transparent)]
    License(#[from] LicenseError),
    /// Freshly signed licenses did not verify with the supplied public key.
    #[error("self-check failed; signatures did not verify for: {}", .features.join(", "))]
    SelfCheck {
        /// Features whose signatures failed.
        features: Vec<String>,
    },
}

/// Coarse classification the CLI layer maps to a process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing or invalid arguments.
    Usage,
    /// Parsing, signing, or verification failure.
    Failure,
}

impl ErrorClass {
    /// Conventional process exit code for the class.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            ErrorClass::Usage => 64,
            ErrorClass::Failure => 1,
        }
    }
}

impl GenerationError {
    /// Classify the error for exit-status mapping.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            GenerationError::NoSpecs
            | GenerationError::KeyUnavailable(KeyLoadError::NotFound(_))
            | GenerationError::License(LicenseError::Signing(SigningError::MalformedKey(_)))
            | GenerationError::License(LicenseError::Verification(
                VerificationError::MalformedKey(_),
            )) => ErrorClass::Usage,
            _ => ErrorClass::Failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_file_is_usage_error() {
        let err = GenerationError::from(KeyLoadError::NotFound(PathBuf::from("missing.key")));
        assert_eq!(err.class(), ErrorClass::Usage);
        assert_eq!(err.class().exit_code(), 64);
    }

    #[test]
    fn license_errors_are_general_failures() {
        let err = GenerationError::from(LicenseError::DuplicateFeature("search".into()));
        assert_eq!(err.class(), ErrorClass::Failure);
        assert_eq!(err.to_string(), "duplicate license for feature 'search'");
    }

    #[test]
    fn malformed_key_material_is_usage_error() {
        let private = GenerationError::from(LicenseError::from(SigningError::MalformedKey(
            "short".into(),
        )));
        assert_eq!(private.class(), ErrorClass::Usage);
        let public = GenerationError::from(LicenseError::from(VerificationError::MalformedKey(
            "short".into(),
        )));
        assert_eq!(public.class(), ErrorClass::Usage);
        let mismatch = GenerationError::from(LicenseError::from(VerificationError::Mismatch));
        assert_eq!(mismatch.class(), ErrorClass::Failure);
    }
}
