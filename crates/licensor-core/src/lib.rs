//! ---
//! lic_section: "01-license-core"
//! lic_subsection: "module"
//! lic_type: "source"
//! lic_scope: "code"
//! lic_description: "License generation and verification engine."
//! lic_version: "v0.1.0"
//! lic_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Licensor core crate encapsulating license spec parsing, canonical
//! encoding, Ed25519 signing and verification, signed collections, and the
//! generation pipeline used by the control CLI.

pub mod canonical;
pub mod collection;
pub mod error;
pub mod generator;
pub mod keys;
pub mod signing;
pub mod spec;
pub mod telemetry;

pub use canonical::CanonicalBytes;
pub use collection::{LicenseCollection, SignedLicense};
pub use error::{
    ErrorClass, GenerationError, KeyLoadError, LicenseError, SigningError, VerificationError,
};
pub use generator::LicenseGenerator;
pub use keys::{FileKeyStore, KeyStore, MemoryKeyStore};
pub use signing::{SignatureScheme, SigningKeyHandle, VerifyingKeyHandle};
pub use spec::{parse_specs, LicenseSpec, LicenseType, MaxNodes, SubscriptionType};
