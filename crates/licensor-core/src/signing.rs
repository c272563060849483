//! ---
//! lic_section: "01-license-core"
//! lic_subsection: "module"
//! lic_type: "source"
//! lic_scope: "code"
//! lic_description: "Ed25519 signing and verification over canonical license bytes."
//! lic_version: "v0.1.0"
//! lic_owner: "tbd"
//! ---
use std::borrow::Cow;
use std::convert::TryInto;
use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::{SigningError, VerificationError};

const SEED_LENGTH: usize = 32;
const KEYPAIR_LENGTH: usize = 64;
const PUBLIC_KEY_LENGTH: usize = 32;

/// Signature scheme tag stored on every signed license.
///
/// Variants are append-only: a scheme, once released, keeps its version
/// number and signing input forever so old licenses stay verifiable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureScheme {
    /// Version 1: Ed25519 over the canonical bytes.
    Ed25519,
    /// Version 2: Ed25519 over the SHA-256 digest of the canonical bytes.
    #[default]
    Ed25519Sha256,
}

impl SignatureScheme {
    /// Version number written to the `version` field.
    #[must_use]
    pub fn version(&self) -> u32 {
        match self {
            SignatureScheme::Ed25519 => 1,
            SignatureScheme::Ed25519Sha256 => 2,
        }
    }

    /// Hash algorithm written to the `hash_algorithm` field.
    #[must_use]
    pub fn hash_algorithm(&self) -> &'static str {
        match self {
            SignatureScheme::Ed25519 => "sha512",
            SignatureScheme::Ed25519Sha256 => "sha256",
        }
    }

    /// Resolve a stored `(version, hash_algorithm)` pair.
    #[must_use]
    pub fn from_tag(version: u32, hash_algorithm: &str) -> Option<Self> {
        [SignatureScheme::Ed25519, SignatureScheme::Ed25519Sha256]
            .into_iter()
            .find(|scheme| scheme.version() == version && scheme.hash_algorithm() == hash_algorithm)
    }

    fn signing_input<'a>(&self, canonical: &'a CanonicalBytes) -> Cow<'a, [u8]> {
        match self {
            SignatureScheme::Ed25519 => Cow::Borrowed(canonical.as_bytes()),
            SignatureScheme::Ed25519Sha256 => {
                Cow::Owned(Sha256::digest(canonical.as_bytes()).to_vec())
            }
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}/{}", self.version(), self.hash_algorithm())
    }
}

/// Decode key material given as hex text, base64 text, or raw bytes.
fn decode_key_material(raw: &[u8], accepted: &[usize]) -> Option<Vec<u8>> {
    if let Ok(text) = std::str::from_utf8(raw) {
        let text = text.trim();
        if let Ok(bytes) = hex::decode(text) {
            if accepted.contains(&bytes.len()) {
                return Some(bytes);
            }
        }
        if let Ok(bytes) = general_purpose::STANDARD.decode(text) {
            if accepted.contains(&bytes.len()) {
                return Some(bytes);
            }
        }
    }
    accepted.contains(&raw.len()).then(|| raw.to_vec())
}

/// Private key parsed for a single signing operation.
pub struct SigningKeyHandle {
    key: SigningKey,
}

impl SigningKeyHandle {
    /// Parse a 32 byte seed or 64 byte keypair.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, SigningError> {
        let bytes = decode_key_material(raw, &[SEED_LENGTH, KEYPAIR_LENGTH]).ok_or_else(|| {
            SigningError::MalformedKey(format!(
                "expected a {SEED_LENGTH} byte seed or {KEYPAIR_LENGTH} byte keypair as raw, hex, or base64 data ({} bytes supplied)",
                raw.len()
            ))
        })?;
        let key = match bytes.len() {
            SEED_LENGTH => {
                let seed: [u8; SEED_LENGTH] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| SigningError::MalformedKey("invalid seed length".to_owned()))?;
                SigningKey::from_bytes(&seed)
            }
            _ => {
                let keypair: [u8; KEYPAIR_LENGTH] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| SigningError::MalformedKey("invalid keypair length".to_owned()))?;
                SigningKey::from_keypair_bytes(&keypair)
                    .map_err(|err| SigningError::MalformedKey(format!("invalid keypair: {err}")))?
            }
        };
        Ok(Self { key })
    }

    /// Public half of this key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKeyHandle {
        VerifyingKeyHandle {
            key: self.key.verifying_key(),
        }
    }

    /// Sign canonical bytes under `scheme`, returning base64 signature text.
    pub fn sign(
        &self,
        scheme: SignatureScheme,
        canonical: &CanonicalBytes,
    ) -> Result<String, SigningError> {
        let signature = self
            .key
            .try_sign(&scheme.signing_input(canonical))
            .map_err(|err| SigningError::Primitive(err.to_string()))?;
        Ok(general_purpose::STANDARD.encode(signature.to_bytes()))
    }
}

impl fmt::Debug for SigningKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKeyHandle(<private>)")
    }
}

/// Public key parsed for a single verification call.
#[derive(Clone)]
pub struct VerifyingKeyHandle {
    key: VerifyingKey,
}

impl VerifyingKeyHandle {
    /// Parse a 32 byte public key.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, VerificationError> {
        let bytes = decode_key_material(raw, &[PUBLIC_KEY_LENGTH]).ok_or_else(|| {
            VerificationError::MalformedKey(format!(
                "expected a {PUBLIC_KEY_LENGTH} byte public key as raw, hex, or base64 data ({} bytes supplied)",
                raw.len()
            ))
        })?;
        let array: [u8; PUBLIC_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| VerificationError::MalformedKey("invalid public key length".to_owned()))?;
        let key = VerifyingKey::from_bytes(&array)
            .map_err(|err| VerificationError::MalformedKey(format!("invalid public key: {err}")))?;
        if key.is_weak() {
            return Err(VerificationError::MalformedKey(
                "public key has small order".to_owned(),
            ));
        }
        Ok(Self { key })
    }

    /// Raw public key bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.key.to_bytes()
    }

    /// Check base64 `signature` over canonical bytes under `scheme`.
    pub fn verify(
        &self,
        scheme: SignatureScheme,
        canonical: &CanonicalBytes,
        signature: &str,
    ) -> Result<(), VerificationError> {
        let signature_bytes = general_purpose::STANDARD.decode(signature).map_err(|err| {
            VerificationError::MalformedSignature(format!("signature must be base64 encoded: {err}"))
        })?;
        let signature_array: [u8; 64] = signature_bytes.as_slice().try_into().map_err(|_| {
            VerificationError::MalformedSignature(format!(
                "expected 64 signature bytes, got {}",
                signature_bytes.len()
            ))
        })?;
        let signature = Signature::from_bytes(&signature_array);
        self.key
            .verify_strict(&scheme.signing_input(canonical), &signature)
            .map_err(|_| VerificationError::Mismatch)
    }
}

impl fmt::Debug for VerifyingKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifyingKeyHandle({}...)", hex::encode(&self.key.to_bytes()[..4]))
    }
}
