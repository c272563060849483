//! ---
//! lic_section: "01-license-core"
//! lic_subsection: "module"
//! lic_type: "source"
//! lic_scope: "code"
//! lic_description: "Generation pipeline from spec sources to a self-checked signed collection."
//! lic_version: "v0.1.0"
//! lic_owner: "tbd"
//! ---
use std::path::Path;

use tracing::{info, warn};

use crate::collection::LicenseCollection;
use crate::error::{GenerationError, LicenseError};
use crate::keys::KeyStore;
use crate::signing::SignatureScheme;
use crate::spec::{index_specs, parse_specs, LicenseSpec};

/// Turns license specs and key paths into one signed collection blob.
#[derive(Debug, Clone)]
pub struct LicenseGenerator<K> {
    key_store: K,
    scheme: SignatureScheme,
}

impl<K: KeyStore> LicenseGenerator<K> {
    /// Create a generator signing with the default scheme.
    #[must_use]
    pub fn new(key_store: K) -> Self {
        Self {
            key_store,
            scheme: SignatureScheme::default(),
        }
    }

    /// Override the scheme used for new signatures.
    #[must_use]
    pub fn with_scheme(mut self, scheme: SignatureScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Scheme used for new signatures.
    #[must_use]
    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// Parse every source (single spec or batch) and generate one blob.
    pub fn generate<S: AsRef<[u8]>>(
        &self,
        sources: &[S],
        private_key_path: &Path,
        public_key_path: &Path,
    ) -> Result<String, GenerationError> {
        let mut specs = Vec::new();
        for source in sources {
            specs.extend(parse_specs(source.as_ref())?);
        }
        self.generate_specs(specs, private_key_path, public_key_path)
    }

    /// Sign `specs`, then prove the output verifies with the public key.
    ///
    /// Nothing is returned unless every license in the batch signed and
    /// verified.
    pub fn generate_specs(
        &self,
        specs: Vec<LicenseSpec>,
        private_key_path: &Path,
        public_key_path: &Path,
    ) -> Result<String, GenerationError> {
        if specs.is_empty() {
            return Err(GenerationError::NoSpecs);
        }
        let indexed = index_specs(specs)?;

        let private_key = self.key_store.load(private_key_path)?;
        let public_key = self.key_store.load(public_key_path)?;

        let collection =
            LicenseCollection::build_with_scheme(indexed.into_values(), &private_key, self.scheme)?;
        drop(private_key);
        let blob = collection.serialize()?;

        let reparsed = LicenseCollection::parse(blob.as_bytes())?;
        let results = reparsed
            .verify_all(&public_key)
            .map_err(LicenseError::from)?;
        let mut failed: Vec<String> = results
            .into_iter()
            .filter_map(|(feature, ok)| (!ok).then_some(feature))
            .collect();
        if failed.is_empty() && reparsed != collection {
            failed = collection.features().map(str::to_owned).collect();
        }
        if !failed.is_empty() {
            warn!(features = ?failed, "signed licenses failed self-check");
            return Err(GenerationError::SelfCheck { features: failed });
        }

        info!(
            count = collection.len(),
            scheme = %self.scheme,
            "license collection generated"
        );
        Ok(blob)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::error::{ErrorClass, VerificationError};
    use crate::keys::MemoryKeyStore;
    use crate::signing::SigningKeyHandle;

    const PRIVATE: [u8; 32] = [7u8; 32];

    fn public_of(seed: &[u8; 32]) -> Vec<u8> {
        SigningKeyHandle::from_bytes(seed)
            .unwrap()
            .verifying_key()
            .to_bytes()
            .to_vec()
    }

    fn store() -> MemoryKeyStore {
        MemoryKeyStore::new()
            .with_key("private.key", PRIVATE.to_vec())
            .with_key("public.key", public_of(&PRIVATE))
            .with_key("other-public.key", public_of(&[9u8; 32]))
    }

    fn source(feature: &str) -> String {
        format!(
            r#"{{"feature": "{feature}", "type": "trial", "subscription_type": "none",
                "issue_date": "2024-06-01", "expiry_date": "2024-07-01", "max_nodes": -1}}"#
        )
    }

    fn paths() -> (PathBuf, PathBuf) {
        (PathBuf::from("private.key"), PathBuf::from("public.key"))
    }

    #[test]
    fn generates_self_checked_blob_from_mixed_sources() {
        let (private, public) = paths();
        let batch = format!("[{}, {}]", source("a"), source("b"));
        let blob = LicenseGenerator::new(store())
            .generate(&[source("c"), batch], &private, &public)
            .expect("generation succeeds");
        let collection = LicenseCollection::parse(blob.as_bytes()).unwrap();
        assert_eq!(collection.features().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicates_across_sources_are_rejected() {
        let (private, public) = paths();
        let err = LicenseGenerator::new(store())
            .generate(&[source("a"), source("a")], &private, &public)
            .expect_err("duplicate");
        assert!(matches!(
            err,
            GenerationError::License(LicenseError::DuplicateFeature(_))
        ));
        assert_eq!(err.class(), ErrorClass::Failure);
    }

    #[test]
    fn malformed_spec_fails_before_keys_are_loaded() {
        let empty = MemoryKeyStore::new();
        let (private, public) = paths();
        let err = LicenseGenerator::new(empty)
            .generate(&[r#"{"type": "trial"}"#], &private, &public)
            .expect_err("malformed");
        assert!(matches!(
            err,
            GenerationError::License(LicenseError::MalformedSpec(_))
        ));
    }

    #[test]
    fn missing_key_is_a_usage_error() {
        let (_, public) = paths();
        let err = LicenseGenerator::new(store())
            .generate(&[source("a")], Path::new("absent.key"), &public)
            .expect_err("missing key");
        assert_eq!(err.class(), ErrorClass::Usage);
    }

    #[test]
    fn no_sources_is_a_usage_error() {
        let (private, public) = paths();
        let err = LicenseGenerator::new(store())
            .generate::<String>(&[], &private, &public)
            .expect_err("no specs");
        assert!(matches!(err, GenerationError::NoSpecs));
        assert_eq!(err.class(), ErrorClass::Usage);
    }

    #[test]
    fn mismatched_public_key_fails_self_check() {
        let (private, _) = paths();
        let err = LicenseGenerator::new(store())
            .generate(&[source("a"), source("b")], &private, Path::new("other-public.key"))
            .expect_err("self-check");
        match err {
            GenerationError::SelfCheck { features } => assert_eq!(features, vec!["a", "b"]),
            other => panic!("expected self-check failure, got {other:?}"),
        }
    }

    #[test]
    fn malformed_public_key_is_reported() {
        let store = store().with_key("garbage.pub", b"garbage".to_vec());
        let (private, _) = paths();
        let err = LicenseGenerator::new(store)
            .generate(&[source("a")], &private, Path::new("garbage.pub"))
            .expect_err("bad public key");
        assert!(matches!(
            err,
            GenerationError::License(LicenseError::Verification(VerificationError::MalformedKey(_)))
        ));
        assert_eq!(err.class(), ErrorClass::Usage);
    }

    #[test]
    fn configured_scheme_is_applied() {
        let (private, public) = paths();
        let blob = LicenseGenerator::new(store())
            .with_scheme(SignatureScheme::Ed25519)
            .generate(&[source("a")], &private, &public)
            .unwrap();
        let collection = LicenseCollection::parse(blob.as_bytes()).unwrap();
        assert_eq!(collection.get("a").unwrap().scheme(), SignatureScheme::Ed25519);
    }
}
