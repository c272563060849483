//! ---
//! lic_section: "01-license-core"
//! lic_subsection: "module"
//! lic_type: "source"
//! lic_scope: "code"
//! lic_description: "Signed licenses and feature-keyed license collections."
//! lic_version: "v0.1.0"
//! lic_owner: "tbd"
//! ---
use std::collections::btree_map::{BTreeMap, Entry};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::canonical::{CanonicalBytes, CanonicalLicense};
use crate::error::{LicenseError, SigningError, VerificationError};
use crate::signing::{SignatureScheme, SigningKeyHandle, VerifyingKeyHandle};
use crate::spec::{
    document_items, index_specs, validate_terms, LicenseSpec, LicenseType, MaxNodes,
    SubscriptionType,
};
use crate::telemetry::{record_license_signed, record_rejection, record_verification};

/// A license spec together with its signature and scheme tag.
///
/// Instances are immutable; changing any field means signing a new license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LicenseRecord", into = "LicenseRecord")]
pub struct SignedLicense {
    uid: String,
    feature: String,
    license_type: LicenseType,
    subscription_type: SubscriptionType,
    issue_date: NaiveDate,
    expiry_date: NaiveDate,
    max_nodes: MaxNodes,
    issued_to: Option<String>,
    issuer: Option<String>,
    scheme: SignatureScheme,
    signature: String,
}

/// Wire layout of a signed license.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LicenseRecord {
    uid: String,
    feature: String,
    #[serde(rename = "type")]
    license_type: LicenseType,
    subscription_type: SubscriptionType,
    issue_date: NaiveDate,
    expiry_date: NaiveDate,
    max_nodes: MaxNodes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issued_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issuer: Option<String>,
    version: u32,
    hash_algorithm: String,
    signature: String,
}

impl TryFrom<LicenseRecord> for SignedLicense {
    type Error = String;

    fn try_from(record: LicenseRecord) -> Result<Self, Self::Error> {
        validate_terms(
            &record.feature,
            Some(&record.uid),
            record.issue_date,
            record.expiry_date,
        )?;
        let scheme = SignatureScheme::from_tag(record.version, &record.hash_algorithm)
            .ok_or_else(|| {
                format!(
                    "unsupported signature scheme version {} with hash algorithm '{}'",
                    record.version, record.hash_algorithm
                )
            })?;
        Ok(Self {
            uid: record.uid,
            feature: record.feature,
            license_type: record.license_type,
            subscription_type: record.subscription_type,
            issue_date: record.issue_date,
            expiry_date: record.expiry_date,
            max_nodes: record.max_nodes,
            issued_to: record.issued_to,
            issuer: record.issuer,
            scheme,
            signature: record.signature,
        })
    }
}

impl From<SignedLicense> for LicenseRecord {
    fn from(license: SignedLicense) -> Self {
        Self {
            uid: license.uid,
            feature: license.feature,
            license_type: license.license_type,
            subscription_type: license.subscription_type,
            issue_date: license.issue_date,
            expiry_date: license.expiry_date,
            max_nodes: license.max_nodes,
            issued_to: license.issued_to,
            issuer: license.issuer,
            version: license.scheme.version(),
            hash_algorithm: license.scheme.hash_algorithm().to_owned(),
            signature: license.signature,
        }
    }
}

impl SignedLicense {
    /// Sign `spec` under `scheme`, assigning a random uid when the spec has none.
    pub fn sign(
        spec: &LicenseSpec,
        scheme: SignatureScheme,
        key: &SigningKeyHandle,
    ) -> Result<Self, LicenseError> {
        spec.validate().map_err(LicenseError::MalformedSpec)?;
        let uid = spec
            .uid
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let canonical = CanonicalLicense::from_spec(spec, &uid, scheme)
            .encode()
            .map_err(|err| SigningError::Canonicalization(err.to_string()))?;
        let signature = key.sign(scheme, &canonical)?;
        let license = Self {
            uid,
            feature: spec.feature.clone(),
            license_type: spec.license_type,
            subscription_type: spec.subscription_type,
            issue_date: spec.issue_date,
            expiry_date: spec.expiry_date,
            max_nodes: spec.max_nodes,
            issued_to: spec.issued_to.clone(),
            issuer: spec.issuer.clone(),
            scheme,
            signature,
        };
        record_license_signed(&license);
        Ok(license)
    }

    /// Re-derive the canonical bytes from the stored fields.
    pub fn canonical_bytes(&self) -> Result<CanonicalBytes, serde_json::Error> {
        CanonicalLicense {
            version: self.scheme.version(),
            hash_algorithm: self.scheme.hash_algorithm(),
            uid: &self.uid,
            feature: &self.feature,
            license_type: self.license_type,
            subscription_type: self.subscription_type,
            issue_date: self.issue_date,
            expiry_date: self.expiry_date,
            max_nodes: self.max_nodes,
            issued_to: self.issued_to.as_deref(),
            issuer: self.issuer.as_deref(),
        }
        .encode()
    }

    /// Check the signature against `key`.
    pub fn verify(&self, key: &VerifyingKeyHandle) -> Result<(), VerificationError> {
        let canonical = self
            .canonical_bytes()
            .map_err(|err| VerificationError::Canonicalization(err.to_string()))?;
        key.verify(self.scheme, &canonical, &self.signature)
    }

    /// The signed terms as a spec carrying the assigned uid.
    #[must_use]
    pub fn to_spec(&self) -> LicenseSpec {
        LicenseSpec {
            uid: Some(self.uid.clone()),
            feature: self.feature.clone(),
            license_type: self.license_type,
            subscription_type: self.subscription_type,
            issue_date: self.issue_date,
            expiry_date: self.expiry_date,
            max_nodes: self.max_nodes,
            issued_to: self.issued_to.clone(),
            issuer: self.issuer.clone(),
        }
    }

    /// Issuer-assigned identifier.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Licensed feature.
    #[must_use]
    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// License tier.
    #[must_use]
    pub fn license_type(&self) -> LicenseType {
        self.license_type
    }

    /// Subscription level.
    #[must_use]
    pub fn subscription_type(&self) -> SubscriptionType {
        self.subscription_type
    }

    /// First valid day.
    #[must_use]
    pub fn issue_date(&self) -> NaiveDate {
        self.issue_date
    }

    /// Last valid day.
    #[must_use]
    pub fn expiry_date(&self) -> NaiveDate {
        self.expiry_date
    }

    /// Node limit.
    #[must_use]
    pub fn max_nodes(&self) -> MaxNodes {
        self.max_nodes
    }

    /// Licensee, when recorded.
    #[must_use]
    pub fn issued_to(&self) -> Option<&str> {
        self.issued_to.as_deref()
    }

    /// Issuer, when recorded.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// Scheme the signature was produced under.
    #[must_use]
    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// Base64 signature text.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    licenses: Vec<&'a SignedLicense>,
}

/// Set of signed licenses keyed uniquely by feature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LicenseCollection {
    licenses: BTreeMap<String, SignedLicense>,
}

impl LicenseCollection {
    /// Sign every spec with the default scheme.
    ///
    /// Either every license is signed or an error is returned; a repeated
    /// feature fails the batch before the key is parsed.
    pub fn build(
        specs: impl IntoIterator<Item = LicenseSpec>,
        private_key: &[u8],
    ) -> Result<Self, LicenseError> {
        Self::build_with_scheme(specs, private_key, SignatureScheme::default())
    }

    /// Sign every spec under `scheme`.
    pub fn build_with_scheme(
        specs: impl IntoIterator<Item = LicenseSpec>,
        private_key: &[u8],
        scheme: SignatureScheme,
    ) -> Result<Self, LicenseError> {
        let indexed = index_specs(specs).inspect_err(|err| {
            if let LicenseError::DuplicateFeature(_) = err {
                record_rejection("duplicate_feature");
            }
        })?;
        if indexed.is_empty() {
            record_rejection("empty_batch");
            return Err(LicenseError::MalformedSpec(
                "no license specs supplied".to_owned(),
            ));
        }
        let key = SigningKeyHandle::from_bytes(private_key)?;
        let licenses = indexed
            .into_iter()
            .map(|(feature, spec)| Ok((feature, SignedLicense::sign(&spec, scheme, &key)?)))
            .collect::<Result<BTreeMap<_, _>, LicenseError>>()?;
        info!(count = licenses.len(), scheme = %scheme, "license batch signed");
        Ok(Self { licenses })
    }

    /// Assemble signed licenses, rejecting a repeated feature.
    pub fn from_licenses(
        licenses: impl IntoIterator<Item = SignedLicense>,
    ) -> Result<Self, LicenseError> {
        let mut indexed = BTreeMap::new();
        for license in licenses {
            match indexed.entry(license.feature.clone()) {
                Entry::Occupied(entry) => {
                    record_rejection("duplicate_feature");
                    return Err(LicenseError::DuplicateFeature(entry.key().clone()));
                }
                Entry::Vacant(entry) => {
                    entry.insert(license);
                }
            }
        }
        Ok(Self { licenses: indexed })
    }

    /// Decode a collection from its JSON interchange form.
    pub fn parse(source: &[u8]) -> Result<Self, LicenseError> {
        let items = document_items(source).map_err(|err| {
            record_rejection("malformed_collection");
            LicenseError::MalformedCollection(err)
        })?;
        let licenses = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_str::<SignedLicense>(item.get()).map_err(|err| {
                    record_rejection("malformed_collection");
                    LicenseError::MalformedCollection(format!("license #{}: {err}", index + 1))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_licenses(licenses)
    }

    /// Encode as a pretty-printed `{"licenses": [...]}` document in feature order.
    pub fn serialize(&self) -> Result<String, LicenseError> {
        let envelope = Envelope {
            licenses: self.licenses.values().collect(),
        };
        serde_json::to_string_pretty(&envelope).map_err(|err| {
            LicenseError::MalformedCollection(format!("failed to encode collection: {err}"))
        })
    }

    /// Verify every license independently, reporting why each one failed.
    ///
    /// Only a malformed public key fails the whole call.
    pub fn verify_all_detailed(
        &self,
        public_key: &[u8],
    ) -> Result<BTreeMap<String, Result<(), VerificationError>>, VerificationError> {
        let key = VerifyingKeyHandle::from_bytes(public_key)?;
        Ok(self
            .licenses
            .iter()
            .map(|(feature, license)| {
                let outcome = license.verify(&key);
                record_verification(feature, outcome.as_ref().map(|_| ()));
                (feature.clone(), outcome)
            })
            .collect())
    }

    /// Verify every license, returning feature to accept/reject.
    pub fn verify_all(&self, public_key: &[u8]) -> Result<BTreeMap<String, bool>, VerificationError> {
        Ok(self
            .verify_all_detailed(public_key)?
            .into_iter()
            .map(|(feature, outcome)| (feature, outcome.is_ok()))
            .collect())
    }

    /// Combine two collections into a new one; shared features are rejected.
    pub fn merge(&self, other: &LicenseCollection) -> Result<Self, LicenseError> {
        Self::from_licenses(self.iter().chain(other.iter()).cloned())
    }

    /// License for `feature`, if present.
    #[must_use]
    pub fn get(&self, feature: &str) -> Option<&SignedLicense> {
        self.licenses.get(feature)
    }

    /// Number of licenses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.licenses.len()
    }

    /// True when the collection holds no licenses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.licenses.is_empty()
    }

    /// Licenses in feature order.
    pub fn iter(&self) -> impl Iterator<Item = &SignedLicense> {
        self.licenses.values()
    }

    /// Feature names in order.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.licenses.keys().map(String::as_str)
    }
}

impl<'a> IntoIterator for &'a LicenseCollection {
    type Item = &'a SignedLicense;
    type IntoIter = std::collections::btree_map::Values<'a, String, SignedLicense>;

    fn into_iter(self) -> Self::IntoIter {
        self.licenses.values()
    }
}
