//! ---
//! lic_section: "01-license-core"
//! lic_subsection: "module"
//! lic_type: "source"
//! lic_scope: "code"
//! lic_description: "Deterministic signable encoding of licenses."
//! lic_version: "v0.1.0"
//! lic_owner: "tbd"
//! ---
//! Canonical license encoding.
//!
//! The canonical form is compact JSON whose key order is fixed by the
//! declaration order of [`CanonicalLicense`], never by the order fields
//! appeared in the source document. Signing and verification both go
//! through [`CanonicalLicense::encode`], so they always agree byte-for-byte.

use chrono::NaiveDate;
use serde::Serialize;

use crate::signing::SignatureScheme;
use crate::spec::{LicenseSpec, LicenseType, MaxNodes, SubscriptionType};

/// Bytes produced by canonical license encoding.
///
/// The inner buffer is private; the only constructor is
/// [`CanonicalLicense::encode`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Borrow the encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the encoding.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the encoding is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Schema-ordered view of every signed field of a license.
///
/// The scheme tag is part of the signed content so a signature cannot be
/// replayed under a different scheme.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalLicense<'a> {
    /// Scheme version.
    pub version: u32,
    /// Scheme hash algorithm tag.
    pub hash_algorithm: &'static str,
    /// Issuer-assigned identifier.
    pub uid: &'a str,
    /// Licensed feature.
    pub feature: &'a str,
    /// License tier.
    #[serde(rename = "type")]
    pub license_type: LicenseType,
    /// Subscription level.
    pub subscription_type: SubscriptionType,
    /// First valid day.
    pub issue_date: NaiveDate,
    /// Last valid day.
    pub expiry_date: NaiveDate,
    /// Node limit.
    pub max_nodes: MaxNodes,
    /// Licensee, encoded as `null` when absent.
    pub issued_to: Option<&'a str>,
    /// Issuer, encoded as `null` when absent.
    pub issuer: Option<&'a str>,
}

impl<'a> CanonicalLicense<'a> {
    /// Build the view for a spec that has been assigned `uid`.
    #[must_use]
    pub fn from_spec(spec: &'a LicenseSpec, uid: &'a str, scheme: SignatureScheme) -> Self {
        Self {
            version: scheme.version(),
            hash_algorithm: scheme.hash_algorithm(),
            uid,
            feature: &spec.feature,
            license_type: spec.license_type,
            subscription_type: spec.subscription_type,
            issue_date: spec.issue_date,
            expiry_date: spec.expiry_date,
            max_nodes: spec.max_nodes,
            issued_to: spec.issued_to.as_deref(),
            issuer: spec.issuer.as_deref(),
        }
    }

    /// Encode the view as canonical bytes.
    pub fn encode(&self) -> Result<CanonicalBytes, serde_json::Error> {
        serde_json::to_vec(self).map(CanonicalBytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::parse_specs;

    const ORDERED: &str = r#"{"feature": "search", "type": "platinum", "subscription_type": "gold",
        "issue_date": "2024-01-01", "expiry_date": "2025-01-01", "max_nodes": 10}"#;
    const SHUFFLED: &str = r#"{"max_nodes": 10, "expiry_date": "2025-01-01", "subscription_type": "gold",
        "type": "platinum", "issue_date": "2024-01-01", "feature": "search"}"#;

    fn encode(raw: &str, uid: &str) -> CanonicalBytes {
        let spec = parse_specs(raw.as_bytes()).expect("spec").remove(0);
        CanonicalLicense::from_spec(&spec, uid, SignatureScheme::Ed25519Sha256)
            .encode()
            .expect("encode")
    }

    #[test]
    fn field_order_is_fixed_by_schema() {
        let bytes = encode(ORDERED, "uid-1");
        assert_eq!(
            std::str::from_utf8(bytes.as_bytes()).unwrap(),
            r#"{"version":2,"hash_algorithm":"sha256","uid":"uid-1","feature":"search","type":"platinum","subscription_type":"gold","issue_date":"2024-01-01","expiry_date":"2025-01-01","max_nodes":10,"issued_to":null,"issuer":null}"#
        );
    }

    #[test]
    fn input_order_does_not_change_encoding() {
        assert_eq!(encode(ORDERED, "uid-1"), encode(SHUFFLED, "uid-1"));
        assert_eq!(encode(ORDERED, "uid-1"), encode(ORDERED, "uid-1"));
    }

    #[test]
    fn uid_and_scheme_are_covered() {
        assert_ne!(encode(ORDERED, "uid-1"), encode(ORDERED, "uid-2"));

        let spec = parse_specs(ORDERED.as_bytes()).unwrap().remove(0);
        let v1 = CanonicalLicense::from_spec(&spec, "uid-1", SignatureScheme::Ed25519)
            .encode()
            .unwrap();
        assert_ne!(v1, encode(ORDERED, "uid-1"));
    }
}
