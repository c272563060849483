//! ---
//! lic_section: "01-license-core"
//! lic_subsection: "module"
//! lic_type: "source"
//! lic_scope: "code"
//! lic_description: "Unsigned license spec model and parser."
//! lic_version: "v0.1.0"
//! lic_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::error::LicenseError;

/// Wire value standing in for an unlimited node count.
pub const UNLIMITED_NODES: i64 = -1;

/// Key of the envelope object wrapping a batch of licenses.
pub(crate) const ENVELOPE_KEY: &str = "licenses";

/// Tier granted by a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    /// Time-boxed evaluation.
    Trial,
    /// Free tier.
    Basic,
    /// Standard commercial tier.
    Standard,
    /// Gold commercial tier.
    Gold,
    /// Platinum commercial tier.
    Platinum,
    /// Issuer-internal use.
    Internal,
}

impl LicenseType {
    /// Stable wire identifier.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseType::Trial => "trial",
            LicenseType::Basic => "basic",
            LicenseType::Standard => "standard",
            LicenseType::Gold => "gold",
            LicenseType::Platinum => "platinum",
            LicenseType::Internal => "internal",
        }
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription level the license was sold under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionType {
    /// No subscription attached; assumed when a spec omits the field.
    #[default]
    None,
    /// Development subscription.
    Development,
    /// Silver subscription.
    Silver,
    /// Gold subscription.
    Gold,
    /// Platinum subscription.
    Platinum,
}

impl SubscriptionType {
    /// Stable wire identifier.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionType::None => "none",
            SubscriptionType::Development => "development",
            SubscriptionType::Silver => "silver",
            SubscriptionType::Gold => "gold",
            SubscriptionType::Platinum => "platinum",
        }
    }
}

impl fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node limit carried by a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaxNodes {
    /// At most this many nodes (always positive).
    Limited(u32),
    /// No node limit.
    Unlimited,
}

impl MaxNodes {
    /// Construct a positive limit, rejecting zero.
    #[must_use]
    pub fn limited(nodes: u32) -> Option<Self> {
        (nodes > 0).then_some(MaxNodes::Limited(nodes))
    }

    /// Wire representation; unlimited maps to [`UNLIMITED_NODES`].
    #[must_use]
    pub fn to_wire(&self) -> i64 {
        match self {
            MaxNodes::Limited(nodes) => i64::from(*nodes),
            MaxNodes::Unlimited => UNLIMITED_NODES,
        }
    }
}

impl TryFrom<i64> for MaxNodes {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value == UNLIMITED_NODES {
            return Ok(MaxNodes::Unlimited);
        }
        u32::try_from(value)
            .ok()
            .and_then(MaxNodes::limited)
            .ok_or_else(|| {
                format!("max_nodes must be a positive integer or {UNLIMITED_NODES}, got {value}")
            })
    }
}

impl Serialize for MaxNodes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.to_wire())
    }
}

impl<'de> Deserialize<'de> for MaxNodes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        MaxNodes::try_from(raw).map_err(serde::de::Error::custom)
    }
}

/// Unsigned, user-authored description of one feature license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLicenseSpec")]
pub struct LicenseSpec {
    /// Issuer-assigned identifier; generated at signing time when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Feature name, case-sensitive, unique within a batch.
    pub feature: String,
    /// License tier.
    #[serde(rename = "type")]
    pub license_type: LicenseType,
    /// Subscription level.
    pub subscription_type: SubscriptionType,
    /// First day the license applies.
    pub issue_date: NaiveDate,
    /// Last day the license applies.
    pub expiry_date: NaiveDate,
    /// Node limit.
    pub max_nodes: MaxNodes,
    /// Licensee name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_to: Option<String>,
    /// Issuing party.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLicenseSpec {
    #[serde(default)]
    uid: Option<String>,
    feature: String,
    #[serde(rename = "type")]
    license_type: LicenseType,
    #[serde(default)]
    subscription_type: SubscriptionType,
    issue_date: NaiveDate,
    expiry_date: NaiveDate,
    max_nodes: MaxNodes,
    #[serde(default)]
    issued_to: Option<String>,
    #[serde(default)]
    issuer: Option<String>,
}

impl TryFrom<RawLicenseSpec> for LicenseSpec {
    type Error = String;

    fn try_from(raw: RawLicenseSpec) -> Result<Self, Self::Error> {
        let spec = LicenseSpec {
            uid: raw.uid,
            feature: raw.feature,
            license_type: raw.license_type,
            subscription_type: raw.subscription_type,
            issue_date: raw.issue_date,
            expiry_date: raw.expiry_date,
            max_nodes: raw.max_nodes,
            issued_to: raw.issued_to,
            issuer: raw.issuer,
        };
        spec.validate()?;
        Ok(spec)
    }
}

impl LicenseSpec {
    /// Check the field invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        validate_terms(
            &self.feature,
            self.uid.as_deref(),
            self.issue_date,
            self.expiry_date,
        )
    }
}

pub(crate) fn validate_terms(
    feature: &str,
    uid: Option<&str>,
    issue_date: NaiveDate,
    expiry_date: NaiveDate,
) -> Result<(), String> {
    if feature.trim().is_empty() {
        return Err("feature must be a non-empty string".to_owned());
    }
    if matches!(uid, Some(uid) if uid.trim().is_empty()) {
        return Err(format!("uid for feature '{feature}' must not be empty"));
    }
    if expiry_date < issue_date {
        return Err(format!(
            "expiry_date {expiry_date} precedes issue_date {issue_date} for feature '{feature}'"
        ));
    }
    Ok(())
}

#[derive(Deserialize)]
struct EnvelopeProbe<'a> {
    #[serde(default, borrow)]
    licenses: Option<&'a RawValue>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope<'a> {
    #[serde(borrow)]
    licenses: Vec<&'a RawValue>,
}

/// Split a document into its license objects.
///
/// Accepts a single object, a bare array, or a `{"licenses": [...]}` envelope.
/// Items stay as raw text so the typed decoder sees every key, including a
/// repeated one.
pub(crate) fn document_items(source: &[u8]) -> Result<Vec<&RawValue>, String> {
    let document: &RawValue =
        serde_json::from_slice(source).map_err(|err| format!("invalid JSON: {err}"))?;
    let text = document.get();
    match text.trim_start().as_bytes().first() {
        Some(b'[') => serde_json::from_str(text)
            .map_err(|err| format!("invalid license array: {err}")),
        Some(b'{') => {
            let probe: EnvelopeProbe = serde_json::from_str(text)
                .map_err(|err| format!("invalid license object: {err}"))?;
            if probe.licenses.is_none() {
                return Ok(vec![document]);
            }
            let envelope: Envelope = serde_json::from_str(text)
                .map_err(|err| format!("invalid '{ENVELOPE_KEY}' envelope: {err}"))?;
            Ok(envelope.licenses)
        }
        _ => Err("expected a license object or an array of licenses".to_owned()),
    }
}

/// Parse license specs from text holding a single spec or a batch.
///
/// Specs are returned in document order; uniqueness is enforced when they
/// are indexed or signed.
pub fn parse_specs(source: &[u8]) -> Result<Vec<LicenseSpec>, LicenseError> {
    let items = document_items(source).map_err(LicenseError::MalformedSpec)?;
    if items.is_empty() {
        return Err(LicenseError::MalformedSpec(
            "no license specs supplied".to_owned(),
        ));
    }
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_str::<LicenseSpec>(item.get()).map_err(|err| {
                LicenseError::MalformedSpec(format!("license spec #{}: {err}", index + 1))
            })
        })
        .collect()
}

/// Index specs by feature, rejecting any repeated feature name.
pub fn index_specs(
    specs: impl IntoIterator<Item = LicenseSpec>,
) -> Result<BTreeMap<String, LicenseSpec>, LicenseError> {
    let mut indexed = BTreeMap::new();
    for spec in specs {
        if indexed.contains_key(&spec.feature) {
            return Err(LicenseError::DuplicateFeature(spec.feature));
        }
        indexed.insert(spec.feature.clone(), spec);
    }
    Ok(indexed)
}
