//! ---
//! lic_section: "04-testing-qa"
//! lic_subsection: "integration-tests"
//! lic_type: "source"
//! lic_scope: "code"
//! lic_description: "Integration tests for license signing, collections, and generation."
//! lic_version: "v0.1.0"
//! lic_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::fs;

use chrono::NaiveDate;
use licensor_core::{
    parse_specs, FileKeyStore, GenerationError, LicenseCollection, LicenseError, LicenseGenerator,
    LicenseSpec, LicenseType, MaxNodes, SignatureScheme, SigningKeyHandle, SubscriptionType,
};
use serde_json::Value;
use tempfile::tempdir;

const PRIVATE: [u8; 32] = [7u8; 32];
const OTHER_PRIVATE: [u8; 32] = [9u8; 32];

fn public_of(seed: &[u8; 32]) -> Vec<u8> {
    SigningKeyHandle::from_bytes(seed)
        .unwrap()
        .verifying_key()
        .to_bytes()
        .to_vec()
}

fn date(text: &str) -> NaiveDate {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").unwrap()
}

fn spec(feature: &str) -> LicenseSpec {
    LicenseSpec {
        uid: None,
        feature: feature.to_owned(),
        license_type: LicenseType::Trial,
        subscription_type: SubscriptionType::None,
        issue_date: date("2024-06-01"),
        expiry_date: date("2024-07-01"),
        max_nodes: MaxNodes::Unlimited,
        issued_to: None,
        issuer: None,
    }
}

#[test]
fn search_license_signs_and_verifies_end_to_end() {
    let specs = parse_specs(
        br#"{"feature": "search", "type": "trial", "subscription_type": "none",
             "issue_date": "2024-06-01", "expiry_date": "2024-07-01", "max_nodes": -1}"#,
    )
    .unwrap();
    let collection = LicenseCollection::build(specs, &PRIVATE).unwrap();
    let blob = collection.serialize().unwrap();

    let document: Value = serde_json::from_str(&blob).unwrap();
    let license = &document["licenses"][0];
    assert_eq!(license["feature"], "search");
    assert_eq!(license["max_nodes"], -1);
    assert!(!license["uid"].as_str().unwrap().is_empty());

    let reparsed = LicenseCollection::parse(blob.as_bytes()).unwrap();
    let results = reparsed.verify_all(&public_of(&PRIVATE)).unwrap();
    assert_eq!(results.get("search"), Some(&true));
    assert_eq!(results.len(), 1);
}

#[test]
fn platinum_search_without_subscription_verifies() {
    let specs = parse_specs(
        br#"{"feature": "search", "type": "platinum",
             "issue_date": "2024-01-01", "expiry_date": "2025-01-01", "max_nodes": 10}"#,
    )
    .unwrap();
    let blob = LicenseCollection::build(specs, &PRIVATE)
        .unwrap()
        .serialize()
        .unwrap();

    let reparsed = LicenseCollection::parse(blob.as_bytes()).unwrap();
    assert_eq!(reparsed.len(), 1);
    let search = reparsed.get("search").unwrap();
    assert_eq!(search.license_type(), LicenseType::Platinum);
    assert_eq!(search.subscription_type(), SubscriptionType::None);
    assert_eq!(search.max_nodes(), MaxNodes::Limited(10));

    let results = reparsed.verify_all(&public_of(&PRIVATE)).unwrap();
    assert_eq!(results, BTreeMap::from([("search".to_owned(), true)]));
}

#[test]
fn repeated_keys_are_rejected_not_resolved() {
    let repeated = br#"{"feature": "search", "feature": "reports", "type": "trial",
        "issue_date": "2024-06-01", "expiry_date": "2024-07-01", "max_nodes": -1}"#;
    assert!(matches!(
        parse_specs(repeated),
        Err(LicenseError::MalformedSpec(_))
    ));

    let collection = LicenseCollection::build([spec("search")], &PRIVATE).unwrap();
    let blob = collection.serialize().unwrap();
    let doubled = blob.replacen(
        "\"feature\": \"search\"",
        "\"feature\": \"search\",\n      \"feature\": \"reports\"",
        1,
    );
    assert_ne!(doubled, blob);
    assert!(matches!(
        LicenseCollection::parse(doubled.as_bytes()),
        Err(LicenseError::MalformedCollection(_))
    ));
}

#[test]
fn every_feature_rejected_under_other_key() {
    let collection =
        LicenseCollection::build([spec("alpha"), spec("beta"), spec("gamma")], &PRIVATE).unwrap();
    let results = collection.verify_all(&public_of(&OTHER_PRIVATE)).unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.values().all(|valid| !valid));
}

#[test]
fn serialized_form_is_stable_across_reparse() {
    let mut custom = spec("reports");
    custom.max_nodes = MaxNodes::limited(12).unwrap();
    custom.issued_to = Some("Example Corp".to_owned());
    custom.issuer = Some("Licensing Desk".to_owned());
    let collection =
        LicenseCollection::build_with_scheme([custom, spec("search")], &PRIVATE, SignatureScheme::Ed25519)
            .unwrap();
    let blob = collection.serialize().unwrap();
    let reparsed = LicenseCollection::parse(blob.as_bytes()).unwrap();
    assert_eq!(reparsed, collection);
    assert_eq!(reparsed.serialize().unwrap(), blob);

    let reports = reparsed.get("reports").unwrap();
    assert_eq!(reports.max_nodes(), MaxNodes::Limited(12));
    assert_eq!(reports.issued_to(), Some("Example Corp"));
    assert_eq!(reports.scheme(), SignatureScheme::Ed25519);
}

#[test]
fn tampered_field_fails_only_that_feature() {
    let collection =
        LicenseCollection::build([spec("search"), spec("reports")], &PRIVATE).unwrap();
    let mut document: Value = serde_json::from_str(&collection.serialize().unwrap()).unwrap();
    let licenses = document["licenses"].as_array_mut().unwrap();
    let search = licenses
        .iter_mut()
        .find(|license| license["feature"] == "search")
        .unwrap();
    search["expiry_date"] = Value::from("2030-01-01");

    let tampered = LicenseCollection::parse(document.to_string().as_bytes()).unwrap();
    let results = tampered.verify_all(&public_of(&PRIVATE)).unwrap();
    assert_eq!(results.get("search"), Some(&false));
    assert_eq!(results.get("reports"), Some(&true));
}

#[test]
fn duplicate_features_fail_the_whole_batch() {
    let err = LicenseCollection::build([spec("search"), spec("search")], &PRIVATE).unwrap_err();
    assert!(matches!(err, LicenseError::DuplicateFeature(feature) if feature == "search"));
}

#[test]
fn explicit_uid_survives_and_resigning_is_deterministic() {
    let mut fixed = spec("search");
    fixed.uid = Some("7d6f0a4e-uid".to_owned());
    let first = LicenseCollection::build([fixed.clone()], &PRIVATE).unwrap();
    let second = LicenseCollection::build([fixed], &PRIVATE).unwrap();
    assert_eq!(first.serialize().unwrap(), second.serialize().unwrap());
    assert_eq!(first.get("search").unwrap().uid(), "7d6f0a4e-uid");
}

#[test]
fn malformed_inputs_are_rejected() {
    assert!(matches!(
        parse_specs(b"not json"),
        Err(LicenseError::MalformedSpec(_))
    ));
    assert!(matches!(
        parse_specs(br#"{"feature": "x", "type": "trial"}"#),
        Err(LicenseError::MalformedSpec(_))
    ));
    assert!(matches!(
        LicenseCollection::parse(br#"{"licenses": [{"feature": "x"}]}"#),
        Err(LicenseError::MalformedCollection(_))
    ));
    assert!(matches!(
        LicenseCollection::build([spec("search")], b"short"),
        Err(LicenseError::Signing(_))
    ));
    assert!(LicenseCollection::build([spec("search")], &PRIVATE)
        .unwrap()
        .verify_all(b"short")
        .is_err());
}

#[test]
fn generator_reads_keys_from_disk() {
    let dir = tempdir().unwrap();
    let private = dir.path().join("private.key");
    let public = dir.path().join("public.key");
    fs::write(&private, PRIVATE).unwrap();
    fs::write(&public, format!("{}\n", hex::encode(public_of(&PRIVATE)))).unwrap();

    let generator = LicenseGenerator::new(FileKeyStore);
    let blob = generator
        .generate(
            &[r#"[{"feature": "search", "type": "gold", "subscription_type": "gold",
                   "issue_date": "2024-01-01", "expiry_date": "2025-01-01", "max_nodes": 5}]"#],
            &private,
            &public,
        )
        .unwrap();
    let collection = LicenseCollection::parse(blob.as_bytes()).unwrap();
    assert_eq!(collection.get("search").unwrap().license_type(), LicenseType::Gold);

    let err = generator
        .generate(&[r#"{"feature": "x"}"#], &dir.path().join("absent.key"), &public)
        .unwrap_err();
    assert!(matches!(err, GenerationError::License(LicenseError::MalformedSpec(_))));
}
