//! ---
//! lic_section: "01-license-core"
//! lic_subsection: "module"
//! lic_type: "source"
//! lic_scope: "code"
//! lic_description: "Counters and log events for license signing and verification."
//! lic_version: "v0.1.0"
//! lic_owner: "tbd"
//! ---
use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};
use tracing::{debug, info, warn};

use crate::collection::SignedLicense;
use crate::error::VerificationError;

static LICENSES_SIGNED_TOTAL: Lazy<Option<IntCounter>> = Lazy::new(|| {
    register_int_counter!(
        "licenses_signed_total",
        "Total number of licenses signed"
    )
    .ok()
});

static LICENSE_VERIFICATIONS_TOTAL: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
    register_int_counter_vec!(
        "license_verifications_total",
        "License verifications by outcome",
        &["outcome"]
    )
    .ok()
});

static LICENSE_REJECTIONS_TOTAL: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
    register_int_counter_vec!(
        "license_rejections_total",
        "Rejected license inputs by reason",
        &["reason"]
    )
    .ok()
});

/// Record a freshly signed license.
pub fn record_license_signed(license: &SignedLicense) {
    if let Some(counter) = LICENSES_SIGNED_TOTAL.as_ref() {
        counter.inc();
    }
    info!(
        feature = %license.feature(),
        uid = %license.uid(),
        scheme = %license.scheme(),
        "license signed"
    );
}

/// Record the outcome of verifying one license.
pub fn record_verification(feature: &str, outcome: Result<(), &VerificationError>) {
    let label = match outcome {
        Ok(()) => "accepted",
        Err(err) => err.reason(),
    };
    if let Some(counter) = LICENSE_VERIFICATIONS_TOTAL.as_ref() {
        counter.with_label_values(&[label]).inc();
    }
    match outcome {
        Ok(()) => debug!(feature = %feature, "license signature verified"),
        Err(err) => warn!(feature = %feature, reason = label, error = %err, "license rejected"),
    }
}

/// Record input rejected before any signing or verification happened.
pub fn record_rejection(reason: &str) {
    if let Some(counter) = LICENSE_REJECTIONS_TOTAL.as_ref() {
        counter.with_label_values(&[reason]).inc();
    }
    info!(reason = reason, "license input rejected");
}

/// Current value of the signed-license counter.
#[must_use]
pub fn licenses_signed() -> u64 {
    LICENSES_SIGNED_TOTAL
        .as_ref()
        .map(IntCounter::get)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{SignatureScheme, SigningKeyHandle};
    use crate::spec::parse_specs;

    #[test]
    fn rejection_counter_increments() {
        record_rejection("test_reason");
        let counter = LICENSE_REJECTIONS_TOTAL
            .as_ref()
            .expect("counter registered");
        assert!(counter.with_label_values(&["test_reason"]).get() >= 1);
    }

    #[test]
    fn signing_advances_signed_counter() {
        let spec = parse_specs(
            br#"{"feature": "telemetry", "type": "basic", "issue_date": "2024-01-01",
                "expiry_date": "2024-02-01", "max_nodes": 1}"#,
        )
        .unwrap()
        .remove(0);
        let key = SigningKeyHandle::from_bytes(&[7u8; 32]).unwrap();
        let before = licenses_signed();
        SignedLicense::sign(&spec, SignatureScheme::default(), &key).unwrap();
        assert!(licenses_signed() > before);
    }
}
