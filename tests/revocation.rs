//! Revocation dominates otherwise-valid credentials.

use warden::{AccessRequest, AccessType, AuditEventKind, Clock, Operation, Role, Severity};

#[path = "common/mod.rs"]
mod common;
use common::*;

fn token_from(url: &str) -> String {
    url.split("token=").nth(1).unwrap().to_string()
}

#[tokio::test]
async fn revoked_token_is_denied_while_still_cryptographically_valid() {
    let clock = Clock::fixed(1_700_000_000);
    let (validator, sink) = build_validator(&[("admin", Role::Admin)], clock.clone());

    let url = validator
        .generate_secure_url(
            "admin",
            "rep-1",
            AccessType::View,
            "https://x.test",
            24,
            None,
            None,
        )
        .await
        .unwrap();
    let token = token_from(&url);

    // Before revocation the token-bearing request passes.
    let mut request = AccessRequest::new("admin", "rep-1", Operation::View);
    request.token = Some(token.clone());
    assert!(validator.validate_access_request(&request).await.valid);

    assert!(validator.revoke_access(&token, "customer dispute", Some("admin")));
    assert!(validator.is_access_revoked(&token));

    // Signature and expiry are still individually fine, yet access denies.
    assert!(validator.signer().validate(&token).is_ok());
    let result = validator.validate_access_request(&request).await;
    assert!(!result.valid);

    let last = sink.recent(1);
    assert_eq!(last[0].kind, AuditEventKind::SecurityViolation);
    assert_eq!(last[0].severity, Severity::Critical);
}

#[tokio::test]
async fn revoking_twice_reports_not_newly_revoked() {
    let (validator, _sink) = build_validator(&[("admin", Role::Admin)], Clock::fixed(1_700_000_000));
    assert!(validator.revoke_access("tok-x", "abuse", None));
    assert!(!validator.revoke_access("tok-x", "abuse again", None));
    assert!(validator.is_access_revoked("tok-x"));
}

#[tokio::test]
async fn revoked_user_is_denied_regardless_of_credentials() {
    let clock = Clock::fixed(1_700_000_000);
    let (validator, sink) = build_validator(&[("u1", Role::Customer)], clock);

    validator.access_control().revoke_user("u1");

    let mut request = AccessRequest::new("u1", "rep-1", Operation::View);
    request.resource_owner_id = Some("u1".to_string());
    let result = validator.validate_access_request(&request).await;

    assert!(!result.valid);
    assert_eq!(sink.recent(1)[0].kind, AuditEventKind::SecurityViolation);
}

#[tokio::test]
async fn revocation_sweep_keeps_recent_entries() {
    let clock = Clock::fixed(1_700_000_000);
    let (validator, _sink) = build_validator(&[("admin", Role::Admin)], clock.clone());

    validator.revoke_access("tok-old", "stale", None);
    clock.advance(10 * 86_400);
    validator.revoke_access("tok-new", "fresh", None);

    // tok-old sits in both the validator-local and access-control stores.
    let removed = validator.cleanup_expired_revocations(7);
    assert_eq!(removed, 2);
    assert!(!validator.is_access_revoked("tok-old"));
    assert!(validator.is_access_revoked("tok-new"));
}

#[tokio::test]
async fn audit_trail_records_the_revocation() {
    let (validator, sink) = build_validator(&[("admin", Role::Admin)], Clock::fixed(1_700_000_000));
    validator.revoke_access("tok-1", "abuse", Some("admin"));

    let events = sink.recent(4);
    let revoked = events
        .iter()
        .find(|e| e.kind == AuditEventKind::TokenRevoked)
        .expect("token revocation audited");
    assert_eq!(revoked.severity, Severity::Medium);
    assert_eq!(revoked.user_id, "admin");
    assert_eq!(revoked.additional_data["reason"], "abuse");
}
