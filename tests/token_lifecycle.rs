//! Capability-link lifecycle: issue, validate repeatedly, expire, cap.

use warden::{AccessRequest, AccessType, Clock, Operation, Role, WardenError};

#[path = "common/mod.rs"]
mod common;
use common::*;

fn token_from(url: &str) -> String {
    url.split("token=").nth(1).unwrap().to_string()
}

#[tokio::test]
async fn generated_url_validates_until_expiry() -> anyhow::Result<()> {
    let clock = Clock::fixed(1_700_000_000);
    let (validator, _sink) = build_validator(&[("admin", Role::Admin)], clock.clone());

    let url = validator
        .generate_secure_url(
            "admin",
            "rep-7",
            AccessType::Download,
            "https://reports.example.com/dl",
            48,
            Some("203.0.113.9"),
            Some("ua/1.0"),
        )
        .await?;
    let token = token_from(&url);

    let payload = validator.signer().validate(&token)?;
    assert_eq!(payload.report_id, "rep-7");
    assert_eq!(payload.user_id, "admin");
    assert_eq!(payload.access_type, AccessType::Download);
    assert_eq!(payload.expires_at, 1_700_000_000 + 48 * 3_600);

    // Repeated validation of the same live token yields the same payload.
    assert_eq!(validator.signer().validate(&token)?, payload);

    // The token keeps working through the validator until the clock passes
    // its lifetime, then turns into a denial.
    let mut request = AccessRequest::new("admin", "rep-7", Operation::Download);
    request.token = Some(token.clone());
    assert!(validator.validate_access_request(&request).await.valid);

    clock.advance(48 * 3_600 + 1);
    assert!(matches!(
        validator.signer().validate(&token),
        Err(WardenError::ExpiredToken)
    ));
    let result = validator.validate_access_request(&request).await;
    assert!(!result.valid);
    assert_eq!(
        result.error_message.as_deref(),
        Some("Access link has expired")
    );
    Ok(())
}

#[tokio::test]
async fn lifetime_above_the_cap_is_a_caller_error() {
    let (validator, _sink) =
        build_validator(&[("admin", Role::Admin)], Clock::fixed(1_700_000_000));

    // 31 days expressed in hours.
    let err = validator
        .generate_secure_url(
            "admin",
            "rep-1",
            AccessType::View,
            "https://x.test",
            31 * 24,
            None,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::Validation(_)));

    // Exactly the cap still mints.
    assert!(validator
        .generate_secure_url(
            "admin",
            "rep-1",
            AccessType::View,
            "https://x.test",
            30 * 24,
            None,
            None,
        )
        .await
        .is_ok());
}

#[tokio::test]
async fn customers_cannot_mint_links() {
    let (validator, _sink) =
        build_validator(&[("u1", Role::Customer)], Clock::fixed(1_700_000_000));

    let err = validator
        .generate_secure_url(
            "u1",
            "rep-1",
            AccessType::View,
            "https://x.test",
            24,
            None,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::PermissionDenied(_)));
}

#[tokio::test]
async fn tracking_links_are_tamper_evident() {
    let (validator, _sink) =
        build_validator(&[("admin", Role::Admin)], Clock::fixed(1_700_000_000));
    let signer = validator.signer();

    let signed = signer
        .sign_tracking_params(
            "https://example.com/open?src=mail",
            "u1",
            "launch-week",
            "banner",
        )
        .unwrap();
    assert!(signer.verify_tracking_params(&signed));
    assert!(!signer.verify_tracking_params(&signed.replace("banner", "footer")));
}
