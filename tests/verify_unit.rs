use podcast_billing::domain::verify::{decide, SignatureCheck, VerifyDecision};
use podcast_billing::razorpay::{sign_hmac_sha256_hex, verify_hmac_sha256_hex, RazorpayClient};

fn test_client() -> RazorpayClient {
    RazorpayClient::new(
        "rzp_test_key".to_string(),
        "checkout-secret".to_string(),
        "webhook-secret".to_string(),
    )
}

#[test]
fn checkout_signature_roundtrip() {
    let client = test_client();
    let signature =
        sign_hmac_sha256_hex("checkout-secret", b"order_Abc123|pay_Xyz789");

    assert!(client.verify_checkout_signature("order_Abc123", "pay_Xyz789", &signature));
}

#[test]
fn tampered_checkout_signature_is_rejected() {
    let client = test_client();
    let signature = sign_hmac_sha256_hex("checkout-secret", b"order_Abc123|pay_Xyz789");

    // another payment id under the same signature
    assert!(!client.verify_checkout_signature("order_Abc123", "pay_Other", &signature));
    // signature minted with the wrong secret
    let forged = sign_hmac_sha256_hex("guessed-secret", b"order_Abc123|pay_Xyz789");
    assert!(!client.verify_checkout_signature("order_Abc123", "pay_Xyz789", &forged));
    // not even hex
    assert!(!client.verify_checkout_signature("order_Abc123", "pay_Xyz789", "zz-not-hex"));
}

#[test]
fn webhook_signature_covers_the_raw_body() {
    let client = test_client();
    let body = br#"{"event":"payment.captured"}"#;
    let signature = sign_hmac_sha256_hex("webhook-secret", body);

    assert!(client.verify_webhook_signature(body, &signature));
    assert!(!client.verify_webhook_signature(br#"{"event":"payment.captured","x":1}"#, &signature));
}

#[test]
fn hmac_helper_rejects_truncated_signatures() {
    let signature = sign_hmac_sha256_hex("s", b"data");
    assert!(verify_hmac_sha256_hex("s", b"data", &signature));
    assert!(!verify_hmac_sha256_hex("s", b"data", &signature[..32]));
}

#[test]
fn duplicate_confirmation_applies_nothing() {
    // same gateway payment id delivered twice: second call is a no-op success
    assert_eq!(decide("pending", SignatureCheck::Valid), VerifyDecision::Apply);
    assert_eq!(
        decide("completed", SignatureCheck::Valid),
        VerifyDecision::AlreadyCompleted
    );
}

#[test]
fn signature_is_checked_before_idempotency() {
    // a forged retry against an already-completed payment is still a trust failure
    assert_eq!(
        decide("completed", SignatureCheck::Invalid),
        VerifyDecision::RejectSignature
    );
    assert_eq!(
        decide("pending", SignatureCheck::Invalid),
        VerifyDecision::RejectSignature
    );
}

#[test]
fn webhook_confirmations_skip_the_checkout_signature() {
    assert_eq!(
        decide("pending", SignatureCheck::SkippedVerifiedUpstream),
        VerifyDecision::Apply
    );
    assert_eq!(
        decide("completed", SignatureCheck::SkippedVerifiedUpstream),
        VerifyDecision::AlreadyCompleted
    );
}

#[test]
fn confirmations_cannot_resurrect_refunded_or_failed_payments() {
    assert_eq!(decide("refunded", SignatureCheck::Valid), VerifyDecision::RejectState);
    assert_eq!(decide("failed", SignatureCheck::Valid), VerifyDecision::RejectState);
    // authorized charges may still complete
    assert_eq!(decide("authorized", SignatureCheck::Valid), VerifyDecision::Apply);
}
