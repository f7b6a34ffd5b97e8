//! End-to-end authentication round trip: enroll real factor captures,
//! open a verification session, re-perform the factors device-side and
//! submit their digest candidates until the session decides.
//!
//! Run with:
//!   cargo test -p veilpay-verify --test round_trip

use std::sync::Arc;

use veilpay_core::{AuthError, Config, ConsentFlags, FallbackStrategy, FactorKind};
use veilpay_enroll::{EnrollmentRequest, EnrollmentService, TrustingAttestation};
use veilpay_factors::{
    verification_candidates, BalanceSample, FactorInput, ProcessorPolicy, TapPoint,
};
use veilpay_gateway::{
    IntegrationEngine, LogAlert, MemoryApi, MemoryStore, RemoteApi,
};
use veilpay_risk::{FraudDetector, RateLimiter};
use veilpay_verify::{CreateSessionRequest, SubmitProgress, VerificationService};

const NOW: i64 = 1_700_000_000_000;

// ── Fixture ───────────────────────────────────────────────────────────────────

struct Stack {
    enroll: EnrollmentService,
    verify: VerificationService,
    policy: ProcessorPolicy,
}

fn config() -> Config {
    Config {
        fallback_strategy: FallbackStrategy::ApiFirstCacheFallback,
        max_retries: 0,
        initial_retry_delay_ms: 1,
        max_retry_delay_ms: 5,
        api_timeout_ms: 500,
        ..Config::default()
    }
}

fn stack() -> Stack {
    let config = config();
    let api = Arc::new(MemoryApi::new());
    let engine = Arc::new(IntegrationEngine::new(
        Arc::clone(&api) as Arc<dyn RemoteApi>,
        &config,
    ));
    let enroll = EnrollmentService::new(
        config.clone(),
        Arc::new(TrustingAttestation),
        Arc::new(RateLimiter::new()),
        Arc::clone(&engine),
        Arc::new(MemoryStore::new()),
    );
    let verify = VerificationService::new(
        config.clone(),
        engine,
        Arc::new(FraudDetector::from_config(&config)),
        Arc::new(RateLimiter::new()),
        Arc::new(LogAlert),
    );
    Stack { enroll, verify, policy: ProcessorPolicy::from_config(&config) }
}

/// The captures a user would perform, shared between enrollment and
/// re-verification.
fn captures(policy: &ProcessorPolicy) -> Vec<FactorInput> {
    vec![
        FactorInput::Pin { digits: "123456".into() },
        FactorInput::Colour { indices: vec![2, 8, 11] },
        FactorInput::Emoji { indices: vec![4, 19, 33] },
        FactorInput::RhythmTap { taps_ms: vec![0, 300, 700, 900, 1200], nonce: 42 },
        FactorInput::ImageTap {
            image_id: "postcard-7".into(),
            taps: vec![TapPoint { x: 0.22, y: 0.61 }, TapPoint { x: 0.74, y: 0.35 }],
        },
        FactorInput::Nfc { uid: vec![0x04, 0x9A, 0x33, 0x21, 0x57] },
        FactorInput::Balance {
            samples: vec![BalanceSample { x: 14, y: -812, z: 9790 }; policy.balance_sample_count],
        },
    ]
}

fn enrollment_request(factors: Vec<FactorInput>) -> EnrollmentRequest {
    EnrollmentRequest {
        factors,
        consent: ConsentFlags::granted(),
        alias: Some("daily phone".into()),
        device_fingerprint: Some("device-fp-1".into()),
        ip: Some("203.0.113.4".into()),
    }
}

fn session_request(user_id: &str) -> CreateSessionRequest {
    CreateSessionRequest {
        user_id: user_id.into(),
        merchant_id: "coffee-bar-12".into(),
        amount: 480,
        currency: "EUR".into(),
        device_fingerprint: Some("device-fp-1".into()),
        ip: Some("203.0.113.4".into()),
        location: None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn enroll_then_verify_with_same_captures() {
    let stack = stack();
    let user = stack
        .enroll
        .enroll(enrollment_request(captures(&stack.policy)), NOW)
        .await
        .unwrap();

    let info = stack.verify.create_session(session_request(&user.user_id), NOW + 60_000).await.unwrap();
    assert_eq!(info.required_factors.len(), 7);

    let mut decided = None;
    for (i, input) in captures(&stack.policy).iter().enumerate() {
        let candidates = verification_candidates(input, &stack.policy).unwrap();
        let progress = stack
            .verify
            .submit_factor(&info.session_id, input.kind(), candidates, NOW + 61_000 + i as i64)
            .unwrap();
        decided = Some(progress);
    }

    match decided.unwrap() {
        SubmitProgress::Decided(outcome) => {
            assert!(outcome.verified);
            let proof = outcome.proof.expect("success carries a proof");
            assert_eq!(proof.version, 1);
            assert_eq!(proof.session_id, info.session_id);
        }
        other => panic!("expected a decision, got {other:?}"),
    }
}

#[tokio::test]
async fn wrong_pin_and_wrong_colour_fail_identically() {
    let stack = stack();
    let user = stack
        .enroll
        .enroll(enrollment_request(captures(&stack.policy)), NOW)
        .await
        .unwrap();

    // Two sessions, two different wrong factors; the terminal sees one
    // and the same opaque failure.
    let s1 = stack.verify.create_session(session_request(&user.user_id), NOW + 1_000).await.unwrap();
    let wrong_pin = FactorInput::Pin { digits: "123457".into() };
    let e1 = stack
        .verify
        .submit_factor(
            &s1.session_id,
            FactorKind::Pin,
            verification_candidates(&wrong_pin, &stack.policy).unwrap(),
            NOW + 2_000,
        )
        .unwrap_err();

    let s2 = stack.verify.create_session(session_request(&user.user_id), NOW + 3_000).await.unwrap();
    let wrong_colour = FactorInput::Colour { indices: vec![1, 5, 9] };
    let e2 = stack
        .verify
        .submit_factor(
            &s2.session_id,
            FactorKind::Colour,
            verification_candidates(&wrong_colour, &stack.policy).unwrap(),
            NOW + 4_000,
        )
        .unwrap_err();

    assert!(matches!(e1, AuthError::VerificationFailed));
    assert!(matches!(e2, AuthError::VerificationFailed));
    assert_eq!(e1.to_string(), e2.to_string());
}

#[tokio::test]
async fn rhythm_verifies_at_a_different_tempo() {
    let stack = stack();
    let user = stack
        .enroll
        .enroll(enrollment_request(captures(&stack.policy)), NOW)
        .await
        .unwrap();
    let info = stack.verify.create_session(session_request(&user.user_id), NOW + 1_000).await.unwrap();

    // Same rhythm, tapped at half speed: scale-invariant normalization
    // must still match the enrolled digest.
    let halved = FactorInput::RhythmTap { taps_ms: vec![0, 150, 350, 450, 600], nonce: 42 };
    let progress = stack
        .verify
        .submit_factor(
            &info.session_id,
            FactorKind::RhythmTap,
            verification_candidates(&halved, &stack.policy).unwrap(),
            NOW + 2_000,
        )
        .unwrap();
    assert!(matches!(progress, SubmitProgress::AwaitingMore { .. }));
}

#[tokio::test]
async fn image_retap_one_cell_off_still_matches() {
    let stack = stack();
    let user = stack
        .enroll
        .enroll(enrollment_request(captures(&stack.policy)), NOW)
        .await
        .unwrap();
    let info = stack.verify.create_session(session_request(&user.user_id), NOW + 1_000).await.unwrap();

    // Re-tap slightly off: still inside the fuzzy radius.
    let retap = FactorInput::ImageTap {
        image_id: "postcard-7".into(),
        taps: vec![TapPoint { x: 0.19, y: 0.63 }, TapPoint { x: 0.76, y: 0.33 }],
    };
    let progress = stack
        .verify
        .submit_factor(
            &info.session_id,
            FactorKind::ImageTap,
            verification_candidates(&retap, &stack.policy).unwrap(),
            NOW + 2_000,
        )
        .unwrap();
    assert!(matches!(progress, SubmitProgress::AwaitingMore { .. }));
}

#[tokio::test]
async fn deleted_user_can_no_longer_verify() {
    let stack = stack();
    let user = stack
        .enroll
        .enroll(enrollment_request(captures(&stack.policy)), NOW)
        .await
        .unwrap();

    stack.enroll.delete(&user.user_id).await.unwrap();
    let err = stack
        .verify
        .create_session(session_request(&user.user_id), NOW + 1_000)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotEnrolled));
}
