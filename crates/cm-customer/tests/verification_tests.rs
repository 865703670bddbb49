//! Verification Tests
//!
//! Activation through the email link and the headless OTP path:
//! - exactly one accesskey and one `customer_created` per customer
//! - attempt limiting on the OTP path
//! - lock release on every exit
//! - partial-failure behaviour of each path

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use cm_customer::customer::operations::{CompleteSignupCommand, EmailVerifyCommand, SignupCommand};
use cm_customer::{CustomerError, EventType, SessionStore, WebhookMethod};
use common::{otp_from_email, token_from_email, Harness};

fn verify(token: &str) -> EmailVerifyCommand {
    EmailVerifyCommand {
        token: token.to_string(),
    }
}

fn complete(temp_token: &str, code: &str) -> CompleteSignupCommand {
    CompleteSignupCommand {
        temp_token: temp_token.to_string(),
        code: code.to_string(),
    }
}

// ============================================================================
// EmailVerify
// ============================================================================

#[tokio::test]
async fn test_email_verify_activates_once() {
    let h = Harness::new();
    let customer = h.seed_customer("jane@x.com");
    let token = h.seed_session(&customer, "tmp", "111111").await;

    let result = h.service.email_verify(verify(&token)).await.unwrap();

    assert!(result.customer.email_verified);
    let key = result.accesskey.expect("accesskey issued");
    assert_eq!(key.customer_id(), customer.id);
    assert_eq!(key.accesskey.name, "default");
    assert_eq!(key.accesskey.detail, "Auto-provisioned API key");

    let events = h.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::CustomerCreated);
    assert!(!events[0].headless);
    assert!(events[0].customer.email_verified);

    assert!(!h.sessions.inner.is_locked(customer.id));
}

#[tokio::test]
async fn test_consumed_token_is_rejected() {
    let h = Harness::new();
    let customer = h.seed_customer("jane@x.com");
    let token = h.seed_session(&customer, "tmp", "111111").await;

    h.service.email_verify(verify(&token)).await.unwrap();
    let err = h.service.email_verify(verify(&token)).await.unwrap_err();

    assert!(matches!(err, CustomerError::NotFound { .. }));
    assert_eq!(err.to_string(), "verification token expired or invalid");
    assert_eq!(h.accesskey_count(customer.id).await, 1);
}

#[tokio::test]
async fn test_repeat_verify_before_token_deletion_is_idempotent() {
    let h = Harness::new();
    h.sessions.fail_token_delete.store(true, Ordering::SeqCst);
    let customer = h.seed_customer("jane@x.com");
    let token = h.seed_session(&customer, "tmp", "111111").await;

    let first = h.service.email_verify(verify(&token)).await.unwrap();
    let second = h.service.email_verify(verify(&token)).await.unwrap();

    assert!(first.accesskey.is_some());
    assert!(second.accesskey.is_none());
    assert!(second.customer.email_verified);
    assert_eq!(h.accesskey_count(customer.id).await, 1);
    assert_eq!(h.notifier.count(EventType::CustomerCreated), 1);
}

#[tokio::test]
async fn test_concurrent_email_verify_provisions_once() {
    let h = Harness::new();
    h.sessions.fail_token_delete.store(true, Ordering::SeqCst);
    let customer = h.seed_customer("jane@x.com");
    let token = h.seed_session(&customer, "tmp", "111111").await;

    let (a, b) = tokio::join!(
        h.service.email_verify(verify(&token)),
        h.service.email_verify(verify(&token)),
    );

    for result in [&a, &b] {
        match result {
            Ok(_) => {}
            Err(e) => assert!(matches!(e, CustomerError::Conflict { .. })),
        }
    }
    assert_eq!(h.accesskey_count(customer.id).await, 1);
    assert_eq!(h.notifier.count(EventType::CustomerCreated), 1);
}

#[tokio::test]
async fn test_busy_lock_is_a_conflict() {
    let h = Harness::new();
    let customer = h.seed_customer("jane@x.com");
    let token = h.seed_session(&customer, "tmp", "111111").await;
    let held = h
        .sessions
        .verify_lock_acquire(customer.id, Duration::from_secs(30))
        .await
        .unwrap();
    assert!(held.is_some());

    let err = h.service.email_verify(verify(&token)).await.unwrap_err();

    assert!(matches!(err, CustomerError::Conflict { .. }));
    assert!(err.is_retryable());
    assert!(!h.customer(customer.id).await.email_verified);
    assert!(h.sessions.inner.is_locked(customer.id));
}

#[tokio::test]
async fn test_email_verify_persist_failure_keeps_token() {
    let h = Harness::new();
    h.customers.fail_update.store(true, Ordering::SeqCst);
    let customer = h.seed_customer("jane@x.com");
    let token = h.seed_session(&customer, "tmp", "111111").await;

    let err = h.service.email_verify(verify(&token)).await.unwrap_err();

    assert_eq!(err.to_string(), "could not verify customer");
    assert_eq!(
        h.sessions.email_verify_token_get(&token).await.unwrap(),
        Some(customer.id)
    );
    assert!(!h.sessions.inner.is_locked(customer.id));
    assert!(h.notifier.events().is_empty());
}

#[tokio::test]
async fn test_email_verify_provisioning_failure_is_not_fatal() {
    let h = Harness::new();
    h.provisioner.fail.store(true, Ordering::SeqCst);
    let customer = h.seed_customer("jane@x.com");
    let token = h.seed_session(&customer, "tmp", "111111").await;

    let result = h.service.email_verify(verify(&token)).await.unwrap();

    assert!(result.customer.email_verified);
    assert!(result.accesskey.is_none());
    assert_eq!(h.notifier.count(EventType::CustomerCreated), 1);
}

#[tokio::test]
async fn test_email_verify_refetch_failure_skips_event() {
    let h = Harness::new();
    h.customers.fail_reads_after_update.store(true, Ordering::SeqCst);
    let customer = h.seed_customer("jane@x.com");
    let token = h.seed_session(&customer, "tmp", "111111").await;

    let err = h.service.email_verify(verify(&token)).await.unwrap_err();

    assert_eq!(err.to_string(), "could not get verified customer");
    assert!(h.notifier.events().is_empty());
    assert!(!h.sessions.inner.is_locked(customer.id));
}

// ============================================================================
// CompleteSignup
// ============================================================================

#[tokio::test]
async fn test_complete_signup_activates_and_cleans_up() {
    let h = Harness::new();
    let customer = h.seed_customer("jane@x.com");
    let token = h.seed_session(&customer, "tmp_boundary", "654321").await;

    let result = h
        .service
        .complete_signup(complete("tmp_boundary", "654321"))
        .await
        .unwrap();

    assert_eq!(result.customer_id, customer.id);
    assert!(result.accesskey.is_some());
    assert!(h.customer(customer.id).await.email_verified);

    let events = h.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::CustomerCreated);
    assert!(events[0].headless);

    assert!(h.sessions.signup_session_get("tmp_boundary").await.unwrap().is_none());
    assert!(h.sessions.email_verify_token_get(&token).await.unwrap().is_none());
    assert_eq!(h.sessions.inner.attempts("tmp_boundary"), 0);
    assert!(!h.sessions.inner.is_locked(customer.id));
}

#[tokio::test]
async fn test_fifth_attempt_succeeds() {
    let h = Harness::new();
    let customer = h.seed_customer("jane@x.com");
    h.seed_session(&customer, "tmp", "654321").await;

    for _ in 0..4 {
        let err = h
            .service
            .complete_signup(complete("tmp", "000000"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid verification code");
    }

    let result = h.service.complete_signup(complete("tmp", "654321")).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_sixth_attempt_is_rate_limited() {
    let h = Harness::new();
    let customer = h.seed_customer("jane@x.com");
    h.seed_session(&customer, "tmp", "654321").await;

    for _ in 0..5 {
        h.service
            .complete_signup(complete("tmp", "000000"))
            .await
            .unwrap_err();
    }

    let err = h
        .service
        .complete_signup(complete("tmp", "654321"))
        .await
        .unwrap_err();
    assert!(matches!(err, CustomerError::RateLimited { .. }));
    assert_eq!(err.http_status_code(), 429);
    assert!(!h.customer(customer.id).await.email_verified);
}

#[tokio::test]
async fn test_wrong_code_keeps_session() {
    let h = Harness::new();
    let customer = h.seed_customer("jane@x.com");
    h.seed_session(&customer, "tmp", "654321").await;

    h.service
        .complete_signup(complete("tmp", "123456"))
        .await
        .unwrap_err();

    assert!(h.sessions.signup_session_get("tmp").await.unwrap().is_some());
    assert_eq!(h.sessions.inner.attempts("tmp"), 1);
    assert!(!h.sessions.inner.is_locked(customer.id));
}

#[tokio::test]
async fn test_unknown_temp_token() {
    let h = Harness::new();

    let err = h
        .service
        .complete_signup(complete("missing", "123456"))
        .await
        .unwrap_err();
    assert!(matches!(err, CustomerError::NotFound { .. }));
    assert_eq!(err.to_string(), "invalid or expired temp_token");
}

#[tokio::test]
async fn test_counter_failure_is_internal() {
    let h = Harness::new();
    h.sessions.fail_increment.store(true, Ordering::SeqCst);

    let err = h
        .service
        .complete_signup(complete("tmp", "123456"))
        .await
        .unwrap_err();
    assert!(matches!(err, CustomerError::Internal { .. }));
}

#[tokio::test]
async fn test_complete_signup_provisioning_failure_is_fatal() {
    let h = Harness::new();
    h.provisioner.fail.store(true, Ordering::SeqCst);
    let customer = h.seed_customer("jane@x.com");
    let token = h.seed_session(&customer, "tmp", "654321").await;

    let err = h
        .service
        .complete_signup(complete("tmp", "654321"))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "could not create access key");
    assert!(h.sessions.signup_session_get("tmp").await.unwrap().is_some());
    assert!(h.sessions.email_verify_token_get(&token).await.unwrap().is_some());
    assert!(h.notifier.events().is_empty());
    assert!(!h.sessions.inner.is_locked(customer.id));
}

#[tokio::test]
async fn test_retry_after_provisioning_failure_issues_no_key() {
    let h = Harness::new();
    h.provisioner.fail.store(true, Ordering::SeqCst);
    let customer = h.seed_customer("jane@x.com");
    h.seed_session(&customer, "tmp", "654321").await;

    let err = h
        .service
        .complete_signup(complete("tmp", "654321"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "could not create access key");

    h.provisioner.fail.store(false, Ordering::SeqCst);
    let retry = h
        .service
        .complete_signup(complete("tmp", "654321"))
        .await
        .unwrap();

    assert_eq!(retry.customer_id, customer.id);
    assert!(retry.accesskey.is_none());
    assert_eq!(h.accesskey_count(customer.id).await, 0);
    assert!(h.notifier.events().is_empty());
    assert!(h.sessions.signup_session_get("tmp").await.unwrap().is_none());
}

#[tokio::test]
async fn test_complete_signup_after_email_verify_cleans_up() {
    let h = Harness::new();
    let customer = h.seed_customer("jane@x.com");
    let token = h.seed_session(&customer, "tmp", "654321").await;
    h.service.email_verify(verify(&token)).await.unwrap();

    let result = h
        .service
        .complete_signup(complete("tmp", "654321"))
        .await
        .unwrap();

    assert_eq!(result.customer_id, customer.id);
    assert!(result.accesskey.is_none());
    assert!(h.sessions.signup_session_get("tmp").await.unwrap().is_none());
    assert_eq!(h.accesskey_count(customer.id).await, 1);
    assert_eq!(h.notifier.count(EventType::CustomerCreated), 1);
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_signup_then_complete_with_emailed_code() {
    let h = Harness::new();
    let signup = h
        .service
        .signup(SignupCommand {
            name: "Jane".into(),
            detail: String::new(),
            email: "jane@x.com".into(),
            phone_number: String::new(),
            address: String::new(),
            webhook_method: WebhookMethod::None,
            webhook_uri: String::new(),
        })
        .await
        .unwrap();

    let email = &h.mailer.sent()[0];
    let result = h
        .service
        .complete_signup(complete(&signup.temp_token, &otp_from_email(email)))
        .await
        .unwrap();
    assert!(result.accesskey.is_some());

    // The emailed link is now dead.
    let err = h
        .service
        .email_verify(verify(&token_from_email(email)))
        .await
        .unwrap_err();
    assert!(matches!(err, CustomerError::NotFound { .. }));
    assert_eq!(h.notifier.count(EventType::CustomerCreated), 1);
}
