//! End-to-end flows through the composed service

mod common;

use std::sync::Arc;
use std::time::Duration;

use codegenius_auth_core::{
    AuthConfig, AuthError, AuthSessionService, RateIdentity, TokenType,
};
use codegenius_store::{ManualClock, MemoryStore};

use common::{FailingStore, MockCredentialVerifier, TEST_SECRET};

const IP: &str = "203.0.113.7";
const UA: &str = "integration-tests";

struct Harness {
    service: AuthSessionService<MockCredentialVerifier>,
    verifier: Arc<MockCredentialVerifier>,
    clock: Arc<ManualClock>,
}

fn harness_with(config: AuthConfig) -> Harness {
    let clock = Arc::new(ManualClock::start_now());
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let verifier = Arc::new(MockCredentialVerifier::new());
    let service = AuthSessionService::new(config, store, clock.clone(), verifier.clone())
        .expect("service config is valid");
    Harness {
        service,
        verifier,
        clock,
    }
}

fn harness() -> Harness {
    harness_with(AuthConfig::new(TEST_SECRET))
}

#[tokio::test]
async fn test_login_authenticate_logout_cycle() {
    let h = harness();
    let user_id = h.verifier.add_user("alice", "hunter2");

    let tokens = h
        .service
        .login("alice", "hunter2", IP, UA, false)
        .await
        .unwrap();
    assert_eq!(tokens.expires_in, 900);
    assert_ne!(tokens.access_token, tokens.refresh_token);

    let ctx = h
        .service
        .authenticate(&tokens.access_token, IP)
        .await
        .unwrap();
    assert_eq!(ctx.user_id, user_id);
    assert_eq!(ctx.session.session_id, tokens.session_id);
    assert_eq!(ctx.claims.token_type, TokenType::Access);

    h.service
        .logout(
            Some(&tokens.access_token),
            Some(&tokens.refresh_token),
            &tokens.session_id,
        )
        .await
        .unwrap();

    // Revoked tokens and a destroyed session both refuse the caller
    assert!(matches!(
        h.service.authenticate(&tokens.access_token, IP).await,
        Err(AuthError::TokenInvalid)
    ));
    assert!(matches!(
        h.service.refresh(&tokens.refresh_token, IP).await,
        Err(AuthError::TokenInvalid)
    ));
}

#[tokio::test]
async fn test_wrong_password_is_opaque() {
    let h = harness();
    h.verifier.add_user("alice", "hunter2");

    let wrong_password = h.service.login("alice", "nope", IP, UA, false).await;
    let wrong_username = h.service.login("mallory", "nope", IP, UA, false).await;
    assert!(matches!(wrong_password, Err(AuthError::InvalidCredentials)));
    assert!(matches!(wrong_username, Err(AuthError::InvalidCredentials)));
}

#[tokio::test]
async fn test_sixth_attempt_locks_account() {
    let h = harness();
    h.verifier.add_user("alice", "hunter2");

    for _ in 0..5 {
        let err = h
            .service
            .login("alice", "wrong", "9.9.9.9", UA, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    // Even the correct password is refused while locked
    let err = h
        .service
        .login("alice", "hunter2", "9.9.9.9", UA, false)
        .await
        .unwrap_err();
    match err {
        AuthError::AccountLocked { retry_after } => assert_eq!(retry_after, 900),
        other => panic!("expected AccountLocked, got {other:?}"),
    }
}

#[tokio::test]
async fn test_username_lockout_follows_across_ips() {
    let h = harness();
    h.verifier.add_user("alice", "hunter2");

    // One failure per IP, five IPs: no single IP is locked
    for i in 0..5 {
        let ip = format!("10.1.0.{i}");
        let _ = h.service.login("alice", "wrong", &ip, UA, false).await;
    }

    let err = h
        .service
        .login("alice", "hunter2", "10.2.0.1", UA, false)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AccountLocked { .. }));
}

#[tokio::test]
async fn test_lockout_lapses_after_window() {
    let h = harness();
    h.verifier.add_user("alice", "hunter2");

    for _ in 0..5 {
        let _ = h.service.login("alice", "wrong", IP, UA, false).await;
    }
    assert!(matches!(
        h.service.login("alice", "hunter2", IP, UA, false).await,
        Err(AuthError::AccountLocked { .. })
    ));

    h.clock.advance(Duration::from_secs(901));
    assert!(h.service.login("alice", "hunter2", IP, UA, false).await.is_ok());
}

#[tokio::test]
async fn test_success_resets_failure_counters() {
    let h = harness();
    h.verifier.add_user("alice", "hunter2");

    for _ in 0..4 {
        let _ = h.service.login("alice", "wrong", IP, UA, false).await;
    }
    h.service
        .login("alice", "hunter2", IP, UA, false)
        .await
        .unwrap();

    // Counter restarted; four more failures still leave headroom
    for _ in 0..4 {
        let _ = h.service.login("alice", "wrong", IP, UA, false).await;
    }
    assert!(h.service.login("alice", "hunter2", IP, UA, false).await.is_ok());
}

#[tokio::test]
async fn test_refresh_issues_working_access_token() {
    let h = harness();
    let user_id = h.verifier.add_user("alice", "hunter2");

    let tokens = h
        .service
        .login("alice", "hunter2", IP, UA, false)
        .await
        .unwrap();

    // Past the access token's life, inside the refresh token's
    h.clock.advance(Duration::from_secs(16 * 60));
    assert!(matches!(
        h.service.authenticate(&tokens.access_token, IP).await,
        Err(AuthError::TokenInvalid)
    ));

    let refreshed = h
        .service
        .refresh(&tokens.refresh_token, IP)
        .await
        .unwrap();
    assert_eq!(refreshed.session_id, tokens.session_id);
    assert_eq!(refreshed.refresh_token, tokens.refresh_token);

    let ctx = h
        .service
        .authenticate(&refreshed.access_token, IP)
        .await
        .unwrap();
    assert_eq!(ctx.user_id, user_id);
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let h = harness();
    h.verifier.add_user("alice", "hunter2");

    let tokens = h
        .service
        .login("alice", "hunter2", IP, UA, false)
        .await
        .unwrap();

    assert!(matches!(
        h.service.refresh(&tokens.access_token, IP).await,
        Err(AuthError::TokenInvalid)
    ));
    assert!(matches!(
        h.service.authenticate(&tokens.refresh_token, IP).await,
        Err(AuthError::TokenInvalid)
    ));
}

#[tokio::test]
async fn test_refresh_fails_once_session_expires() {
    // Refresh token outlives the session record
    let config = AuthConfig::new(TEST_SECRET)
        .with_session_ttls(Duration::from_secs(3600), Duration::from_secs(7200))
        .with_refresh_ttls(
            Duration::from_secs(24 * 3600),
            Duration::from_secs(48 * 3600),
        );
    let h = harness_with(config);
    h.verifier.add_user("alice", "hunter2");

    let tokens = h
        .service
        .login("alice", "hunter2", IP, UA, false)
        .await
        .unwrap();

    h.clock.advance(Duration::from_secs(2 * 3600));
    assert!(matches!(
        h.service.refresh(&tokens.refresh_token, IP).await,
        Err(AuthError::SessionExpired)
    ));
}

#[tokio::test]
async fn test_remember_me_extends_refresh_lifetime() {
    let h = harness();
    h.verifier.add_user("alice", "hunter2");

    let short = h
        .service
        .login("alice", "hunter2", IP, UA, false)
        .await
        .unwrap();
    let long = h
        .service
        .login("alice", "hunter2", IP, UA, true)
        .await
        .unwrap();

    // 25h: past the 24h plain refresh/session life, inside the 30d one
    h.clock.advance(Duration::from_secs(25 * 3600));
    assert!(h.service.refresh(&short.refresh_token, IP).await.is_err());
    assert!(h.service.refresh(&long.refresh_token, IP).await.is_ok());
}

#[tokio::test]
async fn test_change_password_revokes_every_session() {
    let h = harness();
    h.verifier.add_user("alice", "hunter2");

    let phone = h
        .service
        .login("alice", "hunter2", IP, UA, false)
        .await
        .unwrap();
    let laptop = h
        .service
        .login("alice", "hunter2", "10.0.0.2", UA, true)
        .await
        .unwrap();

    let removed = h
        .service
        .change_password(&phone.session_id, IP)
        .await
        .unwrap();
    assert_eq!(removed, 2);

    assert!(matches!(
        h.service.authenticate(&phone.access_token, IP).await,
        Err(AuthError::SessionExpired)
    ));
    assert!(matches!(
        h.service.authenticate(&laptop.access_token, "10.0.0.2").await,
        Err(AuthError::SessionExpired)
    ));
}

#[tokio::test]
async fn test_change_password_needs_live_session() {
    let h = harness();
    h.verifier.add_user("alice", "hunter2");
    let tokens = h
        .service
        .login("alice", "hunter2", IP, UA, false)
        .await
        .unwrap();

    h.service
        .logout(None, None, &tokens.session_id)
        .await
        .unwrap();
    assert!(matches!(
        h.service.change_password(&tokens.session_id, IP).await,
        Err(AuthError::SessionExpired)
    ));
}

#[tokio::test]
async fn test_logout_with_expired_access_still_revokes_refresh() {
    let h = harness();
    h.verifier.add_user("alice", "hunter2");
    let tokens = h
        .service
        .login("alice", "hunter2", IP, UA, false)
        .await
        .unwrap();

    h.clock.advance(Duration::from_secs(16 * 60));
    h.service
        .logout(
            Some(&tokens.access_token),
            Some(&tokens.refresh_token),
            &tokens.session_id,
        )
        .await
        .unwrap();

    assert!(matches!(
        h.service.refresh(&tokens.refresh_token, IP).await,
        Err(AuthError::TokenInvalid)
    ));
}

#[tokio::test]
async fn test_garbage_tokens_auto_block_the_ip() {
    let h = harness();
    h.verifier.add_user("alice", "hunter2");

    for _ in 0..5 {
        let err = h
            .service
            .authenticate("not.a.token", "198.51.100.9")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }

    // The fifth suspicious event blocked the IP outright
    let err = h
        .service
        .login("alice", "hunter2", "198.51.100.9", UA, false)
        .await
        .unwrap_err();
    match err {
        AuthError::AccountLocked { retry_after } => assert_eq!(retry_after, 24 * 3600),
        other => panic!("expected AccountLocked, got {other:?}"),
    }

    // Other IPs are unaffected
    assert!(h.service.login("alice", "hunter2", IP, UA, false).await.is_ok());
}

#[tokio::test]
async fn test_quota_enforcement_and_rollover() {
    let h = harness();
    let identity = RateIdentity::Ip(IP.to_string());

    for _ in 0..5 {
        h.service.enforce_quota("login", &identity).await.unwrap();
    }
    match h.service.enforce_quota("login", &identity).await.unwrap_err() {
        AuthError::RateLimited { retry_after } => assert_eq!(retry_after, 900),
        other => panic!("expected RateLimited, got {other:?}"),
    }

    h.clock.advance(Duration::from_secs(901));
    assert!(h.service.enforce_quota("login", &identity).await.is_ok());
}

#[tokio::test]
async fn test_revocation_check_fails_closed_on_outage() {
    let h = harness();
    h.verifier.add_user("alice", "hunter2");
    let tokens = h
        .service
        .login("alice", "hunter2", IP, UA, false)
        .await
        .unwrap();

    // Same secret and clock, but every store call now fails
    let broken = AuthSessionService::new(
        AuthConfig::new(TEST_SECRET),
        Arc::new(FailingStore),
        h.clock.clone(),
        h.verifier.clone(),
    )
    .unwrap();

    assert!(matches!(
        broken.authenticate(&tokens.access_token, IP).await,
        Err(AuthError::StoreUnavailable(_))
    ));
}

#[tokio::test]
async fn test_rate_limiter_fails_open_on_outage() {
    let clock = Arc::new(ManualClock::start_now());
    let verifier = Arc::new(MockCredentialVerifier::new());
    let broken = AuthSessionService::new(
        AuthConfig::new(TEST_SECRET),
        Arc::new(FailingStore),
        clock,
        verifier,
    )
    .unwrap();

    let identity = RateIdentity::Ip(IP.to_string());
    for _ in 0..20 {
        broken.enforce_quota("login", &identity).await.unwrap();
    }
}

#[tokio::test]
async fn test_brute_force_guard_fails_open_on_outage() {
    let clock = Arc::new(ManualClock::start_now());
    let verifier = Arc::new(MockCredentialVerifier::new());
    verifier.add_user("alice", "hunter2");
    let broken = AuthSessionService::new(
        AuthConfig::new(TEST_SECRET),
        Arc::new(FailingStore),
        clock,
        verifier,
    )
    .unwrap();

    // Lockout checks pass; the login then fails only at the session write
    let err = broken
        .login("alice", "hunter2", IP, UA, false)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::StoreUnavailable(_)));
}
