mod common;

use std::time::Duration;

use chrono::Duration as ChronoDuration;

use tenant_auth::models::{Role, UserStatus};
use tenant_auth::repos::CredentialStore;
use tenant_auth::services::auth::AuthError;

use common::{Harness, PASSWORD};

#[tokio::test]
async fn login_then_authenticate_returns_the_same_identity() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::TENANT_ADMIN);

    let outcome = h.login(&user).await;
    let claims = h
        .sessions
        .authenticate(&outcome.tokens.access_token)
        .await
        .unwrap();

    assert_eq!(claims.user_id, user.id);
    assert_eq!(claims.tenant_id, h.tenant_a);
    assert_eq!(claims.role, Role::TENANT_ADMIN);
    assert_eq!(claims.session_id, outcome.session.session_id);
    assert_eq!(
        outcome.session.expires_at,
        common::t0() + ChronoDuration::days(7)
    );
}

#[tokio::test]
async fn login_normalises_the_email() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);

    let outcome = h
        .sessions
        .login(h.tenant_a, "  Alice@Example.COM ", PASSWORD)
        .await
        .unwrap();
    assert_eq!(outcome.user.id, user.id);
}

#[tokio::test]
async fn unknown_email_and_wrong_password_look_the_same() {
    let h = Harness::new();
    h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);

    let wrong_password = h
        .sessions
        .login(h.tenant_a, "alice@example.com", "nope")
        .await;
    let unknown_email = h
        .sessions
        .login(h.tenant_a, "bob@example.com", PASSWORD)
        .await;

    assert_eq!(wrong_password.unwrap_err(), AuthError::InvalidCredentials);
    assert_eq!(unknown_email.unwrap_err(), AuthError::InvalidCredentials);
    assert_eq!(h.memory().session_count(), 0);
}

#[tokio::test]
async fn disabled_users_cannot_log_in() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    h.memory().set_user_status(user.id, UserStatus::Disabled);

    let res = h.sessions.login(h.tenant_a, &user.email, PASSWORD).await;
    assert_eq!(res.unwrap_err(), AuthError::InvalidCredentials);
}

#[tokio::test]
async fn login_records_last_login() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    h.login(&user).await;

    let stored = h.store.find_user_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.last_login_at, Some(common::t0()));
}

#[tokio::test]
async fn same_email_in_two_tenants_is_two_identities() {
    let h = Harness::new();
    let a = h.add_user(h.tenant_a, "shared@example.com", Role::MEMBER);
    let b = h.add_user(h.tenant_b, "shared@example.com", Role::TENANT_ADMIN);
    assert_ne!(a.id, b.id);

    let found_a = h
        .store
        .find_user_by_tenant_email(h.tenant_a, "shared@example.com")
        .await
        .unwrap()
        .unwrap();
    let found_b = h
        .store
        .find_user_by_tenant_email(h.tenant_b, "shared@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found_a.id, a.id);
    assert_eq!(found_b.id, b.id);

    let claims_b = h
        .sessions
        .authenticate(&h.login(&b).await.tokens.access_token)
        .await
        .unwrap();
    assert_eq!(claims_b.tenant_id, h.tenant_b);
    assert_eq!(claims_b.role, Role::TENANT_ADMIN);
}

#[tokio::test]
async fn logins_never_revoke_other_sessions() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);

    let laptop = h.login(&user).await;
    let phone = h.login(&user).await;
    assert_ne!(laptop.session.session_id, phone.session.session_id);

    assert!(h.sessions.authenticate(&laptop.tokens.access_token).await.is_ok());
    assert!(h.sessions.authenticate(&phone.tokens.access_token).await.is_ok());
}

#[tokio::test]
async fn logout_denies_the_access_token_immediately() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let outcome = h.login(&user).await;
    let token = &outcome.tokens.access_token;

    // Warm the positive cache entry first.
    h.sessions.authenticate(token).await.unwrap();
    h.sessions.logout(&outcome.session.session_id).await.unwrap();

    assert_eq!(
        h.sessions.authenticate(token).await.unwrap_err(),
        AuthError::SessionRevoked
    );
}

#[tokio::test]
async fn logout_is_idempotent() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let outcome = h.login(&user).await;

    h.sessions.logout(&outcome.session.session_id).await.unwrap();
    h.sessions.logout(&outcome.session.session_id).await.unwrap();
    h.sessions.logout("no-such-session").await.unwrap();
}

#[tokio::test]
async fn logout_only_touches_one_session() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let first = h.login(&user).await;
    let second = h.login(&user).await;

    h.sessions.logout(&first.session.session_id).await.unwrap();

    assert!(h.sessions.authenticate(&second.tokens.access_token).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn out_of_band_revocation_is_seen_within_the_cache_ttl() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let outcome = h.login(&user).await;
    let token = &outcome.tokens.access_token;

    h.sessions.authenticate(token).await.unwrap();

    // Revoked directly in the store: no revocation marker reaches the cache.
    h.store
        .deactivate_session(&outcome.session.session_id, common::t0())
        .await
        .unwrap();

    // Still inside the staleness window.
    assert!(h.sessions.authenticate(token).await.is_ok());

    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(
        h.sessions.authenticate(token).await.unwrap_err(),
        AuthError::SessionRevoked
    );
}

#[tokio::test]
async fn store_outage_fails_closed() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let outcome = h.login(&user).await;

    h.memory().set_offline(true);
    assert_eq!(
        h.sessions
            .authenticate(&outcome.tokens.access_token)
            .await
            .unwrap_err(),
        AuthError::StoreUnavailable
    );
}

#[tokio::test(start_paused = true)]
async fn stalled_store_times_out_closed() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let outcome = h.login(&user).await;

    h.stalling.stall(true);
    assert_eq!(
        h.sessions
            .authenticate(&outcome.tokens.access_token)
            .await
            .unwrap_err(),
        AuthError::StoreUnavailable
    );
}

#[tokio::test(start_paused = true)]
async fn cached_liveness_outlasts_a_store_outage_only_for_the_ttl() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let outcome = h.login(&user).await;
    let token = &outcome.tokens.access_token;

    h.sessions.authenticate(token).await.unwrap();
    h.memory().set_offline(true);

    assert!(h.sessions.authenticate(token).await.is_ok());

    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(
        h.sessions.authenticate(token).await.unwrap_err(),
        AuthError::StoreUnavailable
    );
}

#[tokio::test]
async fn one_transient_store_failure_is_retried() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let outcome = h.login(&user).await;

    h.memory().fail_next(1);
    assert!(h.sessions.authenticate(&outcome.tokens.access_token).await.is_ok());
}

#[tokio::test]
async fn login_during_store_outage_is_not_a_credentials_error() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    h.memory().set_offline(true);

    let res = h.sessions.login(h.tenant_a, &user.email, PASSWORD).await;
    assert_eq!(res.unwrap_err(), AuthError::StoreUnavailable);
}

#[tokio::test]
async fn cache_outage_degrades_to_the_store() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    h.cache.set_offline(true);

    let outcome = h.login(&user).await;
    let token = &outcome.tokens.access_token;
    assert!(h.sessions.authenticate(token).await.is_ok());

    h.sessions.logout(&outcome.session.session_id).await.unwrap();
    assert_eq!(
        h.sessions.authenticate(token).await.unwrap_err(),
        AuthError::SessionRevoked
    );
}

#[tokio::test]
async fn expired_access_token_is_reported_as_expired() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let outcome = h.login(&user).await;

    h.advance(ChronoDuration::seconds(900));
    assert_eq!(
        h.sessions
            .authenticate(&outcome.tokens.access_token)
            .await
            .unwrap_err(),
        AuthError::TokenExpired
    );
}

#[tokio::test]
async fn garbage_token_is_invalid() {
    let h = Harness::new();
    assert_eq!(
        h.sessions.authenticate("garbage").await.unwrap_err(),
        AuthError::TokenInvalid
    );
}

#[tokio::test]
async fn expired_session_rejects_a_still_valid_access_token() {
    // Sessions shorter than access tokens make the session expiry observable.
    let h = Harness::with_config(|c| c.refresh_token_ttl_seconds = 600);
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let outcome = h.login(&user).await;

    h.advance(ChronoDuration::seconds(700));
    assert_eq!(
        h.sessions
            .authenticate(&outcome.tokens.access_token)
            .await
            .unwrap_err(),
        AuthError::SessionExpired
    );
}

#[tokio::test]
async fn logout_all_revokes_every_session_of_the_user_only() {
    let h = Harness::new();
    let alice = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let bob = h.add_user(h.tenant_a, "bob@example.com", Role::MEMBER);

    let a1 = h.login(&alice).await;
    let a2 = h.login(&alice).await;
    let b1 = h.login(&bob).await;

    assert_eq!(h.sessions.logout_all(alice.id).await.unwrap(), 2);
    assert_eq!(h.sessions.logout_all(alice.id).await.unwrap(), 0);

    for token in [&a1.tokens.access_token, &a2.tokens.access_token] {
        assert_eq!(
            h.sessions.authenticate(token).await.unwrap_err(),
            AuthError::SessionRevoked
        );
    }
    assert!(h.sessions.authenticate(&b1.tokens.access_token).await.is_ok());
}

#[tokio::test]
async fn list_sessions_filters_inactive_ones() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let first = h.login(&user).await;
    h.login(&user).await;

    h.sessions.logout(&first.session.session_id).await.unwrap();

    assert_eq!(h.sessions.list_sessions(user.id, true).await.unwrap().len(), 1);
    assert_eq!(h.sessions.list_sessions(user.id, false).await.unwrap().len(), 2);
}

#[tokio::test]
async fn record_activity_moves_last_activity_forward() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let outcome = h.login(&user).await;

    h.advance(ChronoDuration::seconds(60));
    assert!(
        h.sessions
            .record_activity(&outcome.session.session_id)
            .await
            .unwrap()
    );

    let sessions = h.sessions.list_sessions(user.id, true).await.unwrap();
    assert_eq!(
        sessions[0].last_activity_at,
        common::t0() + ChronoDuration::seconds(60)
    );

    h.sessions.logout(&outcome.session.session_id).await.unwrap();
    assert!(
        !h.sessions
            .record_activity(&outcome.session.session_id)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn cleanup_keeps_live_sessions_and_removes_stale_ones() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);

    let live = h.login(&user).await;
    let stale = h.login(&user).await;
    h.sessions.logout(&stale.session.session_id).await.unwrap();

    // Past the one-day retention window for the revoked session.
    h.advance(ChronoDuration::days(1) + ChronoDuration::seconds(1));
    let recent = h.login(&user).await;
    h.sessions.logout(&recent.session.session_id).await.unwrap();

    assert_eq!(h.sessions.cleanup_expired_sessions().await.unwrap(), 1);
    assert_eq!(h.sessions.cleanup_expired_sessions().await.unwrap(), 0);

    let remaining: Vec<String> = h
        .sessions
        .list_sessions(user.id, false)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.session_id)
        .collect();
    assert!(remaining.contains(&live.session.session_id));
    assert!(remaining.contains(&recent.session.session_id));
    assert!(!remaining.contains(&stale.session.session_id));
    assert!(
        h.sessions
            .authenticate(&live.tokens.access_token)
            .await
            .is_err_and(|e| e == AuthError::TokenExpired)
    );
}

#[tokio::test]
async fn cleanup_removes_expired_sessions() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    h.login(&user).await;

    h.advance(ChronoDuration::days(7));
    assert_eq!(h.sessions.cleanup_expired_sessions().await.unwrap(), 1);
    assert_eq!(h.memory().session_count(), 0);
}
