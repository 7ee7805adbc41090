mod common;

use chrono::Duration as ChronoDuration;

use tenant_auth::models::{Role, UserStatus};
use tenant_auth::services::auth::AuthError;

use common::{Harness, PASSWORD};

const NEW_PASSWORD: &str = "a brand new password";

#[tokio::test]
async fn reset_invalidates_every_existing_session() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let laptop = h.login(&user).await;
    let phone = h.login(&user).await;
    h.sessions
        .authenticate(&laptop.tokens.access_token)
        .await
        .unwrap();

    let grant = h
        .sessions
        .request_password_reset(h.tenant_a, "alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(grant.user_id, user.id);
    assert_eq!(grant.expires_at, common::t0() + ChronoDuration::minutes(30));

    let revoked = h
        .sessions
        .reset_password(&grant.token, NEW_PASSWORD)
        .await
        .unwrap();
    assert_eq!(revoked, 2);

    for outcome in [&laptop, &phone] {
        assert_eq!(
            h.sessions
                .authenticate(&outcome.tokens.access_token)
                .await
                .unwrap_err(),
            AuthError::SessionRevoked
        );
        assert_eq!(
            h.sessions
                .refresh(&outcome.tokens.refresh_token)
                .await
                .unwrap_err(),
            AuthError::SessionRevoked
        );
    }
}

#[tokio::test]
async fn reset_replaces_the_password() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let grant = h
        .sessions
        .request_password_reset(h.tenant_a, &user.email)
        .await
        .unwrap()
        .unwrap();

    h.sessions
        .reset_password(&grant.token, NEW_PASSWORD)
        .await
        .unwrap();

    assert_eq!(
        h.sessions
            .login(h.tenant_a, &user.email, PASSWORD)
            .await
            .unwrap_err(),
        AuthError::InvalidCredentials
    );
    assert!(
        h.sessions
            .login(h.tenant_a, &user.email, NEW_PASSWORD)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn reset_token_is_single_use() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let grant = h
        .sessions
        .request_password_reset(h.tenant_a, &user.email)
        .await
        .unwrap()
        .unwrap();

    h.sessions
        .reset_password(&grant.token, NEW_PASSWORD)
        .await
        .unwrap();
    assert_eq!(
        h.sessions
            .reset_password(&grant.token, "yet another password")
            .await
            .unwrap_err(),
        AuthError::ResetTokenInvalidOrUsed
    );
}

#[tokio::test]
async fn expired_or_unknown_reset_tokens_are_rejected() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let grant = h
        .sessions
        .request_password_reset(h.tenant_a, &user.email)
        .await
        .unwrap()
        .unwrap();

    h.advance(ChronoDuration::minutes(30));
    assert_eq!(
        h.sessions
            .reset_password(&grant.token, NEW_PASSWORD)
            .await
            .unwrap_err(),
        AuthError::ResetTokenInvalidOrUsed
    );
    assert_eq!(
        h.sessions
            .reset_password("never-issued", NEW_PASSWORD)
            .await
            .unwrap_err(),
        AuthError::ResetTokenInvalidOrUsed
    );
}

#[tokio::test]
async fn no_grant_for_unknown_or_inactive_users() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);

    assert!(
        h.sessions
            .request_password_reset(h.tenant_a, "nobody@example.com")
            .await
            .unwrap()
            .is_none()
    );
    // Right email, wrong tenant
    assert!(
        h.sessions
            .request_password_reset(h.tenant_b, &user.email)
            .await
            .unwrap()
            .is_none()
    );

    h.memory().set_user_status(user.id, UserStatus::Disabled);
    assert!(
        h.sessions
            .request_password_reset(h.tenant_a, &user.email)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn reset_for_a_user_disabled_after_the_request_fails() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let grant = h
        .sessions
        .request_password_reset(h.tenant_a, &user.email)
        .await
        .unwrap()
        .unwrap();

    h.memory().set_user_status(user.id, UserStatus::Disabled);
    assert_eq!(
        h.sessions
            .reset_password(&grant.token, NEW_PASSWORD)
            .await
            .unwrap_err(),
        AuthError::ResetTokenInvalidOrUsed
    );
}

#[tokio::test]
async fn failed_session_revocation_leaves_the_reset_retryable() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let before = h.login(&user).await;
    let grant = h
        .sessions
        .request_password_reset(h.tenant_a, &user.email)
        .await
        .unwrap()
        .unwrap();

    h.stalling.fail_logout_all(true);
    assert_eq!(
        h.sessions
            .reset_password(&grant.token, NEW_PASSWORD)
            .await
            .unwrap_err(),
        AuthError::StoreUnavailable
    );

    // Nothing was committed: the old password still works.
    let during = h.login(&user).await;

    h.stalling.fail_logout_all(false);
    let revoked = h
        .sessions
        .reset_password(&grant.token, NEW_PASSWORD)
        .await
        .unwrap();
    assert_eq!(revoked, 2);

    for outcome in [&before, &during] {
        assert_eq!(
            h.sessions
                .authenticate(&outcome.tokens.access_token)
                .await
                .unwrap_err(),
            AuthError::SessionRevoked
        );
        assert_eq!(
            h.sessions
                .refresh(&outcome.tokens.refresh_token)
                .await
                .unwrap_err(),
            AuthError::SessionRevoked
        );
    }
    assert!(
        h.sessions
            .login(h.tenant_a, &user.email, NEW_PASSWORD)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn failed_password_update_revokes_sessions_and_keeps_the_token() {
    let h = Harness::new();
    let user = h.add_user(h.tenant_a, "alice@example.com", Role::MEMBER);
    let before = h.login(&user).await;
    let grant = h
        .sessions
        .request_password_reset(h.tenant_a, &user.email)
        .await
        .unwrap()
        .unwrap();

    h.stalling.fail_user_updates(true);
    assert_eq!(
        h.sessions
            .reset_password(&grant.token, NEW_PASSWORD)
            .await
            .unwrap_err(),
        AuthError::StoreUnavailable
    );
    assert_eq!(
        h.sessions
            .authenticate(&before.tokens.access_token)
            .await
            .unwrap_err(),
        AuthError::SessionRevoked
    );

    h.stalling.fail_user_updates(false);
    h.sessions
        .reset_password(&grant.token, NEW_PASSWORD)
        .await
        .unwrap();
    assert_eq!(
        h.sessions
            .login(h.tenant_a, &user.email, PASSWORD)
            .await
            .unwrap_err(),
        AuthError::InvalidCredentials
    );
    assert!(
        h.sessions
            .login(h.tenant_a, &user.email, NEW_PASSWORD)
            .await
            .is_ok()
    );
}
