// ABOUTME: Refresh token grant tests covering reuse, rotation, and invalidation of earlier access tokens
// ABOUTME: Refresh tokens are storage-primary; revocation or consent withdrawal must stop them immediately
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::*;
use oauth_labs_core::errors::OAuthErrorCode;
use oauth_labs_server::config::SecurityPolicy;

#[tokio::test]
async fn test_refresh_returns_same_refresh_token_by_default() {
    let server = setup().await;
    let issued = issue_tokens(&server.engine).await;
    let refresh_token = issued.refresh_token.unwrap();

    let refreshed = server
        .engine
        .token(basic(CLIENT_A, SECRET_A), &refresh_request(&refresh_token))
        .await
        .unwrap();

    assert_eq!(refreshed.refresh_token.as_deref(), Some(refresh_token.as_str()));
    assert_ne!(refreshed.access_token, issued.access_token);
    assert_eq!(refreshed.scope.as_deref(), Some("read:profile"));
    assert!(server
        .engine
        .validate_access_token(&refreshed.access_token)
        .await
        .is_ok());

    // the same refresh token keeps working
    assert!(server
        .engine
        .token(basic(CLIENT_A, SECRET_A), &refresh_request(&refresh_token))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_refresh_invalidates_earlier_access_tokens() {
    let server = setup().await;
    let issued = issue_tokens(&server.engine).await;

    server
        .engine
        .token(
            basic(CLIENT_A, SECRET_A),
            &refresh_request(issued.refresh_token.as_deref().unwrap()),
        )
        .await
        .unwrap();

    assert!(server
        .engine
        .validate_access_token(&issued.access_token)
        .await
        .is_err());
}

#[tokio::test]
async fn test_earlier_access_tokens_survive_when_policy_allows() {
    let server = setup_with_policy(SecurityPolicy {
        revoke_access_tokens_on_refresh: false,
        ..SecurityPolicy::default()
    })
    .await;
    let issued = issue_tokens(&server.engine).await;

    server
        .engine
        .token(
            basic(CLIENT_A, SECRET_A),
            &refresh_request(issued.refresh_token.as_deref().unwrap()),
        )
        .await
        .unwrap();

    assert!(server
        .engine
        .validate_access_token(&issued.access_token)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_rotation_issues_new_token_and_revokes_old() {
    let server = setup_with_policy(SecurityPolicy {
        rotate_refresh_tokens: true,
        ..SecurityPolicy::default()
    })
    .await;
    let issued = issue_tokens(&server.engine).await;
    let original = issued.refresh_token.unwrap();

    let rotated = server
        .engine
        .token(basic(CLIENT_A, SECRET_A), &refresh_request(&original))
        .await
        .unwrap()
        .refresh_token
        .unwrap();
    assert_ne!(rotated, original);

    let reuse = server
        .engine
        .token(basic(CLIENT_A, SECRET_A), &refresh_request(&original))
        .await
        .unwrap_err();
    assert_eq!(reuse.code(), OAuthErrorCode::InvalidGrant);
    assert_eq!(reuse.description(), "refresh_token has been revoked.");

    assert!(server
        .engine
        .token(basic(CLIENT_A, SECRET_A), &refresh_request(&rotated))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_refresh_token_bound_to_client() {
    let server = setup().await;
    let issued = issue_tokens(&server.engine).await;

    let err = server
        .engine
        .token(
            basic(CLIENT_B, SECRET_B),
            &refresh_request(issued.refresh_token.as_deref().unwrap()),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), OAuthErrorCode::InvalidGrant);
    assert_eq!(
        err.description(),
        "client requested a refresh_token not issued to them."
    );
}

#[tokio::test]
async fn test_consent_withdrawal_stops_refresh() {
    let server = setup().await;
    let issued = issue_tokens(&server.engine).await;
    server.engine.revoke_consent(ALICE, CLIENT_A).await.unwrap();

    let err = server
        .engine
        .token(
            basic(CLIENT_A, SECRET_A),
            &refresh_request(issued.refresh_token.as_deref().unwrap()),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), OAuthErrorCode::InvalidGrant);
    assert!(server
        .engine
        .validate_access_token(&issued.access_token)
        .await
        .is_err());
}

#[tokio::test]
async fn test_malformed_refresh_token() {
    let server = setup().await;

    let missing = server
        .engine
        .token(basic(CLIENT_A, SECRET_A), &refresh_request(""))
        .await
        .unwrap_err();
    assert_eq!(missing.code(), OAuthErrorCode::InvalidRequest);

    let garbage = server
        .engine
        .token(basic(CLIENT_A, SECRET_A), &refresh_request("not-a-refresh-token"))
        .await
        .unwrap_err();
    assert_eq!(garbage.code(), OAuthErrorCode::InvalidGrant);
    assert_eq!(garbage.description(), "invalid refresh_token.");
}

#[tokio::test]
async fn test_logout_revokes_every_consented_client() {
    let server = setup().await;
    let issued = issue_tokens(&server.engine).await;

    server.engine.logout(ALICE, &[]).await.unwrap();

    assert!(server
        .engine
        .validate_access_token(&issued.access_token)
        .await
        .is_err());
    let err = server
        .engine
        .token(
            basic(CLIENT_A, SECRET_A),
            &refresh_request(issued.refresh_token.as_deref().unwrap()),
        )
        .await
        .unwrap_err();
    assert_eq!(err.description(), "refresh_token has been revoked.");
}
