// ABOUTME: Token revocation tests (RFC 7009) for access and refresh tokens
// ABOUTME: Revocation is idempotent, pair-wide, and refuses tokens owned by another client
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::*;
use oauth_labs_core::errors::OAuthErrorCode;
use oauth_labs_core::models::RevocationRequest;

fn revocation(token: &str, hint: Option<&str>) -> RevocationRequest {
    RevocationRequest {
        token: Some(token.to_owned()),
        token_type_hint: hint.map(ToOwned::to_owned),
        ..RevocationRequest::default()
    }
}

#[tokio::test]
async fn test_revoking_refresh_token_revokes_the_pair() {
    let server = setup().await;
    let issued = issue_tokens(&server.engine).await;
    let refresh_token = issued.refresh_token.unwrap();

    server
        .engine
        .revoke(basic(CLIENT_A, SECRET_A), &revocation(&refresh_token, None))
        .await
        .unwrap();

    assert!(server
        .engine
        .validate_access_token(&issued.access_token)
        .await
        .is_err());
    let err = server
        .engine
        .token(basic(CLIENT_A, SECRET_A), &refresh_request(&refresh_token))
        .await
        .unwrap_err();
    assert_eq!(err.code(), OAuthErrorCode::InvalidGrant);
}

#[tokio::test]
async fn test_revoking_access_token_revokes_the_pair() {
    let server = setup().await;
    let issued = issue_tokens(&server.engine).await;

    server
        .engine
        .revoke(
            basic(CLIENT_A, SECRET_A),
            &revocation(&issued.access_token, Some("access_token")),
        )
        .await
        .unwrap();

    assert!(server
        .engine
        .validate_access_token(&issued.access_token)
        .await
        .is_err());
    assert!(server
        .engine
        .token(
            basic(CLIENT_A, SECRET_A),
            &refresh_request(issued.refresh_token.as_deref().unwrap()),
        )
        .await
        .is_err());
}

#[tokio::test]
async fn test_wrong_hint_does_not_change_outcome() {
    let server = setup().await;
    let issued = issue_tokens(&server.engine).await;

    server
        .engine
        .revoke(
            basic(CLIENT_A, SECRET_A),
            &revocation(issued.refresh_token.as_deref().unwrap(), Some("access_token")),
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
async fn test_revocation_is_idempotent() {
    let server = setup().await;
    let issued = issue_tokens(&server.engine).await;
    let request = revocation(&issued.access_token, None);

    for _ in 0..2 {
        server
            .engine
            .revoke(basic(CLIENT_A, SECRET_A), &request)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_unknown_and_empty_tokens_succeed() {
    let server = setup().await;

    server
        .engine
        .revoke(basic(CLIENT_A, SECRET_A), &revocation("garbage", None))
        .await
        .unwrap();
    server
        .engine
        .revoke(basic(CLIENT_A, SECRET_A), &RevocationRequest::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_other_clients_token_is_refused() {
    let server = setup().await;
    let issued = issue_tokens(&server.engine).await;

    let err = server
        .engine
        .revoke(basic(CLIENT_B, SECRET_B), &revocation(&issued.access_token, None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), OAuthErrorCode::InvalidClient);

    let err = server
        .engine
        .revoke(
            basic(CLIENT_B, SECRET_B),
            &revocation(issued.refresh_token.as_deref().unwrap(), None),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), OAuthErrorCode::InvalidClient);

    // nothing was revoked
    assert!(server
        .engine
        .validate_access_token(&issued.access_token)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_revocation_requires_client_authentication() {
    let server = setup().await;
    let issued = issue_tokens(&server.engine).await;

    let err = server
        .engine
        .revoke(None, &revocation(&issued.access_token, None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), OAuthErrorCode::InvalidClient);
}
