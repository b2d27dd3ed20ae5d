// ABOUTME: Route module organization for the OAuth Labs HTTP surface
// ABOUTME: Assembles protocol and health routes behind a shared tracing layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! HTTP routes
//!
//! Each domain module contains only route definitions and thin handlers
//! that delegate to [`crate::oauth2_server::OAuthEngine`].

/// Health check route
pub mod health;
/// OAuth 2.0 authorization server routes
pub mod oauth2;

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub use health::HealthRoutes;
pub use oauth2::{HeaderIdentity, IdentityProvider, OAuth2Routes, OAuthServerState};

/// Header carrying the per-request correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Complete application router
///
/// Every request gets an `x-request-id` (kept if the caller sent one) that
/// is echoed on the response and recorded by the trace layer.
pub fn router(state: Arc<OAuthServerState>) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .merge(OAuth2Routes::routes(state))
        .merge(HealthRoutes::routes())
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                )),
        )
}
