// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization gate for Axum.
//!
//! Applied to the whole API router with
//! `axum::middleware::from_fn_with_state(state, require_auth)`.
//!
//! - CORS preflight (`OPTIONS`) requests pass untouched
//! - Public paths (health check) pass untouched
//! - Every other request needs `Authorization: Bearer <token>` with a valid token
//! - The token's subject must exist in the user store, except on paths that
//!   create the account in the first place
//!
//! On success the [`AuthenticatedUser`] is inserted into the request
//! extensions, where the [`Auth`](super::Auth) extractor picks it up.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;

/// Paths exempt from some or all of the gate. Matching is exact.
#[derive(Debug, Clone)]
pub struct GatePolicy {
    /// No token required
    pub public_paths: Vec<String>,
    /// Token required, account need not exist yet
    pub unprovisioned_paths: Vec<String>,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            public_paths: vec!["/api/health".to_string()],
            unprovisioned_paths: vec!["/api/me/setup".to_string()],
        }
    }
}

impl GatePolicy {
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| p == path)
    }

    pub fn skips_provisioning(&self, path: &str) -> bool {
        self.unprovisioned_paths.iter().any(|p| p == path)
    }
}

/// Authentication middleware function.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || state.gate.is_public(request.uri().path()) {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    match authenticate(&state, request.headers(), &path).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            if e.is_retryable() {
                tracing::warn!(%path, error_code = e.error_code(), error = %e, "authentication unavailable");
            } else {
                tracing::debug!(%path, error_code = e.error_code(), error = %e, "request rejected");
            }
            e.into_response()
        }
    }
}

async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    path: &str,
) -> Result<AuthenticatedUser, AuthError> {
    let token = bearer_token(headers)?;
    let user = state.verifier.verify(token).await?;

    if !state.gate.skips_provisioning(path) && !state.users.user_exists(&user.user_id).await {
        return Err(AuthError::SubjectNotProvisioned(user.user_id));
    }

    Ok(user)
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::AuthHeaderMissing)?
        .to_str()
        .map_err(|_| AuthError::AuthHeaderMalformed)?;

    if value.is_empty() {
        return Err(AuthError::AuthHeaderMissing);
    }

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() && !token.contains(' ') => Ok(token),
        _ => Err(AuthError::AuthHeaderMalformed),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{HeaderValue, Request, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::testutil::{
        claims, jwks_fixture, sign_rsa_k1, sign_rsa_k2, verifier, StubKeySource,
    };
    use crate::auth::Auth;
    use crate::store::InMemoryStore;

    struct Harness {
        app: Router,
        calls: Arc<AtomicUsize>,
    }

    fn harness(source: StubKeySource) -> Harness {
        harness_with_policy(source, GatePolicy::default())
    }

    fn harness_with_policy(source: StubKeySource, gate: GatePolicy) -> Harness {
        let state = AppState::new(
            verifier(Arc::new(source), None),
            Arc::new(InMemoryStore::with_users(["user-42"])),
        )
        .with_gate_policy(gate);
        let calls = Arc::new(AtomicUsize::new(0));

        let me_calls = Arc::clone(&calls);
        let setup_calls = Arc::clone(&calls);
        let app = Router::new()
            .route("/api/health", get(|| async { "ok" }))
            .route(
                "/api/me",
                get(move |Auth(user): Auth| {
                    me_calls.fetch_add(1, Ordering::SeqCst);
                    async move { Json(user) }
                })
                .options(|| async { StatusCode::NO_CONTENT }),
            )
            .route(
                "/api/me/setup",
                post(move |Auth(user): Auth| {
                    setup_calls.fetch_add(1, Ordering::SeqCst);
                    async move { Json(user) }
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                require_auth,
            ))
            .with_state(state);

        Harness { app, calls }
    }

    fn ok_harness() -> Harness {
        harness(StubKeySource::new(jwks_fixture()))
    }

    fn request(method: Method, uri: &str, auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(AUTHORIZATION, auth);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = ok_harness();
        let (status, _) = send(&h.app, request(Method::GET, "/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn public_paths_match_exactly() {
        let h = ok_harness();
        let (status, _) = send(&h.app, request(Method::GET, "/api/health/", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn preflight_skips_authentication() {
        let h = ok_harness();
        let (status, _) = send(&h.app, request(Method::OPTIONS, "/api/me", None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let h = ok_harness();
        let (status, body) = send(&h.app, request(Method::GET, "/api/me", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "auth_header_missing");
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_headers_are_rejected() {
        let h = ok_harness();
        let token = sign_rsa_k1(Some("k1"), &claims("user-42"));
        for auth in [
            format!("Basic {token}"),
            format!("bearer {token}"),
            "Bearer ".to_string(),
            format!("Bearer {token} extra"),
            format!("Bearer  {token}"),
        ] {
            let (status, body) = send(&h.app, request(Method::GET, "/api/me", Some(&auth))).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{auth}");
            assert_eq!(body["error_code"], "auth_header_malformed", "{auth}");
        }
    }

    #[test]
    fn non_ascii_header_is_malformed() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_bytes(b"Bearer \xff").unwrap());
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::AuthHeaderMalformed)
        ));
    }

    #[tokio::test]
    async fn valid_token_reaches_handler_once_with_identity() {
        let h = ok_harness();
        let token = sign_rsa_k1(Some("k1"), &claims("user-42"));

        let (status, body) =
            send(&h.app, request(Method::GET, "/api/me", Some(&bearer(&token)))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], "user-42");
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_token_is_rejected() {
        let h = ok_harness();
        let token = sign_rsa_k2(Some("k2"), &claims("user-42"));

        let (status, body) =
            send(&h.app, request(Method::GET, "/api/me", Some(&bearer(&token)))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "key_not_found");
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unprovisioned_subject_is_rejected_distinctly() {
        let h = ok_harness();
        let token = sign_rsa_k1(Some("k1"), &claims("user-99"));

        let (status, body) =
            send(&h.app, request(Method::GET, "/api/me", Some(&bearer(&token)))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "subject_not_provisioned");
    }

    #[tokio::test]
    async fn setup_path_skips_provisioning_check() {
        let h = ok_harness();
        let token = sign_rsa_k1(Some("k1"), &claims("user-99"));

        let (status, body) =
            send(&h.app, request(Method::POST, "/api/me/setup", Some(&bearer(&token)))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], "user-99");
    }

    #[tokio::test]
    async fn setup_path_still_requires_valid_token() {
        let h = ok_harness();
        let token = sign_rsa_k2(Some("k1"), &claims("user-99"));

        let (status, body) =
            send(&h.app, request(Method::POST, "/api/me/setup", Some(&bearer(&token)))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "invalid_signature");
    }

    #[tokio::test]
    async fn custom_policy_replaces_defaults() {
        let h = harness_with_policy(
            StubKeySource::new(jwks_fixture()),
            GatePolicy {
                public_paths: Vec::new(),
                unprovisioned_paths: vec!["/api/me".to_string()],
            },
        );

        let (status, _) = send(&h.app, request(Method::GET, "/api/health", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let token = sign_rsa_k1(Some("k1"), &claims("user-99"));
        let (status, body) =
            send(&h.app, request(Method::GET, "/api/me", Some(&bearer(&token)))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], "user-99");

        let (status, body) =
            send(&h.app, request(Method::POST, "/api/me/setup", Some(&bearer(&token)))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "subject_not_provisioned");
    }

    #[tokio::test]
    async fn key_source_outage_is_retryable_rejection() {
        let h = harness(StubKeySource::failing());
        let token = sign_rsa_k1(Some("k1"), &claims("user-42"));

        let response = h
            .app
            .clone()
            .oneshot(request(Method::GET, "/api/me", Some(&bearer(&token))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("retry-after"));
    }
}
