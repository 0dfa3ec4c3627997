// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::jwks::FAILURE_BACKOFF;
use super::roles::Access;

/// Authentication error type.
///
/// The `Display` output carries internal detail for logs. Clients only ever
/// see [`AuthError::public_message`] and the error code.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// No authorization header present
    #[error("authorization header is missing")]
    AuthHeaderMissing,
    /// Authorization header is not `Bearer <token>`
    #[error("authorization header is malformed")]
    AuthHeaderMalformed,
    /// Token header or claims could not be decoded
    #[error("token is malformed: {0}")]
    MalformedToken(String),
    /// Token header declares an algorithm this path does not accept
    #[error("unsupported signing algorithm {0}")]
    UnsupportedAlgorithm(String),
    /// Key source unreachable, timed out, or answered with a non-200 status
    #[error("key source unavailable: {0}")]
    NetworkFailure(String),
    /// Key set document could not be parsed
    #[error("key set is malformed: {0}")]
    MalformedKeySet(String),
    /// Key type or curve is not supported
    #[error("unsupported key type {0}")]
    UnsupportedKeyType(String),
    /// Key material is not valid base64url or has the wrong size
    #[error("key material is malformed: {0}")]
    MalformedKeyEncoding(String),
    /// No key in the set carries the token's key id
    #[error("no key matches key id {0:?}")]
    KeyNotFound(Option<String>),
    /// Signature check failed
    #[error("token signature is invalid")]
    InvalidSignature,
    /// `iss` is missing or differs from the configured issuer
    #[error("token issuer {0:?} does not match")]
    IssuerMismatch(Option<String>),
    /// `aud` does not contain the configured audience
    #[error("token audience does not match")]
    AudienceMismatch,
    /// `exp` is not strictly in the future
    #[error("token expired at {0}")]
    TokenExpired(i64),
    /// Token carries no `exp` claim
    #[error("token has no expiry claim")]
    MissingExpiry,
    /// `nbf` is in the future
    #[error("token is not valid before {0}")]
    TokenNotYetValid(i64),
    /// `sub` is missing or empty
    #[error("token has no subject")]
    MissingSubject,
    /// Token is valid but its subject has no account
    #[error("subject {0} is not provisioned")]
    SubjectNotProvisioned(String),
    /// Authenticated, but the account's role does not grant access
    #[error("role does not grant {0} access")]
    InsufficientPermissions(Access),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: &'static str,
    error_code: &'static str,
    retryable: bool,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::AuthHeaderMissing => "auth_header_missing",
            AuthError::AuthHeaderMalformed => "auth_header_malformed",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            AuthError::NetworkFailure(_) => "key_source_unavailable",
            AuthError::MalformedKeySet(_) => "malformed_key_set",
            AuthError::UnsupportedKeyType(_) => "unsupported_key_type",
            AuthError::MalformedKeyEncoding(_) => "malformed_key_encoding",
            AuthError::KeyNotFound(_) => "key_not_found",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::IssuerMismatch(_) => "issuer_mismatch",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::TokenExpired(_) => "token_expired",
            AuthError::MissingExpiry => "missing_expiry",
            AuthError::TokenNotYetValid(_) => "token_not_yet_valid",
            AuthError::MissingSubject => "missing_subject",
            AuthError::SubjectNotProvisioned(_) => "subject_not_provisioned",
            AuthError::InsufficientPermissions(_) => "insufficient_permissions",
        }
    }

    /// Message safe to return to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::AuthHeaderMissing => "Authorization header is required",
            AuthError::AuthHeaderMalformed => {
                "Invalid authorization header format (expected 'Bearer <token>')"
            }
            AuthError::NetworkFailure(_) => {
                "Authentication is temporarily unavailable, please retry"
            }
            AuthError::TokenExpired(_) => "Token has expired",
            AuthError::SubjectNotProvisioned(_) => "User not found or has been deleted",
            AuthError::InsufficientPermissions(access) => access.denial_message(),
            _ => "Invalid token",
        }
    }

    /// Whether the same request may succeed later without a new token.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::NetworkFailure(_))
    }

    /// Get the HTTP status code for this error.
    ///
    /// Every authentication failure is a 401; only role checks answer 403.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retryable = self.is_retryable();
        let body = Json(AuthErrorBody {
            error: self.public_message(),
            error_code: self.error_code(),
            retryable,
        });
        let mut response = (status, body).into_response();
        if retryable {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(FAILURE_BACKOFF.as_secs()));
        }
        response
    }
}
