// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! A token is checked in this order:
//!
//! 1. Header is decoded (unverified) for `alg` and `kid`. The JWKS path only
//!    accepts RSA and EC signature algorithms.
//! 2. `kid` is resolved against the cached key set. No `kid`, or no key with
//!    that exact `kid`, is `KeyNotFound`.
//! 3. The key is decoded and the signature checked.
//! 4. Claims are validated: exact issuer, `exp` strictly in the future,
//!    optional `nbf`/audience, non-empty `sub`.
//!
//! If a shared secret is configured and the JWKS path fails, the token gets
//! one more attempt as an HMAC token under that secret, with the same claim
//! rules. JWKS is always tried first.

use std::fmt;

use chrono::Utc;
use jsonwebtoken::{
    decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Header, Validation,
};

use super::claims::{AuthenticatedUser, ClaimRules, TokenClaims};
use super::error::AuthError;
use super::jwks::JwksCache;
use super::keys;

/// Verifier settings derived from the application config.
#[derive(Clone)]
pub struct VerifierConfig {
    /// Expected `iss`, compared by string equality
    pub issuer: String,
    /// Expected `aud` (optional)
    pub audience: Option<String>,
    /// Shared secret for the HMAC fallback; `None` disables it
    pub fallback_secret: Option<String>,
}

impl fmt::Debug for VerifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifierConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field(
                "fallback_secret",
                &self.fallback_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Verifies bearer tokens against the provider's keys.
pub struct TokenVerifier {
    keys: JwksCache,
    rules: ClaimRules,
    fallback_secret: Option<String>,
}

impl TokenVerifier {
    pub fn new(keys: JwksCache, config: VerifierConfig) -> Self {
        Self {
            keys,
            rules: ClaimRules {
                issuer: config.issuer,
                audience: config.audience,
            },
            fallback_secret: config.fallback_secret,
        }
    }

    /// The key-set cache backing the JWKS path.
    pub fn keys(&self) -> &JwksCache {
        &self.keys
    }

    /// Whether the shared-secret fallback is enabled.
    pub fn has_fallback(&self) -> bool {
        self.fallback_secret.is_some()
    }

    /// Verify a raw token and return the identity it carries.
    pub async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        self.verify_at(token, Utc::now().timestamp()).await
    }

    pub(crate) async fn verify_at(
        &self,
        token: &str,
        now: i64,
    ) -> Result<AuthenticatedUser, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::MalformedToken(e.to_string()))?;

        let primary = self.verify_with_jwks(token, &header, now).await;
        let Some(secret) = self.fallback_secret.as_deref() else {
            return primary;
        };
        let primary_err = match primary {
            Ok(user) => return Ok(user),
            Err(e) => e,
        };

        match verify_with_secret(token, &header, secret, &self.rules, now) {
            Ok(user) => {
                tracing::debug!(
                    jwks_error = %primary_err,
                    "token accepted by shared-secret fallback"
                );
                Ok(user)
            }
            // The fallback's verdict is only meaningful for HMAC tokens
            Err(fallback_err) if is_hmac(header.alg) => Err(fallback_err),
            Err(_) => Err(primary_err),
        }
    }

    async fn verify_with_jwks(
        &self,
        token: &str,
        header: &Header,
        now: i64,
    ) -> Result<AuthenticatedUser, AuthError> {
        if !is_asymmetric(header.alg) {
            return Err(AuthError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }

        let kid = header.kid.as_deref().ok_or(AuthError::KeyNotFound(None))?;
        let key_set = self.keys.key_set().await?;
        let key = key_set
            .find(kid)
            .ok_or_else(|| AuthError::KeyNotFound(Some(kid.to_string())))?;

        // A key pinned to one algorithm must not verify another
        if let Some(pinned) = &key.alg {
            if pinned.parse::<Algorithm>().ok() != Some(header.alg) {
                return Err(AuthError::InvalidSignature);
            }
        }

        let public_key = keys::decode(key)?;
        if !public_key.supports(header.alg) {
            return Err(AuthError::InvalidSignature);
        }

        decode_claims(token, &public_key.decoding_key()?, header.alg)?.validate(&self.rules, now)
    }
}

fn verify_with_secret(
    token: &str,
    header: &Header,
    secret: &str,
    rules: &ClaimRules,
    now: i64,
) -> Result<AuthenticatedUser, AuthError> {
    if !is_hmac(header.alg) {
        return Err(AuthError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
    }

    let key = DecodingKey::from_secret(secret.as_bytes());
    decode_claims(token, &key, header.alg)?.validate(rules, now)
}

/// Check the signature and deserialize the claims. Claim rules are applied
/// by [`TokenClaims::validate`], not by `jsonwebtoken`.
fn decode_claims(token: &str, key: &DecodingKey, alg: Algorithm) -> Result<TokenClaims, AuthError> {
    let mut validation = Validation::new(alg);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    decode::<TokenClaims>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => AuthError::MalformedToken(e.to_string()),
            _ => AuthError::InvalidSignature,
        })
}

fn is_asymmetric(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
            | Algorithm::ES256
            | Algorithm::ES384
    )
}

fn is_hmac(alg: Algorithm) -> bool {
    matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}
