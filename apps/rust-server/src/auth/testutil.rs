// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for authentication tests.
//!
//! Key pairs in `testdata/` were generated with OpenSSL; `jwks.json` publishes
//! the public halves of `rsa_k1.pem` (kid `k1`) and `ec_p256.pem` (kid `ec1`).
//! `rsa_k2.pem` is deliberately absent from the set.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

use super::error::AuthError;
use super::jwks::{JwksCache, KeySource, SigningKeySet};
use super::verifier::{TokenVerifier, VerifierConfig};

pub const ISSUER: &str = "https://example.supabase.co/auth/v1";
pub const SECRET: &str = "super-secret-jwt-token-with-at-least-32-characters";

const RSA_K1: &[u8] = include_bytes!("testdata/rsa_k1.pem");
const RSA_K2: &[u8] = include_bytes!("testdata/rsa_k2.pem");
const EC_P256: &[u8] = include_bytes!("testdata/ec_p256.pem");

pub fn jwks_fixture() -> SigningKeySet {
    serde_json::from_str(include_str!("testdata/jwks.json")).unwrap()
}

/// In-memory key source that counts fetches.
pub struct StubKeySource {
    keys: SigningKeySet,
    fetches: AtomicUsize,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl StubKeySource {
    pub fn new(keys: SigningKeySet) -> Self {
        Self {
            keys,
            fetches: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            delay: None,
        }
    }

    /// A source that always answers like an HTTP 500.
    pub fn failing() -> Self {
        let source = Self::new(SigningKeySet { keys: Vec::new() });
        source.set_failing(true);
        source
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySource for StubKeySource {
    async fn fetch_key_set(&self) -> Result<SigningKeySet, AuthError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuthError::NetworkFailure(
                "HTTP 500 Internal Server Error from JWKS endpoint".into(),
            ));
        }
        Ok(self.keys.clone())
    }

    fn describe(&self) -> &str {
        "stub"
    }
}

/// A verifier over `source` expecting [`ISSUER`].
pub fn verifier(source: Arc<StubKeySource>, fallback_secret: Option<&str>) -> TokenVerifier {
    TokenVerifier::new(
        JwksCache::new(source),
        VerifierConfig {
            issuer: ISSUER.to_string(),
            audience: None,
            fallback_secret: fallback_secret.map(str::to_string),
        },
    )
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Claims for `sub` that expire in an hour.
pub fn claims(sub: &str) -> Value {
    json!({
        "sub": sub,
        "iss": ISSUER,
        "aud": "authenticated",
        "exp": now() + 3600,
        "iat": now(),
        "email": "ana@example.com",
        "role": "authenticated",
        "session_id": "0b7e6f1c-2f0b-4a55-9d1e-5a3b3c2d1e0f",
    })
}

fn header(alg: Algorithm, kid: Option<&str>) -> Header {
    let mut header = Header::new(alg);
    header.kid = kid.map(str::to_string);
    header
}

/// Sign with the RSA key published as `k1`, under any kid.
pub fn sign_rsa_k1(kid: Option<&str>, claims: &Value) -> String {
    let key = EncodingKey::from_rsa_pem(RSA_K1).unwrap();
    encode(&header(Algorithm::RS256, kid), claims, &key).unwrap()
}

/// Sign with the RSA key that is not in the fixture set.
pub fn sign_rsa_k2(kid: Option<&str>, claims: &Value) -> String {
    let key = EncodingKey::from_rsa_pem(RSA_K2).unwrap();
    encode(&header(Algorithm::RS256, kid), claims, &key).unwrap()
}

/// Sign with the P-256 key published as `ec1`.
pub fn sign_ec(kid: Option<&str>, claims: &Value) -> String {
    let key = EncodingKey::from_ec_pem(EC_P256).unwrap();
    encode(&header(Algorithm::ES256, kid), claims, &key).unwrap()
}

pub fn sign_hs256(secret: &str, claims: &Value) -> String {
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&header(Algorithm::HS256, None), claims, &key).unwrap()
}
