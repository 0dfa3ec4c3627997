// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Caching
//!
//! - The cache holds a single key set, the most recent successful fetch
//! - A key set is authoritative for the cache TTL (5 minutes by default)
//! - Refresh is lazy: the first request after expiry triggers it
//! - Concurrent misses coalesce into one upstream fetch, whatever its outcome
//! - A failed fetch never evicts the cached set, and is remembered briefly
//!
//! The upstream is abstracted behind [`KeySource`] so the cache can be
//! exercised without a network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use super::error::AuthError;

/// Default JWKS cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Upper bound on a single key-set fetch.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a failed fetch is replayed before the source is tried again.
pub const FAILURE_BACKOFF: Duration = Duration::from_secs(5);

/// The provider's current public signing keys.
#[derive(Debug, Clone, Deserialize)]
pub struct SigningKeySet {
    pub keys: Vec<SigningKey>,
}

impl SigningKeySet {
    /// Find the key with exactly this key id.
    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }
}

/// One verification key from a key set.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "JwkDocument")]
pub struct SigningKey {
    /// Key ID
    pub kid: Option<String>,
    /// Algorithm the provider pins this key to (optional)
    pub alg: Option<String>,
    /// Key-type-specific material, still base64url-encoded
    pub material: KeyMaterial,
}

/// Key material, tagged by key type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    Rsa { n: String, e: String },
    Ec { crv: String, x: String, y: String },
    /// Any key type we do not verify with; kept so one exotic key does not
    /// invalidate the whole set.
    Unsupported { kty: String },
}

/// Wire shape of a JWK entry.
#[derive(Deserialize)]
struct JwkDocument {
    kty: String,
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    alg: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
    #[serde(default)]
    crv: Option<String>,
    #[serde(default)]
    x: Option<String>,
    #[serde(default)]
    y: Option<String>,
}

impl TryFrom<JwkDocument> for SigningKey {
    type Error = String;

    fn try_from(doc: JwkDocument) -> Result<Self, Self::Error> {
        fn required(field: Option<String>, kty: &str, name: &str) -> Result<String, String> {
            field.ok_or_else(|| format!("{kty} key is missing `{name}`"))
        }

        let material = match doc.kty.as_str() {
            "RSA" => KeyMaterial::Rsa {
                n: required(doc.n, "RSA", "n")?,
                e: required(doc.e, "RSA", "e")?,
            },
            "EC" => KeyMaterial::Ec {
                crv: required(doc.crv, "EC", "crv")?,
                x: required(doc.x, "EC", "x")?,
                y: required(doc.y, "EC", "y")?,
            },
            _ => KeyMaterial::Unsupported { kty: doc.kty },
        };

        Ok(SigningKey {
            kid: doc.kid,
            alg: doc.alg,
            material,
        })
    }
}

/// Somewhere a key set can be fetched from.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Fetch the current key set. No retries.
    async fn fetch_key_set(&self) -> Result<SigningKeySet, AuthError>;

    /// Where the keys come from, for logs.
    fn describe(&self) -> &str;
}

/// Fetches the key set over HTTPS.
#[derive(Clone)]
pub struct HttpKeySource {
    /// JWKS URL (e.g. `https://<project>.supabase.co/auth/v1/.well-known/jwks.json`)
    jwks_url: String,
    /// HTTP client
    client: reqwest::Client,
}

impl HttpKeySource {
    /// Create a key source for the given JWKS endpoint.
    pub fn new(jwks_url: impl Into<String>) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| AuthError::NetworkFailure(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            jwks_url: jwks_url.into(),
            client,
        })
    }

    fn jwks_url(&self) -> &str {
        &self.jwks_url
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch_key_set(&self) -> Result<SigningKeySet, AuthError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::NetworkFailure(e.to_string()))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(AuthError::NetworkFailure(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AuthError::NetworkFailure(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| AuthError::MalformedKeySet(e.to_string()))
    }

    fn describe(&self) -> &str {
        self.jwks_url()
    }
}

/// JWKS cache entry.
struct CacheEntry {
    keys: Arc<SigningKeySet>,
    fetched_at: Instant,
}

struct FailedFetch {
    error: AuthError,
    failed_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entry: Option<CacheEntry>,
    /// Most recent fetch error; cleared by the next success
    last_failure: Option<FailedFetch>,
    /// Completed fetch attempts, successful or not
    attempts: u64,
}

impl CacheState {
    /// Outcome of the most recent fetch attempt, regardless of age.
    fn latest(&self) -> Option<Result<Arc<SigningKeySet>, AuthError>> {
        if let Some(failure) = &self.last_failure {
            return Some(Err(failure.error.clone()));
        }
        self.entry.as_ref().map(|entry| Ok(Arc::clone(&entry.keys)))
    }
}

/// Single-slot key-set cache in front of a [`KeySource`].
///
/// At most one fetch is in flight. Tasks that queued behind it take its
/// outcome, success or failure, instead of fetching again. A failure is
/// replayed for [`FAILURE_BACKOFF`] so an unreachable provider is not
/// hammered by every request.
pub struct JwksCache {
    source: Arc<dyn KeySource>,
    ttl: Duration,
    state: RwLock<CacheState>,
    /// Held by whichever task is fetching
    refresh: Mutex<()>,
}

impl JwksCache {
    pub fn new(source: Arc<dyn KeySource>) -> Self {
        Self {
            source,
            ttl: DEFAULT_CACHE_TTL,
            state: RwLock::new(CacheState::default()),
            refresh: Mutex::new(()),
        }
    }

    /// Create with custom cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Get the current key set, fetching it if the cached one is missing or stale.
    pub async fn key_set(&self) -> Result<Arc<SigningKeySet>, AuthError> {
        let seen = {
            let state = self.state.read().await;
            if let Some(result) = self.cached(&state) {
                return result;
            }
            state.attempts
        };

        let _guard = self.refresh.lock().await;

        {
            let state = self.state.read().await;
            // A fetch finished while we waited for the lock
            if state.attempts != seen {
                if let Some(result) = state.latest() {
                    return result;
                }
            }
            if let Some(result) = self.cached(&state) {
                return result;
            }
        }

        self.fetch_and_store().await
    }

    /// Force refresh the JWKS cache, ignoring any recorded failure.
    pub async fn refresh(&self) -> Result<Arc<SigningKeySet>, AuthError> {
        let _guard = self.refresh.lock().await;
        self.fetch_and_store().await
    }

    /// Check if JWKS is currently cached and valid.
    pub async fn is_cached(&self) -> bool {
        let state = self.state.read().await;
        matches!(self.cached(&state), Some(Ok(_)))
    }

    /// A fresh key set, or a failure still inside its backoff window.
    fn cached(&self, state: &CacheState) -> Option<Result<Arc<SigningKeySet>, AuthError>> {
        if let Some(entry) = &state.entry {
            if entry.fetched_at.elapsed() < self.ttl {
                return Some(Ok(Arc::clone(&entry.keys)));
            }
        }
        state
            .last_failure
            .as_ref()
            .filter(|failure| failure.failed_at.elapsed() < FAILURE_BACKOFF)
            .map(|failure| Err(failure.error.clone()))
    }

    async fn fetch_and_store(&self) -> Result<Arc<SigningKeySet>, AuthError> {
        let fetched = tokio::time::timeout(FETCH_TIMEOUT, self.source.fetch_key_set())
            .await
            .map_err(|_| {
                AuthError::NetworkFailure(format!(
                    "fetch from {} timed out after {}s",
                    self.source.describe(),
                    FETCH_TIMEOUT.as_secs()
                ))
            })
            .and_then(|result| result);

        let mut state = self.state.write().await;
        state.attempts += 1;

        match fetched {
            Ok(keys) => {
                let keys = Arc::new(keys);
                tracing::debug!(
                    source = %self.source.describe(),
                    keys = keys.keys.len(),
                    "JWKS refreshed"
                );
                state.entry = Some(CacheEntry {
                    keys: Arc::clone(&keys),
                    fetched_at: Instant::now(),
                });
                state.last_failure = None;
                Ok(keys)
            }
            Err(e) => {
                tracing::warn!(source = %self.source.describe(), error = %e, "JWKS fetch failed");
                state.last_failure = Some(FailedFetch {
                    error: e.clone(),
                    failed_at: Instant::now(),
                });
                Err(e)
            }
        }
    }
}
