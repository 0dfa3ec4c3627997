// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use super::error::AuthError;

/// Claims read from a Supabase access token.
///
/// The registered claims are optional here so that a missing one maps to a
/// precise [`AuthError`] in [`TokenClaims::validate`] instead of a generic
/// decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    #[serde(default)]
    pub sub: Option<String>,
    /// Issuer (`<SUPABASE_URL>/auth/v1`)
    #[serde(default)]
    pub iss: Option<String>,
    /// Expiration timestamp
    #[serde(default, deserialize_with = "numeric_date")]
    pub exp: Option<i64>,
    /// Not before timestamp
    #[serde(default, deserialize_with = "numeric_date")]
    pub nbf: Option<i64>,
    /// Audience (`authenticated` for signed-in Supabase users)
    #[serde(default)]
    pub aud: Option<Audience>,
    #[serde(default)]
    pub email: Option<String>,
    /// Supabase database role
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// NumericDate may carry a fraction; it is floored to whole seconds.
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(secs) if secs.is_finite() => Ok(Some(secs.floor() as i64)),
        Some(_) => Err(serde::de::Error::custom("NumericDate must be finite")),
    }
}

/// `aud` may be a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::One(aud) => aud == expected,
            Audience::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// What a token's claims must satisfy.
#[derive(Debug, Clone)]
pub struct ClaimRules {
    /// Exact issuer string
    pub issuer: String,
    /// Required audience, if any
    pub audience: Option<String>,
}

impl TokenClaims {
    /// Validate the claims at `now` (Unix seconds) and produce the identity.
    pub fn validate(self, rules: &ClaimRules, now: i64) -> Result<AuthenticatedUser, AuthError> {
        if self.iss.as_deref() != Some(rules.issuer.as_str()) {
            return Err(AuthError::IssuerMismatch(self.iss));
        }

        let expires_at = self.exp.ok_or(AuthError::MissingExpiry)?;
        if expires_at <= now {
            return Err(AuthError::TokenExpired(expires_at));
        }

        if let Some(nbf) = self.nbf {
            if nbf > now {
                return Err(AuthError::TokenNotYetValid(nbf));
            }
        }

        if let Some(expected) = &rules.audience {
            if !self.aud.as_ref().is_some_and(|aud| aud.contains(expected)) {
                return Err(AuthError::AudienceMismatch);
            }
        }

        let user_id = self
            .sub
            .filter(|sub| !sub.is_empty())
            .ok_or(AuthError::MissingSubject)?;

        Ok(AuthenticatedUser {
            user_id,
            email: self.email,
            role: self.role,
            session_id: self.session_id,
            issuer: rules.issuer.clone(),
            expires_at,
        })
    }
}

/// Authenticated user information extracted from a verified JWT.
///
/// Lives in the request extensions for the duration of one request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user ID (`sub` claim)
    pub user_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Provider role claim (e.g. `authenticated`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Session ID (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Issuer the token was validated against
    #[serde(skip)]
    pub issuer: String,

    /// Token expiration (Unix timestamp)
    pub expires_at: i64,
}
