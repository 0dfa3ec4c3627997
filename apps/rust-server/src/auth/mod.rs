// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Supabase JWT authentication for the Entrenar API.
//!
//! ## Auth Flow
//!
//! 1. Frontend authenticates the user with Supabase
//! 2. Frontend sends `Authorization: Bearer <Supabase JWT>`
//! 3. Server:
//!    - Fetches the Supabase JWKS via HTTPS (cached, 5 minute TTL)
//!    - Verifies the RSA/EC signature, exact issuer, and expiry
//!    - Optionally falls back to the shared JWT secret (local development)
//!    - Checks the subject (`sub`) has an account
//!    - Exposes the identity to handlers through the `Auth` extractor
//! 4. Role-gated handlers use `RequireRole` (`AdminOnly`, ...), which reads
//!    the role and admin flag from the user's profile
//!
//! ## Security
//!
//! - All endpoints except the health check require authentication
//! - `exp` is mandatory and must be strictly in the future
//! - HMAC tokens are never accepted on the JWKS path
//! - Authentication rejections are 401, role rejections are 403, and neither
//!   echoes token or key contents

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod keys;
pub mod middleware;
pub mod roles;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testutil;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::{AdminOnly, AdminOrTeacher, AdminStaffOrTeacher, Auth, RequireRole};
pub use jwks::{HttpKeySource, JwksCache, KeySource};
pub use middleware::{require_auth, GatePolicy};
pub use roles::{Access, Role};
pub use verifier::{TokenVerifier, VerifierConfig};
