// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response types for the account endpoints. All types derive
//! `Serialize`/`Deserialize` and `ToSchema` for JSON handling and OpenAPI
//! documentation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;

/// A provisioned application user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UserProfile {
    /// Identity provider subject (`sub` claim)
    pub user_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    /// Administrators pass every role check
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// A plain member profile with no display name or email.
    pub fn member(user_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
            email: None,
            role: Role::User,
            is_admin: false,
            created_at,
        }
    }
}

/// Body of `POST /api/me/setup`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSetupRequest {
    /// Must equal the authenticated subject
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Body of `PUT /api/admin/users/{id}/role`.
///
/// `role` is kept as a string so unknown names get a descriptive 400.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    /// One of `user`, `profe`, `staff`
    pub role: String,
}
