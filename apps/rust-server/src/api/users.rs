// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{Auth, AuthenticatedUser};
use crate::error::ApiError;
use crate::models::{UserProfile, UserSetupRequest};
use crate::state::AppState;

/// Response for GET /api/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// User's unique ID (Supabase `sub`)
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Session ID (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Token expiry (Unix timestamp)
    pub expires_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
}

impl UserMeResponse {
    fn new(user: AuthenticatedUser, profile: Option<UserProfile>) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            role: user.role,
            session_id: user.session_id,
            expires_at: user.expires_at,
            profile,
        }
    }
}

/// Get the current authenticated user's information.
#[utoipa::path(
    get,
    path = "/api/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token, or user not provisioned"),
    )
)]
pub async fn get_current_user(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Json<UserMeResponse> {
    let profile = state.users.find(&user.user_id).await;
    Json(UserMeResponse::new(user, profile))
}

/// First-time account setup.
///
/// The token must be valid but the account does not have to exist yet.
/// Calling it again for an existing account returns the stored profile.
#[utoipa::path(
    post,
    path = "/api/me/setup",
    tag = "Users",
    security(("bearer" = [])),
    request_body = UserSetupRequest,
    responses(
        (status = 201, description = "Profile created", body = UserProfile),
        (status = 200, description = "Profile already existed", body = UserProfile),
        (status = 400, description = "Body is not a valid setup request"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 403, description = "user_id does not match the token subject"),
    )
)]
pub async fn setup_user(
    Auth(user): Auth,
    State(state): State<AppState>,
    payload: Result<Json<UserSetupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    let Json(request) = payload?;
    if request.user_id != user.user_id {
        return Err(ApiError::forbidden(
            "user_id does not match the authenticated user",
        ));
    }

    let (profile, created) = state
        .users
        .create_profile(&user.user_id, request.display_name, user.email)
        .await;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(profile)))
}
