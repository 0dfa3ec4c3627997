// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin endpoints for user management.
//!
//! Every handler takes [`AdminOnly`], so non-admins get 403 before the body
//! is read.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use crate::auth::{AdminOnly, Role};
use crate::error::ApiError;
use crate::models::{UpdateRoleRequest, UserProfile};
use crate::state::AppState;

/// List every provisioned user.
#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All user profiles", body = Vec<UserProfile>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required"),
    )
)]
pub async fn list_users(
    _admin: AdminOnly,
    State(state): State<AppState>,
) -> Json<Vec<UserProfile>> {
    Json(state.users.list().await)
}

/// Change a user's role.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    tag = "Admin",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "User ID (token subject)")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserProfile),
        (status = 400, description = "Unknown role or invalid body"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn update_user_role(
    admin: AdminOnly,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<UpdateRoleRequest>, JsonRejection>,
) -> Result<Json<UserProfile>, ApiError> {
    let Json(request) = payload?;
    let role: Role = request
        .role
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid role. Valid roles: user, profe, staff"))?;

    let profile = state
        .users
        .set_role(&user_id, role)
        .await
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!(
        admin_id = %admin.user.user_id,
        user_id = %profile.user_id,
        %role,
        "admin changed user role"
    );
    Ok(Json(profile))
}
