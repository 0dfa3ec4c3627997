// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! The gate in `middleware.rs` does the verification; handlers behind it use
//! `Auth` to read the result, or `RequireRole` to also check the profile's
//! role:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//!
//! async fn admin_handler(admin: AdminOnly) -> impl IntoResponse {
//!     // admin.profile.is_admin is true
//! }
//! ```

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::roles::{AccessRule, Admins, StaffOrTeachers, Teachers};
use super::{AuthError, AuthenticatedUser};
use crate::models::UserProfile;
use crate::state::AppState;

/// Extractor for the user verified by the authorization gate.
///
/// Rejects with [`AuthError::AuthHeaderMissing`] when the gate did not run,
/// e.g. on a public path.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(Auth)
            .ok_or(AuthError::AuthHeaderMissing)
    }
}

/// Extractor that requires the caller's profile to pass access rule `R`.
///
/// A subject without a profile counts as a plain member. Rejects with
/// [`AuthError::InsufficientPermissions`] (403).
pub struct RequireRole<R: AccessRule> {
    pub user: AuthenticatedUser,
    pub profile: UserProfile,
    rule: PhantomData<R>,
}

pub type AdminOnly = RequireRole<Admins>;
pub type AdminOrTeacher = RequireRole<Teachers>;
pub type AdminStaffOrTeacher = RequireRole<StaffOrTeachers>;

impl<R: AccessRule> FromRequestParts<AppState> for RequireRole<R> {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        let profile = state
            .users
            .find(&user.user_id)
            .await
            .unwrap_or_else(|| UserProfile::member(user.user_id.as_str(), chrono::Utc::now()));

        if !R::ACCESS.allows(profile.role, profile.is_admin) {
            tracing::debug!(
                user_id = %user.user_id,
                role = %profile.role,
                required = %R::ACCESS,
                "role check failed"
            );
            return Err(AuthError::InsufficientPermissions(R::ACCESS));
        }

        Ok(Self {
            user,
            profile,
            rule: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::roles::{Access, Role};
    use crate::auth::testutil::{jwks_fixture, verifier, StubKeySource};
    use crate::store::{InMemoryStore, UserDirectory};
    use axum::http::Request;

    fn parts() -> Parts {
        Request::builder()
            .uri("/test")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn user(user_id: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: user_id.to_string(),
            email: None,
            role: Some("authenticated".to_string()),
            session_id: None,
            issuer: "https://example.supabase.co/auth/v1".to_string(),
            expires_at: 0,
        }
    }

    fn gated_parts(user_id: &str) -> Parts {
        let mut parts = parts();
        parts.extensions.insert(user(user_id));
        parts
    }

    async fn state_with(profiles: &[(&str, Role)], admins: &[&str]) -> AppState {
        let store = InMemoryStore::with_users(profiles.iter().map(|(id, _)| *id))
            .with_admins(admins.iter().copied());
        for (id, role) in profiles {
            store.set_role(id, *role).await;
        }
        let source = Arc::new(StubKeySource::new(jwks_fixture()));
        AppState::new(verifier(source, None), Arc::new(store))
    }

    #[tokio::test]
    async fn reads_user_from_extensions() {
        let mut parts = gated_parts("user_from_middleware");

        let Auth(user) = Auth::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.user_id, "user_from_middleware");
    }

    #[tokio::test]
    async fn rejects_without_gate() {
        let mut parts = parts();
        let result = Auth::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AuthError::AuthHeaderMissing)));
    }

    #[tokio::test]
    async fn admin_only_rejects_members_with_403() {
        let state = state_with(&[("member", Role::Teacher)], &[]).await;
        let result = AdminOnly::from_request_parts(&mut gated_parts("member"), &state).await;

        let Err(err) = result else {
            panic!("member passed the admin check");
        };
        assert!(matches!(err, AuthError::InsufficientPermissions(Access::Admin)));
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_only_accepts_admins() {
        let state = state_with(&[], &["boss"]).await;
        let admin = AdminOnly::from_request_parts(&mut gated_parts("boss"), &state)
            .await
            .unwrap();
        assert_eq!(admin.user.user_id, "boss");
        assert!(admin.profile.is_admin);
    }

    #[tokio::test]
    async fn teacher_rule_admits_profe_but_not_staff() {
        let state = state_with(&[("coach", Role::Teacher), ("desk", Role::Staff)], &[]).await;

        let coach = AdminOrTeacher::from_request_parts(&mut gated_parts("coach"), &state).await;
        assert!(coach.is_ok());

        let desk = AdminOrTeacher::from_request_parts(&mut gated_parts("desk"), &state).await;
        assert!(matches!(
            desk,
            Err(AuthError::InsufficientPermissions(Access::AdminOrTeacher))
        ));
    }

    #[tokio::test]
    async fn staff_rule_admits_staff_and_admins() {
        let state = state_with(&[("desk", Role::Staff), ("member", Role::User)], &["boss"]).await;

        for allowed in ["desk", "boss"] {
            let result =
                AdminStaffOrTeacher::from_request_parts(&mut gated_parts(allowed), &state).await;
            assert!(result.is_ok(), "{allowed} should pass");
        }

        let member =
            AdminStaffOrTeacher::from_request_parts(&mut gated_parts("member"), &state).await;
        assert!(matches!(
            member,
            Err(AuthError::InsufficientPermissions(Access::AdminStaffOrTeacher))
        ));
    }

    #[tokio::test]
    async fn missing_profile_counts_as_member() {
        let state = state_with(&[], &[]).await;
        let result =
            AdminStaffOrTeacher::from_request_parts(&mut gated_parts("nobody"), &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions(_))));
    }

    #[tokio::test]
    async fn role_check_without_gate_is_401() {
        let state = state_with(&[], &["boss"]).await;
        let result = AdminOnly::from_request_parts(&mut parts(), &state).await;
        assert!(matches!(result, Err(AuthError::AuthHeaderMissing)));
    }
}
