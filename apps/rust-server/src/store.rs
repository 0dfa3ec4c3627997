// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User store.
//!
//! The authorization gate only needs to know whether a subject has an
//! account; role checks also read the profile's role and admin flag.
//! [`UserDirectory`] is that seam; [`InMemoryStore`] is the implementation
//! used by the server and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::auth::Role;
use crate::models::UserProfile;

/// Access to the application's user accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Whether `user_id` has been provisioned.
    async fn user_exists(&self, user_id: &str) -> bool;

    async fn find(&self, user_id: &str) -> Option<UserProfile>;

    /// Create the profile unless it exists. Returns the stored profile and
    /// whether it was created by this call.
    async fn create_profile(
        &self,
        user_id: &str,
        display_name: Option<String>,
        email: Option<String>,
    ) -> (UserProfile, bool);

    /// All profiles, oldest first.
    async fn list(&self) -> Vec<UserProfile>;

    /// Change the role of an existing profile. `None` if there is no such
    /// profile.
    async fn set_role(&self, user_id: &str, role: Role) -> Option<UserProfile>;
}

#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<String, UserProfile>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-provision the given subjects.
    pub fn with_users<I, S>(user_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = Utc::now();
        let users = user_ids
            .into_iter()
            .map(Into::into)
            .map(|user_id: String| (user_id.clone(), UserProfile::member(user_id, now)))
            .collect();

        Self {
            users: RwLock::new(users),
        }
    }

    /// Grant the admin flag to the given subjects, provisioning any that do
    /// not exist yet.
    pub fn with_admins<I, S>(self, user_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = Utc::now();
        let mut users = self.users.into_inner();
        for user_id in user_ids.into_iter().map(Into::into) {
            users
                .entry(user_id.clone())
                .or_insert_with(|| UserProfile::member(user_id, now))
                .is_admin = true;
        }

        Self {
            users: RwLock::new(users),
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn user_exists(&self, user_id: &str) -> bool {
        self.users.read().await.contains_key(user_id)
    }

    async fn find(&self, user_id: &str) -> Option<UserProfile> {
        self.users.read().await.get(user_id).cloned()
    }

    async fn create_profile(
        &self,
        user_id: &str,
        display_name: Option<String>,
        email: Option<String>,
    ) -> (UserProfile, bool) {
        let mut users = self.users.write().await;
        if let Some(existing) = users.get(user_id) {
            return (existing.clone(), false);
        }

        let profile = UserProfile {
            display_name,
            email,
            ..UserProfile::member(user_id, Utc::now())
        };
        users.insert(user_id.to_string(), profile.clone());
        tracing::info!(user_id, "user profile created");
        (profile, true)
    }

    async fn list(&self) -> Vec<UserProfile> {
        let mut profiles: Vec<_> = self.users.read().await.values().cloned().collect();
        profiles.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        profiles
    }

    async fn set_role(&self, user_id: &str, role: Role) -> Option<UserProfile> {
        let mut users = self.users.write().await;
        let profile = users.get_mut(user_id)?;
        profile.role = role;
        tracing::info!(user_id, %role, "user role updated");
        Some(profile.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_users_exist() {
        let store = InMemoryStore::with_users(["user-1", "user-2"]);
        assert!(store.user_exists("user-1").await);
        assert!(store.user_exists("user-2").await);
        assert!(!store.user_exists("user-3").await);
    }

    #[tokio::test]
    async fn create_profile_is_idempotent() {
        let store = InMemoryStore::new();

        let (first, created) = store
            .create_profile("user-1", Some("Ana".into()), None)
            .await;
        assert!(created);
        assert_eq!(first.display_name.as_deref(), Some("Ana"));

        let (second, created) = store
            .create_profile("user-1", Some("Someone else".into()), None)
            .await;
        assert!(!created);
        assert_eq!(second, first);
        assert!(store.user_exists("user-1").await);
    }

    #[tokio::test]
    async fn new_profiles_are_plain_members() {
        let store = InMemoryStore::new();
        let (profile, _) = store.create_profile("user-1", None, None).await;
        assert_eq!(profile.role, Role::User);
        assert!(!profile.is_admin);
    }

    #[tokio::test]
    async fn seeded_admins_are_flagged_and_provisioned() {
        let store =
            InMemoryStore::with_users(["user-1", "admin-1"]).with_admins(["admin-1", "admin-2"]);

        assert!(!store.find("user-1").await.unwrap().is_admin);
        assert!(store.find("admin-1").await.unwrap().is_admin);
        assert!(store.find("admin-2").await.unwrap().is_admin);
        assert_eq!(store.list().await.len(), 3);
    }

    #[tokio::test]
    async fn set_role_updates_existing_profile_only() {
        let store = InMemoryStore::with_users(["user-1"]);

        let updated = store.set_role("user-1", Role::Teacher).await.unwrap();
        assert_eq!(updated.role, Role::Teacher);
        assert_eq!(store.find("user-1").await.unwrap().role, Role::Teacher);

        assert!(store.set_role("ghost", Role::Staff).await.is_none());
        assert!(!store.user_exists("ghost").await);
    }
}
