// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for authorization.
//!
//! Roles live on the user profile, not in the token. Checks run after the
//! authentication gate and reject with 403.
//!
//! ## Access Levels
//!
//! - `Admin` - profiles with the admin flag
//! - `AdminOrTeacher` - admins and `profe`
//! - `AdminStaffOrTeacher` - admins, `staff` and `profe`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Gym role stored on a profile. Administration is a separate flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular gym member
    #[default]
    User,
    /// Teacher / coach
    #[serde(rename = "profe")]
    Teacher,
    /// Front-desk and operations staff
    Staff,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Teacher => "profe",
            Role::Staff => "staff",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    /// Role names are matched exactly, as stored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "profe" => Ok(Role::Teacher),
            "staff" => Ok(Role::Staff),
            other => Err(format!(
                "invalid role `{other}`, expected one of: user, profe, staff"
            )),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access level an endpoint requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Admin,
    AdminOrTeacher,
    AdminStaffOrTeacher,
}

impl Access {
    /// Whether a profile with `role` and the admin flag passes this check.
    pub fn allows(self, role: Role, is_admin: bool) -> bool {
        if is_admin {
            return true;
        }
        match self {
            Access::Admin => false,
            Access::AdminOrTeacher => role == Role::Teacher,
            Access::AdminStaffOrTeacher => matches!(role, Role::Teacher | Role::Staff),
        }
    }

    pub fn denial_message(self) -> &'static str {
        match self {
            Access::Admin => "Admin access required",
            Access::AdminOrTeacher => "Admin or teacher access required",
            Access::AdminStaffOrTeacher => "Admin, staff or teacher access required",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Access::Admin => "admin",
            Access::AdminOrTeacher => "admin-or-teacher",
            Access::AdminStaffOrTeacher => "admin-staff-or-teacher",
        };
        f.write_str(name)
    }
}

/// Type-level access level, used by the [`RequireRole`](super::RequireRole)
/// extractor.
pub trait AccessRule: Send + Sync + 'static {
    const ACCESS: Access;
}

pub struct Admins;
pub struct Teachers;
pub struct StaffOrTeachers;

impl AccessRule for Admins {
    const ACCESS: Access = Access::Admin;
}

impl AccessRule for Teachers {
    const ACCESS: Access = Access::AdminOrTeacher;
}

impl AccessRule for StaffOrTeachers {
    const ACCESS: Access = Access::AdminStaffOrTeacher;
}
