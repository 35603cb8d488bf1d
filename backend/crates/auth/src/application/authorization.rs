//! Authorization Engine
//!
//! Role to permission resolution and the three access checks used by
//! protected routes. Failures here are always `AuthError::Forbidden` (403),
//! never an authentication error.

use std::collections::HashMap;

use crate::domain::value_object::{
    permission::{PermissionList, RoleDefinition},
    user_id::{SessionId, UserId},
    user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

/// The caller behind a verified access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub email: String,
    pub role: UserRole,
    pub session_id: SessionId,
}

fn builtin_roles() -> HashMap<String, PermissionList> {
    [
        (UserRole::Admin, vec!["*"]),
        (
            UserRole::Instructor,
            vec![
                "courses:read",
                "courses:write",
                "lessons:write",
                "quizzes:write",
                "students:read",
                "analytics:read",
            ],
        ),
        (
            UserRole::Student,
            vec!["courses:read", "lessons:read", "quizzes:take", "progress:write"],
        ),
    ]
    .into_iter()
    .map(|(role, perms)| (role.code().to_string(), PermissionList::new(perms)))
    .collect()
}

#[derive(Debug, Clone)]
pub struct AuthorizationEngine {
    roles: HashMap<String, PermissionList>,
}

impl Default for AuthorizationEngine {
    fn default() -> Self {
        Self {
            roles: builtin_roles(),
        }
    }
}

impl AuthorizationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in table overlaid with stored role definitions. A stored role
    /// replaces the built-in entry of the same name.
    pub fn with_roles(definitions: impl IntoIterator<Item = RoleDefinition>) -> Self {
        let mut engine = Self::default();
        for def in definitions {
            engine.roles.insert(def.name, def.permissions);
        }
        engine
    }

    /// Unknown roles resolve to no permissions.
    pub fn resolve_permissions(&self, role: &str) -> Vec<String> {
        self.roles
            .get(role)
            .map(|p| p.as_slice().to_vec())
            .unwrap_or_default()
    }

    /// Allow if the user holds any of `required`. Admins and wildcard holders
    /// always pass; an empty requirement always passes.
    pub fn authorize(&self, user: &AuthenticatedUser, required: &[&str]) -> AuthResult<()> {
        if required.is_empty() || user.role.is_admin() {
            return Ok(());
        }

        let Some(granted) = self.roles.get(user.role.code()) else {
            return Err(self.deny(user, required));
        };
        if granted.is_wildcard() || required.iter().any(|p| granted.contains(p)) {
            return Ok(());
        }
        Err(self.deny(user, required))
    }

    pub fn authorize_role(&self, user: &AuthenticatedUser, allowed: &[UserRole]) -> AuthResult<()> {
        if allowed.contains(&user.role) {
            Ok(())
        } else {
            tracing::debug!(user_id = %user.user_id, role = %user.role, "Role not allowed");
            Err(AuthError::Forbidden)
        }
    }

    /// Admin, or the owner of the resource
    pub fn authorize_ownership(&self, user: &AuthenticatedUser, owner_id: &UserId) -> AuthResult<()> {
        if user.role.is_admin() || user.user_id == *owner_id {
            Ok(())
        } else {
            tracing::debug!(user_id = %user.user_id, owner_id = %owner_id, "Not the resource owner");
            Err(AuthError::Forbidden)
        }
    }

    fn deny(&self, user: &AuthenticatedUser, required: &[&str]) -> AuthError {
        tracing::debug!(
            user_id = %user.user_id,
            role = %user.role,
            required = ?required,
            "Permission denied"
        );
        AuthError::Forbidden
    }
}
