use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::AuthError;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    #[display("student")]
    Student,
    #[display("instructor")]
    Instructor,
    #[display("admin")]
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 3] = [UserRole::Student, UserRole::Instructor, UserRole::Admin];

    #[inline]
    pub const fn code(&self) -> &'static str {
        use UserRole::*;
        match self {
            Student => "student",
            Instructor => "instructor",
            Admin => "admin",
        }
    }

    #[inline]
    pub const fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    #[inline]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|role| role.code().eq_ignore_ascii_case(code.trim()))
    }

    /// Roles a caller may pick for themselves at registration.
    #[inline]
    pub const fn is_self_assignable(&self) -> bool {
        !self.is_admin()
    }
}

impl FromStr for UserRole {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| AuthError::Validation(format!("Unknown role: {}", s)))
    }
}
