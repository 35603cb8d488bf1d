//! Permission lists
//!
//! Stored permission lists arrive in several shapes: a JSON array, a JSON
//! string holding an array, or a comma-separated string. [`PermissionList::parse`]
//! is the only place that shape is inspected.

use serde::{Deserialize, Serialize};

/// Permission that grants everything
pub const WILDCARD: &str = "*";

/// Ordered, de-duplicated permission names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionList(Vec<String>);

impl PermissionList {
    pub fn new<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Vec::new();
        for permission in permissions {
            let permission: String = permission.into();
            let permission = permission.trim();
            if !permission.is_empty() && !list.iter().any(|p: &String| p == permission) {
                list.push(permission.to_string());
            }
        }
        Self(list)
    }

    /// Parse a stored permission value of any supported shape.
    pub fn parse(raw: &serde_json::Value) -> Self {
        match raw {
            serde_json::Value::Array(items) => {
                Self::new(items.iter().filter_map(|v| v.as_str()))
            }
            serde_json::Value::String(text) => Self::parse_text(text),
            serde_json::Value::Null => Self::default(),
            other => {
                tracing::warn!(value = %other, "Unrecognized permission list shape; treating as empty");
                Self::default()
            }
        }
    }

    fn parse_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.starts_with('[') {
            match serde_json::from_str::<Vec<String>>(trimmed) {
                Ok(items) => return Self::new(items),
                Err(e) => {
                    tracing::warn!(error = %e, "Malformed permission array; treating as empty");
                    return Self::default();
                }
            }
        }
        Self::new(trimmed.split(','))
    }

    pub fn is_wildcard(&self) -> bool {
        self.0.iter().any(|p| p == WILDCARD)
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.iter().any(|p| p == permission)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A named role and what it grants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    pub name: String,
    pub permissions: PermissionList,
}

impl RoleDefinition {
    pub fn new(name: impl Into<String>, permissions: PermissionList) -> Self {
        Self {
            name: name.into(),
            permissions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_array() {
        let list = PermissionList::parse(&json!(["courses:read", "courses:write"]));
        assert_eq!(list.as_slice(), ["courses:read", "courses:write"]);
    }

    #[test]
    fn test_parse_json_text() {
        let list = PermissionList::parse(&json!("[\"courses:read\",\"lessons:read\"]"));
        assert_eq!(list.as_slice(), ["courses:read", "lessons:read"]);
    }

    #[test]
    fn test_parse_comma_separated() {
        let list = PermissionList::parse(&json!("courses:read, lessons:read,,"));
        assert_eq!(list.as_slice(), ["courses:read", "lessons:read"]);
    }

    #[test]
    fn test_parse_keeps_order_and_dedups() {
        let list = PermissionList::parse(&json!(["b", "a", "b"]));
        assert_eq!(list.as_slice(), ["b", "a"]);
    }

    #[test]
    fn test_malformed_shapes_are_empty() {
        assert!(PermissionList::parse(&json!("[not json")).is_empty());
        assert!(PermissionList::parse(&json!(42)).is_empty());
        assert!(PermissionList::parse(&serde_json::Value::Null).is_empty());
    }

    #[test]
    fn test_wildcard() {
        assert!(PermissionList::parse(&json!(["*"])).is_wildcard());
        assert!(!PermissionList::parse(&json!(["courses:read"])).is_wildcard());
    }
}
