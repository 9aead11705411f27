//! Caller identity and granted permissions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// An operation a permission row grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Create records.
    Create,
    /// Read records.
    Read,
    /// Update records.
    Update,
    /// Delete records.
    Delete,
    /// Share records.
    Share,
}

impl Action {
    /// Parse an action name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Action::Create),
            "read" => Some(Action::Read),
            "update" => Some(Action::Update),
            "delete" => Some(Action::Delete),
            "share" => Some(Action::Share),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Read => write!(f, "read"),
            Action::Update => write!(f, "update"),
            Action::Delete => write!(f, "delete"),
            Action::Share => write!(f, "share"),
        }
    }
}

/// A permission row: `action` on `collection`, limited to `fields`.
///
/// `fields` of `None` means the row grants no field access at all; a list
/// containing `"*"` grants every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Collection the row applies to.
    pub collection: String,
    /// Granted action.
    pub action: Action,
    /// Readable/writable fields.
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

impl Permission {
    /// Create a permission row with no field access.
    pub fn new(collection: impl Into<String>, action: Action) -> Self {
        Self {
            collection: collection.into(),
            action,
            fields: None,
        }
    }

    /// Read permission on every field of `collection`.
    pub fn read_all(collection: impl Into<String>) -> Self {
        Self::new(collection, Action::Read).with_fields(["*"])
    }

    /// Limit the row to the given fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Parse a permission from a string.
    ///
    /// Format: `action:collection[:field,field,...]`, e.g. `read:articles:*`
    /// or `read:authors:id,name`.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let mut parts = s.splitn(3, ':');
        let action = parts.next().unwrap_or_default();
        let action = Action::parse(action)
            .ok_or_else(|| Error::invalid(format!("unknown permission action: {}", action)))?;
        let collection = match parts.next() {
            Some(c) if !c.is_empty() => c,
            _ => return Err(Error::invalid("permission requires a collection")),
        };

        let permission = Self::new(collection, action);
        Ok(match parts.next() {
            Some(fields) => permission.with_fields(fields.split(',').filter(|f| !f.is_empty())),
            None => permission,
        })
    }

    /// Check if the row grants every field.
    pub fn has_wildcard(&self) -> bool {
        self.fields
            .as_ref()
            .is_some_and(|fields| fields.iter().any(|f| f == "*"))
    }
}

/// The caller of a reconciler operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accountability {
    /// User identifier.
    #[serde(default)]
    pub user: Option<String>,
    /// Role identifier.
    #[serde(default)]
    pub role: Option<String>,
    /// Full administrative privilege.
    #[serde(default)]
    pub admin: bool,
    /// Permission rows granted to the role.
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Accountability {
    /// A non-administrative caller with no permissions.
    pub fn new() -> Self {
        Self::default()
    }

    /// An administrative caller.
    pub fn admin() -> Self {
        Self {
            admin: true,
            ..Self::default()
        }
    }

    /// Set the user.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Grant a permission row.
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    /// Grant several permission rows.
    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions.extend(permissions);
        self
    }

    /// Check if the caller has full administrative privilege.
    pub fn is_admin(&self) -> bool {
        self.admin
    }

    /// First permission row for `action` on `collection`.
    pub fn permission(&self, collection: &str, action: Action) -> Option<&Permission> {
        self.permissions
            .iter()
            .find(|p| p.action == action && p.collection == collection)
    }

    /// Check if any permission row grants `action` on `collection`.
    pub fn can(&self, collection: &str, action: Action) -> bool {
        self.is_admin() || self.permission(collection, action).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_parse() {
        let p = Permission::parse("read:articles").unwrap();
        assert_eq!(p.action, Action::Read);
        assert_eq!(p.collection, "articles");
        assert!(p.fields.is_none());

        let p = Permission::parse("read:authors:id,name").unwrap();
        assert_eq!(
            p.fields,
            Some(vec!["id".to_string(), "name".to_string()])
        );
        assert!(!p.has_wildcard());

        assert!(Permission::parse("read:articles:*").unwrap().has_wildcard());
        assert!(Permission::parse("fly:articles").unwrap_err().is_invalid_payload());
        assert!(Permission::parse("read").unwrap_err().is_invalid_payload());
    }

    #[test]
    fn test_accountability_lookup() {
        let acc = Accountability::new()
            .with_role("editor")
            .with_permission(Permission::read_all("articles"))
            .with_permission(Permission::new("articles", Action::Update));

        assert!(!acc.is_admin());
        assert!(acc.can("articles", Action::Read));
        assert!(acc.can("articles", Action::Update));
        assert!(!acc.can("authors", Action::Read));
        assert!(acc.permission("articles", Action::Read).unwrap().has_wildcard());

        assert!(Accountability::admin().can("anything", Action::Delete));
    }

    #[test]
    fn test_accountability_from_json() {
        let acc: Accountability = serde_json::from_str(
            r#"{
                "role": "editor",
                "permissions": [
                    {"collection": "articles", "action": "read", "fields": ["*"]}
                ]
            }"#,
        )
        .unwrap();

        assert!(!acc.admin);
        assert_eq!(acc.permissions[0].action, Action::Read);
    }
}
