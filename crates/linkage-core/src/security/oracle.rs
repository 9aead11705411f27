//! Permission oracle: collection and field allow-lists for a caller.

use std::collections::{BTreeSet, HashMap};

use super::accountability::{Accountability, Action};

/// Fields a caller may access on one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedFields {
    /// Every field (wildcard).
    All,
    /// Only the listed fields.
    Only(BTreeSet<String>),
}

impl AllowedFields {
    /// Check if `field` is allowed.
    pub fn allows(&self, field: &str) -> bool {
        match self {
            AllowedFields::All => true,
            AllowedFields::Only(fields) => fields.contains(field),
        }
    }

    fn merge(&mut self, other: AllowedFields) {
        match (self, other) {
            (AllowedFields::All, _) => {}
            (this, AllowedFields::All) => *this = AllowedFields::All,
            (AllowedFields::Only(fields), AllowedFields::Only(more)) => fields.extend(more),
        }
    }
}

/// Computes what a caller may access.
pub trait PermissionOracle: Send + Sync {
    /// Per-collection field allow-lists for `action`.
    ///
    /// Collections missing from the map are not accessible at all.
    fn allowed_fields(
        &self,
        accountability: &Accountability,
        action: Action,
    ) -> HashMap<String, AllowedFields>;
}

/// Oracle reading the permission rows carried by the accountability.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountabilityOracle;

impl PermissionOracle for AccountabilityOracle {
    fn allowed_fields(
        &self,
        accountability: &Accountability,
        action: Action,
    ) -> HashMap<String, AllowedFields> {
        let mut allowed: HashMap<String, AllowedFields> = HashMap::new();

        for permission in accountability
            .permissions
            .iter()
            .filter(|p| p.action == action)
        {
            let fields = if permission.has_wildcard() {
                AllowedFields::All
            } else {
                AllowedFields::Only(
                    permission
                        .fields
                        .iter()
                        .flatten()
                        .cloned()
                        .collect(),
                )
            };

            match allowed.get_mut(&permission.collection) {
                Some(existing) => existing.merge(fields),
                None => {
                    allowed.insert(permission.collection.clone(), fields);
                }
            }
        }

        allowed
    }
}
