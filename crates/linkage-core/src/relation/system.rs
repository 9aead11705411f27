//! Built-in relations between the platform's own collections.

use super::types::RelationMeta;

/// (collection, field, related collection) of every built-in relation.
const SYSTEM_RELATIONS: &[(&str, &str, &str)] = &[
    ("linkage_users", "role", "linkage_roles"),
    ("linkage_permissions", "role", "linkage_roles"),
    ("linkage_files", "uploaded_by", "linkage_users"),
    ("linkage_files", "modified_by", "linkage_users"),
    ("linkage_revisions", "activity", "linkage_activity"),
];

/// Metadata rows for the built-in relations.
///
/// These rows are never persisted; readers union them with the stored rows.
pub fn system_relation_rows() -> Vec<RelationMeta> {
    SYSTEM_RELATIONS
        .iter()
        .map(|(collection, field, related)| {
            RelationMeta::new(*collection, *field)
                .with_one_collection(*related)
                .as_system()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_rows_are_flagged() {
        let rows = system_relation_rows();
        assert_eq!(rows.len(), SYSTEM_RELATIONS.len());
        assert!(rows.iter().all(|r| r.system && r.id.is_none()));
        assert!(rows
            .iter()
            .any(|r| r.many_collection == "linkage_users" && r.many_field == "role"));
    }
}
