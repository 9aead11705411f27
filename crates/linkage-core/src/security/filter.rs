//! Dropping relations a caller may not see.

use std::collections::HashMap;

use tracing::debug;

use super::accountability::{Accountability, Action};
use super::oracle::{AllowedFields, PermissionOracle};
use crate::relation::Relation;

/// Remove every relation the caller is not allowed to read.
///
/// Absent or administrative accountability passes everything through. For
/// anyone else a relation survives only if its collection, its related
/// collection, every one of its `one_allowed_collections`, its field, and its
/// reverse `one_field` on the related collection are all readable.
pub fn filter_forbidden<O>(
    relations: Vec<Relation>,
    accountability: Option<&Accountability>,
    oracle: &O,
) -> Vec<Relation>
where
    O: PermissionOracle + ?Sized,
{
    let accountability = match accountability {
        Some(acc) if !acc.is_admin() => acc,
        _ => return relations,
    };

    let allowed = oracle.allowed_fields(accountability, Action::Read);
    let total = relations.len();
    let visible: Vec<Relation> = relations
        .into_iter()
        .filter(|relation| is_visible(relation, &allowed))
        .collect();

    debug!(
        total,
        visible = visible.len(),
        role = ?accountability.role,
        "relations filtered"
    );
    visible
}

fn is_visible(relation: &Relation, allowed: &HashMap<String, AllowedFields>) -> bool {
    let Some(fields) = allowed.get(&relation.collection) else {
        return false;
    };

    if let Some(related) = &relation.related_collection {
        if !allowed.contains_key(related) {
            return false;
        }
    }

    if let Some(collections) = relation.one_allowed_collections() {
        if !collections.iter().all(|c| allowed.contains_key(c)) {
            return false;
        }
    }

    if !fields.allows(&relation.field) {
        return false;
    }

    match (relation.one_field(), &relation.related_collection) {
        (Some(one_field), Some(related)) => allowed
            .get(related)
            .is_some_and(|fields| fields.allows(one_field)),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::{stitch, ForeignKeyRow, RelationMeta};
    use crate::security::{AccountabilityOracle, Permission};

    fn relations() -> Vec<Relation> {
        stitch(
            vec![
                RelationMeta::new("articles", "author_id")
                    .with_one_collection("authors")
                    .with_one_field("articles"),
                RelationMeta::new("comments", "item")
                    .with_one_allowed_collections(["articles", "pages"]),
                RelationMeta::new("articles", "editor_id").with_one_collection("authors"),
            ],
            vec![
                ForeignKeyRow::new("articles", "author_id", "authors", "id"),
                ForeignKeyRow::new("articles", "category_id", "categories", "id"),
            ],
        )
    }

    fn editor() -> Accountability {
        Accountability::new()
            .with_role("editor")
            .with_permission(Permission::read_all("articles"))
            .with_permission(Permission::new("authors", Action::Read).with_fields(["id", "articles"]))
            .with_permission(Permission::read_all("comments"))
    }

    fn keys(relations: &[Relation]) -> Vec<(String, String)> {
        relations
            .iter()
            .map(|r| (r.collection.clone(), r.field.clone()))
            .collect()
    }

    #[test]
    fn test_admin_and_absent_pass_through() {
        let all = relations();
        assert_eq!(
            filter_forbidden(all.clone(), None, &AccountabilityOracle),
            all
        );
        assert_eq!(
            filter_forbidden(all.clone(), Some(&Accountability::admin()), &AccountabilityOracle),
            all
        );
    }

    #[test]
    fn test_each_condition_excludes() {
        let visible = filter_forbidden(relations(), Some(&editor()), &AccountabilityOracle);

        // comments.item needs "pages"; articles.category_id needs "categories".
        assert_eq!(
            keys(&visible),
            vec![
                ("articles".to_string(), "author_id".to_string()),
                ("articles".to_string(), "editor_id".to_string()),
            ]
        );
    }

    #[test]
    fn test_related_collection_must_be_readable() {
        let acc = Accountability::new().with_permission(Permission::read_all("articles"));
        let visible = filter_forbidden(relations(), Some(&acc), &AccountabilityOracle);
        assert!(visible.is_empty());
    }

    #[test]
    fn test_reverse_field_must_be_readable() {
        let acc = Accountability::new()
            .with_permission(Permission::read_all("articles"))
            .with_permission(Permission::new("authors", Action::Read).with_fields(["id"]));
        let visible = filter_forbidden(relations(), Some(&acc), &AccountabilityOracle);
        assert_eq!(
            keys(&visible),
            vec![("articles".to_string(), "editor_id".to_string())]
        );
    }

    #[test]
    fn test_own_field_must_be_readable() {
        let acc = Accountability::new()
            .with_permission(Permission::new("articles", Action::Read).with_fields(["editor_id"]))
            .with_permission(Permission::read_all("authors"));
        let visible = filter_forbidden(relations(), Some(&acc), &AccountabilityOracle);
        assert_eq!(
            keys(&visible),
            vec![("articles".to_string(), "editor_id".to_string())]
        );
    }

    #[test]
    fn test_filter_is_idempotent() {
        let acc = editor();
        let once = filter_forbidden(relations(), Some(&acc), &AccountabilityOracle);
        let twice = filter_forbidden(once.clone(), Some(&acc), &AccountabilityOracle);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filter_distributes_over_stitched_pairs() {
        let acc = editor();
        let all = relations();
        let filtered = filter_forbidden(all.clone(), Some(&acc), &AccountabilityOracle);

        let piecewise: Vec<Relation> = all
            .into_iter()
            .flat_map(|r| filter_forbidden(vec![r], Some(&acc), &AccountabilityOracle))
            .collect();
        assert_eq!(filtered, piecewise);
    }
}
