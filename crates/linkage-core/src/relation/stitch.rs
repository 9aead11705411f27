//! Merging metadata rows with physical foreign keys.

use std::collections::HashMap;

use super::types::{ForeignKeyRow, Relation, RelationMeta};

/// Combine metadata rows and physical foreign keys into relation descriptors.
///
/// Each metadata row yields one descriptor, paired with the foreign key on the
/// same `(collection, field)` if there is one. The foreign key decides
/// `related_collection` when present. Foreign keys left without metadata are
/// appended afterwards, in their input order.
pub fn stitch(meta_rows: Vec<RelationMeta>, schema_rows: Vec<ForeignKeyRow>) -> Vec<Relation> {
    let mut index: HashMap<(String, String), usize> = HashMap::with_capacity(schema_rows.len());
    for (position, row) in schema_rows.iter().enumerate() {
        index
            .entry((row.table.clone(), row.column.clone()))
            .or_insert(position);
    }

    let mut schema_rows: Vec<Option<ForeignKeyRow>> = schema_rows.into_iter().map(Some).collect();
    let mut relations = Vec::with_capacity(meta_rows.len() + schema_rows.len());

    for meta in meta_rows {
        let key = (meta.many_collection.clone(), meta.many_field.clone());
        let schema = index
            .get(&key)
            .and_then(|&position| schema_rows[position].take());
        let related_collection = schema
            .as_ref()
            .map(|row| row.foreign_key_table.clone())
            .or_else(|| meta.one_collection.clone());

        relations.push(Relation {
            collection: key.0,
            field: key.1,
            related_collection,
            schema,
            meta: Some(meta),
        });
    }

    relations.extend(schema_rows.into_iter().flatten().map(|row| Relation {
        collection: row.table.clone(),
        field: row.column.clone(),
        related_collection: Some(row.foreign_key_table.clone()),
        schema: Some(row),
        meta: None,
    }));

    relations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fk(table: &str, column: &str, target: &str) -> ForeignKeyRow {
        ForeignKeyRow {
            table: table.to_string(),
            column: column.to_string(),
            foreign_key_table: target.to_string(),
            foreign_key_column: "id".to_string(),
            constraint_name: Some(format!("{}_{}_foreign", table, column)),
            on_update: None,
            on_delete: None,
        }
    }

    #[test]
    fn test_matched_pair_merges() {
        let meta = RelationMeta::new("articles", "author_id")
            .with_one_collection("authors")
            .with_one_field("articles");

        let relations = stitch(vec![meta], vec![fk("articles", "author_id", "authors")]);

        assert_eq!(relations.len(), 1);
        let relation = &relations[0];
        assert_eq!(relation.related_collection.as_deref(), Some("authors"));
        assert_eq!(
            relation.constraint_name(),
            Some("articles_author_id_foreign")
        );
        assert_eq!(relation.one_field(), Some("articles"));
    }

    #[test]
    fn test_schema_wins_for_related_collection() {
        let meta = RelationMeta::new("articles", "author_id").with_one_collection("people");

        let relations = stitch(vec![meta], vec![fk("articles", "author_id", "authors")]);

        assert_eq!(relations[0].related_collection.as_deref(), Some("authors"));
        assert_eq!(
            relations[0].meta.as_ref().unwrap().one_collection.as_deref(),
            Some("people")
        );
    }

    #[test]
    fn test_alias_relation_has_no_schema() {
        let meta = RelationMeta::new("comments", "item").with_one_allowed_collections(["a", "b"]);

        let relations = stitch(vec![meta], vec![]);

        assert_eq!(relations.len(), 1);
        assert!(relations[0].schema.is_none());
        assert!(relations[0].related_collection.is_none());
    }

    #[test]
    fn test_order_is_meta_first_then_unmatched_schema() {
        let relations = stitch(
            vec![
                RelationMeta::new("b", "x").with_one_collection("t"),
                RelationMeta::new("a", "y"),
            ],
            vec![fk("z", "q", "t"), fk("b", "x", "t"), fk("c", "r", "t")],
        );

        let keys: Vec<(&str, &str)> = relations
            .iter()
            .map(|r| (r.collection.as_str(), r.field.as_str()))
            .collect();
        assert_eq!(keys, vec![("b", "x"), ("a", "y"), ("z", "q"), ("c", "r")]);
        assert!(relations[2].meta.is_none());
    }

    #[test]
    fn test_stitch_is_deterministic() {
        let meta = || vec![RelationMeta::new("a", "b"), RelationMeta::new("c", "d")];
        let schema = || vec![fk("c", "d", "e"), fk("f", "g", "h")];

        assert_eq!(stitch(meta(), schema()), stitch(meta(), schema()));
    }
}
