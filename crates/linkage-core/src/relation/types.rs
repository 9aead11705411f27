//! Relation data model.

use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use std::fmt;

use crate::error::Error;

/// Referential action of a foreign key.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Archive,
    Serialize,
    Deserialize,
    SerdeSerialize,
    SerdeDeserialize,
)]
pub enum ReferentialAction {
    /// Delete or update referencing rows.
    #[serde(rename = "CASCADE")]
    Cascade,
    /// Reject the change while references exist.
    #[serde(rename = "RESTRICT")]
    Restrict,
    /// Set the referencing column to NULL.
    #[serde(rename = "SET NULL")]
    SetNull,
    /// Set the referencing column to its default.
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
    /// Deferred restrict.
    #[serde(rename = "NO ACTION")]
    NoAction,
}

impl ReferentialAction {
    /// SQL spelling of the action.
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }

    /// Parse the SQL spelling (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CASCADE" => Some(ReferentialAction::Cascade),
            "RESTRICT" => Some(ReferentialAction::Restrict),
            "SET NULL" => Some(ReferentialAction::SetNull),
            "SET DEFAULT" => Some(ReferentialAction::SetDefault),
            "NO ACTION" => Some(ReferentialAction::NoAction),
            _ => None,
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A physical foreign key as reported by the schema inspector.
#[derive(
    Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub struct ForeignKeyRow {
    /// Referencing table.
    pub table: String,
    /// Referencing column.
    pub column: String,
    /// Referenced table.
    pub foreign_key_table: String,
    /// Referenced column (the primary key of `foreign_key_table`).
    pub foreign_key_column: String,
    /// Constraint name, when the backend reports one.
    pub constraint_name: Option<String>,
    /// Action on update of the referenced key.
    pub on_update: Option<ReferentialAction>,
    /// Action on delete of the referenced row.
    pub on_delete: Option<ReferentialAction>,
}

impl ForeignKeyRow {
    /// Unnamed foreign key from `table.column` to `foreign_key_table.foreign_key_column`.
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        foreign_key_table: impl Into<String>,
        foreign_key_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            foreign_key_table: foreign_key_table.into(),
            foreign_key_column: foreign_key_column.into(),
            constraint_name: None,
            on_update: None,
            on_delete: None,
        }
    }

    /// Set the constraint name.
    pub fn with_constraint_name(mut self, name: impl Into<String>) -> Self {
        self.constraint_name = Some(name.into());
        self
    }

    /// Set the referential actions.
    pub fn with_actions(
        mut self,
        on_delete: Option<ReferentialAction>,
        on_update: Option<ReferentialAction>,
    ) -> Self {
        self.on_delete = on_delete;
        self.on_update = on_update;
        self
    }

    /// Serialize the row to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a row from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        // sled may hand out values at any offset; archives need alignment.
        let mut aligned = AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// What happens to the "many" rows when they are deselected in a one-to-many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, SerdeSerialize, SerdeDeserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeselectAction {
    /// Clear the foreign key.
    #[default]
    Nullify,
    /// Delete the deselected rows.
    Delete,
}

/// A relation metadata row, as held by the metadata store.
#[derive(Debug, Clone, PartialEq, Eq, SerdeSerialize, SerdeDeserialize)]
pub struct RelationMeta {
    /// Row id, assigned by the metadata store.
    #[serde(default)]
    pub id: Option<u64>,
    /// Owning ("many") collection.
    pub many_collection: String,
    /// Owning field.
    pub many_field: String,
    /// Referenced ("one") collection. Absent for polymorphic relations.
    #[serde(default)]
    pub one_collection: Option<String>,
    /// Reverse alias field on the referenced collection.
    #[serde(default)]
    pub one_field: Option<String>,
    /// Field holding the target collection name of a polymorphic relation.
    #[serde(default)]
    pub one_collection_field: Option<String>,
    /// Collections a polymorphic relation may point to.
    #[serde(default)]
    pub one_allowed_collections: Option<Vec<String>>,
    /// Other side of a junction collection.
    #[serde(default)]
    pub junction_field: Option<String>,
    /// Manual sort field on the owning collection.
    #[serde(default)]
    pub sort_field: Option<String>,
    /// Behaviour when a related item is deselected.
    #[serde(default)]
    pub one_deselect_action: DeselectAction,
    /// Built-in relation of the platform itself.
    #[serde(default)]
    pub system: bool,
}

impl RelationMeta {
    /// Create a metadata row for `collection.field`.
    pub fn new(many_collection: impl Into<String>, many_field: impl Into<String>) -> Self {
        Self {
            id: None,
            many_collection: many_collection.into(),
            many_field: many_field.into(),
            one_collection: None,
            one_field: None,
            one_collection_field: None,
            one_allowed_collections: None,
            junction_field: None,
            sort_field: None,
            one_deselect_action: DeselectAction::Nullify,
            system: false,
        }
    }

    /// Set the referenced collection.
    pub fn with_one_collection(mut self, collection: impl Into<String>) -> Self {
        self.one_collection = Some(collection.into());
        self
    }

    /// Set the reverse alias field.
    pub fn with_one_field(mut self, field: impl Into<String>) -> Self {
        self.one_field = Some(field.into());
        self
    }

    /// Set the allowed target collections of a polymorphic relation.
    pub fn with_one_allowed_collections(
        mut self,
        collections: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.one_allowed_collections = Some(collections.into_iter().map(Into::into).collect());
        self
    }

    /// Mark as a built-in row.
    pub fn as_system(mut self) -> Self {
        self.system = true;
        self
    }

    /// Apply the mutable attributes of a patch.
    pub fn apply(&mut self, patch: &RelationMetaPatch) {
        if let Some(one_field) = &patch.one_field {
            self.one_field = Some(one_field.clone());
        }
        if let Some(field) = &patch.one_collection_field {
            self.one_collection_field = Some(field.clone());
        }
        if let Some(allowed) = &patch.one_allowed_collections {
            self.one_allowed_collections = Some(allowed.clone());
        }
        if let Some(junction) = &patch.junction_field {
            self.junction_field = Some(junction.clone());
        }
        if let Some(sort) = &patch.sort_field {
            self.sort_field = Some(sort.clone());
        }
        if let Some(action) = patch.one_deselect_action {
            self.one_deselect_action = action;
        }
    }

    pub(crate) fn to_json(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub(crate) fn from_json(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// The caller-editable subset of a metadata row.
///
/// The owning pair and the referenced collection are not part of it, so a
/// patch can never move a relation.
#[derive(Debug, Clone, PartialEq, Eq, Default, SerdeSerialize, SerdeDeserialize)]
#[serde(default)]
pub struct RelationMetaPatch {
    /// Reverse alias field on the referenced collection.
    pub one_field: Option<String>,
    /// Field holding the target collection name of a polymorphic relation.
    pub one_collection_field: Option<String>,
    /// Collections a polymorphic relation may point to.
    pub one_allowed_collections: Option<Vec<String>>,
    /// Other side of a junction collection.
    pub junction_field: Option<String>,
    /// Manual sort field on the owning collection.
    pub sort_field: Option<String>,
    /// Behaviour when a related item is deselected.
    pub one_deselect_action: Option<DeselectAction>,
}

impl RelationMetaPatch {
    /// Set the reverse alias field.
    pub fn with_one_field(mut self, field: impl Into<String>) -> Self {
        self.one_field = Some(field.into());
        self
    }

    /// Set the allowed target collections.
    pub fn with_one_allowed_collections(
        mut self,
        collections: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.one_allowed_collections = Some(collections.into_iter().map(Into::into).collect());
        self
    }

    /// Set the deselect action.
    pub fn with_one_deselect_action(mut self, action: DeselectAction) -> Self {
        self.one_deselect_action = Some(action);
        self
    }
}

/// Referential actions requested for a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, SerdeSerialize, SerdeDeserialize)]
#[serde(default)]
pub struct ConstraintOptions {
    /// Action on delete of the referenced row.
    pub on_delete: Option<ReferentialAction>,
    /// Action on update of the referenced key.
    pub on_update: Option<ReferentialAction>,
}

impl ConstraintOptions {
    /// Options with only a delete action.
    pub fn on_delete(action: ReferentialAction) -> Self {
        Self {
            on_delete: Some(action),
            on_update: None,
        }
    }
}

/// A unified relation descriptor.
#[derive(Debug, Clone, PartialEq, Eq, SerdeSerialize, SerdeDeserialize)]
pub struct Relation {
    /// Owning ("many") collection.
    pub collection: String,
    /// Owning field.
    pub field: String,
    /// Referenced collection, if any.
    pub related_collection: Option<String>,
    /// Physical foreign key, when the relation is backed by one.
    pub schema: Option<ForeignKeyRow>,
    /// Metadata row, when one exists.
    pub meta: Option<RelationMeta>,
}

impl Relation {
    /// Reverse alias field declared by the metadata, if any.
    pub fn one_field(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.one_field.as_deref())
    }

    /// Allowed target collections declared by the metadata, if any.
    pub fn one_allowed_collections(&self) -> Option<&[String]> {
        self.meta
            .as_ref()
            .and_then(|m| m.one_allowed_collections.as_deref())
    }

    /// Name of the backing constraint, if any.
    pub fn constraint_name(&self) -> Option<&str> {
        self.schema
            .as_ref()
            .and_then(|s| s.constraint_name.as_deref())
    }

    /// Check whether this relation is keyed on `collection.field`.
    pub fn is_on(&self, collection: &str, field: &str) -> bool {
        self.collection == collection && self.field == field
    }
}

/// Payload for creating a relation.
#[derive(Debug, Clone, PartialEq, Eq, Default, SerdeSerialize, SerdeDeserialize)]
#[serde(default)]
pub struct NewRelation {
    /// Owning collection.
    pub collection: Option<String>,
    /// Owning field.
    pub field: Option<String>,
    /// Referenced collection. Without it only metadata is written.
    pub related_collection: Option<String>,
    /// Referential actions for the foreign key.
    pub schema: Option<ConstraintOptions>,
    /// Metadata attributes.
    pub meta: Option<RelationMetaPatch>,
}

impl NewRelation {
    /// Relation on `collection.field` pointing at `related_collection`.
    pub fn new(
        collection: impl Into<String>,
        field: impl Into<String>,
        related_collection: impl Into<String>,
    ) -> Self {
        Self {
            collection: Some(collection.into()),
            field: Some(field.into()),
            related_collection: Some(related_collection.into()),
            schema: None,
            meta: None,
        }
    }

    /// Metadata-only relation on `collection.field`.
    pub fn alias(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            collection: Some(collection.into()),
            field: Some(field.into()),
            ..Default::default()
        }
    }

    /// Set the referential actions.
    pub fn with_schema(mut self, schema: ConstraintOptions) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Set the metadata attributes.
    pub fn with_meta(mut self, meta: RelationMetaPatch) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Payload for updating a relation.
#[derive(Debug, Clone, PartialEq, Eq, Default, SerdeSerialize, SerdeDeserialize)]
#[serde(default)]
pub struct RelationUpdate {
    /// New referential actions.
    pub schema: Option<ConstraintOptions>,
    /// Metadata attributes to change.
    pub meta: Option<RelationMetaPatch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referential_action_parse() {
        assert_eq!(
            ReferentialAction::parse("set null"),
            Some(ReferentialAction::SetNull)
        );
        assert_eq!(ReferentialAction::parse("nope"), None);
        assert_eq!(ReferentialAction::Cascade.to_string(), "CASCADE");
    }

    #[test]
    fn test_apply_patch_keeps_owning_pair() {
        let mut meta = RelationMeta::new("articles", "author_id").with_one_collection("authors");
        let patch = RelationMetaPatch::default()
            .with_one_field("articles")
            .with_one_deselect_action(DeselectAction::Delete);

        meta.apply(&patch);

        assert_eq!(meta.many_collection, "articles");
        assert_eq!(meta.one_collection.as_deref(), Some("authors"));
        assert_eq!(meta.one_field.as_deref(), Some("articles"));
        assert_eq!(meta.one_deselect_action, DeselectAction::Delete);
    }

    #[test]
    fn test_new_relation_from_json() {
        let json = r#"{
            "collection": "articles",
            "field": "author_id",
            "related_collection": "authors",
            "schema": {"on_delete": "SET NULL"},
            "meta": {"one_field": "articles"}
        }"#;
        let payload: NewRelation = serde_json::from_str(json).unwrap();
        assert_eq!(payload.collection.as_deref(), Some("articles"));
        assert_eq!(
            payload.schema.unwrap().on_delete,
            Some(ReferentialAction::SetNull)
        );
        assert_eq!(payload.meta.unwrap().one_field.as_deref(), Some("articles"));
    }

    #[test]
    fn test_meta_json_defaults() {
        let meta =
            RelationMeta::from_json(br#"{"many_collection":"a","many_field":"b"}"#).unwrap();
        assert_eq!(meta.id, None);
        assert_eq!(meta.one_deselect_action, DeselectAction::Nullify);
        assert!(!meta.system);
    }
}
