//! Read and mutate relations across the physical schema and the metadata store.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::guard::CleanupGuard;
use super::type_fix::stage_type_fix;
use crate::cache::{relations_cache_key, CacheInvalidator, MemoryCache};
use crate::catalog::SchemaSnapshot;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::hooks::{NoopHooks, SchemaHooks};
use crate::relation::{
    constraint_name_with_limit, stitch, system_relation_rows, ConstraintKind, ForeignKeyRow,
    NewRelation, Relation, RelationMeta, RelationUpdate,
};
use crate::security::{filter_forbidden, Accountability, AccountabilityOracle, Action, PermissionOracle};
use crate::storage::{Database, MetadataReader, RelationQuery, SchemaInspector, Transaction};

/// Reconciles physical foreign keys with relation metadata.
///
/// Reads stitch both sources together and filter the result for the caller.
/// Mutations are validated up front, applied in one transaction spanning the
/// schema and the metadata, and followed by hook and cache cleanup that runs
/// whatever the transaction's outcome.
///
/// Every operation takes the caller's accountability. `None` marks an
/// internal call and skips all permission checks.
pub struct RelationsService {
    db: Arc<Database>,
    config: ServiceConfig,
    oracle: Arc<dyn PermissionOracle>,
    hooks: Arc<dyn SchemaHooks>,
    cache: Arc<dyn CacheInvalidator>,
}

impl RelationsService {
    /// Create a service over `db` with default collaborators.
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            config: ServiceConfig::default(),
            oracle: Arc::new(AccountabilityOracle),
            hooks: Arc::new(NoopHooks),
            cache: Arc::new(MemoryCache::new()),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the permission oracle.
    pub fn with_oracle(mut self, oracle: Arc<dyn PermissionOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Set the schema hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn SchemaHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Set the cache.
    pub fn with_cache(mut self, cache: Arc<dyn CacheInvalidator>) -> Self {
        self.cache = cache;
        self
    }

    /// The underlying database.
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// The configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Read every relation visible to the caller, optionally limited to one
    /// owning collection.
    #[instrument(skip(self, accountability))]
    pub fn read_all(
        &self,
        accountability: Option<&Accountability>,
        collection: Option<&str>,
    ) -> Result<Vec<Relation>> {
        self.check_base_access(accountability)?;

        let relations = self.load(collection, None)?;
        Ok(filter_forbidden(
            relations,
            accountability,
            self.oracle.as_ref(),
        ))
    }

    /// Read the relation on `collection.field`.
    ///
    /// Fails with [`Error::Forbidden`] both when the caller can't see the
    /// relation and when it doesn't exist.
    #[instrument(skip(self, accountability))]
    pub fn read_one(
        &self,
        accountability: Option<&Accountability>,
        collection: &str,
        field: &str,
    ) -> Result<Relation> {
        self.check_base_access(accountability)?;
        Self::check_field_access(accountability, collection, field)?;

        let relations = self.load(Some(collection), Some(field))?;
        filter_forbidden(relations, accountability, self.oracle.as_ref())
            .into_iter()
            .next()
            .ok_or(Error::Forbidden)
    }

    /// Create a relation: the foreign key (when a related collection is
    /// given) and its metadata row.
    #[instrument(skip(self, accountability, relation), fields(collection = ?relation.collection, field = ?relation.field))]
    pub fn create_one(
        &self,
        accountability: Option<&Accountability>,
        relation: NewRelation,
    ) -> Result<Relation> {
        Self::require_admin(accountability)?;

        let collection = required(relation.collection.as_deref(), "collection")?;
        let field = required(relation.field.as_deref(), "field")?;
        let related = relation.related_collection.as_deref().filter(|r| !r.is_empty());

        let snapshot = self.snapshot()?;
        Self::check_collection_and_field(&snapshot, collection, field)?;
        if snapshot.get_primary_key_field(collection) == Some(field) {
            return Err(Error::invalid(format!(
                "Field \"{}\" is the primary key of collection \"{}\" and can't be a foreign key",
                field, collection
            )));
        }
        if let Some(related) = related {
            if !snapshot.has_collection(related) {
                return Err(Error::invalid(format!(
                    "Related collection \"{}\" doesn't exist",
                    related
                )));
            }
        }
        if snapshot.get_relation(collection, field).is_some() {
            return Err(Error::invalid(format!(
                "Field \"{}\" in collection \"{}\" already has an associated relationship",
                field, collection
            )));
        }

        let run_post_hook = self.hooks.pre_column_change()?;
        let guard = CleanupGuard::new(self.hooks.as_ref(), run_post_hook, || {
            self.refresh_collection_cache(collection)
        });

        self.db.execute(|tx| {
            if let Some(related) = related {
                let options = relation.schema.unwrap_or_default();
                let foreign_key = self
                    .foreign_key(&snapshot, collection, field, related)?
                    .with_constraint_name(self.constraint_name(collection, field))
                    .with_actions(options.on_delete, options.on_update);

                stage_type_fix(tx, &snapshot, collection, field, related);
                tx.add_foreign_key(foreign_key);
            }

            let mut meta = RelationMeta::new(collection, field);
            if let Some(related) = related {
                meta = meta.with_one_collection(related);
            }
            if let Some(patch) = &relation.meta {
                meta.apply(patch);
            }
            tx.create_meta(meta)?;
            Ok(())
        })?;
        guard.finish()?;

        info!(collection, field, related = ?related, "relation created");
        self.fetch(collection, field)
    }

    /// Update the referential actions and metadata of the relation on
    /// `collection.field`.
    ///
    /// The owning and related collections can't be changed.
    #[instrument(skip(self, accountability, update))]
    pub fn update_one(
        &self,
        accountability: Option<&Accountability>,
        collection: &str,
        field: &str,
        update: RelationUpdate,
    ) -> Result<Relation> {
        Self::require_admin(accountability)?;

        let snapshot = self.snapshot()?;
        let existing = Self::existing_relation(&snapshot, collection, field)?;

        let run_post_hook = self.hooks.pre_column_change()?;
        let guard = CleanupGuard::new(self.hooks.as_ref(), run_post_hook, || {
            self.cache
                .invalidate_field(&relations_cache_key(collection), field)
        });

        self.db.execute(|tx| {
            if let Some(related) = existing.related_collection.as_deref() {
                let name = existing
                    .constraint_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| self.constraint_name(collection, field));
                if existing.schema.is_some() {
                    Self::drop_if_present(tx, collection, &name)?;
                }

                let options = update.schema.unwrap_or_default();
                let current = existing.schema.as_ref();
                let foreign_key = self
                    .foreign_key(&snapshot, collection, field, related)?
                    .with_constraint_name(name)
                    .with_actions(
                        options.on_delete.or(current.and_then(|s| s.on_delete)),
                        options.on_update.or(current.and_then(|s| s.on_update)),
                    );

                stage_type_fix(tx, &snapshot, collection, field, related);
                tx.add_foreign_key(foreign_key);
            }

            if let Some(patch) = &update.meta {
                match existing.meta.as_ref().and_then(|m| m.id) {
                    Some(id) => {
                        tx.update_meta(id, patch.clone());
                    }
                    None => {
                        let mut meta = RelationMeta::new(collection, field);
                        if let Some(related) = &existing.related_collection {
                            meta = meta.with_one_collection(related.as_str());
                        }
                        meta.apply(patch);
                        tx.create_meta(meta)?;
                    }
                }
            }
            Ok(())
        })?;
        guard.finish()?;

        info!(collection, field, "relation updated");
        self.fetch(collection, field)
    }

    /// Delete the relation on `collection.field`.
    ///
    /// The foreign key is dropped only if it still exists when the
    /// transaction runs, so a constraint removed out-of-band doesn't block
    /// removing the metadata row.
    #[instrument(skip(self, accountability))]
    pub fn delete_one(
        &self,
        accountability: Option<&Accountability>,
        collection: &str,
        field: &str,
    ) -> Result<()> {
        Self::require_admin(accountability)?;

        let snapshot = self.snapshot()?;
        let existing = Self::existing_relation(&snapshot, collection, field)?;

        let run_post_hook = self.hooks.pre_column_change()?;
        let guard = CleanupGuard::new(self.hooks.as_ref(), run_post_hook, || {
            self.cache
                .invalidate_field(&relations_cache_key(collection), field)
        });

        self.db.execute(|tx| {
            if let Some(name) = existing.constraint_name() {
                Self::drop_if_present(tx, collection, name)?;
            }
            if existing.meta.is_some() {
                tx.delete_meta(collection, field);
            }
            Ok(())
        })?;
        guard.finish()?;

        info!(collection, field, "relation deleted");
        Ok(())
    }

    fn snapshot(&self) -> Result<SchemaSnapshot> {
        self.db.snapshot(self.config.include_system_relations)
    }

    /// Stitch stored metadata, system rows and foreign keys, unfiltered.
    fn load(&self, collection: Option<&str>, field: Option<&str>) -> Result<Vec<Relation>> {
        let query = RelationQuery {
            collection: collection.map(str::to_string),
            field: field.map(str::to_string),
        };

        let mut meta_rows = self.db.metadata().read_by_query(&query)?;
        if self.config.include_system_relations {
            meta_rows.extend(
                system_relation_rows()
                    .into_iter()
                    .filter(|row| query.matches(row)),
            );
        }

        let schema_rows: Vec<ForeignKeyRow> = self
            .db
            .physical()
            .foreign_keys(collection)?
            .into_iter()
            .filter(|row| field.map_or(true, |f| row.column == f))
            .collect();

        debug!(
            meta = meta_rows.len(),
            schema = schema_rows.len(),
            "stitching relations"
        );
        Ok(stitch(meta_rows, schema_rows))
    }

    fn fetch(&self, collection: &str, field: &str) -> Result<Relation> {
        self.load(Some(collection), Some(field))?
            .into_iter()
            .next()
            .ok_or_else(|| missing_relation(collection, field))
    }

    fn refresh_collection_cache(&self, collection: &str) -> Result<()> {
        let mut hash = HashMap::new();
        for relation in self.load(Some(collection), None)? {
            let value = serde_json::to_string(&relation)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            hash.insert(relation.field, value);
        }
        self.cache
            .set_hash_full(&relations_cache_key(collection), hash)
    }

    fn constraint_name(&self, collection: &str, field: &str) -> String {
        constraint_name_with_limit(
            ConstraintKind::Foreign,
            collection,
            field,
            self.config.max_identifier_length,
        )
    }

    fn foreign_key(
        &self,
        snapshot: &SchemaSnapshot,
        collection: &str,
        field: &str,
        related: &str,
    ) -> Result<ForeignKeyRow> {
        let primary_key = snapshot.get_primary_key_field(related).ok_or_else(|| {
            Error::invalid(format!("Related collection \"{}\" doesn't exist", related))
        })?;
        Ok(ForeignKeyRow::new(collection, field, related, primary_key))
    }

    fn drop_if_present(tx: &mut Transaction<'_>, collection: &str, name: &str) -> Result<()> {
        if tx.constraint_names()?.iter().any(|n| n == name) {
            tx.drop_foreign_key(collection, name);
        } else {
            debug!(collection, constraint = name, "constraint already gone");
        }
        Ok(())
    }

    /// Administrative callers (or internal calls) only.
    fn require_admin(accountability: Option<&Accountability>) -> Result<()> {
        match accountability {
            Some(acc) if !acc.is_admin() => Err(Error::Forbidden),
            _ => Ok(()),
        }
    }

    /// Read access to the relation metadata collection itself.
    fn check_base_access(&self, accountability: Option<&Accountability>) -> Result<()> {
        match accountability {
            Some(acc) if !acc.can(&self.config.relations_collection, Action::Read) => {
                Err(Error::Forbidden)
            }
            _ => Ok(()),
        }
    }

    /// Fails closed: a caller needs an explicit read permission on
    /// `collection` that lists `field` or the wildcard.
    fn check_field_access(
        accountability: Option<&Accountability>,
        collection: &str,
        field: &str,
    ) -> Result<()> {
        let Some(acc) = accountability.filter(|acc| !acc.is_admin()) else {
            return Ok(());
        };

        let permission = acc
            .permission(collection, Action::Read)
            .ok_or(Error::Forbidden)?;
        let fields = permission.fields.as_ref().ok_or(Error::Forbidden)?;
        if permission.has_wildcard() || fields.iter().any(|f| f == field) {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }

    fn check_collection_and_field(
        snapshot: &SchemaSnapshot,
        collection: &str,
        field: &str,
    ) -> Result<()> {
        if !snapshot.has_collection(collection) {
            return Err(Error::invalid(format!(
                "Collection \"{}\" doesn't exist",
                collection
            )));
        }
        if !snapshot.has_field(collection, field) {
            return Err(Error::invalid(format!(
                "Field \"{}\" doesn't exist in collection \"{}\"",
                field, collection
            )));
        }
        Ok(())
    }

    fn existing_relation(
        snapshot: &SchemaSnapshot,
        collection: &str,
        field: &str,
    ) -> Result<Relation> {
        Self::check_collection_and_field(snapshot, collection, field)?;

        let existing = snapshot
            .get_relation(collection, field)
            .cloned()
            .ok_or_else(|| missing_relation(collection, field))?;
        if existing.meta.as_ref().is_some_and(|m| m.system) {
            return Err(Error::invalid(format!(
                "Field \"{}\" in collection \"{}\" has a system relationship and can't be changed",
                field, collection
            )));
        }
        Ok(existing)
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::invalid(format!("\"{}\" is required", name)))
}

fn missing_relation(collection: &str, field: &str) -> Error {
    Error::invalid(format!(
        "Field \"{}\" in collection \"{}\" doesn't have a relationship",
        field, collection
    ))
}
