//! Linkage Core - relation reconciliation between foreign keys and metadata.
//!
//! A relation between two collections has two sources of truth: the
//! physical foreign key in the database and a metadata row describing how
//! the relation behaves. This crate stitches them together for reads,
//! filters them by caller permissions, and keeps them consistent across
//! create, update and delete.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod hooks;
pub mod relation;
pub mod security;
pub mod service;
pub mod storage;

pub use cache::{relations_cache_key, CacheInvalidator, CacheStats, MemoryCache};
pub use catalog::{CollectionDef, ColumnType, FieldDef, SchemaSnapshot};
pub use config::ServiceConfig;
pub use error::{ConstraintError, Error, Result};
pub use hooks::{NoopHooks, SchemaHooks};
pub use relation::{
    constraint_name, stitch, ConstraintKind, ConstraintOptions, DeselectAction, ForeignKeyRow,
    NewRelation, ReferentialAction, Relation, RelationMeta, RelationMetaPatch, RelationUpdate,
};
pub use service::RelationsService;
pub use storage::{Database, StorageConfig, Transaction};

// Security exports
pub use security::{
    filter_forbidden, Accountability, AccountabilityOracle, Action, AllowedFields, Permission,
    PermissionOracle,
};
