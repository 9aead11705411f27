//! Embedded storage backend.
//!
//! A sled database holding both sources of truth for relations: the physical
//! schema (tables, typed columns, named foreign keys) and the relation
//! metadata rows. Both live in the same database so that a single
//! [`Transaction`] can change them atomically.

mod config;
mod database;
mod metadata;
mod physical;
mod transaction;

pub(crate) mod key;

pub use config::StorageConfig;
pub use database::Database;
pub use metadata::{MetadataReader, MetadataStore, RelationQuery};
pub use physical::{PhysicalSchema, SchemaInspector};
pub use transaction::{Transaction, TransactionOp};
