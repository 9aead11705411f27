//! Schema catalog types.
//!
//! Collections and fields as the physical schema defines them, plus the
//! in-memory [`SchemaSnapshot`] the relation service validates against.

mod collection;
mod field;
mod snapshot;
mod types;

pub use collection::CollectionDef;
pub use field::FieldDef;
pub use snapshot::SchemaSnapshot;
pub use types::ColumnType;
