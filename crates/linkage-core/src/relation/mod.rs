//! Relation descriptors and the pure functions that assemble them.
//!
//! A [`Relation`] is never stored as one unit. It is stitched together from a
//! metadata row ([`RelationMeta`]) and a physical foreign key
//! ([`ForeignKeyRow`]), either of which may be missing.

mod naming;
mod stitch;
mod system;
mod types;

pub use naming::{
    constraint_name, constraint_name_with_limit, ConstraintKind, DEFAULT_MAX_IDENTIFIER_LENGTH,
};
pub use stitch::stitch;
pub use system::system_relation_rows;
pub use types::{
    ConstraintOptions, DeselectAction, ForeignKeyRow, NewRelation, ReferentialAction, Relation,
    RelationMeta, RelationMetaPatch, RelationUpdate,
};
