//! The relation reconciler.

mod guard;
mod relations;
mod type_fix;

pub use relations::RelationsService;
pub use type_fix::unsigned_fix;
