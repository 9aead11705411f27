//! Hooks run around physical column changes.

use crate::error::Error;

/// Backend-specific preparation around altering columns.
///
/// Some backends need preparatory work before a column that takes part in
/// an index can be altered, and matching teardown afterwards.
pub trait SchemaHooks: Send + Sync {
    /// Prepare for a column change. Returns whether
    /// [`post_column_change`](Self::post_column_change) must run afterwards.
    fn pre_column_change(&self) -> Result<bool, Error>;

    /// Undo the preparation.
    fn post_column_change(&self) -> Result<(), Error>;
}

/// Hooks for backends that need no preparation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl SchemaHooks for NoopHooks {
    fn pre_column_change(&self) -> Result<bool, Error> {
        Ok(false)
    }

    fn post_column_change(&self) -> Result<(), Error> {
        Ok(())
    }
}
