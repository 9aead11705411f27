//! Cleanup that runs on every exit path of a mutation.

use tracing::warn;

use crate::error::Error;
use crate::hooks::SchemaHooks;

type Invalidation<'a> = Box<dyn FnOnce() -> Result<(), Error> + 'a>;

/// Runs the post-column-change hook (when the pre-hook asked for it) and
/// then the cache invalidation.
///
/// Call [`finish`](Self::finish) on the success path to get cleanup errors
/// back. If the guard is dropped instead, cleanup still runs and its errors
/// are logged, leaving the caller's original error untouched.
pub(crate) struct CleanupGuard<'a> {
    hooks: &'a dyn SchemaHooks,
    run_post_hook: bool,
    invalidate: Option<Invalidation<'a>>,
}

impl<'a> CleanupGuard<'a> {
    pub(crate) fn new(
        hooks: &'a dyn SchemaHooks,
        run_post_hook: bool,
        invalidate: impl FnOnce() -> Result<(), Error> + 'a,
    ) -> Self {
        Self {
            hooks,
            run_post_hook,
            invalidate: Some(Box::new(invalidate)),
        }
    }

    /// Run cleanup now and report its first error.
    pub(crate) fn finish(mut self) -> Result<(), Error> {
        self.run()
    }

    // Both steps are attempted even if the first one fails.
    fn run(&mut self) -> Result<(), Error> {
        let hook_result = if std::mem::take(&mut self.run_post_hook) {
            self.hooks.post_column_change()
        } else {
            Ok(())
        };

        let cache_result = match self.invalidate.take() {
            Some(invalidate) => invalidate(),
            None => Ok(()),
        };

        hook_result.and(cache_result)
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.run() {
            warn!(error = %e, "cleanup failed after mutation error");
        }
    }
}
