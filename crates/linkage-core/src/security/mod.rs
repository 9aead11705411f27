//! Access control for relation descriptors.
//!
//! A caller is described by an [`Accountability`]: identity, an
//! administrative flag and the permission rows granted to its role. The
//! [`PermissionOracle`] turns those into per-collection field allow-lists,
//! and [`filter_forbidden`] drops every relation the caller may not see.
//!
//! Relations are all-or-nothing visible. Denials are reported with the same
//! [`Error::Forbidden`](crate::Error::Forbidden) whether the target is hidden
//! or missing.

pub mod accountability;
pub mod filter;
pub mod oracle;

pub use accountability::{Accountability, Action, Permission};
pub use filter::filter_forbidden;
pub use oracle::{AccountabilityOracle, AllowedFields, PermissionOracle};
