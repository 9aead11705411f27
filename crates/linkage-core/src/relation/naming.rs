//! Deterministic constraint naming.

/// Longest identifier produced by [`constraint_name`].
pub const DEFAULT_MAX_IDENTIFIER_LENGTH: usize = 60;

/// Hex characters of the digest used for shortened names.
const HASH_LENGTH: usize = 32;

/// Kind of constraint or index being named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Foreign key.
    Foreign,
    /// Unique constraint.
    Unique,
    /// Plain index.
    Index,
    /// Primary key.
    Primary,
}

impl ConstraintKind {
    /// Suffix appended to generated names.
    pub fn suffix(&self) -> &'static str {
        match self {
            ConstraintKind::Foreign => "foreign",
            ConstraintKind::Unique => "unique",
            ConstraintKind::Index => "index",
            ConstraintKind::Primary => "primary",
        }
    }
}

/// Name a constraint on `collection.field`.
///
/// The result is `{collection}_{field}_{suffix}`. Names longer than
/// [`DEFAULT_MAX_IDENTIFIER_LENGTH`] are replaced by `{suffix}_{digest}`.
/// The same inputs always produce the same name, which lets callers guess
/// the name of a legacy constraint that was never recorded.
pub fn constraint_name(kind: ConstraintKind, collection: &str, field: &str) -> String {
    constraint_name_with_limit(kind, collection, field, DEFAULT_MAX_IDENTIFIER_LENGTH)
}

/// Like [`constraint_name`] with a custom identifier length limit.
pub fn constraint_name_with_limit(
    kind: ConstraintKind,
    collection: &str,
    field: &str,
    max_length: usize,
) -> String {
    let desired = format!("{}_{}_{}", collection, field, kind.suffix());
    if desired.len() <= max_length {
        return desired;
    }

    let digest = blake3::hash(desired.as_bytes()).to_hex();
    let suffix = kind.suffix();
    if max_length <= suffix.len() + 1 {
        // No room for the suffix: the digest alone, never empty.
        return digest.as_str()[..max_length.clamp(1, HASH_LENGTH)].to_string();
    }
    let room = (max_length - suffix.len() - 1).min(HASH_LENGTH);
    format!("{}_{}", suffix, &digest.as_str()[..room])
}
