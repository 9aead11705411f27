//! Core error types.

use thiserror::Error;

/// Errors raised by the relation service and its embedded backend.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller may not perform the operation, or the target is not visible to it.
    ///
    /// Carries no detail so that callers can't tell a hidden record from a missing one.
    #[error("you don't have permission to access this")]
    Forbidden,

    /// The request payload failed validation.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A database-level constraint rejected a transaction.
    #[error("constraint violation: {0}")]
    Constraint(#[from] ConstraintError),

    /// A schema hook failed.
    #[error("schema hook failed: {0}")]
    Hook(String),

    /// Cache invalidation failed.
    #[error("cache error: {0}")]
    Cache(String),
}

impl Error {
    /// Build an invalid payload error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidPayload(message.into())
    }

    /// Check if this is a permission error.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Error::Forbidden)
    }

    /// Check if this is a payload validation error.
    pub fn is_invalid_payload(&self) -> bool {
        matches!(self, Error::InvalidPayload(_))
    }
}

/// Rule violations detected by the physical schema or the metadata store on commit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintError {
    /// Table does not exist.
    #[error("table \"{table}\" does not exist")]
    UnknownTable {
        /// Table name.
        table: String,
    },

    /// Column does not exist on the table.
    #[error("column \"{column}\" does not exist on table \"{table}\"")]
    UnknownColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Table already exists.
    #[error("table \"{table}\" already exists")]
    TableExists {
        /// Table name.
        table: String,
    },

    /// The column already participates in a foreign key.
    #[error("column \"{table}\".\"{column}\" already has foreign key \"{constraint}\"")]
    ForeignKeyExists {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Existing constraint name.
        constraint: String,
    },

    /// Constraint name is already taken.
    #[error("constraint \"{name}\" already exists")]
    DuplicateConstraintName {
        /// Constraint name.
        name: String,
    },

    /// Constraint does not exist on the table.
    #[error("constraint \"{name}\" does not exist on table \"{table}\"")]
    UnknownConstraint {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },

    /// Foreign keys may only reference the primary key of the target table.
    #[error("foreign key must reference the primary key of \"{table}\", got \"{column}\"")]
    NotPrimaryKey {
        /// Referenced table.
        table: String,
        /// Referenced column.
        column: String,
    },

    /// Referencing and referenced column types differ.
    #[error("incompatible types: \"{column}\" is {column_type}, referenced key is {referenced_type}")]
    IncompatibleTypes {
        /// Referencing column.
        column: String,
        /// Referencing column type.
        column_type: String,
        /// Referenced primary key type.
        referenced_type: String,
    },

    /// A table that is still referenced can't be dropped.
    #[error("table \"{table}\" is referenced by constraint \"{constraint}\"")]
    StillReferenced {
        /// Table name.
        table: String,
        /// Referencing constraint.
        constraint: String,
    },

    /// A metadata row already exists for this collection and field.
    #[error("relation metadata for \"{collection}\".\"{field}\" already exists")]
    DuplicateRelation {
        /// Owning collection.
        collection: String,
        /// Owning field.
        field: String,
    },

    /// No metadata row has this id.
    #[error("relation metadata {id} does not exist")]
    UnknownRelation {
        /// Metadata row id.
        id: u64,
    },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_has_no_detail() {
        let err = Error::Forbidden;
        assert_eq!(err.to_string(), "you don't have permission to access this");
        assert!(err.is_forbidden());
        assert!(!err.is_invalid_payload());
    }

    #[test]
    fn test_constraint_display() {
        let err: Error = ConstraintError::ForeignKeyExists {
            table: "articles".into(),
            column: "author_id".into(),
            constraint: "articles_author_id_foreign".into(),
        }
        .into();
        let text = err.to_string();
        assert!(text.contains("articles"));
        assert!(text.contains("articles_author_id_foreign"));
    }
}
