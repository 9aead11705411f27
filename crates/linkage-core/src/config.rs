//! Reconciler configuration.

use crate::relation::DEFAULT_MAX_IDENTIFIER_LENGTH;

/// Default name of the relation metadata collection.
pub const DEFAULT_RELATIONS_COLLECTION: &str = "linkage_relations";

/// Configuration for the [`RelationsService`](crate::RelationsService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Collection holding relation metadata; base read access is checked against it.
    pub relations_collection: String,
    /// Longest constraint name before hashing kicks in.
    pub max_identifier_length: usize,
    /// Whether reads include the built-in system relations.
    pub include_system_relations: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            relations_collection: DEFAULT_RELATIONS_COLLECTION.to_string(),
            max_identifier_length: DEFAULT_MAX_IDENTIFIER_LENGTH,
            include_system_relations: true,
        }
    }
}

impl ServiceConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the metadata collection name.
    pub fn with_relations_collection(mut self, collection: impl Into<String>) -> Self {
        self.relations_collection = collection.into();
        self
    }

    /// Set the maximum identifier length. Zero is raised to one.
    pub fn with_max_identifier_length(mut self, length: usize) -> Self {
        self.max_identifier_length = length.max(1);
        self
    }

    /// Include or exclude the built-in system relations from reads.
    pub fn with_system_relations(mut self, include: bool) -> Self {
        self.include_system_relations = include;
        self
    }
}
