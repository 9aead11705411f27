//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use linkage_core::relation::DEFAULT_MAX_IDENTIFIER_LENGTH;
use linkage_core::{ServiceConfig, StorageConfig};

/// Default log filter when neither `--log-level` nor `RUST_LOG` is set.
pub const DEFAULT_LOG_FILTER: &str = "linkage=info";

/// Linkage - manage relations between collections.
#[derive(Parser, Debug)]
#[command(name = "linkage")]
#[command(version, about = "Manage foreign keys and relation metadata", long_about = None)]
pub struct Args {
    /// Path to the database directory.
    #[arg(short, long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Log filter (overrides RUST_LOG), e.g. "debug" or "linkage_core=trace".
    #[arg(long)]
    pub log_level: Option<String>,

    /// Page cache size in megabytes.
    #[arg(long, default_value_t = 64)]
    pub cache_mb: u64,

    /// Longest generated constraint name.
    #[arg(long, default_value_t = DEFAULT_MAX_IDENTIFIER_LENGTH)]
    pub max_identifier_length: usize,

    /// Leave the built-in system relations out of reads.
    #[arg(long)]
    pub no_system_relations: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Manage physical tables.
    #[command(subcommand)]
    Tables(TablesCommand),

    /// Manage relations.
    #[command(subcommand)]
    Relations(RelationsCommand),
}

/// `tables` subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum TablesCommand {
    /// Create tables from a JSON definition file (one table or an array).
    Apply {
        /// Definition file.
        file: PathBuf,
    },
    /// List tables.
    List,
}

/// Owning side of a relation.
#[derive(ClapArgs, Debug, PartialEq, Eq)]
pub struct FieldRef {
    /// Owning collection.
    pub collection: String,
    /// Owning field.
    pub field: String,
}

/// `relations` subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum RelationsCommand {
    /// List relations.
    List {
        /// Only relations owned by this collection.
        #[arg(short, long)]
        collection: Option<String>,
    },
    /// Show one relation.
    Get(FieldRef),
    /// Create a relation from a JSON payload (or @file).
    Create {
        /// Payload, e.g. '{"collection":"articles","field":"author_id","related_collection":"authors"}'.
        payload: String,
    },
    /// Update a relation from a JSON payload (or @file).
    Update {
        #[command(flatten)]
        target: FieldRef,
        /// Payload, e.g. '{"schema":{"on_delete":"CASCADE"}}'.
        payload: String,
    },
    /// Delete a relation.
    Delete(FieldRef),
}

impl Args {
    /// Storage configuration for the data directory.
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig::new(&self.data_dir).with_cache_capacity(self.cache_mb * 1024 * 1024)
    }

    /// Reconciler configuration.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig::new()
            .with_max_identifier_length(self.max_identifier_length)
            .with_system_relations(!self.no_system_relations)
    }

    /// Log filter to install.
    pub fn log_filter(&self) -> Option<&str> {
        self.log_level.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_relations_get() {
        let args = Args::try_parse_from(["linkage", "relations", "get", "articles", "author_id"])
            .unwrap();
        assert_eq!(args.data_dir, PathBuf::from("./data"));
        assert_eq!(
            args.command,
            Command::Relations(RelationsCommand::Get(FieldRef {
                collection: "articles".into(),
                field: "author_id".into(),
            }))
        );
    }

    #[test]
    fn test_parse_update_with_global_flags() {
        let args = Args::try_parse_from([
            "linkage",
            "--data-dir",
            "/tmp/db",
            "--no-system-relations",
            "--max-identifier-length",
            "40",
            "relations",
            "update",
            "articles",
            "author_id",
            "{}",
        ])
        .unwrap();

        let service = args.service_config();
        assert!(!service.include_system_relations);
        assert_eq!(service.max_identifier_length, 40);
        assert_eq!(args.storage_config().path, PathBuf::from("/tmp/db"));
        assert!(matches!(
            args.command,
            Command::Relations(RelationsCommand::Update { .. })
        ));
    }

    #[test]
    fn test_parse_list_collection() {
        let args =
            Args::try_parse_from(["linkage", "relations", "list", "--collection", "articles"])
                .unwrap();
        assert_eq!(
            args.command,
            Command::Relations(RelationsCommand::List {
                collection: Some("articles".into())
            })
        );
    }

    #[test]
    fn test_missing_subcommand_fails() {
        assert!(Args::try_parse_from(["linkage"]).is_err());
        assert!(Args::try_parse_from(["linkage", "relations", "get", "articles"]).is_err());
    }
}
