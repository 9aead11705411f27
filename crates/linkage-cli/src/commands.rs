//! Command execution.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use linkage_core::{
    Accountability, CollectionDef, Database, NewRelation, RelationUpdate, RelationsService,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{Args, Command, RelationsCommand, TablesCommand};
use crate::error::CliResult;

/// Table definition file: one table or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TableDefinitions {
    One(CollectionDef),
    Many(Vec<CollectionDef>),
}

impl TableDefinitions {
    fn into_vec(self) -> Vec<CollectionDef> {
        match self {
            TableDefinitions::One(table) => vec![table],
            TableDefinitions::Many(tables) => tables,
        }
    }
}

/// Open the database described by `args` and run its command.
///
/// Returns the pretty-printed JSON output.
pub fn run(args: Args) -> CliResult<String> {
    let db = Arc::new(Database::open(args.storage_config())?);
    let service = RelationsService::new(db.clone()).with_config(args.service_config());

    let output = execute(&service, args.command)?;
    db.flush()?;
    Ok(output)
}

/// Run one command against `service` as an administrator.
pub fn execute(service: &RelationsService, command: Command) -> CliResult<String> {
    let admin = Accountability::admin().with_user("cli");
    let acc = Some(&admin);
    let db = service.database();

    match command {
        Command::Tables(TablesCommand::Apply { file }) => {
            let tables: TableDefinitions = serde_json::from_str(&fs::read_to_string(&file)?)?;
            let mut created = Vec::new();
            for table in tables.into_vec() {
                db.physical().create_table(&table)?;
                created.push(table.name);
            }
            info!(file = %file.display(), tables = created.len(), "table definitions applied");
            to_json(&created)
        }
        Command::Tables(TablesCommand::List) => to_json(&db.physical().list_tables()?),
        Command::Relations(RelationsCommand::List { collection }) => {
            to_json(&service.read_all(acc, collection.as_deref())?)
        }
        Command::Relations(RelationsCommand::Get(target)) => {
            to_json(&service.read_one(acc, &target.collection, &target.field)?)
        }
        Command::Relations(RelationsCommand::Create { payload }) => {
            let relation: NewRelation = serde_json::from_str(&read_payload(&payload)?)?;
            to_json(&service.create_one(acc, relation)?)
        }
        Command::Relations(RelationsCommand::Update { target, payload }) => {
            let update: RelationUpdate = serde_json::from_str(&read_payload(&payload)?)?;
            to_json(&service.update_one(acc, &target.collection, &target.field, update)?)
        }
        Command::Relations(RelationsCommand::Delete(target)) => {
            service.delete_one(acc, &target.collection, &target.field)?;
            to_json(&serde_json::json!({
                "deleted": {"collection": target.collection, "field": target.field}
            }))
        }
    }
}

/// Inline JSON, or the contents of a file when prefixed with `@`.
fn read_payload(payload: &str) -> CliResult<String> {
    match payload.strip_prefix('@') {
        Some(path) => Ok(fs::read_to_string(Path::new(path))?),
        None => Ok(payload.to_string()),
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldRef;
    use linkage_core::StorageConfig;

    const TABLES: &str = r#"[
        {"name": "authors", "primary_key": "id", "fields": [
            {"name": "id", "type": "unsigned_integer"},
            {"name": "name", "type": "string"}
        ]},
        {"name": "articles", "primary_key": "id", "fields": [
            {"name": "id", "type": "integer"},
            {"name": "author_id", "type": "integer", "nullable": true}
        ]}
    ]"#;

    fn setup() -> (RelationsService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(StorageConfig::new(dir.path().join("db"))).unwrap();
        let service = RelationsService::new(Arc::new(db));

        let file = dir.path().join("tables.json");
        fs::write(&file, TABLES).unwrap();
        let output = execute(&service, Command::Tables(TablesCommand::Apply { file })).unwrap();
        assert!(output.contains("articles"));

        (service, dir)
    }

    fn target() -> FieldRef {
        FieldRef {
            collection: "articles".into(),
            field: "author_id".into(),
        }
    }

    #[test]
    fn test_relation_lifecycle() {
        let (service, _dir) = setup();

        let created = execute(
            &service,
            Command::Relations(RelationsCommand::Create {
                payload: r#"{"collection":"articles","field":"author_id","related_collection":"authors","schema":{"on_delete":"SET NULL"}}"#.into(),
            }),
        )
        .unwrap();
        let created: serde_json::Value = serde_json::from_str(&created).unwrap();
        assert_eq!(created["schema"]["constraint_name"], "articles_author_id_foreign");
        assert_eq!(created["schema"]["on_delete"], "SET NULL");

        let updated = execute(
            &service,
            Command::Relations(RelationsCommand::Update {
                target: target(),
                payload: r#"{"meta":{"one_field":"articles"}}"#.into(),
            }),
        )
        .unwrap();
        let updated: serde_json::Value = serde_json::from_str(&updated).unwrap();
        assert_eq!(updated["meta"]["one_field"], "articles");

        let listed = execute(
            &service,
            Command::Relations(RelationsCommand::List {
                collection: Some("articles".into()),
            }),
        )
        .unwrap();
        let listed: Vec<serde_json::Value> = serde_json::from_str(&listed).unwrap();
        assert_eq!(listed.len(), 1);

        execute(&service, Command::Relations(RelationsCommand::Delete(target()))).unwrap();
        let err = execute(&service, Command::Relations(RelationsCommand::Get(target())))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::CliError::Core(linkage_core::Error::Forbidden)
        ));
    }

    #[test]
    fn test_payload_from_file() {
        let (service, dir) = setup();
        let payload = dir.path().join("relation.json");
        fs::write(
            &payload,
            r#"{"collection":"articles","field":"author_id","related_collection":"authors"}"#,
        )
        .unwrap();

        execute(
            &service,
            Command::Relations(RelationsCommand::Create {
                payload: format!("@{}", payload.display()),
            }),
        )
        .unwrap();
        assert!(execute(&service, Command::Relations(RelationsCommand::Get(target()))).is_ok());
    }

    #[test]
    fn test_invalid_json_payload() {
        let (service, _dir) = setup();
        let err = execute(
            &service,
            Command::Relations(RelationsCommand::Create {
                payload: "{not json".into(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, crate::error::CliError::Json(_)));
    }

    #[test]
    fn test_tables_list() {
        let (service, _dir) = setup();
        let output = execute(&service, Command::Tables(TablesCommand::List)).unwrap();
        let tables: Vec<CollectionDef> = serde_json::from_str(&output).unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["articles", "authors"]);
    }
}
