//! Command handlers

use std::path::Path;

use anyhow::{bail, Context, Result};

use rowmap_core::{Config, Database, RecordStore, TableSchema, Value};

pub mod config;
pub mod record;
pub mod sync;

/// Open the configured database and the store for a schema file
///
/// Opening the store reconciles the table.
pub fn open_store(config: &Config, schema_path: &Path) -> Result<RecordStore> {
    let schema = TableSchema::from_path(schema_path)?;
    let db = Database::open(&config.database_path)
        .with_context(|| format!("Failed to open database at {:?}", config.database_path))?;
    RecordStore::open(&db, schema).context("Failed to open table")
}

/// Parse `field=value` arguments
///
/// Values are passed as text and converted by the column type when
/// assigned. A bare `null` becomes NULL.
pub fn parse_assignments(args: &[String]) -> Result<Vec<(String, Value)>> {
    args.iter()
        .map(|arg| {
            let Some((field, value)) = arg.split_once('=') else {
                bail!("Expected field=value, got '{}'", arg);
            };
            let field = field.trim();
            if field.is_empty() {
                bail!("Missing field name in '{}'", arg);
            }
            let value = if value == "null" {
                Value::Null
            } else {
                Value::from(value)
            };
            Ok((field.to_string(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_assignments() {
        let parsed = parse_assignments(&args(&["name=bob", "age=30", "note=a=b", "email=null"]))
            .unwrap();
        assert_eq!(
            parsed,
            vec![
                ("name".to_string(), Value::from("bob")),
                ("age".to_string(), Value::from("30")),
                ("note".to_string(), Value::from("a=b")),
                ("email".to_string(), Value::Null),
            ]
        );
    }

    #[test]
    fn test_parse_assignments_errors() {
        assert!(parse_assignments(&args(&["name"])).is_err());
        assert!(parse_assignments(&args(&["=bob"])).is_err());
    }
}
