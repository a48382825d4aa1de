//! Schema reconciliation
//!
//! Brings a live table in line with a declared [`TableSchema`] using
//! additive DDL only:
//!
//! - Missing table: `CREATE TABLE` with the identity column and every
//!   declared column
//! - Declared column missing from the table: `ALTER TABLE ... ADD COLUMN`
//! - Live column that is not declared: warning, left untouched
//! - Live column whose type or default differs from the declaration:
//!   [`MapperError::SchemaConflict`]
//!
//! Planning is a pure function of the declared schema and the introspected
//! columns ([`plan`]), so a conflict is detected before any DDL runs.
//! Reconciling an already conforming table issues no statements.

use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::database::{self, Database};
use crate::error::{MapperError, MapperResult};
use crate::schema::{quote_ident, ColumnSpec, TableSchema};

/// Column definition introspected from an existing table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    pub name: String,
    /// Declared SQL type, uppercased
    pub sql_type: String,
    /// Default as SQL text, `None` when the column has no default
    pub default: Option<String>,
    pub primary_key: bool,
}

/// One DDL statement the plan will execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    CreateTable { statement: String },
    AddColumn { column: String, statement: String },
}

impl SchemaChange {
    pub fn statement(&self) -> &str {
        match self {
            SchemaChange::CreateTable { statement } => statement,
            SchemaChange::AddColumn { statement, .. } => statement,
        }
    }
}

/// What reconciliation will do to a table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub changes: Vec<SchemaChange>,
    /// Live columns that are not declared and will be ignored
    pub ignored_columns: Vec<String>,
}

impl ReconcilePlan {
    /// True when the table already conforms
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// What reconciliation did to a table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub table: String,
    pub created: bool,
    pub added_columns: Vec<String>,
    pub ignored_columns: Vec<String>,
    pub warnings: Vec<String>,
}

impl ReconcileReport {
    /// True when no DDL was issued
    pub fn is_unchanged(&self) -> bool {
        !self.created && self.added_columns.is_empty()
    }
}

/// Compute the changes that bring `live` in line with `schema`
///
/// `live` is `None` when the table does not exist. Names match
/// case-insensitively, as SQLite identifiers do. Declared columns are
/// visited in declaration order, so the resulting statements are
/// deterministic.
pub fn plan(schema: &TableSchema, live: Option<&[LiveColumn]>) -> MapperResult<ReconcilePlan> {
    let Some(live) = live else {
        return Ok(ReconcilePlan {
            changes: vec![SchemaChange::CreateTable {
                statement: create_table_sql(schema),
            }],
            ignored_columns: Vec::new(),
        });
    };

    let table = schema.table_name();
    let mut ignored_columns = Vec::new();
    let mut has_identity = false;

    for column in live {
        if column.name.eq_ignore_ascii_case(schema.identity()) {
            if column.sql_type != "INTEGER" || !column.primary_key {
                return Err(conflict(
                    table,
                    &column.name,
                    format!(
                        "identity must be an INTEGER primary key, found {}",
                        describe(&column.sql_type, column.default.as_deref())
                    ),
                ));
            }
            has_identity = true;
            continue;
        }

        let Some(declared) = schema.get_column(&column.name) else {
            ignored_columns.push(column.name.clone());
            continue;
        };

        let expected_type = declared.scalar_type.sql_type();
        let expected_default = declared.default_literal();
        if column.sql_type != expected_type || column.default != expected_default {
            return Err(conflict(
                table,
                &column.name,
                format!(
                    "declared {}, found {}",
                    describe(expected_type, expected_default.as_deref()),
                    describe(&column.sql_type, column.default.as_deref())
                ),
            ));
        }
    }

    if !has_identity {
        return Err(conflict(
            table,
            schema.identity(),
            "identity column is missing from the table".to_string(),
        ));
    }

    let changes = schema
        .columns()
        .iter()
        .filter(|declared| {
            !live
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&declared.name))
        })
        .map(|declared| SchemaChange::AddColumn {
            column: declared.name.clone(),
            statement: add_column_sql(table, declared),
        })
        .collect();

    Ok(ReconcilePlan {
        changes,
        ignored_columns,
    })
}

/// Reconcile `schema` against the database, holding the connection lock
/// for the whole operation
pub fn reconcile(db: &Database, schema: &TableSchema) -> MapperResult<ReconcileReport> {
    db.with_connection(|conn| reconcile_on(conn, schema))
}

pub(crate) fn reconcile_on(conn: &Connection, schema: &TableSchema) -> MapperResult<ReconcileReport> {
    let table = schema.table_name();
    let live = if database::table_exists(conn, table)? {
        Some(database::table_columns(conn, table)?)
    } else {
        None
    };

    let plan = plan(schema, live.as_deref())?;

    let mut report = ReconcileReport {
        table: table.to_string(),
        ..Default::default()
    };

    for column in plan.ignored_columns {
        let message = format!(
            "Column {} present in table {} but not in schema; it is ignored and won't be visible to records",
            column, table
        );
        warn!("{}", message);
        report.warnings.push(message);
        report.ignored_columns.push(column);
    }

    // Statements already executed stay applied if a later one fails
    for change in plan.changes {
        database::run(conn, change.statement(), &[])?;
        match change {
            SchemaChange::CreateTable { .. } => {
                info!("Created table {}", table);
                report.created = true;
            }
            SchemaChange::AddColumn { column, .. } => {
                info!("Added column {} to table {}", column, table);
                report.added_columns.push(column);
            }
        }
    }

    Ok(report)
}

fn create_table_sql(schema: &TableSchema) -> String {
    let definitions: Vec<String> = std::iter::once(format!(
        "{} INTEGER PRIMARY KEY AUTOINCREMENT",
        quote_ident(schema.identity())
    ))
    .chain(schema.columns().iter().map(ColumnSpec::definition))
    .collect();

    format!(
        "CREATE TABLE {} ({})",
        quote_ident(schema.table_name()),
        definitions.join(", ")
    )
}

fn add_column_sql(table: &str, column: &ColumnSpec) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote_ident(table),
        column.definition()
    )
}

fn describe(sql_type: &str, default: Option<&str>) -> String {
    match default {
        Some(default) => format!("{} DEFAULT {}", sql_type, default),
        None => sql_type.to_string(),
    }
}

fn conflict(table: &str, column: &str, detail: String) -> MapperError {
    MapperError::SchemaConflict {
        table: table.to_string(),
        column: column.to_string(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScalarType;

    fn people() -> TableSchema {
        TableSchema::new("people")
            .column("name", ScalarType::Text)
            .column_with_default("age", ScalarType::Integer, 0)
            .validated()
            .unwrap()
    }

    fn live(name: &str, sql_type: &str, default: Option<&str>) -> LiveColumn {
        LiveColumn {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            default: default.map(String::from),
            primary_key: false,
        }
    }

    fn identity() -> LiveColumn {
        LiveColumn {
            primary_key: true,
            ..live("id", "INTEGER", None)
        }
    }

    fn columns(db: &Database, table: &str) -> Vec<String> {
        db.table_columns(table)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect()
    }

    #[test]
    fn test_plan_for_missing_table() {
        let plan = plan(&people(), None).unwrap();
        assert_eq!(
            plan.changes,
            vec![SchemaChange::CreateTable {
                statement: "CREATE TABLE \"people\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"name\" STRING, \"age\" INTEGER DEFAULT 0)".to_string()
            }]
        );
    }

    #[test]
    fn test_plan_adds_missing_columns_only() {
        let existing = vec![identity(), live("name", "STRING", None)];
        let plan = plan(&people(), Some(&existing)).unwrap();

        assert_eq!(
            plan.changes,
            vec![SchemaChange::AddColumn {
                column: "age".to_string(),
                statement: "ALTER TABLE \"people\" ADD COLUMN \"age\" INTEGER DEFAULT 0"
                    .to_string()
            }]
        );
        assert!(plan.ignored_columns.is_empty());
    }

    #[test]
    fn test_plan_ignores_undeclared_columns() {
        let existing = vec![
            identity(),
            live("legacy", "BLOB", None),
            live("name", "STRING", None),
            live("age", "INTEGER", Some("0")),
        ];
        let plan = plan(&people(), Some(&existing)).unwrap();

        assert!(plan.is_empty());
        assert_eq!(plan.ignored_columns, vec!["legacy".to_string()]);
    }

    #[test]
    fn test_plan_type_conflict() {
        let schema = TableSchema::new("people")
            .column("age", ScalarType::Real)
            .column("email", ScalarType::Text)
            .validated()
            .unwrap();
        let existing = vec![identity(), live("age", "INTEGER", Some("0"))];

        let err = plan(&schema, Some(&existing)).unwrap_err();
        match err {
            MapperError::SchemaConflict { column, detail, .. } => {
                assert_eq!(column, "age");
                assert_eq!(detail, "declared REAL, found INTEGER DEFAULT 0");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_plan_default_conflict() {
        let existing = vec![
            identity(),
            live("name", "STRING", None),
            live("age", "INTEGER", Some("18")),
        ];
        let err = plan(&people(), Some(&existing)).unwrap_err();
        assert!(matches!(err, MapperError::SchemaConflict { ref column, .. } if column == "age"));
    }

    #[test]
    fn test_plan_requires_identity() {
        let existing = vec![live("name", "STRING", None)];
        let err = plan(&people(), Some(&existing)).unwrap_err();
        assert!(matches!(err, MapperError::SchemaConflict { ref column, .. } if column == "id"));
    }

    #[test]
    fn test_plan_matches_names_ignoring_case() {
        let existing = vec![
            LiveColumn {
                primary_key: true,
                ..live("ID", "INTEGER", None)
            },
            live("Name", "STRING", None),
        ];
        let plan = plan(&people(), Some(&existing)).unwrap();

        assert!(plan.ignored_columns.is_empty());
        assert_eq!(plan.changes.len(), 1);
        assert!(matches!(
            &plan.changes[0],
            SchemaChange::AddColumn { column, .. } if column == "age"
        ));
    }

    #[test]
    fn test_plan_case_mismatch_still_checks_types() {
        let existing = vec![identity(), live("AGE", "REAL", None)];
        let err = plan(&people(), Some(&existing)).unwrap_err();
        assert!(matches!(err, MapperError::SchemaConflict { ref column, .. } if column == "AGE"));
    }

    #[test]
    fn test_reconcile_table_and_columns_differing_in_case() {
        let db = Database::open_in_memory().unwrap();
        db.execute(
            "CREATE TABLE People (id INTEGER PRIMARY KEY AUTOINCREMENT, Name STRING)",
            &[],
        )
        .unwrap();

        let report = reconcile(&db, &people()).unwrap();
        assert!(!report.created);
        assert_eq!(report.added_columns, vec!["age".to_string()]);
        assert!(report.warnings.is_empty());
        assert_eq!(columns(&db, "people"), vec!["id", "Name", "age"]);

        assert!(reconcile(&db, &people()).unwrap().is_unchanged());
    }

    #[test]
    fn test_reconcile_creates_table() {
        let db = Database::open_in_memory().unwrap();
        let report = reconcile(&db, &people()).unwrap();

        assert!(report.created);
        assert!(report.added_columns.is_empty());
        assert_eq!(columns(&db, "people"), vec!["id", "name", "age"]);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        reconcile(&db, &people()).unwrap();

        let report = reconcile(&db, &people()).unwrap();
        assert!(report.is_unchanged());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_reconcile_adds_columns_without_touching_others() {
        let db = Database::open_in_memory().unwrap();
        db.execute(
            "CREATE TABLE people (id INTEGER PRIMARY KEY AUTOINCREMENT, name STRING, legacy TEXT)",
            &[],
        )
        .unwrap();
        db.execute(
            "INSERT INTO people (name, legacy) VALUES ('ann', 'x')",
            &[],
        )
        .unwrap();

        let report = reconcile(&db, &people()).unwrap();
        assert!(!report.created);
        assert_eq!(report.added_columns, vec!["age".to_string()]);
        assert_eq!(report.ignored_columns, vec!["legacy".to_string()]);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(columns(&db, "people"), vec!["id", "name", "legacy", "age"]);

        // The legacy column keeps its data
        let rows = db.execute("SELECT legacy FROM people", &[]).unwrap();
        assert_eq!(rows[0].get(0).and_then(|v| v.as_str()), Some("x"));

        // Second pass: only the warning remains
        let report = reconcile(&db, &people()).unwrap();
        assert!(report.is_unchanged());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_reconcile_conflict_issues_no_ddl() {
        let db = Database::open_in_memory().unwrap();
        db.execute(
            "CREATE TABLE people (id INTEGER PRIMARY KEY AUTOINCREMENT, age INTEGER DEFAULT 0)",
            &[],
        )
        .unwrap();

        let schema = TableSchema::new("people")
            .column("email", ScalarType::Text)
            .column("age", ScalarType::Real)
            .validated()
            .unwrap();

        let err = reconcile(&db, &schema).unwrap_err();
        assert!(matches!(err, MapperError::SchemaConflict { .. }));
        assert_eq!(columns(&db, "people"), vec!["id", "age"]);
    }

    #[test]
    fn test_reconcile_round_trips_every_default_kind() {
        let schema = TableSchema::new("settings")
            .column_with_default("label", ScalarType::Text, "it's")
            .column_with_default("ratio", ScalarType::Real, 0.25)
            .column_with_default("enabled", ScalarType::Boolean, true)
            .column_with_default("offset", ScalarType::Integer, -4)
            .validated()
            .unwrap();

        let db = Database::open_in_memory().unwrap();
        reconcile(&db, &schema).unwrap();

        // Whatever SQLite reports back must compare equal to what we render
        let report = reconcile(&db, &schema).unwrap();
        assert!(report.is_unchanged());
    }
}
