//! Declared table schemas
//!
//! A [`TableSchema`] is what the application says a table should look like:
//! a table name, an ordered list of [`ColumnSpec`]s and the name of the
//! implicit identity column. Schemas can be built in code or loaded from a
//! TOML file:
//!
//! ```toml
//! table = "people"
//!
//! [[columns]]
//! name = "name"
//! type = "text"
//!
//! [[columns]]
//! name = "age"
//! type = "integer"
//! default = 0
//! ```
//!
//! The SQL type strings produced by [`ScalarType::sql_type`] are part of the
//! on-disk format. Existing tables are reconciled against them textually.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::Value;

/// Name of the identity column unless a schema picks another one
pub const DEFAULT_IDENTITY: &str = "id";

/// Errors in a declared schema, reported before the database is touched
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaDefinitionError {
    #[error("Schema must contain a table name")]
    MissingTableName,

    #[error("Schema must contain column definitions as an array of tables: {0}")]
    InvalidColumns(String),

    #[error("'{0}' is not a valid SQL identifier (use letters, digits and '_')")]
    InvalidIdentifier(String),

    #[error("Cannot use '{column}' as column name. It's reserved for the identity column.")]
    ReservedName { column: String },

    #[error("Column '{0}' is declared more than once")]
    DuplicateColumn(String),

    #[error("Illegal type '{type_name}' for column '{column}'. Must be one of integer, real, boolean, text.")]
    UnknownScalarType { column: String, type_name: String },

    #[error("Invalid default for column '{column}': {reason}")]
    InvalidDefault { column: String, reason: String },

    #[error("Failed to parse schema: {0}")]
    Parse(String),
}

/// Column types a schema may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Integer,
    Real,
    Boolean,
    Text,
}

impl ScalarType {
    /// SQL type used in `CREATE TABLE` / `ADD COLUMN`
    pub fn sql_type(&self) -> &'static str {
        match self {
            ScalarType::Integer => "INTEGER",
            ScalarType::Real => "REAL",
            ScalarType::Boolean => "BOOLEAN",
            ScalarType::Text => "STRING",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Integer => write!(f, "integer"),
            ScalarType::Real => write!(f, "real"),
            ScalarType::Boolean => write!(f, "boolean"),
            ScalarType::Text => write!(f, "text"),
        }
    }
}

impl FromStr for ScalarType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" => Ok(ScalarType::Integer),
            "real" | "float" => Ok(ScalarType::Real),
            "boolean" | "bool" => Ok(ScalarType::Boolean),
            "text" | "string" | "str" => Ok(ScalarType::Text),
            _ => Err(()),
        }
    }
}

/// One declared column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub scalar_type: ScalarType,
    /// `Value::Null` means no default
    pub default: Value,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
            default: Value::Null,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    /// The DEFAULT literal, if the column has one
    pub fn default_literal(&self) -> Option<String> {
        self.default.to_sql_literal()
    }

    /// Render as `"name" TYPE [DEFAULT value]`
    pub fn definition(&self) -> String {
        match self.default_literal() {
            Some(literal) => format!(
                "{} {} DEFAULT {}",
                quote_ident(&self.name),
                self.scalar_type.sql_type(),
                literal
            ),
            None => format!("{} {}", quote_ident(&self.name), self.scalar_type.sql_type()),
        }
    }
}

/// A declared table
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    table_name: String,
    identity: String,
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Start a schema for `table_name` with the default `id` identity column
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            identity: DEFAULT_IDENTITY.to_string(),
            columns: Vec::new(),
        }
    }

    /// Use a different name for the identity column
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Declare a column without a default
    pub fn column(self, name: impl Into<String>, scalar_type: ScalarType) -> Self {
        self.with_column(ColumnSpec::new(name, scalar_type))
    }

    /// Declare a column with a default
    pub fn column_with_default(
        self,
        name: impl Into<String>,
        scalar_type: ScalarType,
        default: impl Into<Value>,
    ) -> Self {
        self.with_column(ColumnSpec::new(name, scalar_type).with_default(default))
    }

    pub fn with_column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Declared columns in declaration order (identity excluded)
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Look up a declared column, ignoring ASCII case like SQLite does
    pub fn get_column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Identity followed by every declared column, quoted for SQL
    ///
    /// Each column is aliased to its declared name, so result rows carry the
    /// declared spelling even when the live column differs in case.
    pub(crate) fn select_list(&self) -> String {
        std::iter::once(self.identity.as_str())
            .chain(self.columns.iter().map(|c| c.name.as_str()))
            .map(|name| {
                let quoted = quote_ident(name);
                format!("{} AS {}", quoted, quoted)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Check the schema and normalize column defaults to their column type
    ///
    /// Every later stage assumes a validated schema: identifiers are safe to
    /// interpolate, names are unique, and defaults render as literals of the
    /// declared type.
    pub fn validated(mut self) -> std::result::Result<Self, SchemaDefinitionError> {
        if self.table_name.trim().is_empty() {
            return Err(SchemaDefinitionError::MissingTableName);
        }
        check_identifier(&self.table_name)?;
        check_identifier(&self.identity)?;

        let mut seen = HashSet::new();
        for column in &mut self.columns {
            check_identifier(&column.name)?;
            if column.name.eq_ignore_ascii_case(&self.identity) {
                return Err(SchemaDefinitionError::ReservedName {
                    column: column.name.clone(),
                });
            }
            if !seen.insert(column.name.to_ascii_lowercase()) {
                return Err(SchemaDefinitionError::DuplicateColumn(column.name.clone()));
            }

            let default = std::mem::replace(&mut column.default, Value::Null);
            let default = default.coerce(column.scalar_type).map_err(|e| {
                SchemaDefinitionError::InvalidDefault {
                    column: column.name.clone(),
                    reason: e.to_string(),
                }
            })?;
            if let Value::Real(f) = default {
                if !f.is_finite() {
                    return Err(SchemaDefinitionError::InvalidDefault {
                        column: column.name.clone(),
                        reason: format!("{} has no SQL literal", f),
                    });
                }
            }
            column.default = default;
        }

        Ok(self)
    }

    /// Parse a schema from TOML
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, SchemaDefinitionError> {
        let file: SchemaFile =
            toml::from_str(content).map_err(|e| SchemaDefinitionError::Parse(e.to_string()))?;

        let table = file
            .table
            .filter(|t| !t.trim().is_empty())
            .ok_or(SchemaDefinitionError::MissingTableName)?;

        let mut schema = TableSchema::new(table);
        if let Some(identity) = file.identity {
            schema = schema.with_identity(identity);
        }

        let columns = match file.columns {
            Some(toml::Value::Array(columns)) => columns,
            Some(other) => {
                return Err(SchemaDefinitionError::InvalidColumns(format!(
                    "found {}",
                    other.type_str()
                )))
            }
            None => return Err(SchemaDefinitionError::InvalidColumns("missing".to_string())),
        };

        for (position, entry) in columns.into_iter().enumerate() {
            schema = schema.with_column(column_from_toml(position, entry)?);
        }

        schema.validated()
    }

    /// Load a schema file from disk
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema file: {:?}", path))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid schema file: {:?}", path))
    }
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    table: Option<String>,
    identity: Option<String>,
    columns: Option<toml::Value>,
}

fn column_from_toml(
    position: usize,
    entry: toml::Value,
) -> std::result::Result<ColumnSpec, SchemaDefinitionError> {
    let toml::Value::Table(mut table) = entry else {
        return Err(SchemaDefinitionError::InvalidColumns(format!(
            "entry {} is not a table",
            position
        )));
    };

    let name = match table.remove("name") {
        Some(toml::Value::String(name)) => name,
        _ => {
            return Err(SchemaDefinitionError::InvalidColumns(format!(
                "entry {} has no string 'name'",
                position
            )))
        }
    };

    let type_name = match table.remove("type") {
        Some(toml::Value::String(type_name)) => type_name,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let scalar_type = type_name
        .parse::<ScalarType>()
        .map_err(|_| SchemaDefinitionError::UnknownScalarType {
            column: name.clone(),
            type_name: type_name.clone(),
        })?;

    let default = match table.remove("default") {
        None => Value::Null,
        Some(toml::Value::Integer(i)) => Value::Integer(i),
        Some(toml::Value::Float(f)) => Value::Real(f),
        Some(toml::Value::Boolean(b)) => Value::Boolean(b),
        Some(toml::Value::String(s)) => Value::Text(s),
        Some(other) => {
            return Err(SchemaDefinitionError::InvalidDefault {
                column: name,
                reason: format!("unsupported {} value", other.type_str()),
            })
        }
    };

    Ok(ColumnSpec::new(name, scalar_type).with_default(default))
}

fn check_identifier(name: &str) -> std::result::Result<(), SchemaDefinitionError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SchemaDefinitionError::InvalidIdentifier(name.to_string()))
    }
}

/// Quote a validated identifier for SQL
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> TableSchema {
        TableSchema::new("people")
            .column("name", ScalarType::Text)
            .column_with_default("age", ScalarType::Integer, 0)
    }

    #[test]
    fn test_sql_type_mapping() {
        assert_eq!(ScalarType::Integer.sql_type(), "INTEGER");
        assert_eq!(ScalarType::Real.sql_type(), "REAL");
        assert_eq!(ScalarType::Boolean.sql_type(), "BOOLEAN");
        assert_eq!(ScalarType::Text.sql_type(), "STRING");
    }

    #[test]
    fn test_column_definition() {
        let schema = people().validated().unwrap();
        assert_eq!(schema.columns()[0].definition(), "\"name\" STRING");
        assert_eq!(schema.columns()[1].definition(), "\"age\" INTEGER DEFAULT 0");
    }

    #[test]
    fn test_reserved_identity_name() {
        let err = TableSchema::new("people")
            .column("id", ScalarType::Integer)
            .validated()
            .unwrap_err();
        assert!(matches!(err, SchemaDefinitionError::ReservedName { .. }));

        // A custom identity frees up "id"
        let schema = TableSchema::new("people")
            .with_identity("person_id")
            .column("id", ScalarType::Integer)
            .validated()
            .unwrap();
        assert_eq!(schema.identity(), "person_id");
    }

    #[test]
    fn test_rejects_bad_identifiers_and_duplicates() {
        let err = TableSchema::new("people; DROP TABLE x")
            .validated()
            .unwrap_err();
        assert!(matches!(err, SchemaDefinitionError::InvalidIdentifier(_)));

        let err = TableSchema::new("")
            .column("a", ScalarType::Text)
            .validated()
            .unwrap_err();
        assert_eq!(err, SchemaDefinitionError::MissingTableName);

        let err = people()
            .column("Name", ScalarType::Text)
            .validated()
            .unwrap_err();
        assert_eq!(err, SchemaDefinitionError::DuplicateColumn("Name".into()));
    }

    #[test]
    fn test_defaults_are_coerced() {
        let schema = TableSchema::new("t")
            .column_with_default("ratio", ScalarType::Real, 1)
            .column_with_default("flag", ScalarType::Boolean, "true")
            .validated()
            .unwrap();
        assert_eq!(schema.columns()[0].default, Value::Real(1.0));
        assert_eq!(schema.columns()[1].default, Value::Boolean(true));

        let err = TableSchema::new("t")
            .column_with_default("age", ScalarType::Integer, "old")
            .validated()
            .unwrap_err();
        assert!(matches!(err, SchemaDefinitionError::InvalidDefault { .. }));
    }

    #[test]
    fn test_from_toml() {
        let schema = TableSchema::from_toml_str(
            r#"
            table = "people"

            [[columns]]
            name = "name"
            type = "text"

            [[columns]]
            name = "age"
            type = "INT"
            default = 0

            [[columns]]
            name = "score"
            type = "float"
            "#,
        )
        .unwrap();

        assert_eq!(schema.table_name(), "people");
        assert_eq!(schema.identity(), DEFAULT_IDENTITY);
        let names: Vec<_> = schema.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["name", "age", "score"]);
        assert_eq!(schema.get_column("age").unwrap().default, Value::Integer(0));
        assert_eq!(
            schema.get_column("score").unwrap().scalar_type,
            ScalarType::Real
        );
    }

    #[test]
    fn test_from_toml_errors() {
        let err = TableSchema::from_toml_str("columns = []").unwrap_err();
        assert_eq!(err, SchemaDefinitionError::MissingTableName);

        let err = TableSchema::from_toml_str(
            r#"
            table = "t"
            columns = "name"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaDefinitionError::InvalidColumns(_)));

        let err = TableSchema::from_toml_str(
            r#"
            table = "t"
            [[columns]]
            name = "blob"
            type = "bytes"
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SchemaDefinitionError::UnknownScalarType { ref type_name, .. } if type_name == "bytes"
        ));
    }

    #[test]
    fn test_select_list() {
        assert_eq!(
            people().select_list(),
            "\"id\" AS \"id\", \"name\" AS \"name\", \"age\" AS \"age\""
        );
    }
}
