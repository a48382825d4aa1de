//! Error handling
//!
//! Provides typed errors for schema, record and store operations with
//! descriptive messages and recovery suggestions.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::schema::{ScalarType, SchemaDefinitionError};

/// Errors that can occur while mapping rows
#[derive(Error, Debug)]
pub enum MapperError {
    /// The declared schema is malformed
    #[error("Invalid schema: {0}")]
    SchemaDefinition(#[from] SchemaDefinitionError),

    /// An existing column disagrees with its declaration
    #[error("Column '{column}' present in table '{table}' differs from the schema: {detail}")]
    SchemaConflict {
        table: String,
        column: String,
        detail: String,
    },

    /// Assignment to a field the record type does not declare
    #[error("Argument '{field}' not valid for {record_type}")]
    InvalidField { field: String, record_type: String },

    /// Read of a field the record type does not declare
    #[error("'{record_type}' has no attribute '{field}'")]
    UnknownAttribute { field: String, record_type: String },

    /// The identity field is only assigned by the store
    #[error("Field '{field}' of {record_type} is assigned by the store and cannot be set")]
    ReadOnlyIdentity { field: String, record_type: String },

    /// A value could not be converted to the field's type
    #[error("Cannot store {found} in '{field}' of {record_type}: expected {expected}")]
    Coercion {
        field: String,
        record_type: String,
        expected: ScalarType,
        found: String,
    },

    /// Insert requested for a record that already has an identity
    #[error("Record is already persisted in '{table}' with id {id}")]
    AlreadyPersisted { table: String, id: i64 },

    /// Update requested for a record that has no identity yet
    #[error("Record has not been persisted to '{table}'")]
    NotPersisted { table: String },

    /// Record handed to a store other than the one that created it
    #[error("Record of type {record_type} does not belong to table '{table}'")]
    ForeignRecord { table: String, record_type: String },

    /// Update matched no row
    #[error("No row with id {id} in table '{table}'")]
    RowNotFound { table: String, id: i64 },

    /// The database was closed
    #[error("Database connection is closed")]
    ConnectionClosed,

    /// A thread panicked while holding the connection lock
    #[error("Database lock poisoned by a panicked thread")]
    LockPoisoned,

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to prepare the database location
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MapperError {
    /// Check if the caller can fix this error and retry
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MapperError::InvalidField { .. }
                | MapperError::UnknownAttribute { .. }
                | MapperError::ReadOnlyIdentity { .. }
                | MapperError::Coercion { .. }
                | MapperError::CreateDirectory { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            MapperError::SchemaConflict { .. } => {
                Some("Declare the column with the type and default it already has in the table, or use a new column name.")
            }
            MapperError::SchemaDefinition(_) => {
                Some("Fix the schema declaration. Column names must be unique identifiers and must not reuse the identity name.")
            }
            MapperError::Coercion { .. } => {
                Some("Pass a value that converts to the column's declared type.")
            }
            MapperError::ConnectionClosed => Some("Open the database again before using the store."),
            MapperError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            _ => None,
        }
    }
}

/// Result type for mapper operations
pub type MapperResult<T> = Result<T, MapperError>;
