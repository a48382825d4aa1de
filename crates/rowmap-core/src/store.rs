//! Per-table record store
//!
//! A [`RecordStore`] binds one declared [`TableSchema`] to a [`Database`].
//! Opening it validates the schema, reconciles the table and builds the
//! table's [`RecordType`]. Afterwards it creates records, loads them and
//! writes them back.
//!
//! ## Usage
//!
//! ```ignore
//! let db = Database::open("people.db")?;
//! let schema = TableSchema::new("people")
//!     .column("name", ScalarType::Text)
//!     .column("age", ScalarType::Integer);
//! let people = RecordStore::open(&db, schema)?;
//!
//! let mut bob = people.create([("name", Value::from("bob")), ("age", Value::from(30))])?;
//! bob.save()?;                 // INSERT, assigns bob.id()
//! bob.set("age", 31)?;
//! bob.save()?;                 // UPDATE
//!
//! let everyone = people.fetch_all()?;
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::database::{self, Database, Row};
use crate::error::{MapperError, MapperResult};
use crate::reconcile::{self, ReconcileReport};
use crate::record::{Record, RecordState, RecordType};
use crate::schema::{quote_ident, ScalarType, TableSchema};
use crate::value::Value;

/// The mapper for one table
///
/// Cloning is cheap; clones share the schema, record type and connection.
#[derive(Clone)]
pub struct RecordStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    db: Database,
    schema: TableSchema,
    record_type: Arc<RecordType>,
    report: ReconcileReport,
}

impl RecordStore {
    /// Validate `schema`, reconcile its table and build the store
    ///
    /// Schema errors are reported before the database is touched.
    pub fn open(db: &Database, schema: TableSchema) -> MapperResult<Self> {
        let schema = schema.validated()?;
        let report = reconcile::reconcile(db, &schema)?;
        let record_type = Arc::new(RecordType::for_schema(&schema));

        debug!(
            "Opened store for table {} with {} columns",
            schema.table_name(),
            schema.columns().len()
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                db: db.clone(),
                schema,
                record_type,
                report,
            }),
        })
    }

    pub fn table_name(&self) -> &str {
        self.inner.schema.table_name()
    }

    pub fn identity_field(&self) -> &str {
        self.inner.schema.identity()
    }

    pub fn schema(&self) -> &TableSchema {
        &self.inner.schema
    }

    pub fn record_type(&self) -> &RecordType {
        &self.inner.record_type
    }

    pub(crate) fn record_type_arc(&self) -> &Arc<RecordType> {
        &self.inner.record_type
    }

    pub fn database(&self) -> &Database {
        &self.inner.db
    }

    /// Report from the reconciliation run when the store was opened
    pub fn reconcile_report(&self) -> &ReconcileReport {
        &self.inner.report
    }

    /// Reconcile the table again
    ///
    /// Useful when another process may have altered the table.
    pub fn sync(&self) -> MapperResult<ReconcileReport> {
        reconcile::reconcile(&self.inner.db, &self.inner.schema)
    }

    /// Create a transient record
    ///
    /// Declared columns missing from `fields` take their default, or `Null`.
    /// The identity cannot be passed here.
    pub fn create<I, K, V>(&self, fields: I) -> MapperResult<Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = Record::empty(Arc::clone(self.record_type_arc()), self.clone());
        for (field, value) in fields {
            record.set(field.as_ref(), value)?;
        }

        for column in self.inner.schema.columns() {
            if !record.is_set(&column.name) {
                record.set(&column.name, column.default.clone())?;
            }
        }

        Ok(record)
    }

    /// Load every row of the table
    ///
    /// Only declared columns and the identity are selected, so ignored live
    /// columns never reach a record. NULL columns are left unset.
    pub fn fetch_all(&self) -> MapperResult<Vec<Record>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            self.inner.schema.select_list(),
            quote_ident(self.table_name()),
            quote_ident(self.identity_field())
        );

        let rows = self.inner.db.execute(&sql, &[])?;
        rows.into_iter().map(|row| self.materialize(row)).collect()
    }

    /// Insert when transient, update when persisted
    pub fn save(&self, record: &mut Record) -> MapperResult<()> {
        match record.state() {
            RecordState::Transient => self.insert(record),
            RecordState::Persisted(_) => self.update(record),
        }
    }

    /// Insert a transient record and assign its new identity
    ///
    /// The insert and the identity read-back run under one lock, and the
    /// identity comes from the connection's own last-insert rowid.
    pub fn insert(&self, record: &mut Record) -> MapperResult<()> {
        self.check_owner(record)?;
        if let Some(id) = record.id() {
            return Err(MapperError::AlreadyPersisted {
                table: self.table_name().to_string(),
                id,
            });
        }

        let (columns, params): (Vec<String>, Vec<Value>) = record
            .present_fields()
            .map(|(name, value)| (quote_ident(name), value.clone()))
            .unzip();

        let table = quote_ident(self.table_name());
        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table)
        } else {
            let placeholders: Vec<String> = (1..=params.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        let id = self.inner.db.with_connection(|conn| {
            database::run(conn, &sql, &params)?;
            Ok(conn.last_insert_rowid())
        })?;

        record.assign_identity(id);
        debug!("Inserted row {} into {}", id, self.table_name());
        Ok(())
    }

    /// Write every present field of a persisted record
    ///
    /// All fields are written by a single statement, so the row is updated
    /// atomically. Fails with [`MapperError::RowNotFound`] when the row is
    /// gone.
    pub fn update(&self, record: &mut Record) -> MapperResult<()> {
        self.check_owner(record)?;
        let Some(id) = record.id() else {
            return Err(MapperError::NotPersisted {
                table: self.table_name().to_string(),
            });
        };

        let (assignments, mut params): (Vec<String>, Vec<Value>) = record
            .present_fields()
            .enumerate()
            .map(|(i, (name, value))| (format!("{} = ?{}", quote_ident(name), i + 1), value.clone()))
            .unzip();

        if assignments.is_empty() {
            return Ok(());
        }

        params.push(Value::Integer(id));
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_ident(self.table_name()),
            assignments.join(", "),
            quote_ident(self.identity_field()),
            params.len()
        );

        let changed = self.inner.db.with_connection(|conn| {
            database::run(conn, &sql, &params)?;
            Ok(conn.changes())
        })?;

        if changed == 0 {
            return Err(MapperError::RowNotFound {
                table: self.table_name().to_string(),
                id,
            });
        }

        debug!("Updated row {} in {}", id, self.table_name());
        Ok(())
    }

    /// Turn a selected row into a persisted record
    fn materialize(&self, row: Row) -> MapperResult<Record> {
        let mut record = Record::empty(Arc::clone(self.record_type_arc()), self.clone());

        for (column, value) in row.iter() {
            if column == self.identity_field() {
                match value {
                    Value::Integer(id) => record.assign_identity(*id),
                    Value::Null => {}
                    other => {
                        return Err(MapperError::Coercion {
                            field: column.to_string(),
                            record_type: self.record_type().name().to_string(),
                            expected: ScalarType::Integer,
                            found: format!("{} {}", other.type_name(), other),
                        })
                    }
                }
            } else if !value.is_null() {
                record.set(column, value.clone())?;
            }
        }

        Ok(record)
    }

    fn check_owner(&self, record: &Record) -> MapperResult<()> {
        if Arc::ptr_eq(record.kind(), &self.inner.record_type) {
            Ok(())
        } else {
            Err(MapperError::ForeignRecord {
                table: self.table_name().to_string(),
                record_type: record.record_type().name().to_string(),
            })
        }
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("table", &self.table_name())
            .field("identity", &self.identity_field())
            .field("database", &self.inner.db)
            .finish()
    }
}
