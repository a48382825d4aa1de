//! rowmap Core Library
//!
//! A small row mapper over SQLite. An application declares a table schema;
//! rowmap reconciles it with the table on disk and hands out typed records
//! that can only hold the declared fields.
//!
//! # Quick Start
//!
//! ```text
//! let db = Database::open("app.db")?;
//! let people = RecordStore::open(
//!     &db,
//!     TableSchema::new("people")
//!         .column("name", ScalarType::Text)
//!         .column_with_default("age", ScalarType::Integer, 0),
//! )?;
//!
//! let mut bob = people.create([("name", "bob")])?;
//! bob.save()?;
//!
//! for person in people.fetch_all()? {
//!     println!("{:?}", person);
//! }
//! ```
//!
//! # Modules
//!
//! - `store`: Per-table record store (main entry point)
//! - `record`: Record types and records
//! - `reconcile`: Additive schema reconciliation
//! - `schema`: Declared table schemas
//! - `value`: Scalar values and coercion
//! - `database`: SQLite connection boundary
//! - `config`: Application configuration

pub mod config;
pub mod database;
pub mod error;
pub mod reconcile;
pub mod record;
pub mod schema;
pub mod store;
pub mod value;

pub use config::Config;
pub use database::{Database, Row};
pub use error::{MapperError, MapperResult};
pub use reconcile::{reconcile, LiveColumn, ReconcilePlan, ReconcileReport, SchemaChange};
pub use record::{FieldDescriptor, Record, RecordState, RecordType};
pub use schema::{ColumnSpec, ScalarType, SchemaDefinitionError, TableSchema, DEFAULT_IDENTITY};
pub use store::RecordStore;
pub use value::{CoercionError, Value};
