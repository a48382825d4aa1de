//! Record command handlers

use std::path::Path;

use anyhow::{anyhow, Context, Result};

use rowmap_core::Config;

use super::{open_store, parse_assignments};
use crate::output::Output;

/// List every record of the table
pub fn list(config: &Config, schema_path: &Path, output: &Output) -> Result<()> {
    let store = open_store(config, schema_path)?;
    let records = store.fetch_all().context("Failed to load records")?;
    output.print_records(&records);
    Ok(())
}

/// Create and insert a record
pub fn insert(config: &Config, schema_path: &Path, fields: &[String], output: &Output) -> Result<()> {
    let store = open_store(config, schema_path)?;
    let mut record = store.create(parse_assignments(fields)?)?;
    record.save().context("Failed to insert record")?;

    output.print_saved("Inserted", &record);
    Ok(())
}

/// Assign fields on an existing record and save it
pub fn update(
    config: &Config,
    schema_path: &Path,
    id: i64,
    fields: &[String],
    output: &Output,
) -> Result<()> {
    let store = open_store(config, schema_path)?;
    let assignments = parse_assignments(fields)?;

    let mut record = store
        .fetch_all()?
        .into_iter()
        .find(|r| r.id() == Some(id))
        .ok_or_else(|| anyhow!("No record with id {} in {}", id, store.table_name()))?;

    for (field, value) in assignments {
        record.set(&field, value)?;
    }
    record.save().context("Failed to update record")?;

    output.print_saved("Updated", &record);
    Ok(())
}
