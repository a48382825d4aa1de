//! Sync command handler

use std::path::Path;

use anyhow::Result;

use rowmap_core::Config;

use super::open_store;
use crate::output::Output;

/// Reconcile the table described by a schema file
pub fn sync(config: &Config, schema_path: &Path, output: &Output) -> Result<()> {
    let store = open_store(config, schema_path)?;
    output.print_report(store.reconcile_report());
    Ok(())
}
