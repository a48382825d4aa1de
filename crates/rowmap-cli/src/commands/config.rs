//! Config command handlers

use anyhow::Result;

use rowmap_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config: &Config, output: &Output) -> Result<()> {
    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "database_path": config.database_path,
                    "log_level": config.log_level,
                    "log_file": config.log_file,
                    "config_file": Config::config_file_path(),
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.database_path.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  database_path: {}", config.database_path.display());
            println!("  log_level:     {}", config.log_level);
            println!(
                "  log_file:      {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Print the config file path
pub fn path(output: &Output) -> Result<()> {
    let path = Config::config_file_path();
    match output.format {
        OutputFormat::Quiet => println!("{}", path.display()),
        _ => output.message(&path.display().to_string()),
    }
    Ok(())
}
