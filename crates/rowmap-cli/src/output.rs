//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use rowmap_core::{Record, ReconcileReport};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the outcome of reconciling a table
    pub fn print_report(&self, report: &ReconcileReport) {
        match self.format {
            OutputFormat::Human => {
                if report.created {
                    println!("Created table {}", report.table);
                } else if report.added_columns.is_empty() {
                    println!("Table {} is up to date", report.table);
                } else {
                    println!(
                        "Added to {}: {}",
                        report.table,
                        report.added_columns.join(", ")
                    );
                }
                for warning in &report.warnings {
                    println!("warning: {}", warning);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(report).unwrap_or_default()
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a list of records
    pub fn print_records(&self, records: &[Record]) {
        match self.format {
            OutputFormat::Human => {
                if records.is_empty() {
                    println!("No records found.");
                    return;
                }
                for record in records {
                    println!("{}", format_record(record));
                }
                println!("\n{} record(s)", records.len());
            }
            OutputFormat::Json => {
                let json: Vec<_> = records.iter().map(Record::to_json).collect();
                println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
            }
            OutputFormat::Quiet => {
                for record in records {
                    if let Some(id) = record.id() {
                        println!("{}", id);
                    }
                }
            }
        }
    }

    /// Print a single record after a write
    pub fn print_saved(&self, action: &str, record: &Record) {
        match self.format {
            OutputFormat::Human => {
                println!("✓ {} {}", action, format_record(record));
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "action": action, "record": record.to_json()})
                );
            }
            OutputFormat::Quiet => {
                if let Some(id) = record.id() {
                    println!("{}", id);
                }
            }
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// One line: `#id field=value ...`
fn format_record(record: &Record) -> String {
    let id = record
        .id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    let fields: Vec<String> = record
        .present_fields()
        .map(|(name, value)| format!("{}={}", name, truncate(&value.to_string(), 40)))
        .collect();

    if fields.is_empty() {
        format!("#{}", id)
    } else {
        format!("#{} {}", id, fields.join(" "))
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmap_core::{Database, RecordStore, ScalarType, TableSchema, Value};

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
    }

    #[test]
    fn test_format_record() {
        let db = Database::open_in_memory().unwrap();
        let store = RecordStore::open(
            &db,
            TableSchema::new("people")
                .column("name", ScalarType::Text)
                .column("age", ScalarType::Integer),
        )
        .unwrap();

        let mut record = store
            .create([("name", Value::from("bob")), ("age", Value::from(30))])
            .unwrap();
        assert_eq!(format_record(&record), "#- name=bob age=30");

        record.save().unwrap();
        assert_eq!(format_record(&record), "#1 name=bob age=30");
    }
}
