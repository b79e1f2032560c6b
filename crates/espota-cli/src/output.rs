//! Output formatting for espota (text, table, json)

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain status lines (default)
    #[default]
    Text,
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print rows as a table or JSON array
    ///
    /// Text rendering is command specific and handled by the caller.
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Json => println!("{}", render_json(&data)),
            OutputFormat::Table | OutputFormat::Text => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    println!("{}", Table::new(data));
                }
            }
        }
    }

    /// Print key-value pairs (for info command)
    ///
    /// JSON output serializes `document` itself so values keep their types.
    pub fn print_kv<T: Serialize>(&self, pairs: &[(String, String)], document: &T) {
        match self.format {
            OutputFormat::Text => {
                for (key, value) in pairs {
                    println!("  {}: {}", key.bold(), value);
                }
            }
            OutputFormat::Table => {
                let rows: Vec<InfoRow> = pairs
                    .iter()
                    .map(|(key, value)| InfoRow {
                        key: key.clone(),
                        value: value.clone(),
                    })
                    .collect();
                self.print(&rows);
            }
            OutputFormat::Json => println!("{}", render_json(document)),
        }
    }
}

/// Pretty JSON, or `null` if the value cannot be serialized
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Firmware display for list command
#[derive(Debug, Tabled, Serialize)]
pub struct FirmwareRow {
    #[tabled(rename = "Path")]
    pub path: String,
    #[tabled(rename = "Size (bytes)")]
    pub size: u64,
}

/// Key/value display for info command
#[derive(Debug, Tabled, Serialize)]
pub struct InfoRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// Format a firmware entry the way `list` prints it in text mode
pub fn firmware_line(path: &str, size: u64) -> String {
    format!("  {} ({} bytes)", path, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firmware_line() {
        assert_eq!(
            firmware_line("./build/ESP32S3Cam.bin", 1048576),
            "  ./build/ESP32S3Cam.bin (1048576 bytes)"
        );
    }

    #[test]
    fn test_firmware_row_table() {
        let rows = vec![FirmwareRow {
            path: "fw.bin".into(),
            size: 42,
        }];
        let table = Table::new(&rows).to_string();
        assert!(table.contains("Size (bytes)"));
        assert!(table.contains("fw.bin"));
    }

    #[test]
    fn test_render_json_keeps_value_types() {
        let info = espota_client::DeviceInfo::from_json(
            r#"{"version": "1.0.3", "free_heap": 81234, "ota": true}"#,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&render_json(&info)).unwrap();

        assert_eq!(value["version"], serde_json::json!("1.0.3"));
        assert_eq!(value["free_heap"], serde_json::json!(81234));
        assert_eq!(value["ota"], serde_json::json!(true));
    }

    #[test]
    fn test_default_format_is_text() {
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }
}
