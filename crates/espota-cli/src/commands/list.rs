//! List command - locate firmware images on disk

use std::path::PathBuf;

use espota_client::find_firmware_files;

use super::EXIT_OK;
use crate::output::{firmware_line, FirmwareRow, OutputContext, OutputFormat};

/// Print which of the configured firmware paths exist
pub fn list(search_paths: &[PathBuf], ctx: &OutputContext) -> u8 {
    let found = find_firmware_files(search_paths);

    if ctx.format == OutputFormat::Text {
        println!("Available firmware files:");
        if found.is_empty() {
            println!("  No firmware files found");
        }
        for candidate in &found {
            println!(
                "{}",
                firmware_line(&candidate.path.display().to_string(), candidate.size)
            );
        }
        return EXIT_OK;
    }

    let rows: Vec<FirmwareRow> = found
        .iter()
        .map(|candidate| FirmwareRow {
            path: candidate.path.display().to_string(),
            size: candidate.size,
        })
        .collect();
    ctx.print(&rows);

    EXIT_OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_always_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("app.bin");
        std::fs::write(&present, [0u8; 16]).unwrap();
        let paths = vec![present, dir.path().join("missing.bin")];

        for format in [OutputFormat::Text, OutputFormat::Table, OutputFormat::Json] {
            let ctx = OutputContext::new(format, true, true);
            assert_eq!(list(&paths, &ctx), EXIT_OK);
        }
    }

    #[test]
    fn test_list_nothing_found() {
        let ctx = OutputContext::new(OutputFormat::Text, true, true);
        assert_eq!(list(&[PathBuf::from("/nonexistent/fw.bin")], &ctx), EXIT_OK);
    }
}
