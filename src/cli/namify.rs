//! CLI command for generating names from a template.

use crate::{Error, Result};
use crate::naming::namify;
use std::io::{self, Write};

/// Writes `count` names for the numbers `start, start + 1, ...`.
///
/// The template is checked before anything is written.
///
/// # Errors
///
/// Returns an error if the template is invalid or writing fails.
pub fn write_names<W: Write>(writer: &mut W, template: &str, count: u64, start: u64) -> Result<()> {
    namify(template, start)?;

    for number in start..start.saturating_add(count) {
        let name = namify(template, number)?;
        writeln!(writer, "{name}").map_err(|e| Error::OperationFailed {
            operation: "write_names".to_string(),
            cause: e.to_string(),
        })?;
    }
    Ok(())
}

/// Executes the namify command.
///
/// # Errors
///
/// Returns an error if the template is invalid or stdout is closed.
pub fn cmd_namify(template: &str, count: u64, start: u64) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_names(&mut handle, template, count, start)
}
