//! CLI command for listing entity kinds.

use crate::models::EntityKind;
use std::io::{self, Write};

/// Writes the supported kinds as a table.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_kinds<W: Write>(writer: &mut W) -> io::Result<()> {
    writeln!(writer, "{:<18}{:<18}NOTES", "KIND", "COLLECTION")?;
    for kind in EntityKind::all() {
        let notes = match (kind.is_composite(), kind.is_optional()) {
            (true, _) => "names are BASE[ MAJOR[.MINOR]]",
            (_, true) => "may be left blank",
            _ => "",
        };
        writeln!(
            writer,
            "{:<18}{:<18}{}",
            kind.as_str(),
            kind.collection(),
            notes
        )?;
    }
    Ok(())
}

/// Executes the kinds command.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn cmd_kinds() -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_kinds(&mut handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_kinds_lists_every_kind() {
        let mut out = Vec::new();
        write_kinds(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("KIND"));
        assert_eq!(text.lines().count(), EntityKind::all().len() + 1);
        assert!(text.contains("operatingsystems"));
        assert!(text.contains("may be left blank"));
    }
}
