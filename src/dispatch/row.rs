//! Row types the dispatcher can fan out.

use crate::io::CsvRow;

/// A row the dispatcher can classify and describe.
///
/// The dispatcher never looks inside a row beyond its first field.
pub trait DispatchRow: Sync {
    /// Returns the first field, if any.
    fn first_field(&self) -> Option<&str>;

    /// Renders the row for failure reports.
    fn describe(&self) -> String;

    /// Returns true if the row is commented out with a leading `#`.
    fn is_comment(&self) -> bool {
        self.first_field().is_some_and(|f| f.starts_with('#'))
    }
}

impl DispatchRow for CsvRow {
    fn first_field(&self) -> Option<&str> {
        Self::first_field(self)
    }

    fn describe(&self) -> String {
        self.values().join(",")
    }
}

impl DispatchRow for csv::StringRecord {
    fn first_field(&self) -> Option<&str> {
        self.get(0)
    }

    fn describe(&self) -> String {
        self.iter().collect::<Vec<_>>().join(",")
    }
}

impl DispatchRow for Vec<String> {
    fn first_field(&self) -> Option<&str> {
        self.first().map(String::as_str)
    }

    fn describe(&self) -> String {
        self.join(",")
    }
}
