//! Header-mapped CSV rows.

use crate::{Error, Result};
use std::io::{Read, Write};
use std::sync::Arc;

/// One data row: ordered `header → value` pairs.
///
/// Rows read from the same file share their header list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    headers: Arc<[String]>,
    values: Vec<String>,
}

impl CsvRow {
    /// Creates a row from shared headers and its values.
    ///
    /// Missing trailing values read as empty; extra values are kept but have
    /// no header.
    #[must_use]
    pub const fn new(headers: Arc<[String]>, values: Vec<String>) -> Self {
        Self { headers, values }
    }

    /// Creates a standalone row from `(header, value)` pairs.
    #[must_use]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let (headers, values): (Vec<String>, Vec<String>) = pairs
            .into_iter()
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .unzip();
        Self::new(headers.into(), values)
    }

    /// Returns the header list.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Returns the values in column order.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Returns the first field, if any.
    #[must_use]
    pub fn first_field(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    /// Returns the value under `header`.
    ///
    /// A header present in the file but missing from a short row reads as
    /// the empty string.
    #[must_use]
    pub fn get(&self, header: &str) -> Option<&str> {
        let index = self.headers.iter().position(|h| h == header)?;
        Some(self.values.get(index).map_or("", String::as_str))
    }

    /// Returns the value under `header` or an error naming the column.
    ///
    /// # Errors
    ///
    /// Returns an error if the header does not exist.
    pub fn require(&self, header: &str) -> Result<&str> {
        self.get(header)
            .ok_or_else(|| Error::InvalidInput(format!("missing column '{header}'")))
    }

    /// Iterates `(header, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .zip(self.values.iter())
            .map(|(h, v)| (h.as_str(), v.as_str()))
    }

    /// Returns true if every value is empty or whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|v| v.trim().is_empty())
    }

    /// Returns a copy of this row's values with `value` appended.
    #[must_use]
    pub fn values_with(&self, value: impl Into<String>) -> Vec<String> {
        let mut values = Vec::with_capacity(self.headers.len() + 1);
        values.extend(self.values.iter().cloned());
        values.resize(self.headers.len().max(values.len()), String::new());
        values.push(value.into());
        values
    }
}

/// Reads all data rows from CSV input.
///
/// The first record is the header row. Blank rows are skipped; comment rows
/// (`#...`) are kept.
///
/// # Errors
///
/// Returns an error if the input is not valid CSV or has no header row.
pub fn read_rows<R: Read>(reader: R) -> Result<(Arc<[String]>, Vec<CsvRow>)> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // Allow varying number of fields
        .from_reader(reader);

    let headers: Arc<[String]> = csv_reader
        .headers()
        .map_err(|e| Error::OperationFailed {
            operation: "read_csv_headers".to_string(),
            cause: e.to_string(),
        })?
        .iter()
        .map(String::from)
        .collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(Error::InvalidInput("CSV input has no header row".to_string()));
    }

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(|e| Error::OperationFailed {
            operation: "read_csv".to_string(),
            cause: e.to_string(),
        })?;
        let row = CsvRow::new(Arc::clone(&headers), record.iter().map(String::from).collect());
        if !row.is_blank() {
            rows.push(row);
        }
    }

    Ok((headers, rows))
}

/// Writes a header row followed by `rows`.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_rows<W: Write, I, R, S>(writer: W, headers: &[String], rows: I) -> Result<()>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut csv_writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(writer);

    csv_writer
        .write_record(headers)
        .map_err(|e| Error::OperationFailed {
            operation: "write_csv_headers".to_string(),
            cause: e.to_string(),
        })?;
    for row in rows {
        csv_writer
            .write_record(row)
            .map_err(|e| Error::OperationFailed {
                operation: "write_csv".to_string(),
                cause: e.to_string(),
            })?;
    }

    csv_writer.flush().map_err(|e| Error::OperationFailed {
        operation: "flush_csv".to_string(),
        cause: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_rows_keeps_comments_and_skips_blanks() {
        let input = "name,organization\nweb01,Library\n\n#web02,Library\n,\nweb03,Default\n";
        let (headers, rows) = read_rows(Cursor::new(input)).unwrap();

        assert_eq!(&*headers, &["name".to_string(), "organization".to_string()]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("organization"), Some("Library"));
        assert_eq!(rows[1].first_field(), Some("#web02"));
        assert_eq!(rows[2].get("name"), Some("web03"));
    }

    #[test]
    fn test_short_row_reads_empty() {
        let (_, rows) = read_rows(Cursor::new("a,b,c\n1,2\n")).unwrap();
        assert_eq!(rows[0].get("c"), Some(""));
        assert_eq!(rows[0].get("d"), None);
        assert!(rows[0].require("d").is_err());
    }

    #[test]
    fn test_read_rows_empty_input() {
        assert!(read_rows(Cursor::new("")).is_err());
    }

    #[test]
    fn test_values_with_pads_short_rows() {
        let (_, rows) = read_rows(Cursor::new("a,b,c\n1,2\n")).unwrap();
        assert_eq!(rows[0].values_with("x"), vec!["1", "2", "", "x"]);
    }

    #[test]
    fn test_write_rows() {
        let headers = vec!["name".to_string(), "organization_id".to_string()];
        let mut output = Vec::new();
        write_rows(
            &mut output,
            &headers,
            vec![vec!["web01", "7"], vec!["web, two", "8"]],
        )
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_eq!(output, "name,organization_id\nweb01,7\n\"web, two\",8\n");
    }

    #[test]
    fn test_from_pairs() {
        let row = CsvRow::from_pairs([("name", "Library"), ("id", "7")]);
        assert_eq!(row.first_field(), Some("Library"));
        assert_eq!(row.iter().count(), 2);
    }
}
