//! CSV row I/O.
//!
//! Rows are read whole into memory so the dispatcher can split them into
//! contiguous chunks. Blank rows are dropped here; comment rows are not,
//! the dispatcher skips those itself.

mod rows;

pub use rows::{CsvRow, read_rows, write_rows};
