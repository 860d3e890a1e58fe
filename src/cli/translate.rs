//! CLI command for translating a CSV column between names and ids.

use crate::config::BridgeConfig;
use crate::dispatch::{CancelFlag, DispatchReport, FailurePolicy, RowDispatcher};
use crate::io::{CsvRow, read_rows, write_rows};
use crate::models::{EntityId, EntityKind};
use crate::remote::HttpDirectoryClient;
use crate::resolver::{Lookup, ResolverSet};
use crate::{Error, Result};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use std::sync::{Arc, OnceLock};

/// Which way a column is translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Names in, ids out (`<column>_id`).
    #[default]
    Import,
    /// Ids in, names out (`<column>_name`).
    Export,
}

impl Direction {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Import => "_id",
            Self::Export => "_name",
        }
    }
}

/// Options for one translate run.
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    /// Kind of entity the column refers to.
    pub kind: EntityKind,
    /// Header of the column to translate.
    pub column: String,
    /// Translation direction.
    pub direction: Direction,
    /// Write every row even if some fail.
    pub keep_going: bool,
}

impl TranslateOptions {
    /// Creates import options for `column`.
    #[must_use]
    pub fn new(kind: EntityKind, column: impl Into<String>) -> Self {
        Self {
            kind,
            column: column.into(),
            direction: Direction::Import,
            keep_going: false,
        }
    }

    /// Sets the direction.
    #[must_use]
    pub const fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Sets keep-going.
    #[must_use]
    pub const fn with_keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    /// Dispatcher policy matching keep-going.
    #[must_use]
    pub const fn failure_policy(&self) -> FailurePolicy {
        if self.keep_going {
            FailurePolicy::ContinueChunk
        } else {
            FailurePolicy::AbortChunk
        }
    }

    /// Header of the appended column.
    #[must_use]
    pub fn output_column(&self) -> String {
        format!("{}{}", self.column, self.direction.suffix())
    }
}

/// Resolves `options.column` for every row.
///
/// Returns one output cell per input row, in input order. Comment rows and
/// failed rows get an empty cell.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the column is not in `headers`, or the
/// dispatcher's error if the run could not start.
pub fn translate_rows(
    resolvers: &ResolverSet,
    dispatcher: &RowDispatcher,
    headers: &[String],
    rows: &[CsvRow],
    options: &TranslateOptions,
) -> Result<(Vec<String>, DispatchReport)> {
    if !headers.iter().any(|h| *h == options.column) {
        return Err(Error::InvalidInput(format!(
            "column '{}' not found in CSV headers",
            options.column
        )));
    }

    let cache = resolvers.get(options.kind);
    let cells: Vec<OnceLock<String>> = rows.iter().map(|_| OnceLock::new()).collect();

    let report = dispatcher.dispatch(rows, |index, row| {
        let value = row.require(&options.column)?;
        let resolution = match options.direction {
            Direction::Import => cache.resolve(Lookup::from_options(Some(value), None))?,
            Direction::Export if value.trim().is_empty() => {
                cache.resolve(Lookup::Nothing)?
            },
            Direction::Export => {
                let id = EntityId::parse(value)?;
                cache.resolve(Lookup::Id(&id))?
            },
        };
        cells[index]
            .set(resolution.to_string())
            .map_err(|_| Error::OperationFailed {
                operation: "store_cell".to_string(),
                cause: format!("row {index} resolved twice"),
            })
    })?;

    let cells = cells
        .into_iter()
        .map(|cell| cell.into_inner().unwrap_or_default())
        .collect();
    Ok((cells, report))
}

/// Reads CSV from `input`, translates one column and writes CSV to `output`.
///
/// Without keep-going nothing is written if any row fails. With keep-going
/// every row is written and the failures are still returned as an error.
///
/// # Errors
///
/// Returns [`Error::RowsFailed`] if any row failed, or I/O and parsing
/// errors.
pub fn translate<R: Read, W: Write>(
    resolvers: &ResolverSet,
    dispatcher: &RowDispatcher,
    options: &TranslateOptions,
    input: R,
    output: W,
) -> Result<DispatchReport> {
    let (headers, rows) = read_rows(input)?;
    let (cells, report) = translate_rows(resolvers, dispatcher, &headers, &rows, options)?;

    if !report.is_success() && !options.keep_going {
        return report.into_result();
    }

    let mut out_headers = headers.to_vec();
    out_headers.push(options.output_column());
    write_rows(
        output,
        &out_headers,
        rows.iter()
            .zip(cells)
            .map(|(row, cell)| row.values_with(cell)),
    )?;

    report.into_result()
}

/// Executes the translate command against the configured server.
///
/// Reads `csv_file`, or stdin when it is `None`, and writes to stdout.
///
/// # Errors
///
/// Returns an error if the server is not configured, the input cannot be
/// read, or any row fails.
pub fn cmd_translate(
    config: &BridgeConfig,
    options: &TranslateOptions,
    csv_file: Option<&Path>,
    cancel: CancelFlag,
) -> Result<()> {
    let client = HttpDirectoryClient::from_config(&config.server)?;
    let resolvers = ResolverSet::new(Arc::new(client));

    let dispatcher = RowDispatcher::new(config.threads)?
        .with_policy(options.failure_policy())
        .with_cancel_flag(cancel);

    let stdout = io::stdout();
    let result = match csv_file {
        Some(path) => {
            let file = File::open(path).map_err(|e| Error::OperationFailed {
                operation: "open_csv".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;
            translate(&resolvers, &dispatcher, options, BufReader::new(file), stdout.lock())
        },
        None => translate(&resolvers, &dispatcher, options, io::stdin().lock(), stdout.lock()),
    };

    for (kind, stats) in resolvers.stats() {
        tracing::info!(
            kind = %kind,
            entries = stats.entries,
            hits = stats.hits,
            misses = stats.misses,
            "Resolver cache"
        );
    }

    let report = result?;
    tracing::info!(
        total = report.total,
        processed = report.processed,
        skipped_comments = report.skipped_comments,
        "Translate finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityRecord;
    use crate::remote::{DirectoryClient, SearchPredicate};

    /// Organizations 1 = Library, 2 = Default.
    struct Orgs;

    impl Orgs {
        fn records() -> Vec<EntityRecord> {
            vec![EntityRecord::new(1u64, "Library"), EntityRecord::new(2u64, "Default")]
        }
    }

    impl DirectoryClient for Orgs {
        fn name(&self) -> &'static str {
            "orgs"
        }

        fn search(&self, _kind: EntityKind, predicate: &SearchPredicate) -> Result<Vec<EntityRecord>> {
            Ok(Self::records()
                .into_iter()
                .filter(|r| predicate.matches(r))
                .collect())
        }

        fn fetch_by_id(&self, kind: EntityKind, id: &EntityId) -> Result<EntityRecord> {
            Self::records()
                .into_iter()
                .find(|r| r.id == *id)
                .ok_or_else(|| Error::NotFound {
                    kind,
                    key: id.to_string(),
                })
        }
    }

    fn run(input: &str, options: &TranslateOptions) -> (Result<DispatchReport>, String) {
        let resolvers = ResolverSet::new(Arc::new(Orgs));
        let dispatcher = RowDispatcher::new(2).unwrap();
        let mut out = Vec::new();
        let result = translate(&resolvers, &dispatcher, options, input.as_bytes(), &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_import_appends_id_column() {
        let input = "name,organization\nweb01,Library\nweb02,Default\n#web03,Library\nweb04,Library\n";
        let options = TranslateOptions::new(EntityKind::Organization, "organization");

        let (result, out) = run(input, &options);
        let report = result.unwrap();

        assert_eq!(report.processed, 3);
        assert_eq!(report.skipped_comments, 1);
        assert_eq!(
            out,
            "name,organization,organization_id\n\
             web01,Library,1\n\
             web02,Default,2\n\
             #web03,Library,\n\
             web04,Library,1\n"
        );
    }

    #[test]
    fn test_export_appends_name_column() {
        let input = "name,organization_id\nweb01,2\nweb02,1\n";
        let options = TranslateOptions::new(EntityKind::Organization, "organization_id")
            .with_direction(Direction::Export);

        let (result, out) = run(input, &options);
        result.unwrap();
        assert_eq!(
            out,
            "name,organization_id,organization_id_name\nweb01,2,Default\nweb02,1,Library\n"
        );
    }

    #[test]
    fn test_failure_without_keep_going_writes_nothing() {
        let input = "name,organization\nweb01,Library\nweb02,Nope\n";
        let options = TranslateOptions::new(EntityKind::Organization, "organization");

        let (result, out) = run(input, &options);
        let Err(Error::RowsFailed(failures)) = result else {
            panic!("expected RowsFailed");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 1);
        assert!(out.is_empty());
    }

    #[test]
    fn test_keep_going_writes_every_row() {
        let input = "name,organization\nweb01,Nope\nweb02,Library\n";
        let options =
            TranslateOptions::new(EntityKind::Organization, "organization").with_keep_going(true);

        let (result, out) = run(input, &options);
        assert!(matches!(result, Err(Error::RowsFailed(_))));
        assert_eq!(
            out,
            "name,organization,organization_id\nweb01,Nope,\nweb02,Library,1\n"
        );
    }

    #[test]
    fn test_translate_rows_fills_one_cell_per_row() {
        let resolvers = ResolverSet::new(Arc::new(Orgs));
        let dispatcher = RowDispatcher::new(3).unwrap();
        let (headers, rows) =
            read_rows("organization\nLibrary\nDefault\n#skip\nDefault\nLibrary\n".as_bytes())
                .unwrap();
        let options = TranslateOptions::new(EntityKind::Organization, "organization");

        let (cells, report) =
            translate_rows(&resolvers, &dispatcher, &headers, &rows, &options).unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(report.processed, 4);
        assert_eq!(cells, ["1", "2", "", "2", "1"]);
    }

    #[test]
    fn test_missing_column() {
        let options = TranslateOptions::new(EntityKind::Organization, "org");
        let (result, out) = run("name\nweb01\n", &options);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_output_column_names() {
        let options = TranslateOptions::new(EntityKind::Domain, "domain");
        assert_eq!(options.output_column(), "domain_id");
        assert_eq!(
            options.with_direction(Direction::Export).output_column(),
            "domain_name"
        );
    }
}
