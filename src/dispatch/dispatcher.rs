//! Chunked parallel row dispatch.

use super::chunk::chunk_bounds;
use super::row::DispatchRow;
use crate::{Error, Result};
use std::any::Any;
use std::fmt;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tracing::instrument;

/// What a worker does with the rest of its chunk after a row fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop this worker; other workers carry on.
    #[default]
    AbortChunk,
    /// Record the failure and keep going.
    ContinueChunk,
}

/// Lifecycle of a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// No run has started.
    NotStarted,
    /// Workers are processing rows.
    Running,
    /// Every worker of the last run has finished.
    Joined,
}

/// Shared flag that stops workers between rows.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a lowered flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once the flag has been raised.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One row that failed, with enough context to find it in the input.
#[derive(Debug)]
pub struct RowFailure {
    /// Zero-based index into the dispatched rows.
    pub index: usize,
    /// The row as text.
    pub row: String,
    /// Why it failed.
    pub error: Error,
}

impl fmt::Display for RowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {} ({}): {} [{}]",
            self.index,
            self.error.kind(),
            self.error,
            self.row
        )
    }
}

/// Counters and failures from one run.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Rows handed to the dispatcher.
    pub total: usize,
    /// Rows whose callback succeeded.
    pub processed: usize,
    /// Comment rows skipped.
    pub skipped_comments: usize,
    /// Rows left untouched because their worker aborted.
    pub aborted: usize,
    /// Rows left untouched because of cancellation.
    pub cancelled: usize,
    /// Failed rows, ordered by index.
    pub failures: Vec<RowFailure>,
}

impl DispatchReport {
    /// Returns true if every row was either processed or a comment.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.cancelled == 0
    }

    /// Turns failures into an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RowsFailed`] if any row failed, or
    /// [`Error::OperationFailed`] if the run was cancelled.
    pub fn into_result(self) -> Result<Self> {
        if !self.failures.is_empty() {
            return Err(Error::RowsFailed(self.failures));
        }
        if self.cancelled > 0 {
            return Err(Error::OperationFailed {
                operation: "dispatch".to_string(),
                cause: format!("cancelled with {} row(s) unprocessed", self.cancelled),
            });
        }
        Ok(self)
    }

    fn absorb(&mut self, chunk: ChunkOutcome) {
        self.processed += chunk.processed;
        self.skipped_comments += chunk.skipped_comments;
        self.aborted += chunk.aborted;
        self.cancelled += chunk.cancelled;
        self.failures.extend(chunk.failures);
    }
}

#[derive(Debug, Default)]
struct ChunkOutcome {
    processed: usize,
    skipped_comments: usize,
    aborted: usize,
    cancelled: usize,
    failures: Vec<RowFailure>,
}

/// Applies a callback to rows across a fixed pool of worker threads.
///
/// Rows are split into `thread_count` contiguous chunks (see
/// [`super::chunk_bounds`]) and each chunk gets its own scoped thread, which
/// walks it in order. Rows whose first field starts with `#` never reach the
/// callback. The run returns only after every worker has finished.
///
/// # Example
///
/// ```rust
/// use csvbridge::RowDispatcher;
///
/// let rows: Vec<Vec<String>> = vec![
///     vec!["web01".into()],
///     vec!["#web02".into()],
///     vec!["web03".into()],
/// ];
/// let report = RowDispatcher::new(2).unwrap().run(&rows, |_row| Ok(())).unwrap();
/// assert_eq!(report.processed, 2);
/// assert_eq!(report.skipped_comments, 1);
/// ```
#[derive(Debug)]
pub struct RowDispatcher {
    thread_count: usize,
    policy: FailurePolicy,
    cancel: Option<CancelFlag>,
    state: Mutex<DispatchState>,
}

impl RowDispatcher {
    /// Creates a dispatcher with `thread_count` workers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DispatcherConfig`] if `thread_count` is zero.
    pub fn new(thread_count: usize) -> Result<Self> {
        if thread_count == 0 {
            return Err(Error::DispatcherConfig(
                "thread_count must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            thread_count,
            policy: FailurePolicy::default(),
            cancel: None,
            state: Mutex::new(DispatchState::NotStarted),
        })
    }

    /// Sets the failure policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Checks `flag` between rows.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Returns the worker count.
    #[must_use]
    pub const fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DispatchState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `per_row` over every non-comment row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RowsFailed`] after all workers join if any row failed,
    /// or the errors of [`Self::dispatch`].
    pub fn run<R, F>(&self, rows: &[R], per_row: F) -> Result<DispatchReport>
    where
        R: DispatchRow,
        F: Fn(&R) -> Result<()> + Sync,
    {
        self.dispatch(rows, |_, row| per_row(row))?.into_result()
    }

    /// Like [`Self::run`], passing each row's index to the callback.
    ///
    /// # Errors
    ///
    /// Same as [`Self::run`].
    pub fn run_indexed<R, F>(&self, rows: &[R], per_row: F) -> Result<DispatchReport>
    where
        R: DispatchRow,
        F: Fn(usize, &R) -> Result<()> + Sync,
    {
        self.dispatch(rows, per_row)?.into_result()
    }

    /// Runs the workers and returns the full report, failures included.
    ///
    /// A callback that panics is recorded as a failure of its row. A worker
    /// thread that cannot be spawned is recorded as one failure at the start
    /// of its chunk, with the chunk's rows counted as aborted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DispatcherConfig`] if a run is already in progress on
    /// this dispatcher.
    #[instrument(skip_all, fields(rows = rows.len(), threads = self.thread_count))]
    pub fn dispatch<R, F>(&self, rows: &[R], per_row: F) -> Result<DispatchReport>
    where
        R: DispatchRow,
        F: Fn(usize, &R) -> Result<()> + Sync,
    {
        let bounds = chunk_bounds(rows.len(), self.thread_count)?;
        self.enter_running()?;

        let per_row = &per_row;
        let outcomes: Vec<ChunkOutcome> = thread::scope(|s| {
            let handles: Vec<_> = bounds
                .iter()
                .enumerate()
                .map(|(worker, range)| {
                    let range = range.clone();
                    thread::Builder::new()
                        .name(format!("dispatch-{worker}"))
                        .spawn_scoped(s, move || self.run_chunk(worker, range, rows, per_row))
                })
                .collect();

            handles
                .into_iter()
                .zip(&bounds)
                .map(|(handle, range)| match handle {
                    Ok(handle) => handle
                        .join()
                        .unwrap_or_else(|payload| lost_chunk(range, &*payload)),
                    Err(e) => unspawned_chunk(range, &e),
                })
                .collect()
        });

        self.set_state(DispatchState::Joined);

        let mut report = DispatchReport {
            total: rows.len(),
            ..DispatchReport::default()
        };
        for outcome in outcomes {
            report.absorb(outcome);
        }
        report.failures.sort_by_key(|f| f.index);

        record_metrics(&report);
        tracing::info!(
            processed = report.processed,
            skipped_comments = report.skipped_comments,
            failed = report.failures.len(),
            aborted = report.aborted,
            cancelled = report.cancelled,
            "Dispatch finished"
        );
        Ok(report)
    }

    fn run_chunk<R, F>(
        &self,
        worker: usize,
        range: Range<usize>,
        rows: &[R],
        per_row: &F,
    ) -> ChunkOutcome
    where
        R: DispatchRow,
        F: Fn(usize, &R) -> Result<()> + Sync,
    {
        tracing::debug!(worker, start = range.start, end = range.end, "Worker started");
        let mut outcome = ChunkOutcome::default();
        let end = range.end;
        let chunk = &rows[range.clone()];

        for (index, row) in range.zip(chunk) {
            if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
                outcome.cancelled += end - index;
                break;
            }
            if row.is_comment() {
                outcome.skipped_comments += 1;
                continue;
            }

            let result = panic::catch_unwind(AssertUnwindSafe(|| per_row(index, row)))
                .unwrap_or_else(|payload| {
                    Err(Error::OperationFailed {
                        operation: "process_row".to_string(),
                        cause: format!("panicked: {}", panic_message(&*payload)),
                    })
                });

            match result {
                Ok(()) => outcome.processed += 1,
                Err(error) => {
                    tracing::warn!(
                        worker,
                        row = index,
                        error_kind = error.kind(),
                        error = %error,
                        "Row failed"
                    );
                    outcome.failures.push(RowFailure {
                        index,
                        row: row.describe(),
                        error,
                    });
                    if self.policy == FailurePolicy::AbortChunk {
                        outcome.aborted += end - index - 1;
                        break;
                    }
                },
            }
        }

        tracing::debug!(worker, processed = outcome.processed, "Worker finished");
        outcome
    }

    fn enter_running(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == DispatchState::Running {
            return Err(Error::DispatcherConfig(
                "dispatcher is already running".to_string(),
            ));
        }
        *state = DispatchState::Running;
        drop(state);
        tracing::debug!("Dispatcher running");
        Ok(())
    }

    fn set_state(&self, next: DispatchState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
        tracing::debug!(state = ?next, "Dispatcher state changed");
    }
}

/// Outcome for a chunk whose worker died outside the per-row guard.
fn lost_chunk(range: &Range<usize>, payload: &(dyn Any + Send)) -> ChunkOutcome {
    ChunkOutcome {
        failures: vec![RowFailure {
            index: range.start,
            row: format!("rows {}..{}", range.start, range.end),
            error: Error::OperationFailed {
                operation: "join_worker".to_string(),
                cause: panic_message(payload),
            },
        }],
        ..ChunkOutcome::default()
    }
}

/// Outcome for a chunk whose worker thread never started.
fn unspawned_chunk(range: &Range<usize>, error: &std::io::Error) -> ChunkOutcome {
    tracing::error!(
        start = range.start,
        end = range.end,
        error = %error,
        "Failed to spawn dispatch worker"
    );
    ChunkOutcome {
        aborted: range.len(),
        failures: vec![RowFailure {
            index: range.start,
            row: format!("rows {}..{}", range.start, range.end),
            error: Error::OperationFailed {
                operation: "spawn_worker".to_string(),
                cause: error.to_string(),
            },
        }],
        ..ChunkOutcome::default()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn record_metrics(report: &DispatchReport) {
    for (outcome, count) in [
        ("processed", report.processed),
        ("failed", report.failures.len()),
        ("skipped", report.skipped_comments),
        ("aborted", report.aborted),
        ("cancelled", report.cancelled),
    ] {
        metrics::counter!("dispatcher_rows_total", "outcome" => outcome)
            .increment(count as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn rows(values: &[&str]) -> Vec<Vec<String>> {
        values.iter().map(|v| vec![(*v).to_string()]).collect()
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(matches!(
            RowDispatcher::new(0),
            Err(Error::DispatcherConfig(_))
        ));
    }

    #[test]
    fn test_state_transitions() {
        let dispatcher = RowDispatcher::new(2).unwrap();
        assert_eq!(dispatcher.state(), DispatchState::NotStarted);

        dispatcher
            .run(&rows(&["a"]), |_| Ok(()))
            .unwrap();
        assert_eq!(dispatcher.state(), DispatchState::Joined);
    }

    #[test]
    fn test_state_is_running_inside_callback() {
        let dispatcher = RowDispatcher::new(1).unwrap();
        let dispatcher_ref = &dispatcher;
        dispatcher
            .run(&rows(&["a"]), |_| {
                assert_eq!(dispatcher_ref.state(), DispatchState::Running);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_comments_never_reach_callback() {
        let seen = Mutex::new(Vec::new());
        let report = RowDispatcher::new(3)
            .unwrap()
            .run(&rows(&["a", "#disabled", "b", "#", "c"]), |row| {
                seen.lock().unwrap().push(row[0].clone());
                Ok(())
            })
            .unwrap();

        let mut seen = seen.into_inner().unwrap();
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(report.processed, 3);
        assert_eq!(report.skipped_comments, 2);
        assert!(report.is_success());
    }

    #[test]
    fn test_intra_chunk_order_preserved() {
        let seen = Mutex::new(Vec::new());
        let input: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = input.iter().map(String::as_str).collect();

        RowDispatcher::new(3)
            .unwrap()
            .run_indexed(&rows(&refs), |index, _| {
                seen.lock()
                    .unwrap()
                    .push((thread::current().name().map(String::from), index));
                Ok(())
            })
            .unwrap();

        let seen = seen.into_inner().unwrap();
        for worker in 0..3 {
            let name = Some(format!("dispatch-{worker}"));
            let indices: Vec<usize> = seen
                .iter()
                .filter(|(n, _)| *n == name)
                .map(|(_, i)| *i)
                .collect();
            let expected: Vec<usize> = chunk_bounds(10, 3).unwrap()[worker].clone().collect();
            assert_eq!(indices, expected);
        }
    }

    #[test]
    fn test_failure_isolation_abort_chunk() {
        // chunks: [0,4) [4,8) [8,10)
        let input: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = input.iter().map(String::as_str).collect();
        let calls = AtomicUsize::new(0);

        let report = RowDispatcher::new(3)
            .unwrap()
            .dispatch(&rows(&refs), |index, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                if index == 1 {
                    return Err(Error::NotFound {
                        kind: crate::EntityKind::Organization,
                        key: "Missing".to_string(),
                    });
                }
                Ok(())
            })
            .unwrap();

        // rows 0 and 1 of chunk 0 ran; 2 and 3 were aborted; other chunks ran fully
        assert_eq!(calls.load(Ordering::SeqCst), 2 + 4 + 2);
        assert_eq!(report.processed, 7);
        assert_eq!(report.aborted, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[0].row, "1");

        let err = report.into_result().unwrap_err();
        assert!(matches!(err, Error::RowsFailed(ref f) if f.len() == 1));
    }

    #[test]
    fn test_continue_chunk_policy() {
        let report = RowDispatcher::new(1)
            .unwrap()
            .with_policy(FailurePolicy::ContinueChunk)
            .dispatch(&rows(&["ok", "bad", "ok", "bad"]), |_, row| {
                if row[0] == "bad" {
                    Err(Error::InvalidInput("bad row".to_string()))
                } else {
                    Ok(())
                }
            })
            .unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.aborted, 0);
        let indices: Vec<usize> = report.failures.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![1, 3]);
    }

    #[test]
    fn test_panicking_row_is_reported() {
        let report = RowDispatcher::new(2)
            .unwrap()
            .dispatch(&rows(&["a", "boom", "c", "d"]), |_, row| {
                assert!(row[0] != "boom", "row exploded");
                Ok(())
            })
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert!(report.failures[0].error.to_string().contains("row exploded"));
        assert_eq!(report.processed, 3);
    }

    #[test]
    fn test_unspawned_chunk_keeps_other_outcomes() {
        let mut report = DispatchReport {
            total: 8,
            ..DispatchReport::default()
        };
        report.absorb(ChunkOutcome {
            processed: 3,
            failures: vec![RowFailure {
                index: 2,
                row: "c".to_string(),
                error: Error::InvalidInput("bad".to_string()),
            }],
            ..ChunkOutcome::default()
        });
        let error = std::io::Error::other("no threads left");
        report.absorb(unspawned_chunk(&(4..8), &error));

        assert_eq!(report.processed, 3);
        assert_eq!(report.aborted, 4);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].index, 2);
        assert_eq!(report.failures[1].index, 4);
        assert_eq!(report.failures[1].row, "rows 4..8");
        assert!(matches!(
            &report.failures[1].error,
            Error::OperationFailed { operation, cause }
                if operation == "spawn_worker" && cause.contains("no threads left")
        ));
        assert!(matches!(report.into_result(), Err(Error::RowsFailed(f)) if f.len() == 2));
    }

    #[test]
    fn test_cancellation_between_rows() {
        let flag = CancelFlag::new();
        let dispatcher = RowDispatcher::new(1)
            .unwrap()
            .with_cancel_flag(flag.clone());

        let report = dispatcher
            .dispatch(&rows(&["a", "b", "c"]), |index, _| {
                if index == 0 {
                    flag.cancel();
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.cancelled, 2);
        assert!(!report.is_success());
        assert!(matches!(
            report.into_result(),
            Err(Error::OperationFailed { .. })
        ));
    }

    #[test]
    fn test_more_threads_than_rows() {
        let report = RowDispatcher::new(8)
            .unwrap()
            .run(&rows(&["a", "b"]), |_| Ok(()))
            .unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.total, 2);
    }

    #[test]
    fn test_empty_input() {
        let empty: Vec<Vec<String>> = Vec::new();
        let report = RowDispatcher::new(4).unwrap().run(&empty, |_| Ok(())).unwrap();
        assert_eq!(report.processed, 0);
        assert!(report.is_success());
    }
}
