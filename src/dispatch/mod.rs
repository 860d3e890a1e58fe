//! Parallel row dispatch.
//!
//! A [`RowDispatcher`] splits a row sequence into one contiguous chunk per
//! worker, runs a caller-supplied callback on every non-comment row and
//! reports all failures together once every worker has joined.

mod chunk;
mod dispatcher;
mod row;

pub use chunk::chunk_bounds;
pub use dispatcher::{
    CancelFlag, DispatchReport, DispatchState, FailurePolicy, RowDispatcher, RowFailure,
};
pub use row::DispatchRow;
