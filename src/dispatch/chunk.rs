//! Contiguous chunk assignment.

use crate::{Error, Result};
use std::ops::Range;

/// Splits `len` rows into exactly `thread_count` contiguous windows.
///
/// Every window but the trailing ones holds `ceil(len / thread_count)` rows;
/// trailing windows may be shorter or empty.
///
/// # Errors
///
/// Returns [`Error::DispatcherConfig`] if `thread_count` is zero.
///
/// # Examples
///
/// ```rust
/// use csvbridge::chunk_bounds;
///
/// assert_eq!(chunk_bounds(10, 3).unwrap(), vec![0..4, 4..8, 8..10]);
/// ```
pub fn chunk_bounds(len: usize, thread_count: usize) -> Result<Vec<Range<usize>>> {
    if thread_count == 0 {
        return Err(Error::DispatcherConfig(
            "thread_count must be at least 1".to_string(),
        ));
    }

    let size = len.div_ceil(thread_count);
    Ok((0..thread_count)
        .map(|i| {
            let start = (i * size).min(len);
            let end = ((i + 1) * size).min(len);
            start..end
        })
        .collect())
}
