//! Stable transformations over vectors of records.

pub mod clamp;
pub mod count;
pub mod sum;

pub use clamp::make_clamp;
pub use count::make_count;
pub use sum::make_bounded_sum;

use dpg_core::{Domain, DpgError, Fallible, MetricSpace};

/// The element domain and optional length of a vector input space.
pub(crate) fn vector_parts<'a>(
    constructor: &str,
    input_space: &'a MetricSpace,
) -> Fallible<(&'a Domain, Option<usize>)> {
    match input_space.domain() {
        Domain::Vector { element, size } => Ok((element, *size)),
        other => Err(DpgError::InvalidArgument(format!(
            "{constructor} expects a vector domain, found {other}"
        ))),
    }
}
