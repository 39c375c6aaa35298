//! # Calibration
//!
//! Find the parameter (typically a noise scale) at which a monotone
//! predicate flips, by bracketing and bisection. The usual predicate is
//! `make(param).check(d_in, d_out)`: the smallest scale whose measurement
//! satisfies a privacy budget.
//!
//! The search treats `check` as a black box, so it is only as tight as the
//! relations it calls.

use dpg_core::{DpgError, Fallible, Value};

use crate::measurement::Measurement;

/// Bounds and limits for [`binary_search`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    /// Initial lower end of the bracket.
    pub lower: f64,
    /// Initial upper end of the bracket. Doubled until the predicate differs
    /// at the two ends.
    pub upper: f64,
    /// How many times the upper end may be doubled.
    pub max_expansions: u32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: 1.0,
            max_expansions: 1024,
        }
    }
}

/// Find the boundary of a monotone predicate.
///
/// The predicate may be increasing (`false ... true`) or decreasing
/// (`true ... false`) in its argument. Returns the argument closest to the
/// flip at which the predicate is `true`, to the precision of `f64`.
///
/// # Errors
///
/// `InvalidArgument` if the bracket is malformed or the predicate never
/// changes within the allowed expansions. Errors from the predicate
/// propagate.
pub fn binary_search(
    predicate: impl Fn(f64) -> Fallible<bool>,
    options: SearchOptions,
) -> Fallible<f64> {
    let SearchOptions {
        mut lower,
        mut upper,
        max_expansions,
    } = options;
    if !(lower.is_finite() && upper.is_finite() && lower < upper) {
        return Err(DpgError::InvalidArgument(format!(
            "search bracket [{lower}, {upper}] is malformed"
        )));
    }

    let at_lower = predicate(lower)?;
    let mut at_upper = predicate(upper)?;
    let mut expansions = 0;
    while at_lower == at_upper {
        if expansions == max_expansions || !upper.is_finite() {
            return Err(DpgError::InvalidArgument(format!(
                "predicate is {at_lower} everywhere in [{}, {upper}]",
                options.lower
            )));
        }
        lower = upper;
        upper = if upper > 0.0 { upper * 2.0 } else { 1.0 };
        at_upper = predicate(upper)?;
        expansions += 1;
    }
    let increasing = at_upper;

    loop {
        let mid = lower + (upper - lower) / 2.0;
        if mid <= lower || mid >= upper {
            break;
        }
        if predicate(mid)? == increasing {
            upper = mid;
        } else {
            lower = mid;
        }
    }
    Ok(if increasing { upper } else { lower })
}

/// The parameter at which `make(param)` first satisfies `check(d_in, d_out)`.
///
/// Parameters `make` rejects with `InvalidArgument` count as not
/// satisfying the budget.
pub fn binary_search_param(
    make: impl Fn(f64) -> Fallible<Measurement>,
    d_in: &Value,
    d_out: &Value,
    options: SearchOptions,
) -> Fallible<f64> {
    let param = binary_search(
        |p| match make(p) {
            Ok(m) => m.check(d_in, d_out),
            Err(DpgError::InvalidArgument(_)) => Ok(false),
            Err(e) => Err(e),
        },
        options,
    )?;
    tracing::debug!(param, d_in = %d_in, d_out = %d_out, "calibrated parameter");
    Ok(param)
}

/// [`binary_search_param`], returning the measurement built at the found
/// parameter.
pub fn binary_search_chain(
    make: impl Fn(f64) -> Fallible<Measurement>,
    d_in: &Value,
    d_out: &Value,
    options: SearchOptions,
) -> Fallible<Measurement> {
    let param = binary_search_param(&make, d_in, d_out, options)?;
    make(param)
}
