//! Additive noise mechanisms.

pub mod gaussian;
pub mod laplace;

pub use gaussian::make_gaussian;
pub use laplace::make_laplace;

use dpg_core::arith::check_nonnegative;
use dpg_core::{Domain, DpgError, Fallible, Metric, MetricSpace, Primitive, ScalarKind};

/// Whether a mechanism releases one number or a vector of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    Scalar,
    Vector,
}

/// Classify `input_space` as a scalar under `AbsoluteDistance(T)` or a
/// vector under `vector_metric(T)`.
pub(crate) fn noise_shape<T: Primitive>(
    mechanism: &str,
    input_space: &MetricSpace,
    vector_metric: fn(ScalarKind) -> Metric,
) -> Fallible<Shape> {
    let kind = T::KIND;
    let (domain, metric) = (input_space.domain(), *input_space.metric());
    let shape = match domain {
        Domain::Atom { .. } | Domain::Interval { .. } if metric == Metric::AbsoluteDistance(kind) => {
            Shape::Scalar
        }
        Domain::Vector { element, .. } if metric == vector_metric(kind) => {
            if element.scalar_kind() != Some(kind) {
                return Err(DpgError::type_mismatch(format!("{kind} elements"), element));
            }
            Shape::Vector
        }
        _ => {
            return Err(DpgError::InvalidArgument(format!(
                "{mechanism} over {kind} expects a scalar under {} or a vector under {}, found {input_space}",
                Metric::AbsoluteDistance(kind),
                vector_metric(kind),
            )))
        }
    };
    if shape == Shape::Scalar && domain.scalar_kind() != Some(kind) {
        return Err(DpgError::type_mismatch(kind, domain));
    }
    if !domain_is_non_nan(domain) {
        return Err(DpgError::InvalidArgument(format!(
            "{mechanism} requires non-NaN inputs, found {domain}"
        )));
    }
    Ok(shape)
}

fn domain_is_non_nan(domain: &Domain) -> bool {
    match domain {
        Domain::Vector { element, .. } => element.is_numeric_non_nan(),
        other => other.is_numeric_non_nan(),
    }
}

/// Validate a noise scale: finite and non-negative.
pub(crate) fn check_scale(scale: f64) -> Fallible<f64> {
    check_nonnegative("scale", scale)?;
    if !scale.is_finite() {
        return Err(DpgError::InvalidArgument(format!(
            "scale must be finite, found {scale}"
        )));
    }
    Ok(scale)
}

/// `d / scale` rounded up, with `0 / 0 = 0` and `d / 0 = ∞`.
pub(crate) fn distance_ratio(d: f64, scale: f64) -> f64 {
    if d == 0.0 {
        0.0
    } else if scale == 0.0 {
        f64::INFINITY
    } else {
        dpg_core::arith::inf_div(d, scale)
    }
}
