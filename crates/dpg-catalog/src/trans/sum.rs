//! # Bounded Sum
//!
//! Sum a vector whose elements are known to lie in `[L, U]`.
//!
//! | Input metric | Stability bound |
//! |---|---|
//! | `SymmetricDistance`, `InsertDeleteDistance` | `d_in · max(|L|, |U|)` |
//! | `SubstitutionDistance`, `HammingDistance` (sized input) | `d_in · (U - L)` |
//!
//! Adding or removing a record moves the sum by at most the largest
//! magnitude; replacing one moves it by at most the width of the interval.
//!
//! Positive and negative records are accumulated separately, each
//! saturating at the type bounds, and the two partial sums are added last.
//! A saturating sum over mixed signs would depend on record order; the
//! split sum does not. Float records are additionally summed in ascending
//! order, so the release is a function of the multiset of records. Float
//! sums still carry rounding error, so they need `floating-point`.

use std::cmp::Ordering;

use dpg_core::{Domain, DpgError, Fallible, Feature, FeatureSet, Metric, MetricSpace, Number};
use dpg_graph::{Function, Relation, Transformation};

use super::vector_parts;

/// Sum a vector of bounded elements of type `T`.
///
/// # Errors
///
/// - `FeatureDisabled` without `contrib`, or without `floating-point` for a
///   float `T`.
/// - `InvalidArgument` if the elements are unbounded or the metric has no
///   sum sensitivity.
/// - `Overflow` if the per-record sensitivity does not fit in `T`.
pub fn make_bounded_sum<T: Number>(
    input_space: &MetricSpace,
    features: &FeatureSet,
) -> Fallible<Transformation> {
    features.require(Feature::Contrib)?;
    if T::KIND.is_float() {
        features.require(Feature::FloatingPoint)?;
    }
    let (element, _) = vector_parts("bounded sum", input_space)?;
    let (lower, upper) = element.bounds_of::<T>()?;

    let per_record = match input_space.metric() {
        Metric::SymmetricDistance | Metric::InsertDeleteDistance => {
            let (lo, hi) = (lower.inf_abs()?, upper.inf_abs()?);
            if lo > hi {
                lo
            } else {
                hi
            }
        }
        Metric::SubstitutionDistance | Metric::HammingDistance => upper.inf_sub(lower)?,
        other => {
            return Err(DpgError::InvalidArgument(format!(
                "bounded sum is not stable under {other}"
            )))
        }
    };

    let output_space = MetricSpace::new(Domain::atom(T::KIND), Metric::AbsoluteDistance(T::KIND))?;
    tracing::debug!(
        kind = %T::KIND,
        metric = %input_space.metric(),
        %per_record,
        "building bounded sum"
    );

    Transformation::new(
        input_space.clone(),
        output_space,
        Function::new_typed(|data: &Vec<T>| {
            if T::KIND.is_float() {
                let mut sorted = data.clone();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
                Ok(split_sum(&sorted))
            } else {
                Ok(split_sum(data))
            }
        }),
        Relation::new_typed(move |d_in: &u32| T::from_u32_up(*d_in)?.inf_mul(per_record)),
    )
}

fn split_sum<T: Number>(data: &[T]) -> T {
    let (mut positive, mut negative) = (T::zero(), T::zero());
    for &x in data {
        if x >= T::zero() {
            positive = positive.saturating_add(x);
        } else {
            negative = negative.saturating_add(x);
        }
    }
    positive.saturating_add(negative)
}
