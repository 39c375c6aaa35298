//! # Clamp
//!
//! Replace each record with the nearest value in `[lower, upper]`. The
//! output domain records the bounds so downstream stages (bounded sum) can
//! read their sensitivity from it.
//!
//! Clamping is row-by-row, so it is 1-stable under every dataset metric.

use dpg_core::{Domain, DpgError, Fallible, Feature, FeatureSet, MetricSpace, Number};
use dpg_graph::{Function, Relation, Transformation};

use super::vector_parts;

/// Clamp every element of a vector to `[lower, upper]`.
///
/// # Errors
///
/// - `FeatureDisabled` without `contrib`.
/// - `TypeMismatch` unless the input elements are non-NaN values of `T`.
/// - `InvalidArgument` if the input is not a vector under a dataset metric,
///   or `lower > upper`.
pub fn make_clamp<T: Number>(
    input_space: &MetricSpace,
    lower: T,
    upper: T,
    features: &FeatureSet,
) -> Fallible<Transformation> {
    features.require(Feature::Contrib)?;
    let (element, size) = vector_parts("clamp", input_space)?;
    if element.scalar_kind() != Some(T::KIND) || !element.is_numeric_non_nan() {
        return Err(DpgError::type_mismatch(
            format!("non-NaN {} elements", T::KIND),
            element,
        ));
    }
    let metric = *input_space.metric();
    if !metric.is_dataset_metric() {
        return Err(DpgError::InvalidArgument(format!(
            "clamp expects a dataset metric, found {metric}"
        )));
    }

    let bounded = Domain::interval_of(lower, upper)?;
    let output_space = MetricSpace::new(
        Domain::Vector {
            element: Box::new(bounded),
            size,
        },
        metric,
    )?;
    tracing::debug!(kind = %T::KIND, %lower, %upper, metric = %metric, "building clamp");

    Transformation::new(
        input_space.clone(),
        output_space,
        Function::new_typed(move |data: &Vec<T>| {
            Ok(data.iter().map(|x| clamp(*x, lower, upper)).collect::<Vec<T>>())
        }),
        Relation::new_typed(|d_in: &u32| Ok(*d_in)),
    )
}

fn clamp<T: PartialOrd>(x: T, lower: T, upper: T) -> T {
    if x < lower {
        lower
    } else if x > upper {
        upper
    } else {
        x
    }
}
