//! # Count
//!
//! The number of records in a vector. Adding or removing one record changes
//! the count by one, so the stability map is the identity (converted to the
//! output type).

use dpg_core::{Carrier, Domain, DpgError, Fallible, Feature, FeatureSet, Metric, MetricSpace, Number, Value};
use dpg_graph::{Function, Relation, Transformation};

use super::vector_parts;

/// Count the records of a vector of any element type, as a `TO`.
///
/// Invoking on more records than `TO` can represent fails with `Overflow`.
pub fn make_count<TO: Number>(
    input_space: &MetricSpace,
    features: &FeatureSet,
) -> Fallible<Transformation> {
    features.require(Feature::Contrib)?;
    vector_parts("count", input_space)?;
    match input_space.metric() {
        Metric::SymmetricDistance | Metric::InsertDeleteDistance => {}
        other => {
            return Err(DpgError::InvalidArgument(format!(
                "count is not stable under {other}"
            )))
        }
    }

    let output_space = MetricSpace::new(Domain::atom(TO::KIND), Metric::AbsoluteDistance(TO::KIND))?;
    tracing::debug!(output = %TO::KIND, metric = %input_space.metric(), "building count");

    let function = Function::new(
        input_space.domain().carrier_type(),
        TO::runtime_type(),
        |arg| match arg {
            Value::Vec(items) => count_as::<TO>(items.len()).map(Carrier::into_value),
            other => Err(DpgError::type_mismatch("a vector", other.type_name())),
        },
    );
    Transformation::new(
        input_space.clone(),
        output_space,
        function,
        Relation::new_typed(|d_in: &u32| TO::from_u32_up(*d_in)),
    )
}

#[allow(clippy::cast_precision_loss)]
fn count_as<TO: Number>(len: usize) -> Fallible<TO> {
    TO::from_f64_nearest(len as f64)
        .ok_or_else(|| DpgError::Overflow(format!("count {len} does not fit in {}", TO::KIND)))
}
