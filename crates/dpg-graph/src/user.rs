//! # User-Defined Stages
//!
//! Build a transformation or measurement from caller-supplied closures.
//! Nothing verifies that the relation is a true stability or privacy bound
//! for the function, so these constructors require the
//! `honest-but-curious` feature in addition to the usual type and
//! monotonicity checks.

use dpg_core::{Fallible, Feature, FeatureSet, MetricSpace, PrivacyMeasure, RuntimeType, Value};

use crate::function::Function;
use crate::measurement::Measurement;
use crate::relation::Relation;
use crate::transformation::Transformation;

/// A transformation from a trusted function and stability bound.
pub fn make_user_transformation(
    input_space: MetricSpace,
    output_space: MetricSpace,
    function: impl Fn(&Value) -> Fallible<Value> + Send + Sync + 'static,
    stability_map: impl Fn(&Value) -> Fallible<Value> + Send + Sync + 'static,
    features: &FeatureSet,
) -> Fallible<Transformation> {
    features.require(Feature::HonestButCurious)?;
    tracing::debug!(input = %input_space, output = %output_space, "building user transformation");
    let function = Function::new(
        input_space.domain().carrier_type(),
        output_space.domain().carrier_type(),
        function,
    );
    let relation = Relation::new(
        input_space.metric().distance_type(),
        output_space.metric().distance_type(),
        stability_map,
    );
    Transformation::new(input_space, output_space, function, relation)
}

/// A measurement from a trusted release function and privacy bound.
pub fn make_user_measurement(
    input_space: MetricSpace,
    output_measure: PrivacyMeasure,
    output_type: RuntimeType,
    function: impl Fn(&Value) -> Fallible<Value> + Send + Sync + 'static,
    privacy_map: impl Fn(&Value) -> Fallible<Value> + Send + Sync + 'static,
    features: &FeatureSet,
) -> Fallible<Measurement> {
    features.require(Feature::HonestButCurious)?;
    tracing::debug!(input = %input_space, measure = %output_measure, "building user measurement");
    let function = Function::new(input_space.domain().carrier_type(), output_type, function);
    let relation = Relation::new(
        input_space.metric().distance_type(),
        output_measure.distance_type(),
        privacy_map,
    );
    Measurement::new(input_space, output_measure, function, relation)
}
