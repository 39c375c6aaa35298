//! # Laplace Mechanism
//!
//! Release a number (or a vector of numbers) plus Laplace noise of scale
//! `b`. Float inputs receive continuous noise and need the
//! `floating-point` feature; integer inputs receive two-sided geometric
//! noise.
//!
//! ## Security Invariant
//!
//! The privacy map is `ε = d_in / b` under `MaxDivergence`, rounded toward
//! +∞. A vector input must be measured under `L1Distance`.

use dpg_core::{Carrier, Fallible, Feature, FeatureSet, Metric, MetricSpace, PrivacyMeasure, Value};
use dpg_graph::{Function, Measurement, Relation};

use super::{check_scale, distance_ratio, noise_shape, Shape};
use crate::noise::LaplaceNoise;

/// Add Laplace (or geometric) noise with scale `scale` to a `T` or `Vec<T>`.
///
/// # Errors
///
/// - `FeatureDisabled` without `contrib`, or without `floating-point` when
///   `T` is a float.
/// - `InvalidArgument` for a negative or non-finite scale, or an input
///   space that is not a scalar under `AbsoluteDistance(T)` or a vector
///   under `L1Distance(T)`.
pub fn make_laplace<T: LaplaceNoise>(
    input_space: &MetricSpace,
    scale: f64,
    features: &FeatureSet,
) -> Fallible<Measurement> {
    features.require(Feature::Contrib)?;
    if T::KIND.is_float() {
        features.require(Feature::FloatingPoint)?;
    }
    let scale = check_scale(scale)?;
    let shape = noise_shape::<T>("laplace", input_space, Metric::L1Distance)?;
    tracing::debug!(kind = %T::KIND, scale, ?shape, "building laplace mechanism");

    let function = match shape {
        Shape::Scalar => Function::new_typed(move |x: &T| {
            x.add_laplace(scale, &mut rand::thread_rng())
        }),
        Shape::Vector => Function::new_typed(move |xs: &Vec<T>| {
            let mut rng = rand::thread_rng();
            xs.iter()
                .map(|x| x.add_laplace(scale, &mut rng))
                .collect::<Fallible<Vec<T>>>()
        }),
    };
    let privacy_map = Relation::new(T::runtime_type(), f64::runtime_type(), move |d_in: &Value| {
        let d_in = T::from_value(d_in)?;
        Ok(Value::F64(distance_ratio(d_in.to_f64_up(), scale)))
    });
    Measurement::new(input_space.clone(), PrivacyMeasure::MaxDivergence, function, privacy_map)
}
