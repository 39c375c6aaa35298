//! # Gaussian Mechanism
//!
//! Release a float (or a vector of floats) plus Gaussian noise of standard
//! deviation `σ`. The privacy map is `ρ = (d_in / σ)² / 2` under
//! `ZeroConcentratedDivergence`; vector inputs are measured under
//! `L2Distance`.

use dpg_core::arith::inf_mul;
use dpg_core::{Carrier, Fallible, Feature, FeatureSet, Metric, MetricSpace, PrivacyMeasure, Value};
use dpg_graph::{Function, Measurement, Relation};

use super::{check_scale, distance_ratio, noise_shape, Shape};
use crate::noise::GaussianNoise;

/// Add Gaussian noise with standard deviation `scale` to a `T` or `Vec<T>`.
///
/// Requires `contrib` and `floating-point`.
pub fn make_gaussian<T: GaussianNoise>(
    input_space: &MetricSpace,
    scale: f64,
    features: &FeatureSet,
) -> Fallible<Measurement> {
    features.require_all(&[Feature::Contrib, Feature::FloatingPoint])?;
    let scale = check_scale(scale)?;
    let shape = noise_shape::<T>("gaussian", input_space, Metric::L2Distance)?;
    tracing::debug!(kind = %T::KIND, scale, ?shape, "building gaussian mechanism");

    let function = match shape {
        Shape::Scalar => Function::new_typed(move |x: &T| {
            x.add_gaussian(scale, &mut rand::thread_rng())
        }),
        Shape::Vector => Function::new_typed(move |xs: &Vec<T>| {
            let mut rng = rand::thread_rng();
            xs.iter()
                .map(|x| x.add_gaussian(scale, &mut rng))
                .collect::<Fallible<Vec<T>>>()
        }),
    };
    let privacy_map = Relation::new(T::runtime_type(), f64::runtime_type(), move |d_in: &Value| {
        let ratio = distance_ratio(T::from_value(d_in)?.to_f64_up(), scale);
        Ok(Value::F64(inf_mul(inf_mul(ratio, ratio), 0.5)))
    });
    Measurement::new(
        input_space.clone(),
        PrivacyMeasure::ZeroConcentratedDivergence,
        function,
        privacy_map,
    )
}
