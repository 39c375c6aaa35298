//! # Measure Casts and Amplification
//!
//! Rewrap a measurement so its privacy loss is expressed in a different
//! measure, or tightened by a public fact about how the data was sampled.
//! The function is shared unchanged; only the privacy relation is replaced.
//!
//! | Cast | Relation |
//! |---|---|
//! | ε → (ε, δ) | `(ε, 0)` |
//! | ε → ρ | `ρ = ε² / 2` |
//! | ρ → (ε, δ) | `ε = ρ + 2 sqrt(ρ ln(1/δ))` at a fixed `δ` |
//! | amplification | `ε' = ln(1 + (n/N)(e^ε - 1))`, `δ' = (n/N) δ` |
//!
//! ## Security Invariant
//!
//! Every rewritten bound rounds toward +∞. Casts require the `contrib`
//! feature; amplification also requires `honest-but-curious`, because the
//! population size is trusted, not checked.

use dpg_core::arith::{inf_add, inf_div, inf_exp_m1, inf_ln_1p, inf_mul, inf_sqrt, neg_inf_ln};
use dpg_core::{Domain, DpgError, Fallible, Feature, FeatureSet, PrivacyMeasure, Value};

use crate::measurement::Measurement;
use crate::relation::Relation;

fn expect_measure(measurement: &Measurement, expected: PrivacyMeasure) -> Fallible<()> {
    if measurement.output_measure() != expected {
        return Err(DpgError::InvalidArgument(format!(
            "expected a measurement under {expected}, found {}",
            measurement.output_measure()
        )));
    }
    Ok(())
}

fn as_f64(loss: &Value) -> Fallible<f64> {
    match loss {
        Value::F64(x) => Ok(*x),
        other => Err(DpgError::type_mismatch("f64", other.type_name())),
    }
}

fn as_pair(loss: &Value) -> Fallible<(f64, f64)> {
    match loss {
        Value::Tuple(items) => match items.as_slice() {
            [Value::F64(e), Value::F64(d)] => Ok((*e, *d)),
            _ => Err(DpgError::type_mismatch("(f64, f64)", loss.type_name())),
        },
        other => Err(DpgError::type_mismatch("(f64, f64)", other.type_name())),
    }
}

/// Replace the privacy map of `measurement`, keeping its function.
fn rewrap(
    measurement: &Measurement,
    measure: PrivacyMeasure,
    map: impl Fn(&Value) -> Fallible<Value> + Send + Sync + 'static,
) -> Fallible<Measurement> {
    let inner = measurement.privacy_map().clone();
    let relation = Relation::new(
        inner.input_distance().clone(),
        measure.distance_type(),
        move |d_in| map(&inner.bound(d_in)?),
    );
    Measurement::new(
        measurement.input_space().clone(),
        measure,
        measurement.function().clone(),
        relation,
    )
}

/// Express a pure ε-DP measurement as (ε, 0)-DP.
pub fn make_pure_dp_to_fixed_approx_dp(
    measurement: &Measurement,
    features: &FeatureSet,
) -> Fallible<Measurement> {
    features.require(Feature::Contrib)?;
    expect_measure(measurement, PrivacyMeasure::MaxDivergence)?;
    tracing::debug!("casting pure DP to approximate DP");
    rewrap(measurement, PrivacyMeasure::FixedSmoothedMaxDivergence, |eps| {
        Ok(Value::Tuple(vec![Value::F64(as_f64(eps)?), Value::F64(0.0)]))
    })
}

/// Express a pure ε-DP measurement as ρ-zCDP with `ρ = ε²/2`.
pub fn make_pure_dp_to_zcdp(
    measurement: &Measurement,
    features: &FeatureSet,
) -> Fallible<Measurement> {
    features.require(Feature::Contrib)?;
    expect_measure(measurement, PrivacyMeasure::MaxDivergence)?;
    tracing::debug!("casting pure DP to zCDP");
    rewrap(measurement, PrivacyMeasure::ZeroConcentratedDivergence, |eps| {
        let eps = as_f64(eps)?;
        Ok(Value::F64(inf_mul(inf_mul(eps, eps), 0.5)))
    })
}

/// Express a ρ-zCDP measurement as (ε, δ)-DP at the fixed `delta`.
///
/// # Errors
///
/// `InvalidArgument` unless `0 < delta < 1`.
pub fn make_zcdp_to_approx_dp(
    measurement: &Measurement,
    delta: f64,
    features: &FeatureSet,
) -> Fallible<Measurement> {
    features.require(Feature::Contrib)?;
    expect_measure(measurement, PrivacyMeasure::ZeroConcentratedDivergence)?;
    if !(delta > 0.0 && delta < 1.0) {
        return Err(DpgError::InvalidArgument(format!(
            "delta must be in (0, 1), found {delta}"
        )));
    }
    tracing::debug!(delta, "casting zCDP to approximate DP");
    // ln(1/δ), rounded up
    let log_term = -neg_inf_ln(delta);
    rewrap(measurement, PrivacyMeasure::FixedSmoothedMaxDivergence, move |rho| {
        let rho = as_f64(rho)?;
        let eps = inf_add(rho, inf_mul(2.0, inf_sqrt(inf_mul(rho, log_term))));
        Ok(Value::Tuple(vec![Value::F64(eps), Value::F64(delta)]))
    })
}

/// Amplify a measurement on a random sample of `n` records drawn without
/// replacement from a population of `population_size`.
///
/// The input domain must be a vector domain of known size `n`.
pub fn make_population_amplification(
    measurement: &Measurement,
    population_size: usize,
    features: &FeatureSet,
) -> Fallible<Measurement> {
    features.require_all(&[Feature::Contrib, Feature::HonestButCurious])?;
    let sample_size = match measurement.input_domain() {
        Domain::Vector { size: Some(n), .. } => *n,
        other => {
            return Err(DpgError::InvalidArgument(format!(
                "amplification requires a sized vector domain, found {other}"
            )))
        }
    };
    if population_size < sample_size || population_size == 0 {
        return Err(DpgError::InvalidArgument(format!(
            "population size {population_size} must be at least the sample size {sample_size}"
        )));
    }
    #[allow(clippy::cast_precision_loss)]
    let rate = inf_div(sample_size as f64, population_size as f64);
    let measure = measurement.output_measure();
    tracing::debug!(sample_size, population_size, measure = %measure, "amplifying by subsampling");

    let amplify = move |eps: f64| inf_ln_1p(inf_mul(rate, inf_exp_m1(eps)));
    match measure {
        PrivacyMeasure::MaxDivergence => rewrap(measurement, measure, move |loss| {
            Ok(Value::F64(amplify(as_f64(loss)?)))
        }),
        PrivacyMeasure::FixedSmoothedMaxDivergence => rewrap(measurement, measure, move |loss| {
            let (eps, delta) = as_pair(loss)?;
            Ok(Value::Tuple(vec![
                Value::F64(amplify(eps)),
                Value::F64(inf_mul(rate, delta).min(1.0)),
            ]))
        }),
        PrivacyMeasure::ZeroConcentratedDivergence => Err(DpgError::InvalidArgument(
            "amplification is not defined for ZeroConcentratedDivergence".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Function;
    use dpg_core::{Metric, MetricSpace, ScalarKind};

    fn all() -> FeatureSet {
        FeatureSet::all()
    }

    fn pure_on(domain: Domain, metric: Metric, eps_per_unit: f64) -> Measurement {
        Measurement::new(
            MetricSpace::new(domain, metric).unwrap(),
            PrivacyMeasure::MaxDivergence,
            Function::new_typed(|x: &Vec<f64>| Ok(x.len() as f64)),
            Relation::new_typed(move |d: &u32| Ok(f64::from(*d) * eps_per_unit)),
        )
        .unwrap()
    }

    fn pure(eps_per_unit: f64) -> Measurement {
        pure_on(
            Domain::vector(Domain::atom(ScalarKind::F64)),
            Metric::SymmetricDistance,
            eps_per_unit,
        )
    }

    #[test]
    fn test_pure_to_approx() {
        let m = make_pure_dp_to_fixed_approx_dp(&pure(1.0), &all()).unwrap();
        assert_eq!(m.output_measure(), PrivacyMeasure::FixedSmoothedMaxDivergence);
        assert_eq!(
            m.map(&Value::U32(2)).unwrap(),
            Value::Tuple(vec![Value::F64(2.0), Value::F64(0.0)])
        );
        assert!(make_pure_dp_to_fixed_approx_dp(&m, &all()).is_err());
    }

    #[test]
    fn test_pure_to_zcdp() {
        let m = make_pure_dp_to_zcdp(&pure(1.0), &all()).unwrap();
        assert_eq!(m.map(&Value::U32(2)).unwrap(), Value::F64(2.0));
        assert!(m.check_typed(1u32, 0.5f64).unwrap());
        assert!(!m.check_typed(1u32, 0.49f64).unwrap());
    }

    #[test]
    fn test_zcdp_to_approx() {
        let rho = make_pure_dp_to_zcdp(&pure(1.0), &all()).unwrap();
        let m = make_zcdp_to_approx_dp(&rho, 1e-6, &all()).unwrap();
        let Value::Tuple(items) = m.map(&Value::U32(1)).unwrap() else {
            panic!("expected a tuple");
        };
        let expected = 0.5 + 2.0 * (0.5 * -(1e-6f64).ln()).sqrt();
        let Value::F64(eps) = items[0] else {
            panic!("expected f64");
        };
        assert!(eps >= expected);
        assert!(eps < expected + 1e-9);
        assert_eq!(items[1], Value::F64(1e-6));
        assert!(make_zcdp_to_approx_dp(&rho, 0.0, &all()).is_err());
    }

    #[test]
    fn test_casts_require_contrib() {
        assert_eq!(
            make_pure_dp_to_zcdp(&pure(1.0), &FeatureSet::new()).unwrap_err(),
            DpgError::FeatureDisabled("contrib".into())
        );
    }

    #[test]
    fn test_population_amplification() {
        let sized = pure_on(
            Domain::sized_vector(Domain::atom(ScalarKind::F64), 10),
            Metric::SymmetricDistance,
            1.0,
        );
        let amplified = make_population_amplification(&sized, 100, &all()).unwrap();
        let expected = (1.0 + 0.1 * (2.0f64.exp() - 1.0)).ln();
        let Value::F64(eps) = amplified.map(&Value::U32(2)).unwrap() else {
            panic!("expected f64");
        };
        assert!(eps >= expected && eps < expected + 1e-9);
        assert!(amplified.check_typed(2u32, 0.4941f64).unwrap());
        assert!(!amplified.check_typed(2u32, 0.494f64).unwrap());
        // invocation is unchanged
        assert_eq!(
            amplified.invoke_typed::<Vec<f64>, f64>(vec![0.0; 10]).unwrap(),
            10.0
        );
    }

    #[test]
    fn test_population_amplification_requirements() {
        let sized = pure_on(
            Domain::sized_vector(Domain::atom(ScalarKind::F64), 10),
            Metric::SymmetricDistance,
            1.0,
        );
        assert_eq!(
            make_population_amplification(&sized, 100, &FeatureSet::new().with(Feature::Contrib))
                .unwrap_err(),
            DpgError::FeatureDisabled("honest-but-curious".into())
        );
        assert!(make_population_amplification(&sized, 5, &all()).is_err());
        assert!(make_population_amplification(&pure(1.0), 100, &all()).is_err());
    }
}
