//! End-to-end: clamp, bounded sum and Laplace noise over bounded floats.

use dpg_catalog::{
    make_bounded_sum, make_clamp, make_count, make_laplace, ConstructorRegistry, PipelineSpec,
};
use dpg_core::{Domain, DpgError, Feature, FeatureSet, Metric, MetricSpace, ScalarKind, Value};
use dpg_graph::{binary_search_chain, binary_search_param, Measurement, SearchOptions};
use proptest::prelude::*;

fn raw() -> MetricSpace {
    MetricSpace::new(
        Domain::vector(Domain::interval_of(0.0f64, 100.0).unwrap()),
        Metric::SymmetricDistance,
    )
    .unwrap()
}

fn noisy_sum(scale: f64) -> Measurement {
    let features = FeatureSet::all();
    let clamp = make_clamp(&raw(), 0.0f64, 100.0, &features).unwrap();
    let sum = make_bounded_sum::<f64>(clamp.output_space(), &features).unwrap();
    let laplace = make_laplace::<f64>(sum.output_space(), scale, &features).unwrap();
    (clamp >> sum >> laplace).unwrap()
}

#[test]
fn test_budget_boundary_at_scale_ten() {
    let m = noisy_sum(10.0);
    assert!(m.check_typed(1u32, 10.0f64).unwrap());
    assert!(!m.check_typed(1u32, 9.999f64).unwrap());
    assert_eq!(m.map(&Value::U32(1)).unwrap(), Value::F64(10.0));
}

#[test]
fn test_invoke_releases_a_float() {
    let m = noisy_sum(10.0);
    let release: f64 = m.invoke_typed(vec![10.0, 20.0, 30.0]).unwrap();
    assert!(release.is_finite());
    assert!(matches!(
        m.invoke_typed::<Vec<f64>, f64>(vec![1000.0]),
        Err(DpgError::InvocationFailure(_))
    ));
}

#[test]
fn test_calibration_finds_the_scale() {
    let d_in = Value::U32(1);
    let d_out = Value::F64(1.0);
    let scale = binary_search_param(|s| Ok(noisy_sum(s)), &d_in, &d_out, SearchOptions::default())
        .unwrap();
    assert!(scale >= 100.0 && scale < 100.0 + 1e-9, "scale {scale}");

    let m = binary_search_chain(|s| Ok(noisy_sum(s)), &d_in, &d_out, SearchOptions::default())
        .unwrap();
    assert!(m.check(&d_in, &d_out).unwrap());
}

#[test]
fn test_pipeline_file_matches_manual_chain() {
    let yaml = r#"
input:
  domain:
    kind: vector
    element: { kind: interval, type: f64, lower: 0, upper: 100 }
  metric: SymmetricDistance
stages:
  - constructor: clamp
    args: { bounds: [0.0, 100.0] }
  - constructor: bounded_sum
  - constructor: laplace
    args: { scale: 10.0 }
"#;
    let stage = PipelineSpec::from_yaml(yaml)
        .unwrap()
        .build(&ConstructorRegistry::with_catalog(), &FeatureSet::all())
        .unwrap();
    let manual = noisy_sum(10.0);
    for d_in in [0u32, 1, 2, 7] {
        assert_eq!(
            stage.map(&Value::U32(d_in)).unwrap(),
            manual.map(&Value::U32(d_in)).unwrap()
        );
    }
}

#[test]
fn test_integer_pipeline_uses_geometric_noise_without_float_feature() {
    let features = FeatureSet::new().with(Feature::Contrib);
    let ints = MetricSpace::new(
        Domain::vector(Domain::atom(ScalarKind::I64)),
        Metric::SymmetricDistance,
    )
    .unwrap();
    let count = make_count::<i64>(&ints, &features).unwrap();
    let laplace = make_laplace::<i64>(count.output_space(), 2.0, &features).unwrap();
    let m = (count >> laplace).unwrap();
    assert!(m.check_typed(1u32, 0.5f64).unwrap());
    let _: i64 = m.invoke_typed(vec![1i64, 2, 3]).unwrap();
}

proptest! {
    /// `check(1, ε)` holds exactly when `ε >= 100 / scale`.
    #[test]
    fn budget_is_sensitivity_over_scale(scale in 0.5f64..1000.0, eps in 0.0f64..250.0) {
        let m = noisy_sum(scale);
        let ideal = dpg_core::arith::inf_div(100.0, scale);
        prop_assert_eq!(m.check_typed(1u32, eps).unwrap(), eps >= ideal);
    }
}
