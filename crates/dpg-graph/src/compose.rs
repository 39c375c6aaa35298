//! # Composition
//!
//! Parallel release of several measurements on the same input. The composed
//! measurement runs every constituent on the same argument and returns the
//! releases as an ordered tuple; its privacy loss is the constituents'
//! losses combined by a [`CompositionRule`].
//!
//! ## Security Invariant
//!
//! Constituents must share input domain, input metric, and privacy measure
//! (`DomainMismatch` otherwise), and the rule must be sound for that
//! measure. Composition requires the `contrib` feature.

use std::sync::Arc;

use dpg_core::{
    CompositionRule, DpgError, Fallible, Feature, FeatureSet, PrivacyMeasure, RuntimeType, Value,
};

use crate::function::Function;
use crate::measurement::Measurement;
use crate::relation::Relation;

/// Compose under the measure's default rule (linear composition).
pub fn make_basic_composition(
    measurements: &[Measurement],
    features: &FeatureSet,
) -> Fallible<Measurement> {
    let first = measurements.first().ok_or_else(empty)?;
    let rule = first.output_measure().default_rule();
    make_composition_with_rule(measurements, rule, features)
}

/// Compose under an explicit rule.
pub fn make_composition_with_rule(
    measurements: &[Measurement],
    rule: Arc<dyn CompositionRule>,
    features: &FeatureSet,
) -> Fallible<Measurement> {
    features.require(Feature::Contrib)?;
    let measure = check_compatible(measurements)?;
    if !rule.supports(measure) {
        return Err(DpgError::InvalidArgument(format!(
            "{} composition is not defined for {measure}",
            rule.name()
        )));
    }
    tracing::debug!(
        count = measurements.len(),
        measure = %measure,
        rule = rule.name(),
        "composing measurements"
    );

    let maps: Vec<Relation> = measurements.iter().map(|m| m.privacy_map().clone()).collect();
    let input_distance = measurements[0].input_metric().distance_type();
    let relation = Relation::new(input_distance, measure.distance_type(), move |d_in| {
        let losses = maps
            .iter()
            .map(|map| map.bound(d_in))
            .collect::<Fallible<Vec<_>>>()?;
        rule.combine(measure, &losses)
    });

    Measurement::new(
        measurements[0].input_space().clone(),
        measure,
        tuple_function(measurements),
        relation,
    )
}

/// Compose with externally supplied per-measurement budgets.
///
/// The composed loss is the budgets combined by the measure's default rule,
/// provided every constituent satisfies its own budget at `d_in`. When any
/// constituent exceeds its budget the relation fails with
/// `RelationViolation`, so `check` reports `false`.
pub fn make_sequential_composition(
    measurements: &[Measurement],
    budgets: &[Value],
    features: &FeatureSet,
) -> Fallible<Measurement> {
    features.require(Feature::Contrib)?;
    let measure = check_compatible(measurements)?;
    if budgets.len() != measurements.len() {
        return Err(DpgError::InvalidArgument(format!(
            "expected {} budgets, found {}",
            measurements.len(),
            budgets.len()
        )));
    }
    for budget in budgets {
        measure.check_distance(budget)?;
    }
    let total = measure.default_rule().combine(measure, budgets)?;
    tracing::debug!(
        count = measurements.len(),
        measure = %measure,
        total = %total,
        "composing measurements with fixed budgets"
    );

    let parts: Vec<(Measurement, Value)> = measurements
        .iter()
        .cloned()
        .zip(budgets.iter().cloned())
        .collect();
    let input_distance = measurements[0].input_metric().distance_type();
    let relation = Relation::new(input_distance, measure.distance_type(), move |d_in| {
        for (i, (m, budget)) in parts.iter().enumerate() {
            if !m.check(d_in, budget)? {
                return Err(DpgError::RelationViolation(format!(
                    "measurement {i} exceeds its budget {budget} at d_in = {d_in}"
                )));
            }
        }
        Ok(total.clone())
    });

    Measurement::new(
        measurements[0].input_space().clone(),
        measure,
        tuple_function(measurements),
        relation,
    )
}

fn empty() -> DpgError {
    DpgError::InvalidArgument("composition requires at least one measurement".into())
}

/// Check that every measurement shares the first's input space and measure.
fn check_compatible(measurements: &[Measurement]) -> Fallible<PrivacyMeasure> {
    let first = measurements.first().ok_or_else(empty)?;
    for (i, m) in measurements.iter().enumerate().skip(1) {
        if m.input_space() != first.input_space() {
            return Err(DpgError::DomainMismatch(format!(
                "measurement {i} has input space {}, expected {}",
                m.input_space(),
                first.input_space()
            )));
        }
        if m.output_measure() != first.output_measure() {
            return Err(DpgError::DomainMismatch(format!(
                "measurement {i} is measured in {}, expected {}",
                m.output_measure(),
                first.output_measure()
            )));
        }
    }
    Ok(first.output_measure())
}

/// Run every measurement on the same input and collect an ordered tuple.
fn tuple_function(measurements: &[Measurement]) -> Function {
    let input_type = measurements[0].function().input_type().clone();
    let output_type = RuntimeType::Tuple(
        measurements
            .iter()
            .map(|m| m.output_type().clone())
            .collect(),
    );
    let functions: Vec<Function> = measurements.iter().map(|m| m.function().clone()).collect();
    Function::new(input_type, output_type, move |arg| {
        Ok(Value::Tuple(
            functions
                .iter()
                .map(|f| f.eval(arg))
                .collect::<Fallible<_>>()?,
        ))
    })
}
