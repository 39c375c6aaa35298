//! # Measurements
//!
//! A `Measurement` is a randomized release: an input metric space, a
//! privacy measure, the (randomized) function producing the release, and a
//! privacy relation from input distance to privacy loss. It is terminal in
//! a pipeline; only postprocessing may follow it.
//!
//! ## Security Invariant
//!
//! Same construction checks as `Transformation`, with the output side typed
//! by the measure's distance type. Randomness is drawn inside the function
//! on each `invoke`; the measurement itself is never mutated.

use std::fmt;

use dpg_core::{Carrier, Domain, Fallible, Metric, MetricSpace, PrivacyMeasure, RuntimeType, Value};

use crate::function::Function;
use crate::relation::{expect_distance_type, Relation};
use crate::transformation::{check_member, check_relation_types, into_invocation_failure};

/// A randomized release with a privacy guarantee.
#[derive(Clone)]
pub struct Measurement {
    input_space: MetricSpace,
    output_measure: PrivacyMeasure,
    function: Function,
    privacy_map: Relation,
}

impl Measurement {
    /// Validate and assemble a measurement.
    pub fn new(
        input_space: MetricSpace,
        output_measure: PrivacyMeasure,
        function: Function,
        privacy_map: Relation,
    ) -> Fallible<Self> {
        RuntimeType::assert_is_similar(&input_space.domain().carrier_type(), function.input_type())?;
        check_relation_types(
            &privacy_map,
            &input_space.metric().distance_type(),
            &output_measure.distance_type(),
        )?;
        privacy_map.sanity_check()?;
        Ok(Self {
            input_space,
            output_measure,
            function,
            privacy_map,
        })
    }

    /// Draw a release on `arg`.
    pub fn invoke(&self, arg: &Value) -> Fallible<Value> {
        check_member(self.input_domain(), arg)?;
        self.function.eval(arg).map_err(into_invocation_failure)
    }

    /// [`Measurement::invoke`] over native carriers.
    pub fn invoke_typed<I: Carrier, O: Carrier>(&self, arg: I) -> Fallible<O> {
        O::from_value(&self.invoke(&arg.into_value())?)
    }

    /// The tightest privacy loss for inputs within `d_in`.
    pub fn map(&self, d_in: &Value) -> Fallible<Value> {
        self.privacy_map.bound(d_in)
    }

    /// Whether inputs within `d_in` always incur privacy loss within `d_out`.
    pub fn check(&self, d_in: &Value, d_out: &Value) -> Fallible<bool> {
        expect_distance_type(d_in, &self.input_metric().distance_type())?;
        self.output_measure.check_distance(d_out)?;
        self.privacy_map.holds(d_in, d_out)
    }

    /// [`Measurement::check`] over native distances.
    pub fn check_typed<QI: Carrier, QO: Carrier>(&self, d_in: QI, d_out: QO) -> Fallible<bool> {
        self.check(&d_in.into_value(), &d_out.into_value())
    }

    pub fn input_space(&self) -> &MetricSpace {
        &self.input_space
    }

    pub fn input_domain(&self) -> &Domain {
        self.input_space.domain()
    }

    pub fn input_metric(&self) -> &Metric {
        self.input_space.metric()
    }

    pub fn output_measure(&self) -> PrivacyMeasure {
        self.output_measure
    }

    pub fn output_type(&self) -> &RuntimeType {
        self.function.output_type()
    }

    pub fn function(&self) -> &Function {
        &self.function
    }

    pub fn privacy_map(&self) -> &Relation {
        &self.privacy_map
    }
}

impl fmt::Debug for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Measurement")
            .field("input_space", &self.input_space.to_string())
            .field("output_measure", &self.output_measure)
            .field("output_type", self.output_type())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpg_core::{DpgError, ScalarKind};

    fn constant_release(eps: f64) -> Fallible<Measurement> {
        Measurement::new(
            MetricSpace::new(Domain::atom(ScalarKind::I32), Metric::AbsoluteDistance(ScalarKind::I32))?,
            PrivacyMeasure::MaxDivergence,
            Function::new_typed(|_: &i32| Ok(0i32)),
            Relation::new_typed(move |d: &i32| Ok(f64::from(*d) * eps)),
        )
    }

    #[test]
    fn test_check_and_map() {
        let m = constant_release(0.5).unwrap();
        assert_eq!(m.map(&Value::I32(2)).unwrap(), Value::F64(1.0));
        assert!(m.check_typed(2i32, 1.0f64).unwrap());
        assert!(!m.check_typed(2i32, 0.9f64).unwrap());
        assert_eq!(m.invoke_typed::<i32, i32>(7).unwrap(), 0);
    }

    #[test]
    fn test_check_rejects_bad_budget() {
        let m = constant_release(0.5).unwrap();
        assert!(matches!(
            m.check(&Value::I32(1), &Value::U32(1)),
            Err(DpgError::TypeMismatch { .. })
        ));
        assert!(matches!(
            m.check(&Value::I32(1), &Value::F64(-1.0)),
            Err(DpgError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_relation_must_match_measure() {
        let err = Measurement::new(
            MetricSpace::new(Domain::atom(ScalarKind::I32), Metric::AbsoluteDistance(ScalarKind::I32))
                .unwrap(),
            PrivacyMeasure::FixedSmoothedMaxDivergence,
            Function::new_typed(|_: &i32| Ok(0i32)),
            Relation::new_typed(|d: &i32| Ok(f64::from(*d))),
        )
        .unwrap_err();
        assert!(matches!(err, DpgError::RelationViolation(_)));
    }
}
