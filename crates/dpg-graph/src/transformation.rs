//! # Transformations
//!
//! A `Transformation` is a deterministic, stable map between metric spaces:
//! an input space, an output space, the function between their carriers,
//! and a stability relation between input and output distances.
//!
//! ## Security Invariant
//!
//! Construction validates everything that `check` later relies on:
//!
//! - the function's input and output types are the domains' carrier types
//!   (`TypeMismatch`);
//! - the relation's distance types are the metrics' distance types and the
//!   relation passes its monotonicity sanity check (`RelationViolation`).
//!
//! A `Transformation` is immutable after construction. Clones share the
//! function and relation through `Arc`.

use std::fmt;

use dpg_core::{Carrier, Domain, DpgError, Fallible, Metric, MetricSpace, RuntimeType, Value};

use crate::function::Function;
use crate::relation::{expect_distance_type, Relation};

/// A stable map between two metric spaces.
#[derive(Clone)]
pub struct Transformation {
    input_space: MetricSpace,
    output_space: MetricSpace,
    function: Function,
    stability_map: Relation,
}

impl Transformation {
    /// Validate and assemble a transformation.
    pub fn new(
        input_space: MetricSpace,
        output_space: MetricSpace,
        function: Function,
        stability_map: Relation,
    ) -> Fallible<Self> {
        RuntimeType::assert_is_similar(&input_space.domain().carrier_type(), function.input_type())?;
        RuntimeType::assert_is_similar(
            &output_space.domain().carrier_type(),
            function.output_type(),
        )?;
        check_relation_types(
            &stability_map,
            &input_space.metric().distance_type(),
            &output_space.metric().distance_type(),
        )?;
        stability_map.sanity_check()?;
        Ok(Self {
            input_space,
            output_space,
            function,
            stability_map,
        })
    }

    /// Run the function on `arg`.
    ///
    /// # Errors
    ///
    /// `InvocationFailure` if `arg` is not a member of the input domain or
    /// the function fails.
    pub fn invoke(&self, arg: &Value) -> Fallible<Value> {
        check_member(self.input_domain(), arg)?;
        self.function.eval(arg).map_err(into_invocation_failure)
    }

    /// [`Transformation::invoke`] over native carriers.
    pub fn invoke_typed<I: Carrier, O: Carrier>(&self, arg: I) -> Fallible<O> {
        O::from_value(&self.invoke(&arg.into_value())?)
    }

    /// The tightest output distance for inputs within `d_in`.
    pub fn map(&self, d_in: &Value) -> Fallible<Value> {
        self.stability_map.bound(d_in)
    }

    /// Whether inputs within `d_in` always yield outputs within `d_out`.
    ///
    /// Pure: evaluates the relation only.
    pub fn check(&self, d_in: &Value, d_out: &Value) -> Fallible<bool> {
        expect_distance_type(d_in, &self.input_metric().distance_type())?;
        expect_distance_type(d_out, &self.output_metric().distance_type())?;
        self.stability_map.holds(d_in, d_out)
    }

    /// [`Transformation::check`] over native distances.
    pub fn check_typed<QI: Carrier, QO: Carrier>(&self, d_in: QI, d_out: QO) -> Fallible<bool> {
        self.check(&d_in.into_value(), &d_out.into_value())
    }

    pub fn input_space(&self) -> &MetricSpace {
        &self.input_space
    }

    pub fn output_space(&self) -> &MetricSpace {
        &self.output_space
    }

    pub fn input_domain(&self) -> &Domain {
        self.input_space.domain()
    }

    pub fn output_domain(&self) -> &Domain {
        self.output_space.domain()
    }

    pub fn input_metric(&self) -> &Metric {
        self.input_space.metric()
    }

    pub fn output_metric(&self) -> &Metric {
        self.output_space.metric()
    }

    pub fn output_type(&self) -> &RuntimeType {
        self.function.output_type()
    }

    pub fn function(&self) -> &Function {
        &self.function
    }

    pub fn stability_map(&self) -> &Relation {
        &self.stability_map
    }
}

impl fmt::Debug for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformation")
            .field("input_space", &self.input_space.to_string())
            .field("output_space", &self.output_space.to_string())
            .finish_non_exhaustive()
    }
}

/// Fail with `RelationViolation` unless the relation's declared distance
/// types are the ones required by the surrounding spaces or measure.
pub(crate) fn check_relation_types(
    relation: &Relation,
    input_distance: &RuntimeType,
    output_distance: &RuntimeType,
) -> Fallible<()> {
    let violation = |side: &str, expected: &RuntimeType, found: &RuntimeType| {
        DpgError::RelationViolation(format!(
            "relation {side} distance type {found} does not match {expected}"
        ))
    };
    RuntimeType::assert_is_similar(input_distance, relation.input_distance())
        .map_err(|_| violation("input", input_distance, relation.input_distance()))?;
    RuntimeType::assert_is_similar(output_distance, relation.output_distance())
        .map_err(|_| violation("output", output_distance, relation.output_distance()))
}

pub(crate) fn check_member(domain: &Domain, arg: &Value) -> Fallible<()> {
    match domain.member(arg) {
        Ok(true) => Ok(()),
        Ok(false) => Err(DpgError::InvocationFailure(format!(
            "input is not a member of {domain}"
        ))),
        Err(e) => Err(DpgError::InvocationFailure(e.to_string())),
    }
}

pub(crate) fn into_invocation_failure(e: DpgError) -> DpgError {
    match e {
        DpgError::InvocationFailure(_) => e,
        other => DpgError::InvocationFailure(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpg_core::ScalarKind;

    fn vec_space() -> MetricSpace {
        MetricSpace::new(
            Domain::vector(Domain::atom(ScalarKind::I32)),
            Metric::SymmetricDistance,
        )
        .unwrap()
    }

    fn count_space() -> MetricSpace {
        MetricSpace::new(Domain::atom(ScalarKind::U32), Metric::AbsoluteDistance(ScalarKind::U32))
            .unwrap()
    }

    fn count() -> Fallible<Transformation> {
        Transformation::new(
            vec_space(),
            count_space(),
            Function::new_typed(|x: &Vec<i32>| Ok(x.len() as u32)),
            Relation::new_typed(|d: &u32| Ok(*d)),
        )
    }

    #[test]
    fn test_invoke_and_check() {
        let t = count().unwrap();
        assert_eq!(t.invoke_typed::<Vec<i32>, u32>(vec![1, 2, 3]).unwrap(), 3);
        assert!(t.check_typed(1u32, 1u32).unwrap());
        assert!(!t.check_typed(2u32, 1u32).unwrap());
        assert_eq!(t.map(&Value::U32(4)).unwrap(), Value::U32(4));
    }

    #[test]
    fn test_invoke_outside_domain() {
        let t = count().unwrap();
        assert!(matches!(
            t.invoke(&Value::Vec(vec![Value::F64(1.0)])),
            Err(DpgError::InvocationFailure(_))
        ));
    }

    #[test]
    fn test_check_distance_types() {
        let t = count().unwrap();
        assert!(matches!(
            t.check(&Value::F64(1.0), &Value::U32(1)),
            Err(DpgError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_construction_rejects_wrong_function_type() {
        let err = Transformation::new(
            vec_space(),
            count_space(),
            Function::new_typed(|x: &Vec<f64>| Ok(x.len() as u32)),
            Relation::new_typed(|d: &u32| Ok(*d)),
        )
        .unwrap_err();
        assert!(matches!(err, DpgError::TypeMismatch { .. }));
    }

    #[test]
    fn test_construction_rejects_wrong_relation_type() {
        let err = Transformation::new(
            vec_space(),
            count_space(),
            Function::new_typed(|x: &Vec<i32>| Ok(x.len() as u32)),
            Relation::new_typed(|d: &u32| Ok(f64::from(*d))),
        )
        .unwrap_err();
        assert!(matches!(err, DpgError::RelationViolation(_)));
    }

    #[test]
    fn test_construction_rejects_non_monotone_relation() {
        let err = Transformation::new(
            vec_space(),
            count_space(),
            Function::new_typed(|x: &Vec<i32>| Ok(x.len() as u32)),
            Relation::new_typed(|d: &u32| Ok(10u32.saturating_sub(*d))),
        )
        .unwrap_err();
        assert!(matches!(err, DpgError::RelationViolation(_)));
    }

    #[test]
    fn test_send_sync_clone() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Transformation>();
        let t = count().unwrap();
        let shared = t.clone();
        let handle = std::thread::spawn(move || shared.invoke_typed::<Vec<i32>, u32>(vec![1]));
        assert_eq!(handle.join().unwrap().unwrap(), 1);
        assert_eq!(t.invoke_typed::<Vec<i32>, u32>(vec![]).unwrap(), 0);
    }
}
