//! # Stability and Privacy Relations
//!
//! A relation is a predicate `(d_in, d_out) -> bool` stating that inputs
//! within distance `d_in` produce outputs within distance (or privacy loss)
//! `d_out`. Every relation here is represented by its tightest bound
//! `d_in -> d_out`; the predicate is `bound(d_in) <= d_out`, componentwise
//! for tuple-valued distances.
//!
//! ## Security Invariant
//!
//! Relations must be monotone: a larger `d_in` never has a smaller bound,
//! and a larger `d_out` never turns `true` into `false`. Representing the
//! relation by its bound makes the second half structural. The first half
//! is checked at sample points by [`Relation::sanity_check`] whenever a
//! `Transformation` or `Measurement` is built.
//!
//! A bound function that cannot certify `d_in` at all (for example a
//! sequential composition whose per-stage budgets are exceeded) returns
//! `RelationViolation`, which `holds` reports as `false`.

use std::fmt;
use std::sync::Arc;

use dpg_core::{Carrier, DpgError, Fallible, RuntimeType, ScalarKind, Value};

type BoundFn = dyn Fn(&Value) -> Fallible<Value> + Send + Sync;

/// A monotone relation between input and output distances.
#[derive(Clone)]
pub struct Relation {
    input_distance: RuntimeType,
    output_distance: RuntimeType,
    bound: Arc<BoundFn>,
}

impl Relation {
    /// Wrap a dynamic bound function.
    pub fn new(
        input_distance: RuntimeType,
        output_distance: RuntimeType,
        bound: impl Fn(&Value) -> Fallible<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            input_distance,
            output_distance,
            bound: Arc::new(bound),
        }
    }

    /// Wrap a native bound function over distance types `QI -> QO`.
    pub fn new_typed<QI: Carrier, QO: Carrier>(
        bound: impl Fn(&QI) -> Fallible<QO> + Send + Sync + 'static,
    ) -> Self {
        Self::new(QI::runtime_type(), QO::runtime_type(), move |d_in| {
            bound(&QI::from_value(d_in)?).map(Carrier::into_value)
        })
    }

    /// The tightest `d_out` for which the relation holds at `d_in`.
    ///
    /// # Errors
    ///
    /// - `TypeMismatch` if `d_in` is not of the input distance type.
    /// - `InvalidArgument` if `d_in` is negative or NaN.
    /// - `RelationViolation` if no `d_out` satisfies the relation.
    pub fn bound(&self, d_in: &Value) -> Fallible<Value> {
        expect_distance(d_in, &self.input_distance)?;
        let d_out = (self.bound)(d_in)?;
        expect_distance_type(&d_out, &self.output_distance)?;
        Ok(d_out)
    }

    /// Evaluate the predicate.
    pub fn holds(&self, d_in: &Value, d_out: &Value) -> Fallible<bool> {
        expect_distance(d_out, &self.output_distance)?;
        match self.bound(d_in) {
            Ok(tightest) => tightest.order_le(d_out),
            Err(DpgError::RelationViolation(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Check monotonicity and the output type at fixed sample points.
    ///
    /// Sample points at which the bound itself fails are skipped; the
    /// relation is only required to be monotone where it is defined.
    pub fn sanity_check(&self) -> Fallible<()> {
        let mut previous: Option<(Value, Value)> = None;
        for d_in in sample_distances(&self.input_distance) {
            let d_out = match (self.bound)(&d_in) {
                Ok(d_out) => d_out,
                Err(_) => continue,
            };
            if expect_distance_type(&d_out, &self.output_distance).is_err() {
                return Err(DpgError::RelationViolation(format!(
                    "bound({d_in}) = {d_out} is not of the declared output distance type {}",
                    self.output_distance
                )));
            }
            if let Some((prev_in, prev_out)) = &previous {
                if !prev_out.order_le(&d_out).unwrap_or(false) {
                    return Err(DpgError::RelationViolation(format!(
                        "relation is not monotone: bound({prev_in}) = {prev_out} exceeds bound({d_in}) = {d_out}"
                    )));
                }
            }
            previous = Some((d_in, d_out));
        }
        Ok(())
    }

    /// The relation of `outer ∘ inner`: `outer.bound(inner.bound(d_in))`.
    pub fn make_chain(outer: &Relation, inner: &Relation) -> Relation {
        let (r0, r1) = (inner.clone(), outer.clone());
        Self::new(
            inner.input_distance.clone(),
            outer.output_distance.clone(),
            move |d_in| r1.bound(&r0.bound(d_in)?),
        )
    }

    pub fn input_distance(&self) -> &RuntimeType {
        &self.input_distance
    }

    pub fn output_distance(&self) -> &RuntimeType {
        &self.output_distance
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("input_distance", &self.input_distance)
            .field("output_distance", &self.output_distance)
            .finish_non_exhaustive()
    }
}

/// Fail with `TypeMismatch` unless `d` has runtime type `ty`.
pub(crate) fn expect_distance_type(d: &Value, ty: &RuntimeType) -> Fallible<()> {
    let found = RuntimeType::infer(d)
        .map_err(|_| DpgError::type_mismatch(ty, d.type_name()))?;
    RuntimeType::assert_is_similar(ty, &found)
}

/// Like [`expect_distance_type`], additionally rejecting negative and NaN
/// components.
pub(crate) fn expect_distance(d: &Value, ty: &RuntimeType) -> Fallible<()> {
    expect_distance_type(d, ty)?;
    let negative = match d {
        Value::Tuple(items) => items.iter().any(is_negative_or_nan),
        other => is_negative_or_nan(other),
    };
    if negative {
        return Err(DpgError::InvalidArgument(format!(
            "distances must be non-negative, found {d}"
        )));
    }
    Ok(())
}

fn is_negative_or_nan(d: &Value) -> bool {
    d.as_f64().is_some_and(|x| x.is_nan() || x < 0.0)
}

/// Representative distances used by the sanity check, in increasing order.
fn sample_distances(ty: &RuntimeType) -> Vec<Value> {
    let Some(kind) = ty.as_scalar() else {
        return Vec::new();
    };
    match kind {
        ScalarKind::U32 => [0u32, 1, 2, 5, 10].map(Value::U32).to_vec(),
        ScalarKind::U64 => [0u64, 1, 2, 5, 10].map(Value::U64).to_vec(),
        ScalarKind::Usize => [0usize, 1, 2, 5, 10].map(Value::Usize).to_vec(),
        ScalarKind::I32 => [0i32, 1, 2, 5, 10].map(Value::I32).to_vec(),
        ScalarKind::I64 => [0i64, 1, 2, 5, 10].map(Value::I64).to_vec(),
        ScalarKind::F32 => [0.0f32, 0.5, 1.0, 2.0, 10.0].map(Value::F32).to_vec(),
        ScalarKind::F64 => [0.0f64, 0.5, 1.0, 2.0, 10.0].map(Value::F64).to_vec(),
        ScalarKind::Bool | ScalarKind::String => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(c: f64) -> Relation {
        Relation::new_typed(move |d: &u32| Ok(f64::from(*d) * c))
    }

    #[test]
    fn test_bound_and_holds() {
        let r = linear(2.0);
        assert_eq!(r.bound(&Value::U32(3)).unwrap(), Value::F64(6.0));
        assert!(r.holds(&Value::U32(3), &Value::F64(6.0)).unwrap());
        assert!(!r.holds(&Value::U32(3), &Value::F64(5.9)).unwrap());
    }

    #[test]
    fn test_type_checked() {
        let r = linear(2.0);
        assert!(matches!(
            r.holds(&Value::F64(3.0), &Value::F64(6.0)),
            Err(DpgError::TypeMismatch { .. })
        ));
        assert!(matches!(
            r.holds(&Value::U32(3), &Value::U32(6)),
            Err(DpgError::TypeMismatch { .. })
        ));
        assert!(matches!(
            r.holds(&Value::U32(3), &Value::F64(-1.0)),
            Err(DpgError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_violation_is_false() {
        let r = Relation::new_typed(|d: &u32| {
            if *d > 1 {
                Err(DpgError::RelationViolation("budget exceeded".into()))
            } else {
                Ok(1.0f64)
            }
        });
        assert!(r.holds(&Value::U32(1), &Value::F64(1.0)).unwrap());
        assert!(!r.holds(&Value::U32(2), &Value::F64(100.0)).unwrap());
        assert!(r.sanity_check().is_ok());
    }

    #[test]
    fn test_sanity_check_rejects_non_monotone() {
        let r = Relation::new_typed(|d: &u32| Ok(10.0 - f64::from(*d)));
        assert!(matches!(r.sanity_check(), Err(DpgError::RelationViolation(_))));
        assert!(linear(1.0).sanity_check().is_ok());
    }

    #[test]
    fn test_sanity_check_rejects_wrong_output_type() {
        let r = Relation::new(
            RuntimeType::Scalar(ScalarKind::U32),
            RuntimeType::Scalar(ScalarKind::F64),
            |d| Ok(d.clone()),
        );
        assert!(matches!(r.sanity_check(), Err(DpgError::RelationViolation(_))));
    }

    #[test]
    fn test_chain() {
        let r = Relation::make_chain(
            &Relation::new_typed(|d: &f64| Ok(d / 10.0)),
            &linear(100.0),
        );
        assert_eq!(r.bound(&Value::U32(1)).unwrap(), Value::F64(10.0));
        assert_eq!(r.input_distance().to_string(), "u32");
        assert_eq!(r.output_distance().to_string(), "f64");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// For a monotone bound, `holds` is monotone in both arguments.
        #[test]
        fn holds_is_monotone(c in 0.0f64..100.0, a in 0u32..1000, b in 0u32..1000, x in 0.0f64..1e5, y in 0.0f64..1e5) {
            let r = Relation::new_typed(move |d: &u32| Ok(dpg_core::arith::inf_mul(f64::from(*d), c)));
            let (d1, d2) = (a.min(b), a.max(b));
            let (o1, o2) = (x.min(y), x.max(y));
            // larger d_in: true may become false, never the reverse
            if r.holds(&Value::U32(d2), &Value::F64(o1)).unwrap() {
                prop_assert!(r.holds(&Value::U32(d1), &Value::F64(o1)).unwrap());
            }
            // larger d_out: false may become true, never the reverse
            if r.holds(&Value::U32(d1), &Value::F64(o1)).unwrap() {
                prop_assert!(r.holds(&Value::U32(d1), &Value::F64(o2)).unwrap());
            }
        }
    }
}
