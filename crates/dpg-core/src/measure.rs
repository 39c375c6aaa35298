//! # Privacy Measures and Composition Rules
//!
//! A `PrivacyMeasure` is the quantity in which a measurement's privacy loss
//! is expressed:
//!
//! | Measure | Distance | Meaning |
//! |---|---|---|
//! | `MaxDivergence` | `f64` | pure ε-DP |
//! | `FixedSmoothedMaxDivergence` | `(f64, f64)` | approximate (ε, δ)-DP |
//! | `ZeroConcentratedDivergence` | `f64` | ρ-zCDP |
//!
//! ## Composition
//!
//! How privacy losses add up under composition depends on the measure.
//! [`CompositionRule`] is the seam: every measure has a default rule
//! ([`BasicComposition`]), and callers may plug in a tighter one such as
//! [`AdvancedComposition`] for (ε, δ).
//!
//! ## Security Invariant
//!
//! Every rule rounds toward +∞. A composed bound is never smaller than the
//! exact real-valued result of the rule.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::arith::{inf_add, inf_exp_m1, inf_mul, inf_sqrt, neg_inf_ln};
use crate::error::{DpgError, Fallible};
use crate::kind::ScalarKind;
use crate::ty::RuntimeType;
use crate::value::Value;

/// The quantity in which privacy loss is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrivacyMeasure {
    /// Pure differential privacy, ε.
    MaxDivergence,
    /// Approximate differential privacy, (ε, δ).
    FixedSmoothedMaxDivergence,
    /// Zero-concentrated differential privacy, ρ.
    ZeroConcentratedDivergence,
}

impl PrivacyMeasure {
    /// Returns all measures.
    pub fn all() -> &'static [PrivacyMeasure] {
        &[
            Self::MaxDivergence,
            Self::FixedSmoothedMaxDivergence,
            Self::ZeroConcentratedDivergence,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxDivergence => "MaxDivergence",
            Self::FixedSmoothedMaxDivergence => "FixedSmoothedMaxDivergence",
            Self::ZeroConcentratedDivergence => "ZeroConcentratedDivergence",
        }
    }

    /// The runtime type of privacy-loss values under this measure.
    pub fn distance_type(&self) -> RuntimeType {
        let f64_type = RuntimeType::Scalar(ScalarKind::F64);
        match self {
            Self::MaxDivergence | Self::ZeroConcentratedDivergence => f64_type,
            Self::FixedSmoothedMaxDivergence => RuntimeType::Tuple(vec![f64_type.clone(), f64_type]),
        }
    }

    /// The runtime type of the measure itself.
    pub fn descriptor(&self) -> RuntimeType {
        RuntimeType::name(self.as_str())
    }

    /// The privacy loss of a mechanism that reveals nothing.
    pub fn zero(&self) -> Value {
        match self {
            Self::MaxDivergence | Self::ZeroConcentratedDivergence => Value::F64(0.0),
            Self::FixedSmoothedMaxDivergence => Value::Tuple(vec![Value::F64(0.0), Value::F64(0.0)]),
        }
    }

    /// The rule used by basic composition when none is given.
    pub fn default_rule(&self) -> Arc<dyn CompositionRule> {
        Arc::new(BasicComposition)
    }

    /// Decode a distance under this measure, validating its shape and sign.
    pub fn check_distance(&self, d: &Value) -> Fallible<()> {
        let components: Vec<f64> = match (self, d) {
            (Self::MaxDivergence | Self::ZeroConcentratedDivergence, Value::F64(x)) => vec![*x],
            (Self::FixedSmoothedMaxDivergence, Value::Tuple(items)) if items.len() == 2 => {
                match (&items[0], &items[1]) {
                    (Value::F64(e), Value::F64(d)) => {
                        if *d > 1.0 {
                            return Err(DpgError::InvalidArgument(format!(
                                "delta must be at most 1, found {d}"
                            )));
                        }
                        vec![*e, *d]
                    }
                    _ => return Err(DpgError::type_mismatch(self.distance_type(), d.type_name())),
                }
            }
            _ => return Err(DpgError::type_mismatch(self.distance_type(), d.type_name())),
        };
        if components.iter().any(|x| x.is_nan() || *x < 0.0) {
            return Err(DpgError::InvalidArgument(format!(
                "privacy loss must be non-negative, found {d}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for PrivacyMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyMeasure {
    type Err = DpgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| DpgError::UnknownType(format!("{s} is not a privacy measure")))
    }
}

/// How privacy losses of independently-run measurements combine.
pub trait CompositionRule: Send + Sync + fmt::Debug {
    /// Short name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Whether the rule is sound for `measure`.
    fn supports(&self, measure: PrivacyMeasure) -> bool;

    /// Combine per-measurement losses into one loss under `measure`.
    fn combine(&self, measure: PrivacyMeasure, losses: &[Value]) -> Fallible<Value>;
}

/// Linear composition: ε and ρ add; (ε, δ) add componentwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicComposition;

impl CompositionRule for BasicComposition {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn supports(&self, _measure: PrivacyMeasure) -> bool {
        true
    }

    fn combine(&self, measure: PrivacyMeasure, losses: &[Value]) -> Fallible<Value> {
        match measure {
            PrivacyMeasure::MaxDivergence | PrivacyMeasure::ZeroConcentratedDivergence => {
                let mut total = 0.0;
                for loss in losses {
                    total = inf_add(total, scalar_loss(measure, loss)?);
                }
                Ok(Value::F64(total))
            }
            PrivacyMeasure::FixedSmoothedMaxDivergence => {
                let (mut eps, mut delta) = (0.0, 0.0);
                for loss in losses {
                    let (e, d) = pair_loss(measure, loss)?;
                    eps = inf_add(eps, e);
                    delta = inf_add(delta, d);
                }
                Ok(Value::Tuple(vec![Value::F64(eps), Value::F64(delta.min(1.0))]))
            }
        }
    }
}

/// The advanced composition theorem for (ε, δ)-DP.
///
/// For `k` mechanisms each (ε_i, δ_i)-DP and slack δ', the composition is
/// (ε', Σδ_i + δ')-DP with `ε' = sqrt(2k ln(1/δ')) ε + k ε (e^ε - 1)` where
/// `ε = max ε_i`. When linear composition gives a smaller ε, that ε is used
/// with the same δ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvancedComposition {
    delta_slack: f64,
}

impl AdvancedComposition {
    /// # Errors
    ///
    /// `InvalidArgument` unless `0 < delta_slack < 1`.
    pub fn new(delta_slack: f64) -> Fallible<Self> {
        if !(delta_slack > 0.0 && delta_slack < 1.0) {
            return Err(DpgError::InvalidArgument(format!(
                "delta slack must be in (0, 1), found {delta_slack}"
            )));
        }
        Ok(Self { delta_slack })
    }

    pub fn delta_slack(&self) -> f64 {
        self.delta_slack
    }
}

impl CompositionRule for AdvancedComposition {
    fn name(&self) -> &'static str {
        "advanced"
    }

    fn supports(&self, measure: PrivacyMeasure) -> bool {
        measure == PrivacyMeasure::FixedSmoothedMaxDivergence
    }

    fn combine(&self, measure: PrivacyMeasure, losses: &[Value]) -> Fallible<Value> {
        if !self.supports(measure) {
            return Err(DpgError::InvalidArgument(format!(
                "advanced composition is not defined for {measure}"
            )));
        }
        let basic = BasicComposition.combine(measure, losses)?;
        let (basic_eps, basic_delta) = pair_loss(measure, &basic)?;

        let mut eps_max: f64 = 0.0;
        for loss in losses {
            eps_max = eps_max.max(pair_loss(measure, loss)?.0);
        }
        #[allow(clippy::cast_precision_loss)]
        let k = losses.len() as f64;
        // ln(1/δ') = -ln(δ'), rounded up
        let log_term = -neg_inf_ln(self.delta_slack);
        let first = inf_mul(inf_sqrt(inf_mul(inf_mul(2.0, k), log_term)), eps_max);
        let second = inf_mul(inf_mul(k, eps_max), inf_exp_m1(eps_max));
        let eps = inf_add(first, second);

        // (ε_basic, Σδ) implies (ε_basic, Σδ + δ')
        let delta = inf_add(basic_delta, self.delta_slack).min(1.0);
        Ok(Value::Tuple(vec![Value::F64(eps.min(basic_eps)), Value::F64(delta)]))
    }
}

fn scalar_loss(measure: PrivacyMeasure, loss: &Value) -> Fallible<f64> {
    measure.check_distance(loss)?;
    match loss {
        Value::F64(x) => Ok(*x),
        other => Err(DpgError::type_mismatch(measure.distance_type(), other.type_name())),
    }
}

fn pair_loss(measure: PrivacyMeasure, loss: &Value) -> Fallible<(f64, f64)> {
    measure.check_distance(loss)?;
    match loss {
        Value::Tuple(items) => match items.as_slice() {
            [Value::F64(e), Value::F64(d)] => Ok((*e, *d)),
            _ => Err(DpgError::type_mismatch(measure.distance_type(), loss.type_name())),
        },
        other => Err(DpgError::type_mismatch(measure.distance_type(), other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(e: f64, d: f64) -> Value {
        Value::Tuple(vec![Value::F64(e), Value::F64(d)])
    }

    #[test]
    fn test_measure_roundtrip() {
        for m in PrivacyMeasure::all() {
            assert_eq!(m.as_str().parse::<PrivacyMeasure>().unwrap(), *m);
            assert_eq!(RuntimeType::parse(m.as_str()).unwrap(), m.descriptor());
        }
    }

    #[test]
    fn test_distance_types_and_zero() {
        assert_eq!(
            PrivacyMeasure::FixedSmoothedMaxDivergence.distance_type().to_string(),
            "(f64, f64)"
        );
        assert_eq!(PrivacyMeasure::MaxDivergence.zero(), Value::F64(0.0));
        for m in PrivacyMeasure::all() {
            assert_eq!(RuntimeType::infer(&m.zero()).unwrap(), m.distance_type());
        }
    }

    #[test]
    fn test_check_distance() {
        let m = PrivacyMeasure::MaxDivergence;
        assert!(m.check_distance(&Value::F64(1.0)).is_ok());
        assert!(m.check_distance(&Value::F64(-1.0)).is_err());
        assert!(matches!(
            m.check_distance(&Value::U32(1)),
            Err(DpgError::TypeMismatch { .. })
        ));
        let m = PrivacyMeasure::FixedSmoothedMaxDivergence;
        assert!(m.check_distance(&pair(1.0, 1e-6)).is_ok());
        assert!(m.check_distance(&pair(1.0, 2.0)).is_err());
    }

    #[test]
    fn test_basic_composition_sums() {
        let rule = BasicComposition;
        let eps = rule
            .combine(PrivacyMeasure::MaxDivergence, &[Value::F64(1.0), Value::F64(0.5)])
            .unwrap();
        assert_eq!(eps, Value::F64(1.5));
        let ed = rule
            .combine(
                PrivacyMeasure::FixedSmoothedMaxDivergence,
                &[pair(1.0, 1e-6), pair(2.0, 1e-6)],
            )
            .unwrap();
        assert_eq!(ed, pair(3.0, 2e-6));
        assert_eq!(
            rule.combine(PrivacyMeasure::ZeroConcentratedDivergence, &[]).unwrap(),
            Value::F64(0.0)
        );
    }

    #[test]
    fn test_basic_composition_rounds_up() {
        let Value::F64(total) = BasicComposition
            .combine(PrivacyMeasure::MaxDivergence, &[Value::F64(0.1), Value::F64(0.2)])
            .unwrap()
        else {
            panic!("expected f64");
        };
        assert!(total >= 0.1 + 0.2);
    }

    #[test]
    fn test_advanced_composition() {
        assert!(AdvancedComposition::new(0.0).is_err());
        assert!(AdvancedComposition::new(1.0).is_err());
        let rule = AdvancedComposition::new(1e-6).unwrap();
        assert!(!rule.supports(PrivacyMeasure::MaxDivergence));
        assert!(rule.combine(PrivacyMeasure::MaxDivergence, &[Value::F64(1.0)]).is_err());

        // many small mechanisms: advanced beats linear
        let losses = vec![pair(0.01, 0.0); 1000];
        let Value::Tuple(items) = rule
            .combine(PrivacyMeasure::FixedSmoothedMaxDivergence, &losses)
            .unwrap()
        else {
            panic!("expected a tuple");
        };
        let (Value::F64(eps), Value::F64(delta)) = (&items[0], &items[1]) else {
            panic!("expected f64 components");
        };
        assert!(*eps < 10.0);
        assert!(*delta >= 1e-6);

        // one large mechanism: linear epsilon is smaller
        let single = rule
            .combine(PrivacyMeasure::FixedSmoothedMaxDivergence, &[pair(1.0, 0.0)])
            .unwrap();
        assert_eq!(single, pair(1.0, 1e-6));
    }
}
