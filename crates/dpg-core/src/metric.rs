//! # Metrics and Metric Spaces
//!
//! A `Metric` is a distance between two members of a domain. Dataset
//! metrics count differing records and have distance type `u32`; numeric
//! metrics measure the magnitude of change in a value and have distance type
//! `Q`, the metric's type argument.
//!
//! ## Security Invariant
//!
//! A metric only ever appears inside a [`MetricSpace`], and
//! `MetricSpace::new` is the only constructor. An incompatible pairing
//! (e.g. `AbsoluteDistance` over a vector, `L1Distance` over a NaN-admitting
//! atom, `SubstitutionDistance` over an unsized vector) is rejected before
//! any stage can be built on it.

use std::fmt;

use crate::domain::Domain;
use crate::error::{DpgError, Fallible};
use crate::kind::ScalarKind;
use crate::ty::RuntimeType;

/// A distance between members of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Size of the symmetric difference of two multisets.
    SymmetricDistance,
    /// Number of insertions and deletions between two ordered datasets.
    InsertDeleteDistance,
    /// Number of substituted records between two equal-length datasets.
    SubstitutionDistance,
    /// Number of positions at which two equal-length datasets differ.
    HammingDistance,
    /// 0 when equal, 1 otherwise.
    DiscreteDistance,
    /// `|x - x'|` over a scalar.
    AbsoluteDistance(ScalarKind),
    /// `Σ|x_i - x'_i|` over a vector or map of scalars.
    L1Distance(ScalarKind),
    /// `sqrt(Σ(x_i - x'_i)²)` over a vector or map of scalars.
    L2Distance(ScalarKind),
}

impl Metric {
    /// Whether distances count records (`u32`).
    pub fn is_dataset_metric(&self) -> bool {
        match self {
            Self::SymmetricDistance
            | Self::InsertDeleteDistance
            | Self::SubstitutionDistance
            | Self::HammingDistance
            | Self::DiscreteDistance => true,
            Self::AbsoluteDistance(_) | Self::L1Distance(_) | Self::L2Distance(_) => false,
        }
    }

    /// The runtime type of distances under this metric.
    pub fn distance_type(&self) -> RuntimeType {
        match self {
            Self::SymmetricDistance
            | Self::InsertDeleteDistance
            | Self::SubstitutionDistance
            | Self::HammingDistance
            | Self::DiscreteDistance => RuntimeType::Scalar(ScalarKind::U32),
            Self::AbsoluteDistance(q) | Self::L1Distance(q) | Self::L2Distance(q) => {
                RuntimeType::Scalar(*q)
            }
        }
    }

    /// The runtime type of the metric itself, e.g. `AbsoluteDistance<f64>`.
    pub fn descriptor(&self) -> RuntimeType {
        match self {
            Self::SymmetricDistance => RuntimeType::name("SymmetricDistance"),
            Self::InsertDeleteDistance => RuntimeType::name("InsertDeleteDistance"),
            Self::SubstitutionDistance => RuntimeType::name("SubstitutionDistance"),
            Self::HammingDistance => RuntimeType::name("HammingDistance"),
            Self::DiscreteDistance => RuntimeType::name("DiscreteDistance"),
            Self::AbsoluteDistance(q) => RuntimeType::nest("AbsoluteDistance", vec![(*q).into()]),
            Self::L1Distance(q) => RuntimeType::nest("L1Distance", vec![(*q).into()]),
            Self::L2Distance(q) => RuntimeType::nest("L2Distance", vec![(*q).into()]),
        }
    }

    /// Recover a metric from its descriptor.
    pub fn from_descriptor(ty: &RuntimeType) -> Fallible<Self> {
        let numeric = |q: &RuntimeType| match q.as_scalar() {
            Some(kind) if kind.is_numeric() => Ok(kind),
            _ => Err(DpgError::InvalidArgument(format!(
                "metric distance type must be numeric, found {q}"
            ))),
        };
        match ty {
            RuntimeType::Name(name) => match name.as_str() {
                "SymmetricDistance" => Ok(Self::SymmetricDistance),
                "InsertDeleteDistance" => Ok(Self::InsertDeleteDistance),
                "SubstitutionDistance" => Ok(Self::SubstitutionDistance),
                "HammingDistance" => Ok(Self::HammingDistance),
                "DiscreteDistance" => Ok(Self::DiscreteDistance),
                _ => Err(DpgError::UnknownType(format!("{ty} is not a metric"))),
            },
            RuntimeType::Nest { origin, args } if args.len() == 1 => match origin.as_str() {
                "AbsoluteDistance" => Ok(Self::AbsoluteDistance(numeric(&args[0])?)),
                "L1Distance" => Ok(Self::L1Distance(numeric(&args[0])?)),
                "L2Distance" => Ok(Self::L2Distance(numeric(&args[0])?)),
                _ => Err(DpgError::UnknownType(format!("{ty} is not a metric"))),
            },
            _ => Err(DpgError::UnknownType(format!("{ty} is not a metric"))),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor())
    }
}

/// A domain paired with a metric that is well-defined on it.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSpace {
    domain: Domain,
    metric: Metric,
}

impl MetricSpace {
    /// Pair `domain` with `metric`.
    ///
    /// # Errors
    ///
    /// `DpgError::MetricSpace` when the metric is undefined on the domain.
    pub fn new(domain: Domain, metric: Metric) -> Fallible<Self> {
        check_compatible(&domain, &metric)?;
        Ok(Self { domain, metric })
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    pub fn into_parts(self) -> (Domain, Metric) {
        (self.domain, self.metric)
    }
}

impl fmt::Display for MetricSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.domain, self.metric)
    }
}

fn incompatible(domain: &Domain, metric: &Metric, reason: &str) -> DpgError {
    DpgError::MetricSpace(format!("{metric} is not defined on {domain}: {reason}"))
}

fn check_compatible(domain: &Domain, metric: &Metric) -> Fallible<()> {
    match metric {
        Metric::SymmetricDistance | Metric::InsertDeleteDistance => match domain {
            Domain::Vector { .. } | Domain::DataFrame { .. } => Ok(()),
            _ => Err(incompatible(domain, metric, "expected a vector or data frame domain")),
        },
        Metric::SubstitutionDistance | Metric::HammingDistance => match domain {
            Domain::Vector { size: Some(_), .. } => Ok(()),
            Domain::Vector { size: None, .. } => Err(incompatible(
                domain,
                metric,
                "the vector domain must have a known size",
            )),
            _ => Err(incompatible(domain, metric, "expected a sized vector domain")),
        },
        Metric::DiscreteDistance => Ok(()),
        Metric::AbsoluteDistance(q) => check_numeric_scalar(domain, metric, *q),
        Metric::L1Distance(q) | Metric::L2Distance(q) => match domain {
            Domain::Vector { element, .. } => check_numeric_scalar(element, metric, *q),
            Domain::Map { value, .. } => check_numeric_scalar(value, metric, *q),
            _ => Err(incompatible(domain, metric, "expected a vector or map domain")),
        },
    }
}

fn check_numeric_scalar(domain: &Domain, metric: &Metric, q: ScalarKind) -> Fallible<()> {
    if !q.is_numeric() {
        return Err(incompatible(domain, metric, "the distance type must be numeric"));
    }
    match domain.scalar_kind() {
        Some(kind) if kind != q => Err(incompatible(
            domain,
            metric,
            &format!("the distance type {q} differs from the element type {kind}"),
        )),
        Some(_) if domain.is_numeric_non_nan() => Ok(()),
        Some(_) => Err(incompatible(domain, metric, "elements must be numeric and never NaN")),
        None => Err(incompatible(domain, metric, "expected a scalar domain")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_atom() -> Domain {
        Domain::atom(ScalarKind::F64)
    }

    #[test]
    fn test_dataset_metrics() {
        let v = Domain::vector(f64_atom());
        assert!(MetricSpace::new(v.clone(), Metric::SymmetricDistance).is_ok());
        assert!(MetricSpace::new(v.clone(), Metric::InsertDeleteDistance).is_ok());
        assert!(matches!(
            MetricSpace::new(v, Metric::SubstitutionDistance),
            Err(DpgError::MetricSpace(_))
        ));
        let sized = Domain::sized_vector(f64_atom(), 10);
        assert!(MetricSpace::new(sized, Metric::SubstitutionDistance).is_ok());
        assert!(MetricSpace::new(f64_atom(), Metric::SymmetricDistance).is_err());
    }

    #[test]
    fn test_absolute_distance() {
        assert!(MetricSpace::new(f64_atom(), Metric::AbsoluteDistance(ScalarKind::F64)).is_ok());
        assert!(MetricSpace::new(f64_atom(), Metric::AbsoluteDistance(ScalarKind::F32)).is_err());
        let nan = Domain::atom_with_nan(ScalarKind::F64).unwrap();
        assert!(MetricSpace::new(nan, Metric::AbsoluteDistance(ScalarKind::F64)).is_err());
        let s = Domain::atom(ScalarKind::String);
        assert!(MetricSpace::new(s, Metric::AbsoluteDistance(ScalarKind::String)).is_err());
    }

    #[test]
    fn test_lp_distance() {
        let v = Domain::vector(f64_atom());
        assert!(MetricSpace::new(v, Metric::L1Distance(ScalarKind::F64)).is_ok());
        let nan = Domain::vector(Domain::atom_with_nan(ScalarKind::F64).unwrap());
        assert!(MetricSpace::new(nan, Metric::L2Distance(ScalarKind::F64)).is_err());
        assert!(MetricSpace::new(f64_atom(), Metric::L1Distance(ScalarKind::F64)).is_err());
    }

    #[test]
    fn test_distance_types() {
        assert_eq!(Metric::SymmetricDistance.distance_type().to_string(), "u32");
        assert_eq!(Metric::L1Distance(ScalarKind::I64).distance_type().to_string(), "i64");
    }

    #[test]
    fn test_descriptor_roundtrip() {
        for metric in [
            Metric::SymmetricDistance,
            Metric::HammingDistance,
            Metric::AbsoluteDistance(ScalarKind::F64),
            Metric::L2Distance(ScalarKind::F32),
        ] {
            let parsed = RuntimeType::parse(&metric.to_string()).unwrap();
            assert_eq!(Metric::from_descriptor(&parsed).unwrap(), metric);
        }
        assert!(Metric::from_descriptor(&RuntimeType::parse("MaxDivergence").unwrap()).is_err());
    }
}
