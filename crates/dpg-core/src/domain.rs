//! # Domains — Sets of Legal Values
//!
//! A `Domain` describes the set of values a stage accepts or produces. Every
//! `Transformation` is typed by an input and an output domain and every
//! `Measurement` by an input domain; the chainer joins two stages only when
//! the domains between them are structurally equal.
//!
//! ## Security Invariant
//!
//! Domains are validated at construction and immutable afterwards.
//!
//! - An interval never accepts NaN and always has `lower <= upper`.
//! - An atom accepts NaN only when built with [`Domain::atom_with_nan`].
//! - Map keys are hashable primitives.
//!
//! Equality is structural (variant, kinds, bounds, size) and is the only
//! predicate the chainer uses.

use std::collections::BTreeMap;
use std::fmt;

use crate::arith::Number;
use crate::error::{DpgError, Fallible};
use crate::kind::ScalarKind;
use crate::ty::RuntimeType;
use crate::value::{Primitive, Value};

/// A set of legal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// Every value of a primitive kind, optionally including NaN.
    Atom {
        kind: ScalarKind,
        nan: bool,
    },
    /// Values of a numeric kind in the closed range `[lower, upper]`.
    Interval {
        kind: ScalarKind,
        lower: Value,
        upper: Value,
    },
    /// Vectors of members of `element`, optionally of a known length.
    Vector {
        element: Box<Domain>,
        size: Option<usize>,
    },
    /// A member of `element`, or a missing value.
    OptionNull { element: Box<Domain> },
    /// Maps with keys from `key` and values from `value`.
    Map {
        key: Box<Domain>,
        value: Box<Domain>,
    },
    /// Named columns, each a vector domain.
    DataFrame { columns: BTreeMap<String, Domain> },
}

impl Domain {
    /// All non-NaN values of `kind`.
    pub fn atom(kind: ScalarKind) -> Self {
        Self::Atom { kind, nan: false }
    }

    /// All values of a float `kind`, NaN included.
    pub fn atom_with_nan(kind: ScalarKind) -> Fallible<Self> {
        if !kind.is_float() {
            return Err(DpgError::InvalidArgument(format!(
                "only float atoms may contain NaN, found {kind}"
            )));
        }
        Ok(Self::Atom { kind, nan: true })
    }

    /// The closed interval `[lower, upper]` over `kind`.
    ///
    /// # Errors
    ///
    /// - `TypeMismatch` if either bound is not a `kind` value.
    /// - `InvalidArgument` if `kind` is not numeric, a bound is NaN, or
    ///   `lower > upper`.
    pub fn interval(kind: ScalarKind, lower: Value, upper: Value) -> Fallible<Self> {
        if !kind.is_numeric() {
            return Err(DpgError::InvalidArgument(format!(
                "interval bounds must be numeric, found {kind}"
            )));
        }
        for bound in [&lower, &upper] {
            if bound.kind() != Some(kind) {
                return Err(DpgError::type_mismatch(kind, bound.type_name()));
            }
            if bound.is_nan() {
                return Err(DpgError::InvalidArgument(
                    "interval bounds must not be NaN".into(),
                ));
            }
        }
        if !lower.order_le(&upper)? {
            return Err(DpgError::InvalidArgument(format!(
                "lower bound {lower} exceeds upper bound {upper}"
            )));
        }
        Ok(Self::Interval { kind, lower, upper })
    }

    /// Typed convenience for [`Domain::interval`].
    pub fn interval_of<T: Number>(lower: T, upper: T) -> Fallible<Self> {
        Self::interval(T::KIND, lower.into_value(), upper.into_value())
    }

    /// Vectors of any length.
    pub fn vector(element: Domain) -> Self {
        Self::Vector {
            element: Box::new(element),
            size: None,
        }
    }

    /// Vectors of exactly `size` elements.
    pub fn sized_vector(element: Domain, size: usize) -> Self {
        Self::Vector {
            element: Box::new(element),
            size: Some(size),
        }
    }

    /// Members of `element` or missing values.
    pub fn option(element: Domain) -> Self {
        Self::OptionNull {
            element: Box::new(element),
        }
    }

    /// Maps from `key` to `value`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` unless `key` is an atom or interval over a
    /// hashable kind.
    pub fn map(key: Domain, value: Domain) -> Fallible<Self> {
        match key.scalar_kind() {
            Some(kind) if kind.is_hashable() => Ok(Self::Map {
                key: Box::new(key),
                value: Box::new(value),
            }),
            _ => Err(DpgError::InvalidArgument(format!(
                "map keys must be a hashable primitive domain, found {key}"
            ))),
        }
    }

    /// A data frame with the given column domains.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if any column is not a vector domain.
    pub fn data_frame(columns: BTreeMap<String, Domain>) -> Fallible<Self> {
        if let Some((name, column)) = columns
            .iter()
            .find(|(_, c)| !matches!(c, Domain::Vector { .. }))
        {
            return Err(DpgError::InvalidArgument(format!(
                "column {name:?} must be a vector domain, found {column}"
            )));
        }
        Ok(Self::DataFrame { columns })
    }

    /// Test whether `value` is a member.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if `value` does not have this domain's carrier type.
    /// A well-typed value outside the domain yields `Ok(false)`.
    pub fn member(&self, value: &Value) -> Fallible<bool> {
        match (self, value) {
            (Self::Atom { kind, nan }, v) => {
                self.expect_kind(*kind, v)?;
                Ok(*nan || !v.is_nan())
            }
            (Self::Interval { kind, lower, upper }, v) => {
                self.expect_kind(*kind, v)?;
                if v.is_nan() {
                    return Ok(false);
                }
                Ok(lower.order_le(v)? && v.order_le(upper)?)
            }
            (Self::Vector { element, size }, Value::Vec(items)) => {
                if size.is_some_and(|n| n != items.len()) {
                    return Ok(false);
                }
                for item in items {
                    if !element.member(item)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Self::OptionNull { .. }, Value::Option(None)) => Ok(true),
            (Self::OptionNull { element }, Value::Option(Some(inner))) => element.member(inner),
            (Self::Map { key, value }, Value::Map(pairs)) => {
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if !key.member(k)? || !value.member(v)? {
                        return Ok(false);
                    }
                    if pairs[..i].iter().any(|(prev, _)| prev == k) {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Self::DataFrame { columns }, Value::DataFrame(data)) => {
                if data.len() != columns.len() {
                    return Ok(false);
                }
                for (name, domain) in columns {
                    match data.get(name) {
                        Some(column) if domain.member(column)? => {}
                        _ => return Ok(false),
                    }
                }
                Ok(true)
            }
            (_, other) => Err(DpgError::type_mismatch(self.carrier_type(), other.type_name())),
        }
    }

    fn expect_kind(&self, kind: ScalarKind, value: &Value) -> Fallible<()> {
        if value.kind() == Some(kind) {
            Ok(())
        } else {
            Err(DpgError::type_mismatch(kind, value.type_name()))
        }
    }

    /// The runtime type of this domain's members.
    pub fn carrier_type(&self) -> RuntimeType {
        match self {
            Self::Atom { kind, .. } | Self::Interval { kind, .. } => RuntimeType::Scalar(*kind),
            Self::Vector { element, .. } => RuntimeType::vec(element.carrier_type()),
            Self::OptionNull { element } => RuntimeType::option(element.carrier_type()),
            Self::Map { key, value } => {
                RuntimeType::nest("HashMap", vec![key.carrier_type(), value.carrier_type()])
            }
            Self::DataFrame { .. } => RuntimeType::name("DataFrame"),
        }
    }

    /// The runtime type of the domain itself, e.g. `VectorDomain<AtomDomain<f64>>`.
    pub fn descriptor(&self) -> RuntimeType {
        match self {
            Self::Atom { kind, .. } => RuntimeType::nest("AtomDomain", vec![(*kind).into()]),
            Self::Interval { kind, .. } => {
                RuntimeType::nest("IntervalDomain", vec![(*kind).into()])
            }
            Self::Vector { element, .. } => {
                RuntimeType::nest("VectorDomain", vec![element.descriptor()])
            }
            Self::OptionNull { element } => {
                RuntimeType::nest("OptionDomain", vec![element.descriptor()])
            }
            Self::Map { key, value } => {
                RuntimeType::nest("MapDomain", vec![key.descriptor(), value.descriptor()])
            }
            Self::DataFrame { .. } => RuntimeType::name("DataFrameDomain"),
        }
    }

    /// The primitive kind of an atom or interval domain.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            Self::Atom { kind, .. } | Self::Interval { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether members are numeric and never NaN.
    pub fn is_numeric_non_nan(&self) -> bool {
        match self {
            Self::Atom { kind, nan } => kind.is_numeric() && !nan,
            Self::Interval { .. } => true,
            _ => false,
        }
    }

    /// The bounds of an interval domain.
    pub fn bounds(&self) -> Option<(&Value, &Value)> {
        match self {
            Self::Interval { lower, upper, .. } => Some((lower, upper)),
            _ => None,
        }
    }

    /// Typed bounds of an interval domain over `T`.
    pub fn bounds_of<T: Primitive>(&self) -> Fallible<(T, T)> {
        match self.bounds() {
            Some((lower, upper)) => Ok((T::from_value(lower)?, T::from_value(upper)?)),
            None => Err(DpgError::InvalidArgument(format!(
                "expected a bounded domain, found {self}"
            ))),
        }
    }

    /// The element domain of a vector domain.
    pub fn element(&self) -> Option<&Domain> {
        match self {
            Self::Vector { element, .. } => Some(element),
            _ => None,
        }
    }

    /// The fixed length of a sized vector domain.
    pub fn size(&self) -> Option<usize> {
        match self {
            Self::Vector { size, .. } => *size,
            _ => None,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom { kind, nan: false } => write!(f, "AtomDomain({kind})"),
            Self::Atom { kind, nan: true } => write!(f, "AtomDomain({kind}, nan)"),
            Self::Interval { kind, lower, upper } => {
                write!(f, "IntervalDomain({kind}, [{lower}, {upper}])")
            }
            Self::Vector {
                element,
                size: None,
            } => write!(f, "VectorDomain({element})"),
            Self::Vector {
                element,
                size: Some(n),
            } => write!(f, "VectorDomain({element}, size={n})"),
            Self::OptionNull { element } => write!(f, "OptionDomain({element})"),
            Self::Map { key, value } => write!(f, "MapDomain({key}, {value})"),
            Self::DataFrame { columns } => {
                f.write_str("DataFrameDomain(")?;
                for (i, (name, column)) in columns.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {column}")?;
                }
                f.write_str(")")
            }
        }
    }
}
