//! # Dynamic Carrier Values
//!
//! `Value` is the dynamically-typed carrier that flows through every
//! `Function`. Constructors monomorphize their internals over native Rust
//! types through the [`Carrier`] trait, while the graph itself stays
//! type-erased so stages chosen at run time can be chained.
//!
//! ## Design
//!
//! - The primitive variants mirror [`ScalarKind`] one-to-one.
//! - Containers are `Vec`, `Tuple`, `Option`, `Map` (ordered key/value
//!   pairs) and `DataFrame` (named columns).
//! - The host boundary is JSON: [`Value::from_json`] is driven by a
//!   [`RuntimeType`] so `1` can become an `f64` or a `u32` as the caller
//!   requires, and [`Value::to_json`] is its inverse. Non-finite floats are
//!   spelled `"NaN"`, `"inf"` and `"-inf"` because JSON has no literal for
//!   them.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{DpgError, Fallible};
use crate::kind::ScalarKind;
use crate::ty::RuntimeType;

/// A dynamically-typed carrier value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    Usize(usize),
    F32(f32),
    F64(f64),
    String(String),
    /// A homogeneous vector.
    Vec(Vec<Value>),
    /// A fixed-arity heterogeneous tuple.
    Tuple(Vec<Value>),
    /// A possibly-missing value.
    Option(Option<Box<Value>>),
    /// Key/value pairs in insertion order. Keys are unique.
    Map(Vec<(Value, Value)>),
    /// Named columns.
    DataFrame(BTreeMap<String, Value>),
}

impl Value {
    /// The primitive kind of a scalar value.
    pub fn kind(&self) -> Option<ScalarKind> {
        match self {
            Self::Bool(_) => Some(ScalarKind::Bool),
            Self::I32(_) => Some(ScalarKind::I32),
            Self::I64(_) => Some(ScalarKind::I64),
            Self::U32(_) => Some(ScalarKind::U32),
            Self::U64(_) => Some(ScalarKind::U64),
            Self::Usize(_) => Some(ScalarKind::Usize),
            Self::F32(_) => Some(ScalarKind::F32),
            Self::F64(_) => Some(ScalarKind::F64),
            Self::String(_) => Some(ScalarKind::String),
            Self::Vec(_) | Self::Tuple(_) | Self::Option(_) | Self::Map(_) | Self::DataFrame(_) => {
                None
            }
        }
    }

    /// Human-readable description of the value's type, for error messages.
    pub fn type_name(&self) -> String {
        match RuntimeType::infer(self) {
            Ok(ty) => ty.to_string(),
            Err(_) => match self {
                Self::Vec(_) => "Vec<_>".into(),
                Self::Tuple(items) => format!("{}-tuple", items.len()),
                Self::Option(_) => "Option<_>".into(),
                Self::Map(_) => "HashMap<_, _>".into(),
                _ => "value".into(),
            },
        }
    }

    /// Numeric view of a scalar, widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::I32(v) => Some(f64::from(*v)),
            Self::I64(v) => Some(*v as f64),
            Self::U32(v) => Some(f64::from(*v)),
            Self::U64(v) => Some(*v as f64),
            Self::Usize(v) => Some(*v as f64),
            Self::F32(v) => Some(f64::from(*v)),
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether this is a floating-point NaN.
    pub fn is_nan(&self) -> bool {
        match self {
            Self::F32(v) => v.is_nan(),
            Self::F64(v) => v.is_nan(),
            _ => false,
        }
    }

    /// The distance order: `self <= other`, componentwise for tuples.
    ///
    /// NaN is never ordered below anything, so a NaN bound never satisfies
    /// a relation.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when the two values are not the same numeric type.
    pub fn order_le(&self, other: &Value) -> Fallible<bool> {
        match (self, other) {
            (Self::I32(a), Self::I32(b)) => Ok(a <= b),
            (Self::I64(a), Self::I64(b)) => Ok(a <= b),
            (Self::U32(a), Self::U32(b)) => Ok(a <= b),
            (Self::U64(a), Self::U64(b)) => Ok(a <= b),
            (Self::Usize(a), Self::Usize(b)) => Ok(a <= b),
            (Self::F32(a), Self::F32(b)) => Ok(a <= b),
            (Self::F64(a), Self::F64(b)) => Ok(a <= b),
            (Self::Tuple(a), Self::Tuple(b)) if a.len() == b.len() => {
                for (x, y) in a.iter().zip(b) {
                    if !x.order_le(y)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Err(DpgError::type_mismatch(self.type_name(), other.type_name())),
        }
    }

    /// Decode a host value into a carrier of the given type.
    pub fn from_json(json: &serde_json::Value, ty: &RuntimeType) -> Fallible<Value> {
        use serde_json::Value as J;
        match ty {
            RuntimeType::Scalar(kind) => scalar_from_json(json, *kind),
            RuntimeType::Nest { origin, args } => match (origin.as_str(), args.as_slice()) {
                ("Vec", [element]) => match json {
                    J::Array(items) => Ok(Value::Vec(
                        items
                            .iter()
                            .map(|item| Value::from_json(item, element))
                            .collect::<Fallible<_>>()?,
                    )),
                    other => Err(json_mismatch(ty, other)),
                },
                ("Option", [inner]) => match json {
                    J::Null => Ok(Value::Option(None)),
                    other => Ok(Value::Option(Some(Box::new(Value::from_json(other, inner)?)))),
                },
                ("HashMap", [key, value]) => match json {
                    J::Object(map) => {
                        let key_kind = key.as_scalar().ok_or_else(|| {
                            DpgError::UnknownType(format!("map keys must be primitive, found {key}"))
                        })?;
                        let pairs = map
                            .iter()
                            .map(|(k, v)| {
                                Ok((scalar_from_key(k, key_kind)?, Value::from_json(v, value)?))
                            })
                            .collect::<Fallible<_>>()?;
                        Ok(Value::Map(pairs))
                    }
                    other => Err(json_mismatch(ty, other)),
                },
                _ => Err(DpgError::UnknownType(format!(
                    "{ty} has no value representation"
                ))),
            },
            RuntimeType::Tuple(types) => match json {
                J::Array(items) if items.len() == types.len() => Ok(Value::Tuple(
                    items
                        .iter()
                        .zip(types)
                        .map(|(item, t)| Value::from_json(item, t))
                        .collect::<Fallible<_>>()?,
                )),
                other => Err(json_mismatch(ty, other)),
            },
            RuntimeType::Name(name) if name == "DataFrame" => match json {
                J::Object(map) => {
                    let mut columns = BTreeMap::new();
                    for (name, column) in map {
                        let column_type = RuntimeType::infer_json(column)?;
                        columns.insert(name.clone(), Value::from_json(column, &column_type)?);
                    }
                    Ok(Value::DataFrame(columns))
                }
                other => Err(json_mismatch(ty, other)),
            },
            RuntimeType::Name(name) => Err(DpgError::UnknownType(format!(
                "{name} has no value representation"
            ))),
            RuntimeType::Var(name) => Err(DpgError::UnresolvedTypeVariable(name.clone())),
        }
    }

    /// Encode the value for the host.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Self::Bool(v) => J::Bool(*v),
            Self::I32(v) => J::from(*v),
            Self::I64(v) => J::from(*v),
            Self::U32(v) => J::from(*v),
            Self::U64(v) => J::from(*v),
            Self::Usize(v) => J::from(*v),
            Self::F32(v) => float_to_json(f64::from(*v)),
            Self::F64(v) => float_to_json(*v),
            Self::String(v) => J::String(v.clone()),
            Self::Vec(items) | Self::Tuple(items) => {
                J::Array(items.iter().map(Value::to_json).collect())
            }
            Self::Option(None) => J::Null,
            Self::Option(Some(inner)) => inner.to_json(),
            Self::Map(pairs) => {
                if pairs.iter().all(|(k, _)| k.kind().is_some()) {
                    J::Object(
                        pairs
                            .iter()
                            .map(|(k, v)| (key_to_string(k), v.to_json()))
                            .collect(),
                    )
                } else {
                    J::Array(
                        pairs
                            .iter()
                            .map(|(k, v)| J::Array(vec![k.to_json(), v.to_json()]))
                            .collect(),
                    )
                }
            }
            Self::DataFrame(columns) => J::Object(
                columns
                    .iter()
                    .map(|(name, column)| (name.clone(), column.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

fn json_mismatch(ty: &RuntimeType, json: &serde_json::Value) -> DpgError {
    let found = match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    };
    DpgError::type_mismatch(ty, format!("JSON {found}"))
}

fn out_of_range(kind: ScalarKind, json: &serde_json::Value) -> DpgError {
    DpgError::InvalidArgument(format!("{json} is not representable as {kind}"))
}

fn scalar_from_json(json: &serde_json::Value, kind: ScalarKind) -> Fallible<Value> {
    use serde_json::Value as J;
    let ty = RuntimeType::Scalar(kind);
    match kind {
        ScalarKind::Bool => json.as_bool().map(Value::Bool).ok_or_else(|| json_mismatch(&ty, json)),
        ScalarKind::String => json
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| json_mismatch(&ty, json)),
        ScalarKind::F32 | ScalarKind::F64 => {
            let v = match json {
                J::Number(n) => n.as_f64().ok_or_else(|| json_mismatch(&ty, json))?,
                J::String(s) => parse_special_float(s).ok_or_else(|| json_mismatch(&ty, json))?,
                other => return Err(json_mismatch(&ty, other)),
            };
            if kind == ScalarKind::F32 {
                Ok(Value::F32(v as f32))
            } else {
                Ok(Value::F64(v))
            }
        }
        ScalarKind::I32 | ScalarKind::I64 => {
            let J::Number(n) = json else {
                return Err(json_mismatch(&ty, json));
            };
            let v = n.as_i64().ok_or_else(|| out_of_range(kind, json))?;
            if kind == ScalarKind::I32 {
                i32::try_from(v)
                    .map(Value::I32)
                    .map_err(|_| out_of_range(kind, json))
            } else {
                Ok(Value::I64(v))
            }
        }
        ScalarKind::U32 | ScalarKind::U64 | ScalarKind::Usize => {
            let J::Number(n) = json else {
                return Err(json_mismatch(&ty, json));
            };
            let v = n.as_u64().ok_or_else(|| out_of_range(kind, json))?;
            match kind {
                ScalarKind::U32 => u32::try_from(v)
                    .map(Value::U32)
                    .map_err(|_| out_of_range(kind, json)),
                ScalarKind::Usize => usize::try_from(v)
                    .map(Value::Usize)
                    .map_err(|_| out_of_range(kind, json)),
                _ => Ok(Value::U64(v)),
            }
        }
    }
}

/// Parse a JSON object key as a primitive of the given kind.
fn scalar_from_key(key: &str, kind: ScalarKind) -> Fallible<Value> {
    let bad = || DpgError::InvalidArgument(format!("map key {key:?} is not a valid {kind}"));
    Ok(match kind {
        ScalarKind::String => Value::String(key.to_string()),
        ScalarKind::Bool => Value::Bool(key.parse().map_err(|_| bad())?),
        ScalarKind::I32 => Value::I32(key.parse().map_err(|_| bad())?),
        ScalarKind::I64 => Value::I64(key.parse().map_err(|_| bad())?),
        ScalarKind::U32 => Value::U32(key.parse().map_err(|_| bad())?),
        ScalarKind::U64 => Value::U64(key.parse().map_err(|_| bad())?),
        ScalarKind::Usize => Value::Usize(key.parse().map_err(|_| bad())?),
        ScalarKind::F32 | ScalarKind::F64 => {
            return Err(DpgError::InvalidArgument(format!(
                "{kind} cannot be used as a map key"
            )))
        }
    })
}

fn key_to_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_json().to_string(),
    }
}

fn parse_special_float(s: &str) -> Option<f64> {
    match s {
        "NaN" | "nan" => Some(f64::NAN),
        "inf" | "Infinity" => Some(f64::INFINITY),
        "-inf" | "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

fn float_to_json(v: f64) -> serde_json::Value {
    match serde_json::Number::from_f64(v) {
        Some(n) => serde_json::Value::Number(n),
        None if v.is_nan() => serde_json::Value::String("NaN".into()),
        None if v > 0.0 => serde_json::Value::String("inf".into()),
        None => serde_json::Value::String("-inf".into()),
    }
}

// ─── Native carriers ─────────────────────────────────────────────────

/// A native Rust type with a fixed runtime descriptor and a lossless
/// conversion to and from [`Value`].
pub trait Carrier: Sized + Clone + Send + Sync + 'static {
    /// The descriptor of this type.
    fn runtime_type() -> RuntimeType;

    /// Wrap a native value.
    fn into_value(self) -> Value;

    /// Unwrap a dynamic value, failing with `TypeMismatch` on the wrong shape.
    fn from_value(value: &Value) -> Fallible<Self>;
}

/// A carrier in the closed primitive set.
pub trait Primitive: Carrier + PartialOrd + fmt::Debug + fmt::Display {
    /// The primitive kind of this type.
    const KIND: ScalarKind;
}

macro_rules! impl_primitive {
    ($($ty:ty => $variant:ident);* $(;)?) => {$(
        impl Carrier for $ty {
            fn runtime_type() -> RuntimeType {
                RuntimeType::Scalar(ScalarKind::$variant)
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Fallible<Self> {
                match value {
                    Value::$variant(v) => Ok(v.clone()),
                    other => Err(DpgError::type_mismatch(ScalarKind::$variant, other.type_name())),
                }
            }
        }

        impl Primitive for $ty {
            const KIND: ScalarKind = ScalarKind::$variant;
        }
    )*};
}

impl_primitive! {
    bool => Bool;
    i32 => I32;
    i64 => I64;
    u32 => U32;
    u64 => U64;
    usize => Usize;
    f32 => F32;
    f64 => F64;
    String => String;
}

impl<T: Carrier> Carrier for Vec<T> {
    fn runtime_type() -> RuntimeType {
        RuntimeType::vec(T::runtime_type())
    }

    fn into_value(self) -> Value {
        Value::Vec(self.into_iter().map(Carrier::into_value).collect())
    }

    fn from_value(value: &Value) -> Fallible<Self> {
        match value {
            Value::Vec(items) => items.iter().map(T::from_value).collect(),
            other => Err(DpgError::type_mismatch(Self::runtime_type(), other.type_name())),
        }
    }
}

impl<T: Carrier> Carrier for Option<T> {
    fn runtime_type() -> RuntimeType {
        RuntimeType::option(T::runtime_type())
    }

    fn into_value(self) -> Value {
        Value::Option(self.map(|v| Box::new(v.into_value())))
    }

    fn from_value(value: &Value) -> Fallible<Self> {
        match value {
            Value::Option(None) => Ok(None),
            Value::Option(Some(inner)) => T::from_value(inner).map(Some),
            other => Err(DpgError::type_mismatch(Self::runtime_type(), other.type_name())),
        }
    }
}

impl<K: Carrier + Ord, V: Carrier> Carrier for BTreeMap<K, V> {
    fn runtime_type() -> RuntimeType {
        RuntimeType::nest("HashMap", vec![K::runtime_type(), V::runtime_type()])
    }

    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(k, v)| (k.into_value(), v.into_value()))
                .collect(),
        )
    }

    fn from_value(value: &Value) -> Fallible<Self> {
        match value {
            Value::Map(pairs) => pairs
                .iter()
                .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
                .collect(),
            other => Err(DpgError::type_mismatch(Self::runtime_type(), other.type_name())),
        }
    }
}

macro_rules! impl_tuple {
    ($len:literal; $($name:ident : $idx:tt),+) => {
        impl<$($name: Carrier),+> Carrier for ($($name,)+) {
            fn runtime_type() -> RuntimeType {
                RuntimeType::Tuple(vec![$($name::runtime_type()),+])
            }

            fn into_value(self) -> Value {
                Value::Tuple(vec![$(self.$idx.into_value()),+])
            }

            fn from_value(value: &Value) -> Fallible<Self> {
                match value {
                    Value::Tuple(items) if items.len() == $len => {
                        Ok(($($name::from_value(&items[$idx])?,)+))
                    }
                    other => Err(DpgError::type_mismatch(Self::runtime_type(), other.type_name())),
                }
            }
        }
    };
}

impl_tuple!(2; A: 0, B: 1);
impl_tuple!(3; A: 0, B: 1, C: 2);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ty(s: &str) -> RuntimeType {
        RuntimeType::parse(s).unwrap()
    }

    #[test]
    fn test_carrier_roundtrip_nested() {
        let native: Vec<(f64, Option<i32>)> = vec![(1.5, Some(2)), (0.0, None)];
        let value = native.clone().into_value();
        // the `None` element hides its type from inference
        assert!(RuntimeType::infer(&value).is_err());
        let back = <Vec<(f64, Option<i32>)>>::from_value(&value).unwrap();
        assert_eq!(back, native);
        assert_eq!(
            <Vec<(f64, Option<i32>)>>::runtime_type(),
            ty("Vec<(f64, Option<i32>)>")
        );
    }

    #[test]
    fn test_carrier_wrong_shape() {
        let err = f64::from_value(&Value::I32(1)).unwrap_err();
        assert_eq!(err, DpgError::type_mismatch("f64", "i32"));
        assert!(<Vec<f64>>::from_value(&Value::F64(1.0)).is_err());
        assert!(<(f64, f64)>::from_value(&Value::Tuple(vec![Value::F64(1.0)])).is_err());
    }

    #[test]
    fn test_order_le() {
        assert!(Value::F64(1.0).order_le(&Value::F64(1.0)).unwrap());
        assert!(!Value::F64(f64::NAN).order_le(&Value::F64(1.0)).unwrap());
        let a = Value::Tuple(vec![Value::F64(1.0), Value::F64(1e-6)]);
        let b = Value::Tuple(vec![Value::F64(2.0), Value::F64(1e-7)]);
        assert!(!a.order_le(&b).unwrap());
        assert!(a.order_le(&a).unwrap());
        assert!(matches!(
            Value::F64(1.0).order_le(&Value::U32(1)),
            Err(DpgError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_from_json_is_type_directed() {
        assert_eq!(Value::from_json(&json!(1), &ty("f64")).unwrap(), Value::F64(1.0));
        assert_eq!(Value::from_json(&json!(1), &ty("u32")).unwrap(), Value::U32(1));
        assert!(Value::from_json(&json!(-1), &ty("u32")).is_err());
        assert!(Value::from_json(&json!(5_000_000_000_i64), &ty("i32")).is_err());
        assert!(Value::from_json(&json!(1.5), &ty("i32")).is_err());
        assert_eq!(
            Value::from_json(&json!([1, null]), &ty("Vec<Option<i64>>")).unwrap(),
            Value::Vec(vec![
                Value::Option(Some(Box::new(Value::I64(1)))),
                Value::Option(None)
            ])
        );
    }

    #[test]
    fn test_from_json_tuple_and_map() {
        assert_eq!(
            Value::from_json(&json!([1.0, 1e-6]), &ty("(f64, f64)")).unwrap(),
            Value::Tuple(vec![Value::F64(1.0), Value::F64(1e-6)])
        );
        assert!(Value::from_json(&json!([1.0]), &ty("(f64, f64)")).is_err());
        let map = Value::from_json(&json!({"3": 1.5}), &ty("HashMap<i32, f64>")).unwrap();
        assert_eq!(map, Value::Map(vec![(Value::I32(3), Value::F64(1.5))]));
    }

    #[test]
    fn test_from_json_unresolved_var() {
        let generic = RuntimeType::parse_generic("Vec<T>", &["T"]).unwrap();
        assert_eq!(
            Value::from_json(&json!([1]), &generic),
            Err(DpgError::UnresolvedTypeVariable("T".into()))
        );
    }

    #[test]
    fn test_special_floats() {
        let v = Value::from_json(&json!("inf"), &ty("f64")).unwrap();
        assert_eq!(v, Value::F64(f64::INFINITY));
        assert_eq!(v.to_json(), json!("inf"));
        assert!(Value::from_json(&json!("NaN"), &ty("f64")).unwrap().is_nan());
    }

    #[test]
    fn test_to_json() {
        let v = Value::Tuple(vec![Value::I32(1), Value::String("a".into())]);
        assert_eq!(v.to_json(), json!([1, "a"]));
        assert_eq!(v.to_string(), "[1,\"a\"]");
        let m = Value::Map(vec![(Value::I32(3), Value::Bool(true))]);
        assert_eq!(m.to_json(), json!({"3": true}));
    }

    #[test]
    fn test_dataframe_from_json() {
        let df = Value::from_json(&json!({"age": [30, 40], "name": ["a", "b"]}), &ty("DataFrame"))
            .unwrap();
        let Value::DataFrame(columns) = df else {
            panic!("expected a data frame");
        };
        assert_eq!(columns["age"], Value::Vec(vec![Value::I32(30), Value::I32(40)]));
    }
}
