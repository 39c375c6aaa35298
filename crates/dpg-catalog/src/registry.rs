//! # Constructor Registry
//!
//! Maps a constructor name plus JSON arguments to a monomorphized catalog
//! constructor. This is how a host without Rust generics (the CLI, a
//! pipeline file) reaches `make_clamp::<f64>` and friends: type parameters
//! are resolved to a [`ScalarKind`] once, at construction, and a dispatch
//! macro selects the matching instantiation.
//!
//! ## Type Parameter Resolution
//!
//! For each declared parameter, first match wins:
//!
//! 1. An explicit type string in the arguments (`"T": "f64"`).
//! 2. The primitive kind of the input space, for parameters that follow the
//!    data (`from_input`).
//! 3. Inference from a named argument value (`[0, 100]` infers `i32`).
//! 4. The declared default.
//!
//! A parameter left unresolved is `UnresolvedTypeVariable`; a kind with no
//! instantiation is `UnknownType`.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value as Json};

use dpg_core::{
    Carrier, DpgError, Fallible, Feature, FeatureSet, MetricSpace, Number, RuntimeType,
    ScalarKind, Value,
};
use dpg_graph::{Measurement, Transformation};

use crate::meas::{make_gaussian, make_laplace};
use crate::trans::{make_bounded_sum, make_clamp, make_count};

/// Instantiate `$f::<T>` for the `T` matching `$kind` among the listed
/// kinds.
macro_rules! dispatch {
    ($kind:expr, [$($variant:ident => $ty:ty),* $(,)?], $f:ident $args:tt) => {
        match $kind {
            $(ScalarKind::$variant => $f::<$ty> $args,)*
            other => Err(DpgError::UnknownType(format!(
                "{} has no instantiation for {other}",
                stringify!($f)
            ))),
        }
    };
}

macro_rules! dispatch_number {
    ($kind:expr, $f:ident $args:tt) => {
        dispatch!(
            $kind,
            [I32 => i32, I64 => i64, U32 => u32, U64 => u64, Usize => usize, F32 => f32, F64 => f64],
            $f $args
        )
    };
}

macro_rules! dispatch_float {
    ($kind:expr, $f:ident $args:tt) => {
        dispatch!($kind, [F32 => f32, F64 => f64], $f $args)
    };
}

/// A built stage: either kind of graph node.
#[derive(Debug, Clone)]
pub enum Stage {
    Transformation(Transformation),
    Measurement(Measurement),
}

impl Stage {
    pub fn input_space(&self) -> &MetricSpace {
        match self {
            Self::Transformation(t) => t.input_space(),
            Self::Measurement(m) => m.input_space(),
        }
    }

    /// The carrier type `invoke` accepts.
    pub fn input_type(&self) -> RuntimeType {
        self.input_space().domain().carrier_type()
    }

    /// The type of `d_in`.
    pub fn input_distance_type(&self) -> RuntimeType {
        self.input_space().metric().distance_type()
    }

    /// The type of `d_out`: the output metric's distance for a
    /// transformation, the measure's for a measurement.
    pub fn output_distance_type(&self) -> RuntimeType {
        match self {
            Self::Transformation(t) => t.output_metric().distance_type(),
            Self::Measurement(m) => m.output_measure().distance_type(),
        }
    }

    pub fn invoke(&self, arg: &Value) -> Fallible<Value> {
        match self {
            Self::Transformation(t) => t.invoke(arg),
            Self::Measurement(m) => m.invoke(arg),
        }
    }

    pub fn map(&self, d_in: &Value) -> Fallible<Value> {
        match self {
            Self::Transformation(t) => t.map(d_in),
            Self::Measurement(m) => m.map(d_in),
        }
    }

    pub fn check(&self, d_in: &Value, d_out: &Value) -> Fallible<bool> {
        match self {
            Self::Transformation(t) => t.check(d_in, d_out),
            Self::Measurement(m) => m.check(d_in, d_out),
        }
    }

    /// Unwrap a measurement.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a transformation.
    pub fn into_measurement(self) -> Fallible<Measurement> {
        match self {
            Self::Measurement(m) => Ok(m),
            Self::Transformation(t) => Err(DpgError::InvalidArgument(format!(
                "expected a measurement, found a transformation into {}",
                t.output_space()
            ))),
        }
    }

    pub fn is_measurement(&self) -> bool {
        matches!(self, Self::Measurement(_))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transformation(t) => write!(f, "Transformation {} -> {}", t.input_space(), t.output_space()),
            Self::Measurement(m) => write!(f, "Measurement {} -> {}", m.input_space(), m.output_measure()),
        }
    }
}

impl From<Transformation> for Stage {
    fn from(t: Transformation) -> Self {
        Self::Transformation(t)
    }
}

impl From<Measurement> for Stage {
    fn from(m: Measurement) -> Self {
        Self::Measurement(m)
    }
}

/// A generic parameter of a registered constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeParam {
    pub name: &'static str,
    /// Take the kind from the input space's data.
    pub from_input: bool,
    /// Infer the kind from this argument's value.
    pub from_arg: Option<&'static str>,
    pub default: Option<ScalarKind>,
}

impl TypeParam {
    const fn data(name: &'static str) -> Self {
        Self {
            name,
            from_input: true,
            from_arg: None,
            default: None,
        }
    }
}

/// Everything a constructor sees: the input space, arguments, and the
/// resolved type parameters.
#[derive(Debug)]
pub struct BuildContext<'a> {
    input: &'a MetricSpace,
    args: &'a Map<String, Json>,
    types: BTreeMap<&'static str, ScalarKind>,
    features: &'a FeatureSet,
}

impl<'a> BuildContext<'a> {
    pub fn input(&self) -> &'a MetricSpace {
        self.input
    }

    pub fn features(&self) -> &'a FeatureSet {
        self.features
    }

    /// The resolved kind of a declared type parameter.
    pub fn kind(&self, param: &str) -> Fallible<ScalarKind> {
        self.types
            .get(param)
            .copied()
            .ok_or_else(|| DpgError::UnresolvedTypeVariable(param.to_string()))
    }

    /// Decode a required argument as `T`.
    pub fn arg<T: Carrier>(&self, name: &str) -> Fallible<T> {
        let json = self
            .args
            .get(name)
            .ok_or_else(|| DpgError::InvalidArgument(format!("missing argument {name:?}")))?;
        T::from_value(&Value::from_json(json, &T::runtime_type())?)
    }
}

/// Signature of a registered constructor body.
pub type BuildFn = fn(&BuildContext<'_>) -> Fallible<Stage>;

/// A named, feature-gated constructor.
#[derive(Debug, Clone)]
pub struct Constructor {
    pub name: &'static str,
    pub summary: &'static str,
    pub features: &'static [Feature],
    pub type_params: &'static [TypeParam],
    pub build: BuildFn,
}

/// Name-keyed table of constructors.
#[derive(Debug, Clone, Default)]
pub struct ConstructorRegistry {
    constructors: BTreeMap<&'static str, Constructor>,
}

impl ConstructorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in catalog.
    pub fn with_catalog() -> Self {
        let mut registry = Self::new();
        for constructor in catalog() {
            registry.constructors.insert(constructor.name, constructor);
        }
        registry
    }

    /// Add a constructor.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the name is taken.
    pub fn register(&mut self, constructor: Constructor) -> Fallible<()> {
        if self.constructors.contains_key(constructor.name) {
            return Err(DpgError::InvalidArgument(format!(
                "constructor {:?} is already registered",
                constructor.name
            )));
        }
        self.constructors.insert(constructor.name, constructor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Constructor> {
        self.constructors.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constructor> {
        self.constructors.values()
    }

    /// Build the stage `name` on `input` from JSON `args`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an unknown name or malformed arguments.
    /// - `FeatureDisabled` when a required feature is off.
    /// - Type resolution and constructor errors propagate.
    pub fn build(
        &self,
        name: &str,
        input: &MetricSpace,
        args: &Map<String, Json>,
        features: &FeatureSet,
    ) -> Fallible<Stage> {
        let constructor = self.get(name).ok_or_else(|| {
            DpgError::InvalidArgument(format!("no constructor named {name:?}"))
        })?;
        features.require_all(constructor.features)?;

        let mut types = BTreeMap::new();
        for param in constructor.type_params {
            types.insert(param.name, resolve_type_param(param, input, args)?);
        }
        tracing::debug!(constructor = name, input = %input, types = ?types, "dispatching constructor");

        let ctx = BuildContext {
            input,
            args,
            types,
            features,
        };
        (constructor.build)(&ctx)
    }
}

fn resolve_type_param(
    param: &TypeParam,
    input: &MetricSpace,
    args: &Map<String, Json>,
) -> Fallible<ScalarKind> {
    let scalar = |ty: RuntimeType| {
        ty.atom().ok_or_else(|| {
            DpgError::UnknownType(format!("type parameter {} must be primitive, found {ty}", param.name))
        })
    };

    if let Some(explicit) = args.get(param.name) {
        let Json::String(type_name) = explicit else {
            return Err(DpgError::InvalidArgument(format!(
                "type argument {} must be a type string, found {explicit}",
                param.name
            )));
        };
        return scalar(RuntimeType::parse(type_name)?);
    }
    if param.from_input {
        if let Some(kind) = input_kind(input) {
            return Ok(kind);
        }
    }
    if let Some(value) = param.from_arg.and_then(|arg| args.get(arg)) {
        return scalar(RuntimeType::parse_or_infer_json(None, value)?);
    }
    param
        .default
        .ok_or_else(|| DpgError::UnresolvedTypeVariable(param.name.to_string()))
}

/// The primitive kind of the data in `space`: the atom itself, or a
/// vector's element.
fn input_kind(space: &MetricSpace) -> Option<ScalarKind> {
    let domain = space.domain();
    domain
        .scalar_kind()
        .or_else(|| domain.element().and_then(|e| e.scalar_kind()))
}

fn build_clamp<T: Number>(ctx: &BuildContext<'_>) -> Fallible<Stage> {
    let (lower, upper) = ctx.arg::<(T, T)>("bounds")?;
    make_clamp(ctx.input(), lower, upper, ctx.features()).map(Stage::from)
}

fn build_bounded_sum<T: Number>(ctx: &BuildContext<'_>) -> Fallible<Stage> {
    make_bounded_sum::<T>(ctx.input(), ctx.features()).map(Stage::from)
}

fn build_count<TO: Number>(ctx: &BuildContext<'_>) -> Fallible<Stage> {
    make_count::<TO>(ctx.input(), ctx.features()).map(Stage::from)
}

fn build_laplace<T: crate::noise::LaplaceNoise>(ctx: &BuildContext<'_>) -> Fallible<Stage> {
    make_laplace::<T>(ctx.input(), ctx.arg("scale")?, ctx.features()).map(Stage::from)
}

fn build_gaussian<T: crate::noise::GaussianNoise>(ctx: &BuildContext<'_>) -> Fallible<Stage> {
    make_gaussian::<T>(ctx.input(), ctx.arg("scale")?, ctx.features()).map(Stage::from)
}

const CONTRIB: &[Feature] = &[Feature::Contrib];
const DATA_T: &[TypeParam] = &[TypeParam::data("T")];

fn catalog() -> Vec<Constructor> {
    vec![
        Constructor {
            name: "clamp",
            summary: "clamp each record to [lower, upper]; args: bounds",
            features: CONTRIB,
            type_params: &[TypeParam {
                name: "T",
                from_input: true,
                from_arg: Some("bounds"),
                default: None,
            }],
            build: |ctx| dispatch_number!(ctx.kind("T")?, build_clamp(ctx)),
        },
        Constructor {
            name: "bounded_sum",
            summary: "sum of bounded records",
            features: CONTRIB,
            type_params: DATA_T,
            build: |ctx| dispatch_number!(ctx.kind("T")?, build_bounded_sum(ctx)),
        },
        Constructor {
            name: "count",
            summary: "number of records; type arg TO (default u32)",
            features: CONTRIB,
            type_params: &[TypeParam {
                name: "TO",
                from_input: false,
                from_arg: None,
                default: Some(ScalarKind::U32),
            }],
            build: |ctx| dispatch_number!(ctx.kind("TO")?, build_count(ctx)),
        },
        Constructor {
            name: "laplace",
            summary: "Laplace or geometric noise under pure DP; args: scale",
            features: CONTRIB,
            type_params: DATA_T,
            build: |ctx| dispatch_number!(ctx.kind("T")?, build_laplace(ctx)),
        },
        Constructor {
            name: "gaussian",
            summary: "Gaussian noise under zCDP; args: scale",
            features: &[Feature::Contrib, Feature::FloatingPoint],
            type_params: DATA_T,
            build: |ctx| dispatch_float!(ctx.kind("T")?, build_gaussian(ctx)),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpg_core::{Domain, Metric};
    use serde_json::json;

    fn args(value: Json) -> Map<String, Json> {
        match value {
            Json::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn floats() -> MetricSpace {
        MetricSpace::new(
            Domain::vector(Domain::atom(ScalarKind::F64)),
            Metric::SymmetricDistance,
        )
        .unwrap()
    }

    #[test]
    fn test_catalog_names() {
        let registry = ConstructorRegistry::with_catalog();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["bounded_sum", "clamp", "count", "gaussian", "laplace"]
        );
    }

    #[test]
    fn test_clamp_takes_kind_from_input() {
        let registry = ConstructorRegistry::with_catalog();
        let stage = registry
            .build("clamp", &floats(), &args(json!({"bounds": [0, 10]})), &FeatureSet::all())
            .unwrap();
        let out = stage
            .invoke(&Value::Vec(vec![Value::F64(-1.0), Value::F64(11.0)]))
            .unwrap();
        assert_eq!(out, Value::Vec(vec![Value::F64(0.0), Value::F64(10.0)]));
    }

    #[test]
    fn test_explicit_type_argument_wins() {
        let registry = ConstructorRegistry::with_catalog();
        let err = registry
            .build(
                "clamp",
                &floats(),
                &args(json!({"T": "i32", "bounds": [0, 10]})),
                &FeatureSet::all(),
            )
            .unwrap_err();
        assert!(matches!(err, DpgError::TypeMismatch { .. }));
    }

    #[test]
    fn test_count_defaults_to_u32() {
        let registry = ConstructorRegistry::with_catalog();
        let stage = registry
            .build("count", &floats(), &Map::new(), &FeatureSet::all())
            .unwrap();
        assert_eq!(stage.output_distance_type(), RuntimeType::scalar(ScalarKind::U32));

        let stage = registry
            .build("count", &floats(), &args(json!({"TO": "float"})), &FeatureSet::all())
            .unwrap();
        assert_eq!(stage.output_distance_type(), RuntimeType::scalar(ScalarKind::F64));
    }

    #[test]
    fn test_gaussian_has_no_integer_instantiation() {
        let registry = ConstructorRegistry::with_catalog();
        let ints = MetricSpace::new(Domain::atom(ScalarKind::I32), Metric::AbsoluteDistance(ScalarKind::I32))
            .unwrap();
        let err = registry
            .build("gaussian", &ints, &args(json!({"scale": 1.0})), &FeatureSet::all())
            .unwrap_err();
        assert!(matches!(err, DpgError::UnknownType(_)));
    }

    #[test]
    fn test_registry_checks_features_first() {
        let registry = ConstructorRegistry::with_catalog();
        assert_eq!(
            registry
                .build("bounded_sum", &floats(), &Map::new(), &FeatureSet::new())
                .unwrap_err(),
            DpgError::FeatureDisabled("contrib".into())
        );
    }

    #[test]
    fn test_unknown_constructor_and_duplicates() {
        let mut registry = ConstructorRegistry::with_catalog();
        assert!(registry
            .build("median", &floats(), &Map::new(), &FeatureSet::all())
            .is_err());
        let clamp = registry.get("clamp").cloned().unwrap();
        assert!(registry.register(clamp).is_err());
    }

    #[test]
    fn test_missing_argument() {
        let registry = ConstructorRegistry::with_catalog();
        let err = registry
            .build("clamp", &floats(), &Map::new(), &FeatureSet::all())
            .unwrap_err();
        assert_eq!(err, DpgError::InvalidArgument("missing argument \"bounds\"".into()));
    }
}
