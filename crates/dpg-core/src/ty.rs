//! # Runtime Type Descriptors
//!
//! `RuntimeType` is the structural type tag attached to every domain, metric,
//! measure, and function. It lets a pipeline be built generically over
//! primitive carriers chosen at run time (for example by a host binding that
//! has no native generics) while keeping the chainer's structural-match
//! checks sound.
//!
//! ## Operations
//!
//! - [`RuntimeType::parse`] — stringly-typed surface (`"Vec<i32>"`,
//!   `"(f64, f64)"`, `"AbsoluteDistance<float>"`).
//! - [`RuntimeType::infer`] / [`RuntimeType::infer_json`] — structural
//!   inspection of a value's shape.
//! - [`RuntimeType::parse_or_infer`] — an explicit string wins over inference.
//! - [`RuntimeType::substitute`] — bind generic variables.
//! - [`RuntimeType::assert_is_similar`] — the interchangeability check used at
//!   chain, compose, and host-call boundaries.
//!
//! ## Security Invariant
//!
//! Parsing never panics. Every malformed, unknown, or wrongly-applied name is
//! reported as a typed error carrying the byte offset of the failure.
//! Descriptors are immutable values; nothing mutates one after a domain is
//! built.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DpgError, Fallible};
use crate::kind::ScalarKind;
use crate::value::Value;

/// Generic origins and the number of type arguments each takes.
const GENERIC_ORIGINS: &[(&str, usize)] = &[
    ("Vec", 1),
    ("Option", 1),
    ("HashMap", 2),
    ("AtomDomain", 1),
    ("IntervalDomain", 1),
    ("VectorDomain", 1),
    ("OptionDomain", 1),
    ("MapDomain", 2),
    ("AbsoluteDistance", 1),
    ("L1Distance", 1),
    ("L2Distance", 1),
];

/// Non-generic named types.
const PLAIN_NAMES: &[&str] = &[
    "DataFrame",
    "DataFrameDomain",
    "SymmetricDistance",
    "InsertDeleteDistance",
    "SubstitutionDistance",
    "HammingDistance",
    "DiscreteDistance",
    "MaxDivergence",
    "FixedSmoothedMaxDivergence",
    "ZeroConcentratedDivergence",
];

/// A structural type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RuntimeType {
    /// A primitive carrier.
    Scalar(ScalarKind),
    /// A named type without type arguments, e.g. `SymmetricDistance`.
    Name(String),
    /// A generic type applied to arguments, e.g. `Vec<i32>`.
    Nest {
        /// The generic origin, e.g. `Vec`.
        origin: String,
        /// The type arguments.
        args: Vec<RuntimeType>,
    },
    /// A tuple, e.g. `(f64, f64)`. The empty tuple is `()`.
    Tuple(Vec<RuntimeType>),
    /// A generic placeholder awaiting substitution.
    Var(String),
}

impl RuntimeType {
    /// Descriptor of a primitive carrier.
    pub fn scalar(kind: ScalarKind) -> Self {
        Self::Scalar(kind)
    }

    /// `Vec<inner>`.
    pub fn vec(inner: RuntimeType) -> Self {
        Self::nest("Vec", vec![inner])
    }

    /// `Option<inner>`.
    pub fn option(inner: RuntimeType) -> Self {
        Self::nest("Option", vec![inner])
    }

    /// A tuple of the given element types.
    pub fn tuple(items: Vec<RuntimeType>) -> Self {
        Self::Tuple(items)
    }

    /// A named, non-generic type.
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// A generic variable.
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    /// A generic origin applied to arguments.
    ///
    /// Unlike [`RuntimeType::parse`], this does not check the origin against
    /// the known set; it is used internally to build descriptors for domains
    /// and metrics whose shapes are already validated.
    pub fn nest(origin: impl Into<String>, args: Vec<RuntimeType>) -> Self {
        Self::Nest {
            origin: origin.into(),
            args,
        }
    }

    /// Parse a concrete descriptor. Every identifier must be a known type.
    pub fn parse(input: &str) -> Fallible<Self> {
        Self::parse_generic(input, &[])
    }

    /// Parse a descriptor in which the listed identifiers are generic variables.
    pub fn parse_generic(input: &str, vars: &[&str]) -> Fallible<Self> {
        let mut parser = Parser::new(input, vars);
        let ty = parser.parse_type()?;
        parser.skip_ws();
        if parser.pos < parser.bytes.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(ty)
    }

    /// Infer the descriptor of a native value by inspecting its shape.
    ///
    /// # Errors
    ///
    /// Returns `UnknownType` for values whose element type cannot be
    /// observed (empty vectors and maps, `None`), and `TypeMismatch` for
    /// heterogeneous containers.
    pub fn infer(value: &Value) -> Fallible<Self> {
        match value {
            Value::Bool(_) => Ok(Self::Scalar(ScalarKind::Bool)),
            Value::I32(_) => Ok(Self::Scalar(ScalarKind::I32)),
            Value::I64(_) => Ok(Self::Scalar(ScalarKind::I64)),
            Value::U32(_) => Ok(Self::Scalar(ScalarKind::U32)),
            Value::U64(_) => Ok(Self::Scalar(ScalarKind::U64)),
            Value::Usize(_) => Ok(Self::Scalar(ScalarKind::Usize)),
            Value::F32(_) => Ok(Self::Scalar(ScalarKind::F32)),
            Value::F64(_) => Ok(Self::Scalar(ScalarKind::F64)),
            Value::String(_) => Ok(Self::Scalar(ScalarKind::String)),
            Value::Vec(items) => {
                let element = infer_homogeneous(items.iter(), "vector")?;
                Ok(Self::vec(element))
            }
            Value::Tuple(items) => Ok(Self::Tuple(
                items.iter().map(Self::infer).collect::<Fallible<_>>()?,
            )),
            Value::Option(Some(inner)) => Ok(Self::option(Self::infer(inner)?)),
            Value::Option(None) => Err(DpgError::UnknownType(
                "cannot infer the type of None".into(),
            )),
            Value::Map(pairs) => {
                let key = infer_homogeneous(pairs.iter().map(|(k, _)| k), "map")?;
                let value = infer_homogeneous(pairs.iter().map(|(_, v)| v), "map")?;
                Ok(Self::nest("HashMap", vec![key, value]))
            }
            Value::DataFrame(_) => Ok(Self::name("DataFrame")),
        }
    }

    /// Infer the descriptor of a host (JSON) value.
    ///
    /// Host integers infer as `i32` when they fit (`i64` or `u64` otherwise),
    /// floats as `f64`, strings as `String`. Arrays mixing integers and
    /// floats widen to `f64`; arrays mixing `i32` and `i64` widen to `i64`.
    pub fn infer_json(value: &serde_json::Value) -> Fallible<Self> {
        use serde_json::Value as J;
        match value {
            J::Null => Err(DpgError::UnknownType(
                "cannot infer the type of null".into(),
            )),
            J::Bool(_) => Ok(Self::Scalar(ScalarKind::Bool)),
            J::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if i32::try_from(i).is_ok() {
                        Ok(Self::Scalar(ScalarKind::I32))
                    } else {
                        Ok(Self::Scalar(ScalarKind::I64))
                    }
                } else if n.is_u64() {
                    Ok(Self::Scalar(ScalarKind::U64))
                } else {
                    Ok(Self::Scalar(ScalarKind::F64))
                }
            }
            J::String(_) => Ok(Self::Scalar(ScalarKind::String)),
            J::Array(items) => {
                if items.is_empty() {
                    return Err(DpgError::UnknownType(
                        "cannot infer the element type of an empty array".into(),
                    ));
                }
                let inferred = items
                    .iter()
                    .map(Self::infer_json)
                    .collect::<Fallible<Vec<_>>>()?;
                Ok(Self::vec(widen(inferred)?))
            }
            J::Object(map) => {
                if map.is_empty() {
                    return Err(DpgError::UnknownType(
                        "cannot infer the value type of an empty object".into(),
                    ));
                }
                let inferred = map
                    .values()
                    .map(Self::infer_json)
                    .collect::<Fallible<Vec<_>>>()?;
                Ok(Self::nest(
                    "HashMap",
                    vec![Self::Scalar(ScalarKind::String), widen(inferred)?],
                ))
            }
        }
    }

    /// Use the explicit type string when present, otherwise infer from `value`.
    pub fn parse_or_infer(type_name: Option<&str>, value: &Value) -> Fallible<Self> {
        match type_name {
            Some(name) => Self::parse(name),
            None => Self::infer(value),
        }
    }

    /// Like [`RuntimeType::parse_or_infer`], inferring from a host value.
    pub fn parse_or_infer_json(type_name: Option<&str>, value: &serde_json::Value) -> Fallible<Self> {
        match type_name {
            Some(name) => Self::parse(name),
            None => Self::infer_json(value),
        }
    }

    /// Replace every generic variable with its binding.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedTypeVariable` naming the first variable without a
    /// binding.
    pub fn substitute(&self, bindings: &BTreeMap<String, RuntimeType>) -> Fallible<Self> {
        match self {
            Self::Var(name) => bindings
                .get(name)
                .cloned()
                .ok_or_else(|| DpgError::UnresolvedTypeVariable(name.clone())),
            Self::Scalar(_) | Self::Name(_) => Ok(self.clone()),
            Self::Nest { origin, args } => Ok(Self::Nest {
                origin: origin.clone(),
                args: args
                    .iter()
                    .map(|a| a.substitute(bindings))
                    .collect::<Fallible<_>>()?,
            }),
            Self::Tuple(items) => Ok(Self::Tuple(
                items
                    .iter()
                    .map(|a| a.substitute(bindings))
                    .collect::<Fallible<_>>()?,
            )),
        }
    }

    /// Unify two descriptors, extending `bindings` with the assignments
    /// that make them equal. Variables may appear on either side.
    pub fn unify(
        &self,
        other: &RuntimeType,
        bindings: &mut BTreeMap<String, RuntimeType>,
    ) -> Fallible<()> {
        match (self, other) {
            (Self::Var(a), Self::Var(b)) if a == b => Ok(()),
            (Self::Var(name), concrete) | (concrete, Self::Var(name)) => {
                match bindings.get(name).cloned() {
                    Some(bound) => bound.unify(concrete, bindings),
                    None => {
                        bindings.insert(name.clone(), concrete.clone());
                        Ok(())
                    }
                }
            }
            (Self::Scalar(a), Self::Scalar(b)) if a == b => Ok(()),
            (Self::Name(a), Self::Name(b)) if a == b => Ok(()),
            (
                Self::Nest { origin: oa, args: aa },
                Self::Nest { origin: ob, args: ab },
            ) if oa == ob && aa.len() == ab.len() => {
                for (a, b) in aa.iter().zip(ab) {
                    a.unify(b, bindings)
                        .map_err(|_| DpgError::type_mismatch(self, other))?;
                }
                Ok(())
            }
            (Self::Tuple(aa), Self::Tuple(ab)) if aa.len() == ab.len() => {
                for (a, b) in aa.iter().zip(ab) {
                    a.unify(b, bindings)
                        .map_err(|_| DpgError::type_mismatch(self, other))?;
                }
                Ok(())
            }
            _ => Err(DpgError::type_mismatch(self, other)),
        }
    }

    /// Fail unless `expected` and `actual` are structurally interchangeable.
    ///
    /// Generic variables in either descriptor match anything, provided each
    /// variable is bound consistently throughout.
    pub fn assert_is_similar(expected: &RuntimeType, actual: &RuntimeType) -> Fallible<()> {
        let mut bindings = BTreeMap::new();
        expected.unify(actual, &mut bindings)
    }

    /// The set of generic variables appearing in this descriptor.
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars(&self, vars: &mut BTreeSet<String>) {
        match self {
            Self::Var(name) => {
                vars.insert(name.clone());
            }
            Self::Scalar(_) | Self::Name(_) => {}
            Self::Nest { args, .. } | Self::Tuple(args) => {
                for arg in args {
                    arg.collect_vars(vars);
                }
            }
        }
    }

    /// Whether the descriptor contains no generic variables.
    pub fn is_concrete(&self) -> bool {
        self.free_vars().is_empty()
    }

    /// The primitive kind, if this is a scalar descriptor.
    pub fn as_scalar(&self) -> Option<ScalarKind> {
        match self {
            Self::Scalar(kind) => Some(*kind),
            _ => None,
        }
    }

    /// The origin of a generic descriptor.
    pub fn origin(&self) -> Option<&str> {
        match self {
            Self::Nest { origin, .. } => Some(origin),
            _ => None,
        }
    }

    /// The type arguments of a generic descriptor or the items of a tuple.
    pub fn args(&self) -> &[RuntimeType] {
        match self {
            Self::Nest { args, .. } | Self::Tuple(args) => args,
            _ => &[],
        }
    }

    /// The innermost scalar kind of a (possibly nested) `Vec` or `Option`.
    pub fn atom(&self) -> Option<ScalarKind> {
        match self {
            Self::Scalar(kind) => Some(*kind),
            Self::Nest { origin, args } if args.len() == 1 && (origin == "Vec" || origin == "Option") => {
                args[0].atom()
            }
            _ => None,
        }
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => f.write_str(kind.as_str()),
            Self::Name(name) | Self::Var(name) => f.write_str(name),
            Self::Nest { origin, args } => {
                write!(f, "{origin}<")?;
                write_joined(f, args)?;
                f.write_str(">")
            }
            Self::Tuple(items) => {
                f.write_str("(")?;
                write_joined(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[RuntimeType]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl std::str::FromStr for RuntimeType {
    type Err = DpgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<ScalarKind> for RuntimeType {
    fn from(kind: ScalarKind) -> Self {
        Self::Scalar(kind)
    }
}

impl From<RuntimeType> for String {
    fn from(ty: RuntimeType) -> Self {
        ty.to_string()
    }
}

impl TryFrom<String> for RuntimeType {
    type Error = DpgError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// Infer a single element type shared by every item.
fn infer_homogeneous<'a>(
    mut items: impl Iterator<Item = &'a Value>,
    container: &str,
) -> Fallible<RuntimeType> {
    let first = items.next().ok_or_else(|| {
        DpgError::UnknownType(format!("cannot infer the element type of an empty {container}"))
    })?;
    let element = RuntimeType::infer(first)?;
    for item in items {
        let other = RuntimeType::infer(item)?;
        if other != element {
            return Err(DpgError::type_mismatch(&element, &other));
        }
    }
    Ok(element)
}

/// Join the element types of a host array.
fn widen(types: Vec<RuntimeType>) -> Fallible<RuntimeType> {
    let Some(first) = types.first().cloned() else {
        return Err(DpgError::UnknownType("no element types to join".into()));
    };
    if types.iter().all(|t| *t == first) {
        return Ok(first);
    }
    let kinds: Option<Vec<ScalarKind>> = types.iter().map(RuntimeType::as_scalar).collect();
    match kinds {
        Some(kinds) if kinds.iter().all(ScalarKind::is_numeric) => {
            if kinds.iter().any(ScalarKind::is_float) {
                Ok(RuntimeType::Scalar(ScalarKind::F64))
            } else if kinds.iter().any(|k| *k == ScalarKind::U64) {
                Err(DpgError::type_mismatch("a single integer type", "u64 mixed with signed integers"))
            } else {
                Ok(RuntimeType::Scalar(ScalarKind::I64))
            }
        }
        _ => {
            let other = types.iter().find(|t| **t != first).cloned().unwrap_or_else(|| first.clone());
            Err(DpgError::type_mismatch(first, other))
        }
    }
}

// ─── Parser ──────────────────────────────────────────────────────────

/// Deepest nesting of `<..>` and `(..)` the parser accepts.
const MAX_NESTING: usize = 128;

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
    vars: &'a [&'a str],
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, vars: &'a [&'a str]) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            depth: 0,
            vars,
        }
    }

    fn error(&self, reason: impl Into<String>) -> DpgError {
        DpgError::TypeParse {
            input: self.input.to_string(),
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn parse_type(&mut self) -> Fallible<RuntimeType> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("types nest deeper than {MAX_NESTING} levels")));
        }
        self.depth += 1;
        let parsed = self.parse_term();
        self.depth -= 1;
        parsed
    }

    fn parse_term(&mut self) -> Fallible<RuntimeType> {
        self.skip_ws();
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let (items, trailing_comma) = self.parse_list(b')')?;
                if items.len() == 1 && !trailing_comma {
                    // Parenthesized grouping, not a 1-tuple.
                    Ok(items.into_iter().next().unwrap_or(RuntimeType::Tuple(vec![])))
                } else {
                    Ok(RuntimeType::Tuple(items))
                }
            }
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => {
                let start = self.pos;
                let ident = self.parse_ident();
                self.skip_ws();
                if self.peek() == Some(b'<') {
                    self.pos += 1;
                    let (args, _) = self.parse_list(b'>')?;
                    self.resolve_nest(ident, args, start)
                } else {
                    self.resolve_name(ident, start)
                }
            }
            Some(_) => Err(self.error("expected a type name or '('")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_ident(&mut self) -> &'a str {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    /// Parse a comma-separated list up to and including `close`.
    /// Returns the items and whether the list ended with a trailing comma.
    fn parse_list(&mut self, close: u8) -> Fallible<(Vec<RuntimeType>, bool)> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok((items, trailing_comma));
            }
            items.push(self.parse_type()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    trailing_comma = true;
                }
                Some(b) if b == close => {
                    self.pos += 1;
                    return Ok((items, false));
                }
                Some(_) => {
                    return Err(self.error(format!("expected ',' or '{}'", close as char)))
                }
                None => return Err(self.error("unexpected end of input")),
            }
        }
    }

    fn resolve_name(&self, ident: &str, start: usize) -> Fallible<RuntimeType> {
        if self.vars.contains(&ident) {
            return Ok(RuntimeType::Var(ident.to_string()));
        }
        if let Some(kind) = ScalarKind::from_alias(ident) {
            return Ok(RuntimeType::Scalar(kind));
        }
        if PLAIN_NAMES.contains(&ident) {
            return Ok(RuntimeType::Name(ident.to_string()));
        }
        if let Some((_, arity)) = GENERIC_ORIGINS.iter().find(|(o, _)| *o == ident) {
            return Err(DpgError::TypeParse {
                input: self.input.to_string(),
                offset: start,
                reason: format!("{ident} expects {arity} type argument(s)"),
            });
        }
        Err(DpgError::UnknownType(ident.to_string()))
    }

    fn resolve_nest(
        &self,
        ident: &str,
        args: Vec<RuntimeType>,
        start: usize,
    ) -> Fallible<RuntimeType> {
        if self.vars.contains(&ident) {
            return Err(DpgError::TypeParse {
                input: self.input.to_string(),
                offset: start,
                reason: format!("type variable {ident} cannot take arguments"),
            });
        }
        match GENERIC_ORIGINS.iter().find(|(o, _)| *o == ident) {
            Some((_, arity)) if *arity == args.len() => Ok(RuntimeType::nest(ident, args)),
            Some((_, arity)) => Err(DpgError::TypeParse {
                input: self.input.to_string(),
                offset: start,
                reason: format!(
                    "{ident} expects {arity} type argument(s), found {}",
                    args.len()
                ),
            }),
            None if PLAIN_NAMES.contains(&ident) || ScalarKind::from_alias(ident).is_some() => {
                Err(DpgError::TypeParse {
                    input: self.input.to_string(),
                    offset: start,
                    reason: format!("{ident} does not take type arguments"),
                })
            }
            None => Err(DpgError::UnknownType(ident.to_string())),
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy for generating concrete descriptors built from the known set.
    fn runtime_type() -> impl Strategy<Value = RuntimeType> {
        let leaf = prop_oneof![
            prop::sample::select(ScalarKind::all().to_vec()).prop_map(RuntimeType::Scalar),
            prop::sample::select(PLAIN_NAMES.to_vec()).prop_map(RuntimeType::name),
        ];
        leaf.prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                inner.clone().prop_map(RuntimeType::vec),
                inner.clone().prop_map(RuntimeType::option),
                (inner.clone(), inner.clone())
                    .prop_map(|(k, v)| RuntimeType::nest("HashMap", vec![k, v])),
                prop::collection::vec(inner, 0..4).prop_map(RuntimeType::Tuple),
            ]
        })
    }

    proptest! {
        /// Display output always parses back to the same descriptor.
        #[test]
        fn display_parse_roundtrip(ty in runtime_type()) {
            let printed = ty.to_string();
            let parsed = RuntimeType::parse(&printed);
            prop_assert_eq!(parsed, Ok(ty));
        }

        /// Parsing never panics, whatever the input.
        #[test]
        fn parse_never_panics(input in "\\PC{0,40}") {
            let _ = RuntimeType::parse(&input);
        }

        /// Parsing never panics on inputs built from the grammar's own tokens.
        #[test]
        fn parse_token_soup_never_panics(
            tokens in prop::collection::vec(
                prop::sample::select(vec!["Vec", "<", ">", "(", ")", ",", "i32", "f64", " ", "HashMap", "T"]),
                0..16,
            )
        ) {
            let input: String = tokens.concat();
            let _ = RuntimeType::parse_generic(&input, &["T"]);
        }

        /// A concrete descriptor is similar to itself and substitution is the identity.
        #[test]
        fn concrete_is_fixed_point(ty in runtime_type()) {
            prop_assert!(RuntimeType::assert_is_similar(&ty, &ty).is_ok());
            prop_assert_eq!(ty.substitute(&BTreeMap::new()), Ok(ty.clone()));
        }
    }
}
