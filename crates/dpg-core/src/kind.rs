//! # Scalar Kinds — The Closed Primitive Set
//!
//! `ScalarKind` enumerates every primitive carrier type a domain, metric, or
//! function may be instantiated over. It is the ONE list used by the type
//! parser, the value layer, and the constructor registry. Every `match` on
//! `ScalarKind` is exhaustive, so adding a primitive forces every dispatch
//! site to handle it.
//!
//! ## Security Invariant
//!
//! Types outside this set are rejected at construction with
//! `DpgError::UnknownType`. There is no fallback to an opaque "any" type,
//! so a relation can never be checked against a carrier it was not written
//! for.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::DpgError;

/// The primitive carrier types supported by dpg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScalarKind {
    /// `bool`
    #[serde(rename = "bool")]
    Bool,
    /// `i32`
    #[serde(rename = "i32")]
    I32,
    /// `i64`
    #[serde(rename = "i64")]
    I64,
    /// `u32`
    #[serde(rename = "u32")]
    U32,
    /// `u64`
    #[serde(rename = "u64")]
    U64,
    /// `usize`
    #[serde(rename = "usize")]
    Usize,
    /// `f32`
    #[serde(rename = "f32")]
    F32,
    /// `f64`
    #[serde(rename = "f64")]
    F64,
    /// `String`
    #[serde(rename = "String")]
    String,
}

/// Total number of scalar kinds.
pub const SCALAR_KIND_COUNT: usize = 9;

impl ScalarKind {
    /// Returns all scalar kinds in canonical order.
    pub fn all() -> &'static [ScalarKind] {
        &[
            Self::Bool,
            Self::I32,
            Self::I64,
            Self::U32,
            Self::U64,
            Self::Usize,
            Self::F32,
            Self::F64,
            Self::String,
        ]
    }

    /// The Rust spelling of the type, as accepted by `RuntimeType::parse`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::Usize => "usize",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::String => "String",
        }
    }

    /// Whether values of this kind support arithmetic.
    pub fn is_numeric(&self) -> bool {
        match self {
            Self::Bool | Self::String => false,
            Self::I32 | Self::I64 | Self::U32 | Self::U64 | Self::Usize | Self::F32 | Self::F64 => {
                true
            }
        }
    }

    /// Whether this kind is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Whether this kind is an integer type.
    pub fn is_integer(&self) -> bool {
        self.is_numeric() && !self.is_float()
    }

    /// Whether values of this kind may serve as map keys.
    ///
    /// Floats are excluded because they have no total equality.
    pub fn is_hashable(&self) -> bool {
        !self.is_float()
    }

    /// Resolve a host-language alias or Rust spelling to a kind.
    ///
    /// Host bindings without native generics spell types loosely:
    /// `int` is `i32`, `float` is `f64`, `str` is `String`.
    pub fn from_alias(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Self::I32),
            "float" => Some(Self::F64),
            "str" => Some(Self::String),
            other => other.parse().ok(),
        }
    }
}

impl std::fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalarKind {
    type Err = DpgError;

    /// Parse a scalar kind from its exact Rust spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" => Ok(Self::Bool),
            "i32" => Ok(Self::I32),
            "i64" => Ok(Self::I64),
            "u32" => Ok(Self::U32),
            "u64" => Ok(Self::U64),
            "usize" => Ok(Self::Usize),
            "f32" => Ok(Self::F32),
            "f64" => Ok(Self::F64),
            "String" => Ok(Self::String),
            other => Err(DpgError::UnknownType(format!(
                "unsupported primitive type: {other:?}"
            ))),
        }
    }
}
