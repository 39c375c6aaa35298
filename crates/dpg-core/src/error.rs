//! # Error Types — Structured Error Hierarchy
//!
//! Defines the single error type used throughout dpg. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Construction errors are returned before any object becomes observable.
//!   There is no partially-built `Transformation` or `Measurement`.
//! - Type errors carry the expected and the actual descriptor, rendered
//!   with the same syntax `RuntimeType::parse` accepts.
//! - A relation that does not hold is never downgraded to a warning.

use thiserror::Error;

/// Result alias used by every fallible operation in the workspace.
pub type Fallible<T> = Result<T, DpgError>;

/// Top-level error type for dpg.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DpgError {
    /// Two stages could not be chained or composed because their
    /// domains, metrics, or measures differ structurally.
    #[error("domain mismatch: {0}")]
    DomainMismatch(String),

    /// A value or descriptor did not have the required runtime type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The descriptor that was required.
        expected: String,
        /// The descriptor that was supplied.
        found: String,
    },

    /// A type name is syntactically valid but not supported.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// A type string could not be parsed.
    #[error("failed to parse type {input:?} at offset {offset}: {reason}")]
    TypeParse {
        /// The full input string.
        input: String,
        /// Byte offset at which parsing failed.
        offset: usize,
        /// What the parser expected.
        reason: String,
    },

    /// A generic descriptor still contains a variable with no binding.
    #[error("unresolved type variable: {0}")]
    UnresolvedTypeVariable(String),

    /// A metric was paired with a domain it cannot measure.
    #[error("incompatible metric space: {0}")]
    MetricSpace(String),

    /// A relation failed a sanity check, or a required relation does not hold.
    #[error("relation violation: {0}")]
    RelationViolation(String),

    /// The function raised while being invoked.
    #[error("invocation failed: {0}")]
    InvocationFailure(String),

    /// A constructor requires a feature that is not enabled.
    #[error("feature {0:?} is not enabled")]
    FeatureDisabled(String),

    /// A constructor argument is out of range or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Arithmetic overflowed while computing a bound.
    #[error("numeric overflow: {0}")]
    Overflow(String),
}

impl DpgError {
    /// Convenience constructor for [`DpgError::TypeMismatch`].
    pub fn type_mismatch(expected: impl ToString, found: impl ToString) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Short machine-readable name of the error variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DomainMismatch(_) => "DomainMismatch",
            Self::TypeMismatch { .. } => "TypeMismatch",
            Self::UnknownType(_) => "UnknownType",
            Self::TypeParse { .. } => "TypeParse",
            Self::UnresolvedTypeVariable(_) => "UnresolvedTypeVariable",
            Self::MetricSpace(_) => "MetricSpace",
            Self::RelationViolation(_) => "RelationViolation",
            Self::InvocationFailure(_) => "InvocationFailure",
            Self::FeatureDisabled(_) => "FeatureDisabled",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::Overflow(_) => "Overflow",
        }
    }
}
