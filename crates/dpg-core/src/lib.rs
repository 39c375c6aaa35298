//! # dpg-core — Foundational Types for Privacy Computation Graphs
//!
//! This crate defines the vocabulary every other dpg crate is typed over:
//! the domain/metric/measure algebra, the runtime type descriptors that
//! make pipelines buildable over primitives chosen at run time, and the
//! conservative arithmetic that privacy bounds are computed with. It
//! depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Closed primitive set.** `ScalarKind` is the one list of supported
//!    carriers. `RuntimeType`, `Value`, and every dispatch macro match on it
//!    exhaustively. Anything else is `UnknownType`.
//!
//! 2. **Structural descriptors.** `RuntimeType` is `Name | Nest | Tuple |
//!    Var`; it parses and prints in Rust syntax (`Vec<i32>`, `(f64, f64)`)
//!    and is the only thing compared at chain and compose boundaries.
//!
//! 3. **Validated metric spaces.** A `Metric` is only usable inside a
//!    `MetricSpace`, whose constructor rejects pairings the metric is
//!    undefined on.
//!
//! 4. **Round toward +∞.** Every bound is computed with `arith::inf_*`, so
//!    floating-point error never under-reports privacy loss.
//!
//! 5. **Explicit feature gates.** `FeatureSet` is a value passed to gated
//!    constructors, never global state.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `dpg-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod arith;
pub mod domain;
pub mod error;
pub mod features;
pub mod kind;
pub mod measure;
pub mod metric;
pub mod ty;
pub mod value;

// Re-export primary types for ergonomic imports.
pub use arith::Number;
pub use domain::Domain;
pub use error::{DpgError, Fallible};
pub use features::{Feature, FeatureSet};
pub use kind::{ScalarKind, SCALAR_KIND_COUNT};
pub use measure::{AdvancedComposition, BasicComposition, CompositionRule, PrivacyMeasure};
pub use metric::{Metric, MetricSpace};
pub use ty::RuntimeType;
pub use value::{Carrier, Primitive, Value};
