//! # dpg-catalog — Stages, Registry, Pipelines
//!
//! Concrete instances of the graph abstraction, and the machinery that lets
//! a host build them by name.
//!
//! | Module | Contents |
//! |---|---|
//! | [`trans`] | `make_clamp`, `make_bounded_sum`, `make_count` |
//! | [`meas`] | `make_laplace` (pure DP), `make_gaussian` (zCDP) |
//! | [`noise`] | per-type noise samplers |
//! | [`registry`] | string-keyed constructor dispatch over runtime types |
//! | [`pipeline`] | YAML/JSON pipeline descriptions |
//!
//! Every constructor requires the `contrib` feature. Noise on floats also
//! requires `floating-point`.
//!
//! ## Crate Policy
//!
//! - Depends on `dpg-core` and `dpg-graph` only among workspace crates.
//! - Randomness is drawn inside `invoke`, from `rand::thread_rng()`.

pub mod meas;
pub mod noise;
pub mod pipeline;
pub mod registry;
pub mod trans;

pub use meas::{make_gaussian, make_laplace};
pub use noise::{GaussianNoise, LaplaceNoise};
pub use pipeline::{CastSpec, DomainSpec, PipelineSpec, SpaceSpec, StageSpec};
pub use registry::{BuildContext, Constructor, ConstructorRegistry, Stage, TypeParam};
pub use trans::{make_bounded_sum, make_clamp, make_count};
