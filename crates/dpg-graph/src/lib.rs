//! # dpg-graph — The Computation-Graph Object Model
//!
//! A pipeline is a chain of [`Transformation`]s ending in a
//! [`Measurement`], each carrying a relation between input and output
//! distances. Combinators build bigger stages from smaller ones and compose
//! their relations, so the privacy guarantee of a whole pipeline can be
//! checked before any data is touched.
//!
//! | Module | Combinator |
//! |---|---|
//! | [`chain`] | sequential application (`make_chain_tt`, `make_chain_tm`, `make_chain_mp`, `>>`) |
//! | [`compose`] | parallel release on one input (`make_basic_composition` and friends) |
//! | [`cast`] | change of privacy measure, amplification by subsampling |
//! | [`user`] | stages from trusted caller closures |
//! | [`calibrate`] | parameter search against a budget |
//!
//! ## Crate Policy
//!
//! - Depends only on `dpg-core`.
//! - `check` and `map` are pure and do not log; construction sites log at
//!   `debug` via `tracing`.
//! - Every constructed object is immutable, `Clone`, `Send` and `Sync`.

pub mod calibrate;
pub mod cast;
pub mod chain;
pub mod compose;
pub mod function;
pub mod measurement;
pub mod relation;
pub mod transformation;
pub mod user;

pub use calibrate::{binary_search, binary_search_chain, binary_search_param, SearchOptions};
pub use cast::{
    make_population_amplification, make_pure_dp_to_fixed_approx_dp, make_pure_dp_to_zcdp,
    make_zcdp_to_approx_dp,
};
pub use chain::{make_chain_mp, make_chain_tm, make_chain_tt};
pub use compose::{make_basic_composition, make_composition_with_rule, make_sequential_composition};
pub use function::Function;
pub use measurement::Measurement;
pub use relation::Relation;
pub use transformation::Transformation;
pub use user::{make_user_measurement, make_user_transformation};
