//! # dpg-cli — Command-Line Host for dpg
//!
//! A host across the runtime-type boundary: every type, distance and
//! dataset arrives as a string or JSON and is resolved through
//! `dpg_core::RuntimeType` before it reaches a constructor.
//!
//! ## Subcommands
//!
//! - `dpg type parse|infer` — normalize a type descriptor, or infer one
//!   from a JSON value.
//! - `dpg pipeline check|map|invoke|calibrate` — build a pipeline file and
//!   query it.
//! - `dpg features` — show the enabled features and what they unlock.
//!
//! Exit codes: 0 success, 1 the queried relation does not hold, 2
//! operational error.
//!
//! ## Crate Policy
//!
//! - Argument parsing lives here; graph semantics live in the library
//!   crates.
//! - Errors are `anyhow` with context at this edge only.

pub mod config;
pub mod features;
pub mod pipeline;
pub mod types;

use anyhow::{Context, Result};

use dpg_core::{RuntimeType, Value};

/// Exit code for a relation that does not hold.
pub const EXIT_DOES_NOT_HOLD: u8 = 1;

/// Exit code for an operational error.
pub const EXIT_ERROR: u8 = 2;

/// Parse `text` as JSON and decode it as a value of type `ty`.
pub fn parse_value(text: &str, ty: &RuntimeType, what: &str) -> Result<Value> {
    let json: serde_json::Value =
        serde_json::from_str(text).with_context(|| format!("{what} is not valid JSON: {text}"))?;
    Value::from_json(&json, ty).with_context(|| format!("{what} is not a {ty}"))
}
