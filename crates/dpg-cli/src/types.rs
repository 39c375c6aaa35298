//! # Type Subcommand
//!
//! `dpg type parse <DESCRIPTOR>` prints the normalized descriptor.
//! `dpg type infer <JSON> [--type T]` prints the descriptor the JSON value
//! would be decoded as, using `--type` instead of inference when given.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use dpg_core::{RuntimeType, Value};

/// Arguments for `dpg type`.
#[derive(Args, Debug)]
pub struct TypeArgs {
    #[command(subcommand)]
    pub command: TypeCommand,
}

#[derive(Subcommand, Debug)]
pub enum TypeCommand {
    /// Parse and normalize a type descriptor, e.g. `Vec<float>`.
    Parse {
        #[arg(value_name = "DESCRIPTOR")]
        descriptor: String,
    },
    /// Infer the type of a JSON value.
    Infer {
        #[arg(value_name = "JSON")]
        json: String,
        /// Explicit type; the value is decoded against it instead.
        #[arg(long = "type", value_name = "DESCRIPTOR")]
        type_name: Option<String>,
    },
}

/// Execute the type subcommand.
pub fn run_type(args: &TypeArgs) -> Result<u8> {
    let line = match &args.command {
        TypeCommand::Parse { descriptor } => parse_descriptor(descriptor)?,
        TypeCommand::Infer { json, type_name } => infer_descriptor(json, type_name.as_deref())?,
    };
    println!("{line}");
    Ok(0)
}

fn parse_descriptor(descriptor: &str) -> Result<String> {
    let ty = RuntimeType::parse(descriptor)?;
    tracing::debug!(input = descriptor, parsed = %ty, "parsed descriptor");
    Ok(ty.to_string())
}

fn infer_descriptor(json: &str, type_name: Option<&str>) -> Result<String> {
    let value: serde_json::Value =
        serde_json::from_str(json).with_context(|| format!("not valid JSON: {json}"))?;
    let ty = RuntimeType::parse_or_infer_json(type_name, &value)?;
    // decoding confirms an explicit type actually fits the value
    Value::from_json(&value, &ty).with_context(|| format!("value does not fit {ty}"))?;
    Ok(ty.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_aliases() {
        assert_eq!(parse_descriptor("Vec<float>").unwrap(), "Vec<f64>");
        assert_eq!(parse_descriptor("(int, str)").unwrap(), "(i32, String)");
        assert!(parse_descriptor("Vec<i32").is_err());
    }

    #[test]
    fn test_infer() {
        assert_eq!(infer_descriptor("[1, 2.5]", None).unwrap(), "Vec<f64>");
        assert_eq!(infer_descriptor("[1, 2]", None).unwrap(), "Vec<i32>");
        assert_eq!(infer_descriptor("[1, 2]", Some("Vec<u64>")).unwrap(), "Vec<u64>");
        assert!(infer_descriptor("[1, -2]", Some("Vec<u64>")).is_err());
        assert!(infer_descriptor("[]", None).is_err());
    }

    #[test]
    fn test_run_type_exit_code() {
        let args = TypeArgs {
            command: TypeCommand::Parse {
                descriptor: "Option<i64>".into(),
            },
        };
        assert_eq!(run_type(&args).unwrap(), 0);
    }
}
