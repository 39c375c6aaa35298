//! # Features Subcommand
//!
//! Print the enabled feature set and, for each catalog constructor, the
//! features it requires and whether the current configuration allows it.

use anyhow::Result;
use clap::Args;

use dpg_catalog::ConstructorRegistry;
use dpg_core::{Feature, FeatureSet};

/// Arguments for `dpg features`.
#[derive(Args, Debug)]
pub struct FeaturesArgs {
    /// Also list catalog constructors and their gates.
    #[arg(long)]
    pub constructors: bool,
}

/// Execute the features subcommand.
pub fn run_features(args: &FeaturesArgs, features: &FeatureSet) -> Result<u8> {
    for line in render(features, args.constructors.then(ConstructorRegistry::with_catalog).as_ref()) {
        println!("{line}");
    }
    Ok(0)
}

fn render(features: &FeatureSet, registry: Option<&ConstructorRegistry>) -> Vec<String> {
    let mut lines: Vec<String> = Feature::all()
        .iter()
        .map(|f| {
            let mark = if features.is_enabled(*f) { "on " } else { "off" };
            format!("{mark} {f}")
        })
        .collect();
    if let Some(registry) = registry {
        lines.push(String::new());
        for constructor in registry.iter() {
            let available = features.require_all(constructor.features).is_ok();
            let gates: Vec<&str> = constructor.features.iter().map(Feature::as_str).collect();
            lines.push(format!(
                "{:<12} [{}] {}{}",
                constructor.name,
                gates.join(", "),
                constructor.summary,
                if available { "" } else { " (disabled)" }
            ));
        }
    }
    lines
}
