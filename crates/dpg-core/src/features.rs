//! # Feature Gates
//!
//! Some constructors are only sound under assumptions the caller must opt
//! into explicitly:
//!
//! - `contrib`: constructors whose proofs have not been vetted.
//! - `floating-point`: mechanisms whose float sampling is vulnerable to
//!   floating-point side channels.
//! - `honest-but-curious`: constructors that trust caller-supplied functions
//!   or parameters (user-defined stages, population amplification).
//!
//! ## Security Invariant
//!
//! There is no process-wide switch. A [`FeatureSet`] is passed to every
//! gated constructor, which fails with `FeatureDisabled` unless the required
//! features are present. The default set is empty.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DpgError, Fallible};

/// An opt-in capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    Contrib,
    FloatingPoint,
    HonestButCurious,
}

impl Feature {
    pub fn all() -> &'static [Feature] {
        &[Self::Contrib, Self::FloatingPoint, Self::HonestButCurious]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contrib => "contrib",
            Self::FloatingPoint => "floating-point",
            Self::HonestButCurious => "honest-but-curious",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = DpgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| DpgError::InvalidArgument(format!("unknown feature: {s:?}")))
    }
}

/// The set of enabled features.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet {
    enabled: BTreeSet<Feature>,
}

impl FeatureSet {
    /// No features enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every feature enabled.
    pub fn all() -> Self {
        Self {
            enabled: Feature::all().iter().copied().collect(),
        }
    }

    /// Parse a list of feature names.
    pub fn from_names<I, S>(names: I) -> Fallible<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let enabled = names
            .into_iter()
            .map(|n| n.as_ref().trim().parse())
            .collect::<Fallible<_>>()?;
        Ok(Self { enabled })
    }

    /// Builder-style [`FeatureSet::enable`].
    pub fn with(mut self, feature: Feature) -> Self {
        self.enable(feature);
        self
    }

    pub fn enable(&mut self, feature: Feature) {
        self.enabled.insert(feature);
    }

    pub fn disable(&mut self, feature: Feature) {
        self.enabled.remove(&feature);
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.enabled.contains(&feature)
    }

    /// Fail with `FeatureDisabled` unless `feature` is enabled.
    pub fn require(&self, feature: Feature) -> Fallible<()> {
        if self.is_enabled(feature) {
            Ok(())
        } else {
            Err(DpgError::FeatureDisabled(feature.as_str().to_string()))
        }
    }

    /// Fail with `FeatureDisabled` naming the first missing feature.
    pub fn require_all(&self, features: &[Feature]) -> Fallible<()> {
        features.iter().try_for_each(|f| self.require(*f))
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        self.enabled.iter().copied()
    }

    /// Union of two sets.
    pub fn union(&self, other: &FeatureSet) -> FeatureSet {
        Self {
            enabled: self.enabled.union(&other.enabled).copied().collect(),
        }
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|f| f.as_str()).collect();
        f.write_str(&names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        let features = FeatureSet::default();
        for f in Feature::all() {
            assert!(!features.is_enabled(*f));
            assert_eq!(
                features.require(*f),
                Err(DpgError::FeatureDisabled(f.as_str().to_string()))
            );
        }
    }

    #[test]
    fn test_enable_disable() {
        let mut features = FeatureSet::new().with(Feature::Contrib);
        assert!(features.require(Feature::Contrib).is_ok());
        assert!(features
            .require_all(&[Feature::Contrib, Feature::FloatingPoint])
            .is_err());
        features.enable(Feature::FloatingPoint);
        assert!(features
            .require_all(&[Feature::Contrib, Feature::FloatingPoint])
            .is_ok());
        features.disable(Feature::Contrib);
        assert!(features.require(Feature::Contrib).is_err());
    }

    #[test]
    fn test_from_names() {
        let features = FeatureSet::from_names(["contrib", " honest-but-curious"]).unwrap();
        assert_eq!(features.to_string(), "contrib,honest-but-curious");
        assert!(FeatureSet::from_names(["telepathy"]).is_err());
    }

    #[test]
    fn test_serde_as_list() {
        let features = FeatureSet::all();
        let yaml = serde_json::to_string(&features).unwrap();
        assert_eq!(yaml, r#"["contrib","floating-point","honest-but-curious"]"#);
        let back: FeatureSet = serde_json::from_str(&yaml).unwrap();
        assert_eq!(back, features);
        assert!(serde_json::from_str::<FeatureSet>(r#"["nope"]"#).is_err());
    }
}
