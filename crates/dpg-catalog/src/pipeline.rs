//! # Declarative Pipelines
//!
//! A [`PipelineSpec`] describes an input space and a list of stages in YAML
//! or JSON. Building it resolves each stage through the
//! [`ConstructorRegistry`] on the output space of the stage before it and
//! chains the results, so the file never names a type the data already
//! determines.
//!
//! ```yaml
//! input:
//!   domain: { kind: vector, element: { kind: atom, type: f64 } }
//!   metric: SymmetricDistance
//! stages:
//!   - constructor: clamp
//!     args: { bounds: [0.0, 100.0] }
//!   - constructor: bounded_sum
//!   - constructor: laplace
//!     args: { scale: 10.0 }
//! ```
//!
//! A `compose` stage builds one measurement per branch on the current space
//! and composes them; a `cast` stage rewrites the privacy measure of the
//! measurement before it. Nothing but casts may follow a measurement.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use dpg_core::{Domain, DpgError, Fallible, FeatureSet, Metric, MetricSpace, RuntimeType, ScalarKind, Value};
use dpg_graph::{
    make_basic_composition, make_chain_tm, make_chain_tt, make_population_amplification,
    make_pure_dp_to_fixed_approx_dp, make_pure_dp_to_zcdp, make_zcdp_to_approx_dp, Measurement,
};

use crate::registry::{ConstructorRegistry, Stage};

/// A serializable description of a [`Domain`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainSpec {
    Atom {
        #[serde(rename = "type")]
        ty: String,
        #[serde(default)]
        nan: bool,
    },
    Interval {
        #[serde(rename = "type")]
        ty: String,
        lower: Json,
        upper: Json,
    },
    Vector {
        element: Box<DomainSpec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<usize>,
    },
    Option {
        element: Box<DomainSpec>,
    },
    Map {
        key: Box<DomainSpec>,
        value: Box<DomainSpec>,
    },
}

impl DomainSpec {
    pub fn build(&self) -> Fallible<Domain> {
        match self {
            Self::Atom { ty, nan: false } => Ok(Domain::atom(scalar_kind(ty)?)),
            Self::Atom { ty, nan: true } => Domain::atom_with_nan(scalar_kind(ty)?),
            Self::Interval { ty, lower, upper } => {
                let kind = scalar_kind(ty)?;
                let carrier = RuntimeType::scalar(kind);
                Domain::interval(
                    kind,
                    Value::from_json(lower, &carrier)?,
                    Value::from_json(upper, &carrier)?,
                )
            }
            Self::Vector { element, size: None } => Ok(Domain::vector(element.build()?)),
            Self::Vector {
                element,
                size: Some(n),
            } => Ok(Domain::sized_vector(element.build()?, *n)),
            Self::Option { element } => Ok(Domain::option(element.build()?)),
            Self::Map { key, value } => Domain::map(key.build()?, value.build()?),
        }
    }
}

fn scalar_kind(name: &str) -> Fallible<ScalarKind> {
    RuntimeType::parse(name)?
        .as_scalar()
        .ok_or_else(|| DpgError::UnknownType(format!("{name} is not a primitive type")))
}

/// The input domain and metric of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceSpec {
    pub domain: DomainSpec,
    /// A metric descriptor such as `SymmetricDistance` or
    /// `AbsoluteDistance<f64>`.
    pub metric: String,
}

impl SpaceSpec {
    pub fn build(&self) -> Fallible<MetricSpace> {
        let metric = Metric::from_descriptor(&RuntimeType::parse(&self.metric)?)?;
        MetricSpace::new(self.domain.build()?, metric)
    }
}

/// A change of privacy measure applied to the preceding measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cast", rename_all = "snake_case")]
pub enum CastSpec {
    PureDpToFixedApproxDp,
    PureDpToZcdp,
    ZcdpToApproxDp { delta: f64 },
    PopulationAmplification { population_size: usize },
}

impl CastSpec {
    pub fn apply(&self, measurement: &Measurement, features: &FeatureSet) -> Fallible<Measurement> {
        match self {
            Self::PureDpToFixedApproxDp => make_pure_dp_to_fixed_approx_dp(measurement, features),
            Self::PureDpToZcdp => make_pure_dp_to_zcdp(measurement, features),
            Self::ZcdpToApproxDp { delta } => make_zcdp_to_approx_dp(measurement, *delta, features),
            Self::PopulationAmplification { population_size } => {
                make_population_amplification(measurement, *population_size, features)
            }
        }
    }
}

/// One entry of a pipeline's stage list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageSpec {
    /// Parallel branches, each ending in a measurement, composed into one.
    Compose { compose: Vec<Vec<StageSpec>> },
    Cast(CastSpec),
    /// A registry constructor applied to the current space.
    Constructor {
        constructor: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        args: Map<String, Json>,
    },
}

/// A complete pipeline description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub input: SpaceSpec,
    pub stages: Vec<StageSpec>,
}

impl PipelineSpec {
    pub fn from_yaml(text: &str) -> Fallible<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| DpgError::InvalidArgument(format!("invalid pipeline: {e}")))
    }

    pub fn from_json(text: &str) -> Fallible<Self> {
        serde_json::from_str(text)
            .map_err(|e| DpgError::InvalidArgument(format!("invalid pipeline: {e}")))
    }

    /// Build the pipeline into a single stage.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty stage list or a stage out of place;
    /// construction and chaining errors propagate unchanged.
    pub fn build(&self, registry: &ConstructorRegistry, features: &FeatureSet) -> Fallible<Stage> {
        let input = self.input.build()?;
        let stage = build_stages(input, &self.stages, registry, features)?;
        tracing::debug!(stages = self.stages.len(), pipeline = %stage, "built pipeline");
        Ok(stage)
    }
}

fn build_stages(
    input: MetricSpace,
    stages: &[StageSpec],
    registry: &ConstructorRegistry,
    features: &FeatureSet,
) -> Fallible<Stage> {
    let mut current: Option<Stage> = None;
    for (index, spec) in stages.iter().enumerate() {
        current = Some(match (current.take(), spec) {
            (Some(Stage::Measurement(m)), StageSpec::Cast(cast)) => {
                Stage::Measurement(cast.apply(&m, features)?)
            }
            (_, StageSpec::Cast(_)) => {
                return Err(DpgError::InvalidArgument(format!(
                    "stage {index}: a cast must follow a measurement"
                )))
            }
            (Some(Stage::Measurement(_)), _) => {
                return Err(DpgError::InvalidArgument(format!(
                    "stage {index}: only casts may follow a measurement"
                )))
            }
            (previous, StageSpec::Compose { compose }) => {
                let space = next_input(previous.as_ref(), &input);
                let branches = compose
                    .iter()
                    .map(|branch| build_stages(space.clone(), branch, registry, features)?.into_measurement())
                    .collect::<Fallible<Vec<_>>>()?;
                tracing::debug!(index, branches = branches.len(), "composing branches");
                append(previous, make_basic_composition(&branches, features)?.into())?
            }
            (previous, StageSpec::Constructor { constructor, args }) => {
                let space = next_input(previous.as_ref(), &input);
                let stage = registry.build(constructor, &space, args, features)?;
                append(previous, stage)?
            }
        });
    }
    current.ok_or_else(|| DpgError::InvalidArgument("pipeline has no stages".into()))
}

fn next_input(previous: Option<&Stage>, input: &MetricSpace) -> MetricSpace {
    match previous {
        Some(Stage::Transformation(t)) => t.output_space().clone(),
        _ => input.clone(),
    }
}

fn append(previous: Option<Stage>, next: Stage) -> Fallible<Stage> {
    match (previous, next) {
        (None, next) => Ok(next),
        (Some(Stage::Transformation(t0)), Stage::Transformation(t1)) => {
            make_chain_tt(&t0, &t1).map(Stage::from)
        }
        (Some(Stage::Transformation(t)), Stage::Measurement(m)) => {
            make_chain_tm(&t, &m).map(Stage::from)
        }
        (Some(Stage::Measurement(_)), _) => Err(DpgError::InvalidArgument(
            "only casts may follow a measurement".into(),
        )),
    }
}
