//! # Chaining
//!
//! Sequential composition of stages. The chained function applies the
//! stages in order; the chained relation feeds the first stage's bound into
//! the second's, so `check` on a chain never invokes any function.
//!
//! ## Security Invariant
//!
//! Two stages are joined only when the first's output space is structurally
//! equal to the second's input space: same domain (kinds, bounds, size) and
//! same metric. Anything else is `DomainMismatch`, and no object is produced.
//!
//! The `>>` operator is sugar for the constructors here and is defined on
//! `Fallible<Transformation>` too, so pipelines read left to right:
//!
//! ```ignore
//! let meas = (clamp >> sum)? >> laplace;
//! let meas = (clamp >> sum >> laplace)?;
//! ```

use std::ops::Shr;

use dpg_core::{DpgError, Fallible, MetricSpace, RuntimeType};

use crate::function::Function;
use crate::measurement::Measurement;
use crate::relation::Relation;
use crate::transformation::Transformation;

fn check_spaces_match(output: &MetricSpace, input: &MetricSpace) -> Fallible<()> {
    if output != input {
        return Err(DpgError::DomainMismatch(format!(
            "output space {output} of the first stage does not match input space {input} of the second"
        )));
    }
    Ok(())
}

/// `first` followed by `second`.
pub fn make_chain_tt(first: &Transformation, second: &Transformation) -> Fallible<Transformation> {
    check_spaces_match(first.output_space(), second.input_space())?;
    tracing::debug!(
        input = %first.input_space(),
        via = %first.output_space(),
        output = %second.output_space(),
        "chaining transformations"
    );
    Transformation::new(
        first.input_space().clone(),
        second.output_space().clone(),
        Function::make_chain(second.function(), first.function())?,
        Relation::make_chain(second.stability_map(), first.stability_map()),
    )
}

/// `first` followed by the release `measurement`.
pub fn make_chain_tm(first: &Transformation, measurement: &Measurement) -> Fallible<Measurement> {
    check_spaces_match(first.output_space(), measurement.input_space())?;
    tracing::debug!(
        input = %first.input_space(),
        via = %first.output_space(),
        measure = %measurement.output_measure(),
        "chaining transformation into measurement"
    );
    Measurement::new(
        first.input_space().clone(),
        measurement.output_measure(),
        Function::make_chain(measurement.function(), first.function())?,
        Relation::make_chain(measurement.privacy_map(), first.stability_map()),
    )
}

/// Postprocess the release of `measurement` with `postprocessor`.
///
/// Postprocessing cannot increase privacy loss, so the privacy relation is
/// unchanged; only the output type is replaced.
///
/// # Errors
///
/// `TypeMismatch` if `postprocessor` does not accept the release type.
pub fn make_chain_mp(measurement: &Measurement, postprocessor: &Function) -> Fallible<Measurement> {
    RuntimeType::assert_is_similar(postprocessor.input_type(), measurement.output_type())?;
    tracing::debug!(
        from = %measurement.output_type(),
        to = %postprocessor.output_type(),
        "postprocessing measurement"
    );
    Measurement::new(
        measurement.input_space().clone(),
        measurement.output_measure(),
        Function::make_chain(postprocessor, measurement.function())?,
        measurement.privacy_map().clone(),
    )
}

impl Shr<Transformation> for Transformation {
    type Output = Fallible<Transformation>;

    fn shr(self, rhs: Transformation) -> Self::Output {
        make_chain_tt(&self, &rhs)
    }
}

impl Shr<Measurement> for Transformation {
    type Output = Fallible<Measurement>;

    fn shr(self, rhs: Measurement) -> Self::Output {
        make_chain_tm(&self, &rhs)
    }
}

impl Shr<Function> for Measurement {
    type Output = Fallible<Measurement>;

    fn shr(self, rhs: Function) -> Self::Output {
        make_chain_mp(&self, &rhs)
    }
}

impl Shr<Transformation> for Fallible<Transformation> {
    type Output = Fallible<Transformation>;

    fn shr(self, rhs: Transformation) -> Self::Output {
        make_chain_tt(&self?, &rhs)
    }
}

impl Shr<Measurement> for Fallible<Transformation> {
    type Output = Fallible<Measurement>;

    fn shr(self, rhs: Measurement) -> Self::Output {
        make_chain_tm(&self?, &rhs)
    }
}

impl Shr<Function> for Fallible<Measurement> {
    type Output = Fallible<Measurement>;

    fn shr(self, rhs: Function) -> Self::Output {
        make_chain_mp(&self?, &rhs)
    }
}
