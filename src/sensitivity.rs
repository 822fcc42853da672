#![warn(missing_docs)]
//! Sensitivity of a solved beam path to placement errors.
//!
//! Every free slot position `x` is displaced by `±h` and the overlap with the target waist is re-evaluated. The
//! degradation rate of a coordinate is `max(0, O − O(x+h), O − O(x−h)) / h` and the total score is the root sum
//! square of all rates (in 1/m). A lower score means a more robust solution. A free target position (non-degenerate
//! target interval) is perturbed the same way, moving the target waist with it. Slots with a degenerate interval are
//! not perturbed.
use crate::{
    chooser::Solution,
    error::{MmResult, ModeMatchError},
    millimeter,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uom::si::f64::Length;

/// Settings of the sensitivity analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityConfig {
    /// displacement applied to each free position
    pub step: Length,
    /// also displace the seed waist position
    pub include_seed: bool,
}
impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            step: millimeter!(1.0),
            include_seed: false,
        }
    }
}

/// Combined degradation rate of the overlap together with the contribution of each perturbed coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityScore {
    value: f64,
    contributions: Vec<(String, f64)>,
}
impl SensitivityScore {
    fn new(contributions: Vec<(String, f64)>) -> Self {
        let value = contributions
            .iter()
            .fold(0.0, |acc, (_, rate)| rate.mul_add(*rate, acc))
            .sqrt();
        Self {
            value,
            contributions,
        }
    }
    /// Returns the combined score (in 1/m).
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }
    /// Returns the degradation rate per perturbed coordinate (slot name, `target` or `seed`).
    #[must_use]
    pub fn contributions(&self) -> &[(String, f64)] {
        &self.contributions
    }
}
impl Display for SensitivityScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4e} 1/m", self.value)
    }
}

fn degradation_rate<F>(reference: f64, step: Length, mut overlap_at: F) -> MmResult<f64>
where
    F: FnMut(Length) -> MmResult<f64>,
{
    let plus = overlap_at(step)?;
    let minus = overlap_at(-step)?;
    Ok((reference - plus).max(reference - minus).max(0.0) / step.value)
}

/// Calculate the placement sensitivity of a [`Solution`].
///
/// Only the solved beam path is used; the result does not depend on how the solution was found.
///
/// # Errors
///
/// This function will return an error if
///   - the step is not positive and finite ([`ModeMatchError::InvalidInput`]).
///   - a perturbed configuration is non-physical ([`ModeMatchError::InvalidBeamState`]).
pub fn sensitivity(solution: &Solution, config: &SensitivityConfig) -> MmResult<SensitivityScore> {
    if !config.step.is_finite() || config.step.value <= 0.0 {
        return Err(ModeMatchError::InvalidInput(
            "sensitivity step must be > 0.0 and finite".into(),
        ));
    }
    let base = solution.base_path();
    let target = solution.target();
    let components = solution.slot_components();
    let reference = base.overlap_with(&components, target)?;
    let mut contributions = Vec::new();
    for (index, assignment) in solution.assignments().iter().enumerate() {
        if assignment.bounds().is_degenerate() {
            continue;
        }
        let position = components[index].position();
        let rate = degradation_rate(reference, config.step, |delta| {
            let mut perturbed = components.clone();
            perturbed[index] = components[index].placed_at(position + delta)?;
            base.overlap_with(&perturbed, target)
        })?;
        contributions.push((assignment.slot().to_owned(), rate));
    }
    if solution
        .target_bounds()
        .is_some_and(|bounds| !bounds.is_degenerate())
    {
        let position = target.position();
        let rate = degradation_rate(reference, config.step, |delta| {
            base.overlap_with(&components, &target.moved_to(position + delta)?)
        })?;
        contributions.push(("target".into(), rate));
    }
    if config.include_seed {
        let seed = base.seed()?;
        let rate = degradation_rate(reference, config.step, |delta| {
            let mut moved = base.clone();
            moved.set_seed_waist(seed.radius(), seed.position() + delta)?;
            moved.overlap_with(&components, target)
        })?;
        contributions.push(("seed".into(), rate));
    }
    let score = SensitivityScore::new(contributions);
    debug!("sensitivity: {score}");
    Ok(score)
}
