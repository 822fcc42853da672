#![warn(missing_docs)]
//! Combinatorial component search.
//!
//! The [`ComponentChooser`] enumerates the Cartesian product of all slot candidate lists. Each combination is
//! first evaluated with every component placed at the midpoint of its interval (feasibility pre-check). Combinations
//! reaching [`SearchSpace::min_overlap`] are then optimized with a [`BoundedNelderMead`] over the free positions
//! (slot positions and, if free, the target position) maximizing the overlap with the target waist. Combinations
//! are independent and evaluated in parallel.
//!
//! A combination failing the pre-check with a non-physical beam is dropped. Placements hit during the optimization
//! that lead to a non-physical beam are skipped: the combination keeps the best placement found and a warning is
//! logged. With [`ChooserConfig::hard_fail`] both cases abort the search instead.
pub mod optimizer;
mod search_space;
mod solution;

pub use optimizer::{BoundedNelderMead, Minimum, OptimizerConfig};
pub use search_space::{PositionBounds, SearchSpace, Slot};
pub use solution::{SlotAssignment, Solution};

use crate::{
    beam_path::{BeamPath, Waist},
    component::Component,
    error::{MmResult, ModeMatchError},
    sensitivity::{SensitivityConfig, SensitivityScore},
};
use itertools::Itertools;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use uom::si::{f64::Length, length::meter};

/// Settings of a component search.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChooserConfig {
    /// settings of the position optimizer
    pub optimizer: OptimizerConfig,
    /// abort the search on the first combination with a non-physical beam instead of dropping it
    pub hard_fail: bool,
}
impl ChooserConfig {
    /// Read a [`ChooserConfig`] from a YAML string. Missing fields are set to their default values.
    ///
    /// # Errors
    ///
    /// This function will return an error if the string cannot be parsed or the settings are invalid.
    pub fn from_yaml(yaml: &str) -> MmResult<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| {
            ModeMatchError::InvalidInput(format!("parsing of chooser config failed: {e}"))
        })?;
        config.optimizer.validate()?;
        Ok(config)
    }
    /// Serialize this [`ChooserConfig`] to a YAML string.
    ///
    /// # Errors
    ///
    /// This function will return an error if the serialization fails.
    pub fn to_yaml(&self) -> MmResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| ModeMatchError::Other(format!("serialization of chooser config failed: {e}")))
    }
}

/// Solutions of a component search, one per optimized combination.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChooserOutcome {
    solutions: Vec<Solution>,
}
impl ChooserOutcome {
    /// Creates a new [`ChooserOutcome`].
    #[must_use]
    pub const fn new(solutions: Vec<Solution>) -> Self {
        Self { solutions }
    }
    /// Returns the solutions.
    #[must_use]
    pub fn solutions(&self) -> &[Solution] {
        &self.solutions
    }
    /// Returns the overlaps of the solutions (same order as [`ChooserOutcome::solutions`]).
    #[must_use]
    pub fn overlaps(&self) -> Vec<f64> {
        self.solutions.iter().map(Solution::overlap).collect()
    }
    /// Returns the number of solutions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.solutions.len()
    }
    /// Returns `true` if no combination survived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }
    /// Split into solutions and their overlaps.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Solution>, Vec<f64>) {
        let overlaps = self.overlaps();
        (self.solutions, overlaps)
    }
    /// Sort the solutions by decreasing overlap.
    pub fn sort_by_overlap(&mut self) {
        self.solutions
            .sort_by(|a, b| b.overlap().total_cmp(&a.overlap()));
    }
    /// Keep only solutions reaching the given (final) overlap threshold.
    #[must_use]
    pub fn filter_by_overlap(self, min_overlap: f64) -> Self {
        Self {
            solutions: self
                .solutions
                .into_iter()
                .filter(|s| s.overlap() >= min_overlap)
                .collect(),
        }
    }
    /// Returns the solution with the highest overlap.
    #[must_use]
    pub fn best(&self) -> Option<&Solution> {
        self.solutions
            .iter()
            .max_by(|a, b| a.overlap().total_cmp(&b.overlap()))
    }
    /// Returns the solutions together with their sensitivity, most robust first.
    ///
    /// # Errors
    ///
    /// This function will return an error if the sensitivity of a solution cannot be calculated.
    pub fn ranked_by_sensitivity(
        &self,
        config: &SensitivityConfig,
    ) -> MmResult<Vec<(&Solution, SensitivityScore)>> {
        let mut ranked = self
            .solutions
            .iter()
            .map(|s| Ok((s, s.position_sensitivity_with(config)?)))
            .collect::<MmResult<Vec<_>>>()?;
        ranked.sort_by(|a, b| a.1.value().total_cmp(&b.1.value()));
        Ok(ranked)
    }
}
impl IntoIterator for ChooserOutcome {
    type Item = Solution;
    type IntoIter = std::vec::IntoIter<Solution>;

    fn into_iter(self) -> Self::IntoIter {
        self.solutions.into_iter()
    }
}

enum Evaluation {
    Solved(Solution, Option<(String, usize, ModeMatchError)>),
    Pruned,
    Failed(String, ModeMatchError),
}

/// One candidate combination with its free coordinates.
///
/// The coordinate vector holds one position per slot followed by the target position (all in m).
struct Trial<'a> {
    path: &'a BeamPath,
    target: &'a Waist,
    target_bounds: Option<&'a PositionBounds>,
    slots: Vec<(&'a Slot, &'a Component)>,
}
impl<'a> Trial<'a> {
    fn new(
        path: &'a BeamPath,
        target: &'a Waist,
        search_space: &'a SearchSpace,
        combination: &[usize],
    ) -> Self {
        let slots = search_space
            .slots()
            .iter()
            .zip(combination)
            .map(|(slot, index)| (slot, &slot.candidates().candidates()[*index]))
            .collect();
        Self {
            path,
            target,
            target_bounds: search_space.target_bounds(),
            slots,
        }
    }
    fn label(&self) -> String {
        if self.slots.is_empty() {
            return "(no slots)".into();
        }
        self.slots
            .iter()
            .map(|(slot, component)| format!("{}={}", slot.name(), component.label()))
            .join(", ")
    }
    fn bounds(&self) -> Vec<(f64, f64)> {
        let target = self.target.position().value;
        self.slots
            .iter()
            .map(|(slot, _)| slot.bounds().as_meter())
            .chain(std::iter::once(
                self.target_bounds
                    .map_or((target, target), PositionBounds::as_meter),
            ))
            .collect()
    }
    fn start(&self) -> Vec<f64> {
        self.slots
            .iter()
            .map(|(slot, _)| slot.bounds().midpoint().value)
            .chain(std::iter::once(
                self.target_bounds
                    .map_or(self.target.position(), PositionBounds::midpoint)
                    .value,
            ))
            .collect()
    }
    fn placed(&self, point: &[f64]) -> MmResult<(Vec<Component>, Waist)> {
        let components = self
            .slots
            .iter()
            .zip(point)
            .map(|((_, component), x)| component.placed_at(Length::new::<meter>(*x)))
            .collect::<MmResult<Vec<_>>>()?;
        let target = self
            .target
            .moved_to(Length::new::<meter>(point[self.slots.len()]))?;
        Ok((components, target))
    }
    fn overlap(&self, point: &[f64]) -> MmResult<f64> {
        let (components, target) = self.placed(point)?;
        self.path.overlap_with(&components, &target)
    }
    fn solution(&self, point: &[f64]) -> MmResult<Solution> {
        let (components, target) = self.placed(point)?;
        let overlap = self.path.overlap_with(&components, &target)?;
        let assignments = self
            .slots
            .iter()
            .zip(components)
            .map(|((slot, _), component)| {
                SlotAssignment::new(slot.name().to_owned(), component, *slot.bounds())
            })
            .collect();
        Solution::new(
            self.path,
            assignments,
            target,
            self.target_bounds.copied(),
            overlap,
        )
    }
}

/// Searches the combination of slot candidates and positions best matching a seed beam onto a target waist.
#[derive(Debug, Clone, Default)]
pub struct ComponentChooser {
    config: ChooserConfig,
}
impl ComponentChooser {
    /// Creates a new [`ComponentChooser`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the optimizer settings are invalid.
    pub fn new(config: ChooserConfig) -> MmResult<Self> {
        config.optimizer.validate()?;
        Ok(Self { config })
    }
    /// Returns the configuration of this [`ComponentChooser`].
    #[must_use]
    pub const fn config(&self) -> &ChooserConfig {
        &self.config
    }
    /// Run the search for the given beam path (seed waist, fixed components, target waist).
    ///
    /// An empty candidate list or a pre-check pruning all combinations yields an empty outcome. Combinations leading
    /// to a non-physical beam are dropped with a warning unless [`ChooserConfig::hard_fail`] is set. The final
    /// overlaps are not filtered again (see [`ChooserOutcome::filter_by_overlap`]).
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - the path has no seed or target waist ([`ModeMatchError::InvalidInput`]).
    ///   - a slot interval starts before the seed waist ([`ModeMatchError::OutOfBoundsPosition`]).
    ///   - `hard_fail` is set and a combination is non-physical at the pre-check or during the optimization
    ///     ([`ModeMatchError::InvalidBeamState`]).
    pub fn choose(&self, path: &BeamPath, search_space: &SearchSpace) -> MmResult<ChooserOutcome> {
        let seed = path.seed()?;
        let target = path.target()?;
        search_space.validate(seed.position())?;
        let combinations = Self::combinations(search_space);
        info!(
            "Searching {} component combinations for {} slots",
            combinations.len(),
            search_space.slots().len()
        );
        if combinations.is_empty() {
            return Ok(ChooserOutcome::default());
        }
        let evaluations: Vec<Evaluation> = if self.config.hard_fail {
            combinations
                .par_iter()
                .map(|c| match self.evaluate(path, target, search_space, c) {
                    Evaluation::Failed(_, e) => Err(e),
                    evaluation => Ok(evaluation),
                })
                .collect::<MmResult<Vec<_>>>()?
        } else {
            combinations
                .par_iter()
                .map(|c| self.evaluate(path, target, search_space, c))
                .collect()
        };
        let mut solutions = Vec::new();
        let mut nr_of_pruned = 0;
        for evaluation in evaluations {
            match evaluation {
                Evaluation::Solved(solution, skipped) => {
                    if let Some((label, nr_of_failures, e)) = skipped {
                        warn!("Combination {label}: skipped {nr_of_failures} non-physical placements during optimization: {e}");
                    }
                    solutions.push(solution);
                }
                Evaluation::Pruned => nr_of_pruned += 1,
                Evaluation::Failed(label, e) => {
                    warn!("Dropping combination {label}: {e}");
                }
            }
        }
        info!(
            "{} combinations pruned by pre-check (min overlap {}), {} solutions found",
            nr_of_pruned,
            search_space.min_overlap(),
            solutions.len()
        );
        Ok(ChooserOutcome::new(solutions))
    }
    fn combinations(search_space: &SearchSpace) -> Vec<Vec<usize>> {
        if search_space.slots().is_empty() {
            return vec![Vec::new()];
        }
        search_space
            .slots()
            .iter()
            .map(|s| 0..s.candidates().len())
            .multi_cartesian_product()
            .collect()
    }
    fn evaluate(
        &self,
        path: &BeamPath,
        target: &Waist,
        search_space: &SearchSpace,
        combination: &[usize],
    ) -> Evaluation {
        let trial = Trial::new(path, target, search_space, combination);
        let label = trial.label();
        let start = trial.start();
        let precheck = match trial.overlap(&start) {
            Ok(overlap) => overlap,
            Err(e) => return Evaluation::Failed(label, e),
        };
        debug!("{label}: pre-check overlap {precheck:.4}");
        if precheck < search_space.min_overlap() {
            return Evaluation::Pruned;
        }
        let optimizer = BoundedNelderMead::new(self.config.optimizer.clone());
        let minimum = match optimizer.minimize(
            |x| trial.overlap(x).map(|o| 1.0 - o),
            &start,
            &trial.bounds(),
        ) {
            Ok(minimum) => minimum,
            Err(e) => return Evaluation::Failed(label, e),
        };
        debug!(
            "{label}: overlap {:.6} after {} iterations (converged: {})",
            1.0 - minimum.value,
            minimum.iterations,
            minimum.converged
        );
        let skipped = match minimum.first_failure {
            Some(e) if self.config.hard_fail => return Evaluation::Failed(label, e),
            Some(e) => Some((label.clone(), minimum.failed_evaluations, e)),
            None => None,
        };
        match trial.solution(&minimum.point) {
            Ok(solution) => Evaluation::Solved(solution, skipped),
            Err(e) => Evaluation::Failed(label, e),
        }
    }
}
