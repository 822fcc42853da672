//! Box constrained Nelder-Mead minimization of the free positions.
//!
//! The simplex search is [`argmin`]'s [`NelderMead`]. Coordinates with a degenerate interval (`min == max`) are removed
//! before the simplex is built and keep their value. All other coordinates are clamped into their interval before the
//! objective is evaluated, so the objective never sees a point outside the box. A failing objective evaluation marks
//! the point as infinitely bad; the search continues and the first error is reported with the [`Minimum`].
use crate::{
    error::{MmResult, ModeMatchError},
    utils::math_utils::clamp_to,
};
use argmin::{
    core::{CostFunction, Error, Executor, State, TerminationReason, TerminationStatus},
    solver::neldermead::NelderMead,
};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// Settings of the bounded Nelder-Mead minimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// maximum number of simplex iterations
    pub max_iterations: usize,
    /// the search has converged once the standard deviation of the objective values over the simplex drops below
    /// this value
    pub sd_tolerance: f64,
    /// size of the initial simplex as fraction of each interval width
    pub initial_step_fraction: f64,
}
impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 400,
            sd_tolerance: 1.0e-14,
            initial_step_fraction: 0.1,
        }
    }
}
impl OptimizerConfig {
    /// Check the settings for plausibility.
    ///
    /// # Errors
    ///
    /// This function will return an error if the tolerance is negative or not finite or the step fraction is not in
    /// `(0, 1]`.
    pub fn validate(&self) -> MmResult<()> {
        if !self.sd_tolerance.is_finite() || self.sd_tolerance < 0.0 {
            return Err(ModeMatchError::InvalidInput(
                "optimizer tolerance must be >= 0.0 and finite".into(),
            ));
        }
        if !(self.initial_step_fraction > 0.0 && self.initial_step_fraction <= 1.0) {
            return Err(ModeMatchError::InvalidInput(
                "initial step fraction must be in (0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    /// best point found (all coordinates, including fixed ones)
    pub point: Vec<f64>,
    /// objective value at `point`
    pub value: f64,
    /// number of simplex iterations performed
    pub iterations: usize,
    /// `true` if the tolerance was met before the iteration cap
    pub converged: bool,
    /// number of objective evaluations returning an error
    pub failed_evaluations: usize,
    /// first error returned by the objective
    pub first_failure: Option<ModeMatchError>,
}

/// Objective restricted to the free coordinates of a box.
struct BoxedObjective<'a, F> {
    objective: &'a F,
    origin: &'a [f64],
    bounds: &'a [(f64, f64)],
    free: &'a [usize],
    failures: &'a RefCell<(usize, Option<ModeMatchError>)>,
}
impl<F> CostFunction for BoxedObjective<'_, F>
where
    F: Fn(&[f64]) -> MmResult<f64>,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, Error> {
        match (self.objective)(&expand(self.origin, self.bounds, self.free, param)) {
            Ok(value) if value.is_nan() => Ok(f64::INFINITY),
            Ok(value) => Ok(value),
            Err(e) => {
                let mut failures = self.failures.borrow_mut();
                failures.0 += 1;
                if failures.1.is_none() {
                    failures.1 = Some(e);
                }
                Ok(f64::INFINITY)
            }
        }
    }
}

/// Nelder-Mead minimizer with box constraints.
#[derive(Debug, Clone, Default)]
pub struct BoundedNelderMead {
    config: OptimizerConfig,
}
impl BoundedNelderMead {
    /// Creates a new [`BoundedNelderMead`].
    #[must_use]
    pub const fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }
    /// Minimize `objective` starting at `start` inside `bounds`.
    ///
    /// The returned point is never worse than the (clamped) start point. The objective is only evaluated on points
    /// inside the bounds.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - `start` and `bounds` differ in length.
    ///   - no point with a finite objective value was found. The first objective error is returned in this case.
    ///   - the underlying solver fails.
    pub fn minimize<F>(&self, objective: F, start: &[f64], bounds: &[(f64, f64)]) -> MmResult<Minimum>
    where
        F: Fn(&[f64]) -> MmResult<f64>,
    {
        if start.len() != bounds.len() {
            return Err(ModeMatchError::InvalidInput(
                "start point and bounds differ in dimension".into(),
            ));
        }
        let origin: Vec<f64> = start
            .iter()
            .zip(bounds)
            .map(|(x, (min, max))| clamp_to(*x, *min, *max))
            .collect();
        let free: Vec<usize> = (0..bounds.len())
            .filter(|i| bounds[*i].0 < bounds[*i].1)
            .collect();
        if free.is_empty() {
            let value = objective(&origin)?;
            return Ok(Minimum {
                point: origin,
                value,
                iterations: 0,
                converged: true,
                failed_evaluations: 0,
                first_failure: None,
            });
        }
        let failures = RefCell::new((0, None));
        let problem = BoxedObjective {
            objective: &objective,
            origin: &origin,
            bounds,
            free: &free,
            failures: &failures,
        };
        let solver = NelderMead::new(self.initial_simplex(&origin, bounds, &free))
            .with_sd_tolerance(self.config.sd_tolerance)?;
        let result = Executor::new(problem, solver)
            .configure(|state| state.max_iters(self.config.max_iterations as u64))
            .run()?;
        let state = result.state();
        let (failed_evaluations, first_failure) = failures.take();
        let value = state.get_best_cost();
        if !value.is_finite() {
            return Err(first_failure.unwrap_or_else(|| {
                ModeMatchError::Other("objective has no finite value inside the bounds".into())
            }));
        }
        let best = state
            .get_best_param()
            .ok_or_else(|| ModeMatchError::Other("optimizer did not report a best point".into()))?;
        let point = expand(&origin, bounds, &free, best);
        Ok(Minimum {
            point,
            value,
            iterations: usize::try_from(state.get_iter()).unwrap_or(usize::MAX),
            converged: matches!(
                state.get_termination_status(),
                TerminationStatus::Terminated(TerminationReason::SolverConverged)
            ),
            failed_evaluations,
            first_failure,
        })
    }
    /// Start point plus one vertex per free coordinate, displaced by a fraction of the interval width towards the
    /// interior.
    fn initial_simplex(&self, origin: &[f64], bounds: &[(f64, f64)], free: &[usize]) -> Vec<Vec<f64>> {
        let start: Vec<f64> = free.iter().map(|i| origin[*i]).collect();
        let mut simplex = vec![start.clone()];
        for (k, i) in free.iter().enumerate() {
            let (min, max) = bounds[*i];
            let step = self.config.initial_step_fraction * (max - min);
            let mut vertex = start.clone();
            vertex[k] = if vertex[k] + step <= max {
                vertex[k] + step
            } else {
                vertex[k] - step
            };
            simplex.push(vertex);
        }
        simplex
    }
}

/// Full point with the free coordinates taken from `reduced`, clamped into the box.
fn expand(origin: &[f64], bounds: &[(f64, f64)], free: &[usize], reduced: &[f64]) -> Vec<f64> {
    let mut full = origin.to_vec();
    for (x, i) in reduced.iter().zip(free) {
        let (min, max) = bounds[*i];
        full[*i] = clamp_to(*x, min, max);
    }
    full
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;
    use std::cell::Cell;
    #[test]
    fn config_validate() {
        assert!(OptimizerConfig::default().validate().is_ok());
        let config = OptimizerConfig {
            sd_tolerance: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = OptimizerConfig {
            sd_tolerance: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = OptimizerConfig {
            initial_step_fraction: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
    #[test]
    fn quadratic_interior_minimum() {
        let nm = BoundedNelderMead::default();
        let min = nm
            .minimize(
                |x| Ok((x[0] - 0.3).powi(2) + 2.0 * (x[1] + 0.1).powi(2)),
                &[0.0, 0.0],
                &[(-1.0, 1.0), (-1.0, 1.0)],
            )
            .unwrap();
        assert!(min.converged);
        assert_eq!(min.failed_evaluations, 0);
        assert_abs_diff_eq!(min.point[0], 0.3, epsilon = 1e-5);
        assert_abs_diff_eq!(min.point[1], -0.1, epsilon = 1e-5);
        assert_abs_diff_eq!(min.value, 0.0, epsilon = 1e-9);
    }
    #[test]
    fn minimum_on_boundary() {
        let nm = BoundedNelderMead::default();
        let outside = Cell::new(false);
        let min = nm
            .minimize(
                |x| {
                    if !(0.0..=0.5).contains(&x[0]) {
                        outside.set(true);
                    }
                    Ok((x[0] - 2.0).powi(2))
                },
                &[0.25],
                &[(0.0, 0.5)],
            )
            .unwrap();
        assert!(!outside.get());
        assert_abs_diff_eq!(min.point[0], 0.5, epsilon = 1e-7);
    }
    #[test]
    fn degenerate_interval_is_fixed() {
        let nm = BoundedNelderMead::default();
        let touched = RefCell::new(Vec::new());
        let min = nm
            .minimize(
                |x| {
                    touched.borrow_mut().push(x[1]);
                    Ok((x[0] - 0.2).powi(2) + (x[1] - 1.0).powi(2))
                },
                &[0.0, 0.4],
                &[(-1.0, 1.0), (0.4, 0.4)],
            )
            .unwrap();
        assert!(touched.borrow().iter().all(|x| *x == 0.4));
        assert_eq!(min.point[1], 0.4);
        assert_abs_diff_eq!(min.point[0], 0.2, epsilon = 1e-5);
    }
    #[test]
    fn all_fixed() {
        let nm = BoundedNelderMead::default();
        let calls = Cell::new(0);
        let min = nm
            .minimize(
                |x| {
                    calls.set(calls.get() + 1);
                    Ok(x[0])
                },
                &[0.7],
                &[(0.7, 0.7)],
            )
            .unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(min.iterations, 0);
        assert_eq!(min.point, vec![0.7]);
    }
    #[test]
    fn never_worse_than_start() {
        let nm = BoundedNelderMead::new(OptimizerConfig {
            max_iterations: 2,
            ..Default::default()
        });
        let objective = |x: &[f64]| Ok((10.0 * x[0]).sin() + x[1] * x[1]);
        let start = [0.1, 0.3];
        let start_value = (1.0_f64).sin() + 0.09;
        let min = nm
            .minimize(objective, &start, &[(-1.0, 1.0), (-1.0, 1.0)])
            .unwrap();
        assert!(!min.converged);
        assert_eq!(min.iterations, 2);
        assert!(min.value <= start_value);
    }
    #[test]
    fn failing_region_keeps_best_point() {
        let nm = BoundedNelderMead::default();
        let min = nm
            .minimize(
                |x| {
                    if x[0] > 0.6 {
                        Err(ModeMatchError::InvalidBeamState("test".into()))
                    } else {
                        Ok((x[0] - 0.8).powi(2))
                    }
                },
                &[0.25],
                &[(0.0, 1.0)],
            )
            .unwrap();
        assert!(min.point[0] <= 0.6);
        assert_abs_diff_eq!(min.point[0], 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(min.value, 0.04, epsilon = 1e-6);
        assert!(min.failed_evaluations > 0);
        assert_matches!(min.first_failure, Some(ModeMatchError::InvalidBeamState(_)));
    }
    #[test]
    fn objective_error_is_propagated() {
        let nm = BoundedNelderMead::default();
        let result = nm.minimize(
            |_| Err(ModeMatchError::InvalidBeamState("test".into())),
            &[0.0],
            &[(-1.0, 1.0)],
        );
        assert_matches!(result, Err(ModeMatchError::InvalidBeamState(_)));
        let result = nm.minimize(
            |_| Err(ModeMatchError::InvalidBeamState("test".into())),
            &[0.0],
            &[(0.0, 0.0)],
        );
        assert_matches!(result, Err(ModeMatchError::InvalidBeamState(_)));
    }
    #[test]
    fn dimension_mismatch() {
        let nm = BoundedNelderMead::default();
        assert!(nm.minimize(|_| Ok(0.0), &[0.0, 1.0], &[(-1.0, 1.0)]).is_err());
    }
}
