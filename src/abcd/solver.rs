//! Search for an ABCD matrix mapping a given input beam onto a desired output beam.
//!
//! The matrix is parametrized by `A`, `B` and `C` while `D = (1 + B·C) / A` keeps the determinant at one. The
//! parameters are found by a seeded differential evolution (best/1/bin) inside caller supplied bounds. A found
//! matrix can be decomposed into an equivalent system of free space, thin lens and free space ([`GapLensGap`]).
use super::AbcdMatrix;
use crate::{
    beam::GaussianBeam,
    error::{MmResult, ModeMatchError},
};
use log::{info, warn};
use num::complex::Complex64;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uom::si::{f64::Length, length::meter};

/// Configuration of the differential evolution used by the [`AbcdSolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbcdSolverConfig {
    /// number of parameter vectors per generation (at least 4)
    pub population_size: usize,
    /// maximum number of generations
    pub max_generations: usize,
    /// differential weight `F` in `[0, 2]`
    pub differential_weight: f64,
    /// crossover probability in `[0, 1]`
    pub crossover_probability: f64,
    /// the search stops as soon as the relative residual `|q_calc - q_out| / |q_out|` drops below this value
    pub tolerance: f64,
    /// seed of the random number generator
    pub seed: u64,
}
impl Default for AbcdSolverConfig {
    fn default() -> Self {
        Self {
            population_size: 40,
            max_generations: 1000,
            differential_weight: 0.7,
            crossover_probability: 0.9,
            tolerance: 1.0e-10,
            seed: 42,
        }
    }
}

/// Closed search intervals for the `A`, `B` (in m) and `C` (in 1/m) elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbcdBounds {
    bounds: [(f64, f64); 3],
}
impl AbcdBounds {
    /// Creates new [`AbcdBounds`].
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - an interval is not finite or its lower bound is larger than the upper bound.
    ///   - the interval of `A` contains zero.
    pub fn new(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> MmResult<Self> {
        for (name, (lower, upper)) in [("A", a), ("B", b), ("C", c)] {
            if !lower.is_finite() || !upper.is_finite() || lower > upper {
                return Err(ModeMatchError::InvalidInput(format!(
                    "interval for {name} must be finite and ordered"
                )));
            }
        }
        if a.0 <= 0.0 && a.1 >= 0.0 {
            return Err(ModeMatchError::InvalidInput(
                "interval for A must not contain 0.0".into(),
            ));
        }
        Ok(Self { bounds: [a, b, c] })
    }
}

/// Result of an ABCD matrix search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbcdSolution {
    matrix: AbcdMatrix,
    residual: f64,
    generations: usize,
}
impl AbcdSolution {
    /// Returns the found matrix.
    #[must_use]
    pub const fn matrix(&self) -> &AbcdMatrix {
        &self.matrix
    }
    /// Returns the relative residual `|q_calc - q_out| / |q_out|` of the found matrix.
    #[must_use]
    pub const fn residual(&self) -> f64 {
        self.residual
    }
    /// Returns the number of generations evaluated.
    #[must_use]
    pub const fn generations(&self) -> usize {
        self.generations
    }
    /// Returns `true` if the residual reached the configured tolerance.
    #[must_use]
    pub fn converged(&self, config: &AbcdSolverConfig) -> bool {
        self.residual <= config.tolerance
    }
}

/// Differential evolution search for an ABCD matrix.
#[derive(Debug, Default, Clone)]
pub struct AbcdSolver {
    config: AbcdSolverConfig,
}
impl AbcdSolver {
    /// Creates a new [`AbcdSolver`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the population is smaller than 4 or the weights are out of range.
    pub fn new(config: AbcdSolverConfig) -> MmResult<Self> {
        if config.population_size < 4 {
            return Err(ModeMatchError::InvalidInput(
                "population size must be >= 4".into(),
            ));
        }
        if !(0.0..=2.0).contains(&config.differential_weight)
            || !(0.0..=1.0).contains(&config.crossover_probability)
        {
            return Err(ModeMatchError::InvalidInput(
                "differential weight must be in [0,2] and crossover probability in [0,1]".into(),
            ));
        }
        Ok(Self { config })
    }
    /// Returns the configuration of this [`AbcdSolver`].
    #[must_use]
    pub const fn config(&self) -> &AbcdSolverConfig {
        &self.config
    }
    fn matrix_from(x: &[f64; 3]) -> AbcdMatrix {
        let [a, b, c] = *x;
        AbcdMatrix::new(a, b, c, b.mul_add(c, 1.0) / a)
    }
    fn residual(x: &[f64; 3], q_in: Complex64, q_out: Complex64) -> f64 {
        Self::matrix_from(x)
            .transform(q_in)
            .map_or(f64::INFINITY, |q| (q - q_out).norm() / q_out.norm())
    }
    fn random_in(rng: &mut StdRng, (lower, upper): (f64, f64)) -> f64 {
        (upper - lower).mul_add(rng.random::<f64>(), lower)
    }
    /// Search a unit-determinant matrix transforming `input` into `output`.
    ///
    /// The search is deterministic for a given configuration (seed).
    ///
    /// # Errors
    ///
    /// This function will return an error if the wavelengths of the two beams differ.
    pub fn solve(
        &self,
        input: &GaussianBeam,
        output: &GaussianBeam,
        bounds: &AbcdBounds,
    ) -> MmResult<AbcdSolution> {
        let (lambda_in, lambda_out) = (input.wavelength().value, output.wavelength().value);
        if ((lambda_in - lambda_out) / lambda_in).abs() > 1.0e-9 {
            return Err(ModeMatchError::InvalidInput(
                "input and output beam must have the same wavelength".into(),
            ));
        }
        let (q_in, q_out) = (input.q(), output.q());
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let size = self.config.population_size;
        let mut population: Vec<[f64; 3]> = (0..size)
            .map(|_| {
                [
                    Self::random_in(&mut rng, bounds.bounds[0]),
                    Self::random_in(&mut rng, bounds.bounds[1]),
                    Self::random_in(&mut rng, bounds.bounds[2]),
                ]
            })
            .collect();
        let mut fitness: Vec<f64> = population
            .iter()
            .map(|x| Self::residual(x, q_in, q_out))
            .collect();
        let mut generations = 0;
        while generations < self.config.max_generations {
            if Self::best_index(&fitness).1 <= self.config.tolerance {
                break;
            }
            generations += 1;
            for i in 0..size {
                let best = Self::best_index(&fitness).0;
                let (r1, r2) = Self::pick_two(&mut rng, size, i);
                let forced = rng.random_range(0..3);
                let mut trial = population[i];
                for j in 0..3 {
                    if j == forced || rng.random::<f64>() < self.config.crossover_probability {
                        let (lower, upper) = bounds.bounds[j];
                        let value = self
                            .config
                            .differential_weight
                            .mul_add(population[r1][j] - population[r2][j], population[best][j]);
                        trial[j] = value.clamp(lower, upper);
                    }
                }
                let trial_fitness = Self::residual(&trial, q_in, q_out);
                if trial_fitness <= fitness[i] {
                    population[i] = trial;
                    fitness[i] = trial_fitness;
                }
            }
        }
        let (best, residual) = Self::best_index(&fitness);
        if residual > self.config.tolerance {
            warn!(
                "ABCD search did not reach tolerance after {generations} generations (residual {residual:.3e})"
            );
        } else {
            info!("ABCD search finished after {generations} generations (residual {residual:.3e})");
        }
        Ok(AbcdSolution {
            matrix: Self::matrix_from(&population[best]),
            residual,
            generations,
        })
    }
    fn best_index(fitness: &[f64]) -> (usize, f64) {
        fitness
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::INFINITY), |acc, (i, f)| {
                if f < acc.1 {
                    (i, f)
                } else {
                    acc
                }
            })
    }
    /// Two distinct random indices different from `exclude`.
    fn pick_two(rng: &mut StdRng, size: usize, exclude: usize) -> (usize, usize) {
        let mut r1 = rng.random_range(0..size);
        while r1 == exclude {
            r1 = rng.random_range(0..size);
        }
        let mut r2 = rng.random_range(0..size);
        while r2 == exclude || r2 == r1 {
            r2 = rng.random_range(0..size);
        }
        (r1, r2)
    }
}

/// Equivalent system of a free space gap, a thin lens and another free space gap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GapLensGap {
    distance_before: Length,
    focal_length: Length,
    distance_after: Length,
}
impl GapLensGap {
    /// Decompose a unit-determinant matrix into `d1`, `f` and `d2`.
    ///
    /// For `M = [[1 - d2/f, d1 + d2 - d1·d2/f], [-1/f, 1 - d1/f]]` this yields `f = -1/C`, `d1 = (D - 1)/C` and
    /// `d2 = (A - 1)/C`.
    ///
    /// # Errors
    ///
    /// This function will return an error if `C` is zero (afocal system) or the determinant differs from one.
    pub fn from_matrix(matrix: &AbcdMatrix) -> MmResult<Self> {
        let c = matrix.c();
        if c == 0.0 || !c.is_finite() {
            return Err(ModeMatchError::InvalidInput(
                "an afocal system (C = 0) cannot be decomposed into a single lens".into(),
            ));
        }
        if (matrix.determinant() - 1.0).abs() > 1.0e-9 {
            return Err(ModeMatchError::InvalidInput(
                "only matrices with unit determinant can be decomposed".into(),
            ));
        }
        Ok(Self {
            distance_before: Length::new::<meter>((matrix.d() - 1.0) / c),
            focal_length: Length::new::<meter>(-1.0 / c),
            distance_after: Length::new::<meter>((matrix.a() - 1.0) / c),
        })
    }
    /// Returns the free space distance before the lens.
    #[must_use]
    pub fn distance_before(&self) -> Length {
        self.distance_before
    }
    /// Returns the focal length of the lens.
    #[must_use]
    pub fn focal_length(&self) -> Length {
        self.focal_length
    }
    /// Returns the free space distance after the lens.
    #[must_use]
    pub fn distance_after(&self) -> Length {
        self.distance_after
    }
    /// Returns the matrix of this system.
    #[must_use]
    pub fn matrix(&self) -> AbcdMatrix {
        AbcdMatrix::free_space(self.distance_before.value)
            .then(&AbcdMatrix::thin_lens(self.focal_length.value))
            .then(&AbcdMatrix::free_space(self.distance_after.value))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{meter, micrometer, nanometer};
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;

    fn input_beam() -> GaussianBeam {
        GaussianBeam::from_waist(micrometer!(200.0), meter!(0.0), nanometer!(1064.0)).unwrap()
    }
    #[test]
    fn bounds() {
        assert!(AbcdBounds::new((0.1, 2.0), (-1.0, 1.0), (-20.0, -1.0)).is_ok());
        assert!(AbcdBounds::new((-2.0, -0.1), (-1.0, 1.0), (-20.0, -1.0)).is_ok());
        assert_matches!(
            AbcdBounds::new((-0.1, 2.0), (-1.0, 1.0), (-20.0, -1.0)),
            Err(ModeMatchError::InvalidInput(_))
        );
        assert!(AbcdBounds::new((0.1, 2.0), (1.0, -1.0), (-20.0, -1.0)).is_err());
        assert!(AbcdBounds::new((0.1, 2.0), (-1.0, 1.0), (f64::NAN, -1.0)).is_err());
    }
    #[test]
    fn solver_new() {
        assert!(AbcdSolver::new(AbcdSolverConfig::default()).is_ok());
        let config = AbcdSolverConfig {
            population_size: 3,
            ..Default::default()
        };
        assert!(AbcdSolver::new(config).is_err());
        let config = AbcdSolverConfig {
            crossover_probability: 1.5,
            ..Default::default()
        };
        assert!(AbcdSolver::new(config).is_err());
    }
    #[test]
    fn solve_known_system() {
        let system = AbcdMatrix::new(0.5, 0.15, -10.0, -1.0);
        let input = input_beam();
        let output = system.apply(&input).unwrap();
        let bounds = AbcdBounds::new((0.1, 2.0), (-1.0, 1.0), (-20.0, -1.0)).unwrap();
        let solver = AbcdSolver::default();
        let solution = solver.solve(&input, &output, &bounds).unwrap();
        assert!(solution.converged(solver.config()));
        assert!(solution.generations() < solver.config().max_generations);
        assert_abs_diff_eq!(solution.matrix().determinant(), 1.0, epsilon = 1e-9);
        let q = solution.matrix().transform(input.q()).unwrap();
        assert_abs_diff_eq!(q.re, output.q().re, epsilon = 1e-8);
        assert_abs_diff_eq!(q.im, output.q().im, epsilon = 1e-8);
    }
    #[test]
    fn solve_is_deterministic() {
        let input = input_beam();
        let output = AbcdMatrix::new(0.5, 0.15, -10.0, -1.0)
            .apply(&input)
            .unwrap();
        let bounds = AbcdBounds::new((0.1, 2.0), (-1.0, 1.0), (-20.0, -1.0)).unwrap();
        let solver = AbcdSolver::default();
        let first = solver.solve(&input, &output, &bounds).unwrap();
        let second = solver.solve(&input, &output, &bounds).unwrap();
        assert_eq!(first, second);
    }
    #[test]
    fn solve_wavelength_mismatch() {
        let input = input_beam();
        let output =
            GaussianBeam::from_waist(micrometer!(200.0), meter!(0.0), nanometer!(532.0)).unwrap();
        let bounds = AbcdBounds::new((0.1, 2.0), (-1.0, 1.0), (-20.0, -1.0)).unwrap();
        assert_matches!(
            AbcdSolver::default().solve(&input, &output, &bounds),
            Err(ModeMatchError::InvalidInput(_))
        );
    }
    #[test]
    fn decompose() {
        let system = GapLensGap {
            distance_before: meter!(0.2),
            focal_length: meter!(0.1),
            distance_after: meter!(0.05),
        };
        let matrix = system.matrix();
        assert_abs_diff_eq!(matrix.a(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(matrix.b(), 0.15, epsilon = 1e-12);
        assert_abs_diff_eq!(matrix.c(), -10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(matrix.d(), -1.0, epsilon = 1e-12);
        let decomposed = GapLensGap::from_matrix(&matrix).unwrap();
        assert_abs_diff_eq!(decomposed.distance_before().value, 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(decomposed.focal_length().value, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(decomposed.distance_after().value, 0.05, epsilon = 1e-12);
    }
    #[test]
    fn decompose_invalid() {
        assert!(GapLensGap::from_matrix(&AbcdMatrix::free_space(1.0)).is_err());
        assert!(GapLensGap::from_matrix(&AbcdMatrix::new(2.0, 0.0, -1.0, 2.0)).is_err());
    }
}
