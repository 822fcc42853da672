#![warn(missing_docs)]
//! Beam width fitter
//!
//! Infers the waist radius and the waist position of a Gaussian beam from measured beam widths at known axial
//! positions by a Levenberg-Marquardt least squares fit of
//!
//! `w(z) = w0 · sqrt(1 + ((z - z0) / z_R)²)` with `z_R = π·w0² / λ`
//!
//! at a fixed wavelength. Beams passed to and returned from the fitter are referenced to the plane `z = 0`, i.e. a
//! waist at position `z0` is described by `q = -z0 + i·z_R`.
use crate::{
    beam::GaussianBeam,
    error::{MmResult, ModeMatchError},
    utils::{math_utils::mean, usize_to_f64},
};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use uom::si::{f64::Length, length::meter};

/// Quantity contained in the measured width data.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WidthConvention {
    /// 1/e² intensity radius
    #[default]
    Radius,
    /// 1/e² intensity diameter
    Diameter,
}

/// Configuration of the [`BeamWidthFitter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    /// maximum number of Levenberg-Marquardt iterations
    pub max_iterations: usize,
    /// the fit has converged as soon as the RMS residual (in m) drops below this value
    pub residual_tolerance: f64,
    /// the fit has converged as soon as the relative parameter step drops below this value
    pub step_tolerance: f64,
    /// initial damping factor λ
    pub initial_damping: f64,
    /// quantity of the measured widths
    pub width_convention: WidthConvention,
}
impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            residual_tolerance: 1.0e-12,
            step_tolerance: 1.0e-10,
            initial_damping: 1.0e-3,
            width_convention: WidthConvention::Radius,
        }
    }
}

const MIN_DAMPING: f64 = 1.0e-12;
const MAX_DAMPING: f64 = 1.0e16;

/// Result of a beam width fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamFit {
    beam: GaussianBeam,
    converged: bool,
    iterations: usize,
    rms_residual: Length,
    uncertainties: Option<(Length, Length)>,
}
impl BeamFit {
    /// Returns the fitted beam referenced to the plane `z = 0`.
    ///
    /// If the fit did not converge this is the best iterate found.
    #[must_use]
    pub const fn beam(&self) -> &GaussianBeam {
        &self.beam
    }
    /// Returns the fitted waist radius.
    #[must_use]
    pub fn waist_radius(&self) -> Length {
        self.beam.waist_radius()
    }
    /// Returns the fitted waist position.
    #[must_use]
    pub fn waist_position(&self) -> Length {
        -self.beam.distance_from_waist()
    }
    /// Returns `true` if the fit reached one of its convergence criteria.
    #[must_use]
    pub const fn converged(&self) -> bool {
        self.converged
    }
    /// Returns the number of iterations performed.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }
    /// Returns the root mean square of the width residuals (as beam radius).
    #[must_use]
    pub fn rms_residual(&self) -> Length {
        self.rms_residual
    }
    /// Returns the one-sigma uncertainty of the waist radius.
    ///
    /// Only available for more than two samples and a non-singular Jacobian.
    #[must_use]
    pub fn waist_radius_uncertainty(&self) -> Option<Length> {
        self.uncertainties.map(|u| u.0)
    }
    /// Returns the one-sigma uncertainty of the waist position.
    #[must_use]
    pub fn waist_position_uncertainty(&self) -> Option<Length> {
        self.uncertainties.map(|u| u.1)
    }
    /// Returns this fit if it converged.
    ///
    /// # Errors
    ///
    /// This function will return [`ModeMatchError::FitDidNotConverge`] if the fit did not converge.
    pub fn into_converged(self) -> MmResult<Self> {
        if self.converged {
            Ok(self)
        } else {
            Err(ModeMatchError::FitDidNotConverge(format!(
                "best iterate: {} after {} iterations",
                self.beam, self.iterations
            )))
        }
    }
}

/// Levenberg-Marquardt fitter for beam width measurements.
#[derive(Debug, Default, Clone)]
pub struct BeamWidthFitter {
    config: FitConfig,
}
impl BeamWidthFitter {
    /// Creates a new [`BeamWidthFitter`].
    #[must_use]
    pub const fn new(config: FitConfig) -> Self {
        Self { config }
    }
    /// Returns the configuration of this [`BeamWidthFitter`].
    #[must_use]
    pub const fn config(&self) -> &FitConfig {
        &self.config
    }
    fn measured_radii(&self, positions: &[Length], widths: &[Length]) -> MmResult<Vec<f64>> {
        if positions.len() != widths.len() {
            return Err(ModeMatchError::InvalidInput(format!(
                "number of positions ({}) and widths ({}) differ",
                positions.len(),
                widths.len()
            )));
        }
        if positions.len() < 3 {
            return Err(ModeMatchError::InvalidInput(
                "at least three samples are needed for a beam width fit".into(),
            ));
        }
        if positions.iter().any(|p| !p.is_finite()) {
            return Err(ModeMatchError::InvalidInput(
                "positions must be finite".into(),
            ));
        }
        if widths.iter().any(|w| !w.is_finite() || w.value <= 0.0) {
            return Err(ModeMatchError::InvalidInput(
                "widths must be > 0.0 and finite".into(),
            ));
        }
        let scale = match self.config.width_convention {
            WidthConvention::Radius => 1.0,
            WidthConvention::Diameter => 0.5,
        };
        Ok(widths.iter().map(|w| w.value * scale).collect())
    }
    /// Data driven initial guess: the waist radius is the smallest measured radius and the waist is placed at the
    /// mean position.
    ///
    /// # Errors
    ///
    /// This function will return an error if the data is malformed (see [`BeamWidthFitter::fit`]).
    pub fn initial_guess(
        &self,
        positions: &[Length],
        widths: &[Length],
        wavelength: Length,
    ) -> MmResult<GaussianBeam> {
        let radii = self.measured_radii(positions, widths)?;
        let z: Vec<f64> = positions.iter().map(|p| p.value).collect();
        let waist_position = mean(&z).unwrap_or_default();
        let waist_radius = radii.iter().copied().fold(f64::INFINITY, f64::min);
        GaussianBeam::from_waist(
            Length::new::<meter>(waist_radius),
            Length::new::<meter>(-waist_position),
            wavelength,
        )
    }
    fn model(z: f64, waist_radius: f64, waist_position: f64, wavelength: f64) -> f64 {
        let z_r = PI * waist_radius * waist_radius / wavelength;
        let u = (z - waist_position) / z_r;
        waist_radius * u.mul_add(u, 1.0).sqrt()
    }
    /// Partial derivatives of the model with respect to the waist radius and the waist position.
    fn gradient(z: f64, waist_radius: f64, waist_position: f64, wavelength: f64) -> (f64, f64) {
        let z_r = PI * waist_radius * waist_radius / wavelength;
        let u = z - waist_position;
        let s = (u * u / (z_r * z_r) + 1.0).sqrt();
        (
            s - 2.0 * u * u / (z_r * z_r * s),
            -waist_radius * u / (z_r * z_r * s),
        )
    }
    fn residuals(z: &[f64], radii: &[f64], p: &Vector2<f64>, wavelength: f64) -> DVector<f64> {
        DVector::from_iterator(
            z.len(),
            z.iter()
                .zip(radii)
                .map(|(z, r)| Self::model(*z, p[0], p[1], wavelength) - r),
        )
    }
    fn jacobian(z: &[f64], p: &Vector2<f64>, wavelength: f64) -> DMatrix<f64> {
        let mut jacobian = DMatrix::<f64>::zeros(z.len(), 2);
        for (row, z) in z.iter().enumerate() {
            let (d_waist, d_position) = Self::gradient(*z, p[0], p[1], wavelength);
            jacobian[(row, 0)] = d_waist;
            jacobian[(row, 1)] = d_position;
        }
        jacobian
    }
    fn uncertainties(
        jacobian: &DMatrix<f64>,
        cost: f64,
        nr_of_samples: usize,
    ) -> Option<(Length, Length)> {
        if nr_of_samples <= 2 {
            return None;
        }
        let variance = cost / usize_to_f64(nr_of_samples - 2);
        let normal: Matrix2<f64> = (jacobian.transpose() * jacobian)
            .fixed_view::<2, 2>(0, 0)
            .clone_owned();
        let covariance = normal.try_inverse()? * variance;
        if covariance[(0, 0)] < 0.0 || covariance[(1, 1)] < 0.0 {
            return None;
        }
        Some((
            Length::new::<meter>(covariance[(0, 0)].sqrt()),
            Length::new::<meter>(covariance[(1, 1)].sqrt()),
        ))
    }
    /// Fit a Gaussian beam to measured widths.
    ///
    /// The wavelength is taken from `initial_guess`, which is referenced to the plane `z = 0`. A fit that does not
    /// converge within the iteration budget is not an error: the best iterate is returned with
    /// [`BeamFit::converged`] set to `false` (see [`BeamFit::into_converged`]).
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - `positions` and `widths` differ in length or contain less than three samples.
    ///   - a position is not finite or a width is not positive and finite.
    pub fn fit(
        &self,
        positions: &[Length],
        widths: &[Length],
        initial_guess: &GaussianBeam,
    ) -> MmResult<BeamFit> {
        let radii = self.measured_radii(positions, widths)?;
        let z: Vec<f64> = positions.iter().map(|p| p.value).collect();
        let wavelength = initial_guess.wavelength().value;
        let mut p = Vector2::new(
            initial_guess.waist_radius().value,
            -initial_guess.distance_from_waist().value,
        );
        let mut residuals = Self::residuals(&z, &radii, &p, wavelength);
        let mut cost = residuals.norm_squared();
        let mut damping = self.config.initial_damping;
        let mut iterations = 0;
        let mut converged = false;
        let tol = self.config.step_tolerance;
        while iterations < self.config.max_iterations {
            iterations += 1;
            let jacobian = Self::jacobian(&z, &p, wavelength);
            let normal: Matrix2<f64> = (jacobian.transpose() * &jacobian)
                .fixed_view::<2, 2>(0, 0)
                .clone_owned();
            let gradient: Vector2<f64> = (jacobian.transpose() * &residuals)
                .fixed_view::<2, 1>(0, 0)
                .clone_owned();
            let mut accepted = false;
            let mut small_step = false;
            while damping < MAX_DAMPING {
                let mut damped = normal;
                damped[(0, 0)] *= 1.0 + damping;
                damped[(1, 1)] *= 1.0 + damping;
                let Some(inverse) = damped.try_inverse() else {
                    damping *= 10.0;
                    continue;
                };
                let step = -(inverse * gradient);
                small_step = step[0].abs() <= tol * (p[0].abs() + tol)
                    && step[1].abs() <= tol * (p[1].abs() + tol);
                let candidate = p + step;
                if candidate[0] > 0.0 {
                    let candidate_residuals = Self::residuals(&z, &radii, &candidate, wavelength);
                    let candidate_cost = candidate_residuals.norm_squared();
                    if candidate_cost < cost {
                        p = candidate;
                        residuals = candidate_residuals;
                        cost = candidate_cost;
                        damping = (damping / 10.0).max(MIN_DAMPING);
                        accepted = true;
                        break;
                    }
                }
                damping *= 10.0;
            }
            let rms = (cost / usize_to_f64(z.len())).sqrt();
            debug!(
                "beam fit iteration {iterations}: waist {:.4e} m @ {:.4e} m, rms {rms:.3e} m",
                p[0], p[1]
            );
            if rms < self.config.residual_tolerance || small_step || !accepted {
                converged = true;
                break;
            }
        }
        let rms_residual = Length::new::<meter>((cost / usize_to_f64(z.len())).sqrt());
        if !converged {
            warn!(
                "beam width fit did not converge within {iterations} iterations (rms residual {:.3e} m)",
                rms_residual.value
            );
        }
        let beam = GaussianBeam::from_waist(
            Length::new::<meter>(p[0]),
            Length::new::<meter>(-p[1]),
            initial_guess.wavelength(),
        )?;
        let jacobian = Self::jacobian(&z, &p, wavelength);
        Ok(BeamFit {
            beam,
            converged,
            iterations,
            rms_residual,
            uncertainties: Self::uncertainties(&jacobian, cost, z.len()),
        })
    }
}
