#![warn(missing_docs)]
//! Gaussian beam state described by the complex beam parameter.
//!
//! A [`GaussianBeam`] is the complex beam parameter `q = z + i·z_R` at some axial reference plane (where `z` is the
//! distance from the waist to that plane and `z_R` the Rayleigh range) together with the vacuum wavelength. The
//! beam does not know its absolute axial position; positions are tracked by the
//! [`BeamPath`](crate::beam_path::BeamPath) and the [`propagate`](crate::abcd::propagate) function.
use crate::error::{MmResult, ModeMatchError};
use num::complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt::Display;
use uom::si::{
    angle::radian,
    f64::{Angle, Length},
    length::meter,
};

/// Single-axis Gaussian beam at a reference plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianBeam {
    q: Complex64,
    wavelength: Length,
}
impl GaussianBeam {
    /// Creates a new [`GaussianBeam`] from a complex beam parameter (in meters) and a wavelength.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - the wavelength is not positive and finite ([`ModeMatchError::InvalidInput`]).
    ///   - `q` is not finite or `Im(1/q) >= 0`, i.e. the beam is not a physical forward propagating beam
    ///     ([`ModeMatchError::InvalidBeamState`]).
    pub fn new(q: Complex64, wavelength: Length) -> MmResult<Self> {
        Self::check_wavelength(wavelength)?;
        Self::check_q(q)?;
        Ok(Self { q, wavelength })
    }
    /// Creates a beam with the given waist radius at a plane located `distance_from_waist` behind the waist.
    ///
    /// A negative `distance_from_waist` describes a plane before the waist (converging beam).
    ///
    /// # Errors
    ///
    /// This function will return an error if the waist radius is not positive and finite, the distance is not
    /// finite or the wavelength is invalid.
    pub fn from_waist(
        waist_radius: Length,
        distance_from_waist: Length,
        wavelength: Length,
    ) -> MmResult<Self> {
        Self::check_wavelength(wavelength)?;
        if !waist_radius.is_finite() || waist_radius.value <= 0.0 {
            return Err(ModeMatchError::InvalidInput(
                "waist radius must be > 0.0 and finite".into(),
            ));
        }
        if !distance_from_waist.is_finite() {
            return Err(ModeMatchError::InvalidInput(
                "distance from waist must be finite".into(),
            ));
        }
        let rayleigh_range = PI * waist_radius.value * waist_radius.value / wavelength.value;
        Self::new(
            Complex64::new(distance_from_waist.value, rayleigh_range),
            wavelength,
        )
    }
    fn check_wavelength(wavelength: Length) -> MmResult<()> {
        if !wavelength.is_finite() || wavelength.value <= 0.0 {
            return Err(ModeMatchError::InvalidInput(
                "wavelength must be > 0.0 and finite".into(),
            ));
        }
        Ok(())
    }
    /// Check that `q` describes a physical, forward propagating beam.
    ///
    /// # Errors
    ///
    /// This function will return [`ModeMatchError::InvalidBeamState`] if `q` is not finite, zero or `Im(1/q) >= 0`.
    pub fn check_q(q: Complex64) -> MmResult<()> {
        if !q.re.is_finite() || !q.im.is_finite() {
            return Err(ModeMatchError::InvalidBeamState(format!(
                "beam parameter q = {q} is not finite"
            )));
        }
        // Im(1/q) = -Im(q)/|q|^2
        if q.im <= 0.0 || q.norm_sqr() == 0.0 {
            return Err(ModeMatchError::InvalidBeamState(format!(
                "beam parameter q = {q} does not describe a forward propagating beam"
            )));
        }
        Ok(())
    }
    /// Returns the complex beam parameter `q` (in meters).
    #[must_use]
    pub const fn q(&self) -> Complex64 {
        self.q
    }
    /// Returns the wavelength of this [`GaussianBeam`].
    #[must_use]
    pub fn wavelength(&self) -> Length {
        self.wavelength
    }
    /// Returns the same beam with a different complex beam parameter.
    ///
    /// # Errors
    ///
    /// This function will return [`ModeMatchError::InvalidBeamState`] if the new parameter is non-physical.
    pub fn with_q(&self, q: Complex64) -> MmResult<Self> {
        Self::check_q(q)?;
        Ok(Self {
            q,
            wavelength: self.wavelength,
        })
    }
    /// Returns the Rayleigh range of this [`GaussianBeam`].
    #[must_use]
    pub fn rayleigh_range(&self) -> Length {
        Length::new::<meter>(self.q.im)
    }
    /// Returns the distance from the waist to the reference plane.
    ///
    /// A positive value means the waist lies before the plane (diverging beam).
    #[must_use]
    pub fn distance_from_waist(&self) -> Length {
        Length::new::<meter>(self.q.re)
    }
    /// Returns the waist radius (1/e² intensity radius at the waist).
    #[must_use]
    pub fn waist_radius(&self) -> Length {
        Length::new::<meter>((self.q.im * self.wavelength.value / PI).sqrt())
    }
    /// Returns the beam radius (1/e² intensity radius) at the reference plane.
    #[must_use]
    pub fn radius(&self) -> Length {
        let z = self.q.re;
        let z_r = self.q.im;
        self.waist_radius() * (1.0 + (z / z_r) * (z / z_r)).sqrt()
    }
    /// Returns the wavefront radius of curvature at the reference plane.
    ///
    /// The value is infinite at the waist. Positive values denote a diverging beam.
    #[must_use]
    pub fn radius_of_curvature(&self) -> Length {
        let z = self.q.re;
        if z == 0.0 {
            return Length::new::<meter>(f64::INFINITY);
        }
        let z_r = self.q.im;
        Length::new::<meter>(z + z_r * z_r / z)
    }
    /// Returns the Gouy phase at the reference plane.
    #[must_use]
    pub fn gouy_phase(&self) -> Angle {
        Angle::new::<radian>(self.q.re.atan2(self.q.im))
    }
    /// Returns the far-field divergence half-angle.
    #[must_use]
    pub fn divergence(&self) -> Angle {
        Angle::new::<radian>(self.wavelength.value / (PI * self.waist_radius().value))
    }
    /// Returns the beam propagated by the given (possibly negative) free space distance.
    ///
    /// # Errors
    ///
    /// This function will return an error if the distance is not finite.
    pub fn propagated_by(&self, distance: Length) -> MmResult<Self> {
        if !distance.is_finite() {
            return Err(ModeMatchError::InvalidInput(
                "propagation distance must be finite".into(),
            ));
        }
        self.with_q(self.q + distance.value)
    }
}
impl Display for GaussianBeam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "waist {:.3e} m, waist distance {:.4e} m, radius {:.3e} m",
            self.waist_radius().value,
            self.distance_from_waist().value,
            self.radius().value
        )
    }
}
