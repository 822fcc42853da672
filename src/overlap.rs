#![warn(missing_docs)]
//! Mode overlap of two Gaussian beams.
//!
//! For two single-axis Gaussian modes with complex beam parameters `q1` and `q2` at the same plane the power
//! coupling efficiency is given by the closed-form overlap integral
//!
//! `η = 2·sqrt(Im(q1)·Im(q2)) / |q1 − conj(q2)|`
//!
//! which is symmetric, lies in `[0, 1]` and equals one only for `q1 == q2`. For a rotationally symmetric beam the
//! two transverse axes contribute independently, hence the total overlap is `η²` (see [`overlap_circular`]).
use crate::{
    beam::GaussianBeam,
    error::{MmResult, ModeMatchError},
};

/// predecessor of 1.0, the overlap of two different beams is strictly smaller than one
const LARGEST_BELOW_ONE: f64 = 1.0 - f64::EPSILON / 2.0;

fn check_wavelengths(beam_a: &GaussianBeam, beam_b: &GaussianBeam) -> MmResult<()> {
    let (lambda_a, lambda_b) = (beam_a.wavelength().value, beam_b.wavelength().value);
    if ((lambda_a - lambda_b) / lambda_a).abs() > 1.0e-9 {
        return Err(ModeMatchError::InvalidInput(format!(
            "overlap of beams with different wavelengths ({lambda_a:e} m, {lambda_b:e} m) is undefined"
        )));
    }
    Ok(())
}

/// Mode overlap of two beams evaluated at the same axial position (single transverse axis).
///
/// # Errors
///
/// This function will return an error if
///   - the two beams have different wavelengths ([`ModeMatchError::InvalidInput`]).
///   - the overlap is not a finite number ([`ModeMatchError::InvalidBeamState`]).
pub fn overlap(beam_a: &GaussianBeam, beam_b: &GaussianBeam) -> MmResult<f64> {
    check_wavelengths(beam_a, beam_b)?;
    let (q_a, q_b) = (beam_a.q(), beam_b.q());
    if q_a == q_b {
        return Ok(1.0);
    }
    let denominator = (q_a - q_b.conj()).norm();
    let value = 2.0 * (q_a.im * q_b.im).sqrt() / denominator;
    if !value.is_finite() {
        return Err(ModeMatchError::InvalidBeamState(format!(
            "overlap of q = {q_a} and q = {q_b} is not finite"
        )));
    }
    // rounding may push nearly identical beams to (or above) one
    Ok(value.min(LARGEST_BELOW_ONE))
}

/// Mode overlap of two rotationally symmetric beams (both transverse axes).
///
/// # Errors
///
/// This function will return an error under the same conditions as [`overlap`].
pub fn overlap_circular(beam_a: &GaussianBeam, beam_b: &GaussianBeam) -> MmResult<f64> {
    let single_axis = overlap(beam_a, beam_b)?;
    Ok(single_axis * single_axis)
}

/// Mode overlap of an astigmatic beam described by its two transverse axes.
///
/// # Errors
///
/// This function will return an error under the same conditions as [`overlap`].
pub fn overlap_astigmatic(
    (beam_a_x, beam_a_y): (&GaussianBeam, &GaussianBeam),
    (beam_b_x, beam_b_y): (&GaussianBeam, &GaussianBeam),
) -> MmResult<f64> {
    Ok(overlap(beam_a_x, beam_b_x)? * overlap(beam_a_y, beam_b_y)?)
}
