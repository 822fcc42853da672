#![warn(missing_docs)]
//! ABCD propagation engine
//!
//! Each thin element is described by a real 2x2 matrix acting on the complex beam parameter via
//! `q' = (A·q + B) / (C·q + D)`. The [`propagate`] function walks a beam through all components located between two
//! axial positions. A component at position `p` acts on a forward propagation from `from` to `to` if
//! `from <= p < to`, hence the beam at a component position is the incident beam. A backward propagation from `to`
//! to `from` undoes exactly the same set of components.
use crate::{
    beam::GaussianBeam,
    component::Component,
    error::{MmResult, ModeMatchError},
};
use nalgebra::Matrix2;
use num::complex::Complex64;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, ops::Mul};
use uom::si::f64::Length;

pub mod solver;

pub use solver::{AbcdBounds, AbcdSolution, AbcdSolver, AbcdSolverConfig, GapLensGap};

/// Ray transfer (ABCD) matrix in SI base units (B in m, C in 1/m).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbcdMatrix {
    matrix: Matrix2<f64>,
}
impl AbcdMatrix {
    /// Creates a new [`AbcdMatrix`] from its four elements.
    #[must_use]
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self {
            matrix: Matrix2::new(a, b, c, d),
        }
    }
    /// The identity matrix (no optical element).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            matrix: Matrix2::identity(),
        }
    }
    /// Free space propagation over the distance `distance` (in m).
    #[must_use]
    pub fn free_space(distance: f64) -> Self {
        Self::new(1.0, distance, 0.0, 1.0)
    }
    /// Ideal thin lens of focal length `focal_length` (in m).
    #[must_use]
    pub fn thin_lens(focal_length: f64) -> Self {
        Self::new(1.0, 0.0, -1.0 / focal_length, 1.0)
    }
    /// Returns the `A` element.
    #[must_use]
    pub fn a(&self) -> f64 {
        self.matrix[(0, 0)]
    }
    /// Returns the `B` element.
    #[must_use]
    pub fn b(&self) -> f64 {
        self.matrix[(0, 1)]
    }
    /// Returns the `C` element.
    #[must_use]
    pub fn c(&self) -> f64 {
        self.matrix[(1, 0)]
    }
    /// Returns the `D` element.
    #[must_use]
    pub fn d(&self) -> f64 {
        self.matrix[(1, 1)]
    }
    /// Returns the determinant (1.0 for lossless systems in a medium of constant index).
    #[must_use]
    pub fn determinant(&self) -> f64 {
        self.matrix.determinant()
    }
    /// Returns the matrix of the system consisting of `self` followed by `next`.
    #[must_use]
    pub fn then(&self, next: &Self) -> Self {
        *next * *self
    }
    /// Apply this matrix to a complex beam parameter.
    ///
    /// # Errors
    ///
    /// This function will return [`ModeMatchError::InvalidBeamState`] if the denominator `C·q + D` vanishes or the
    /// result is not finite.
    pub fn transform(&self, q: Complex64) -> MmResult<Complex64> {
        let denominator = q * self.c() + self.d();
        if denominator.norm_sqr() == 0.0 || !denominator.is_finite() {
            return Err(ModeMatchError::InvalidBeamState(format!(
                "vanishing denominator while transforming q = {q}"
            )));
        }
        let q_new = (q * self.a() + self.b()) / denominator;
        if !q_new.is_finite() {
            return Err(ModeMatchError::InvalidBeamState(format!(
                "transformation of q = {q} is not finite"
            )));
        }
        Ok(q_new)
    }
    /// Apply this matrix to a beam.
    ///
    /// # Errors
    ///
    /// This function will return [`ModeMatchError::InvalidBeamState`] if the resulting beam is non-physical.
    pub fn apply(&self, beam: &GaussianBeam) -> MmResult<GaussianBeam> {
        beam.with_q(self.transform(beam.q())?)
    }
}
impl Default for AbcdMatrix {
    fn default() -> Self {
        Self::identity()
    }
}
impl Mul for AbcdMatrix {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self {
            matrix: self.matrix * rhs.matrix,
        }
    }
}
impl Display for AbcdMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[[{:.4}, {:.4}], [{:.4}, {:.4}]]",
            self.a(),
            self.b(),
            self.c(),
            self.d()
        )
    }
}

/// Components affecting a propagation from `from` to `to` in the order they are passed.
fn components_between<'a>(
    from: f64,
    to: f64,
    components: &'a [Component],
) -> Vec<&'a Component> {
    let mut between: Vec<&Component> = if to >= from {
        components
            .iter()
            .filter(|c| c.position().value >= from && c.position().value < to)
            .collect()
    } else {
        components
            .iter()
            .filter(|c| c.position().value >= to && c.position().value < from)
            .collect()
    };
    // stable sort: elements at equal positions keep their insertion order
    between.sort_by(|a, b| a.position().value.total_cmp(&b.position().value));
    if to < from {
        between.reverse();
    }
    between
}

/// Propagate a beam known at position `from` to position `to` through the given components.
///
/// The components do not need to be sorted. For `to < from` the beam is propagated backwards by applying the inverse
/// element matrices in reverse order.
///
/// # Errors
///
/// This function will return an error if
///   - `from` or `to` are not finite ([`ModeMatchError::InvalidInput`]).
///   - the beam becomes non-physical during propagation ([`ModeMatchError::InvalidBeamState`]).
pub fn propagate(
    beam: &GaussianBeam,
    from: Length,
    to: Length,
    components: &[Component],
) -> MmResult<GaussianBeam> {
    if !from.is_finite() || !to.is_finite() {
        return Err(ModeMatchError::InvalidInput(
            "propagation positions must be finite".into(),
        ));
    }
    let (from, to) = (from.value, to.value);
    let backwards = to < from;
    let mut q = beam.q();
    let mut current = from;
    for component in components_between(from, to, components) {
        let position = component.position().value;
        q = AbcdMatrix::free_space(position - current).transform(q)?;
        let matrix = if backwards {
            component.kind().inverse_abcd_matrix()
        } else {
            component.kind().abcd_matrix()
        };
        q = matrix.transform(q)?;
        GaussianBeam::check_q(q)?;
        current = position;
    }
    q = AbcdMatrix::free_space(to - current).transform(q)?;
    beam.with_q(q)
}

/// Returns the system matrix of all components between `from` and `to` including the free space gaps.
///
/// # Errors
///
/// This function will return an error if `from` or `to` are not finite.
pub fn system_matrix(from: Length, to: Length, components: &[Component]) -> MmResult<AbcdMatrix> {
    if !from.is_finite() || !to.is_finite() {
        return Err(ModeMatchError::InvalidInput(
            "propagation positions must be finite".into(),
        ));
    }
    let (from, to) = (from.value, to.value);
    let backwards = to < from;
    let mut matrix = AbcdMatrix::identity();
    let mut current = from;
    for component in components_between(from, to, components) {
        let position = component.position().value;
        let element = if backwards {
            component.kind().inverse_abcd_matrix()
        } else {
            component.kind().abcd_matrix()
        };
        matrix = matrix
            .then(&AbcdMatrix::free_space(position - current))
            .then(&element);
        current = position;
    }
    Ok(matrix.then(&AbcdMatrix::free_space(to - current)))
}

/// Beam radius at `position` for a beam known at `beam_position`.
///
/// # Errors
///
/// This function will return an error if the propagation fails.
pub fn width_at(
    beam: &GaussianBeam,
    beam_position: Length,
    position: Length,
    components: &[Component],
) -> MmResult<Length> {
    Ok(propagate(beam, beam_position, position, components)?.radius())
}

/// Lazily evaluates the beam radius for each position of the given sequence.
///
/// Each item is a `(position, radius)` pair. The iterator can be restarted by passing a cloned position iterator.
pub fn width_curve<'a, I>(
    beam: &'a GaussianBeam,
    beam_position: Length,
    components: &'a [Component],
    positions: I,
) -> impl Iterator<Item = MmResult<(Length, Length)>> + 'a
where
    I: IntoIterator<Item = Length>,
    I::IntoIter: 'a,
{
    positions.into_iter().map(move |position| {
        width_at(beam, beam_position, position, components).map(|w| (position, w))
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{meter, micrometer, millimeter, nanometer};
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use assert_matches::assert_matches;

    fn waist_beam() -> GaussianBeam {
        GaussianBeam::from_waist(micrometer!(200.0), meter!(0.0), nanometer!(1064.0)).unwrap()
    }
    #[test]
    fn elements() {
        let m = AbcdMatrix::free_space(2.0);
        assert_eq!((m.a(), m.b(), m.c(), m.d()), (1.0, 2.0, 0.0, 1.0));
        let m = AbcdMatrix::thin_lens(0.5);
        assert_eq!((m.a(), m.b(), m.c(), m.d()), (1.0, 0.0, -2.0, 1.0));
        assert_eq!(AbcdMatrix::default(), AbcdMatrix::identity());
        assert_abs_diff_eq!(m.determinant(), 1.0);
    }
    #[test]
    fn then() {
        let m = AbcdMatrix::free_space(1.0).then(&AbcdMatrix::thin_lens(1.0));
        assert_eq!((m.a(), m.b(), m.c(), m.d()), (1.0, 1.0, -1.0, 0.0));
        let m = AbcdMatrix::thin_lens(1.0).then(&AbcdMatrix::free_space(1.0));
        assert_eq!((m.a(), m.b(), m.c(), m.d()), (0.0, 1.0, -1.0, 1.0));
    }
    #[test]
    fn transform_free_space() {
        let q = Complex64::new(0.0, 1.0);
        assert_eq!(
            AbcdMatrix::free_space(0.5).transform(q).unwrap(),
            Complex64::new(0.5, 1.0)
        );
    }
    #[test]
    fn transform_vanishing_denominator() {
        let q = Complex64::new(0.0, 1.0);
        assert_matches!(
            AbcdMatrix::new(1.0, 0.0, 0.0, 0.0).transform(q),
            Err(ModeMatchError::InvalidBeamState(_))
        );
        assert_matches!(
            AbcdMatrix::new(1.0, f64::NAN, 0.0, 1.0).transform(q),
            Err(ModeMatchError::InvalidBeamState(_))
        );
    }
    #[test]
    fn apply_non_physical() {
        let beam = waist_beam();
        assert_matches!(
            AbcdMatrix::new(1.0, 0.0, 0.0, -1.0).apply(&beam),
            Err(ModeMatchError::InvalidBeamState(_))
        );
    }
    #[test]
    fn lens_round_trip() {
        for f in [-2.0, -0.1, 0.05, 0.3, 10.0] {
            for z in [-1.0, 0.0, 0.25] {
                let beam = waist_beam().propagated_by(meter!(z)).unwrap();
                let out = AbcdMatrix::thin_lens(f)
                    .then(&AbcdMatrix::thin_lens(-f))
                    .apply(&beam)
                    .unwrap();
                assert_relative_eq!(out.q().re, beam.q().re, epsilon = 1e-12);
                assert_relative_eq!(out.q().im, beam.q().im, epsilon = 1e-12);
                let components = vec![
                    Component::lens("L1", meter!(f), meter!(0.5)).unwrap(),
                    Component::lens("L2", meter!(-f), meter!(0.5)).unwrap(),
                ];
                let with_lenses = propagate(&beam, meter!(0.0), meter!(1.0), &components).unwrap();
                let without = propagate(&beam, meter!(0.0), meter!(1.0), &[]).unwrap();
                assert_relative_eq!(with_lenses.q().re, without.q().re, epsilon = 1e-12);
                assert_relative_eq!(with_lenses.q().im, without.q().im, epsilon = 1e-12);
            }
        }
    }
    #[test]
    fn propagate_free_space() {
        let beam = waist_beam();
        let out = propagate(&beam, meter!(0.0), meter!(1.0), &[]).unwrap();
        assert_relative_eq!(out.q().re, 1.0);
        assert_relative_eq!(out.q().im, beam.q().im);
        let back = propagate(&out, meter!(1.0), meter!(0.0), &[]).unwrap();
        assert_abs_diff_eq!(back.q().re, 0.0, epsilon = 1e-15);
    }
    #[test]
    fn propagate_focus_of_lens() {
        let beam = waist_beam();
        let f = 0.1;
        let components = vec![Component::lens("L1", meter!(f), meter!(0.0)).unwrap()];
        let z_r = beam.rayleigh_range().value;
        let ahead = propagate(&beam, meter!(0.0), meter!(0.5), &components).unwrap();
        assert_relative_eq!(
            0.5 - ahead.distance_from_waist().value,
            f * z_r * z_r / (z_r * z_r + f * f),
            max_relative = 1e-10
        );
        let unchanged = propagate(&beam, meter!(0.0), meter!(0.0), &components).unwrap();
        assert_eq!(unchanged.q(), beam.q());
        let expected_waist = beam.waist_radius().value * f / (z_r * z_r + f * f).sqrt();
        assert_relative_eq!(
            ahead.waist_radius().value,
            expected_waist,
            max_relative = 1e-12
        );
    }
    #[test]
    fn propagate_component_at_end_is_ignored() {
        let beam = waist_beam();
        let components = vec![Component::lens("L1", meter!(0.1), meter!(1.0)).unwrap()];
        let out = propagate(&beam, meter!(0.0), meter!(1.0), &components).unwrap();
        assert_relative_eq!(out.q().re, 1.0);
        assert_relative_eq!(out.q().im, beam.q().im);
    }
    #[test]
    fn propagate_round_trip() {
        let beam = waist_beam();
        let components = vec![
            Component::lens("L2", millimeter!(-50.0), millimeter!(400.0)).unwrap(),
            Component::lens("L1", millimeter!(100.0), millimeter!(100.0)).unwrap(),
            Component::free_space("D1", millimeter!(30.0), millimeter!(250.0)).unwrap(),
        ];
        let out = propagate(&beam, meter!(0.0), meter!(1.0), &components).unwrap();
        let back = propagate(&out, meter!(1.0), meter!(0.0), &components).unwrap();
        assert_abs_diff_eq!(back.q().re, beam.q().re, epsilon = 1e-12);
        assert_relative_eq!(back.q().im, beam.q().im, max_relative = 1e-10);
    }
    #[test]
    fn propagate_invalid_positions() {
        let beam = waist_beam();
        assert_matches!(
            propagate(&beam, meter!(f64::NAN), meter!(1.0), &[]),
            Err(ModeMatchError::InvalidInput(_))
        );
    }
    #[test]
    fn system_matrix_matches_propagation() {
        let beam = waist_beam();
        let components = vec![
            Component::lens("L1", millimeter!(100.0), millimeter!(100.0)).unwrap(),
            Component::lens("L2", millimeter!(-50.0), millimeter!(400.0)).unwrap(),
        ];
        let m = system_matrix(meter!(0.0), meter!(1.0), &components).unwrap();
        assert_abs_diff_eq!(m.determinant(), 1.0, epsilon = 1e-12);
        let by_matrix = m.apply(&beam).unwrap();
        let by_steps = propagate(&beam, meter!(0.0), meter!(1.0), &components).unwrap();
        assert_relative_eq!(by_matrix.q().re, by_steps.q().re, max_relative = 1e-10);
        assert_relative_eq!(by_matrix.q().im, by_steps.q().im, max_relative = 1e-10);
        let m = system_matrix(meter!(0.0), meter!(0.05), &components).unwrap();
        assert_eq!(m, AbcdMatrix::free_space(0.05));
    }
    #[test]
    fn width_curve_is_lazy_and_restartable() {
        let beam = waist_beam();
        let positions = vec![meter!(0.0), meter!(0.5), meter!(1.0)];
        let first: Vec<_> = width_curve(&beam, meter!(0.0), &[], positions.clone())
            .collect::<MmResult<Vec<_>>>()
            .unwrap();
        let second: Vec<_> = width_curve(&beam, meter!(0.0), &[], positions)
            .collect::<MmResult<Vec<_>>>()
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_relative_eq!(first[0].1.value, 200.0e-6, max_relative = 1e-12);
        assert!(first[2].1 > first[1].1);
        assert_relative_eq!(
            width_at(&beam, meter!(0.0), meter!(1.0), &[]).unwrap().value,
            first[2].1.value
        );
    }
}
