#![warn(missing_docs)]
//! Beam path consisting of a seed waist, positioned components and an optional target waist.
//!
//! A [`BeamPath`] is built incrementally and queried afterwards. All queries are pure functions of the stored state.
use crate::{
    abcd::{propagate, width_at},
    beam::GaussianBeam,
    beam_fit::{BeamFit, BeamWidthFitter, FitConfig},
    chooser::{ChooserConfig, ChooserOutcome, ComponentChooser, SearchSpace},
    component::Component,
    error::{MmResult, ModeMatchError},
    nanometer,
    overlap::overlap,
};
use num::Zero;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uom::si::{
    f64::Length,
    length::{micrometer, millimeter},
};

/// Size and axial position of a beam waist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waist {
    radius: Length,
    position: Length,
}
impl Waist {
    /// Creates a new [`Waist`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the radius is not positive and finite or the position is not finite.
    pub fn new(radius: Length, position: Length) -> MmResult<Self> {
        if !radius.is_finite() || radius.value <= 0.0 {
            return Err(ModeMatchError::InvalidInput(
                "waist radius must be > 0.0 and finite".into(),
            ));
        }
        if !position.is_finite() {
            return Err(ModeMatchError::InvalidInput(
                "waist position must be finite".into(),
            ));
        }
        Ok(Self { radius, position })
    }
    /// Returns the waist radius.
    #[must_use]
    pub fn radius(&self) -> Length {
        self.radius
    }
    /// Returns the axial position of the waist.
    #[must_use]
    pub fn position(&self) -> Length {
        self.position
    }
    /// Returns a copy of this waist moved to another position.
    ///
    /// # Errors
    ///
    /// This function will return an error if the position is not finite.
    pub fn moved_to(&self, position: Length) -> MmResult<Self> {
        Self::new(self.radius, position)
    }
    /// Returns the beam at the waist position.
    ///
    /// # Errors
    ///
    /// This function will return an error if the wavelength is invalid.
    pub fn beam(&self, wavelength: Length) -> MmResult<GaussianBeam> {
        GaussianBeam::from_waist(self.radius, Length::zero(), wavelength)
    }
}
impl Display for Waist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "waist {:.1} µm @ {:.2} mm",
            self.radius.get::<micrometer>(),
            self.position.get::<millimeter>()
        )
    }
}

/// Seed beam, components and target of a one-dimensional optical setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamPath {
    wavelength: Length,
    seed: Option<Waist>,
    target: Option<Waist>,
    components: Vec<Component>,
}
impl Default for BeamPath {
    /// Empty path at a wavelength of 1064 nm.
    fn default() -> Self {
        Self {
            wavelength: nanometer!(1064.0),
            seed: None,
            target: None,
            components: Vec::new(),
        }
    }
}
impl BeamPath {
    /// Creates an empty [`BeamPath`] for the given wavelength.
    ///
    /// # Errors
    ///
    /// This function will return an error if the wavelength is not positive and finite.
    pub fn new(wavelength: Length) -> MmResult<Self> {
        if !wavelength.is_normal() || wavelength.value < 0.0 {
            return Err(ModeMatchError::InvalidInput(
                "wavelength must be > 0.0 and finite".into(),
            ));
        }
        Ok(Self {
            wavelength,
            ..Self::default()
        })
    }
    /// Returns the wavelength of this [`BeamPath`].
    #[must_use]
    pub fn wavelength(&self) -> Length {
        self.wavelength
    }
    /// Set the waist of the seed beam.
    ///
    /// # Errors
    ///
    /// This function will return an error if the waist radius is not positive and finite or the position is not
    /// finite.
    pub fn set_seed_waist(&mut self, radius: Length, position: Length) -> MmResult<()> {
        self.seed = Some(Waist::new(radius, position)?);
        Ok(())
    }
    /// Set the waist the path should reproduce.
    ///
    /// # Errors
    ///
    /// This function will return an error if the waist radius is not positive and finite or the position is not
    /// finite.
    pub fn set_target_waist(&mut self, radius: Length, position: Length) -> MmResult<()> {
        self.target = Some(Waist::new(radius, position)?);
        Ok(())
    }
    /// Returns the seed waist (if set).
    #[must_use]
    pub const fn seed_waist(&self) -> Option<&Waist> {
        self.seed.as_ref()
    }
    /// Returns the target waist (if set).
    #[must_use]
    pub const fn target_waist(&self) -> Option<&Waist> {
        self.target.as_ref()
    }
    /// Add a component to this [`BeamPath`].
    ///
    /// The component is inserted according to its position behind all components at the same position.
    pub fn add_component(&mut self, component: Component) {
        let index = self
            .components
            .partition_point(|c| c.position() <= component.position());
        self.components.insert(index, component);
    }
    /// Returns the components of this [`BeamPath`] sorted by position.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }
    pub(crate) fn seed(&self) -> MmResult<&Waist> {
        self.seed
            .as_ref()
            .ok_or_else(|| ModeMatchError::InvalidInput("beam path has no seed waist".into()))
    }
    pub(crate) fn target(&self) -> MmResult<&Waist> {
        self.target
            .as_ref()
            .ok_or_else(|| ModeMatchError::InvalidInput("beam path has no target waist".into()))
    }
    /// Returns the beam at the given position.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - no seed waist is set or the position is not finite ([`ModeMatchError::InvalidInput`]).
    ///   - the beam becomes non-physical ([`ModeMatchError::InvalidBeamState`]).
    pub fn beam_at(&self, position: Length) -> MmResult<GaussianBeam> {
        let seed = self.seed()?;
        propagate(
            &seed.beam(self.wavelength)?,
            seed.position(),
            position,
            &self.components,
        )
    }
    /// Returns the beam radius at the given position.
    ///
    /// # Errors
    ///
    /// This function will return an error under the same conditions as [`BeamPath::beam_at`].
    pub fn width_at(&self, position: Length) -> MmResult<Length> {
        Ok(self.beam_at(position)?.radius())
    }
    /// Lazily evaluates `(position, radius)` pairs for a sequence of positions.
    ///
    /// # Errors
    ///
    /// This function will return an error if no seed waist is set or the seed beam is invalid. Errors during the
    /// evaluation of single positions are returned as items.
    pub fn width_curve<'a, I>(
        &'a self,
        positions: I,
    ) -> MmResult<impl Iterator<Item = MmResult<(Length, Length)>> + 'a>
    where
        I: IntoIterator<Item = Length>,
        I::IntoIter: 'a,
    {
        let seed = self.seed()?;
        let beam = seed.beam(self.wavelength)?;
        let seed_position = seed.position();
        let components = self.components.as_slice();
        Ok(positions.into_iter().map(move |position| {
            width_at(&beam, seed_position, position, components).map(|w| (position, w))
        }))
    }
    /// Overlap between the beam of this path and the target waist at the target position.
    ///
    /// # Errors
    ///
    /// This function will return an error if the seed or target waist is missing or the propagation fails.
    pub fn target_overlap(&self) -> MmResult<f64> {
        self.overlap_with(&[], self.target()?)
    }
    /// Overlap with a target waist after inserting additional components into this path.
    ///
    /// The path itself is not modified. Components at the same position as an existing component act after it.
    ///
    /// # Errors
    ///
    /// This function will return an error if the seed waist is missing or the propagation fails.
    pub fn overlap_with(&self, additional: &[Component], target: &Waist) -> MmResult<f64> {
        let seed = self.seed()?;
        let beam = if additional.is_empty() {
            propagate(
                &seed.beam(self.wavelength)?,
                seed.position(),
                target.position(),
                &self.components,
            )?
        } else {
            let mut components = self.components.clone();
            components.extend_from_slice(additional);
            propagate(
                &seed.beam(self.wavelength)?,
                seed.position(),
                target.position(),
                &components,
            )?
        };
        overlap(&beam, &target.beam(self.wavelength)?)
    }
    /// Fit a Gaussian beam to measured beam radii using the default [`FitConfig`].
    ///
    /// The initial guess is derived from the data (see [`BeamWidthFitter::initial_guess`]). The fitted beam is
    /// referenced to position zero.
    ///
    /// # Errors
    ///
    /// This function will return an error if the data is malformed (see [`BeamWidthFitter::fit`]).
    pub fn fit_beam_width(&self, positions: &[Length], widths: &[Length]) -> MmResult<BeamFit> {
        self.fit_beam_width_with(positions, widths, FitConfig::default())
    }
    /// Fit a Gaussian beam to measured widths with the given configuration.
    ///
    /// # Errors
    ///
    /// This function will return an error if the data is malformed (see [`BeamWidthFitter::fit`]).
    pub fn fit_beam_width_with(
        &self,
        positions: &[Length],
        widths: &[Length],
        config: FitConfig,
    ) -> MmResult<BeamFit> {
        let fitter = BeamWidthFitter::new(config);
        let guess = fitter.initial_guess(positions, widths, self.wavelength)?;
        fitter.fit(positions, widths, &guess)
    }
    /// Search the component combinations of `search_space` which match the seed onto the target waist.
    ///
    /// See [`ComponentChooser::choose`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the inputs are invalid (see [`ComponentChooser::choose`]).
    pub fn choose_components(
        &self,
        search_space: &SearchSpace,
        config: &ChooserConfig,
    ) -> MmResult<ChooserOutcome> {
        ComponentChooser::new(config.clone())?.choose(self, search_space)
    }
}
impl Display for BeamPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(seed) = &self.seed {
            writeln!(f, "seed: {seed}")?;
        }
        for component in &self.components {
            writeln!(f, "{component}")?;
        }
        if let Some(target) = &self.target {
            writeln!(f, "target: {target}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{meter, micrometer, millimeter};
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use assert_matches::assert_matches;

    fn path() -> BeamPath {
        let mut path = BeamPath::default();
        path.set_seed_waist(micrometer!(200.0), meter!(0.0)).unwrap();
        path
    }
    #[test]
    fn default() {
        let path = BeamPath::default();
        assert_eq!(path.wavelength(), nanometer!(1064.0));
        assert!(path.seed_waist().is_none());
        assert!(path.target_waist().is_none());
        assert!(path.components().is_empty());
    }
    #[test]
    fn new() {
        assert!(BeamPath::new(nanometer!(532.0)).is_ok());
        assert!(BeamPath::new(nanometer!(0.0)).is_err());
        assert!(BeamPath::new(nanometer!(-532.0)).is_err());
        assert!(BeamPath::new(nanometer!(f64::NAN)).is_err());
    }
    #[test]
    fn waists() {
        let mut path = BeamPath::default();
        assert!(path.set_seed_waist(micrometer!(0.0), meter!(0.0)).is_err());
        assert!(path.set_seed_waist(micrometer!(-1.0), meter!(0.0)).is_err());
        assert!(path
            .set_seed_waist(micrometer!(100.0), meter!(f64::NAN))
            .is_err());
        assert!(path.set_target_waist(micrometer!(f64::INFINITY), meter!(1.0)).is_err());
        path.set_target_waist(micrometer!(400.0), meter!(1.0)).unwrap();
        assert_eq!(path.target_waist().unwrap().radius(), micrometer!(400.0));
        assert_eq!(path.target_waist().unwrap().position(), meter!(1.0));
    }
    #[test]
    fn components_are_sorted() {
        let mut path = path();
        path.add_component(Component::lens("L2", millimeter!(100.0), millimeter!(300.0)).unwrap());
        path.add_component(Component::lens("L1", millimeter!(100.0), millimeter!(100.0)).unwrap());
        path.add_component(Component::lens("L3", millimeter!(100.0), millimeter!(100.0)).unwrap());
        let labels: Vec<&str> = path.components().iter().map(Component::label).collect();
        assert_eq!(labels, vec!["L1", "L3", "L2"]);
    }
    #[test]
    fn beam_at() {
        assert_matches!(
            BeamPath::default().beam_at(meter!(1.0)),
            Err(ModeMatchError::InvalidInput(_))
        );
        let path = path();
        let beam = path.beam_at(meter!(0.0)).unwrap();
        assert_relative_eq!(beam.radius().value, 200.0e-6, max_relative = 1e-12);
        let z_r = beam.rayleigh_range();
        assert_relative_eq!(
            path.width_at(z_r).unwrap().value,
            200.0e-6 * 2.0_f64.sqrt(),
            max_relative = 1e-12
        );
        // the path does not change by being queried
        let before = path.clone();
        let _ = path.beam_at(meter!(-3.0)).unwrap();
        assert_eq!(path, before);
    }
    #[test]
    fn beam_at_behind_lens() {
        let mut path = path();
        path.add_component(Component::lens("L1", millimeter!(100.0), millimeter!(0.0)).unwrap());
        let z_r = path.beam_at(meter!(0.0)).unwrap().rayleigh_range().value;
        let f = 0.1;
        // a lens at the seed waist creates a new waist at f / (1 + (f / zR)²)
        let waist_distance = f / (1.0 + (f / z_r).powi(2));
        let beam = path.beam_at(millimeter!(10.0)).unwrap();
        assert_relative_eq!(
            beam.distance_from_waist().value,
            0.01 - waist_distance,
            max_relative = 1e-9
        );
    }
    #[test]
    fn width_curve() {
        let path = path();
        let positions = millimeter!(0.0, 100.0, 200.0);
        let curve: Vec<(Length, Length)> = path
            .width_curve(positions.clone())
            .unwrap()
            .collect::<MmResult<Vec<_>>>()
            .unwrap();
        assert_eq!(curve.len(), 3);
        for (position, width) in &curve {
            assert_eq!(*width, path.width_at(*position).unwrap());
        }
        assert!(BeamPath::default().width_curve(positions).is_err());
    }
    #[test]
    fn target_overlap() {
        let mut path = path();
        assert_matches!(path.target_overlap(), Err(ModeMatchError::InvalidInput(_)));
        path.set_target_waist(micrometer!(200.0), meter!(0.0)).unwrap();
        assert_eq!(path.target_overlap().unwrap(), 1.0);
        path.set_target_waist(micrometer!(400.0), meter!(0.0)).unwrap();
        assert_abs_diff_eq!(path.target_overlap().unwrap(), 0.8, epsilon = 1e-12);
    }
    #[test]
    fn overlap_with_does_not_modify() {
        let mut path = path();
        path.set_target_waist(micrometer!(400.0), meter!(1.0)).unwrap();
        let lens = Component::lens("L1", millimeter!(300.0), millimeter!(400.0)).unwrap();
        let target = *path.target_waist().unwrap();
        let with_lens = path.overlap_with(&[lens.clone()], &target).unwrap();
        assert!(path.components().is_empty());
        path.add_component(lens);
        assert_eq!(path.target_overlap().unwrap(), with_lens);
    }
    #[test]
    fn fit_beam_width() {
        let path = path();
        let positions = millimeter!(-600.0, -300.0, 0.0, 300.0, 600.0, 900.0);
        let widths: Vec<Length> = positions
            .iter()
            .map(|p| path.width_at(*p).unwrap())
            .collect();
        let fit = path.fit_beam_width(&positions, &widths).unwrap();
        assert!(fit.converged());
        assert_relative_eq!(fit.waist_radius().value, 200.0e-6, max_relative = 1e-6);
        assert_abs_diff_eq!(fit.waist_position().value, 0.0, epsilon = 1e-6);
        assert!(path.fit_beam_width(&positions[..2], &widths[..2]).is_err());
    }
    #[test]
    fn display() {
        let mut path = path();
        path.add_component(Component::lens("L1", millimeter!(100.0), millimeter!(50.0)).unwrap());
        path.set_target_waist(micrometer!(400.0), meter!(1.0)).unwrap();
        assert_eq!(
            format!("{path}"),
            "seed: waist 200.0 µm @ 0.00 mm\nL1 (lens f=100.00 mm) @ 50.00 mm\ntarget: waist 400.0 µm @ 1000.00 mm\n"
        );
    }
}
