//! Named slots with candidate lists and position intervals.
use crate::{
    component::CandidateList,
    error::{MmResult, ModeMatchError},
    utils::interval_midpoint,
};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uom::si::{
    f64::Length,
    length::{meter, millimeter},
};

/// Closed interval of allowed axial positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionBounds {
    min: Length,
    max: Length,
}
impl PositionBounds {
    /// Creates new [`PositionBounds`] `[min, max]`.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - one of the limits is NaN or `min > max` ([`ModeMatchError::InvalidInput`]).
    ///   - one of the limits is infinite ([`ModeMatchError::OutOfBoundsPosition`]).
    pub fn new(min: Length, max: Length) -> MmResult<Self> {
        if min.is_nan() || max.is_nan() {
            return Err(ModeMatchError::InvalidInput(
                "position bounds must not be NaN".into(),
            ));
        }
        if min.is_infinite() || max.is_infinite() {
            return Err(ModeMatchError::OutOfBoundsPosition(
                "position bounds must be finite".into(),
            ));
        }
        if min > max {
            return Err(ModeMatchError::InvalidInput(format!(
                "lower position bound ({:.3} mm) exceeds upper bound ({:.3} mm)",
                min.get::<millimeter>(),
                max.get::<millimeter>()
            )));
        }
        Ok(Self { min, max })
    }
    /// Degenerate interval `[position, position]`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the position is not finite.
    pub fn fixed(position: Length) -> MmResult<Self> {
        Self::new(position, position)
    }
    /// Returns the lower limit.
    #[must_use]
    pub fn min(&self) -> Length {
        self.min
    }
    /// Returns the upper limit.
    #[must_use]
    pub fn max(&self) -> Length {
        self.max
    }
    /// Returns the midpoint of the interval.
    #[must_use]
    pub fn midpoint(&self) -> Length {
        Length::new::<meter>(interval_midpoint(self.min.value, self.max.value))
    }
    /// Returns `true` if the interval consists of a single point.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }
    /// Returns `true` if the position lies inside the interval (limits included).
    #[must_use]
    pub fn contains(&self, position: Length) -> bool {
        position >= self.min && position <= self.max
    }
    /// Limits in meter, as used by the optimizer.
    pub(crate) fn as_meter(&self) -> (f64, f64) {
        (self.min.value, self.max.value)
    }
}
impl Display for PositionBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:.2} mm, {:.2} mm]",
            self.min.get::<millimeter>(),
            self.max.get::<millimeter>()
        )
    }
}

/// A named role in the beam path filled by one candidate placed inside the given interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    name: String,
    candidates: CandidateList,
    bounds: PositionBounds,
}
impl Slot {
    /// Returns the name of this [`Slot`].
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Returns the candidates of this [`Slot`].
    #[must_use]
    pub const fn candidates(&self) -> &CandidateList {
        &self.candidates
    }
    /// Returns the allowed position interval of this [`Slot`].
    #[must_use]
    pub const fn bounds(&self) -> &PositionBounds {
        &self.bounds
    }
}

/// Slots, target interval and pre-check threshold of a component search.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    slots: Vec<Slot>,
    target_bounds: Option<PositionBounds>,
    min_overlap: f64,
}
impl SearchSpace {
    /// Creates an empty [`SearchSpace`] without target interval and a pre-check threshold of zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Add a named slot.
    ///
    /// Slots are enumerated in the order they were added.
    ///
    /// # Errors
    ///
    /// This function will return an error if a slot with the same name already exists or the name is empty.
    pub fn add_slot(
        &mut self,
        name: &str,
        candidates: CandidateList,
        bounds: PositionBounds,
    ) -> MmResult<()> {
        if name.is_empty() {
            return Err(ModeMatchError::InvalidInput(
                "slot name must not be empty".into(),
            ));
        }
        if self.slots.iter().any(|s| s.name == name) {
            return Err(ModeMatchError::InvalidInput(format!(
                "slot {name} already exists"
            )));
        }
        self.slots.push(Slot {
            name: name.into(),
            candidates,
            bounds,
        });
        Ok(())
    }
    /// Let the target waist position vary inside the given interval.
    pub fn set_target_bounds(&mut self, bounds: PositionBounds) {
        self.target_bounds = Some(bounds);
    }
    /// Set the threshold of the feasibility pre-check.
    ///
    /// Combinations with a lower overlap for the default placement are not optimized.
    ///
    /// # Errors
    ///
    /// This function will return an error if the threshold is not within `[0, 1]`.
    pub fn set_min_overlap(&mut self, min_overlap: f64) -> MmResult<()> {
        if !(0.0..=1.0).contains(&min_overlap) {
            return Err(ModeMatchError::InvalidInput(
                "minimum overlap must be within [0.0, 1.0]".into(),
            ));
        }
        self.min_overlap = min_overlap;
        Ok(())
    }
    /// Returns the slots in insertion order.
    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }
    /// Returns the interval of the target position (if the target position is free).
    #[must_use]
    pub const fn target_bounds(&self) -> Option<&PositionBounds> {
        self.target_bounds.as_ref()
    }
    /// Returns the pre-check threshold.
    #[must_use]
    pub const fn min_overlap(&self) -> f64 {
        self.min_overlap
    }
    /// Returns the number of candidate combinations.
    #[must_use]
    pub fn nr_of_combinations(&self) -> usize {
        self.slots.iter().map(|s| s.candidates.len()).product()
    }
    /// Check the slot intervals against the seed waist position.
    ///
    /// # Errors
    ///
    /// This function will return [`ModeMatchError::OutOfBoundsPosition`] if a slot interval starts before the seed
    /// position.
    pub fn validate(&self, seed_position: Length) -> MmResult<()> {
        for slot in &self.slots {
            if slot.bounds.min < seed_position {
                return Err(ModeMatchError::OutOfBoundsPosition(format!(
                    "interval {} of slot {} starts before the seed waist at {:.2} mm",
                    slot.bounds,
                    slot.name,
                    seed_position.get::<millimeter>()
                )));
            }
        }
        Ok(())
    }
}
