//! Optimized component combinations.
use super::search_space::PositionBounds;
use crate::{
    beam_path::{BeamPath, Waist},
    component::Component,
    error::MmResult,
    sensitivity::{sensitivity, SensitivityConfig, SensitivityScore},
};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uom::si::{f64::Length, length::millimeter};

/// A slot bound to one candidate at a concrete position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotAssignment {
    slot: String,
    component: Component,
    bounds: PositionBounds,
}
impl SlotAssignment {
    pub(crate) const fn new(slot: String, component: Component, bounds: PositionBounds) -> Self {
        Self {
            slot,
            component,
            bounds,
        }
    }
    /// Returns the slot name.
    #[must_use]
    pub fn slot(&self) -> &str {
        &self.slot
    }
    /// Returns the placed component.
    #[must_use]
    pub const fn component(&self) -> &Component {
        &self.component
    }
    /// Returns the interval the component was allowed to move in.
    #[must_use]
    pub const fn bounds(&self) -> &PositionBounds {
        &self.bounds
    }
}

/// One optimized combination: the solved beam path and its overlap with the target waist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    base: BeamPath,
    assignments: Vec<SlotAssignment>,
    target: Waist,
    target_bounds: Option<PositionBounds>,
    overlap: f64,
    path: BeamPath,
}
impl Solution {
    /// Creates a [`Solution`] from a base path (seed and fixed components) and the placed slot components.
    pub(crate) fn new(
        base: &BeamPath,
        assignments: Vec<SlotAssignment>,
        target: Waist,
        target_bounds: Option<PositionBounds>,
        overlap: f64,
    ) -> MmResult<Self> {
        let mut path = base.clone();
        for assignment in &assignments {
            path.add_component(assignment.component.clone());
        }
        path.set_target_waist(target.radius(), target.position())?;
        Ok(Self {
            base: base.clone(),
            assignments,
            target,
            target_bounds,
            overlap,
            path,
        })
    }
    /// Returns the complete beam path including the placed slot components and the final target waist.
    #[must_use]
    pub const fn path(&self) -> &BeamPath {
        &self.path
    }
    /// Returns the beam path without the slot components.
    #[must_use]
    pub const fn base_path(&self) -> &BeamPath {
        &self.base
    }
    /// Returns the slot assignments in slot order.
    #[must_use]
    pub fn assignments(&self) -> &[SlotAssignment] {
        &self.assignments
    }
    /// Returns the position of the component assigned to the given slot.
    #[must_use]
    pub fn position_of(&self, slot: &str) -> Option<Length> {
        self.assignments
            .iter()
            .find(|a| a.slot == slot)
            .map(|a| a.component.position())
    }
    /// Returns the final target waist.
    #[must_use]
    pub const fn target(&self) -> &Waist {
        &self.target
    }
    /// Returns the final target position.
    #[must_use]
    pub fn target_position(&self) -> Length {
        self.target.position()
    }
    /// Returns the interval of the target position, if it was free.
    #[must_use]
    pub const fn target_bounds(&self) -> Option<&PositionBounds> {
        self.target_bounds.as_ref()
    }
    /// Returns the achieved overlap.
    #[must_use]
    pub const fn overlap(&self) -> f64 {
        self.overlap
    }
    /// Returns the placed slot components.
    #[must_use]
    pub fn slot_components(&self) -> Vec<Component> {
        self.assignments
            .iter()
            .map(|a| a.component.clone())
            .collect()
    }
    /// Sensitivity of the overlap to placement errors using the default [`SensitivityConfig`].
    ///
    /// # Errors
    ///
    /// This function will return an error if a perturbed configuration is non-physical.
    pub fn position_sensitivity(&self) -> MmResult<SensitivityScore> {
        sensitivity(self, &SensitivityConfig::default())
    }
    /// Sensitivity of the overlap to placement errors.
    ///
    /// # Errors
    ///
    /// This function will return an error if the configuration is invalid or a perturbed configuration is
    /// non-physical.
    pub fn position_sensitivity_with(&self, config: &SensitivityConfig) -> MmResult<SensitivityScore> {
        sensitivity(self, config)
    }
}
impl Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "overlap: {:.6}", self.overlap)?;
        for assignment in &self.assignments {
            writeln!(
                f,
                "  {}: {} in {}",
                assignment.slot, assignment.component, assignment.bounds
            )?;
        }
        write!(
            f,
            "  target @ {:.2} mm",
            self.target.position().get::<millimeter>()
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{meter, micrometer, millimeter};
    use approx::assert_abs_diff_eq;

    fn solution() -> Solution {
        let mut base = BeamPath::default();
        base.set_seed_waist(micrometer!(200.0), meter!(0.0)).unwrap();
        let lens = Component::lens("f=300.0mm", millimeter!(300.0), millimeter!(400.0)).unwrap();
        let bounds = PositionBounds::new(millimeter!(50.0), millimeter!(500.0)).unwrap();
        let target = Waist::new(micrometer!(400.0), meter!(1.0)).unwrap();
        let assignments = vec![SlotAssignment::new("lens1".into(), lens, bounds)];
        let mut path = base.clone();
        path.set_target_waist(target.radius(), target.position())
            .unwrap();
        let overlap = path
            .overlap_with(&[assignments[0].component().clone()], &target)
            .unwrap();
        Solution::new(&base, assignments, target, None, overlap).unwrap()
    }
    #[test]
    fn new() {
        let s = solution();
        assert!(s.base_path().components().is_empty());
        assert_eq!(s.path().components().len(), 1);
        assert_eq!(s.position_of("lens1"), Some(millimeter!(400.0)));
        assert_eq!(s.position_of("lens2"), None);
        assert_eq!(s.target_position(), meter!(1.0));
        assert!(s.target_bounds().is_none());
        assert_abs_diff_eq!(s.path().target_overlap().unwrap(), s.overlap());
        assert_eq!(s.slot_components().len(), 1);
    }
    #[test]
    fn display() {
        let s = solution();
        let text = format!("{s}");
        assert!(text.starts_with("overlap: "));
        assert!(text.contains("lens1: f=300.0mm (lens f=300.00 mm) @ 400.00 mm in [50.00 mm, 500.00 mm]"));
        assert!(text.ends_with("target @ 1000.00 mm"));
    }
}
