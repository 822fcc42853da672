#![warn(missing_docs)]
//! Thin optical components and candidate lists.
//!
//! A [`Component`] is an immutable, labeled, positioned element. The physics of an element is given by its
//! [`ComponentKind`], which is mapped onto an [`AbcdMatrix`] in exactly one place ([`ComponentKind::abcd_matrix`]).
use crate::{
    abcd::AbcdMatrix,
    error::{MmResult, ModeMatchError},
};
use num::Zero;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use strum::{AsRefStr, EnumDiscriminants};
use uom::si::{f64::Length, length::millimeter};

/// The kind of a thin optical element together with its defining parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, EnumDiscriminants)]
#[strum_discriminants(name(ComponentType), derive(AsRefStr))]
pub enum ComponentKind {
    /// Additional free space propagation of the given length inserted at the component position (e.g. a folded
    /// delay line). It has no axial extent in the path.
    FreeSpace {
        /// gap length
        length: Length,
    },
    /// Ideal thin lens. A positive focal length corresponds to a focussing lens.
    Lens {
        /// focal length
        focal_length: Length,
    },
}
impl ComponentKind {
    /// Create a free space element.
    ///
    /// # Errors
    ///
    /// This function will return an error if the length is not finite.
    pub fn free_space(length: Length) -> MmResult<Self> {
        if !length.is_finite() {
            return Err(ModeMatchError::InvalidInput(
                "free space length must be finite".into(),
            ));
        }
        Ok(Self::FreeSpace { length })
    }
    /// Create an ideal thin lens.
    ///
    /// # Errors
    ///
    /// This function will return an error if the focal length is zero or not finite.
    pub fn lens(focal_length: Length) -> MmResult<Self> {
        if focal_length.is_zero() || !focal_length.is_normal() {
            return Err(ModeMatchError::InvalidInput(
                "focal length must be != 0.0 and finite".into(),
            ));
        }
        Ok(Self::Lens { focal_length })
    }
    /// Returns the ABCD matrix of this element.
    #[must_use]
    pub fn abcd_matrix(&self) -> AbcdMatrix {
        match self {
            Self::FreeSpace { length } => AbcdMatrix::free_space(length.value),
            Self::Lens { focal_length } => AbcdMatrix::thin_lens(focal_length.value),
        }
    }
    /// Returns the ABCD matrix undoing this element (used for backward propagation).
    #[must_use]
    pub fn inverse_abcd_matrix(&self) -> AbcdMatrix {
        match self {
            Self::FreeSpace { length } => AbcdMatrix::free_space(-length.value),
            Self::Lens { focal_length } => AbcdMatrix::thin_lens(-focal_length.value),
        }
    }
    /// Returns the defining parameter (gap length or focal length).
    #[must_use]
    pub fn parameter(&self) -> Length {
        match self {
            Self::FreeSpace { length } => *length,
            Self::Lens { focal_length } => *focal_length,
        }
    }
}
impl Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FreeSpace { length } => {
                write!(f, "free space {:.2} mm", length.get::<millimeter>())
            }
            Self::Lens { focal_length } => {
                write!(f, "lens f={:.2} mm", focal_length.get::<millimeter>())
            }
        }
    }
}

/// Labeled thin optical element at an axial position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    label: String,
    kind: ComponentKind,
    position: Length,
}
impl Component {
    /// Creates a new [`Component`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the position is not finite.
    pub fn new(label: &str, kind: ComponentKind, position: Length) -> MmResult<Self> {
        if !position.is_finite() {
            return Err(ModeMatchError::InvalidInput(
                "component position must be finite".into(),
            ));
        }
        Ok(Self {
            label: label.into(),
            kind,
            position,
        })
    }
    /// Shortcut for creating a thin lens at the given position.
    ///
    /// # Errors
    ///
    /// This function will return an error if the focal length is zero or not finite or the position is not finite.
    pub fn lens(label: &str, focal_length: Length, position: Length) -> MmResult<Self> {
        Self::new(label, ComponentKind::lens(focal_length)?, position)
    }
    /// Shortcut for creating a free space element at the given position.
    ///
    /// # Errors
    ///
    /// This function will return an error if the length or the position is not finite.
    pub fn free_space(label: &str, length: Length, position: Length) -> MmResult<Self> {
        Self::new(label, ComponentKind::free_space(length)?, position)
    }
    /// Returns a copy of this [`Component`] placed at another position.
    ///
    /// # Errors
    ///
    /// This function will return an error if the position is not finite.
    pub fn placed_at(&self, position: Length) -> MmResult<Self> {
        Self::new(&self.label, self.kind, position)
    }
    /// Returns the label of this [`Component`].
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
    /// Returns the kind of this [`Component`].
    #[must_use]
    pub const fn kind(&self) -> &ComponentKind {
        &self.kind
    }
    /// Returns the axial position of this [`Component`].
    #[must_use]
    pub fn position(&self) -> Length {
        self.position
    }
}
impl Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) @ {:.2} mm",
            self.label,
            self.kind,
            self.position.get::<millimeter>()
        )
    }
}

/// Ordered list of candidate components of the same kind for one slot.
///
/// The positions of the candidates are meaningless; the search places each candidate inside the interval of its
/// slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CandidateList {
    candidates: Vec<Component>,
}
impl CandidateList {
    /// Creates a candidate list from a vector of components.
    ///
    /// # Errors
    ///
    /// This function will return an error if the components are not all of the same kind.
    pub fn new(candidates: Vec<Component>) -> MmResult<Self> {
        if let Some(first) = candidates.first() {
            let component_type = ComponentType::from(first.kind());
            if candidates
                .iter()
                .any(|c| ComponentType::from(c.kind()) != component_type)
            {
                return Err(ModeMatchError::InvalidInput(format!(
                    "all candidates must be of type {}",
                    component_type.as_ref()
                )));
            }
        }
        Ok(Self { candidates })
    }
    /// Creates a list of thin lenses with the given focal lengths.
    ///
    /// The candidates are labeled `f=<focal length in mm>`.
    ///
    /// # Errors
    ///
    /// This function will return an error if one of the focal lengths is zero or not finite.
    pub fn lenses(focal_lengths: &[Length]) -> MmResult<Self> {
        let candidates = focal_lengths
            .iter()
            .map(|f| {
                Component::lens(
                    &format!("f={:.1}mm", f.get::<millimeter>()),
                    *f,
                    Length::zero(),
                )
            })
            .collect::<MmResult<Vec<_>>>()?;
        Ok(Self { candidates })
    }
    /// Creates a list of free space elements with the given lengths.
    ///
    /// # Errors
    ///
    /// This function will return an error if one of the lengths is not finite.
    pub fn free_spaces(lengths: &[Length]) -> MmResult<Self> {
        let candidates = lengths
            .iter()
            .map(|l| {
                Component::free_space(
                    &format!("d={:.1}mm", l.get::<millimeter>()),
                    *l,
                    Length::zero(),
                )
            })
            .collect::<MmResult<Vec<_>>>()?;
        Ok(Self { candidates })
    }
    /// Returns an independent copy of this list which can be attached to another slot.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            candidates: self.candidates.clone(),
        }
    }
    /// Returns the candidates of this list.
    #[must_use]
    pub fn candidates(&self) -> &[Component] {
        &self.candidates
    }
    /// Returns the number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }
    /// Returns `true` if the list contains no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
