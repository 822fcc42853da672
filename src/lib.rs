//! This is the documentation for the **modematch** package.
//!
//! **modematch** propagates Gaussian beams through one-dimensional paths of thin lenses and free space gaps using
//! the ABCD formalism and searches lens catalogs for combinations and positions that transform a seed beam into a
//! target beam.
//!
//! A typical mode matching task:
//!
//! ```
//! use modematch::{
//!     chooser::{ChooserConfig, PositionBounds, SearchSpace},
//!     component::CandidateList,
//!     meter, micrometer, millimeter, BeamPath,
//! };
//!
//! let mut path = BeamPath::default();
//! path.set_seed_waist(micrometer!(200.0), meter!(0.0)).unwrap();
//! path.set_target_waist(micrometer!(400.0), meter!(1.0)).unwrap();
//!
//! let mut search_space = SearchSpace::new();
//! search_space
//!     .add_slot(
//!         "lens1",
//!         CandidateList::lenses(&millimeter!(100.0, 200.0, 300.0)).unwrap(),
//!         PositionBounds::new(millimeter!(50.0), millimeter!(500.0)).unwrap(),
//!     )
//!     .unwrap();
//! search_space.set_min_overlap(0.1).unwrap();
//!
//! let mut outcome = path
//!     .choose_components(&search_space, &ChooserConfig::default())
//!     .unwrap();
//! outcome.sort_by_overlap();
//! assert!(outcome.solutions()[0].overlap() > 0.99);
//! ```
#![allow(clippy::module_name_repetitions)]

pub mod abcd;
pub mod beam;
pub mod beam_fit;
pub mod beam_path;
pub mod chooser;
pub mod component;
pub mod error;
pub mod overlap;
pub mod sensitivity;
pub mod utils;

pub use beam::GaussianBeam;
pub use beam_path::BeamPath;
pub use error::{MmResult, ModeMatchError};
