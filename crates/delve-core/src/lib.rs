//! **delve-core**: shared types for the delve navigation and visibility
//! engine.
//!
//! This crate provides the geometry primitives every other delve crate is
//! sized and addressed with, and the level identifiers used by portals.

pub mod geom;
pub mod level;

pub use geom::{Point, Range, RangeIter, within_euclidean};
pub use level::{LevelId, Position};
