//! Level identity.
//!
//! A world is a set of levels, each with its own bounds. Most structures are
//! per level and only need [`Point`]s; portals may lead to another level, so
//! their far end is a full [`Position`].

use std::fmt;

use crate::geom::Point;

/// Identifier of one level of the world.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LevelId(pub u32);

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A cell on a specific level.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub level: LevelId,
    pub pos: Point,
}

impl Position {
    #[inline]
    pub const fn new(level: LevelId, pos: Point) -> Self {
        Self { level, pos }
    }

    /// Whether both positions lie on the same level.
    #[inline]
    pub fn same_level(self, other: Position) -> bool {
        self.level == other.level
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.level, self.pos)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_level() {
        let a = Position::new(LevelId(1), Point::new(0, 0));
        let b = Position::new(LevelId(1), Point::new(5, 5));
        let c = Position::new(LevelId(2), Point::new(0, 0));
        assert!(a.same_level(b));
        assert!(!a.same_level(c));
        assert_eq!(a.to_string(), "L1:(0, 0)");
    }
}
