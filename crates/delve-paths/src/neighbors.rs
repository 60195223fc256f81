use delve_core::{Point, Range};

use crate::distance::chebyshev;
use crate::traits::{AstarPather, Pather, WeightedPather};

/// Which geometric neighbors a cell has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Directions {
    /// Up, right, down, left.
    Cardinal,
    /// Cardinal plus diagonal moves.
    #[default]
    All,
}

impl Directions {
    /// Append the neighbors of `p` that lie inside `bounds` and satisfy `keep`.
    pub fn push_neighbors(
        self,
        p: Point,
        bounds: Range,
        buf: &mut Vec<Point>,
        keep: impl Fn(Point) -> bool,
    ) {
        let mut push = |n: Point| {
            if bounds.contains(n) && keep(n) {
                buf.push(n);
            }
        };
        match self {
            Directions::Cardinal => p.neighbors_4().into_iter().for_each(&mut push),
            Directions::All => p.neighbors_8().into_iter().for_each(&mut push),
        }
    }
}

/// Unweighted pather over a passability closure.
///
/// Neighbors are the in-bounds cells in `dirs` for which `passable` holds;
/// this is the entry predicate of a breadth-first search.
pub struct FnPather<F> {
    bounds: Range,
    dirs: Directions,
    passable: F,
}

impl<F: Fn(Point) -> bool> FnPather<F> {
    pub fn new(bounds: Range, passable: F) -> Self {
        Self {
            bounds,
            dirs: Directions::All,
            passable,
        }
    }

    /// Restrict movement to the four cardinal directions.
    pub fn cardinal(mut self) -> Self {
        self.dirs = Directions::Cardinal;
        self
    }
}

impl<F: Fn(Point) -> bool> Pather for FnPather<F> {
    fn neighbors(&self, p: Point, buf: &mut Vec<Point>) {
        self.dirs
            .push_neighbors(p, self.bounds, buf, |n| (self.passable)(n));
    }
}

/// Weighted pather over an entry-cost closure.
///
/// Cells with `None` cost are impassable. The estimate is the Chebyshev
/// distance scaled by `min_cost`, which is admissible as long as no entry
/// cost is below `min_cost`.
pub struct CostFnPather<F> {
    bounds: Range,
    dirs: Directions,
    min_cost: f64,
    cost: F,
}

impl<F: Fn(Point) -> Option<f64>> CostFnPather<F> {
    pub fn new(bounds: Range, cost: F) -> Self {
        Self {
            bounds,
            dirs: Directions::All,
            min_cost: 1.0,
            cost,
        }
    }

    /// Set the lower bound on entry costs used to scale the estimate.
    pub fn with_min_cost(mut self, min_cost: f64) -> Self {
        self.min_cost = min_cost;
        self
    }

    /// Restrict movement to the four cardinal directions.
    pub fn cardinal(mut self) -> Self {
        self.dirs = Directions::Cardinal;
        self
    }
}

impl<F: Fn(Point) -> Option<f64>> Pather for CostFnPather<F> {
    fn neighbors(&self, p: Point, buf: &mut Vec<Point>) {
        self.dirs.push_neighbors(p, self.bounds, buf, |_| true);
    }
}

impl<F: Fn(Point) -> Option<f64>> WeightedPather for CostFnPather<F> {
    fn entry_cost(&self, p: Point) -> Option<f64> {
        (self.cost)(p)
    }
}

impl<F: Fn(Point) -> Option<f64>> AstarPather for CostFnPather<F> {
    fn estimate(&self, from: Point, to: Point) -> f64 {
        let steps = match self.dirs {
            Directions::All => chebyshev(from, to),
            Directions::Cardinal => crate::distance::manhattan(from, to),
        };
        steps as f64 * self.min_cost
    }
}
