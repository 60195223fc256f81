use delve_core::Point;

/// Minimal search interface: neighbor enumeration.
///
/// The relation must be symmetric: if `q` is a neighbor of `p`, then `p` is
/// a neighbor of `q`. Path construction walks the distance field backwards
/// through the same function.
pub trait Pather {
    /// Append neighbors of `p` into `buf`. The caller clears `buf` before calling.
    fn neighbors(&self, p: Point, buf: &mut Vec<Point>);
}

/// Pather with a per-cell entry cost.
pub trait WeightedPather: Pather {
    /// Cost charged for entering `p`, or `None` if `p` cannot be entered.
    ///
    /// Returned costs must be strictly positive; zero or negative costs
    /// break the priority-queue ordering and are rejected with a panic.
    fn entry_cost(&self, p: Point) -> Option<f64>;
}

/// Weighted pather with a heuristic, for goal-directed searches.
pub trait AstarPather: WeightedPather {
    /// Estimate of the remaining cost from `from` to `to`.
    ///
    /// An admissible estimate yields optimal paths; an inadmissible one
    /// trades optimality for fewer expansions.
    fn estimate(&self, from: Point, to: Point) -> f64;
}
