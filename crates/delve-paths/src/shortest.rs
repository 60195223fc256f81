//! Single-target shortest paths with lazy, consumable results.

use delve_core::{Point, Range};

use crate::context::{INFINITY, SearchContext};
use crate::traits::{AstarPather, Pather, WeightedPather};

/// Tuning for [`ShortestPath::retreat`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetreatConfig {
    /// Cost bound of the local distance field built around the target.
    pub local_radius: f64,
    /// Cells of slack around the two endpoints that the search may use.
    pub margin: i32,
}

impl Default for RetreatConfig {
    fn default() -> Self {
        Self {
            local_radius: 6.0,
            margin: 8,
        }
    }
}

/// A path from a mover's position to a target, consumed one step at a time.
///
/// The search is rooted at the target, so the distance field it leaves
/// behind describes the cost *to* the target; the path is then read off by
/// descending that field from the mover. The stored path shrinks as the
/// mover advances through [`next_move`](Self::next_move): it is a forward
/// iterator from the consumer's current position, not a re-entrant query.
#[derive(Debug, Clone)]
pub struct ShortestPath {
    /// Remaining cells, target first and current position last.
    path: Vec<Point>,
    target: Point,
    bounds: Range,
    reversed: bool,
}

impl ShortestPath {
    /// Search from `target` toward `from`.
    ///
    /// Expansion is ordered by `distance + estimate(cell, from)` and stops as
    /// soon as `from` is settled. With `from == None` the whole reachable set
    /// is explored, leaving the distance field in `ctx` for
    /// [`SearchContext::distance`] queries, and the path is empty.
    ///
    /// Callers usually gate this with a connectivity check such as
    /// [`Sectors::same`](crate::Sectors::same): the search itself does not
    /// know that a target is unreachable until it runs out of cells.
    ///
    /// # Panics
    ///
    /// If `pather` reports a non-positive entry cost, or if the resulting
    /// distance field cannot be descended back to the target.
    pub fn new<P: AstarPather>(
        ctx: &mut SearchContext,
        pather: &P,
        target: Point,
        from: Option<Point>,
    ) -> Self {
        let bounds = ctx.range();
        let mut sp = Self::unreachable(target, bounds, false);
        if !bounds.contains(target) {
            return sp;
        }
        let Some(from) = from else {
            ctx.run_weighted(
                pather,
                bounds,
                &[(target, 0.0)],
                None,
                |_| 0.0,
                INFINITY,
                |_, _| {},
            );
            return sp;
        };
        if !bounds.contains(from) {
            return sp;
        }
        let found = ctx.run_weighted(
            pather,
            bounds,
            &[(target, 0.0)],
            Some(from),
            |p| pather.estimate(p, from),
            INFINITY,
            |_, _| {},
        );
        if found {
            sp.construct_path(ctx, pather, from);
        }
        sp
    }

    /// Search for a step sequence that moves `from` away from (`mult < 0`)
    /// or toward (`mult > 0`) `target`, at bounded cost.
    ///
    /// The search rectangle shrinks to the endpoints plus `config.margin`.
    /// A first pass builds the distance field around `target` up to
    /// `config.local_radius`; a second pass reseeds every cell of that field
    /// at `mult * distance` and expands until `from` is settled. The path
    /// descends the second field and stops at its first local minimum,
    /// which becomes the path's target. This is a deliberate approximation,
    /// not a shortest path.
    ///
    /// # Panics
    ///
    /// If `mult` is zero or not finite, or on a non-positive entry cost.
    pub fn retreat<P: WeightedPather>(
        ctx: &mut SearchContext,
        pather: &P,
        target: Point,
        from: Point,
        mult: f64,
        config: &RetreatConfig,
    ) -> Self {
        assert!(
            mult != 0.0 && mult.is_finite(),
            "retreat multiplier must be finite and non-zero, got {mult}"
        );
        let bounds = ctx
            .range()
            .intersect(Range::spanning(target, from).expand(config.margin));
        let mut sp = Self::unreachable(target, bounds, true);
        if !bounds.contains(target) || !bounds.contains(from) {
            return sp;
        }

        let mut seeds = Vec::new();
        ctx.run_weighted(
            pather,
            bounds,
            &[(target, 0.0)],
            None,
            |_| 0.0,
            config.local_radius,
            |p, d| seeds.push((p, mult * d)),
        );
        let found = ctx.run_weighted(pather, bounds, &seeds, Some(from), |_| 0.0, INFINITY, |_, _| {});
        if found {
            sp.construct_path(ctx, pather, from);
        } else {
            log::debug!("retreat from {from}: no route within {bounds}");
        }
        sp
    }

    /// A path that reaches nothing.
    pub fn unreachable(target: Point, bounds: Range, reversed: bool) -> Self {
        Self {
            path: Vec::new(),
            target,
            bounds,
            reversed,
        }
    }

    /// Walk from `from` down the recorded distance field, each step taking
    /// the neighbor with the smallest distance strictly below the current one.
    fn construct_path<P: Pather>(&mut self, ctx: &mut SearchContext, pather: &P, from: Point) {
        let mut path = vec![from];
        let mut pos = from;
        let mut nbuf = std::mem::take(&mut ctx.nbuf);
        while self.reversed || pos != self.target {
            let current = ctx.distance(pos);
            let mut best: Option<(Point, f64)> = None;
            nbuf.clear();
            pather.neighbors(pos, &mut nbuf);
            for &n in nbuf.iter() {
                if !self.bounds.contains(n) {
                    continue;
                }
                let d = ctx.distance(n);
                if d < current && best.is_none_or(|(_, bd)| d < bd) {
                    best = Some((n, d));
                }
            }
            match best {
                Some((next, _)) => {
                    path.push(next);
                    pos = next;
                }
                None if self.reversed => {
                    log::debug!("retreat path from {from} stops at {pos} after {} steps", path.len() - 1);
                    self.target = pos;
                    break;
                }
                None => {
                    ctx.nbuf = nbuf;
                    panic!(
                        "corrupted distance table: no descent from {pos} toward {}",
                        self.target
                    );
                }
            }
        }
        ctx.nbuf = nbuf;
        path.reverse();
        self.path = path;
    }

    /// Whether `pos` lies on the remaining path, so that
    /// [`next_move`](Self::next_move) may be called with it.
    pub fn is_reachable(&self, pos: Point) -> bool {
        self.path.contains(&pos)
    }

    /// Advance to `pos` and return the following cell, or `None` once `pos`
    /// is the end of the path.
    ///
    /// Every step before `pos` is dropped.
    ///
    /// # Panics
    ///
    /// If `pos` is not on the remaining path.
    pub fn next_move(&mut self, pos: Point) -> Option<Point> {
        self.advance_to(pos);
        let n = self.path.len();
        (n >= 2).then(|| self.path[n - 2])
    }

    /// Like [`next_move`](Self::next_move) but two steps ahead; with a single
    /// step left, that step is returned.
    ///
    /// # Panics
    ///
    /// If `pos` is not on the remaining path.
    pub fn next_next_move(&mut self, pos: Point) -> Option<Point> {
        self.advance_to(pos);
        match self.path.len() {
            0 | 1 => None,
            2 => Some(self.path[0]),
            n => Some(self.path[n - 3]),
        }
    }

    fn advance_to(&mut self, pos: Point) {
        assert!(
            self.is_reachable(pos),
            "{pos} is not on the remaining path to {}",
            self.target
        );
        while self.path.last() != Some(&pos) {
            self.path.pop();
        }
    }

    /// Where the path ends. In retreat mode this is the cell the search
    /// settled on, not necessarily the point passed in.
    #[inline]
    pub fn target(&self) -> Point {
        self.target
    }

    /// The rectangle the search was confined to.
    #[inline]
    pub fn bounds(&self) -> Range {
        self.bounds
    }

    /// Whether this path came from [`retreat`](Self::retreat).
    #[inline]
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Whether the path holds no cells at all (unreachable).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Number of moves left.
    #[inline]
    pub fn len(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Remaining cells in walking order, current position first.
    pub fn steps(&self) -> impl Iterator<Item = Point> + '_ {
        self.path.iter().rev().copied()
    }
}
