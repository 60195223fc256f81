//! Level-aware searching: portal registry and portal-aware shortest paths.

use std::collections::BTreeMap;

use delve_core::{LevelId, Point, Position, Range};

use crate::context::{INFINITY, SearchContext};
use crate::sectors::Sectors;
use crate::shortest::ShortestPath;
use crate::traits::{AstarPather, Pather, WeightedPather};

/// Portal endpoints hosted by one level.
///
/// Each endpoint leads to a [`Position`], which may be on this level (a
/// shortcut the search can take) or on another one (a staircase the caller
/// handles). A field of distances to the nearest endpoint is kept for the
/// search heuristic and refreshed with [`update_distances`](Self::update_distances).
#[derive(Debug, Clone)]
pub struct Portals {
    level: LevelId,
    range: Range,
    ends: BTreeMap<Point, Position>,
    nearest: Vec<f64>,
}

impl Portals {
    pub fn new(level: LevelId, range: Range) -> Self {
        Self {
            level,
            range,
            ends: BTreeMap::new(),
            nearest: vec![INFINITY; range.len()],
        }
    }

    /// The level hosting these endpoints.
    #[inline]
    pub fn level(&self) -> LevelId {
        self.level
    }

    /// Register a one-way endpoint at `pos` leading to `other`, replacing
    /// any previous endpoint there.
    ///
    /// Searches only walk same-level endpoints whose pair leads back, as
    /// set up by [`link`](Self::link). A lone endpoint is recorded for
    /// [`other_end`](Self::other_end) but never crossed.
    ///
    /// # Panics
    ///
    /// If `pos` is outside the level.
    pub fn add(&mut self, pos: Point, other: Position) -> Option<Position> {
        assert!(
            self.range.contains(pos),
            "portal at {pos} is outside level {} ({})",
            self.level,
            self.range
        );
        self.ends.insert(pos, other)
    }

    /// Register a two-way portal between two cells of this level.
    pub fn link(&mut self, a: Point, b: Point) {
        self.add(a, Position::new(self.level, b));
        self.add(b, Position::new(self.level, a));
    }

    /// Remove the endpoint at `pos`, returning where it led.
    pub fn remove(&mut self, pos: Point) -> Option<Position> {
        self.ends.remove(&pos)
    }

    /// Where the endpoint at `pos` leads.
    pub fn other_end(&self, pos: Point) -> Option<Position> {
        self.ends.get(&pos).copied()
    }

    /// The paired cell of the endpoint at `pos`, if it is on this level.
    fn same_level_end(&self, pos: Point) -> Option<Point> {
        self.other_end(pos)
            .filter(|o| o.level == self.level)
            .map(|o| o.pos)
    }

    /// The far cell of a two-way same-level portal at `pos`.
    fn linked_end(&self, pos: Point) -> Option<Point> {
        self.same_level_end(pos)
            .filter(|&q| self.same_level_end(q) == Some(pos))
    }

    pub fn len(&self) -> usize {
        self.ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// Endpoints in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Point, Position)> + '_ {
        self.ends.iter().map(|(&p, &o)| (p, o))
    }

    /// Cost from `p` to the nearest endpoint as of the last
    /// [`update_distances`](Self::update_distances).
    pub fn distance_to_nearest(&self, p: Point) -> Option<f64> {
        let d = self.nearest[self.range.index(p)?];
        d.is_finite().then_some(d)
    }

    /// Recompute the nearest-endpoint field with a multi-source Dijkstra
    /// from every endpoint, up to `max_cost`.
    pub fn update_distances<P: WeightedPather>(
        &mut self,
        ctx: &mut SearchContext,
        pather: &P,
        max_cost: f64,
    ) {
        self.nearest.fill(INFINITY);
        let sources: Vec<Point> = self.ends.keys().copied().collect();
        let nodes = ctx.dijkstra(pather, &sources, max_cost);
        for n in nodes {
            if let Some(i) = self.range.index(n.pos) {
                self.nearest[i] = n.cost;
            }
        }
        log::debug!(
            "portal field for {}: {} endpoints reach {} cells",
            self.level,
            sources.len(),
            nodes.len()
        );
    }
}

/// Adds two-way same-level portals to the neighbors of a base pather, so
/// the neighbor relation stays symmetric.
struct PortalPather<'a, P> {
    inner: &'a P,
    portals: &'a Portals,
}

impl<P: Pather> Pather for PortalPather<'_, P> {
    fn neighbors(&self, p: Point, buf: &mut Vec<Point>) {
        self.inner.neighbors(p, buf);
        if let Some(q) = self.portals.linked_end(p) {
            if !buf.contains(&q) {
                buf.push(q);
            }
        }
    }
}

impl<P: WeightedPather> WeightedPather for PortalPather<'_, P> {
    fn entry_cost(&self, p: Point) -> Option<f64> {
        self.inner.entry_cost(p)
    }
}

impl<P: AstarPather> AstarPather for PortalPather<'_, P> {
    /// The base estimate, or the detour through the portal network when
    /// that is shorter. The detour ignores which portals actually pair up,
    /// so it can underestimate wildly; it is a speed-up, not a bound.
    fn estimate(&self, from: Point, to: Point) -> f64 {
        let direct = self.inner.estimate(from, to);
        match (
            self.portals.distance_to_nearest(from),
            self.portals.distance_to_nearest(to),
        ) {
            (Some(a), Some(b)) => direct.min(a + b),
            _ => direct,
        }
    }
}

/// A [`ShortestPath`] on one level that may take same-level portals.
#[derive(Debug, Clone)]
pub struct LevelShortestPath {
    level: LevelId,
    path: ShortestPath,
}

impl LevelShortestPath {
    /// Search from `target` toward `from` on the level hosting `portals`.
    ///
    /// Positions on other levels, or endpoints that `sectors` reports as
    /// disconnected, give an unreachable path without searching. `sectors`
    /// should be built with the same portal pairs as extra connections.
    pub fn new<P: AstarPather>(
        ctx: &mut SearchContext,
        pather: &P,
        portals: &Portals,
        sectors: Option<&Sectors>,
        target: Position,
        from: Position,
    ) -> Self {
        let level = portals.level();
        let unreachable = |ctx: &SearchContext| Self {
            level,
            path: ShortestPath::unreachable(target.pos, ctx.range(), false),
        };
        if target.level != level || from.level != level {
            log::debug!("no same-level search from {from} to {target} on {level}");
            return unreachable(ctx);
        }
        if sectors.is_some_and(|s| !s.same(target.pos, from.pos)) {
            return unreachable(ctx);
        }
        let pather = PortalPather {
            inner: pather,
            portals,
        };
        Self {
            level,
            path: ShortestPath::new(ctx, &pather, target.pos, Some(from.pos)),
        }
    }

    #[inline]
    pub fn level(&self) -> LevelId {
        self.level
    }

    pub fn target(&self) -> Position {
        Position::new(self.level, self.path.target())
    }

    /// The underlying single-level path.
    pub fn path(&self) -> &ShortestPath {
        &self.path
    }

    /// Whether `pos` lies on the remaining path.
    pub fn is_reachable(&self, pos: Position) -> bool {
        pos.level == self.level && self.path.is_reachable(pos.pos)
    }

    /// See [`ShortestPath::next_move`]. A step may jump through a portal.
    ///
    /// # Panics
    ///
    /// If `pos` is not on the remaining path.
    pub fn next_move(&mut self, pos: Position) -> Option<Position> {
        self.check_level(pos);
        self.path
            .next_move(pos.pos)
            .map(|p| Position::new(self.level, p))
    }

    /// See [`ShortestPath::next_next_move`].
    ///
    /// # Panics
    ///
    /// If `pos` is not on the remaining path.
    pub fn next_next_move(&mut self, pos: Position) -> Option<Position> {
        self.check_level(pos);
        self.path
            .next_next_move(pos.pos)
            .map(|p| Position::new(self.level, p))
    }

    fn check_level(&self, pos: Position) {
        assert!(
            pos.level == self.level,
            "{pos} is not on the path's level {}",
            self.level
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neighbors::CostFnPather;

    const L1: LevelId = LevelId(1);

    fn at(x: i32, y: i32) -> Position {
        Position::new(L1, Point::new(x, y))
    }

    /// 10x10 with a wall at x = 5.
    fn walled(rng: Range) -> CostFnPather<impl Fn(Point) -> Option<f64>> {
        CostFnPather::new(rng, |p: Point| (p.x != 5).then_some(1.0))
    }

    #[test]
    fn portal_shortcut_is_taken() {
        let rng = Range::new(0, 0, 10, 10);
        let mut ctx = SearchContext::new(rng);
        let mut portals = Portals::new(L1, rng);
        portals.link(Point::new(0, 0), Point::new(9, 9));
        let pather = walled(rng);
        let mut path = LevelShortestPath::new(&mut ctx, &pather, &portals, None, at(9, 8), at(0, 1));
        let steps: Vec<Point> = path.path().steps().collect();
        assert_eq!(
            steps,
            vec![Point::new(0, 1), Point::new(0, 0), Point::new(9, 9), Point::new(9, 8)]
        );
        assert_eq!(path.next_move(at(0, 0)), Some(at(9, 9)));
        assert_eq!(path.target(), at(9, 8));
        assert_eq!(path.level(), L1);
    }

    #[test]
    fn one_way_portal_is_not_crossed() {
        let rng = Range::new(0, 0, 10, 10);
        let mut ctx = SearchContext::new(rng);
        let mut portals = Portals::new(L1, rng);
        portals.add(Point::new(9, 9), at(0, 0));
        let pather = walled(rng);
        let path = LevelShortestPath::new(&mut ctx, &pather, &portals, None, at(9, 8), at(0, 1));
        assert!(path.path().is_empty());
        assert!(!path.is_reachable(at(0, 1)));
        assert_eq!(portals.other_end(Point::new(9, 9)), Some(at(0, 0)));

        let wrapped = PortalPather {
            inner: &pather,
            portals: &portals,
        };
        let mut buf = Vec::new();
        wrapped.neighbors(Point::new(9, 9), &mut buf);
        assert!(!buf.contains(&Point::new(0, 0)));
    }

    #[test]
    fn sectors_gate_skips_search() {
        let rng = Range::new(0, 0, 10, 10);
        let mut ctx = SearchContext::new(rng);
        let portals = Portals::new(L1, rng);
        let mut sectors = Sectors::new(rng);
        for p in rng.iter().filter(|p| p.x != 5) {
            sectors.add(p);
        }
        let pather = walled(rng);
        let path = LevelShortestPath::new(&mut ctx, &pather, &portals, Some(&sectors), at(9, 9), at(0, 0));
        assert!(path.path().is_empty());
        assert!(!path.is_reachable(at(0, 0)));
    }

    #[test]
    fn other_level_portals_are_not_walked() {
        let rng = Range::new(0, 0, 10, 10);
        let mut ctx = SearchContext::new(rng);
        let mut portals = Portals::new(L1, rng);
        let down = Position::new(LevelId(2), Point::new(3, 3));
        portals.add(Point::new(0, 0), down);
        portals.add(Point::new(9, 9), down);
        assert_eq!(portals.other_end(Point::new(0, 0)), Some(down));
        let pather = walled(rng);
        let path = LevelShortestPath::new(&mut ctx, &pather, &portals, None, at(9, 9), at(0, 0));
        assert!(path.path().is_empty());
    }

    #[test]
    fn mismatched_levels_are_unreachable() {
        let rng = Range::new(0, 0, 10, 10);
        let mut ctx = SearchContext::new(rng);
        let portals = Portals::new(L1, rng);
        let pather = CostFnPather::new(rng, |_| Some(1.0));
        let target = Position::new(LevelId(2), Point::new(3, 3));
        let path = LevelShortestPath::new(&mut ctx, &pather, &portals, None, target, at(0, 0));
        assert!(path.path().is_empty());
        assert!(!path.is_reachable(target));
    }

    #[test]
    fn distance_field_tracks_portals() {
        let rng = Range::new(0, 0, 10, 10);
        let mut ctx = SearchContext::new(rng);
        let mut portals = Portals::new(L1, rng);
        let pather = CostFnPather::new(rng, |_| Some(1.0));
        assert_eq!(portals.distance_to_nearest(Point::new(3, 0)), None);

        portals.link(Point::new(0, 0), Point::new(9, 9));
        portals.update_distances(&mut ctx, &pather, 100.0);
        assert_eq!(portals.distance_to_nearest(Point::new(3, 0)), Some(3.0));
        assert_eq!(portals.distance_to_nearest(Point::new(8, 6)), Some(3.0));
        assert_eq!(portals.distance_to_nearest(Point::new(20, 0)), None);

        portals.remove(Point::new(9, 9));
        portals.update_distances(&mut ctx, &pather, 100.0);
        assert_eq!(portals.len(), 1);
        assert_eq!(portals.distance_to_nearest(Point::new(8, 6)), Some(8.0));
    }

    #[test]
    fn heuristic_uses_portal_detour() {
        let rng = Range::new(0, 0, 10, 10);
        let mut ctx = SearchContext::new(rng);
        let mut portals = Portals::new(L1, rng);
        let base = CostFnPather::new(rng, |_| Some(1.0));
        portals.link(Point::new(0, 0), Point::new(9, 9));
        portals.update_distances(&mut ctx, &base, 100.0);
        let pather = PortalPather {
            inner: &base,
            portals: &portals,
        };
        assert_eq!(pather.estimate(Point::new(0, 1), Point::new(9, 8)), 2.0);
        assert_eq!(pather.estimate(Point::new(4, 4), Point::new(5, 5)), 1.0);

        let mut buf = Vec::new();
        pather.neighbors(Point::new(0, 0), &mut buf);
        assert!(buf.contains(&Point::new(9, 9)));
    }

    #[test]
    #[should_panic(expected = "outside level")]
    fn portal_outside_level_panics() {
        let mut portals = Portals::new(L1, Range::new(0, 0, 5, 5));
        portals.add(Point::new(5, 5), at(0, 0));
    }
}
