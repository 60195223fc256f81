//! Cached field of vision.
//!
//! [`FieldOfView`] answers "can a viewer at `a` see `b`?" for one vision
//! kind on one level. Visibility is computed per origin with recursive
//! shadowcasting and cached until a cell the origin could see changes its
//! blocking state.
//!
//! Slopes are exact rationals over doubled coordinates, so the scan never
//! touches floating point: a cell at row `r`, column `c` spans the slopes
//! `(2c - 1) / 2r` to `(2c + 1) / 2r` along its center line.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

use delve_core::{Point, Range, within_euclidean};

/// A column-per-row slope `num / den`, with `den > 0`.
#[derive(Debug, Clone, Copy)]
struct Slope {
    num: i32,
    den: i32,
}

impl Slope {
    const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Low edge of the cell at row `r`, column `c`.
    const fn low(r: i32, c: i32) -> Self {
        Self::new(2 * c - 1, 2 * r)
    }

    /// High edge of the cell at row `r`, column `c`.
    const fn high(r: i32, c: i32) -> Self {
        Self::new(2 * c + 1, 2 * r)
    }
}

impl PartialEq for Slope {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Slope {}

impl PartialOrd for Slope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slope {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.num as i64 * other.den as i64).cmp(&(other.num as i64 * self.den as i64))
    }
}

/// One of the four mirrored scan directions. Rows grow away from the
/// origin, columns run across them.
#[derive(Debug, Clone, Copy)]
enum Quadrant {
    North,
    South,
    East,
    West,
}

impl Quadrant {
    const ALL: [Quadrant; 4] = [
        Quadrant::North,
        Quadrant::South,
        Quadrant::East,
        Quadrant::West,
    ];

    fn transform(self, origin: Point, row: i32, col: i32) -> Point {
        match self {
            Quadrant::North => Point::new(origin.x + col, origin.y - row),
            Quadrant::South => Point::new(origin.x + col, origin.y + row),
            Quadrant::East => Point::new(origin.x + row, origin.y + col),
            Quadrant::West => Point::new(origin.x - row, origin.y + col),
        }
    }
}

/// Cached visibility of one origin.
#[derive(Debug, Clone)]
struct Visibility {
    /// One bit per offset in the `(2R + 1)²` square around the origin.
    bits: Vec<u64>,
    /// Visible cells, absolute, origin first.
    tiles: Vec<Point>,
}

impl Visibility {
    fn new(side: usize) -> Self {
        Self {
            bits: vec![0; (side * side).div_ceil(64)],
            tiles: Vec::new(),
        }
    }

    #[inline]
    fn test(&self, bit: usize) -> bool {
        self.bits[bit / 64] & (1 << (bit % 64)) != 0
    }

    /// Set `bit`; returns whether it was clear.
    #[inline]
    fn set(&mut self, bit: usize) -> bool {
        let word = &mut self.bits[bit / 64];
        let mask = 1 << (bit % 64);
        let fresh = *word & mask == 0;
        *word |= mask;
        fresh
    }
}

/// Per-level, per-vision-kind visibility with lazily built per-origin records.
#[derive(Debug, Clone)]
pub struct FieldOfView {
    bounds: Range,
    sight_range: i32,
    blocking: Vec<bool>,
    records: Vec<Option<Visibility>>,
    live: usize,
}

impl FieldOfView {
    /// Build the blocking table from `blocks`. No visibility is computed yet.
    ///
    /// # Panics
    ///
    /// If `sight_range` is negative.
    pub fn new(bounds: Range, sight_range: i32, blocks: impl Fn(Point) -> bool) -> Self {
        assert!(sight_range >= 0, "sight range must not be negative, got {sight_range}");
        Self {
            bounds,
            sight_range,
            blocking: bounds.iter().map(blocks).collect(),
            records: vec![None; bounds.len()],
            live: 0,
        }
    }

    #[inline]
    pub fn bounds(&self) -> Range {
        self.bounds
    }

    #[inline]
    pub fn sight_range(&self) -> i32 {
        self.sight_range
    }

    /// Whether `pos` blocks sight. Out-of-bounds cells always do.
    pub fn is_blocking(&self, pos: Point) -> bool {
        self.bounds.index(pos).is_none_or(|i| self.blocking[i])
    }

    /// Number of origins with a cached record.
    pub fn cached_origins(&self) -> usize {
        self.live
    }

    /// Drop every cached record.
    pub fn clear_cache(&mut self) {
        self.records.iter_mut().for_each(|r| *r = None);
        self.live = 0;
    }

    fn side(&self) -> usize {
        (2 * self.sight_range + 1) as usize
    }

    /// Bit of the offset `d` in an origin's record, if `d` lies in the
    /// sight-range square.
    fn offset_bit(&self, d: Point) -> Option<usize> {
        let r = self.sight_range;
        if d.x.abs() > r || d.y.abs() > r {
            return None;
        }
        Some((d.y + r) as usize * self.side() + (d.x + r) as usize)
    }

    fn in_sight(&self, d: Point) -> bool {
        within_euclidean(Point::ZERO, d, self.sight_range)
    }

    /// Whether a viewer at `from` sees `to`.
    ///
    /// Out-of-bounds points and points beyond the sight range are never
    /// seen, and do not trigger a computation.
    pub fn can_see(&mut self, from: Point, to: Point) -> bool {
        let d = to - from;
        if !self.in_sight(d) || !self.bounds.contains(to) {
            return false;
        }
        let Some(bit) = self.offset_bit(d) else {
            return false;
        };
        self.record(from).is_some_and(|v| v.test(bit))
    }

    /// Every cell visible from `from`, origin first. Empty for
    /// out-of-bounds origins.
    pub fn visible_tiles(&mut self, from: Point) -> &[Point] {
        match self.record(from) {
            Some(v) => v.tiles.as_slice(),
            None => &[],
        }
    }

    /// The record for `origin`, computed on first use.
    fn record(&mut self, origin: Point) -> Option<&Visibility> {
        let i = self.bounds.index(origin)?;
        if self.records[i].is_none() {
            let v = self.compute(origin);
            log::trace!("visibility of {origin}: {} tiles", v.tiles.len());
            self.records[i] = Some(v);
            self.live += 1;
        }
        self.records[i].as_ref()
    }

    fn compute(&self, origin: Point) -> Visibility {
        let mut v = Visibility::new(self.side());
        if let Some(bit) = self.offset_bit(Point::ZERO) {
            v.set(bit);
            v.tiles.push(origin);
        }
        for q in Quadrant::ALL {
            self.scan(&mut v, origin, q, 1, Slope::new(-1, 1), Slope::new(1, 1));
        }
        v
    }

    /// Scan `row` of quadrant `q` between the slopes `lo` and `hi`.
    ///
    /// An open run that ends at a blocker continues one row further with
    /// the blocker's low edge as its new high slope; the run still open at
    /// the end of the row continues with `hi`.
    fn scan(
        &self,
        v: &mut Visibility,
        origin: Point,
        q: Quadrant,
        row: i32,
        lo: Slope,
        hi: Slope,
    ) {
        if lo >= hi || row > self.sight_range {
            return;
        }
        let mut run_lo = lo;
        let mut prev_blocked: Option<bool> = None;
        for col in -row..=row {
            let (cell_lo, cell_hi) = (Slope::low(row, col), Slope::high(row, col));
            if cell_hi <= lo {
                continue;
            }
            if cell_lo >= hi {
                break;
            }
            let p = q.transform(origin, row, col);
            let d = p - origin;
            let blocked = if self.in_sight(d) {
                if let (Some(i), Some(bit)) = (self.bounds.index(p), self.offset_bit(d)) {
                    if v.set(bit) {
                        v.tiles.push(p);
                    }
                    self.blocking[i]
                } else {
                    true
                }
            } else {
                false
            };
            match (prev_blocked, blocked) {
                (Some(false), true) => self.scan(v, origin, q, row + 1, run_lo, cell_lo),
                (Some(true), false) => run_lo = cell_lo,
                _ => {}
            }
            prev_blocked = Some(blocked);
        }
        if prev_blocked == Some(false) {
            self.scan(v, origin, q, row + 1, run_lo, hi);
        }
    }

    /// Record a new blocking state for `pos`.
    ///
    /// If the state changed, every cached origin that sees `pos` is
    /// dropped: those are exactly the records whose scan consulted it.
    ///
    /// # Panics
    ///
    /// If `pos` is outside the bounds.
    pub fn square_changed(&mut self, pos: Point, blocks: bool) {
        let Some(i) = self.bounds.index(pos) else {
            panic!("{pos} is outside vision bounds {}", self.bounds);
        };
        if self.blocking[i] == blocks {
            return;
        }
        self.blocking[i] = blocks;
        if self.live == 0 {
            return;
        }

        let r = self.sight_range;
        let area = Range::new(pos.x - r, pos.y - r, pos.x + r + 1, pos.y + r + 1).intersect(self.bounds);
        let mut dropped = 0;
        for origin in area {
            let Some(oi) = self.bounds.index(origin) else {
                continue;
            };
            let Some(bit) = self.offset_bit(pos - origin) else {
                continue;
            };
            if self.records[oi].as_ref().is_some_and(|v| v.test(bit)) {
                self.records[oi] = None;
                dropped += 1;
            }
        }
        self.live -= dropped;
        log::trace!("{pos} changed: dropped {dropped} visibility records");
    }
}

/// One [`FieldOfView`] per vision kind of a level, built on first use.
#[derive(Debug, Clone)]
pub struct VisionCache<K> {
    bounds: Range,
    sight_range: i32,
    views: HashMap<K, FieldOfView>,
}

impl<K: Eq + Hash + Clone> VisionCache<K> {
    pub fn new(bounds: Range, sight_range: i32) -> Self {
        Self {
            bounds,
            sight_range,
            views: HashMap::new(),
        }
    }

    /// The view for `key`, built from `blocks` if it does not exist yet.
    pub fn get_or_build(&mut self, key: &K, blocks: impl Fn(Point) -> bool) -> &mut FieldOfView {
        let (bounds, sight_range) = (self.bounds, self.sight_range);
        self.views
            .entry(key.clone())
            .or_insert_with(|| FieldOfView::new(bounds, sight_range, blocks))
    }

    pub fn get(&self, key: &K) -> Option<&FieldOfView> {
        self.views.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut FieldOfView> {
        self.views.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Re-evaluate `pos` in every built view.
    pub fn square_changed(&mut self, pos: Point, blocks: impl Fn(&K, Point) -> bool) {
        for (key, view) in self.views.iter_mut() {
            view.square_changed(pos, blocks(key, pos));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn open(range: Range, sight: i32) -> FieldOfView {
        FieldOfView::new(range, sight, |_| false)
    }

    #[test]
    fn open_field_is_a_disc() {
        let mut fov = open(Range::new(0, 0, 11, 11), 3);
        let src = Point::new(5, 5);
        assert!(fov.can_see(src, src));
        assert!(fov.can_see(src, Point::new(8, 5)));
        assert!(fov.can_see(src, Point::new(5, 2)));
        assert!(fov.can_see(src, Point::new(7, 7)));
        // Beyond range.
        assert!(!fov.can_see(src, Point::new(8, 8)));
        assert!(!fov.can_see(src, Point::new(0, 0)));
        // Every cell with dx² + dy² <= 9.
        assert_eq!(fov.visible_tiles(src).len(), 29);
        assert_eq!(fov.visible_tiles(src)[0], src);
    }

    #[test]
    fn wall_casts_shadow() {
        let wall = Point::new(6, 5);
        let mut fov = FieldOfView::new(Range::new(0, 0, 11, 11), 5, |p| p == wall);
        let src = Point::new(5, 5);
        assert!(fov.can_see(src, wall));
        assert!(!fov.can_see(src, Point::new(7, 5)));
        assert!(!fov.can_see(src, Point::new(8, 5)));
        assert!(fov.can_see(src, Point::new(7, 4)));
        assert!(fov.is_blocking(wall));
    }

    #[test]
    fn long_wall_hides_far_side() {
        let range = Range::new(0, 0, 15, 15);
        let mut fov = FieldOfView::new(range, 6, |p| p.x == 7);
        let src = Point::new(4, 7);
        assert!(fov.can_see(src, Point::new(7, 7)));
        for y in 0..15 {
            for x in 8..15 {
                assert!(!fov.can_see(src, Point::new(x, y)), "({x}, {y}) is behind the wall");
            }
        }
    }

    #[test]
    fn corridor_walls_are_seen() {
        let range = Range::new(0, 0, 12, 3);
        let mut fov = FieldOfView::new(range, 8, |p| p.y != 1);
        let src = Point::new(1, 1);
        for x in 1..10 {
            assert!(fov.can_see(src, Point::new(x, 1)), "floor ({x}, 1)");
        }
        assert!(fov.can_see(src, Point::new(4, 0)));
        assert!(fov.can_see(src, Point::new(4, 2)));
    }

    #[test]
    fn bounds_stop_vision() {
        let mut fov = open(Range::new(0, 0, 5, 5), 10);
        assert!(fov.can_see(Point::new(0, 0), Point::new(4, 4)));
        assert!(!fov.can_see(Point::new(0, 0), Point::new(5, 4)));
        assert!(fov.visible_tiles(Point::new(-1, 0)).is_empty());
        let bounds = fov.bounds();
        assert!(fov.visible_tiles(Point::new(0, 0)).iter().all(|&p| bounds.contains(p)));
    }

    #[test]
    fn zero_sight_sees_only_origin() {
        let mut fov = open(Range::new(0, 0, 5, 5), 0);
        assert_eq!(fov.visible_tiles(Point::new(2, 2)), &[Point::new(2, 2)]);
        assert!(!fov.can_see(Point::new(2, 2), Point::new(2, 3)));
    }

    #[test]
    fn out_of_range_query_builds_nothing() {
        let mut fov = open(Range::new(0, 0, 20, 20), 3);
        assert!(!fov.can_see(Point::new(0, 0), Point::new(10, 10)));
        assert_eq!(fov.cached_origins(), 0);
        assert!(fov.can_see(Point::new(0, 0), Point::new(1, 1)));
        assert_eq!(fov.cached_origins(), 1);
    }

    #[test]
    fn change_invalidates_observers_only() {
        let mut fov = open(Range::new(0, 0, 30, 10), 4);
        let near = Point::new(3, 5);
        let far = Point::new(25, 5);
        fov.can_see(near, near);
        fov.can_see(far, far);
        assert_eq!(fov.cached_origins(), 2);

        fov.square_changed(Point::new(5, 5), true);
        assert_eq!(fov.cached_origins(), 1);
        assert!(!fov.can_see(near, Point::new(6, 5)));

        // Unchanged state keeps the cache.
        fov.square_changed(Point::new(5, 5), true);
        assert_eq!(fov.cached_origins(), 2);

        fov.clear_cache();
        assert_eq!(fov.cached_origins(), 0);
    }

    #[test]
    fn opening_a_door() {
        let door = Point::new(5, 5);
        let mut fov = FieldOfView::new(Range::new(0, 0, 11, 11), 5, |p| p == door);
        let src = Point::new(3, 5);
        assert!(!fov.can_see(src, Point::new(7, 5)));
        fov.square_changed(door, false);
        assert!(fov.can_see(src, Point::new(7, 5)));
    }

    #[test]
    fn cache_per_vision_kind() {
        #[derive(Clone, PartialEq, Eq, Hash)]
        enum Sense {
            Eyes,
            Tremor,
        }
        let range = Range::new(0, 0, 10, 10);
        let glass = Point::new(5, 5);
        let mut cache = VisionCache::new(range, 6);
        cache.get_or_build(&Sense::Eyes, |_| false);
        cache.get_or_build(&Sense::Tremor, |p| p == glass);
        let (a, b) = (Point::new(3, 5), Point::new(7, 5));
        assert!(cache.get_mut(&Sense::Eyes).unwrap().can_see(a, b));
        assert!(!cache.get_mut(&Sense::Tremor).unwrap().can_see(a, b));

        // A wall goes up at the glass: both kinds are now blocked.
        cache.square_changed(glass, |_, _| true);
        assert!(!cache.get_mut(&Sense::Eyes).unwrap().can_see(a, b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn slope_comparison_is_exact() {
        assert_eq!(Slope::new(1, 2), Slope::new(2, 4));
        // Neighboring cells share an edge.
        assert_eq!(Slope::low(3, 1), Slope::high(3, 0));
        assert!(Slope::new(-1, 1) < Slope::low(1, 0));
    }

    proptest! {
        #[test]
        fn visibility_is_bounded_by_sight(
            walls in prop::collection::vec((0..12i32, 0..12i32), 0..30),
            ox in 0..12i32,
            oy in 0..12i32,
            sight in 0..7i32,
        ) {
            let walls: Vec<Point> = walls.into_iter().map(|(x, y)| Point::new(x, y)).collect();
            let mut fov = FieldOfView::new(Range::new(0, 0, 12, 12), sight, |p| walls.contains(&p));
            let origin = Point::new(ox, oy);
            prop_assert!(fov.can_see(origin, origin));
            let tiles = fov.visible_tiles(origin).to_vec();
            for p in tiles {
                prop_assert!((p - origin).length_sq() <= (sight as i64) * (sight as i64));
            }
        }

        #[test]
        fn cache_matches_rebuild(
            walls in prop::collection::vec((0..12i32, 0..12i32), 0..30),
            changes in prop::collection::vec((0..12i32, 0..12i32, any::<bool>()), 1..10),
            origins in prop::collection::vec((0..12i32, 0..12i32), 1..6),
        ) {
            let range = Range::new(0, 0, 12, 12);
            let mut blocking: Vec<bool> = vec![false; range.len()];
            for (x, y) in walls {
                blocking[range.index(Point::new(x, y)).unwrap()] = true;
            }
            let mut fov = FieldOfView::new(range, 5, |p| blocking[range.index(p).unwrap()]);
            let origins: Vec<Point> = origins.into_iter().map(|(x, y)| Point::new(x, y)).collect();
            for &o in &origins {
                fov.visible_tiles(o);
            }
            // Each change is followed by a full re-query, so records rebuilt
            // after one change are themselves invalidated by the next.
            for (x, y, b) in changes {
                let p = Point::new(x, y);
                fov.square_changed(p, b);
                blocking[range.index(p).unwrap()] = b;
                let mut fresh = FieldOfView::new(range, 5, |p| blocking[range.index(p).unwrap()]);
                for &o in &origins {
                    for q in range {
                        prop_assert_eq!(fov.can_see(o, q), fresh.can_see(o, q), "{} -> {} after {}", o, q, p);
                    }
                }
            }
        }
    }
}
