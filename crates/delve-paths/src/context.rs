use std::collections::{BinaryHeap, VecDeque};

use delve_core::{Point, Range};

use crate::traits::WeightedPather;

/// A position with its accumulated cost, returned from Dijkstra queries.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathNode {
    pub pos: Point,
    pub cost: f64,
}

/// A position with its step count, returned from breadth-first searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BfsNode {
    pub pos: Point,
    pub dist: i32,
}

/// Distance reported for cells the last search did not reach.
pub const INFINITY: f64 = f64::INFINITY;

// ---------------------------------------------------------------------------
// Epoch-stamped scratch table
// ---------------------------------------------------------------------------

/// Per-cell values that are cleared in O(1) by bumping an epoch.
///
/// A slot whose stamp differs from the current epoch reads as `unset`,
/// never as a stored value.
#[derive(Clone, Debug)]
pub(crate) struct EpochTable<T: Copy> {
    values: Vec<T>,
    stamps: Vec<u32>,
    epoch: u32,
    unset: T,
}

impl<T: Copy> EpochTable<T> {
    pub(crate) fn new(len: usize, unset: T) -> Self {
        Self {
            values: vec![unset; len],
            stamps: vec![0; len],
            epoch: 1,
            unset,
        }
    }

    /// Forget every stored value.
    pub(crate) fn clear(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            // Stamps from 2^32 clears ago would alias the new epoch.
            self.stamps.fill(0);
            self.epoch = 1;
        }
    }

    #[inline]
    pub(crate) fn get(&self, i: usize) -> T {
        if self.stamps[i] == self.epoch {
            self.values[i]
        } else {
            self.unset
        }
    }

    #[inline]
    pub(crate) fn is_set(&self, i: usize) -> bool {
        self.stamps[i] == self.epoch
    }

    #[inline]
    pub(crate) fn set(&mut self, i: usize, v: T) {
        self.values[i] = v;
        self.stamps[i] = self.epoch;
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Grow to at least `len` slots. Existing stamps stay valid.
    pub(crate) fn reserve_len(&mut self, len: usize) {
        if len > self.values.len() {
            self.values.resize(len, self.unset);
            self.stamps.resize(len, 0);
        }
    }
}

// ---------------------------------------------------------------------------
// Priority queue entries
// ---------------------------------------------------------------------------

/// Heap entry ordered so that `BinaryHeap` pops the smallest `f` first,
/// breaking ties by row-major cell order.
#[derive(Clone, Copy, Debug)]
pub(crate) struct NodeRef {
    pub(crate) idx: usize,
    pub(crate) pos: Point,
    pub(crate) g: f64,
    pub(crate) f: f64,
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for NodeRef {}

impl Ord for NodeRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed: BinaryHeap is a max-heap.
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

impl PartialOrd for NodeRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// SearchContext
// ---------------------------------------------------------------------------

/// Reusable scratch state for every search in this crate.
///
/// A `SearchContext` owns the shared distance table (with per-cell epoch
/// stamps so clearing between calls is O(1)), the BFS table, the open list
/// and the result buffers. Repeated queries allocate nothing after warm-up.
///
/// Searches take the context by `&mut`, so one context serves one search at
/// a time. Planners that run in parallel each own a context.
pub struct SearchContext {
    pub(crate) rng: Range,
    pub(crate) dist: EpochTable<f64>,
    pub(crate) bfs: EpochTable<i32>,
    pub(crate) open: BinaryHeap<NodeRef>,
    pub(crate) queue: VecDeque<usize>,
    pub(crate) dijkstra_results: Vec<PathNode>,
    pub(crate) bfs_results: Vec<BfsNode>,
    // shared scratch buffer for neighbor queries
    pub(crate) nbuf: Vec<Point>,
}

impl SearchContext {
    /// Create a context for the given grid rectangle.
    pub fn new(rng: Range) -> Self {
        let len = rng.len();
        Self {
            rng,
            dist: EpochTable::new(len, INFINITY),
            bfs: EpochTable::new(len, -1),
            open: BinaryHeap::new(),
            queue: VecDeque::new(),
            dijkstra_results: Vec::new(),
            bfs_results: Vec::new(),
            nbuf: Vec::with_capacity(9),
        }
    }

    /// Replace the grid rectangle.
    ///
    /// Tables are only reallocated when the new range has more cells than
    /// the current capacity; otherwise both epochs are bumped so stale
    /// entries from the old layout are ignored.
    pub fn set_range(&mut self, rng: Range) {
        self.rng = rng;
        self.dist.clear();
        self.bfs.clear();
        self.dist.reserve_len(rng.len());
        self.bfs.reserve_len(rng.len());
        self.dijkstra_results.clear();
        self.bfs_results.clear();
    }

    /// The grid rectangle searches run over.
    #[inline]
    pub fn range(&self) -> Range {
        self.rng
    }

    /// Distance recorded for `p` by the last weighted search (shortest path
    /// or Dijkstra), or [`INFINITY`] if it was not reached.
    pub fn distance(&self, p: Point) -> f64 {
        match self.idx(p) {
            Some(i) => self.dist.get(i),
            None => INFINITY,
        }
    }

    #[inline]
    pub(crate) fn idx(&self, p: Point) -> Option<usize> {
        self.rng.index(p)
    }

    #[inline]
    pub(crate) fn point(&self, idx: usize) -> Point {
        self.rng.point_at(idx)
    }

    /// Best-first search shared by every weighted query.
    ///
    /// Bumps the distance epoch, seeds each `(cell, distance)` pair, then
    /// expands in order of `distance + estimate(cell)` within `bounds`,
    /// skipping any cell whose distance would exceed `max_cost`.
    /// `on_settle` sees every cell as it is popped with its final distance.
    /// Returns `true` as soon as `goal` is popped.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn run_weighted<P: WeightedPather>(
        &mut self,
        pather: &P,
        bounds: Range,
        seeds: &[(Point, f64)],
        goal: Option<Point>,
        estimate: impl Fn(Point) -> f64,
        max_cost: f64,
        mut on_settle: impl FnMut(Point, f64),
    ) -> bool {
        let bounds = bounds.intersect(self.rng);
        self.dist.clear();
        self.open.clear();

        for &(p, d) in seeds {
            if !bounds.contains(p) {
                continue;
            }
            let Some(i) = self.idx(p) else {
                continue;
            };
            if d < self.dist.get(i) {
                self.dist.set(i, d);
                self.open.push(NodeRef {
                    idx: i,
                    pos: p,
                    g: d,
                    f: d + estimate(p),
                });
            }
        }

        let goal_idx = goal.and_then(|g| self.idx(g));
        let mut nbuf = std::mem::take(&mut self.nbuf);

        let found = 'search: loop {
            let Some(current) = self.open.pop() else {
                break 'search false;
            };
            let ci = current.idx;

            // Skip entries superseded by a shorter distance.
            if current.g != self.dist.get(ci) {
                continue;
            }

            on_settle(current.pos, current.g);
            if Some(ci) == goal_idx {
                break 'search true;
            }

            nbuf.clear();
            pather.neighbors(current.pos, &mut nbuf);

            for &np in nbuf.iter() {
                if !bounds.contains(np) {
                    continue;
                }
                let Some(ni) = self.idx(np) else {
                    continue;
                };
                let Some(cost) = pather.entry_cost(np) else {
                    continue;
                };
                assert!(
                    cost > 0.0,
                    "entry cost of {np} must be strictly positive, got {cost}"
                );
                let tentative = current.g + cost;
                if tentative > max_cost || tentative >= self.dist.get(ni) {
                    continue;
                }
                self.dist.set(ni, tentative);
                self.open.push(NodeRef {
                    idx: ni,
                    pos: np,
                    g: tentative,
                    f: tentative + estimate(np),
                });
            }
        };

        self.open.clear();
        self.nbuf = nbuf;
        found
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for SearchContext {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.rng.serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for SearchContext {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let range = Range::deserialize(deserializer)?;
        Ok(SearchContext::new(range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_clear_hides_old_values() {
        let mut t = EpochTable::new(4, INFINITY);
        t.set(2, 5.0);
        assert_eq!(t.get(2), 5.0);
        assert!(t.is_set(2));
        t.clear();
        assert_eq!(t.get(2), INFINITY);
        assert!(!t.is_set(2));
    }

    #[test]
    fn epoch_wrap_resets_stamps() {
        let mut t = EpochTable::new(2, -1);
        t.set(0, 7);
        t.epoch = u32::MAX;
        t.set(1, 3);
        t.clear();
        assert_eq!(t.epoch(), 1);
        assert_eq!(t.get(0), -1);
        assert_eq!(t.get(1), -1);
    }

    #[test]
    fn set_range_smaller_preserves_capacity() {
        let mut ctx = SearchContext::new(Range::new(0, 0, 20, 20));
        let cap = ctx.dist.len();
        let small = Range::new(0, 0, 5, 5);
        ctx.set_range(small);
        assert_eq!(ctx.range(), small);
        assert_eq!(ctx.dist.len(), cap);
        assert_eq!(ctx.distance(Point::new(1, 1)), INFINITY);
    }

    #[test]
    fn set_range_larger_reallocates() {
        let mut ctx = SearchContext::new(Range::new(0, 0, 5, 5));
        ctx.set_range(Range::new(0, 0, 20, 20));
        assert_eq!(ctx.dist.len(), 400);
        assert_eq!(ctx.bfs.len(), 400);
    }

    #[test]
    fn node_ref_pops_lowest_then_row_major() {
        let mut heap = BinaryHeap::new();
        for (x, y, f) in [(3, 0, 2.0), (1, 1, 1.0), (0, 1, 1.0), (5, 5, 0.5)] {
            heap.push(NodeRef {
                idx: 0,
                pos: Point::new(x, y),
                g: f,
                f,
            });
        }
        let order: Vec<Point> = std::iter::from_fn(|| heap.pop().map(|n| n.pos)).collect();
        assert_eq!(
            order,
            vec![
                Point::new(5, 5),
                Point::new(0, 1),
                Point::new(1, 1),
                Point::new(3, 0)
            ]
        );
    }
}

#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;

    #[test]
    fn pathnode_round_trip() {
        let node = PathNode {
            pos: Point::new(3, 7),
            cost: 4.5,
        };
        let json = serde_json::to_string(&node).unwrap();
        let back: PathNode = serde_json::from_str(&json).unwrap();
        assert_eq!(node, back);
    }

    #[test]
    fn context_round_trip_keeps_range_only() {
        let rng = Range::new(1, 2, 10, 20);
        let ctx = SearchContext::new(rng);
        let json = serde_json::to_string(&ctx).unwrap();
        let back: SearchContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back.range(), rng);
        assert_eq!(back.dist.len(), rng.len());
    }
}
