//! Coarse spatial index: elements filed by position into square buckets.

use std::error::Error;
use std::fmt;

use delve_core::{Point, Range};

/// Errors from building a [`BucketMap`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BucketMapError {
    /// Bucket side length must be positive.
    InvalidBucketSize {
        /// The rejected size.
        size: i32,
    },
    /// The indexed area holds no cells.
    EmptyBounds {
        /// The rejected bounds.
        bounds: Range,
    },
}

impl fmt::Display for BucketMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBucketSize { size } => {
                write!(f, "bucket size must be positive, got {size}")
            }
            Self::EmptyBounds { bounds } => {
                write!(f, "cannot index empty bounds {bounds}")
            }
        }
    }
}

impl Error for BucketMapError {}

/// Square buckets of side `bucket_size` over `bounds`, each holding the
/// elements filed at positions inside it.
///
/// Queries return whole buckets, so callers filter the result by actual
/// position. Elements are usually arena [`Handle`](crate::Handle)s and may
/// be stale by the time they are read.
#[derive(Debug, Clone)]
pub struct BucketMap<E> {
    bounds: Range,
    bucket_size: i32,
    cols: i32,
    rows: i32,
    buckets: Vec<Vec<E>>,
    len: usize,
}

impl<E: Copy + Eq> BucketMap<E> {
    pub fn new(bounds: Range, bucket_size: i32) -> Result<Self, BucketMapError> {
        if bucket_size <= 0 {
            return Err(BucketMapError::InvalidBucketSize { size: bucket_size });
        }
        if bounds.is_empty() {
            return Err(BucketMapError::EmptyBounds { bounds });
        }
        let cols = (bounds.width() + bucket_size - 1) / bucket_size;
        let rows = (bounds.height() + bucket_size - 1) / bucket_size;
        Ok(Self {
            bounds,
            bucket_size,
            cols,
            rows,
            buckets: vec![Vec::new(); (cols * rows) as usize],
            len: 0,
        })
    }

    #[inline]
    pub fn bounds(&self) -> Range {
        self.bounds
    }

    #[inline]
    pub fn bucket_size(&self) -> i32 {
        self.bucket_size
    }

    /// Number of filed elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.buckets.iter_mut().for_each(Vec::clear);
        self.len = 0;
    }

    fn bucket_of(&self, pos: Point) -> usize {
        assert!(
            self.bounds.contains(pos),
            "{pos} is outside bucket map bounds {}",
            self.bounds
        );
        let q = (pos - self.bounds.min) / self.bucket_size;
        (q.y * self.cols + q.x) as usize
    }

    /// File `e` at `pos`.
    ///
    /// # Panics
    ///
    /// If `pos` is out of bounds or `e` is already in that bucket.
    pub fn add_element(&mut self, pos: Point, e: E) {
        let b = self.bucket_of(pos);
        let bucket = &mut self.buckets[b];
        assert!(!bucket.contains(&e), "element already filed in the bucket of {pos}");
        bucket.push(e);
        self.len += 1;
    }

    /// Unfile `e` from `pos`.
    ///
    /// # Panics
    ///
    /// If `pos` is out of bounds or `e` is not in that bucket.
    pub fn remove_element(&mut self, pos: Point, e: E) {
        let b = self.bucket_of(pos);
        let bucket = &mut self.buckets[b];
        let Some(i) = bucket.iter().position(|&x| x == e) else {
            panic!("element not filed in the bucket of {pos}");
        };
        bucket.swap_remove(i);
        self.len -= 1;
    }

    /// Refile `e` from `from` to `to`. A wrong `from` is a caller bug.
    ///
    /// # Panics
    ///
    /// As [`remove_element`](Self::remove_element) then
    /// [`add_element`](Self::add_element).
    pub fn move_element(&mut self, from: Point, to: Point, e: E) {
        let (bf, bt) = (self.bucket_of(from), self.bucket_of(to));
        if bf == bt {
            assert!(
                self.buckets[bf].contains(&e),
                "element not filed in the bucket of {from}"
            );
            return;
        }
        self.remove_element(from, e);
        self.add_element(to, e);
    }

    /// Every element of every bucket overlapping `rect`.
    pub fn get_elements(&self, rect: Range) -> Vec<E> {
        let rect = rect.intersect(self.bounds);
        let mut out = Vec::new();
        if rect.is_empty() {
            return out;
        }
        let lo = (rect.min - self.bounds.min) / self.bucket_size;
        let hi = (rect.max - self.bounds.min + Point::new(self.bucket_size - 1, self.bucket_size - 1))
            / self.bucket_size;
        for by in lo.y..hi.y.min(self.rows) {
            for bx in lo.x..hi.x.min(self.cols) {
                out.extend_from_slice(&self.buckets[(by * self.cols + bx) as usize]);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_bad_config() {
        assert_eq!(
            BucketMap::<u32>::new(Range::new(0, 0, 10, 10), 0).unwrap_err(),
            BucketMapError::InvalidBucketSize { size: 0 }
        );
        let empty = Range::new(0, 0, 0, 10);
        let err = BucketMap::<u32>::new(empty, 4).unwrap_err();
        assert_eq!(err, BucketMapError::EmptyBounds { bounds: empty });
        assert!(err.to_string().contains("empty bounds"));
    }

    #[test]
    fn query_returns_overlapping_buckets() {
        let mut map = BucketMap::new(Range::new(0, 0, 20, 20), 5).unwrap();
        map.add_element(Point::new(1, 1), 'a');
        map.add_element(Point::new(6, 1), 'b');
        map.add_element(Point::new(19, 19), 'c');
        let mut near = map.get_elements(Range::new(0, 0, 3, 3));
        near.sort();
        assert_eq!(near, vec!['a']);
        // Touching the next bucket by one cell includes it.
        let mut wider = map.get_elements(Range::new(0, 0, 6, 3));
        wider.sort();
        assert_eq!(wider, vec!['a', 'b']);
        assert_eq!(map.get_elements(Range::new(30, 30, 40, 40)), Vec::<char>::new());
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn ragged_edge_buckets() {
        let mut map = BucketMap::new(Range::new(-3, -3, 4, 4), 3).unwrap();
        map.add_element(Point::new(3, 3), 7u8);
        map.add_element(Point::new(-3, -3), 8u8);
        assert_eq!(map.get_elements(Range::new(3, 3, 4, 4)), vec![7]);
        assert_eq!(map.get_elements(Range::new(-10, -10, -2, -2)), vec![8]);
    }

    #[test]
    fn move_between_and_within_buckets() {
        let mut map = BucketMap::new(Range::new(0, 0, 10, 10), 4).unwrap();
        map.add_element(Point::new(0, 0), 1);
        map.move_element(Point::new(0, 0), Point::new(3, 3), 1);
        assert_eq!(map.get_elements(Range::new(0, 0, 1, 1)), vec![1]);
        map.move_element(Point::new(3, 3), Point::new(9, 9), 1);
        assert!(map.get_elements(Range::new(0, 0, 4, 4)).is_empty());
        assert_eq!(map.get_elements(Range::new(8, 8, 10, 10)), vec![1]);
        map.remove_element(Point::new(9, 9), 1);
        assert!(map.is_empty());
    }

    #[test]
    #[should_panic(expected = "already filed")]
    fn double_insert_panics() {
        let mut map = BucketMap::new(Range::new(0, 0, 10, 10), 4).unwrap();
        map.add_element(Point::new(0, 0), 1);
        map.add_element(Point::new(1, 1), 1);
    }

    #[test]
    #[should_panic(expected = "not filed")]
    fn move_from_wrong_bucket_panics() {
        let mut map = BucketMap::new(Range::new(0, 0, 10, 10), 4).unwrap();
        map.add_element(Point::new(0, 0), 1);
        map.move_element(Point::new(9, 9), Point::new(0, 0), 1);
    }

    #[test]
    fn handles_go_stale() {
        use crate::arena::Arena;
        let mut arena = Arena::new();
        let mut map = BucketMap::new(Range::new(0, 0, 10, 10), 4).unwrap();
        let orc = arena.insert(Point::new(2, 2));
        map.add_element(Point::new(2, 2), orc);
        arena.remove(orc);
        let live: Vec<_> = map
            .get_elements(Range::new(0, 0, 10, 10))
            .into_iter()
            .filter(|&h| arena.contains(h))
            .collect();
        assert!(live.is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(i32, i32),
        Remove(usize),
        Move(usize, i32, i32),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..17i32, 0..13i32).prop_map(|(x, y)| Op::Insert(x, y)),
            (0..32usize).prop_map(Op::Remove),
            (0..32usize, 0..17i32, 0..13i32).prop_map(|(i, x, y)| Op::Move(i, x, y)),
        ]
    }

    proptest! {
        #[test]
        fn whole_bounds_query_is_exact(ops in prop::collection::vec(arb_op(), 1..60), size in 1..6i32) {
            let bounds = Range::new(0, 0, 17, 13);
            let mut map = BucketMap::new(bounds, size).unwrap();
            let mut live: Vec<(u32, Point)> = Vec::new();
            let mut next = 0u32;
            for op in ops {
                match op {
                    Op::Insert(x, y) => {
                        let p = Point::new(x, y);
                        map.add_element(p, next);
                        live.push((next, p));
                        next += 1;
                    }
                    Op::Remove(i) if !live.is_empty() => {
                        let (e, p) = live.swap_remove(i % live.len());
                        map.remove_element(p, e);
                    }
                    Op::Move(i, x, y) if !live.is_empty() => {
                        let i = i % live.len();
                        let to = Point::new(x, y);
                        map.move_element(live[i].1, to, live[i].0);
                        live[i].1 = to;
                    }
                    _ => {}
                }
                let mut got = map.get_elements(bounds);
                got.sort();
                let mut want: Vec<u32> = live.iter().map(|&(e, _)| e).collect();
                want.sort();
                prop_assert_eq!(got, want);
                prop_assert_eq!(map.len(), live.len());
            }
        }
    }
}
