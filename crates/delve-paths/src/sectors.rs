//! Dynamic connected-component labelling.
//!
//! [`Sectors`] keeps every member cell labelled with the id of its connected
//! component while cells are added and removed one at a time, so that
//! "can a creature with this movement capability get from `a` to `b`?" is a
//! constant-time lookup. Adjacency is the 8 geometric neighbors plus at most
//! one registered extra connection (portal) per cell.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use delve_core::{Point, Range};

/// Component label. Cells that are not members carry [`NO_SECTOR`].
pub type SectorId = i32;

/// Label of a cell that is not a member.
pub const NO_SECTOR: SectorId = -1;

/// Dynamic partition of a grid rectangle into connected components.
#[derive(Debug, Clone)]
pub struct Sectors {
    bounds: Range,
    sectors: Vec<SectorId>,
    sizes: Vec<i32>,
    free: Vec<SectorId>,
    extra: Vec<Option<Point>>,
    // scratch for the split race
    stamps: Vec<u32>,
    owner: Vec<u32>,
    epoch: u32,
    queue: VecDeque<usize>,
}

impl Sectors {
    /// Create an empty partition: no cell is a member.
    pub fn new(bounds: Range) -> Self {
        let len = bounds.len();
        Self {
            bounds,
            sectors: vec![NO_SECTOR; len],
            sizes: Vec::new(),
            free: Vec::new(),
            extra: vec![None; len],
            stamps: vec![0; len],
            owner: vec![0; len],
            epoch: 0,
            queue: VecDeque::new(),
        }
    }

    /// The rectangle this partition covers.
    pub fn bounds(&self) -> Range {
        self.bounds
    }

    #[inline]
    fn idx(&self, p: Point) -> usize {
        match self.bounds.index(p) {
            Some(i) => i,
            None => panic!("{p} is outside sector bounds {}", self.bounds),
        }
    }

    /// Whether `p` is a member.
    #[inline]
    pub fn contains(&self, p: Point) -> bool {
        self.bounds
            .index(p)
            .is_some_and(|i| self.sectors[i] != NO_SECTOR)
    }

    /// Component id of `p`, or `None` if it is not a member.
    pub fn sector(&self, p: Point) -> Option<SectorId> {
        let i = self.bounds.index(p)?;
        let s = self.sectors[i];
        (s != NO_SECTOR).then_some(s)
    }

    /// Whether `a` and `b` are members of the same component.
    pub fn same(&self, a: Point, b: Point) -> bool {
        match (self.sector(a), self.sector(b)) {
            (Some(sa), Some(sb)) => sa == sb,
            _ => false,
        }
    }

    /// Number of members of component `id`.
    pub fn size(&self, id: SectorId) -> usize {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.sizes.get(i))
            .map_or(0, |&s| s as usize)
    }

    /// Number of non-empty components.
    pub fn num_sectors(&self) -> usize {
        self.sizes.iter().filter(|&&s| s > 0).count()
    }

    /// The component with the most members, usually the main navigable
    /// region of a level. Ties go to the lowest id.
    pub fn largest(&self) -> Option<SectorId> {
        let mut best: Option<(SectorId, i32)> = None;
        for (id, &size) in self.sizes.iter().enumerate() {
            if size > 0 && best.is_none_or(|(_, bs)| size > bs) {
                best = Some((id as SectorId, size));
            }
        }
        best.map(|(id, _)| id)
    }

    /// The cell linked to `p` by an extra connection, if any.
    pub fn extra_connection(&self, p: Point) -> Option<Point> {
        self.bounds.index(p).and_then(|i| self.extra[i])
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Make `pos` a member.
    ///
    /// The cell joins the component of its member neighbors; when it bridges
    /// several components, the largest one absorbs the others.
    ///
    /// # Panics
    ///
    /// If `pos` is outside the bounds.
    pub fn add(&mut self, pos: Point) {
        let i = self.idx(pos);
        if self.sectors[i] != NO_SECTOR {
            return;
        }
        let mut ids: Vec<SectorId> = Vec::with_capacity(9);
        self.for_each_neighbor(pos, |_, s| {
            if s != NO_SECTOR && !ids.contains(&s) {
                ids.push(s);
            }
        });
        match ids.as_slice() {
            [] => {
                let s = self.new_sector();
                self.set_sector(i, s);
            }
            [s] => self.set_sector(i, *s),
            _ => {
                let mut keep = ids[0];
                for &s in &ids[1..] {
                    if self.sizes[s as usize] > self.sizes[keep as usize] {
                        keep = s;
                    }
                }
                log::debug!("{pos} bridges {} sectors into {keep}", ids.len());
                self.join(pos, keep);
            }
        }
    }

    /// Stop `pos` from being a member.
    ///
    /// If the removal disconnects its component, every part that is cut off
    /// from the rest gets a fresh id.
    ///
    /// # Panics
    ///
    /// If `pos` is outside the bounds.
    pub fn remove(&mut self, pos: Point) {
        let i = self.idx(pos);
        let old = self.sectors[i];
        if old == NO_SECTOR {
            return;
        }
        self.set_sector(i, NO_SECTOR);
        let groups = self.member_neighbors(pos);
        if self.split_race(pos, &groups, false) {
            log::debug!("removing {pos} split sector {old}");
        }
    }

    /// Whether removing the member `pos` would split its component.
    ///
    /// Non-members are never choke points.
    pub fn is_chokepoint(&mut self, pos: Point) -> bool {
        if !self.contains(pos) {
            return false;
        }
        let groups = self.member_neighbors(pos);
        self.split_race(pos, &groups, true)
    }

    /// Link `a` and `b` as neighbors regardless of their distance.
    ///
    /// Any previous extra connection of either cell is removed first. If
    /// both ends are members of different components, the larger component
    /// absorbs the smaller.
    ///
    /// # Panics
    ///
    /// If either cell is outside the bounds.
    pub fn add_extra_connection(&mut self, a: Point, b: Point) {
        let (ia, ib) = (self.idx(a), self.idx(b));
        if a == b || self.extra[ia] == Some(b) {
            return;
        }
        for (p, i) in [(a, ia), (b, ib)] {
            if let Some(other) = self.extra[i] {
                self.remove_extra_connection(p, other);
            }
        }
        self.extra[ia] = Some(b);
        self.extra[ib] = Some(a);

        let (sa, sb) = (self.sectors[ia], self.sectors[ib]);
        if sa == NO_SECTOR || sb == NO_SECTOR || sa == sb {
            return;
        }
        if self.sizes[sa as usize] >= self.sizes[sb as usize] {
            self.join(b, sa);
        } else {
            self.join(a, sb);
        }
        log::debug!("extra connection {a}-{b} merged sectors {sa} and {sb}");
    }

    /// Unlink `a` and `b`.
    ///
    /// The removal is assumed to split the component: `a`'s side is flooded
    /// with a fresh id. When another route still connects the two ends, the
    /// flood reaches `b` as well and the partition is unchanged apart from
    /// the id.
    ///
    /// # Panics
    ///
    /// If either cell is outside the bounds.
    pub fn remove_extra_connection(&mut self, a: Point, b: Point) {
        let (ia, ib) = (self.idx(a), self.idx(b));
        if self.extra[ia] != Some(b) {
            return;
        }
        self.extra[ia] = None;
        self.extra[ib] = None;

        let (sa, sb) = (self.sectors[ia], self.sectors[ib]);
        if sa == NO_SECTOR || sa != sb {
            return;
        }
        let fresh = self.new_sector();
        self.join(a, fresh);
        if self.sectors[ib] != fresh {
            log::debug!("removing extra connection {a}-{b} split sector {sa}");
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn new_sector(&mut self) -> SectorId {
        if let Some(s) = self.free.pop() {
            return s;
        }
        self.sizes.push(0);
        (self.sizes.len() - 1) as SectorId
    }

    /// Relabel cell `i`, keeping the size counters in step.
    fn set_sector(&mut self, i: usize, s: SectorId) {
        let old = self.sectors[i];
        if old != NO_SECTOR {
            self.sizes[old as usize] -= 1;
            if self.sizes[old as usize] == 0 {
                self.free.push(old);
            }
        }
        self.sectors[i] = s;
        if s != NO_SECTOR {
            self.sizes[s as usize] += 1;
        }
    }

    /// Call `f(neighbor, sector)` for every in-bounds neighbor of `p`,
    /// including its extra connection.
    fn for_each_neighbor(&self, p: Point, mut f: impl FnMut(Point, SectorId)) {
        for n in p.neighbors_8() {
            if let Some(i) = self.bounds.index(n) {
                f(n, self.sectors[i]);
            }
        }
        if let Some(n) = self.extra_connection(p) {
            f(n, self.sectors[self.idx(n)]);
        }
    }

    fn member_neighbors(&self, p: Point) -> Vec<Point> {
        let mut out = Vec::with_capacity(9);
        self.for_each_neighbor(p, |n, s| {
            if s != NO_SECTOR && n != p && !out.contains(&n) {
                out.push(n);
            }
        });
        out
    }

    /// Flood `sector` from `start` over every connected member carrying a
    /// different label.
    fn join(&mut self, start: Point, sector: SectorId) {
        let si = self.idx(start);
        self.set_sector(si, sector);
        let mut queue = VecDeque::from([start]);
        let mut nbuf: Vec<Point> = Vec::with_capacity(9);
        while let Some(p) = queue.pop_front() {
            nbuf.clear();
            self.for_each_neighbor(p, |n, s| {
                if s != NO_SECTOR && s != sector {
                    nbuf.push(n);
                }
            });
            for &n in &nbuf {
                let ni = self.idx(n);
                // The extra connection may repeat a geometric neighbor.
                if self.sectors[ni] != sector {
                    self.set_sector(ni, sector);
                    queue.push_back(n);
                }
            }
        }
    }

    fn bump_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            self.stamps.fill(0);
            self.epoch = 1;
        }
    }

    /// Decide whether the member cells in `groups`, all former neighbors of
    /// `removed`, are still connected to each other without it.
    ///
    /// One breadth-first frontier starts at every group and all frontiers
    /// advance together. Frontiers that touch are merged in a disjoint set.
    /// A merged set whose queue runs dry while other sets remain is a
    /// component of its own: unless `dry_run`, it is relabelled with a fresh
    /// id. The race ends once a single set is left, so the cost is bounded
    /// by the smaller sides of the split rather than the whole component.
    ///
    /// Returns whether any group was found to be cut off.
    fn split_race(&mut self, removed: Point, groups: &[Point], dry_run: bool) -> bool {
        let k = groups.len();
        if k < 2 {
            return false;
        }
        self.bump_epoch();
        self.queue.clear();
        let mut sets = DisjointSet::new(k);
        let mut pending = vec![0usize; k];
        let mut active = k;
        let mut split = false;

        for (g, &p) in groups.iter().enumerate() {
            let i = self.idx(p);
            self.stamps[i] = self.epoch;
            self.owner[i] = g as u32;
            pending[g] = 1;
            self.queue.push_back(i);
        }

        let mut nbuf: Vec<Point> = Vec::with_capacity(9);
        while active > 1 {
            let Some(ci) = self.queue.pop_front() else {
                break;
            };
            let mut root = sets.find(self.owner[ci] as usize);
            pending[root] -= 1;
            let cp = self.bounds.point_at(ci);

            nbuf.clear();
            self.for_each_neighbor(cp, |n, s| {
                if s != NO_SECTOR && n != removed {
                    nbuf.push(n);
                }
            });
            for &n in &nbuf {
                let ni = self.idx(n);
                if self.stamps[ni] != self.epoch {
                    self.stamps[ni] = self.epoch;
                    self.owner[ni] = root as u32;
                    pending[root] += 1;
                    self.queue.push_back(ni);
                    continue;
                }
                let other = sets.find(self.owner[ni] as usize);
                if other != root {
                    let merged = sets.union(root, other);
                    pending[merged] = pending[root] + pending[other];
                    root = merged;
                    active -= 1;
                    if active == 1 {
                        break;
                    }
                }
            }

            if active > 1 && pending[root] == 0 {
                split = true;
                if dry_run {
                    return true;
                }
                let fresh = self.new_sector();
                self.join(groups[root], fresh);
                active -= 1;
            }
        }
        split
    }
}

/// Union-find over frontier indices, union by size.
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets rooted at `a` and `b`; returns the new root.
    fn union(&mut self, a: usize, b: usize) -> usize {
        let (big, small) = if self.size[a] >= self.size[b] {
            (a, b)
        } else {
            (b, a)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        big
    }
}

// ---------------------------------------------------------------------------
// SectorCache
// ---------------------------------------------------------------------------

/// One [`Sectors`] per movement capability of a level, built on first use.
///
/// Capabilities are opaque keys: two keys that differ may block on different
/// cells and therefore partition the level differently.
#[derive(Debug, Clone)]
pub struct SectorCache<K> {
    bounds: Range,
    sectors: HashMap<K, Sectors>,
    connections: Vec<(Point, Point)>,
}

impl<K: Eq + Hash + Clone> SectorCache<K> {
    pub fn new(bounds: Range) -> Self {
        Self {
            bounds,
            sectors: HashMap::new(),
            connections: Vec::new(),
        }
    }

    /// The partition for `key`, built from `passable` if it does not exist yet.
    pub fn get_or_build(&mut self, key: &K, passable: impl Fn(Point) -> bool) -> &mut Sectors {
        let bounds = self.bounds;
        let connections = &self.connections;
        self.sectors.entry(key.clone()).or_insert_with(|| {
            let mut s = Sectors::new(bounds);
            for &(a, b) in connections {
                s.add_extra_connection(a, b);
            }
            for p in bounds {
                if passable(p) {
                    s.add(p);
                }
            }
            log::debug!(
                "built sectors for {} cells: {} components",
                bounds.len(),
                s.num_sectors()
            );
            s
        })
    }

    /// The partition for `key`, if it was built.
    pub fn get(&self, key: &K) -> Option<&Sectors> {
        self.sectors.get(key)
    }

    /// Number of built partitions.
    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    /// Re-evaluate `pos` in every built partition.
    pub fn square_changed(&mut self, pos: Point, passable: impl Fn(&K, Point) -> bool) {
        for (key, s) in self.sectors.iter_mut() {
            if passable(key, pos) {
                s.add(pos);
            } else {
                s.remove(pos);
            }
        }
    }

    /// Register an extra connection in every partition, present and future.
    pub fn add_extra_connection(&mut self, a: Point, b: Point) {
        self.connections
            .retain(|&(x, y)| x != a && y != a && x != b && y != b);
        self.connections.push((a, b));
        for s in self.sectors.values_mut() {
            s.add_extra_connection(a, b);
        }
    }

    /// Remove an extra connection from every partition.
    pub fn remove_extra_connection(&mut self, a: Point, b: Point) {
        self.connections
            .retain(|&(x, y)| !((x == a && y == b) || (x == b && y == a)));
        for s in self.sectors.values_mut() {
            s.remove_extra_connection(a, b);
        }
    }
}
