use delve_core::Point;

use crate::context::{BfsNode, SearchContext};
use crate::traits::Pather;

impl SearchContext {
    /// Multi-source breadth-first flood fill.
    ///
    /// Each step has cost 1; the entry predicate is whatever `pather`'s
    /// neighbor function filters by (see [`FnPather`](crate::FnPather)).
    /// With `max_dist` set, cells further than that many steps are not
    /// entered. Returns all reached cells in visiting order.
    pub fn bf_search<P: Pather>(
        &mut self,
        pather: &P,
        sources: &[Point],
        max_dist: Option<i32>,
    ) -> &[BfsNode] {
        self.bfs.clear();
        self.bfs_results.clear();
        self.queue.clear();
        let max_dist = max_dist.unwrap_or(i32::MAX);

        for &src in sources {
            let Some(si) = self.idx(src) else {
                continue;
            };
            if self.bfs.is_set(si) {
                continue;
            }
            self.bfs.set(si, 0);
            self.queue.push_back(si);
            self.bfs_results.push(BfsNode { pos: src, dist: 0 });
        }

        let mut nbuf = std::mem::take(&mut self.nbuf);

        while let Some(ci) = self.queue.pop_front() {
            let current_dist = self.bfs.get(ci);
            if current_dist >= max_dist {
                continue;
            }
            let cp = self.point(ci);

            nbuf.clear();
            pather.neighbors(cp, &mut nbuf);

            for &np in nbuf.iter() {
                let Some(ni) = self.idx(np) else {
                    continue;
                };
                if self.bfs.is_set(ni) {
                    continue;
                }
                let nd = current_dist + 1;
                self.bfs.set(ni, nd);
                self.queue.push_back(ni);
                self.bfs_results.push(BfsNode { pos: np, dist: nd });
            }
        }

        self.nbuf = nbuf;
        &self.bfs_results
    }

    /// Step count at `p` from the last [`bf_search`](Self::bf_search), or
    /// `None` if it was not reached.
    pub fn bfs_at(&self, p: Point) -> Option<i32> {
        let i = self.idx(p)?;
        self.bfs.is_set(i).then(|| self.bfs.get(i))
    }

    /// Whether the last [`bf_search`](Self::bf_search) reached `p`.
    pub fn bfs_reached(&self, p: Point) -> bool {
        self.bfs_at(p).is_some()
    }
}
