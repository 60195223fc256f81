use delve_core::Point;

use crate::context::{PathNode, SearchContext};
use crate::traits::WeightedPather;

impl SearchContext {
    /// Compute a multi-source Dijkstra distance map.
    ///
    /// Every source starts at cost 0. Expansion stops when the cumulative
    /// cost would exceed `max_cost`. Returns every reached cell with its
    /// distance, in the order cells were settled (non-decreasing cost).
    ///
    /// Unlike [`ShortestPath`](crate::ShortestPath) there is no single
    /// target: this is the tool for area and portal-distance precomputation.
    pub fn dijkstra<P: WeightedPather>(
        &mut self,
        pather: &P,
        sources: &[Point],
        max_cost: f64,
    ) -> &[PathNode] {
        let mut results = std::mem::take(&mut self.dijkstra_results);
        results.clear();
        let seeds: Vec<(Point, f64)> = sources.iter().map(|&p| (p, 0.0)).collect();
        let rng = self.rng;
        self.run_weighted(
            pather,
            rng,
            &seeds,
            None,
            |_| 0.0,
            max_cost,
            |pos, cost| results.push(PathNode { pos, cost }),
        );
        self.dijkstra_results = results;
        &self.dijkstra_results
    }

    /// Query the cost at `p` from the last weighted search.
    ///
    /// Returns [`INFINITY`](crate::INFINITY) if the point is outside the
    /// range or was not reached.
    pub fn dijkstra_at(&self, p: Point) -> f64 {
        self.distance(p)
    }
}
