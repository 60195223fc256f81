//! Grid searches and dynamic connectivity.
//!
//! - **Shortest paths** rooted at a target ([`ShortestPath::new`]), with a
//!   bounded retreat variant ([`ShortestPath::retreat`])
//! - **Dijkstra** multi-source cost maps ([`SearchContext::dijkstra`])
//! - **BFS** unweighted flood fill ([`SearchContext::bf_search`])
//! - **Sectors**: connected components kept up to date under single-cell
//!   edits and extra connections ([`Sectors`], [`SectorCache`])
//! - **Portals** and portal-aware paths ([`Portals`], [`LevelShortestPath`])
//!
//! Every search runs against a caller-owned [`SearchContext`], whose scratch
//! tables are cleared in constant time between calls. A context is not
//! reentrant: cost callbacks must not start another search on it. Use one
//! context per thread for parallel planning.
//!
//! # Trait hierarchy
//!
//! | Trait | Required for |
//! |---|---|
//! | [`Pather`] | BFS |
//! | [`WeightedPather`] : [`Pather`] | Dijkstra, retreat |
//! | [`AstarPather`] : [`WeightedPather`] | shortest paths |

mod bfs;
mod context;
mod dijkstra;
mod distance;
mod level;
mod neighbors;
mod sectors;
mod shortest;
mod traits;

pub use context::{BfsNode, INFINITY, PathNode, SearchContext};
pub use delve_core::within_euclidean;
pub use distance::{chebyshev, manhattan};
pub use level::{LevelShortestPath, Portals};
pub use neighbors::{CostFnPather, Directions, FnPather};
pub use sectors::{NO_SECTOR, SectorCache, SectorId, Sectors};
pub use shortest::{RetreatConfig, ShortestPath};
pub use traits::{AstarPather, Pather, WeightedPather};
