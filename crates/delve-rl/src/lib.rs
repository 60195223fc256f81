//! Per-level world queries for delve: cached field of vision, a bucketed
//! spatial index and the arena its handles point into.

pub mod arena;
pub mod bucket_map;
pub mod fov;

pub use arena::{Arena, Handle};
pub use bucket_map::{BucketMap, BucketMapError};
pub use fov::{FieldOfView, VisionCache};
