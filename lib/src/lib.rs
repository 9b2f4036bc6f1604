mod bbtree;
mod index;
mod node;
mod partition;
mod pool;
mod rect;
mod rtree;
mod scan;
pub mod simd;
mod slots;

pub use bbtree::BBTree;
pub use index::{coordinate_key, Coord, Id, Index, IndexKind, Point};
pub use partition::Partitioning;
pub use pool::WorkerPool;
pub use rtree::RTree;
pub use scan::ScanIndex;
