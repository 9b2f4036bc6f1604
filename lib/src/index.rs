use std::fmt;

use crate::{BBTree, Partitioning, RTree, ScanIndex, WorkerPool};

/// A single coordinate value.
pub type Coord = f32;

/// An `m`-dimensional point.
pub type Point = Vec<Coord>;

/// Identifier assigned to a point when it is inserted.
pub type Id = u32;

/// The capability set shared by every index under test.
///
/// Range predicates are closed on both ends: a point `p` matches when
/// `lower[d] <= p[d] <= upper[d]` holds for every dimension `d`. Range results
/// never contain the same identifier twice but come in no particular order.
///
/// When several stored points are equal, [`Index::search_point`] reports the
/// smallest of their identifiers and [`Index::delete`] removes that entry.
pub trait Index: Send + Sync {
    fn name(&self) -> &'static str;
    fn dimensions(&self) -> usize;

    fn insert(&mut self, point: Point, id: Id);
    fn search_point(&self, point: &[Coord]) -> Option<Id>;
    fn search_range(&self, lower: &[Coord], upper: &[Coord]) -> Vec<Id>;
    fn search_range_parallel(
        &self,
        lower: &[Coord],
        upper: &[Coord],
        partitioning: Partitioning,
        pool: &WorkerPool,
    ) -> Vec<Id>;
    fn delete(&mut self, point: &[Coord]) -> bool;
    fn count(&self) -> usize;
}

/// The index families that can be put under test.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexKind {
    BbTree,
    RTree,
    Scan,
}

impl IndexKind {
    pub const ALL: [IndexKind; 3] = [IndexKind::BbTree, IndexKind::RTree, IndexKind::Scan];

    /// Builds an empty index of this family over `dimensions` coordinates.
    #[must_use]
    pub fn build(self, dimensions: usize) -> Box<dyn Index> {
        match self {
            IndexKind::BbTree => Box::new(BBTree::new(dimensions)),
            IndexKind::RTree => Box::new(RTree::new(dimensions)),
            IndexKind::Scan => Box::new(ScanIndex::new(dimensions)),
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexKind::BbTree => "BB-Tree",
            IndexKind::RTree => "R-Tree",
            IndexKind::Scan => "Scan",
        };
        f.write_str(name)
    }
}

/// Whether `point` lies inside the closed box `[lower, upper]`.
#[inline]
pub(crate) fn contains(lower: &[Coord], upper: &[Coord], point: &[Coord]) -> bool {
    point
        .iter()
        .zip(lower.iter().zip(upper.iter()))
        .all(|(v, (lo, hi))| lo <= v && v <= hi)
}

/// Hash key for exact coordinate matches.
///
/// `-0.0` and `0.0` compare equal, so they share a key.
#[must_use]
pub fn coordinate_key(point: &[Coord]) -> Vec<u32> {
    point.iter().map(|v| (v + 0.0).to_bits()).collect()
}

/// Query bounds on one dimension; dimensions the query omits are unbounded.
#[inline]
pub(crate) fn bounds_on(lower: &[Coord], upper: &[Coord], dimension: usize) -> (Coord, Coord) {
    (
        lower.get(dimension).copied().unwrap_or(Coord::MIN),
        upper.get(dimension).copied().unwrap_or(Coord::MAX),
    )
}
