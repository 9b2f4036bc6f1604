use std::{fmt, ops::Range};

use crate::{simd::BLOCK, Id};

/// How a parallel range search splits its work across the worker pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Partitioning {
    /// One task per dimension; per-dimension candidates are intersected.
    Vertical,
    /// One task per group of records; per-partition hits are unioned.
    Horizontal,
}

impl Partitioning {
    pub const ALL: [Partitioning; 2] = [Partitioning::Vertical, Partitioning::Horizontal];
}

impl fmt::Display for Partitioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partitioning::Vertical => f.write_str("Vertical Partitioning"),
            Partitioning::Horizontal => f.write_str("Horizontal Partitioning"),
        }
    }
}

/// Intersection of per-dimension candidate sets.
pub fn intersect_candidates(mut candidates: Vec<Vec<Id>>) -> Vec<Id> {
    for set in &mut candidates {
        set.sort_unstable();
    }
    // Start from the smallest set to keep the merge short.
    candidates.sort_by_key(Vec::len);
    let mut sets = candidates.into_iter();
    let Some(mut result) = sets.next() else {
        return Vec::new();
    };
    for set in sets {
        if result.is_empty() {
            break;
        }
        result = intersect_sorted(&result, &set);
    }
    result
}

fn intersect_sorted(a: &[Id], b: &[Id]) -> Vec<Id> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Union of hits from disjoint partitions.
pub fn union_partitions(parts: Vec<Vec<Id>>) -> Vec<Id> {
    let total = parts.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total);
    for part in parts {
        out.extend(part);
    }
    out
}

/// Splits `rows` into at most `parts` contiguous ranges whose boundaries fall
/// on mask-word boundaries.
pub fn row_ranges(rows: usize, parts: usize) -> Vec<Range<usize>> {
    let blocks = rows.div_ceil(BLOCK);
    let parts = parts.clamp(1, blocks.max(1));
    let per_part = blocks.div_ceil(parts) * BLOCK;
    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0;
    while start < rows {
        let end = (start + per_part).min(rows);
        ranges.push(start..end);
        start = end;
    }
    ranges
}
