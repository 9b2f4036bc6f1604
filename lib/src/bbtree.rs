use conv::ValueFrom;
use ordered_float::OrderedFloat;
use rayon::prelude::*;

use crate::{
    index::{bounds_on, Index},
    partition::{intersect_candidates, union_partitions},
    simd,
    slots::Slots,
    Coord, Id, Partitioning, Point, WorkerPool,
};

const DEFAULT_BUCKET_CAPACITY: usize = 256;
const DEFAULT_FANOUT: usize = 32;

/// Leaf bucket storing its points column by column.
struct Bucket {
    columns: Vec<Vec<Coord>>,
    ids: Vec<Id>,
}

impl Bucket {
    fn new(dimensions: usize) -> Bucket {
        Bucket {
            columns: vec![Vec::new(); dimensions],
            ids: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn push(&mut self, point: &[Coord], id: Id) {
        for (column, v) in self.columns.iter_mut().zip(point) {
            column.push(*v);
        }
        self.ids.push(id);
    }

    fn swap_remove(&mut self, row: usize) {
        for column in &mut self.columns {
            column.swap_remove(row);
        }
        self.ids.swap_remove(row);
    }

    fn row_equals(&self, row: usize, point: &[Coord]) -> bool {
        self.columns.iter().zip(point).all(|(c, v)| c[row] == *v)
    }

    // Row of the matching point with the smallest identifier.
    fn locate(&self, point: &[Coord]) -> Option<usize> {
        (0..self.len())
            .filter(|&row| self.row_equals(row, point))
            .min_by_key(|&row| self.ids[row])
    }

    fn select(&self, lower: &[Coord], upper: &[Coord], out: &mut Vec<Id>) {
        let mut mask = vec![0u64; simd::mask_len(self.len())];
        let mut dims = self.columns.iter().zip(lower.iter().zip(upper));
        match dims.next() {
            Some((column, (lo, hi))) => simd::select_range(column, *lo, *hi, &mut mask),
            None => mask.fill(u64::MAX),
        }
        for (column, (lo, hi)) in dims {
            simd::refine_range(column, *lo, *hi, &mut mask);
        }
        simd::for_each_set(&mask, |row| {
            if row < self.ids.len() {
                out.push(self.ids[row]);
            }
        });
    }

    fn select_dimension(&self, dimension: usize, lower: Coord, upper: Coord, out: &mut Vec<Id>) {
        let mut mask = vec![0u64; simd::mask_len(self.len())];
        simd::select_range(&self.columns[dimension], lower, upper, &mut mask);
        simd::for_each_set(&mask, |row| out.push(self.ids[row]));
    }

    fn variance(&self, dimension: usize) -> f64 {
        let column = &self.columns[dimension];
        let weight = f64::value_from(column.len()).unwrap_or(f64::MAX);
        let mean = column.iter().map(|v| f64::from(*v)).sum::<f64>() / weight;
        column
            .iter()
            .map(|v| (f64::from(*v) - mean).powi(2))
            .sum::<f64>()
            / weight
    }
}

enum BBNode {
    // Child `i` holds the points whose `dimension` value lies in
    // `[delimiters[i - 1], delimiters[i])`, open-ended at both extremes.
    Inner {
        dimension: usize,
        delimiters: Vec<Coord>,
        children: Vec<usize>,
    },
    Bucket(Bucket),
    Vacant,
}

impl BBNode {
    fn child_for(dimension: usize, delimiters: &[Coord], point: &[Coord]) -> usize {
        let v = point[dimension];
        delimiters.partition_point(|d| *d <= v)
    }
}

/// BB-tree: a k-ary search tree splitting one dimension per inner node, with
/// columnar leaf buckets scanned by the vectorized range kernels.
pub struct BBTree {
    dimensions: usize,
    bucket_capacity: usize,
    fanout: usize,
    root: usize,
    count: usize,
    nodes: Vec<BBNode>,
    slots: Slots,
}

impl BBTree {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self::build(dimensions, DEFAULT_BUCKET_CAPACITY, DEFAULT_FANOUT)
    }

    /// Returns `None` if `bucket_capacity` is below 2 or `fanout` below 2.
    #[must_use]
    pub fn with_params(dimensions: usize, bucket_capacity: usize, fanout: usize) -> Option<Self> {
        if bucket_capacity < 2 || fanout < 2 {
            return None;
        }
        Some(Self::build(dimensions, bucket_capacity, fanout))
    }

    fn build(dimensions: usize, bucket_capacity: usize, fanout: usize) -> Self {
        let mut tree = BBTree {
            dimensions,
            bucket_capacity,
            fanout,
            root: 0,
            count: 0,
            nodes: Vec::new(),
            slots: Slots::new(),
        };
        tree.root = tree.add_slot(BBNode::Bucket(Bucket::new(dimensions)));
        tree
    }

    /// Number of levels from the root to the deepest bucket.
    #[must_use]
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut stack = vec![(self.root, 1)];
        while let Some((slot, depth)) = stack.pop() {
            height = height.max(depth);
            if let BBNode::Inner { children, .. } = &self.nodes[slot] {
                stack.extend(children.iter().map(|c| (*c, depth + 1)));
            }
        }
        height
    }

    // Path of (inner slot, child position) pairs and the bucket slot reached.
    fn descend(&self, point: &[Coord]) -> (Vec<(usize, usize)>, usize) {
        let mut path = Vec::new();
        let mut slot = self.root;
        while let BBNode::Inner {
            dimension,
            delimiters,
            children,
        } = &self.nodes[slot]
        {
            let position = BBNode::child_for(*dimension, delimiters, point);
            path.push((slot, position));
            slot = children[position];
        }
        (path, slot)
    }

    fn bucket(&self, slot: usize) -> Option<&Bucket> {
        match &self.nodes[slot] {
            BBNode::Bucket(bucket) => Some(bucket),
            _ => None,
        }
    }

    fn bucket_mut(&mut self, slot: usize) -> Option<&mut Bucket> {
        match &mut self.nodes[slot] {
            BBNode::Bucket(bucket) => Some(bucket),
            _ => None,
        }
    }

    fn split_bucket(&mut self, parent: Option<(usize, usize)>, slot: usize) {
        let Some(bucket) = self.bucket(slot) else {
            return;
        };

        // Split along the dimension with the largest spread
        let Some((dimension, variance)) = (0..self.dimensions)
            .map(|d| (d, bucket.variance(d)))
            .max_by_key(|(_, variance)| OrderedFloat(*variance))
        else {
            return;
        };
        if variance <= 0.0 {
            // All points identical: nothing to split on.
            return;
        }

        let mut sorted = bucket.columns[dimension].clone();
        sorted.sort_by_key(|v| OrderedFloat(*v));
        let mut delimiter = sorted[sorted.len() / 2];
        if delimiter <= sorted[0] {
            match sorted.iter().find(|v| **v > sorted[0]) {
                Some(v) => delimiter = *v,
                None => return,
            }
        }

        // Move rows at or above the delimiter into a new bucket
        let mut right = Bucket::new(self.dimensions);
        if let Some(bucket) = self.bucket_mut(slot) {
            let mut row = 0;
            while row < bucket.len() {
                if bucket.columns[dimension][row] >= delimiter {
                    let point: Vec<Coord> = bucket.columns.iter().map(|c| c[row]).collect();
                    right.push(&point, bucket.ids[row]);
                    bucket.swap_remove(row);
                } else {
                    row += 1;
                }
            }
        }
        let right = self.add_slot(BBNode::Bucket(right));

        // Widen the parent if it already splits this dimension, else grow a level
        if let Some((parent, position)) = parent {
            if let BBNode::Inner {
                dimension: parent_dimension,
                delimiters,
                children,
            } = &mut self.nodes[parent]
            {
                if *parent_dimension == dimension && children.len() < self.fanout {
                    delimiters.insert(position, delimiter);
                    children.insert(position + 1, right);
                    return;
                }
            }
        }
        let left = std::mem::replace(&mut self.nodes[slot], BBNode::Vacant);
        let left = self.add_slot(left);
        self.nodes[slot] = BBNode::Inner {
            dimension,
            delimiters: vec![delimiter],
            children: vec![left, right],
        };
    }

    fn search_subtree(&self, start: usize, lower: &[Coord], upper: &[Coord], out: &mut Vec<Id>) {
        let mut stack = vec![start];
        while let Some(slot) = stack.pop() {
            match &self.nodes[slot] {
                BBNode::Inner {
                    dimension,
                    delimiters,
                    children,
                } => {
                    let (lo, hi) = bounds_on(lower, upper, *dimension);
                    stack.extend(overlapping(delimiters, children, lo, hi));
                }
                BBNode::Bucket(bucket) => bucket.select(lower, upper, out),
                BBNode::Vacant => {}
            }
        }
    }

    // Candidates on one dimension: only inner nodes splitting that dimension
    // prune, every other inner node is fully descended.
    fn search_dimension(&self, dimension: usize, lower: Coord, upper: Coord) -> Vec<Id> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(slot) = stack.pop() {
            match &self.nodes[slot] {
                BBNode::Inner {
                    dimension: split,
                    delimiters,
                    children,
                } => {
                    if *split == dimension {
                        stack.extend(overlapping(delimiters, children, lower, upper));
                    } else {
                        stack.extend(children.iter().copied());
                    }
                }
                BBNode::Bucket(bucket) => bucket.select_dimension(dimension, lower, upper, &mut out),
                BBNode::Vacant => {}
            }
        }
        out
    }

    // Non-empty buckets whose delimiter ranges meet the query.
    fn candidate_buckets(&self, lower: &[Coord], upper: &[Coord]) -> Vec<usize> {
        let mut buckets = Vec::new();
        let mut stack = vec![self.root];
        while let Some(slot) = stack.pop() {
            match &self.nodes[slot] {
                BBNode::Inner {
                    dimension,
                    delimiters,
                    children,
                } => {
                    let (lo, hi) = bounds_on(lower, upper, *dimension);
                    stack.extend(overlapping(delimiters, children, lo, hi));
                }
                BBNode::Bucket(bucket) if bucket.len() > 0 => buckets.push(slot),
                _ => {}
            }
        }
        buckets
    }

    fn add_slot(&mut self, node: BBNode) -> usize {
        let slot_id = self.slots.acquire();
        if slot_id == self.nodes.len() {
            self.nodes.push(node);
        } else {
            self.nodes[slot_id] = node;
        }
        slot_id
    }
}

// Children whose half-open delimiter interval meets `[lower, upper]`.
fn overlapping<'a>(
    delimiters: &'a [Coord],
    children: &'a [usize],
    lower: Coord,
    upper: Coord,
) -> impl Iterator<Item = usize> + 'a {
    let end = (delimiters.partition_point(|d| *d <= upper) + 1).min(children.len());
    let start = delimiters.partition_point(|d| *d <= lower).min(end);
    children[start..end].iter().copied()
}

impl Index for BBTree {
    fn name(&self) -> &'static str {
        "BB-Tree"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn insert(&mut self, point: Point, id: Id) {
        let (path, slot) = self.descend(&point);
        let capacity = self.bucket_capacity;
        let overflow = match self.bucket_mut(slot) {
            Some(bucket) => {
                bucket.push(&point, id);
                bucket.len() > capacity
            }
            None => false,
        };
        self.count += 1;
        if overflow {
            self.split_bucket(path.last().copied(), slot);
        }
    }

    fn search_point(&self, point: &[Coord]) -> Option<Id> {
        let (_, slot) = self.descend(point);
        let bucket = self.bucket(slot)?;
        bucket.locate(point).map(|row| bucket.ids[row])
    }

    fn search_range(&self, lower: &[Coord], upper: &[Coord]) -> Vec<Id> {
        let mut result = Vec::new();
        self.search_subtree(self.root, lower, upper, &mut result);
        result
    }

    fn search_range_parallel(
        &self,
        lower: &[Coord],
        upper: &[Coord],
        partitioning: Partitioning,
        pool: &WorkerPool,
    ) -> Vec<Id> {
        match partitioning {
            Partitioning::Vertical => {
                let candidates = pool.install(|| {
                    (0..self.dimensions)
                        .into_par_iter()
                        .map(|d| {
                            let (lo, hi) = bounds_on(lower, upper, d);
                            self.search_dimension(d, lo, hi)
                        })
                        .collect::<Vec<_>>()
                });
                intersect_candidates(candidates)
            }
            Partitioning::Horizontal => {
                let buckets = self.candidate_buckets(lower, upper);
                let parts = pool.install(|| {
                    buckets
                        .par_iter()
                        .map(|&slot| {
                            let mut out = Vec::new();
                            if let Some(bucket) = self.bucket(slot) {
                                bucket.select(lower, upper, &mut out);
                            }
                            out
                        })
                        .collect::<Vec<_>>()
                });
                union_partitions(parts)
            }
        }
    }

    fn delete(&mut self, point: &[Coord]) -> bool {
        let (_, slot) = self.descend(point);
        let Some(bucket) = self.bucket_mut(slot) else {
            return false;
        };
        let Some(row) = bucket.locate(point) else {
            return false;
        };
        bucket.swap_remove(row);
        self.count -= 1;
        true
    }

    fn count(&self) -> usize {
        self.count
    }
}
