use std::collections::HashMap;

use rayon::prelude::*;

use crate::{
    index::{bounds_on, contains, coordinate_key, Index},
    partition::{row_ranges, union_partitions},
    simd, Coord, Id, Partitioning, Point, WorkerPool,
};

/// Column store answering every query by scanning.
///
/// Each dimension lives in its own contiguous column so range predicates run
/// through the [`simd`] kernels one attribute at a time. Point lookups go
/// through a map from coordinates to rows instead of a scan.
pub struct ScanIndex {
    columns: Vec<Vec<Coord>>,
    ids: Vec<Id>,
    rows_by_key: HashMap<Vec<u32>, Vec<usize>>,
}

impl ScanIndex {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        ScanIndex {
            columns: vec![Vec::new(); dimensions],
            ids: Vec::new(),
            rows_by_key: HashMap::new(),
        }
    }

    fn rows(&self) -> usize {
        self.ids.len()
    }

    fn row(&self, row: usize) -> impl Iterator<Item = Coord> + '_ {
        self.columns.iter().map(move |c| c[row])
    }

    // Row of the smallest id stored at exactly `point`.
    fn locate(&self, point: &[Coord]) -> Option<usize> {
        self.rows_by_key
            .get(&coordinate_key(point))?
            .iter()
            .copied()
            .filter(|&row| self.row(row).eq(point.iter().copied()))
            .min_by_key(|&row| self.ids[row])
    }

    // Drops `row` from the map under `key` and renames row `from` to `row`.
    fn forget_row(&mut self, key: Vec<u32>, row: usize, from: usize) {
        if let Some(rows) = self.rows_by_key.get_mut(&key) {
            rows.retain(|&r| r != row);
            if rows.is_empty() {
                self.rows_by_key.remove(&key);
            }
        }
        if row != from {
            let moved: Vec<Coord> = self.row(from).collect();
            if let Some(rows) = self.rows_by_key.get_mut(&coordinate_key(&moved)) {
                for r in rows.iter_mut().filter(|r| **r == from) {
                    *r = row;
                }
            }
        }
    }

    // Mask over the whole table for one dimension.
    fn dimension_mask(&self, dimension: usize, lower: Coord, upper: Coord) -> Vec<u64> {
        let mut mask = vec![0u64; simd::mask_len(self.rows())];
        simd::select_range(&self.columns[dimension], lower, upper, &mut mask);
        mask
    }

    // Hits within `rows`, evaluated on every dimension.
    fn scan_rows(&self, rows: std::ops::Range<usize>, lower: &[Coord], upper: &[Coord]) -> Vec<Id> {
        let mut mask = vec![0u64; simd::mask_len(rows.len())];
        for (d, column) in self.columns.iter().enumerate() {
            let (lo, hi) = bounds_on(lower, upper, d);
            let column = &column[rows.clone()];
            if d == 0 {
                simd::select_range(column, lo, hi, &mut mask);
            } else {
                simd::refine_range(column, lo, hi, &mut mask);
            }
        }
        let ids = &self.ids[rows];
        let mut out = Vec::with_capacity(simd::count_set(&mask));
        simd::for_each_set(&mask, |row| out.push(ids[row]));
        out
    }

    fn collect_ids(&self, mask: &[u64]) -> Vec<Id> {
        let mut out = Vec::with_capacity(simd::count_set(mask));
        simd::for_each_set(mask, |row| out.push(self.ids[row]));
        out
    }
}

impl Index for ScanIndex {
    fn name(&self) -> &'static str {
        "Scan"
    }

    fn dimensions(&self) -> usize {
        self.columns.len()
    }

    fn insert(&mut self, point: Point, id: Id) {
        let row = self.rows();
        self.rows_by_key
            .entry(coordinate_key(&point))
            .or_default()
            .push(row);
        for (column, v) in self.columns.iter_mut().zip(point) {
            column.push(v);
        }
        self.ids.push(id);
    }

    fn search_point(&self, point: &[Coord]) -> Option<Id> {
        self.locate(point).map(|row| self.ids[row])
    }

    fn search_range(&self, lower: &[Coord], upper: &[Coord]) -> Vec<Id> {
        let mut point = Vec::with_capacity(self.columns.len());
        let mut result = Vec::new();
        for row in 0..self.rows() {
            point.clear();
            point.extend(self.row(row));
            if contains(lower, upper, &point) {
                result.push(self.ids[row]);
            }
        }
        result
    }

    fn search_range_parallel(
        &self,
        lower: &[Coord],
        upper: &[Coord],
        partitioning: Partitioning,
        pool: &WorkerPool,
    ) -> Vec<Id> {
        if self.columns.is_empty() {
            return self.ids.clone();
        }
        match partitioning {
            Partitioning::Vertical => {
                let masks = pool.install(|| {
                    (0..self.columns.len())
                        .into_par_iter()
                        .map(|d| {
                            let (lo, hi) = bounds_on(lower, upper, d);
                            self.dimension_mask(d, lo, hi)
                        })
                        .collect::<Vec<_>>()
                });
                let mut masks = masks.into_iter();
                let Some(mut mask) = masks.next() else {
                    return Vec::new();
                };
                for other in masks {
                    simd::intersect(&mut mask, &other);
                }
                self.collect_ids(&mask)
            }
            Partitioning::Horizontal => {
                let ranges = row_ranges(self.rows(), pool.threads());
                let parts = pool.install(|| {
                    ranges
                        .into_par_iter()
                        .map(|rows| self.scan_rows(rows, lower, upper))
                        .collect::<Vec<_>>()
                });
                union_partitions(parts)
            }
        }
    }

    fn delete(&mut self, point: &[Coord]) -> bool {
        let Some(row) = self.locate(point) else {
            return false;
        };
        self.forget_row(coordinate_key(point), row, self.rows() - 1);
        for column in &mut self.columns {
            column.swap_remove(row);
        }
        self.ids.swap_remove(row);
        true
    }

    fn count(&self) -> usize {
        self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::ScanIndex;
    use crate::{Index, Partitioning, WorkerPool};

    fn grid() -> ScanIndex {
        let mut scan = ScanIndex::new(2);
        let mut id = 1;
        for x in 0..20 {
            for y in 0..20 {
                scan.insert(vec![x as f32, y as f32], id);
                id += 1;
            }
        }
        scan
    }

    #[test]
    fn serial_and_partitioned_scans_agree() {
        let scan = grid();
        let pool = WorkerPool::new(3).expect("pool");
        let lower = [3.0, 5.0];
        let upper = [7.0, 5.0];

        let mut serial = scan.search_range(&lower, &upper);
        serial.sort_unstable();
        assert_eq!(serial.len(), 5);

        for partitioning in Partitioning::ALL {
            let mut parallel = scan.search_range_parallel(&lower, &upper, partitioning, &pool);
            parallel.sort_unstable();
            assert_eq!(serial, parallel, "{partitioning}");
        }
    }

    #[test]
    fn delete_swaps_last_row_in() {
        let mut scan = grid();
        assert_eq!(scan.count(), 400);
        assert!(scan.delete(&[0.0, 0.0]));
        assert_eq!(scan.count(), 399);
        assert_eq!(scan.search_point(&[0.0, 0.0]), None);
        assert_eq!(scan.search_point(&[19.0, 19.0]), Some(400));
        assert!(!scan.delete(&[0.0, 0.0]));
    }

    #[test]
    fn lookups_follow_swapped_rows() {
        let mut scan = ScanIndex::new(2);
        scan.insert(vec![1.0, 1.0], 1);
        scan.insert(vec![2.0, 2.0], 2);
        scan.insert(vec![1.0, 1.0], 3);
        scan.insert(vec![-0.0, 3.0], 4);

        assert_eq!(scan.search_point(&[0.0, 3.0]), Some(4));
        assert!(scan.delete(&[1.0, 1.0]));
        assert_eq!(scan.search_point(&[1.0, 1.0]), Some(3));
        assert_eq!(scan.search_point(&[0.0, 3.0]), Some(4));

        assert!(scan.delete(&[0.0, 3.0]));
        assert!(scan.delete(&[1.0, 1.0]));
        assert_eq!(scan.search_point(&[1.0, 1.0]), None);
        assert_eq!(scan.search_point(&[2.0, 2.0]), Some(2));
        assert_eq!(scan.count(), 1);
        assert!(scan.delete(&[2.0, 2.0]));
        assert!(scan.rows_by_key.is_empty());
    }

    #[test]
    fn nan_coordinates_never_match() {
        let mut scan = ScanIndex::new(1);
        scan.insert(vec![f32::NAN], 1);
        assert_eq!(scan.search_point(&[f32::NAN]), None);
        assert!(!scan.delete(&[f32::NAN]));
    }
}
