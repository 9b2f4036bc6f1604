//! Range-predicate kernels over a single column.
//!
//! Rows are grouped into 64-row blocks and each block produces one `u64` mask
//! word. The inner loop is branch-free over a fixed-size lane array so that the
//! compiler lowers it to packed compares on the target's vector unit.

use crate::Coord;

/// Rows per mask word.
pub const BLOCK: usize = 64;

/// Number of mask words needed to cover `rows` rows.
#[must_use]
pub fn mask_len(rows: usize) -> usize {
    rows.div_ceil(BLOCK)
}

#[inline]
fn block_bits(values: &[Coord], lower: Coord, upper: Coord) -> u64 {
    let mut bits = 0u64;
    for (i, v) in values.iter().enumerate() {
        let hit = (lower <= *v) & (*v <= upper);
        bits |= u64::from(hit) << i;
    }
    bits
}

/// Writes one bit per row of `column` into `mask`: set when
/// `lower <= value <= upper`. `mask` must hold `mask_len(column.len())` words.
pub fn select_range(column: &[Coord], lower: Coord, upper: Coord, mask: &mut [u64]) {
    debug_assert!(mask.len() >= mask_len(column.len()));
    for (word, values) in mask.iter_mut().zip(column.chunks(BLOCK)) {
        *word = block_bits(values, lower, upper);
    }
}

/// Clears the bits of rows whose `column` value falls outside `[lower, upper]`.
/// Blocks that are already empty are skipped.
pub fn refine_range(column: &[Coord], lower: Coord, upper: Coord, mask: &mut [u64]) {
    debug_assert!(mask.len() >= mask_len(column.len()));
    for (word, values) in mask.iter_mut().zip(column.chunks(BLOCK)) {
        if *word != 0 {
            *word &= block_bits(values, lower, upper);
        }
    }
}

/// ANDs `other` into `mask`.
pub fn intersect(mask: &mut [u64], other: &[u64]) {
    for (word, o) in mask.iter_mut().zip(other) {
        *word &= o;
    }
}

/// Calls `f` with the row number of every set bit, in ascending order.
pub fn for_each_set(mask: &[u64], mut f: impl FnMut(usize)) {
    for (w, &word) in mask.iter().enumerate() {
        let mut bits = word;
        while bits != 0 {
            let bit = bits.trailing_zeros() as usize;
            f(w * BLOCK + bit);
            bits &= bits - 1;
        }
    }
}

/// Number of selected rows.
#[must_use]
pub fn count_set(mask: &[u64]) -> usize {
    mask.iter().map(|w| w.count_ones() as usize).sum()
}
