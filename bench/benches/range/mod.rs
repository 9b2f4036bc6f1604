mod build;
mod query;
mod query_parallel;

// Benchmark parameters:
pub const DIMENSION: usize = 3;
pub const NUM_POINTS: usize = 20000; // Number of points loaded before querying
pub const NUM_QUERIES: usize = 100; // Number of boxes per iteration
pub const SELECTIVITY: f32 = 0.1; // Side length of each query box in the unit cube
pub const THREADS: usize = 4; // Worker pool size for the parallel searches

pub use build::benchmark as build;
pub use query::benchmark as query;
pub use query_parallel::benchmark as query_parallel;

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Query boxes with a fixed side length and uniformly drawn lower corners.
pub fn query_boxes() -> Vec<([f32; DIMENSION], [f32; DIMENSION])> {
    let mut rng = StdRng::seed_from_u64(1);
    (0..NUM_QUERIES)
        .map(|_| {
            let mut lower = [0.0; DIMENSION];
            let mut upper = [0.0; DIMENSION];
            for i in 0..DIMENSION {
                lower[i] = rng.gen_range(0.0..1.0 - SELECTIVITY);
                upper[i] = lower[i] + SELECTIVITY;
            }
            (lower, upper)
        })
        .collect()
}
