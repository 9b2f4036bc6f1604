//! The fixed benchmark sequence: inserts, point queries, serial range
//! queries, partitioned parallel range queries and deletes.

use std::{
    collections::HashMap,
    fmt,
    io::Write,
    time::{Duration, Instant},
};

use mdrq::{coordinate_key, Id, Index, IndexKind, Partitioning, Point, WorkerPool};
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info};

use crate::{
    config::WorkloadConfig,
    dataset,
    error::{BenchResult, CorrectnessViolation},
    queries::{self, BoundingBoxQuery},
    stats::{micros, millis, Summary, Throughput},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Insert,
    PointQuery,
    RangeQuery,
    ParallelRangeQuery(Partitioning),
    Delete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Insert => f.write_str("[inserts]"),
            Phase::PointQuery => f.write_str("[point queries]"),
            Phase::RangeQuery => f.write_str("[range queries]"),
            Phase::ParallelRangeQuery(_) => f.write_str("[range queries/multithreaded]"),
            Phase::Delete => f.write_str("[deletes]"),
        }
    }
}

/// Figures reported for one phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub operations: usize,
    pub summary: Summary,
    pub throughput: Option<Throughput>,
}

/// Drives one index through every phase, writing the report to `out`.
///
/// Operations are issued one at a time from the calling thread; only the
/// parallel range searches fan out onto the pool.
pub struct PhaseRunner<'a, W: Write> {
    index: &'a mut dyn Index,
    pool: &'a WorkerPool,
    out: W,
    verify_ranges: bool,
}

impl<'a, W: Write> PhaseRunner<'a, W> {
    pub fn new(index: &'a mut dyn Index, pool: &'a WorkerPool, out: W) -> Self {
        PhaseRunner {
            index,
            pool,
            out,
            verify_ranges: false,
        }
    }

    /// Also compare every parallel result with the serial one, outside the
    /// timed region.
    #[must_use]
    pub fn verify_ranges(mut self, verify: bool) -> Self {
        self.verify_ranges = verify;
        self
    }

    /// Runs all phases in order and stops at the first wrong answer.
    ///
    /// # Errors
    ///
    /// Returns a correctness violation, or an I/O error from the report writer.
    pub fn run(&mut self, dataset: &[Point], queries: &[BoundingBoxQuery]) -> BenchResult<Vec<PhaseReport>> {
        let mut reports = vec![self.insert(dataset)?, self.point_queries(dataset)?];
        reports.push(self.range_queries(queries)?);
        for partitioning in Partitioning::ALL {
            reports.push(self.parallel_range_queries(queries, partitioning)?);
        }
        reports.push(self.deletes(dataset)?);
        Ok(reports)
    }

    /// Inserts every point with its 1-based position as identifier.
    pub fn insert(&mut self, dataset: &[Point]) -> BenchResult<PhaseReport> {
        self.begin(Phase::Insert)?;
        let mut samples = Vec::with_capacity(dataset.len());
        let started = Instant::now();
        for (id, point) in (1..).zip(dataset) {
            let point = point.clone();
            let t = Instant::now();
            self.index.insert(point, id);
            samples.push(micros(t.elapsed()));
        }
        self.finish(Phase::Insert, &samples, started.elapsed(), None)
    }

    /// Looks up every point and checks the identifier.
    pub fn point_queries(&mut self, dataset: &[Point]) -> BenchResult<PhaseReport> {
        self.begin(Phase::PointQuery)?;
        let expected = first_occurrences(dataset);
        let mut samples = Vec::with_capacity(dataset.len());
        let started = Instant::now();
        for (position, point) in dataset.iter().enumerate() {
            let t = Instant::now();
            let found = self.index.search_point(point);
            samples.push(micros(t.elapsed()));

            let expected = expected[position];
            if found != Some(expected) {
                return Err(CorrectnessViolation::PointQuery {
                    index: self.index.name(),
                    position,
                    expected,
                    found,
                }
                .into());
            }
        }
        self.finish(Phase::PointQuery, &samples, started.elapsed(), None)
    }

    pub fn range_queries(&mut self, queries: &[BoundingBoxQuery]) -> BenchResult<PhaseReport> {
        self.begin(Phase::RangeQuery)?;
        let mut samples = Vec::with_capacity(queries.len());
        let mut total = 0;
        let started = Instant::now();
        for query in queries {
            let t = Instant::now();
            let ids = self.index.search_range(&query.lower, &query.upper);
            samples.push(millis(t.elapsed()));
            total += ids.len();
        }
        let elapsed = started.elapsed();
        debug!(index = self.index.name(), total, "serial range results");
        self.finish(Phase::RangeQuery, &samples, elapsed, None)
    }

    pub fn parallel_range_queries(
        &mut self,
        queries: &[BoundingBoxQuery],
        partitioning: Partitioning,
    ) -> BenchResult<PhaseReport> {
        let phase = Phase::ParallelRangeQuery(partitioning);
        self.begin(phase)?;
        let mut samples = Vec::with_capacity(queries.len());
        let mut total = 0;
        let mut timed = Duration::ZERO;
        for (number, query) in queries.iter().enumerate() {
            let t = Instant::now();
            let ids = self
                .index
                .search_range_parallel(&query.lower, &query.upper, partitioning, self.pool);
            let elapsed = t.elapsed();
            timed += elapsed;
            samples.push(millis(elapsed));
            total += ids.len();

            if self.verify_ranges {
                self.verify(query, number, partitioning, ids)?;
            }
        }
        let throughput = Throughput::new(queries.len(), timed, total);
        self.finish(phase, &samples, timed, Some(throughput))
    }

    /// Deletes every point in dataset order, checking lookup and count first.
    pub fn deletes(&mut self, dataset: &[Point]) -> BenchResult<PhaseReport> {
        self.begin(Phase::Delete)?;
        let name = self.index.name();
        let mut samples = Vec::with_capacity(dataset.len());
        let started = Instant::now();
        for ((position, point), id) in dataset.iter().enumerate().zip(1..) {
            // Earlier duplicates are already gone, so the point's own id is the smallest left.
            let found = self.index.search_point(point);
            if found != Some(id) {
                return Err(CorrectnessViolation::PointQuery {
                    index: name,
                    position,
                    expected: id,
                    found,
                }
                .into());
            }
            let before = self.index.count();

            let t = Instant::now();
            let deleted = self.index.delete(point);
            samples.push(micros(t.elapsed()));

            if !deleted {
                return Err(CorrectnessViolation::DeleteFailed { index: name, position }.into());
            }
            let after = self.index.count();
            if after + 1 != before {
                return Err(CorrectnessViolation::CountMismatch {
                    index: name,
                    position,
                    before,
                    after,
                }
                .into());
            }
        }
        self.finish(Phase::Delete, &samples, started.elapsed(), None)
    }

    fn verify(
        &self,
        query: &BoundingBoxQuery,
        number: usize,
        partitioning: Partitioning,
        mut parallel: Vec<Id>,
    ) -> BenchResult<()> {
        let mut serial = self.index.search_range(&query.lower, &query.upper);
        serial.sort_unstable();
        parallel.sort_unstable();
        if serial == parallel {
            return Ok(());
        }
        Err(CorrectnessViolation::RangeMismatch {
            index: self.index.name(),
            partitioning,
            query: number,
            serial: serial.len(),
            parallel: parallel.len(),
        }
        .into())
    }

    fn begin(&mut self, phase: Phase) -> BenchResult<()> {
        info!(index = self.index.name(), %phase, "starting phase");
        writeln!(self.out, "{} {phase}", self.index.name())?;
        Ok(())
    }

    fn finish(
        &mut self,
        phase: Phase,
        samples: &[f64],
        elapsed: Duration,
        throughput: Option<Throughput>,
    ) -> BenchResult<PhaseReport> {
        let summary = Summary::of(samples);
        writeln!(self.out, "{summary}")?;
        if let (Phase::ParallelRangeQuery(partitioning), Some(t)) = (phase, throughput) {
            writeln!(
                self.out,
                "MDRQ Throughput (multi-threaded/{partitioning}/SIMD): {:.6} ops/s [avg result size: {:.6}].",
                t.ops_per_sec, t.avg_result_size
            )?;
        }
        debug!(index = self.index.name(), %phase, ?elapsed, "phase finished");
        Ok(PhaseReport {
            phase,
            operations: samples.len(),
            summary,
            throughput,
        })
    }
}

// Identifier a point query must return: the first insertion of equal coordinates.
fn first_occurrences(dataset: &[Point]) -> Vec<Id> {
    let mut first: HashMap<Vec<u32>, Id> = HashMap::with_capacity(dataset.len());
    (1..)
        .zip(dataset)
        .map(|(id, point)| *first.entry(coordinate_key(point)).or_insert(id))
        .collect()
}

/// Loads the workload described by `config` and runs every selected index
/// through the phase sequence on the same dataset and queries.
///
/// # Errors
///
/// Stops at the first configuration, input or correctness failure.
pub fn run<W: Write>(config: &WorkloadConfig, out: &mut W) -> BenchResult<Vec<(IndexKind, Vec<PhaseReport>)>> {
    info!(seed = config.seed, "seeding random source");
    let mut rng = StdRng::seed_from_u64(config.seed);

    let dataset = dataset::load(config, &mut rng)?;
    let queries = queries::generate(config, &dataset, &mut rng)?;
    let pool = WorkerPool::new(config.threads)?;
    info!(
        points = dataset.len(),
        dimensions = config.dimensions,
        distribution = %config.distribution,
        threads = pool.threads(),
        "workload ready"
    );

    let mut results = Vec::with_capacity(config.indexes.len());
    for &kind in &config.indexes {
        let mut index = kind.build(config.dimensions);
        let reports = PhaseRunner::new(index.as_mut(), &pool, &mut *out)
            .verify_ranges(config.verify_ranges)
            .run(&dataset, &queries)?;
        results.push((kind, reports));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_expect_their_first_identifier() {
        let dataset = vec![
            vec![1.0, 2.0],
            vec![0.0, 0.0],
            vec![1.0, 2.0],
            vec![-0.0, 0.0],
            vec![3.0, 3.0],
        ];
        assert_eq!(first_occurrences(&dataset), vec![1, 2, 1, 2, 5]);
    }

    #[test]
    fn phase_headers() {
        assert_eq!(Phase::Insert.to_string(), "[inserts]");
        assert_eq!(
            Phase::ParallelRangeQuery(Partitioning::Horizontal).to_string(),
            "[range queries/multithreaded]"
        );
    }
}
