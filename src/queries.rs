//! Range-query workloads.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use mdrq::{Coord, Point};
use rand::Rng;
use tracing::{info, warn};

use crate::{
    config::{Distribution, WorkloadConfig},
    dataset::{DOMAIN, SELECTIVE_SPAN},
    error::LoadError,
};

pub const DEFAULT_QUERY_COUNT: usize = 1000;
pub const REDUCED_QUERY_COUNT: usize = 100;
pub const LARGE_DATASET: usize = 1_000_000;

const LOWER_SENTINEL: &str = "min";
const UPPER_SENTINEL: &str = "max";

/// A closed box `[lower, upper]`.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundingBoxQuery {
    pub lower: Vec<Coord>,
    pub upper: Vec<Coord>,
}

impl BoundingBoxQuery {
    /// The box covering every representable point.
    #[must_use]
    pub fn unbounded(dimensions: usize) -> Self {
        BoundingBoxQuery {
            lower: vec![Coord::MIN; dimensions],
            upper: vec![Coord::MAX; dimensions],
        }
    }
}

/// Number of queries per range phase.
#[must_use]
pub fn query_count(config: &WorkloadConfig) -> usize {
    if config.distribution == Distribution::Genomes || config.points > LARGE_DATASET {
        REDUCED_QUERY_COUNT
    } else {
        DEFAULT_QUERY_COUNT
    }
}

/// Builds the query batch for `config`.
///
/// # Errors
///
/// Fails only for file-sourced queries, when the file cannot be read or holds
/// a bound that is neither a number nor a sentinel.
pub fn generate<R: Rng + ?Sized>(
    config: &WorkloadConfig,
    dataset: &[Point],
    rng: &mut R,
) -> Result<Vec<BoundingBoxQuery>, LoadError> {
    let count = query_count(config);
    let queries = match (config.distribution, config.selectivity, &config.query_file) {
        (Distribution::Genomes, _, Some(path)) => read_queries(path, config.dimensions, count)?,
        (Distribution::Uniform, Some(selectivity), _) => {
            with_selectivity(count, config.dimensions, selectivity, rng)
        }
        _ => derived(dataset, config.dimensions, count, rng),
    };
    info!(queries = queries.len(), "generated range queries");
    Ok(queries)
}

/// Each query is the bounding box of two points sampled from `dataset`.
pub fn derived<R: Rng + ?Sized>(
    dataset: &[Point],
    dimensions: usize,
    count: usize,
    rng: &mut R,
) -> Vec<BoundingBoxQuery> {
    if dataset.is_empty() {
        return Vec::new();
    }
    (0..count)
        .map(|_| {
            let mut query = BoundingBoxQuery::unbounded(dimensions);
            let a = &dataset[rng.gen_range(0..dataset.len())];
            let b = &dataset[rng.gen_range(0..dataset.len())];
            for (d, (x, y)) in a.iter().zip(b).enumerate().take(dimensions) {
                query.lower[d] = x.min(*y);
                query.upper[d] = x.max(*y);
            }
            query
        })
        .collect()
}

/// Queries of a fixed width `DOMAIN * selectivity` in every dimension.
///
/// Lower corners are drawn from a grid in `[0, SELECTIVE_SPAN)` on which
/// `upper - lower` equals the width exactly.
pub fn with_selectivity<R: Rng + ?Sized>(
    count: usize,
    dimensions: usize,
    selectivity: f32,
    rng: &mut R,
) -> Vec<BoundingBoxQuery> {
    let width = DOMAIN * selectivity;
    let grid = CornerGrid::new(width, SELECTIVE_SPAN);
    if let Some(grid) = &grid {
        if grid.reach() < f64::from(SELECTIVE_SPAN) {
            warn!(
                width,
                reach = grid.reach(),
                "query corners narrowed so that every query keeps its exact width"
            );
        }
    }
    (0..count)
        .map(|_| {
            let lower: Vec<Coord> = (0..dimensions)
                .map(|_| match &grid {
                    Some(grid) => grid.sample(rng),
                    None => rng.gen_range(0.0..SELECTIVE_SPAN),
                })
                .collect();
            let upper = lower.iter().map(|lo| lo + width).collect();
            BoundingBoxQuery { lower, upper }
        })
        .collect()
}

/// Corners `k * step` for `k` in `0..points`.
///
/// Every multiple of `step` up to `2^24 * step` is a representable `Coord`.
/// `step` divides the width and corners stay below that bound minus the
/// width, which makes both `lower + width` and `upper - lower` exact.
struct CornerGrid {
    step: f64,
    points: u32,
}

impl CornerGrid {
    const SIGNIFICAND_BITS: i32 = 24;

    fn new(width: Coord, span: Coord) -> Option<Self> {
        if !(width.is_finite() && width > 0.0 && span > 0.0) {
            return None;
        }
        let bits = width.to_bits();
        let biased = (bits >> 23) & 0xff;
        let fraction = bits & 0x007f_ffff;
        let (significand, exponent) = if biased == 0 {
            (fraction, -149)
        } else {
            (fraction | 0x0080_0000, biased as i32 - 150)
        };
        let lowest_bit = exponent + significand.trailing_zeros() as i32;

        // Spacing of `Coord` values around the largest upper bound.
        let top = f64::from(span) + f64::from(width);
        let spacing = top.log2().floor() as i32 - (Self::SIGNIFICAND_BITS - 1);

        let step = 2f64.powi(lowest_bit.min(spacing));
        let limit = step * 2f64.powi(Self::SIGNIFICAND_BITS);
        let reach = f64::from(span).min(limit - f64::from(width));
        let points = (reach / step).ceil().clamp(1.0, 2f64.powi(Self::SIGNIFICAND_BITS)) as u32;
        Some(CornerGrid { step, points })
    }

    fn reach(&self) -> f64 {
        f64::from(self.points) * self.step
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Coord {
        let k = rng.gen_range(0..self.points);
        (f64::from(k) * self.step) as Coord
    }
}

fn read_queries(path: &Path, dimensions: usize, count: usize) -> Result<Vec<BoundingBoxQuery>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_queries(BufReader::new(file), path, dimensions, count)
}

/// Reads up to `count` queries, each as a line of lower bounds followed by a
/// line of upper bounds. `min` and `max` mean unbounded; bounds a line does
/// not supply stay unbounded.
///
/// # Errors
///
/// Fails on read errors and on tokens that are neither numbers nor sentinels.
pub fn parse_queries<R: BufRead>(
    reader: R,
    path: &Path,
    dimensions: usize,
    count: usize,
) -> Result<Vec<BoundingBoxQuery>, LoadError> {
    let mut lines = reader.lines().enumerate();
    let mut queries = Vec::with_capacity(count);
    while queries.len() < count {
        let Some((number, line)) = lines.next() else {
            break;
        };
        let line = line.map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut query = BoundingBoxQuery::unbounded(dimensions);
        parse_bounds(&line, &mut query.lower, path, number + 1)?;
        if let Some((number, line)) = lines.next() {
            let line = line.map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            parse_bounds(&line, &mut query.upper, path, number + 1)?;
        }
        queries.push(query);
    }
    Ok(queries)
}

fn parse_bounds(line: &str, bounds: &mut [Coord], path: &Path, line_number: usize) -> Result<(), LoadError> {
    for (bound, token) in bounds.iter_mut().zip(line.split_whitespace()) {
        *bound = match token {
            LOWER_SENTINEL => Coord::MIN,
            UPPER_SENTINEL => Coord::MAX,
            _ => token
                .parse::<Coord>()
                .ok()
                .filter(|v| !v.is_nan())
                .ok_or_else(|| LoadError::QueryBound {
                    path: path.to_path_buf(),
                    line: line_number,
                    token: token.to_string(),
                })?,
        };
    }
    Ok(())
}
