//! Dataset construction for the five distribution modes.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use mdrq::{Coord, Point};
use rand::{seq::SliceRandom, Rng};
use rand_distr::Normal;
use tracing::{info, warn};

use crate::{
    config::{Distribution, WorkloadConfig, POWER_DIMENSIONS},
    error::LoadError,
};

/// Upper end of the coordinate domain for generated data.
pub const DOMAIN: Coord = 1.0;

/// Sub-range used for uniform data and query corners when a selectivity is given.
pub const SELECTIVE_SPAN: Coord = DOMAIN * 10_000.0 / 1e6;

const NORMAL_MEAN: f32 = 0.5;
const NORMAL_STD_DEV: f32 = 0.5;

/// Builds the dataset for `config` and shuffles it.
///
/// File-backed modes return fewer than `config.points` points when the file
/// runs out of usable rows.
///
/// # Errors
///
/// Fails when a file cannot be read or when no point could be loaded at all.
pub fn load<R: Rng + ?Sized>(config: &WorkloadConfig, rng: &mut R) -> Result<Vec<Point>, LoadError> {
    let n = config.points;
    let m = config.dimensions;
    let mut points = match config.distribution {
        Distribution::Normal => normal(n, m, rng)?,
        Distribution::Uniform => {
            let upper = if config.selectivity.is_some() {
                SELECTIVE_SPAN
            } else {
                DOMAIN
            };
            uniform(n, m, upper, rng)
        }
        Distribution::Clustered => match &config.data_file {
            Some(path) => read_rows(path, n, |line| parse_csv_row(line, m))?,
            None => Vec::new(),
        },
        Distribution::Genomes => read_rows(&config.genomes_file, n, |line| {
            parse_feature_row(line, m)
        })?,
        Distribution::Power => read_rows(&config.power_file, n, parse_power_row)?,
    };

    if points.is_empty() {
        return Err(LoadError::EmptyDataset);
    }
    if points.len() < n {
        info!(requested = n, loaded = points.len(), "dataset truncated to available rows");
    }
    points.shuffle(rng);
    Ok(points)
}

/// Coordinates drawn independently from N(0.5, 0.5).
pub fn normal<R: Rng + ?Sized>(n: usize, m: usize, rng: &mut R) -> Result<Vec<Point>, LoadError> {
    let distribution = Normal::new(NORMAL_MEAN, NORMAL_STD_DEV)?;
    Ok((0..n)
        .map(|_| (0..m).map(|_| rng.sample(distribution)).collect())
        .collect())
}

/// Coordinates drawn independently and uniformly from `[0, upper)`.
pub fn uniform<R: Rng + ?Sized>(n: usize, m: usize, upper: Coord, rng: &mut R) -> Vec<Point> {
    (0..n)
        .map(|_| (0..m).map(|_| rng.gen_range(0.0..upper)).collect())
        .collect()
}

fn read_rows<F>(path: &Path, limit: usize, parse: F) -> Result<Vec<Point>, LoadError>
where
    F: FnMut(&str) -> Option<Point>,
{
    let io_error = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_error)?;
    let (points, skipped) = parse_rows(BufReader::new(file), limit, parse).map_err(io_error)?;
    if skipped > 0 {
        warn!(path = %path.display(), skipped, "skipped unusable rows");
    }
    info!(path = %path.display(), points = points.len(), "loaded dataset");
    Ok(points)
}

/// Reads up to `limit` points, one per non-blank line. Returns the points and
/// the number of lines `parse` rejected.
///
/// # Errors
///
/// Propagates read failures from `reader`.
pub fn parse_rows<R, F>(reader: R, limit: usize, mut parse: F) -> std::io::Result<(Vec<Point>, usize)>
where
    R: BufRead,
    F: FnMut(&str) -> Option<Point>,
{
    let mut points = Vec::new();
    let mut skipped = 0;
    for line in reader.lines() {
        if points.len() == limit {
            break;
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse(&line) {
            Some(point) => points.push(point),
            None => skipped += 1,
        }
    }
    Ok((points, skipped))
}

fn coord(token: &str) -> Option<Coord> {
    token.trim().parse::<Coord>().ok().filter(|v| !v.is_nan())
}

/// First `m` comma-separated fields.
pub fn parse_csv_row(line: &str, m: usize) -> Option<Point> {
    let point: Option<Point> = line.split(',').take(m).map(coord).collect();
    point.filter(|p| p.len() == m)
}

/// First `m` whitespace-separated fields, padded with zeros when the row is short.
pub fn parse_feature_row(line: &str, m: usize) -> Option<Point> {
    let mut point: Point = line
        .split_whitespace()
        .take(m)
        .map(coord)
        .collect::<Option<_>>()?;
    point.resize(m, 0.0);
    Some(point)
}

/// Fields 1 to 3 of a tab-separated row; field 0 is a timestamp.
pub fn parse_power_row(line: &str) -> Option<Point> {
    let point: Option<Point> = line
        .split('\t')
        .skip(1)
        .take(POWER_DIMENSIONS)
        .map(coord)
        .collect();
    point.filter(|p| p.len() == POWER_DIMENSIONS)
}
