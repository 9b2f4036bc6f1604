use crate::range::{DIMENSION as D, NUM_POINTS};
use criterion::Criterion;
use mdrq::{Index, IndexKind};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rstar::RTree;

pub fn benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("build");
    group.sample_size(10);

    let points = points();
    for kind in IndexKind::ALL {
        group.bench_function(kind.to_string(), |b| {
            b.iter(|| {
                build_index(kind, &points);
            });
        });
    }

    group.bench_function("rstar", |b| {
        b.iter(|| {
            build_rstar(&points);
        });
    });
    group.finish();
}

pub fn points() -> Vec<[f32; D]> {
    let mut rng = StdRng::seed_from_u64(0);
    (0..NUM_POINTS)
        .map(|_| {
            let mut point = [0.0; D];
            for v in &mut point {
                *v = rng.gen_range(0.0..1.0);
            }
            point
        })
        .collect()
}

pub fn build_index(kind: IndexKind, points: &[[f32; D]]) -> Box<dyn Index> {
    let mut index = kind.build(D);
    for (id, point) in (1..).zip(points) {
        index.insert(point.to_vec(), id);
    }
    index
}

pub fn build_rstar(points: &[[f32; D]]) -> RTree<[f32; D]> {
    let mut rstar = RTree::new();
    for point in points {
        rstar.insert(*point);
    }
    rstar
}
