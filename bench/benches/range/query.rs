use crate::range::build::{build_index, build_rstar, points};
use crate::range::{query_boxes, DIMENSION as D};
use criterion::Criterion;
use mdrq::{Index, IndexKind};
use rstar::{Envelope, RTree, SelectionFunction, AABB};

type QueryBox = ([f32; D], [f32; D]);

struct InBox(AABB<[f32; D]>);

impl SelectionFunction<[f32; D]> for InBox {
    fn should_unpack_parent(&self, envelope: &AABB<[f32; D]>) -> bool {
        self.0.intersects(envelope)
    }

    fn should_unpack_leaf(&self, leaf: &[f32; D]) -> bool {
        self.0.contains_point(leaf)
    }
}

pub fn benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("query");
    group.sample_size(10);

    let points = points();
    let boxes = query_boxes();
    let expected = query_list(&points, &boxes);

    for kind in IndexKind::ALL {
        let index = build_index(kind, &points);
        group.bench_function(kind.to_string(), |b| {
            b.iter(|| {
                assert_eq!(query_index(index.as_ref(), &boxes), expected);
            });
        });
    }

    let rstar = build_rstar(&points);
    group.bench_function("rstar", |b| {
        b.iter(|| {
            assert_eq!(query_rstar(&rstar, &boxes), expected);
        });
    });

    group.bench_function("list", |b| {
        b.iter(|| {
            query_list(&points, &boxes);
        });
    });
    group.finish();
}

fn query_index(index: &dyn Index, boxes: &[QueryBox]) -> usize {
    boxes
        .iter()
        .map(|(lower, upper)| index.search_range(lower, upper).len())
        .sum()
}

fn query_rstar(rstar: &RTree<[f32; D]>, boxes: &[QueryBox]) -> usize {
    boxes
        .iter()
        .map(|(lower, upper)| {
            let selection = InBox(AABB::from_corners(*lower, *upper));
            rstar.locate_with_selection_function(selection).count()
        })
        .sum()
}

pub fn query_list(points: &[[f32; D]], boxes: &[QueryBox]) -> usize {
    boxes
        .iter()
        .map(|(lower, upper)| {
            points
                .iter()
                .filter(|p| (0..D).all(|i| lower[i] <= p[i] && p[i] <= upper[i]))
                .count()
        })
        .sum()
}
