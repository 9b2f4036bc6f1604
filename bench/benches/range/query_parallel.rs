use crate::range::build::{build_index, points};
use crate::range::query::query_list;
use crate::range::{query_boxes, THREADS};
use criterion::Criterion;
use mdrq::{IndexKind, Partitioning, WorkerPool};

pub fn benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("query_parallel");
    group.sample_size(10);

    let points = points();
    let boxes = query_boxes();
    let expected = query_list(&points, &boxes);
    let pool = WorkerPool::new(THREADS).expect("Failed to create worker pool");

    for kind in IndexKind::ALL {
        let index = build_index(kind, &points);
        for partitioning in Partitioning::ALL {
            group.bench_function(format!("{kind}/{partitioning}"), |b| {
                b.iter(|| {
                    let found: usize = boxes
                        .iter()
                        .map(|(lower, upper)| {
                            index
                                .search_range_parallel(lower, upper, partitioning, &pool)
                                .len()
                        })
                        .sum();
                    assert_eq!(found, expected);
                });
            });
        }
    }
    group.finish();
}
