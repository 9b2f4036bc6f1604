use mdrq::{Coord, Id, IndexKind, Partitioning, WorkerPool};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn brute_force(points: &[(Id, Vec<Coord>)], lower: &[Coord], upper: &[Coord]) -> Vec<Id> {
    let mut ids: Vec<Id> = points
        .iter()
        .filter(|(_, p)| {
            p.iter()
                .zip(lower.iter().zip(upper))
                .all(|(v, (lo, hi))| lo <= v && v <= hi)
        })
        .map(|(id, _)| *id)
        .collect();
    ids.sort_unstable();
    ids
}

fn random_box(rng: &mut StdRng, dimensions: usize) -> (Vec<Coord>, Vec<Coord>) {
    let mut lower = Vec::with_capacity(dimensions);
    let mut upper = Vec::with_capacity(dimensions);
    for _ in 0..dimensions {
        let a: Coord = rng.gen_range(-100.0..100.0);
        let b: Coord = rng.gen_range(-100.0..100.0);
        lower.push(a.min(b));
        upper.push(a.max(b));
    }
    (lower, upper)
}

#[test]
fn test_random() {
    let dimensions = 3;

    for kind in IndexKind::ALL {
        let mut index = kind.build(dimensions);

        // We will perform some random insertions and deletions
        let num_ops = 1000;
        let deletion_probability = 0.2;

        let mut rng = StdRng::seed_from_u64(0);
        let mut points: Vec<(Id, Vec<Coord>)> = Vec::new();
        let mut next_id = 1;
        for _ in 0..num_ops {
            let should_delete = rng.gen_bool(deletion_probability);
            if should_delete && !points.is_empty() {
                let idx = rng.gen_range(0..points.len());
                let (_, point) = points.swap_remove(idx);
                assert!(index.delete(&point), "{kind}");
            } else {
                let point: Vec<Coord> = (0..dimensions)
                    .map(|_| rng.gen_range(-100.0..100.0))
                    .collect();
                index.insert(point.clone(), next_id);
                points.push((next_id, point));
                next_id += 1;
            }
            assert_eq!(index.count(), points.len(), "{kind}");

            let (lower, upper) = random_box(&mut rng, dimensions);
            let expected = brute_force(&points, &lower, &upper);

            let mut actual = index.search_range(&lower, &upper);
            actual.sort_unstable();
            assert_eq!(expected, actual, "{kind}");
        }

        for (id, point) in &points {
            assert_eq!(index.search_point(point), Some(*id), "{kind}");
        }
    }
}

#[test]
fn parallel_matches_serial() {
    let pool = WorkerPool::new(3).expect("pool");
    let dimensions = 4;
    let mut rng = StdRng::seed_from_u64(7);

    let points: Vec<Vec<Coord>> = (0..5000)
        .map(|_| (0..dimensions).map(|_| rng.gen_range(0.0..1.0)).collect())
        .collect();

    for kind in IndexKind::ALL {
        let mut index = kind.build(dimensions);
        for (i, point) in points.iter().enumerate() {
            index.insert(point.clone(), i as Id + 1);
        }

        for _ in 0..50 {
            let (lower, upper): (Vec<Coord>, Vec<Coord>) = (0..dimensions)
                .map(|_| {
                    let a: Coord = rng.gen_range(0.0..1.0);
                    let b: Coord = rng.gen_range(0.0..1.0);
                    (a.min(b), a.max(b))
                })
                .unzip();

            let mut serial = index.search_range(&lower, &upper);
            serial.sort_unstable();
            for partitioning in Partitioning::ALL {
                let mut parallel = index.search_range_parallel(&lower, &upper, partitioning, &pool);
                parallel.sort_unstable();
                assert_eq!(serial, parallel, "{kind} {partitioning}");
            }
        }
    }
}

#[test]
fn insert_then_delete_everything() {
    let mut rng = StdRng::seed_from_u64(1);
    let points: Vec<Vec<Coord>> = (0..500)
        .map(|_| vec![rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)])
        .collect();

    for kind in IndexKind::ALL {
        let mut index = kind.build(2);
        for (i, point) in points.iter().enumerate() {
            index.insert(point.clone(), i as Id + 1);
        }
        assert_eq!(index.count(), 500, "{kind}");

        for (i, point) in points.iter().enumerate() {
            assert_eq!(index.search_point(point), Some(i as Id + 1), "{kind}");
            assert!(index.delete(point), "{kind}");
        }
        assert_eq!(index.count(), 0, "{kind}");
        assert!(index.search_range(&[0.0, 0.0], &[1.0, 1.0]).is_empty(), "{kind}");
    }
}
