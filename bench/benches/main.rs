use criterion::{criterion_group, criterion_main};
mod range;

criterion_group!(
    benches,
    range::build,
    range::query,
    range::query_parallel
);
criterion_main!(benches);
