#[macro_use]
extern crate criterion;
extern crate amq_filters;
extern crate core;
extern crate rand;

use amq_filters::{Filter, Fuse8};
use core::convert::TryFrom;
use criterion::{BenchmarkId, Criterion};
use rand::Rng;

const SAMPLE_SIZE: u32 = 500_000;

fn construct(c: &mut Criterion) {
    let mut group = c.benchmark_group("Fuse8");
    let group = group.sample_size(10);

    let mut rng = rand::thread_rng();
    let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();

    group.bench_with_input(
        BenchmarkId::new("try_from", SAMPLE_SIZE),
        &keys,
        |b, keys| {
            b.iter(|| Fuse8::try_from(keys).unwrap());
        },
    );
}

fn contains(c: &mut Criterion) {
    let mut group = c.benchmark_group("Fuse8");

    let mut rng = rand::thread_rng();
    let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();
    let filter = Fuse8::try_from(&keys).unwrap();

    group.bench_function(BenchmarkId::new("contains", SAMPLE_SIZE), |b| {
        let key = rng.gen();
        b.iter(|| filter.contains(&key));
    });
}

fn serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("Fuse8");
    let group = group.sample_size(10);

    let mut rng = rand::thread_rng();
    let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();
    let filter = Fuse8::try_from(&keys).unwrap();
    let mut buf = vec![0u8; filter.serialization_bytes()];

    group.bench_function(BenchmarkId::new("serialize", SAMPLE_SIZE), |b| {
        b.iter(|| filter.serialize(&mut buf).unwrap());
    });
}

criterion_group!(fuse8, construct, contains, serialize);
criterion_main!(fuse8);
