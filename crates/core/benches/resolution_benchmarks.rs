//! Resolution benchmarks
//!
//! Measures cached and uncached resolution, constructor injection through
//! dependency chains of growing depth, scoped resolution and collections.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chimera_core::container::CollectionBuilder;
use chimera_core::{implements, Constructor, Container, DependencyResolver, Injectable, ServiceDescriptor};

trait Fertilizer: Send + Sync {
    fn potency(&self) -> u32;
}

struct Compost;

impl Fertilizer for Compost {
    fn potency(&self) -> u32 {
        3
    }
}

impl Injectable for Compost {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |()| Ok(Compost))]
    }
}

implements!(Compost => dyn Fertilizer);

struct Mixer {
    fertilizer: Arc<dyn Fertilizer>,
}

impl Injectable for Mixer {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |(fertilizer,): (Arc<dyn Fertilizer>,)| {
            Ok(Mixer { fertilizer })
        })]
    }
}

/// Link of a dependency chain; `Link(n)` depends on `Link(n - 1)` by name
struct Link {
    depth: usize,
}

fn chain_container(length: usize) -> Container {
    let container = Container::new();
    for depth in 0..length {
        let descriptor = ServiceDescriptor::transient::<Link>()
            .named(format!("link-{}", depth))
            .factory(move |resolver| {
                if depth > 0 {
                    let previous = resolver.resolve_named::<Link>(&format!("link-{}", depth - 1))?;
                    black_box(previous.depth);
                }
                Ok(Arc::new(Link { depth }))
            })
            .build()
            .expect("valid descriptor");
        container.add_descriptor(descriptor).expect("registration");
    }
    container
}

fn benchmark_cached_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached_resolution");

    let container = Container::new();
    container.register_singleton::<dyn Fertilizer, Compost>().unwrap();
    container.resolve::<dyn Fertilizer>().unwrap();

    group.bench_function("singleton", |b| {
        b.iter(|| black_box(container.resolve::<dyn Fertilizer>().unwrap().potency()))
    });

    let untracked = Container::builder().track_performance(false).build().unwrap();
    untracked.register_singleton::<dyn Fertilizer, Compost>().unwrap();
    group.bench_function("singleton_untracked", |b| {
        b.iter(|| black_box(untracked.resolve::<dyn Fertilizer>().unwrap().potency()))
    });

    group.finish();
}

fn benchmark_transient_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("transient_resolution");

    let container = Container::new();
    container.register_transient::<dyn Fertilizer, Compost>().unwrap();
    container.register_transient::<Mixer, Mixer>().unwrap();

    group.bench_function("leaf", |b| {
        b.iter(|| black_box(container.resolve::<dyn Fertilizer>().unwrap()))
    });
    group.bench_function("one_dependency", |b| {
        b.iter(|| black_box(container.resolve::<Mixer>().unwrap().fertilizer.potency()))
    });
    group.bench_function("unregistered_injectable", |b| {
        b.iter(|| black_box(container.resolve_injectable::<Compost>().unwrap()))
    });

    group.finish();
}

fn benchmark_dependency_chains(c: &mut Criterion) {
    let mut group = c.benchmark_group("dependency_chains");

    for length in [1usize, 4, 16, 48].iter() {
        let container = chain_container(*length);
        let top = format!("link-{}", length - 1);
        group.bench_with_input(BenchmarkId::new("named_chain", length), length, |b, _| {
            b.iter(|| black_box(container.resolve_named::<Link>(&top).unwrap().depth))
        });
    }

    group.finish();
}

fn benchmark_scoped_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoped_resolution");

    let container = Container::new();
    container.register_scoped::<dyn Fertilizer, Compost>().unwrap();

    group.bench_function("new_scope_per_request", |b| {
        b.iter(|| {
            let scope = container.create_scope().unwrap();
            black_box(scope.resolve::<dyn Fertilizer>().unwrap().potency());
            scope.dispose().unwrap();
        })
    });

    let scope = container.create_scope().unwrap();
    scope.resolve::<dyn Fertilizer>().unwrap();
    group.bench_function("cached_in_scope", |b| {
        b.iter(|| black_box(scope.resolve::<dyn Fertilizer>().unwrap().potency()))
    });

    group.finish();
}

fn benchmark_collections(c: &mut Criterion) {
    let mut group = c.benchmark_group("collections");

    for size in [1usize, 8, 32].iter() {
        let container = Container::new();
        let mut collection = CollectionBuilder::<dyn Fertilizer>::new();
        for _ in 0..*size {
            collection = collection.add::<Compost>();
        }
        container.register_collection(collection).unwrap();

        group.bench_with_input(BenchmarkId::new("resolve_all", size), size, |b, _| {
            b.iter(|| black_box(container.resolve_all::<dyn Fertilizer>().unwrap().len()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_cached_resolution,
    benchmark_transient_resolution,
    benchmark_dependency_chains,
    benchmark_scoped_resolution,
    benchmark_collections
);
criterion_main!(benches);
