//! Pool throughput benchmarks.
//!
//! Measures the cost of incremental group maintenance: component churn with a
//! varying number of interested groups, entity create/destroy cycles through
//! the free list, and a reactive collect pass.
//!
//! Run with: `cargo bench --bench pool_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use reagent_ecs::prelude::*;

// ---------------------------------------------------------------------------
// Benchmark component types
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Position {
    x: f64,
    y: f64,
}
impl Component for Position {}

#[derive(Debug, Default)]
struct Velocity {
    dx: f64,
    dy: f64,
}
impl Component for Velocity {}

#[derive(Debug, Default)]
struct Health(u32);
impl Component for Health {}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Types {
    position: ComponentTypeId,
    velocity: ComponentTypeId,
    health: ComponentTypeId,
}

fn setup_pool(entity_count: usize) -> (Pool, Types, Vec<EntityId>) {
    let mut registry = ComponentRegistry::new();
    let types = Types {
        position: registry.register::<Position>("position").unwrap(),
        velocity: registry.register::<Velocity>("velocity").unwrap(),
        health: registry.register::<Health>("health").unwrap(),
    };
    let config = PoolConfig {
        name: "bench".to_owned(),
        entity_capacity: entity_count,
        ..PoolConfig::default()
    };
    let mut pool = Pool::with_config(registry, config);
    let entities = (0..entity_count)
        .map(|i| {
            let e = pool.create_entity();
            pool.add(e, Position { x: i as f64, y: 0.0 }).unwrap();
            pool.add(e, Health(100)).unwrap();
            e
        })
        .collect();
    (pool, types, entities)
}

/// Register `count` distinct groups that all reference `Velocity`.
fn add_velocity_groups(pool: &mut Pool, t: &Types, count: usize) {
    let matchers = [
        Matcher::all_of([t.velocity]),
        Matcher::all_of([t.position, t.velocity]),
        Matcher::all_of([t.velocity, t.health]),
        Matcher::all_of([t.position, t.velocity, t.health]),
        Matcher::any_of([t.velocity, t.health]),
        Matcher::all_of([t.position]).none_of([t.velocity]),
        Matcher::all_of([t.health]).none_of([t.velocity]),
        Matcher::all_of([t.position]).and_any_of([t.velocity]),
    ];
    for matcher in matchers.iter().take(count) {
        pool.get_group(matcher).unwrap();
    }
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_component_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("component_churn_1k");
    for groups in [0usize, 1, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(groups), &groups, |b, &groups| {
            let (mut pool, types, entities) = setup_pool(1_000);
            add_velocity_groups(&mut pool, &types, groups);
            b.iter(|| {
                for &e in &entities {
                    pool.add(e, Velocity { dx: 1.0, dy: 1.0 }).unwrap();
                }
                for &e in &entities {
                    pool.remove::<Velocity>(e).unwrap();
                }
                black_box(pool.component_pools().total());
            });
        });
    }
    group.finish();
}

fn bench_replace(c: &mut Criterion) {
    c.bench_function("replace_position_1k", |b| {
        let (mut pool, types, entities) = setup_pool(1_000);
        pool.get_group(&Matcher::all_of([types.position])).unwrap();
        b.iter(|| {
            for &e in &entities {
                pool.replace_with(e, |p: &mut Position| p.x += 1.0).unwrap();
            }
        });
    });
}

fn bench_create_destroy(c: &mut Criterion) {
    c.bench_function("create_destroy_1k", |b| {
        let (mut pool, types, _) = setup_pool(0);
        add_velocity_groups(&mut pool, &types, 4);
        let mut batch = Vec::with_capacity(1_000);
        b.iter(|| {
            for _ in 0..1_000 {
                let e = pool.create_entity();
                pool.add(e, Position::default()).unwrap();
                pool.add(e, Velocity::default()).unwrap();
                batch.push(e);
            }
            for e in batch.drain(..) {
                pool.destroy_entity(e).unwrap();
            }
            black_box(pool.reusable_entity_count());
        });
    });
}

fn bench_collect(c: &mut Criterion) {
    c.bench_function("collect_1k", |b| {
        let (mut pool, types, entities) = setup_pool(1_000);
        let group = pool.get_group(&Matcher::all_of([types.health])).unwrap();
        let collector = pool
            .create_collector(&[(group, GroupEvent::Added)])
            .unwrap();
        b.iter(|| {
            for &e in &entities {
                pool.replace(e, Health(50)).unwrap();
            }
            black_box(pool.collect(collector).unwrap().len());
        });
    });
}

fn bench_group_creation(c: &mut Criterion) {
    c.bench_function("group_backfill_10k", |b| {
        let (mut pool, types, _) = setup_pool(10_000);
        b.iter(|| {
            let group = pool
                .get_group(&Matcher::all_of([types.position, types.health]))
                .unwrap();
            black_box(pool.group(group).unwrap().len());
            pool.clear_groups().unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_component_churn,
    bench_replace,
    bench_create_destroy,
    bench_collect,
    bench_group_creation
);
criterion_main!(benches);
