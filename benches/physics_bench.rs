//! Benchmarks for ALICE-Physics2D
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use alice_physics2d::collision::Aabb;
use alice_physics2d::distance::{distance, DistanceInput, DistanceProxy, SimplexCache};
use alice_physics2d::dynamic_bvh::DynamicTree;
use alice_physics2d::*;

const DT: f32 = 1.0 / 60.0;

fn pyramid(rows: usize) -> World {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let ground = world.create_body(&BodyDef::fixed(Vec2::ZERO)).unwrap();
    world
        .create_fixture(ground, &FixtureDef::new(Shape::new_box(80.0, 0.5).unwrap()))
        .unwrap();

    let shape = Shape::new_box(0.5, 0.5).unwrap();
    for row in 0..rows {
        for col in 0..rows - row {
            let x = col as f32 * 1.05 - (rows - row) as f32 * 0.525;
            let y = 1.0 + row as f32;
            let id = world.create_body(&BodyDef::dynamic(Vec2::new(x, y))).unwrap();
            world
                .create_fixture(id, &FixtureDef::new(shape.clone()).with_density(1.0).with_friction(0.6))
                .unwrap();
        }
    }
    world
}

// ============================================================================
// Physics step benchmarks
// ============================================================================

fn bench_physics_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("physics_step");

    for rows in [5usize, 10, 20] {
        group.bench_with_input(BenchmarkId::new("pyramid_60_steps", rows), &rows, |b, &rows| {
            b.iter(|| {
                let mut world = pyramid(rows);
                for _ in 0..60 {
                    world.step(black_box(DT), 8, 3);
                }
                world.contact_count()
            });
        });
    }

    group.bench_function("settled_pyramid_single_step", |b| {
        let mut world = pyramid(20);
        for _ in 0..120 {
            world.step(DT, 8, 3);
        }
        b.iter(|| {
            world.step(black_box(DT), 8, 3);
            world.profile().step
        });
    });

    group.bench_function("bullets_vs_wall", |b| {
        b.iter(|| {
            let mut world = World::new(Vec2::ZERO);
            let wall = world.create_body(&BodyDef::fixed(Vec2::ZERO)).unwrap();
            world
                .create_fixture(
                    wall,
                    &FixtureDef::new(Shape::edge(Vec2::new(-20.0, 0.0), Vec2::new(20.0, 0.0)).unwrap()),
                )
                .unwrap();
            for i in 0..20 {
                let def = BodyDef::dynamic(Vec2::new(i as f32 * 2.0 - 19.0, 1.5))
                    .with_velocity(Vec2::new(0.0, -100.0), 0.0)
                    .with_bullet(true);
                let id = world.create_body(&def).unwrap();
                world
                    .create_fixture(
                        id,
                        &FixtureDef::new(Shape::circle(Vec2::ZERO, 0.1).unwrap()).with_density(1.0),
                    )
                    .unwrap();
            }
            for _ in 0..10 {
                world.step(black_box(DT), 8, 3);
            }
            world.contact_count()
        });
    });

    group.finish();
}

// ============================================================================
// Narrow phase benchmarks
// ============================================================================

fn bench_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("narrow_phase");
    let a = Shape::polygon(&[
        Vec2::new(-1.0, -0.5),
        Vec2::new(1.0, -0.6),
        Vec2::new(1.2, 0.4),
        Vec2::new(0.0, 1.0),
        Vec2::new(-0.9, 0.6),
    ])
    .unwrap();
    let b = Shape::new_box(0.7, 0.7).unwrap();

    group.bench_function("gjk_polygon_polygon", |bench| {
        let input = DistanceInput {
            proxy_a: DistanceProxy::from_shape(&a, 0),
            proxy_b: DistanceProxy::from_shape(&b, 0),
            transform_a: Transform::new(Vec2::ZERO, 0.2),
            transform_b: Transform::new(Vec2::new(3.0, 0.5), 1.1),
            use_radii: true,
        };
        bench.iter(|| {
            let mut cache = SimplexCache::default();
            distance(&mut cache, black_box(&input)).distance
        });
    });

    group.finish();
}

// ============================================================================
// Dynamic tree benchmarks
// ============================================================================

fn bench_tree_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("dynamic_tree");

    let mut tree = DynamicTree::new();
    for i in 0..1000u32 {
        let x = (i % 40) as f32 * 2.5;
        let y = (i / 40) as f32 * 2.5;
        tree.create_proxy(&Aabb::from_center(Vec2::new(x, y), Vec2::new(0.5, 0.5)), i);
    }

    group.bench_function("query_1000_proxies", |b| {
        let probe = Aabb::from_center(Vec2::new(50.0, 30.0), Vec2::new(5.0, 5.0));
        b.iter(|| {
            let mut hits = 0u32;
            tree.query(black_box(&probe), |_| {
                hits += 1;
                true
            });
            hits
        });
    });

    group.bench_function("insert_1000_proxies", |b| {
        b.iter(|| {
            let mut tree = DynamicTree::new();
            for i in 0..1000u32 {
                let x = (i.wrapping_mul(7919) % 997) as f32 * 0.1;
                let y = (i.wrapping_mul(104_729) % 991) as f32 * 0.1;
                tree.create_proxy(&Aabb::from_center(Vec2::new(x, y), Vec2::new(0.3, 0.3)), i);
            }
            tree.height()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_physics_step, bench_distance, bench_tree_query);
criterion_main!(benches);
