use alice_physics2d::collision::Aabb;
use alice_physics2d::distance::{distance, DistanceInput, DistanceProxy, SimplexCache};
use alice_physics2d::dynamic_bvh::DynamicTree;
use alice_physics2d::*;
use proptest::prelude::*;

fn coord() -> impl Strategy<Value = f32> {
    -50.0f32..50.0
}

#[derive(Clone, Debug)]
enum TreeOp {
    Insert(f32, f32, f32, f32),
    Move(usize, f32, f32),
    Remove(usize),
}

fn tree_op() -> impl Strategy<Value = TreeOp> {
    prop_oneof![
        (coord(), coord(), 0.1f32..5.0, 0.1f32..5.0).prop_map(|(x, y, w, h)| TreeOp::Insert(x, y, w, h)),
        (any::<usize>(), -3.0f32..3.0, -3.0f32..3.0).prop_map(|(i, dx, dy)| TreeOp::Move(i, dx, dy)),
        any::<usize>().prop_map(TreeOp::Remove),
    ]
}

proptest! {
    #[test]
    fn tree_stays_valid_under_random_edits(ops in prop::collection::vec(tree_op(), 1..200)) {
        let mut tree = DynamicTree::new();
        let mut live: Vec<(u32, Aabb)> = Vec::new();

        for op in ops {
            match op {
                TreeOp::Insert(x, y, w, h) => {
                    let aabb = Aabb::from_center(Vec2::new(x, y), Vec2::new(w, h));
                    let id = tree.create_proxy(&aabb, live.len());
                    live.push((id, aabb));
                }
                TreeOp::Move(i, dx, dy) if !live.is_empty() => {
                    let slot = i % live.len();
                    let (id, aabb) = live[slot];
                    let d = Vec2::new(dx, dy);
                    let moved = Aabb::new(aabb.lower + d, aabb.upper + d);
                    tree.move_proxy(id, &moved, d);
                    live[slot].1 = moved;
                }
                TreeOp::Remove(i) if !live.is_empty() => {
                    let (id, _) = live.swap_remove(i % live.len());
                    tree.destroy_proxy(id);
                }
                _ => {}
            }
            prop_assert!(tree.validate());
        }

        prop_assert_eq!(tree.proxy_count(), live.len());
        // Every live proxy's fat AABB still covers its tight AABB.
        for (id, aabb) in &live {
            prop_assert!(tree.fat_aabb(*id).contains(aabb));
        }
    }

    #[test]
    fn collinear_points_never_make_a_polygon(
        start in -20i32..20,
        step in 1i32..5,
        slope in -3i32..3,
        count in 3i32..8,
    ) {
        // Integer lattice points keep the cross products exact.
        let points: Vec<Vec2> = (0..count)
            .map(|i| {
                let x = start + i * step;
                Vec2::new(x as f32, (slope * x) as f32)
            })
            .collect();
        prop_assert!(Shape::polygon(&points).is_err());
    }

    #[test]
    fn swapped_outline_corners_are_rejected(
        sides in 4usize..=8,
        radius in 0.5f32..10.0,
        phase in -3.1f32..3.1,
        clockwise in any::<bool>(),
    ) {
        let mut points: Vec<Vec2> = (0..sides)
            .map(|i| {
                let a = phase + i as f32 * core::f32::consts::TAU / sides as f32;
                Vec2::new(radius * a.cos(), radius * a.sin())
            })
            .collect();
        if clockwise {
            points.reverse();
        }
        prop_assert!(Shape::polygon(&points).is_ok());

        // Swapping two neighbours makes the outline cross itself.
        points.swap(0, 1);
        prop_assert!(Shape::polygon(&points).is_err());
    }

    #[test]
    fn circle_distance_matches_euclidean(
        ax in coord(), ay in coord(), ra in 0.05f32..3.0,
        bx in coord(), by in coord(), rb in 0.05f32..3.0,
    ) {
        let a = Shape::circle(Vec2::ZERO, ra).unwrap();
        let b = Shape::circle(Vec2::ZERO, rb).unwrap();
        let mut cache = SimplexCache::default();
        let output = distance(&mut cache, &DistanceInput {
            proxy_a: DistanceProxy::from_shape(&a, 0),
            proxy_b: DistanceProxy::from_shape(&b, 0),
            transform_a: Transform::new(Vec2::new(ax, ay), 0.0),
            transform_b: Transform::new(Vec2::new(bx, by), 0.0),
            use_radii: true,
        });

        let expected = (Vec2::new(ax, ay).distance(Vec2::new(bx, by)) - ra - rb).max(0.0);
        prop_assert!(output.distance >= 0.0);
        prop_assert!((output.distance - expected).abs() < 1e-3,
            "distance {} expected {}", output.distance, expected);
    }

    #[test]
    fn box_distance_is_symmetric(
        dx in 2.5f32..20.0, dy in -10.0f32..10.0, angle in -3.1f32..3.1,
    ) {
        let shape = Shape::new_box(1.0, 0.5).unwrap();
        let xf_a = Transform::new(Vec2::ZERO, 0.0);
        let xf_b = Transform::new(Vec2::new(dx, dy), angle);
        let query = |xf_a: Transform, xf_b: Transform| {
            distance(&mut SimplexCache::default(), &DistanceInput {
                proxy_a: DistanceProxy::from_shape(&shape, 0),
                proxy_b: DistanceProxy::from_shape(&shape, 0),
                transform_a: xf_a,
                transform_b: xf_b,
                use_radii: true,
            })
            .distance
        };
        let ab = query(xf_a, xf_b);
        let ba = query(xf_b, xf_a);
        prop_assert!(ab > 0.0);
        prop_assert!((ab - ba).abs() < 1e-3);
    }

    #[test]
    fn random_worlds_stay_finite(
        bodies in prop::collection::vec((coord(), 1.0f32..30.0, -2.0f32..2.0, any::<bool>()), 1..24),
    ) {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        let ground = world.create_body(&BodyDef::fixed(Vec2::ZERO)).unwrap();
        world.create_fixture(ground, &FixtureDef::new(Shape::new_box(60.0, 0.5).unwrap())).unwrap();

        for (x, y, angle, round) in bodies {
            let id = world.create_body(&BodyDef::dynamic(Vec2::new(x, y)).with_angle(angle)).unwrap();
            let shape = if round {
                Shape::circle(Vec2::ZERO, 0.5).unwrap()
            } else {
                Shape::new_box(0.6, 0.3).unwrap()
            };
            world.create_fixture(id, &FixtureDef::new(shape).with_density(1.0)).unwrap();
        }

        for _ in 0..60 {
            world.step(1.0 / 60.0, 8, 3);
        }

        for (_, body) in world.bodies() {
            prop_assert!(body.position().is_valid());
            prop_assert!(body.angle().is_finite());
            prop_assert!(body.linear_velocity().is_valid());
            // Nothing falls through the ground slab.
            prop_assert!(body.position().y > -0.5);
        }
    }
}
