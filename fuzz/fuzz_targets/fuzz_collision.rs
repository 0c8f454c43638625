#![no_main]
use alice_physics2d::collide_polygon::collide_polygons;
use alice_physics2d::distance::{distance, DistanceInput, DistanceProxy, SimplexCache};
use alice_physics2d::polygon::PolygonShape;
use alice_physics2d::{Shape, Transform, Vec2};
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct CollisionInput {
    /// Hull candidates for the two polygons
    points_a: Vec<(i8, i8)>,
    points_b: Vec<(i8, i8)>,
    /// Placement of the second polygon
    x: i8,
    y: i8,
    angle: i8,
}

fn hull(points: &[(i8, i8)]) -> Option<PolygonShape> {
    let points: Vec<Vec2> = points
        .iter()
        .map(|&(x, y)| Vec2::new(f32::from(x) * 0.05, f32::from(y) * 0.05))
        .collect();
    PolygonShape::new(&points).ok()
}

// Fuzz the narrow phase with arbitrary convex hulls in arbitrary poses.
// Must never panic, and results must stay finite.
fuzz_target!(|input: CollisionInput| {
    let (Some(a), Some(b)) = (hull(&input.points_a), hull(&input.points_b)) else {
        return;
    };
    let xf_a = Transform::new(Vec2::ZERO, 0.0);
    let xf_b = Transform::new(
        Vec2::new(f32::from(input.x) * 0.05, f32::from(input.y) * 0.05),
        f32::from(input.angle) * 0.05,
    );

    let manifold = collide_polygons(&a, &xf_a, &b, &xf_b);
    for point in manifold.points() {
        assert!(point.local_point.is_valid());
    }

    let shape_a = Shape::from(a);
    let shape_b = Shape::from(b);
    let output = distance(
        &mut SimplexCache::default(),
        &DistanceInput {
            proxy_a: DistanceProxy::from_shape(&shape_a, 0),
            proxy_b: DistanceProxy::from_shape(&shape_b, 0),
            transform_a: xf_a,
            transform_b: xf_b,
            use_radii: true,
        },
    );
    assert!(output.distance.is_finite() && output.distance >= 0.0);
});
