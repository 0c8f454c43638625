//! Circle Manifolds
//!
//! Circle vs circle and polygon vs circle. Both produce at most one point.

use crate::collision::{Manifold, ManifoldType};
use crate::math::{Transform, Vec2, EPSILON};
use crate::polygon::PolygonShape;
use crate::settings::POLYGON_RADIUS;
use crate::shape::CircleShape;

/// Manifold between two circles.
#[must_use]
pub fn collide_circles(
    circle_a: &CircleShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    let p_a = xf_a.apply(circle_a.center);
    let p_b = xf_b.apply(circle_b.center);

    let dist_sqr = p_a.distance_squared(p_b);
    let radius = circle_a.radius + circle_b.radius;
    if dist_sqr > radius * radius {
        return manifold;
    }

    manifold.manifold_type = ManifoldType::Circles;
    manifold.local_point = circle_a.center;
    manifold.local_normal = Vec2::ZERO;
    manifold.point_count = 1;
    manifold.points[0].local_point = circle_b.center;
    manifold
}

/// Manifold between a polygon (A) and a circle (B).
#[must_use]
pub fn collide_polygon_and_circle(
    polygon_a: &PolygonShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // Circle position in the frame of the polygon.
    let c = xf_b.apply(circle_b.center);
    let c_local = xf_a.apply_inv(c);

    // Find the min separating edge.
    let radius = POLYGON_RADIUS + circle_b.radius;
    let vertices = polygon_a.vertices();
    let normals = polygon_a.normals();
    let count = vertices.len();

    let mut normal_index = 0;
    let mut separation = -f32::MAX;
    for i in 0..count {
        let s = normals[i].dot(c_local - vertices[i]);
        if s > radius {
            // Early out.
            return manifold;
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    // Vertices that subtend the incident face.
    let vert_index1 = normal_index;
    let vert_index2 = if vert_index1 + 1 < count { vert_index1 + 1 } else { 0 };
    let v1 = vertices[vert_index1];
    let v2 = vertices[vert_index2];

    // If the center is inside the polygon ...
    if separation < EPSILON {
        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::FaceA;
        manifold.local_normal = normals[normal_index];
        manifold.local_point = (v1 + v2) * 0.5;
        manifold.points[0].local_point = circle_b.center;
        return manifold;
    }

    // Compute barycentric coordinates
    let u1 = (c_local - v1).dot(v2 - v1);
    let u2 = (c_local - v2).dot(v1 - v2);

    let (local_normal, local_point) = if u1 <= 0.0 {
        if c_local.distance_squared(v1) > radius * radius {
            return manifold;
        }
        ((c_local - v1).normalized(), v1)
    } else if u2 <= 0.0 {
        if c_local.distance_squared(v2) > radius * radius {
            return manifold;
        }
        ((c_local - v2).normalized(), v2)
    } else {
        let face_center = (v1 + v2) * 0.5;
        let s = (c_local - face_center).dot(normals[vert_index1]);
        if s > radius {
            return manifold;
        }
        (normals[vert_index1], face_center)
    };

    manifold.point_count = 1;
    manifold.manifold_type = ManifoldType::FaceA;
    manifold.local_normal = local_normal;
    manifold.local_point = local_point;
    manifold.points[0].local_point = circle_b.center;
    manifold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::WorldManifold;
    use approx::assert_relative_eq;

    fn circle(radius: f32) -> CircleShape {
        CircleShape::new(Vec2::ZERO, radius).unwrap()
    }

    #[test]
    fn test_circles_touching_and_apart() {
        let a = circle(1.0);
        let b = circle(0.5);
        let xf_a = Transform::IDENTITY;
        let near = Transform::new(Vec2::new(1.4, 0.0), 0.0);
        let m = collide_circles(&a, &xf_a, &b, &near);
        assert_eq!(m.point_count, 1);

        let wm = WorldManifold::new(&m, &xf_a, a.radius, &near, b.radius);
        assert_relative_eq!(wm.normal.x, 1.0);
        assert_relative_eq!(wm.separations[0], -0.1, epsilon = 1e-5);

        let far = Transform::new(Vec2::new(2.0, 0.0), 0.0);
        assert_eq!(collide_circles(&a, &xf_a, &b, &far).point_count, 0);
    }

    #[test]
    fn test_polygon_circle_face_region() {
        let polygon = PolygonShape::new_box(1.0, 1.0).unwrap();
        let c = circle(0.5);
        let xf_b = Transform::new(Vec2::new(0.0, 1.4), 0.0);
        let m = collide_polygon_and_circle(&polygon, &Transform::IDENTITY, &c, &xf_b);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.manifold_type, ManifoldType::FaceA);
        assert_relative_eq!(m.local_normal.y, 1.0);
    }

    #[test]
    fn test_polygon_circle_vertex_region() {
        let polygon = PolygonShape::new_box(1.0, 1.0).unwrap();
        let c = circle(0.5);
        let xf_b = Transform::new(Vec2::new(1.3, 1.3), 0.0);
        let m = collide_polygon_and_circle(&polygon, &Transform::IDENTITY, &c, &xf_b);
        assert_eq!(m.point_count, 1);
        let n = m.local_normal;
        assert_relative_eq!(n.length(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(n.x, n.y, epsilon = 1e-5);

        let far = Transform::new(Vec2::new(1.5, 1.5), 0.0);
        assert_eq!(
            collide_polygon_and_circle(&polygon, &Transform::IDENTITY, &c, &far).point_count,
            0
        );
    }

    #[test]
    fn test_polygon_circle_deep_center() {
        let polygon = PolygonShape::new_box(1.0, 1.0).unwrap();
        let c = circle(0.25);
        let xf_b = Transform::new(Vec2::new(0.0, 0.9), 0.0);
        let m = collide_polygon_and_circle(&polygon, &Transform::IDENTITY, &c, &xf_b);
        assert_eq!(m.point_count, 1);
        assert_relative_eq!(m.local_normal.y, 1.0);
    }
}
