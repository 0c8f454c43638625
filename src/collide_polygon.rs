//! Polygon vs Polygon Manifold
//!
//! Separating-axis search over both polygons' face normals, then clipping of
//! the incident edge against the reference face's side planes.
//!
//! The reference face is chosen with a small hysteresis so that a resting
//! box does not flip between reference faces from one step to the next,
//! which would scramble the feature ids used for warm starting.

use crate::collision::{
    clip_segment_to_line, ClipVertex, ContactFeature, FeatureType, Manifold, ManifoldType,
};
use crate::math::Transform;
use crate::polygon::PolygonShape;
use crate::settings::{LINEAR_SLOP, MAX_MANIFOLD_POINTS, POLYGON_RADIUS};

/// Face of `poly1` with the largest separation from `poly2`.
fn find_max_separation(
    poly1: &PolygonShape,
    xf1: &Transform,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> (usize, f32) {
    let n1s = poly1.normals();
    let v1s = poly1.vertices();
    let v2s = poly2.vertices();
    let xf = xf2.mul_inv(xf1);

    let mut best_index = 0;
    let mut max_separation = -f32::MAX;
    for i in 0..v1s.len() {
        // Get poly1 normal in frame2.
        let n = xf.q.apply(n1s[i]);
        let v1 = xf.apply(v1s[i]);

        // Find deepest point for normal i.
        let si = v2s
            .iter()
            .map(|v2| n.dot(*v2 - v1))
            .fold(f32::MAX, f32::min);

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }
    (best_index, max_separation)
}

/// Edge of `poly2` most anti-parallel to reference face `edge1` of `poly1`.
fn find_incident_edge(
    poly1: &PolygonShape,
    xf1: &Transform,
    edge1: usize,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> [ClipVertex; 2] {
    let normals2 = poly2.normals();
    let vertices2 = poly2.vertices();
    let count2 = vertices2.len();

    // Get the normal of the reference edge in poly2's frame.
    let normal1 = xf2.q.apply_inv(xf1.q.apply(poly1.normals()[edge1]));

    // Find the incident edge on poly2.
    let mut index = 0;
    let mut min_dot = f32::MAX;
    for (i, n) in normals2.iter().enumerate() {
        let dot = normal1.dot(*n);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    // Build the clip vertices for the incident edge.
    let i1 = index;
    let i2 = if i1 + 1 < count2 { i1 + 1 } else { 0 };
    let feature = |i: usize| ContactFeature {
        index_a: edge1 as u8,
        index_b: i as u8,
        type_a: FeatureType::Face,
        type_b: FeatureType::Vertex,
    };

    [
        ClipVertex {
            v: xf2.apply(vertices2[i1]),
            id: feature(i1),
        },
        ClipVertex {
            v: xf2.apply(vertices2[i2]),
            id: feature(i2),
        },
    ]
}

/// Manifold between two polygons.
///
/// Finds the edge normal of max separation on A and on B, picks the
/// reference face (favouring A), finds the incident edge and clips it.
#[must_use]
pub fn collide_polygons(
    poly_a: &PolygonShape,
    xf_a: &Transform,
    poly_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();
    let total_radius = 2.0 * POLYGON_RADIUS;

    let (edge_a, separation_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > total_radius {
        return manifold;
    }

    let (edge_b, separation_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > total_radius {
        return manifold;
    }

    const K_TOL: f32 = 0.1 * LINEAR_SLOP;

    let (poly1, poly2, xf1, xf2, edge1, flip) = if separation_b > separation_a + K_TOL {
        manifold.manifold_type = ManifoldType::FaceB;
        (poly_b, poly_a, xf_b, xf_a, edge_b, true)
    } else {
        manifold.manifold_type = ManifoldType::FaceA;
        (poly_a, poly_b, xf_a, xf_b, edge_a, false)
    };

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let vertices1 = poly1.vertices();
    let iv1 = edge1;
    let iv2 = if edge1 + 1 < vertices1.len() { edge1 + 1 } else { 0 };

    let mut v11 = vertices1[iv1];
    let mut v12 = vertices1[iv2];

    let local_tangent = (v12 - v11).normalized();
    let local_normal = local_tangent.cross_scalar(1.0);
    let plane_point = (v11 + v12) * 0.5;

    let tangent = xf1.q.apply(local_tangent);
    let normal = tangent.cross_scalar(1.0);

    v11 = xf1.apply(v11);
    v12 = xf1.apply(v12);

    // Face offset.
    let front_offset = normal.dot(v11);

    // Side offsets, extended by polytope skin thickness.
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    // Clip incident edge against the extruded edge1 side edges.
    let (clip_points1, np) = clip_segment_to_line(&incident_edge, -tangent, side_offset1, iv1);
    if np < MAX_MANIFOLD_POINTS {
        return manifold;
    }

    let (clip_points2, np) = clip_segment_to_line(&clip_points1, tangent, side_offset2, iv2);
    if np < MAX_MANIFOLD_POINTS {
        return manifold;
    }

    // Now clip_points2 contains the clipped points.
    manifold.local_normal = local_normal;
    manifold.local_point = plane_point;

    let mut point_count = 0;
    for clip in &clip_points2 {
        let separation = normal.dot(clip.v) - front_offset;
        if separation <= total_radius {
            let cp = &mut manifold.points[point_count];
            cp.local_point = xf2.apply_inv(clip.v);
            cp.id = if flip { clip.id.swapped() } else { clip.id };
            point_count += 1;
        }
    }
    manifold.point_count = point_count;
    manifold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::WorldManifold;
    use crate::math::Vec2;
    use approx::assert_relative_eq;

    #[test]
    fn test_stacked_boxes_two_points() {
        let a = PolygonShape::new_box(1.0, 1.0).unwrap();
        let b = PolygonShape::new_box(0.5, 0.5).unwrap();
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(0.0, 1.49), 0.0);
        let m = collide_polygons(&a, &xf_a, &b, &xf_b);
        assert_eq!(m.point_count, 2);

        let wm = WorldManifold::new(&m, &xf_a, POLYGON_RADIUS, &xf_b, POLYGON_RADIUS);
        assert_relative_eq!(wm.normal.length(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(wm.normal.y, 1.0, epsilon = 1e-5);
        for s in wm.separations {
            assert!(s < 0.0, "boxes overlap by a centimeter plus skins: {s}");
        }
    }

    #[test]
    fn test_feature_ids_are_stable() {
        let a = PolygonShape::new_box(2.0, 0.5).unwrap();
        let b = PolygonShape::new_box(0.5, 0.5).unwrap();
        let xf_a = Transform::IDENTITY;
        let m1 = collide_polygons(&a, &xf_a, &b, &Transform::new(Vec2::new(0.0, 0.99), 0.0));
        let m2 = collide_polygons(&a, &xf_a, &b, &Transform::new(Vec2::new(0.01, 0.995), 0.0));
        assert_eq!(m1.point_count, 2);
        assert_eq!(m2.point_count, 2);
        assert_eq!(m1.points[0].id.key(), m2.points[0].id.key());
        assert_eq!(m1.points[1].id.key(), m2.points[1].id.key());
    }

    #[test]
    fn test_separated_boxes_no_points() {
        let a = PolygonShape::new_box(1.0, 1.0).unwrap();
        let xf_b = Transform::new(Vec2::new(3.0, 0.0), 0.5);
        assert_eq!(collide_polygons(&a, &Transform::IDENTITY, &a, &xf_b).point_count, 0);
    }

    #[test]
    fn test_rotated_box_vertex_contact() {
        // Diamond resting its corner on a box face.
        let a = PolygonShape::new_box(2.0, 0.5).unwrap();
        let b = PolygonShape::new_box(0.5, 0.5).unwrap();
        let corner = 0.5 * core::f32::consts::SQRT_2;
        let xf_b = Transform::new(Vec2::new(0.0, 0.5 + corner - 0.01), core::f32::consts::FRAC_PI_4);
        let m = collide_polygons(&a, &Transform::IDENTITY, &b, &xf_b);
        assert!(m.point_count >= 1);
        let wm = WorldManifold::new(&m, &Transform::IDENTITY, POLYGON_RADIUS, &xf_b, POLYGON_RADIUS);
        assert!(wm.separations[0] < 0.0);
    }
}
