//! Edge and Chain Manifolds
//!
//! Edge vs circle and edge vs polygon, with one-sided collision for chain
//! segments. One-sided edges consult their ghost vertices so that a shape
//! sliding across the seam between two segments is pushed by the smooth
//! surface rather than catching on the shared vertex.
//!
//! Chains are handled by collapsing the child segment to an [`EdgeShape`]
//! and reusing the edge routines.

use crate::chain::ChainShape;
use crate::collision::{
    clip_segment_to_line, ClipVertex, ContactFeature, FeatureType, Manifold, ManifoldType,
};
use crate::math::{Transform, Vec2};
use crate::polygon::PolygonShape;
use crate::settings::{MAX_MANIFOLD_POINTS, MAX_POLYGON_VERTICES, POLYGON_RADIUS};
use crate::shape::{CircleShape, EdgeShape};

// ============================================================================
// Edge vs circle
// ============================================================================

/// Manifold between an edge (A) and a circle (B).
///
/// The circle is classified into one of three Voronoi regions of the
/// segment: vertex A, vertex B, or the interior.
#[must_use]
pub fn collide_edge_and_circle(
    edge_a: &EdgeShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // Circle in frame of edge
    let q = xf_a.apply_inv(xf_b.apply(circle_b.center));

    let a = edge_a.vertex1;
    let b = edge_a.vertex2;
    let e = b - a;

    // Normal points to the right for a CCW winding
    let mut n = Vec2::new(e.y, -e.x);
    let offset = n.dot(q - a);

    if edge_a.one_sided && offset < 0.0 {
        return manifold;
    }

    // Barycentric coordinates
    let u = e.dot(b - q);
    let v = e.dot(q - a);

    let radius = POLYGON_RADIUS + circle_b.radius;

    let vertex_hit = |index_a: u8| ContactFeature {
        index_a,
        index_b: 0,
        type_a: FeatureType::Vertex,
        type_b: FeatureType::Vertex,
    };

    // Region A
    if v <= 0.0 {
        let p = a;
        if q.distance_squared(p) > radius * radius {
            return manifold;
        }

        // Is there an edge connected to A?
        if edge_a.one_sided {
            let a1 = edge_a.vertex0;
            let b1 = a;
            let e1 = b1 - a1;
            let u1 = e1.dot(b1 - q);

            // Is the circle in Region AB of the previous edge?
            if u1 > 0.0 {
                return manifold;
            }
        }

        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::Circles;
        manifold.local_normal = Vec2::ZERO;
        manifold.local_point = p;
        manifold.points[0].id = vertex_hit(0);
        manifold.points[0].local_point = circle_b.center;
        return manifold;
    }

    // Region B
    if u <= 0.0 {
        let p = b;
        if q.distance_squared(p) > radius * radius {
            return manifold;
        }

        // Is there an edge connected to B?
        if edge_a.one_sided {
            let b2 = edge_a.vertex3;
            let a2 = b;
            let e2 = b2 - a2;
            let v2 = e2.dot(q - a2);

            // Is the circle in Region AB of the next edge?
            if v2 > 0.0 {
                return manifold;
            }
        }

        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::Circles;
        manifold.local_normal = Vec2::ZERO;
        manifold.local_point = p;
        manifold.points[0].id = vertex_hit(1);
        manifold.points[0].local_point = circle_b.center;
        return manifold;
    }

    // Region AB
    let den = e.length_squared();
    if den <= 0.0 {
        return manifold;
    }
    let p = (a * u + b * v) * (1.0 / den);
    if q.distance_squared(p) > radius * radius {
        return manifold;
    }

    if offset < 0.0 {
        n = -n;
    }
    n.normalize();

    manifold.point_count = 1;
    manifold.manifold_type = ManifoldType::FaceA;
    manifold.local_normal = n;
    manifold.local_point = a;
    manifold.points[0].id = ContactFeature {
        index_a: 0,
        index_b: 0,
        type_a: FeatureType::Face,
        type_b: FeatureType::Vertex,
    };
    manifold.points[0].local_point = circle_b.center;
    manifold
}

// ============================================================================
// Edge vs polygon
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AxisType {
    Unknown,
    EdgeA,
    EdgeB,
}

#[derive(Clone, Copy, Debug)]
struct Axis {
    normal: Vec2,
    axis_type: AxisType,
    index: usize,
    separation: f32,
}

/// Polygon B expressed in the frame of edge A.
struct TempPolygon {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
}

/// Reference face used for clipping.
struct ReferenceFace {
    i1: usize,
    i2: usize,
    v1: Vec2,
    v2: Vec2,
    normal: Vec2,
    side_normal1: Vec2,
    side_offset1: f32,
    side_normal2: Vec2,
    side_offset2: f32,
}

fn compute_edge_separation(polygon_b: &TempPolygon, v1: Vec2, normal1: Vec2) -> Axis {
    let mut axis = Axis {
        normal: Vec2::ZERO,
        axis_type: AxisType::EdgeA,
        index: 0,
        separation: -f32::MAX,
    };

    // Find axis with least overlap (min-max problem)
    for (j, candidate) in [normal1, -normal1].into_iter().enumerate() {
        // Deepest polygon vertex along axis j
        let sj = polygon_b.vertices[..polygon_b.count]
            .iter()
            .map(|v| candidate.dot(*v - v1))
            .fold(f32::MAX, f32::min);

        if sj > axis.separation {
            axis.index = j;
            axis.separation = sj;
            axis.normal = candidate;
        }
    }
    axis
}

fn compute_polygon_separation(polygon_b: &TempPolygon, v1: Vec2, v2: Vec2) -> Axis {
    let mut axis = Axis {
        normal: Vec2::ZERO,
        axis_type: AxisType::Unknown,
        index: 0,
        separation: -f32::MAX,
    };

    for i in 0..polygon_b.count {
        let n = -polygon_b.normals[i];
        let s1 = n.dot(polygon_b.vertices[i] - v1);
        let s2 = n.dot(polygon_b.vertices[i] - v2);
        let s = s1.min(s2);
        if s > axis.separation {
            axis.axis_type = AxisType::EdgeB;
            axis.index = i;
            axis.separation = s;
            axis.normal = n;
        }
    }
    axis
}

/// Manifold between an edge (A) and a polygon (B).
///
/// Separating axes considered: the edge normal (both sides for a two-sided
/// edge) and the polygon's face normals. For one-sided edges the chosen
/// normal is checked against the Gauss map of the neighbouring segments and
/// either admitted, snapped to the edge normal, or the contact is skipped.
#[must_use]
pub fn collide_edge_and_polygon(
    edge_a: &EdgeShape,
    xf_a: &Transform,
    polygon_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    let xf = xf_a.mul_inv(xf_b);

    let centroid_b = xf.apply(polygon_b.centroid);

    let v1 = edge_a.vertex1;
    let v2 = edge_a.vertex2;

    let edge1 = (v2 - v1).normalized();

    // Normal points to the right for a CCW winding
    let normal1 = Vec2::new(edge1.y, -edge1.x);
    let offset1 = normal1.dot(centroid_b - v1);

    if edge_a.one_sided && offset1 < 0.0 {
        return manifold;
    }

    // Get polygon B in frame A
    let mut temp = TempPolygon {
        vertices: [Vec2::ZERO; MAX_POLYGON_VERTICES],
        normals: [Vec2::ZERO; MAX_POLYGON_VERTICES],
        count: polygon_b.count(),
    };
    for (i, (v, n)) in polygon_b
        .vertices()
        .iter()
        .zip(polygon_b.normals())
        .enumerate()
    {
        temp.vertices[i] = xf.apply(*v);
        temp.normals[i] = xf.q.apply(*n);
    }

    let radius = 2.0 * POLYGON_RADIUS;

    let edge_axis = compute_edge_separation(&temp, v1, normal1);
    if edge_axis.separation > radius {
        return manifold;
    }

    let polygon_axis = compute_polygon_separation(&temp, v1, v2);
    if polygon_axis.separation > radius {
        return manifold;
    }

    // Use hysteresis for jitter reduction.
    const K_RELATIVE_TOL: f32 = 0.98;
    const K_ABSOLUTE_TOL: f32 = 0.001;

    let mut primary_axis = if polygon_axis.separation - radius
        > K_RELATIVE_TOL * (edge_axis.separation - radius) + K_ABSOLUTE_TOL
    {
        polygon_axis
    } else {
        edge_axis
    };

    if edge_a.one_sided {
        // Smooth collision across chain seams.
        let edge0 = (v1 - edge_a.vertex0).normalized();
        let normal0 = Vec2::new(edge0.y, -edge0.x);
        let convex1 = edge0.cross(edge1) >= 0.0;

        let edge2 = (edge_a.vertex3 - v2).normalized();
        let normal2 = Vec2::new(edge2.y, -edge2.x);
        let convex2 = edge1.cross(edge2) >= 0.0;

        const SIN_TOL: f32 = 0.1;
        let side1 = primary_axis.normal.dot(edge1) <= 0.0;

        // Check Gauss Map
        if side1 {
            if convex1 {
                if primary_axis.normal.cross(normal0) > SIN_TOL {
                    // Skip region
                    return manifold;
                }
                // Admit region
            } else {
                // Snap region
                primary_axis = edge_axis;
            }
        } else if convex2 {
            if normal2.cross(primary_axis.normal) > SIN_TOL {
                // Skip region
                return manifold;
            }
            // Admit region
        } else {
            // Snap region
            primary_axis = edge_axis;
        }
    }

    let clip_points: [ClipVertex; 2];
    let mut reference: ReferenceFace;
    if primary_axis.axis_type == AxisType::EdgeA {
        manifold.manifold_type = ManifoldType::FaceA;

        // Search for the polygon normal that is most anti-parallel to the edge normal.
        let mut best_index = 0;
        let mut best_value = primary_axis.normal.dot(temp.normals[0]);
        for i in 1..temp.count {
            let value = primary_axis.normal.dot(temp.normals[i]);
            if value < best_value {
                best_value = value;
                best_index = i;
            }
        }

        let i1 = best_index;
        let i2 = if i1 + 1 < temp.count { i1 + 1 } else { 0 };
        let feature = |index_b: usize| ContactFeature {
            index_a: 0,
            index_b: index_b as u8,
            type_a: FeatureType::Face,
            type_b: FeatureType::Vertex,
        };

        clip_points = [
            ClipVertex {
                v: temp.vertices[i1],
                id: feature(i1),
            },
            ClipVertex {
                v: temp.vertices[i2],
                id: feature(i2),
            },
        ];

        reference = ReferenceFace {
            i1: 0,
            i2: 1,
            v1,
            v2,
            normal: primary_axis.normal,
            side_normal1: -edge1,
            side_offset1: 0.0,
            side_normal2: edge1,
            side_offset2: 0.0,
        };
    } else {
        manifold.manifold_type = ManifoldType::FaceB;

        let feature = |index_a: u8| ContactFeature {
            index_a,
            index_b: primary_axis.index as u8,
            type_a: FeatureType::Vertex,
            type_b: FeatureType::Face,
        };

        clip_points = [
            ClipVertex {
                v: v2,
                id: feature(1),
            },
            ClipVertex {
                v: v1,
                id: feature(0),
            },
        ];

        let i1 = primary_axis.index;
        let i2 = if i1 + 1 < temp.count { i1 + 1 } else { 0 };
        let normal = temp.normals[i1];
        // CCW winding
        let side_normal1 = Vec2::new(normal.y, -normal.x);
        reference = ReferenceFace {
            i1,
            i2,
            v1: temp.vertices[i1],
            v2: temp.vertices[i2],
            normal,
            side_normal1,
            side_offset1: 0.0,
            side_normal2: -side_normal1,
            side_offset2: 0.0,
        };
    }

    reference.side_offset1 = reference.side_normal1.dot(reference.v1);
    reference.side_offset2 = reference.side_normal2.dot(reference.v2);

    // Clip incident edge against reference face side planes
    let (clip_points1, np) = clip_segment_to_line(
        &clip_points,
        reference.side_normal1,
        reference.side_offset1,
        reference.i1,
    );
    if np < MAX_MANIFOLD_POINTS {
        return manifold;
    }

    let (clip_points2, np) = clip_segment_to_line(
        &clip_points1,
        reference.side_normal2,
        reference.side_offset2,
        reference.i2,
    );
    if np < MAX_MANIFOLD_POINTS {
        return manifold;
    }

    // Now clip_points2 contains the clipped points.
    if primary_axis.axis_type == AxisType::EdgeA {
        manifold.local_normal = reference.normal;
        manifold.local_point = reference.v1;
    } else {
        manifold.local_normal = polygon_b.normals()[reference.i1];
        manifold.local_point = polygon_b.vertices()[reference.i1];
    }

    let mut point_count = 0;
    for clip in &clip_points2 {
        let separation = reference.normal.dot(clip.v - reference.v1);
        if separation <= radius {
            let cp = &mut manifold.points[point_count];
            if primary_axis.axis_type == AxisType::EdgeA {
                cp.local_point = xf.apply_inv(clip.v);
                cp.id = clip.id;
            } else {
                cp.local_point = clip.v;
                cp.id = clip.id.swapped();
            }
            point_count += 1;
        }
    }
    manifold.point_count = point_count;
    manifold
}

// ============================================================================
// Chains
// ============================================================================

/// Manifold between child `index` of a chain (A) and a circle (B).
#[must_use]
pub fn collide_chain_and_circle(
    chain_a: &ChainShape,
    index: usize,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let edge = chain_a.child_edge(index);
    collide_edge_and_circle(&edge, xf_a, circle_b, xf_b)
}

/// Manifold between child `index` of a chain (A) and a polygon (B).
#[must_use]
pub fn collide_chain_and_polygon(
    chain_a: &ChainShape,
    index: usize,
    xf_a: &Transform,
    polygon_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    let edge = chain_a.child_edge(index);
    collide_edge_and_polygon(&edge, xf_a, polygon_b, xf_b)
}
