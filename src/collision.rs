//! Collision Types Shared by the Broad and Narrow Phase
//!
//! - `Aabb`: axis-aligned bounding box with ray casting
//! - `ContactFeature`: compact id of the vertex/face pair behind a contact point
//! - `Manifold`: up to two contact points in local coordinates
//! - `WorldManifold`: the same manifold evaluated in world space
//! - Segment clipping used by the polygon and edge collide routines

use crate::distance::{distance, DistanceInput, DistanceProxy, SimplexCache};
use crate::math::{Transform, Vec2, EPSILON};
use crate::settings::MAX_MANIFOLD_POINTS;
use crate::shape::Shape;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Ray casting
// ============================================================================

/// Ray from `p1` toward `p2`, clipped at `p1 + max_fraction * (p2 - p1)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayCastInput {
    /// Ray origin
    pub p1: Vec2,
    /// Point defining the ray direction and length
    pub p2: Vec2,
    /// Fraction of `p2 - p1` the ray extends to
    pub max_fraction: f32,
}

/// Ray hit: surface normal and hit fraction along the input ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayCastOutput {
    /// Surface normal at the hit point
    pub normal: Vec2,
    /// Hit point is `p1 + fraction * (p2 - p1)`
    pub fraction: f32,
}

// ============================================================================
// Aabb
// ============================================================================

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Lower vertex
    pub lower: Vec2,
    /// Upper vertex
    pub upper: Vec2,
}

impl Aabb {
    /// Create from corners.
    #[inline]
    #[must_use]
    pub const fn new(lower: Vec2, upper: Vec2) -> Self {
        Self { lower, upper }
    }

    /// Box centered on `center` with the given half extents.
    #[inline]
    #[must_use]
    pub fn from_center(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            lower: center - half_extents,
            upper: center + half_extents,
        }
    }

    /// Lower bound not above upper bound and both finite.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let d = self.upper - self.lower;
        d.x >= 0.0 && d.y >= 0.0 && self.lower.is_valid() && self.upper.is_valid()
    }

    /// Center point.
    #[inline]
    #[must_use]
    pub fn center(&self) -> Vec2 {
        (self.lower + self.upper) * 0.5
    }

    /// Half extents.
    #[inline]
    #[must_use]
    pub fn extents(&self) -> Vec2 {
        (self.upper - self.lower) * 0.5
    }

    /// Perimeter, used as the tree's surface-area heuristic.
    #[inline]
    #[must_use]
    pub fn perimeter(&self) -> f32 {
        2.0 * ((self.upper.x - self.lower.x) + (self.upper.y - self.lower.y))
    }

    /// Smallest box containing both.
    #[inline]
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            lower: self.lower.min(other.lower),
            upper: self.upper.max(other.upper),
        }
    }

    /// Grow uniformly by `margin` on every side.
    #[inline]
    #[must_use]
    pub fn fattened(&self, margin: f32) -> Self {
        let r = Vec2::new(margin, margin);
        Self {
            lower: self.lower - r,
            upper: self.upper + r,
        }
    }

    /// Whether `other` lies entirely inside this box.
    #[inline]
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.lower.x <= other.lower.x
            && self.lower.y <= other.lower.y
            && other.upper.x <= self.upper.x
            && other.upper.y <= self.upper.y
    }

    /// Overlap test (touching counts as overlapping).
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let d1 = other.lower - self.upper;
        let d2 = self.lower - other.upper;
        !(d1.x > 0.0 || d1.y > 0.0 || d2.x > 0.0 || d2.y > 0.0)
    }

    /// Slab ray cast. Rays starting inside the box report no hit.
    #[must_use]
    pub fn ray_cast(&self, input: &RayCastInput) -> Option<RayCastOutput> {
        let mut tmin = -f32::MAX;
        let mut tmax = f32::MAX;

        let p = input.p1;
        let d = input.p2 - input.p1;
        let abs_d = d.abs();
        let mut normal = Vec2::ZERO;

        let axes = [
            (p.x, d.x, abs_d.x, self.lower.x, self.upper.x, Vec2::UNIT_X),
            (p.y, d.y, abs_d.y, self.lower.y, self.upper.y, Vec2::UNIT_Y),
        ];
        for (p_i, d_i, abs_d_i, lower, upper, axis) in axes {
            if abs_d_i < EPSILON {
                // Parallel.
                if p_i < lower || upper < p_i {
                    return None;
                }
            } else {
                let inv_d = 1.0 / d_i;
                let mut t1 = (lower - p_i) * inv_d;
                let mut t2 = (upper - p_i) * inv_d;

                // Sign of the normal vector.
                let mut s = -1.0;
                if t1 > t2 {
                    core::mem::swap(&mut t1, &mut t2);
                    s = 1.0;
                }

                if t1 > tmin {
                    normal = axis * s;
                    tmin = t1;
                }
                tmax = tmax.min(t2);
                if tmin > tmax {
                    return None;
                }
            }
        }

        if tmin < 0.0 || input.max_fraction < tmin {
            return None;
        }

        Some(RayCastOutput {
            normal,
            fraction: tmin,
        })
    }
}

// ============================================================================
// Contact features
// ============================================================================

/// Kind of feature on one shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FeatureType {
    /// A vertex
    #[default]
    Vertex = 0,
    /// A face (edge of a polygon)
    Face = 1,
}

/// The features that intersect to form a contact point.
///
/// Fits in four bytes so ids stay valid and comparable across steps no
/// matter how the arenas are mutated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ContactFeature {
    /// Feature index on shape A
    pub index_a: u8,
    /// Feature index on shape B
    pub index_b: u8,
    /// Feature type on shape A
    pub type_a: FeatureType,
    /// Feature type on shape B
    pub type_b: FeatureType,
}

impl ContactFeature {
    /// Packed key used for matching points between steps.
    #[inline]
    #[must_use]
    pub fn key(self) -> u32 {
        u32::from(self.index_a)
            | (u32::from(self.index_b) << 8)
            | ((self.type_a as u32) << 16)
            | ((self.type_b as u32) << 24)
    }

    /// Same features seen from the other shape.
    #[inline]
    #[must_use]
    pub fn swapped(self) -> Self {
        Self {
            index_a: self.index_b,
            index_b: self.index_a,
            type_a: self.type_b,
            type_b: self.type_a,
        }
    }
}

// ============================================================================
// Manifold
// ============================================================================

/// One contact point of a manifold.
///
/// The local point's meaning depends on the manifold type:
/// - `Circles`: local center of circle B
/// - `FaceA`: local center of circle B or clip point of polygon B
/// - `FaceB`: clip point of polygon A
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ManifoldPoint {
    /// Usage depends on manifold type
    pub local_point: Vec2,
    /// Accumulated non-penetration impulse
    pub normal_impulse: f32,
    /// Accumulated friction impulse
    pub tangent_impulse: f32,
    /// Feature pair that produced the point
    pub id: ContactFeature,
}

/// How a manifold's local normal and point are interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ManifoldType {
    /// Point-to-point (circle centers or vertices)
    #[default]
    Circles,
    /// Reference face on shape A
    FaceA,
    /// Reference face on shape B
    FaceB,
}

/// Contact manifold between two shapes, in local coordinates so it stays
/// valid for warm starting while the bodies move.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Manifold {
    /// Contact points; only the first `point_count` are meaningful
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    /// Not used for `Circles`
    pub local_normal: Vec2,
    /// Usage depends on manifold type
    pub local_point: Vec2,
    /// Interpretation of the fields above
    pub manifold_type: ManifoldType,
    /// Number of valid points
    pub point_count: usize,
}

impl Manifold {
    /// Active points.
    #[inline]
    #[must_use]
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }
}

/// Manifold evaluated in world coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WorldManifold {
    /// World normal pointing from A to B
    pub normal: Vec2,
    /// World contact points (midway between the two surfaces)
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// Negative when overlapping (meters)
    pub separations: [f32; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    /// Evaluate a local manifold with the current transforms and radii.
    #[must_use]
    pub fn new(
        manifold: &Manifold,
        xf_a: &Transform,
        radius_a: f32,
        xf_b: &Transform,
        radius_b: f32,
    ) -> Self {
        let mut out = Self::default();
        if manifold.point_count == 0 {
            return out;
        }

        match manifold.manifold_type {
            ManifoldType::Circles => {
                let mut normal = Vec2::UNIT_X;
                let point_a = xf_a.apply(manifold.local_point);
                let point_b = xf_b.apply(manifold.points[0].local_point);
                if point_a.distance_squared(point_b) > EPSILON * EPSILON {
                    normal = (point_b - point_a).normalized();
                }

                let c_a = point_a + normal * radius_a;
                let c_b = point_b - normal * radius_b;
                out.normal = normal;
                out.points[0] = (c_a + c_b) * 0.5;
                out.separations[0] = (c_b - c_a).dot(normal);
            }
            ManifoldType::FaceA => {
                let normal = xf_a.q.apply(manifold.local_normal);
                let plane_point = xf_a.apply(manifold.local_point);

                for i in 0..manifold.point_count {
                    let clip_point = xf_b.apply(manifold.points[i].local_point);
                    let c_a = clip_point
                        + normal * (radius_a - (clip_point - plane_point).dot(normal));
                    let c_b = clip_point - normal * radius_b;
                    out.points[i] = (c_a + c_b) * 0.5;
                    out.separations[i] = (c_b - c_a).dot(normal);
                }
                out.normal = normal;
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q.apply(manifold.local_normal);
                let plane_point = xf_b.apply(manifold.local_point);

                for i in 0..manifold.point_count {
                    let clip_point = xf_a.apply(manifold.points[i].local_point);
                    let c_b = clip_point
                        + normal * (radius_b - (clip_point - plane_point).dot(normal));
                    let c_a = clip_point - normal * radius_a;
                    out.points[i] = (c_a + c_b) * 0.5;
                    out.separations[i] = (c_a - c_b).dot(normal);
                }
                // Ensure normal points from A to B.
                out.normal = -normal;
            }
        }
        out
    }
}

/// State of a contact point between two consecutive manifolds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PointState {
    /// Point does not exist
    #[default]
    Null,
    /// Point was added in the update
    Add,
    /// Point persisted across the update
    Persist,
    /// Point was removed in the update
    Remove,
}

/// Compare two manifolds by feature id.
///
/// Returns the state of each point of `manifold1` (persist or remove) and of
/// each point of `manifold2` (add or persist).
#[must_use]
pub fn point_states(
    manifold1: &Manifold,
    manifold2: &Manifold,
) -> (
    [PointState; MAX_MANIFOLD_POINTS],
    [PointState; MAX_MANIFOLD_POINTS],
) {
    let mut state1 = [PointState::Null; MAX_MANIFOLD_POINTS];
    let mut state2 = [PointState::Null; MAX_MANIFOLD_POINTS];

    for (i, p1) in manifold1.points().iter().enumerate() {
        state1[i] = if manifold2.points().iter().any(|p2| p2.id.key() == p1.id.key()) {
            PointState::Persist
        } else {
            PointState::Remove
        };
    }

    for (i, p2) in manifold2.points().iter().enumerate() {
        state2[i] = if manifold1.points().iter().any(|p1| p1.id.key() == p2.id.key()) {
            PointState::Persist
        } else {
            PointState::Add
        };
    }

    (state1, state2)
}

// ============================================================================
// Clipping
// ============================================================================

/// Vertex used while clipping an incident edge.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClipVertex {
    /// Position
    pub v: Vec2,
    /// Feature id carried to the manifold point
    pub id: ContactFeature,
}

/// Sutherland-Hodgman clip of a segment against the half plane
/// `dot(normal, x) - offset <= 0`.
///
/// Returns the surviving vertices and their count (0, 1 or 2). A new vertex
/// created on the plane records `vertex_index_a` as the clipping feature.
#[must_use]
pub fn clip_segment_to_line(
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    vertex_index_a: usize,
) -> ([ClipVertex; 2], usize) {
    let mut v_out = [ClipVertex::default(); 2];
    let mut count = 0;

    // Distances of the end points to the line.
    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    // Points behind the plane survive.
    if distance0 <= 0.0 {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        v_out[count] = v_in[1];
        count += 1;
    }

    // The points are on opposite sides of the plane.
    if distance0 * distance1 < 0.0 {
        let interp = distance0 / (distance0 - distance1);
        v_out[count].v = v_in[0].v + (v_in[1].v - v_in[0].v) * interp;

        // Vertex A is hitting edge B.
        v_out[count].id = ContactFeature {
            index_a: vertex_index_a as u8,
            index_b: v_in[0].id.index_b,
            type_a: FeatureType::Vertex,
            type_b: FeatureType::Face,
        };
        count += 1;
    }

    (v_out, count)
}

/// Exact overlap test between child shapes using GJK distance.
#[must_use]
pub fn test_overlap(
    shape_a: &Shape,
    index_a: usize,
    shape_b: &Shape,
    index_b: usize,
    xf_a: &Transform,
    xf_b: &Transform,
) -> bool {
    let input = DistanceInput {
        proxy_a: DistanceProxy::from_shape(shape_a, index_a),
        proxy_b: DistanceProxy::from_shape(shape_b, index_b),
        transform_a: *xf_a,
        transform_b: *xf_b,
        use_radii: true,
    };
    let mut cache = SimplexCache::default();
    let output = distance(&mut cache, &input);
    output.distance < 10.0 * EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box_at(x: f32, y: f32) -> Aabb {
        Aabb::new(Vec2::new(x, y), Vec2::new(x + 1.0, y + 1.0))
    }

    #[test]
    fn test_aabb_overlap_and_contains() {
        let a = unit_box_at(0.0, 0.0);
        let b = unit_box_at(0.5, 0.5);
        let c = unit_box_at(3.0, 0.0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        let big = a.union(&c);
        assert!(big.contains(&a) && big.contains(&c));
        assert_relative_eq!(a.perimeter(), 4.0);
    }

    #[test]
    fn test_aabb_ray_cast() {
        let aabb = unit_box_at(1.0, -0.5);
        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(4.0, 0.0),
            max_fraction: 1.0,
        };
        let hit = aabb.ray_cast(&input).expect("ray should hit");
        assert_relative_eq!(hit.fraction, 0.25);
        assert_eq!(hit.normal, Vec2::new(-1.0, 0.0));

        let miss = RayCastInput {
            p1: Vec2::new(0.0, 2.0),
            p2: Vec2::new(4.0, 2.0),
            max_fraction: 1.0,
        };
        assert!(aabb.ray_cast(&miss).is_none());
    }

    #[test]
    fn test_feature_key_distinguishes_types() {
        let a = ContactFeature {
            index_a: 1,
            index_b: 2,
            type_a: FeatureType::Face,
            type_b: FeatureType::Vertex,
        };
        let b = a.swapped();
        assert_ne!(a.key(), b.key());
        assert_eq!(b.swapped(), a);
    }

    #[test]
    fn test_clip_segment() {
        let v_in = [
            ClipVertex {
                v: Vec2::new(-1.0, 0.0),
                id: ContactFeature::default(),
            },
            ClipVertex {
                v: Vec2::new(1.0, 0.0),
                id: ContactFeature::default(),
            },
        ];
        // Keep x <= 0.5
        let (out, count) = clip_segment_to_line(&v_in, Vec2::UNIT_X, 0.5, 3);
        assert_eq!(count, 2);
        assert_relative_eq!(out[1].v.x, 0.5);
        assert_eq!(out[1].id.index_a, 3);

        // Keep x <= -2: nothing survives
        let (_, none) = clip_segment_to_line(&v_in, Vec2::UNIT_X, -2.0, 0);
        assert_eq!(none, 0);
    }

    #[test]
    fn test_point_states() {
        let mut m1 = Manifold::default();
        let mut m2 = Manifold::default();
        m1.point_count = 2;
        m1.points[0].id.index_a = 1;
        m1.points[1].id.index_a = 2;
        m2.point_count = 2;
        m2.points[0].id.index_a = 2;
        m2.points[1].id.index_a = 3;
        let (s1, s2) = point_states(&m1, &m2);
        assert_eq!(s1, [PointState::Remove, PointState::Persist]);
        assert_eq!(s2, [PointState::Persist, PointState::Add]);
    }
}
