//! Collision Shapes
//!
//! The shape set is closed, so every algorithm matches on [`Shape`] instead
//! of going through a trait object.
//!
//! # Variants
//!
//! - `Circle`: solid circle with a local center
//! - `Polygon`: convex polygon with up to `MAX_POLYGON_VERTICES` vertices
//! - `Edge`: line segment, optionally one-sided with ghost vertices
//! - `Chain`: open chain or closed loop of one-sided edges; one child per edge
//!
//! Shapes are plain values. A fixture owns a copy of its shape; nothing in a
//! shape refers back to a body.

use crate::chain::ChainShape;
use crate::collision::{Aabb, RayCastInput, RayCastOutput};
use crate::error::{PhysicsError, PhysicsResult};
use crate::math::{Transform, Vec2};
use crate::polygon::PolygonShape;
use crate::settings::POLYGON_RADIUS;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Mass properties computed from a shape and a density.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassData {
    /// Mass in kilograms
    pub mass: f32,
    /// Center of mass relative to the shape origin
    pub center: Vec2,
    /// Rotational inertia about the shape origin
    pub inertia: f32,
}

/// Discriminant of [`Shape`], used for contact dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeType {
    /// Circle
    Circle,
    /// Edge segment
    Edge,
    /// Convex polygon
    Polygon,
    /// Edge chain
    Chain,
}

// ============================================================================
// Circle
// ============================================================================

/// Solid circle.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CircleShape {
    /// Local center
    pub center: Vec2,
    /// Radius
    pub radius: f32,
}

impl CircleShape {
    /// Circle with the given local center and radius.
    pub fn new(center: Vec2, radius: f32) -> PhysicsResult<Self> {
        if !center.is_valid() || !radius.is_finite() {
            return Err(PhysicsError::InvalidShape {
                reason: "circle parameters must be finite",
            });
        }
        if radius <= 0.0 {
            return Err(PhysicsError::InvalidShape {
                reason: "circle radius must be positive",
            });
        }
        Ok(Self { center, radius })
    }

    fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        let center = xf.apply(self.center);
        (p - center).length_squared() <= self.radius * self.radius
    }

    // Collision Detection in Interactive 3D Environments by Gino van den Bergen
    // From Section 3.1.2
    // x = s + a * r
    // norm(x) = radius
    fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        let position = xf.apply(self.center);
        let s = input.p1 - position;
        let b = s.length_squared() - self.radius * self.radius;

        let r = input.p2 - input.p1;
        let c = s.dot(r);
        let rr = r.length_squared();
        let sigma = c * c - rr * b;

        // Negative discriminant or short segment.
        if sigma < 0.0 || rr < crate::math::EPSILON {
            return None;
        }

        // Find the point of intersection of the line with the circle.
        let a = -(c + sigma.sqrt());

        // Is the intersection point on the segment?
        if 0.0 <= a && a <= input.max_fraction * rr {
            let fraction = a / rr;
            return Some(RayCastOutput {
                normal: (s + r * fraction).normalized(),
                fraction,
            });
        }
        None
    }

    fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let p = xf.apply(self.center);
        Aabb::from_center(p, Vec2::new(self.radius, self.radius))
    }

    fn compute_mass(&self, density: f32) -> MassData {
        let rr = self.radius * self.radius;
        let mass = density * core::f32::consts::PI * rr;
        MassData {
            mass,
            center: self.center,
            // Inertia about the local origin.
            inertia: mass * (0.5 * rr + self.center.length_squared()),
        }
    }
}

// ============================================================================
// Edge
// ============================================================================

/// Line segment from `vertex1` to `vertex2`.
///
/// A one-sided edge only collides on the right of `vertex1 -> vertex2`
/// (normal `(e.y, -e.x)`), and uses the ghost vertices `vertex0` and
/// `vertex3` to smooth collision across neighbouring edges of a chain.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeShape {
    /// Ghost vertex before `vertex1` (one-sided only)
    pub vertex0: Vec2,
    /// Segment start
    pub vertex1: Vec2,
    /// Segment end
    pub vertex2: Vec2,
    /// Ghost vertex after `vertex2` (one-sided only)
    pub vertex3: Vec2,
    /// Collide on one side only
    pub one_sided: bool,
}

impl EdgeShape {
    /// Two-sided segment.
    pub fn two_sided(v1: Vec2, v2: Vec2) -> PhysicsResult<Self> {
        Self::validate_segment(v1, v2)?;
        Ok(Self {
            vertex0: Vec2::ZERO,
            vertex1: v1,
            vertex2: v2,
            vertex3: Vec2::ZERO,
            one_sided: false,
        })
    }

    /// One-sided segment `v1 -> v2` with ghost neighbours `v0` and `v3`.
    pub fn one_sided(v0: Vec2, v1: Vec2, v2: Vec2, v3: Vec2) -> PhysicsResult<Self> {
        Self::validate_segment(v1, v2)?;
        if !v0.is_valid() || !v3.is_valid() {
            return Err(PhysicsError::InvalidShape {
                reason: "edge vertices must be finite",
            });
        }
        Ok(Self {
            vertex0: v0,
            vertex1: v1,
            vertex2: v2,
            vertex3: v3,
            one_sided: true,
        })
    }

    fn validate_segment(v1: Vec2, v2: Vec2) -> PhysicsResult<()> {
        if !v1.is_valid() || !v2.is_valid() {
            return Err(PhysicsError::InvalidShape {
                reason: "edge vertices must be finite",
            });
        }
        if v1.distance_squared(v2) <= crate::settings::LINEAR_SLOP * crate::settings::LINEAR_SLOP {
            return Err(PhysicsError::InvalidShape {
                reason: "edge is too short",
            });
        }
        Ok(())
    }

    // p = p1 + t * d
    // v = v1 + s * e
    // p1 + t * d = v1 + s * e
    // s * e - t * d = p1 - v1
    pub(crate) fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        // Put the ray into the edge's frame of reference.
        let p1 = xf.q.apply_inv(input.p1 - xf.p);
        let p2 = xf.q.apply_inv(input.p2 - xf.p);
        let d = p2 - p1;

        let v1 = self.vertex1;
        let v2 = self.vertex2;
        let e = v2 - v1;

        // Normal points to the right, looking from v1 at v2.
        let normal = Vec2::new(e.y, -e.x).normalized();

        // q = p1 + t * d
        // dot(normal, q - v1) = 0
        // dot(normal, p1 - v1) + t * dot(normal, d) = 0
        let numerator = normal.dot(v1 - p1);
        if self.one_sided && numerator > 0.0 {
            return None;
        }

        let denominator = normal.dot(d);
        if denominator == 0.0 {
            return None;
        }

        let t = numerator / denominator;
        if t < 0.0 || input.max_fraction < t {
            return None;
        }

        let q = p1 + d * t;

        // q = v1 + s * r
        // s = dot(q - v1, r) / dot(r, r)
        let r = v2 - v1;
        let rr = r.length_squared();
        if rr == 0.0 {
            return None;
        }

        let s = (q - v1).dot(r) / rr;
        if !(0.0..=1.0).contains(&s) {
            return None;
        }

        let normal = if numerator > 0.0 {
            -xf.q.apply(normal)
        } else {
            xf.q.apply(normal)
        };
        Some(RayCastOutput {
            normal,
            fraction: t,
        })
    }

    pub(crate) fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let v1 = xf.apply(self.vertex1);
        let v2 = xf.apply(self.vertex2);
        Aabb::new(v1.min(v2), v1.max(v2)).fattened(POLYGON_RADIUS)
    }

    fn compute_mass(&self) -> MassData {
        MassData {
            mass: 0.0,
            center: (self.vertex1 + self.vertex2) * 0.5,
            inertia: 0.0,
        }
    }
}

// ============================================================================
// Shape
// ============================================================================

/// Closed set of collision shapes.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape {
    /// Solid circle
    Circle(CircleShape),
    /// Convex polygon
    Polygon(PolygonShape),
    /// Line segment
    Edge(EdgeShape),
    /// Chain of one-sided edges
    Chain(ChainShape),
}

impl Shape {
    /// Variant tag.
    #[inline]
    #[must_use]
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Self::Circle(_) => ShapeType::Circle,
            Self::Polygon(_) => ShapeType::Polygon,
            Self::Edge(_) => ShapeType::Edge,
            Self::Chain(_) => ShapeType::Chain,
        }
    }

    /// Collision radius: the circle radius, or the polygon skin for the rest.
    #[inline]
    #[must_use]
    pub fn radius(&self) -> f32 {
        match self {
            Self::Circle(circle) => circle.radius,
            Self::Polygon(_) | Self::Edge(_) | Self::Chain(_) => POLYGON_RADIUS,
        }
    }

    /// Number of child primitives (edges for a chain, otherwise one).
    #[inline]
    #[must_use]
    pub fn child_count(&self) -> usize {
        match self {
            Self::Chain(chain) => chain.child_count(),
            _ => 1,
        }
    }

    /// Whether a world point lies inside. Edges and chains have no interior.
    #[must_use]
    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        match self {
            Self::Circle(circle) => circle.test_point(xf, p),
            Self::Polygon(polygon) => polygon.test_point(xf, p),
            Self::Edge(_) | Self::Chain(_) => false,
        }
    }

    /// Cast a world-space ray against one child.
    #[must_use]
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: &Transform,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        match self {
            Self::Circle(circle) => circle.ray_cast(input, xf),
            Self::Polygon(polygon) => polygon.ray_cast(input, xf),
            Self::Edge(edge) => edge.ray_cast(input, xf),
            Self::Chain(chain) => chain.ray_cast(input, xf, child_index),
        }
    }

    /// World AABB of one child.
    #[must_use]
    pub fn compute_aabb(&self, xf: &Transform, child_index: usize) -> Aabb {
        match self {
            Self::Circle(circle) => circle.compute_aabb(xf),
            Self::Polygon(polygon) => polygon.compute_aabb(xf),
            Self::Edge(edge) => edge.compute_aabb(xf),
            Self::Chain(chain) => chain.compute_aabb(xf, child_index),
        }
    }

    /// Mass properties for a density in kg/m². Edges and chains are massless.
    #[must_use]
    pub fn compute_mass(&self, density: f32) -> MassData {
        match self {
            Self::Circle(circle) => circle.compute_mass(density),
            Self::Polygon(polygon) => polygon.compute_mass(density),
            Self::Edge(edge) => edge.compute_mass(),
            Self::Chain(_) => MassData::default(),
        }
    }

    /// Convenience constructor for a circle.
    pub fn circle(center: Vec2, radius: f32) -> PhysicsResult<Self> {
        CircleShape::new(center, radius).map(Self::Circle)
    }

    /// Convenience constructor for an axis-aligned box centered on the origin.
    pub fn new_box(half_width: f32, half_height: f32) -> PhysicsResult<Self> {
        PolygonShape::new_box(half_width, half_height).map(Self::Polygon)
    }

    /// Convenience constructor for a convex polygon from its outline.
    pub fn polygon(points: &[Vec2]) -> PhysicsResult<Self> {
        PolygonShape::new(points).map(Self::Polygon)
    }

    /// Convenience constructor for a two-sided segment.
    pub fn edge(v1: Vec2, v2: Vec2) -> PhysicsResult<Self> {
        EdgeShape::two_sided(v1, v2).map(Self::Edge)
    }
}

impl From<CircleShape> for Shape {
    fn from(shape: CircleShape) -> Self {
        Self::Circle(shape)
    }
}

impl From<PolygonShape> for Shape {
    fn from(shape: PolygonShape) -> Self {
        Self::Polygon(shape)
    }
}

impl From<EdgeShape> for Shape {
    fn from(shape: EdgeShape) -> Self {
        Self::Edge(shape)
    }
}

impl From<ChainShape> for Shape {
    fn from(shape: ChainShape) -> Self {
        Self::Chain(shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_circle_rejects_bad_radius() {
        assert!(CircleShape::new(Vec2::ZERO, 0.0).is_err());
        assert!(CircleShape::new(Vec2::ZERO, -1.0).is_err());
        assert!(CircleShape::new(Vec2::ZERO, f32::NAN).is_err());
        assert!(CircleShape::new(Vec2::ZERO, 0.5).is_ok());
    }

    #[test]
    fn test_circle_mass() {
        let shape = Shape::circle(Vec2::ZERO, 1.0).unwrap();
        let md = shape.compute_mass(2.0);
        assert_relative_eq!(md.mass, 2.0 * core::f32::consts::PI, epsilon = 1e-5);
        assert_relative_eq!(md.inertia, 0.5 * md.mass, epsilon = 1e-5);
    }

    #[test]
    fn test_circle_ray_cast() {
        let shape = Shape::circle(Vec2::ZERO, 1.0).unwrap();
        let xf = Transform::new(Vec2::new(5.0, 0.0), 0.0);
        let input = RayCastInput {
            p1: Vec2::ZERO,
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 1.0,
        };
        let hit = shape.ray_cast(&input, &xf, 0).unwrap();
        assert_relative_eq!(hit.fraction, 0.4, epsilon = 1e-5);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_one_sided_edge_ray_cast() {
        // Normal of v1 -> v2 = (1,0) -> (-1,0) points up.
        let edge = EdgeShape::one_sided(
            Vec2::new(2.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(-1.0, 0.0),
            Vec2::new(-2.0, 0.0),
        )
        .unwrap();
        let shape = Shape::Edge(edge);
        let down = RayCastInput {
            p1: Vec2::new(0.0, 1.0),
            p2: Vec2::new(0.0, -1.0),
            max_fraction: 1.0,
        };
        let hit = shape.ray_cast(&down, &Transform::IDENTITY, 0).unwrap();
        assert_relative_eq!(hit.fraction, 0.5);
        assert_relative_eq!(hit.normal.y, 1.0);

        let up = RayCastInput {
            p1: Vec2::new(0.0, -1.0),
            p2: Vec2::new(0.0, 1.0),
            max_fraction: 1.0,
        };
        assert!(shape.ray_cast(&up, &Transform::IDENTITY, 0).is_none());
    }

    #[test]
    fn test_edge_aabb_includes_skin() {
        let shape = Shape::edge(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)).unwrap();
        let aabb = shape.compute_aabb(&Transform::IDENTITY, 0);
        assert_relative_eq!(aabb.lower.y, -POLYGON_RADIUS);
        assert_relative_eq!(aabb.upper.x, 1.0 + POLYGON_RADIUS);
        assert!(!shape.test_point(&Transform::IDENTITY, Vec2::ZERO));
    }
}
