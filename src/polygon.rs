//! Convex Polygon Shape
//!
//! Built from an ordered convex outline in either winding. Near-duplicate
//! points are welded, the outline is checked for crossings and dents, and the
//! hull is computed with gift wrapping, so the stored vertices are always
//! counter-clockwise and strictly convex.

use crate::collision::{Aabb, RayCastInput, RayCastOutput};
use crate::error::{PhysicsError, PhysicsResult};
use crate::math::{Transform, Vec2, EPSILON};
use crate::settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES, POLYGON_RADIUS};
use crate::shape::MassData;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Convex polygon with at most [`MAX_POLYGON_VERTICES`] vertices.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolygonShape {
    /// Area centroid in local coordinates
    pub centroid: Vec2,
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
}

fn invalid(reason: &'static str) -> PhysicsError {
    PhysicsError::InvalidShape { reason }
}

/// Reject outlines whose non-adjacent edges cross or whose corners turn both
/// ways. Flat corners are ignored; the hull drops them.
fn check_outline(ps: &[Vec2]) -> PhysicsResult<()> {
    let n = ps.len();
    let orient = |a: Vec2, b: Vec2, c: Vec2| (b - a).cross(c - a);

    for i in 0..n {
        let (a, b) = (ps[i], ps[(i + 1) % n]);
        for j in i + 2..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            let (c, d) = (ps[j], ps[(j + 1) % n]);
            let crosses_ab = orient(a, b, c) * orient(a, b, d) < 0.0;
            let crosses_cd = orient(c, d, a) * orient(c, d, b) < 0.0;
            if crosses_ab && crosses_cd {
                return Err(invalid("polygon is self-intersecting"));
            }
        }
    }

    let mut turn = 0.0f32;
    for i in 0..n {
        let e1 = ps[(i + 1) % n] - ps[i];
        let e2 = ps[(i + 2) % n] - ps[(i + 1) % n];
        let c = e1.cross(e2);
        if c.abs() <= 1.0e-5 * e1.length() * e2.length() {
            continue;
        }
        if turn * c < 0.0 {
            return Err(invalid("polygon is not convex"));
        }
        turn = c;
    }
    Ok(())
}

impl PolygonShape {
    /// Convex polygon from the outline `points`, clockwise or
    /// counter-clockwise.
    ///
    /// Collinear and welded points are dropped. Fails on fewer than three
    /// distinct points, more than `MAX_POLYGON_VERTICES` inputs, non-finite
    /// input, a self-intersecting or concave outline, or a collinear or
    /// vanishingly small hull. Concave outlines are rejected rather than
    /// hulled so the stored shape is always the one supplied.
    pub fn new(points: &[Vec2]) -> PhysicsResult<Self> {
        if points.len() < 3 {
            return Err(invalid("polygon needs at least 3 vertices"));
        }
        if points.len() > MAX_POLYGON_VERTICES {
            return Err(invalid("polygon has too many vertices"));
        }
        if points.iter().any(|p| !p.is_valid()) {
            return Err(invalid("polygon vertices must be finite"));
        }

        // Weld close points.
        let weld = 0.5 * LINEAR_SLOP;
        let mut ps = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        let mut n = 0;
        for &v in points {
            if ps[..n].iter().all(|p| v.distance_squared(*p) >= weld * weld) {
                ps[n] = v;
                n += 1;
            }
        }
        if n < 3 {
            return Err(invalid("polygon vertices are too close together"));
        }
        check_outline(&ps[..n])?;

        // Gift wrapping from the rightmost point (lowest on ties).
        let mut i0 = 0;
        let mut x0 = ps[0].x;
        for (i, p) in ps.iter().enumerate().take(n).skip(1) {
            let x = p.x;
            if x > x0 || (x == x0 && p.y < ps[i0].y) {
                i0 = i;
                x0 = x;
            }
        }

        let mut hull = [0usize; MAX_POLYGON_VERTICES];
        let mut m = 0;
        let mut ih = i0;
        loop {
            if m == n {
                return Err(invalid("polygon hull did not close"));
            }
            hull[m] = ih;

            let mut ie = 0;
            for j in 1..n {
                if ie == ih {
                    ie = j;
                    continue;
                }

                let r = ps[ie] - ps[hull[m]];
                let v = ps[j] - ps[hull[m]];
                let c = r.cross(v);
                if c < 0.0 {
                    ie = j;
                }

                // Collinearity check
                if c == 0.0 && v.length_squared() > r.length_squared() {
                    ie = j;
                }
            }

            m += 1;
            ih = ie;
            if ie == i0 {
                break;
            }
        }

        if m < 3 {
            return Err(invalid("polygon is degenerate (collinear points)"));
        }

        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        for i in 0..m {
            vertices[i] = ps[hull[i]];
        }
        Self::from_hull(&vertices[..m])
    }

    /// Trusted constructor for vertices already in counter-clockwise convex
    /// order; computes normals and centroid.
    fn from_hull(hull: &[Vec2]) -> PhysicsResult<Self> {
        let count = hull.len();
        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        let mut normals = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        vertices[..count].copy_from_slice(hull);

        for i in 0..count {
            let i2 = if i + 1 < count { i + 1 } else { 0 };
            let edge = vertices[i2] - vertices[i];
            if edge.length_squared() <= EPSILON * EPSILON {
                return Err(invalid("polygon has a zero-length edge"));
            }
            normals[i] = edge.cross_scalar(1.0).normalized();
        }

        let centroid = compute_centroid(&vertices[..count])?;
        Ok(Self {
            centroid,
            vertices,
            normals,
            count,
        })
    }

    /// Axis-aligned box centered on the local origin.
    pub fn new_box(half_width: f32, half_height: f32) -> PhysicsResult<Self> {
        if !(half_width > 0.0 && half_height > 0.0)
            || !half_width.is_finite()
            || !half_height.is_finite()
        {
            return Err(invalid("box extents must be positive"));
        }
        let (hx, hy) = (half_width, half_height);
        Self::from_hull(&[
            Vec2::new(-hx, -hy),
            Vec2::new(hx, -hy),
            Vec2::new(hx, hy),
            Vec2::new(-hx, hy),
        ])
    }

    /// Box with the given center and rotation in body coordinates.
    pub fn new_oriented_box(
        half_width: f32,
        half_height: f32,
        center: Vec2,
        angle: f32,
    ) -> PhysicsResult<Self> {
        let mut shape = Self::new_box(half_width, half_height)?;
        let xf = Transform::new(center, angle);
        for i in 0..shape.count {
            shape.vertices[i] = xf.apply(shape.vertices[i]);
            shape.normals[i] = xf.q.apply(shape.normals[i]);
        }
        shape.centroid = center;
        Ok(shape)
    }

    /// Hull vertices, counter-clockwise.
    #[inline]
    #[must_use]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    /// Outward edge normals; `normals()[i]` belongs to edge `i -> i+1`.
    #[inline]
    #[must_use]
    pub fn normals(&self) -> &[Vec2] {
        &self.normals[..self.count]
    }

    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Collision skin radius.
    #[inline]
    #[must_use]
    pub fn radius(&self) -> f32 {
        POLYGON_RADIUS
    }

    /// Re-check convexity of the stored hull.
    #[must_use]
    pub fn validate(&self) -> bool {
        for i in 0..self.count {
            let i2 = if i + 1 < self.count { i + 1 } else { 0 };
            let p = self.vertices[i];
            let e = self.vertices[i2] - p;
            for j in 0..self.count {
                if j == i || j == i2 {
                    continue;
                }
                if e.cross(self.vertices[j] - p) <= 0.0 {
                    return false;
                }
            }
        }
        true
    }

    pub(crate) fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        let local = xf.q.apply_inv(p - xf.p);
        self.vertices()
            .iter()
            .zip(self.normals())
            .all(|(v, n)| n.dot(local - *v) <= 0.0)
    }

    pub(crate) fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        // Put the ray into the polygon's frame of reference.
        let p1 = xf.q.apply_inv(input.p1 - xf.p);
        let p2 = xf.q.apply_inv(input.p2 - xf.p);
        let d = p2 - p1;

        let mut lower = 0.0;
        let mut upper = input.max_fraction;
        let mut index = None;

        for i in 0..self.count {
            // p = p1 + a * d
            // dot(normal, p - v) = 0
            // dot(normal, p1 - v) + a * dot(normal, d) = 0
            let numerator = self.normals[i].dot(self.vertices[i] - p1);
            let denominator = self.normals[i].dot(d);

            if denominator == 0.0 {
                if numerator < 0.0 {
                    return None;
                }
            } else if denominator < 0.0 && numerator < lower * denominator {
                // Increase lower. The segment enters this half-space.
                lower = numerator / denominator;
                index = Some(i);
            } else if denominator > 0.0 && numerator < upper * denominator {
                // Decrease upper. The segment exits this half-space.
                upper = numerator / denominator;
            }

            if upper < lower {
                return None;
            }
        }

        index.map(|i| RayCastOutput {
            normal: xf.q.apply(self.normals[i]),
            fraction: lower,
        })
    }

    pub(crate) fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let first = xf.apply(self.vertices[0]);
        let (lower, upper) = self.vertices()[1..]
            .iter()
            .fold((first, first), |(lower, upper), v| {
                let p = xf.apply(*v);
                (lower.min(p), upper.max(p))
            });
        Aabb::new(lower, upper).fattened(POLYGON_RADIUS)
    }

    // The rotational inertia is computed about the reference point `s` (the
    // first vertex) to reduce round-off, then shifted to the shape origin.
    pub(crate) fn compute_mass(&self, density: f32) -> MassData {
        let mut center = Vec2::ZERO;
        let mut area = 0.0;
        let mut inertia = 0.0;

        let s = self.vertices[0];
        const INV3: f32 = 1.0 / 3.0;

        for i in 0..self.count {
            // Triangle vertices.
            let e1 = self.vertices[i] - s;
            let e2 = if i + 1 < self.count {
                self.vertices[i + 1] - s
            } else {
                self.vertices[0] - s
            };

            let d = e1.cross(e2);
            let triangle_area = 0.5 * d;
            area += triangle_area;

            // Area weighted centroid
            center += (e1 + e2) * (triangle_area * INV3);

            let (ex1, ey1) = (e1.x, e1.y);
            let (ex2, ey2) = (e2.x, e2.y);
            let intx2 = ex1 * ex1 + ex2 * ex1 + ex2 * ex2;
            let inty2 = ey1 * ey1 + ey2 * ey1 + ey2 * ey2;
            inertia += (0.25 * INV3 * d) * (intx2 + inty2);
        }

        let mass = density * area;
        let center = center * (1.0 / area);
        let world_center = center + s;

        // Shift to center of mass then to original body origin.
        let inertia = density * inertia
            + mass * (world_center.length_squared() - center.length_squared());

        MassData {
            mass,
            center: world_center,
            inertia,
        }
    }
}

fn compute_centroid(vs: &[Vec2]) -> PhysicsResult<Vec2> {
    let mut c = Vec2::ZERO;
    let mut area = 0.0;

    // Reference point inside the polygon keeps the triangles well formed.
    let s = vs[0];
    const INV3: f32 = 1.0 / 3.0;

    for i in 0..vs.len() {
        let p2 = vs[i] - s;
        let p3 = if i + 1 < vs.len() { vs[i + 1] - s } else { vs[0] - s };

        let triangle_area = 0.5 * p2.cross(p3);
        area += triangle_area;
        c += (p2 + p3) * (triangle_area * INV3);
    }

    if area <= EPSILON {
        return Err(invalid("polygon area is too small"));
    }
    Ok(c * (1.0 / area) + s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hull_orders_ccw_and_drops_flat_corner() {
        // Clockwise square with a midpoint on its top edge.
        let points = [
            Vec2::new(-1.0, 1.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(-1.0, -1.0),
        ];
        let polygon = PolygonShape::new(&points).unwrap();
        assert_eq!(polygon.count(), 4);
        for (v, n) in polygon.vertices().iter().zip(polygon.normals()) {
            assert!(v.dot(*n) > 0.0, "normals must point outward");
        }
        assert!(polygon.validate());
        assert_relative_eq!(polygon.centroid.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(polygon.centroid.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_hull_rejects_degenerate_input() {
        let collinear = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)];
        assert!(PolygonShape::new(&collinear).is_err());

        let welded = [
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0001, 0.0),
            Vec2::new(0.0, 0.0001),
        ];
        assert!(PolygonShape::new(&welded).is_err());

        assert!(PolygonShape::new(&[Vec2::ZERO, Vec2::UNIT_X]).is_err());
        assert!(PolygonShape::new(&[Vec2::ZERO; 9]).is_err());
        assert!(PolygonShape::new_box(0.0, 1.0).is_err());
    }

    #[test]
    fn test_rejects_bowtie_and_dented_outlines() {
        let bowtie = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
        ];
        assert_eq!(
            PolygonShape::new(&bowtie),
            Err(PhysicsError::InvalidShape {
                reason: "polygon is self-intersecting"
            })
        );

        let dented = [
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 0.2),
            Vec2::new(-1.0, 1.0),
        ];
        assert_eq!(
            PolygonShape::new(&dented),
            Err(PhysicsError::InvalidShape {
                reason: "polygon is not convex"
            })
        );

        // Five-pointed star: every corner turns the same way.
        let star: Vec<Vec2> = (0..5)
            .map(|i| {
                let a = i as f32 * 4.0 * core::f32::consts::PI / 5.0;
                Vec2::new(a.cos(), a.sin())
            })
            .collect();
        assert!(PolygonShape::new(&star).is_err());
    }

    #[test]
    fn test_box_mass() {
        let polygon = PolygonShape::new_box(1.0, 0.5).unwrap();
        let md = polygon.compute_mass(1.0);
        assert_relative_eq!(md.mass, 2.0, epsilon = 1e-5);
        // I = m (w^2 + h^2) / 12 with w = 2, h = 1
        assert_relative_eq!(md.inertia, 2.0 * 5.0 / 12.0, epsilon = 1e-5);
        assert_relative_eq!(md.center.x, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_oriented_box_mass_uses_parallel_axis() {
        let center = Vec2::new(2.0, 0.0);
        let polygon = PolygonShape::new_oriented_box(0.5, 0.5, center, 0.3).unwrap();
        let md = polygon.compute_mass(1.0);
        assert_relative_eq!(md.mass, 1.0, epsilon = 1e-5);
        assert_relative_eq!(md.center.x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(md.inertia, 1.0 / 6.0 + 4.0, epsilon = 1e-4);
    }

    #[test]
    fn test_point_and_ray() {
        let polygon = PolygonShape::new_box(1.0, 1.0).unwrap();
        let xf = Transform::new(Vec2::new(3.0, 0.0), 0.0);
        assert!(polygon.test_point(&xf, Vec2::new(3.5, 0.5)));
        assert!(!polygon.test_point(&xf, Vec2::new(1.5, 0.0)));

        let input = RayCastInput {
            p1: Vec2::ZERO,
            p2: Vec2::new(4.0, 0.0),
            max_fraction: 1.0,
        };
        let hit = polygon.ray_cast(&input, &xf).unwrap();
        assert_relative_eq!(hit.fraction, 0.5, epsilon = 1e-6);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-6);
    }
}
