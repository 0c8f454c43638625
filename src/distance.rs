//! GJK Distance and Shape Cast
//!
//! Closest points between two convex proxies using the Gilbert-Johnson-Keerthi
//! algorithm with a Voronoi-region simplex solver.
//!
//! # Features
//!
//! - Warm start from a [`SimplexCache`] left by the previous call on the same pair
//! - Witness points on both shapes, optionally pushed out by the shape radii
//! - Linear shape cast (conservative advancement of the Minkowski difference)
//!
//! Polygon skins are ignored while iterating and applied at the end, so
//! core shapes stay disjoint even when the rounded shapes touch.

use crate::math::{Transform, Vec2, EPSILON};
use crate::settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES, POLYGON_RADIUS};
use crate::shape::Shape;

/// Upper bound on GJK iterations.
pub const MAX_DISTANCE_ITERATIONS: usize = 20;

// ============================================================================
// Proxy
// ============================================================================

/// Convex vertex set plus radius, borrowed from one child of a shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceProxy {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
    /// Rounding radius
    pub radius: f32,
}

impl DistanceProxy {
    /// Proxy from explicit vertices (at most `MAX_POLYGON_VERTICES`).
    #[must_use]
    pub fn new(points: &[Vec2], radius: f32) -> Self {
        let count = points.len().min(MAX_POLYGON_VERTICES);
        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        vertices[..count].copy_from_slice(&points[..count]);
        Self {
            vertices,
            count,
            radius,
        }
    }

    /// Proxy for child `index` of a shape.
    #[must_use]
    pub fn from_shape(shape: &Shape, index: usize) -> Self {
        match shape {
            Shape::Circle(circle) => Self::new(&[circle.center], circle.radius),
            Shape::Polygon(polygon) => Self::new(polygon.vertices(), POLYGON_RADIUS),
            Shape::Edge(edge) => Self::new(&[edge.vertex1, edge.vertex2], POLYGON_RADIUS),
            Shape::Chain(chain) => {
                let edge = chain.child_edge(index);
                Self::new(&[edge.vertex1, edge.vertex2], POLYGON_RADIUS)
            }
        }
    }

    /// Index of the vertex farthest along `d`.
    #[must_use]
    pub fn support(&self, d: Vec2) -> usize {
        let mut best_index = 0;
        let mut best_value = self.vertices[0].dot(d);
        for i in 1..self.count {
            let value = self.vertices[i].dot(d);
            if value > best_value {
                best_index = i;
                best_value = value;
            }
        }
        best_index
    }

    /// Vertex by index.
    #[inline]
    #[must_use]
    pub fn vertex(&self, index: usize) -> Vec2 {
        self.vertices[index]
    }

    /// Vertex slice.
    #[inline]
    #[must_use]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }
}

// ============================================================================
// Cache / input / output
// ============================================================================

/// Simplex vertices and metric from a previous query, used to warm start.
/// Set `count` to zero on the first call.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimplexCache {
    /// Length or area of the cached simplex
    pub metric: f32,
    /// Number of cached vertices
    pub count: usize,
    /// Vertex indices on shape A
    pub index_a: [u8; 3],
    /// Vertex indices on shape B
    pub index_b: [u8; 3],
}

/// Input for [`distance`].
#[derive(Clone, Copy, Debug)]
pub struct DistanceInput {
    /// First proxy
    pub proxy_a: DistanceProxy,
    /// Second proxy
    pub proxy_b: DistanceProxy,
    /// Placement of the first proxy
    pub transform_a: Transform,
    /// Placement of the second proxy
    pub transform_b: Transform,
    /// Account for the proxy radii in the result
    pub use_radii: bool,
}

/// Result of [`distance`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DistanceOutput {
    /// Closest point on shape A
    pub point_a: Vec2,
    /// Closest point on shape B
    pub point_b: Vec2,
    /// Separation, never negative
    pub distance: f32,
    /// GJK iterations used
    pub iterations: usize,
}

// ============================================================================
// Simplex
// ============================================================================

#[derive(Clone, Copy, Debug, Default)]
struct SimplexVertex {
    w_a: Vec2,
    w_b: Vec2,
    w: Vec2,
    a: f32,
    index_a: usize,
    index_b: usize,
}

#[derive(Clone, Copy, Debug, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn read_cache(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        xf_a: &Transform,
        proxy_b: &DistanceProxy,
        xf_b: &Transform,
    ) -> Self {
        let mut simplex = Self {
            count: cache.count.min(3),
            ..Self::default()
        };

        // Copy data from cache.
        for i in 0..simplex.count {
            let v = &mut simplex.v[i];
            v.index_a = usize::from(cache.index_a[i]).min(proxy_a.count.saturating_sub(1));
            v.index_b = usize::from(cache.index_b[i]).min(proxy_b.count.saturating_sub(1));
            v.w_a = xf_a.apply(proxy_a.vertex(v.index_a));
            v.w_b = xf_b.apply(proxy_b.vertex(v.index_b));
            v.w = v.w_b - v.w_a;
            v.a = -1.0;
        }

        // Flush the cache if the metric changed too much.
        if simplex.count > 1 {
            let metric1 = cache.metric;
            let metric2 = simplex.metric();
            if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < EPSILON {
                simplex.count = 0;
            }
        }

        if simplex.count == 0 {
            let v = &mut simplex.v[0];
            v.index_a = 0;
            v.index_b = 0;
            v.w_a = xf_a.apply(proxy_a.vertex(0));
            v.w_b = xf_b.apply(proxy_b.vertex(0));
            v.w = v.w_b - v.w_a;
            v.a = 1.0;
            simplex.count = 1;
        }
        simplex
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.count = self.count;
        for i in 0..self.count {
            cache.index_a[i] = self.v[i].index_a as u8;
            cache.index_b[i] = self.v[i].index_b as u8;
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = e12.cross(-self.v[0].w);
                if sgn > 0.0 {
                    // Origin is left of e12.
                    Vec2::scalar_cross(1.0, e12)
                } else {
                    // Origin is right of e12.
                    e12.cross_scalar(1.0)
                }
            }
            _ => Vec2::ZERO,
        }
    }

    fn closest_point(&self) -> Vec2 {
        match self.count {
            1 => self.v[0].w,
            2 => self.v[0].w * self.v[0].a + self.v[1].w * self.v[1].a,
            _ => Vec2::ZERO,
        }
    }

    fn witness_points(&self) -> (Vec2, Vec2) {
        match self.count {
            1 => (self.v[0].w_a, self.v[0].w_b),
            2 => (
                self.v[0].w_a * self.v[0].a + self.v[1].w_a * self.v[1].a,
                self.v[0].w_b * self.v[0].a + self.v[1].w_b * self.v[1].a,
            ),
            3 => {
                let p = self.v[0].w_a * self.v[0].a
                    + self.v[1].w_a * self.v[1].a
                    + self.v[2].w_a * self.v[2].a;
                (p, p)
            }
            _ => (Vec2::ZERO, Vec2::ZERO),
        }
    }

    fn metric(&self) -> f32 {
        match self.count {
            2 => self.v[0].w.distance(self.v[1].w),
            3 => (self.v[1].w - self.v[0].w).cross(self.v[2].w - self.v[0].w),
            _ => 0.0,
        }
    }

    // Closest point on the segment w1-w2 to the origin, via barycentric
    // coordinates. Regions: w1 (a2 <= 0), w2 (a1 <= 0), otherwise the edge.
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        // w1 region
        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            // a2 <= 0, so we clamp it to 0
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // w2 region
        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            // a1 <= 0, so we clamp it to 0
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // Must be in e12 region.
        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv_d12;
        self.v[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    // Possible regions: the three vertices, the three edges and the interior.
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        // Edge12
        let e12 = w2 - w1;
        let d12_1 = w2.dot(e12);
        let d12_2 = -w1.dot(e12);

        // Edge13
        let e13 = w3 - w1;
        let d13_1 = w3.dot(e13);
        let d13_2 = -w1.dot(e13);

        // Edge23
        let e23 = w3 - w2;
        let d23_1 = w3.dot(e23);
        let d23_2 = -w2.dot(e23);

        // Triangle123
        let n123 = e12.cross(e13);
        let d123_1 = n123 * w2.cross(w3);
        let d123_2 = n123 * w3.cross(w1);
        let d123_3 = n123 * w1.cross(w2);

        // w1 region
        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // e12
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv = 1.0 / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv;
            self.v[1].a = d12_2 * inv;
            self.count = 2;
            return;
        }

        // e13
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv = 1.0 / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv;
            self.v[2].a = d13_2 * inv;
            self.count = 2;
            self.v[1] = self.v[2];
            return;
        }

        // w2 region
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // w3 region
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.v[2].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[2];
            return;
        }

        // e23
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv = 1.0 / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv;
            self.v[2].a = d23_2 * inv;
            self.count = 2;
            self.v[0] = self.v[2];
            return;
        }

        // Must be in triangle123
        let inv = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v[0].a = d123_1 * inv;
        self.v[1].a = d123_2 * inv;
        self.v[2].a = d123_3 * inv;
        self.count = 3;
    }
}

// ============================================================================
// Distance
// ============================================================================

/// Closest points between two convex proxies.
///
/// On the first call for a pair, pass a cache with `count == 0`. The cache
/// is updated in place for the next call.
pub fn distance(cache: &mut SimplexCache, input: &DistanceInput) -> DistanceOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let xf_a = input.transform_a;
    let xf_b = input.transform_b;

    // Initialize the simplex.
    let mut simplex = Simplex::read_cache(cache, proxy_a, &xf_a, proxy_b, &xf_b);

    // Last simplex vertices, to detect cycling.
    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];

    let mut iter = 0;
    while iter < MAX_DISTANCE_ITERATIONS {
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.v[i].index_a;
            save_b[i] = simplex.v[i].index_b;
        }

        match simplex.count {
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => {}
        }

        // Origin inside the triangle: overlap.
        if simplex.count == 3 {
            break;
        }

        let d = simplex.search_direction();

        // The origin is probably contained by a line segment or triangle,
        // so the shapes are overlapped. Don't return a zero distance to
        // avoid a divide by zero downstream.
        if d.length_squared() < EPSILON * EPSILON {
            break;
        }

        // New support point in the direction of the origin.
        let count = simplex.count;
        let vertex = &mut simplex.v[count];
        vertex.index_a = proxy_a.support(xf_a.q.apply_inv(-d));
        vertex.w_a = xf_a.apply(proxy_a.vertex(vertex.index_a));
        vertex.index_b = proxy_b.support(xf_b.q.apply_inv(d));
        vertex.w_b = xf_b.apply(proxy_b.vertex(vertex.index_b));
        vertex.w = vertex.w_b - vertex.w_a;

        iter += 1;

        // Stop on a repeated support point: no further progress is possible.
        let (index_a, index_b) = (vertex.index_a, vertex.index_b);
        let duplicate = (0..save_count).any(|i| index_a == save_a[i] && index_b == save_b[i]);
        if duplicate {
            break;
        }

        simplex.count += 1;
    }

    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut dist = point_a.distance(point_b);
    simplex.write_cache(cache);

    if input.use_radii {
        if dist < EPSILON {
            // Shapes are too close to safely compute a normal.
            let p = (point_a + point_b) * 0.5;
            point_a = p;
            point_b = p;
            dist = 0.0;
        } else {
            // Move the witness points to the outer surface.
            let r_a = proxy_a.radius;
            let r_b = proxy_b.radius;
            dist = (dist - r_a - r_b).max(0.0);
            let normal = (point_b - point_a).normalized();
            point_a += normal * r_a;
            point_b -= normal * r_b;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance: dist,
        iterations: iter,
    }
}

// ============================================================================
// Shape cast
// ============================================================================

/// Input for [`shape_cast`]: proxy B translates by `translation_b`.
#[derive(Clone, Copy, Debug)]
pub struct ShapeCastInput {
    /// Stationary proxy
    pub proxy_a: DistanceProxy,
    /// Moving proxy
    pub proxy_b: DistanceProxy,
    /// Placement of A
    pub transform_a: Transform,
    /// Start placement of B
    pub transform_b: Transform,
    /// Translation of B over the cast
    pub translation_b: Vec2,
}

/// First contact found by [`shape_cast`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ShapeCastOutput {
    /// Contact point on A
    pub point: Vec2,
    /// Contact normal pointing from A toward B
    pub normal: Vec2,
    /// Fraction of the translation at first contact
    pub lambda: f32,
    /// Iterations used
    pub iterations: usize,
}

/// Linear cast of B against A using GJK-raycast.
///
/// Returns `None` when the shapes never touch along the translation or are
/// already overlapping at the start.
#[must_use]
pub fn shape_cast(input: &ShapeCastInput) -> Option<ShapeCastOutput> {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    let radius_a = proxy_a.radius.max(POLYGON_RADIUS);
    let radius_b = proxy_b.radius.max(POLYGON_RADIUS);
    let radius = radius_a + radius_b;

    let xf_a = input.transform_a;
    let xf_b = input.transform_b;

    let r = input.translation_b;
    let mut n = Vec2::ZERO;
    let mut lambda = 0.0;

    // Initial simplex
    let mut simplex = Simplex::default();

    // Get support point in -r direction
    let index_a = proxy_a.support(xf_a.q.apply_inv(-r));
    let mut w_a = xf_a.apply(proxy_a.vertex(index_a));
    let index_b = proxy_b.support(xf_b.q.apply_inv(r));
    let mut w_b = xf_b.apply(proxy_b.vertex(index_b));
    let mut v = w_a - w_b;

    // Sigma is the target distance between polygons
    let sigma = POLYGON_RADIUS.max(radius - POLYGON_RADIUS);
    let tolerance = 0.5 * LINEAR_SLOP;

    let mut iter = 0;
    while iter < MAX_DISTANCE_ITERATIONS && v.length() > sigma + tolerance {
        // Support in direction -v (A - B)
        let index_a = proxy_a.support(xf_a.q.apply_inv(-v));
        w_a = xf_a.apply(proxy_a.vertex(index_a));
        let index_b = proxy_b.support(xf_b.q.apply_inv(v));
        w_b = xf_b.apply(proxy_b.vertex(index_b));
        let p = w_a - w_b;

        // -v is a normal at p
        v.normalize();

        // Intersect ray with plane
        let vp = v.dot(p);
        let vr = v.dot(r);
        if vp - sigma > lambda * vr {
            if vr <= 0.0 {
                // miss
                return None;
            }

            lambda = (vp - sigma) / vr;
            if lambda > 1.0 {
                // miss
                return None;
            }

            n = -v;
            simplex.count = 0;
        }

        // Reverse simplex since it works with B - A. Shift by lambda * r
        // because we want the closest point to the current clip point.
        // Note that the support point p is not shifted because we want the
        // plane equation to be formed in unshifted space.
        let vertex = &mut simplex.v[simplex.count];
        vertex.index_a = index_b;
        vertex.w_a = w_b + r * lambda;
        vertex.index_b = index_a;
        vertex.w_b = w_a;
        vertex.w = vertex.w_b - vertex.w_a;
        vertex.a = 1.0;
        simplex.count += 1;

        match simplex.count {
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => {}
        }

        // If we have 3 points, then the origin is in the corresponding triangle.
        if simplex.count == 3 {
            // Overlap
            return None;
        }

        // Get search direction.
        v = simplex.closest_point();

        iter += 1;
    }

    if iter == 0 {
        // Initial overlap
        return None;
    }

    // Prepare output. The simplex is reversed, so A's witness is second.
    let (_, point_a) = simplex.witness_points();
    if v.length_squared() > 0.0 {
        n = (-v).normalized();
    }

    Some(ShapeCastOutput {
        point: point_a + n * radius_a,
        normal: n,
        lambda,
        iterations: iter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn box_proxy(h: f32) -> DistanceProxy {
        let shape = Shape::new_box(h, h).unwrap();
        DistanceProxy::from_shape(&shape, 0)
    }

    #[test]
    fn test_distance_disjoint_boxes() {
        let input = DistanceInput {
            proxy_a: box_proxy(1.0),
            proxy_b: box_proxy(1.0),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::new(Vec2::new(5.0, 0.5), 0.0),
            use_radii: false,
        };
        let mut cache = SimplexCache::default();
        let output = distance(&mut cache, &input);
        assert_relative_eq!(output.distance, 3.0, epsilon = 1e-5);
        assert_relative_eq!(output.point_a.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(output.point_b.x, 4.0, epsilon = 1e-5);

        // Warm-started call gives the same answer.
        let again = distance(&mut cache, &input);
        assert_relative_eq!(again.distance, output.distance, epsilon = 1e-6);
    }

    #[test]
    fn test_distance_uses_radii() {
        let circle = Shape::circle(Vec2::ZERO, 0.5).unwrap();
        let proxy = DistanceProxy::from_shape(&circle, 0);
        let input = DistanceInput {
            proxy_a: proxy,
            proxy_b: proxy,
            transform_a: Transform::IDENTITY,
            transform_b: Transform::new(Vec2::new(3.0, 4.0), 0.0),
            use_radii: true,
        };
        let output = distance(&mut SimplexCache::default(), &input);
        assert_relative_eq!(output.distance, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_distance_overlap_is_zero() {
        let input = DistanceInput {
            proxy_a: box_proxy(1.0),
            proxy_b: box_proxy(1.0),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::new(Vec2::new(0.5, 0.25), 0.3),
            use_radii: true,
        };
        let output = distance(&mut SimplexCache::default(), &input);
        assert_eq!(output.distance, 0.0);
    }

    #[test]
    fn test_shape_cast_hits() {
        let input = ShapeCastInput {
            proxy_a: box_proxy(1.0),
            proxy_b: box_proxy(0.5),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::new(Vec2::new(-6.0, 0.0), 0.0),
            translation_b: Vec2::new(10.0, 0.0),
        };
        let output = shape_cast(&input).expect("cast should hit");
        // Touch when B's right face (x = -5.5 + 10 t) meets A's left face.
        assert!(output.lambda > 0.4 && output.lambda < 0.46, "{}", output.lambda);
        assert_relative_eq!(output.normal.x, -1.0, epsilon = 1e-2);
    }
}
