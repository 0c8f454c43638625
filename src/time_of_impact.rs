//! Time of Impact
//!
//! Conservative advancement between two swept convex proxies. Each outer
//! iteration uses GJK to pick a separating axis, then a root finder pushes
//! the time forward to where that axis reaches the target separation.
//!
//! # Constants
//!
//! - Target separation: `max(LINEAR_SLOP, total_radius - 3 * LINEAR_SLOP)`
//! - Tolerance: `0.25 * LINEAR_SLOP`
//! - Outer iterations: 20, root finder iterations: 50
//!
//! The core shapes never overlap at the returned time, which keeps the
//! following discrete step free of deep penetration.

use crate::distance::{distance, DistanceInput, DistanceProxy, SimplexCache};
use crate::math::{Sweep, Vec2};
use crate::settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES};

/// Maximum outer conservative-advancement iterations.
pub const MAX_TOI_ITERATIONS: usize = 20;

/// Maximum iterations of the mixed bisection/secant root finder.
pub const MAX_ROOT_ITERATIONS: usize = 50;

/// Input for [`time_of_impact`].
#[derive(Clone, Copy, Debug)]
pub struct ToiInput {
    /// First proxy
    pub proxy_a: DistanceProxy,
    /// Second proxy
    pub proxy_b: DistanceProxy,
    /// Motion of A over the step
    pub sweep_a: Sweep,
    /// Motion of B over the step
    pub sweep_b: Sweep,
    /// Upper bound of the sweep interval, in [0, 1]
    pub t_max: f32,
}

/// Outcome classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToiState {
    /// Not computed
    Unknown,
    /// Root finder or iteration cap gave up
    Failed,
    /// Core shapes overlap at the start
    Overlapped,
    /// Target separation reached at `t`
    Touching,
    /// Shapes stay apart over the interval
    Separated,
}

/// Result of [`time_of_impact`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToiOutput {
    /// Classification
    pub state: ToiState,
    /// Time of impact, or `t_max` when separated
    pub t: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SeparationType {
    Points,
    FaceA,
    FaceB,
}

struct SeparationFunction<'a> {
    proxy_a: &'a DistanceProxy,
    proxy_b: &'a DistanceProxy,
    sweep_a: Sweep,
    sweep_b: Sweep,
    kind: SeparationType,
    local_point: Vec2,
    axis: Vec2,
}

impl<'a> SeparationFunction<'a> {
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a DistanceProxy,
        sweep_a: &Sweep,
        proxy_b: &'a DistanceProxy,
        sweep_b: &Sweep,
        t1: f32,
    ) -> (Self, f32) {
        let xf_a = sweep_a.transform(t1);
        let xf_b = sweep_b.transform(t1);
        let ia = |i: usize| usize::from(cache.index_a[i]);
        let ib = |i: usize| usize::from(cache.index_b[i]);

        let mut f = Self {
            proxy_a,
            proxy_b,
            sweep_a: *sweep_a,
            sweep_b: *sweep_b,
            kind: SeparationType::Points,
            local_point: Vec2::ZERO,
            axis: Vec2::ZERO,
        };

        if cache.count == 1 {
            let point_a = xf_a.apply(proxy_a.vertex(ia(0)));
            let point_b = xf_b.apply(proxy_b.vertex(ib(0)));
            f.axis = point_b - point_a;
            let s = f.axis.normalize();
            return (f, s);
        }

        if cache.index_a[0] == cache.index_a[1] {
            // Two points on B and one on A.
            f.kind = SeparationType::FaceB;
            let local_b1 = proxy_b.vertex(ib(0));
            let local_b2 = proxy_b.vertex(ib(1));

            f.axis = (local_b2 - local_b1).cross_scalar(1.0).normalized();
            let normal = xf_b.q.apply(f.axis);

            f.local_point = (local_b1 + local_b2) * 0.5;
            let point_b = xf_b.apply(f.local_point);
            let point_a = xf_a.apply(proxy_a.vertex(ia(0)));

            let mut s = (point_a - point_b).dot(normal);
            if s < 0.0 {
                f.axis = -f.axis;
                s = -s;
            }
            return (f, s);
        }

        // Two points on A and one or two points on B.
        f.kind = SeparationType::FaceA;
        let local_a1 = proxy_a.vertex(ia(0));
        let local_a2 = proxy_a.vertex(ia(1));

        f.axis = (local_a2 - local_a1).cross_scalar(1.0).normalized();
        let normal = xf_a.q.apply(f.axis);

        f.local_point = (local_a1 + local_a2) * 0.5;
        let point_a = xf_a.apply(f.local_point);
        let point_b = xf_b.apply(proxy_b.vertex(ib(0)));

        let mut s = (point_b - point_a).dot(normal);
        if s < 0.0 {
            f.axis = -f.axis;
            s = -s;
        }
        (f, s)
    }

    /// Deepest points at time `t` and their separation along the axis.
    fn find_min_separation(&self, t: f32) -> (usize, usize, f32) {
        let xf_a = self.sweep_a.transform(t);
        let xf_b = self.sweep_b.transform(t);

        match self.kind {
            SeparationType::Points => {
                let axis_a = xf_a.q.apply_inv(self.axis);
                let axis_b = xf_b.q.apply_inv(-self.axis);
                let index_a = self.proxy_a.support(axis_a);
                let index_b = self.proxy_b.support(axis_b);
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (index_a, index_b, (point_b - point_a).dot(self.axis))
            }
            SeparationType::FaceA => {
                let normal = xf_a.q.apply(self.axis);
                let point_a = xf_a.apply(self.local_point);
                let axis_b = xf_b.q.apply_inv(-normal);
                let index_b = self.proxy_b.support(axis_b);
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (0, index_b, (point_b - point_a).dot(normal))
            }
            SeparationType::FaceB => {
                let normal = xf_b.q.apply(self.axis);
                let point_b = xf_b.apply(self.local_point);
                let axis_a = xf_a.q.apply_inv(-normal);
                let index_a = self.proxy_a.support(axis_a);
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                (index_a, 0, (point_a - point_b).dot(normal))
            }
        }
    }

    /// Separation of fixed support points at time `t`.
    fn evaluate(&self, index_a: usize, index_b: usize, t: f32) -> f32 {
        let xf_a = self.sweep_a.transform(t);
        let xf_b = self.sweep_b.transform(t);

        match self.kind {
            SeparationType::Points => {
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(self.axis)
            }
            SeparationType::FaceA => {
                let normal = xf_a.q.apply(self.axis);
                let point_a = xf_a.apply(self.local_point);
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(normal)
            }
            SeparationType::FaceB => {
                let normal = xf_b.q.apply(self.axis);
                let point_b = xf_b.apply(self.local_point);
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                (point_a - point_b).dot(normal)
            }
        }
    }
}

/// Earliest time in `[0, t_max]` at which the proxies reach the target
/// separation.
///
/// The sweeps are normalized internally; the caller's copies are untouched.
#[must_use]
pub fn time_of_impact(input: &ToiInput) -> ToiOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;

    // Large rotations can make the root finder fail, so normalize the sweep
    // angles.
    sweep_a.normalize();
    sweep_b.normalize();

    let t_max = input.t_max;

    let total_radius = proxy_a.radius + proxy_b.radius;
    let target = LINEAR_SLOP.max(total_radius - 3.0 * LINEAR_SLOP);
    let tolerance = 0.25 * LINEAR_SLOP;
    debug_assert!(target > tolerance);

    let mut t1 = 0.0;
    let mut iter = 0;

    // Prepare input for distance query.
    let mut cache = SimplexCache::default();
    let mut distance_input = DistanceInput {
        proxy_a: input.proxy_a,
        proxy_b: input.proxy_b,
        transform_a: sweep_a.transform(t1),
        transform_b: sweep_b.transform(t1),
        use_radii: false,
    };

    // The outer loop progressively attempts to compute new separating axes.
    // This loop terminates when an axis is repeated (no progress is made).
    loop {
        distance_input.transform_a = sweep_a.transform(t1);
        distance_input.transform_b = sweep_b.transform(t1);

        // Get the distance between shapes. We can also use the results
        // to get a separating axis.
        let output = distance(&mut cache, &distance_input);

        // If the shapes are overlapped, we give up on continuous collision.
        if output.distance <= 0.0 {
            return ToiOutput {
                state: ToiState::Overlapped,
                t: 0.0,
            };
        }

        if output.distance < target + tolerance {
            // Victory!
            return ToiOutput {
                state: ToiState::Touching,
                t: t1,
            };
        }

        // Initialize the separating axis.
        let (fcn, _) = SeparationFunction::new(&cache, proxy_a, &sweep_a, proxy_b, &sweep_b, t1);

        // Compute the TOI on the separating axis. We do this by successively
        // resolving the deepest point. This loop is bounded by the number of
        // vertices.
        let mut t2 = t_max;
        let mut push_back_iter = 0;
        loop {
            // Find the deepest point at t2. Store the witness point indices.
            let (index_a, index_b, mut s2) = fcn.find_min_separation(t2);

            // Is the final configuration separated?
            if s2 > target + tolerance {
                // Victory!
                return ToiOutput {
                    state: ToiState::Separated,
                    t: t_max,
                };
            }

            // Has the separation reached tolerance?
            if s2 > target - tolerance {
                // Advance the sweeps
                t1 = t2;
                break;
            }

            // Compute the initial separation of the witness points.
            let mut s1 = fcn.evaluate(index_a, index_b, t1);

            // Check for initial overlap. This might happen if the root finder
            // runs out of iterations.
            if s1 < target - tolerance {
                return ToiOutput {
                    state: ToiState::Failed,
                    t: t1,
                };
            }

            // Check for touching
            if s1 <= target + tolerance {
                // Victory! t1 should hold the TOI (could be 0.0).
                return ToiOutput {
                    state: ToiState::Touching,
                    t: t1,
                };
            }

            // Compute 1D root of: f(x) - target = 0
            let mut root_iter = 0;
            let mut a1 = t1;
            let mut a2 = t2;
            loop {
                // Use a mix of the secant rule and bisection.
                let t = if root_iter & 1 == 1 {
                    // Secant rule to improve convergence.
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    // Bisection to guarantee progress.
                    0.5 * (a1 + a2)
                };
                root_iter += 1;

                let s = fcn.evaluate(index_a, index_b, t);

                if (s - target).abs() < tolerance {
                    // t2 holds a tentative value for t1
                    t2 = t;
                    break;
                }

                // Ensure we continue to bracket the root.
                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }

                if root_iter == MAX_ROOT_ITERATIONS {
                    break;
                }
            }

            push_back_iter += 1;
            if push_back_iter == MAX_POLYGON_VERTICES {
                break;
            }
        }

        iter += 1;
        if iter == MAX_TOI_ITERATIONS {
            // Root finder got stuck. Semi-victory.
            return ToiOutput {
                state: ToiState::Failed,
                t: t1,
            };
        }
    }
}
