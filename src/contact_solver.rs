//! Contact Constraint Solver
//!
//! Sequential impulses over the touching contacts of one island.
//!
//! - Velocity rows: one normal row per manifold point plus a box-friction
//!   tangent row clamped to `friction * normal_impulse`.
//! - Two-point manifolds are solved as a 2x2 LCP (block solver) when the
//!   effective-mass matrix is well conditioned, otherwise only the first
//!   point is kept.
//! - Restitution adds a velocity bias when the approach speed exceeds the
//!   contact's threshold.
//! - Position correction is non-linear Gauss-Seidel on the manifold
//!   evaluated at the current positions, clamped by
//!   [`MAX_LINEAR_CORRECTION`].

use crate::arena::{Arena, BodyId, ContactId};
use crate::body::Body;
use crate::collision::{Manifold, ManifoldType, WorldManifold};
use crate::contact::Contact;
use crate::event::ContactImpulse;
use crate::math::{Mat22, Rot, Transform, Vec2};
use crate::settings::{
    BAUMGARTE, LINEAR_SLOP, MAX_LINEAR_CORRECTION, MAX_MANIFOLD_POINTS, TOI_BAUMGARTE,
};
use crate::step::{Position, TimeStep, Velocity};

/// Ill-conditioning bound for the block solver.
const MAX_CONDITION_NUMBER: f32 = 1000.0;

#[derive(Clone, Copy, Debug, Default)]
struct VelocityConstraintPoint {
    r_a: Vec2,
    r_b: Vec2,
    normal_impulse: f32,
    tangent_impulse: f32,
    normal_mass: f32,
    tangent_mass: f32,
    velocity_bias: f32,
}

#[derive(Clone, Copy, Debug)]
struct VelocityConstraint {
    contact: ContactId,
    points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    normal: Vec2,
    normal_mass: Mat22,
    k: Mat22,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_i_a: f32,
    inv_i_b: f32,
    friction: f32,
    restitution: f32,
    threshold: f32,
    tangent_speed: f32,
    point_count: usize,
}

#[derive(Clone, Copy, Debug)]
struct PositionConstraint {
    manifold: Manifold,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f32,
    inv_mass_b: f32,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_i_a: f32,
    inv_i_b: f32,
    radius_a: f32,
    radius_b: f32,
}

impl PositionConstraint {
    fn transforms(&self, positions: &[Position]) -> (Transform, Transform) {
        let pa = positions[self.index_a];
        let pb = positions[self.index_b];
        let q_a = Rot::from_angle(pa.a);
        let q_b = Rot::from_angle(pb.a);
        (
            Transform {
                p: pa.c - q_a.apply(self.local_center_a),
                q: q_a,
            },
            Transform {
                p: pb.c - q_b.apply(self.local_center_b),
                q: q_b,
            },
        )
    }

    /// Normal (A to B), contact point and separation of point `index` at
    /// the given transforms.
    fn evaluate(&self, xf_a: &Transform, xf_b: &Transform, index: usize) -> (Vec2, Vec2, f32) {
        let m = &self.manifold;
        let radii = self.radius_a + self.radius_b;
        match m.manifold_type {
            ManifoldType::Circles => {
                let point_a = xf_a.apply(m.local_point);
                let point_b = xf_b.apply(m.points[0].local_point);
                let normal = (point_b - point_a).normalized();
                let point = (point_a + point_b) * 0.5;
                (normal, point, (point_b - point_a).dot(normal) - radii)
            }
            ManifoldType::FaceA => {
                let normal = xf_a.q.apply(m.local_normal);
                let plane_point = xf_a.apply(m.local_point);
                let clip_point = xf_b.apply(m.points[index].local_point);
                (
                    normal,
                    clip_point,
                    (clip_point - plane_point).dot(normal) - radii,
                )
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q.apply(m.local_normal);
                let plane_point = xf_b.apply(m.local_point);
                let clip_point = xf_a.apply(m.points[index].local_point);
                // Flip so the normal points from A to B.
                (
                    -normal,
                    clip_point,
                    (clip_point - plane_point).dot(normal) - radii,
                )
            }
        }
    }
}

/// Solver state for the contacts of one island.
#[derive(Debug)]
pub(crate) struct ContactSolver {
    velocity_constraints: Vec<VelocityConstraint>,
    position_constraints: Vec<PositionConstraint>,
}

impl ContactSolver {
    /// Capture the contacts' manifolds and material. Bodies must already
    /// carry their island index.
    pub(crate) fn new(
        step: TimeStep,
        contact_ids: &[ContactId],
        contacts: &Arena<ContactId, Contact>,
        bodies: &Arena<BodyId, Body>,
    ) -> Self {
        let mut velocity_constraints = Vec::with_capacity(contact_ids.len());
        let mut position_constraints = Vec::with_capacity(contact_ids.len());

        for &id in contact_ids {
            let contact = &contacts[id];
            let body_a = &bodies[contact.body_a];
            let body_b = &bodies[contact.body_b];
            let manifold = contact.manifold;
            debug_assert!(manifold.point_count > 0);

            let (inv_mass_a, inv_i_a) = (body_a.inv_mass, body_a.inv_i);
            let (inv_mass_b, inv_i_b) = (body_b.inv_mass, body_b.inv_i);

            let mut points = [VelocityConstraintPoint::default(); MAX_MANIFOLD_POINTS];
            for (vcp, mp) in points.iter_mut().zip(manifold.points()) {
                if step.warm_starting {
                    vcp.normal_impulse = step.dt_ratio * mp.normal_impulse;
                    vcp.tangent_impulse = step.dt_ratio * mp.tangent_impulse;
                }
            }

            velocity_constraints.push(VelocityConstraint {
                contact: id,
                points,
                normal: Vec2::ZERO,
                normal_mass: Mat22::ZERO,
                k: Mat22::ZERO,
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a,
                inv_mass_b,
                inv_i_a,
                inv_i_b,
                friction: contact.friction,
                restitution: contact.restitution,
                threshold: contact.restitution_threshold,
                tangent_speed: contact.tangent_speed,
                point_count: manifold.point_count,
            });

            position_constraints.push(PositionConstraint {
                manifold,
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a,
                inv_mass_b,
                local_center_a: body_a.sweep.local_center,
                local_center_b: body_b.sweep.local_center,
                inv_i_a,
                inv_i_b,
                radius_a: contact.radius_a,
                radius_b: contact.radius_b,
            });
        }

        Self {
            velocity_constraints,
            position_constraints,
        }
    }

    /// Number of contact constraints.
    pub(crate) fn len(&self) -> usize {
        self.velocity_constraints.len()
    }

    /// Compute anchors, effective masses and restitution bias.
    pub(crate) fn initialize_velocity_constraints(
        &mut self,
        positions: &[Position],
        velocities: &[Velocity],
    ) {
        for (vc, pc) in self
            .velocity_constraints
            .iter_mut()
            .zip(&self.position_constraints)
        {
            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);
            let c_a = positions[vc.index_a].c;
            let c_b = positions[vc.index_b].c;
            let Velocity { v: v_a, w: w_a } = velocities[vc.index_a];
            let Velocity { v: v_b, w: w_b } = velocities[vc.index_b];

            let (xf_a, xf_b) = pc.transforms(positions);
            let world_manifold =
                WorldManifold::new(&pc.manifold, &xf_a, pc.radius_a, &xf_b, pc.radius_b);

            vc.normal = world_manifold.normal;
            let tangent = vc.normal.cross_scalar(1.0);

            for j in 0..vc.point_count {
                let vcp = &mut vc.points[j];
                vcp.r_a = world_manifold.points[j] - c_a;
                vcp.r_b = world_manifold.points[j] - c_b;

                let rn_a = vcp.r_a.cross(vc.normal);
                let rn_b = vcp.r_b.cross(vc.normal);
                let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                vcp.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let rt_a = vcp.r_a.cross(tangent);
                let rt_b = vcp.r_b.cross(tangent);
                let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
                vcp.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                // Velocity bias for restitution.
                vcp.velocity_bias = 0.0;
                let v_rel = vc.normal.dot(
                    v_b + Vec2::scalar_cross(w_b, vcp.r_b)
                        - v_a
                        - Vec2::scalar_cross(w_a, vcp.r_a),
                );
                if v_rel < -vc.threshold {
                    vcp.velocity_bias = -vc.restitution * v_rel;
                }
            }

            if vc.point_count == 2 {
                let vcp1 = vc.points[0];
                let vcp2 = vc.points[1];

                let rn1_a = vcp1.r_a.cross(vc.normal);
                let rn1_b = vcp1.r_b.cross(vc.normal);
                let rn2_a = vcp2.r_a.cross(vc.normal);
                let rn2_b = vcp2.r_b.cross(vc.normal);

                let k11 = m_a + m_b + i_a * rn1_a * rn1_a + i_b * rn1_b * rn1_b;
                let k22 = m_a + m_b + i_a * rn2_a * rn2_a + i_b * rn2_b * rn2_b;
                let k12 = m_a + m_b + i_a * rn1_a * rn2_a + i_b * rn1_b * rn2_b;

                if k11 * k11 < MAX_CONDITION_NUMBER * (k11 * k22 - k12 * k12) {
                    vc.k = Mat22::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));
                    vc.normal_mass = vc.k.inverse();
                } else {
                    // The constraints are redundant; keep one point.
                    vc.point_count = 1;
                }
            }
        }
    }

    /// Apply the impulses carried over from the previous step.
    pub(crate) fn warm_start(&self, velocities: &mut [Velocity]) {
        for vc in &self.velocity_constraints {
            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);
            let mut va = velocities[vc.index_a];
            let mut vb = velocities[vc.index_b];
            let tangent = vc.normal.cross_scalar(1.0);

            for vcp in &vc.points[..vc.point_count] {
                let p = vc.normal * vcp.normal_impulse + tangent * vcp.tangent_impulse;
                va.w -= i_a * vcp.r_a.cross(p);
                va.v -= p * m_a;
                vb.w += i_b * vcp.r_b.cross(p);
                vb.v += p * m_b;
            }

            velocities[vc.index_a] = va;
            velocities[vc.index_b] = vb;
        }
    }

    /// One velocity iteration over every contact, in island order.
    pub(crate) fn solve_velocity_constraints(&mut self, velocities: &mut [Velocity]) {
        for vc in &mut self.velocity_constraints {
            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);
            let Velocity { v: mut v_a, w: mut w_a } = velocities[vc.index_a];
            let Velocity { v: mut v_b, w: mut w_b } = velocities[vc.index_b];

            let normal = vc.normal;
            let tangent = normal.cross_scalar(1.0);
            let count = vc.point_count;

            // Friction first: non-penetration matters more.
            for vcp in &mut vc.points[..count] {
                let dv = v_b + Vec2::scalar_cross(w_b, vcp.r_b)
                    - v_a
                    - Vec2::scalar_cross(w_a, vcp.r_a);
                let vt = dv.dot(tangent) - vc.tangent_speed;
                let lambda = vcp.tangent_mass * -vt;

                let max_friction = vc.friction * vcp.normal_impulse;
                let new_impulse =
                    (vcp.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                let lambda = new_impulse - vcp.tangent_impulse;
                vcp.tangent_impulse = new_impulse;

                let p = tangent * lambda;
                v_a -= p * m_a;
                w_a -= i_a * vcp.r_a.cross(p);
                v_b += p * m_b;
                w_b += i_b * vcp.r_b.cross(p);
            }

            if count == 1 {
                let vcp = &mut vc.points[0];
                let dv = v_b + Vec2::scalar_cross(w_b, vcp.r_b)
                    - v_a
                    - Vec2::scalar_cross(w_a, vcp.r_a);
                let vn = dv.dot(normal);
                let lambda = -vcp.normal_mass * (vn - vcp.velocity_bias);

                let new_impulse = (vcp.normal_impulse + lambda).max(0.0);
                let lambda = new_impulse - vcp.normal_impulse;
                vcp.normal_impulse = new_impulse;

                let p = normal * lambda;
                v_a -= p * m_a;
                w_a -= i_a * vcp.r_a.cross(p);
                v_b += p * m_b;
                w_b += i_b * vcp.r_b.cross(p);
            } else {
                // Block solver: find x with vn = A * x + b, vn >= 0, x >= 0
                // and vn_i * x_i = 0 by enumerating the four cases.
                let [cp1, cp2] = &mut vc.points;
                let a = Vec2::new(cp1.normal_impulse, cp2.normal_impulse);
                debug_assert!(a.x >= 0.0 && a.y >= 0.0);

                let dv1 = v_b + Vec2::scalar_cross(w_b, cp1.r_b)
                    - v_a
                    - Vec2::scalar_cross(w_a, cp1.r_a);
                let dv2 = v_b + Vec2::scalar_cross(w_b, cp2.r_b)
                    - v_a
                    - Vec2::scalar_cross(w_a, cp2.r_a);

                let vn1 = dv1.dot(normal);
                let vn2 = dv2.dot(normal);

                let b = Vec2::new(vn1 - cp1.velocity_bias, vn2 - cp2.velocity_bias);
                // Relative to the accumulated impulse: b' = b - A * a.
                let b = b - vc.k.mul_vec(a);

                let candidates = [
                    // Both points active.
                    {
                        let x = -vc.normal_mass.mul_vec(b);
                        (x, x.x >= 0.0 && x.y >= 0.0)
                    },
                    // Only point 1 active.
                    {
                        let x = Vec2::new(-cp1.normal_mass * b.x, 0.0);
                        let vn2 = vc.k.ex.y * x.x + b.y;
                        (x, x.x >= 0.0 && vn2 >= 0.0)
                    },
                    // Only point 2 active.
                    {
                        let x = Vec2::new(0.0, -cp2.normal_mass * b.y);
                        let vn1 = vc.k.ey.x * x.y + b.x;
                        (x, x.y >= 0.0 && vn1 >= 0.0)
                    },
                    // Neither point active.
                    (Vec2::ZERO, b.x >= 0.0 && b.y >= 0.0),
                ];

                // No case applies when the LCP has no solution; keep the
                // old impulses then.
                if let Some(&(x, _)) = candidates.iter().find(|(_, ok)| *ok) {
                    let d = x - a;
                    let p1 = normal * d.x;
                    let p2 = normal * d.y;
                    v_a -= (p1 + p2) * m_a;
                    w_a -= i_a * (cp1.r_a.cross(p1) + cp2.r_a.cross(p2));
                    v_b += (p1 + p2) * m_b;
                    w_b += i_b * (cp1.r_b.cross(p1) + cp2.r_b.cross(p2));

                    cp1.normal_impulse = x.x;
                    cp2.normal_impulse = x.y;
                }
            }

            velocities[vc.index_a] = Velocity { v: v_a, w: w_a };
            velocities[vc.index_b] = Velocity { v: v_b, w: w_b };
        }
    }

    /// Copy accumulated impulses back into the contacts' manifolds.
    pub(crate) fn store_impulses(&self, contacts: &mut Arena<ContactId, Contact>) {
        for vc in &self.velocity_constraints {
            let Some(contact) = contacts.get_mut(vc.contact) else {
                continue;
            };
            for (mp, vcp) in contact.manifold.points.iter_mut().zip(&vc.points[..vc.point_count]) {
                mp.normal_impulse = vcp.normal_impulse;
                mp.tangent_impulse = vcp.tangent_impulse;
            }
        }
    }

    /// Solved impulses per contact, in constraint order.
    pub(crate) fn impulses(&self) -> impl Iterator<Item = (ContactId, ContactImpulse)> + '_ {
        self.velocity_constraints.iter().map(|vc| {
            let mut impulse = ContactImpulse {
                count: vc.point_count,
                ..ContactImpulse::default()
            };
            for (j, vcp) in vc.points[..vc.point_count].iter().enumerate() {
                impulse.normal_impulses[j] = vcp.normal_impulse;
                impulse.tangent_impulses[j] = vcp.tangent_impulse;
            }
            (vc.contact, impulse)
        })
    }

    /// One position iteration. Returns true once the deepest penetration is
    /// within `3 * LINEAR_SLOP`.
    pub(crate) fn solve_position_constraints(&self, positions: &mut [Position]) -> bool {
        self.solve_positions(positions, BAUMGARTE, None) >= -3.0 * LINEAR_SLOP
    }

    /// Position iteration for a time-of-impact sub-step. Only the two TOI
    /// bodies move.
    pub(crate) fn solve_toi_position_constraints(
        &self,
        positions: &mut [Position],
        toi_index_a: usize,
        toi_index_b: usize,
    ) -> bool {
        self.solve_positions(positions, TOI_BAUMGARTE, Some((toi_index_a, toi_index_b)))
            >= -1.5 * LINEAR_SLOP
    }

    fn solve_positions(
        &self,
        positions: &mut [Position],
        baumgarte: f32,
        toi: Option<(usize, usize)>,
    ) -> f32 {
        let mut min_separation = 0.0f32;

        for pc in &self.position_constraints {
            let movable = |index: usize| match toi {
                Some((a, b)) => index == a || index == b,
                None => true,
            };
            let (m_a, i_a) = if movable(pc.index_a) {
                (pc.inv_mass_a, pc.inv_i_a)
            } else {
                (0.0, 0.0)
            };
            let (m_b, i_b) = if movable(pc.index_b) {
                (pc.inv_mass_b, pc.inv_i_b)
            } else {
                (0.0, 0.0)
            };

            for j in 0..pc.manifold.point_count {
                let (xf_a, xf_b) = pc.transforms(positions);
                let (normal, point, separation) = pc.evaluate(&xf_a, &xf_b, j);

                let mut pa = positions[pc.index_a];
                let mut pb = positions[pc.index_b];
                let r_a = point - pa.c;
                let r_b = point - pb.c;

                min_separation = min_separation.min(separation);

                // Prevent large corrections and allow slop.
                let c = (baumgarte * (separation + LINEAR_SLOP)).clamp(-MAX_LINEAR_CORRECTION, 0.0);

                let rn_a = r_a.cross(normal);
                let rn_b = r_b.cross(normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                let impulse = if k > 0.0 { -c / k } else { 0.0 };
                let p = normal * impulse;

                pa.c -= p * m_a;
                pa.a -= i_a * r_a.cross(p);
                pb.c += p * m_b;
                pb.a += i_b * r_b.cross(p);

                positions[pc.index_a] = pa;
                positions[pc.index_b] = pb;
            }
        }

        min_separation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDef;
    use crate::contact::ContactKind;
    use crate::fixture::{Fixture, FixtureDef};
    use crate::shape::Shape;

    struct Scene {
        bodies: Arena<BodyId, Body>,
        contacts: Arena<ContactId, Contact>,
        id: ContactId,
        positions: Vec<Position>,
        velocities: Vec<Velocity>,
    }

    /// Two unit circles, A static at the origin and B dynamic at `(0, y)`
    /// moving with `vy`.
    fn circles(y: f32, vy: f32, restitution: f32) -> Scene {
        let mut bodies = Arena::new();
        let a = bodies.insert(Body::new(&BodyDef::fixed(Vec2::ZERO)));
        let b = bodies.insert(Body::new(
            &BodyDef::dynamic(Vec2::new(0.0, y)).with_velocity(Vec2::new(0.0, vy), 0.0),
        ));
        bodies[a].island_index = 0;
        bodies[b].island_index = 1;

        let circle = Shape::circle(Vec2::ZERO, 1.0).unwrap();
        let mut fixtures = Arena::new();
        let fa = fixtures.insert(Fixture::new(a, &FixtureDef::new(circle.clone())));
        let fb = fixtures.insert(Fixture::new(
            b,
            &FixtureDef::new(circle).with_restitution(restitution),
        ));

        let mut contact = Contact::new(
            ContactKind::CircleCircle,
            (fa, 0, &fixtures[fa]),
            (fb, 0, &fixtures[fb]),
        );
        let update = contact.compute_update(
            &fixtures[fa],
            &fixtures[fb],
            bodies[a].transform(),
            bodies[b].transform(),
        );
        contact.apply_update(update);
        assert!(contact.is_touching());

        let mut contacts = Arena::new();
        let id = contacts.insert(contact);

        let positions = vec![
            Position { c: Vec2::ZERO, a: 0.0 },
            Position { c: Vec2::new(0.0, y), a: 0.0 },
        ];
        let velocities = vec![
            Velocity::default(),
            Velocity { v: Vec2::new(0.0, vy), w: 0.0 },
        ];
        Scene {
            bodies,
            contacts,
            id,
            positions,
            velocities,
        }
    }

    fn step() -> TimeStep {
        TimeStep {
            dt: 1.0 / 60.0,
            inv_dt: 60.0,
            dt_ratio: 1.0,
            velocity_iterations: 8,
            position_iterations: 3,
            warm_starting: true,
        }
    }

    #[test]
    fn test_inelastic_contact_stops_approach() {
        let mut s = circles(1.99, -5.0, 0.0);
        let mut solver = ContactSolver::new(step(), &[s.id], &s.contacts, &s.bodies);
        assert_eq!(solver.len(), 1);
        solver.initialize_velocity_constraints(&s.positions, &s.velocities);
        solver.warm_start(&mut s.velocities);
        for _ in 0..8 {
            solver.solve_velocity_constraints(&mut s.velocities);
        }
        assert!(s.velocities[1].v.y.abs() < 1e-4);
        // Static body never moves.
        assert_eq!(s.velocities[0].v, Vec2::ZERO);

        solver.store_impulses(&mut s.contacts);
        let stored = s.contacts[s.id].manifold().points[0].normal_impulse;
        assert!((stored - 5.0).abs() < 1e-3, "impulse {stored}");

        let (id, impulse) = solver.impulses().next().unwrap();
        assert_eq!(id, s.id);
        assert_eq!(impulse.count, 1);
        assert!((impulse.normal_impulses[0] - stored).abs() < 1e-6);
    }

    #[test]
    fn test_restitution_above_threshold_bounces() {
        let mut s = circles(1.99, -5.0, 1.0);
        let mut solver = ContactSolver::new(step(), &[s.id], &s.contacts, &s.bodies);
        solver.initialize_velocity_constraints(&s.positions, &s.velocities);
        for _ in 0..8 {
            solver.solve_velocity_constraints(&mut s.velocities);
        }
        assert!((s.velocities[1].v.y - 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_restitution_below_threshold_is_ignored() {
        let mut s = circles(1.99, -0.5, 1.0);
        let mut solver = ContactSolver::new(step(), &[s.id], &s.contacts, &s.bodies);
        solver.initialize_velocity_constraints(&s.positions, &s.velocities);
        for _ in 0..8 {
            solver.solve_velocity_constraints(&mut s.velocities);
        }
        assert!(s.velocities[1].v.y.abs() < 1e-4);
    }

    #[test]
    fn test_position_solve_resolves_overlap() {
        let mut s = circles(1.8, 0.0, 0.0);
        let solver = ContactSolver::new(step(), &[s.id], &s.contacts, &s.bodies);
        let mut done = false;
        for _ in 0..20 {
            if solver.solve_position_constraints(&mut s.positions) {
                done = true;
                break;
            }
        }
        assert!(done);
        assert!(s.positions[1].c.y > 1.8);
        assert_eq!(s.positions[0].c, Vec2::ZERO);
    }

    #[test]
    fn test_toi_solve_only_moves_toi_bodies() {
        let mut s = circles(1.8, 0.0, 0.0);
        let solver = ContactSolver::new(step(), &[s.id], &s.contacts, &s.bodies);
        solver.solve_toi_position_constraints(&mut s.positions, 0, 0);
        // Body B sits at island index 1, which is frozen.
        assert_eq!(s.positions[1].c, Vec2::new(0.0, 1.8));
    }
}
