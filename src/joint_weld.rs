//! Weld Joint
//!
//! Glues two bodies together. With a positive angular stiffness the
//! rotation becomes a soft spring.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::arena::BodyId;
use crate::error::{PhysicsError, PhysicsResult};
use crate::joint::{check_finite, SolverBodies};
use crate::math::{Mat33, Rot, Vec2, Vec3};
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP};
use crate::step::SolverData;
use crate::world::World;

/// Weld joint definition.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WeldJointDef {
    /// First body
    pub body_a: BodyId,
    /// Second body
    pub body_b: BodyId,
    /// Allow the bodies to collide
    pub collide_connected: bool,
    /// Application data
    pub user_data: u64,
    /// Anchor relative to body A's origin
    pub local_anchor_a: Vec2,
    /// Anchor relative to body B's origin
    pub local_anchor_b: Vec2,
    /// Angle of B minus angle of A in the welded pose
    pub reference_angle: f32,
    /// Angular stiffness (N·m), 0 for a rigid weld
    pub stiffness: f32,
    /// Angular damping (N·m·s)
    pub damping: f32,
}

impl WeldJointDef {
    /// Rigid weld at both body origins.
    #[must_use]
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            reference_angle: 0.0,
            stiffness: 0.0,
            damping: 0.0,
        }
    }

    /// Weld at a world point in the bodies' current pose.
    pub fn initialize(world: &World, body_a: BodyId, body_b: BodyId, anchor: Vec2) -> PhysicsResult<Self> {
        let (a, b) = world.body_pair(body_a, body_b)?;
        Ok(Self {
            local_anchor_a: a.local_point(anchor),
            local_anchor_b: b.local_point(anchor),
            reference_angle: b.angle() - a.angle(),
            ..Self::new(body_a, body_b)
        })
    }
}

/// Weld joint state.
#[derive(Clone, Debug)]
pub struct WeldJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    reference_angle: f32,
    stiffness: f32,
    damping: f32,

    impulse: Vec3,

    sb: SolverBodies,
    r_a: Vec2,
    r_b: Vec2,
    mass: Mat33,
    gamma: f32,
    bias: f32,
}

/// Effective mass of the combined point and angle constraint.
fn weld_mass(sb: &SolverBodies, r_a: Vec2, r_b: Vec2) -> Mat33 {
    let (m_a, m_b, i_a, i_b) = (sb.inv_mass_a, sb.inv_mass_b, sb.inv_i_a, sb.inv_i_b);
    let exx = m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b;
    let eyx = -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b;
    let ezx = -r_a.y * i_a - r_b.y * i_b;
    let eyy = m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b;
    let ezy = r_a.x * i_a + r_b.x * i_b;
    Mat33 {
        ex: Vec3::new(exx, eyx, ezx),
        ey: Vec3::new(eyx, eyy, ezy),
        ez: Vec3::new(ezx, ezy, i_a + i_b),
    }
}

impl WeldJoint {
    pub(crate) fn new(def: &WeldJointDef) -> PhysicsResult<Self> {
        check_finite(
            &[
                def.local_anchor_a.x,
                def.local_anchor_a.y,
                def.local_anchor_b.x,
                def.local_anchor_b.y,
                def.reference_angle,
                def.stiffness,
                def.damping,
            ],
            "weld joint parameters must be finite",
        )?;
        if def.stiffness < 0.0 || def.damping < 0.0 {
            return Err(PhysicsError::InvalidJoint {
                reason: "weld stiffness and damping must be non-negative",
            });
        }
        Ok(Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            stiffness: def.stiffness,
            damping: def.damping,
            impulse: Vec3::ZERO,
            sb: SolverBodies::default(),
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: Mat33::ZERO,
            gamma: 0.0,
            bias: 0.0,
        })
    }

    /// Reference angle.
    #[must_use]
    pub fn reference_angle(&self) -> f32 {
        self.reference_angle
    }

    /// Angular stiffness.
    #[must_use]
    pub fn stiffness(&self) -> f32 {
        self.stiffness
    }

    /// Set the angular stiffness.
    pub fn set_stiffness(&mut self, stiffness: f32) {
        self.stiffness = stiffness;
    }

    /// Angular damping.
    #[must_use]
    pub fn damping(&self) -> f32 {
        self.damping
    }

    /// Set the angular damping.
    pub fn set_damping(&mut self, damping: f32) {
        self.damping = damping;
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        Vec2::new(self.impulse.x, self.impulse.y) * inv_dt
    }

    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse.z
    }

    pub(crate) fn init_velocity_constraints(&mut self, sb: SolverBodies, data: &mut SolverData) {
        self.sb = sb;
        let aa = data.positions[sb.index_a].a;
        let ab = data.positions[sb.index_b].a;
        let (mut va, mut vb) = sb.velocities(data);

        let qa = Rot::from_angle(aa);
        let qb = Rot::from_angle(ab);
        self.r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        self.r_b = qb.apply(self.local_anchor_b - sb.local_center_b);

        let k = weld_mass(&sb, self.r_a, self.r_b);

        if self.stiffness > 0.0 {
            self.mass = k.inverse22();

            let mut inv_m = sb.inv_i_a + sb.inv_i_b;
            let c = ab - aa - self.reference_angle;
            let h = data.step.dt;
            self.gamma = h * (self.damping + h * self.stiffness);
            self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
            self.bias = c * h * self.stiffness * self.gamma;

            inv_m += self.gamma;
            self.mass.ez.z = if inv_m != 0.0 { 1.0 / inv_m } else { 0.0 };
        } else if k.ez.z == 0.0 {
            self.mass = k.inverse22();
            self.gamma = 0.0;
            self.bias = 0.0;
        } else {
            self.mass = k.sym_inverse33();
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            let p = self.impulse.xy();
            va.v -= p * sb.inv_mass_a;
            va.w -= sb.inv_i_a * (self.r_a.cross(p) + self.impulse.z);
            vb.v += p * sb.inv_mass_b;
            vb.w += sb.inv_i_b * (self.r_b.cross(p) + self.impulse.z);
        } else {
            self.impulse = Vec3::ZERO;
        }

        sb.store_velocities(data, va, vb);
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let sb = self.sb;
        let (mut va, mut vb) = sb.velocities(data);

        if self.stiffness > 0.0 {
            let cdot2 = vb.w - va.w;
            let impulse2 = -self.mass.ez.z * (cdot2 + self.bias + self.gamma * self.impulse.z);
            self.impulse.z += impulse2;
            va.w -= sb.inv_i_a * impulse2;
            vb.w += sb.inv_i_b * impulse2;

            let cdot1 = vb.v + Vec2::scalar_cross(vb.w, self.r_b) - va.v - Vec2::scalar_cross(va.w, self.r_a);
            let impulse1 = -self.mass.mul_vec22(cdot1);
            self.impulse.x += impulse1.x;
            self.impulse.y += impulse1.y;

            va.v -= impulse1 * sb.inv_mass_a;
            va.w -= sb.inv_i_a * self.r_a.cross(impulse1);
            vb.v += impulse1 * sb.inv_mass_b;
            vb.w += sb.inv_i_b * self.r_b.cross(impulse1);
        } else {
            let cdot1 = vb.v + Vec2::scalar_cross(vb.w, self.r_b) - va.v - Vec2::scalar_cross(va.w, self.r_a);
            let cdot2 = vb.w - va.w;
            let impulse = -self.mass.mul_vec(Vec3::new(cdot1.x, cdot1.y, cdot2));
            self.impulse += impulse;

            let p = impulse.xy();
            va.v -= p * sb.inv_mass_a;
            va.w -= sb.inv_i_a * (self.r_a.cross(p) + impulse.z);
            vb.v += p * sb.inv_mass_b;
            vb.w += sb.inv_i_b * (self.r_b.cross(p) + impulse.z);
        }

        sb.store_velocities(data, va, vb);
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let sb = self.sb;
        let mut pa = data.positions[sb.index_a];
        let mut pb = data.positions[sb.index_b];

        let qa = Rot::from_angle(pa.a);
        let qb = Rot::from_angle(pb.a);
        let r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        let r_b = qb.apply(self.local_anchor_b - sb.local_center_b);
        let k = weld_mass(&sb, r_a, r_b);

        let c1 = pb.c + r_b - pa.c - r_a;
        let position_error = c1.length();
        let angular_error;

        if self.stiffness > 0.0 {
            angular_error = 0.0;
            let p = -k.solve22(c1);
            pa.c -= p * sb.inv_mass_a;
            pa.a -= sb.inv_i_a * r_a.cross(p);
            pb.c += p * sb.inv_mass_b;
            pb.a += sb.inv_i_b * r_b.cross(p);
        } else {
            let c2 = pb.a - pa.a - self.reference_angle;
            angular_error = c2.abs();

            let impulse = if k.ez.z > 0.0 {
                -k.solve33(Vec3::new(c1.x, c1.y, c2))
            } else {
                let impulse2 = -k.solve22(c1);
                Vec3::new(impulse2.x, impulse2.y, 0.0)
            };

            let p = impulse.xy();
            pa.c -= p * sb.inv_mass_a;
            pa.a -= sb.inv_i_a * (r_a.cross(p) + impulse.z);
            pb.c += p * sb.inv_mass_b;
            pb.a += sb.inv_i_b * (r_b.cross(p) + impulse.z);
        }

        data.positions[sb.index_a] = pa;
        data.positions[sb.index_b] = pb;

        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Handle, Index};
    use crate::step::{Position, TimeStep, Velocity};

    #[test]
    fn test_rigid_weld_stops_relative_motion() {
        let a = BodyId::from_index(Index { slot: 0, generation: 0 });
        let b = BodyId::from_index(Index { slot: 1, generation: 0 });
        let mut joint = WeldJoint::new(&WeldJointDef {
            local_anchor_b: Vec2::new(-1.0, 0.0),
            ..WeldJointDef::new(a, b)
        })
        .unwrap();
        let sb = SolverBodies {
            index_a: 0,
            index_b: 1,
            inv_mass_b: 1.0,
            inv_i_b: 3.0,
            ..SolverBodies::default()
        };
        let mut positions = [Position::default(), Position { c: Vec2::new(1.0, 0.0), a: 0.0 }];
        let mut velocities = [Velocity::default(), Velocity { v: Vec2::new(0.5, 2.0), w: -1.0 }];
        let mut data = SolverData {
            step: TimeStep {
                dt: 1.0 / 60.0,
                inv_dt: 60.0,
                dt_ratio: 1.0,
                velocity_iterations: 8,
                position_iterations: 3,
                warm_starting: false,
            },
            positions: &mut positions,
            velocities: &mut velocities,
        };
        joint.init_velocity_constraints(sb, &mut data);
        joint.solve_velocity_constraints(&mut data);

        let vb = data.velocities[1];
        assert!(vb.v.length() < 1e-4);
        assert!(vb.w.abs() < 1e-4);
        assert!(joint.solve_position_constraints(&mut data));
    }
}
