//! Motor Joint
//!
//! Drives body B towards a position and angle relative to body A, limited
//! by a maximum force and torque. Typically used to animate a dynamic body
//! against the ground.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::arena::BodyId;
use crate::error::{PhysicsError, PhysicsResult};
use crate::joint::{check_finite, SolverBodies};
use crate::joint_friction::point_mass;
use crate::math::{Mat22, Rot, Vec2};
use crate::step::SolverData;
use crate::world::World;

/// Motor joint definition.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorJointDef {
    /// First body
    pub body_a: BodyId,
    /// Second body
    pub body_b: BodyId,
    /// Allow the bodies to collide
    pub collide_connected: bool,
    /// Application data
    pub user_data: u64,
    /// Target position of body B in body A's frame
    pub linear_offset: Vec2,
    /// Target angle of body B minus angle of body A
    pub angular_offset: f32,
    /// Maximum motor force (N)
    pub max_force: f32,
    /// Maximum motor torque (N·m)
    pub max_torque: f32,
    /// Position correction factor in [0, 1]
    pub correction_factor: f32,
}

impl MotorJointDef {
    /// Definition with zero offsets.
    #[must_use]
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            linear_offset: Vec2::ZERO,
            angular_offset: 0.0,
            max_force: 1.0,
            max_torque: 1.0,
            correction_factor: 0.3,
        }
    }

    /// Offsets taken from the bodies' current placement.
    pub fn initialize(world: &World, body_a: BodyId, body_b: BodyId) -> PhysicsResult<Self> {
        let (a, b) = world.body_pair(body_a, body_b)?;
        Ok(Self {
            linear_offset: a.local_point(b.position()),
            angular_offset: b.angle() - a.angle(),
            ..Self::new(body_a, body_b)
        })
    }
}

/// Motor joint state.
#[derive(Clone, Debug)]
pub struct MotorJoint {
    linear_offset: Vec2,
    angular_offset: f32,
    max_force: f32,
    max_torque: f32,
    correction_factor: f32,

    linear_impulse: Vec2,
    angular_impulse: f32,

    sb: SolverBodies,
    r_a: Vec2,
    r_b: Vec2,
    linear_error: Vec2,
    angular_error: f32,
    linear_mass: Mat22,
    angular_mass: f32,
}

impl MotorJoint {
    pub(crate) fn new(def: &MotorJointDef) -> PhysicsResult<Self> {
        check_finite(
            &[
                def.linear_offset.x,
                def.linear_offset.y,
                def.angular_offset,
                def.max_force,
                def.max_torque,
                def.correction_factor,
            ],
            "motor joint parameters must be finite",
        )?;
        if def.max_force < 0.0 || def.max_torque < 0.0 {
            return Err(PhysicsError::InvalidJoint {
                reason: "motor joint limits must be non-negative",
            });
        }
        if !(0.0..=1.0).contains(&def.correction_factor) {
            return Err(PhysicsError::InvalidJoint {
                reason: "motor correction factor must be in [0, 1]",
            });
        }
        Ok(Self {
            linear_offset: def.linear_offset,
            angular_offset: def.angular_offset,
            max_force: def.max_force,
            max_torque: def.max_torque,
            correction_factor: def.correction_factor,
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
            sb: SolverBodies::default(),
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            linear_error: Vec2::ZERO,
            angular_error: 0.0,
            linear_mass: Mat22::ZERO,
            angular_mass: 0.0,
        })
    }

    /// Target position of body B in body A's frame.
    #[must_use]
    pub fn linear_offset(&self) -> Vec2 {
        self.linear_offset
    }

    /// Set the target position.
    pub fn set_linear_offset(&mut self, offset: Vec2) {
        self.linear_offset = offset;
    }

    /// Target relative angle.
    #[must_use]
    pub fn angular_offset(&self) -> f32 {
        self.angular_offset
    }

    /// Set the target relative angle.
    pub fn set_angular_offset(&mut self, offset: f32) {
        self.angular_offset = offset;
    }

    /// Maximum force.
    #[must_use]
    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    /// Set the maximum force.
    pub fn set_max_force(&mut self, force: f32) {
        self.max_force = force.max(0.0);
    }

    /// Maximum torque.
    #[must_use]
    pub fn max_torque(&self) -> f32 {
        self.max_torque
    }

    /// Set the maximum torque.
    pub fn set_max_torque(&mut self, torque: f32) {
        self.max_torque = torque.max(0.0);
    }

    /// Position correction factor.
    #[must_use]
    pub fn correction_factor(&self) -> f32 {
        self.correction_factor
    }

    /// Set the correction factor, clamped to [0, 1].
    pub fn set_correction_factor(&mut self, factor: f32) {
        self.correction_factor = factor.clamp(0.0, 1.0);
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.linear_impulse * inv_dt
    }

    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.angular_impulse
    }

    pub(crate) fn init_velocity_constraints(&mut self, sb: SolverBodies, data: &mut SolverData) {
        self.sb = sb;
        let pa = data.positions[sb.index_a];
        let pb = data.positions[sb.index_b];
        let (mut va, mut vb) = sb.velocities(data);

        let qa = Rot::from_angle(pa.a);
        let qb = Rot::from_angle(pb.a);
        self.r_a = qa.apply(self.linear_offset - sb.local_center_a);
        self.r_b = qb.apply(-sb.local_center_b);
        self.linear_mass = point_mass(&sb, self.r_a, self.r_b).inverse();

        self.angular_mass = sb.inv_i_a + sb.inv_i_b;
        if self.angular_mass > 0.0 {
            self.angular_mass = 1.0 / self.angular_mass;
        }

        self.linear_error = pb.c + self.r_b - pa.c - self.r_a;
        self.angular_error = pb.a - pa.a - self.angular_offset;

        if data.step.warm_starting {
            self.linear_impulse *= data.step.dt_ratio;
            self.angular_impulse *= data.step.dt_ratio;

            let p = self.linear_impulse;
            va.v -= p * sb.inv_mass_a;
            va.w -= sb.inv_i_a * (self.r_a.cross(p) + self.angular_impulse);
            vb.v += p * sb.inv_mass_b;
            vb.w += sb.inv_i_b * (self.r_b.cross(p) + self.angular_impulse);
        } else {
            self.linear_impulse = Vec2::ZERO;
            self.angular_impulse = 0.0;
        }

        sb.store_velocities(data, va, vb);
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let sb = self.sb;
        let (mut va, mut vb) = sb.velocities(data);
        let h = data.step.dt;
        let inv_h = data.step.inv_dt;

        {
            let cdot = vb.w - va.w + inv_h * self.correction_factor * self.angular_error;
            let impulse = -self.angular_mass * cdot;
            let old = self.angular_impulse;
            let max_impulse = h * self.max_torque;
            self.angular_impulse = (old + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.angular_impulse - old;
            va.w -= sb.inv_i_a * impulse;
            vb.w += sb.inv_i_b * impulse;
        }

        {
            let cdot = vb.v + Vec2::scalar_cross(vb.w, self.r_b)
                - va.v
                - Vec2::scalar_cross(va.w, self.r_a)
                + self.linear_error * (inv_h * self.correction_factor);
            let impulse = -self.linear_mass.mul_vec(cdot);
            let old = self.linear_impulse;
            self.linear_impulse += impulse;

            let max_impulse = h * self.max_force;
            if self.linear_impulse.length_squared() > max_impulse * max_impulse {
                self.linear_impulse.normalize();
                self.linear_impulse *= max_impulse;
            }

            let impulse = self.linear_impulse - old;
            va.v -= impulse * sb.inv_mass_a;
            va.w -= sb.inv_i_a * self.r_a.cross(impulse);
            vb.v += impulse * sb.inv_mass_b;
            vb.w += sb.inv_i_b * self.r_b.cross(impulse);
        }

        sb.store_velocities(data, va, vb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Handle, Index};

    fn ids() -> (BodyId, BodyId) {
        (
            BodyId::from_index(Index { slot: 0, generation: 0 }),
            BodyId::from_index(Index { slot: 1, generation: 0 }),
        )
    }

    #[test]
    fn test_correction_factor_validated() {
        let (a, b) = ids();
        let def = MotorJointDef {
            correction_factor: 1.5,
            ..MotorJointDef::new(a, b)
        };
        assert!(MotorJoint::new(&def).is_err());
    }

    #[test]
    fn test_setters() {
        let (a, b) = ids();
        let mut joint = MotorJoint::new(&MotorJointDef::new(a, b)).unwrap();
        joint.set_linear_offset(Vec2::new(1.0, 2.0));
        joint.set_angular_offset(0.5);
        joint.set_correction_factor(3.0);
        joint.set_max_force(-1.0);
        assert_eq!(joint.linear_offset(), Vec2::new(1.0, 2.0));
        assert_eq!(joint.angular_offset(), 0.5);
        assert_eq!(joint.correction_factor(), 1.0);
        assert_eq!(joint.max_force(), 0.0);
    }
}
