//! Friction Joint
//!
//! Top-down friction: resists relative translation and rotation up to a
//! maximum force and torque.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::arena::BodyId;
use crate::error::{PhysicsError, PhysicsResult};
use crate::joint::{check_finite, SolverBodies};
use crate::math::{Mat22, Rot, Vec2};
use crate::step::SolverData;
use crate::world::World;

/// Friction joint definition.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrictionJointDef {
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
    /// Maximum friction force (N)
    pub max_force: f32,
    /// Maximum friction torque (N·m)
    pub max_torque: f32,
}

impl FrictionJointDef {
    /// Definition with zero friction.
    #[must_use]
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            max_force: 0.0,
            max_torque: 0.0,
        }
    }

    /// Both anchors at one world point.
    pub fn initialize(world: &World, body_a: BodyId, body_b: BodyId, anchor: Vec2) -> PhysicsResult<Self> {
        let (a, b) = world.body_pair(body_a, body_b)?;
        Ok(Self {
            local_anchor_a: a.local_point(anchor),
            local_anchor_b: b.local_point(anchor),
            ..Self::new(body_a, body_b)
        })
    }
}

/// Friction joint state.
#[derive(Clone, Debug)]
pub struct FrictionJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    max_force: f32,
    max_torque: f32,

    linear_impulse: Vec2,
    angular_impulse: f32,

    sb: SolverBodies,
    r_a: Vec2,
    r_b: Vec2,
    linear_mass: Mat22,
    angular_mass: f32,
}

impl FrictionJoint {
    pub(crate) fn new(def: &FrictionJointDef) -> PhysicsResult<Self> {
        check_finite(
            &[
                def.local_anchor_a.x,
                def.local_anchor_a.y,
                def.local_anchor_b.x,
                def.local_anchor_b.y,
                def.max_force,
                def.max_torque,
            ],
            "friction joint parameters must be finite",
        )?;
        if def.max_force < 0.0 || def.max_torque < 0.0 {
            return Err(PhysicsError::InvalidJoint {
                reason: "friction joint limits must be non-negative",
            });
        }
        Ok(Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            max_force: def.max_force,
            max_torque: def.max_torque,
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
            sb: SolverBodies::default(),
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            linear_mass: Mat22::ZERO,
            angular_mass: 0.0,
        })
    }

    /// Maximum friction force.
    #[must_use]
    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    /// Set the maximum friction force.
    pub fn set_max_force(&mut self, force: f32) {
        self.max_force = force.max(0.0);
    }

    /// Maximum friction torque.
    #[must_use]
    pub fn max_torque(&self) -> f32 {
        self.max_torque
    }

    /// Set the maximum friction torque.
    pub fn set_max_torque(&mut self, torque: f32) {
        self.max_torque = torque.max(0.0);
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.linear_impulse * inv_dt
    }

    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.angular_impulse
    }

    pub(crate) fn init_velocity_constraints(&mut self, sb: SolverBodies, data: &mut SolverData) {
        self.sb = sb;
        let qa = Rot::from_angle(data.positions[sb.index_a].a);
        let qb = Rot::from_angle(data.positions[sb.index_b].a);
        let (mut va, mut vb) = sb.velocities(data);

        self.r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        self.r_b = qb.apply(self.local_anchor_b - sb.local_center_b);
        self.linear_mass = point_mass(&sb, self.r_a, self.r_b).inverse();

        self.angular_mass = sb.inv_i_a + sb.inv_i_b;
        if self.angular_mass > 0.0 {
            self.angular_mass = 1.0 / self.angular_mass;
        }

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

        // Angular friction
        {
            let cdot = vb.w - va.w;
            let impulse = -self.angular_mass * cdot;
            let old = self.angular_impulse;
            let max_impulse = h * self.max_torque;
            self.angular_impulse = (old + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.angular_impulse - old;
            va.w -= sb.inv_i_a * impulse;
            vb.w += sb.inv_i_b * impulse;
        }

        // Linear friction
        {
            let cdot = vb.v + Vec2::scalar_cross(vb.w, self.r_b) - va.v - Vec2::scalar_cross(va.w, self.r_a);
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

/// Effective mass matrix of a point-to-point constraint.
pub(crate) fn point_mass(sb: &SolverBodies, r_a: Vec2, r_b: Vec2) -> Mat22 {
    let (m_a, m_b, i_a, i_b) = (sb.inv_mass_a, sb.inv_mass_b, sb.inv_i_a, sb.inv_i_b);
    let exy = -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y;
    Mat22::from_cols(
        Vec2::new(m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y, exy),
        Vec2::new(exy, m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Handle, Index};
    use crate::step::{Position, TimeStep, Velocity};

    #[test]
    fn test_friction_is_bounded() {
        let a = BodyId::from_index(Index { slot: 0, generation: 0 });
        let b = BodyId::from_index(Index { slot: 1, generation: 0 });
        let mut joint = FrictionJoint::new(&FrictionJointDef {
            max_force: 60.0,
            max_torque: 0.0,
            ..FrictionJointDef::new(a, b)
        })
        .unwrap();

        let sb = SolverBodies {
            index_a: 0,
            index_b: 1,
            inv_mass_b: 1.0,
            inv_i_b: 1.0,
            ..SolverBodies::default()
        };
        let mut positions = [Position::default(), Position::default()];
        let mut velocities = [
            Velocity::default(),
            Velocity { v: Vec2::new(10.0, 0.0), w: 2.0 },
        ];
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

        // 60 N over 1/60 s removes 1 m/s from a 1 kg body.
        assert!((data.velocities[1].v.x - 9.0).abs() < 1e-4);
        // Zero torque leaves the spin alone.
        assert_eq!(data.velocities[1].w, 2.0);
    }

    #[test]
    fn test_point_mass_symmetric() {
        let sb = SolverBodies {
            inv_mass_a: 1.0,
            inv_mass_b: 0.5,
            inv_i_a: 2.0,
            inv_i_b: 1.0,
            ..SolverBodies::default()
        };
        let k = point_mass(&sb, Vec2::new(0.3, -0.2), Vec2::new(-0.1, 0.4));
        assert_eq!(k.ex.y, k.ey.x);
        assert!(k.ex.x > 0.0 && k.ey.y > 0.0);
    }
}
