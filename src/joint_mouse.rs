//! Mouse Joint
//!
//! Soft constraint pulling a point on body B towards a world target, with a
//! force cap. Body A only serves as the joint's second endpoint (usually
//! the ground).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::arena::BodyId;
use crate::body::Body;
use crate::error::{PhysicsError, PhysicsResult};
use crate::joint::{check_finite, SolverBodies};
use crate::math::{Mat22, Rot, Vec2};
use crate::step::SolverData;

/// Mouse joint definition.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MouseJointDef {
    /// First body (usually static)
    pub body_a: BodyId,
    /// Dragged body
    pub body_b: BodyId,
    /// Allow the bodies to collide
    pub collide_connected: bool,
    /// Application data
    pub user_data: u64,
    /// Initial world target; also fixes the grab point on body B
    pub target: Vec2,
    /// Maximum constraint force (N), typically a multiple of the body weight
    pub max_force: f32,
    /// Linear stiffness (N/m)
    pub stiffness: f32,
    /// Linear damping (N·s/m)
    pub damping: f32,
}

impl MouseJointDef {
    /// Definition grabbing body B at `target`.
    #[must_use]
    pub fn new(body_a: BodyId, body_b: BodyId, target: Vec2) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            target,
            max_force: 0.0,
            stiffness: 0.0,
            damping: 0.0,
        }
    }
}

/// Mouse joint state.
#[derive(Clone, Debug)]
pub struct MouseJoint {
    pub(crate) target: Vec2,
    pub(crate) local_anchor_b: Vec2,
    max_force: f32,
    stiffness: f32,
    damping: f32,

    impulse: Vec2,

    sb: SolverBodies,
    r_b: Vec2,
    mass: Mat22,
    c: Vec2,
    beta: f32,
    gamma: f32,
}

impl MouseJoint {
    pub(crate) fn new(def: &MouseJointDef, body_b: &Body) -> PhysicsResult<Self> {
        check_finite(
            &[def.target.x, def.target.y, def.max_force, def.stiffness, def.damping],
            "mouse joint parameters must be finite",
        )?;
        if def.max_force < 0.0 || def.stiffness < 0.0 || def.damping < 0.0 {
            return Err(PhysicsError::InvalidJoint {
                reason: "mouse joint force, stiffness and damping must be non-negative",
            });
        }
        Ok(Self {
            target: def.target,
            local_anchor_b: body_b.transform().apply_inv(def.target),
            max_force: def.max_force,
            stiffness: def.stiffness,
            damping: def.damping,
            impulse: Vec2::ZERO,
            sb: SolverBodies::default(),
            r_b: Vec2::ZERO,
            mass: Mat22::ZERO,
            c: Vec2::ZERO,
            beta: 0.0,
            gamma: 0.0,
        })
    }

    /// Current world target.
    #[must_use]
    pub fn target(&self) -> Vec2 {
        self.target
    }

    /// Move the target. The world's `set_mouse_target` also wakes body B.
    pub fn set_target(&mut self, target: Vec2) {
        self.target = target;
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

    /// Linear stiffness.
    #[must_use]
    pub fn stiffness(&self) -> f32 {
        self.stiffness
    }

    /// Set the linear stiffness.
    pub fn set_stiffness(&mut self, stiffness: f32) {
        self.stiffness = stiffness;
    }

    /// Linear damping.
    #[must_use]
    pub fn damping(&self) -> f32 {
        self.damping
    }

    /// Set the linear damping.
    pub fn set_damping(&mut self, damping: f32) {
        self.damping = damping;
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.impulse * inv_dt
    }

    pub(crate) fn init_velocity_constraints(&mut self, sb: SolverBodies, data: &mut SolverData) {
        self.sb = sb;
        let pb = data.positions[sb.index_b];
        let mut vb = data.velocities[sb.index_b];
        let qb = Rot::from_angle(pb.a);

        let h = data.step.dt;
        let k = self.stiffness;
        let d = self.damping;

        self.gamma = h * (d + h * k);
        if self.gamma != 0.0 {
            self.gamma = 1.0 / self.gamma;
        }
        self.beta = h * k * self.gamma;

        self.r_b = qb.apply(self.local_anchor_b - sb.local_center_b);

        let (m_b, i_b, r_b) = (sb.inv_mass_b, sb.inv_i_b, self.r_b);
        let exy = -i_b * r_b.x * r_b.y;
        let k_mat = Mat22::from_cols(
            Vec2::new(m_b + i_b * r_b.y * r_b.y + self.gamma, exy),
            Vec2::new(exy, m_b + i_b * r_b.x * r_b.x + self.gamma),
        );
        self.mass = k_mat.inverse();

        self.c = (pb.c + self.r_b - self.target) * self.beta;

        // Slight angular damping keeps a dragged body from spinning up.
        vb.w *= 0.98;

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            vb.v += self.impulse * m_b;
            vb.w += i_b * self.r_b.cross(self.impulse);
        } else {
            self.impulse = Vec2::ZERO;
        }

        data.velocities[sb.index_b] = vb;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let sb = self.sb;
        let mut vb = data.velocities[sb.index_b];

        let cdot = vb.v + Vec2::scalar_cross(vb.w, self.r_b);
        let impulse = self.mass.mul_vec(-(cdot + self.c + self.impulse * self.gamma));

        let old = self.impulse;
        self.impulse += impulse;
        let max_impulse = data.step.dt * self.max_force;
        if self.impulse.length_squared() > max_impulse * max_impulse {
            self.impulse *= max_impulse / self.impulse.length();
        }
        let impulse = self.impulse - old;

        vb.v += impulse * sb.inv_mass_b;
        vb.w += sb.inv_i_b * self.r_b.cross(impulse);
        data.velocities[sb.index_b] = vb;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Handle, Index};
    use crate::body::BodyDef;
    use crate::step::{Position, TimeStep, Velocity};

    #[test]
    fn test_pulls_towards_target() {
        let a = BodyId::from_index(Index { slot: 0, generation: 0 });
        let b = BodyId::from_index(Index { slot: 1, generation: 0 });
        let body = Body::new(&BodyDef::dynamic(Vec2::ZERO));
        let mut joint = MouseJoint::new(
            &MouseJointDef {
                max_force: 1000.0,
                stiffness: 100.0,
                damping: 10.0,
                ..MouseJointDef::new(a, b, Vec2::ZERO)
            },
            &body,
        )
        .unwrap();
        joint.set_target(Vec2::new(1.0, 0.0));

        let sb = SolverBodies {
            index_a: 0,
            index_b: 1,
            inv_mass_b: 1.0,
            inv_i_b: 1.0,
            ..SolverBodies::default()
        };
        let mut positions = [Position::default(), Position::default()];
        let mut velocities = [Velocity::default(), Velocity::default()];
        let mut data = SolverData {
            step: TimeStep {
                dt: 1.0 / 60.0,
                inv_dt: 60.0,
                dt_ratio: 1.0,
                velocity_iterations: 8,
                position_iterations: 3,
                warm_starting: true,
            },
            positions: &mut positions,
            velocities: &mut velocities,
        };
        joint.init_velocity_constraints(sb, &mut data);
        joint.solve_velocity_constraints(&mut data);
        assert!(data.velocities[1].v.x > 0.0);
        assert!(data.velocities[1].v.y.abs() < 1e-6);
        assert!(joint.reaction_force(60.0).x > 0.0);
    }

    #[test]
    fn test_rejects_negative_force() {
        let a = BodyId::from_index(Index { slot: 0, generation: 0 });
        let body = Body::new(&BodyDef::dynamic(Vec2::ZERO));
        let def = MouseJointDef {
            max_force: -1.0,
            ..MouseJointDef::new(a, a, Vec2::ZERO)
        };
        assert!(MouseJoint::new(&def, &body).is_err());
    }
}
