//! Rope Joint
//!
//! Enforces a maximum distance between two anchor points. Slack ropes apply
//! no force.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::arena::BodyId;
use crate::error::{PhysicsError, PhysicsResult};
use crate::joint::{check_finite, SolverBodies};
use crate::math::{Rot, Vec2};
use crate::settings::{LINEAR_SLOP, MAX_LINEAR_CORRECTION};
use crate::step::SolverData;

/// Rope joint definition.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RopeJointDef {
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
    /// Maximum anchor separation
    pub max_length: f32,
}

impl RopeJointDef {
    /// Definition with anchors at (-1, 0) and (1, 0) and zero length.
    #[must_use]
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            local_anchor_a: Vec2::new(-1.0, 0.0),
            local_anchor_b: Vec2::new(1.0, 0.0),
            max_length: 0.0,
        }
    }
}

/// Whether the rope is taut.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RopeState {
    /// Slack
    #[default]
    Inactive,
    /// At its maximum length
    AtUpper,
}

/// Rope joint state.
#[derive(Clone, Debug)]
pub struct RopeJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    max_length: f32,
    length: f32,
    impulse: f32,
    state: RopeState,

    sb: SolverBodies,
    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f32,
}

impl RopeJoint {
    pub(crate) fn new(def: &RopeJointDef) -> PhysicsResult<Self> {
        check_finite(
            &[
                def.local_anchor_a.x,
                def.local_anchor_a.y,
                def.local_anchor_b.x,
                def.local_anchor_b.y,
                def.max_length,
            ],
            "rope joint parameters must be finite",
        )?;
        if def.max_length < 0.0 {
            return Err(PhysicsError::InvalidJoint {
                reason: "rope max length must be non-negative",
            });
        }
        Ok(Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            max_length: def.max_length,
            length: 0.0,
            impulse: 0.0,
            state: RopeState::Inactive,
            sb: SolverBodies::default(),
            u: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: 0.0,
        })
    }

    /// Maximum length.
    #[must_use]
    pub fn max_length(&self) -> f32 {
        self.max_length
    }

    /// Set the maximum length.
    pub fn set_max_length(&mut self, length: f32) {
        self.max_length = length.max(0.0);
    }

    /// Taut or slack, as of the last step.
    #[must_use]
    pub fn state(&self) -> RopeState {
        self.state
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.u * (inv_dt * self.impulse)
    }

    pub(crate) fn init_velocity_constraints(&mut self, sb: SolverBodies, data: &mut SolverData) {
        self.sb = sb;
        let pa = data.positions[sb.index_a];
        let pb = data.positions[sb.index_b];
        let (mut va, mut vb) = sb.velocities(data);

        let qa = Rot::from_angle(pa.a);
        let qb = Rot::from_angle(pb.a);
        self.r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        self.r_b = qb.apply(self.local_anchor_b - sb.local_center_b);
        self.u = pb.c + self.r_b - pa.c - self.r_a;
        self.length = self.u.length();

        self.state = if self.length - self.max_length > 0.0 {
            RopeState::AtUpper
        } else {
            RopeState::Inactive
        };

        if self.length > LINEAR_SLOP {
            self.u *= 1.0 / self.length;
        } else {
            self.u = Vec2::ZERO;
            self.mass = 0.0;
            self.impulse = 0.0;
            return;
        }

        let cr_a = self.r_a.cross(self.u);
        let cr_b = self.r_b.cross(self.u);
        let inv_mass = sb.inv_mass_a + sb.inv_i_a * cr_a * cr_a + sb.inv_mass_b + sb.inv_i_b * cr_b * cr_b;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            let p = self.u * self.impulse;
            va.v -= p * sb.inv_mass_a;
            va.w -= sb.inv_i_a * self.r_a.cross(p);
            vb.v += p * sb.inv_mass_b;
            vb.w += sb.inv_i_b * self.r_b.cross(p);
        } else {
            self.impulse = 0.0;
        }

        sb.store_velocities(data, va, vb);
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let sb = self.sb;
        let (mut va, mut vb) = sb.velocities(data);

        let vp_a = va.v + Vec2::scalar_cross(va.w, self.r_a);
        let vp_b = vb.v + Vec2::scalar_cross(vb.w, self.r_b);
        let c = self.length - self.max_length;
        let mut cdot = self.u.dot(vp_b - vp_a);

        // Predictive: a slack rope may close the gap this step but not overshoot.
        if c < 0.0 {
            cdot += data.step.inv_dt * c;
        }

        let impulse = -self.mass * cdot;
        let old = self.impulse;
        self.impulse = (self.impulse + impulse).min(0.0);
        let impulse = self.impulse - old;

        let p = self.u * impulse;
        va.v -= p * sb.inv_mass_a;
        va.w -= sb.inv_i_a * self.r_a.cross(p);
        vb.v += p * sb.inv_mass_b;
        vb.w += sb.inv_i_b * self.r_b.cross(p);

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
        let mut u = pb.c + r_b - pa.c - r_a;
        let length = u.normalize();
        let c = (length - self.max_length).clamp(0.0, MAX_LINEAR_CORRECTION);

        let impulse = -self.mass * c;
        let p = u * impulse;
        pa.c -= p * sb.inv_mass_a;
        pa.a -= sb.inv_i_a * r_a.cross(p);
        pb.c += p * sb.inv_mass_b;
        pb.a += sb.inv_i_b * r_b.cross(p);

        data.positions[sb.index_a] = pa;
        data.positions[sb.index_b] = pb;

        length - self.max_length < LINEAR_SLOP
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Handle, Index};
    use crate::step::{Position, TimeStep, Velocity};

    fn joint(max_length: f32) -> RopeJoint {
        let a = BodyId::from_index(Index { slot: 0, generation: 0 });
        let b = BodyId::from_index(Index { slot: 1, generation: 0 });
        RopeJoint::new(&RopeJointDef {
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            max_length,
            ..RopeJointDef::new(a, b)
        })
        .unwrap()
    }

    fn bodies() -> SolverBodies {
        SolverBodies {
            index_a: 0,
            index_b: 1,
            inv_mass_a: 0.0,
            inv_mass_b: 1.0,
            inv_i_a: 0.0,
            inv_i_b: 1.0,
            ..SolverBodies::default()
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
    fn test_taut_rope_stops_separation() {
        let mut rope = joint(1.0);
        let mut positions = [
            Position { c: Vec2::ZERO, a: 0.0 },
            Position { c: Vec2::new(1.0, 0.0), a: 0.0 },
        ];
        let mut velocities = [
            Velocity::default(),
            Velocity { v: Vec2::new(5.0, 0.0), w: 0.0 },
        ];
        let mut data = SolverData {
            step: step(),
            positions: &mut positions,
            velocities: &mut velocities,
        };
        rope.init_velocity_constraints(bodies(), &mut data);
        rope.solve_velocity_constraints(&mut data);
        assert!(data.velocities[1].v.x.abs() < 1e-4);
    }

    #[test]
    fn test_slack_rope_allows_approach() {
        let mut rope = joint(2.0);
        let mut positions = [
            Position { c: Vec2::ZERO, a: 0.0 },
            Position { c: Vec2::new(1.0, 0.0), a: 0.0 },
        ];
        let mut velocities = [
            Velocity::default(),
            Velocity { v: Vec2::new(-3.0, 0.0), w: 0.0 },
        ];
        let mut data = SolverData {
            step: step(),
            positions: &mut positions,
            velocities: &mut velocities,
        };
        rope.init_velocity_constraints(bodies(), &mut data);
        rope.solve_velocity_constraints(&mut data);
        assert_eq!(rope.state(), RopeState::Inactive);
        assert_eq!(data.velocities[1].v.x, -3.0);
        assert!(rope.solve_position_constraints(&mut data));
    }

    #[test]
    fn test_negative_length_rejected() {
        let a = BodyId::from_index(Index { slot: 0, generation: 0 });
        let b = BodyId::from_index(Index { slot: 1, generation: 0 });
        let def = RopeJointDef {
            max_length: -1.0,
            ..RopeJointDef::new(a, b)
        };
        assert!(RopeJoint::new(&def).is_err());
    }
}
