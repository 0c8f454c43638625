//! Pulley Joint
//!
//! Each body hangs from a ground anchor; the rope satisfies
//! `length_a + ratio * length_b == constant`.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::arena::BodyId;
use crate::body::Body;
use crate::error::{PhysicsError, PhysicsResult};
use crate::joint::{check_finite, SolverBodies};
use crate::math::{Rot, Vec2};
use crate::settings::LINEAR_SLOP;
use crate::step::SolverData;
use crate::world::World;

/// Minimum pulley ratio.
const MIN_RATIO: f32 = f32::EPSILON;

/// Pulley joint definition.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PulleyJointDef {
    /// First body
    pub body_a: BodyId,
    /// Second body
    pub body_b: BodyId,
    /// Allow the bodies to collide
    pub collide_connected: bool,
    /// Application data
    pub user_data: u64,
    /// World ground anchor for body A
    pub ground_anchor_a: Vec2,
    /// World ground anchor for body B
    pub ground_anchor_b: Vec2,
    /// Anchor relative to body A's origin
    pub local_anchor_a: Vec2,
    /// Anchor relative to body B's origin
    pub local_anchor_b: Vec2,
    /// Reference rope length on side A
    pub length_a: f32,
    /// Reference rope length on side B
    pub length_b: f32,
    /// Block-and-tackle ratio
    pub ratio: f32,
}

impl PulleyJointDef {
    /// Default pulley layout.
    #[must_use]
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: true,
            user_data: 0,
            ground_anchor_a: Vec2::new(-1.0, 1.0),
            ground_anchor_b: Vec2::new(1.0, 1.0),
            local_anchor_a: Vec2::new(-1.0, 0.0),
            local_anchor_b: Vec2::new(1.0, 0.0),
            length_a: 0.0,
            length_b: 0.0,
            ratio: 1.0,
        }
    }

    /// Ground anchors, body anchors (world points) and ratio; rope lengths
    /// come from the current placement.
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        world: &World,
        body_a: BodyId,
        body_b: BodyId,
        ground_anchor_a: Vec2,
        ground_anchor_b: Vec2,
        anchor_a: Vec2,
        anchor_b: Vec2,
        ratio: f32,
    ) -> PhysicsResult<Self> {
        let (a, b) = world.body_pair(body_a, body_b)?;
        Ok(Self {
            ground_anchor_a,
            ground_anchor_b,
            local_anchor_a: a.local_point(anchor_a),
            local_anchor_b: b.local_point(anchor_b),
            length_a: (anchor_a - ground_anchor_a).length(),
            length_b: (anchor_b - ground_anchor_b).length(),
            ratio,
            ..Self::new(body_a, body_b)
        })
    }
}

/// Pulley joint state.
#[derive(Clone, Debug)]
pub struct PulleyJoint {
    pub(crate) ground_anchor_a: Vec2,
    pub(crate) ground_anchor_b: Vec2,
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    length_a: f32,
    length_b: f32,
    ratio: f32,
    constant: f32,

    impulse: f32,

    sb: SolverBodies,
    u_a: Vec2,
    u_b: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f32,
}

impl PulleyJoint {
    pub(crate) fn new(def: &PulleyJointDef) -> PhysicsResult<Self> {
        check_finite(
            &[
                def.ground_anchor_a.x,
                def.ground_anchor_a.y,
                def.ground_anchor_b.x,
                def.ground_anchor_b.y,
                def.local_anchor_a.x,
                def.local_anchor_a.y,
                def.local_anchor_b.x,
                def.local_anchor_b.y,
                def.length_a,
                def.length_b,
                def.ratio,
            ],
            "pulley joint parameters must be finite",
        )?;
        if def.ratio <= MIN_RATIO {
            return Err(PhysicsError::InvalidJoint {
                reason: "pulley ratio must be positive",
            });
        }
        Ok(Self {
            ground_anchor_a: def.ground_anchor_a,
            ground_anchor_b: def.ground_anchor_b,
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            length_a: def.length_a,
            length_b: def.length_b,
            ratio: def.ratio,
            constant: def.length_a + def.ratio * def.length_b,
            impulse: 0.0,
            sb: SolverBodies::default(),
            u_a: Vec2::ZERO,
            u_b: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: 0.0,
        })
    }

    /// Ground anchor of side A.
    #[must_use]
    pub fn ground_anchor_a(&self) -> Vec2 {
        self.ground_anchor_a
    }

    /// Ground anchor of side B.
    #[must_use]
    pub fn ground_anchor_b(&self) -> Vec2 {
        self.ground_anchor_b
    }

    /// Reference length of side A.
    #[must_use]
    pub fn length_a(&self) -> f32 {
        self.length_a
    }

    /// Reference length of side B.
    #[must_use]
    pub fn length_b(&self) -> f32 {
        self.length_b
    }

    /// Pulley ratio.
    #[must_use]
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Current rope length on side A.
    #[must_use]
    pub fn current_length_a(&self, body_a: &Body) -> f32 {
        (body_a.world_point(self.local_anchor_a) - self.ground_anchor_a).length()
    }

    /// Current rope length on side B.
    #[must_use]
    pub fn current_length_b(&self, body_b: &Body) -> f32 {
        (body_b.world_point(self.local_anchor_b) - self.ground_anchor_b).length()
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.u_b * (inv_dt * self.impulse)
    }

    /// Unit rope direction from a ground anchor, or zero when too short.
    fn rope_axis(u: Vec2) -> (Vec2, f32) {
        let length = u.length();
        if length > 10.0 * LINEAR_SLOP {
            (u * (1.0 / length), length)
        } else {
            (Vec2::ZERO, length)
        }
    }

    fn effective_mass(&self, sb: &SolverBodies, r_a: Vec2, r_b: Vec2, u_a: Vec2, u_b: Vec2) -> f32 {
        let ru_a = r_a.cross(u_a);
        let ru_b = r_b.cross(u_b);
        let m_a = sb.inv_mass_a + sb.inv_i_a * ru_a * ru_a;
        let m_b = sb.inv_mass_b + sb.inv_i_b * ru_b * ru_b;
        let mass = m_a + self.ratio * self.ratio * m_b;
        if mass > 0.0 {
            1.0 / mass
        } else {
            mass
        }
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

        (self.u_a, _) = Self::rope_axis(pa.c + self.r_a - self.ground_anchor_a);
        (self.u_b, _) = Self::rope_axis(pb.c + self.r_b - self.ground_anchor_b);
        self.mass = self.effective_mass(&sb, self.r_a, self.r_b, self.u_a, self.u_b);

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            let p_a = self.u_a * -self.impulse;
            let p_b = self.u_b * (-self.ratio * self.impulse);
            va.v += p_a * sb.inv_mass_a;
            va.w += sb.inv_i_a * self.r_a.cross(p_a);
            vb.v += p_b * sb.inv_mass_b;
            vb.w += sb.inv_i_b * self.r_b.cross(p_b);
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

        let cdot = -self.u_a.dot(vp_a) - self.ratio * self.u_b.dot(vp_b);
        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        let p_a = self.u_a * -impulse;
        let p_b = self.u_b * (-self.ratio * impulse);
        va.v += p_a * sb.inv_mass_a;
        va.w += sb.inv_i_a * self.r_a.cross(p_a);
        vb.v += p_b * sb.inv_mass_b;
        vb.w += sb.inv_i_b * self.r_b.cross(p_b);

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

        let (u_a, length_a) = Self::rope_axis(pa.c + r_a - self.ground_anchor_a);
        let (u_b, length_b) = Self::rope_axis(pb.c + r_b - self.ground_anchor_b);
        let mass = self.effective_mass(&sb, r_a, r_b, u_a, u_b);

        let c = self.constant - length_a - self.ratio * length_b;
        let linear_error = c.abs();
        let impulse = -mass * c;

        let p_a = u_a * -impulse;
        let p_b = u_b * (-self.ratio * impulse);
        pa.c += p_a * sb.inv_mass_a;
        pa.a += sb.inv_i_a * r_a.cross(p_a);
        pb.c += p_b * sb.inv_mass_b;
        pb.a += sb.inv_i_b * r_b.cross(p_b);

        data.positions[sb.index_a] = pa;
        data.positions[sb.index_b] = pb;

        linear_error < LINEAR_SLOP
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Handle, Index};
    use crate::step::{Position, TimeStep, Velocity};

    #[test]
    fn test_rope_length_conserved_in_velocity() {
        let a = BodyId::from_index(Index { slot: 0, generation: 0 });
        let b = BodyId::from_index(Index { slot: 1, generation: 0 });
        let mut joint = PulleyJoint::new(&PulleyJointDef {
            ground_anchor_a: Vec2::new(-1.0, 2.0),
            ground_anchor_b: Vec2::new(1.0, 2.0),
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            length_a: 2.0,
            length_b: 2.0,
            ..PulleyJointDef::new(a, b)
        })
        .unwrap();

        let sb = SolverBodies {
            index_a: 0,
            index_b: 1,
            inv_mass_a: 1.0,
            inv_mass_b: 1.0,
            ..SolverBodies::default()
        };
        let mut positions = [
            Position { c: Vec2::new(-1.0, 0.0), a: 0.0 },
            Position { c: Vec2::new(1.0, 0.0), a: 0.0 },
        ];
        // Both fall: the rope must stop the combined descent.
        let mut velocities = [
            Velocity { v: Vec2::new(0.0, -1.0), w: 0.0 },
            Velocity { v: Vec2::new(0.0, -1.0), w: 0.0 },
        ];
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

        let (va, vb) = (data.velocities[0], data.velocities[1]);
        assert!((va.v.y + vb.v.y).abs() < 1e-5);
        assert!(joint.solve_position_constraints(&mut data));
    }

    #[test]
    fn test_ratio_must_be_positive() {
        let a = BodyId::from_index(Index { slot: 0, generation: 0 });
        let b = BodyId::from_index(Index { slot: 1, generation: 0 });
        let def = PulleyJointDef {
            ratio: 0.0,
            ..PulleyJointDef::new(a, b)
        };
        assert!(PulleyJoint::new(&def).is_err());
    }
}
