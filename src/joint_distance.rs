//! Distance Joint
//!
//! Keeps two anchor points at a rest length. With a stiffness it becomes a
//! spring; `min_length`/`max_length` bound the spring's travel.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::arena::BodyId;
use crate::error::{PhysicsError, PhysicsResult};
use crate::joint::{check_finite, SolverBodies};
use crate::math::{Rot, Vec2};
use crate::settings::LINEAR_SLOP;
use crate::step::{SolverData, Velocity};
use crate::world::World;

/// Distance joint definition.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DistanceJointDef {
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
    /// Rest length
    pub length: f32,
    /// Minimum length, clamped to at least `LINEAR_SLOP`
    pub min_length: f32,
    /// Maximum length, at least `min_length`
    pub max_length: f32,
    /// Linear stiffness (N/m), 0 for a rigid rod
    pub stiffness: f32,
    /// Linear damping (N·s/m)
    pub damping: f32,
}

impl DistanceJointDef {
    /// Definition with unit length between the two body origins.
    #[must_use]
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            length: 1.0,
            min_length: 0.0,
            max_length: f32::MAX,
            stiffness: 0.0,
            damping: 0.0,
        }
    }

    /// Anchors from world points; the current distance becomes the rest,
    /// minimum and maximum length.
    pub fn initialize(
        world: &World,
        body_a: BodyId,
        body_b: BodyId,
        anchor_a: Vec2,
        anchor_b: Vec2,
    ) -> PhysicsResult<Self> {
        let (a, b) = world.body_pair(body_a, body_b)?;
        let length = (anchor_b - anchor_a).length().max(LINEAR_SLOP);
        Ok(Self {
            local_anchor_a: a.local_point(anchor_a),
            local_anchor_b: b.local_point(anchor_b),
            length,
            min_length: length,
            max_length: length,
            ..Self::new(body_a, body_b)
        })
    }
}

/// Distance joint state.
#[derive(Clone, Debug)]
pub struct DistanceJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    length: f32,
    min_length: f32,
    max_length: f32,
    stiffness: f32,
    damping: f32,
    current_length: f32,

    impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    sb: SolverBodies,
    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    gamma: f32,
    bias: f32,
    mass: f32,
    soft_mass: f32,
}

impl DistanceJoint {
    pub(crate) fn new(def: &DistanceJointDef) -> PhysicsResult<Self> {
        check_finite(
            &[
                def.local_anchor_a.x,
                def.local_anchor_a.y,
                def.local_anchor_b.x,
                def.local_anchor_b.y,
                def.length,
                def.min_length,
                def.stiffness,
                def.damping,
            ],
            "distance joint parameters must be finite",
        )?;
        if def.stiffness < 0.0 || def.damping < 0.0 {
            return Err(PhysicsError::InvalidJoint {
                reason: "distance joint stiffness and damping must be non-negative",
            });
        }
        let min_length = def.min_length.clamp(LINEAR_SLOP, f32::MAX);
        Ok(Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            length: def.length.clamp(LINEAR_SLOP, f32::MAX),
            min_length,
            max_length: def.max_length.max(min_length),
            stiffness: def.stiffness,
            damping: def.damping,
            current_length: 0.0,
            impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            sb: SolverBodies::default(),
            u: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            gamma: 0.0,
            bias: 0.0,
            mass: 0.0,
            soft_mass: 0.0,
        })
    }

    /// Rest length.
    #[must_use]
    pub fn length(&self) -> f32 {
        self.length
    }

    /// Set the rest length; returns the clamped value.
    pub fn set_length(&mut self, length: f32) -> f32 {
        self.impulse = 0.0;
        self.length = length.clamp(LINEAR_SLOP, f32::MAX);
        self.length
    }

    /// Minimum length.
    #[must_use]
    pub fn min_length(&self) -> f32 {
        self.min_length
    }

    /// Set the minimum length; returns the clamped value.
    pub fn set_min_length(&mut self, min_length: f32) -> f32 {
        self.lower_impulse = 0.0;
        self.min_length = min_length.clamp(LINEAR_SLOP, self.max_length);
        self.min_length
    }

    /// Maximum length.
    #[must_use]
    pub fn max_length(&self) -> f32 {
        self.max_length
    }

    /// Set the maximum length; returns the clamped value.
    pub fn set_max_length(&mut self, max_length: f32) -> f32 {
        self.upper_impulse = 0.0;
        self.max_length = max_length.max(self.min_length);
        self.max_length
    }

    /// Anchor distance measured at the last velocity initialization.
    #[must_use]
    pub fn current_length(&self) -> f32 {
        self.current_length
    }

    /// Linear stiffness (N/m).
    #[must_use]
    pub fn stiffness(&self) -> f32 {
        self.stiffness
    }

    /// Set the linear stiffness.
    pub fn set_stiffness(&mut self, stiffness: f32) {
        self.stiffness = stiffness;
    }

    /// Linear damping (N·s/m).
    #[must_use]
    pub fn damping(&self) -> f32 {
        self.damping
    }

    /// Set the linear damping.
    pub fn set_damping(&mut self, damping: f32) {
        self.damping = damping;
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.u * (inv_dt * (self.impulse + self.lower_impulse - self.upper_impulse))
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

        self.current_length = self.u.length();
        if self.current_length > LINEAR_SLOP {
            self.u *= 1.0 / self.current_length;
        } else {
            self.u = Vec2::ZERO;
            self.mass = 0.0;
            self.impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        let cr_au = self.r_a.cross(self.u);
        let cr_bu = self.r_b.cross(self.u);
        let mut inv_mass =
            sb.inv_mass_a + sb.inv_i_a * cr_au * cr_au + sb.inv_mass_b + sb.inv_i_b * cr_bu * cr_bu;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if self.stiffness > 0.0 && self.min_length < self.max_length {
            let c = self.current_length - self.length;
            let h = data.step.dt;
            self.gamma = h * (self.damping + h * self.stiffness);
            self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
            self.bias = c * h * self.stiffness * self.gamma;
            inv_mass += self.gamma;
            self.soft_mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
            self.soft_mass = self.mass;
        }

        if data.step.warm_starting {
            let ratio = data.step.dt_ratio;
            self.impulse *= ratio;
            self.lower_impulse *= ratio;
            self.upper_impulse *= ratio;

            let p = self.u * (self.impulse + self.lower_impulse - self.upper_impulse);
            va.v -= p * sb.inv_mass_a;
            va.w -= sb.inv_i_a * self.r_a.cross(p);
            vb.v += p * sb.inv_mass_b;
            vb.w += sb.inv_i_b * self.r_b.cross(p);
        } else {
            self.impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        sb.store_velocities(data, va, vb);
    }

    fn apply_impulse(&self, impulse: f32, va: &mut Velocity, vb: &mut Velocity) {
        let sb = &self.sb;
        let p = self.u * impulse;
        va.v -= p * sb.inv_mass_a;
        va.w -= sb.inv_i_a * self.r_a.cross(p);
        vb.v += p * sb.inv_mass_b;
        vb.w += sb.inv_i_b * self.r_b.cross(p);
    }

    fn separation_speed(&self, va: &Velocity, vb: &Velocity) -> f32 {
        let vp_a = va.v + Vec2::scalar_cross(va.w, self.r_a);
        let vp_b = vb.v + Vec2::scalar_cross(vb.w, self.r_b);
        self.u.dot(vp_b - vp_a)
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let (mut va, mut vb) = self.sb.velocities(data);

        if self.min_length < self.max_length {
            if self.stiffness > 0.0 {
                let cdot = self.separation_speed(&va, &vb);
                let impulse = -self.soft_mass * (cdot + self.bias + self.gamma * self.impulse);
                self.impulse += impulse;
                self.apply_impulse(impulse, &mut va, &mut vb);
            }

            // Lower bound
            {
                let c = self.current_length - self.min_length;
                let bias = c.max(0.0) * data.step.inv_dt;
                let cdot = self.separation_speed(&va, &vb);
                let impulse = -self.mass * (cdot + bias);
                let old = self.lower_impulse;
                self.lower_impulse = (self.lower_impulse + impulse).max(0.0);
                self.apply_impulse(self.lower_impulse - old, &mut va, &mut vb);
            }

            // Upper bound; sign flipped so the accumulated impulse stays positive.
            {
                let c = self.max_length - self.current_length;
                let bias = c.max(0.0) * data.step.inv_dt;
                let cdot = -self.separation_speed(&va, &vb);
                let impulse = -self.mass * (cdot + bias);
                let old = self.upper_impulse;
                self.upper_impulse = (self.upper_impulse + impulse).max(0.0);
                self.apply_impulse(old - self.upper_impulse, &mut va, &mut vb);
            }
        } else {
            let cdot = self.separation_speed(&va, &vb);
            let impulse = -self.mass * cdot;
            self.impulse += impulse;
            self.apply_impulse(impulse, &mut va, &mut vb);
        }

        self.sb.store_velocities(data, va, vb);
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

        let c = if self.min_length == self.max_length || length < self.min_length {
            length - self.min_length
        } else if self.max_length < length {
            length - self.max_length
        } else {
            return true;
        };

        let impulse = -self.mass * c;
        let p = u * impulse;
        pa.c -= p * sb.inv_mass_a;
        pa.a -= sb.inv_i_a * r_a.cross(p);
        pb.c += p * sb.inv_mass_b;
        pb.a += sb.inv_i_b * r_b.cross(p);

        data.positions[sb.index_a] = pa;
        data.positions[sb.index_b] = pb;

        c.abs() < LINEAR_SLOP
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
    fn test_lengths_are_clamped() {
        let (a, b) = ids();
        let def = DistanceJointDef {
            length: 0.0,
            min_length: -1.0,
            max_length: 0.0,
            ..DistanceJointDef::new(a, b)
        };
        let joint = DistanceJoint::new(&def).unwrap();
        assert_eq!(joint.length(), LINEAR_SLOP);
        assert_eq!(joint.min_length(), LINEAR_SLOP);
        assert_eq!(joint.max_length(), LINEAR_SLOP);
    }

    #[test]
    fn test_rejects_negative_stiffness() {
        let (a, b) = ids();
        let def = DistanceJointDef {
            stiffness: -1.0,
            ..DistanceJointDef::new(a, b)
        };
        assert!(DistanceJoint::new(&def).is_err());
    }

    #[test]
    fn test_setters_clamp() {
        let (a, b) = ids();
        let mut joint = DistanceJoint::new(&DistanceJointDef {
            min_length: 1.0,
            max_length: 3.0,
            ..DistanceJointDef::new(a, b)
        })
        .unwrap();
        assert_eq!(joint.set_max_length(0.5), 1.0);
        assert_eq!(joint.set_min_length(5.0), 1.0);
        assert_eq!(joint.set_length(2.0), 2.0);
    }
}
