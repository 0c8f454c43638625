//! Revolute Joint
//!
//! Pins two bodies together at a shared anchor, leaving one rotational
//! degree of freedom. Optional angle limits and a torque-capped motor.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::arena::BodyId;
use crate::body::Body;
use crate::error::{PhysicsError, PhysicsResult};
use crate::joint::{check_finite, SolverBodies};
use crate::joint_friction::point_mass;
use crate::math::{Mat22, Rot, Vec2};
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP, MAX_ANGULAR_CORRECTION};
use crate::step::SolverData;
use crate::world::World;

/// Revolute joint definition.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RevoluteJointDef {
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
    /// Angle of B minus angle of A in the reference pose
    pub reference_angle: f32,
    /// Enable the angle limits
    pub enable_limit: bool,
    /// Lower angle (radians)
    pub lower_angle: f32,
    /// Upper angle (radians)
    pub upper_angle: f32,
    /// Enable the motor
    pub enable_motor: bool,
    /// Target relative angular speed (rad/s)
    pub motor_speed: f32,
    /// Maximum motor torque (N·m)
    pub max_motor_torque: f32,
}

impl RevoluteJointDef {
    /// Definition with anchors at both body origins.
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
            enable_limit: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
        }
    }

    /// Hinge at a world point, with the current relative angle as reference.
    pub fn initialize(world: &World, body_a: BodyId, body_b: BodyId, anchor: Vec2) -> PhysicsResult<Self> {
        let (a, b) = world.body_pair(body_a, body_b)?;
        Ok(Self {
            local_anchor_a: a.local_point(anchor),
            local_anchor_b: b.local_point(anchor),
            reference_angle: b.angle() - a.angle(),
            ..Self::new(body_a, body_b)
        })
    }

    /// Enable limits.
    #[must_use]
    pub fn with_limits(mut self, lower: f32, upper: f32) -> Self {
        self.enable_limit = true;
        self.lower_angle = lower;
        self.upper_angle = upper;
        self
    }

    /// Enable the motor.
    #[must_use]
    pub fn with_motor(mut self, speed: f32, max_torque: f32) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_torque = max_torque;
        self
    }
}

/// Revolute joint state.
#[derive(Clone, Debug)]
pub struct RevoluteJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    pub(crate) reference_angle: f32,
    enable_limit: bool,
    lower_angle: f32,
    upper_angle: f32,
    enable_motor: bool,
    motor_speed: f32,
    max_motor_torque: f32,

    impulse: Vec2,
    motor_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    sb: SolverBodies,
    r_a: Vec2,
    r_b: Vec2,
    k: Mat22,
    angle: f32,
    axial_mass: f32,
}

impl RevoluteJoint {
    pub(crate) fn new(def: &RevoluteJointDef) -> PhysicsResult<Self> {
        check_finite(
            &[
                def.local_anchor_a.x,
                def.local_anchor_a.y,
                def.local_anchor_b.x,
                def.local_anchor_b.y,
                def.reference_angle,
                def.lower_angle,
                def.upper_angle,
                def.motor_speed,
                def.max_motor_torque,
            ],
            "revolute joint parameters must be finite",
        )?;
        if def.lower_angle > def.upper_angle {
            return Err(PhysicsError::InvalidJoint {
                reason: "revolute lower angle exceeds upper angle",
            });
        }
        Ok(Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            enable_limit: def.enable_limit,
            lower_angle: def.lower_angle,
            upper_angle: def.upper_angle,
            enable_motor: def.enable_motor,
            motor_speed: def.motor_speed,
            max_motor_torque: def.max_motor_torque,
            impulse: Vec2::ZERO,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            sb: SolverBodies::default(),
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            k: Mat22::ZERO,
            angle: 0.0,
            axial_mass: 0.0,
        })
    }

    /// Current joint angle relative to the reference.
    #[must_use]
    pub fn joint_angle(&self, body_a: &Body, body_b: &Body) -> f32 {
        body_b.sweep.a - body_a.sweep.a - self.reference_angle
    }

    /// Current relative angular speed.
    #[must_use]
    pub fn joint_speed(&self, body_a: &Body, body_b: &Body) -> f32 {
        body_b.angular_velocity() - body_a.angular_velocity()
    }

    /// Reference angle.
    #[must_use]
    pub fn reference_angle(&self) -> f32 {
        self.reference_angle
    }

    /// Limits enabled.
    #[must_use]
    pub fn is_limit_enabled(&self) -> bool {
        self.enable_limit
    }

    /// Enable or disable the limits.
    pub fn enable_limit(&mut self, flag: bool) {
        if flag != self.enable_limit {
            self.enable_limit = flag;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    /// Lower angle.
    #[must_use]
    pub fn lower_limit(&self) -> f32 {
        self.lower_angle
    }

    /// Upper angle.
    #[must_use]
    pub fn upper_limit(&self) -> f32 {
        self.upper_angle
    }

    /// Set both limits; they are reordered if given reversed.
    pub fn set_limits(&mut self, lower: f32, upper: f32) {
        if lower != self.lower_angle || upper != self.upper_angle {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
            self.lower_angle = lower.min(upper);
            self.upper_angle = lower.max(upper);
        }
    }

    /// Motor enabled.
    #[must_use]
    pub fn is_motor_enabled(&self) -> bool {
        self.enable_motor
    }

    /// Enable or disable the motor.
    pub fn enable_motor(&mut self, flag: bool) {
        self.enable_motor = flag;
    }

    /// Motor speed (rad/s).
    #[must_use]
    pub fn motor_speed(&self) -> f32 {
        self.motor_speed
    }

    /// Set the motor speed.
    pub fn set_motor_speed(&mut self, speed: f32) {
        self.motor_speed = speed;
    }

    /// Maximum motor torque.
    #[must_use]
    pub fn max_motor_torque(&self) -> f32 {
        self.max_motor_torque
    }

    /// Set the maximum motor torque.
    pub fn set_max_motor_torque(&mut self, torque: f32) {
        self.max_motor_torque = torque;
    }

    /// Motor torque applied during the last step.
    #[must_use]
    pub fn motor_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.impulse * inv_dt
    }

    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * (self.motor_impulse + self.lower_impulse - self.upper_impulse)
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
        self.k = point_mass(&sb, self.r_a, self.r_b);

        self.axial_mass = sb.inv_i_a + sb.inv_i_b;
        let fixed_rotation = if self.axial_mass > 0.0 {
            self.axial_mass = 1.0 / self.axial_mass;
            false
        } else {
            true
        };

        self.angle = ab - aa - self.reference_angle;
        if !self.enable_limit || fixed_rotation {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
        if !self.enable_motor || fixed_rotation {
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            let ratio = data.step.dt_ratio;
            self.impulse *= ratio;
            self.motor_impulse *= ratio;
            self.lower_impulse *= ratio;
            self.upper_impulse *= ratio;

            let axial = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.impulse;
            va.v -= p * sb.inv_mass_a;
            va.w -= sb.inv_i_a * (self.r_a.cross(p) + axial);
            vb.v += p * sb.inv_mass_b;
            vb.w += sb.inv_i_b * (self.r_b.cross(p) + axial);
        } else {
            self.impulse = Vec2::ZERO;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        sb.store_velocities(data, va, vb);
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let sb = self.sb;
        let (mut va, mut vb) = sb.velocities(data);
        let fixed_rotation = sb.inv_i_a + sb.inv_i_b == 0.0;

        if self.enable_motor && !fixed_rotation {
            let cdot = vb.w - va.w - self.motor_speed;
            let impulse = -self.axial_mass * cdot;
            let old = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_torque;
            self.motor_impulse = (old + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old;
            va.w -= sb.inv_i_a * impulse;
            vb.w += sb.inv_i_b * impulse;
        }

        if self.enable_limit && !fixed_rotation {
            // Lower limit
            {
                let c = self.angle - self.lower_angle;
                let cdot = vb.w - va.w;
                let impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old = self.lower_impulse;
                self.lower_impulse = (self.lower_impulse + impulse).max(0.0);
                let impulse = self.lower_impulse - old;
                va.w -= sb.inv_i_a * impulse;
                vb.w += sb.inv_i_b * impulse;
            }

            // Upper limit; signs flipped to keep C positive when satisfied.
            {
                let c = self.upper_angle - self.angle;
                let cdot = va.w - vb.w;
                let impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old = self.upper_impulse;
                self.upper_impulse = (self.upper_impulse + impulse).max(0.0);
                let impulse = self.upper_impulse - old;
                va.w += sb.inv_i_a * impulse;
                vb.w -= sb.inv_i_b * impulse;
            }
        }

        // Point to point
        {
            let cdot = vb.v + Vec2::scalar_cross(vb.w, self.r_b) - va.v - Vec2::scalar_cross(va.w, self.r_a);
            let impulse = self.k.solve(-cdot);
            self.impulse += impulse;
            va.v -= impulse * sb.inv_mass_a;
            va.w -= sb.inv_i_a * self.r_a.cross(impulse);
            vb.v += impulse * sb.inv_mass_b;
            vb.w += sb.inv_i_b * self.r_b.cross(impulse);
        }

        sb.store_velocities(data, va, vb);
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let sb = self.sb;
        let mut pa = data.positions[sb.index_a];
        let mut pb = data.positions[sb.index_b];

        let mut angular_error = 0.0;
        let fixed_rotation = sb.inv_i_a + sb.inv_i_b == 0.0;

        if self.enable_limit && !fixed_rotation {
            let angle = pb.a - pa.a - self.reference_angle;
            let c = if (self.upper_angle - self.lower_angle).abs() < 2.0 * ANGULAR_SLOP {
                (angle - self.lower_angle).clamp(-MAX_ANGULAR_CORRECTION, MAX_ANGULAR_CORRECTION)
            } else if angle <= self.lower_angle {
                (angle - self.lower_angle + ANGULAR_SLOP).clamp(-MAX_ANGULAR_CORRECTION, 0.0)
            } else if angle >= self.upper_angle {
                (angle - self.upper_angle - ANGULAR_SLOP).clamp(0.0, MAX_ANGULAR_CORRECTION)
            } else {
                0.0
            };

            let limit_impulse = -self.axial_mass * c;
            pa.a -= sb.inv_i_a * limit_impulse;
            pb.a += sb.inv_i_b * limit_impulse;
            angular_error = c.abs();
        }

        let qa = Rot::from_angle(pa.a);
        let qb = Rot::from_angle(pb.a);
        let r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        let r_b = qb.apply(self.local_anchor_b - sb.local_center_b);

        let c = pb.c + r_b - pa.c - r_a;
        let position_error = c.length();
        let impulse = -point_mass(&sb, r_a, r_b).solve(c);

        pa.c -= impulse * sb.inv_mass_a;
        pa.a -= sb.inv_i_a * r_a.cross(impulse);
        pb.c += impulse * sb.inv_mass_b;
        pb.a += sb.inv_i_b * r_b.cross(impulse);

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

    fn ids() -> (BodyId, BodyId) {
        (
            BodyId::from_index(Index { slot: 0, generation: 0 }),
            BodyId::from_index(Index { slot: 1, generation: 0 }),
        )
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
    fn test_reversed_limits_rejected() {
        let (a, b) = ids();
        let def = RevoluteJointDef::new(a, b).with_limits(1.0, -1.0);
        assert!(RevoluteJoint::new(&def).is_err());
    }

    #[test]
    fn test_set_limits_reorders() {
        let (a, b) = ids();
        let mut joint = RevoluteJoint::new(&RevoluteJointDef::new(a, b)).unwrap();
        joint.set_limits(0.5, -0.5);
        assert_eq!(joint.lower_limit(), -0.5);
        assert_eq!(joint.upper_limit(), 0.5);
    }

    #[test]
    fn test_anchor_velocity_matches_after_solve() {
        let (a, b) = ids();
        // Ground at the origin, 1 kg bob hanging from an anchor 1 m away.
        let mut joint = RevoluteJoint::new(&RevoluteJointDef {
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::new(0.0, 1.0),
            ..RevoluteJointDef::new(a, b)
        })
        .unwrap();
        let sb = SolverBodies {
            index_a: 0,
            index_b: 1,
            inv_mass_b: 1.0,
            inv_i_b: 6.0,
            ..SolverBodies::default()
        };
        let mut positions = [
            Position::default(),
            Position { c: Vec2::new(0.0, -1.0), a: 0.0 },
        ];
        let mut velocities = [
            Velocity::default(),
            Velocity { v: Vec2::new(1.0, -2.0), w: 0.0 },
        ];
        let mut data = SolverData {
            step: step(),
            positions: &mut positions,
            velocities: &mut velocities,
        };
        joint.init_velocity_constraints(sb, &mut data);
        for _ in 0..20 {
            joint.solve_velocity_constraints(&mut data);
        }
        let vb = data.velocities[1];
        let anchor_speed = vb.v + Vec2::scalar_cross(vb.w, Vec2::new(0.0, 1.0));
        assert!(anchor_speed.length() < 1e-4);
    }

    #[test]
    fn test_motor_drives_speed() {
        let (a, b) = ids();
        let mut joint = RevoluteJoint::new(&RevoluteJointDef::new(a, b).with_motor(2.0, 1000.0)).unwrap();
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
            step: step(),
            positions: &mut positions,
            velocities: &mut velocities,
        };
        joint.init_velocity_constraints(sb, &mut data);
        joint.solve_velocity_constraints(&mut data);
        assert!((data.velocities[1].w - 2.0).abs() < 1e-5);
        assert!(joint.motor_torque(60.0) > 0.0);
    }
}
