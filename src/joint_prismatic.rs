//! Prismatic Joint
//!
//! One translational degree of freedom along an axis fixed in body A;
//! relative rotation is locked. Optional translation limits and a
//! force-capped motor.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::arena::BodyId;
use crate::body::Body;
use crate::error::{PhysicsError, PhysicsResult};
use crate::joint::{check_finite, SolverBodies};
use crate::math::{Mat22, Mat33, Rot, Vec2, Vec3};
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP};
use crate::step::SolverData;
use crate::world::World;

/// Prismatic joint definition.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrismaticJointDef {
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
    /// Translation axis in body A's frame
    pub local_axis_a: Vec2,
    /// Angle of B minus angle of A in the reference pose
    pub reference_angle: f32,
    /// Enable the translation limits
    pub enable_limit: bool,
    /// Lower translation (m)
    pub lower_translation: f32,
    /// Upper translation (m)
    pub upper_translation: f32,
    /// Enable the motor
    pub enable_motor: bool,
    /// Maximum motor force (N)
    pub max_motor_force: f32,
    /// Target speed (m/s)
    pub motor_speed: f32,
}

impl PrismaticJointDef {
    /// Definition sliding along body A's x axis.
    #[must_use]
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            local_axis_a: Vec2::UNIT_X,
            reference_angle: 0.0,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            max_motor_force: 0.0,
            motor_speed: 0.0,
        }
    }

    /// Anchor and world axis, with the current relative angle as reference.
    pub fn initialize(
        world: &World,
        body_a: BodyId,
        body_b: BodyId,
        anchor: Vec2,
        axis: Vec2,
    ) -> PhysicsResult<Self> {
        let (a, b) = world.body_pair(body_a, body_b)?;
        Ok(Self {
            local_anchor_a: a.local_point(anchor),
            local_anchor_b: b.local_point(anchor),
            local_axis_a: a.local_vector(axis),
            reference_angle: b.angle() - a.angle(),
            ..Self::new(body_a, body_b)
        })
    }

    /// Enable limits.
    #[must_use]
    pub fn with_limits(mut self, lower: f32, upper: f32) -> Self {
        self.enable_limit = true;
        self.lower_translation = lower;
        self.upper_translation = upper;
        self
    }

    /// Enable the motor.
    #[must_use]
    pub fn with_motor(mut self, speed: f32, max_force: f32) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_force = max_force;
        self
    }
}

/// Prismatic joint state.
#[derive(Clone, Debug)]
pub struct PrismaticJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    pub(crate) local_x_axis_a: Vec2,
    local_y_axis_a: Vec2,
    pub(crate) reference_angle: f32,
    enable_limit: bool,
    lower_translation: f32,
    upper_translation: f32,
    enable_motor: bool,
    max_motor_force: f32,
    motor_speed: f32,

    impulse: Vec2,
    motor_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    sb: SolverBodies,
    axis: Vec2,
    perp: Vec2,
    s1: f32,
    s2: f32,
    a1: f32,
    a2: f32,
    k: Mat22,
    translation: f32,
    axial_mass: f32,
}

impl PrismaticJoint {
    pub(crate) fn new(def: &PrismaticJointDef) -> PhysicsResult<Self> {
        check_finite(
            &[
                def.local_anchor_a.x,
                def.local_anchor_a.y,
                def.local_anchor_b.x,
                def.local_anchor_b.y,
                def.local_axis_a.x,
                def.local_axis_a.y,
                def.reference_angle,
                def.lower_translation,
                def.upper_translation,
                def.max_motor_force,
                def.motor_speed,
            ],
            "prismatic joint parameters must be finite",
        )?;
        if def.local_axis_a.length_squared() < f32::EPSILON {
            return Err(PhysicsError::InvalidJoint {
                reason: "prismatic axis must be non-zero",
            });
        }
        if def.lower_translation > def.upper_translation {
            return Err(PhysicsError::InvalidJoint {
                reason: "prismatic lower translation exceeds upper translation",
            });
        }
        let x_axis = def.local_axis_a.normalized();
        Ok(Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            local_x_axis_a: x_axis,
            local_y_axis_a: Vec2::scalar_cross(1.0, x_axis),
            reference_angle: def.reference_angle,
            enable_limit: def.enable_limit,
            lower_translation: def.lower_translation,
            upper_translation: def.upper_translation,
            enable_motor: def.enable_motor,
            max_motor_force: def.max_motor_force,
            motor_speed: def.motor_speed,
            impulse: Vec2::ZERO,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            sb: SolverBodies::default(),
            axis: Vec2::ZERO,
            perp: Vec2::ZERO,
            s1: 0.0,
            s2: 0.0,
            a1: 0.0,
            a2: 0.0,
            k: Mat22::ZERO,
            translation: 0.0,
            axial_mass: 0.0,
        })
    }

    /// Current translation along the axis.
    #[must_use]
    pub fn joint_translation(&self, body_a: &Body, body_b: &Body) -> f32 {
        let pa = body_a.world_point(self.local_anchor_a);
        let pb = body_b.world_point(self.local_anchor_b);
        (pb - pa).dot(body_a.world_vector(self.local_x_axis_a))
    }

    /// Current translation speed along the axis.
    #[must_use]
    pub fn joint_speed(&self, body_a: &Body, body_b: &Body) -> f32 {
        let r_a = body_a.xf.q.apply(self.local_anchor_a - body_a.sweep.local_center);
        let r_b = body_b.xf.q.apply(self.local_anchor_b - body_b.sweep.local_center);
        let p1 = body_a.sweep.c + r_a;
        let p2 = body_b.sweep.c + r_b;
        let d = p2 - p1;
        let axis = body_a.xf.q.apply(self.local_x_axis_a);

        let (va, vb) = (body_a.linear_velocity(), body_b.linear_velocity());
        let (wa, wb) = (body_a.angular_velocity(), body_b.angular_velocity());
        d.dot(Vec2::scalar_cross(wa, axis))
            + axis.dot(vb + Vec2::scalar_cross(wb, r_b) - va - Vec2::scalar_cross(wa, r_a))
    }

    /// Translation axis in body A's frame (unit length).
    #[must_use]
    pub fn local_axis_a(&self) -> Vec2 {
        self.local_x_axis_a
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

    /// Lower translation.
    #[must_use]
    pub fn lower_limit(&self) -> f32 {
        self.lower_translation
    }

    /// Upper translation.
    #[must_use]
    pub fn upper_limit(&self) -> f32 {
        self.upper_translation
    }

    /// Set both limits; they are reordered if given reversed.
    pub fn set_limits(&mut self, lower: f32, upper: f32) {
        if lower != self.lower_translation || upper != self.upper_translation {
            self.lower_translation = lower.min(upper);
            self.upper_translation = lower.max(upper);
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
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

    /// Motor speed.
    #[must_use]
    pub fn motor_speed(&self) -> f32 {
        self.motor_speed
    }

    /// Set the motor speed.
    pub fn set_motor_speed(&mut self, speed: f32) {
        self.motor_speed = speed;
    }

    /// Maximum motor force.
    #[must_use]
    pub fn max_motor_force(&self) -> f32 {
        self.max_motor_force
    }

    /// Set the maximum motor force.
    pub fn set_max_motor_force(&mut self, force: f32) {
        self.max_motor_force = force;
    }

    /// Motor force applied during the last step.
    #[must_use]
    pub fn motor_force(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        (self.perp * self.impulse.x + self.axis * (self.motor_impulse + self.lower_impulse - self.upper_impulse))
            * inv_dt
    }

    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse.y
    }

    fn apply(&self, p: Vec2, la: f32, lb: f32, va: &mut crate::step::Velocity, vb: &mut crate::step::Velocity) {
        let sb = &self.sb;
        va.v -= p * sb.inv_mass_a;
        va.w -= sb.inv_i_a * la;
        vb.v += p * sb.inv_mass_b;
        vb.w += sb.inv_i_b * lb;
    }

    pub(crate) fn init_velocity_constraints(&mut self, sb: SolverBodies, data: &mut SolverData) {
        self.sb = sb;
        let pa = data.positions[sb.index_a];
        let pb = data.positions[sb.index_b];
        let (mut va, mut vb) = sb.velocities(data);
        let (m_a, m_b, i_a, i_b) = (sb.inv_mass_a, sb.inv_mass_b, sb.inv_i_a, sb.inv_i_b);

        let qa = Rot::from_angle(pa.a);
        let qb = Rot::from_angle(pb.a);
        let r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        let r_b = qb.apply(self.local_anchor_b - sb.local_center_b);
        let d = (pb.c - pa.c) + r_b - r_a;

        // Motor and limit Jacobian.
        self.axis = qa.apply(self.local_x_axis_a);
        self.a1 = (d + r_a).cross(self.axis);
        self.a2 = r_b.cross(self.axis);
        self.axial_mass = m_a + m_b + i_a * self.a1 * self.a1 + i_b * self.a2 * self.a2;
        if self.axial_mass > 0.0 {
            self.axial_mass = 1.0 / self.axial_mass;
        }

        // Perpendicular and angular constraint.
        self.perp = qa.apply(self.local_y_axis_a);
        self.s1 = (d + r_a).cross(self.perp);
        self.s2 = r_b.cross(self.perp);
        let k11 = m_a + m_b + i_a * self.s1 * self.s1 + i_b * self.s2 * self.s2;
        let k12 = i_a * self.s1 + i_b * self.s2;
        let mut k22 = i_a + i_b;
        if k22 == 0.0 {
            // Both bodies have fixed rotation.
            k22 = 1.0;
        }
        self.k = Mat22::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));

        if self.enable_limit {
            self.translation = self.axis.dot(d);
        } else {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            let ratio = data.step.dt_ratio;
            self.impulse *= ratio;
            self.motor_impulse *= ratio;
            self.lower_impulse *= ratio;
            self.upper_impulse *= ratio;

            let axial = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.perp * self.impulse.x + self.axis * axial;
            let la = self.impulse.x * self.s1 + self.impulse.y + axial * self.a1;
            let lb = self.impulse.x * self.s2 + self.impulse.y + axial * self.a2;
            self.apply(p, la, lb, &mut va, &mut vb);
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

        let axial_speed =
            |va: &crate::step::Velocity, vb: &crate::step::Velocity, axis: Vec2, a1: f32, a2: f32| {
                axis.dot(vb.v - va.v) + a2 * vb.w - a1 * va.w
            };

        if self.enable_motor {
            let cdot = axial_speed(&va, &vb, self.axis, self.a1, self.a2);
            let impulse = self.axial_mass * (self.motor_speed - cdot);
            let old = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_force;
            self.motor_impulse = (old + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old;
            self.apply(self.axis * impulse, impulse * self.a1, impulse * self.a2, &mut va, &mut vb);
        }

        if self.enable_limit {
            // Lower limit
            {
                let c = self.translation - self.lower_translation;
                let cdot = axial_speed(&va, &vb, self.axis, self.a1, self.a2);
                let impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old = self.lower_impulse;
                self.lower_impulse = (self.lower_impulse + impulse).max(0.0);
                let impulse = self.lower_impulse - old;
                self.apply(self.axis * impulse, impulse * self.a1, impulse * self.a2, &mut va, &mut vb);
            }

            // Upper limit; signs flipped to keep C positive when satisfied.
            {
                let c = self.upper_translation - self.translation;
                let cdot = -axial_speed(&va, &vb, self.axis, self.a1, self.a2);
                let impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old = self.upper_impulse;
                self.upper_impulse = (self.upper_impulse + impulse).max(0.0);
                let impulse = old - self.upper_impulse;
                self.apply(self.axis * impulse, impulse * self.a1, impulse * self.a2, &mut va, &mut vb);
            }
        }

        // Perpendicular and angular constraint in block form.
        {
            let cdot = Vec2::new(
                self.perp.dot(vb.v - va.v) + self.s2 * vb.w - self.s1 * va.w,
                vb.w - va.w,
            );
            let df = self.k.solve(-cdot);
            self.impulse += df;
            let p = self.perp * df.x;
            let la = df.x * self.s1 + df.y;
            let lb = df.x * self.s2 + df.y;
            self.apply(p, la, lb, &mut va, &mut vb);
        }

        sb.store_velocities(data, va, vb);
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let sb = self.sb;
        let mut pa = data.positions[sb.index_a];
        let mut pb = data.positions[sb.index_b];
        let (m_a, m_b, i_a, i_b) = (sb.inv_mass_a, sb.inv_mass_b, sb.inv_i_a, sb.inv_i_b);

        let qa = Rot::from_angle(pa.a);
        let qb = Rot::from_angle(pb.a);
        let r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        let r_b = qb.apply(self.local_anchor_b - sb.local_center_b);
        let d = pb.c + r_b - pa.c - r_a;

        let axis = qa.apply(self.local_x_axis_a);
        let a1 = (d + r_a).cross(axis);
        let a2 = r_b.cross(axis);
        let perp = qa.apply(self.local_y_axis_a);
        let s1 = (d + r_a).cross(perp);
        let s2 = r_b.cross(perp);

        let c1 = Vec2::new(perp.dot(d), pb.a - pa.a - self.reference_angle);
        let mut linear_error = c1.x.abs();
        let angular_error = c1.y.abs();

        let mut active = false;
        let mut c2 = 0.0;
        if self.enable_limit {
            let translation = axis.dot(d);
            if (self.upper_translation - self.lower_translation).abs() < 2.0 * LINEAR_SLOP {
                c2 = translation - self.lower_translation;
                linear_error = linear_error.max(c2.abs());
                active = true;
            } else if translation <= self.lower_translation {
                c2 = (translation - self.lower_translation).min(0.0);
                linear_error = linear_error.max(self.lower_translation - translation);
                active = true;
            } else if translation >= self.upper_translation {
                c2 = (translation - self.upper_translation).max(0.0);
                linear_error = linear_error.max(translation - self.upper_translation);
                active = true;
            }
        }

        let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
        let k12 = i_a * s1 + i_b * s2;
        let mut k22 = i_a + i_b;
        if k22 == 0.0 {
            k22 = 1.0;
        }

        let impulse = if active {
            let k13 = i_a * s1 * a1 + i_b * s2 * a2;
            let k23 = i_a * a1 + i_b * a2;
            let k33 = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;
            let k = Mat33 {
                ex: Vec3::new(k11, k12, k13),
                ey: Vec3::new(k12, k22, k23),
                ez: Vec3::new(k13, k23, k33),
            };
            k.solve33(-Vec3::new(c1.x, c1.y, c2))
        } else {
            let k = Mat22::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));
            let impulse = k.solve(-c1);
            Vec3::new(impulse.x, impulse.y, 0.0)
        };

        let p = perp * impulse.x + axis * impulse.z;
        let la = impulse.x * s1 + impulse.y + impulse.z * a1;
        let lb = impulse.x * s2 + impulse.y + impulse.z * a2;

        pa.c -= p * m_a;
        pa.a -= i_a * la;
        pb.c += p * m_b;
        pb.a += i_b * lb;

        data.positions[sb.index_a] = pa;
        data.positions[sb.index_b] = pb;

        linear_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
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

    fn data_step() -> TimeStep {
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
    fn test_axis_is_normalized() {
        let (a, b) = ids();
        let joint = PrismaticJoint::new(&PrismaticJointDef {
            local_axis_a: Vec2::new(0.0, 3.0),
            ..PrismaticJointDef::new(a, b)
        })
        .unwrap();
        assert_eq!(joint.local_axis_a(), Vec2::UNIT_Y);
        assert!(PrismaticJoint::new(&PrismaticJointDef {
            local_axis_a: Vec2::ZERO,
            ..PrismaticJointDef::new(a, b)
        })
        .is_err());
    }

    #[test]
    fn test_removes_perpendicular_motion() {
        let (a, b) = ids();
        let mut joint = PrismaticJoint::new(&PrismaticJointDef::new(a, b)).unwrap();
        let sb = SolverBodies {
            index_a: 0,
            index_b: 1,
            inv_mass_b: 1.0,
            inv_i_b: 1.0,
            ..SolverBodies::default()
        };
        let mut positions = [Position::default(), Position { c: Vec2::new(1.0, 0.0), a: 0.0 }];
        let mut velocities = [
            Velocity::default(),
            Velocity { v: Vec2::new(2.0, 3.0), w: 1.0 },
        ];
        let mut data = SolverData {
            step: data_step(),
            positions: &mut positions,
            velocities: &mut velocities,
        };
        joint.init_velocity_constraints(sb, &mut data);
        joint.solve_velocity_constraints(&mut data);

        let vb = data.velocities[1];
        assert!((vb.v.x - 2.0).abs() < 1e-5);
        assert!(vb.v.y.abs() < 1e-5);
        assert!(vb.w.abs() < 1e-5);
    }

    #[test]
    fn test_upper_limit_stops_motion() {
        let (a, b) = ids();
        let mut joint = PrismaticJoint::new(&PrismaticJointDef::new(a, b).with_limits(-1.0, 1.0)).unwrap();
        let sb = SolverBodies {
            index_a: 0,
            index_b: 1,
            inv_mass_b: 1.0,
            inv_i_b: 1.0,
            ..SolverBodies::default()
        };
        let mut positions = [Position::default(), Position { c: Vec2::new(1.0, 0.0), a: 0.0 }];
        let mut velocities = [Velocity::default(), Velocity { v: Vec2::new(4.0, 0.0), w: 0.0 }];
        let mut data = SolverData {
            step: data_step(),
            positions: &mut positions,
            velocities: &mut velocities,
        };
        joint.init_velocity_constraints(sb, &mut data);
        joint.solve_velocity_constraints(&mut data);
        assert!(data.velocities[1].v.x.abs() < 1e-5);
    }
}
