//! Wheel Joint
//!
//! Point-on-line constraint with a suspension spring along the line, free
//! rotation driven by an optional motor, and optional translation limits.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::arena::BodyId;
use crate::body::Body;
use crate::error::{PhysicsError, PhysicsResult};
use crate::joint::{check_finite, SolverBodies};
use crate::math::{Rot, Vec2};
use crate::settings::LINEAR_SLOP;
use crate::step::{SolverData, Velocity};
use crate::world::World;

/// Wheel joint definition.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WheelJointDef {
    /// Chassis
    pub body_a: BodyId,
    /// Wheel
    pub body_b: BodyId,
    /// Allow the bodies to collide
    pub collide_connected: bool,
    /// Application data
    pub user_data: u64,
    /// Anchor relative to body A's origin
    pub local_anchor_a: Vec2,
    /// Anchor relative to body B's origin
    pub local_anchor_b: Vec2,
    /// Suspension axis in body A's frame
    pub local_axis_a: Vec2,
    /// Enable the translation limits
    pub enable_limit: bool,
    /// Lower translation (m)
    pub lower_translation: f32,
    /// Upper translation (m)
    pub upper_translation: f32,
    /// Enable the motor
    pub enable_motor: bool,
    /// Maximum motor torque (N·m)
    pub max_motor_torque: f32,
    /// Target angular speed (rad/s)
    pub motor_speed: f32,
    /// Suspension stiffness (N/m)
    pub stiffness: f32,
    /// Suspension damping (N·s/m)
    pub damping: f32,
}

impl WheelJointDef {
    /// Definition with the suspension along body A's x axis.
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
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            max_motor_torque: 0.0,
            motor_speed: 0.0,
            stiffness: 0.0,
            damping: 0.0,
        }
    }

    /// Anchor and world suspension axis.
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
            ..Self::new(body_a, body_b)
        })
    }
}

/// Wheel joint state.
#[derive(Clone, Debug)]
pub struct WheelJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    local_x_axis_a: Vec2,
    local_y_axis_a: Vec2,
    enable_limit: bool,
    lower_translation: f32,
    upper_translation: f32,
    enable_motor: bool,
    max_motor_torque: f32,
    motor_speed: f32,
    stiffness: f32,
    damping: f32,

    impulse: f32,
    motor_impulse: f32,
    spring_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    sb: SolverBodies,
    translation: f32,
    ax: Vec2,
    ay: Vec2,
    s_ax: f32,
    s_bx: f32,
    s_ay: f32,
    s_by: f32,
    mass: f32,
    motor_mass: f32,
    axial_mass: f32,
    spring_mass: f32,
    bias: f32,
    gamma: f32,
}

impl WheelJoint {
    pub(crate) fn new(def: &WheelJointDef) -> PhysicsResult<Self> {
        check_finite(
            &[
                def.local_anchor_a.x,
                def.local_anchor_a.y,
                def.local_anchor_b.x,
                def.local_anchor_b.y,
                def.local_axis_a.x,
                def.local_axis_a.y,
                def.lower_translation,
                def.upper_translation,
                def.max_motor_torque,
                def.motor_speed,
                def.stiffness,
                def.damping,
            ],
            "wheel joint parameters must be finite",
        )?;
        if def.local_axis_a.length_squared() < f32::EPSILON {
            return Err(PhysicsError::InvalidJoint {
                reason: "wheel axis must be non-zero",
            });
        }
        if def.lower_translation > def.upper_translation {
            return Err(PhysicsError::InvalidJoint {
                reason: "wheel lower translation exceeds upper translation",
            });
        }
        if def.stiffness < 0.0 || def.damping < 0.0 {
            return Err(PhysicsError::InvalidJoint {
                reason: "wheel stiffness and damping must be non-negative",
            });
        }
        let x_axis = def.local_axis_a.normalized();
        Ok(Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            local_x_axis_a: x_axis,
            local_y_axis_a: Vec2::scalar_cross(1.0, x_axis),
            enable_limit: def.enable_limit,
            lower_translation: def.lower_translation,
            upper_translation: def.upper_translation,
            enable_motor: def.enable_motor,
            max_motor_torque: def.max_motor_torque,
            motor_speed: def.motor_speed,
            stiffness: def.stiffness,
            damping: def.damping,
            impulse: 0.0,
            motor_impulse: 0.0,
            spring_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            sb: SolverBodies::default(),
            translation: 0.0,
            ax: Vec2::ZERO,
            ay: Vec2::ZERO,
            s_ax: 0.0,
            s_bx: 0.0,
            s_ay: 0.0,
            s_by: 0.0,
            mass: 0.0,
            motor_mass: 0.0,
            axial_mass: 0.0,
            spring_mass: 0.0,
            bias: 0.0,
            gamma: 0.0,
        })
    }

    /// Current suspension translation.
    #[must_use]
    pub fn joint_translation(&self, body_a: &Body, body_b: &Body) -> f32 {
        let pa = body_a.world_point(self.local_anchor_a);
        let pb = body_b.world_point(self.local_anchor_b);
        (pb - pa).dot(body_a.world_vector(self.local_x_axis_a))
    }

    /// Current relative angular speed.
    #[must_use]
    pub fn joint_angular_speed(&self, body_a: &Body, body_b: &Body) -> f32 {
        body_b.angular_velocity() - body_a.angular_velocity()
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

    /// Set the maximum motor torque.
    pub fn set_max_motor_torque(&mut self, torque: f32) {
        self.max_motor_torque = torque;
    }

    /// Motor torque applied during the last step.
    #[must_use]
    pub fn motor_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    /// Suspension stiffness.
    #[must_use]
    pub fn stiffness(&self) -> f32 {
        self.stiffness
    }

    /// Set the suspension stiffness.
    pub fn set_stiffness(&mut self, stiffness: f32) {
        self.stiffness = stiffness;
    }

    /// Suspension damping.
    #[must_use]
    pub fn damping(&self) -> f32 {
        self.damping
    }

    /// Set the suspension damping.
    pub fn set_damping(&mut self, damping: f32) {
        self.damping = damping;
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        (self.ay * self.impulse + self.ax * (self.spring_impulse + self.lower_impulse - self.upper_impulse)) * inv_dt
    }

    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    fn apply(&self, p: Vec2, la: f32, lb: f32, va: &mut Velocity, vb: &mut Velocity) {
        let sb = &self.sb;
        va.v -= p * sb.inv_mass_a;
        va.w -= sb.inv_i_a * la;
        vb.v += p * sb.inv_mass_b;
        vb.w += sb.inv_i_b * lb;
    }

    fn axial_speed(&self, va: &Velocity, vb: &Velocity) -> f32 {
        self.ax.dot(vb.v - va.v) + self.s_bx * vb.w - self.s_ax * va.w
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
        let d = pb.c + r_b - pa.c - r_a;

        // Point to line
        self.ay = qa.apply(self.local_y_axis_a);
        self.s_ay = (d + r_a).cross(self.ay);
        self.s_by = r_b.cross(self.ay);
        self.mass = m_a + m_b + i_a * self.s_ay * self.s_ay + i_b * self.s_by * self.s_by;
        if self.mass > 0.0 {
            self.mass = 1.0 / self.mass;
        }

        // Spring
        self.ax = qa.apply(self.local_x_axis_a);
        self.s_ax = (d + r_a).cross(self.ax);
        self.s_bx = r_b.cross(self.ax);
        let inv_mass = m_a + m_b + i_a * self.s_ax * self.s_ax + i_b * self.s_bx * self.s_bx;
        self.axial_mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        self.spring_mass = 0.0;
        self.bias = 0.0;
        self.gamma = 0.0;
        if self.stiffness > 0.0 && inv_mass > 0.0 {
            let c = d.dot(self.ax);
            let h = data.step.dt;
            self.gamma = h * (self.damping + h * self.stiffness);
            if self.gamma > 0.0 {
                self.gamma = 1.0 / self.gamma;
            }
            self.bias = c * h * self.stiffness * self.gamma;
            self.spring_mass = inv_mass + self.gamma;
            if self.spring_mass > 0.0 {
                self.spring_mass = 1.0 / self.spring_mass;
            }
        } else {
            self.spring_impulse = 0.0;
        }

        if self.enable_limit {
            self.translation = self.ax.dot(d);
        } else {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        if self.enable_motor {
            self.motor_mass = i_a + i_b;
            if self.motor_mass > 0.0 {
                self.motor_mass = 1.0 / self.motor_mass;
            }
        } else {
            self.motor_mass = 0.0;
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            let ratio = data.step.dt_ratio;
            self.impulse *= ratio;
            self.spring_impulse *= ratio;
            self.motor_impulse *= ratio;
            self.lower_impulse *= ratio;
            self.upper_impulse *= ratio;

            let axial = self.spring_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.ay * self.impulse + self.ax * axial;
            let la = self.impulse * self.s_ay + axial * self.s_ax + self.motor_impulse;
            let lb = self.impulse * self.s_by + axial * self.s_bx + self.motor_impulse;
            self.apply(p, la, lb, &mut va, &mut vb);
        } else {
            self.impulse = 0.0;
            self.spring_impulse = 0.0;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        sb.store_velocities(data, va, vb);
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let sb = self.sb;
        let (mut va, mut vb) = sb.velocities(data);

        // Spring
        {
            let cdot = self.axial_speed(&va, &vb);
            let impulse = -self.spring_mass * (cdot + self.bias + self.gamma * self.spring_impulse);
            self.spring_impulse += impulse;
            self.apply(self.ax * impulse, impulse * self.s_ax, impulse * self.s_bx, &mut va, &mut vb);
        }

        // Rotational motor
        {
            let cdot = vb.w - va.w - self.motor_speed;
            let impulse = -self.motor_mass * cdot;
            let old = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_torque;
            self.motor_impulse = (old + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old;
            va.w -= sb.inv_i_a * impulse;
            vb.w += sb.inv_i_b * impulse;
        }

        if self.enable_limit {
            // Lower limit
            {
                let c = self.translation - self.lower_translation;
                let cdot = self.axial_speed(&va, &vb);
                let impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old = self.lower_impulse;
                self.lower_impulse = (self.lower_impulse + impulse).max(0.0);
                let impulse = self.lower_impulse - old;
                self.apply(self.ax * impulse, impulse * self.s_ax, impulse * self.s_bx, &mut va, &mut vb);
            }

            // Upper limit; signs flipped to keep C positive when satisfied.
            {
                let c = self.upper_translation - self.translation;
                let cdot = -self.axial_speed(&va, &vb);
                let impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old = self.upper_impulse;
                self.upper_impulse = (self.upper_impulse + impulse).max(0.0);
                let impulse = old - self.upper_impulse;
                self.apply(self.ax * impulse, impulse * self.s_ax, impulse * self.s_bx, &mut va, &mut vb);
            }
        }

        // Point to line
        {
            let cdot = self.ay.dot(vb.v - va.v) + self.s_by * vb.w - self.s_ay * va.w;
            let impulse = -self.mass * cdot;
            self.impulse += impulse;
            self.apply(self.ay * impulse, impulse * self.s_ay, impulse * self.s_by, &mut va, &mut vb);
        }

        sb.store_velocities(data, va, vb);
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let sb = self.sb;
        let mut pa = data.positions[sb.index_a];
        let mut pb = data.positions[sb.index_b];
        let (m_a, m_b, i_a, i_b) = (sb.inv_mass_a, sb.inv_mass_b, sb.inv_i_a, sb.inv_i_b);

        let mut linear_error = 0.0_f32;

        if self.enable_limit {
            let qa = Rot::from_angle(pa.a);
            let qb = Rot::from_angle(pb.a);
            let r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
            let r_b = qb.apply(self.local_anchor_b - sb.local_center_b);
            let d = (pb.c - pa.c) + r_b - r_a;

            let ax = qa.apply(self.local_x_axis_a);
            let s_ax = (d + r_a).cross(ax);
            let s_bx = r_b.cross(ax);

            let translation = ax.dot(d);
            let c = if (self.upper_translation - self.lower_translation).abs() < 2.0 * LINEAR_SLOP {
                translation - self.lower_translation
            } else if translation <= self.lower_translation {
                (translation - self.lower_translation).min(0.0)
            } else if translation >= self.upper_translation {
                (translation - self.upper_translation).max(0.0)
            } else {
                0.0
            };

            if c != 0.0 {
                let inv_mass = m_a + m_b + i_a * s_ax * s_ax + i_b * s_bx * s_bx;
                let impulse = if inv_mass != 0.0 { -c / inv_mass } else { 0.0 };
                let p = ax * impulse;
                pa.c -= p * m_a;
                pa.a -= i_a * impulse * s_ax;
                pb.c += p * m_b;
                pb.a += i_b * impulse * s_bx;
                linear_error = c.abs();
            }
        }

        // Perpendicular constraint
        {
            let qa = Rot::from_angle(pa.a);
            let qb = Rot::from_angle(pb.a);
            let r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
            let r_b = qb.apply(self.local_anchor_b - sb.local_center_b);
            let d = (pb.c - pa.c) + r_b - r_a;

            let ay = qa.apply(self.local_y_axis_a);
            let s_ay = (d + r_a).cross(ay);
            let s_by = r_b.cross(ay);

            let c = d.dot(ay);
            let inv_mass = m_a + m_b + i_a * s_ay * s_ay + i_b * s_by * s_by;
            let impulse = if inv_mass != 0.0 { -c / inv_mass } else { 0.0 };
            let p = ay * impulse;
            pa.c -= p * m_a;
            pa.a -= i_a * impulse * s_ay;
            pb.c += p * m_b;
            pb.a += i_b * impulse * s_by;
            linear_error = linear_error.max(c.abs());
        }

        data.positions[sb.index_a] = pa;
        data.positions[sb.index_b] = pb;

        linear_error <= LINEAR_SLOP
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Handle, Index};
    use crate::step::{Position, TimeStep};

    #[test]
    fn test_suspension_allows_axis_motion_only() {
        let a = BodyId::from_index(Index { slot: 0, generation: 0 });
        let b = BodyId::from_index(Index { slot: 1, generation: 0 });
        let mut joint = WheelJoint::new(&WheelJointDef {
            local_axis_a: Vec2::UNIT_Y,
            ..WheelJointDef::new(a, b)
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
        let mut velocities = [Velocity::default(), Velocity { v: Vec2::new(3.0, -1.0), w: 5.0 }];
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

        let vb = data.velocities[1];
        // Sideways motion removed, suspension travel and wheel spin kept.
        assert!(vb.v.x.abs() < 1e-5);
        assert!((vb.v.y + 1.0).abs() < 1e-5);
        assert!((vb.w - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_axis_rejected() {
        let a = BodyId::from_index(Index { slot: 0, generation: 0 });
        let b = BodyId::from_index(Index { slot: 1, generation: 0 });
        let def = WheelJointDef {
            local_axis_a: Vec2::ZERO,
            ..WheelJointDef::new(a, b)
        };
        assert!(WheelJoint::new(&def).is_err());
    }
}
