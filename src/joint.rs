//! Joint System for Rigid Body Connections
//!
//! Sequential-impulse joint constraints. Every joint connects two bodies and
//! contributes velocity rows (with warm starting) and position correction to
//! the island solver.
//!
//! # Joint Types
//!
//! - **Distance**: rod or spring between two anchors, with length limits
//! - **Friction**: top-down linear and angular friction
//! - **Gear**: couples two revolute/prismatic joints by a ratio
//! - **Motor**: drives a body towards a target offset
//! - **Mouse**: soft point-to-target constraint for dragging
//! - **Prismatic**: 1-DOF translation along an axis (piston)
//! - **Pulley**: rope over two ground anchors
//! - **Revolute**: 1-DOF rotation about a point (hinge)
//! - **Rope**: maximum distance between two anchors
//! - **Weld**: 0-DOF, optionally soft in rotation
//! - **Wheel**: line constraint with suspension spring and motor

use crate::arena::{Arena, BodyId, JointId};
use crate::body::Body;
use crate::error::{PhysicsError, PhysicsResult};
use crate::joint_distance::{DistanceJoint, DistanceJointDef};
use crate::joint_friction::{FrictionJoint, FrictionJointDef};
use crate::joint_gear::{GearJoint, GearJointDef};
use crate::joint_motor::{MotorJoint, MotorJointDef};
use crate::joint_mouse::{MouseJoint, MouseJointDef};
use crate::joint_prismatic::{PrismaticJoint, PrismaticJointDef};
use crate::joint_pulley::{PulleyJoint, PulleyJointDef};
use crate::joint_revolute::{RevoluteJoint, RevoluteJointDef};
use crate::joint_rope::{RopeJoint, RopeJointDef};
use crate::joint_weld::{WeldJoint, WeldJointDef};
use crate::joint_wheel::{WheelJoint, WheelJointDef};
use crate::math::Vec2;
use crate::step::{SolverData, Velocity};

/// Joint type enumeration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JointType {
    /// Distance / spring
    Distance,
    /// Top-down friction
    Friction,
    /// Gear coupling
    Gear,
    /// Offset motor
    Motor,
    /// Mouse drag
    Mouse,
    /// Slider
    Prismatic,
    /// Pulley
    Pulley,
    /// Hinge
    Revolute,
    /// Maximum distance
    Rope,
    /// Weld
    Weld,
    /// Wheel suspension
    Wheel,
}

// ============================================================================
// Definitions
// ============================================================================

/// Definition of any joint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JointDef {
    /// Distance joint
    Distance(DistanceJointDef),
    /// Friction joint
    Friction(FrictionJointDef),
    /// Gear joint
    Gear(GearJointDef),
    /// Motor joint
    Motor(MotorJointDef),
    /// Mouse joint
    Mouse(MouseJointDef),
    /// Prismatic joint
    Prismatic(PrismaticJointDef),
    /// Pulley joint
    Pulley(PulleyJointDef),
    /// Revolute joint
    Revolute(RevoluteJointDef),
    /// Rope joint
    Rope(RopeJointDef),
    /// Weld joint
    Weld(WeldJointDef),
    /// Wheel joint
    Wheel(WheelJointDef),
}

macro_rules! each_def {
    ($value:expr, $def:ident => $body:expr) => {
        match $value {
            JointDef::Distance($def) => $body,
            JointDef::Friction($def) => $body,
            JointDef::Gear($def) => $body,
            JointDef::Motor($def) => $body,
            JointDef::Mouse($def) => $body,
            JointDef::Prismatic($def) => $body,
            JointDef::Pulley($def) => $body,
            JointDef::Revolute($def) => $body,
            JointDef::Rope($def) => $body,
            JointDef::Weld($def) => $body,
            JointDef::Wheel($def) => $body,
        }
    };
}

impl JointDef {
    /// First body.
    #[must_use]
    pub fn body_a(&self) -> BodyId {
        each_def!(self, d => d.body_a)
    }

    /// Second body.
    #[must_use]
    pub fn body_b(&self) -> BodyId {
        each_def!(self, d => d.body_b)
    }

    /// Whether the connected bodies may still collide.
    #[must_use]
    pub fn collide_connected(&self) -> bool {
        each_def!(self, d => d.collide_connected)
    }

    /// Application data.
    #[must_use]
    pub fn user_data(&self) -> u64 {
        each_def!(self, d => d.user_data)
    }

    /// Variant tag.
    #[must_use]
    pub fn joint_type(&self) -> JointType {
        match self {
            Self::Distance(_) => JointType::Distance,
            Self::Friction(_) => JointType::Friction,
            Self::Gear(_) => JointType::Gear,
            Self::Motor(_) => JointType::Motor,
            Self::Mouse(_) => JointType::Mouse,
            Self::Prismatic(_) => JointType::Prismatic,
            Self::Pulley(_) => JointType::Pulley,
            Self::Revolute(_) => JointType::Revolute,
            Self::Rope(_) => JointType::Rope,
            Self::Weld(_) => JointType::Weld,
            Self::Wheel(_) => JointType::Wheel,
        }
    }
}

macro_rules! impl_from_def {
    ($($variant:ident($def:ty)),* $(,)?) => {
        $(
            impl From<$def> for JointDef {
                fn from(def: $def) -> Self {
                    Self::$variant(def)
                }
            }
        )*
    };
}

impl_from_def!(
    Distance(DistanceJointDef),
    Friction(FrictionJointDef),
    Gear(GearJointDef),
    Motor(MotorJointDef),
    Mouse(MouseJointDef),
    Prismatic(PrismaticJointDef),
    Pulley(PulleyJointDef),
    Revolute(RevoluteJointDef),
    Rope(RopeJointDef),
    Weld(WeldJointDef),
    Wheel(WheelJointDef),
);

impl From<&JointDef> for JointDef {
    fn from(def: &JointDef) -> Self {
        *def
    }
}

// ============================================================================
// Stiffness helpers
// ============================================================================

/// Convert a frequency (Hz) and damping ratio into linear stiffness (N/m)
/// and damping (N·s/m) for the effective mass of two bodies.
#[must_use]
pub fn linear_stiffness(frequency_hertz: f32, damping_ratio: f32, body_a: &Body, body_b: &Body) -> (f32, f32) {
    let mass = effective(body_a.mass(), body_b.mass());
    let omega = 2.0 * core::f32::consts::PI * frequency_hertz;
    (mass * omega * omega, 2.0 * mass * damping_ratio * omega)
}

/// Convert a frequency (Hz) and damping ratio into angular stiffness
/// (N·m) and damping (N·m·s).
#[must_use]
pub fn angular_stiffness(frequency_hertz: f32, damping_ratio: f32, body_a: &Body, body_b: &Body) -> (f32, f32) {
    let inertia = effective(body_a.inertia(), body_b.inertia());
    let omega = 2.0 * core::f32::consts::PI * frequency_hertz;
    (inertia * omega * omega, 2.0 * inertia * damping_ratio * omega)
}

fn effective(a: f32, b: f32) -> f32 {
    if a > 0.0 && b > 0.0 {
        a * b / (a + b)
    } else if a > 0.0 {
        a
    } else {
        b
    }
}

// ============================================================================
// Solver plumbing
// ============================================================================

/// Island indices and mass properties of a joint's two bodies, captured
/// when velocity constraints are initialized.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct SolverBodies {
    pub index_a: usize,
    pub index_b: usize,
    pub local_center_a: Vec2,
    pub local_center_b: Vec2,
    pub inv_mass_a: f32,
    pub inv_mass_b: f32,
    pub inv_i_a: f32,
    pub inv_i_b: f32,
}

impl SolverBodies {
    pub fn new(a: &Body, b: &Body) -> Self {
        Self {
            index_a: a.island_index,
            index_b: b.island_index,
            local_center_a: a.sweep.local_center,
            local_center_b: b.sweep.local_center,
            inv_mass_a: a.inv_mass,
            inv_mass_b: b.inv_mass,
            inv_i_a: a.inv_i,
            inv_i_b: b.inv_i,
        }
    }

    #[inline]
    pub fn velocities(&self, data: &SolverData) -> (Velocity, Velocity) {
        (data.velocities[self.index_a], data.velocities[self.index_b])
    }

    #[inline]
    pub fn store_velocities(&self, data: &mut SolverData, a: Velocity, b: Velocity) {
        data.velocities[self.index_a] = a;
        data.velocities[self.index_b] = b;
    }
}

/// Variant payload of a joint.
#[derive(Clone, Debug)]
pub enum JointKind {
    /// Distance joint
    Distance(DistanceJoint),
    /// Friction joint
    Friction(FrictionJoint),
    /// Gear joint
    Gear(GearJoint),
    /// Motor joint
    Motor(MotorJoint),
    /// Mouse joint
    Mouse(MouseJoint),
    /// Prismatic joint
    Prismatic(PrismaticJoint),
    /// Pulley joint
    Pulley(PulleyJoint),
    /// Revolute joint
    Revolute(RevoluteJoint),
    /// Rope joint
    Rope(RopeJoint),
    /// Weld joint
    Weld(WeldJoint),
    /// Wheel joint
    Wheel(WheelJoint),
}

/// A joint between two bodies.
#[derive(Clone, Debug)]
pub struct Joint {
    pub(crate) body_a: BodyId,
    pub(crate) body_b: BodyId,
    pub(crate) collide_connected: bool,
    pub(crate) user_data: u64,
    pub(crate) island_flag: bool,
    pub(crate) kind: JointKind,
}

impl Joint {
    /// Build a joint from its definition. Gear joints read their two
    /// source joints from `joints`.
    pub(crate) fn new(
        def: &JointDef,
        bodies: &Arena<BodyId, Body>,
        joints: &Arena<JointId, Joint>,
    ) -> PhysicsResult<Self> {
        let body = |id: BodyId| {
            bodies
                .get(id)
                .ok_or(PhysicsError::InvalidHandle { kind: "body" })
        };
        body(def.body_a())?;
        let body_b = body(def.body_b())?;

        let (kind, ids) = match def {
            JointDef::Distance(d) => (JointKind::Distance(DistanceJoint::new(d)?), None),
            JointDef::Friction(d) => (JointKind::Friction(FrictionJoint::new(d)?), None),
            JointDef::Gear(d) => {
                let gear = GearJoint::new(d, bodies, joints)?;
                let ids = (gear.body_a, gear.body_b);
                (JointKind::Gear(gear), Some(ids))
            }
            JointDef::Motor(d) => (JointKind::Motor(MotorJoint::new(d)?), None),
            JointDef::Mouse(d) => (JointKind::Mouse(MouseJoint::new(d, body_b)?), None),
            JointDef::Prismatic(d) => (JointKind::Prismatic(PrismaticJoint::new(d)?), None),
            JointDef::Pulley(d) => (JointKind::Pulley(PulleyJoint::new(d)?), None),
            JointDef::Revolute(d) => (JointKind::Revolute(RevoluteJoint::new(d)?), None),
            JointDef::Rope(d) => (JointKind::Rope(RopeJoint::new(d)?), None),
            JointDef::Weld(d) => (JointKind::Weld(WeldJoint::new(d)?), None),
            JointDef::Wheel(d) => (JointKind::Wheel(WheelJoint::new(d)?), None),
        };

        let (body_a, body_b) = ids.unwrap_or((def.body_a(), def.body_b()));
        if body_a == body_b {
            return Err(PhysicsError::InvalidJoint {
                reason: "a joint needs two distinct bodies",
            });
        }

        Ok(Self {
            body_a,
            body_b,
            collide_connected: def.collide_connected(),
            user_data: def.user_data(),
            island_flag: false,
            kind,
        })
    }

    /// Variant tag.
    #[must_use]
    pub fn joint_type(&self) -> JointType {
        match &self.kind {
            JointKind::Distance(_) => JointType::Distance,
            JointKind::Friction(_) => JointType::Friction,
            JointKind::Gear(_) => JointType::Gear,
            JointKind::Motor(_) => JointType::Motor,
            JointKind::Mouse(_) => JointType::Mouse,
            JointKind::Prismatic(_) => JointType::Prismatic,
            JointKind::Pulley(_) => JointType::Pulley,
            JointKind::Revolute(_) => JointType::Revolute,
            JointKind::Rope(_) => JointType::Rope,
            JointKind::Weld(_) => JointType::Weld,
            JointKind::Wheel(_) => JointType::Wheel,
        }
    }

    /// First body.
    #[inline]
    #[must_use]
    pub fn body_a(&self) -> BodyId {
        self.body_a
    }

    /// Second body.
    #[inline]
    #[must_use]
    pub fn body_b(&self) -> BodyId {
        self.body_b
    }

    /// The body on the other side of the joint.
    #[inline]
    #[must_use]
    pub fn other(&self, body: BodyId) -> BodyId {
        if body == self.body_a {
            self.body_b
        } else {
            self.body_a
        }
    }

    /// Whether the connected bodies may collide.
    #[inline]
    #[must_use]
    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    /// Application data.
    #[inline]
    #[must_use]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    /// Set application data.
    #[inline]
    pub fn set_user_data(&mut self, user_data: u64) {
        self.user_data = user_data;
    }

    /// Variant payload.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &JointKind {
        &self.kind
    }

    /// Mutable variant payload (motor speeds, limits, targets).
    #[inline]
    pub fn kind_mut(&mut self) -> &mut JointKind {
        &mut self.kind
    }

    /// World anchor on body A.
    #[must_use]
    pub fn anchor_a(&self, body_a: &Body) -> Vec2 {
        match &self.kind {
            JointKind::Distance(j) => body_a.world_point(j.local_anchor_a),
            JointKind::Friction(j) => body_a.world_point(j.local_anchor_a),
            JointKind::Gear(j) => body_a.world_point(j.local_anchor_a),
            JointKind::Motor(_) => body_a.position(),
            JointKind::Mouse(j) => j.target,
            JointKind::Prismatic(j) => body_a.world_point(j.local_anchor_a),
            JointKind::Pulley(j) => body_a.world_point(j.local_anchor_a),
            JointKind::Revolute(j) => body_a.world_point(j.local_anchor_a),
            JointKind::Rope(j) => body_a.world_point(j.local_anchor_a),
            JointKind::Weld(j) => body_a.world_point(j.local_anchor_a),
            JointKind::Wheel(j) => body_a.world_point(j.local_anchor_a),
        }
    }

    /// World anchor on body B.
    #[must_use]
    pub fn anchor_b(&self, body_b: &Body) -> Vec2 {
        match &self.kind {
            JointKind::Distance(j) => body_b.world_point(j.local_anchor_b),
            JointKind::Friction(j) => body_b.world_point(j.local_anchor_b),
            JointKind::Gear(j) => body_b.world_point(j.local_anchor_b),
            JointKind::Motor(_) => body_b.position(),
            JointKind::Mouse(j) => body_b.world_point(j.local_anchor_b),
            JointKind::Prismatic(j) => body_b.world_point(j.local_anchor_b),
            JointKind::Pulley(j) => body_b.world_point(j.local_anchor_b),
            JointKind::Revolute(j) => body_b.world_point(j.local_anchor_b),
            JointKind::Rope(j) => body_b.world_point(j.local_anchor_b),
            JointKind::Weld(j) => body_b.world_point(j.local_anchor_b),
            JointKind::Wheel(j) => body_b.world_point(j.local_anchor_b),
        }
    }

    /// Reaction force on body B at the joint anchor (N).
    #[must_use]
    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        match &self.kind {
            JointKind::Distance(j) => j.reaction_force(inv_dt),
            JointKind::Friction(j) => j.reaction_force(inv_dt),
            JointKind::Gear(j) => j.reaction_force(inv_dt),
            JointKind::Motor(j) => j.reaction_force(inv_dt),
            JointKind::Mouse(j) => j.reaction_force(inv_dt),
            JointKind::Prismatic(j) => j.reaction_force(inv_dt),
            JointKind::Pulley(j) => j.reaction_force(inv_dt),
            JointKind::Revolute(j) => j.reaction_force(inv_dt),
            JointKind::Rope(j) => j.reaction_force(inv_dt),
            JointKind::Weld(j) => j.reaction_force(inv_dt),
            JointKind::Wheel(j) => j.reaction_force(inv_dt),
        }
    }

    /// Reaction torque on body B (N·m).
    #[must_use]
    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        match &self.kind {
            JointKind::Friction(j) => j.reaction_torque(inv_dt),
            JointKind::Gear(j) => j.reaction_torque(inv_dt),
            JointKind::Motor(j) => j.reaction_torque(inv_dt),
            JointKind::Prismatic(j) => j.reaction_torque(inv_dt),
            JointKind::Revolute(j) => j.reaction_torque(inv_dt),
            JointKind::Weld(j) => j.reaction_torque(inv_dt),
            JointKind::Wheel(j) => j.reaction_torque(inv_dt),
            JointKind::Distance(_) | JointKind::Mouse(_) | JointKind::Pulley(_) | JointKind::Rope(_) => 0.0,
        }
    }

    /// Gear joints reference other joints; this returns them.
    #[must_use]
    pub fn gear_sources(&self) -> Option<(JointId, JointId)> {
        match &self.kind {
            JointKind::Gear(g) => Some((g.joint1, g.joint2)),
            _ => None,
        }
    }

    /// Shift world-space state (mouse target, pulley ground anchors).
    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        match &mut self.kind {
            JointKind::Mouse(j) => j.target -= new_origin,
            JointKind::Pulley(j) => {
                j.ground_anchor_a -= new_origin;
                j.ground_anchor_b -= new_origin;
            }
            _ => {}
        }
    }

    // ========================================================================
    // Solver dispatch
    // ========================================================================

    pub(crate) fn init_velocity_constraints(
        &mut self,
        data: &mut SolverData,
        bodies: &Arena<BodyId, Body>,
    ) {
        let a = &bodies[self.body_a];
        let b = &bodies[self.body_b];
        let sb = SolverBodies::new(a, b);
        match &mut self.kind {
            JointKind::Distance(j) => j.init_velocity_constraints(sb, data),
            JointKind::Friction(j) => j.init_velocity_constraints(sb, data),
            JointKind::Gear(j) => j.init_velocity_constraints(bodies, data),
            JointKind::Motor(j) => j.init_velocity_constraints(sb, data),
            JointKind::Mouse(j) => j.init_velocity_constraints(sb, data),
            JointKind::Prismatic(j) => j.init_velocity_constraints(sb, data),
            JointKind::Pulley(j) => j.init_velocity_constraints(sb, data),
            JointKind::Revolute(j) => j.init_velocity_constraints(sb, data),
            JointKind::Rope(j) => j.init_velocity_constraints(sb, data),
            JointKind::Weld(j) => j.init_velocity_constraints(sb, data),
            JointKind::Wheel(j) => j.init_velocity_constraints(sb, data),
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        match &mut self.kind {
            JointKind::Distance(j) => j.solve_velocity_constraints(data),
            JointKind::Friction(j) => j.solve_velocity_constraints(data),
            JointKind::Gear(j) => j.solve_velocity_constraints(data),
            JointKind::Motor(j) => j.solve_velocity_constraints(data),
            JointKind::Mouse(j) => j.solve_velocity_constraints(data),
            JointKind::Prismatic(j) => j.solve_velocity_constraints(data),
            JointKind::Pulley(j) => j.solve_velocity_constraints(data),
            JointKind::Revolute(j) => j.solve_velocity_constraints(data),
            JointKind::Rope(j) => j.solve_velocity_constraints(data),
            JointKind::Weld(j) => j.solve_velocity_constraints(data),
            JointKind::Wheel(j) => j.solve_velocity_constraints(data),
        }
    }

    /// Returns true when the joint error is within tolerance.
    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        match &mut self.kind {
            JointKind::Distance(j) => j.solve_position_constraints(data),
            JointKind::Gear(j) => j.solve_position_constraints(data),
            JointKind::Prismatic(j) => j.solve_position_constraints(data),
            JointKind::Pulley(j) => j.solve_position_constraints(data),
            JointKind::Revolute(j) => j.solve_position_constraints(data),
            JointKind::Rope(j) => j.solve_position_constraints(data),
            JointKind::Weld(j) => j.solve_position_constraints(data),
            JointKind::Wheel(j) => j.solve_position_constraints(data),
            JointKind::Friction(_) | JointKind::Motor(_) | JointKind::Mouse(_) => true,
        }
    }
}

/// Reject non-finite joint parameters.
pub(crate) fn check_finite(values: &[f32], reason: &'static str) -> PhysicsResult<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(PhysicsError::InvalidJoint { reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDef;
    use crate::shape::MassData;

    #[test]
    fn test_linear_stiffness_uses_reduced_mass() {
        let mut a = Body::new(&BodyDef::dynamic(Vec2::ZERO));
        let mut b = Body::new(&BodyDef::dynamic(Vec2::ZERO));
        let md = |mass| MassData {
            mass,
            center: Vec2::ZERO,
            inertia: 1.0,
        };
        a.set_mass_data(&md(2.0));
        b.set_mass_data(&md(2.0));
        let (k, d) = linear_stiffness(1.0, 0.5, &a, &b);
        let omega = 2.0 * core::f32::consts::PI;
        assert!((k - omega * omega).abs() < 1e-3);
        assert!((d - omega * 0.5 * 2.0).abs() < 1e-3);

        // Against a static body only the dynamic mass counts.
        let ground = Body::new(&BodyDef::fixed(Vec2::ZERO));
        let (k, _) = linear_stiffness(1.0, 0.0, &ground, &a);
        assert!((k - 2.0 * omega * omega).abs() < 1e-3);
    }

    #[test]
    fn test_check_finite() {
        assert!(check_finite(&[1.0, 2.0], "x").is_ok());
        assert!(check_finite(&[1.0, f32::NAN], "x").is_err());
    }
}
