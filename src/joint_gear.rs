//! Gear Joint
//!
//! Couples two revolute or prismatic joints so that
//! `coordinate1 + ratio * coordinate2 == constant`. Each source joint should
//! attach a dynamic body to a static one. The gear copies the geometry it
//! needs at creation and keeps the source joints' handles so that they
//! cannot be destroyed while the gear exists.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::arena::{Arena, BodyId, JointId};
use crate::body::Body;
use crate::error::{PhysicsError, PhysicsResult};
use crate::joint::{check_finite, Joint, JointKind, JointType};
use crate::math::{Rot, Transform, Vec2};
use crate::step::SolverData;
use crate::world::World;

/// Gear joint definition.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GearJointDef {
    /// Body B of `joint1`; filled in at creation
    pub body_a: BodyId,
    /// Body B of `joint2`; filled in at creation
    pub body_b: BodyId,
    /// Allow the bodies to collide
    pub collide_connected: bool,
    /// Application data
    pub user_data: u64,
    /// First revolute or prismatic joint
    pub joint1: JointId,
    /// Second revolute or prismatic joint
    pub joint2: JointId,
    /// Gear ratio
    pub ratio: f32,
}

impl GearJointDef {
    /// Definition coupling two joints; the geared bodies are each joint's
    /// body B.
    pub fn initialize(world: &World, joint1: JointId, joint2: JointId, ratio: f32) -> PhysicsResult<Self> {
        let j1 = world
            .joint(joint1)
            .ok_or(PhysicsError::InvalidHandle { kind: "joint" })?;
        let j2 = world
            .joint(joint2)
            .ok_or(PhysicsError::InvalidHandle { kind: "joint" })?;
        Ok(Self {
            body_a: j1.body_b(),
            body_b: j2.body_b(),
            collide_connected: false,
            user_data: 0,
            joint1,
            joint2,
            ratio,
        })
    }
}

/// Geometry copied from one source joint.
#[derive(Clone, Copy, Debug)]
struct GearSide {
    joint_type: JointType,
    /// Body A of the source joint (usually ground).
    ground: BodyId,
    /// Body B of the source joint (geared body).
    body: BodyId,
    local_anchor_ground: Vec2,
    local_anchor_body: Vec2,
    local_axis_ground: Vec2,
    reference_angle: f32,
}

impl GearSide {
    fn from_joint(joint: &Joint) -> PhysicsResult<Self> {
        let (joint_type, anchor_ground, anchor_body, axis, reference_angle) = match &joint.kind {
            JointKind::Revolute(r) => (
                JointType::Revolute,
                r.local_anchor_a,
                r.local_anchor_b,
                Vec2::ZERO,
                r.reference_angle,
            ),
            JointKind::Prismatic(p) => (
                JointType::Prismatic,
                p.local_anchor_a,
                p.local_anchor_b,
                p.local_x_axis_a,
                p.reference_angle,
            ),
            _ => {
                return Err(PhysicsError::InvalidJoint {
                    reason: "gear joints couple revolute or prismatic joints only",
                })
            }
        };
        Ok(Self {
            joint_type,
            ground: joint.body_a,
            body: joint.body_b,
            local_anchor_ground: anchor_ground,
            local_anchor_body: anchor_body,
            local_axis_ground: axis,
            reference_angle,
        })
    }

    /// Joint coordinate given the body and ground transforms.
    fn coordinate(&self, xf_body: &Transform, angle_body: f32, xf_ground: &Transform, angle_ground: f32) -> f32 {
        match self.joint_type {
            JointType::Revolute => angle_body - angle_ground - self.reference_angle,
            _ => {
                let p_ground = self.local_anchor_ground;
                let p_body = xf_ground
                    .q
                    .apply_inv(xf_body.q.apply(self.local_anchor_body) + (xf_body.p - xf_ground.p));
                (p_body - p_ground).dot(self.local_axis_ground)
            }
        }
    }
}

/// Island data of one of the four involved bodies.
#[derive(Clone, Copy, Debug, Default)]
struct GearBody {
    index: usize,
    local_center: Vec2,
    inv_mass: f32,
    inv_i: f32,
}

impl GearBody {
    fn new(body: &Body) -> Self {
        Self {
            index: body.island_index,
            local_center: body.sweep.local_center,
            inv_mass: body.inv_mass,
            inv_i: body.inv_i,
        }
    }
}

/// Jacobian of one gear side.
#[derive(Clone, Copy, Debug, Default)]
struct GearJacobian {
    jv: Vec2,
    jw_body: f32,
    jw_ground: f32,
    mass: f32,
}

/// Gear joint state.
#[derive(Clone, Debug)]
pub struct GearJoint {
    pub(crate) joint1: JointId,
    pub(crate) joint2: JointId,
    pub(crate) body_a: BodyId,
    pub(crate) body_b: BodyId,
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    side1: GearSide,
    side2: GearSide,
    ratio: f32,
    constant: f32,

    impulse: f32,

    // A, B are the geared bodies; C, D the grounds of joint1 and joint2.
    a: GearBody,
    b: GearBody,
    c: GearBody,
    d: GearBody,
    j1: GearJacobian,
    j2: GearJacobian,
    mass: f32,
}

impl GearJoint {
    pub(crate) fn new(
        def: &GearJointDef,
        bodies: &Arena<BodyId, Body>,
        joints: &Arena<JointId, Joint>,
    ) -> PhysicsResult<Self> {
        check_finite(&[def.ratio], "gear ratio must be finite")?;
        let source = |id: JointId| {
            joints
                .get(id)
                .ok_or(PhysicsError::InvalidHandle { kind: "joint" })
        };
        let side1 = GearSide::from_joint(source(def.joint1)?)?;
        let side2 = GearSide::from_joint(source(def.joint2)?)?;

        let body = |id: BodyId| bodies.get(id).ok_or(PhysicsError::InvalidHandle { kind: "body" });
        let (ba, bc) = (body(side1.body)?, body(side1.ground)?);
        let (bb, bd) = (body(side2.body)?, body(side2.ground)?);

        let coordinate1 = side1.coordinate(&ba.xf, ba.sweep.a, &bc.xf, bc.sweep.a);
        let coordinate2 = side2.coordinate(&bb.xf, bb.sweep.a, &bd.xf, bd.sweep.a);

        Ok(Self {
            joint1: def.joint1,
            joint2: def.joint2,
            body_a: side1.body,
            body_b: side2.body,
            local_anchor_a: side1.local_anchor_body,
            local_anchor_b: side2.local_anchor_body,
            side1,
            side2,
            ratio: def.ratio,
            constant: coordinate1 + def.ratio * coordinate2,
            impulse: 0.0,
            a: GearBody::default(),
            b: GearBody::default(),
            c: GearBody::default(),
            d: GearBody::default(),
            j1: GearJacobian::default(),
            j2: GearJacobian::default(),
            mass: 0.0,
        })
    }

    /// First source joint.
    #[must_use]
    pub fn joint1(&self) -> JointId {
        self.joint1
    }

    /// Second source joint.
    #[must_use]
    pub fn joint2(&self) -> JointId {
        self.joint2
    }

    /// Gear ratio.
    #[must_use]
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Set the gear ratio.
    pub fn set_ratio(&mut self, ratio: f32) {
        if ratio.is_finite() {
            self.ratio = ratio;
        }
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.j1.jv * (inv_dt * self.impulse)
    }

    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse * self.j1.jw_body
    }

    /// Jacobian of one side at the given poses. `scale` is 1 for joint1
    /// and the ratio for joint2.
    #[allow(clippy::too_many_arguments)]
    fn jacobian(
        side: &GearSide,
        body: &GearBody,
        ground: &GearBody,
        c_body: Vec2,
        q_body: Rot,
        c_ground: Vec2,
        q_ground: Rot,
        scale: f32,
    ) -> (GearJacobian, f32) {
        match side.joint_type {
            JointType::Revolute => {
                let mass = scale * scale * (body.inv_i + ground.inv_i);
                (
                    GearJacobian {
                        jv: Vec2::ZERO,
                        jw_body: scale,
                        jw_ground: scale,
                        mass,
                    },
                    0.0,
                )
            }
            _ => {
                let u = q_ground.apply(side.local_axis_ground);
                let r_ground = q_ground.apply(side.local_anchor_ground - ground.local_center);
                let r_body = q_body.apply(side.local_anchor_body - body.local_center);
                let jw_ground = scale * r_ground.cross(u);
                let jw_body = scale * r_body.cross(u);
                let mass = scale * scale * (ground.inv_mass + body.inv_mass)
                    + ground.inv_i * jw_ground * jw_ground
                    + body.inv_i * jw_body * jw_body;

                let p_ground = side.local_anchor_ground - ground.local_center;
                let p_body = q_ground.apply_inv(r_body + (c_body - c_ground));
                let coordinate = (p_body - p_ground).dot(side.local_axis_ground);
                (
                    GearJacobian {
                        jv: u * scale,
                        jw_body,
                        jw_ground,
                        mass,
                    },
                    coordinate,
                )
            }
        }
    }

    pub(crate) fn init_velocity_constraints(&mut self, bodies: &Arena<BodyId, Body>, data: &mut SolverData) {
        self.a = GearBody::new(&bodies[self.side1.body]);
        self.b = GearBody::new(&bodies[self.side2.body]);
        self.c = GearBody::new(&bodies[self.side1.ground]);
        self.d = GearBody::new(&bodies[self.side2.ground]);

        let p = |g: &GearBody| data.positions[g.index];
        let (pa, pb, pc, pd) = (p(&self.a), p(&self.b), p(&self.c), p(&self.d));
        let (qa, qb, qc, qd) = (
            Rot::from_angle(pa.a),
            Rot::from_angle(pb.a),
            Rot::from_angle(pc.a),
            Rot::from_angle(pd.a),
        );

        (self.j1, _) = Self::jacobian(&self.side1, &self.a, &self.c, pa.c, qa, pc.c, qc, 1.0);
        (self.j2, _) = Self::jacobian(&self.side2, &self.b, &self.d, pb.c, qb, pd.c, qd, self.ratio);

        let mass = self.j1.mass + self.j2.mass;
        self.mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };

        if data.step.warm_starting {
            self.apply_impulse(data);
        } else {
            self.impulse = 0.0;
        }
    }

    fn apply_impulse_amount(&self, data: &mut SolverData, impulse: f32) {
        let (a, b, c, d) = (self.a, self.b, self.c, self.d);
        let (j1, j2) = (self.j1, self.j2);

        let mut va = data.velocities[a.index];
        va.v += j1.jv * (a.inv_mass * impulse);
        va.w += a.inv_i * impulse * j1.jw_body;
        data.velocities[a.index] = va;

        let mut vb = data.velocities[b.index];
        vb.v += j2.jv * (b.inv_mass * impulse);
        vb.w += b.inv_i * impulse * j2.jw_body;
        data.velocities[b.index] = vb;

        let mut vc = data.velocities[c.index];
        vc.v -= j1.jv * (c.inv_mass * impulse);
        vc.w -= c.inv_i * impulse * j1.jw_ground;
        data.velocities[c.index] = vc;

        let mut vd = data.velocities[d.index];
        vd.v -= j2.jv * (d.inv_mass * impulse);
        vd.w -= d.inv_i * impulse * j2.jw_ground;
        data.velocities[d.index] = vd;
    }

    fn apply_impulse(&self, data: &mut SolverData) {
        self.apply_impulse_amount(data, self.impulse);
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let va = data.velocities[self.a.index];
        let vb = data.velocities[self.b.index];
        let vc = data.velocities[self.c.index];
        let vd = data.velocities[self.d.index];

        let mut cdot = self.j1.jv.dot(va.v - vc.v) + self.j2.jv.dot(vb.v - vd.v);
        cdot += (self.j1.jw_body * va.w - self.j1.jw_ground * vc.w)
            + (self.j2.jw_body * vb.w - self.j2.jw_ground * vd.w);

        let impulse = -self.mass * cdot;
        self.impulse += impulse;
        self.apply_impulse_amount(data, impulse);
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let (a, b, c, d) = (self.a, self.b, self.c, self.d);
        let pa = data.positions[a.index];
        let pb = data.positions[b.index];
        let pc = data.positions[c.index];
        let pd = data.positions[d.index];
        let (qa, qb, qc, qd) = (
            Rot::from_angle(pa.a),
            Rot::from_angle(pb.a),
            Rot::from_angle(pc.a),
            Rot::from_angle(pd.a),
        );

        let (j1, mut coordinate1) = Self::jacobian(&self.side1, &a, &c, pa.c, qa, pc.c, qc, 1.0);
        let (j2, mut coordinate2) = Self::jacobian(&self.side2, &b, &d, pb.c, qb, pd.c, qd, self.ratio);
        if self.side1.joint_type == JointType::Revolute {
            coordinate1 = pa.a - pc.a - self.side1.reference_angle;
        }
        if self.side2.joint_type == JointType::Revolute {
            coordinate2 = pb.a - pd.a - self.side2.reference_angle;
        }

        let mass = j1.mass + j2.mass;
        let c_err = (coordinate1 + self.ratio * coordinate2) - self.constant;
        let impulse = if mass > 0.0 { -c_err / mass } else { 0.0 };

        let mut nudge = |g: &GearBody, jv: Vec2, jw: f32, sign: f32| {
            let mut pos = data.positions[g.index];
            pos.c += jv * (sign * g.inv_mass * impulse);
            pos.a += sign * g.inv_i * impulse * jw;
            data.positions[g.index] = pos;
        };
        nudge(&a, j1.jv, j1.jw_body, 1.0);
        nudge(&b, j2.jv, j2.jw_body, 1.0);
        nudge(&c, j1.jv, j1.jw_ground, -1.0);
        nudge(&d, j2.jv, j2.jw_ground, -1.0);

        // Drift is bounded by the source joints' own position solve.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::body::BodyDef;
    use crate::joint::JointDef;
    use crate::joint_prismatic::PrismaticJointDef;
    use crate::joint_revolute::RevoluteJointDef;

    #[test]
    fn test_gear_requires_revolute_or_prismatic() {
        let mut bodies: Arena<BodyId, Body> = Arena::new();
        let ground = bodies.insert(Body::new(&BodyDef::fixed(Vec2::ZERO)));
        let wheel = bodies.insert(Body::new(&BodyDef::dynamic(Vec2::ZERO)));
        let slider = bodies.insert(Body::new(&BodyDef::dynamic(Vec2::new(2.0, 0.0))));

        let mut joints: Arena<JointId, Joint> = Arena::new();
        let revolute = joints.insert(
            Joint::new(&JointDef::Revolute(RevoluteJointDef::new(ground, wheel)), &bodies, &joints).unwrap(),
        );
        let prismatic = joints.insert(
            Joint::new(&JointDef::Prismatic(PrismaticJointDef::new(ground, slider)), &bodies, &joints).unwrap(),
        );

        let def = GearJointDef {
            body_a: wheel,
            body_b: slider,
            collide_connected: false,
            user_data: 0,
            joint1: revolute,
            joint2: prismatic,
            ratio: 2.0,
        };
        let gear = GearJoint::new(&def, &bodies, &joints).unwrap();
        assert_eq!(gear.body_a, wheel);
        assert_eq!(gear.body_b, slider);
        // Slider sits 2 m along the axis; wheel angle is zero.
        assert!((gear.constant - 4.0).abs() < 1e-6);

        let gear_id = joints.insert(Joint::new(&JointDef::Gear(def), &bodies, &joints).unwrap());
        let bad = GearJointDef {
            joint1: gear_id,
            ..def
        };
        assert!(GearJoint::new(&bad, &bodies, &joints).is_err());
    }
}
