//! Rigid Bodies
//!
//! A body owns its fixtures (by handle) and carries the kinematic state the
//! solver works on. Forces, impulses and velocities are applied directly on
//! `&mut Body`; operations that touch the broad phase or other entities
//! (transform, type, enabled flag, mass reset) go through [`crate::World`].
//!
//! Static and kinematic bodies have zero inverse mass and zero inverse
//! inertia, so solver impulses never move them.

use crate::arena::{ContactId, FixtureId, JointId};
use crate::error::{PhysicsError, PhysicsResult};
use crate::math::{is_valid, Rot, Sweep, Transform, Vec2};
use crate::shape::MassData;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a body takes part in the simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BodyType {
    /// Zero mass, zero velocity, moved only by the user
    #[default]
    Static,
    /// Zero mass, velocity set by the user, moved by the solver
    Kinematic,
    /// Positive mass, velocity determined by forces, moved by the solver
    Dynamic,
}

/// Body definition: everything needed to construct a body.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyDef {
    /// Body type
    pub body_type: BodyType,
    /// World position of the body origin
    pub position: Vec2,
    /// World angle in radians
    pub angle: f32,
    /// Linear velocity of the body origin
    pub linear_velocity: Vec2,
    /// Angular velocity (rad/s)
    pub angular_velocity: f32,
    /// Linear damping (Padé approximation, 1/s)
    pub linear_damping: f32,
    /// Angular damping (1/s)
    pub angular_damping: f32,
    /// Set false to keep this body awake forever
    pub allow_sleep: bool,
    /// Initial awake state
    pub awake: bool,
    /// Prevent rotation
    pub fixed_rotation: bool,
    /// Continuous collision against dynamic bodies too
    pub bullet: bool,
    /// Initially enabled
    pub enabled: bool,
    /// Scale applied to world gravity
    pub gravity_scale: f32,
    /// Application data
    pub user_data: u64,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            enabled: true,
            gravity_scale: 1.0,
            user_data: 0,
        }
    }
}

impl BodyDef {
    /// Definition of a body of the given type at the origin.
    #[must_use]
    pub fn new(body_type: BodyType) -> Self {
        Self {
            body_type,
            ..Self::default()
        }
    }

    /// Dynamic body at `position`.
    #[must_use]
    pub fn dynamic(position: Vec2) -> Self {
        Self::new(BodyType::Dynamic).with_position(position)
    }

    /// Static body at `position`.
    #[must_use]
    pub fn fixed(position: Vec2) -> Self {
        Self::new(BodyType::Static).with_position(position)
    }

    /// Kinematic body at `position`.
    #[must_use]
    pub fn kinematic(position: Vec2) -> Self {
        Self::new(BodyType::Kinematic).with_position(position)
    }

    /// Set the position.
    #[must_use]
    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    /// Set the angle.
    #[must_use]
    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    /// Set the initial velocities.
    #[must_use]
    pub fn with_velocity(mut self, linear: Vec2, angular: f32) -> Self {
        self.linear_velocity = linear;
        self.angular_velocity = angular;
        self
    }

    /// Set the damping coefficients.
    #[must_use]
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Set the gravity scale.
    #[must_use]
    pub fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    /// Mark as a bullet.
    #[must_use]
    pub fn with_bullet(mut self, bullet: bool) -> Self {
        self.bullet = bullet;
        self
    }

    /// Prevent rotation.
    #[must_use]
    pub fn with_fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self
    }

    /// Allow or forbid sleeping.
    #[must_use]
    pub fn with_allow_sleep(mut self, allow: bool) -> Self {
        self.allow_sleep = allow;
        self
    }

    /// Initial awake state.
    #[must_use]
    pub fn with_awake(mut self, awake: bool) -> Self {
        self.awake = awake;
        self
    }

    /// Initial enabled state.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Attach application data.
    #[must_use]
    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }

    /// Reject non-finite or negative values.
    pub fn validate(&self) -> PhysicsResult<()> {
        if !self.position.is_valid() || !is_valid(self.angle) {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "body position and angle must be finite",
            });
        }
        if !self.linear_velocity.is_valid() || !is_valid(self.angular_velocity) {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "body velocity must be finite",
            });
        }
        if !is_valid(self.linear_damping)
            || !is_valid(self.angular_damping)
            || self.linear_damping < 0.0
            || self.angular_damping < 0.0
        {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "body damping must be finite and non-negative",
            });
        }
        if !is_valid(self.gravity_scale) {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "gravity scale must be finite",
            });
        }
        Ok(())
    }
}

/// A rigid body.
#[derive(Clone, Debug)]
pub struct Body {
    pub(crate) body_type: BodyType,

    pub(crate) awake: bool,
    pub(crate) auto_sleep: bool,
    pub(crate) bullet: bool,
    pub(crate) fixed_rotation: bool,
    pub(crate) enabled: bool,
    /// Visited by the current island search
    pub(crate) island_flag: bool,
    /// Already processed by the current TOI pass
    pub(crate) toi_flag: bool,

    pub(crate) island_index: usize,

    /// Body origin transform
    pub(crate) xf: Transform,
    /// Center of mass motion for continuous collision
    pub(crate) sweep: Sweep,

    pub(crate) linear_velocity: Vec2,
    pub(crate) angular_velocity: f32,

    pub(crate) force: Vec2,
    pub(crate) torque: f32,

    pub(crate) fixtures: Vec<FixtureId>,
    pub(crate) joints: Vec<JointId>,
    pub(crate) contacts: Vec<ContactId>,

    pub(crate) mass: f32,
    pub(crate) inv_mass: f32,
    /// Rotational inertia about the center of mass
    pub(crate) inertia: f32,
    pub(crate) inv_i: f32,

    pub(crate) linear_damping: f32,
    pub(crate) angular_damping: f32,
    pub(crate) gravity_scale: f32,

    pub(crate) sleep_time: f32,

    pub(crate) user_data: u64,
}

impl Body {
    pub(crate) fn new(def: &BodyDef) -> Self {
        let xf = Transform::new(def.position, def.angle);
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: xf.p,
            c: xf.p,
            a0: def.angle,
            a: def.angle,
            alpha0: 0.0,
        };

        let (mass, inv_mass) = if def.body_type == BodyType::Dynamic {
            (1.0, 1.0)
        } else {
            (0.0, 0.0)
        };

        Self {
            body_type: def.body_type,
            awake: def.awake && def.body_type != BodyType::Static,
            auto_sleep: def.allow_sleep,
            bullet: def.bullet,
            fixed_rotation: def.fixed_rotation,
            enabled: def.enabled,
            island_flag: false,
            toi_flag: false,
            island_index: 0,
            xf,
            sweep,
            linear_velocity: def.linear_velocity,
            angular_velocity: def.angular_velocity,
            force: Vec2::ZERO,
            torque: 0.0,
            fixtures: Vec::new(),
            joints: Vec::new(),
            contacts: Vec::new(),
            mass,
            inv_mass,
            inertia: 0.0,
            inv_i: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            sleep_time: 0.0,
            user_data: def.user_data,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Body type.
    #[inline]
    #[must_use]
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Transform of the body origin.
    #[inline]
    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.xf
    }

    /// World position of the body origin.
    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.xf.p
    }

    /// World angle in radians.
    #[inline]
    #[must_use]
    pub fn angle(&self) -> f32 {
        self.sweep.a
    }

    /// World position of the center of mass.
    #[inline]
    #[must_use]
    pub fn world_center(&self) -> Vec2 {
        self.sweep.c
    }

    /// Center of mass in body coordinates.
    #[inline]
    #[must_use]
    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    /// Linear velocity of the center of mass.
    #[inline]
    #[must_use]
    pub fn linear_velocity(&self) -> Vec2 {
        self.linear_velocity
    }

    /// Angular velocity (rad/s).
    #[inline]
    #[must_use]
    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    /// Total mass (kg).
    #[inline]
    #[must_use]
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Inverse mass (0 for static and kinematic bodies).
    #[inline]
    #[must_use]
    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Rotational inertia about the body origin.
    #[inline]
    #[must_use]
    pub fn inertia(&self) -> f32 {
        self.inertia + self.mass * self.sweep.local_center.dot(self.sweep.local_center)
    }

    /// Mass data with inertia about the body origin.
    #[must_use]
    pub fn mass_data(&self) -> MassData {
        MassData {
            mass: self.mass,
            center: self.sweep.local_center,
            inertia: self.inertia(),
        }
    }

    /// Linear damping.
    #[inline]
    #[must_use]
    pub fn linear_damping(&self) -> f32 {
        self.linear_damping
    }

    /// Set linear damping.
    #[inline]
    pub fn set_linear_damping(&mut self, damping: f32) {
        self.linear_damping = damping;
    }

    /// Angular damping.
    #[inline]
    #[must_use]
    pub fn angular_damping(&self) -> f32 {
        self.angular_damping
    }

    /// Set angular damping.
    #[inline]
    pub fn set_angular_damping(&mut self, damping: f32) {
        self.angular_damping = damping;
    }

    /// Gravity scale.
    #[inline]
    #[must_use]
    pub fn gravity_scale(&self) -> f32 {
        self.gravity_scale
    }

    /// Set gravity scale.
    #[inline]
    pub fn set_gravity_scale(&mut self, scale: f32) {
        self.gravity_scale = scale;
    }

    /// Whether the body is a bullet.
    #[inline]
    #[must_use]
    pub fn is_bullet(&self) -> bool {
        self.bullet
    }

    /// Treat this body like a bullet for continuous collision.
    #[inline]
    pub fn set_bullet(&mut self, flag: bool) {
        self.bullet = flag;
    }

    /// Whether the body is awake.
    #[inline]
    #[must_use]
    pub fn is_awake(&self) -> bool {
        self.awake
    }

    /// Wake the body up or put it to sleep. Sleeping clears velocities and
    /// accumulated forces. Static bodies are unaffected.
    pub fn set_awake(&mut self, flag: bool) {
        if self.body_type == BodyType::Static {
            return;
        }
        self.sleep_time = 0.0;
        if flag {
            self.awake = true;
        } else {
            self.awake = false;
            self.linear_velocity = Vec2::ZERO;
            self.angular_velocity = 0.0;
            self.force = Vec2::ZERO;
            self.torque = 0.0;
        }
    }

    /// Whether the body may fall asleep.
    #[inline]
    #[must_use]
    pub fn is_sleeping_allowed(&self) -> bool {
        self.auto_sleep
    }

    /// Allow or forbid sleeping. Forbidding wakes the body.
    pub fn set_sleeping_allowed(&mut self, flag: bool) {
        self.auto_sleep = flag;
        if !flag {
            self.set_awake(true);
        }
    }

    /// Whether the body takes part in collision and dynamics.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether rotation is locked.
    #[inline]
    #[must_use]
    pub fn is_fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    /// Fixtures attached to this body, in creation order.
    #[inline]
    #[must_use]
    pub fn fixtures(&self) -> &[FixtureId] {
        &self.fixtures
    }

    /// Joints attached to this body.
    #[inline]
    #[must_use]
    pub fn joints(&self) -> &[JointId] {
        &self.joints
    }

    /// Contacts involving this body (touching or not).
    #[inline]
    #[must_use]
    pub fn contacts(&self) -> &[ContactId] {
        &self.contacts
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

    // ========================================================================
    // Frames
    // ========================================================================

    /// World coordinates of a point given in body coordinates.
    #[inline]
    #[must_use]
    pub fn world_point(&self, local_point: Vec2) -> Vec2 {
        self.xf.apply(local_point)
    }

    /// World coordinates of a vector given in body coordinates.
    #[inline]
    #[must_use]
    pub fn world_vector(&self, local_vector: Vec2) -> Vec2 {
        self.xf.q.apply(local_vector)
    }

    /// Body coordinates of a world point.
    #[inline]
    #[must_use]
    pub fn local_point(&self, world_point: Vec2) -> Vec2 {
        self.xf.apply_inv(world_point)
    }

    /// Body coordinates of a world vector.
    #[inline]
    #[must_use]
    pub fn local_vector(&self, world_vector: Vec2) -> Vec2 {
        self.xf.q.apply_inv(world_vector)
    }

    /// Velocity of a world point attached to this body.
    #[inline]
    #[must_use]
    pub fn linear_velocity_from_world_point(&self, world_point: Vec2) -> Vec2 {
        self.linear_velocity + Vec2::scalar_cross(self.angular_velocity, world_point - self.sweep.c)
    }

    /// Velocity of a local point attached to this body.
    #[inline]
    #[must_use]
    pub fn linear_velocity_from_local_point(&self, local_point: Vec2) -> Vec2 {
        self.linear_velocity_from_world_point(self.world_point(local_point))
    }

    // ========================================================================
    // Velocities, forces, impulses
    // ========================================================================

    /// Set the linear velocity of the center of mass. Ignored on static
    /// bodies; a non-zero velocity wakes the body.
    pub fn set_linear_velocity(&mut self, v: Vec2) {
        if self.body_type == BodyType::Static {
            return;
        }
        if v.dot(v) > 0.0 {
            self.set_awake(true);
        }
        self.linear_velocity = v;
    }

    /// Set the angular velocity. Ignored on static bodies.
    pub fn set_angular_velocity(&mut self, w: f32) {
        if self.body_type == BodyType::Static {
            return;
        }
        if w * w > 0.0 {
            self.set_awake(true);
        }
        self.angular_velocity = w;
    }

    /// Apply a force at a world point. Off-center forces also produce torque.
    /// A sleeping body ignores the force unless `wake` is set.
    pub fn apply_force(&mut self, force: Vec2, point: Vec2, wake: bool) {
        if !self.accepts_input(wake) {
            return;
        }
        self.force += force;
        self.torque += (point - self.sweep.c).cross(force);
    }

    /// Apply a force at the center of mass.
    pub fn apply_force_to_center(&mut self, force: Vec2, wake: bool) {
        if !self.accepts_input(wake) {
            return;
        }
        self.force += force;
    }

    /// Apply a torque about the center of mass.
    pub fn apply_torque(&mut self, torque: f32, wake: bool) {
        if !self.accepts_input(wake) {
            return;
        }
        self.torque += torque;
    }

    /// Apply an impulse at a world point; changes velocity immediately.
    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2, wake: bool) {
        if !self.accepts_input(wake) {
            return;
        }
        self.linear_velocity += impulse * self.inv_mass;
        self.angular_velocity += self.inv_i * (point - self.sweep.c).cross(impulse);
    }

    /// Apply an impulse at the center of mass.
    pub fn apply_linear_impulse_to_center(&mut self, impulse: Vec2, wake: bool) {
        if !self.accepts_input(wake) {
            return;
        }
        self.linear_velocity += impulse * self.inv_mass;
    }

    /// Apply an angular impulse.
    pub fn apply_angular_impulse(&mut self, impulse: f32, wake: bool) {
        if !self.accepts_input(wake) {
            return;
        }
        self.angular_velocity += self.inv_i * impulse;
    }

    fn accepts_input(&mut self, wake: bool) -> bool {
        if self.body_type != BodyType::Dynamic {
            return false;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        self.awake
    }

    // ========================================================================
    // Mass
    // ========================================================================

    /// Override the mass properties computed from fixtures. Only dynamic
    /// bodies are affected; a non-positive mass becomes 1.
    pub fn set_mass_data(&mut self, data: &MassData) {
        if self.body_type != BodyType::Dynamic {
            return;
        }

        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_i = 0.0;

        self.mass = if data.mass > 0.0 { data.mass } else { 1.0 };
        self.inv_mass = 1.0 / self.mass;

        if data.inertia > 0.0 && !self.fixed_rotation {
            self.inertia = data.inertia - self.mass * data.center.dot(data.center);
            if self.inertia > 0.0 {
                self.inv_i = 1.0 / self.inertia;
            } else {
                self.inertia = 0.0;
            }
        }

        self.move_center(data.center);
    }

    /// Recompute mass from the given per-fixture mass data.
    pub(crate) fn apply_fixture_masses(&mut self, masses: impl IntoIterator<Item = MassData>) {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_i = 0.0;

        // Static and kinematic bodies have zero mass.
        if self.body_type != BodyType::Dynamic {
            self.sweep.c0 = self.xf.p;
            self.sweep.c = self.xf.p;
            self.sweep.local_center = Vec2::ZERO;
            self.sweep.a0 = self.sweep.a;
            return;
        }

        // Accumulate mass over all fixtures.
        let mut local_center = Vec2::ZERO;
        for md in masses {
            if md.mass == 0.0 {
                continue;
            }
            self.mass += md.mass;
            local_center += md.center * md.mass;
            self.inertia += md.inertia;
        }

        // Compute center of mass.
        if self.mass > 0.0 {
            self.inv_mass = 1.0 / self.mass;
            local_center = local_center * self.inv_mass;
        } else {
            // Force all dynamic bodies to have a positive mass.
            self.mass = 1.0;
            self.inv_mass = 1.0;
        }

        if self.inertia > 0.0 && !self.fixed_rotation {
            // Center the inertia about the center of mass.
            self.inertia -= self.mass * local_center.dot(local_center);
            if self.inertia > 0.0 {
                self.inv_i = 1.0 / self.inertia;
            } else {
                self.inertia = 0.0;
            }
        } else {
            self.inertia = 0.0;
            self.inv_i = 0.0;
        }

        self.move_center(local_center);
    }

    /// Move the center of mass, keeping the velocity of the new center
    /// consistent with the rigid motion.
    fn move_center(&mut self, local_center: Vec2) {
        let old_center = self.sweep.c;
        self.sweep.local_center = local_center;
        self.sweep.c = self.xf.apply(local_center);
        self.sweep.c0 = self.sweep.c;

        self.linear_velocity += Vec2::scalar_cross(self.angular_velocity, self.sweep.c - old_center);
    }

    // ========================================================================
    // Solver plumbing
    // ========================================================================

    /// Rebuild the origin transform from the sweep end state.
    #[inline]
    pub(crate) fn synchronize_transform(&mut self) {
        self.xf.q = Rot::from_angle(self.sweep.a);
        self.xf.p = self.sweep.c - self.xf.q.apply(self.sweep.local_center);
    }

    /// Rewind to the sweep state at `alpha` and collapse the sweep there.
    pub(crate) fn advance(&mut self, alpha: f32) {
        self.sweep.advance(alpha);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.xf.q = Rot::from_angle(self.sweep.a);
        self.xf.p = self.sweep.c - self.xf.q.apply(self.sweep.local_center);
    }

    /// Place the body origin, resetting the sweep.
    pub(crate) fn place(&mut self, position: Vec2, angle: f32) {
        self.xf = Transform::new(position, angle);
        self.sweep.c = self.xf.apply(self.sweep.local_center);
        self.sweep.a = angle;
        self.sweep.c0 = self.sweep.c;
        self.sweep.a0 = angle;
    }

    /// Transform at the start of the current sweep.
    #[inline]
    pub(crate) fn sweep_start_transform(&self) -> Transform {
        let q = Rot::from_angle(self.sweep.a0);
        Transform {
            p: self.sweep.c0 - q.apply(self.sweep.local_center),
            q,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dynamic_body() -> Body {
        Body::new(&BodyDef::dynamic(Vec2::new(1.0, 2.0)))
    }

    #[test]
    fn test_new_static_is_asleep_and_massless() {
        let body = Body::new(&BodyDef::fixed(Vec2::ZERO));
        assert!(!body.is_awake());
        assert_eq!(body.inv_mass(), 0.0);
        assert_eq!(body.mass(), 0.0);
    }

    #[test]
    fn test_apply_impulse_changes_velocity() {
        let mut body = dynamic_body();
        body.apply_linear_impulse_to_center(Vec2::new(2.0, 0.0), true);
        assert_relative_eq!(body.linear_velocity().x, 2.0);

        // Off-center impulse spins a body with inertia.
        body.apply_fixture_masses([MassData {
            mass: 2.0,
            center: Vec2::ZERO,
            inertia: 1.0,
        }]);
        let w0 = body.angular_velocity();
        body.apply_linear_impulse(Vec2::new(0.0, 1.0), body.world_center() + Vec2::new(1.0, 0.0), true);
        assert!(body.angular_velocity() > w0);
    }

    #[test]
    fn test_sleeping_body_ignores_force_without_wake() {
        let mut body = dynamic_body();
        body.set_awake(false);
        body.apply_force_to_center(Vec2::new(10.0, 0.0), false);
        assert_eq!(body.force, Vec2::ZERO);
        assert!(!body.is_awake());

        body.apply_force_to_center(Vec2::new(10.0, 0.0), true);
        assert!(body.is_awake());
        assert_eq!(body.force, Vec2::new(10.0, 0.0));
    }

    #[test]
    fn test_sleep_clears_motion() {
        let mut body = dynamic_body();
        body.set_linear_velocity(Vec2::new(3.0, 0.0));
        body.set_angular_velocity(1.0);
        body.set_awake(false);
        assert_eq!(body.linear_velocity(), Vec2::ZERO);
        assert_eq!(body.angular_velocity(), 0.0);
    }

    #[test]
    fn test_mass_from_offset_fixture_moves_center() {
        let mut body = dynamic_body();
        body.apply_fixture_masses([MassData {
            mass: 4.0,
            center: Vec2::new(1.0, 0.0),
            inertia: 4.0 + 4.0 * 1.0,
        }]);
        assert_relative_eq!(body.mass(), 4.0);
        assert_relative_eq!(body.local_center().x, 1.0);
        assert_relative_eq!(body.world_center().x, 2.0);
        // Inertia about the center of mass excludes the parallel axis term.
        assert_relative_eq!(body.inertia, 4.0, epsilon = 1e-5);
        assert_relative_eq!(body.inertia(), 8.0, epsilon = 1e-5);
    }

    #[test]
    fn test_dynamic_without_mass_gets_unit_mass() {
        let mut body = dynamic_body();
        body.apply_fixture_masses(core::iter::empty());
        assert_eq!(body.mass(), 1.0);
        assert_eq!(body.inv_i, 0.0);
    }

    #[test]
    fn test_fixed_rotation_zero_inverse_inertia() {
        let mut body = Body::new(&BodyDef::dynamic(Vec2::ZERO).with_fixed_rotation(true));
        body.apply_fixture_masses([MassData {
            mass: 1.0,
            center: Vec2::ZERO,
            inertia: 0.5,
        }]);
        assert_eq!(body.inv_i, 0.0);
    }

    #[test]
    fn test_advance_collapses_sweep() {
        let mut body = dynamic_body();
        body.sweep.c0 = Vec2::new(0.0, 0.0);
        body.sweep.c = Vec2::new(2.0, 0.0);
        body.advance(0.5);
        assert_relative_eq!(body.world_center().x, 1.0);
        assert_relative_eq!(body.position().x, 1.0);
        assert_eq!(body.sweep.c0, body.sweep.c);
    }

    #[test]
    fn test_body_def_rejects_nan() {
        let def = BodyDef::dynamic(Vec2::new(f32::NAN, 0.0));
        assert!(def.validate().is_err());
        assert!(BodyDef::default().validate().is_ok());
    }
}
