//! Physics World
//!
//! The world owns every body, fixture, joint and contact, and advances them
//! with [`World::step`]:
//!
//! ```text
//!   new fixtures ─► broad-phase pairs ─► narrow phase (contact update)
//!        ─► island flood fill + solve ─► fixture sync ─► new pairs
//!        ─► time-of-impact sub-steps ─► clear forces
//! ```
//!
//! # Determinism
//!
//! Every arena iterates in slot order, broad-phase pairs are sorted before
//! contacts are created, and listener calls happen on the stepping thread in
//! a fixed order. The same sequence of calls on the same platform yields
//! bit-identical results, with or without the `parallel` feature.
//!
//! # Mutation
//!
//! Listeners only receive shared references (pre-solve receives the one
//! contact being solved), so the world cannot be mutated mid-step.
//! Operations that touch the broad phase or several entities go through
//! `World` methods; velocities, forces and impulses are set directly on
//! [`World::body_mut`].

use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::arena::{Arena, BodyId, ContactId, FixtureId, JointId};
use crate::body::{Body, BodyDef, BodyType};
use crate::contact::Contact;
use crate::contact_manager::ContactManager;
use crate::distance::DistanceProxy;
use crate::error::{PhysicsError, PhysicsResult};
use crate::event::{ContactEvent, ContactListener, DestructionListener, Listeners};
use crate::filter::{ContactFilter, Filter};
use crate::fixture::{Fixture, FixtureDef};
use crate::island::{Island, IslandWorld};
use crate::joint::{Joint, JointDef, JointKind};
use crate::math::Vec2;
use crate::settings::{WorldConfig, MAX_SUB_STEPS, MAX_TOI_CONTACTS};
use crate::shape::MassData;
use crate::step::{elapsed_ms, Profile, TimeStep};
use crate::time_of_impact::{time_of_impact, ToiInput, ToiState};

/// Position iterations used to resolve a time-of-impact sub-step.
const TOI_POSITION_ITERATIONS: u32 = 20;

/// The simulation world.
pub struct World {
    config: WorldConfig,
    bodies: Arena<BodyId, Body>,
    fixtures: Arena<FixtureId, Fixture>,
    joints: Arena<JointId, Joint>,
    contact_manager: ContactManager,
    listeners: Listeners,
    island: Island,

    /// A fixture was added; pair before the next narrow phase.
    new_contacts: bool,
    /// All TOI events of the last step were handled.
    step_complete: bool,
    auto_clear_forces: bool,
    /// Inverse of the previous non-zero time step.
    inv_dt0: f32,
    profile: Profile,
}

impl World {
    /// World with default settings and the given gravity.
    #[must_use]
    pub fn new(gravity: Vec2) -> Self {
        Self::from_valid_config(WorldConfig::default().with_gravity(gravity))
    }

    /// World with explicit settings.
    pub fn with_config(config: WorldConfig) -> PhysicsResult<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: WorldConfig) -> Self {
        Self {
            config,
            bodies: Arena::new(),
            fixtures: Arena::new(),
            joints: Arena::new(),
            contact_manager: ContactManager::default(),
            listeners: Listeners::default(),
            island: Island::default(),
            new_contacts: false,
            step_complete: true,
            auto_clear_forces: true,
            inv_dt0: 0.0,
            profile: Profile::default(),
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Current settings.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Gravity.
    #[inline]
    #[must_use]
    pub fn gravity(&self) -> Vec2 {
        self.config.gravity
    }

    /// Change gravity. Sleeping bodies are not woken.
    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.config.gravity = gravity;
    }

    /// Enable or disable sleeping. Disabling wakes every body.
    pub fn set_allow_sleeping(&mut self, flag: bool) {
        if flag == self.config.allow_sleep {
            return;
        }
        self.config.allow_sleep = flag;
        if !flag {
            for (_, body) in self.bodies.iter_mut() {
                body.set_awake(true);
            }
        }
    }

    /// Enable or disable warm starting.
    pub fn set_warm_starting(&mut self, flag: bool) {
        self.config.warm_starting = flag;
    }

    /// Enable or disable continuous collision.
    pub fn set_continuous_physics(&mut self, flag: bool) {
        self.config.continuous_physics = flag;
    }

    /// Handle at most one TOI event per step.
    pub fn set_sub_stepping(&mut self, flag: bool) {
        self.config.sub_stepping = flag;
    }

    /// Clear forces and torques after every step (default on).
    pub fn set_auto_clear_forces(&mut self, flag: bool) {
        self.auto_clear_forces = flag;
    }

    /// Whether forces are cleared after every step.
    #[inline]
    #[must_use]
    pub fn auto_clear_forces(&self) -> bool {
        self.auto_clear_forces
    }

    /// Install a contact listener.
    pub fn set_contact_listener(&mut self, listener: Box<dyn ContactListener>) {
        self.listeners.contact = Some(listener);
    }

    /// Install a contact filter replacing the default category/mask/group
    /// policy.
    pub fn set_contact_filter(&mut self, filter: Box<dyn ContactFilter>) {
        self.listeners.filter = Some(filter);
    }

    /// Install a destruction listener.
    pub fn set_destruction_listener(&mut self, listener: Box<dyn DestructionListener>) {
        self.listeners.destruction = Some(listener);
    }

    // ========================================================================
    // Bodies
    // ========================================================================

    /// Create a body. It has unit mass until fixtures with density are
    /// attached.
    pub fn create_body(&mut self, def: &BodyDef) -> PhysicsResult<BodyId> {
        if let Err(e) = def.validate() {
            warn!(error = %e, "body rejected");
            return Err(e);
        }
        let id = self.bodies.insert(Body::new(def));
        debug!(body = ?id, body_type = ?def.body_type, "body created");
        Ok(id)
    }

    /// Destroy a body with its fixtures and contacts. Rejected while joints
    /// are still attached; see [`World::destroy_body_and_joints`].
    pub fn destroy_body(&mut self, id: BodyId) -> PhysicsResult<()> {
        let body = self.body_ref(id)?;
        if !body.joints.is_empty() {
            let count = body.joints.len();
            warn!(body = ?id, count, "body still has joints");
            return Err(PhysicsError::BodyHasJoints { count });
        }

        self.destroy_body_contacts(id);

        let fixtures = std::mem::take(&mut self.bodies[id].fixtures);
        for fixture_id in fixtures {
            if let Some(mut fixture) = self.fixtures.remove(fixture_id) {
                self.listeners.say_goodbye_fixture(fixture_id, &fixture);
                fixture.destroy_proxies(&mut self.contact_manager.broad_phase);
            }
        }

        self.bodies.remove(id);
        debug!(body = ?id, "body destroyed");
        Ok(())
    }

    /// Destroy a body after destroying every joint attached to it, and any
    /// gear joint built on those joints. The destruction listener hears
    /// about each implicitly destroyed joint and fixture.
    pub fn destroy_body_and_joints(&mut self, id: BodyId) -> PhysicsResult<()> {
        let attached = self.body_ref(id)?.joints.clone();

        // Gears first: they would otherwise reference destroyed joints.
        let (gears, plain): (Vec<JointId>, Vec<JointId>) = self
            .joints
            .iter()
            .filter(|(jid, joint)| {
                attached.contains(jid)
                    || joint
                        .gear_sources()
                        .is_some_and(|(j1, j2)| attached.contains(&j1) || attached.contains(&j2))
            })
            .map(|(jid, _)| jid)
            .partition(|&jid| self.joints[jid].gear_sources().is_some());

        for jid in gears.into_iter().chain(plain) {
            if let Some(joint) = self.joints.get(jid) {
                self.listeners.say_goodbye_joint(jid, joint);
            }
            self.destroy_joint(jid)?;
        }

        self.destroy_body(id)
    }

    /// Shared access to a body.
    #[inline]
    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(id)
    }

    /// Exclusive access to a body, for velocities, forces and impulses.
    #[inline]
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(id)
    }

    /// Two distinct live bodies at once.
    pub fn body_pair(&self, a: BodyId, b: BodyId) -> PhysicsResult<(&Body, &Body)> {
        Ok((self.body_ref(a)?, self.body_ref(b)?))
    }

    /// Live bodies in creation-slot order.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &Body)> {
        self.bodies.iter()
    }

    /// Number of live bodies.
    #[inline]
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn body_ref(&self, id: BodyId) -> PhysicsResult<&Body> {
        self.bodies
            .get(id)
            .ok_or(PhysicsError::InvalidHandle { kind: "body" })
    }

    fn body_entry(&mut self, id: BodyId) -> PhysicsResult<&mut Body> {
        self.bodies
            .get_mut(id)
            .ok_or(PhysicsError::InvalidHandle { kind: "body" })
    }

    // ========================================================================
    // Body mutation
    // ========================================================================

    /// Teleport a body. Contacts are re-evaluated on the next step.
    pub fn set_transform(&mut self, id: BodyId, position: Vec2, angle: f32) -> PhysicsResult<()> {
        if !position.is_valid() || !angle.is_finite() {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "transform must be finite",
            });
        }
        let body = self.body_entry(id)?;
        body.place(position, angle);
        let xf = body.xf;
        for &fixture in &self.bodies[id].fixtures {
            self.fixtures[fixture].synchronize(&mut self.contact_manager.broad_phase, &xf, &xf);
        }
        self.new_contacts = true;
        Ok(())
    }

    /// Change the body type. Mass is recomputed, attached contacts are
    /// destroyed and the proxies re-paired.
    pub fn set_body_type(&mut self, id: BodyId, body_type: BodyType) -> PhysicsResult<()> {
        let body = self.body_entry(id)?;
        if body.body_type == body_type {
            return Ok(());
        }
        body.body_type = body_type;
        self.reset_mass_data(id)?;

        let body = &mut self.bodies[id];
        if body_type == BodyType::Static {
            body.linear_velocity = Vec2::ZERO;
            body.angular_velocity = 0.0;
            body.sweep.a0 = body.sweep.a;
            body.sweep.c0 = body.sweep.c;
            body.awake = false;
            self.synchronize_fixtures(id);
        }

        let body = &mut self.bodies[id];
        body.set_awake(true);
        body.force = Vec2::ZERO;
        body.torque = 0.0;

        self.destroy_body_contacts(id);

        // Touch the proxies so new contacts are created where appropriate.
        for &fixture in &self.bodies[id].fixtures {
            self.fixtures[fixture].touch_proxies(&mut self.contact_manager.broad_phase);
        }
        debug!(body = ?id, ?body_type, "body type changed");
        Ok(())
    }

    /// Add or remove a body from the simulation. A disabled body keeps its
    /// fixtures and joints but has no broad-phase proxies or contacts.
    pub fn set_enabled(&mut self, id: BodyId, flag: bool) -> PhysicsResult<()> {
        let body = self.body_entry(id)?;
        if body.enabled == flag {
            return Ok(());
        }
        body.enabled = flag;
        let xf = body.xf;
        let fixtures = body.fixtures.clone();

        if flag {
            for fixture in fixtures {
                self.fixtures[fixture].create_proxies(&mut self.contact_manager.broad_phase, &xf, fixture);
            }
            self.new_contacts = true;
        } else {
            for fixture in fixtures {
                self.fixtures[fixture].destroy_proxies(&mut self.contact_manager.broad_phase);
            }
            self.destroy_body_contacts(id);
        }
        debug!(body = ?id, enabled = flag, "body enabled state changed");
        Ok(())
    }

    /// Wake a body or put it to sleep.
    pub fn set_awake(&mut self, id: BodyId, flag: bool) -> PhysicsResult<()> {
        self.body_entry(id)?.set_awake(flag);
        Ok(())
    }

    /// Override the mass properties of a dynamic body.
    pub fn set_mass_data(&mut self, id: BodyId, data: &MassData) -> PhysicsResult<()> {
        if !(data.mass.is_finite() && data.inertia.is_finite() && data.center.is_valid()) {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "mass data must be finite",
            });
        }
        self.body_entry(id)?.set_mass_data(data);
        Ok(())
    }

    /// Recompute mass, center and inertia from the body's fixtures.
    pub fn reset_mass_data(&mut self, id: BodyId) -> PhysicsResult<()> {
        let body = self.body_ref(id)?;
        let masses: Vec<MassData> = body
            .fixtures
            .iter()
            .filter(|&&f| self.fixtures[f].density != 0.0)
            .map(|&f| self.fixtures[f].mass_data())
            .collect();
        self.bodies[id].apply_fixture_masses(masses);
        Ok(())
    }

    /// Lock or unlock rotation.
    pub fn set_fixed_rotation(&mut self, id: BodyId, flag: bool) -> PhysicsResult<()> {
        let body = self.body_entry(id)?;
        if body.fixed_rotation == flag {
            return Ok(());
        }
        body.fixed_rotation = flag;
        body.angular_velocity = 0.0;
        self.reset_mass_data(id)
    }

    /// Treat the body as a bullet for continuous collision.
    pub fn set_bullet(&mut self, id: BodyId, flag: bool) -> PhysicsResult<()> {
        self.body_entry(id)?.set_bullet(flag);
        Ok(())
    }

    /// Allow or forbid sleeping for one body.
    pub fn set_sleeping_allowed(&mut self, id: BodyId, flag: bool) -> PhysicsResult<()> {
        self.body_entry(id)?.set_sleeping_allowed(flag);
        Ok(())
    }

    /// Destroy every contact touching a body.
    fn destroy_body_contacts(&mut self, id: BodyId) {
        let contacts = self.bodies.get(id).map(|b| b.contacts.clone()).unwrap_or_default();
        for contact in contacts {
            self.contact_manager
                .destroy(contact, &mut self.bodies, &mut self.listeners);
        }
    }

    /// Move the body's proxies over the sweep of the last step.
    fn synchronize_fixtures(&mut self, id: BodyId) {
        let body = &self.bodies[id];
        let xf2 = body.xf;
        let xf1 = if body.awake {
            body.sweep_start_transform()
        } else {
            xf2
        };
        for &fixture in &body.fixtures {
            self.fixtures[fixture].synchronize(&mut self.contact_manager.broad_phase, &xf1, &xf2);
        }
    }

    // ========================================================================
    // Fixtures
    // ========================================================================

    /// Attach a fixture. Mass is recomputed when the density is positive.
    pub fn create_fixture(&mut self, body_id: BodyId, def: &FixtureDef) -> PhysicsResult<FixtureId> {
        if let Err(e) = def.validate() {
            warn!(error = %e, "fixture rejected");
            return Err(e);
        }
        let body = self.body_ref(body_id)?;
        let (enabled, xf) = (body.enabled, body.xf);

        let id = self.fixtures.next_handle();
        let mut fixture = Fixture::new(body_id, def);
        if enabled {
            fixture.create_proxies(&mut self.contact_manager.broad_phase, &xf, id);
        }
        let inserted = self.fixtures.insert(fixture);
        debug_assert_eq!(inserted, id);

        self.bodies[body_id].fixtures.push(id);
        if def.density > 0.0 {
            self.reset_mass_data(body_id)?;
        }

        // Let the world know we have a new fixture. This will cause new
        // contacts to be created at the beginning of the next time step.
        self.new_contacts = true;
        debug!(fixture = ?id, body = ?body_id, shape = ?def.shape.shape_type(), "fixture created");
        Ok(id)
    }

    /// Detach and destroy a fixture together with its contacts.
    pub fn destroy_fixture(&mut self, id: FixtureId) -> PhysicsResult<()> {
        let body_id = self
            .fixtures
            .get(id)
            .ok_or(PhysicsError::InvalidHandle { kind: "fixture" })?
            .body;

        // Destroy any contacts associated with the fixture.
        let contacts = self.bodies[body_id].contacts.clone();
        for contact in contacts {
            let involved = self
                .contact_manager
                .contacts
                .get(contact)
                .is_some_and(|c| c.fixture_a == id || c.fixture_b == id);
            if involved {
                self.contact_manager
                    .destroy(contact, &mut self.bodies, &mut self.listeners);
            }
        }

        if let Some(mut fixture) = self.fixtures.remove(id) {
            fixture.destroy_proxies(&mut self.contact_manager.broad_phase);
        }
        self.bodies[body_id].fixtures.retain(|&f| f != id);
        self.reset_mass_data(body_id)?;
        debug!(fixture = ?id, "fixture destroyed");
        Ok(())
    }

    /// Shared access to a fixture.
    #[inline]
    #[must_use]
    pub fn fixture(&self, id: FixtureId) -> Option<&Fixture> {
        self.fixtures.get(id)
    }

    /// Exclusive access to a fixture's material and user data. Density
    /// changes take effect after [`World::reset_mass_data`].
    #[inline]
    pub fn fixture_mut(&mut self, id: FixtureId) -> Option<&mut Fixture> {
        self.fixtures.get_mut(id)
    }

    /// Live fixtures in slot order.
    pub fn fixtures(&self) -> impl Iterator<Item = (FixtureId, &Fixture)> {
        self.fixtures.iter()
    }

    /// Change a fixture's collision filter. Existing contacts are
    /// re-filtered on the next step.
    pub fn set_filter(&mut self, id: FixtureId, filter: Filter) -> PhysicsResult<()> {
        let fixture = self
            .fixtures
            .get_mut(id)
            .ok_or(PhysicsError::InvalidHandle { kind: "fixture" })?;
        fixture.filter = filter;
        let body_id = fixture.body;
        fixture.touch_proxies(&mut self.contact_manager.broad_phase);

        for &contact in &self.bodies[body_id].contacts {
            if let Some(c) = self.contact_manager.contacts.get_mut(contact) {
                if c.fixture_a == id || c.fixture_b == id {
                    c.flag_for_filtering();
                }
            }
        }
        Ok(())
    }

    /// Turn a fixture into a sensor or back.
    pub fn set_sensor(&mut self, id: FixtureId, flag: bool) -> PhysicsResult<()> {
        let fixture = self
            .fixtures
            .get_mut(id)
            .ok_or(PhysicsError::InvalidHandle { kind: "fixture" })?;
        if fixture.is_sensor == flag {
            return Ok(());
        }
        fixture.is_sensor = flag;
        let body_id = fixture.body;
        self.bodies[body_id].set_awake(true);

        for &contact in &self.bodies[body_id].contacts {
            if let Some(c) = self.contact_manager.contacts.get_mut(contact) {
                if c.fixture_a == id || c.fixture_b == id {
                    c.sensor = self.fixtures[c.fixture_a].is_sensor || self.fixtures[c.fixture_b].is_sensor;
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Joints
    // ========================================================================

    /// Create a joint. Unless `collide_connected` is set, contacts between
    /// the two bodies are filtered out from the next step on.
    pub fn create_joint(&mut self, def: impl Into<JointDef>) -> PhysicsResult<JointId> {
        let def = def.into();
        let joint = match Joint::new(&def, &self.bodies, &self.joints) {
            Ok(joint) => joint,
            Err(e) => {
                warn!(error = %e, joint_type = ?def.joint_type(), "joint rejected");
                return Err(e);
            }
        };
        let (body_a, body_b) = (joint.body_a(), joint.body_b());
        let collide_connected = joint.collide_connected();

        let id = self.joints.insert(joint);
        self.bodies[body_a].joints.push(id);
        self.bodies[body_b].joints.push(id);

        if !collide_connected {
            self.flag_contacts_between(body_a, body_b);
        }
        debug!(joint = ?id, joint_type = ?def.joint_type(), "joint created");
        Ok(id)
    }

    /// Destroy a joint and wake its bodies. Rejected while a gear joint
    /// still references it.
    pub fn destroy_joint(&mut self, id: JointId) -> PhysicsResult<()> {
        let joint = self
            .joints
            .get(id)
            .ok_or(PhysicsError::InvalidHandle { kind: "joint" })?;
        let in_use = self
            .joints
            .iter()
            .any(|(_, other)| other.gear_sources().is_some_and(|(j1, j2)| j1 == id || j2 == id));
        if in_use {
            warn!(joint = ?id, "joint referenced by a gear joint");
            return Err(PhysicsError::JointInUse {
                reason: "a gear joint references this joint",
            });
        }

        let (body_a, body_b) = (joint.body_a(), joint.body_b());
        let collide_connected = joint.collide_connected();
        self.joints.remove(id);

        for body_id in [body_a, body_b] {
            if let Some(body) = self.bodies.get_mut(body_id) {
                body.set_awake(true);
                body.joints.retain(|&j| j != id);
            }
        }

        if !collide_connected {
            self.flag_contacts_between(body_a, body_b);
        }
        debug!(joint = ?id, "joint destroyed");
        Ok(())
    }

    /// Shared access to a joint.
    #[inline]
    #[must_use]
    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(id)
    }

    /// Exclusive access to a joint's motor, limit and spring settings.
    /// Both bodies are woken so the change takes effect.
    pub fn joint_mut(&mut self, id: JointId) -> Option<&mut Joint> {
        let joint = self.joints.get(id)?;
        for body_id in [joint.body_a(), joint.body_b()] {
            if let Some(body) = self.bodies.get_mut(body_id) {
                body.set_awake(true);
            }
        }
        self.joints.get_mut(id)
    }

    /// Live joints in slot order.
    pub fn joints(&self) -> impl Iterator<Item = (JointId, &Joint)> {
        self.joints.iter()
    }

    /// Number of live joints.
    #[inline]
    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Move a mouse joint's target and wake the dragged body.
    pub fn set_mouse_target(&mut self, id: JointId, target: Vec2) -> PhysicsResult<()> {
        if !target.is_valid() {
            return Err(PhysicsError::InvalidJoint {
                reason: "mouse target must be finite",
            });
        }
        let joint = self
            .joints
            .get_mut(id)
            .ok_or(PhysicsError::InvalidHandle { kind: "joint" })?;
        let JointKind::Mouse(mouse) = joint.kind_mut() else {
            return Err(PhysicsError::InvalidJoint {
                reason: "not a mouse joint",
            });
        };
        mouse.set_target(target);
        let body_b = joint.body_b();
        if let Some(body) = self.bodies.get_mut(body_b) {
            body.set_awake(true);
        }
        Ok(())
    }

    fn flag_contacts_between(&mut self, body_a: BodyId, body_b: BodyId) {
        let Some(body) = self.bodies.get(body_b) else {
            return;
        };
        for &contact in &body.contacts {
            if let Some(c) = self.contact_manager.contacts.get_mut(contact) {
                if c.body_a == body_a || c.body_b == body_a {
                    // Flag the contact for filtering at the next time step
                    // (where either body is awake).
                    c.flag_for_filtering();
                }
            }
        }
    }

    // ========================================================================
    // Contacts and events
    // ========================================================================

    /// Shared access to a contact.
    #[inline]
    #[must_use]
    pub fn contact(&self, id: ContactId) -> Option<&Contact> {
        self.contact_manager.contacts.get(id)
    }

    /// Live contacts in slot order, touching or not.
    pub fn contacts(&self) -> impl Iterator<Item = (ContactId, &Contact)> {
        self.contact_manager.contacts.iter()
    }

    /// Number of live contacts.
    #[inline]
    #[must_use]
    pub fn contact_count(&self) -> usize {
        self.contact_manager.contacts.len()
    }

    /// Begin/end events recorded during the last step, plus end events
    /// from destruction calls made since.
    #[must_use]
    pub fn contact_events(&self) -> &[ContactEvent] {
        self.listeners.collector.events()
    }

    /// Take the recorded events.
    pub fn drain_contact_events(&mut self) -> Vec<ContactEvent> {
        self.listeners.collector.drain()
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Stage timings of the last step.
    #[inline]
    #[must_use]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Number of broad-phase proxies.
    #[must_use]
    pub fn proxy_count(&self) -> usize {
        self.contact_manager.broad_phase.proxy_count()
    }

    /// Height of the broad-phase tree.
    #[must_use]
    pub fn tree_height(&self) -> i32 {
        self.contact_manager.broad_phase.tree_height()
    }

    /// Largest height difference between sibling subtrees.
    #[must_use]
    pub fn tree_balance(&self) -> i32 {
        self.contact_manager.broad_phase.tree_balance()
    }

    /// Sum of node perimeters over the root perimeter.
    #[must_use]
    pub fn tree_quality(&self) -> f32 {
        self.contact_manager.broad_phase.tree_quality()
    }

    pub(crate) fn broad_phase(&self) -> &crate::broad_phase::BroadPhase<crate::fixture::FixtureProxyKey> {
        &self.contact_manager.broad_phase
    }

    // ========================================================================
    // Global operations
    // ========================================================================

    /// Zero every body's accumulated force and torque.
    pub fn clear_forces(&mut self) {
        for (_, body) in self.bodies.iter_mut() {
            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }
    }

    /// Move the world origin. Useful for large worlds; `new_origin` becomes
    /// the new zero.
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        for (_, body) in self.bodies.iter_mut() {
            body.xf.p -= new_origin;
            body.sweep.c0 -= new_origin;
            body.sweep.c -= new_origin;
        }
        for (_, joint) in self.joints.iter_mut() {
            joint.shift_origin(new_origin);
        }
        self.contact_manager.broad_phase.shift_origin(new_origin);
    }

    // ========================================================================
    // Stepping
    // ========================================================================

    /// Step with the iteration counts from the world configuration.
    pub fn step_default(&mut self, dt: f32) {
        self.step(dt, self.config.velocity_iterations, self.config.position_iterations);
    }

    /// Advance the world by `dt` seconds: collision, integration, constraint
    /// solve, continuous collision. A non-positive `dt` only updates
    /// contacts.
    pub fn step(&mut self, dt: f32, velocity_iterations: u32, position_iterations: u32) {
        let step_timer = Instant::now();
        self.profile = Profile::default();
        self.listeners.collector.clear();

        // If new fixtures were added, we need to find the new contacts.
        if self.new_contacts {
            self.find_new_contacts();
            self.new_contacts = false;
        }

        let dt = if dt.is_finite() { dt } else { 0.0 };
        let inv_dt = if dt > 0.0 { 1.0 / dt } else { 0.0 };
        let step = TimeStep {
            dt,
            inv_dt,
            dt_ratio: self.inv_dt0 * dt,
            velocity_iterations,
            position_iterations,
            warm_starting: self.config.warm_starting,
        };

        // Update contacts. This is where some contacts are destroyed.
        let timer = Instant::now();
        self.contact_manager.collide(
            &mut self.bodies,
            &self.fixtures,
            &self.joints,
            &mut self.listeners,
        );
        self.profile.collide = elapsed_ms(timer);

        // Integrate velocities, solve velocity constraints, and integrate positions.
        if self.step_complete && step.dt > 0.0 {
            let timer = Instant::now();
            self.solve(&step);
            self.profile.solve = elapsed_ms(timer);
        }

        // Handle TOI events.
        if self.config.continuous_physics && step.dt > 0.0 {
            let timer = Instant::now();
            self.solve_toi(&step);
            self.profile.solve_toi = elapsed_ms(timer);
        }

        if step.dt > 0.0 {
            self.inv_dt0 = step.inv_dt;
        }

        if self.auto_clear_forces {
            self.clear_forces();
        }

        self.profile.step = elapsed_ms(step_timer);
        trace!(
            bodies = self.bodies.len(),
            contacts = self.contact_manager.contacts.len(),
            joints = self.joints.len(),
            "step complete"
        );
    }

    fn find_new_contacts(&mut self) {
        self.contact_manager.find_new_contacts(
            &mut self.bodies,
            &self.fixtures,
            &self.joints,
            &self.listeners,
        );
    }

    /// Build islands by depth-first search and solve each one.
    fn solve(&mut self, step: &TimeStep) {
        for (_, body) in self.bodies.iter_mut() {
            body.island_flag = false;
        }
        for (_, contact) in self.contact_manager.contacts.iter_mut() {
            contact.island_flag = false;
        }
        for (_, joint) in self.joints.iter_mut() {
            joint.island_flag = false;
        }

        let mut island = std::mem::take(&mut self.island);
        let mut stack: Vec<BodyId> = Vec::with_capacity(self.bodies.len());
        let mut island_count = 0usize;

        for seed in self.bodies.handles() {
            {
                let body = &self.bodies[seed];
                if body.island_flag || !body.awake || !body.enabled {
                    continue;
                }
                // The seed can be dynamic or kinematic.
                if body.body_type == BodyType::Static {
                    continue;
                }
            }

            // Reset island and stack.
            island.clear();
            stack.clear();
            stack.push(seed);
            self.bodies[seed].island_flag = true;

            // Perform a depth first search (DFS) on the constraint graph.
            while let Some(id) = stack.pop() {
                let body = &mut self.bodies[id];
                island.add_body(id, body);

                // To keep islands as small as possible, we don't
                // propagate islands across static bodies.
                if body.body_type == BodyType::Static {
                    continue;
                }
                // Make sure the body is awake (without resetting sleep timer).
                body.awake = true;

                // Search all contacts connected to this body.
                for ci in 0..self.bodies[id].contacts.len() {
                    let contact_id = self.bodies[id].contacts[ci];
                    let contact = &mut self.contact_manager.contacts[contact_id];

                    // Has this contact already been added to an island?
                    if contact.island_flag {
                        continue;
                    }
                    // Is this contact solid and touching?
                    if !contact.enabled || !contact.is_touching() || contact.sensor {
                        continue;
                    }

                    island.add_contact(contact_id);
                    contact.island_flag = true;

                    let other = if contact.body_a == id {
                        contact.body_b
                    } else {
                        contact.body_a
                    };

                    // Was the other body already added to this island?
                    let other_body = &mut self.bodies[other];
                    if other_body.island_flag {
                        continue;
                    }
                    stack.push(other);
                    other_body.island_flag = true;
                }

                // Search all joints connect to this body.
                for ji in 0..self.bodies[id].joints.len() {
                    let joint_id = self.bodies[id].joints[ji];
                    let joint = &mut self.joints[joint_id];
                    if joint.island_flag {
                        continue;
                    }

                    let other = joint.other(id);

                    // Don't simulate joints connected to disabled bodies.
                    if !self.bodies[other].enabled {
                        continue;
                    }

                    island.add_joint(joint_id);
                    joint.island_flag = true;

                    let other_body = &mut self.bodies[other];
                    if other_body.island_flag {
                        continue;
                    }
                    stack.push(other);
                    other_body.island_flag = true;
                }
            }

            island.solve(
                step,
                self.config.gravity,
                self.config.allow_sleep,
                IslandWorld {
                    bodies: &mut self.bodies,
                    contacts: &mut self.contact_manager.contacts,
                    joints: &mut self.joints,
                    listeners: &mut self.listeners,
                },
                &mut self.profile,
            );
            island_count += 1;

            // Allow static bodies to participate in other islands.
            for &id in &island.bodies {
                let body = &mut self.bodies[id];
                if body.body_type == BodyType::Static {
                    body.island_flag = false;
                }
            }
        }
        self.island = island;
        trace!(islands = island_count, "islands solved");

        let timer = Instant::now();
        // Synchronize fixtures, check for out of range bodies.
        for id in self.bodies.handles() {
            let body = &self.bodies[id];
            // If a body was not in an island then it did not move.
            if !body.island_flag || body.body_type == BodyType::Static {
                continue;
            }
            self.synchronize_fixtures(id);
        }

        // Look for new contacts.
        self.find_new_contacts();
        self.profile.broadphase = elapsed_ms(timer);
    }

    /// Find the earliest time of impact among the candidate contacts,
    /// computing and caching it where needed.
    fn find_min_toi(&mut self) -> Option<(ContactId, f32)> {
        let mut min_contact = None;
        let mut min_alpha = 1.0f32;

        for id in self.contact_manager.contacts.handles() {
            let contact = &self.contact_manager.contacts[id];

            // Is this contact disabled?
            if !contact.enabled {
                continue;
            }
            // Prevent excessive sub-stepping.
            if contact.toi_count as usize > MAX_SUB_STEPS {
                continue;
            }

            let alpha = if contact.toi_flag {
                // This contact has a valid cached TOI.
                contact.toi
            } else {
                // Is there a sensor?
                if contact.sensor {
                    continue;
                }
                let (id_a, id_b) = (contact.body_a, contact.body_b);
                let (Some((body_a, body_b)), Some(fixture_a), Some(fixture_b)) = (
                    self.bodies.get2_mut(id_a, id_b),
                    self.fixtures.get(contact.fixture_a),
                    self.fixtures.get(contact.fixture_b),
                ) else {
                    continue;
                };

                let active_a = body_a.awake && body_a.body_type != BodyType::Static;
                let active_b = body_b.awake && body_b.body_type != BodyType::Static;
                // Is at least one body active (awake and dynamic or kinematic)?
                if !active_a && !active_b {
                    continue;
                }

                let collide_a = body_a.bullet || body_a.body_type != BodyType::Dynamic;
                let collide_b = body_b.bullet || body_b.body_type != BodyType::Dynamic;
                // Are these two non-bullet dynamic bodies?
                if !collide_a && !collide_b {
                    continue;
                }

                // Compute the TOI for this contact.
                // Put the sweeps onto the same time interval.
                let mut alpha0 = body_a.sweep.alpha0;
                if body_a.sweep.alpha0 < body_b.sweep.alpha0 {
                    alpha0 = body_b.sweep.alpha0;
                    body_a.sweep.advance(alpha0);
                } else if body_b.sweep.alpha0 < body_a.sweep.alpha0 {
                    alpha0 = body_a.sweep.alpha0;
                    body_b.sweep.advance(alpha0);
                }
                debug_assert!(alpha0 < 1.0);

                let input = ToiInput {
                    proxy_a: DistanceProxy::from_shape(&fixture_a.shape, contact.child_a),
                    proxy_b: DistanceProxy::from_shape(&fixture_b.shape, contact.child_b),
                    sweep_a: body_a.sweep,
                    sweep_b: body_b.sweep,
                    t_max: 1.0,
                };
                let output = time_of_impact(&input);

                // Beta is the fraction of the remaining portion of the sweep.
                let alpha = if output.state == ToiState::Touching {
                    (alpha0 + (1.0 - alpha0) * output.t).min(1.0)
                } else {
                    1.0
                };

                let contact = &mut self.contact_manager.contacts[id];
                contact.toi = alpha;
                contact.toi_flag = true;
                alpha
            };

            if alpha < min_alpha {
                // This is the minimum TOI found so far.
                min_contact = Some(id);
                min_alpha = alpha;
            }
        }

        min_contact.map(|id| (id, min_alpha))
    }

    /// Find TOI contacts and solve them in time order.
    fn solve_toi(&mut self, step: &TimeStep) {
        if self.step_complete {
            for (_, body) in self.bodies.iter_mut() {
                body.island_flag = false;
                body.sweep.alpha0 = 0.0;
            }
            for (_, contact) in self.contact_manager.contacts.iter_mut() {
                // Invalidate TOI.
                contact.toi_flag = false;
                contact.island_flag = false;
                contact.toi_count = 0;
                contact.toi = 1.0;
            }
        }

        let mut island = std::mem::take(&mut self.island);
        let mut events = 0usize;

        // Find TOI events and solve them.
        loop {
            let Some((min_contact, min_alpha)) = self.find_min_toi() else {
                // No more TOI events. Done!
                self.step_complete = true;
                break;
            };
            if 1.0 - 10.0 * f32::EPSILON < min_alpha {
                self.step_complete = true;
                break;
            }
            events += 1;

            // Advance the bodies to the TOI.
            let (id_a, id_b) = {
                let c = &self.contact_manager.contacts[min_contact];
                (c.body_a, c.body_b)
            };
            let backup_a = self.bodies[id_a].sweep;
            let backup_b = self.bodies[id_b].sweep;
            self.bodies[id_a].advance(min_alpha);
            self.bodies[id_b].advance(min_alpha);

            // The TOI contact likely has some new contact points.
            self.contact_manager.update_contact(
                min_contact,
                &mut self.bodies,
                &self.fixtures,
                &mut self.listeners,
            );
            let contact = &mut self.contact_manager.contacts[min_contact];
            contact.toi_flag = false;
            contact.toi_count += 1;

            // Is the contact solid?
            if !contact.enabled || !contact.is_touching() {
                // Restore the sweeps.
                contact.enabled = false;
                for (id, backup) in [(id_a, backup_a), (id_b, backup_b)] {
                    let body = &mut self.bodies[id];
                    body.sweep = backup;
                    body.synchronize_transform();
                }
                continue;
            }

            self.bodies[id_a].set_awake(true);
            self.bodies[id_b].set_awake(true);

            // Build the island.
            island.clear();
            island.add_body(id_a, &mut self.bodies[id_a]);
            island.add_body(id_b, &mut self.bodies[id_b]);
            island.add_contact(min_contact);

            self.bodies[id_a].island_flag = true;
            self.bodies[id_b].island_flag = true;
            self.contact_manager.contacts[min_contact].island_flag = true;

            // Get contacts on body A and body B.
            for body_id in [id_a, id_b] {
                if self.bodies[body_id].body_type == BodyType::Dynamic {
                    self.add_toi_neighbours(&mut island, body_id, min_alpha);
                }
            }

            let sub_step = TimeStep {
                dt: (1.0 - min_alpha) * step.dt,
                inv_dt: 1.0 / ((1.0 - min_alpha) * step.dt),
                dt_ratio: 1.0,
                position_iterations: TOI_POSITION_ITERATIONS,
                velocity_iterations: step.velocity_iterations,
                warm_starting: false,
            };
            let (toi_index_a, toi_index_b) = (self.bodies[id_a].island_index, self.bodies[id_b].island_index);
            island.solve_toi(
                &sub_step,
                toi_index_a,
                toi_index_b,
                IslandWorld {
                    bodies: &mut self.bodies,
                    contacts: &mut self.contact_manager.contacts,
                    joints: &mut self.joints,
                    listeners: &mut self.listeners,
                },
            );

            // Reset island flags and synchronize broad-phase proxies.
            for &id in &island.bodies {
                let body = &mut self.bodies[id];
                body.island_flag = false;
                if body.body_type != BodyType::Dynamic {
                    continue;
                }
                self.synchronize_fixtures(id);

                // Invalidate all contact TOIs on this displaced body.
                for &contact in &self.bodies[id].contacts {
                    if let Some(c) = self.contact_manager.contacts.get_mut(contact) {
                        c.toi_flag = false;
                        c.island_flag = false;
                    }
                }
            }

            // Commit fixture proxy movements to the broad-phase so that new
            // contacts are created. Also, some contacts can be destroyed.
            self.find_new_contacts();

            if self.config.sub_stepping {
                self.step_complete = false;
                break;
            }
        }

        self.island = island;
        trace!(toi_events = events, "continuous collision done");
    }

    /// Add the static, kinematic and bullet neighbours of a TOI body to the
    /// mini island, advancing them to the TOI.
    fn add_toi_neighbours(&mut self, island: &mut Island, body_id: BodyId, min_alpha: f32) {
        let contacts = self.bodies[body_id].contacts.clone();
        for contact_id in contacts {
            if island.bodies.len() == 2 * MAX_TOI_CONTACTS || island.contacts.len() == MAX_TOI_CONTACTS {
                break;
            }

            let Some(contact) = self.contact_manager.contacts.get(contact_id) else {
                continue;
            };
            // Has this contact already been added to the island?
            if contact.island_flag || contact.sensor {
                continue;
            }

            // Only add static, kinematic, or bullet bodies.
            let other = if contact.body_a == body_id {
                contact.body_b
            } else {
                contact.body_a
            };
            let this_bullet = self.bodies[body_id].bullet;
            let other_body = &mut self.bodies[other];
            if other_body.body_type == BodyType::Dynamic && !this_bullet && !other_body.bullet {
                continue;
            }

            // Tentatively advance the body to the TOI.
            let backup = other_body.sweep;
            if !other_body.island_flag {
                other_body.advance(min_alpha);
            }

            // Update the contact points.
            self.contact_manager
                .update_contact(contact_id, &mut self.bodies, &self.fixtures, &mut self.listeners);

            // Was the contact disabled by the user? Are there contact points?
            let contact = &self.contact_manager.contacts[contact_id];
            if !contact.enabled || !contact.is_touching() {
                let other_body = &mut self.bodies[other];
                other_body.sweep = backup;
                other_body.synchronize_transform();
                continue;
            }

            // Add the contact to the island.
            self.contact_manager.contacts[contact_id].island_flag = true;
            island.add_contact(contact_id);

            // Has the other body already been added to the island?
            let other_body = &mut self.bodies[other];
            if other_body.island_flag {
                continue;
            }

            // Add the other body to the island.
            other_body.island_flag = true;
            if other_body.body_type != BodyType::Static {
                other_body.set_awake(true);
            }
            island.add_body(other, other_body);
        }
    }
}

impl core::fmt::Debug for World {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("World")
            .field("config", &self.config)
            .field("bodies", &self.bodies.len())
            .field("fixtures", &self.fixtures.len())
            .field("joints", &self.joints.len())
            .field("contacts", &self.contact_manager.contacts.len())
            .field("listeners", &self.listeners)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ContactEventType;
    use crate::joint_distance::DistanceJointDef;
    use crate::joint_gear::GearJointDef;
    use crate::joint_revolute::RevoluteJointDef;
    use crate::shape::Shape;

    fn ground(world: &mut World) -> BodyId {
        let id = world.create_body(&BodyDef::fixed(Vec2::ZERO)).unwrap();
        world
            .create_fixture(id, &FixtureDef::new(Shape::new_box(10.0, 0.5).unwrap()))
            .unwrap();
        id
    }

    fn ball(world: &mut World, position: Vec2) -> BodyId {
        let id = world.create_body(&BodyDef::dynamic(position)).unwrap();
        world
            .create_fixture(
                id,
                &FixtureDef::new(Shape::circle(Vec2::ZERO, 0.5).unwrap()).with_density(1.0),
            )
            .unwrap();
        id
    }

    #[test]
    fn test_create_body_rejects_nan() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        let def = BodyDef::dynamic(Vec2::new(f32::NAN, 0.0));
        assert!(world.create_body(&def).is_err());
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_fixture_density_sets_mass() {
        let mut world = World::new(Vec2::ZERO);
        let id = ball(&mut world, Vec2::ZERO);
        let mass = world.body(id).unwrap().mass();
        assert!((mass - core::f32::consts::PI * 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_stale_handles_are_rejected() {
        let mut world = World::new(Vec2::ZERO);
        let id = ball(&mut world, Vec2::ZERO);
        world.destroy_body(id).unwrap();
        assert!(world.body(id).is_none());
        assert_eq!(
            world.destroy_body(id),
            Err(PhysicsError::InvalidHandle { kind: "body" })
        );
        let fresh = ball(&mut world, Vec2::ZERO);
        // The slot is reused with a new generation.
        assert_ne!(fresh, id);
        assert!(world.body(fresh).is_some());
    }

    #[test]
    fn test_ball_lands_and_reports_begin() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        ground(&mut world);
        let b = ball(&mut world, Vec2::new(0.0, 2.0));

        let mut began = false;
        for _ in 0..120 {
            world.step(1.0 / 60.0, 8, 3);
            began |= world
                .contact_events()
                .iter()
                .any(|e| e.event_type == ContactEventType::Begin);
        }
        assert!(began);
        let y = world.body(b).unwrap().position().y;
        // Resting on the top face at 0.5 with radius 0.5.
        assert!((y - 1.0).abs() < 0.05, "y = {y}");
    }

    #[test]
    fn test_destroy_body_with_joint_rejected() {
        let mut world = World::new(Vec2::ZERO);
        let g = ground(&mut world);
        let b = ball(&mut world, Vec2::new(0.0, 3.0));
        let joint = world
            .create_joint(DistanceJointDef::initialize(&world, g, b, Vec2::ZERO, Vec2::new(0.0, 3.0)).unwrap())
            .unwrap();

        assert_eq!(
            world.destroy_body(b),
            Err(PhysicsError::BodyHasJoints { count: 1 })
        );
        world.destroy_body_and_joints(b).unwrap();
        assert!(world.joint(joint).is_none());
        assert!(world.body(g).unwrap().joints().is_empty());
    }

    #[test]
    fn test_gear_source_joint_in_use() {
        let mut world = World::new(Vec2::ZERO);
        let g = ground(&mut world);
        let a = ball(&mut world, Vec2::new(-2.0, 3.0));
        let b = ball(&mut world, Vec2::new(2.0, 3.0));
        let j1 = world
            .create_joint(RevoluteJointDef::initialize(&world, g, a, Vec2::new(-2.0, 3.0)).unwrap())
            .unwrap();
        let j2 = world
            .create_joint(RevoluteJointDef::initialize(&world, g, b, Vec2::new(2.0, 3.0)).unwrap())
            .unwrap();
        let gear = world
            .create_joint(GearJointDef::initialize(&world, j1, j2, 2.0).unwrap())
            .unwrap();

        assert!(matches!(
            world.destroy_joint(j1),
            Err(PhysicsError::JointInUse { .. })
        ));

        // Cascading destruction removes the gear first.
        world.destroy_body_and_joints(a).unwrap();
        assert!(world.joint(gear).is_none());
        assert!(world.joint(j1).is_none());
        assert!(world.joint(j2).is_some());
    }

    #[test]
    fn test_joint_suppresses_contacts_between_bodies() {
        let mut world = World::new(Vec2::ZERO);
        let a = ball(&mut world, Vec2::ZERO);
        let b = ball(&mut world, Vec2::new(0.5, 0.0));
        world.step(1.0 / 60.0, 8, 3);
        assert_eq!(world.contact_count(), 1);

        world
            .create_joint(RevoluteJointDef::initialize(&world, a, b, Vec2::new(0.25, 0.0)).unwrap())
            .unwrap();
        world.step(1.0 / 60.0, 8, 3);
        assert_eq!(world.contact_count(), 0);
    }

    #[test]
    fn test_destroy_fixture_ends_contact() {
        let mut world = World::new(Vec2::ZERO);
        let a = ball(&mut world, Vec2::ZERO);
        ball(&mut world, Vec2::new(0.5, 0.0));
        world.step(1.0 / 60.0, 8, 3);
        assert_eq!(world.contact_count(), 1);

        let fixture = world.body(a).unwrap().fixtures()[0];
        world.destroy_fixture(fixture).unwrap();
        assert_eq!(world.contact_count(), 0);
        assert!(world
            .contact_events()
            .iter()
            .any(|e| e.event_type == ContactEventType::End));
        // Mass falls back to 1 without fixtures.
        assert_eq!(world.body(a).unwrap().mass(), 1.0);
    }

    #[test]
    fn test_set_transform_moves_body() {
        let mut world = World::new(Vec2::ZERO);
        let b = ball(&mut world, Vec2::ZERO);
        world.set_transform(b, Vec2::new(3.0, 4.0), 0.5).unwrap();
        let body = world.body(b).unwrap();
        assert_eq!(body.position(), Vec2::new(3.0, 4.0));
        assert_eq!(body.angle(), 0.5);
        assert!(world.set_transform(b, Vec2::new(f32::NAN, 0.0), 0.0).is_err());
    }

    #[test]
    fn test_set_body_type_static_stops_motion() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        let b = ball(&mut world, Vec2::ZERO);
        world.step(1.0 / 60.0, 8, 3);
        world.set_body_type(b, BodyType::Static).unwrap();
        let body = world.body(b).unwrap();
        assert_eq!(body.linear_velocity(), Vec2::ZERO);
        assert_eq!(body.mass(), 0.0);
        assert!(!body.is_awake());

        let y = body.position().y;
        world.step(1.0 / 60.0, 8, 3);
        assert_eq!(world.body(b).unwrap().position().y, y);
    }

    #[test]
    fn test_disabled_body_does_not_move_or_collide() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        let a = ball(&mut world, Vec2::ZERO);
        ball(&mut world, Vec2::new(0.5, 0.0));
        world.set_enabled(a, false).unwrap();
        world.step(1.0 / 60.0, 8, 3);
        assert_eq!(world.contact_count(), 0);
        assert_eq!(world.body(a).unwrap().position(), Vec2::ZERO);
        assert_eq!(world.proxy_count(), 1);

        world.set_enabled(a, true).unwrap();
        world.step(1.0 / 60.0, 8, 3);
        assert_eq!(world.contact_count(), 1);
    }

    #[test]
    fn test_shift_origin() {
        let mut world = World::new(Vec2::ZERO);
        let b = ball(&mut world, Vec2::new(5.0, 5.0));
        world.shift_origin(Vec2::new(5.0, 0.0));
        assert_eq!(world.body(b).unwrap().position(), Vec2::new(0.0, 5.0));
    }

    #[test]
    fn test_forces_cleared_after_step() {
        let mut world = World::new(Vec2::ZERO);
        let b = ball(&mut world, Vec2::ZERO);
        world
            .body_mut(b)
            .unwrap()
            .apply_force_to_center(Vec2::new(10.0, 0.0), true);
        world.step(1.0 / 60.0, 8, 3);
        let vx = world.body(b).unwrap().linear_velocity().x;
        assert!(vx > 0.0);
        world.step(1.0 / 60.0, 8, 3);
        assert_eq!(world.body(b).unwrap().linear_velocity().x, vx);
    }

    #[test]
    fn test_with_config_validates() {
        let bad = WorldConfig::default().with_gravity(Vec2::new(f32::NAN, 0.0));
        assert!(World::with_config(bad).is_err());
        let world = World::with_config(WorldConfig::default()).unwrap();
        assert!(world.config().allow_sleep);
    }
}
