//! Contact Manager
//!
//! Owns the broad phase and the contact arena. New contacts come from
//! broad-phase pairs; existing contacts are re-filtered, culled when their
//! fat AABBs stop overlapping, and re-evaluated every step.
//!
//! # Narrow-phase pipeline
//!
//! 1. Sequential: filter, overlap and destruction in contact-arena order.
//! 2. Pure: manifold generation for every surviving contact. With the
//!    `parallel` feature this is a rayon map; results are collected in
//!    input order.
//! 3. Sequential: state transitions, wake-ups and listener calls, again in
//!    contact-arena order.
//!
//! Phases 1 and 3 fix the order of every observable effect, so the
//! `parallel` feature never changes results.

use tracing::trace;

use crate::arena::{Arena, BodyId, ContactId, FixtureId, JointId};
use crate::body::{Body, BodyType};
use crate::broad_phase::BroadPhase;
use crate::contact::{Contact, ContactKind, ContactState, ContactUpdate};
use crate::event::Listeners;
use crate::fixture::{Fixture, FixtureProxyKey};
use crate::joint::Joint;

/// Broad phase plus persistent contacts.
#[derive(Debug, Default)]
pub(crate) struct ContactManager {
    pub broad_phase: BroadPhase<FixtureProxyKey>,
    pub contacts: Arena<ContactId, Contact>,
}

/// Whether two bodies may collide at all: one must be dynamic and no joint
/// between them may forbid it.
pub(crate) fn bodies_should_collide(
    bodies: &Arena<BodyId, Body>,
    joints: &Arena<JointId, Joint>,
    id_a: BodyId,
    id_b: BodyId,
) -> bool {
    let (Some(a), Some(b)) = (bodies.get(id_a), bodies.get(id_b)) else {
        return false;
    };
    if a.body_type != BodyType::Dynamic && b.body_type != BodyType::Dynamic {
        return false;
    }
    !b.joints.iter().any(|&j| {
        joints
            .get(j)
            .is_some_and(|joint| joint.other(id_b) == id_a && !joint.collide_connected())
    })
}

impl ContactManager {
    /// Create contacts for every new broad-phase pair.
    pub(crate) fn find_new_contacts(
        &mut self,
        bodies: &mut Arena<BodyId, Body>,
        fixtures: &Arena<FixtureId, Fixture>,
        joints: &Arena<JointId, Joint>,
        listeners: &Listeners,
    ) {
        let mut pairs = Vec::new();
        self.broad_phase.update_pairs(|a, b| pairs.push((a, b)));
        for (a, b) in pairs {
            self.add_pair(a, b, bodies, fixtures, joints, listeners);
        }
    }

    fn add_pair(
        &mut self,
        key_a: FixtureProxyKey,
        key_b: FixtureProxyKey,
        bodies: &mut Arena<BodyId, Body>,
        fixtures: &Arena<FixtureId, Fixture>,
        joints: &Arena<JointId, Joint>,
        listeners: &Listeners,
    ) {
        let (Some(fixture_a), Some(fixture_b)) = (fixtures.get(key_a.fixture), fixtures.get(key_b.fixture))
        else {
            return;
        };
        let (body_a, body_b) = (fixture_a.body, fixture_b.body);

        // Fixtures on the same body never collide.
        if body_a == body_b {
            return;
        }

        // Does a contact already exist?
        let Some(b) = bodies.get(body_b) else {
            return;
        };
        let exists = b.contacts.iter().any(|&id| {
            self.contacts.get(id).is_some_and(|c| {
                let forward = c.fixture_a == key_a.fixture
                    && c.child_a == key_a.child
                    && c.fixture_b == key_b.fixture
                    && c.child_b == key_b.child;
                let reverse = c.fixture_a == key_b.fixture
                    && c.child_a == key_b.child
                    && c.fixture_b == key_a.fixture
                    && c.child_b == key_a.child;
                forward || reverse
            })
        });
        if exists {
            return;
        }

        if !bodies_should_collide(bodies, joints, body_a, body_b) {
            return;
        }
        if !listeners.should_collide(fixture_a, fixture_b) {
            return;
        }

        let Some((kind, swap)) = ContactKind::resolve(fixture_a.shape.shape_type(), fixture_b.shape.shape_type())
        else {
            return;
        };

        let side_a = (key_a.fixture, key_a.child, fixture_a);
        let side_b = (key_b.fixture, key_b.child, fixture_b);
        let contact = if swap {
            Contact::new(kind, side_b, side_a)
        } else {
            Contact::new(kind, side_a, side_b)
        };

        let id = self.contacts.insert(contact);
        if let Some(body) = bodies.get_mut(body_a) {
            body.contacts.push(id);
        }
        if let Some(body) = bodies.get_mut(body_b) {
            body.contacts.push(id);
        }
        trace!(contact = ?id, ?kind, "contact created");
    }

    /// Destroy a contact, reporting `end_contact` if it was touching.
    pub(crate) fn destroy(
        &mut self,
        id: ContactId,
        bodies: &mut Arena<BodyId, Body>,
        listeners: &mut Listeners,
    ) {
        let Some(contact) = self.contacts.get_mut(id) else {
            return;
        };
        let was_touching = contact.is_touching();
        contact.state = ContactState::Removed;
        if was_touching {
            listeners.end_contact(id, contact);
        }

        let Some(contact) = self.contacts.remove(id) else {
            return;
        };
        let wake = contact.manifold.point_count > 0 && !contact.sensor;
        for body_id in [contact.body_a, contact.body_b] {
            if let Some(body) = bodies.get_mut(body_id) {
                body.contacts.retain(|&c| c != id);
                if wake {
                    body.set_awake(true);
                }
            }
        }
        trace!(contact = ?id, "contact destroyed");
    }

    /// Narrow phase for every contact. See the module docs for ordering.
    pub(crate) fn collide(
        &mut self,
        bodies: &mut Arena<BodyId, Body>,
        fixtures: &Arena<FixtureId, Fixture>,
        joints: &Arena<JointId, Joint>,
        listeners: &mut Listeners,
    ) {
        // Phase 1: filter and cull.
        let mut live = Vec::with_capacity(self.contacts.len());
        for id in self.contacts.handles() {
            match self.classify(id, bodies, fixtures, joints, listeners) {
                Survival::Update => live.push(id),
                Survival::Skip => {}
                Survival::Destroy => self.destroy(id, bodies, listeners),
            }
        }

        // Phase 2: manifolds.
        let updates = self.compute_updates(&live, bodies, fixtures);

        // Phase 3: transitions and events.
        for (id, update) in live.into_iter().zip(updates) {
            if let Some(update) = update {
                self.apply(id, update, bodies, listeners);
            }
        }
        trace!(contacts = self.contacts.len(), "narrow phase done");
    }

    /// Re-evaluate a single contact (time-of-impact sub-steps).
    pub(crate) fn update_contact(
        &mut self,
        id: ContactId,
        bodies: &mut Arena<BodyId, Body>,
        fixtures: &Arena<FixtureId, Fixture>,
        listeners: &mut Listeners,
    ) {
        let Some(update) = self.compute_one(id, bodies, fixtures) else {
            return;
        };
        self.apply(id, update, bodies, listeners);
    }

    fn classify(
        &mut self,
        id: ContactId,
        bodies: &Arena<BodyId, Body>,
        fixtures: &Arena<FixtureId, Fixture>,
        joints: &Arena<JointId, Joint>,
        listeners: &Listeners,
    ) -> Survival {
        let Some(contact) = self.contacts.get_mut(id) else {
            return Survival::Skip;
        };
        let (Some(fixture_a), Some(fixture_b)) = (fixtures.get(contact.fixture_a), fixtures.get(contact.fixture_b))
        else {
            return Survival::Destroy;
        };

        // Is this contact flagged for filtering?
        if contact.filter_flag {
            if !bodies_should_collide(bodies, joints, contact.body_b, contact.body_a)
                || !listeners.should_collide(fixture_a, fixture_b)
            {
                return Survival::Destroy;
            }
            contact.filter_flag = false;
        }

        let active = |body: BodyId| {
            bodies
                .get(body)
                .is_some_and(|b| b.awake && b.body_type != BodyType::Static)
        };
        // At least one body must be awake and not static.
        if !active(contact.body_a) && !active(contact.body_b) {
            return Survival::Skip;
        }

        let (Some(proxy_a), Some(proxy_b)) = (
            fixture_a.proxies.get(contact.child_a),
            fixture_b.proxies.get(contact.child_b),
        ) else {
            return Survival::Destroy;
        };
        if !self.broad_phase.test_overlap(proxy_a.proxy_id, proxy_b.proxy_id) {
            return Survival::Destroy;
        }
        Survival::Update
    }

    fn compute_one(
        &self,
        id: ContactId,
        bodies: &Arena<BodyId, Body>,
        fixtures: &Arena<FixtureId, Fixture>,
    ) -> Option<ContactUpdate> {
        let contact = self.contacts.get(id)?;
        let fixture_a = fixtures.get(contact.fixture_a)?;
        let fixture_b = fixtures.get(contact.fixture_b)?;
        let xf_a = &bodies.get(contact.body_a)?.xf;
        let xf_b = &bodies.get(contact.body_b)?.xf;
        Some(contact.compute_update(fixture_a, fixture_b, xf_a, xf_b))
    }

    #[cfg(not(feature = "parallel"))]
    fn compute_updates(
        &self,
        ids: &[ContactId],
        bodies: &Arena<BodyId, Body>,
        fixtures: &Arena<FixtureId, Fixture>,
    ) -> Vec<Option<ContactUpdate>> {
        ids.iter()
            .map(|&id| self.compute_one(id, bodies, fixtures))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn compute_updates(
        &self,
        ids: &[ContactId],
        bodies: &Arena<BodyId, Body>,
        fixtures: &Arena<FixtureId, Fixture>,
    ) -> Vec<Option<ContactUpdate>> {
        use rayon::prelude::*;
        ids.par_iter()
            .map(|&id| self.compute_one(id, bodies, fixtures))
            .collect()
    }

    fn apply(
        &mut self,
        id: ContactId,
        update: ContactUpdate,
        bodies: &mut Arena<BodyId, Body>,
        listeners: &mut Listeners,
    ) {
        let Some(contact) = self.contacts.get_mut(id) else {
            return;
        };
        let transition = contact.apply_update(update);

        if !contact.sensor && transition.touching != transition.was_touching {
            for body in [contact.body_a, contact.body_b] {
                if let Some(body) = bodies.get_mut(body) {
                    body.set_awake(true);
                }
            }
        }

        if !transition.was_touching && transition.touching {
            listeners.begin_contact(id, contact);
        }
        if transition.was_touching && !transition.touching {
            listeners.end_contact(id, contact);
        }
        if !contact.sensor && transition.touching {
            listeners.pre_solve(id, contact, &transition.old_manifold);
        }
    }
}

enum Survival {
    Update,
    Skip,
    Destroy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDef;
    use crate::collision::Aabb;
    use crate::event::ContactEventType;
    use crate::fixture::FixtureDef;
    use crate::math::Vec2;
    use crate::shape::Shape;

    struct Scene {
        manager: ContactManager,
        bodies: Arena<BodyId, Body>,
        fixtures: Arena<FixtureId, Fixture>,
        joints: Arena<JointId, Joint>,
        listeners: Listeners,
        moving: BodyId,
    }

    fn add(scene: &mut Scene, body: BodyId, def: FixtureDef) -> FixtureId {
        let id = scene.fixtures.next_handle();
        let mut fixture = Fixture::new(body, &def);
        fixture.create_proxies(&mut scene.manager.broad_phase, &scene.bodies[body].xf, id);
        let inserted = scene.fixtures.insert(fixture);
        assert_eq!(inserted, id);
        scene.bodies[body].fixtures.push(id);
        id
    }

    /// Static ground box with a dynamic circle at height `y`.
    fn scene(y: f32, sensor: bool) -> Scene {
        let mut bodies = Arena::new();
        let ground = bodies.insert(Body::new(&BodyDef::fixed(Vec2::ZERO)));
        let ball = bodies.insert(Body::new(&BodyDef::dynamic(Vec2::new(0.0, y))));
        let mut s = Scene {
            manager: ContactManager::default(),
            bodies,
            fixtures: Arena::new(),
            joints: Arena::new(),
            listeners: Listeners::default(),
            moving: ball,
        };
        add(&mut s, ground, FixtureDef::new(Shape::new_box(5.0, 0.5).unwrap()));
        add(
            &mut s,
            ball,
            FixtureDef::new(Shape::circle(Vec2::ZERO, 0.5).unwrap()).with_sensor(sensor),
        );
        s
    }

    fn run(s: &mut Scene) {
        s.manager
            .find_new_contacts(&mut s.bodies, &s.fixtures, &s.joints, &s.listeners);
        s.manager
            .collide(&mut s.bodies, &s.fixtures, &s.joints, &mut s.listeners);
    }

    #[test]
    fn test_pair_creates_one_contact() {
        let mut s = scene(0.9, false);
        run(&mut s);
        assert_eq!(s.manager.contacts.len(), 1);
        let (id, contact) = s.manager.contacts.iter().next().unwrap();
        // Polygon-circle: the polygon is always shape A.
        assert_eq!(contact.kind(), ContactKind::PolygonCircle);
        assert!(contact.is_touching());
        assert!(s.bodies[s.moving].contacts.contains(&id));

        // A second pass does not duplicate it.
        run(&mut s);
        assert_eq!(s.manager.contacts.len(), 1);

        let begins: Vec<_> = s.listeners.collector.begin_events().collect();
        assert_eq!(begins.len(), 1);
    }

    #[test]
    fn test_separated_fat_aabbs_destroy_contact() {
        let mut s = scene(0.9, false);
        run(&mut s);
        assert_eq!(s.manager.contacts.len(), 1);

        // Teleport the ball far away. A teleport has no sweep, so the proxy
        // covers only the new pose.
        let ball = s.moving;
        let fixture = s.bodies[ball].fixtures[0];
        s.bodies[ball].place(Vec2::new(0.0, 50.0), 0.0);
        let new = s.bodies[ball].xf;
        s.fixtures[fixture].synchronize(&mut s.manager.broad_phase, &new, &new);
        assert!(!s
            .manager
            .broad_phase
            .fat_aabb(s.fixtures[fixture].proxies[0].proxy_id)
            .overlaps(&Aabb::new(Vec2::new(-5.0, -0.5), Vec2::new(5.0, 0.5))));
        run(&mut s);

        assert!(s.manager.contacts.is_empty());
        assert!(s.bodies[ball].contacts.is_empty());
        let kinds: Vec<_> = s
            .listeners
            .collector
            .events()
            .iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(kinds, vec![ContactEventType::Begin, ContactEventType::End]);
    }

    #[test]
    fn test_sensor_contact_has_no_manifold() {
        let mut s = scene(0.9, true);
        run(&mut s);
        let (_, contact) = s.manager.contacts.iter().next().unwrap();
        assert!(contact.is_sensor());
        assert!(contact.is_touching());
        assert_eq!(contact.manifold().point_count, 0);
    }

    #[test]
    fn test_two_static_bodies_never_pair() {
        let mut s = scene(0.9, false);
        s.bodies[s.moving].body_type = BodyType::Static;
        run(&mut s);
        assert!(s.manager.contacts.is_empty());
    }
}
