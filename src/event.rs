//! Physics Event System
//!
//! Listener traits invoked synchronously while stepping, and an
//! [`EventCollector`] that records begin/end contact events so callers can
//! poll them after `step()` instead of implementing a listener.
//!
//! Listeners only ever receive contacts, joints and fixtures by reference,
//! never the world, so they cannot mutate the world mid-step.

use crate::arena::{BodyId, ContactId, FixtureId, JointId};
use crate::collision::Manifold;
use crate::contact::Contact;
use crate::filter::{ContactFilter, Filter};
use crate::fixture::Fixture;
use crate::joint::Joint;
use crate::settings::MAX_MANIFOLD_POINTS;

/// Type of contact event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContactEventType {
    /// Fixtures started touching (sensor started overlapping)
    Begin,
    /// Fixtures stopped touching, or the contact was destroyed while touching
    End,
}

/// A contact event between two fixtures
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContactEvent {
    /// Contact handle (stale after an `End` caused by destruction)
    pub contact: ContactId,
    /// First fixture
    pub fixture_a: FixtureId,
    /// Second fixture
    pub fixture_b: FixtureId,
    /// Body of the first fixture
    pub body_a: BodyId,
    /// Body of the second fixture
    pub body_b: BodyId,
    /// Event type
    pub event_type: ContactEventType,
    /// Either fixture is a sensor
    pub sensor: bool,
}

impl ContactEvent {
    fn new(id: ContactId, contact: &Contact, event_type: ContactEventType) -> Self {
        Self {
            contact: id,
            fixture_a: contact.fixture_a(),
            fixture_b: contact.fixture_b(),
            body_a: contact.body_a(),
            body_b: contact.body_b(),
            event_type,
            sensor: contact.is_sensor(),
        }
    }
}

/// Solver impulses of one contact, reported after the velocity solve.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContactImpulse {
    /// Normal impulse per manifold point
    pub normal_impulses: [f32; MAX_MANIFOLD_POINTS],
    /// Tangent impulse per manifold point
    pub tangent_impulses: [f32; MAX_MANIFOLD_POINTS],
    /// Number of valid entries
    pub count: usize,
}

/// Contact callbacks. All methods default to doing nothing.
pub trait ContactListener {
    /// Two fixtures began to touch.
    fn begin_contact(&mut self, _id: ContactId, _contact: &Contact) {}

    /// Two fixtures ceased to touch. Also called when a touching contact
    /// is destroyed; its state is then [`crate::ContactState::Removed`].
    fn end_contact(&mut self, _id: ContactId, _contact: &Contact) {}

    /// Called after the manifold is updated and before it is solved, for
    /// touching non-sensor contacts. May disable the contact for this step
    /// or adjust friction, restitution and tangent speed.
    fn pre_solve(&mut self, _id: ContactId, _contact: &mut Contact, _old_manifold: &Manifold) {}

    /// Impulses applied by the solver, for touching non-sensor contacts.
    fn post_solve(&mut self, _id: ContactId, _contact: &Contact, _impulse: &ContactImpulse) {}
}

/// Notified when entities are destroyed implicitly because their owner was.
pub trait DestructionListener {
    /// A joint is about to be destroyed with one of its bodies.
    fn say_goodbye_joint(&mut self, _id: JointId, _joint: &Joint) {}

    /// A fixture is about to be destroyed with its body.
    fn say_goodbye_fixture(&mut self, _id: FixtureId, _fixture: &Fixture) {}
}

/// Records begin/end contact events for one step.
#[derive(Clone, Debug, Default)]
pub struct EventCollector {
    events: Vec<ContactEvent>,
}

impl EventCollector {
    /// Create a new event collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event
    pub fn record(&mut self, event: ContactEvent) {
        self.events.push(event);
    }

    /// Events recorded so far, in occurrence order
    #[must_use]
    pub fn events(&self) -> &[ContactEvent] {
        &self.events
    }

    /// Begin events only
    pub fn begin_events(&self) -> impl Iterator<Item = &ContactEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type == ContactEventType::Begin)
    }

    /// End events only
    pub fn end_events(&self) -> impl Iterator<Item = &ContactEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type == ContactEventType::End)
    }

    /// Take all recorded events
    pub fn drain(&mut self) -> Vec<ContactEvent> {
        core::mem::take(&mut self.events)
    }

    /// Forget recorded events
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Number of recorded events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// No events recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// User hooks plus the built-in collector, dispatched by the world.
#[derive(Default)]
pub(crate) struct Listeners {
    pub contact: Option<Box<dyn ContactListener>>,
    pub filter: Option<Box<dyn ContactFilter>>,
    pub destruction: Option<Box<dyn DestructionListener>>,
    pub collector: EventCollector,
}

impl Listeners {
    pub fn begin_contact(&mut self, id: ContactId, contact: &Contact) {
        self.collector
            .record(ContactEvent::new(id, contact, ContactEventType::Begin));
        if let Some(listener) = self.contact.as_mut() {
            listener.begin_contact(id, contact);
        }
    }

    pub fn end_contact(&mut self, id: ContactId, contact: &Contact) {
        self.collector
            .record(ContactEvent::new(id, contact, ContactEventType::End));
        if let Some(listener) = self.contact.as_mut() {
            listener.end_contact(id, contact);
        }
    }

    pub fn pre_solve(&mut self, id: ContactId, contact: &mut Contact, old_manifold: &Manifold) {
        if let Some(listener) = self.contact.as_mut() {
            listener.pre_solve(id, contact, old_manifold);
        }
    }

    pub fn post_solve(&mut self, id: ContactId, contact: &Contact, impulse: &ContactImpulse) {
        if let Some(listener) = self.contact.as_mut() {
            listener.post_solve(id, contact, impulse);
        }
    }

    pub fn should_collide(&self, fixture_a: &Fixture, fixture_b: &Fixture) -> bool {
        match self.filter.as_ref() {
            Some(filter) => filter.should_collide(fixture_a, fixture_b),
            None => Filter::should_collide(fixture_a.filter(), fixture_b.filter()),
        }
    }

    pub fn say_goodbye_joint(&mut self, id: JointId, joint: &Joint) {
        if let Some(listener) = self.destruction.as_mut() {
            listener.say_goodbye_joint(id, joint);
        }
    }

    pub fn say_goodbye_fixture(&mut self, id: FixtureId, fixture: &Fixture) {
        if let Some(listener) = self.destruction.as_mut() {
            listener.say_goodbye_fixture(id, fixture);
        }
    }
}

impl core::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Listeners")
            .field("contact", &self.contact.is_some())
            .field("filter", &self.filter.is_some())
            .field("destruction", &self.destruction.is_some())
            .field("collector", &self.collector)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Arena, Handle, Index};
    use crate::contact::ContactKind;
    use crate::fixture::FixtureDef;
    use crate::math::Vec2;
    use crate::shape::Shape;

    struct Counter {
        begins: usize,
        ends: usize,
    }

    impl ContactListener for Counter {
        fn begin_contact(&mut self, _id: ContactId, _contact: &Contact) {
            self.begins += 1;
        }

        fn end_contact(&mut self, _id: ContactId, _contact: &Contact) {
            self.ends += 1;
        }
    }

    fn sample_contact() -> (ContactId, Contact) {
        let body = BodyId::from_index(Index {
            slot: 0,
            generation: 0,
        });
        let mut fixtures: Arena<FixtureId, Fixture> = Arena::new();
        let def = FixtureDef::new(Shape::circle(Vec2::ZERO, 0.5).unwrap());
        let a = fixtures.insert(Fixture::new(body, &def));
        let b = fixtures.insert(Fixture::new(body, &def));
        let contact = Contact::new(
            ContactKind::CircleCircle,
            (a, 0, &fixtures[a]),
            (b, 0, &fixtures[b]),
        );
        let id = ContactId::from_index(Index {
            slot: 7,
            generation: 0,
        });
        (id, contact)
    }

    #[test]
    fn test_collector_records_in_order() {
        let (id, contact) = sample_contact();
        let mut listeners = Listeners::default();
        listeners.begin_contact(id, &contact);
        listeners.end_contact(id, &contact);

        let events = listeners.collector.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, ContactEventType::Begin);
        assert_eq!(events[1].event_type, ContactEventType::End);
        assert_eq!(events[0].contact, id);
        assert_eq!(listeners.collector.begin_events().count(), 1);
        assert_eq!(listeners.collector.end_events().count(), 1);

        let drained = listeners.collector.drain();
        assert_eq!(drained.len(), 2);
        assert!(listeners.collector.is_empty());
    }

    #[test]
    fn test_user_listener_is_called() {
        let (id, contact) = sample_contact();
        let mut listeners = Listeners::default();
        listeners.contact = Some(Box::new(Counter { begins: 0, ends: 0 }));
        listeners.begin_contact(id, &contact);
        listeners.begin_contact(id, &contact);
        listeners.end_contact(id, &contact);
        assert_eq!(listeners.collector.len(), 3);
    }

    #[test]
    fn test_default_filter_policy() {
        let body = BodyId::from_index(Index {
            slot: 0,
            generation: 0,
        });
        let shape = Shape::circle(Vec2::ZERO, 0.5).unwrap();
        let a = Fixture::new(
            body,
            &FixtureDef::new(shape.clone()).with_filter(Filter::DEFAULT.with_group(-1)),
        );
        let b = Fixture::new(
            body,
            &FixtureDef::new(shape).with_filter(Filter::DEFAULT.with_group(-1)),
        );
        let listeners = Listeners::default();
        assert!(!listeners.should_collide(&a, &b));
    }
}
