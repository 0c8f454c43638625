//! Persistent Contacts
//!
//! A contact exists for every fixture-child pair whose fat AABBs overlap.
//! Each update regenerates the manifold for the pair's shape kinds and
//! carries accumulated impulses over from the previous manifold by feature
//! key, which is what makes warm starting work.
//!
//! # States
//!
//! ```text
//!   broad-phase pair ──► Pending ◄──────► Touching
//!                           │                │
//!                           └──► Removed ◄───┘   (AABBs separate, fixture
//!                                                 or body destroyed, filtered)
//! ```
//!
//! Sensor contacts use an exact overlap test instead of a manifold and never
//! reach the solver.

use crate::arena::{BodyId, FixtureId};
use crate::collide_circle::{collide_circles, collide_polygon_and_circle};
use crate::collide_edge::{
    collide_chain_and_circle, collide_chain_and_polygon, collide_edge_and_circle,
    collide_edge_and_polygon,
};
use crate::collide_polygon::collide_polygons;
use crate::collision::{test_overlap, Manifold, WorldManifold};
use crate::fixture::Fixture;
use crate::math::Transform;
use crate::settings::{mix_friction, mix_restitution, mix_restitution_threshold};
use crate::shape::{Shape, ShapeType};

/// Lifecycle state of a contact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContactState {
    /// AABBs overlap but the shapes do not touch
    #[default]
    Pending,
    /// Manifold has at least one point (or the sensor overlaps)
    Touching,
    /// Being destroyed; only observed from `end_contact`
    Removed,
}

/// Which manifold generator a contact uses. Shape A always carries the
/// first-named type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContactKind {
    /// Circle vs circle
    CircleCircle,
    /// Polygon vs circle
    PolygonCircle,
    /// Polygon vs polygon
    PolygonPolygon,
    /// Edge vs circle
    EdgeCircle,
    /// Edge vs polygon
    EdgePolygon,
    /// Chain child vs circle
    ChainCircle,
    /// Chain child vs polygon
    ChainPolygon,
}

impl ContactKind {
    fn primary(type_a: ShapeType, type_b: ShapeType) -> Option<Self> {
        use ShapeType::{Chain, Circle, Edge, Polygon};
        match (type_a, type_b) {
            (Circle, Circle) => Some(Self::CircleCircle),
            (Polygon, Circle) => Some(Self::PolygonCircle),
            (Polygon, Polygon) => Some(Self::PolygonPolygon),
            (Edge, Circle) => Some(Self::EdgeCircle),
            (Edge, Polygon) => Some(Self::EdgePolygon),
            (Chain, Circle) => Some(Self::ChainCircle),
            (Chain, Polygon) => Some(Self::ChainPolygon),
            _ => None,
        }
    }

    /// Contact kind for a shape pair and whether A and B must be swapped
    /// to match it. `None` for pairs that never collide (edges and chains
    /// against each other).
    #[must_use]
    pub fn resolve(type_a: ShapeType, type_b: ShapeType) -> Option<(Self, bool)> {
        if let Some(kind) = Self::primary(type_a, type_b) {
            return Some((kind, false));
        }
        Self::primary(type_b, type_a).map(|kind| (kind, true))
    }

    /// Generate the manifold for this kind.
    #[must_use]
    pub fn evaluate(
        self,
        shape_a: &Shape,
        child_a: usize,
        xf_a: &Transform,
        shape_b: &Shape,
        xf_b: &Transform,
    ) -> Manifold {
        match (self, shape_a, shape_b) {
            (Self::CircleCircle, Shape::Circle(a), Shape::Circle(b)) => {
                collide_circles(a, xf_a, b, xf_b)
            }
            (Self::PolygonCircle, Shape::Polygon(a), Shape::Circle(b)) => {
                collide_polygon_and_circle(a, xf_a, b, xf_b)
            }
            (Self::PolygonPolygon, Shape::Polygon(a), Shape::Polygon(b)) => {
                collide_polygons(a, xf_a, b, xf_b)
            }
            (Self::EdgeCircle, Shape::Edge(a), Shape::Circle(b)) => {
                collide_edge_and_circle(a, xf_a, b, xf_b)
            }
            (Self::EdgePolygon, Shape::Edge(a), Shape::Polygon(b)) => {
                collide_edge_and_polygon(a, xf_a, b, xf_b)
            }
            (Self::ChainCircle, Shape::Chain(a), Shape::Circle(b)) => {
                collide_chain_and_circle(a, child_a, xf_a, b, xf_b)
            }
            (Self::ChainPolygon, Shape::Chain(a), Shape::Polygon(b)) => {
                collide_chain_and_polygon(a, child_a, xf_a, b, xf_b)
            }
            _ => Manifold::default(),
        }
    }
}

/// Result of a narrow-phase evaluation, computed without mutating the
/// contact so it can run in parallel.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ContactUpdate {
    pub manifold: Manifold,
    pub touching: bool,
}

/// What changed when an update was applied.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ContactTransition {
    pub old_manifold: Manifold,
    pub was_touching: bool,
    pub touching: bool,
}

/// Contact between two fixture children.
#[derive(Clone, Debug)]
pub struct Contact {
    pub(crate) fixture_a: FixtureId,
    pub(crate) fixture_b: FixtureId,
    pub(crate) child_a: usize,
    pub(crate) child_b: usize,
    pub(crate) body_a: BodyId,
    pub(crate) body_b: BodyId,
    pub(crate) kind: ContactKind,

    pub(crate) manifold: Manifold,
    pub(crate) state: ContactState,

    /// Cleared by `pre_solve` to skip this contact for one step
    pub(crate) enabled: bool,
    /// Filter must be re-checked
    pub(crate) filter_flag: bool,
    pub(crate) island_flag: bool,
    /// `toi` holds a valid value for this step
    pub(crate) toi_flag: bool,
    pub(crate) toi_count: u32,
    pub(crate) toi: f32,

    pub(crate) sensor: bool,
    pub(crate) radius_a: f32,
    pub(crate) radius_b: f32,

    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) restitution_threshold: f32,
    pub(crate) tangent_speed: f32,
}

impl Contact {
    /// Build a contact for the given children, already ordered to match
    /// `kind`.
    pub(crate) fn new(
        kind: ContactKind,
        (fixture_a, child_a, fa): (FixtureId, usize, &Fixture),
        (fixture_b, child_b, fb): (FixtureId, usize, &Fixture),
    ) -> Self {
        Self {
            fixture_a,
            fixture_b,
            child_a,
            child_b,
            body_a: fa.body,
            body_b: fb.body,
            kind,
            manifold: Manifold::default(),
            state: ContactState::Pending,
            enabled: true,
            filter_flag: false,
            island_flag: false,
            toi_flag: false,
            toi_count: 0,
            toi: 1.0,
            sensor: fa.is_sensor || fb.is_sensor,
            radius_a: fa.shape.radius(),
            radius_b: fb.shape.radius(),
            friction: mix_friction(fa.friction, fb.friction),
            restitution: mix_restitution(fa.restitution, fb.restitution),
            restitution_threshold: mix_restitution_threshold(
                fa.restitution_threshold,
                fb.restitution_threshold,
            ),
            tangent_speed: 0.0,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Fixture A.
    #[inline]
    #[must_use]
    pub fn fixture_a(&self) -> FixtureId {
        self.fixture_a
    }

    /// Fixture B.
    #[inline]
    #[must_use]
    pub fn fixture_b(&self) -> FixtureId {
        self.fixture_b
    }

    /// Child index on fixture A.
    #[inline]
    #[must_use]
    pub fn child_index_a(&self) -> usize {
        self.child_a
    }

    /// Child index on fixture B.
    #[inline]
    #[must_use]
    pub fn child_index_b(&self) -> usize {
        self.child_b
    }

    /// Body of fixture A.
    #[inline]
    #[must_use]
    pub fn body_a(&self) -> BodyId {
        self.body_a
    }

    /// Body of fixture B.
    #[inline]
    #[must_use]
    pub fn body_b(&self) -> BodyId {
        self.body_b
    }

    /// Manifold generator in use.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ContactKind {
        self.kind
    }

    /// Local manifold.
    #[inline]
    #[must_use]
    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    /// Mutable manifold, for `pre_solve` listeners.
    #[inline]
    pub fn manifold_mut(&mut self) -> &mut Manifold {
        &mut self.manifold
    }

    /// World manifold for the given body transforms.
    #[must_use]
    pub fn world_manifold(&self, xf_a: &Transform, xf_b: &Transform) -> WorldManifold {
        WorldManifold::new(&self.manifold, xf_a, self.radius_a, xf_b, self.radius_b)
    }

    /// Lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ContactState {
        self.state
    }

    /// Whether the shapes touch.
    #[inline]
    #[must_use]
    pub fn is_touching(&self) -> bool {
        self.state == ContactState::Touching
    }

    /// Whether either fixture is a sensor.
    #[inline]
    #[must_use]
    pub fn is_sensor(&self) -> bool {
        self.sensor
    }

    /// Whether the contact takes part in the current step's solve.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable for the current step only; the next update
    /// re-enables it.
    #[inline]
    pub fn set_enabled(&mut self, flag: bool) {
        self.enabled = flag;
    }

    /// Mixed friction.
    #[inline]
    #[must_use]
    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Override friction; persists until the contact is destroyed.
    #[inline]
    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    /// Mixed restitution.
    #[inline]
    #[must_use]
    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    /// Override restitution.
    #[inline]
    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution;
    }

    /// Mixed restitution threshold.
    #[inline]
    #[must_use]
    pub fn restitution_threshold(&self) -> f32 {
        self.restitution_threshold
    }

    /// Override the restitution threshold.
    #[inline]
    pub fn set_restitution_threshold(&mut self, threshold: f32) {
        self.restitution_threshold = threshold;
    }

    /// Desired tangent speed (conveyor belts), in m/s.
    #[inline]
    #[must_use]
    pub fn tangent_speed(&self) -> f32 {
        self.tangent_speed
    }

    /// Set the desired tangent speed.
    #[inline]
    pub fn set_tangent_speed(&mut self, speed: f32) {
        self.tangent_speed = speed;
    }

    /// Flag for filter re-evaluation on the next collide.
    #[inline]
    pub(crate) fn flag_for_filtering(&mut self) {
        self.filter_flag = true;
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Evaluate the narrow phase for the current transforms. Pure: the
    /// result is applied by [`Contact::apply_update`].
    pub(crate) fn compute_update(
        &self,
        fixture_a: &Fixture,
        fixture_b: &Fixture,
        xf_a: &Transform,
        xf_b: &Transform,
    ) -> ContactUpdate {
        if self.sensor {
            let touching = test_overlap(
                &fixture_a.shape,
                self.child_a,
                &fixture_b.shape,
                self.child_b,
                xf_a,
                xf_b,
            );
            return ContactUpdate {
                manifold: Manifold::default(),
                touching,
            };
        }

        let mut manifold = self
            .kind
            .evaluate(&fixture_a.shape, self.child_a, xf_a, &fixture_b.shape, xf_b);

        // Match old contact ids to new contact ids and copy the
        // stored impulses to warm start the solver.
        for mp2 in manifold.points.iter_mut().take(manifold.point_count) {
            mp2.normal_impulse = 0.0;
            mp2.tangent_impulse = 0.0;
            let key = mp2.id.key();

            if let Some(mp1) = self.manifold.points().iter().find(|mp1| mp1.id.key() == key) {
                mp2.normal_impulse = mp1.normal_impulse;
                mp2.tangent_impulse = mp1.tangent_impulse;
            }
        }

        ContactUpdate {
            touching: manifold.point_count > 0,
            manifold,
        }
    }

    /// Store an update and move between Pending and Touching.
    pub(crate) fn apply_update(&mut self, update: ContactUpdate) -> ContactTransition {
        let old_manifold = self.manifold;
        let was_touching = self.is_touching();

        // Re-enable this contact.
        self.enabled = true;
        self.manifold = update.manifold;
        self.state = if update.touching {
            ContactState::Touching
        } else {
            ContactState::Pending
        };

        ContactTransition {
            old_manifold,
            was_touching,
            touching: update.touching,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Arena, Handle, Index};
    use crate::fixture::FixtureDef;
    use crate::math::Vec2;

    fn make(
        shape_a: Shape,
        shape_b: Shape,
    ) -> (Arena<FixtureId, Fixture>, FixtureId, FixtureId) {
        let body = BodyId::from_index(Index {
            slot: 0,
            generation: 0,
        });
        let other = BodyId::from_index(Index {
            slot: 1,
            generation: 0,
        });
        let mut fixtures = Arena::new();
        let a = fixtures.insert(Fixture::new(body, &FixtureDef::new(shape_a).with_friction(0.4)));
        let b = fixtures.insert(Fixture::new(
            other,
            &FixtureDef::new(shape_b).with_friction(0.9).with_restitution(0.5),
        ));
        (fixtures, a, b)
    }

    #[test]
    fn test_resolve_registry() {
        use ShapeType::*;
        assert_eq!(
            ContactKind::resolve(Circle, Circle),
            Some((ContactKind::CircleCircle, false))
        );
        assert_eq!(
            ContactKind::resolve(Circle, Polygon),
            Some((ContactKind::PolygonCircle, true))
        );
        assert_eq!(
            ContactKind::resolve(Polygon, Edge),
            Some((ContactKind::EdgePolygon, true))
        );
        assert_eq!(
            ContactKind::resolve(Circle, Chain),
            Some((ContactKind::ChainCircle, true))
        );
        assert_eq!(ContactKind::resolve(Edge, Edge), None);
        assert_eq!(ContactKind::resolve(Chain, Edge), None);
        assert_eq!(ContactKind::resolve(Chain, Chain), None);
    }

    #[test]
    fn test_mixing_on_creation() {
        let (fixtures, a, b) = make(
            Shape::circle(Vec2::ZERO, 0.5).unwrap(),
            Shape::circle(Vec2::ZERO, 0.5).unwrap(),
        );
        let c = Contact::new(
            ContactKind::CircleCircle,
            (a, 0, &fixtures[a]),
            (b, 0, &fixtures[b]),
        );
        assert!((c.friction() - (0.4f32 * 0.9).sqrt()).abs() < 1e-6);
        assert_eq!(c.restitution(), 0.5);
        assert_eq!(c.state(), ContactState::Pending);
    }

    #[test]
    fn test_update_transitions_and_warm_start_matching() {
        let (fixtures, a, b) = make(Shape::new_box(1.0, 1.0).unwrap(), Shape::new_box(0.5, 0.5).unwrap());
        let mut c = Contact::new(
            ContactKind::PolygonPolygon,
            (a, 0, &fixtures[a]),
            (b, 0, &fixtures[b]),
        );
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(0.0, 1.49), 0.0);

        let up = c.compute_update(&fixtures[a], &fixtures[b], &xf_a, &xf_b);
        let t = c.apply_update(up);
        assert!(!t.was_touching && t.touching);
        assert!(c.is_touching());

        // Pretend the solver stored impulses, then update again.
        c.manifold.points[0].normal_impulse = 3.0;
        c.manifold.points[1].normal_impulse = 4.0;
        let up = c.compute_update(&fixtures[a], &fixtures[b], &xf_a, &xf_b);
        c.apply_update(up);
        assert_eq!(c.manifold.points[0].normal_impulse, 3.0);
        assert_eq!(c.manifold.points[1].normal_impulse, 4.0);

        // Separate: back to pending.
        let far = Transform::new(Vec2::new(0.0, 5.0), 0.0);
        let up = c.compute_update(&fixtures[a], &fixtures[b], &xf_a, &far);
        let t = c.apply_update(up);
        assert!(t.was_touching && !t.touching);
        assert_eq!(c.state(), ContactState::Pending);
    }

    #[test]
    fn test_sensor_uses_overlap_only() {
        let body = BodyId::from_index(Index {
            slot: 0,
            generation: 0,
        });
        let mut fixtures: Arena<FixtureId, Fixture> = Arena::new();
        let a = fixtures.insert(Fixture::new(
            body,
            &FixtureDef::new(Shape::circle(Vec2::ZERO, 1.0).unwrap()).with_sensor(true),
        ));
        let b = fixtures.insert(Fixture::new(
            body,
            &FixtureDef::new(Shape::circle(Vec2::ZERO, 0.5).unwrap()),
        ));
        let mut c = Contact::new(
            ContactKind::CircleCircle,
            (a, 0, &fixtures[a]),
            (b, 0, &fixtures[b]),
        );
        assert!(c.is_sensor());
        let up = c.compute_update(
            &fixtures[a],
            &fixtures[b],
            &Transform::IDENTITY,
            &Transform::new(Vec2::new(1.2, 0.0), 0.0),
        );
        c.apply_update(up);
        assert!(c.is_touching());
        assert_eq!(c.manifold().point_count, 0);
    }
}
