//! Fixtures
//!
//! A fixture binds a [`Shape`] to a body with material properties and
//! collision filtering. Each child of the shape (every edge of a chain, the
//! single primitive otherwise) owns one broad-phase proxy.

use crate::arena::{BodyId, FixtureId};
use crate::broad_phase::{BroadPhase, ProxyId};
use crate::collision::{Aabb, RayCastInput, RayCastOutput};
use crate::dynamic_bvh::NULL_NODE;
use crate::error::{PhysicsError, PhysicsResult};
use crate::filter::Filter;
use crate::math::{is_valid, Transform, Vec2};
use crate::settings::DEFAULT_RESTITUTION_THRESHOLD;
use crate::shape::{MassData, Shape};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Payload stored in the broad phase: which fixture child a proxy is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixtureProxyKey {
    /// Owning fixture
    pub fixture: FixtureId,
    /// Child index within the fixture's shape
    pub child: usize,
}

/// Broad-phase proxy of one shape child.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixtureProxy {
    /// Tight AABB swept over the last step
    pub aabb: Aabb,
    /// Child index within the shape
    pub child_index: usize,
    /// Proxy in the broad phase
    pub proxy_id: ProxyId,
}

/// Fixture definition.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FixtureDef {
    /// Shape, cloned into the fixture
    pub shape: Shape,
    /// Density in kg/m²
    pub density: f32,
    /// Coulomb friction coefficient, usually in [0, 1]
    pub friction: f32,
    /// Restitution (bounciness), usually in [0, 1]
    pub restitution: f32,
    /// Approach speed above which restitution applies (m/s)
    pub restitution_threshold: f32,
    /// Sensors report overlaps but never produce a collision response
    pub is_sensor: bool,
    /// Collision filter
    pub filter: Filter,
    /// Application data
    pub user_data: u64,
}

impl FixtureDef {
    /// Definition with default material (friction 0.2, no bounce, zero
    /// density).
    #[must_use]
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            density: 0.0,
            friction: 0.2,
            restitution: 0.0,
            restitution_threshold: DEFAULT_RESTITUTION_THRESHOLD,
            is_sensor: false,
            filter: Filter::DEFAULT,
            user_data: 0,
        }
    }

    /// Set density.
    #[must_use]
    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    /// Set friction.
    #[must_use]
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    /// Set restitution.
    #[must_use]
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    /// Set the restitution threshold.
    #[must_use]
    pub fn with_restitution_threshold(mut self, threshold: f32) -> Self {
        self.restitution_threshold = threshold;
        self
    }

    /// Mark as sensor.
    #[must_use]
    pub fn with_sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    /// Set the collision filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Attach application data.
    #[must_use]
    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }

    /// Reject negative or non-finite material values.
    pub fn validate(&self) -> PhysicsResult<()> {
        let values = [
            self.density,
            self.friction,
            self.restitution,
            self.restitution_threshold,
        ];
        if values.iter().any(|v| !is_valid(*v) || *v < 0.0) {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "fixture material values must be finite and non-negative",
            });
        }
        Ok(())
    }
}

/// A shape attached to a body.
#[derive(Clone, Debug)]
pub struct Fixture {
    pub(crate) body: BodyId,
    pub(crate) shape: Shape,
    pub(crate) density: f32,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) restitution_threshold: f32,
    pub(crate) is_sensor: bool,
    pub(crate) filter: Filter,
    pub(crate) proxies: Vec<FixtureProxy>,
    pub(crate) user_data: u64,
}

impl Fixture {
    pub(crate) fn new(body: BodyId, def: &FixtureDef) -> Self {
        Self {
            body,
            shape: def.shape.clone(),
            density: def.density,
            friction: def.friction,
            restitution: def.restitution,
            restitution_threshold: def.restitution_threshold,
            is_sensor: def.is_sensor,
            filter: def.filter,
            proxies: Vec::new(),
            user_data: def.user_data,
        }
    }

    /// Owning body.
    #[inline]
    #[must_use]
    pub fn body(&self) -> BodyId {
        self.body
    }

    /// Shape.
    #[inline]
    #[must_use]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Whether this fixture is a sensor.
    #[inline]
    #[must_use]
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    /// Collision filter.
    #[inline]
    #[must_use]
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Density (kg/m²).
    #[inline]
    #[must_use]
    pub fn density(&self) -> f32 {
        self.density
    }

    /// Set density. Call [`crate::World::reset_mass_data`] afterwards.
    #[inline]
    pub fn set_density(&mut self, density: f32) {
        self.density = density;
    }

    /// Friction coefficient.
    #[inline]
    #[must_use]
    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Set friction. Existing contacts keep their mixed value.
    #[inline]
    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    /// Restitution.
    #[inline]
    #[must_use]
    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    /// Set restitution. Existing contacts keep their mixed value.
    #[inline]
    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution;
    }

    /// Restitution threshold.
    #[inline]
    #[must_use]
    pub fn restitution_threshold(&self) -> f32 {
        self.restitution_threshold
    }

    /// Set the restitution threshold.
    #[inline]
    pub fn set_restitution_threshold(&mut self, threshold: f32) {
        self.restitution_threshold = threshold;
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

    /// Mass properties of the shape at this fixture's density.
    #[must_use]
    pub fn mass_data(&self) -> MassData {
        self.shape.compute_mass(self.density)
    }

    /// Whether a world point lies inside, given the body transform.
    #[must_use]
    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        self.shape.test_point(xf, p)
    }

    /// Ray cast one child, given the body transform.
    #[must_use]
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: &Transform,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        self.shape.ray_cast(input, xf, child_index)
    }

    /// AABB of one child as last synchronized with the broad phase. This
    /// covers the swept motion of the last step.
    #[must_use]
    pub fn aabb(&self, child_index: usize) -> Option<Aabb> {
        self.proxies.get(child_index).map(|p| p.aabb)
    }

    /// Broad-phase proxies, one per child.
    #[inline]
    #[must_use]
    pub fn proxies(&self) -> &[FixtureProxy] {
        &self.proxies
    }

    // ========================================================================
    // Broad-phase plumbing
    // ========================================================================

    pub(crate) fn create_proxies(
        &mut self,
        broad_phase: &mut BroadPhase<FixtureProxyKey>,
        xf: &Transform,
        id: FixtureId,
    ) {
        debug_assert!(self.proxies.is_empty());
        for child_index in 0..self.shape.child_count() {
            let aabb = self.shape.compute_aabb(xf, child_index);
            let proxy_id = broad_phase.create_proxy(
                &aabb,
                FixtureProxyKey {
                    fixture: id,
                    child: child_index,
                },
            );
            self.proxies.push(FixtureProxy {
                aabb,
                child_index,
                proxy_id,
            });
        }
    }

    pub(crate) fn destroy_proxies(&mut self, broad_phase: &mut BroadPhase<FixtureProxyKey>) {
        for proxy in &mut self.proxies {
            broad_phase.destroy_proxy(proxy.proxy_id);
            proxy.proxy_id = NULL_NODE;
        }
        self.proxies.clear();
    }

    /// Move the proxies to cover the motion from `xf1` to `xf2`.
    pub(crate) fn synchronize(
        &mut self,
        broad_phase: &mut BroadPhase<FixtureProxyKey>,
        xf1: &Transform,
        xf2: &Transform,
    ) {
        for proxy in &mut self.proxies {
            // Compute an AABB that covers the swept shape (may miss some rotation effect).
            let aabb1 = self.shape.compute_aabb(xf1, proxy.child_index);
            let aabb2 = self.shape.compute_aabb(xf2, proxy.child_index);
            proxy.aabb = aabb1.union(&aabb2);

            let displacement = aabb2.center() - aabb1.center();
            broad_phase.move_proxy(proxy.proxy_id, &proxy.aabb, displacement);
        }
    }

    /// Force re-pairing of all proxies on the next pair update.
    pub(crate) fn touch_proxies(&self, broad_phase: &mut BroadPhase<FixtureProxyKey>) {
        for proxy in &self.proxies {
            broad_phase.touch_proxy(proxy.proxy_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Arena, Handle, Index};
    use crate::chain::ChainShape;

    fn body_id() -> BodyId {
        BodyId::from_index(Index {
            slot: 0,
            generation: 0,
        })
    }

    #[test]
    fn test_def_defaults_and_validation() {
        let def = FixtureDef::new(Shape::circle(Vec2::ZERO, 0.5).unwrap());
        assert_eq!(def.friction, 0.2);
        assert_eq!(def.restitution_threshold, DEFAULT_RESTITUTION_THRESHOLD);
        assert!(def.validate().is_ok());
        assert!(def.clone().with_friction(-1.0).validate().is_err());
        assert!(def.with_density(f32::INFINITY).validate().is_err());
    }

    #[test]
    fn test_chain_gets_one_proxy_per_edge() {
        let chain = ChainShape::new_loop(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(4.0, 4.0),
            Vec2::new(0.0, 4.0),
        ])
        .unwrap();
        let mut fixtures: Arena<FixtureId, Fixture> = Arena::new();
        let id = fixtures.insert(Fixture::new(body_id(), &FixtureDef::new(chain)));
        let mut bp = BroadPhase::new();
        fixtures[id].create_proxies(&mut bp, &Transform::IDENTITY, id);
        assert_eq!(fixtures[id].proxies().len(), 4);
        assert_eq!(bp.proxy_count(), 4);

        fixtures[id].destroy_proxies(&mut bp);
        assert_eq!(bp.proxy_count(), 0);
        assert!(fixtures[id].proxies().is_empty());
    }

    #[test]
    fn test_synchronize_covers_sweep() {
        let mut fixtures: Arena<FixtureId, Fixture> = Arena::new();
        let def = FixtureDef::new(Shape::circle(Vec2::ZERO, 0.5).unwrap());
        let id = fixtures.insert(Fixture::new(body_id(), &def));
        let mut bp = BroadPhase::new();
        fixtures[id].create_proxies(&mut bp, &Transform::IDENTITY, id);

        let xf2 = Transform::new(Vec2::new(3.0, 0.0), 0.0);
        fixtures[id].synchronize(&mut bp, &Transform::IDENTITY, &xf2);
        let aabb = fixtures[id].aabb(0).unwrap();
        assert!(aabb.lower.x <= -0.5 && aabb.upper.x >= 3.5);
        assert!(bp.fat_aabb(fixtures[id].proxies()[0].proxy_id).contains(&aabb));
    }
}
