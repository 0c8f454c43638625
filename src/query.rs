//! World Queries
//!
//! Spatial queries for game logic: AABB overlap, ray casts and point tests.
//! The broad-phase tree culls candidates; fixtures answer exactly.
//!
//! # Features
//!
//! - `query_aabb`: fixtures whose fat AABB overlaps a box
//! - `ray_cast`: every hit along a segment, with fraction clipping
//! - `ray_cast_closest`: the nearest hit only
//! - `query_point`: fixtures containing a point

use crate::arena::FixtureId;
use crate::collision::{Aabb, RayCastInput};
use crate::math::Vec2;
use crate::world::World;

/// A ray cast hit reported to the callback.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Fixture that was hit
    pub fixture: FixtureId,
    /// World-space hit point
    pub point: Vec2,
    /// Surface normal at the hit point
    pub normal: Vec2,
    /// Fraction along `p2 - p1`
    pub fraction: f32,
}

impl World {
    /// Report every fixture whose broad-phase AABB overlaps `aabb`.
    /// Return `false` from the callback to stop early.
    ///
    /// Candidates are reported in tree order; the fat AABBs make this a
    /// conservative test.
    pub fn query_aabb<F: FnMut(FixtureId) -> bool>(&self, aabb: &Aabb, mut callback: F) {
        let broad_phase = self.broad_phase();
        broad_phase.query(aabb, |proxy_id| match broad_phase.user_data(proxy_id) {
            Some(key) => callback(key.fixture),
            None => true,
        });
    }

    /// Cast a ray from `p1` to `p2` against every fixture.
    ///
    /// The callback return value controls the cast:
    /// - `-1`: ignore this fixture and continue
    /// - `0`: terminate
    /// - `fraction`: clip the ray to this hit and continue
    /// - `1`: continue without clipping
    ///
    /// Hits arrive in no particular order.
    pub fn ray_cast<F: FnMut(RayHit) -> f32>(&self, p1: Vec2, p2: Vec2, mut callback: F) {
        let broad_phase = self.broad_phase();
        let input = RayCastInput {
            p1,
            p2,
            max_fraction: 1.0,
        };
        broad_phase.ray_cast(&input, |sub_input, proxy_id| {
            let Some(key) = broad_phase.user_data(proxy_id) else {
                return sub_input.max_fraction;
            };
            let Some(fixture) = self.fixture(key.fixture) else {
                return sub_input.max_fraction;
            };
            let Some(body) = self.body(fixture.body()) else {
                return sub_input.max_fraction;
            };
            match fixture.ray_cast(sub_input, body.transform(), key.child) {
                Some(output) => {
                    let fraction = output.fraction;
                    callback(RayHit {
                        fixture: key.fixture,
                        point: p1 * (1.0 - fraction) + p2 * fraction,
                        normal: output.normal,
                        fraction,
                    })
                }
                None => sub_input.max_fraction,
            }
        });
    }

    /// Nearest fixture hit by the segment `p1 -> p2`, if any.
    #[must_use]
    pub fn ray_cast_closest(&self, p1: Vec2, p2: Vec2) -> Option<RayHit> {
        let mut closest: Option<RayHit> = None;
        self.ray_cast(p1, p2, |hit| {
            closest = Some(hit);
            hit.fraction
        });
        closest
    }

    /// Every fixture whose shape contains `point`. Edge and chain shapes
    /// never contain a point.
    #[must_use]
    pub fn query_point(&self, point: Vec2) -> Vec<FixtureId> {
        let probe = Aabb::from_center(point, Vec2::new(f32::EPSILON, f32::EPSILON));
        let mut found = Vec::new();
        self.query_aabb(&probe, |id| {
            let hit = self.fixture(id).is_some_and(|fixture| {
                self.body(fixture.body())
                    .is_some_and(|body| fixture.test_point(body.transform(), point))
            });
            // A multi-child fixture may be reported once per child.
            if hit && !found.contains(&id) {
                found.push(id);
            }
            true
        });
        found.sort();
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDef;
    use crate::fixture::FixtureDef;
    use crate::shape::Shape;

    fn scene() -> (World, FixtureId, FixtureId) {
        let mut world = World::new(Vec2::ZERO);
        let left = world.create_body(&BodyDef::fixed(Vec2::new(-3.0, 0.0))).unwrap();
        let right = world.create_body(&BodyDef::fixed(Vec2::new(3.0, 0.0))).unwrap();
        let a = world
            .create_fixture(left, &FixtureDef::new(Shape::new_box(1.0, 1.0).unwrap()))
            .unwrap();
        let b = world
            .create_fixture(right, &FixtureDef::new(Shape::circle(Vec2::ZERO, 1.0).unwrap()))
            .unwrap();
        (world, a, b)
    }

    #[test]
    fn test_ray_cast_closest_hits_near_face() {
        let (world, a, _) = scene();
        let hit = world
            .ray_cast_closest(Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0))
            .unwrap();
        assert_eq!(hit.fixture, a);
        assert!((hit.point.x + 4.0).abs() < 1e-4, "x = {}", hit.point.x);
        assert!((hit.normal.x + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_ray_cast_from_other_side() {
        let (world, _, b) = scene();
        let hit = world
            .ray_cast_closest(Vec2::new(10.0, 0.0), Vec2::new(-10.0, 0.0))
            .unwrap();
        assert_eq!(hit.fixture, b);
        assert!((hit.point.x - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_ray_cast_all_hits() {
        let (world, a, b) = scene();
        let mut hits = Vec::new();
        world.ray_cast(Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0), |hit| {
            hits.push(hit.fixture);
            1.0
        });
        hits.sort();
        assert_eq!(hits, vec![a, b]);
    }

    #[test]
    fn test_ray_cast_terminate() {
        let (world, _, _) = scene();
        let mut count = 0;
        world.ray_cast(Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0), |_| {
            count += 1;
            0.0
        });
        assert_eq!(count, 1);
    }

    #[test]
    fn test_ray_cast_miss() {
        let (world, _, _) = scene();
        assert!(world
            .ray_cast_closest(Vec2::new(-10.0, 5.0), Vec2::new(10.0, 5.0))
            .is_none());
    }

    #[test]
    fn test_query_aabb() {
        let (world, a, _) = scene();
        let mut found = Vec::new();
        world.query_aabb(&Aabb::from_center(Vec2::new(-3.0, 0.0), Vec2::new(0.5, 0.5)), |id| {
            found.push(id);
            true
        });
        assert_eq!(found, vec![a]);
    }

    #[test]
    fn test_query_point() {
        let (world, a, b) = scene();
        assert_eq!(world.query_point(Vec2::new(-3.5, 0.5)), vec![a]);
        assert_eq!(world.query_point(Vec2::new(3.0, 0.9)), vec![b]);
        assert!(world.query_point(Vec2::ZERO).is_empty());
        // Inside the box's fat AABB but outside the circle.
        assert!(world.query_point(Vec2::new(3.95, 0.95)).is_empty());
    }
}
