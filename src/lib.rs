//! # ALICE-Physics2D
//!
//! **Deterministic Fixed-Timestep 2D Rigid-Body Physics**
//!
//! Bodies, fixtures, contacts and joints advanced by one fixed time step at
//! a time, with the same inputs always producing the same outputs.
//!
//! ## Features
//!
//! | Stage | Technique |
//! |-------|-----------|
//! | **Broad phase** | Dynamic AABB tree with fat AABBs, move buffer, sorted pairs |
//! | **Narrow phase** | Circle, polygon, edge and chain manifolds; GJK distance |
//! | **Contacts** | Persistent manifolds with feature-id warm starting |
//! | **Solver** | Sequential impulses, 2-point block solver, position correction |
//! | **Islands** | Constraint-graph flood fill, per-island sleeping |
//! | **Continuous** | Time of impact with sub-stepping for bullets and statics |
//! | **Joints** | Distance, friction, gear, motor, mouse, prismatic, pulley, revolute, rope, weld, wheel |
//!
//! ## Design Principles
//!
//! - **Deterministic**: slot-ordered arenas, sorted broad-phase pairs, a fixed
//!   listener order; the `parallel` feature produces identical results
//! - **Handles, not pointers**: generation-checked ids for every entity
//! - **Closed sum types**: shapes, contacts and joints dispatch by `match`
//!
//! ## Quick Start
//!
//! ```rust
//! use alice_physics2d::prelude::*;
//!
//! # fn main() -> PhysicsResult<()> {
//! let mut world = World::new(Vec2::new(0.0, -10.0));
//!
//! let ground = world.create_body(&BodyDef::fixed(Vec2::ZERO))?;
//! world.create_fixture(ground, &FixtureDef::new(Shape::new_box(20.0, 0.5)?))?;
//!
//! let ball = world.create_body(&BodyDef::dynamic(Vec2::new(0.0, 4.0)))?;
//! world.create_fixture(
//!     ball,
//!     &FixtureDef::new(Shape::circle(Vec2::ZERO, 0.5)?).with_density(1.0),
//! )?;
//!
//! for _ in 0..180 {
//!     world.step(1.0 / 60.0, 8, 3);
//! }
//!
//! // Resting on the ground.
//! let y = world.body(ball).map_or(0.0, |b| b.position().y);
//! assert!((y - 1.0).abs() < 0.05);
//! # Ok(())
//! # }
//! ```
//!
//! ## Events
//!
//! ```rust
//! use alice_physics2d::prelude::*;
//!
//! # fn main() -> PhysicsResult<()> {
//! let mut world = World::new(Vec2::new(0.0, -10.0));
//! let ground = world.create_body(&BodyDef::fixed(Vec2::ZERO))?;
//! world.create_fixture(ground, &FixtureDef::new(Shape::new_box(5.0, 0.5)?))?;
//! let crate_body = world.create_body(&BodyDef::dynamic(Vec2::new(0.0, 1.2)))?;
//! world.create_fixture(crate_body, &FixtureDef::new(Shape::new_box(0.5, 0.5)?).with_density(1.0))?;
//!
//! let mut touched = false;
//! for _ in 0..60 {
//!     world.step(1.0 / 60.0, 8, 3);
//!     touched |= world
//!         .drain_contact_events()
//!         .iter()
//!         .any(|e| e.event_type == ContactEventType::Begin);
//! }
//! assert!(touched);
//! # Ok(())
//! # }
//! ```

pub mod arena;
pub mod body;
pub mod broad_phase;
pub mod chain;
pub mod collide_circle;
pub mod collide_edge;
pub mod collide_polygon;
pub mod collision;
pub mod contact;
mod contact_manager;
mod contact_solver;
pub mod distance;
pub mod dynamic_bvh;
pub mod error;
pub mod event;
pub mod filter;
pub mod fixture;
mod island;
pub mod joint;
pub mod joint_distance;
pub mod joint_friction;
pub mod joint_gear;
pub mod joint_motor;
pub mod joint_mouse;
pub mod joint_prismatic;
pub mod joint_pulley;
pub mod joint_revolute;
pub mod joint_rope;
pub mod joint_weld;
pub mod joint_wheel;
pub mod math;
pub mod polygon;
pub mod query;
pub mod settings;
pub mod shape;
pub mod step;
pub mod time_of_impact;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::arena::{BodyId, ContactId, FixtureId, JointId};
    pub use crate::body::{Body, BodyDef, BodyType};
    pub use crate::chain::ChainShape;
    pub use crate::collision::{Aabb, Manifold, ManifoldType, RayCastInput, RayCastOutput, WorldManifold};
    pub use crate::contact::{Contact, ContactState};
    pub use crate::error::{PhysicsError, PhysicsResult};
    pub use crate::event::{
        ContactEvent, ContactEventType, ContactImpulse, ContactListener, DestructionListener,
        EventCollector,
    };
    pub use crate::filter::{ContactFilter, DefaultContactFilter, Filter};
    pub use crate::fixture::{Fixture, FixtureDef};
    pub use crate::joint::{Joint, JointDef, JointKind, JointType};
    pub use crate::joint_distance::{DistanceJoint, DistanceJointDef};
    pub use crate::joint_friction::{FrictionJoint, FrictionJointDef};
    pub use crate::joint_gear::{GearJoint, GearJointDef};
    pub use crate::joint_motor::{MotorJoint, MotorJointDef};
    pub use crate::joint_mouse::{MouseJoint, MouseJointDef};
    pub use crate::joint_prismatic::{PrismaticJoint, PrismaticJointDef};
    pub use crate::joint_pulley::{PulleyJoint, PulleyJointDef};
    pub use crate::joint_revolute::{RevoluteJoint, RevoluteJointDef};
    pub use crate::joint_rope::{RopeJoint, RopeJointDef, RopeState};
    pub use crate::joint_weld::{WeldJoint, WeldJointDef};
    pub use crate::joint_wheel::{WheelJoint, WheelJointDef};
    pub use crate::math::{Rot, Transform, Vec2};
    pub use crate::polygon::PolygonShape;
    pub use crate::query::RayHit;
    pub use crate::settings::WorldConfig;
    pub use crate::shape::{CircleShape, EdgeShape, MassData, Shape, ShapeType};
    pub use crate::step::Profile;
    pub use crate::world::World;
}

// Re-export main types at crate root
pub use prelude::*;

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::prelude::*;

    fn pyramid(world: &mut World, rows: usize) -> Vec<BodyId> {
        let ground = world.create_body(&BodyDef::fixed(Vec2::ZERO)).unwrap();
        world
            .create_fixture(ground, &FixtureDef::new(Shape::new_box(40.0, 0.5).unwrap()))
            .unwrap();

        let mut boxes = Vec::new();
        for row in 0..rows {
            for col in 0..rows - row {
                let x = col as f32 * 1.05 - (rows - row) as f32 * 0.525;
                let y = 1.0 + row as f32 * 1.0;
                let id = world.create_body(&BodyDef::dynamic(Vec2::new(x, y))).unwrap();
                world
                    .create_fixture(
                        id,
                        &FixtureDef::new(Shape::new_box(0.5, 0.5).unwrap())
                            .with_density(1.0)
                            .with_friction(0.6),
                    )
                    .unwrap();
                boxes.push(id);
            }
        }
        boxes
    }

    #[test]
    fn test_pyramid_settles_and_sleeps() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        let boxes = pyramid(&mut world, 5);
        let before: Vec<Vec2> = boxes.iter().map(|&b| world.body(b).unwrap().position()).collect();

        for _ in 0..600 {
            world.step(1.0 / 60.0, 8, 3);
        }

        for (&id, start) in boxes.iter().zip(&before) {
            let body = world.body(id).unwrap();
            assert!((body.position() - *start).length() < 0.1, "box drifted");
            assert!(!body.is_awake(), "pyramid should be asleep");
        }
    }

    #[test]
    fn test_identical_worlds_step_identically() {
        let mut a = World::new(Vec2::new(0.0, -10.0));
        let mut b = World::new(Vec2::new(0.0, -10.0));
        let boxes_a = pyramid(&mut a, 4);
        let boxes_b = pyramid(&mut b, 4);

        for _ in 0..120 {
            a.step(1.0 / 60.0, 8, 3);
            b.step(1.0 / 60.0, 8, 3);
        }

        for (&ia, &ib) in boxes_a.iter().zip(&boxes_b) {
            let (ba, bb) = (a.body(ia).unwrap(), b.body(ib).unwrap());
            assert_eq!(ba.position().x.to_bits(), bb.position().x.to_bits());
            assert_eq!(ba.position().y.to_bits(), bb.position().y.to_bits());
            assert_eq!(ba.angle().to_bits(), bb.angle().to_bits());
        }
    }

    #[test]
    fn test_zero_dt_only_updates_contacts() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        let boxes = pyramid(&mut world, 2);
        let before = world.body(boxes[0]).unwrap().position();
        world.step(0.0, 8, 3);
        assert_eq!(world.body(boxes[0]).unwrap().position(), before);
        assert!(world.contact_count() > 0);
    }
}
