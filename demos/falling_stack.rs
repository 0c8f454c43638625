//! Falling Stack Example
//!
//! Drops a column of boxes and a few balls onto the ground, steps until the
//! pile falls asleep, and prints contact events along the way.
//!
//! ```bash
//! cargo run --example falling_stack
//! ```

use alice_physics2d::prelude::*;

fn main() -> PhysicsResult<()> {
    let mut world = World::new(Vec2::new(0.0, -10.0));

    // Static ground
    let ground = world.create_body(&BodyDef::fixed(Vec2::ZERO))?;
    world.create_fixture(ground, &FixtureDef::new(Shape::new_box(20.0, 0.5)?))?;

    // A column of boxes
    let mut boxes = Vec::new();
    for i in 0..8 {
        let body = world.create_body(&BodyDef::dynamic(Vec2::new(0.0, 1.0 + i as f32 * 1.1)))?;
        world.create_fixture(
            body,
            &FixtureDef::new(Shape::new_box(0.5, 0.5)?)
                .with_density(1.0)
                .with_friction(0.6),
        )?;
        boxes.push(body);
    }

    // Bouncy balls dropped beside the column
    for i in 0..3 {
        let body = world.create_body(&BodyDef::dynamic(Vec2::new(-3.0 + i as f32 * 3.0, 12.0)))?;
        world.create_fixture(
            body,
            &FixtureDef::new(Shape::circle(Vec2::ZERO, 0.4)?)
                .with_density(2.0)
                .with_restitution(0.5),
        )?;
    }

    println!("ALICE-Physics2D: falling stack");
    println!("bodies: {}", world.body_count());

    let dt = 1.0 / 60.0;
    for frame in 0..600 {
        world.step(dt, 8, 3);

        for event in world.drain_contact_events() {
            if event.event_type == ContactEventType::Begin {
                println!("frame {frame:3}: {:?} touched {:?}", event.body_a, event.body_b);
            }
        }

        if world.bodies().all(|(_, b)| !b.is_awake()) {
            println!("everything asleep after {frame} frames");
            break;
        }
    }

    for (i, &id) in boxes.iter().enumerate() {
        if let Some(body) = world.body(id) {
            let p = body.position();
            println!("box {i}: ({:.3}, {:.3}) angle {:.3}", p.x, p.y, body.angle());
        }
    }

    let profile = world.profile();
    println!(
        "last step: {:.3} ms (collide {:.3}, solve {:.3})",
        profile.step, profile.collide, profile.solve
    );
    Ok(())
}
