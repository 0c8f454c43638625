//! Pendulum Chain Example
//!
//! Hangs a chain of capsule-like links from a static anchor with revolute
//! joints, caps the stretch with a rope joint, and swings it.
//!
//! ```bash
//! cargo run --example pendulum_chain
//! ```

use alice_physics2d::prelude::*;

const LINKS: usize = 10;

fn main() -> PhysicsResult<()> {
    let mut world = World::new(Vec2::new(0.0, -10.0));

    let anchor = world.create_body(&BodyDef::fixed(Vec2::new(0.0, 20.0)))?;
    let link_shape = Shape::new_box(0.5, 0.125)?;

    // Links laid out horizontally so the chain starts swinging.
    let mut previous = anchor;
    let mut last = anchor;
    for i in 0..LINKS {
        let link = world.create_body(&BodyDef::dynamic(Vec2::new(0.5 + i as f32, 20.0)))?;
        world.create_fixture(
            link,
            &FixtureDef::new(link_shape.clone())
                .with_density(20.0)
                .with_friction(0.2),
        )?;
        let pivot = Vec2::new(i as f32, 20.0);
        world.create_joint(RevoluteJointDef::initialize(&world, previous, link, pivot)?)?;
        previous = link;
        last = link;
    }

    // The rope keeps the tip within the chain length of the anchor.
    let mut rope = RopeJointDef::new(anchor, last);
    rope.local_anchor_a = Vec2::ZERO;
    rope.local_anchor_b = Vec2::new(0.5, 0.0);
    rope.max_length = LINKS as f32;
    world.create_joint(rope)?;

    println!("ALICE-Physics2D: pendulum chain");
    println!("bodies: {}, joints: {}", world.body_count(), world.joint_count());

    let dt = 1.0 / 60.0;
    for frame in 0..=300 {
        if frame % 30 == 0 {
            if let Some(tip) = world.body(last) {
                let p = tip.world_point(Vec2::new(0.5, 0.0));
                let reach = (p - Vec2::new(0.0, 20.0)).length();
                println!(
                    "t = {:.2}s tip ({:.3}, {:.3}) reach {:.3} speed {:.3}",
                    frame as f32 * dt,
                    p.x,
                    p.y,
                    reach,
                    tip.linear_velocity().length()
                );
            }
        }
        world.step(dt, 8, 3);
    }
    Ok(())
}
