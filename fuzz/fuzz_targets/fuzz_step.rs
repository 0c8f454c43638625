#![no_main]
use alice_physics2d::{BodyDef, FixtureDef, Shape, Vec2, World};
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzBody {
    /// Position components (i8 keeps bodies near each other)
    x: i8,
    y: i8,
    angle: i8,
    /// 0: circle, 1: box, 2: edge, otherwise polygon from `points`
    shape: u8,
    size: u8,
    points: Vec<(i8, i8)>,
    bullet: bool,
    kinematic: bool,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    bodies: Vec<FuzzBody>,
    /// Number of simulation steps (capped)
    step_count: u8,
    /// Body to destroy halfway through
    destroy: Option<u8>,
}

fn make_shape(body: &FuzzBody) -> Option<Shape> {
    let size = f32::from(body.size % 32 + 1) * 0.1;
    match body.shape % 4 {
        0 => Shape::circle(Vec2::ZERO, size).ok(),
        1 => Shape::new_box(size, size * 0.5).ok(),
        2 => Shape::edge(Vec2::new(-size, 0.0), Vec2::new(size, 0.0)).ok(),
        _ => {
            let points: Vec<Vec2> = body
                .points
                .iter()
                .map(|&(x, y)| Vec2::new(f32::from(x) * 0.1, f32::from(y) * 0.1))
                .collect();
            // Invalid outlines must be rejected, never panic.
            Shape::polygon(&points).ok()
        }
    }
}

// Build a random world and step it. Must never panic regardless of input.
fuzz_target!(|input: FuzzInput| {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let mut ids = Vec::new();

    for body in input.bodies.iter().take(32) {
        let position = Vec2::new(f32::from(body.x) * 0.5, f32::from(body.y) * 0.5);
        let def = if body.kinematic {
            BodyDef::kinematic(position)
        } else {
            BodyDef::dynamic(position)
        }
        .with_angle(f32::from(body.angle) * 0.05)
        .with_bullet(body.bullet);

        let Ok(id) = world.create_body(&def) else {
            continue;
        };
        if let Some(shape) = make_shape(body) {
            let _ = world.create_fixture(id, &FixtureDef::new(shape).with_density(1.0));
        }
        ids.push(id);
    }

    let steps = usize::from(input.step_count).min(64);
    for i in 0..steps {
        if i == steps / 2 {
            if let Some(index) = input.destroy {
                if let Some(&id) = ids.get(usize::from(index)) {
                    let _ = world.destroy_body(id);
                }
            }
        }
        world.step(1.0 / 60.0, 8, 3);
    }
});
