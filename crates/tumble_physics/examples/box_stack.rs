//! Box stack demonstration
//!
//! This example shows:
//! - Building a world with a ground plane
//! - Stacking boxes and letting them settle
//! - Listening to contact and sleep events on a channel
//! - Casting a ray down onto the stack
//!
//! Run with `RUST_LOG=tumble_physics=debug` to see the engine's own logging.

use std::f64::consts::FRAC_PI_2;

use tumble_physics::prelude::*;

fn main() -> tumble_physics::Result<()> {
    // Initialize logging
    env_logger::init();

    println!("Box Stack Demo");
    println!("==============\n");

    let mut world = World::new(WorldConfig::default())?;
    let events = world.subscribe();

    world.add_body(
        BodyDesc::fixed()
            .with_quaternion(Quat::from_rotation_x(-FRAC_PI_2))
            .with_shape(Shape::plane()),
    );

    let boxes: Vec<BodyId> = (0..5)
        .map(|level| {
            world.add_body(
                BodyDesc::dynamic(1.0)
                    .with_position(0.0, 0.5 + 1.05 * level as f64, 0.0)
                    .with_shape(Shape::cuboid(Vec3::splat(0.5))),
            )
        })
        .collect();

    let mut steps = 0;
    while world.has_active_bodies() || steps == 0 {
        world.step(1.0 / 60.0, None, None)?;
        steps += 1;

        for event in events.try_iter() {
            match event {
                PhysicsEvent::BeginContact { body_a, body_b } => {
                    println!("[{:>4}] contact   {:?} <-> {:?}", steps, body_a, body_b);
                }
                PhysicsEvent::Sleep { body } => println!("[{:>4}] sleeping  {:?}", steps, body),
                _ => {}
            }
        }
        if steps >= 1200 {
            println!("Stack did not settle after {} steps", steps);
            break;
        }
    }

    println!("\nFinal heights after {:.2}s:", world.time());
    for id in &boxes {
        if let Some(body) = world.body(*id) {
            println!("  {:?}: y = {:.4} ({:?})", id, body.position().y, body.sleep_state());
        }
    }

    let top = world.raycast_closest(
        Vec3::new(0.1, 20.0, 0.1),
        Vec3::new(0.1, -1.0, 0.1),
        &RaycastOptions::default(),
    );
    if let Some(hit) = top {
        println!("\nRay hit {:?} at y = {:.4}", hit.body, hit.hit_point_world.y);
    }

    Ok(())
}
