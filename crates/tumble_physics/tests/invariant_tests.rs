//! Invariant tests for tumble_physics
//!
//! These tests verify properties the simulation must keep on every step

use std::f64::consts::FRAC_PI_2;

use tumble_physics::prelude::*;

fn ground() -> BodyDesc {
    BodyDesc::fixed()
        .with_quaternion(Quat::from_rotation_x(-FRAC_PI_2))
        .with_shape(Shape::plane())
}

/// INVARIANT: Only dynamic bodies with positive mass have an inverse mass
#[test]
fn invariant_inverse_mass_matches_type() {
    let mut world = World::default();
    let dynamic = world.add_body(BodyDesc::dynamic(4.0).with_shape(Shape::sphere(1.0)));
    let fixed = world.add_body(BodyDesc::fixed().with_shape(Shape::sphere(1.0)));
    let kinematic = world.add_body(BodyDesc::kinematic().with_mass(3.0).with_shape(Shape::sphere(1.0)));

    assert_eq!(world.body(dynamic).unwrap().inv_mass(), 0.25);
    assert_eq!(world.body(fixed).unwrap().inv_mass(), 0.0);
    assert_eq!(world.body(kinematic).unwrap().inv_mass(), 0.0);

    world.body_mut(dynamic).unwrap().set_mass(2.0);
    assert_eq!(world.body(dynamic).unwrap().inv_mass(), 0.5);
}

/// INVARIANT: Orientations stay unit length when renormalized every step
#[test]
fn invariant_quaternions_stay_normalized() {
    let mut world = World::new(WorldConfig::default().with_gravity(0.0, 0.0, 0.0)).unwrap();
    for i in 0..5 {
        let spin = 3.0 + i as f64;
        world.add_body(
            BodyDesc::dynamic(1.0)
                .with_position(i as f64 * 3.0, 0.0, 0.0)
                .with_angular_velocity(spin, -0.5 * spin, 0.25 * spin)
                .with_allow_sleep(false)
                .with_shape(Shape::cuboid(Vec3::new(0.5, 0.2, 0.8))),
        );
    }

    for _ in 0..300 {
        world.step(1.0 / 60.0, None, None).unwrap();
        for body in world.bodies() {
            assert!((body.quaternion().length() - 1.0).abs() < 1e-5);
        }
    }
}

/// INVARIANT: Adding then removing a body restores a contiguous body list
#[test]
fn invariant_add_remove_reindexes() {
    let mut world = World::default();
    let ids: Vec<BodyId> = (0..4)
        .map(|i| world.add_body(BodyDesc::dynamic(1.0).with_position(i as f64 * 2.0, 0.0, 0.0).with_shape(Shape::sphere(0.5))))
        .collect();

    let extra = world.add_body(BodyDesc::dynamic(1.0).with_shape(Shape::sphere(0.5)));
    assert_eq!(world.body_count(), 5);
    assert!(world.remove_body(extra).is_some());
    assert_eq!(world.body_count(), 4);

    world.remove_body(ids[1]).unwrap();
    for (i, body) in world.bodies().iter().enumerate() {
        assert_eq!(body.index(), i);
        assert_eq!(world.body_index(body.id()), Some(i));
    }
    assert_eq!(world.bodies().iter().map(Body::id).collect::<Vec<_>>(), vec![ids[0], ids[2], ids[3]]);

    // Stepping after removal must not touch stale indices
    world.step(1.0 / 60.0, None, None).unwrap();
}

/// INVARIANT: Two static bodies are never paired
#[test]
fn invariant_static_bodies_never_collide() {
    let mut world = World::default();
    world.add_body(BodyDesc::fixed().with_shape(Shape::cuboid(Vec3::splat(1.0))));
    world.add_body(BodyDesc::fixed().with_position(0.5, 0.0, 0.0).with_shape(Shape::cuboid(Vec3::splat(1.0))));
    world.add_body(ground());

    for _ in 0..10 {
        world.step(1.0 / 60.0, None, None).unwrap();
        assert_eq!(world.contact_count(), 0);
    }
    assert!(!world.has_active_bodies());
}

/// INVARIANT: Overlapping bounding spheres with separated hulls give no contacts
#[test]
fn invariant_separated_hulls_have_no_contacts() {
    let mut world = World::new(WorldConfig::default().with_gravity(0.0, 0.0, 0.0)).unwrap();
    world.add_body(BodyDesc::dynamic(1.0).with_shape(Shape::cuboid(Vec3::splat(0.5))));
    world.add_body(
        BodyDesc::dynamic(1.0)
            .with_position(1.2, 0.0, 0.0)
            .with_quaternion(Quat::from_rotation_x(0.3))
            .with_shape(Shape::cuboid(Vec3::splat(0.5))),
    );

    world.step(1.0 / 60.0, None, None).unwrap();
    assert_eq!(world.contact_count(), 0);
    assert!(world.events().collisions().next().is_none());
}

/// INVARIANT: Sleeping bodies are not moved by gravity
#[test]
fn invariant_sleeping_bodies_do_not_move() {
    let mut world = World::default();
    let id = world.add_body(BodyDesc::dynamic(1.0).with_position(0.0, 5.0, 0.0).with_shape(Shape::sphere(0.5)));
    world.sleep(id).unwrap();

    for _ in 0..30 {
        world.step(1.0 / 60.0, None, None).unwrap();
    }
    let body = world.body(id).unwrap();
    assert_eq!(body.sleep_state(), SleepState::Sleeping);
    assert_eq!(body.position(), Vec3::new(0.0, 5.0, 0.0));
    assert!(!world.has_active_bodies());
}

/// INVARIANT: Unknown ids are reported, not ignored
#[test]
fn invariant_unknown_body_is_an_error() {
    let mut world = World::default();
    let id = world.add_body(BodyDesc::dynamic(1.0).with_shape(Shape::sphere(0.5)));
    world.remove_body(id);

    assert!(world.body(id).is_none());
    assert!(matches!(world.sleep(id), Err(PhysicsError::BodyNotFound(b)) if b == id));
    assert!(world.shape(id, ShapeId(0)).is_none());
}
