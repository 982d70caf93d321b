//! Broadphase pair culling

use tumble_math::AABB;

use crate::body::{Body, SleepState};
use crate::config::BroadphaseMode;

/// Produces candidate body pairs for the narrowphase
pub trait Broadphase: Send {
    /// Fill `pairs_a`/`pairs_b` with the indices of possibly colliding bodies.
    /// Both lists are cleared first.
    fn collision_pairs(&mut self, bodies: &mut [Body], pairs_a: &mut Vec<usize>, pairs_b: &mut Vec<usize>);

    /// Indices of the bodies whose world bounds intersect `aabb`
    fn aabb_query(&self, bodies: &[Body], aabb: &AABB, result: &mut Vec<usize>);
}

/// True unless filtering or immobility rules the pair out
pub fn need_broadphase_collision(a: &Body, b: &Body) -> bool {
    if !a.filter.can_collide(&b.filter) {
        return false;
    }
    let immovable = |body: &Body| body.is_static() || body.sleep_state() == SleepState::Sleeping;
    !(immovable(a) && immovable(b))
}

/// Tests every pair of bodies
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveBroadphase {
    pub mode: BroadphaseMode,
}

impl NaiveBroadphase {
    pub fn new(mode: BroadphaseMode) -> Self {
        Self { mode }
    }

    fn intersection_test(&self, a: &Body, b: &Body) -> bool {
        match self.mode {
            BroadphaseMode::BoundingSphere => {
                let r = a.bounding_radius() + b.bounding_radius();
                a.position().distance_squared(b.position()) < r * r
            }
            BroadphaseMode::Aabb => a.aabb().intersects(&b.aabb()),
        }
    }
}

impl Broadphase for NaiveBroadphase {
    fn collision_pairs(&mut self, bodies: &mut [Body], pairs_a: &mut Vec<usize>, pairs_b: &mut Vec<usize>) {
        pairs_a.clear();
        pairs_b.clear();

        if self.mode == BroadphaseMode::Aabb {
            for body in bodies.iter_mut().filter(|b| b.aabb_needs_update()) {
                body.update_aabb();
            }
        }

        for i in 0..bodies.len() {
            for j in 0..i {
                let (bi, bj) = (&bodies[i], &bodies[j]);
                if need_broadphase_collision(bi, bj) && self.intersection_test(bi, bj) {
                    pairs_a.push(i);
                    pairs_b.push(j);
                }
            }
        }
    }

    fn aabb_query(&self, bodies: &[Body], aabb: &AABB, result: &mut Vec<usize>) {
        result.clear();
        for (i, body) in bodies.iter().enumerate() {
            let bounds = if body.aabb_needs_update() { body.compute_aabb() } else { body.aabb() };
            if bounds.intersects(aabb) {
                result.push(i);
            }
        }
    }
}
