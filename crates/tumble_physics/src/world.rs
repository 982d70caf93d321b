//! Physics world - main simulation container

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crossbeam_channel::Receiver;
use log::{debug, trace};
use tumble_math::{Vec3, AABB};

use crate::body::{Body, BodyId, BodyShape, ShapeId, SleepEvent, SleepState};
use crate::broadphase::{Broadphase, NaiveBroadphase};
use crate::collision_matrix::{CollisionMatrix, OverlapKeeper};
use crate::config::WorldConfig;
use crate::equation::{Equation, EquationKind};
use crate::error::{PhysicsError, Result};
use crate::events::{ContactPoint, EventBus, EventCollector, PhysicsEvent};
use crate::material::{ContactMaterial, ContactMaterialTable, ContactParams, Material, MaterialId};
use crate::narrowphase::{contact_point, Narrowphase, NarrowphaseContext};
use crate::raycast::{RayCast, RaycastHit, RaycastMode, RaycastOptions};
use crate::solver::{GsSolver, Solver};

/// Hook run at the start of every internal step, before collision detection
pub trait Subsystem: Send {
    fn update(&mut self, bodies: &mut [Body], dt: f64);
}

impl<F> Subsystem for F
where
    F: FnMut(&mut [Body], f64) + Send,
{
    fn update(&mut self, bodies: &mut [Body], dt: f64) {
        self(bodies, dt)
    }
}

type ShapeKey = (BodyId, ShapeId);

#[inline]
fn pair_key(a: BodyId, b: BodyId) -> (BodyId, BodyId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// True if contact with `other` should wake the sleeping `sleeper`
fn wakes(sleeper: &Body, other: &Body) -> bool {
    if !(sleeper.allow_sleep && sleeper.is_dynamic() && sleeper.is_sleeping()) {
        return false;
    }
    if other.sleep_state() != SleepState::Awake || other.is_static() {
        return false;
    }
    let speed_squared = other.velocity().length_squared() + other.angular_velocity().length_squared();
    speed_squared >= 2.0 * other.sleep_speed_limit * other.sleep_speed_limit
}

/// The main physics world containing all simulation state
pub struct World {
    /// Configuration
    config: WorldConfig,

    gravity: Vec3,

    /// Bodies in insertion order; a body's index is its position here
    bodies: Vec<Body>,
    id_to_index: HashMap<BodyId, usize>,
    next_body_id: u32,

    materials: Vec<Material>,
    contact_materials: ContactMaterialTable,

    broadphase: Box<dyn Broadphase>,
    narrowphase: Narrowphase,
    solver: Box<dyn Solver>,
    subsystems: Vec<Box<dyn Subsystem>>,

    /// Body pairs excluded from collision by the user
    ignored_pairs: HashSet<(BodyId, BodyId)>,

    /// Pairs touching this step and last step, by body index
    collision_matrix: CollisionMatrix,
    collision_matrix_previous: CollisionMatrix,
    body_overlaps: OverlapKeeper<BodyId>,
    shape_overlaps: OverlapKeeper<ShapeKey>,

    events: EventBus,

    time: f64,
    step_number: u64,
    accumulator: f64,
    last_call: Option<Instant>,
    has_active_bodies: bool,
    last_solver_iterations: usize,

    // Per-step scratch
    pairs_a: Vec<usize>,
    pairs_b: Vec<usize>,
    equations: Vec<Equation>,
    contact_points: Vec<ContactPoint>,
    body_diff: (Vec<(BodyId, BodyId)>, Vec<(BodyId, BodyId)>),
    shape_diff: (Vec<(ShapeKey, ShapeKey)>, Vec<(ShapeKey, ShapeKey)>),
}

impl World {
    /// Create a new physics world
    pub fn new(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: WorldConfig) -> Self {
        Self {
            gravity: Vec3::from_array(config.gravity),
            bodies: Vec::new(),
            id_to_index: HashMap::new(),
            next_body_id: 0,
            materials: Vec::new(),
            contact_materials: ContactMaterialTable::new(),
            broadphase: Box::new(NaiveBroadphase::new(config.broadphase)),
            narrowphase: Narrowphase::new(config.narrowphase),
            solver: Box::new(GsSolver::new(config.solver)),
            subsystems: Vec::new(),
            ignored_pairs: HashSet::new(),
            collision_matrix: CollisionMatrix::default(),
            collision_matrix_previous: CollisionMatrix::default(),
            body_overlaps: OverlapKeeper::new(),
            shape_overlaps: OverlapKeeper::new(),
            events: EventBus::default(),
            time: 0.0,
            step_number: 0,
            accumulator: 0.0,
            last_call: None,
            has_active_bodies: false,
            last_solver_iterations: 0,
            pairs_a: Vec::new(),
            pairs_b: Vec::new(),
            equations: Vec::new(),
            contact_points: Vec::new(),
            body_diff: (Vec::new(), Vec::new()),
            shape_diff: (Vec::new(), Vec::new()),
            config,
        }
    }

    /// Get the physics configuration
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Get gravity
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    /// Set gravity
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    /// Replace the pair culling stage
    pub fn set_broadphase(&mut self, broadphase: Box<dyn Broadphase>) {
        self.broadphase = broadphase;
    }

    /// Replace the constraint solver
    pub fn set_solver(&mut self, solver: Box<dyn Solver>) {
        self.solver = solver;
    }

    // ==================== Bodies ====================

    /// Add a body and return its id
    pub fn add_body(&mut self, body: impl Into<Body>) -> BodyId {
        let mut body = body.into();
        let id = BodyId(self.next_body_id);
        self.next_body_id += 1;

        body.id = id;
        body.index = self.bodies.len();
        body.update_aabb();
        self.id_to_index.insert(id, body.index);
        self.bodies.push(body);
        self.resize_matrices();

        debug!("Added body {:?} at index {}", id, self.bodies.len() - 1);
        self.events.emit(PhysicsEvent::BodyAdded { body: id });
        id
    }

    /// Remove a body. Later bodies shift down one index.
    pub fn remove_body(&mut self, id: BodyId) -> Option<Body> {
        let index = self.id_to_index.remove(&id)?;
        let mut body = self.bodies.remove(index);
        body.id = BodyId::DETACHED;
        body.index = 0;

        for (i, b) in self.bodies.iter_mut().enumerate().skip(index) {
            b.index = i;
            self.id_to_index.insert(b.id, i);
        }
        self.resize_matrices();
        self.body_overlaps.purge(|&(a, b)| a == id || b == id);
        self.shape_overlaps.purge(|&((a, _), (b, _))| a == id || b == id);
        self.ignored_pairs.retain(|&(a, b)| a != id && b != id);

        debug!("Removed body {:?}", id);
        self.events.emit(PhysicsEvent::BodyRemoved { body: id });
        Some(body)
    }

    fn resize_matrices(&mut self) {
        let n = self.bodies.len();
        self.collision_matrix.set_num_objects(n);
        self.collision_matrix_previous.set_num_objects(n);
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.body_index(id).map(|i| &self.bodies[i])
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.body_index(id).map(|i| &mut self.bodies[i])
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Current index of a body in [`World::bodies`]
    pub fn body_index(&self, id: BodyId) -> Option<usize> {
        self.id_to_index.get(&id).copied()
    }

    pub fn shape(&self, body: BodyId, shape: ShapeId) -> Option<&BodyShape> {
        self.body(body)?.shape(shape)
    }

    pub fn wake_up(&mut self, id: BodyId) -> Result<()> {
        self.body_mut(id).ok_or(PhysicsError::BodyNotFound(id))?.wake_up();
        Ok(())
    }

    pub fn sleep(&mut self, id: BodyId) -> Result<()> {
        self.body_mut(id).ok_or(PhysicsError::BodyNotFound(id))?.sleep();
        Ok(())
    }

    /// Total kinetic energy of all bodies
    pub fn kinetic_energy(&self) -> f64 {
        self.bodies.iter().map(Body::kinetic_energy).sum()
    }

    // ==================== Materials ====================

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() as u32 - 1)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    /// Insert or replace the contact material of a material pair
    pub fn add_contact_material(&mut self, contact_material: ContactMaterial) {
        self.contact_materials.insert(contact_material);
    }

    pub fn contact_material(&self, a: MaterialId, b: MaterialId) -> Option<&ContactMaterial> {
        self.contact_materials.get(a, b)
    }

    /// Parameters used when no contact material matches
    pub fn default_contact_material(&self) -> &ContactParams {
        &self.config.default_contact
    }

    pub fn set_default_contact_material(&mut self, params: ContactParams) {
        self.config.default_contact = params;
    }

    // ==================== Collision Filtering ====================

    pub fn add_subsystem(&mut self, subsystem: impl Subsystem + 'static) {
        self.subsystems.push(Box::new(subsystem));
    }

    /// Never generate contacts between the two bodies
    pub fn ignore_collisions_between(&mut self, a: BodyId, b: BodyId) {
        self.ignored_pairs.insert(pair_key(a, b));
    }

    pub fn restore_collisions_between(&mut self, a: BodyId, b: BodyId) {
        self.ignored_pairs.remove(&pair_key(a, b));
    }

    // ==================== Simulation ====================

    /// Advance the simulation.
    ///
    /// Without `time_since_last_called` this is exactly one step of `dt`.
    /// Otherwise the elapsed time is accumulated and consumed in fixed steps
    /// of `dt`, at most `max_sub_steps` of them, and the interpolated poses
    /// are updated with the remainder.
    pub fn step(&mut self, dt: f64, time_since_last_called: Option<f64>, max_sub_steps: Option<u32>) -> Result<()> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(PhysicsError::InvalidConfig(format!("step length must be positive, got {dt}")));
        }

        let Some(elapsed) = time_since_last_called else {
            self.internal_step(dt)?;
            for body in &mut self.bodies {
                body.interpolated_position = body.position();
                body.interpolated_quaternion = body.quaternion();
            }
            return Ok(());
        };

        if !(elapsed.is_finite() && elapsed >= 0.0) {
            return Err(PhysicsError::InvalidConfig(format!(
                "elapsed time must be finite and non-negative, got {elapsed}"
            )));
        }

        let max_sub_steps = max_sub_steps.unwrap_or(self.config.max_substeps);
        self.accumulator += elapsed;
        let mut substeps = 0;
        while self.accumulator >= dt && substeps < max_sub_steps {
            self.internal_step(dt)?;
            self.accumulator -= dt;
            substeps += 1;
        }
        // Time that could not be simulated is dropped
        self.accumulator %= dt;

        let t = self.accumulator / dt;
        for body in &mut self.bodies {
            body.interpolated_position = body.previous_position.lerp(body.position(), t);
            body.interpolated_quaternion = body.previous_quaternion.slerp(body.quaternion(), t);
        }
        Ok(())
    }

    /// Step with wall-clock time measured since the previous call. The first
    /// call performs a single step.
    pub fn fixed_step(&mut self, dt: Option<f64>, max_sub_steps: Option<u32>) -> Result<()> {
        let dt = dt.unwrap_or(self.config.timestep);
        let now = Instant::now();
        let elapsed = self.last_call.map(|last| now.duration_since(last).as_secs_f64());
        self.last_call = Some(now);
        self.step(dt, elapsed, max_sub_steps)
    }

    fn internal_step(&mut self, dt: f64) -> Result<()> {
        self.events.collector.clear();
        self.flush_sleep_events();

        let gravity = self.gravity;
        for body in self.bodies.iter_mut().filter(|b| b.is_dynamic()) {
            let weight = gravity * body.mass();
            body.add_force(weight);
        }

        for subsystem in &mut self.subsystems {
            subsystem.update(&mut self.bodies, dt);
        }

        // Broadphase
        for body in self.bodies.iter_mut().filter(|b| b.aabb_needs_update()) {
            body.update_aabb();
        }
        self.broadphase.collision_pairs(&mut self.bodies, &mut self.pairs_a, &mut self.pairs_b);
        if !self.ignored_pairs.is_empty() {
            self.drop_ignored_pairs();
        }

        // Narrowphase
        std::mem::swap(&mut self.collision_matrix, &mut self.collision_matrix_previous);
        self.collision_matrix.reset();
        self.body_overlaps.tick();
        self.shape_overlaps.tick();

        let ctx = NarrowphaseContext {
            bodies: &self.bodies,
            materials: &self.materials,
            contact_materials: &self.contact_materials,
            default_contact: self.config.default_contact,
            gravity,
            dt,
        };
        self.narrowphase.get_contacts(&self.pairs_a, &self.pairs_b, &ctx);

        self.record_contacts();

        // Solve
        for body in self.bodies.iter_mut().filter(|b| b.wake_up_after_narrowphase) {
            body.wake_up();
        }
        self.equations.clear();
        self.equations.extend(self.narrowphase.frictions.iter().filter(|e| e.enabled).cloned());
        self.equations.extend(self.narrowphase.contacts.iter().filter(|e| e.enabled).cloned());
        self.last_solver_iterations = self.solver.solve(dt, &mut self.bodies, &mut self.equations)?;

        // Damping
        for body in self.bodies.iter_mut().filter(|b| b.is_dynamic()) {
            let linear = (1.0 - body.linear_damping).powf(dt);
            let angular = (1.0 - body.angular_damping).powf(dt);
            body.scale_velocity(linear, angular);
        }

        // Integrate
        let normalize = self.step_number % (u64::from(self.config.quat_normalize_skip) + 1) == 0;
        let fast = self.config.quat_normalize_fast;
        for body in &mut self.bodies {
            body.integrate(dt, normalize, fast);
            body.clear_forces();
        }

        self.time += dt;
        self.step_number += 1;

        if self.config.allow_sleep {
            for body in &mut self.bodies {
                body.sleep_tick(self.time);
            }
        }
        self.has_active_bodies = self.bodies.iter().any(|b| !b.is_static() && !b.is_sleeping());
        self.flush_sleep_events();

        self.emit_overlap_changes();

        trace!(
            "Step {}: {} pairs, {} contacts, {} solver passes",
            self.step_number,
            self.pairs_a.len(),
            self.contact_points.len(),
            self.last_solver_iterations
        );
        Ok(())
    }

    fn drop_ignored_pairs(&mut self) {
        let bodies = &self.bodies;
        let mut kept = 0;
        for k in 0..self.pairs_a.len() {
            let (a, b) = (self.pairs_a[k], self.pairs_b[k]);
            if !self.ignored_pairs.contains(&pair_key(bodies[a].id(), bodies[b].id())) {
                self.pairs_a[kept] = a;
                self.pairs_b[kept] = b;
                kept += 1;
            }
        }
        self.pairs_a.truncate(kept);
        self.pairs_b.truncate(kept);
    }

    /// Mark touching pairs, queue contact wake-ups and emit first-touch events
    fn record_contacts(&mut self) {
        self.contact_points.clear();

        for eq in &self.narrowphase.contacts {
            let EquationKind::Contact { shape_i, shape_j, .. } = eq.kind else {
                continue;
            };
            let (i, j) = (eq.body_i, eq.body_j);
            let Some(contact) = contact_point(eq, &self.bodies) else {
                continue;
            };
            self.contact_points.push(contact);

            if wakes(&self.bodies[i], &self.bodies[j]) {
                self.bodies[i].wake_up_after_narrowphase = true;
            }
            if wakes(&self.bodies[j], &self.bodies[i]) {
                self.bodies[j].wake_up_after_narrowphase = true;
            }

            let (id_i, id_j) = (self.bodies[i].id(), self.bodies[j].id());
            let first_touch = !self.collision_matrix.get(i, j) && !self.collision_matrix_previous.get(i, j);
            self.collision_matrix.set(i, j, true);
            if first_touch {
                self.events.emit(PhysicsEvent::Collide { body: id_i, other: id_j, contact });
                self.events.emit(PhysicsEvent::Collide { body: id_j, other: id_i, contact });
            }

            self.body_overlaps.set(id_i, id_j);
            self.shape_overlaps.set((id_i, shape_i), (id_j, shape_j));
        }

        for overlap in &self.narrowphase.overlaps {
            let (id_i, id_j) = (self.bodies[overlap.body_i].id(), self.bodies[overlap.body_j].id());
            self.body_overlaps.set(id_i, id_j);
            self.shape_overlaps.set((id_i, overlap.shape_i), (id_j, overlap.shape_j));
        }
    }

    fn flush_sleep_events(&mut self) {
        for body in &mut self.bodies {
            let id = body.id();
            for event in body.drain_sleep_events() {
                self.events.emit(match event {
                    SleepEvent::Sleepy => PhysicsEvent::Sleepy { body: id },
                    SleepEvent::Sleep => PhysicsEvent::Sleep { body: id },
                    SleepEvent::WakeUp => PhysicsEvent::WakeUp { body: id },
                });
            }
        }
    }

    fn emit_overlap_changes(&mut self) {
        let (added, removed) = &mut self.body_diff;
        self.body_overlaps.get_diff(added, removed);
        for &(body_a, body_b) in added.iter() {
            self.events.emit(PhysicsEvent::BeginContact { body_a, body_b });
        }
        for &(body_a, body_b) in removed.iter() {
            self.events.emit(PhysicsEvent::EndContact { body_a, body_b });
        }

        let (added, removed) = &mut self.shape_diff;
        self.shape_overlaps.get_diff(added, removed);
        for &((body_a, shape_a), (body_b, shape_b)) in added.iter() {
            self.events.emit(PhysicsEvent::BeginShapeContact { body_a, shape_a, body_b, shape_b });
        }
        for &((body_a, shape_a), (body_b, shape_b)) in removed.iter() {
            self.events.emit(PhysicsEvent::EndShapeContact { body_a, shape_a, body_b, shape_b });
        }
    }

    /// Simulated time in seconds
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of internal steps taken
    pub fn step_number(&self) -> u64 {
        self.step_number
    }

    /// False once every body is static or sleeping
    pub fn has_active_bodies(&self) -> bool {
        self.has_active_bodies
    }

    /// Contacts found by the last step, at the poses they were detected
    pub fn contacts(&self) -> &[ContactPoint] {
        &self.contact_points
    }

    pub fn contact_count(&self) -> usize {
        self.contact_points.len()
    }

    pub fn friction_equation_count(&self) -> usize {
        self.narrowphase.frictions.len()
    }

    pub fn last_solver_iterations(&self) -> usize {
        self.last_solver_iterations
    }

    // ==================== Events ====================

    /// Events of the last step and anything emitted since
    pub fn events(&self) -> &EventCollector {
        &self.events.collector
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&mut self) -> Receiver<PhysicsEvent> {
        self.events.subscribe()
    }

    // ==================== Queries ====================

    /// Ids of the bodies whose bounds intersect `aabb`
    pub fn aabb_query(&self, aabb: &AABB) -> Vec<BodyId> {
        let mut indices = Vec::new();
        self.broadphase.aabb_query(&self.bodies, aabb, &mut indices);
        indices.into_iter().map(|i| self.bodies[i].id()).collect()
    }

    fn cast(&self, from: Vec3, to: Vec3, options: &RaycastOptions, on_hit: &mut dyn FnMut(RaycastHit) -> bool) {
        let mut candidates = Vec::new();
        self.broadphase.aabb_query(&self.bodies, &AABB::from_points(&[from, to]), &mut candidates);
        RayCast::new(from, to, options).cast(&self.bodies, &candidates, on_hit);
    }

    /// Nearest hit along the segment
    pub fn raycast_closest(&self, from: Vec3, to: Vec3, options: &RaycastOptions) -> Option<RaycastHit> {
        let mut closest: Option<RaycastHit> = None;
        self.cast(from, to, options, &mut |hit| {
            if closest.map_or(true, |c| hit.distance < c.distance) {
                closest = Some(hit);
            }
            true
        });
        closest
    }

    /// First hit found, not necessarily the nearest
    pub fn raycast_any(&self, from: Vec3, to: Vec3, options: &RaycastOptions) -> Option<RaycastHit> {
        let mut found = None;
        self.cast(from, to, options, &mut |hit| {
            found = Some(hit);
            false
        });
        found
    }

    /// Call `callback` for every hit until it returns false. Returns true if
    /// anything was hit.
    pub fn raycast_all(
        &self,
        from: Vec3,
        to: Vec3,
        options: &RaycastOptions,
        mut callback: impl FnMut(&RaycastHit) -> bool,
    ) -> bool {
        let mut any = false;
        self.cast(from, to, options, &mut |hit| {
            any = true;
            callback(&hit)
        });
        any
    }

    /// Every hit along the segment, nearest first
    pub fn ray_test(&self, from: Vec3, to: Vec3, options: &RaycastOptions) -> Vec<RaycastHit> {
        let mut hits = Vec::new();
        self.raycast_all(from, to, options, |hit| {
            hits.push(*hit);
            true
        });
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    /// Cast in the given mode
    pub fn raycast(&self, from: Vec3, to: Vec3, mode: RaycastMode, options: &RaycastOptions) -> Vec<RaycastHit> {
        match mode {
            RaycastMode::Closest => self.raycast_closest(from, to, options).into_iter().collect(),
            RaycastMode::Any => self.raycast_any(from, to, options).into_iter().collect(),
            RaycastMode::All => self.ray_test(from, to, options),
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::with_valid_config(WorldConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDesc;
    use crate::shape::Shape;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn ball(y: f64) -> BodyDesc {
        BodyDesc::dynamic(1.0).with_position(0.0, y, 0.0).with_shape(Shape::sphere(0.5))
    }

    #[test]
    fn test_create_world() {
        let world = World::default();
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.gravity(), Vec3::new(0.0, -9.82, 0.0));
        assert!(World::new(WorldConfig::default().with_timestep(-1.0)).is_err());
    }

    #[test]
    fn test_gravity_fall() {
        let mut world = World::default();
        let id = world.add_body(ball(10.0).with_damping(0.0, 0.0));
        for _ in 0..60 {
            world.step(1.0 / 60.0, None, None).unwrap();
        }
        let body = world.body(id).unwrap();
        assert!(body.position().y < 6.0);
        assert_relative_eq!(body.velocity().y, -9.82, epsilon = 1e-9);
        assert_relative_eq!(world.time(), 1.0, epsilon = 1e-9);
        assert_eq!(world.step_number(), 60);
    }

    #[test]
    fn test_remove_reindexes() {
        let mut world = World::default();
        let a = world.add_body(ball(0.0));
        let b = world.add_body(ball(2.0));
        let c = world.add_body(ball(4.0));

        let removed = world.remove_body(b).unwrap();
        assert_eq!(removed.id(), BodyId::DETACHED);
        assert_eq!(world.body_index(a), Some(0));
        assert_eq!(world.body_index(c), Some(1));
        assert_eq!(world.body(c).unwrap().index(), 1);
        assert!(world.remove_body(b).is_none());
        assert!(matches!(world.wake_up(b), Err(PhysicsError::BodyNotFound(_))));
    }

    #[test]
    fn test_substeps_and_interpolation() {
        let mut world = World::default();
        world.add_body(ball(10.0));
        let dt = 1.0 / 60.0;

        world.step(dt, Some(2.5 * dt), None).unwrap();
        assert_eq!(world.step_number(), 2);

        let body = &world.bodies()[0];
        let expected = body.previous_position().lerp(body.position(), 0.5);
        assert!(body.interpolated_position().almost_equals(expected, 1e-9));

        // Capped, the excess is dropped
        world.step(dt, Some(100.0 * dt), Some(3)).unwrap();
        assert_eq!(world.step_number(), 5);
    }

    #[test]
    fn test_fixed_step_first_call_steps_once() {
        let mut world = World::default();
        world.fixed_step(None, None).unwrap();
        assert_eq!(world.step_number(), 1);
    }

    #[test]
    fn test_ignored_pair_never_collides() {
        let mut world = World::new(WorldConfig::default().with_gravity(0.0, 0.0, 0.0)).unwrap();
        let a = world.add_body(ball(0.0));
        let b = world.add_body(ball(0.8));
        world.ignore_collisions_between(b, a);
        world.step(1.0 / 60.0, None, None).unwrap();
        assert_eq!(world.contact_count(), 0);

        world.restore_collisions_between(a, b);
        world.step(1.0 / 60.0, None, None).unwrap();
        assert_eq!(world.contact_count(), 1);
    }

    #[test]
    fn test_subsystem_runs_each_step() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut world = World::default();
        world.add_subsystem(move |_bodies: &mut [Body], _dt: f64| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        world.step(1.0 / 60.0, None, None).unwrap();
        world.step(1.0 / 60.0, None, None).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_collide_and_contact_events() {
        let mut world = World::new(WorldConfig::default().with_gravity(0.0, 0.0, 0.0)).unwrap();
        let rx = world.subscribe();
        let a = world.add_body(ball(0.0));
        let b = world.add_body(ball(0.9));

        world.step(1.0 / 60.0, None, None).unwrap();
        assert_eq!(world.events().collisions().count(), 2);
        assert_eq!(world.events().begin_contacts().collect::<Vec<_>>(), vec![(a, b)]);

        let received: Vec<_> = rx.try_iter().collect();
        assert!(received.contains(&PhysicsEvent::BodyAdded { body: a }));
        assert!(received.contains(&PhysicsEvent::BeginContact { body_a: a, body_b: b }));

        world.body_mut(b).unwrap().set_position(Vec3::new(0.0, 5.0, 0.0));
        world.step(1.0 / 60.0, None, None).unwrap();
        assert_eq!(world.events().end_contacts().collect::<Vec<_>>(), vec![(a, b)]);
    }

    #[test]
    fn test_step_rejects_bad_dt() {
        let mut world = World::default();
        assert!(world.step(0.0, None, None).is_err());
        assert!(world.step(f64::NAN, Some(1.0), None).is_err());
    }

    #[test]
    fn test_step_rejects_bad_elapsed() {
        let mut world = World::default();
        world.add_body(ball(5.0));
        let dt = 1.0 / 60.0;
        assert!(matches!(world.step(dt, Some(f64::NAN), None), Err(PhysicsError::InvalidConfig(_))));
        assert!(world.step(dt, Some(-1.0), None).is_err());
        assert!(world.step(dt, Some(f64::INFINITY), None).is_err());
        assert_eq!(world.step_number(), 0);

        // The accumulator is untouched, so stepping still works afterwards
        world.step(dt, Some(dt * 2.5), None).unwrap();
        assert_eq!(world.step_number(), 2);
    }
}
