//! Rigid bodies

use serde::{Deserialize, Serialize};
use tumble_math::{Mat3, Quat, Transform, Vec3, AABB};

use crate::layers::CollisionFilter;
use crate::material::MaterialId;
use crate::shape::{box_inertia, Shape};

/// Handle to a rigid body in the physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub u32);

impl BodyId {
    /// Id carried by a body that has not been added to a world
    pub const DETACHED: Self = Self(u32::MAX);
}

/// Handle to a shape, unique within its body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeId(pub u32);

/// Type of rigid body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyType {
    /// Fully simulated
    #[default]
    Dynamic,
    /// Never moves, infinite mass
    Static,
    /// Moved by its velocity only, infinite mass
    Kinematic,
}

/// Sleep state of a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SleepState {
    #[default]
    Awake,
    /// Slow enough to start the sleep timer
    Sleepy,
    Sleeping,
}

/// Sleep transition queued by a body until the world drains it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepEvent {
    Sleepy,
    Sleep,
    WakeUp,
}

/// A shape attached to a body at a local offset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyShape {
    pub id: ShapeId,
    pub shape: Shape,
    pub offset: Vec3,
    pub orientation: Quat,
}

/// Description for creating a rigid body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyDesc {
    /// Type of body; `None` picks Static for zero mass, Dynamic otherwise
    pub body_type: Option<BodyType>,
    pub mass: f64,
    pub position: Vec3,
    pub quaternion: Quat,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub linear_damping: f64,
    pub angular_damping: f64,
    pub linear_factor: Vec3,
    pub angular_factor: Vec3,
    pub fixed_rotation: bool,
    pub filter: CollisionFilter,
    pub collision_response: bool,
    pub material: Option<MaterialId>,
    pub allow_sleep: bool,
    pub sleep_speed_limit: f64,
    pub sleep_time_limit: f64,
    pub shapes: Vec<(Shape, Vec3, Quat)>,
}

impl Default for BodyDesc {
    fn default() -> Self {
        Self {
            body_type: None,
            mass: 0.0,
            position: Vec3::ZERO,
            quaternion: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            linear_damping: 0.01,
            angular_damping: 0.01,
            linear_factor: Vec3::ONE,
            angular_factor: Vec3::ONE,
            fixed_rotation: false,
            filter: CollisionFilter::DEFAULT,
            collision_response: true,
            material: None,
            allow_sleep: true,
            sleep_speed_limit: 0.1,
            sleep_time_limit: 1.0,
            shapes: Vec::new(),
        }
    }
}

impl BodyDesc {
    /// Create a dynamic body description
    pub fn dynamic(mass: f64) -> Self {
        Self {
            body_type: Some(BodyType::Dynamic),
            mass,
            ..Default::default()
        }
    }

    /// Create a static body description
    pub fn fixed() -> Self {
        Self {
            body_type: Some(BodyType::Static),
            ..Default::default()
        }
    }

    /// Create a kinematic body description
    pub fn kinematic() -> Self {
        Self {
            body_type: Some(BodyType::Kinematic),
            ..Default::default()
        }
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_position(mut self, x: f64, y: f64, z: f64) -> Self {
        self.position = Vec3::new(x, y, z);
        self
    }

    pub fn with_quaternion(mut self, quaternion: Quat) -> Self {
        self.quaternion = quaternion;
        self
    }

    pub fn with_velocity(mut self, x: f64, y: f64, z: f64) -> Self {
        self.velocity = Vec3::new(x, y, z);
        self
    }

    pub fn with_angular_velocity(mut self, x: f64, y: f64, z: f64) -> Self {
        self.angular_velocity = Vec3::new(x, y, z);
        self
    }

    pub fn with_damping(mut self, linear: f64, angular: f64) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn with_fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self
    }

    pub fn with_filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Detect contacts without resolving them
    pub fn with_collision_response(mut self, enabled: bool) -> Self {
        self.collision_response = enabled;
        self
    }

    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_allow_sleep(mut self, allow: bool) -> Self {
        self.allow_sleep = allow;
        self
    }

    pub fn with_sleep_limits(mut self, speed_limit: f64, time_limit: f64) -> Self {
        self.sleep_speed_limit = speed_limit;
        self.sleep_time_limit = time_limit;
        self
    }

    /// Attach a shape at the body origin
    pub fn with_shape(self, shape: Shape) -> Self {
        self.with_shape_at(shape, Vec3::ZERO, Quat::IDENTITY)
    }

    /// Attach a shape at a local offset and orientation
    pub fn with_shape_at(mut self, shape: Shape, offset: Vec3, orientation: Quat) -> Self {
        self.shapes.push((shape, offset, orientation));
        self
    }

    pub fn build(self) -> Body {
        Body::new(self)
    }
}

/// A rigid body
#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) id: BodyId,
    pub(crate) index: usize,
    body_type: BodyType,

    mass: f64,
    inv_mass: f64,
    inertia: Vec3,
    inv_inertia: Vec3,
    inv_inertia_world: Mat3,
    inv_mass_solve: f64,
    inv_inertia_world_solve: Mat3,

    position: Vec3,
    quaternion: Quat,
    velocity: Vec3,
    angular_velocity: Vec3,
    force: Vec3,
    torque: Vec3,
    pub(crate) previous_position: Vec3,
    pub(crate) previous_quaternion: Quat,
    pub(crate) interpolated_position: Vec3,
    pub(crate) interpolated_quaternion: Quat,

    pub linear_damping: f64,
    pub angular_damping: f64,
    pub linear_factor: Vec3,
    pub angular_factor: Vec3,
    fixed_rotation: bool,

    pub filter: CollisionFilter,
    /// When false, contacts are reported but not resolved
    pub collision_response: bool,
    pub material: Option<MaterialId>,

    pub allow_sleep: bool,
    pub sleep_speed_limit: f64,
    pub sleep_time_limit: f64,
    sleep_state: SleepState,
    time_last_sleepy: f64,
    pub(crate) wake_up_after_narrowphase: bool,
    pending_sleep_events: Vec<SleepEvent>,

    shapes: Vec<BodyShape>,
    next_shape_id: u32,
    bounding_radius: f64,
    aabb: AABB,
    aabb_needs_update: bool,

    // Velocity deltas accumulated by the solver
    pub(crate) vlambda: Vec3,
    pub(crate) wlambda: Vec3,
}

impl From<BodyDesc> for Body {
    fn from(desc: BodyDesc) -> Self {
        Body::new(desc)
    }
}

impl Body {
    pub fn new(desc: BodyDesc) -> Self {
        let body_type = desc.body_type.unwrap_or(if desc.mass > 0.0 {
            BodyType::Dynamic
        } else {
            BodyType::Static
        });

        let mut body = Self {
            id: BodyId::DETACHED,
            index: 0,
            body_type,
            mass: desc.mass,
            inv_mass: 0.0,
            inertia: Vec3::ZERO,
            inv_inertia: Vec3::ZERO,
            inv_inertia_world: Mat3::ZERO,
            inv_mass_solve: 0.0,
            inv_inertia_world_solve: Mat3::ZERO,
            position: desc.position,
            quaternion: desc.quaternion,
            velocity: desc.velocity,
            angular_velocity: desc.angular_velocity,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            previous_position: desc.position,
            previous_quaternion: desc.quaternion,
            interpolated_position: desc.position,
            interpolated_quaternion: desc.quaternion,
            linear_damping: desc.linear_damping,
            angular_damping: desc.angular_damping,
            linear_factor: desc.linear_factor,
            angular_factor: desc.angular_factor,
            fixed_rotation: desc.fixed_rotation,
            filter: desc.filter,
            collision_response: desc.collision_response,
            material: desc.material,
            allow_sleep: desc.allow_sleep,
            sleep_speed_limit: desc.sleep_speed_limit,
            sleep_time_limit: desc.sleep_time_limit,
            sleep_state: SleepState::Awake,
            time_last_sleepy: 0.0,
            wake_up_after_narrowphase: false,
            pending_sleep_events: Vec::new(),
            shapes: Vec::new(),
            next_shape_id: 0,
            bounding_radius: 0.0,
            aabb: AABB::EMPTY,
            aabb_needs_update: true,
            vlambda: Vec3::ZERO,
            wlambda: Vec3::ZERO,
        };
        for (shape, offset, orientation) in desc.shapes {
            body.shapes.push(BodyShape {
                id: ShapeId(body.next_shape_id),
                shape,
                offset,
                orientation,
            });
            body.next_shape_id += 1;
        }
        body.update_bounding_radius();
        body.update_mass_properties();
        body
    }

    // ==================== Identity ====================

    /// World-assigned id, or [`BodyId::DETACHED`]
    #[inline]
    pub fn id(&self) -> BodyId {
        self.id
    }

    /// Position of the body in the world's body list
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    #[inline]
    pub fn is_kinematic(&self) -> bool {
        self.body_type == BodyType::Kinematic
    }

    pub fn set_type(&mut self, body_type: BodyType) {
        self.body_type = body_type;
        self.update_mass_properties();
    }

    // ==================== Shapes ====================

    /// Attach a shape and refresh the derived mass properties
    pub fn add_shape(&mut self, shape: Shape, offset: Vec3, orientation: Quat) -> ShapeId {
        let id = ShapeId(self.next_shape_id);
        self.next_shape_id += 1;
        self.shapes.push(BodyShape { id, shape, offset, orientation });
        self.update_bounding_radius();
        self.update_mass_properties();
        self.aabb_needs_update = true;
        id
    }

    /// Detach a shape. Unknown ids are ignored.
    pub fn remove_shape(&mut self, id: ShapeId) -> Option<BodyShape> {
        let index = self.shapes.iter().position(|s| s.id == id)?;
        let removed = self.shapes.remove(index);
        self.update_bounding_radius();
        self.update_mass_properties();
        self.aabb_needs_update = true;
        Some(removed)
    }

    pub fn shape(&self, id: ShapeId) -> Option<&BodyShape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    #[inline]
    pub fn shapes(&self) -> &[BodyShape] {
        &self.shapes
    }

    #[inline]
    pub fn bounding_radius(&self) -> f64 {
        self.bounding_radius
    }

    pub fn update_bounding_radius(&mut self) {
        self.bounding_radius = self
            .shapes
            .iter()
            .map(|s| {
                let r = s.shape.bounding_radius();
                if r == f64::MAX { r } else { s.offset.length() + r }
            })
            .fold(0.0, f64::max);
    }

    // ==================== Mass ====================

    #[inline]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    #[inline]
    pub fn inv_mass(&self) -> f64 {
        self.inv_mass
    }

    #[inline]
    pub fn inertia(&self) -> Vec3 {
        self.inertia
    }

    #[inline]
    pub fn inv_inertia(&self) -> Vec3 {
        self.inv_inertia
    }

    #[inline]
    pub fn inv_inertia_world(&self) -> &Mat3 {
        &self.inv_inertia_world
    }

    #[inline]
    pub fn inv_mass_solve(&self) -> f64 {
        self.inv_mass_solve
    }

    #[inline]
    pub fn inv_inertia_world_solve(&self) -> &Mat3 {
        &self.inv_inertia_world_solve
    }

    pub fn set_mass(&mut self, mass: f64) {
        self.mass = mass;
        self.update_mass_properties();
    }

    #[inline]
    pub fn fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    pub fn set_fixed_rotation(&mut self, fixed: bool) {
        self.fixed_rotation = fixed;
        self.update_mass_properties();
    }

    /// Recompute inverse mass and inertia from the mass and the local bounds
    /// of the attached shapes
    pub fn update_mass_properties(&mut self) {
        let dynamic = self.is_dynamic();
        self.inv_mass = if dynamic && self.mass > 0.0 { 1.0 / self.mass } else { 0.0 };

        let local = self.local_aabb();
        self.inertia = if self.mass > 0.0 && !local.is_empty() {
            box_inertia(local.half_extents(), self.mass)
        } else {
            Vec3::ZERO
        };

        let invert = |i: f64| {
            if dynamic && !self.fixed_rotation && i > 0.0 && i.is_finite() { 1.0 / i } else { 0.0 }
        };
        self.inv_inertia = Vec3::new(invert(self.inertia.x), invert(self.inertia.y), invert(self.inertia.z));
        self.update_inertia_world(true);
    }

    /// Union of the shape bounds in the body frame
    fn local_aabb(&self) -> AABB {
        self.shapes.iter().fold(AABB::EMPTY, |aabb, s| {
            aabb.union(&s.shape.world_aabb(s.offset, s.orientation))
        })
    }

    /// Rotate the inverse inertia into world space. An isotropic tensor is
    /// rotation invariant and only recomputed when `force` is set.
    pub fn update_inertia_world(&mut self, force: bool) {
        let i = self.inv_inertia;
        if i.x == i.y && i.y == i.z && !force {
            return;
        }
        let r = self.quaternion.to_mat3();
        self.inv_inertia_world = r.scale_columns(i).mul_mat(&r.transpose());
    }

    /// Copy the mass properties used by the solver for this step; sleeping
    /// and kinematic bodies act as immovable
    pub fn update_solve_mass_properties(&mut self) {
        if self.sleep_state == SleepState::Sleeping || self.is_kinematic() {
            self.inv_mass_solve = 0.0;
            self.inv_inertia_world_solve = Mat3::ZERO;
        } else {
            self.inv_mass_solve = self.inv_mass;
            self.inv_inertia_world_solve = self.inv_inertia_world;
        }
    }

    // ==================== Bounds ====================

    /// Cached world bounds; may be stale until [`Body::update_aabb`]
    #[inline]
    pub fn aabb(&self) -> AABB {
        self.aabb
    }

    #[inline]
    pub fn aabb_needs_update(&self) -> bool {
        self.aabb_needs_update
    }

    /// World bounds of all shapes at the current pose
    pub fn compute_aabb(&self) -> AABB {
        self.shapes.iter().fold(AABB::EMPTY, |aabb, s| {
            let (position, rotation) = self.shape_world_pose(s);
            aabb.union(&s.shape.world_aabb(position, rotation))
        })
    }

    pub fn update_aabb(&mut self) {
        self.aabb = self.compute_aabb();
        self.aabb_needs_update = false;
    }

    /// World position and orientation of an attached shape
    #[inline]
    pub fn shape_world_pose(&self, shape: &BodyShape) -> (Vec3, Quat) {
        let pose = self
            .transform()
            .mul_transform(&Transform::new(shape.offset, shape.orientation));
        (pose.position, pose.rotation)
    }

    // ==================== Frames ====================

    /// Current pose as a frame
    #[inline]
    pub fn transform(&self) -> Transform {
        Transform::new(self.position, self.quaternion)
    }

    pub fn point_to_local_frame(&self, world: Vec3) -> Vec3 {
        self.transform().point_to_local(world)
    }

    pub fn point_to_world_frame(&self, local: Vec3) -> Vec3 {
        self.transform().point_to_world(local)
    }

    pub fn vector_to_local_frame(&self, world: Vec3) -> Vec3 {
        self.transform().vector_to_local(world)
    }

    pub fn vector_to_world_frame(&self, local: Vec3) -> Vec3 {
        self.transform().vector_to_world(local)
    }

    // ==================== State ====================

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    pub fn quaternion(&self) -> Quat {
        self.quaternion
    }

    #[inline]
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    #[inline]
    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    #[inline]
    pub fn force(&self) -> Vec3 {
        self.force
    }

    #[inline]
    pub fn torque(&self) -> Vec3 {
        self.torque
    }

    /// Position before the last integration
    #[inline]
    pub fn previous_position(&self) -> Vec3 {
        self.previous_position
    }

    #[inline]
    pub fn previous_quaternion(&self) -> Quat {
        self.previous_quaternion
    }

    /// Render position between the last two steps
    #[inline]
    pub fn interpolated_position(&self) -> Vec3 {
        self.interpolated_position
    }

    #[inline]
    pub fn interpolated_quaternion(&self) -> Quat {
        self.interpolated_quaternion
    }

    /// Teleport the body. Previous and interpolated poses follow.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.previous_position = position;
        self.interpolated_position = position;
        self.aabb_needs_update = true;
    }

    pub fn set_quaternion(&mut self, quaternion: Quat) {
        self.quaternion = quaternion;
        self.previous_quaternion = quaternion;
        self.interpolated_quaternion = quaternion;
        self.aabb_needs_update = true;
        self.update_inertia_world(true);
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    pub fn set_angular_velocity(&mut self, angular_velocity: Vec3) {
        self.angular_velocity = angular_velocity;
    }

    pub(crate) fn add_velocity(&mut self, linear: Vec3, angular: Vec3) {
        self.velocity += linear;
        self.angular_velocity += angular;
    }

    pub(crate) fn scale_velocity(&mut self, linear: f64, angular: f64) {
        self.velocity *= linear;
        self.angular_velocity *= angular;
    }

    pub(crate) fn add_force(&mut self, force: Vec3) {
        self.force += force;
    }

    pub(crate) fn clear_forces(&mut self) {
        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
    }

    // ==================== Forces ====================

    /// Apply a world-space force at a point relative to the center of mass
    pub fn apply_force(&mut self, force: Vec3, relative_point: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        if self.sleep_state == SleepState::Sleeping {
            self.wake_up();
        }
        self.force += force;
        self.torque += relative_point.cross(force);
    }

    /// Apply a body-frame force at a body-frame point
    pub fn apply_local_force(&mut self, local_force: Vec3, local_point: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        let force = self.vector_to_world_frame(local_force);
        let point = self.vector_to_world_frame(local_point);
        self.apply_force(force, point);
    }

    /// Apply a world-space impulse at a point relative to the center of mass
    pub fn apply_impulse(&mut self, impulse: Vec3, relative_point: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        if self.sleep_state == SleepState::Sleeping {
            self.wake_up();
        }
        self.velocity += impulse * self.inv_mass;
        let rotational = relative_point.cross(impulse);
        self.angular_velocity += self.inv_inertia_world * rotational;
    }

    pub fn apply_local_impulse(&mut self, local_impulse: Vec3, local_point: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        let impulse = self.vector_to_world_frame(local_impulse);
        let point = self.vector_to_world_frame(local_point);
        self.apply_impulse(impulse, point);
    }

    pub fn apply_torque(&mut self, torque: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        if self.sleep_state == SleepState::Sleeping {
            self.wake_up();
        }
        self.torque += torque;
    }

    // ==================== Sleep ====================

    #[inline]
    pub fn sleep_state(&self) -> SleepState {
        self.sleep_state
    }

    #[inline]
    pub fn is_sleeping(&self) -> bool {
        self.sleep_state == SleepState::Sleeping
    }

    pub fn wake_up(&mut self) {
        let previous = self.sleep_state;
        self.sleep_state = SleepState::Awake;
        self.wake_up_after_narrowphase = false;
        if previous == SleepState::Sleeping {
            self.pending_sleep_events.push(SleepEvent::WakeUp);
        }
    }

    /// Put the body to sleep and stop it
    pub fn sleep(&mut self) {
        self.sleep_state = SleepState::Sleeping;
        self.velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
        self.wake_up_after_narrowphase = false;
    }

    /// Advance the sleep state machine at world time `time`
    pub fn sleep_tick(&mut self, time: f64) {
        if !self.allow_sleep || self.is_static() {
            return;
        }
        let speed_squared = self.velocity.length_squared() + self.angular_velocity.length_squared();
        let limit_squared = self.sleep_speed_limit * self.sleep_speed_limit;

        match self.sleep_state {
            SleepState::Awake if speed_squared < limit_squared => {
                self.sleep_state = SleepState::Sleepy;
                self.time_last_sleepy = time;
                self.pending_sleep_events.push(SleepEvent::Sleepy);
            }
            SleepState::Sleepy if speed_squared > limit_squared => self.wake_up(),
            SleepState::Sleepy if time - self.time_last_sleepy > self.sleep_time_limit => {
                self.sleep();
                self.pending_sleep_events.push(SleepEvent::Sleep);
            }
            _ => {}
        }
    }

    /// Take the sleep transitions recorded since the last call
    pub fn drain_sleep_events(&mut self) -> std::vec::Drain<'_, SleepEvent> {
        self.pending_sleep_events.drain(..)
    }

    // ==================== Integration ====================

    /// Semi-implicit Euler step of velocity, position and orientation
    pub fn integrate(&mut self, dt: f64, quat_normalize: bool, quat_normalize_fast: bool) {
        self.previous_position = self.position;
        self.previous_quaternion = self.quaternion;

        if !(self.is_dynamic() || self.is_kinematic()) || self.sleep_state == SleepState::Sleeping {
            return;
        }

        let linear = (self.force * (self.inv_mass * dt)).mul_elem(self.linear_factor);
        self.velocity += linear;
        let angular = self.inv_inertia_world * self.torque.mul_elem(self.angular_factor);
        self.angular_velocity += angular * dt;

        self.position += self.velocity * dt;
        self.quaternion = self.quaternion.integrate(self.angular_velocity, dt, self.angular_factor);
        if quat_normalize {
            self.quaternion = if quat_normalize_fast {
                self.quaternion.normalize_fast()
            } else {
                self.quaternion.normalize()
            };
        }

        self.aabb_needs_update = true;
        self.update_inertia_world(false);
    }

    // ==================== Queries ====================

    pub fn velocity_at_world_point(&self, world_point: Vec3) -> Vec3 {
        self.velocity + self.angular_velocity.cross(world_point - self.position)
    }

    /// Translational plus rotational kinetic energy
    pub fn kinetic_energy(&self) -> f64 {
        if !self.is_dynamic() {
            return 0.0;
        }
        let w = self.vector_to_local_frame(self.angular_velocity);
        let rotational = self.inertia.x * w.x * w.x + self.inertia.y * w.y * w.y + self.inertia.z * w.z * w.z;
        0.5 * self.mass * self.velocity.length_squared() + 0.5 * rotational
    }

    /// `|v| + |w|`
    pub fn speed(&self) -> f64 {
        self.velocity.length() + self.angular_velocity.length()
    }

    pub fn is_moving(&self) -> bool {
        self.sleep_state != SleepState::Sleeping
            && !(self.velocity.is_zero() && self.angular_velocity.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box(mass: f64) -> Body {
        BodyDesc::dynamic(mass).with_shape(Shape::cuboid(Vec3::splat(0.5))).build()
    }

    #[test]
    fn test_mass_properties() {
        let body = unit_box(2.0);
        assert_eq!(body.inv_mass(), 0.5);
        // 1/12 * 2 * (1 + 1)
        assert_relative_eq!(body.inertia().x, 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(body.inv_inertia().y, 3.0, epsilon = 1e-12);

        let fixed = BodyDesc::fixed().with_mass(5.0).with_shape(Shape::plane()).build();
        assert_eq!(fixed.inv_mass(), 0.0);
        assert_eq!(fixed.inv_inertia(), Vec3::ZERO);

        let kinematic = BodyDesc::kinematic().with_mass(5.0).build();
        assert_eq!(kinematic.inv_mass(), 0.0);
    }

    #[test]
    fn test_zero_mass_defaults_to_static() {
        let body = BodyDesc::default().with_shape(Shape::sphere(1.0)).build();
        assert_eq!(body.body_type(), BodyType::Static);
        let body = BodyDesc::default().with_mass(1.0).build();
        assert_eq!(body.body_type(), BodyType::Dynamic);
    }

    #[test]
    fn test_fixed_rotation_zeroes_inverse_inertia() {
        let mut body = unit_box(1.0);
        body.set_fixed_rotation(true);
        assert_eq!(body.inv_inertia(), Vec3::ZERO);
        body.apply_torque(Vec3::new(1.0, 2.0, 3.0));
        body.integrate(0.1, true, false);
        assert_eq!(body.angular_velocity(), Vec3::ZERO);
    }

    #[test]
    fn test_add_remove_shape() {
        let mut body = BodyDesc::dynamic(1.0).build();
        let a = body.add_shape(Shape::sphere(1.0), Vec3::new(2.0, 0.0, 0.0), Quat::IDENTITY);
        let b = body.add_shape(Shape::sphere(0.5), Vec3::ZERO, Quat::IDENTITY);
        assert_ne!(a, b);
        assert_relative_eq!(body.bounding_radius(), 3.0);

        assert!(body.remove_shape(a).is_some());
        assert!(body.remove_shape(a).is_none());
        assert_relative_eq!(body.bounding_radius(), 0.5);
        assert!(body.shape(b).is_some());
    }

    #[test]
    fn test_frame_conversions() {
        let mut body = unit_box(1.0);
        body.set_position(Vec3::new(1.0, 2.0, 3.0));
        body.set_quaternion(Quat::from_rotation_y(0.7));
        let p = Vec3::new(-4.0, 0.5, 2.0);
        let back = body.point_to_world_frame(body.point_to_local_frame(p));
        assert!(back.almost_equals(p, 1e-12));
        let v = Vec3::new(0.0, 1.0, 1.0);
        let back = body.vector_to_world_frame(body.vector_to_local_frame(v));
        assert!(back.almost_equals(v, 1e-12));
    }

    #[test]
    fn test_shape_pose_follows_body() {
        let mut body = BodyDesc::dynamic(1.0)
            .with_shape_at(Shape::sphere(0.5), Vec3::X, Quat::IDENTITY)
            .build();
        body.set_position(Vec3::new(0.0, 1.0, 0.0));
        body.set_quaternion(Quat::from_rotation_z(std::f64::consts::FRAC_PI_2));
        let (position, rotation) = body.shape_world_pose(&body.shapes()[0]);
        assert!(position.almost_equals(Vec3::new(0.0, 2.0, 0.0), 1e-12));
        assert!((rotation * Vec3::X).almost_equals(Vec3::Y, 1e-12));
    }

    #[test]
    fn test_inertia_world_follows_rotation() {
        let mut body = BodyDesc::dynamic(1.0)
            .with_shape(Shape::cuboid(Vec3::new(2.0, 0.5, 0.5)))
            .build();
        let before = body.inv_inertia_world().get(0, 0);
        body.set_quaternion(Quat::from_rotation_z(core::f64::consts::FRAC_PI_2));
        assert_relative_eq!(body.inv_inertia_world().get(1, 1), before, epsilon = 1e-9);
    }

    #[test]
    fn test_integrate_free_fall() {
        let mut body = unit_box(2.0);
        body.add_force(Vec3::new(0.0, -9.82 * 2.0, 0.0));
        body.integrate(0.5, true, false);
        assert_relative_eq!(body.velocity().y, -4.91, epsilon = 1e-12);
        assert_relative_eq!(body.position().y, -2.455, epsilon = 1e-12);
        assert_eq!(body.previous_position(), Vec3::ZERO);
        assert!(body.aabb_needs_update());
    }

    #[test]
    fn test_static_body_does_not_integrate() {
        let mut body = BodyDesc::fixed().with_velocity(1.0, 0.0, 0.0).build();
        body.integrate(1.0, true, false);
        assert_eq!(body.position(), Vec3::ZERO);
    }

    #[test]
    fn test_apply_impulse_at_offset_spins() {
        let mut body = unit_box(1.0);
        body.apply_impulse(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.5, 0.0, 0.0));
        assert_relative_eq!(body.velocity().y, 1.0);
        assert!(body.angular_velocity().z > 0.0);
    }

    #[test]
    fn test_sleep_state_machine() {
        let mut body = unit_box(1.0);
        body.set_velocity(Vec3::new(0.01, 0.0, 0.0));

        body.sleep_tick(0.0);
        assert_eq!(body.sleep_state(), SleepState::Sleepy);
        body.sleep_tick(0.5);
        assert_eq!(body.sleep_state(), SleepState::Sleepy);
        body.sleep_tick(1.5);
        assert_eq!(body.sleep_state(), SleepState::Sleeping);
        assert_eq!(body.velocity(), Vec3::ZERO);

        body.apply_force(Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO);
        assert_eq!(body.sleep_state(), SleepState::Awake);

        let events: Vec<_> = body.drain_sleep_events().collect();
        assert_eq!(events, vec![SleepEvent::Sleepy, SleepEvent::Sleep, SleepEvent::WakeUp]);
    }

    #[test]
    fn test_sleepy_body_wakes_when_fast() {
        let mut body = unit_box(1.0);
        body.sleep_tick(0.0);
        body.set_velocity(Vec3::new(1.0, 0.0, 0.0));
        body.sleep_tick(0.1);
        assert_eq!(body.sleep_state(), SleepState::Awake);
        // Sleepy -> Awake is not a wake-up from sleep
        let events: Vec<_> = body.drain_sleep_events().collect();
        assert_eq!(events, vec![SleepEvent::Sleepy]);
    }

    #[test]
    fn test_solve_mass_of_sleeping_body_is_zero() {
        let mut body = unit_box(1.0);
        body.update_solve_mass_properties();
        assert_eq!(body.inv_mass_solve(), 1.0);
        body.sleep();
        body.update_solve_mass_properties();
        assert_eq!(body.inv_mass_solve(), 0.0);
        assert_eq!(*body.inv_inertia_world_solve(), Mat3::ZERO);
    }

    #[test]
    fn test_aabb_follows_pose() {
        let mut body = unit_box(1.0);
        body.set_position(Vec3::new(3.0, 0.0, 0.0));
        body.update_aabb();
        assert!(!body.aabb_needs_update());
        assert_relative_eq!(body.aabb().min.x, 2.5);
        assert_relative_eq!(body.aabb().max.x, 3.5);
    }

    #[test]
    fn test_kinetic_energy_and_speed() {
        let mut body = unit_box(2.0);
        body.set_velocity(Vec3::new(3.0, 0.0, 0.0));
        assert_relative_eq!(body.kinetic_energy(), 9.0);
        assert_relative_eq!(body.speed(), 3.0);
        assert!(body.is_moving());
    }
}
