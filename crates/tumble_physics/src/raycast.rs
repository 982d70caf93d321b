//! Ray casting against bodies

use serde::{Deserialize, Serialize};
use tumble_math::{point_in_triangle, ray_plane, ray_sphere_segment, Quat, Ray, Vec3};

use crate::body::{Body, BodyId, BodyShape, ShapeId};
use crate::convex::ConvexPolyhedron;
use crate::layers::CollisionFilter;
use crate::shape::ShapeKind;

/// How many hits a cast reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RaycastMode {
    /// Nearest hit only
    #[default]
    Closest,
    /// First hit found, in no particular order
    Any,
    /// Every hit
    All,
}

/// Filtering for ray casts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RaycastOptions {
    pub collision_filter_group: u32,
    pub collision_filter_mask: u32,
    /// Ignore faces whose normal points along the ray
    pub skip_backfaces: bool,
    /// Ignore bodies and shapes with collision response disabled
    pub check_collision_response: bool,
}

impl Default for RaycastOptions {
    fn default() -> Self {
        Self {
            collision_filter_group: u32::MAX,
            collision_filter_mask: u32::MAX,
            skip_backfaces: false,
            check_collision_response: true,
        }
    }
}

impl RaycastOptions {
    pub fn with_filter(mut self, group: u32, mask: u32) -> Self {
        self.collision_filter_group = group;
        self.collision_filter_mask = mask;
        self
    }

    pub fn with_skip_backfaces(mut self, skip: bool) -> Self {
        self.skip_backfaces = skip;
        self
    }

    fn filter(&self) -> CollisionFilter {
        CollisionFilter::new(self.collision_filter_group, self.collision_filter_mask)
    }
}

/// Ray hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub body: BodyId,
    pub shape: ShapeId,
    pub hit_point_world: Vec3,
    pub hit_normal_world: Vec3,
    /// Distance from the ray start
    pub distance: f64,
    /// Face of a box or polyhedron that was hit
    pub hit_face_index: Option<usize>,
    pub ray_from_world: Vec3,
    pub ray_to_world: Vec3,
}

/// Segment cast over a set of candidate bodies
pub(crate) struct RayCast<'a> {
    from: Vec3,
    to: Vec3,
    ray: Ray,
    options: &'a RaycastOptions,
}

impl<'a> RayCast<'a> {
    pub fn new(from: Vec3, to: Vec3, options: &'a RaycastOptions) -> Self {
        Self {
            from,
            to,
            ray: Ray::from_points(from, to),
            options,
        }
    }

    /// Report hits to `on_hit` until it returns false. Returns false if stopped.
    pub fn cast(&self, bodies: &[Body], candidates: &[usize], on_hit: &mut dyn FnMut(RaycastHit) -> bool) -> bool {
        if self.from == self.to {
            return true;
        }
        let filter = self.options.filter();
        for &index in candidates {
            let body = &bodies[index];
            if self.options.check_collision_response && !body.collision_response {
                continue;
            }
            if !filter.can_collide(&body.filter) {
                continue;
            }
            for shape in body.shapes() {
                if self.options.check_collision_response && !shape.shape.collision_response {
                    continue;
                }
                if !filter.can_collide(&shape.shape.filter) {
                    continue;
                }
                if !self.cast_shape(body, shape, on_hit) {
                    return false;
                }
            }
        }
        true
    }

    fn cast_shape(&self, body: &Body, shape: &BodyShape, on_hit: &mut dyn FnMut(RaycastHit) -> bool) -> bool {
        let (position, rotation) = body.shape_world_pose(shape);
        let radius = shape.shape.bounding_radius();
        if radius < f64::MAX && self.ray.line_distance_to_point(position) > radius {
            return true;
        }

        let mut report = |point: Vec3, normal: Vec3, face: Option<usize>| {
            on_hit(RaycastHit {
                body: body.id(),
                shape: shape.id,
                hit_point_world: point,
                hit_normal_world: normal,
                distance: self.from.distance(point),
                hit_face_index: face,
                ray_from_world: self.from,
                ray_to_world: self.to,
            })
        };

        match shape.shape.kind() {
            ShapeKind::Sphere { radius } => {
                for t in ray_sphere_segment(self.from, self.to, position, *radius) {
                    let point = self.from.lerp(self.to, t);
                    if !report(point, (point - position).normalize(), None) {
                        return false;
                    }
                }
                true
            }
            ShapeKind::Plane => {
                let normal = rotation * Vec3::Z;
                if self.options.skip_backfaces && normal.dot(self.ray.direction) > 0.0 {
                    return true;
                }
                match ray_plane(self.from, self.to, position, normal) {
                    Some(t) => report(self.from.lerp(self.to, t), normal, None),
                    None => true,
                }
            }
            ShapeKind::Box(b) => self.cast_hull(b.convex(), position, rotation, &mut report),
            ShapeKind::ConvexPolyhedron(hull) => self.cast_hull(hull, position, rotation, &mut report),
            ShapeKind::Particle => true,
        }
    }

    fn cast_hull(
        &self,
        hull: &ConvexPolyhedron,
        position: Vec3,
        rotation: Quat,
        report: &mut dyn FnMut(Vec3, Vec3, Option<usize>) -> bool,
    ) -> bool {
        for (i, &local_normal) in hull.face_normals().iter().enumerate() {
            let normal = rotation * local_normal;
            if self.options.skip_backfaces && normal.dot(self.ray.direction) > 0.0 {
                continue;
            }
            let face = hull.world_face(i, position, rotation);
            let Some(t) = ray_plane(self.from, self.to, face[0], normal) else {
                continue;
            };
            let point = self.from.lerp(self.to, t);
            let inside = (1..face.len().saturating_sub(1))
                .any(|k| point_in_triangle(point, face[0], face[k], face[k + 1]));
            if inside && !report(point, normal, Some(i)) {
                return false;
            }
        }
        true
    }
}
