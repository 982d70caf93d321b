//! Collision shapes

use serde::{Deserialize, Serialize};
use tumble_math::{Quat, Vec3, AABB};

use crate::convex::ConvexPolyhedron;
use crate::layers::CollisionFilter;
use crate::material::MaterialId;

/// Shape type tag. The numeric order fixes which shape of a pair is
/// treated as "A" during contact generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ShapeType {
    Sphere = 1,
    Plane = 2,
    Box = 4,
    ConvexPolyhedron = 16,
    Particle = 64,
}

/// Box with a cached hull representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxShape {
    half_extents: Vec3,
    convex: ConvexPolyhedron,
}

impl BoxShape {
    pub fn new(half_extents: Vec3) -> Self {
        Self {
            half_extents,
            convex: ConvexPolyhedron::cuboid(half_extents),
        }
    }

    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        self.half_extents
    }

    /// Resize the box and rebuild its hull
    pub fn set_half_extents(&mut self, half_extents: Vec3) {
        self.half_extents = half_extents;
        self.convex = ConvexPolyhedron::cuboid(half_extents);
    }

    #[inline]
    pub fn convex(&self) -> &ConvexPolyhedron {
        &self.convex
    }
}

/// Geometry of a shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeKind {
    Sphere { radius: f64 },
    /// Infinite plane through the shape origin with local normal +Z
    Plane,
    Box(BoxShape),
    ConvexPolyhedron(ConvexPolyhedron),
    /// Point with no extent
    Particle,
}

impl ShapeKind {
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Self::Sphere { .. } => ShapeType::Sphere,
            Self::Plane => ShapeType::Plane,
            Self::Box(_) => ShapeType::Box,
            Self::ConvexPolyhedron(_) => ShapeType::ConvexPolyhedron,
            Self::Particle => ShapeType::Particle,
        }
    }
}

/// A shape with its material and filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    kind: ShapeKind,
    /// Material, or `None` to use the body's
    pub material: Option<MaterialId>,
    pub filter: CollisionFilter,
    /// When false, contacts are reported but not resolved
    pub collision_response: bool,
    bounding_radius: f64,
}

impl Shape {
    pub fn new(kind: ShapeKind) -> Self {
        let mut shape = Self {
            kind,
            material: None,
            filter: CollisionFilter::DEFAULT,
            collision_response: true,
            bounding_radius: 0.0,
        };
        shape.update_bounding_radius();
        shape
    }

    pub fn sphere(radius: f64) -> Self {
        Self::new(ShapeKind::Sphere { radius })
    }

    pub fn plane() -> Self {
        Self::new(ShapeKind::Plane)
    }

    /// Box from half extents
    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::new(ShapeKind::Box(BoxShape::new(half_extents)))
    }

    pub fn convex(hull: ConvexPolyhedron) -> Self {
        Self::new(ShapeKind::ConvexPolyhedron(hull))
    }

    pub fn particle() -> Self {
        Self::new(ShapeKind::Particle)
    }

    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_collision_response(mut self, enabled: bool) -> Self {
        self.collision_response = enabled;
        self
    }

    #[inline]
    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    #[inline]
    pub fn shape_type(&self) -> ShapeType {
        self.kind.shape_type()
    }

    /// Replace the geometry. The owning body must refresh its mass
    /// properties and bounding radius afterwards.
    pub fn set_kind(&mut self, kind: ShapeKind) {
        self.kind = kind;
        self.update_bounding_radius();
    }

    #[inline]
    pub fn bounding_radius(&self) -> f64 {
        self.bounding_radius
    }

    pub fn update_bounding_radius(&mut self) {
        self.bounding_radius = match &self.kind {
            ShapeKind::Sphere { radius } => *radius,
            ShapeKind::Plane => f64::MAX,
            ShapeKind::Box(b) => b.half_extents().length(),
            ShapeKind::ConvexPolyhedron(c) => c.bounding_radius(),
            ShapeKind::Particle => 0.0,
        };
    }

    /// Hull used by the convex algorithms, for boxes and polyhedra
    pub fn hull(&self) -> Option<&ConvexPolyhedron> {
        match &self.kind {
            ShapeKind::Box(b) => Some(b.convex()),
            ShapeKind::ConvexPolyhedron(c) => Some(c),
            _ => None,
        }
    }

    /// Diagonal of the local inertia tensor for the given mass
    pub fn local_inertia(&self, mass: f64) -> Vec3 {
        match &self.kind {
            ShapeKind::Sphere { radius } => Vec3::splat(0.4 * mass * radius * radius),
            ShapeKind::Box(b) => box_inertia(b.half_extents(), mass),
            ShapeKind::ConvexPolyhedron(c) => box_inertia(c.local_aabb().half_extents(), mass),
            ShapeKind::Plane | ShapeKind::Particle => Vec3::ZERO,
        }
    }

    /// Bounds of the shape placed at `position` with `rotation`
    pub fn world_aabb(&self, position: Vec3, rotation: Quat) -> AABB {
        match &self.kind {
            ShapeKind::Sphere { radius } => AABB::from_center_half_extents(position, Vec3::splat(*radius)),
            ShapeKind::Plane => plane_aabb(position, rotation),
            ShapeKind::Box(b) => b.convex().world_aabb(position, rotation),
            ShapeKind::ConvexPolyhedron(c) => c.world_aabb(position, rotation),
            ShapeKind::Particle => AABB::new(position, position),
        }
    }

    pub fn volume(&self) -> f64 {
        match &self.kind {
            ShapeKind::Sphere { radius } => 4.0 / 3.0 * core::f64::consts::PI * radius.powi(3),
            ShapeKind::Box(b) => {
                let h = b.half_extents();
                8.0 * h.x * h.y * h.z
            }
            ShapeKind::ConvexPolyhedron(c) => {
                let s = c.local_aabb().size();
                s.x * s.y * s.z
            }
            ShapeKind::Plane => f64::MAX,
            ShapeKind::Particle => 0.0,
        }
    }
}

/// Inertia diagonal of a solid box with the given half extents
pub(crate) fn box_inertia(half_extents: Vec3, mass: f64) -> Vec3 {
    let Vec3 { x, y, z } = half_extents;
    let k = mass / 12.0;
    Vec3::new(
        k * (4.0 * y * y + 4.0 * z * z),
        k * (4.0 * x * x + 4.0 * z * z),
        k * (4.0 * y * y + 4.0 * x * x),
    )
}

fn plane_aabb(position: Vec3, rotation: Quat) -> AABB {
    const ALIGN_EPS: f64 = 1e-9;
    let n = rotation * Vec3::Z;
    let mut min = Vec3::splat(f64::MIN);
    let mut max = Vec3::splat(f64::MAX);

    if (n.x - 1.0).abs() < ALIGN_EPS {
        max.x = position.x;
    } else if (n.x + 1.0).abs() < ALIGN_EPS {
        min.x = position.x;
    }
    if (n.y - 1.0).abs() < ALIGN_EPS {
        max.y = position.y;
    } else if (n.y + 1.0).abs() < ALIGN_EPS {
        min.y = position.y;
    }
    if (n.z - 1.0).abs() < ALIGN_EPS {
        max.z = position.z;
    } else if (n.z + 1.0).abs() < ALIGN_EPS {
        min.z = position.z;
    }
    AABB::new(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_shape_type_order() {
        assert!(ShapeType::Sphere < ShapeType::Plane);
        assert!(ShapeType::Plane < ShapeType::Box);
        assert!(ShapeType::Box < ShapeType::ConvexPolyhedron);
        assert!(ShapeType::ConvexPolyhedron < ShapeType::Particle);
    }

    #[test]
    fn test_bounding_radius() {
        assert_eq!(Shape::sphere(2.0).bounding_radius(), 2.0);
        assert_eq!(Shape::plane().bounding_radius(), f64::MAX);
        assert_eq!(Shape::particle().bounding_radius(), 0.0);
        assert_relative_eq!(Shape::cuboid(Vec3::new(1.0, 2.0, 2.0)).bounding_radius(), 3.0);
    }

    #[test]
    fn test_set_half_extents_rebuilds_hull() {
        let mut b = BoxShape::new(Vec3::splat(0.5));
        b.set_half_extents(Vec3::new(1.0, 2.0, 3.0));
        let aabb = b.convex().local_aabb();
        assert_eq!(aabb.max, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, -3.0));
    }

    #[test]
    fn test_set_kind_updates_radius() {
        let mut shape = Shape::sphere(1.0);
        shape.set_kind(ShapeKind::Sphere { radius: 3.0 });
        assert_eq!(shape.bounding_radius(), 3.0);
    }

    #[test]
    fn test_local_inertia() {
        let sphere = Shape::sphere(1.0).local_inertia(5.0);
        assert_relative_eq!(sphere.x, 2.0);
        let cube = Shape::cuboid(Vec3::splat(0.5)).local_inertia(6.0);
        assert_relative_eq!(cube.y, 1.0);
        assert_eq!(Shape::plane().local_inertia(1.0), Vec3::ZERO);
    }

    #[test]
    fn test_plane_aabb_clamped_on_normal_axis() {
        // Plane rotated so its normal is +Y, like a floor
        let q = Quat::from_rotation_x(-core::f64::consts::FRAC_PI_2);
        let aabb = Shape::plane().world_aabb(Vec3::new(0.0, 2.0, 0.0), q);
        assert_relative_eq!(aabb.max.y, 2.0);
        assert_eq!(aabb.min.y, f64::MIN);
        assert_eq!(aabb.max.x, f64::MAX);
    }

    #[test]
    fn test_rotated_box_aabb() {
        let q = Quat::from_rotation_z(core::f64::consts::FRAC_PI_4);
        let aabb = Shape::cuboid(Vec3::splat(1.0)).world_aabb(Vec3::ZERO, q);
        assert_relative_eq!(aabb.max.x, 2f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(aabb.max.z, 1.0, epsilon = 1e-12);
    }
}
