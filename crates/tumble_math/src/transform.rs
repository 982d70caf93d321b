//! Rigid transform (rotation then translation)

use crate::quaternion::Quat;
use crate::vector::Vec3;

/// Position and orientation of a frame relative to its parent
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Transform {
    /// Identity transform
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    #[inline]
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Express a world point in this frame
    #[inline]
    pub fn point_to_local(&self, world: Vec3) -> Vec3 {
        self.rotation.conjugate().rotate(world - self.position)
    }

    /// Express a local point in world space
    #[inline]
    pub fn point_to_world(&self, local: Vec3) -> Vec3 {
        self.rotation.rotate(local) + self.position
    }

    #[inline]
    pub fn vector_to_local(&self, world: Vec3) -> Vec3 {
        self.rotation.conjugate().rotate(world)
    }

    #[inline]
    pub fn vector_to_world(&self, local: Vec3) -> Vec3 {
        self.rotation.rotate(local)
    }

    /// Compose: apply `child` in the frame of `self`
    #[inline]
    pub fn mul_transform(&self, child: &Transform) -> Transform {
        Transform::new(self.point_to_world(child.position), self.rotation * child.rotation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
