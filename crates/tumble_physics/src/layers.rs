//! Collision filtering by group and mask bits

use serde::{Deserialize, Serialize};

/// Group membership and mask of a body or shape.
///
/// Two filters collide only if each one's group intersects the other's mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollisionFilter {
    /// Bits this object belongs to
    pub group: u32,
    /// Bits this object collides with
    pub mask: u32,
}

impl CollisionFilter {
    /// Member of group 1, collides with everything
    pub const DEFAULT: Self = Self { group: 1, mask: u32::MAX };

    /// Collides with nothing
    pub const NONE: Self = Self { group: 0, mask: 0 };

    pub const fn new(group: u32, mask: u32) -> Self {
        Self { group, mask }
    }

    /// Check if two filters accept each other
    #[inline]
    pub fn can_collide(&self, other: &CollisionFilter) -> bool {
        (self.group & other.mask) != 0 && (other.group & self.mask) != 0
    }

    /// Add group bits to the mask
    pub fn with_mask_bits(mut self, bits: u32) -> Self {
        self.mask |= bits;
        self
    }

    /// Remove group bits from the mask
    pub fn without_mask_bits(mut self, bits: u32) -> Self {
        self.mask &= !bits;
        self
    }
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self::DEFAULT
    }
}
