//! # tumble_math - Double-Precision Math Kernel
//!
//! Value-type primitives for the rigid-body core: vectors, quaternions,
//! 3x3 matrices, transforms, bounding boxes and rays. Everything is `Copy`
//! and operations return new values.
//!
//! `Mat3::solve` and `Mat3::reverse` use Gaussian elimination without partial
//! pivoting and report a singular system as a [`MathError`] instead of
//! returning garbage.

pub mod vector;
pub mod matrix;
pub mod quaternion;
pub mod transform;
pub mod bounds;
pub mod ray;
pub mod intersect;
pub mod error;

pub use vector::*;
pub use matrix::*;
pub use quaternion::*;
pub use transform::*;
pub use bounds::*;
pub use ray::*;
pub use intersect::*;
pub use error::{MathError, Result};

pub mod prelude {
    pub use crate::vector::Vec3;
    pub use crate::matrix::Mat3;
    pub use crate::quaternion::Quat;
    pub use crate::transform::Transform;
    pub use crate::bounds::AABB;
    pub use crate::ray::Ray;
    pub use crate::intersect::{point_in_triangle, ray_sphere_segment, ray_plane};
    pub use crate::error::MathError;
}
