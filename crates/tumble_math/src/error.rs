//! Error types for the math kernel

use thiserror::Error;

use crate::matrix::Mat3;
use crate::vector::Vec3;

/// Failures raised by linear solves
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MathError {
    #[error("matrix is singular and cannot be inverted: {matrix:?}")]
    SingularMatrix { matrix: Mat3 },

    #[error("could not solve linear system A x = b with A = {matrix:?}, b = {rhs:?}")]
    UnsolvableSystem { matrix: Mat3, rhs: Vec3 },
}

pub type Result<T> = std::result::Result<T, MathError>;
