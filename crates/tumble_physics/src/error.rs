//! Error types for the physics system

use thiserror::Error;

use crate::body::BodyId;

/// Physics system errors
#[derive(Debug, Error)]
pub enum PhysicsError {
    /// Rigid body not found
    #[error("Rigid body not found: {0:?}")]
    BodyNotFound(BodyId),

    /// Invalid configuration
    #[error("Invalid physics configuration: {0}")]
    InvalidConfig(String),

    /// The solver produced a NaN or infinite impulse
    #[error("Solver produced a non-finite multiplier {value} for equation {equation}")]
    NonFiniteSolution { equation: usize, value: f64 },

    /// Convex hull with a malformed face list
    #[error("Invalid shape: {0}")]
    InvalidShape(String),
}

/// Result type for physics operations
pub type Result<T> = std::result::Result<T, PhysicsError>;
