//! World configuration

use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, Result};
use crate::material::ContactParams;

/// Broadphase pair test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BroadphaseMode {
    /// Bounding-sphere distance test (cheap, conservative)
    #[default]
    BoundingSphere,
    /// World AABB overlap (tighter, recomputes AABBs each step)
    Aabb,
}

/// Projected Gauss-Seidel settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Maximum passes over the equations per step
    pub iterations: usize,
    /// A pass whose total |delta lambda| is below `tolerance^2` ends the solve
    pub tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            tolerance: 1e-7,
        }
    }
}

/// Contact generation settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NarrowphaseConfig {
    /// Replace per-point friction with one averaged pair per shape pair
    pub enable_friction_reduction: bool,
    /// Clipped contact depths below this are clamped to it
    pub clip_min_dist: f64,
    /// Clipped contact points deeper than this are discarded
    pub clip_max_dist: f64,
    /// Clipped points are accepted up to this separation
    pub contact_epsilon: f64,
    /// Hull points up to this far apart are still kept as contacts
    pub contact_margin: f64,
}

impl Default for NarrowphaseConfig {
    fn default() -> Self {
        Self {
            enable_friction_reduction: false,
            clip_min_dist: -100.0,
            clip_max_dist: 100.0,
            contact_epsilon: 1e-6,
            contact_margin: 1e-3,
        }
    }
}

/// Physics world configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Gravity vector (default: -9.82 in Y)
    pub gravity: [f64; 3],

    /// Fixed timestep used by `fixed_step`
    pub timestep: f64,

    /// Maximum number of substeps per `step` call with elapsed time
    pub max_substeps: u32,

    /// Enable sleeping for inactive bodies
    pub allow_sleep: bool,

    /// Normalize orientations every `quat_normalize_skip + 1` steps
    pub quat_normalize_skip: u32,

    /// Use the one-step approximate normalization
    pub quat_normalize_fast: bool,

    pub solver: SolverConfig,

    pub broadphase: BroadphaseMode,

    pub narrowphase: NarrowphaseConfig,

    /// Contact parameters used when no contact material matches
    pub default_contact: ContactParams,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.82, 0.0],
            timestep: 1.0 / 60.0,
            max_substeps: 10,
            allow_sleep: true,
            quat_normalize_skip: 0,
            quat_normalize_fast: false,
            solver: SolverConfig::default(),
            broadphase: BroadphaseMode::default(),
            narrowphase: NarrowphaseConfig::default(),
            default_contact: ContactParams::default(),
        }
    }
}

impl WorldConfig {
    /// Create a configuration for high-precision simulation
    pub fn high_precision() -> Self {
        Self {
            solver: SolverConfig {
                iterations: 30,
                tolerance: 1e-9,
            },
            broadphase: BroadphaseMode::Aabb,
            ..Default::default()
        }
    }

    /// Create a configuration for fast simulation (lower quality)
    pub fn fast() -> Self {
        Self {
            max_substeps: 3,
            quat_normalize_skip: 2,
            quat_normalize_fast: true,
            solver: SolverConfig {
                iterations: 5,
                ..Default::default()
            },
            narrowphase: NarrowphaseConfig {
                enable_friction_reduction: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Set gravity
    pub fn with_gravity(mut self, x: f64, y: f64, z: f64) -> Self {
        self.gravity = [x, y, z];
        self
    }

    /// Set timestep
    pub fn with_timestep(mut self, timestep: f64) -> Self {
        self.timestep = timestep;
        self
    }

    pub fn with_allow_sleep(mut self, allow_sleep: bool) -> Self {
        self.allow_sleep = allow_sleep;
        self
    }

    pub fn with_solver(mut self, iterations: usize, tolerance: f64) -> Self {
        self.solver = SolverConfig { iterations, tolerance };
        self
    }

    pub fn with_broadphase(mut self, mode: BroadphaseMode) -> Self {
        self.broadphase = mode;
        self
    }

    pub fn with_friction_reduction(mut self, enabled: bool) -> Self {
        self.narrowphase.enable_friction_reduction = enabled;
        self
    }

    pub fn with_default_contact(mut self, params: ContactParams) -> Self {
        self.default_contact = params;
        self
    }

    /// Reject values the step loop cannot run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PhysicsError::InvalidConfig(msg));

        if !(self.timestep.is_finite() && self.timestep > 0.0) {
            return invalid(format!("timestep must be positive, got {}", self.timestep));
        }
        if self.max_substeps == 0 {
            return invalid("max_substeps must be at least 1".into());
        }
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return invalid(format!("gravity must be finite, got {:?}", self.gravity));
        }
        if self.solver.iterations == 0 {
            return invalid("solver iterations must be at least 1".into());
        }
        if self.solver.tolerance < 0.0 {
            return invalid(format!("solver tolerance must be non-negative, got {}", self.solver.tolerance));
        }
        let c = &self.default_contact;
        for (name, value) in [
            ("contact_equation_stiffness", c.contact_equation_stiffness),
            ("contact_equation_relaxation", c.contact_equation_relaxation),
            ("friction_equation_stiffness", c.friction_equation_stiffness),
            ("friction_equation_relaxation", c.friction_equation_relaxation),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(format!("{name} must be non-negative, got {value}"));
            }
        }
        let margin = self.narrowphase.contact_margin;
        if !(margin.is_finite() && margin >= 0.0) {
            return invalid(format!("contact_margin must be non-negative, got {margin}"));
        }
        if self.narrowphase.clip_min_dist > self.narrowphase.clip_max_dist {
            return invalid(format!(
                "clip window is empty: min {} > max {}",
                self.narrowphase.clip_min_dist, self.narrowphase.clip_max_dist
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(WorldConfig::default().validate().is_ok());
        assert!(WorldConfig::high_precision().validate().is_ok());
        assert!(WorldConfig::fast().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(WorldConfig::default().with_timestep(0.0).validate().is_err());
        assert!(WorldConfig::default().with_solver(0, 1e-7).validate().is_err());
        assert!(WorldConfig::default().with_gravity(0.0, f64::NAN, 0.0).validate().is_err());

        let mut config = WorldConfig::default();
        config.narrowphase.clip_min_dist = 1.0;
        config.narrowphase.clip_max_dist = -1.0;
        assert!(matches!(config.validate(), Err(PhysicsError::InvalidConfig(_))));

        let mut config = WorldConfig::default();
        config.narrowphase.contact_margin = -1e-3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = WorldConfig::fast().with_gravity(0.0, 0.0, -9.82);
        let json = serde_json::to_string(&config).unwrap();
        let back: WorldConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.gravity, back.gravity);
        assert_eq!(config.solver, back.solver);
        assert_eq!(config.narrowphase, back.narrowphase);
        assert_eq!(config.default_contact, back.default_contact);
        assert!((config.timestep - back.timestep).abs() < 1e-15);
    }
}
