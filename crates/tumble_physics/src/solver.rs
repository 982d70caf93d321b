//! Iterative constraint solver

use log::trace;

use crate::body::Body;
use crate::config::SolverConfig;
use crate::equation::Equation;
use crate::error::{PhysicsError, Result};

/// Resolves a set of constraint rows into body velocity changes
pub trait Solver: Send {
    /// Solve `equations` for one step of length `dt` and apply the result to
    /// the body velocities. Returns the number of passes used.
    fn solve(&mut self, dt: f64, bodies: &mut [Body], equations: &mut [Equation]) -> Result<usize>;
}

/// Projected Gauss-Seidel solver
#[derive(Debug, Clone, Default)]
pub struct GsSolver {
    pub config: SolverConfig,
    // Per-row scratch, reused across steps
    inv_cs: Vec<f64>,
    bs: Vec<f64>,
    lambdas: Vec<f64>,
}

impl GsSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }
}

impl Solver for GsSolver {
    fn solve(&mut self, dt: f64, bodies: &mut [Body], equations: &mut [Equation]) -> Result<usize> {
        if equations.is_empty() {
            return Ok(0);
        }

        for body in bodies.iter_mut() {
            body.update_solve_mass_properties();
            body.vlambda = Default::default();
            body.wlambda = Default::default();
        }

        self.inv_cs.clear();
        self.bs.clear();
        self.lambdas.clear();
        for eq in equations.iter_mut() {
            self.bs.push(eq.compute_b(dt, bodies));
            self.inv_cs.push(1.0 / eq.compute_c(bodies));
            self.lambdas.push(0.0);
        }

        let tolerance_squared = self.config.tolerance * self.config.tolerance;
        let mut iterations = 0;
        while iterations < self.config.iterations {
            iterations += 1;
            let mut delta_total = 0.0;

            for (j, eq) in equations.iter().enumerate() {
                let lambda = self.lambdas[j];
                let gw_lambda = eq.compute_gw_lambda(bodies);
                let mut delta = self.inv_cs[j] * (self.bs[j] - gw_lambda - eq.eps * lambda);

                if lambda + delta < eq.min_force {
                    delta = eq.min_force - lambda;
                } else if lambda + delta > eq.max_force {
                    delta = eq.max_force - lambda;
                }
                self.lambdas[j] += delta;
                delta_total += delta.abs();
                eq.add_to_wlambda(delta, bodies);
            }

            if delta_total < tolerance_squared {
                break;
            }
        }

        if let Some((equation, &value)) = self.lambdas.iter().enumerate().find(|(_, l)| !l.is_finite()) {
            return Err(PhysicsError::NonFiniteSolution { equation, value });
        }

        for body in bodies.iter_mut() {
            let (dv, dw) = (body.vlambda, body.wlambda);
            body.add_velocity(dv, dw);
        }
        for (eq, &lambda) in equations.iter_mut().zip(&self.lambdas) {
            eq.multiplier = lambda / dt;
        }

        trace!("GS solver: {} rows, {} passes", equations.len(), iterations);
        Ok(iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyDesc, ShapeId};
    use crate::shape::Shape;
    use tumble_math::Vec3;

    fn resting_pair() -> Vec<Body> {
        let ground = BodyDesc::fixed().with_shape(Shape::sphere(0.5)).build();
        let ball = BodyDesc::dynamic(1.0)
            .with_position(0.0, 1.0, 0.0)
            .with_velocity(0.0, -2.0, 0.0)
            .with_shape(Shape::sphere(0.5))
            .build();
        vec![ground, ball]
    }

    fn contact_y() -> Equation {
        Equation::contact(
            0,
            1,
            Vec3::new(0.0, 0.5, 0.0),
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::Y,
            0.0,
            ShapeId(0),
            ShapeId(0),
        )
    }

    #[test]
    fn test_no_equations_is_noop() {
        let mut bodies = resting_pair();
        let mut solver = GsSolver::default();
        assert_eq!(solver.solve(1.0 / 60.0, &mut bodies, &mut []).unwrap(), 0);
        assert_eq!(bodies[1].velocity().y, -2.0);
    }

    #[test]
    fn test_contact_stops_approach() {
        let mut bodies = resting_pair();
        let mut equation = contact_y();
        equation.set_spook_params(1e7, 3.0, 1.0 / 60.0);
        let mut equations = vec![equation];
        let mut solver = GsSolver::new(SolverConfig { iterations: 20, tolerance: 1e-7 });

        let iterations = solver.solve(1.0 / 60.0, &mut bodies, &mut equations).unwrap();
        assert!(iterations >= 1);
        // Relaxation 3 removes 12/13 of the approach speed in one step
        assert!((bodies[1].velocity().y + 2.0 / 13.0).abs() < 1e-2);
    }

    #[test]
    fn test_default_relaxation_is_four() {
        let mut bodies = resting_pair();
        let mut equations = vec![contact_y()];
        GsSolver::new(SolverConfig { iterations: 20, tolerance: 1e-7 })
            .solve(1.0 / 60.0, &mut bodies, &mut equations)
            .unwrap();
        // b = 16/17 leaves 1/17 of the approach speed
        assert!((bodies[1].velocity().y + 2.0 / 17.0).abs() < 1e-2);
        assert_eq!(bodies[0].velocity(), Vec3::ZERO);
        assert!(equations[0].multiplier > 0.0);
    }

    #[test]
    fn test_contact_never_pulls() {
        let mut bodies = resting_pair();
        bodies[1].set_velocity(Vec3::new(0.0, 2.0, 0.0));
        let mut equations = vec![contact_y()];
        let mut solver = GsSolver::default();
        solver.solve(1.0 / 60.0, &mut bodies, &mut equations).unwrap();
        assert_eq!(equations[0].multiplier, 0.0);
        assert_eq!(bodies[1].velocity().y, 2.0);
    }

    #[test]
    fn test_friction_is_clamped() {
        let mut bodies = resting_pair();
        bodies[1].set_velocity(Vec3::new(5.0, 0.0, 0.0));
        let mut equations = vec![Equation::friction(
            0,
            1,
            Vec3::new(0.0, 0.5, 0.0),
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::X,
            0.1,
        )];
        let mut solver = GsSolver::default();
        let dt = 1.0 / 60.0;
        solver.solve(dt, &mut bodies, &mut equations).unwrap();
        assert!((equations[0].multiplier * dt).abs() <= 0.1 + 1e-12);
        assert!(bodies[1].velocity().x < 5.0);
    }

    #[test]
    fn test_non_finite_is_reported() {
        let mut bodies = resting_pair();
        bodies[1].set_velocity(Vec3::new(0.0, f64::NAN, 0.0));
        let mut equations = vec![contact_y()];
        let err = GsSolver::default().solve(1.0 / 60.0, &mut bodies, &mut equations);
        assert!(matches!(err, Err(PhysicsError::NonFiniteSolution { equation: 0, .. })));
    }
}
