//! Contact and friction constraint rows
//!
//! Each row constrains the relative velocity of two bodies along one
//! direction. Rows are rebuilt every step by the narrowphase and consumed
//! once by the solver. Stiffness and relaxation follow the SPOOK stepper:
//!
//! ```text
//! a   = 4 / (h (1 + 4d))
//! b   = 4d / (1 + 4d)
//! eps = 4 / (h^2 k (1 + 4d))
//! ```

use tumble_math::Vec3;

use crate::body::{Body, ShapeId};

/// Jacobian block of one body: linear and angular parts
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JacobianElement {
    pub spatial: Vec3,
    pub rotational: Vec3,
}

impl JacobianElement {
    pub const fn new(spatial: Vec3, rotational: Vec3) -> Self {
        Self { spatial, rotational }
    }

    #[inline]
    pub fn multiply_vectors(&self, spatial: Vec3, rotational: Vec3) -> f64 {
        self.spatial.dot(spatial) + self.rotational.dot(rotational)
    }
}

/// What a row constrains
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EquationKind {
    /// Non-penetration along `ni`, which points out of body i into body j
    Contact {
        ri: Vec3,
        rj: Vec3,
        ni: Vec3,
        restitution: f64,
        shape_i: ShapeId,
        shape_j: ShapeId,
    },
    /// Sliding resistance along tangent `t`
    Friction { ri: Vec3, rj: Vec3, t: Vec3 },
}

/// A constraint row between bodies `body_i` and `body_j` (world indices)
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub body_i: usize,
    pub body_j: usize,
    pub jacobian_a: JacobianElement,
    pub jacobian_b: JacobianElement,
    pub min_force: f64,
    pub max_force: f64,
    pub a: f64,
    pub b: f64,
    pub eps: f64,
    /// Force applied by the last solve
    pub multiplier: f64,
    pub enabled: bool,
    pub kind: EquationKind,
}

impl Equation {
    /// Non-penetration row; `ri`, `rj` are world-space offsets from each
    /// body's center to the contact point
    #[allow(clippy::too_many_arguments)]
    pub fn contact(
        body_i: usize,
        body_j: usize,
        ri: Vec3,
        rj: Vec3,
        ni: Vec3,
        restitution: f64,
        shape_i: ShapeId,
        shape_j: ShapeId,
    ) -> Self {
        let mut eq = Self::with_kind(
            body_i,
            body_j,
            0.0,
            f64::INFINITY,
            EquationKind::Contact { ri, rj, ni, restitution, shape_i, shape_j },
        );
        eq.update_jacobians();
        eq
    }

    /// Friction row bounded by `max_force` in both directions
    pub fn friction(body_i: usize, body_j: usize, ri: Vec3, rj: Vec3, t: Vec3, max_force: f64) -> Self {
        let mut eq = Self::with_kind(body_i, body_j, -max_force, max_force, EquationKind::Friction { ri, rj, t });
        eq.update_jacobians();
        eq
    }

    fn with_kind(body_i: usize, body_j: usize, min_force: f64, max_force: f64, kind: EquationKind) -> Self {
        let mut eq = Self {
            body_i,
            body_j,
            jacobian_a: JacobianElement::default(),
            jacobian_b: JacobianElement::default(),
            min_force,
            max_force,
            a: 0.0,
            b: 0.0,
            eps: 0.0,
            multiplier: 0.0,
            enabled: true,
            kind,
        };
        eq.set_spook_params(1e7, 4.0, 1.0 / 60.0);
        eq
    }

    /// Derive `a`, `b` and `eps` from stiffness, relaxation and timestep
    pub fn set_spook_params(&mut self, stiffness: f64, relaxation: f64, dt: f64) {
        let d = relaxation;
        let k = stiffness;
        let h = dt;
        self.a = 4.0 / (h * (1.0 + 4.0 * d));
        self.b = (4.0 * d) / (1.0 + 4.0 * d);
        self.eps = 4.0 / (h * h * k * (1.0 + 4.0 * d));
    }

    fn update_jacobians(&mut self) {
        let (ri, rj, dir) = match self.kind {
            EquationKind::Contact { ri, rj, ni, .. } => (ri, rj, ni),
            EquationKind::Friction { ri, rj, t } => (ri, rj, t),
        };
        self.jacobian_a = JacobianElement::new(-dir, -ri.cross(dir));
        self.jacobian_b = JacobianElement::new(dir, rj.cross(dir));
    }

    pub fn is_contact(&self) -> bool {
        matches!(self.kind, EquationKind::Contact { .. })
    }

    /// Right-hand side of the row for timestep `h`
    pub fn compute_b(&mut self, h: f64, bodies: &[Body]) -> f64 {
        self.update_jacobians();
        let bi = &bodies[self.body_i];
        let bj = &bodies[self.body_j];
        let gimf = self.compute_gimf(bi, bj);

        match self.kind {
            EquationKind::Contact { ri, rj, ni, restitution, .. } => {
                let penetration = bj.position() + rj - bi.position() - ri;
                let g = ni.dot(penetration);

                let e1 = restitution + 1.0;
                let gw = e1 * bj.velocity().dot(ni) - e1 * bi.velocity().dot(ni)
                    + bj.angular_velocity().dot(rj.cross(ni))
                    - bi.angular_velocity().dot(ri.cross(ni));

                -g * self.a - gw * self.b - h * gimf
            }
            EquationKind::Friction { .. } => {
                let gw = self.compute_gw(bi, bj);
                -gw * self.b - h * gimf
            }
        }
    }

    /// G * W, the relative velocity along the row
    fn compute_gw(&self, bi: &Body, bj: &Body) -> f64 {
        self.jacobian_a.multiply_vectors(bi.velocity(), bi.angular_velocity())
            + self.jacobian_b.multiply_vectors(bj.velocity(), bj.angular_velocity())
    }

    /// G * inv(M) * f, the velocity change the external forces would cause
    fn compute_gimf(&self, bi: &Body, bj: &Body) -> f64 {
        let i_mf = bi.force() * bi.inv_mass_solve();
        let i_mt = *bi.inv_inertia_world_solve() * bi.torque();
        let j_mf = bj.force() * bj.inv_mass_solve();
        let j_mt = *bj.inv_inertia_world_solve() * bj.torque();
        self.jacobian_a.multiply_vectors(i_mf, i_mt) + self.jacobian_b.multiply_vectors(j_mf, j_mt)
    }

    /// G * inv(M) * G^T
    fn compute_gimgt(&self, bi: &Body, bj: &Body) -> f64 {
        let ga = &self.jacobian_a;
        let gb = &self.jacobian_b;
        bi.inv_mass_solve() * ga.spatial.length_squared()
            + bj.inv_mass_solve() * gb.spatial.length_squared()
            + (*bi.inv_inertia_world_solve() * ga.rotational).dot(ga.rotational)
            + (*bj.inv_inertia_world_solve() * gb.rotational).dot(gb.rotational)
    }

    /// Diagonal entry of the system matrix, regularized by `eps`
    pub fn compute_c(&self, bodies: &[Body]) -> f64 {
        self.compute_gimgt(&bodies[self.body_i], &bodies[self.body_j]) + self.eps
    }

    /// G applied to the velocity deltas accumulated so far in this solve
    pub fn compute_gw_lambda(&self, bodies: &[Body]) -> f64 {
        let bi = &bodies[self.body_i];
        let bj = &bodies[self.body_j];
        self.jacobian_a.multiply_vectors(bi.vlambda, bi.wlambda)
            + self.jacobian_b.multiply_vectors(bj.vlambda, bj.wlambda)
    }

    /// Accumulate the velocity change caused by `delta_lambda`
    pub fn add_to_wlambda(&self, delta_lambda: f64, bodies: &mut [Body]) {
        for (index, jacobian) in [(self.body_i, &self.jacobian_a), (self.body_j, &self.jacobian_b)] {
            let body = &mut bodies[index];
            let dv = (jacobian.spatial * (body.inv_mass_solve() * delta_lambda)).mul_elem(body.linear_factor);
            let dw = (*body.inv_inertia_world_solve() * jacobian.rotational * delta_lambda)
                .mul_elem(body.angular_factor);
            body.vlambda += dv;
            body.wlambda += dw;
        }
    }

    /// Relative velocity of the contact points along the normal; positive
    /// when separating. Zero for friction rows.
    pub fn impact_velocity_along_normal(&self, bodies: &[Body]) -> f64 {
        match self.kind {
            EquationKind::Contact { ri, rj, ni, .. } => {
                let bi = &bodies[self.body_i];
                let bj = &bodies[self.body_j];
                let vi = bi.velocity_at_world_point(bi.position() + ri);
                let vj = bj.velocity_at_world_point(bj.position() + rj);
                ni.dot(vj - vi)
            }
            EquationKind::Friction { .. } => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDesc;
    use crate::shape::Shape;
    use approx::assert_relative_eq;

    fn two_spheres() -> Vec<Body> {
        let mut a = BodyDesc::dynamic(1.0).with_shape(Shape::sphere(0.5)).build();
        let mut b = BodyDesc::dynamic(1.0)
            .with_position(0.9, 0.0, 0.0)
            .with_shape(Shape::sphere(0.5))
            .build();
        a.update_solve_mass_properties();
        b.update_solve_mass_properties();
        vec![a, b]
    }

    fn contact_x() -> Equation {
        Equation::contact(
            0,
            1,
            Vec3::new(0.5, 0.0, 0.0),
            Vec3::new(-0.5, 0.0, 0.0),
            Vec3::X,
            0.0,
            ShapeId(0),
            ShapeId(0),
        )
    }

    #[test]
    fn test_spook_params() {
        let mut eq = contact_x();
        eq.set_spook_params(1e7, 3.0, 0.1);
        assert_relative_eq!(eq.a, 4.0 / (0.1 * 13.0));
        assert_relative_eq!(eq.b, 12.0 / 13.0);
        assert_relative_eq!(eq.eps, 4.0 / (0.01 * 1e7 * 13.0));
    }

    #[test]
    fn test_contact_bounds() {
        let eq = contact_x();
        assert_eq!(eq.min_force, 0.0);
        assert_eq!(eq.max_force, f64::INFINITY);
        let f = Equation::friction(0, 1, Vec3::ZERO, Vec3::ZERO, Vec3::Y, 2.5);
        assert_eq!((f.min_force, f.max_force), (-2.5, 2.5));
    }

    #[test]
    fn test_contact_b_pushes_apart() {
        let bodies = two_spheres();
        let mut eq = contact_x();
        // Overlap of 0.1: g = -0.1, so B > 0 asks for separation
        let b = eq.compute_b(1.0 / 60.0, &bodies);
        assert!(b > 0.0);
        assert_relative_eq!(b, 0.1 * eq.a, epsilon = 1e-9);
    }

    #[test]
    fn test_compute_c_unit_masses() {
        let bodies = two_spheres();
        let eq = contact_x();
        // Central contact: only the linear terms contribute
        assert_relative_eq!(eq.compute_c(&bodies), 2.0 + eq.eps, epsilon = 1e-12);
    }

    #[test]
    fn test_add_to_wlambda_is_equal_and_opposite() {
        let mut bodies = two_spheres();
        let eq = contact_x();
        eq.add_to_wlambda(1.0, &mut bodies);
        assert_eq!(bodies[0].vlambda, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(bodies[1].vlambda, Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(eq.compute_gw_lambda(&bodies), 2.0);
    }

    #[test]
    fn test_impact_velocity() {
        let mut bodies = two_spheres();
        bodies[0].set_velocity(Vec3::new(1.0, 0.0, 0.0));
        bodies[1].set_velocity(Vec3::new(-1.0, 0.0, 0.0));
        assert_relative_eq!(contact_x().impact_velocity_along_normal(&bodies), -2.0);
    }
}
