//! 3x3 matrix for inertia tensors and rotations

use core::ops::Mul;

use crate::error::{MathError, Result};
use crate::quaternion::Quat;
use crate::vector::Vec3;

/// Row-major 3x3 matrix
///
/// `elements[row * 3 + col]`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mat3 {
    pub elements: [f64; 9],
}

impl Mat3 {
    pub const IDENTITY: Self = Self::new([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    pub const ZERO: Self = Self::new([0.0; 9]);

    #[inline]
    pub const fn new(elements: [f64; 9]) -> Self {
        Self { elements }
    }

    #[inline]
    pub const fn from_rows(r0: Vec3, r1: Vec3, r2: Vec3) -> Self {
        Self::new([r0.x, r0.y, r0.z, r1.x, r1.y, r1.z, r2.x, r2.y, r2.z])
    }

    #[inline]
    pub const fn from_diagonal(d: Vec3) -> Self {
        Self::new([d.x, 0.0, 0.0, 0.0, d.y, 0.0, 0.0, 0.0, d.z])
    }

    /// Rotation matrix of a unit quaternion
    pub fn from_quat(q: Quat) -> Self {
        let (x, y, z, w) = (q.x, q.y, q.z, q.w);
        let (x2, y2, z2) = (x + x, y + y, z + z);
        let (xx, xy, xz) = (x * x2, x * y2, x * z2);
        let (yy, yz, zz) = (y * y2, y * z2, z * z2);
        let (wx, wy, wz) = (w * x2, w * y2, w * z2);

        Self::new([
            1.0 - (yy + zz), xy - wz, xz + wy,
            xy + wz, 1.0 - (xx + zz), yz - wx,
            xz - wy, yz + wx, 1.0 - (xx + yy),
        ])
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.elements[row * 3 + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.elements[row * 3 + col] = value;
    }

    #[inline]
    pub fn row(&self, row: usize) -> Vec3 {
        Vec3::new(self.get(row, 0), self.get(row, 1), self.get(row, 2))
    }

    #[inline]
    pub fn diagonal(&self) -> Vec3 {
        Vec3::new(self.elements[0], self.elements[4], self.elements[8])
    }

    pub fn transpose(&self) -> Self {
        let e = &self.elements;
        Self::new([e[0], e[3], e[6], e[1], e[4], e[7], e[2], e[5], e[8]])
    }

    #[inline]
    pub fn mul_vec(&self, v: Vec3) -> Vec3 {
        Vec3::new(self.row(0).dot(v), self.row(1).dot(v), self.row(2).dot(v))
    }

    pub fn mul_mat(&self, other: &Self) -> Self {
        let mut out = Self::ZERO;
        for r in 0..3 {
            for c in 0..3 {
                let mut sum = 0.0;
                for k in 0..3 {
                    sum += self.get(r, k) * other.get(k, c);
                }
                out.set(r, c, sum);
            }
        }
        out
    }

    /// `self * diag(v)`: column `c` multiplied by `v[c]`
    pub fn scale_columns(&self, v: Vec3) -> Self {
        let mut out = *self;
        for r in 0..3 {
            out.elements[r * 3] *= v.x;
            out.elements[r * 3 + 1] *= v.y;
            out.elements[r * 3 + 2] *= v.z;
        }
        out
    }

    pub fn determinant(&self) -> f64 {
        let e = &self.elements;
        e[0] * (e[4] * e[8] - e[5] * e[7]) - e[1] * (e[3] * e[8] - e[5] * e[6])
            + e[2] * (e[3] * e[7] - e[4] * e[6])
    }

    #[inline]
    pub fn trace(&self) -> f64 {
        self.elements[0] + self.elements[4] + self.elements[8]
    }

    pub fn is_finite(&self) -> bool {
        self.elements.iter().all(|e| e.is_finite())
    }

    /// Solve `self * x = b`.
    ///
    /// Gaussian elimination without partial pivoting. A zero pivot is
    /// repaired by adding a later row that has a non-zero entry in the
    /// pivot column; if there is none, or the result is not finite, the
    /// system is reported as unsolvable.
    pub fn solve(&self, b: Vec3) -> Result<Vec3> {
        let mut rows = [[0.0; 4]; 3];
        for (r, row) in rows.iter_mut().enumerate() {
            row[..3].copy_from_slice(&self.elements[r * 3..r * 3 + 3]);
            row[3] = b[r];
        }

        let unsolvable = || MathError::UnsolvableSystem { matrix: *self, rhs: b };
        if !eliminate(&mut rows) {
            return Err(unsolvable());
        }

        let z = rows[2][3] / rows[2][2];
        let y = (rows[1][3] - rows[1][2] * z) / rows[1][1];
        let x = (rows[0][3] - rows[0][2] * z - rows[0][1] * y) / rows[0][0];
        let solution = Vec3::new(x, y, z);
        if !solution.is_finite() {
            return Err(unsolvable());
        }
        Ok(solution)
    }

    /// Inverse of the matrix by elimination on `[self | I]`.
    ///
    /// Same pivot rules as [`Mat3::solve`]; a singular input is an error.
    pub fn reverse(&self) -> Result<Mat3> {
        let mut rows = [[0.0; 6]; 3];
        for (r, row) in rows.iter_mut().enumerate() {
            row[..3].copy_from_slice(&self.elements[r * 3..r * 3 + 3]);
            row[3 + r] = 1.0;
        }

        let singular = || MathError::SingularMatrix { matrix: *self };
        if !eliminate(&mut rows) {
            return Err(singular());
        }

        // Back substitution to reduced row echelon form
        for i in (0..3).rev() {
            let pivot = rows[i][i];
            for value in rows[i].iter_mut() {
                *value /= pivot;
            }
            for j in 0..i {
                let factor = rows[j][i];
                if factor != 0.0 {
                    for p in 0..6 {
                        rows[j][p] -= rows[i][p] * factor;
                    }
                }
            }
        }

        let mut inverse = Mat3::ZERO;
        for (r, row) in rows.iter().enumerate() {
            inverse.elements[r * 3..r * 3 + 3].copy_from_slice(&row[3..6]);
        }
        if !inverse.is_finite() {
            return Err(singular());
        }
        Ok(inverse)
    }
}

/// Forward elimination of an augmented 3-row system into upper triangular
/// form. Returns `false` when a pivot stays zero.
fn eliminate<const N: usize>(rows: &mut [[f64; N]; 3]) -> bool {
    for i in 0..3 {
        if rows[i][i] == 0.0 {
            if let Some(j) = (i + 1..3).find(|&j| rows[j][i] != 0.0) {
                let donor = rows[j];
                for (value, add) in rows[i].iter_mut().zip(donor.iter()) {
                    *value += add;
                }
            }
        }
        let pivot = rows[i][i];
        if pivot == 0.0 {
            return false;
        }
        for j in i + 1..3 {
            let multiplier = rows[j][i] / pivot;
            for p in 0..N {
                rows[j][p] = if p <= i { 0.0 } else { rows[j][p] - rows[i][p] * multiplier };
            }
        }
    }
    true
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Vec3> for Mat3 {
    type Output = Vec3;
    #[inline]
    fn mul(self, rhs: Vec3) -> Vec3 {
        self.mul_vec(rhs)
    }
}

impl Mul for Mat3 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        self.mul_mat(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_mat_eq(a: &Mat3, b: &Mat3) {
        for (x, y) in a.elements.iter().zip(b.elements.iter()) {
            assert!((x - y).abs() < 1e-9, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn test_solve_diagonal() {
        let m = Mat3::from_diagonal(Vec3::new(2.0, 4.0, 8.0));
        let x = m.solve(Vec3::new(2.0, 2.0, 2.0)).unwrap();
        assert!(x.almost_equals(Vec3::new(1.0, 0.5, 0.25), 1e-12));
    }

    #[test]
    fn test_solve_general() {
        let m = Mat3::new([2.0, 1.0, -1.0, -3.0, -1.0, 2.0, -2.0, 1.0, 2.0]);
        let x = m.solve(Vec3::new(8.0, -11.0, -3.0)).unwrap();
        assert!(x.almost_equals(Vec3::new(2.0, 3.0, -1.0), 1e-9));
    }

    #[test]
    fn test_solve_repairs_zero_pivot() {
        // First pivot is zero; a later row donates a non-zero entry.
        let m = Mat3::new([0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        let x = m.solve(Vec3::new(3.0, 5.0, 7.0)).unwrap();
        assert!(x.almost_equals(Vec3::new(5.0, 3.0, 7.0), 1e-12));
    }

    #[test]
    fn test_solve_singular_reports_inputs() {
        let m = Mat3::new([1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0]);
        let b = Vec3::new(1.0, 2.0, 3.0);
        match m.solve(b) {
            Err(MathError::UnsolvableSystem { matrix, rhs }) => {
                assert_eq!(matrix, m);
                assert_eq!(rhs, b);
            }
            other => panic!("expected unsolvable system, got {other:?}"),
        }
    }

    #[test]
    fn test_reverse() {
        let m = Mat3::new([4.0, 7.0, 2.0, 3.0, 6.0, 1.0, 2.0, 5.0, 3.0]);
        let inv = m.reverse().unwrap();
        assert_mat_eq(&m.mul_mat(&inv), &Mat3::IDENTITY);
    }

    #[test]
    fn test_reverse_singular() {
        let m = Mat3::ZERO;
        assert_eq!(m.reverse(), Err(MathError::SingularMatrix { matrix: m }));
    }

    #[test]
    fn test_from_quat_matches_rotate() {
        let q = Quat::from_axis_angle(Vec3::new(1.0, 2.0, 3.0), 0.7);
        let v = Vec3::new(-0.4, 1.5, 2.0);
        assert!(Mat3::from_quat(q).mul_vec(v).almost_equals(q.rotate(v), 1e-12));
    }

    #[test]
    fn test_scale_columns() {
        let m = Mat3::IDENTITY.scale_columns(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m, Mat3::from_diagonal(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(m.transpose(), m);
    }
}
