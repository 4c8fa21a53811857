//! Optimal rotation from the key matrix
//!
//! The eigenvector of the smallest eigenvalue of the key matrix is the unit
//! quaternion of the rotation that best superimposes the centered reference
//! onto the centered positions. Its sensitivity to the cross-covariance
//! tensor follows from first-order perturbation theory over the other three
//! eigenpairs:
//!
//! `∂q_i/∂M_jk = Σ_{l≠0} v_l[i] · v_l[j] · v_0[k] / (λ_0 − λ_l)`
//!
//! which is undefined when `λ_0` is degenerate. That case is detected and
//! reported instead of returning infinities.

use log::warn;
use nalgebra::{Matrix3, Matrix4, Vector4};

use crate::linalg::{diagonalize, Eigen4};
use crate::quaternion::{key_matrix_derivatives, KeyMatrixDerivatives};
use crate::{RmsdError, RmsdResult};

/// `drotation[a][b]` is `∂R_ab/∂C` as a 3×3 tensor over the components of `C`
pub type RotationCovDerivative = [[Matrix3<f64>; 3]; 3];

/// Solver tunables
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverParams {
    /// Smallest accepted gap `λ_1 − λ_0`, relative to the largest |eigenvalue|,
    /// when the rotation derivative is needed.
    /// Default: 1e-10
    pub degeneracy_tolerance: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            degeneracy_tolerance: 1e-10,
        }
    }
}

/// Solution of the superposition eigenproblem
#[derive(Debug, Clone)]
pub struct OptimalRotation {
    /// Sorted spectrum of the key matrix
    pub eigen: Eigen4,
    /// Unit quaternion (eigenvector of the smallest eigenvalue)
    pub quaternion: Vector4<f64>,
    /// Rotation bringing the centered reference onto the centered positions
    pub rotation: Matrix3<f64>,
    /// `∂R/∂C`, present when requested at solve time
    pub drotation_dcov: Option<RotationCovDerivative>,
}

impl OptimalRotation {
    /// Diagonalize `m` and derive the rotation, optionally with `∂R/∂C`
    pub fn solve(
        m: &Matrix4<f64>,
        with_derivative: bool,
        params: &SolverParams,
    ) -> RmsdResult<Self> {
        let eigen = diagonalize(m)?;
        let quaternion = eigen.vectors[0];
        let rotation = quaternion_to_rotation(&quaternion);

        let drotation_dcov = if with_derivative {
            check_spectral_gap(&eigen, params.degeneracy_tolerance)?;
            let dq = quaternion_cov_derivative(&eigen, &key_matrix_derivatives());
            Some(rotation_cov_derivative(&quaternion, &dq))
        } else {
            None
        };

        Ok(OptimalRotation {
            eigen,
            quaternion,
            rotation,
            drotation_dcov,
        })
    }

    /// Smallest eigenvalue of the key matrix
    pub fn lambda0(&self) -> f64 {
        self.eigen.values[0]
    }
}

/// Rotation matrix of a unit quaternion `(q0, q1, q2, q3)`
pub fn quaternion_to_rotation(q: &Vector4<f64>) -> Matrix3<f64> {
    let (q0, q1, q2, q3) = (q[0], q[1], q[2], q[3]);
    Matrix3::new(
        q0 * q0 + q1 * q1 - q2 * q2 - q3 * q3,
        2.0 * (q0 * q3 + q1 * q2),
        2.0 * (-q0 * q2 + q1 * q3),
        2.0 * (-q0 * q3 + q1 * q2),
        q0 * q0 - q1 * q1 + q2 * q2 - q3 * q3,
        2.0 * (q0 * q1 + q2 * q3),
        2.0 * (q0 * q2 + q1 * q3),
        2.0 * (-q0 * q1 + q2 * q3),
        q0 * q0 - q1 * q1 - q2 * q2 + q3 * q3,
    )
}

fn check_spectral_gap(eigen: &Eigen4, tolerance: f64) -> RmsdResult<()> {
    let gap = eigen.values[1] - eigen.values[0];
    let scale = eigen.values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if gap <= tolerance * scale {
        warn!(
            "Degenerate key matrix spectrum: gap {:e} (scale {:e}), rotation derivative undefined",
            gap, scale
        );
        return Err(RmsdError::DegenerateSpectrum { gap });
    }
    Ok(())
}

/// `∂q_i/∂C` for each quaternion component, chained through `∂M/∂C`
fn quaternion_cov_derivative(eigen: &Eigen4, dm: &KeyMatrixDerivatives) -> [Matrix3<f64>; 4] {
    let v = &eigen.vectors;
    let lambda = &eigen.values;

    let mut dq = [Matrix3::zeros(); 4];
    for (i, dq_i) in dq.iter_mut().enumerate() {
        for j in 0..4 {
            for k in 0..4 {
                let mut dq_dm = 0.0;
                for l in 1..4 {
                    dq_dm += v[l][j] * v[l][i] / (lambda[0] - lambda[l]) * v[0][k];
                }
                *dq_i += dm[j][k] * dq_dm;
            }
        }
    }
    dq
}

/// Chain `∂q/∂C` through [`quaternion_to_rotation`]
fn rotation_cov_derivative(q: &Vector4<f64>, dq: &[Matrix3<f64>; 4]) -> RotationCovDerivative {
    let (q0, q1, q2, q3) = (q[0], q[1], q[2], q[3]);
    let [d0, d1, d2, d3] = *dq;

    let mut dr = [[Matrix3::zeros(); 3]; 3];
    dr[0][0] = (d0 * q0 + d1 * q1 - d2 * q2 - d3 * q3) * 2.0;
    dr[1][1] = (d0 * q0 - d1 * q1 + d2 * q2 - d3 * q3) * 2.0;
    dr[2][2] = (d0 * q0 - d1 * q1 - d2 * q2 + d3 * q3) * 2.0;
    dr[0][1] = ((d3 * q0 + d0 * q3) + (d2 * q1 + d1 * q2)) * 2.0;
    dr[0][2] = (-(d2 * q0 + d0 * q2) + (d3 * q1 + d1 * q3)) * 2.0;
    dr[1][2] = ((d1 * q0 + d0 * q1) + (d3 * q2 + d2 * q3)) * 2.0;
    dr[1][0] = (-(d3 * q0 + d0 * q3) + (d2 * q1 + d1 * q2)) * 2.0;
    dr[2][0] = ((d2 * q0 + d0 * q2) + (d3 * q1 + d1 * q3)) * 2.0;
    dr[2][1] = (-(d1 * q0 + d0 * q1) + (d3 * q2 + d2 * q3)) * 2.0;
    dr
}
