//! Quaternion key matrix
//!
//! The optimal rotation between two centered point sets is encoded by the
//! eigenvector belonging to the smallest eigenvalue of a symmetric 4×4
//! matrix `M` built from the weighted cross-covariance tensor
//! `C = Σ w_i · (p_i ⊗ r_i)` (Kearsley's quaternion method).

use nalgebra::{Matrix3, Matrix4, Vector3};

use crate::linalg::outer;

/// `dM[j][k]` holds `∂M_jk/∂C` as a 3×3 tensor over the components of `C`
pub type KeyMatrixDerivatives = [[Matrix3<f64>; 4]; 4];

/// Weighted second moments of two centered point sets
#[derive(Debug, Clone, Copy)]
pub struct SecondMoments {
    /// `Σ w_i |p_i|²`
    pub positions: f64,
    /// `Σ w_i |r_i|²`
    pub reference: f64,
    /// `Σ w_i (p_i ⊗ r_i)`
    pub cross: Matrix3<f64>,
}

/// Accumulate second moments of centered positions and reference.
///
/// `positions_offset`/`reference_offset` are subtracted from the stored points
/// on the fly.
pub fn second_moments(
    positions: &[Vector3<f64>],
    positions_offset: &Vector3<f64>,
    reference: &[Vector3<f64>],
    reference_offset: &Vector3<f64>,
    weights: &[f64],
) -> SecondMoments {
    let mut rr00 = 0.0;
    let mut rr11 = 0.0;
    let mut rr01 = Matrix3::zeros();
    for ((p, r), &w) in positions.iter().zip(reference).zip(weights) {
        let pc = p - positions_offset;
        let rc = r - reference_offset;
        rr00 += pc.norm_squared() * w;
        rr11 += rc.norm_squared() * w;
        rr01 += outer(&pc, &rc) * w;
    }
    SecondMoments {
        positions: rr00,
        reference: rr11,
        cross: rr01,
    }
}

/// Build the symmetric key matrix from the cross-covariance tensor
pub fn key_matrix(c: &Matrix3<f64>) -> Matrix4<f64> {
    let (xx, xy, xz) = (c[(0, 0)], c[(0, 1)], c[(0, 2)]);
    let (yx, yy, yz) = (c[(1, 0)], c[(1, 1)], c[(1, 2)]);
    let (zx, zy, zz) = (c[(2, 0)], c[(2, 1)], c[(2, 2)]);

    let m00 = 2.0 * (-xx - yy - zz);
    let m11 = 2.0 * (-xx + yy + zz);
    let m22 = 2.0 * (xx - yy + zz);
    let m33 = 2.0 * (xx + yy - zz);
    let m01 = 2.0 * (-yz + zy);
    let m02 = 2.0 * (xz - zx);
    let m03 = 2.0 * (-xy + yx);
    let m12 = 2.0 * (-xy - yx);
    let m13 = 2.0 * (-xz - zx);
    let m23 = 2.0 * (-yz - zy);

    Matrix4::new(
        m00, m01, m02, m03, //
        m01, m11, m12, m13, //
        m02, m12, m22, m23, //
        m03, m13, m23, m33,
    )
}

/// Derivatives of every key-matrix entry with respect to `C`.
///
/// `M` is linear in `C`, so these tensors are constant.
pub fn key_matrix_derivatives() -> KeyMatrixDerivatives {
    let t = |v: [f64; 9]| Matrix3::from_row_slice(&v) * 2.0;

    let mut dm = [[Matrix3::zeros(); 4]; 4];
    dm[0][0] = t([-1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, -1.0]);
    dm[1][1] = t([-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    dm[2][2] = t([1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, 1.0]);
    dm[3][3] = t([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0]);
    dm[0][1] = t([0.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0]);
    dm[0][2] = t([0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0]);
    dm[0][3] = t([0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    dm[1][2] = t([0.0, -1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    dm[1][3] = t([0.0, 0.0, -1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0]);
    dm[2][3] = t([0.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, -1.0, 0.0]);
    for j in 0..4 {
        for k in 0..j {
            dm[j][k] = dm[k][j];
        }
    }
    dm
}
