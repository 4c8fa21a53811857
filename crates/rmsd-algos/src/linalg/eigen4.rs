//! Eigen-decomposition of 4×4 symmetric matrices
//!
//! Wraps nalgebra's symmetric QR solver and returns the spectrum sorted
//! ascending with eigenvectors stored as rows (`vectors[l]` belongs to
//! `values[l]`).

use nalgebra::{Matrix4, SymmetricEigen, Vector4};

use crate::{RmsdError, RmsdResult};

/// Status code: the input matrix contains NaN or infinite entries
pub const STATUS_NON_FINITE: i32 = 1;
/// Status code: the solver hit its iteration limit
pub const STATUS_NOT_CONVERGED: i32 = 2;

const MAX_ITERATIONS: usize = 1000;

/// Sorted eigen-decomposition of a 4×4 symmetric matrix
#[derive(Debug, Clone)]
pub struct Eigen4 {
    /// Eigenvalues, ascending
    pub values: [f64; 4],
    /// Orthonormal eigenvectors, one per eigenvalue
    pub vectors: [Vector4<f64>; 4],
}

/// Diagonalize a symmetric 4×4 matrix
pub fn diagonalize(m: &Matrix4<f64>) -> RmsdResult<Eigen4> {
    if m.iter().any(|x| !x.is_finite()) {
        return Err(RmsdError::Diagonalization {
            code: STATUS_NON_FINITE,
        });
    }

    let eigen = SymmetricEigen::try_new(*m, f64::EPSILON, MAX_ITERATIONS).ok_or(
        RmsdError::Diagonalization {
            code: STATUS_NOT_CONVERGED,
        },
    )?;

    let mut order = [0usize, 1, 2, 3];
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

    Ok(Eigen4 {
        values: order.map(|i| eigen.eigenvalues[i]),
        vectors: order.map(|i| eigen.eigenvectors.column(i).into_owned()),
    })
}
