//! Linear algebra utilities
//!
//! Small-dimension helpers used across the crate:
//!
//! - [`eigen4`]: sorted eigen-decomposition of a 4×4 symmetric matrix
//! - conversions between plain `[f64; 3]` coordinates and nalgebra vectors

pub mod eigen4;

pub use eigen4::{diagonalize, Eigen4};

use nalgebra::{Matrix3, Vector3};

use crate::{RmsdError, RmsdResult};

/// Convert plain coordinates into nalgebra vectors, rejecting NaN/inf entries
pub fn points_from_arrays(coords: &[[f64; 3]]) -> RmsdResult<Vec<Vector3<f64>>> {
    coords
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if c.iter().all(|x| x.is_finite()) {
                Ok(Vector3::new(c[0], c[1], c[2]))
            } else {
                Err(RmsdError::NonFiniteCoordinate(i))
            }
        })
        .collect()
}

/// Convert nalgebra vectors back into plain coordinates
pub fn points_to_arrays(points: &[Vector3<f64>]) -> Vec<[f64; 3]> {
    points.iter().map(|p| [p.x, p.y, p.z]).collect()
}

/// Outer product `a ⊗ b`, i.e. `m[(i, j)] = a[i] * b[j]`
pub fn outer(a: &Vector3<f64>, b: &Vector3<f64>) -> Matrix3<f64> {
    a * b.transpose()
}
