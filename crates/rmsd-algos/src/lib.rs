//! Weighted optimal superposition for rmsd-rs
//!
//! This crate computes the root-mean-square deviation between two equal-length
//! point sets together with its analytic gradient with respect to both sets:
//! - Weighted centroids with an explicit removed/restored state machine
//! - The 4×4 quaternion key matrix and its derivative with respect to the
//!   cross-covariance tensor
//! - Optimal rotation from the smallest eigenpair, with first-order
//!   perturbation theory for the rotation derivative
//! - Translation-only, optimal and optimal-fast alignment strategies
//!
//! # Quick Start
//!
//! ```
//! use rmsd_algos::{AlignmentMethod, Rmsd};
//!
//! let reference = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
//! let positions = [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [-1.0, 0.0, 0.0]];
//!
//! let mut rmsd = Rmsd::new();
//! rmsd.set_reference(&reference).unwrap();
//! rmsd.set_method(AlignmentMethod::Optimal);
//!
//! let out = rmsd.calculate_with_derivatives(&positions, true).unwrap();
//! assert!(out.distance < 1e-12);
//! ```

pub mod centroid;
pub mod core_data;
pub mod linalg;
pub mod quaternion;
pub mod rmsd;
pub mod rotation;
pub mod transform;

pub use centroid::{add_center, remove_center, weighted_center, CenterState};
pub use core_data::{simple_alignment, simple_distance, Alignment, RmsdCoreData, RotationDerivative};
pub use quaternion::{key_matrix, key_matrix_derivatives, KeyMatrixDerivatives};
pub use rmsd::{AlignmentMethod, Rmsd, RmsdOutput};
pub use rotation::{quaternion_to_rotation, OptimalRotation, SolverParams};
pub use transform::{apply_transform, RigidTransform};

/// Errors from superposition and RMSD evaluation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RmsdError {
    #[error("Coordinate or weight arrays have different lengths: {0} vs {1}")]
    LengthMismatch(usize, usize),

    #[error("Point set is empty")]
    EmptyPointSet,

    #[error("No reference set: call set_reference before setting weights")]
    NoReference,

    #[error("Reference already set: clear() the model before setting a new reference")]
    ReferenceAlreadySet,

    #[error("Unknown RMSD type: {0}")]
    UnknownMethod(String),

    #[error("Weights must sum to a positive value (got {0})")]
    NonPositiveWeightSum(f64),

    #[error("Weight {index} is negative ({value})")]
    NegativeWeight { index: usize, value: f64 },

    #[error("Coordinate {0} is not finite")]
    NonFiniteCoordinate(usize),

    #[error("Diagonalization failed with error code {code}")]
    Diagonalization { code: i32 },

    #[error("Key matrix has a degenerate smallest eigenvalue (gap {gap:e}); rotation derivative is undefined")]
    DegenerateSpectrum { gap: f64 },

    #[error("Distance is zero: square-root derivative is undefined")]
    ZeroDistance,

    #[error("Core calculation has not been performed")]
    NotComputed,

    #[error("Distance has not been computed")]
    DistanceNotComputed,

    #[error("Rotation derivative was not computed for this core calculation")]
    RotationDerivativeUnavailable,

    #[error("Reference center must be calculated and removed before optimal alignment")]
    ReferenceNotCentered,
}

/// Result type for RMSD operations
pub type RmsdResult<T> = Result<T, RmsdError>;
