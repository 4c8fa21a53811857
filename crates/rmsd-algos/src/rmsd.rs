//! Reusable superposition model
//!
//! An [`Rmsd`] holds a reference set, its alignment and displacement weights
//! and the chosen [`AlignmentMethod`]. It is configured once and evaluated
//! against many position sets; every evaluation gets its own
//! [`RmsdCoreData`] working record.

use std::fmt;
use std::str::FromStr;

use log::debug;
use nalgebra::{Matrix3, Vector3};

use crate::centroid::{weighted_center, CenterState};
use crate::core_data::{simple_alignment, simple_distance, Alignment, RmsdCoreData};
use crate::linalg::{points_from_arrays, points_to_arrays};
use crate::rotation::SolverParams;
use crate::transform::RigidTransform;
use crate::{RmsdError, RmsdResult};

/// Superposition strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlignmentMethod {
    /// Translation only
    #[default]
    Simple,
    /// Optimal rotation, distance rebuilt from the residuals
    Optimal,
    /// Optimal rotation, distance taken from the eigenvalue when possible
    OptimalFast,
}

impl AlignmentMethod {
    pub fn name(self) -> &'static str {
        match self {
            AlignmentMethod::Simple => "SIMPLE",
            AlignmentMethod::Optimal => "OPTIMAL",
            AlignmentMethod::OptimalFast => "OPTIMAL-FAST",
        }
    }

    /// Whether the distance is rebuilt from explicit residuals
    pub fn is_safe(self) -> bool {
        self != AlignmentMethod::OptimalFast
    }
}

impl fmt::Display for AlignmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlignmentMethod {
    type Err = RmsdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SIMPLE" => Ok(AlignmentMethod::Simple),
            "OPTIMAL" => Ok(AlignmentMethod::Optimal),
            "OPTIMAL-FAST" | "OPTIMAL_FAST" => Ok(AlignmentMethod::OptimalFast),
            _ => Err(RmsdError::UnknownMethod(s.to_string())),
        }
    }
}

/// Distance and derivatives returned by [`Rmsd::calculate_with_derivatives`]
#[derive(Debug, Clone, PartialEq)]
pub struct RmsdOutput {
    /// MSD when `squared`, RMSD otherwise
    pub distance: f64,
    /// Derivatives with respect to each position
    pub position_derivatives: Vec<[f64; 3]>,
    /// Derivatives with respect to each reference point
    pub reference_derivatives: Vec<[f64; 3]>,
}

impl From<Alignment> for RmsdOutput {
    fn from(alignment: Alignment) -> Self {
        RmsdOutput {
            distance: alignment.distance,
            position_derivatives: points_to_arrays(&alignment.dpositions),
            reference_derivatives: points_to_arrays(&alignment.dreference),
        }
    }
}

/// Configured superposition model
#[derive(Debug, Clone, Default)]
pub struct Rmsd {
    method: AlignmentMethod,
    params: SolverParams,
    reference: Vec<Vector3<f64>>,
    /// Reference exactly as given; `SIMPLE` evaluates against it
    input_reference: Vec<Vector3<f64>>,
    reference_center: CenterState,
    align: Vec<f64>,
    displace: Vec<f64>,
}

impl Rmsd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: SolverParams) -> Self {
        Rmsd {
            params,
            ..Self::default()
        }
    }

    /// Set reference, weights and method in one call.
    ///
    /// Both weight vectors are normalized and the reference centroid is
    /// derived from the alignment weights. The model must be empty.
    pub fn configure(
        &mut self,
        reference: &[[f64; 3]],
        align: &[f64],
        displace: &[f64],
        method: AlignmentMethod,
    ) -> RmsdResult<()> {
        self.set_reference(reference)?;
        self.set_align(align, true, true)?;
        self.set_displace(displace, true)?;
        self.set_method(method);
        Ok(())
    }

    /// Drop the reference and both weight vectors. Method and params are kept.
    pub fn clear(&mut self) {
        self.reference.clear();
        self.input_reference.clear();
        self.reference_center = CenterState::Raw;
        self.align.clear();
        self.displace.clear();
        debug!("RMSD model cleared");
    }

    /// Store the reference with uniform weights and remove its centroid.
    ///
    /// Fails with [`RmsdError::ReferenceAlreadySet`] unless the model is empty.
    pub fn set_reference(&mut self, reference: &[[f64; 3]]) -> RmsdResult<()> {
        if !self.align.is_empty() || !self.displace.is_empty() {
            return Err(RmsdError::ReferenceAlreadySet);
        }
        let points = points_from_arrays(reference)?;
        if points.is_empty() {
            return Err(RmsdError::EmptyPointSet);
        }

        let n = points.len();
        let uniform = 1.0 / n as f64;
        self.input_reference = points.clone();
        self.reference = points;
        self.align = vec![uniform; n];
        self.displace = vec![uniform; n];
        self.reference_center = CenterState::Raw;
        self.reference_center
            .recenter(&mut self.reference, &self.align);
        debug!("RMSD reference set: {} points", n);
        Ok(())
    }

    /// Set alignment weights.
    ///
    /// With `remove_center` the reference centroid is re-derived under the
    /// new weights; otherwise the stored reference is left as it is.
    pub fn set_align(
        &mut self,
        weights: &[f64],
        normalize: bool,
        remove_center: bool,
    ) -> RmsdResult<()> {
        let sum = self.check_weights(weights)?;
        self.align = scaled(weights, normalize, sum);
        if remove_center {
            self.reference_center
                .recenter(&mut self.reference, &self.align);
            debug!(
                "RMSD reference centroid re-derived: {:?}",
                self.reference_center.center()
            );
        }
        Ok(())
    }

    /// Set displacement weights
    pub fn set_displace(&mut self, weights: &[f64], normalize: bool) -> RmsdResult<()> {
        let sum = self.check_weights(weights)?;
        self.displace = scaled(weights, normalize, sum);
        Ok(())
    }

    pub fn set_method(&mut self, method: AlignmentMethod) {
        if method != self.method {
            debug!("RMSD method: {} -> {}", self.method, method);
        }
        self.method = method;
    }

    /// Set the method by name (`SIMPLE`, `OPTIMAL` or `OPTIMAL-FAST`)
    pub fn set_method_name(&mut self, name: &str) -> RmsdResult<()> {
        self.set_method(name.parse()?);
        Ok(())
    }

    pub fn method(&self) -> AlignmentMethod {
        self.method
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    pub fn set_params(&mut self, params: SolverParams) {
        self.params = params;
    }

    /// Stored reference (centered when its centroid has been removed)
    pub fn reference(&self) -> &[Vector3<f64>] {
        &self.reference
    }

    /// Reference centroid in the original frame, once computed
    pub fn reference_center(&self) -> Option<Vector3<f64>> {
        self.reference_center.center()
    }

    pub fn align_weights(&self) -> &[f64] {
        &self.align
    }

    pub fn displace_weights(&self) -> &[f64] {
        &self.displace
    }

    pub fn len(&self) -> usize {
        self.reference.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }

    /// Element-wise equality of the two weight vectors
    pub fn align_equals_displace(&self) -> bool {
        self.align == self.displace
    }

    /// Distance only (MSD when `squared`, RMSD otherwise)
    pub fn calculate(&self, positions: &[[f64; 3]], squared: bool) -> RmsdResult<f64> {
        let positions = self.checked_positions(positions)?;
        match self.method {
            AlignmentMethod::Simple => simple_distance(
                &self.align,
                &self.displace,
                &positions,
                &self.input_reference,
                squared,
            ),
            method => {
                let mut core = self.new_core(positions)?;
                core.compute_core_for_distance(
                    method.is_safe(),
                    self.align_equals_displace(),
                    &self.params,
                )?;
                core.distance(squared)
            }
        }
    }

    /// Distance with derivatives with respect to positions and reference
    pub fn calculate_with_derivatives(
        &self,
        positions: &[[f64; 3]],
        squared: bool,
    ) -> RmsdResult<RmsdOutput> {
        let positions = self.checked_positions(positions)?;
        let alignment = match self.method {
            AlignmentMethod::Simple => simple_alignment(
                &self.align,
                &self.displace,
                &positions,
                &self.input_reference,
                squared,
            )?,
            method => self.new_core(positions)?.optimal_alignment(
                method.is_safe(),
                self.align_equals_displace(),
                squared,
                &self.params,
            )?,
        };
        Ok(alignment.into())
    }

    /// Working record with core and distance computed, for the rotation queries.
    ///
    /// The rotation is always fitted here; `SIMPLE` uses the safe policy. The
    /// rotation derivative is not computed; use
    /// [`RmsdCoreData::compute_core_with_rotation_derivative`] on a fresh
    /// record from [`RmsdCoreData::new`] when it is needed.
    pub fn core_data(&self, positions: &[[f64; 3]], squared: bool) -> RmsdResult<RmsdCoreData<'_>> {
        let positions = self.checked_positions(positions)?;
        let mut core = self.new_core(positions)?;
        core.compute_core_for_distance(
            self.method.is_safe(),
            self.align_equals_displace(),
            &self.params,
        )?;
        core.distance(squared)?;
        Ok(core)
    }

    /// Rigid transform carrying `positions` onto the reference in its
    /// original frame. Translation only under `SIMPLE`.
    pub fn fit_transform(&self, positions: &[[f64; 3]]) -> RmsdResult<RigidTransform> {
        let positions = self.checked_positions(positions)?;
        let reference_center = self
            .reference_center
            .center()
            .ok_or(RmsdError::ReferenceNotCentered)?;

        match self.method {
            AlignmentMethod::Simple => {
                let rmsd = simple_distance(
                    &self.align,
                    &self.displace,
                    &positions,
                    &self.input_reference,
                    false,
                )?;
                Ok(RigidTransform::from_centers(
                    &Matrix3::identity(),
                    &weighted_center(&positions, &self.align),
                    &weighted_center(&self.input_reference, &self.align),
                    rmsd,
                ))
            }
            method => {
                let mut core = self.new_core(positions)?;
                core.compute_core_for_distance(
                    method.is_safe(),
                    self.align_equals_displace(),
                    &self.params,
                )?;
                let rmsd = core.distance(false)?;
                Ok(RigidTransform::from_centers(
                    &core.rotation_positions_to_reference()?,
                    &core.positions_center()?,
                    &(core.reference_center()? + self.reference_offset(reference_center)),
                    rmsd,
                ))
            }
        }
    }

    /// Offset from stored reference coordinates back to the original frame
    fn reference_offset(&self, center: Vector3<f64>) -> Vector3<f64> {
        if self.reference_center.is_removed() {
            center
        } else {
            Vector3::zeros()
        }
    }

    fn checked_positions(&self, positions: &[[f64; 3]]) -> RmsdResult<Vec<Vector3<f64>>> {
        if self.reference.is_empty() {
            return Err(RmsdError::NoReference);
        }
        if positions.len() != self.reference.len() {
            return Err(RmsdError::LengthMismatch(
                positions.len(),
                self.reference.len(),
            ));
        }
        points_from_arrays(positions)
    }

    /// Returns the weight sum after validating `weights` against the reference
    fn check_weights(&self, weights: &[f64]) -> RmsdResult<f64> {
        if self.reference.is_empty() {
            return Err(RmsdError::NoReference);
        }
        if weights.len() != self.reference.len() {
            return Err(RmsdError::LengthMismatch(
                weights.len(),
                self.reference.len(),
            ));
        }
        if let Some((index, &value)) = weights.iter().enumerate().find(|(_, w)| !(**w >= 0.0)) {
            return Err(RmsdError::NegativeWeight { index, value });
        }
        let sum: f64 = weights.iter().sum();
        if !(sum > 0.0) || !sum.is_finite() {
            return Err(RmsdError::NonPositiveWeightSum(sum));
        }
        Ok(sum)
    }

    fn new_core(&self, positions: Vec<Vector3<f64>>) -> RmsdResult<RmsdCoreData<'_>> {
        if !self.reference_center.is_removed() {
            return Err(RmsdError::ReferenceNotCentered);
        }
        Ok(
            RmsdCoreData::new(&self.align, &self.displace, positions, &self.reference)?
                .with_reference_center(self.reference_center),
        )
    }
}

fn scaled(weights: &[f64], normalize: bool, sum: f64) -> Vec<f64> {
    if normalize {
        weights.iter().map(|w| w / sum).collect()
    } else {
        weights.to_vec()
    }
}
