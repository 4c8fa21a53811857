//! Alignment strategies and the per-call working record
//!
//! [`simple_alignment`] removes translation only. [`RmsdCoreData`] holds
//! everything one optimal superposition needs: centered coordinates, the
//! optimal rotation, per-point residuals `d_i = (p_i − c_p) − R·(r_i − c_r)`
//! and, when alignment and displacement weights differ, the derivative of the
//! distance with respect to the cross-covariance tensor.
//!
//! The record moves through three stages: uninitialized, core computed
//! ([`RmsdCoreData::compute_core`]) and distance computed
//! ([`RmsdCoreData::distance`]). Queries check the stage they depend on.

use log::debug;
use nalgebra::{Matrix3, Vector3};

use crate::centroid::{weighted_center, CenterState};
use crate::linalg::outer;
use crate::quaternion::{key_matrix, second_moments};
use crate::rotation::{OptimalRotation, SolverParams};
use crate::{RmsdError, RmsdResult};

/// Per-point derivative of each rotation entry: `grid[a][b][i] = ∂R_ab/∂x_i`
pub type RotationDerivative = [[Vec<Vector3<f64>>; 3]; 3];

/// Distance and its derivatives for one evaluation
#[derive(Debug, Clone)]
pub struct Alignment {
    /// MSD or RMSD, depending on the `squared` flag of the call
    pub distance: f64,
    /// Derivatives with respect to each position
    pub dpositions: Vec<Vector3<f64>>,
    /// Derivatives with respect to each reference point
    pub dreference: Vec<Vector3<f64>>,
}

fn check_lengths(
    align: &[f64],
    displace: &[f64],
    positions: &[Vector3<f64>],
    reference: &[Vector3<f64>],
) -> RmsdResult<()> {
    let n = reference.len();
    if n == 0 {
        return Err(RmsdError::EmptyPointSet);
    }
    for len in [positions.len(), align.len(), displace.len()] {
        if len != n {
            return Err(RmsdError::LengthMismatch(len, n));
        }
    }
    Ok(())
}

// ============================================================================
// Translation-only alignment
// ============================================================================

struct SimpleFit {
    d: Vec<Vector3<f64>>,
    shift: Vector3<f64>,
    msd: f64,
}

impl SimpleFit {
    fn new(
        align: &[f64],
        displace: &[f64],
        positions: &[Vector3<f64>],
        reference: &[Vector3<f64>],
    ) -> Self {
        let apositions = weighted_center(positions, align);
        let areference = weighted_center(reference, align);
        let dpositions = weighted_center(positions, displace);
        let dreference = weighted_center(reference, displace);
        let shift = (apositions - areference) - (dpositions - dreference);

        let d: Vec<Vector3<f64>> = positions
            .iter()
            .zip(reference)
            .map(|(p, r)| (p - apositions) - (r - areference))
            .collect();
        let msd = d
            .iter()
            .zip(displace)
            .map(|(d, &w)| d.norm_squared() * w)
            .sum();

        SimpleFit { d, shift, msd }
    }
}

/// Distance after removing translation only (no rotation)
pub fn simple_distance(
    align: &[f64],
    displace: &[f64],
    positions: &[Vector3<f64>],
    reference: &[Vector3<f64>],
    squared: bool,
) -> RmsdResult<f64> {
    check_lengths(align, displace, positions, reference)?;
    let msd = SimpleFit::new(align, displace, positions, reference).msd;
    Ok(if squared { msd } else { msd.sqrt() })
}

/// Translation-only alignment with derivatives.
///
/// `derivative_i = 2·(displace_i·d_i + align_i·shift)`; the reference
/// derivatives are their negatives.
pub fn simple_alignment(
    align: &[f64],
    displace: &[f64],
    positions: &[Vector3<f64>],
    reference: &[Vector3<f64>],
    squared: bool,
) -> RmsdResult<Alignment> {
    check_lengths(align, displace, positions, reference)?;
    let fit = SimpleFit::new(align, displace, positions, reference);

    let distance = Distance::new(fit.msd, squared);
    let scale = distance.chain_factor()?;

    let dpositions: Vec<Vector3<f64>> = fit
        .d
        .iter()
        .zip(displace.iter().zip(align))
        .map(|(d, (&dw, &aw))| (d * dw + fit.shift * aw) * (2.0 * scale))
        .collect();
    let dreference = dpositions.iter().map(|v| -v).collect();

    Ok(Alignment {
        distance: distance.value,
        dpositions,
        dreference,
    })
}

// ============================================================================
// Optimal alignment working record
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Distance {
    value: f64,
    squared: bool,
}

impl Distance {
    fn new(msd: f64, squared: bool) -> Self {
        let value = if squared { msd } else { msd.sqrt() };
        Distance { value, squared }
    }

    /// Factor turning MSD derivatives into derivatives of the reported value
    fn chain_factor(&self) -> RmsdResult<f64> {
        if self.squared {
            Ok(1.0)
        } else if self.value == 0.0 {
            Err(RmsdError::ZeroDistance)
        } else {
            Ok(0.5 / self.value)
        }
    }
}

#[derive(Debug, Clone)]
struct Core {
    safe: bool,
    al_eq_dis: bool,
    /// Offsets subtracted from the stored points to center them
    cpositions: Vector3<f64>,
    creference: Vector3<f64>,
    rr00: f64,
    rr11: f64,
    rotation: OptimalRotation,
    d: Vec<Vector3<f64>>,
    /// `∂dist/∂C`, only when alignment and displacement weights differ
    ddist_dcov: Option<Matrix3<f64>>,
}

#[derive(Debug, Clone)]
enum Stage {
    Uninitialized,
    Computed(Core),
    Measured(Core, Distance),
}

/// Working record for one optimal superposition
#[derive(Debug, Clone)]
pub struct RmsdCoreData<'a> {
    align: &'a [f64],
    displace: &'a [f64],
    positions: Vec<Vector3<f64>>,
    reference: &'a [Vector3<f64>],
    positions_center: CenterState,
    reference_center: CenterState,
    stage: Stage,
}

impl<'a> RmsdCoreData<'a> {
    /// Create a record for `positions` against `reference`.
    ///
    /// Both centers start raw and are computed from the alignment weights.
    pub fn new(
        align: &'a [f64],
        displace: &'a [f64],
        positions: Vec<Vector3<f64>>,
        reference: &'a [Vector3<f64>],
    ) -> RmsdResult<Self> {
        check_lengths(align, displace, &positions, reference)?;
        Ok(RmsdCoreData {
            align,
            displace,
            positions,
            reference,
            positions_center: CenterState::Raw,
            reference_center: CenterState::Raw,
            stage: Stage::Uninitialized,
        })
    }

    /// Declare the centering state of the stored positions
    pub fn with_positions_center(mut self, state: CenterState) -> Self {
        self.positions_center = state;
        self
    }

    /// Declare the centering state of the stored reference
    pub fn with_reference_center(mut self, state: CenterState) -> Self {
        self.reference_center = state;
        self
    }

    pub fn len(&self) -> usize {
        self.reference.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }

    /// Diagonalize the key matrix and compute rotation and residuals.
    ///
    /// The rotation derivative is computed only when `al_eq_dis` is false.
    pub fn compute_core(
        &mut self,
        safe: bool,
        al_eq_dis: bool,
        params: &SolverParams,
    ) -> RmsdResult<()> {
        self.do_core_calc(safe, al_eq_dis, !al_eq_dis, params)
    }

    /// Core calculation sufficient for [`distance`](Self::distance) only.
    ///
    /// Skips `∂R/∂C` in every branch, so the derivative queries fail with
    /// [`RmsdError::RotationDerivativeUnavailable`] when the weights differ.
    pub fn compute_core_for_distance(
        &mut self,
        safe: bool,
        al_eq_dis: bool,
        params: &SolverParams,
    ) -> RmsdResult<()> {
        self.do_core_calc(safe, al_eq_dis, false, params)
    }

    /// Like [`compute_core`](Self::compute_core) but always computes `∂R/∂C`
    /// so the rotation-derivative queries are available.
    pub fn compute_core_with_rotation_derivative(
        &mut self,
        safe: bool,
        al_eq_dis: bool,
        params: &SolverParams,
    ) -> RmsdResult<()> {
        self.do_core_calc(safe, al_eq_dis, true, params)
    }

    fn do_core_calc(
        &mut self,
        safe: bool,
        al_eq_dis: bool,
        with_derivative: bool,
        params: &SolverParams,
    ) -> RmsdResult<()> {
        let cp = self.positions_center.offset(&self.positions, self.align);
        let cr = self.reference_center.offset(self.reference, self.align);

        let moments = second_moments(&self.positions, &cp, self.reference, &cr, self.align);
        let rotation = OptimalRotation::solve(&key_matrix(&moments.cross), with_derivative, params)?;
        let r = rotation.rotation;

        let d: Vec<Vector3<f64>> = self
            .positions
            .iter()
            .zip(self.reference)
            .map(|(p, rf)| (p - cp) - r * (rf - cr))
            .collect();

        let ddist_dcov = match (&rotation.drotation_dcov, al_eq_dis) {
            (Some(drot), false) => {
                let mut ddist_drotation = Matrix3::zeros();
                for ((di, rf), &w) in d.iter().zip(self.reference).zip(self.displace) {
                    ddist_drotation += outer(di, &(rf - cr)) * (-2.0 * w);
                }
                let mut ddist_dcov = Matrix3::zeros();
                for a in 0..3 {
                    for b in 0..3 {
                        ddist_dcov += drot[a][b] * ddist_drotation[(a, b)];
                    }
                }
                Some(ddist_dcov)
            }
            _ => None,
        };

        self.stage = Stage::Computed(Core {
            safe,
            al_eq_dis,
            cpositions: cp,
            creference: cr,
            rr00: moments.positions,
            rr11: moments.reference,
            rotation,
            d,
            ddist_dcov,
        });
        Ok(())
    }

    fn core(&self) -> RmsdResult<&Core> {
        match &self.stage {
            Stage::Uninitialized => Err(RmsdError::NotComputed),
            Stage::Computed(core) | Stage::Measured(core, _) => Ok(core),
        }
    }

    fn measured(&self) -> RmsdResult<(&Core, Distance)> {
        match &self.stage {
            Stage::Uninitialized => Err(RmsdError::NotComputed),
            Stage::Computed(_) => Err(RmsdError::DistanceNotComputed),
            Stage::Measured(core, distance) => Ok((core, *distance)),
        }
    }

    fn msd(&self, core: &Core) -> f64 {
        if core.al_eq_dis && !core.safe {
            let msd = core.rotation.lambda0() + core.rr00 + core.rr11;
            if msd < 0.0 {
                debug!("Eigenvalue MSD {:e} below zero, clamped", msd);
                0.0
            } else {
                msd
            }
        } else {
            let weights = if core.al_eq_dis { self.align } else { self.displace };
            core.d
                .iter()
                .zip(weights)
                .map(|(d, &w)| d.norm_squared() * w)
                .sum()
        }
    }

    /// Compute the distance (MSD if `squared`, RMSD otherwise).
    ///
    /// The fast policy trusts the eigenvalue; the safe policy, and any call
    /// with differing weights, sums the explicit residuals.
    pub fn distance(&mut self, squared: bool) -> RmsdResult<f64> {
        let core = match std::mem::replace(&mut self.stage, Stage::Uninitialized) {
            Stage::Uninitialized => return Err(RmsdError::NotComputed),
            Stage::Computed(core) | Stage::Measured(core, _) => core,
        };
        let distance = Distance::new(self.msd(&core), squared);
        self.stage = Stage::Measured(core, distance);
        Ok(distance.value)
    }

    /// Derivatives of the distance with respect to the positions
    pub fn dpositions(&self) -> RmsdResult<Vec<Vector3<f64>>> {
        let (core, distance) = self.measured()?;
        let scale = distance.chain_factor()?;

        if core.al_eq_dis {
            // rotation and shift are stationary at the optimum
            return Ok(core
                .d
                .iter()
                .zip(self.align)
                .map(|(d, &w)| d * (2.0 * w * scale))
                .collect());
        }

        let ddist_dcov = core
            .ddist_dcov
            .ok_or(RmsdError::RotationDerivativeUnavailable)?;
        let mut derivatives = Vec::with_capacity(self.len());
        let mut ddist_dcpositions = Vector3::zeros();
        let mut csum = Vector3::zeros();
        for ((d, rf), (&dw, &aw)) in core
            .d
            .iter()
            .zip(self.reference)
            .zip(self.displace.iter().zip(self.align))
        {
            let frozen = d * (2.0 * dw);
            ddist_dcpositions -= frozen;
            let via_cov = ddist_dcov * (rf - core.creference) * aw;
            csum += via_cov;
            derivatives.push(frozen + via_cov);
        }

        let correction = ddist_dcpositions - csum;
        for (der, &aw) in derivatives.iter_mut().zip(self.align) {
            *der = (*der + correction * aw) * scale;
        }
        Ok(derivatives)
    }

    /// Derivatives of the distance with respect to the reference
    pub fn dreference(&self) -> RmsdResult<Vec<Vector3<f64>>> {
        let (core, distance) = self.measured()?;
        let scale = distance.chain_factor()?;
        let rt = core.rotation.rotation.transpose();

        if core.al_eq_dis {
            return Ok(core
                .d
                .iter()
                .zip(self.align)
                .map(|(d, &w)| -(rt * d) * (2.0 * w * scale))
                .collect());
        }

        let ddist_dcov_t = core
            .ddist_dcov
            .ok_or(RmsdError::RotationDerivativeUnavailable)?
            .transpose();
        let mut derivatives = Vec::with_capacity(self.len());
        let mut ddist_dcreference = Vector3::zeros();
        let mut csum = Vector3::zeros();
        for ((d, p), (&dw, &aw)) in core
            .d
            .iter()
            .zip(&self.positions)
            .zip(self.displace.iter().zip(self.align))
        {
            let frozen = rt * d * (2.0 * dw);
            ddist_dcreference += frozen;
            let via_cov = ddist_dcov_t * (p - core.cpositions) * aw;
            csum += via_cov;
            derivatives.push(via_cov - frozen);
        }

        let correction = ddist_dcreference - csum;
        for (der, &aw) in derivatives.iter_mut().zip(self.align) {
            *der = (*der + correction * aw) * scale;
        }
        Ok(derivatives)
    }

    /// Run the full optimal alignment: core, distance, both derivative fields
    pub fn optimal_alignment(
        mut self,
        safe: bool,
        al_eq_dis: bool,
        squared: bool,
        params: &SolverParams,
    ) -> RmsdResult<Alignment> {
        self.compute_core(safe, al_eq_dis, params)?;
        let distance = self.distance(squared)?;
        Ok(Alignment {
            distance,
            dpositions: self.dpositions()?,
            dreference: self.dreference()?,
        })
    }

    /// Centroid offset removed from the stored positions
    pub fn positions_center(&self) -> RmsdResult<Vector3<f64>> {
        Ok(self.core()?.cpositions)
    }

    /// Centroid offset removed from the stored reference
    pub fn reference_center(&self) -> RmsdResult<Vector3<f64>> {
        Ok(self.core()?.creference)
    }

    /// Eigen-decomposition, quaternion and rotation of this superposition
    pub fn optimal_rotation(&self) -> RmsdResult<&OptimalRotation> {
        Ok(&self.core()?.rotation)
    }

    pub fn centered_positions(&self) -> RmsdResult<Vec<Vector3<f64>>> {
        let cp = self.core()?.cpositions;
        Ok(self.positions.iter().map(|p| p - cp).collect())
    }

    pub fn centered_reference(&self) -> RmsdResult<Vec<Vector3<f64>>> {
        let cr = self.core()?.creference;
        Ok(self.reference.iter().map(|r| r - cr).collect())
    }

    /// Centered reference rotated into the positions frame
    pub fn aligned_reference_to_positions(&self) -> RmsdResult<Vec<Vector3<f64>>> {
        let core = self.core()?;
        Ok(self
            .positions
            .iter()
            .zip(&core.d)
            .map(|(p, d)| (p - core.cpositions) - d)
            .collect())
    }

    /// Centered positions rotated into the reference frame
    pub fn aligned_positions_to_reference(&self) -> RmsdResult<Vec<Vector3<f64>>> {
        let core = self.core()?;
        let rt = core.rotation.rotation.transpose();
        Ok(self
            .positions
            .iter()
            .map(|p| rt * (p - core.cpositions))
            .collect())
    }

    /// Rotation that superimposes the reference onto the positions
    pub fn rotation_reference_to_positions(&self) -> RmsdResult<Matrix3<f64>> {
        Ok(self.core()?.rotation.rotation)
    }

    /// Rotation that superimposes the positions onto the reference
    pub fn rotation_positions_to_reference(&self) -> RmsdResult<Matrix3<f64>> {
        Ok(self.core()?.rotation.rotation.transpose())
    }

    /// `∂R_ab/∂p_i` for the reference→positions rotation.
    ///
    /// With `inverse` the grid is transposed, giving the derivative of the
    /// positions→reference rotation.
    pub fn drotation_dpositions(&self, inverse: bool) -> RmsdResult<RotationDerivative> {
        let core = self.core()?;
        let drot = core
            .rotation
            .drotation_dcov
            .as_ref()
            .ok_or(RmsdError::RotationDerivativeUnavailable)?;

        let centered: Vec<Vector3<f64>> =
            self.reference.iter().map(|r| r - core.creference).collect();
        let csum = weighted_center(&centered, self.align);
        let v: Vec<Vector3<f64>> = centered
            .iter()
            .zip(self.align)
            .map(|(r, &w)| (r - csum) * w)
            .collect();

        Ok(std::array::from_fn(|a| {
            std::array::from_fn(|b| {
                let t = if inverse { drot[b][a] } else { drot[a][b] };
                v.iter().map(|vi| t * vi).collect()
            })
        }))
    }

    /// `∂R_ab/∂r_i` for the reference→positions rotation (transposed grid
    /// with `inverse`).
    pub fn drotation_dreference(&self, inverse: bool) -> RmsdResult<RotationDerivative> {
        let core = self.core()?;
        let drot = core
            .rotation
            .drotation_dcov
            .as_ref()
            .ok_or(RmsdError::RotationDerivativeUnavailable)?;

        let centered: Vec<Vector3<f64>> =
            self.positions.iter().map(|p| p - core.cpositions).collect();
        let csum = weighted_center(&centered, self.align);
        let v: Vec<Vector3<f64>> = centered
            .iter()
            .zip(self.align)
            .map(|(p, &w)| (p - csum) * w)
            .collect();

        Ok(std::array::from_fn(|a| {
            std::array::from_fn(|b| {
                let t = if inverse { drot[b][a] } else { drot[a][b] };
                let t = t.transpose();
                v.iter().map(|vi| t * vi).collect()
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn vecs(coords: &[[f64; 3]]) -> Vec<Vector3<f64>> {
        coords.iter().map(|c| Vector3::from(*c)).collect()
    }

    fn positions() -> Vec<Vector3<f64>> {
        vecs(&[
            [0.1, 0.2, -0.3],
            [1.2, -0.4, 0.5],
            [-0.7, 1.1, 0.3],
            [0.4, 0.9, -1.2],
            [1.5, 1.0, 0.8],
        ])
    }

    fn reference() -> Vec<Vector3<f64>> {
        vecs(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.1, 0.3],
            [-0.5, 1.3, 0.0],
            [0.6, 0.7, -1.0],
            [1.2, 1.4, 1.0],
        ])
    }

    const ALIGN: [f64; 5] = [0.1, 0.3, 0.2, 0.25, 0.15];
    const DISPLACE: [f64; 5] = [0.3, 0.1, 0.2, 0.15, 0.25];
    const UNIFORM: [f64; 5] = [0.2; 5];

    fn optimal(
        align: &[f64],
        displace: &[f64],
        pos: &[Vector3<f64>],
        reference: &[Vector3<f64>],
        safe: bool,
        squared: bool,
    ) -> Alignment {
        let al_eq_dis = align == displace;
        RmsdCoreData::new(align, displace, pos.to_vec(), reference)
            .unwrap()
            .optimal_alignment(safe, al_eq_dis, squared, &SolverParams::default())
            .unwrap()
    }

    /// Central-difference check of both derivative fields
    fn check_gradient<F>(eval: F, tolerance: f64)
    where
        F: Fn(&[Vector3<f64>], &[Vector3<f64>]) -> Alignment,
    {
        let pos = positions();
        let reference = reference();
        let analytic = eval(&pos, &reference);
        let eps = 1e-6;

        for i in 0..pos.len() {
            for k in 0..3 {
                let mut plus = pos.clone();
                plus[i][k] += eps;
                let mut minus = pos.clone();
                minus[i][k] -= eps;
                let numeric =
                    (eval(&plus, &reference).distance - eval(&minus, &reference).distance) / (2.0 * eps);
                assert_relative_eq!(analytic.dpositions[i][k], numeric, epsilon = tolerance);

                let mut plus = reference.clone();
                plus[i][k] += eps;
                let mut minus = reference.clone();
                minus[i][k] -= eps;
                let numeric = (eval(&pos, &plus).distance - eval(&pos, &minus).distance) / (2.0 * eps);
                assert_relative_eq!(analytic.dreference[i][k], numeric, epsilon = tolerance);
            }
        }
    }

    #[test]
    fn test_simple_gradient() {
        for squared in [true, false] {
            check_gradient(
                |p, r| simple_alignment(&ALIGN, &DISPLACE, p, r, squared).unwrap(),
                1e-6,
            );
        }
    }

    #[test]
    fn test_optimal_gradient_equal_weights() {
        for safe in [true, false] {
            for squared in [true, false] {
                check_gradient(|p, r| optimal(&UNIFORM, &UNIFORM, p, r, safe, squared), 1e-6);
            }
        }
    }

    #[test]
    fn test_optimal_gradient_different_weights() {
        for safe in [true, false] {
            for squared in [true, false] {
                check_gradient(|p, r| optimal(&ALIGN, &DISPLACE, p, r, safe, squared), 1e-6);
            }
        }
    }

    #[test]
    fn test_safe_and_fast_agree() {
        let safe = optimal(&UNIFORM, &UNIFORM, &positions(), &reference(), true, true);
        let fast = optimal(&UNIFORM, &UNIFORM, &positions(), &reference(), false, true);
        assert_relative_eq!(safe.distance, fast.distance, max_relative = 1e-8);
    }

    #[test]
    fn test_stage_errors() {
        let reference = reference();
        let mut core =
            RmsdCoreData::new(&UNIFORM, &UNIFORM, positions(), &reference).unwrap();
        assert_eq!(core.distance(true).unwrap_err(), RmsdError::NotComputed);
        assert_eq!(core.centered_positions().unwrap_err(), RmsdError::NotComputed);
        assert_eq!(core.rotation_reference_to_positions().unwrap_err(), RmsdError::NotComputed);

        core.compute_core(true, true, &SolverParams::default()).unwrap();
        assert_eq!(core.dpositions().unwrap_err(), RmsdError::DistanceNotComputed);
        assert_eq!(core.dreference().unwrap_err(), RmsdError::DistanceNotComputed);
        assert_eq!(
            core.drotation_dpositions(false).unwrap_err(),
            RmsdError::RotationDerivativeUnavailable
        );

        core.distance(false).unwrap();
        assert_eq!(core.dpositions().unwrap().len(), 5);
    }

    #[test]
    fn test_length_mismatch() {
        let reference = reference();
        let err = RmsdCoreData::new(&UNIFORM, &UNIFORM, positions()[..4].to_vec(), &reference)
            .unwrap_err();
        assert_eq!(err, RmsdError::LengthMismatch(4, 5));
        let err = simple_distance(&UNIFORM[..3], &UNIFORM, &positions(), &reference, true).unwrap_err();
        assert_eq!(err, RmsdError::LengthMismatch(3, 5));
    }

    #[test]
    fn test_identical_sets() {
        let reference = reference();
        for safe in [true, false] {
            let out = optimal(&UNIFORM, &UNIFORM, &reference, &reference, safe, true);
            assert!(out.distance.abs() < 1e-12);
            for d in out.dpositions.iter().chain(&out.dreference) {
                assert!(d.norm() < 1e-7, "derivative {d}");
            }
        }
        let out = simple_alignment(&UNIFORM, &UNIFORM, &reference, &reference, true).unwrap();
        assert_eq!(out.distance, 0.0);
    }

    #[test]
    fn test_zero_distance_sqrt_derivative() {
        let reference = reference();
        assert_eq!(
            simple_alignment(&UNIFORM, &UNIFORM, &reference, &reference, false).unwrap_err(),
            RmsdError::ZeroDistance
        );

        // a single point always superimposes exactly
        let single = vecs(&[[0.3, -0.2, 1.0]]);
        let w = [1.0];
        let mut core = RmsdCoreData::new(&w, &w, single.clone(), &single).unwrap();
        core.compute_core(true, true, &SolverParams::default()).unwrap();
        assert_eq!(core.distance(false).unwrap(), 0.0);
        assert_eq!(core.dpositions().unwrap_err(), RmsdError::ZeroDistance);
        assert_eq!(core.dreference().unwrap_err(), RmsdError::ZeroDistance);
    }

    #[test]
    fn test_recovers_rotation() {
        let reference = vecs(&[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        let pos = vecs(&[[0.0, 0.0, 0.0], [0.0, 2.0, 0.0]]);
        let w = [0.5, 0.5];
        let mut core = RmsdCoreData::new(&w, &w, pos.clone(), &reference).unwrap();
        core.compute_core(true, true, &SolverParams::default()).unwrap();
        assert!(core.distance(true).unwrap() < 1e-12);

        let r = core.rotation_reference_to_positions().unwrap();
        assert_relative_eq!(r * Vector3::new(2.0, 0.0, 0.0), Vector3::new(0.0, 2.0, 0.0), epsilon = 1e-10);
        assert_relative_eq!(
            core.rotation_positions_to_reference().unwrap(),
            r.transpose()
        );

        let aligned = core.aligned_reference_to_positions().unwrap();
        for (a, p) in aligned.iter().zip(core.centered_positions().unwrap()) {
            assert_relative_eq!(*a, p, epsilon = 1e-10);
        }
        let back = core.aligned_positions_to_reference().unwrap();
        for (b, r) in back.iter().zip(core.centered_reference().unwrap()) {
            assert_relative_eq!(*b, r, epsilon = 1e-10);
        }
        assert_relative_eq!(core.positions_center().unwrap(), Vector3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(core.reference_center().unwrap(), Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_removed_reference_center() {
        // A reference stored pre-centered gives the same answer as a raw one
        let raw = reference();
        let mut centered = raw.clone();
        let mut state = CenterState::Raw;
        state.recenter(&mut centered, &ALIGN);

        let a = RmsdCoreData::new(&ALIGN, &DISPLACE, positions(), &raw)
            .unwrap()
            .optimal_alignment(true, false, true, &SolverParams::default())
            .unwrap();
        let b = RmsdCoreData::new(&ALIGN, &DISPLACE, positions(), &centered)
            .unwrap()
            .with_reference_center(state)
            .optimal_alignment(true, false, true, &SolverParams::default())
            .unwrap();
        assert_relative_eq!(a.distance, b.distance, epsilon = 1e-12);
        for (x, y) in a.dpositions.iter().zip(&b.dpositions) {
            assert_relative_eq!(*x, *y, epsilon = 1e-10);
        }
        for (x, y) in a.dreference.iter().zip(&b.dreference) {
            assert_relative_eq!(*x, *y, epsilon = 1e-10);
        }
    }

    fn rotation_of(pos: &[Vector3<f64>], reference: &[Vector3<f64>]) -> Matrix3<f64> {
        let mut core = RmsdCoreData::new(&ALIGN, &ALIGN, pos.to_vec(), reference).unwrap();
        core.compute_core(true, true, &SolverParams::default()).unwrap();
        core.rotation_reference_to_positions().unwrap()
    }

    #[test]
    fn test_rotation_derivative_grids() {
        let pos = positions();
        let reference = reference();
        let mut core = RmsdCoreData::new(&ALIGN, &ALIGN, pos.clone(), &reference).unwrap();
        core.compute_core_with_rotation_derivative(true, true, &SolverParams::default())
            .unwrap();
        let dpos = core.drotation_dpositions(false).unwrap();
        let dref = core.drotation_dreference(false).unwrap();
        let dpos_inv = core.drotation_dpositions(true).unwrap();

        let eps = 1e-6;
        for i in 0..pos.len() {
            for x in 0..3 {
                let mut plus = pos.clone();
                plus[i][x] += eps;
                let mut minus = pos.clone();
                minus[i][x] -= eps;
                let dr_pos = (rotation_of(&plus, &reference) - rotation_of(&minus, &reference))
                    / (2.0 * eps);

                let mut plus = reference.clone();
                plus[i][x] += eps;
                let mut minus = reference.clone();
                minus[i][x] -= eps;
                let dr_ref = (rotation_of(&pos, &plus) - rotation_of(&pos, &minus)) / (2.0 * eps);

                for a in 0..3 {
                    for b in 0..3 {
                        assert_relative_eq!(dpos[a][b][i][x], dr_pos[(a, b)], epsilon = 1e-6);
                        assert_relative_eq!(dref[a][b][i][x], dr_ref[(a, b)], epsilon = 1e-6);
                        assert_eq!(dpos_inv[b][a][i], dpos[a][b][i]);
                    }
                }
            }
        }
    }
}
