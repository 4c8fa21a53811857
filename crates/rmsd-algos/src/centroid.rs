//! Weighted centroids
//!
//! A stored point set carries a [`CenterState`] describing whether its
//! centroid is known and whether it has been subtracted in place. Removal
//! and restoration always go through the state so a centroid can never be
//! subtracted twice.

use nalgebra::Vector3;

use crate::{RmsdError, RmsdResult};

/// Weighted sum `Σ w_i · p_i`
///
/// This is the centroid only when the weights sum to one; callers normalize.
pub fn weighted_center(points: &[Vector3<f64>], weights: &[f64]) -> Vector3<f64> {
    points
        .iter()
        .zip(weights)
        .fold(Vector3::zeros(), |acc, (p, &w)| acc + p * w)
}

/// Subtract `center` from every point
pub fn remove_center(points: &mut [Vector3<f64>], center: &Vector3<f64>) {
    for p in points.iter_mut() {
        *p -= center;
    }
}

/// Add `center` back to every point (inverse of [`remove_center`])
pub fn add_center(points: &mut [Vector3<f64>], center: &Vector3<f64>) {
    for p in points.iter_mut() {
        *p += center;
    }
}

/// Centroid bookkeeping for one stored point set
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CenterState {
    /// Centroid not computed; points are stored as given
    #[default]
    Raw,
    /// Centroid computed; points are stored as given
    Known(Vector3<f64>),
    /// Centroid computed and subtracted from the stored points
    Removed(Vector3<f64>),
}

impl CenterState {
    /// The centroid, if it has been computed
    pub fn center(&self) -> Option<Vector3<f64>> {
        match *self {
            CenterState::Raw => None,
            CenterState::Known(c) | CenterState::Removed(c) => Some(c),
        }
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, CenterState::Removed(_))
    }

    /// Vector to subtract from the stored points to center them.
    ///
    /// Computes the centroid on the fly for a raw set; zero once removed.
    pub fn offset(&self, points: &[Vector3<f64>], weights: &[f64]) -> Vector3<f64> {
        match *self {
            CenterState::Raw => weighted_center(points, weights),
            CenterState::Known(c) => c,
            CenterState::Removed(_) => Vector3::zeros(),
        }
    }

    /// Compute and remember the centroid without touching the points.
    ///
    /// A removed centroid is kept as is: the stored points are already centered.
    pub fn calculate(&mut self, points: &[Vector3<f64>], weights: &[f64]) -> Vector3<f64> {
        match *self {
            CenterState::Removed(c) => c,
            CenterState::Raw | CenterState::Known(_) => {
                let c = weighted_center(points, weights);
                *self = CenterState::Known(c);
                c
            }
        }
    }

    /// Subtract the known centroid from the points. No-op if already removed.
    pub fn remove(&mut self, points: &mut [Vector3<f64>]) -> RmsdResult<()> {
        match *self {
            CenterState::Raw => Err(RmsdError::NotComputed),
            CenterState::Known(c) => {
                remove_center(points, &c);
                *self = CenterState::Removed(c);
                Ok(())
            }
            CenterState::Removed(_) => Ok(()),
        }
    }

    /// Add a removed centroid back to the points. No-op unless removed.
    pub fn restore(&mut self, points: &mut [Vector3<f64>]) {
        if let CenterState::Removed(c) = *self {
            add_center(points, &c);
            *self = CenterState::Known(c);
        }
    }

    /// Re-derive the centroid under new weights and remove it.
    ///
    /// A previously removed centroid is restored first, so repeated calls
    /// with the same weights leave the points unchanged.
    pub fn recenter(&mut self, points: &mut [Vector3<f64>], weights: &[f64]) {
        self.restore(points);
        let c = weighted_center(points, weights);
        remove_center(points, &c);
        *self = CenterState::Removed(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn points() -> Vec<Vector3<f64>> {
        vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(0.0, 4.0, 0.0),
            Vector3::new(0.0, 0.0, 8.0),
        ]
    }

    #[test]
    fn test_weighted_center() {
        let c = weighted_center(&points(), &[0.25; 4]);
        assert_relative_eq!(c, Vector3::new(0.5, 1.0, 2.0), epsilon = 1e-15);

        let c = weighted_center(&points(), &[0.0, 0.5, 0.5, 0.0]);
        assert_relative_eq!(c, Vector3::new(1.0, 2.0, 0.0), epsilon = 1e-15);
    }

    #[test]
    fn test_remove_add_inverse() {
        let mut pts = points();
        let c = Vector3::new(0.3, -1.7, 2.2);
        remove_center(&mut pts, &c);
        add_center(&mut pts, &c);
        for (a, b) in pts.iter().zip(points().iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_remove_requires_calculation() {
        let mut pts = points();
        let mut state = CenterState::Raw;
        assert_eq!(state.remove(&mut pts), Err(RmsdError::NotComputed));
        assert_eq!(pts, points());
    }

    #[test]
    fn test_double_remove_is_noop() {
        let mut pts = points();
        let mut state = CenterState::Raw;
        state.calculate(&pts, &[0.25; 4]);
        state.remove(&mut pts).unwrap();
        let once = pts.clone();
        state.remove(&mut pts).unwrap();
        assert_eq!(pts, once);
        assert!(state.is_removed());
        assert_relative_eq!(weighted_center(&pts, &[0.25; 4]).norm(), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_restore_returns_original() {
        let mut pts = points();
        let mut state = CenterState::Raw;
        state.recenter(&mut pts, &[0.1, 0.2, 0.3, 0.4]);
        state.restore(&mut pts);
        assert!(matches!(state, CenterState::Known(_)));
        for (a, b) in pts.iter().zip(points().iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-14);
        }
        // second restore must not add the center again
        state.restore(&mut pts);
        for (a, b) in pts.iter().zip(points().iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_recenter_idempotent() {
        let weights = [0.1, 0.2, 0.3, 0.4];
        let mut pts = points();
        let mut state = CenterState::Raw;
        state.recenter(&mut pts, &[0.25; 4]);
        state.recenter(&mut pts, &weights);
        let first = pts.clone();
        let first_center = state.center().unwrap();
        state.recenter(&mut pts, &weights);

        assert_relative_eq!(state.center().unwrap(), first_center, epsilon = 1e-14);
        assert_relative_eq!(first_center, weighted_center(&points(), &weights), epsilon = 1e-14);
        for (a, b) in pts.iter().zip(first.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_offset() {
        let pts = points();
        let w = [0.25; 4];
        assert_relative_eq!(CenterState::Raw.offset(&pts, &w), Vector3::new(0.5, 1.0, 2.0));
        let c = Vector3::new(1.0, 1.0, 1.0);
        assert_eq!(CenterState::Known(c).offset(&pts, &w), c);
        assert_eq!(CenterState::Removed(c).offset(&pts, &w), Vector3::zeros());
    }
}
