//! Rigid-body transform from a superposition
//!
//! Exports the fitted rotation and translation so callers can move a
//! coordinate set into the reference frame without the derivative machinery.

use lin_alg::f64::{Mat4, Vec3};
use nalgebra::{Matrix3, Vector3};

/// Rotation followed by translation, mapping positions onto the reference
#[derive(Debug, Clone)]
pub struct RigidTransform {
    /// 3×3 rotation stored in the upper-left of a Mat4
    pub rotation: Mat4,
    /// Translation vector (applied after rotation)
    pub translation: Vec3,
    /// Distance of the fit that produced this transform
    pub rmsd: f64,
}

impl RigidTransform {
    pub fn new(rotation: &Matrix3<f64>, translation: &Vector3<f64>, rmsd: f64) -> Self {
        let r = rotation;
        // row-major: data[row*4 + col]
        let rotation = Mat4::new([
            r[(0, 0)], r[(0, 1)], r[(0, 2)], 0.0, // row 0
            r[(1, 0)], r[(1, 1)], r[(1, 2)], 0.0, // row 1
            r[(2, 0)], r[(2, 1)], r[(2, 2)], 0.0, // row 2
            0.0, 0.0, 0.0, 1.0, // row 3
        ]);
        RigidTransform {
            rotation,
            translation: Vec3::new(translation.x, translation.y, translation.z),
            rmsd,
        }
    }

    /// Transform `x → R·(x − from) + to`
    pub fn from_centers(
        rotation: &Matrix3<f64>,
        from: &Vector3<f64>,
        to: &Vector3<f64>,
        rmsd: f64,
    ) -> Self {
        Self::new(rotation, &(to - rotation * from), rmsd)
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        let r = &self.rotation.data;
        Matrix3::new(r[0], r[1], r[2], r[4], r[5], r[6], r[8], r[9], r[10])
    }

    pub fn translation_vector(&self) -> Vector3<f64> {
        Vector3::new(self.translation.x, self.translation.y, self.translation.z)
    }
}

/// Apply a rigid transform to coordinates in-place
pub fn apply_transform(coords: &mut [[f64; 3]], transform: &RigidTransform) {
    let r = &transform.rotation.data;
    let t = &transform.translation;
    for coord in coords.iter_mut() {
        let [x, y, z] = *coord;
        coord[0] = r[0] * x + r[1] * y + r[2] * z + t.x;
        coord[1] = r[4] * x + r[5] * y + r[6] * z + t.y;
        coord[2] = r[8] * x + r[9] * y + r[10] * z + t.z;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rot_z90() -> Matrix3<f64> {
        Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0)
    }

    #[test]
    fn test_identity() {
        let t = RigidTransform::new(&Matrix3::identity(), &Vector3::zeros(), 0.0);
        let mut coords = vec![[1.0, 2.0, 3.0], [-0.5, 0.0, 4.0]];
        let before = coords.clone();
        apply_transform(&mut coords, &t);
        assert_eq!(coords, before);
    }

    #[test]
    fn test_rotation_then_translation() {
        let t = RigidTransform::new(&rot_z90(), &Vector3::new(5.0, 3.0, 1.0), 0.0);
        let mut coords = vec![[1.0, 0.0, 0.0]];
        apply_transform(&mut coords, &t);
        assert_relative_eq!(coords[0][0], 5.0, epsilon = 1e-12);
        assert_relative_eq!(coords[0][1], 4.0, epsilon = 1e-12);
        assert_relative_eq!(coords[0][2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_matrix_roundtrip() {
        let t = RigidTransform::new(&rot_z90(), &Vector3::new(0.1, 0.2, 0.3), 0.5);
        assert_eq!(t.rotation_matrix(), rot_z90());
        assert_eq!(t.translation_vector(), Vector3::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn test_from_centers_maps_center() {
        let from = Vector3::new(1.0, 1.0, 0.0);
        let to = Vector3::new(-2.0, 0.5, 3.0);
        let t = RigidTransform::from_centers(&rot_z90(), &from, &to, 0.0);
        let mut coords = vec![[from.x, from.y, from.z]];
        apply_transform(&mut coords, &t);
        assert_relative_eq!(Vector3::from(coords[0]), to, epsilon = 1e-12);
    }
}
