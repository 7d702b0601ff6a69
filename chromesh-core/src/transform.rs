//! Model transform for displaying a normalized mesh
use nalgebra::{Matrix4, Vector3};

/// Rotation state around three axes (in radians)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RotationState {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Rotate by delta amounts (in radians)
    pub fn rotate(&mut self, dx: f32, dy: f32, dz: f32) {
        self.x += dx;
        self.y += dy;
        self.z += dz;
    }
}

impl Default for RotationState {
    fn default() -> Self {
        Self::zero()
    }
}

pub struct Transform;

impl Transform {
    /// Rotation applied in Z, Y, X order
    pub fn rotation_matrix(rotation: &RotationState) -> Matrix4<f32> {
        let rx = Matrix4::new_rotation(Vector3::new(rotation.x, 0.0, 0.0));
        let ry = Matrix4::new_rotation(Vector3::new(0.0, rotation.y, 0.0));
        let rz = Matrix4::new_rotation(Vector3::new(0.0, 0.0, rotation.z));
        rz * ry * rx
    }

    /// Model matrix for a normalized mesh: scale about the origin, then rotate.
    ///
    /// The mesh is already centered, so no translation is involved.
    pub fn model_matrix(rotation: &RotationState, scale_factor: f32) -> Matrix4<f32> {
        Self::rotation_matrix(rotation) * Matrix4::new_scaling(scale_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn test_rotation_state() {
        let mut state = RotationState::zero();
        state.rotate(0.1, 0.2, 0.3);
        assert_relative_eq!(state.x, 0.1);
        assert_relative_eq!(state.y, 0.2);
        assert_relative_eq!(state.z, 0.3);
    }

    #[test]
    fn test_identity_rotation() {
        let matrix = Transform::rotation_matrix(&RotationState::zero());
        assert!((matrix - Matrix4::identity()).norm() < 1e-6);
    }

    #[test]
    fn test_model_matrix_scales_then_rotates() {
        let rotation = RotationState::new(0.0, std::f32::consts::FRAC_PI_2, 0.0);
        let model = Transform::model_matrix(&rotation, 2.0);
        let p = model.transform_point(&Point3::new(1.0, 0.0, 0.0));
        // x axis rotated a quarter turn about y lands on -z
        assert_relative_eq!(p, Point3::new(0.0, 0.0, -2.0), epsilon = 1e-5);
    }
}
