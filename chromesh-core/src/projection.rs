//! Perspective camera used by the viewers and for auto-scaling
use nalgebra::{Matrix4, Point3, Vector3};

use crate::normalize::ViewParams;

/// Perspective camera looking at the origin
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    /// Vertical field of view in radians
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Camera for a viewport of `width` x `height` pixels
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_aspect(width as f32 / height.max(1) as f32)
    }

    /// Camera for a terminal grid; cells are about twice as tall as wide
    pub fn for_terminal(columns: u16, rows: u16) -> Self {
        Self::with_aspect(columns as f32 / (rows.max(1) as f32 * 2.0))
    }

    fn with_aspect(aspect: f32) -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 5.0),
            target: Point3::origin(),
            up: Vector3::y(),
            fov: 75f32.to_radians(),
            aspect,
            near: 0.1,
            far: 1000.0,
        }
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).norm()
    }

    /// The parameters auto-scaling needs from this camera
    pub fn view_params(&self) -> ViewParams {
        ViewParams::new(self.fov, self.distance(), self.aspect)
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_perspective(self.aspect, self.fov, self.near, self.far)
    }

    /// Project a point to screen space, returning (x, y, depth).
    ///
    /// Points outside the view volume give `None`.
    pub fn project_to_screen(
        &self,
        point: &Point3<f32>,
        mvp: &Matrix4<f32>,
        width: usize,
        height: usize,
    ) -> Option<(f32, f32, f32)> {
        let clip = mvp * point.to_homogeneous();
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        if !(-1.0..=1.0).contains(&ndc.z) {
            return None;
        }

        let screen_x = (ndc.x + 1.0) * 0.5 * width as f32;
        let screen_y = (1.0 - ndc.y) * 0.5 * height as f32;
        Some((screen_x, screen_y, ndc.z))
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(800, 600)
    }
}
