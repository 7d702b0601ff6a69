/// ASCII rasterizer for terminal rendering
use chromesh_core::{geometry, Camera, NormalizedMesh, RotationState, Transform};
use crossterm::{
    cursor,
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use nalgebra::{Matrix4, Vector3};
use std::io::Write;

/// Character luminosity ramp for shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// ASCII renderer that converts normalized meshes to terminal characters
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    depth_buffer: Vec<f32>,
    char_buffer: Vec<char>,
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            depth_buffer: vec![f32::INFINITY; size],
            char_buffer: vec![' '; size],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Reallocate the buffers for a new terminal size
    pub fn resize(&mut self, width: usize, height: usize) {
        *self = Self::new(width, height);
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f32::INFINITY);
        self.char_buffer.fill(' ');
    }

    /// Character at a cell, `None` outside the grid
    pub fn char_at(&self, x: usize, y: usize) -> Option<char> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.char_buffer[y * self.width + x])
    }

    /// Rasterize every triangle of `mesh`, rotated and scaled by its
    /// scale factor, as seen from `camera`
    pub fn render_mesh(&mut self, mesh: &NormalizedMesh, rotation: &RotationState, camera: &Camera) {
        let model = Transform::model_matrix(rotation, mesh.scale_factor);
        let mvp = camera.projection_matrix() * camera.view_matrix() * model;
        let normal_matrix = Transform::rotation_matrix(rotation);

        for triangle in mesh.mesh.triangles() {
            self.render_triangle(mesh, triangle, &mvp, &normal_matrix, camera);
        }
    }

    fn render_triangle(
        &mut self,
        mesh: &NormalizedMesh,
        triangle: [usize; 3],
        mvp: &Matrix4<f32>,
        normal_matrix: &Matrix4<f32>,
        camera: &Camera,
    ) {
        let mut screen_coords = [(0.0, 0.0, 0.0); 3];
        for (slot, &index) in screen_coords.iter_mut().zip(&triangle) {
            match camera.project_to_screen(&mesh.mesh.vertex(index), mvp, self.width, self.height) {
                Some(coords) => *slot = coords,
                None => return, // Triangle is clipped
            }
        }

        let normal = normal_matrix.transform_vector(&triangle_normal(mesh, triangle));
        let character = shade(brightness(&normal));
        self.rasterize_triangle(&screen_coords, character);
    }

    fn rasterize_triangle(&mut self, coords: &[(f32, f32, f32); 3], character: char) {
        let (v0, v1, v2) = (coords[0], coords[1], coords[2]);

        // Bounding box
        let min_x = v0.0.min(v1.0).min(v2.0).floor() as i32;
        let max_x = v0.0.max(v1.0).max(v2.0).ceil() as i32;
        let min_y = v0.1.min(v1.1).min(v2.1).floor() as i32;
        let max_y = v0.1.max(v1.1).max(v2.1).ceil() as i32;

        // Clip to screen bounds
        let min_x = min_x.max(0);
        let max_x = max_x.min(self.width as i32 - 1);
        let min_y = min_y.max(0);
        let max_y = max_y.min(self.height as i32 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;

                let Some((w0, w1, w2)) =
                    barycentric((v0.0, v0.1), (v1.0, v1.1), (v2.0, v2.1), (px, py))
                else {
                    continue;
                };
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let depth = w0 * v0.2 + w1 * v1.2 + w2 * v2.2;
                let idx = y as usize * self.width + x as usize;
                if depth < self.depth_buffer[idx] {
                    self.depth_buffer[idx] = depth;
                    self.char_buffer[idx] = character;
                }
            }
        }
    }

    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let mut current = None;
        for y in 0..self.height {
            writer.queue(cursor::MoveTo(0, y as u16))?;
            for x in 0..self.width {
                let c = self.char_buffer[y * self.width + x];

                // Color based on character intensity
                let color = match c {
                    ' ' | '.' | ':' => Color::DarkGrey,
                    '-' | '=' => Color::Grey,
                    '+' | '*' => Color::White,
                    _ => Color::Cyan,
                };
                if current != Some(color) {
                    writer.queue(SetForegroundColor(color))?;
                    current = Some(color);
                }
                writer.queue(Print(c))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

/// Averaged vertex normal of a triangle, falling back to the face normal
/// where the vertex normals cancel out
fn triangle_normal(mesh: &NormalizedMesh, triangle: [usize; 3]) -> Vector3<f32> {
    let sum = triangle.iter().fold(Vector3::zeros(), |acc, &i| {
        acc + Vector3::new(
            mesh.normals[i * 3],
            mesh.normals[i * 3 + 1],
            mesh.normals[i * 3 + 2],
        )
    });
    sum.try_normalize(1e-6).unwrap_or_else(|| {
        let [a, b, c] = triangle.map(|i| mesh.mesh.vertex(i));
        geometry::face_normal(a, b, c)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::z)
    })
}

/// Lambert term against a light at the viewer.
///
/// Mirrored meshes have flipped winding, so both sides are lit.
fn brightness(normal: &Vector3<f32>) -> f32 {
    normal.z.abs().min(1.0)
}

/// Covered cells always get at least the dimmest visible character
fn shade(brightness: f32) -> char {
    let last = LUMINOSITY_RAMP.len() - 1;
    let index = (brightness * last as f32).round() as usize;
    LUMINOSITY_RAMP[index.clamp(1, last)]
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}
