//! Centering, auto-scaling and axis inversion.
//!
//! Every transform here is a pure function: it takes a mesh by reference and
//! returns a new one. Axis inversions are always re-derived from the
//! centered original, so toggling an axis any number of times reproduces the
//! original coordinates bit for bit.
use std::fmt;
use std::sync::Arc;

use log::debug;
use nalgebra::{Point3, Vector3};

use crate::geometry::{BoundingBox, RawMesh};

/// Share of the smaller visible viewport dimension the mesh should fill
pub const DEFAULT_FILL_RATIO: f32 = 0.6;

/// Camera parameters supplied by the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewParams {
    /// Vertical field of view in radians
    pub fov: f32,
    /// Distance from the camera to the origin
    pub distance: f32,
    /// Viewport width / height
    pub aspect: f32,
}

impl ViewParams {
    pub fn new(fov: f32, distance: f32, aspect: f32) -> Self {
        Self { fov, distance, aspect }
    }

    pub fn from_degrees(fov_degrees: f32, distance: f32, aspect: f32) -> Self {
        Self::new(fov_degrees.to_radians(), distance, aspect)
    }

    /// Visible (width, height) of the frustum at `distance`
    pub fn visible_extent(&self) -> (f32, f32) {
        let height = 2.0 * (self.fov / 2.0).tan() * self.distance;
        (height * self.aspect, height)
    }
}

impl Default for ViewParams {
    /// 75° perspective camera at (5, 5, 5) looking at the origin
    fn default() -> Self {
        Self::from_degrees(75.0, 75f32.sqrt(), 16.0 / 9.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn channel(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Which coordinate channels are negated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisFlags {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl AxisFlags {
    pub fn new(x: bool, y: bool, z: bool) -> Self {
        Self { x, y, z }
    }

    pub fn any(&self) -> bool {
        self.x || self.y || self.z
    }

    pub fn get(&self, axis: Axis) -> bool {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn with(mut self, axis: Axis, enabled: bool) -> Self {
        match axis {
            Axis::X => self.x = enabled,
            Axis::Y => self.y = enabled,
            Axis::Z => self.z = enabled,
        }
        self
    }

    pub fn toggled(self, axis: Axis) -> Self {
        self.with(axis, !self.get(axis))
    }

    fn signs(&self) -> [f32; 3] {
        let sign = |inverted: bool| if inverted { -1.0 } else { 1.0 };
        [sign(self.x), sign(self.y), sign(self.z)]
    }
}

/// A render-ready mesh together with the state derived from it
#[derive(Debug, Clone)]
pub struct NormalizedMesh {
    /// Displayed geometry: centered and inverted, but not scaled
    pub mesh: Arc<RawMesh>,
    /// Per-vertex normals of `mesh`
    pub normals: Arc<Vec<f32>>,
    pub bounding_box: BoundingBox,
    /// Translation that was removed from the decoded mesh
    pub center: Point3<f32>,
    /// Uniform scale the renderer should apply
    pub scale_factor: f32,
    pub inversions: AxisFlags,
}

impl NormalizedMesh {
    pub fn positions(&self) -> &[f32] {
        &self.mesh.positions
    }

    pub fn indices(&self) -> Option<&[u32]> {
        self.mesh.indices.as_deref()
    }

    pub fn vertex_count(&self) -> usize {
        self.mesh.vertex_count()
    }

    pub fn triangle_count(&self) -> usize {
        self.mesh.triangle_count()
    }
}

impl fmt::Display for NormalizedMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.bounding_box.size();
        write!(
            f,
            "Vertices: {}, Triangles: {}, Size: {:.3} x {:.3} x {:.3}, Scale: {:.4}",
            self.vertex_count(),
            self.triangle_count(),
            size.x,
            size.y,
            size.z,
            self.scale_factor
        )
    }
}

/// Translate `mesh` so its bounding box is centered on the origin.
///
/// Returns the translated copy and its new bounding box.
pub fn center(mesh: &RawMesh) -> (RawMesh, BoundingBox) {
    let offset = mesh.bounding_box().center().coords;
    let centered = translate(mesh, -offset);
    let bbox = centered.bounding_box();
    (centered, bbox)
}

fn translate(mesh: &RawMesh, offset: Vector3<f32>) -> RawMesh {
    let mut positions = mesh.positions.clone();
    for chunk in positions.chunks_exact_mut(3) {
        chunk[0] += offset.x;
        chunk[1] += offset.y;
        chunk[2] += offset.z;
    }
    RawMesh::new(positions, mesh.indices.clone())
}

/// Uniform scale that makes the largest box dimension fill `fill_ratio` of
/// the smaller visible viewport dimension.
///
/// Degenerate boxes (a single point, coincident vertices) and non-finite
/// camera input leave the scale at 1.
pub fn compute_scale(bbox: &BoundingBox, view: &ViewParams, fill_ratio: f32) -> f32 {
    let max_dim = bbox.max_dimension();
    if max_dim <= 0.0 || !max_dim.is_finite() {
        return 1.0;
    }

    let (width, height) = view.visible_extent();
    let target = width.min(height) * fill_ratio;
    let scale = target / max_dim;
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

/// Negate the selected coordinate channels of `original`.
///
/// Index buffers are shared unchanged, so inverting an odd number of axes
/// flips the apparent winding; the renderer draws both sides.
pub fn invert(original: &RawMesh, flags: AxisFlags) -> RawMesh {
    let mut positions = original.positions.clone();
    for axis in [Axis::X, Axis::Y, Axis::Z] {
        if !flags.get(axis) {
            continue;
        }
        for value in positions.iter_mut().skip(axis.channel()).step_by(3) {
            *value = -*value;
        }
    }
    RawMesh::new(positions, original.indices.clone())
}

/// Center a freshly decoded mesh and derive its display state.
///
/// Returns the centered, uninverted snapshot that later inversions start
/// from, alongside the mesh to publish.
pub fn normalize(
    decoded: &RawMesh,
    view: &ViewParams,
    fill_ratio: f32,
    inversions: AxisFlags,
) -> (Arc<RawMesh>, NormalizedMesh) {
    let offset = decoded.bounding_box().center();
    let (centered, bbox) = center(decoded);
    let scale_factor = compute_scale(&bbox, view, fill_ratio);
    debug!(
        "Centered mesh on ({:.3}, {:.3}, {:.3}), box size {:?}, scale {:.4}",
        offset.x,
        offset.y,
        offset.z,
        bbox.size().as_slice(),
        scale_factor
    );

    let original = Arc::new(centered);
    let normalized = rebuild(&original, inversions, offset, scale_factor);
    (original, normalized)
}

/// Build the displayed mesh from the centered original
pub fn rebuild(
    original: &Arc<RawMesh>,
    inversions: AxisFlags,
    center: Point3<f32>,
    scale_factor: f32,
) -> NormalizedMesh {
    let mesh = if inversions.any() {
        Arc::new(invert(original, inversions))
    } else {
        Arc::clone(original)
    };

    // Mirroring keeps the box origin-centered, only min/max swap sides
    let signs = inversions.signs();
    let base = original.bounding_box();
    let mut bounding_box = BoundingBox::empty();
    bounding_box.expand_to_include(&Point3::new(
        base.min.x * signs[0],
        base.min.y * signs[1],
        base.min.z * signs[2],
    ));
    bounding_box.expand_to_include(&Point3::new(
        base.max.x * signs[0],
        base.max.y * signs[1],
        base.max.z * signs[2],
    ));

    let normals = Arc::new(mesh.vertex_normals());
    NormalizedMesh {
        mesh,
        normals,
        bounding_box,
        center,
        scale_factor,
        inversions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn offset_cube() -> RawMesh {
        let cube = RawMesh::cube(2.0);
        translate(&cube, Vector3::new(10.0, -4.0, 3.5))
    }

    #[test]
    fn test_center_moves_box_to_origin() {
        let (centered, bbox) = center(&offset_cube());
        assert_relative_eq!(bbox.center(), Point3::origin(), epsilon = 1e-6);
        assert_relative_eq!(bbox.size(), Vector3::new(2.0, 2.0, 2.0), epsilon = 1e-6);
        assert_eq!(centered.indices, RawMesh::cube(2.0).indices);
    }

    #[test]
    fn test_center_is_idempotent() {
        let (once, first) = center(&offset_cube());
        let (twice, second) = center(&once);
        assert!(first.approx_eq(&second, 1e-6));
        for (a, b) in once.positions.iter().zip(&twice.positions) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_compute_scale() {
        let bbox = BoundingBox::new(Point3::new(-1.0, -0.5, -0.5), Point3::new(1.0, 0.5, 0.5));
        // 90° fov at distance 1 sees a 2 x 2 square; aspect 2 widens it to 4 x 2
        let view = ViewParams::from_degrees(90.0, 1.0, 2.0);
        let (width, height) = view.visible_extent();
        assert_relative_eq!(width, 4.0, epsilon = 1e-5);
        assert_relative_eq!(height, 2.0, epsilon = 1e-5);
        // target = 0.6 * min(4, 2) = 1.2, largest dimension 2
        assert_relative_eq!(compute_scale(&bbox, &view, DEFAULT_FILL_RATIO), 0.6, epsilon = 1e-5);
    }

    #[test]
    fn test_degenerate_box_keeps_identity_scale() {
        let point = RawMesh::soup(vec![3.0, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0]);
        let bbox = point.bounding_box();
        assert_eq!(compute_scale(&bbox, &ViewParams::default(), DEFAULT_FILL_RATIO), 1.0);
        assert_eq!(compute_scale(&BoundingBox::empty(), &ViewParams::default(), 0.6), 1.0);
    }

    #[test]
    fn test_invert_twice_restores_original_exactly() {
        let original = RawMesh::soup(vec![0.1, -0.7, 3.3, 1e-7, 2.5, -0.0, 9.9, 0.3, -4.2]);
        let flags = AxisFlags::new(true, false, false);
        let back = invert(&invert(&original, flags), flags);
        assert_eq!(back.positions, original.positions);
    }

    #[test]
    fn test_invert_selected_channels_only() {
        let original = RawMesh::soup(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let inverted = invert(&original, AxisFlags::new(false, true, true));
        assert_eq!(
            inverted.positions,
            vec![1.0, -2.0, -3.0, 4.0, -5.0, -6.0, 7.0, -8.0, -9.0]
        );
        // the input is untouched
        assert_eq!(original.positions[1], 2.0);
    }

    #[test]
    fn test_toggle_sequence_has_no_drift() {
        let (original, mut shown) = normalize(&offset_cube(), &ViewParams::default(), 0.6, AxisFlags::default());
        let mut flags = AxisFlags::default();
        for axis in [Axis::X, Axis::X, Axis::Y, Axis::Z, Axis::Y, Axis::Z] {
            flags = flags.toggled(axis);
            shown = rebuild(&original, flags, shown.center, shown.scale_factor);
        }
        assert!(!flags.any());
        assert_eq!(shown.positions(), original.positions.as_slice());
        assert!(Arc::ptr_eq(&shown.mesh, &original));
    }

    #[test]
    fn test_inverted_normals_follow_geometry() {
        let (original, _) = normalize(&RawMesh::cube(2.0), &ViewParams::default(), 0.6, AxisFlags::default());
        let plain = rebuild(&original, AxisFlags::default(), Point3::origin(), 1.0);
        let mirrored = rebuild(&original, AxisFlags::new(true, false, false), Point3::origin(), 1.0);
        // Vertex 6 sits at (+,+,+); its mirrored copy sits at (-,+,+).
        // Mirroring one axis reverses the winding, so the recomputed normal
        // keeps its x and flips y and z.
        assert!(plain.normals[18] > 0.0);
        assert!(mirrored.positions()[18] < 0.0);
        assert_relative_eq!(mirrored.normals[18], plain.normals[18], epsilon = 1e-6);
        assert_relative_eq!(mirrored.normals[19], -plain.normals[19], epsilon = 1e-6);
        assert_relative_eq!(mirrored.normals[20], -plain.normals[20], epsilon = 1e-6);
        assert!(mirrored.bounding_box.approx_eq(&plain.bounding_box, 1e-6));
    }

    #[test]
    fn test_normalize_records_center_and_scale() {
        let view = ViewParams::from_degrees(90.0, 1.0, 1.0);
        let (original, shown) = normalize(&offset_cube(), &view, 0.6, AxisFlags::default());
        assert_relative_eq!(shown.center, Point3::new(10.0, -4.0, 3.5), epsilon = 1e-5);
        assert_relative_eq!(shown.scale_factor, 0.6, epsilon = 1e-5);
        assert_relative_eq!(original.bounding_box().center(), Point3::origin(), epsilon = 1e-6);
    }
}
