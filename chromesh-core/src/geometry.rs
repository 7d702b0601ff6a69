//! Geometry primitives shared by the decoders and the normalizer
use nalgebra::{Point3, Vector3};

use crate::error::{IngestError, Result};

/// Decoder output: a flat position buffer and an optional flat index buffer.
///
/// Without indices the mesh is a triangle soup where every three
/// consecutive vertices form one triangle (STL).
#[derive(Debug, Clone, PartialEq)]
pub struct RawMesh {
    pub positions: Vec<f32>,
    pub indices: Option<Vec<u32>>,
}

impl RawMesh {
    pub fn new(positions: Vec<f32>, indices: Option<Vec<u32>>) -> Self {
        Self { positions, indices }
    }

    /// A triangle soup, as produced by STL
    pub fn soup(positions: Vec<f32>) -> Self {
        Self::new(positions, None)
    }

    pub fn indexed(positions: Vec<f32>, indices: Vec<u32>) -> Self {
        Self::new(positions, Some(indices))
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.vertex_count() / 3,
        }
    }

    pub fn vertex(&self, index: usize) -> Point3<f32> {
        let i = index * 3;
        Point3::new(self.positions[i], self.positions[i + 1], self.positions[i + 2])
    }

    /// Iterate triangles as vertex index triples
    pub fn triangles(&self) -> Box<dyn Iterator<Item = [usize; 3]> + '_> {
        match &self.indices {
            Some(indices) => Box::new(
                indices
                    .chunks_exact(3)
                    .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize]),
            ),
            None => Box::new((0..self.vertex_count() / 3).map(|t| [t * 3, t * 3 + 1, t * 3 + 2])),
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        for chunk in self.positions.chunks_exact(3) {
            bbox.expand_to_include(&Point3::new(chunk[0], chunk[1], chunk[2]));
        }
        bbox
    }

    /// Check the buffer invariants every decoder must uphold
    pub fn validate(&self) -> Result<()> {
        if self.positions.len() % 3 != 0 {
            return Err(IngestError::MalformedGeometry(format!(
                "position buffer length {} is not a multiple of 3",
                self.positions.len()
            )));
        }

        let vertex_count = self.vertex_count();
        if vertex_count == 0 {
            return Err(IngestError::EmptyMesh("no vertices".to_string()));
        }

        if let Some(bad) = self.positions.iter().position(|c| !c.is_finite()) {
            return Err(IngestError::MalformedGeometry(format!(
                "vertex {} has a non-finite coordinate",
                bad / 3
            )));
        }

        match &self.indices {
            Some(indices) => {
                if indices.len() % 3 != 0 {
                    return Err(IngestError::MalformedGeometry(format!(
                        "index buffer length {} is not a multiple of 3",
                        indices.len()
                    )));
                }
                if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                    return Err(IngestError::MalformedGeometry(format!(
                        "index {} out of range for {} vertices",
                        bad, vertex_count
                    )));
                }
            }
            None => {
                if vertex_count % 3 != 0 {
                    return Err(IngestError::MalformedGeometry(format!(
                        "{} vertices do not form whole triangles",
                        vertex_count
                    )));
                }
            }
        }

        Ok(())
    }

    /// Area-weighted per-vertex normals, flattened like `positions`
    pub fn vertex_normals(&self) -> Vec<f32> {
        let mut accum = vec![Vector3::<f32>::zeros(); self.vertex_count()];

        for [a, b, c] in self.triangles() {
            // Cross product length is twice the area, which gives the weighting
            let normal = face_normal(self.vertex(a), self.vertex(b), self.vertex(c));
            accum[a] += normal;
            accum[b] += normal;
            accum[c] += normal;
        }

        let mut normals = Vec::with_capacity(self.positions.len());
        for n in accum {
            let n = n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros);
            normals.extend_from_slice(&[n.x, n.y, n.z]);
        }
        normals
    }

    /// Unit cube centered at the origin, used as a fixture
    pub fn cube(size: f32) -> Self {
        let h = size / 2.0;
        #[rustfmt::skip]
        let positions = vec![
            -h, -h, -h,   h, -h, -h,   h,  h, -h,  -h,  h, -h,
            -h, -h,  h,   h, -h,  h,   h,  h,  h,  -h,  h,  h,
        ];
        #[rustfmt::skip]
        let indices = vec![
            4, 5, 6,  4, 6, 7, // front
            0, 3, 2,  0, 2, 1, // back
            3, 7, 6,  3, 6, 2, // top
            0, 1, 5,  0, 5, 4, // bottom
            1, 2, 6,  1, 6, 5, // right
            0, 4, 7,  0, 7, 3, // left
        ];
        Self::indexed(positions, indices)
    }
}

/// Unnormalized face normal (length is twice the triangle area)
pub fn face_normal(v0: Point3<f32>, v1: Point3<f32>, v2: Point3<f32>) -> Vector3<f32> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    edge1.cross(&edge2)
}

/// Fan-triangulate a polygon: (v0, vi, vi+1) for i in 1..k-1.
///
/// No convexity check is made, so concave polygons can come out with
/// overlapping triangles near the reflex vertex.
pub(crate) fn fan_triangulate(polygon: &[u32], out: &mut Vec<u32>) {
    for i in 1..polygon.len().saturating_sub(1) {
        out.extend_from_slice(&[polygon[0], polygon[i], polygon[i + 1]]);
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl BoundingBox {
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand_to_include(&mut self, point: &Point3<f32>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn max_dimension(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        self.size().max()
    }

    pub fn approx_eq(&self, other: &BoundingBox, tolerance: f32) -> bool {
        (self.min - other.min).amax() < tolerance && (self.max - other.max).amax() < tolerance
    }
}
