//! Wavefront OBJ decoder.
//!
//! Only `v` and `f` records matter. Normals, texture coordinates, groups,
//! materials and comments are skipped, and polygons are fan-triangulated
//! from their first vertex.
use crate::error::{IngestError, Result};
use crate::geometry::{fan_triangulate, RawMesh};
use crate::text::{parse_vector3, strip_keyword};

pub fn decode(input: &str) -> Result<RawMesh> {
    let mut positions = Vec::new();
    let mut indices = Vec::new();
    let mut polygon = Vec::new();

    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();

        if let Some(rest) = strip_keyword(line, "v") {
            let v = parse_vector3(rest, line_no)?;
            positions.extend_from_slice(&v);
        } else if let Some(rest) = strip_keyword(line, "f") {
            let vertex_count = positions.len() / 3;
            polygon.clear();
            for token in rest.split_whitespace() {
                polygon.push(resolve_reference(token, vertex_count, line_no)?);
            }
            if polygon.len() < 3 {
                return Err(IngestError::at_line(
                    line_no,
                    format!("face needs at least 3 vertices, found {}", polygon.len()),
                ));
            }
            fan_triangulate(&polygon, &mut indices);
        }
    }

    if positions.is_empty() {
        return Err(IngestError::EmptyMesh("OBJ file has no vertex records".to_string()));
    }

    let mesh = RawMesh::indexed(positions, indices);
    mesh.validate()?;
    Ok(mesh)
}

/// Turn a face token (`7`, `7/2`, `7//3`, `-1/...`) into a 0-based index.
///
/// Negative references count back from the most recent vertex.
fn resolve_reference(token: &str, vertex_count: usize, line: usize) -> Result<u32> {
    let vertex = token.split('/').next().unwrap_or_default();
    let reference: i64 = vertex
        .parse()
        .map_err(|_| IngestError::at_line(line, format!("invalid vertex reference '{}'", token)))?;

    let resolved = match reference {
        r if r > 0 => r - 1,
        r if r < 0 => vertex_count as i64 + r,
        _ => {
            return Err(IngestError::at_line(line, "vertex reference 0 is not allowed"));
        }
    };

    if resolved < 0 || resolved >= vertex_count as i64 {
        return Err(IngestError::at_line(
            line,
            format!(
                "vertex reference {} out of range, {} vertices defined so far",
                reference, vertex_count
            ),
        ));
    }
    Ok(resolved as u32)
}
