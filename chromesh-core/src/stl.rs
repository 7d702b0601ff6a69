//! STL decoder for binary and ASCII payloads
use crate::error::{IngestError, Result};
use crate::geometry::RawMesh;
use crate::text::{parse_vector3, strip_keyword};

/// Bytes of free-form header preceding the triangle count
pub const HEADER_SIZE: usize = 80;

/// Bytes per binary triangle record: normal, three vertices, attribute count
pub const RECORD_SIZE: usize = 50;

/// Decode an STL payload, picking ASCII or binary from the content itself
pub fn decode(data: &[u8]) -> Result<RawMesh> {
    if is_ascii(data) {
        // is_ascii only succeeds for valid UTF-8
        let text = std::str::from_utf8(data)
            .map_err(|e| IngestError::MalformedGeometry(e.to_string()))?;
        decode_ascii(text)
    } else {
        decode_binary(data)
    }
}

/// Sniff whether a payload is ASCII STL.
///
/// Binary exporters frequently write `solid` into the 80-byte header, so the
/// keyword alone is not enough: the payload must also be UTF-8 text with at
/// least one `vertex` record.
pub fn is_ascii(data: &[u8]) -> bool {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    if !data[start..].starts_with(b"solid") {
        return false;
    }

    match std::str::from_utf8(data) {
        Ok(text) => text
            .lines()
            .any(|line| strip_keyword(line.trim_start(), "vertex").is_some()),
        Err(_) => false,
    }
}

/// Decode binary STL
pub fn decode_binary(data: &[u8]) -> Result<RawMesh> {
    if data.len() < HEADER_SIZE + 4 {
        return Err(IngestError::TruncatedBinary(format!(
            "{} bytes is too small for the {}-byte header and triangle count",
            data.len(),
            HEADER_SIZE + 4
        )));
    }

    // Read triangle count (4 bytes, little-endian)
    let triangle_count = read_u32(data, HEADER_SIZE) as usize;
    if triangle_count == 0 {
        return Err(IngestError::EmptyMesh("binary STL declares 0 triangles".to_string()));
    }

    let expected = triangle_count
        .checked_mul(RECORD_SIZE)
        .and_then(|n| n.checked_add(HEADER_SIZE + 4))
        .ok_or_else(|| {
            IngestError::TruncatedBinary(format!("triangle count {} is implausible", triangle_count))
        })?;
    if data.len() < expected {
        return Err(IngestError::TruncatedBinary(format!(
            "expected {} bytes for {} triangles, got {}",
            expected,
            triangle_count,
            data.len()
        )));
    }

    let mut positions = Vec::with_capacity(triangle_count * 9);
    let mut offset = HEADER_SIZE + 4;

    for _ in 0..triangle_count {
        // Skip normal (3 floats), readers recompute it
        offset += 12;

        // Read 3 vertices (9 floats)
        for _ in 0..9 {
            positions.push(read_f32(data, offset));
            offset += 4;
        }

        // Skip attribute byte count (2 bytes)
        offset += 2;
    }

    let mesh = RawMesh::soup(positions);
    mesh.validate()?;
    Ok(mesh)
}

/// Decode ASCII STL: every three `vertex` lines form one triangle
pub fn decode_ascii(input: &str) -> Result<RawMesh> {
    let mut positions = Vec::new();

    for (index, line) in input.lines().enumerate() {
        if let Some(rest) = strip_keyword(line.trim_start(), "vertex") {
            let v = parse_vector3(rest, index + 1)?;
            positions.extend_from_slice(&v);
        }
    }

    if positions.is_empty() {
        return Err(IngestError::EmptyMesh("ASCII STL has no vertex records".to_string()));
    }

    let mesh = RawMesh::soup(positions);
    mesh.validate()?;
    Ok(mesh)
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn read_f32(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}
