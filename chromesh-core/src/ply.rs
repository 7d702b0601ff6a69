//! ASCII PLY decoder.
//!
//! The header is scanned for the `vertex` and `face` element counts; the body
//! holds that many vertex lines followed by that many face lines. Only the
//! first three tokens of a vertex line are used, whatever properties the
//! header declares.
use nom::{
    bytes::complete::{tag, take_till1},
    character::complete::{multispace0, multispace1, u64 as count},
    sequence::preceded,
    IResult,
};

use crate::error::{IngestError, Result};
use crate::geometry::{fan_triangulate, RawMesh};
use crate::text::parse_vector3;

#[derive(Debug, Default, PartialEq)]
struct Header {
    vertex_count: usize,
    face_count: usize,
}

/// Reject binary PLY by inspecting the `format` line, without requiring the
/// rest of the payload to be text
pub fn check_ascii(data: &[u8]) -> Result<()> {
    for raw in data.split(|&b| b == b'\n') {
        let Ok(line) = std::str::from_utf8(raw) else {
            continue;
        };
        let line = line.trim();
        if line == "end_header" {
            break;
        }
        if let Some(variant) = format_variant(line) {
            return check_variant(variant);
        }
    }
    Ok(())
}

fn format_variant(line: &str) -> Option<&str> {
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("format") => Some(tokens.next().unwrap_or("")),
        _ => None,
    }
}

fn check_variant(variant: &str) -> Result<()> {
    match variant {
        "ascii" => Ok(()),
        "binary_little_endian" | "binary_big_endian" => Err(IngestError::UnsupportedVariant(
            format!("PLY format '{}' is not supported, only ascii", variant),
        )),
        other => Err(IngestError::MalformedHeader(format!("unknown PLY format '{}'", other))),
    }
}

/// `element <name> <count>`
fn element(input: &str) -> IResult<&str, (&str, u64)> {
    let (input, _) = preceded(multispace0, tag("element"))(input)?;
    let (input, name) = preceded(multispace1, take_till1(|c: char| c.is_whitespace()))(input)?;
    let (input, n) = preceded(multispace1, count)(input)?;
    Ok((input, (name, n)))
}

pub fn decode(input: &str) -> Result<RawMesh> {
    let mut lines = input.lines().enumerate();

    match lines.next() {
        Some((_, magic)) if magic.trim() == "ply" => {}
        _ => return Err(IngestError::MalformedHeader("missing 'ply' magic line".to_string())),
    }

    let header = parse_header(&mut lines)?;
    if header.vertex_count == 0 {
        return Err(IngestError::EmptyMesh("PLY header declares 0 vertices".to_string()));
    }

    // Body lines, skipping blanks. Buffers grow with what is actually read,
    // header counts are untrusted.
    let mut body = lines
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let mut positions = Vec::new();
    for read in 0..header.vertex_count {
        let (line_no, line) = body.next().ok_or_else(|| {
            IngestError::TruncatedBody(format!(
                "expected {} vertices, found {}",
                header.vertex_count, read
            ))
        })?;
        positions.extend_from_slice(&parse_vector3(line, line_no)?);
    }

    let mut indices = Vec::new();
    let mut polygon = Vec::new();
    for read in 0..header.face_count {
        let (line_no, line) = body.next().ok_or_else(|| {
            IngestError::TruncatedBody(format!("expected {} faces, found {}", header.face_count, read))
        })?;
        parse_face(line, line_no, header.vertex_count, &mut polygon)?;
        fan_triangulate(&polygon, &mut indices);
    }

    let mesh = RawMesh::indexed(positions, indices);
    mesh.validate()?;
    Ok(mesh)
}

fn parse_header<'a>(lines: &mut impl Iterator<Item = (usize, &'a str)>) -> Result<Header> {
    let mut header = Header::default();

    for (index, line) in lines {
        let line = line.trim();
        if line == "end_header" {
            return Ok(header);
        }

        if let Some(variant) = format_variant(line) {
            check_variant(variant)?;
        } else if line.starts_with("element") {
            let (_, (name, n)) = element(line).map_err(|_| {
                IngestError::MalformedHeader(format!("line {}: invalid element '{}'", index + 1, line))
            })?;
            let n = usize::try_from(n).map_err(|_| {
                IngestError::MalformedHeader(format!("line {}: element count too large", index + 1))
            })?;
            match name {
                "vertex" => header.vertex_count = n,
                "face" => header.face_count = n,
                _ => {}
            }
        }
    }

    Err(IngestError::MalformedHeader("missing end_header".to_string()))
}

/// `<k> i0 i1 ... i(k-1)`, trailing per-face properties ignored
fn parse_face(line: &str, line_no: usize, vertex_count: usize, polygon: &mut Vec<u32>) -> Result<()> {
    let mut tokens = line.split_whitespace();
    let k: usize = tokens
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| IngestError::at_line(line_no, format!("invalid face record '{}'", line)))?;
    if k < 3 {
        return Err(IngestError::at_line(
            line_no,
            format!("face needs at least 3 vertices, found {}", k),
        ));
    }

    polygon.clear();
    for _ in 0..k {
        let index: u32 = tokens
            .next()
            .ok_or_else(|| IngestError::at_line(line_no, format!("face declares {} vertices", k)))?
            .parse()
            .map_err(|_| IngestError::at_line(line_no, format!("invalid face index in '{}'", line)))?;
        if index as usize >= vertex_count {
            return Err(IngestError::at_line(
                line_no,
                format!("face index {} out of range for {} vertices", index, vertex_count),
            ));
        }
        polygon.push(index);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    const TRIANGLE: &str = "ply
format ascii 1.0
comment made by hand
element vertex 3
property float x
property float y
property float z
element face 1
property list uchar int vertex_indices
end_header
0 0 0
1 0 0
0 1 0
3 0 1 2
";

    #[test]
    fn test_single_triangle() {
        let mesh = decode(TRIANGLE).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.positions, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(mesh.indices, Some(vec![0, 1, 2]));
    }

    #[test]
    fn test_quad_and_extra_properties() {
        let text = "ply\nformat ascii 1.0\nelement vertex 4\nproperty float x\nproperty float y\nproperty float z\nproperty uchar red\nelement face 1\nend_header\n0 0 0 255\n1 0 0 255\n1 1 0 255\n0 1 0 255\n4 0 1 2 3\n";
        let mesh = decode(text).unwrap();
        assert_eq!(mesh.indices, Some(vec![0, 1, 2, 0, 2, 3]));
    }

    #[test]
    fn test_missing_end_header() {
        let err = decode("ply\nformat ascii 1.0\nelement vertex 3\n0 0 0\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedHeader);
    }

    #[test]
    fn test_missing_magic() {
        let err = decode("format ascii 1.0\nend_header\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedHeader);
    }

    #[test]
    fn test_truncated_vertices() {
        let text = "ply\nformat ascii 1.0\nelement vertex 3\nelement face 0\nend_header\n0 0 0\n1 0 0\n";
        assert_eq!(decode(text).unwrap_err().kind(), ErrorKind::TruncatedBody);
    }

    #[test]
    fn test_huge_declared_count_is_truncated_body() {
        let text = "ply\nformat ascii 1.0\nelement vertex 4000000000000000\nelement face 0\nend_header\n0 0 0\n";
        assert_eq!(decode(text).unwrap_err().kind(), ErrorKind::TruncatedBody);

        let text = "ply\nformat ascii 1.0\nelement vertex 3\nelement face 18446744073709551615\nend_header\n0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n";
        assert_eq!(decode(text).unwrap_err().kind(), ErrorKind::TruncatedBody);
    }

    #[test]
    fn test_truncated_faces() {
        let text = "ply\nformat ascii 1.0\nelement vertex 3\nelement face 2\nend_header\n0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n";
        assert_eq!(decode(text).unwrap_err().kind(), ErrorKind::TruncatedBody);
    }

    #[test]
    fn test_binary_variant_rejected() {
        let text = "ply\nformat binary_big_endian 1.0\nelement vertex 3\nend_header\n";
        assert_eq!(decode(text).unwrap_err().kind(), ErrorKind::UnsupportedVariant);
        assert_eq!(
            check_ascii(b"ply\nformat binary_little_endian 1.0\nend_header\n\xff\xfe").unwrap_err().kind(),
            ErrorKind::UnsupportedVariant
        );
        assert!(check_ascii(TRIANGLE.as_bytes()).is_ok());
    }

    #[test]
    fn test_face_index_out_of_range() {
        let text = "ply\nformat ascii 1.0\nelement vertex 3\nelement face 1\nend_header\n0 0 0\n1 0 0\n0 1 0\n3 0 1 3\n";
        assert_eq!(decode(text).unwrap_err().kind(), ErrorKind::MalformedGeometry);
    }

    #[test]
    fn test_zero_vertices() {
        let text = "ply\nformat ascii 1.0\nelement vertex 0\nend_header\n";
        assert_eq!(decode(text).unwrap_err().kind(), ErrorKind::EmptyMesh);
    }

    #[test]
    fn test_element_parser() {
        assert_eq!(element("element vertex 8").unwrap().1, ("vertex", 8));
        assert!(element("element vertex eight").is_err());
    }
}
