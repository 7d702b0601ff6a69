//! File format detection and decoder dispatch
use std::fmt;
use std::path::Path;

use log::debug;

use crate::error::{IngestError, Result};
use crate::geometry::RawMesh;
use crate::{obj, ply, stl};

/// Extensions accepted by the pipeline, lowercase and without the dot
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["obj", "stl", "ply"];

/// Format family as declared by the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Obj,
    Stl,
    Ply,
}

/// How a file's payload has to be read before decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    Text,
    Binary,
}

impl FileFormat {
    /// Classify by trailing extension, case-insensitively
    pub fn from_filename(name: &str) -> Result<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("obj") => Ok(FileFormat::Obj),
            Some("stl") => Ok(FileFormat::Stl),
            Some("ply") => Ok(FileFormat::Ply),
            Some(other) => Err(IngestError::UnsupportedExtension(format!(
                ".{}. Supported formats: {}",
                other,
                supported_list()
            ))),
            None => Err(IngestError::UnsupportedExtension(format!(
                "'{}' has no extension. Supported formats: {}",
                name,
                supported_list()
            ))),
        }
    }

    /// STL and PLY are sniffed from raw bytes before any text conversion,
    /// since either may carry a binary body
    pub fn read_mode(self) -> ReadMode {
        match self {
            FileFormat::Stl | FileFormat::Ply => ReadMode::Binary,
            FileFormat::Obj => ReadMode::Text,
        }
    }
}

fn supported_list() -> String {
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Concrete encoding, resolved from the extension plus the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Obj,
    StlAscii,
    StlBinary,
    PlyAscii,
}

impl Format {
    /// Pick the concrete decoder for a payload of the given family
    pub fn resolve(family: FileFormat, data: &[u8]) -> Result<Self> {
        let format = match family {
            FileFormat::Obj => Format::Obj,
            FileFormat::Stl => {
                if stl::is_ascii(data) {
                    Format::StlAscii
                } else {
                    Format::StlBinary
                }
            }
            FileFormat::Ply => {
                ply::check_ascii(data)?;
                Format::PlyAscii
            }
        };
        debug!("Resolved {:?} payload of {} bytes as {}", family, data.len(), format);
        Ok(format)
    }

    pub fn decode(self, data: &[u8]) -> Result<RawMesh> {
        match self {
            Format::Obj => obj::decode(as_text(data)?),
            Format::StlAscii => stl::decode_ascii(as_text(data)?),
            Format::StlBinary => stl::decode_binary(data),
            Format::PlyAscii => ply::decode(as_text(data)?),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Obj => "OBJ",
            Format::StlAscii => "STL (ASCII)",
            Format::StlBinary => "STL (binary)",
            Format::PlyAscii => "PLY (ASCII)",
        };
        f.write_str(name)
    }
}

fn as_text(data: &[u8]) -> Result<&str> {
    std::str::from_utf8(data).map_err(|e| {
        IngestError::MalformedGeometry(format!("file is not valid UTF-8 text: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(FileFormat::from_filename("bunny.OBJ").unwrap(), FileFormat::Obj);
        assert_eq!(FileFormat::from_filename("part.Stl").unwrap(), FileFormat::Stl);
        assert_eq!(FileFormat::from_filename("scan.v2.ply").unwrap(), FileFormat::Ply);
    }

    #[test]
    fn test_classify_rejects_unknown() {
        let err = FileFormat::from_filename("model.fbx").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedExtension);
        assert!(err.to_string().contains(".fbx"));

        let err = FileFormat::from_filename("README").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedExtension);
    }

    #[test]
    fn test_read_mode() {
        assert_eq!(FileFormat::Stl.read_mode(), ReadMode::Binary);
        assert_eq!(FileFormat::Obj.read_mode(), ReadMode::Text);
        assert_eq!(FileFormat::Ply.read_mode(), ReadMode::Binary);
    }

    #[test]
    fn test_resolve_stl_by_content() {
        let ascii = b"solid t\nfacet normal 0 0 1\nouter loop\nvertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\nendloop\nendfacet\nendsolid t\n";
        assert_eq!(Format::resolve(FileFormat::Stl, ascii).unwrap(), Format::StlAscii);

        let mut binary = vec![0u8; 84];
        binary[..5].copy_from_slice(b"solid");
        assert_eq!(Format::resolve(FileFormat::Stl, &binary).unwrap(), Format::StlBinary);
    }

    #[test]
    fn test_resolve_rejects_binary_ply() {
        let data = b"ply\nformat binary_little_endian 1.0\nelement vertex 3\nend_header\n";
        let err = Format::resolve(FileFormat::Ply, data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVariant);

        // a binary body must not turn this into a text error
        let mut data = b"ply\nformat binary_little_endian 1.0\nelement vertex 1\nend_header\n".to_vec();
        data.extend_from_slice(&[0x00, 0x00, 0x80, 0x3f, 0xff, 0xff, 0xff, 0xff]);
        let err = Format::resolve(FileFormat::Ply, &data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVariant);
    }
}
