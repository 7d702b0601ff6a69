//! Error types shared by every stage of the ingestion pipeline
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the core crate
pub type Result<T> = std::result::Result<T, IngestError>;

/// A failure at some stage of loading a mesh.
///
/// Every variant carries a human-readable detail string; `kind()` gives the
/// bare discriminant for callers that branch on the failure class.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported file type: {0}")]
    UnsupportedExtension(String),

    #[error("file too large: {0}")]
    FileTooLarge(String),

    #[error("file is empty: {0}")]
    EmptyFile(String),

    #[error("unsupported format variant: {0}")]
    UnsupportedVariant(String),

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("malformed geometry: {0}")]
    MalformedGeometry(String),

    #[error("truncated binary data: {0}")]
    TruncatedBinary(String),

    #[error("truncated body: {0}")]
    TruncatedBody(String),

    #[error("mesh contains no geometry: {0}")]
    EmptyMesh(String),

    #[error("a file is already being loaded")]
    LoadInProgress,

    #[error("no mesh is loaded")]
    NothingLoaded,

    #[error("failed to read {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode mesh: {0}")]
    Decode(String),
}

/// Discriminant of an [`IngestError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedExtension,
    FileTooLarge,
    EmptyFile,
    UnsupportedVariant,
    MalformedHeader,
    MalformedGeometry,
    TruncatedBinary,
    TruncatedBody,
    EmptyMesh,
    LoadInProgress,
    NothingLoaded,
    Io,
    Decode,
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::UnsupportedExtension(_) => ErrorKind::UnsupportedExtension,
            IngestError::FileTooLarge(_) => ErrorKind::FileTooLarge,
            IngestError::EmptyFile(_) => ErrorKind::EmptyFile,
            IngestError::UnsupportedVariant(_) => ErrorKind::UnsupportedVariant,
            IngestError::MalformedHeader(_) => ErrorKind::MalformedHeader,
            IngestError::MalformedGeometry(_) => ErrorKind::MalformedGeometry,
            IngestError::TruncatedBinary(_) => ErrorKind::TruncatedBinary,
            IngestError::TruncatedBody(_) => ErrorKind::TruncatedBody,
            IngestError::EmptyMesh(_) => ErrorKind::EmptyMesh,
            IngestError::LoadInProgress => ErrorKind::LoadInProgress,
            IngestError::NothingLoaded => ErrorKind::NothingLoaded,
            IngestError::Io { .. } => ErrorKind::Io,
            IngestError::Decode(_) => ErrorKind::Decode,
        }
    }

    /// Malformed geometry on a specific 1-based line
    pub(crate) fn at_line(line: usize, detail: impl fmt::Display) -> Self {
        IngestError::MalformedGeometry(format!("line {}: {}", line, detail))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Invalid pipeline configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {detail}")]
    Invalid { key: &'static str, detail: String },
}
