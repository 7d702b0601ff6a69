//! ChroMesh Core - mesh file ingestion and normalization
//!
//! Decodes OBJ, STL (ASCII and binary) and ASCII PLY files into a common
//! vertex/index mesh, then centers, scales and optionally mirrors it for
//! display. Loading goes through an [`IngestionGuard`], which allows a
//! single load at a time and reports every failure as an [`IngestError`].

pub mod config;
pub mod error;
pub mod format;
pub mod geometry;
pub mod ingest;
pub mod normalize;
pub mod obj;
pub mod ply;
pub mod projection;
pub mod stl;
pub mod transform;

mod text;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{ConfigError, ErrorKind, IngestError, Result};
pub use format::{FileFormat, Format};
pub use geometry::{BoundingBox, RawMesh};
pub use ingest::{DiskFile, IngestionGuard, LoadPhase, MemoryFile, MeshFile};
pub use normalize::{Axis, AxisFlags, NormalizedMesh, ViewParams};
pub use projection::Camera;
pub use transform::{RotationState, Transform};
