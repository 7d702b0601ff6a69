/// ChroMesh Web - WASM bindings for the ingestion pipeline
///
/// The browser hands over a picked file's name and bytes; the viewer decodes
/// and normalizes it and exposes flat buffers ready for a WebGL upload.
use chromesh_core::{Axis, IngestError, IngestionGuard, MemoryFile, NormalizedMesh, ViewParams};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WebViewer {
    guard: IngestionGuard,
}

#[wasm_bindgen]
impl WebViewer {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WebViewer {
        WebViewer {
            guard: IngestionGuard::default(),
        }
    }

    /// Load a file for a camera with the given vertical fov, distance from
    /// the origin and viewport aspect
    pub fn load(
        &self,
        name: String,
        bytes: Vec<u8>,
        fov_degrees: f32,
        distance: f32,
        aspect: f32,
    ) -> Result<(), JsValue> {
        let view = ViewParams::from_degrees(fov_degrees, distance, aspect);
        self.guard
            .load(&MemoryFile::new(name, bytes), &view)
            .map(|_| ())
            .map_err(to_js)
    }

    /// Toggle inversion of "x", "y" or "z"
    pub fn toggle_axis(&self, axis: &str) -> Result<(), JsValue> {
        let axis = parse_axis(axis).map_err(|e| JsValue::from_str(&e))?;
        self.guard.toggle_axis(axis).map(|_| ()).map_err(to_js)
    }

    /// Flat xyz positions of the displayed mesh; empty before the first load
    pub fn positions(&self) -> Vec<f32> {
        self.with_mesh(|mesh| mesh.positions().to_vec())
            .unwrap_or_default()
    }

    pub fn normals(&self) -> Vec<f32> {
        self.with_mesh(|mesh| mesh.normals.to_vec()).unwrap_or_default()
    }

    /// Triangle indices, or `undefined` for a triangle soup
    pub fn indices(&self) -> Option<Vec<u32>> {
        self.with_mesh(|mesh| mesh.indices().map(<[u32]>::to_vec))
            .flatten()
    }

    /// Uniform scale to apply on the mesh object; 1 before the first load
    pub fn scale_factor(&self) -> f32 {
        self.with_mesh(|mesh| mesh.scale_factor).unwrap_or(1.0)
    }

    /// Inversion flags as `[x, y, z]`, 1 for inverted
    pub fn inversions(&self) -> Vec<u8> {
        let flags = self.guard.inversions();
        vec![flags.x as u8, flags.y as u8, flags.z as u8]
    }

    pub fn is_loading(&self) -> bool {
        self.guard.is_loading()
    }

    pub fn reset(&self) {
        self.guard.reset();
    }
}

impl WebViewer {
    fn with_mesh<T>(&self, f: impl FnOnce(&NormalizedMesh) -> T) -> Option<T> {
        self.guard.current().as_ref().map(f)
    }
}

impl Default for WebViewer {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_axis(name: &str) -> Result<Axis, String> {
    match name.trim().to_ascii_lowercase().as_str() {
        "x" => Ok(Axis::X),
        "y" => Ok(Axis::Y),
        "z" => Ok(Axis::Z),
        other => Err(format!("InvalidAxis: expected x, y or z, got '{}'", other)),
    }
}

/// "<Kind>: <detail>" message handed to JavaScript
fn error_message(err: &IngestError) -> String {
    format!("{}: {}", err.kind(), err)
}

fn to_js(err: IngestError) -> JsValue {
    JsValue::from_str(&error_message(&err))
}
