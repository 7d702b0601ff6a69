//! Single-flight file ingestion.
//!
//! An [`IngestionGuard`] validates a file, decodes it, normalizes the result
//! and publishes it as the one live mesh. Only one load may be in flight per
//! guard; a second request is rejected with
//! [`IngestError::LoadInProgress`] instead of being queued.
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{IngestError, Result};
use crate::format::{FileFormat, Format, ReadMode};
use crate::geometry::RawMesh;
use crate::normalize::{self, Axis, AxisFlags, NormalizedMesh, ViewParams};

/// A named, sized byte source, such as a file picked by the user
pub trait MeshFile {
    /// File name, used for extension detection
    fn name(&self) -> &str;

    /// Size in bytes, known before any content is read
    fn size(&self) -> u64;

    fn read_bytes(&self) -> io::Result<Vec<u8>>;

    fn read_text(&self) -> io::Result<String> {
        String::from_utf8(self.read_bytes()?)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// A file already held in memory
#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: String,
    bytes: Vec<u8>,
}

impl MemoryFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

impl MeshFile for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

/// A file on disk; its size comes from metadata so validation reads nothing
#[derive(Debug, Clone)]
pub struct DiskFile {
    path: PathBuf,
    name: String,
    size: u64,
}

impl DiskFile {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let size = std::fs::metadata(&path)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { path, name, size })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MeshFile for DiskFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    fn read_text(&self) -> io::Result<String> {
        std::fs::read_to_string(&self.path)
    }
}

/// Where a load currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Validating,
    Decoding,
    Normalizing,
    Published,
    /// A request made while another load was in flight. Only ever the
    /// outcome of that request; the guard keeps the in-flight phase.
    Rejected,
}

impl LoadPhase {
    /// Phase a single load request ended in
    pub fn outcome<T>(result: &Result<T>) -> LoadPhase {
        match result {
            Ok(_) => LoadPhase::Published,
            Err(IngestError::LoadInProgress) => LoadPhase::Rejected,
            Err(_) => LoadPhase::Idle,
        }
    }
}

type LoadingListener = Box<dyn Fn(bool) + Send + Sync>;
type PublishListener = Box<dyn Fn(&NormalizedMesh) + Send + Sync>;

/// The live mesh and the snapshot inversions are derived from
struct Session {
    original: Arc<RawMesh>,
    live: NormalizedMesh,
}

struct DisplayState {
    inversions: AxisFlags,
    session: Option<Session>,
}

/// Validates, decodes, normalizes and publishes mesh files one at a time
pub struct IngestionGuard {
    config: PipelineConfig,
    loading: AtomicBool,
    phase: Mutex<LoadPhase>,
    state: Mutex<DisplayState>,
    loading_listeners: Mutex<Vec<LoadingListener>>,
    publish_listeners: Mutex<Vec<PublishListener>>,
}

/// Holds the loading flag; clearing it on drop covers every exit path,
/// unwinding included
struct LoadingFlag<'a> {
    guard: &'a IngestionGuard,
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        {
            let mut phase = lock(&self.guard.phase);
            if *phase != LoadPhase::Published {
                *phase = LoadPhase::Idle;
            }
        }
        self.guard.loading.store(false, Ordering::SeqCst);
        self.guard.notify_loading(false);
    }
}

impl IngestionGuard {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            loading: AtomicBool::new(false),
            phase: Mutex::new(LoadPhase::Idle),
            state: Mutex::new(DisplayState {
                inversions: AxisFlags::default(),
                session: None,
            }),
            loading_listeners: Mutex::new(Vec::new()),
            publish_listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Progress of the current or last load.
    ///
    /// This is not a "mesh shown" flag: a failed load returns to `Idle` while
    /// the previously published mesh stays in [`current`](Self::current).
    pub fn phase(&self) -> LoadPhase {
        *lock(&self.phase)
    }

    /// The currently published mesh, if any
    pub fn current(&self) -> Option<NormalizedMesh> {
        lock(&self.state).session.as_ref().map(|s| s.live.clone())
    }

    pub fn inversions(&self) -> AxisFlags {
        lock(&self.state).inversions
    }

    /// Register a callback for loading flag changes.
    ///
    /// Callbacks run on the loading thread and must not register further
    /// listeners on this guard.
    pub fn on_loading_change(&self, listener: impl Fn(bool) + Send + Sync + 'static) {
        lock(&self.loading_listeners).push(Box::new(listener));
    }

    /// Register a callback run once for every published mesh
    pub fn on_publish(&self, listener: impl Fn(&NormalizedMesh) + Send + Sync + 'static) {
        lock(&self.publish_listeners).push(Box::new(listener));
    }

    /// Check a file's name and size without reading it
    pub fn validate(&self, file: &(impl MeshFile + ?Sized)) -> Result<FileFormat> {
        let format = FileFormat::from_filename(file.name())?;

        let size = file.size();
        if size > self.config.max_file_size {
            return Err(IngestError::FileTooLarge(format!(
                "{} is {:.1} MB, maximum size is {:.1} MB",
                file.name(),
                megabytes(size),
                megabytes(self.config.max_file_size)
            )));
        }
        if size == 0 {
            return Err(IngestError::EmptyFile(file.name().to_string()));
        }

        Ok(format)
    }

    /// Load using the camera from the pipeline configuration
    pub fn load_default(&self, file: &(impl MeshFile + ?Sized)) -> Result<NormalizedMesh> {
        let view = self.config.view.to_view_params();
        self.load(file, &view)
    }

    /// Validate, decode and normalize `file`, then publish it as the live mesh.
    ///
    /// Fails immediately with `LoadInProgress` if another load is running on
    /// this guard. Nothing is published unless every stage succeeds. A panic
    /// while reading or decoding is reported as `Decode`.
    pub fn load(&self, file: &(impl MeshFile + ?Sized), view: &ViewParams) -> Result<NormalizedMesh> {
        if self
            .loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Load of '{}' rejected, another file is loading", file.name());
            return Err(IngestError::LoadInProgress);
        }
        let _flag = LoadingFlag { guard: self };
        self.notify_loading(true);

        info!("Loading file '{}' ({} bytes)", file.name(), file.size());
        match self.run_load(file, view) {
            Ok(mesh) => {
                info!(
                    "Loaded '{}': {} vertices, {} triangles",
                    file.name(),
                    mesh.vertex_count(),
                    mesh.triangle_count()
                );
                self.notify_publish(&mesh);
                Ok(mesh)
            }
            Err(err) => {
                warn!("Failed to load '{}': {}", file.name(), err);
                Err(err)
            }
        }
    }

    fn run_load(&self, file: &(impl MeshFile + ?Sized), view: &ViewParams) -> Result<NormalizedMesh> {
        self.set_phase(LoadPhase::Validating);
        let family = self.validate(file)?;

        self.set_phase(LoadPhase::Decoding);
        let data = panic::catch_unwind(AssertUnwindSafe(|| read(file, family.read_mode())))
            .map_err(|payload| IngestError::Decode(panic_message(payload.as_ref())))??;
        let format = Format::resolve(family, &data)?;
        let decoded = panic::catch_unwind(|| format.decode(&data))
            .map_err(|payload| IngestError::Decode(panic_message(payload.as_ref())))??;
        debug!(
            "Decoded {} as {}: {} vertices, {} triangles",
            file.name(),
            format,
            decoded.vertex_count(),
            decoded.triangle_count()
        );

        self.set_phase(LoadPhase::Normalizing);
        let mut state = lock(&self.state);
        let (original, live) =
            normalize::normalize(&decoded, view, self.config.fill_ratio, state.inversions);
        state.session = Some(Session {
            original,
            live: live.clone(),
        });
        drop(state);

        self.set_phase(LoadPhase::Published);
        Ok(live)
    }

    /// Set one axis inversion and rebuild the live mesh from the original
    pub fn set_axis_inversion(&self, axis: Axis, enabled: bool) -> Result<NormalizedMesh> {
        let flags = self.inversions().with(axis, enabled);
        self.set_inversions(flags)
    }

    pub fn toggle_axis(&self, axis: Axis) -> Result<NormalizedMesh> {
        self.apply_inversions(|flags| flags.toggled(axis))
    }

    /// Replace all inversion flags at once.
    ///
    /// The flags are kept even when nothing is loaded, so they apply to the
    /// next mesh; the call still reports `NothingLoaded` in that case.
    pub fn set_inversions(&self, flags: AxisFlags) -> Result<NormalizedMesh> {
        self.apply_inversions(|_| flags)
    }

    fn apply_inversions(&self, update: impl FnOnce(AxisFlags) -> AxisFlags) -> Result<NormalizedMesh> {
        let mut state = lock(&self.state);
        let flags = update(state.inversions);
        state.inversions = flags;

        let session = state.session.as_mut().ok_or(IngestError::NothingLoaded)?;
        let live = normalize::rebuild(
            &session.original,
            flags,
            session.live.center,
            session.live.scale_factor,
        );
        session.live = live.clone();
        drop(state);

        debug!("Applied axis inversions {:?}", flags);
        self.notify_publish(&live);
        Ok(live)
    }

    /// Drop the live mesh and its original snapshot
    pub fn reset(&self) {
        lock(&self.state).session = None;
        let mut phase = lock(&self.phase);
        if *phase == LoadPhase::Published {
            *phase = LoadPhase::Idle;
        }
    }

    fn set_phase(&self, phase: LoadPhase) {
        debug!("Load phase: {:?}", phase);
        *lock(&self.phase) = phase;
    }

    fn notify_loading(&self, loading: bool) {
        for listener in lock(&self.loading_listeners).iter() {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(loading))).is_err() {
                warn!("Loading state listener panicked");
            }
        }
    }

    fn notify_publish(&self, mesh: &NormalizedMesh) {
        for listener in lock(&self.publish_listeners).iter() {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(mesh))).is_err() {
                warn!("Publish listener panicked");
            }
        }
    }
}

impl Default for IngestionGuard {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

fn read(file: &(impl MeshFile + ?Sized), mode: ReadMode) -> Result<Vec<u8>> {
    let result = match mode {
        ReadMode::Binary => file.read_bytes(),
        ReadMode::Text => file.read_text().map(String::into_bytes),
    };
    result.map_err(|source| {
        if source.kind() == io::ErrorKind::InvalidData {
            IngestError::MalformedGeometry(format!("{} is not valid UTF-8 text", file.name()))
        } else {
            IngestError::Io {
                name: file.name().to_string(),
                source,
            }
        }
    })
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "decoder panicked".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_FILE_SIZE;
    use crate::ErrorKind;
    use std::sync::atomic::AtomicUsize;

    const TRIANGLE_OBJ: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    /// Reports a size without holding that many bytes
    struct SizedFile {
        name: &'static str,
        size: u64,
    }

    impl MeshFile for SizedFile {
        fn name(&self) -> &str {
            self.name
        }

        fn size(&self) -> u64 {
            self.size
        }

        fn read_bytes(&self) -> io::Result<Vec<u8>> {
            panic!("validation must not read file content");
        }
    }

    #[test]
    fn test_validate_boundaries() {
        let guard = IngestionGuard::default();
        let ok = SizedFile { name: "a.obj", size: DEFAULT_MAX_FILE_SIZE };
        assert_eq!(guard.validate(&ok).unwrap(), FileFormat::Obj);

        let empty = SizedFile { name: "a.obj", size: 0 };
        assert_eq!(guard.validate(&empty).unwrap_err().kind(), ErrorKind::EmptyFile);

        let big = SizedFile { name: "a.stl", size: DEFAULT_MAX_FILE_SIZE + 1 };
        assert_eq!(guard.validate(&big).unwrap_err().kind(), ErrorKind::FileTooLarge);

        let fbx = SizedFile { name: "a.fbx", size: 10 };
        assert_eq!(guard.validate(&fbx).unwrap_err().kind(), ErrorKind::UnsupportedExtension);
    }

    #[test]
    fn test_load_publishes_mesh() {
        let guard = IngestionGuard::default();
        let file = MemoryFile::new("tri.obj", TRIANGLE_OBJ);
        let mesh = guard.load_default(&file).unwrap();

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.indices(), Some(&[0u32, 1, 2][..]));
        assert_eq!(guard.phase(), LoadPhase::Published);
        assert!(!guard.is_loading());
        assert!(Arc::ptr_eq(&guard.current().unwrap().mesh, &mesh.mesh));
    }

    #[test]
    fn test_failed_load_keeps_previous_mesh() {
        let guard = IngestionGuard::default();
        let first = guard.load_default(&MemoryFile::new("tri.obj", TRIANGLE_OBJ)).unwrap();

        let broken = MemoryFile::new("broken.obj", "v 0 0 0\nv 1 x 0\n");
        let err = guard.load_default(&broken).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedGeometry);
        assert_eq!(guard.phase(), LoadPhase::Idle);
        assert!(!guard.is_loading());
        assert!(Arc::ptr_eq(&guard.current().unwrap().mesh, &first.mesh));
    }

    #[test]
    fn test_failed_first_load_returns_to_idle() {
        let guard = IngestionGuard::default();
        let err = guard.load_default(&MemoryFile::new("none.ply", "ply\nformat ascii 1.0\n")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedHeader);
        assert_eq!(guard.phase(), LoadPhase::Idle);
        assert!(guard.current().is_none());
    }

    #[test]
    fn test_non_utf8_text_file() {
        let guard = IngestionGuard::default();
        let file = MemoryFile::new("bad.obj", vec![b'v', b' ', 0xff, 0xfe]);
        assert_eq!(guard.load_default(&file).unwrap_err().kind(), ErrorKind::MalformedGeometry);
    }

    #[test]
    fn test_toggle_rebuilds_from_original() {
        let guard = IngestionGuard::default();
        let loaded = guard.load_default(&MemoryFile::new("tri.obj", TRIANGLE_OBJ)).unwrap();

        let flipped = guard.toggle_axis(Axis::X).unwrap();
        assert!(flipped.inversions.x);
        assert_eq!(flipped.scale_factor, loaded.scale_factor);
        for (a, b) in flipped.positions().iter().step_by(3).zip(loaded.positions().iter().step_by(3)) {
            assert_eq!(*a, -*b);
        }

        let restored = guard.toggle_axis(Axis::X).unwrap();
        assert!(!restored.inversions.any());
        assert_eq!(restored.positions(), loaded.positions());
    }

    #[test]
    fn test_toggle_without_mesh() {
        let guard = IngestionGuard::default();
        let err = guard.set_axis_inversion(Axis::Y, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NothingLoaded);
        // the flag still applies to the next load
        let mesh = guard.load_default(&MemoryFile::new("tri.obj", TRIANGLE_OBJ)).unwrap();
        assert!(mesh.inversions.y);
    }

    #[test]
    fn test_listeners() {
        let guard = IngestionGuard::default();
        let flips = Arc::new(Mutex::new(Vec::new()));
        let published = Arc::new(AtomicUsize::new(0));

        let sink = Arc::clone(&flips);
        guard.on_loading_change(move |loading| sink.lock().unwrap().push(loading));
        let count = Arc::clone(&published);
        guard.on_publish(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        guard.on_publish(|_| panic!("misbehaving listener"));

        guard.load_default(&MemoryFile::new("tri.obj", TRIANGLE_OBJ)).unwrap();
        guard.toggle_axis(Axis::Z).unwrap();
        let _ = guard.load_default(&MemoryFile::new("x.obj", "nothing"));

        assert_eq!(*flips.lock().unwrap(), vec![true, false, true, false]);
        assert_eq!(published.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_request_outcome() {
        let guard = IngestionGuard::default();
        let ok = guard.load_default(&MemoryFile::new("tri.obj", TRIANGLE_OBJ));
        assert_eq!(LoadPhase::outcome(&ok), LoadPhase::Published);

        let failed = guard.load_default(&MemoryFile::new("a.obj", ""));
        assert_eq!(LoadPhase::outcome(&failed), LoadPhase::Idle);

        let busy: Result<()> = Err(IngestError::LoadInProgress);
        assert_eq!(LoadPhase::outcome(&busy), LoadPhase::Rejected);
    }

    #[test]
    fn test_reset_drops_mesh() {
        let guard = IngestionGuard::default();
        guard.load_default(&MemoryFile::new("tri.obj", TRIANGLE_OBJ)).unwrap();
        guard.reset();
        assert!(guard.current().is_none());
        assert_eq!(guard.phase(), LoadPhase::Idle);
    }
}
