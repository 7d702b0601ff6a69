//! ChroMesh terminal viewer
//!
//! Loads an OBJ, STL or PLY file, prints a summary and shows it as a
//! rotating ASCII rendering.
//! Controls:
//!   - WASD / Arrow Keys: Rotate
//!   - X/Y/Z: Toggle axis inversion
//!   - Space: Toggle auto-rotate
//!   - Q/ESC: Quit

use anyhow::{Context, Result};
use chromesh_core::{AxisFlags, Camera, DiskFile, IngestionGuard, PipelineConfig};
use chromesh_terminal::TerminalApp;
use clap::Parser;
use log::{debug, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "chromesh")]
#[command(about = "Load OBJ, STL and PLY meshes and view them in the terminal", long_about = None)]
struct Cli {
    /// Mesh file to load
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Print the mesh summary and exit
    #[arg(long)]
    info: bool,

    /// Mirror the mesh along X
    #[arg(long)]
    invert_x: bool,

    /// Mirror the mesh along Y
    #[arg(long)]
    invert_y: bool,

    /// Mirror the mesh along Z
    #[arg(long)]
    invert_z: bool,

    /// Start with the mesh spinning
    #[arg(long)]
    auto_rotate: bool,

    /// Pipeline configuration file (TOML)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::load()?,
    };
    debug!("Pipeline config: {:?}", config);

    let guard = Arc::new(IngestionGuard::new(config));
    // Nothing is loaded yet, so this only records the flags for the load below
    let _ = guard.set_inversions(AxisFlags::new(cli.invert_x, cli.invert_y, cli.invert_z));

    let file = DiskFile::open(&cli.input)
        .with_context(|| format!("failed to open {}", cli.input.display()))?;
    let camera = match crossterm::terminal::size() {
        Ok((columns, rows)) if !cli.info => Camera::for_terminal(columns, rows),
        _ => Camera::default(),
    };
    let mesh = guard.load(&file, &camera.view_params())?;

    let size = mesh.bounding_box.size();
    println!("File:      {}", file.path().display());
    println!("Vertices:  {}", mesh.vertex_count());
    println!("Triangles: {}", mesh.triangle_count());
    println!("Size:      {:.3} x {:.3} x {:.3}", size.x, size.y, size.z);
    println!("Scale:     {:.4}", mesh.scale_factor);

    if cli.info {
        return Ok(());
    }

    let title = file.path().file_name().map_or_else(
        || file.path().display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    );
    let mut app = TerminalApp::new(guard, title, cli.auto_rotate)?;
    app.run()
}
