/// Terminal viewer for meshes loaded through an ingestion guard
use anyhow::{Context, Result};
use chromesh_core::{Axis, AxisFlags, Camera, IngestError, IngestionGuard, NormalizedMesh, RotationState};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use log::warn;
use std::io::{stdout, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub mod renderer;

pub use renderer::AsciiRenderer;

const ROTATION_STEP: f32 = 0.1;

/// Interactive viewer over the guard's published mesh
pub struct TerminalApp {
    guard: Arc<IngestionGuard>,
    title: String,
    mesh: NormalizedMesh,
    rotation: RotationState,
    camera: Camera,
    renderer: AsciiRenderer,
    auto_rotate: bool,
    status: Option<String>,
    running: bool,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalApp {
    /// Create a viewer for the mesh currently published by `guard`
    pub fn new(guard: Arc<IngestionGuard>, title: impl Into<String>, auto_rotate: bool) -> Result<Self> {
        let mesh = guard.current().ok_or(IngestError::NothingLoaded)?;
        let (width, height) = terminal::size().context("failed to query terminal size")?;

        Ok(Self {
            guard,
            title: title.into(),
            mesh,
            rotation: RotationState::new(0.3, 0.3, 0.0),
            camera: Camera::for_terminal(width, height),
            renderer: AsciiRenderer::new(width as usize, height as usize),
            auto_rotate,
            status: None,
            running: true,
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        let result = self.main_loop();

        terminal::disable_raw_mode()?;
        execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    fn main_loop(&mut self) -> Result<()> {
        let target_frame_time = Duration::from_millis(1000 / 30); // 30 FPS target

        while self.running {
            let frame_start = Instant::now();

            while event::poll(Duration::from_millis(0))? {
                self.handle_event(event::read()?);
            }

            self.update();
            self.render()?;

            // Frame timing
            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }

            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        Ok(())
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(KeyEvent { code, kind: KeyEventKind::Press, .. }) => self.handle_key(code),
            Event::Resize(width, height) => {
                self.camera = Camera::for_terminal(width, height);
                self.renderer.resize(width as usize, height as usize);
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('w') | KeyCode::Up => self.rotation.rotate(ROTATION_STEP, 0.0, 0.0),
            KeyCode::Char('s') | KeyCode::Down => self.rotation.rotate(-ROTATION_STEP, 0.0, 0.0),
            KeyCode::Char('a') | KeyCode::Left => self.rotation.rotate(0.0, -ROTATION_STEP, 0.0),
            KeyCode::Char('d') | KeyCode::Right => self.rotation.rotate(0.0, ROTATION_STEP, 0.0),
            KeyCode::Char(' ') => self.auto_rotate = !self.auto_rotate,
            KeyCode::Char('x') => self.toggle_axis(Axis::X),
            KeyCode::Char('y') => self.toggle_axis(Axis::Y),
            KeyCode::Char('z') => self.toggle_axis(Axis::Z),
            _ => {}
        }
    }

    fn toggle_axis(&mut self, axis: Axis) {
        match self.guard.toggle_axis(axis) {
            Ok(mesh) => {
                self.mesh = mesh;
                self.status = None;
            }
            Err(err) => {
                warn!("Axis toggle failed: {}", err);
                self.status = Some(err.to_string());
            }
        }
    }

    fn update(&mut self) {
        if self.auto_rotate {
            self.rotation.rotate(0.0, 0.015, 0.0);
        }
    }

    fn render(&mut self) -> Result<()> {
        self.renderer.clear();
        self.renderer.render_mesh(&self.mesh, &self.rotation, &self.camera);

        let mut stdout = stdout();
        self.renderer.draw(&mut stdout)?;

        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            SetForegroundColor(Color::Yellow),
            Print(format!(
                "ChroMesh | {} | FPS: {:.1} | Inverted: {} | Auto-rotate: {}",
                self.title,
                self.fps,
                inversion_label(self.mesh.inversions),
                if self.auto_rotate { "on" } else { "off" }
            )),
            cursor::MoveTo(0, 1),
            Print("WASD/Arrows=Rotate X/Y/Z=Invert Space=Auto-rotate Q=Quit")
        )?;
        if let Some(status) = &self.status {
            queue!(
                stdout,
                cursor::MoveTo(0, 2),
                terminal::Clear(ClearType::CurrentLine),
                SetForegroundColor(Color::Red),
                Print(status)
            )?;
        }
        queue!(stdout, ResetColor)?;

        stdout.flush()?;
        Ok(())
    }
}

/// Compact "x-z" style label of the inverted axes
pub fn inversion_label(flags: AxisFlags) -> String {
    [(flags.x, 'x'), (flags.y, 'y'), (flags.z, 'z')]
        .iter()
        .map(|&(on, name)| if on { name } else { '-' })
        .collect()
}
