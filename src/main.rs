//! Pulsefield - audio-reactive 3D particle field
//!
//! Thousands of points breathe, swirl and regroup into spheres, cylinders
//! and crystals as the sound changes; drag to orbit, scroll to zoom.

mod cli;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use cli::{Args, LaunchConfig};
use pulsefield::audio::{list_devices, AudioPipeline};
use pulsefield::error::FieldError;
use pulsefield::params::OrbitParams;
use pulsefield::render_loop::RenderLoop;
use pulsefield::rendering::RenderSystem;

/// Main application state
struct App {
    // Window and rendering
    window: Option<Arc<Window>>,
    render_system: Option<RenderSystem>,

    render_loop: RenderLoop,
    launch: LaunchConfig,
    cursor: (f32, f32),

    // First fatal startup error, reported after the event loop exits
    startup_error: Option<anyhow::Error>,
}

impl App {
    fn new(launch: LaunchConfig) -> anyhow::Result<Self> {
        let mut pipeline =
            AudioPipeline::new(launch.analysis.clone()).context("Failed to create audio pipeline")?;
        pipeline.set_clip_path(launch.clip.clone());

        // Device failures leave the field running on silence
        match pipeline.configure(launch.settings.source) {
            Ok(()) => {}
            Err(FieldError::PermissionDenied) => {
                log::warn!("Microphone access denied; try --source synthetic-tone or sample-clip")
            }
            Err(e) if e.is_recoverable() => log::warn!("Audio source unavailable: {}", e),
            Err(e) => return Err(e).context("Failed to configure audio"),
        }

        let render_loop = RenderLoop::new(
            launch.settings.clone(),
            pipeline,
            OrbitParams::default(),
            launch.render.clone(),
        )
        .context("Invalid field settings")?;

        Ok(Self {
            window: None,
            render_system: None,
            render_loop,
            launch,
            cursor: (0.0, 0.0),
            startup_error: None,
        })
    }

    fn init_window(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_attributes = Window::default_attributes()
            .with_title("Pulsefield")
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.launch.render.window_width,
                self.launch.render.window_height,
            ));

        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .context("Failed to create window")?,
        );

        let render_system =
            pollster::block_on(RenderSystem::new(Arc::clone(&window), &self.launch.render))
                .context("Failed to initialise GPU")?;

        let size = window.inner_size();
        self.window = Some(window);
        self.render_system = Some(render_system);
        self.resize(size.width, size.height);

        log::info!("Pulsefield is running");
        log::info!("Drag to orbit, scroll to zoom | R reset | C connections | M mode | ESC quit");
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let Some(render_system) = self.render_system.as_mut() {
            self.render_loop.resize(width, height, render_system);
        }
    }

    fn on_key(&mut self, key: KeyCode, event_loop: &ActiveEventLoop) {
        match key {
            KeyCode::Escape => self.shutdown(event_loop),
            KeyCode::KeyR => self.render_loop.orbit_mut().reset(),
            KeyCode::KeyC => {
                let mut next = self.render_loop.settings().clone();
                next.connections_enabled = !next.connections_enabled;
                self.submit_settings(next);
            }
            KeyCode::KeyM => {
                let mut next = self.render_loop.settings().clone();
                next.visualization_mode = next.visualization_mode.toggled();
                self.submit_settings(next);
            }
            _ => {}
        }
    }

    fn submit_settings(&mut self, settings: pulsefield::params::FieldSettings) {
        if let Err(e) = self.render_loop.apply_settings(settings) {
            log::warn!("Rejected settings: {}", e);
        }
    }

    /// Render a single frame
    fn render_frame(&mut self, event_loop: &ActiveEventLoop) {
        let Some(render_system) = self.render_system.as_mut() else {
            return;
        };
        if !self.render_loop.tick(Instant::now(), render_system) {
            self.shutdown(event_loop);
        }
    }

    /// Stop frames, close audio devices, then drop GPU resources
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.render_loop.teardown();
        self.render_system = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if !self.render_loop.is_running() {
            return;
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized
        }

        if let Err(e) = self.init_window(event_loop) {
            self.startup_error = Some(e);
            self.shutdown(event_loop);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(key),
                        repeat: false,
                        ..
                    },
                ..
            } => self.on_key(key, event_loop),
            WindowEvent::Resized(size) => self.resize(size.width, size.height),
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
                self.render_loop
                    .orbit_mut()
                    .on_drag_move(self.cursor.0, self.cursor.1);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => self
                    .render_loop
                    .orbit_mut()
                    .on_drag_start(self.cursor.0, self.cursor.1),
                ElementState::Released => self.render_loop.orbit_mut().on_drag_end(),
            },
            WindowEvent::MouseWheel { delta, .. } => {
                // Wheel down moves away, matching page-scroll deltas in pixels
                let delta_y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y * 100.0,
                    MouseScrollDelta::PixelDelta(pos) => -pos.y as f32,
                };
                self.render_loop.orbit_mut().on_scroll(delta_y);
            }
            WindowEvent::RedrawRequested => self.render_frame(event_loop),
            _ => {}
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.list_devices {
        list_devices();
        return Ok(());
    }

    let launch = args.resolve()?;
    log::info!("Pulsefield - audio-reactive particle field");
    log::info!(
        "Source: {} | particles: {} | mode: {:?}",
        launch.settings.source.label(),
        launch.settings.density,
        launch.settings.visualization_mode
    );

    let mut app = App::new(launch)?;
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.run_app(&mut app).context("Event loop failed")?;

    match app.startup_error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
