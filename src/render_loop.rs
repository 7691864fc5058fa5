//! Per-frame orchestration: audio pull, shape selection, field update,
//! connection graph, camera and draw submission.

use glam::Mat4;
use std::time::{Duration, Instant};

use crate::audio::{AudioPipeline, BandPercentages};
use crate::camera::OrbitController;
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::field::{
    current_shape, segment_vertices, ConnectionGraph, LineVertex, ParticleField, ParticleInstance,
    ShapeState,
};
use crate::params::{ConnectionParams, FieldSettings, OrbitParams, RenderConfig};

/// Frames counted over rolling one-second windows
pub struct FpsCounter {
    window: Duration,
    window_start: Option<Instant>,
    frames: u32,
    fps: u32,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self {
            window: Duration::from_secs(1),
            window_start: None,
            frames: 0,
            fps: 0,
        }
    }

    /// Count a frame; returns the new rate when a window closes
    pub fn record_frame(&mut self, now: Instant) -> Option<u32> {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;

        let elapsed = now.saturating_duration_since(start);
        if elapsed < self.window {
            return None;
        }

        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        self.fps = (self.frames as f64 * 1000.0 / elapsed_ms).round() as u32;
        self.frames = 0;
        self.window_start = Some(now);
        Some(self.fps)
    }

    pub fn current_fps(&self) -> u32 {
        self.fps
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only state reported to the outside world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    pub fps: u32,
    pub band_levels: BandPercentages,
    pub particle_count: usize,
    pub shape: ShapeState,
    pub connection_count: usize,
}

/// Everything the draw step needs for one frame
pub struct FrameData<'a> {
    pub instances: &'a [ParticleInstance],
    pub lines: &'a [LineVertex],
    pub view_proj: Mat4,
    pub model: Mat4,
    pub particle_size: f32,
}

/// Where finished frames are submitted
pub trait DrawTarget {
    fn submit(&mut self, frame: &FrameData<'_>) -> Result<()>;

    fn resize(&mut self, width: u32, height: u32);
}

/// Owns all per-frame state and advances it one frame per `tick`.
///
/// Settings changes are validated when submitted and take effect at the
/// start of the next frame. Cancellation through the shutdown token is
/// honoured between frames: a frame already running is finished first.
pub struct RenderLoop {
    pipeline: AudioPipeline,
    settings: FieldSettings,
    pending: Option<FieldSettings>,
    field: ParticleField,
    graph: ConnectionGraph,
    connection_params: ConnectionParams,
    orbit: OrbitController,
    render_config: RenderConfig,
    fps: FpsCounter,
    telemetry: Telemetry,
    instances: Vec<ParticleInstance>,
    lines: Vec<LineVertex>,
    started_at: Option<Instant>,
    shutdown: CancelToken,
    torn_down: bool,
}

impl RenderLoop {
    /// Build the loop around an already configured pipeline
    pub fn new(
        settings: FieldSettings,
        mut pipeline: AudioPipeline,
        orbit_params: OrbitParams,
        render_config: RenderConfig,
    ) -> Result<Self> {
        settings.validate()?;
        pipeline.set_mode(settings.visualization_mode);
        let field = ParticleField::allocate(settings.density)?;

        Ok(Self {
            telemetry: Telemetry {
                fps: 0,
                band_levels: BandPercentages::default(),
                particle_count: field.count(),
                shape: ShapeState::Ambient,
                connection_count: 0,
            },
            pipeline,
            settings,
            pending: None,
            field,
            graph: ConnectionGraph::default(),
            connection_params: ConnectionParams::default(),
            orbit: OrbitController::new(orbit_params),
            render_config,
            fps: FpsCounter::new(),
            instances: Vec::new(),
            lines: Vec::new(),
            started_at: None,
            shutdown: CancelToken::new(),
            torn_down: false,
        })
    }

    pub fn settings(&self) -> &FieldSettings {
        // Pending changes are what the next frame will use
        self.pending.as_ref().unwrap_or(&self.settings)
    }

    /// Validate `settings` now and apply them at the start of the next frame
    pub fn apply_settings(&mut self, settings: FieldSettings) -> Result<()> {
        settings.validate()?;
        self.pending = Some(settings);
        Ok(())
    }

    pub fn orbit(&self) -> &OrbitController {
        &self.orbit
    }

    pub fn orbit_mut(&mut self) -> &mut OrbitController {
        &mut self.orbit
    }

    pub fn pipeline(&self) -> &AudioPipeline {
        &self.pipeline
    }

    pub fn field(&self) -> &ParticleField {
        &self.field
    }

    pub fn graph(&self) -> &ConnectionGraph {
        &self.graph
    }

    pub fn telemetry(&self) -> Telemetry {
        self.telemetry
    }

    /// Token that stops the loop after the current frame
    pub fn shutdown_token(&self) -> CancelToken {
        self.shutdown.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.torn_down && !self.shutdown.is_cancelled()
    }

    /// Track a new surface size; particle buffers and shape are untouched
    pub fn resize(&mut self, width: u32, height: u32, target: &mut dyn DrawTarget) {
        if self.render_config.resize(width, height) {
            target.resize(width, height);
        }
    }

    /// Run one frame. Returns whether another frame should be scheduled.
    pub fn tick(&mut self, now: Instant, target: &mut dyn DrawTarget) -> bool {
        if !self.is_running() {
            self.teardown();
            return false;
        }

        // 1. Frame timing
        if let Some(fps) = self.fps.record_frame(now) {
            self.telemetry.fps = fps;
            self.log_telemetry();
        }
        let started_at = *self.started_at.get_or_insert(now);
        let t = now.saturating_duration_since(started_at).as_secs_f32();

        // 2. Settings and audio
        self.apply_pending();
        self.pipeline.poll();
        let audio = self.pipeline.frame();

        // 3-4. Shape and field
        let mode = self.settings.visualization_mode;
        let shape = current_shape(mode, audio.bands.total);
        if self.field.needs_rebuild(self.settings.density, shape) {
            match ParticleField::allocate(self.settings.density) {
                Ok(field) => self.field = field,
                Err(e) => log::warn!("Keeping previous particle field: {}", e),
            }
        }
        self.field.update(
            shape,
            &audio.bands,
            t,
            mode,
            &audio.waveform,
            self.settings.color_intensity,
        );

        // 5. Connections
        if self.settings.connections_enabled {
            self.graph
                .rebuild(self.field.positions(), &self.connection_params);
        } else if !self.graph.is_empty() {
            self.graph.clear();
        }

        // 6. Camera
        self.orbit.advance_auto_yaw();

        // 7. Draw
        // Upload staging is reused across frames
        self.instances.clear();
        self.instances.extend(self.field.instances());
        self.lines.clear();
        self.lines.extend(segment_vertices(
            &self.graph,
            self.field.positions(),
            self.field.colors(),
        ));
        let frame = FrameData {
            instances: &self.instances,
            lines: &self.lines,
            view_proj: self.orbit.view_proj_matrix(&self.render_config),
            model: self.orbit.model_matrix(),
            particle_size: self.settings.particle_size,
        };
        if let Err(e) = target.submit(&frame) {
            log::warn!("Frame submission failed: {}", e);
        }

        self.telemetry.band_levels = audio.bands.percentages();
        self.telemetry.particle_count = self.field.count();
        self.telemetry.shape = shape;
        self.telemetry.connection_count = self.graph.len();

        // 8. Schedule the next frame unless shutdown arrived mid-frame
        if self.shutdown.is_cancelled() {
            self.teardown();
            return false;
        }
        true
    }

    fn apply_pending(&mut self) {
        let Some(next) = self.pending.take() else {
            return;
        };

        if next.source != self.settings.source {
            self.pipeline.select(next.source);
        }
        if next.visualization_mode != self.settings.visualization_mode {
            self.pipeline.set_mode(next.visualization_mode);
        }
        log::info!(
            "Settings: density={} size={:.1} intensity={} connections={} mode={:?} source={}",
            next.density,
            next.particle_size,
            next.color_intensity,
            next.connections_enabled,
            next.visualization_mode,
            next.source.label()
        );
        self.settings = next;
    }

    fn log_telemetry(&self) {
        let levels = self.telemetry.band_levels;
        log::info!(
            "FPS: {} | particles: {} | shape: {} | bass {}% mid {}% treble {}% | links: {}",
            self.telemetry.fps,
            self.telemetry.particle_count,
            self.telemetry.shape.label(),
            levels.bass,
            levels.mid,
            levels.treble,
            self.telemetry.connection_count
        );
    }

    /// Stop scheduling and release audio devices; safe to call repeatedly
    pub fn teardown(&mut self) {
        self.shutdown.cancel();
        if self.torn_down {
            log::debug!("Render loop already torn down");
            return;
        }
        self.pipeline.teardown();
        self.torn_down = true;
        log::info!("Render loop stopped");
    }
}
