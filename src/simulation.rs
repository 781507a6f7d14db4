//! The simulation driver.
//!
//! [`Simulation`] owns the GPU context, the presentation target (a window
//! surface or an offscreen texture), the [`AntPipeline`] and the clock. It is
//! driven one frame at a time from the redraw callback; every external event
//! (parameter change, pause, reset, resize) only records intent, which is
//! applied at the next frame boundary.

use std::sync::Arc;
use std::task::Poll;
use std::time::Instant;

use winit::window::Window;

use crate::canvas::{CanvasSize, ResizeTracker};
use crate::config::{ParamEffect, ParamValue, ParameterId, SimConfig};
use crate::double_buffer::ResourceId;
use crate::error::{GpuError, SimulationError};
use crate::gpu::readback::{centroid, decode_agents, Readback};
use crate::gpu::resources::{create_render_target, RenderTarget, TargetFormat};
use crate::gpu::GpuContext;
use crate::pipeline::{AntPipeline, FrameInputs, FrameTarget};
use crate::spawn::Agent;
use crate::time::Time;

/// What happened to a scheduled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The plan ran and the result was presented.
    Rendered,
    /// A pass broke the ping-pong invariant; nothing was submitted.
    Dropped,
    /// The surface had no frame to hand out; try again next redraw.
    Skipped,
}

struct SurfaceState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    id: ResourceId,
}

impl SurfaceState {
    fn resize(&mut self, gpu: &GpuContext, size: CanvasSize) {
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&gpu.device, &self.config);
    }
}

enum Presentation {
    Surface(SurfaceState),
    Offscreen(RenderTarget),
}

impl Presentation {
    fn format(&self) -> wgpu::TextureFormat {
        match self {
            Presentation::Surface(state) => state.config.format,
            Presentation::Offscreen(target) => target.format.to_wgpu(),
        }
    }
}

pub struct Simulation {
    config: SimConfig,
    gpu: GpuContext,
    presentation: Presentation,
    pipeline: Option<AntPipeline>,
    time: Time,
    resize: ResizeTracker,
    pending_reset: bool,
    readback: Option<Readback>,
    last_centroid: Option<[f32; 2]>,
    dropped_frames: u64,
}

impl Simulation {
    /// Build a simulation presenting to `window`.
    pub async fn with_window(
        config: SimConfig,
        window: Arc<Window>,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let canvas = CanvasSize::from(window.inner_size());

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window).map_err(GpuError::from)?;
        let gpu = GpuContext::new(&instance, Some(&surface)).await?;

        let caps = surface.get_capabilities(&gpu.adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or(GpuError::NoAdapter)?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: canvas.width,
            height: canvas.height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &surface_config);
        log::info!("surface configured: {format:?} {}x{}", canvas.width, canvas.height);

        let presentation = Presentation::Surface(SurfaceState {
            surface,
            config: surface_config,
            id: ResourceId::next(),
        });
        Self::assemble(config, gpu, presentation, canvas)
    }

    /// Build a simulation rendering into an offscreen 8-bit target.
    pub fn headless(config: SimConfig, canvas: CanvasSize) -> Result<Self, SimulationError> {
        config.validate()?;
        let gpu = GpuContext::headless()?;
        let target = create_render_target(&gpu, "Offscreen Display", canvas, TargetFormat::Rgba8);
        Self::assemble(config, gpu, Presentation::Offscreen(target), canvas)
    }

    fn assemble(
        config: SimConfig,
        gpu: GpuContext,
        presentation: Presentation,
        canvas: CanvasSize,
    ) -> Result<Self, SimulationError> {
        let pipeline = AntPipeline::new(&gpu, &config, canvas, presentation.format())?;
        Ok(Self {
            config,
            gpu,
            presentation,
            pipeline: Some(pipeline),
            time: Time::new(),
            resize: ResizeTracker::new(canvas),
            pending_reset: false,
            readback: None,
            last_centroid: None,
            dropped_frames: 0,
        })
    }

    /// Run one frame now.
    pub fn frame(&mut self) -> Result<FrameOutcome, SimulationError> {
        self.frame_at(Instant::now())
    }

    /// Run one frame as if it happened at `now`.
    pub fn frame_at(&mut self, now: Instant) -> Result<FrameOutcome, SimulationError> {
        if let Some(size) = self.resize.take_change() {
            self.apply_resize(size);
        }
        if self.pending_reset || self.pipeline.is_none() {
            self.rebuild()?;
        }

        let (elapsed_seconds, delta_time) = self.time.update_at(now);
        let inputs = FrameInputs {
            elapsed_seconds,
            delta_time,
            paused: self.time.is_paused(),
        };

        let outcome = match &self.presentation {
            Presentation::Surface(state) => {
                let frame = match state.surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        log::warn!("surface lost, reconfiguring");
                        state.surface.configure(&self.gpu.device, &state.config);
                        return Ok(FrameOutcome::Skipped);
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        log::warn!("timed out waiting for a surface frame");
                        return Ok(FrameOutcome::Skipped);
                    }
                    Err(e) => return Err(e.into()),
                };
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let target = FrameTarget {
                    view: &view,
                    id: state.id,
                };
                let outcome = record_and_submit(
                    &self.gpu,
                    self.pipeline.as_mut(),
                    inputs,
                    target,
                    &mut self.dropped_frames,
                );
                if outcome == FrameOutcome::Rendered {
                    frame.present();
                }
                outcome
            }
            Presentation::Offscreen(display) => {
                let target = FrameTarget {
                    view: &display.view,
                    id: display.id(),
                };
                record_and_submit(
                    &self.gpu,
                    self.pipeline.as_mut(),
                    inputs,
                    target,
                    &mut self.dropped_frames,
                )
            }
        };

        self.poll_readback();
        Ok(outcome)
    }

    fn apply_resize(&mut self, size: CanvasSize) {
        match &mut self.presentation {
            Presentation::Surface(state) => state.resize(&self.gpu, size),
            Presentation::Offscreen(target) => {
                *target = create_render_target(&self.gpu, "Offscreen Display", size, target.format);
            }
        }
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.resize(&self.gpu, size);
        }
    }

    /// Drop the current pipeline, then build a fresh one from the config.
    fn rebuild(&mut self) -> Result<(), SimulationError> {
        log::info!("resetting simulation");
        self.pipeline = None;
        self.readback = None;
        let canvas = self.resize.applied();
        let pipeline =
            AntPipeline::new(&self.gpu, &self.config, canvas, self.presentation.format())?;
        self.pipeline = Some(pipeline);
        self.pending_reset = false;
        self.time.reset();
        Ok(())
    }

    fn poll_readback(&mut self) {
        let Some(readback) = self.readback.as_mut() else {
            return;
        };
        let Poll::Ready(result) = readback.poll(&self.gpu.device) else {
            return;
        };
        self.readback = None;
        match result {
            Ok(bytes) => {
                let agents = decode_agents(&bytes);
                self.last_centroid = centroid(&agents);
                match self.last_centroid {
                    Some([x, y]) => {
                        log::info!("{} agents, centroid ({x:.1}, {y:.1})", agents.len())
                    }
                    None => log::info!("agent readback: population is empty"),
                }
            }
            Err(e) => log::warn!("agent readback failed: {e}"),
        }
    }

    /// Apply a parameter change from an external control.
    ///
    /// Live parameters reach the GPU before the next frame. Structural ones
    /// (`nbAgent`, `numBlurScales`, `initRadius`) schedule a reset.
    pub fn on_parameter_change(
        &mut self,
        id: &str,
        value: impl Into<ParamValue>,
    ) -> Result<ParamEffect, SimulationError> {
        let id: ParameterId = id.parse()?;
        let effect = self.config.apply(id, value.into())?;
        log::debug!("parameter {id} changed ({effect:?})");
        match effect {
            ParamEffect::Live => {
                if let Some(pipeline) = self.pipeline.as_mut() {
                    pipeline.apply_live(&self.gpu, id, &self.config);
                }
            }
            ParamEffect::RequiresReset => self.pending_reset = true,
        }
        Ok(effect)
    }

    /// Toggle pause and return the new state.
    pub fn on_pause(&mut self) -> bool {
        let paused = self.time.toggle_pause();
        log::info!("{}", if paused { "paused" } else { "resumed" });
        paused
    }

    /// Respawn every agent and clear every target at the next frame.
    pub fn on_reset(&mut self) {
        self.pending_reset = true;
    }

    /// Record a new canvas size; applied at the start of the next frame.
    pub fn request_resize(&mut self, size: CanvasSize) {
        self.resize.request(size);
    }

    /// Start a non-blocking readback of the agent buffer. The centroid is
    /// logged once it completes. Ignored while one is already in flight.
    pub fn request_agent_readback(&mut self) {
        if self.readback.is_some() {
            log::debug!("agent readback already in flight");
            return;
        }
        if let Some(pipeline) = &self.pipeline {
            self.readback = Some(Readback::agents(
                &self.gpu,
                pipeline.agents().current(),
                pipeline.population(),
            ));
        }
    }

    pub fn readback_pending(&self) -> bool {
        self.readback.is_some()
    }

    pub fn last_centroid(&self) -> Option<[f32; 2]> {
        self.last_centroid
    }

    /// Read the current agent state, blocking until the copy completes.
    pub fn read_agents(&self) -> Result<Vec<Agent>, SimulationError> {
        let Some(pipeline) = &self.pipeline else {
            return Ok(Vec::new());
        };
        let bytes = Readback::agents(&self.gpu, pipeline.agents().current(), pipeline.population())
            .wait(&self.gpu.device)?;
        Ok(decode_agents(&bytes))
    }

    /// Read every texel of `target`, blocking until the copy completes.
    pub fn read_texture(&self, target: &RenderTarget) -> Result<Vec<u8>, SimulationError> {
        Ok(Readback::texture(&self.gpu, target).wait(&self.gpu.device)?)
    }

    /// The offscreen presentation target, if this simulation is headless.
    pub fn display_target(&self) -> Option<&RenderTarget> {
        match &self.presentation {
            Presentation::Offscreen(target) => Some(target),
            Presentation::Surface(_) => None,
        }
    }

    pub fn pipeline(&self) -> Option<&AntPipeline> {
        self.pipeline.as_ref()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn time(&self) -> &Time {
        &self.time
    }

    pub fn time_mut(&mut self) -> &mut Time {
        &mut self.time
    }

    pub fn canvas(&self) -> CanvasSize {
        self.resize.applied()
    }

    pub fn is_paused(&self) -> bool {
        self.time.is_paused()
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }
}

fn record_and_submit(
    gpu: &GpuContext,
    pipeline: Option<&mut AntPipeline>,
    inputs: FrameInputs,
    target: FrameTarget<'_>,
    dropped_frames: &mut u64,
) -> FrameOutcome {
    let Some(pipeline) = pipeline else {
        return FrameOutcome::Skipped;
    };
    let plan = pipeline.plan(inputs.paused);
    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });

    match pipeline.execute(gpu, &mut encoder, &plan, inputs, target) {
        Ok(()) => {
            gpu.queue.submit(Some(encoder.finish()));
            FrameOutcome::Rendered
        }
        Err(e) => {
            *dropped_frames += 1;
            log::error!("dropping frame: {e}");
            FrameOutcome::Dropped
        }
    }
}
