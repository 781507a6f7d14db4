//! The assembled render pipeline.
//!
//! [`AntPipeline`] owns every GPU resource and stage for one configuration
//! and executes a [`FramePlan`] step by step into a single command encoder.
//! If a step would alias its input and output, the role slots saved at the
//! start of the frame are restored and the error is returned; the caller
//! drops the encoder so nothing of that frame reaches the GPU.

use crate::canvas::CanvasSize;
use crate::config::{ParameterId, SimConfig};
use crate::double_buffer::{DoubleBuffer, Identified, ResourceId};
use crate::error::PipelineError;
use crate::gpu::compositor::AgentCompositor;
use crate::gpu::kernel::{AgentKernel, KernelInputs, KernelParams};
use crate::gpu::resources::{
    create_agent_buffers, create_double_target, select_hdr_format, AgentBuffer, RenderTarget,
    TargetFormat,
};
use crate::gpu::stages::blur::BlurSettings;
use crate::gpu::stages::decay::DecaySettings;
use crate::gpu::stages::display::DisplaySettings;
use crate::gpu::stages::merge::MergeSettings;
use crate::gpu::stages::threshold::ThresholdSettings;
use crate::gpu::stages::{
    check_distinct, BlurPass, BlurStage, DecayStage, DisplayInputs, DisplayStage, MergeInputs,
    MergeStage, PipelineStage, StageIo, ThresholdStage,
};
use crate::gpu::GpuContext;
use crate::schedule::{FramePlan, Pair, PlanOptions, Resource, Roles, Stage, Step};
use crate::spawn::spawn_disc;

/// Per-frame values that are not part of the configuration.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs {
    pub elapsed_seconds: u32,
    pub delta_time: f32,
    pub paused: bool,
}

/// The presentation target of a frame.
pub struct FrameTarget<'a> {
    pub view: &'a wgpu::TextureView,
    pub id: ResourceId,
}

pub struct AntPipeline {
    config: SimConfig,
    canvas: CanvasSize,
    hdr_format: TargetFormat,
    agents: DoubleBuffer<AgentBuffer>,
    trail: DoubleBuffer<RenderTarget>,
    sensing: DoubleBuffer<RenderTarget>,
    kernel: AgentKernel,
    compositor: AgentCompositor,
    trail_decay: DecayStage,
    sensing_decay: DecayStage,
    threshold: ThresholdStage,
    blur: BlurStage,
    merge: MergeStage,
    display: DisplayStage,
}

impl AntPipeline {
    /// Allocate every resource and build every stage for `config`.
    pub fn new(
        gpu: &GpuContext,
        config: &SimConfig,
        canvas: CanvasSize,
        display_format: wgpu::TextureFormat,
    ) -> Result<Self, PipelineError> {
        let hdr_format = select_hdr_format(
            |format| gpu.supports_hdr_target(format),
            config.allow_fixed_point_fallback,
        )?;
        let num_scales = config.blur_scale_count();
        log::info!(
            "building pipeline: {} agents, {} blur scales, {}x{} canvas, {:?} trails",
            config.population,
            num_scales,
            canvas.width,
            canvas.height,
            hdr_format
        );

        let spawned = spawn_disc(config.population, canvas, config.init_radius, config.seed);
        let agents = create_agent_buffers(gpu, &spawned);
        let trail = create_double_target(gpu, "Trail", canvas, hdr_format);
        let sensing = create_double_target(gpu, "Sensing", canvas.sensing(), TargetFormat::Rgba8);

        let kernel = AgentKernel::init(gpu, ())?;
        let compositor = AgentCompositor::new(gpu, hdr_format, canvas)?;
        let trail_decay = DecayStage::init(
            gpu,
            DecaySettings {
                label: "Trail Decay",
                format: hdr_format,
                factor: config.decay_factor,
            },
        )?;
        let sensing_decay = DecayStage::init(
            gpu,
            DecaySettings {
                label: "Sensing Decay",
                format: TargetFormat::Rgba8,
                factor: config.sensing_decay_factor,
            },
        )?;
        let threshold = ThresholdStage::init(
            gpu,
            ThresholdSettings {
                size: canvas,
                format: hdr_format,
                threshold: config.saturation_threshold,
            },
        )?;
        let blur = BlurStage::init(
            gpu,
            BlurSettings {
                canvas,
                format: hdr_format,
                num_scales,
            },
        )?;
        let merge = MergeStage::init(
            gpu,
            MergeSettings {
                size: canvas,
                format: hdr_format,
                num_scales,
                bloom_intensity: config.bloom_intensity,
            },
        )?;
        let display = DisplayStage::init(
            gpu,
            DisplaySettings {
                format: display_format,
                background: config.background_color,
            },
        )?;

        Ok(Self {
            config: config.clone(),
            canvas,
            hdr_format,
            agents,
            trail,
            sensing,
            kernel,
            compositor,
            trail_decay,
            sensing_decay,
            threshold,
            blur,
            merge,
            display,
        })
    }

    pub fn roles(&self) -> Roles {
        Roles {
            trail: self.trail.slot(),
            sensing: self.sensing.slot(),
            agents: self.agents.slot(),
        }
    }

    fn restore_roles(&mut self, roles: Roles) {
        self.trail.set_slot(roles.trail);
        self.sensing.set_slot(roles.sensing);
        self.agents.set_slot(roles.agents);
    }

    pub fn plan(&self, paused: bool) -> FramePlan {
        FramePlan::build(
            self.roles(),
            PlanOptions {
                num_blur_scales: self.blur.num_scales(),
                second_decay: self.config.second_decay,
                paused,
            },
        )
    }

    /// Push a live parameter change to the stage that owns it.
    pub fn apply_live(&mut self, gpu: &GpuContext, id: ParameterId, config: &SimConfig) {
        match id {
            ParameterId::DecayFactor => {
                self.trail_decay.set_factor(&gpu.queue, config.decay_factor)
            }
            ParameterId::SensingDecayFactor => self
                .sensing_decay
                .set_factor(&gpu.queue, config.sensing_decay_factor),
            ParameterId::SaturationThreshold => self
                .threshold
                .set_threshold(&gpu.queue, config.saturation_threshold),
            ParameterId::BloomIntensity => self
                .merge
                .set_bloom_intensity(&gpu.queue, config.bloom_intensity),
            ParameterId::BackgroundColor => self.display.set_background(config.background_color),
            // read from the configuration every frame
            _ => {}
        }
        let population = self.config.population;
        let num_blur_scales = self.config.num_blur_scales;
        let init_radius = self.config.init_radius;
        self.config = SimConfig {
            population,
            num_blur_scales,
            init_radius,
            ..config.clone()
        };
    }

    /// Reallocate every canvas-sized resource. Agent state is kept.
    pub fn resize(&mut self, gpu: &GpuContext, canvas: CanvasSize) {
        if canvas == self.canvas {
            return;
        }
        log::info!("resizing pipeline to {}x{}", canvas.width, canvas.height);
        self.canvas = canvas;
        self.trail = create_double_target(gpu, "Trail", canvas, self.hdr_format);
        self.sensing = create_double_target(gpu, "Sensing", canvas.sensing(), TargetFormat::Rgba8);
        self.threshold.resize(gpu, canvas);
        self.blur.resize(gpu, canvas);
        self.merge.resize(gpu, canvas);
        self.compositor.resize(&gpu.queue, canvas);
    }

    /// Record every step of `plan` into `encoder`.
    pub fn execute(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        plan: &FramePlan,
        frame: FrameInputs,
        target: FrameTarget<'_>,
    ) -> Result<(), PipelineError> {
        let saved = self.roles();
        debug_assert_eq!(plan.start_roles(), saved, "plan built from stale roles");
        if !frame.paused {
            self.trail_decay.set_delta_time(&gpu.queue, frame.delta_time);
        }

        for step in plan.steps() {
            let result = match step {
                Step::Swap(pair) => {
                    self.swap(*pair);
                    Ok(())
                }
                Step::Pass {
                    stage,
                    reads,
                    writes,
                } => self.run_pass(gpu, encoder, *stage, reads, *writes, frame, &target),
            };
            if let Err(err) = result {
                self.restore_roles(saved);
                return Err(err);
            }
        }
        Ok(())
    }

    fn swap(&mut self, pair: Pair) {
        match pair {
            Pair::Trail => self.trail.swap(),
            Pair::Sensing => self.sensing.swap(),
            Pair::Agents => self.agents.swap(),
        }
    }

    /// Map an abstract resource to the GPU object it names right now.
    fn resolve(
        &self,
        stage: Stage,
        resource: Resource,
        surface: ResourceId,
    ) -> Result<ResourceId, PipelineError> {
        let missing = |scale| PipelineError::MissingScale {
            stage: stage.name(),
            scale,
            available: self.blur.num_scales(),
        };
        let id = match resource {
            Resource::Trail(slot) => self.trail.get(slot).id(),
            Resource::Sensing(slot) => self.sensing.get(slot).id(),
            Resource::Agents(slot) => self.agents.get(slot).id(),
            Resource::Threshold => self.threshold.output().id(),
            Resource::BlurDownscaled(i) => self.blur.downscaled(i).ok_or_else(|| missing(i))?.id(),
            Resource::BlurIntermediate(i) => {
                self.blur.intermediate(i).ok_or_else(|| missing(i))?.id()
            }
            Resource::BlurOutput(i) => self.blur.output(i).ok_or_else(|| missing(i))?.id(),
            Resource::Merged => self.merge.output().id(),
            Resource::Surface => surface,
        };
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_pass(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        stage: Stage,
        reads: &[Resource],
        writes: Resource,
        frame: FrameInputs,
        target: &FrameTarget<'_>,
    ) -> Result<(), PipelineError> {
        let read_ids = reads
            .iter()
            .map(|r| self.resolve(stage, *r, target.id))
            .collect::<Result<Vec<_>, _>>()?;
        let write_id = self.resolve(stage, writes, target.id)?;
        check_distinct(stage.name(), &read_ids, write_id)?;

        match stage {
            Stage::SensingDecay => self.sensing_decay.update(
                gpu,
                encoder,
                StageIo::new(self.sensing.current(), self.sensing.other()),
            ),
            Stage::TrailDecay | Stage::PostDecay => self.trail_decay.update(
                gpu,
                encoder,
                StageIo::new(self.trail.current(), self.trail.other()),
            ),
            Stage::Kernel => {
                let params = KernelParams::new(
                    &self.config,
                    self.canvas,
                    self.sensing.current().size,
                    frame.elapsed_seconds,
                    frame.delta_time,
                );
                self.kernel.update(
                    gpu,
                    encoder,
                    KernelInputs {
                        agents: &self.agents,
                        sensing: self.sensing.current(),
                        params,
                    },
                )
            }
            Stage::PaintTrail => {
                let sampled = [self.trail.current_id(), self.sensing.current_id()];
                self.compositor.paint_trail(
                    gpu,
                    encoder,
                    &self.config,
                    self.agents.current(),
                    self.trail.other(),
                    &sampled,
                );
                Ok(())
            }
            Stage::PaintSensing => {
                let sampled = [self.trail.current_id(), self.sensing.current_id()];
                self.compositor.paint_sensing(
                    gpu,
                    encoder,
                    &self.config,
                    self.agents.current(),
                    self.sensing.other(),
                    &sampled,
                );
                Ok(())
            }
            Stage::Threshold => self.threshold.update(gpu, encoder, self.trail.current()),
            Stage::Downscale(i) => {
                self.blur
                    .record(gpu, encoder, i, BlurPass::Downscale, self.threshold.output())
            }
            Stage::BlurHorizontal(i) => {
                self.blur
                    .record(gpu, encoder, i, BlurPass::Horizontal, self.threshold.output())
            }
            Stage::BlurVertical(i) => {
                self.blur
                    .record(gpu, encoder, i, BlurPass::Vertical, self.threshold.output())
            }
            Stage::Merge => self.merge.update(
                gpu,
                encoder,
                MergeInputs {
                    original: self.trail.current(),
                    scales: self.blur.outputs().collect(),
                },
            ),
            Stage::Display => self.display.update(
                gpu,
                encoder,
                DisplayInputs {
                    source: self.merge.output(),
                    target: target.view,
                    target_id: target.id,
                },
            ),
        }
    }

    /// The trail buffer holding the most recently painted agents.
    pub fn current_trail(&self) -> &RenderTarget {
        self.trail.current()
    }

    pub fn current_sensing(&self) -> &RenderTarget {
        self.sensing.current()
    }

    pub fn merged(&self) -> &RenderTarget {
        self.merge.output()
    }

    pub fn threshold_output(&self) -> &RenderTarget {
        self.threshold.output()
    }

    pub fn agents(&self) -> &DoubleBuffer<AgentBuffer> {
        &self.agents
    }

    pub fn trail_pair(&self) -> &DoubleBuffer<RenderTarget> {
        &self.trail
    }

    pub fn sensing_pair(&self) -> &DoubleBuffer<RenderTarget> {
        &self.sensing
    }

    pub fn compositor(&self) -> &AgentCompositor {
        &self.compositor
    }

    pub fn blur_sizes(&self) -> Vec<CanvasSize> {
        self.blur.scale_sizes()
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    pub fn hdr_format(&self) -> TargetFormat {
        self.hdr_format
    }

    pub fn population(&self) -> u32 {
        self.config.population
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }
}
