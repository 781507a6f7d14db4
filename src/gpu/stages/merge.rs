//! Bloom merge: `original + intensity * sum(weight_i * scale_i)`.

use super::{check_distinct, FullscreenPass, PipelineStage};
use crate::canvas::CanvasSize;
use crate::double_buffer::ResourceId;
use crate::error::PipelineError;
use crate::gpu::resources::{create_render_target, RenderTarget, TargetFormat};
use crate::gpu::{shaders, GpuContext};

pub struct MergeSettings {
    pub size: CanvasSize,
    pub format: TargetFormat,
    pub num_scales: u32,
    pub bloom_intensity: f32,
}

pub struct MergeInputs<'a> {
    pub original: &'a RenderTarget,
    pub scales: Vec<&'a RenderTarget>,
}

/// Merge kernel generated for a fixed number of scales.
pub struct MergeStage {
    pass: FullscreenPass,
    params: wgpu::Buffer,
    output: RenderTarget,
    num_scales: u32,
    weights: Vec<f32>,
    bloom_intensity: f32,
}

impl MergeStage {
    pub fn output(&self) -> &RenderTarget {
        &self.output
    }

    pub fn bloom_intensity(&self) -> f32 {
        self.bloom_intensity
    }

    pub fn set_bloom_intensity(&mut self, queue: &wgpu::Queue, intensity: f32) {
        self.bloom_intensity = intensity;
        self.upload(queue);
    }

    pub fn resize(&mut self, gpu: &GpuContext, size: CanvasSize) {
        self.output = create_render_target(gpu, "Merge Target", size, self.output.format);
    }

    /// `[intensity, pad, pad, pad]` followed by one `vec4` per scale weight.
    fn uniform_bytes(&self) -> Vec<u8> {
        let mut words: Vec<f32> = vec![self.bloom_intensity, 0.0, 0.0, 0.0];
        for w in &self.weights {
            words.extend_from_slice(&[*w, 0.0, 0.0, 0.0]);
        }
        bytemuck::cast_slice(&words).to_vec()
    }

    fn upload(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.params, 0, &self.uniform_bytes());
    }
}

impl PipelineStage for MergeStage {
    type Settings = MergeSettings;
    type Inputs<'a> = MergeInputs<'a>;

    const NAME: &'static str = "merge";

    fn init(gpu: &GpuContext, settings: MergeSettings) -> Result<Self, PipelineError> {
        let num_scales = settings.num_scales;
        debug_assert!(num_scales >= 1, "merge needs at least one blur scale");
        let pass = FullscreenPass::from_source(
            gpu,
            "Merge",
            &shaders::merge_shader_source(num_scales),
            num_scales + 1,
            true,
            settings.format.to_wgpu(),
            None,
        )?;
        let params = gpu.uniform_buffer("Merge Params", 16 * (num_scales as u64 + 1));
        let output = create_render_target(gpu, "Merge Target", settings.size, settings.format);
        let stage = Self {
            pass,
            params,
            output,
            num_scales,
            weights: vec![1.0; num_scales as usize],
            bloom_intensity: settings.bloom_intensity,
        };
        stage.upload(&gpu.queue);
        Ok(stage)
    }

    fn update(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        inputs: MergeInputs<'_>,
    ) -> Result<(), PipelineError> {
        debug_assert_eq!(inputs.scales.len() as u32, self.num_scales);

        let mut reads: Vec<ResourceId> = vec![inputs.original.id()];
        reads.extend(inputs.scales.iter().map(|t| t.id()));
        check_distinct(Self::NAME, &reads, self.output.id())?;

        let mut views = vec![&inputs.original.view];
        views.extend(inputs.scales.iter().map(|t| &t.view));
        let bind_group = self.pass.bind_group(&gpu.device, &views, Some(&self.params));
        self.pass.draw(
            encoder,
            &self.output.view,
            &bind_group,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
        );
        Ok(())
    }
}
