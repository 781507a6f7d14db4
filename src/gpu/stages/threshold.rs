//! Bright-pass filter feeding the blur.

use bytemuck::{Pod, Zeroable};

use super::{FullscreenPass, PipelineStage, StageIo};
use crate::canvas::CanvasSize;
use crate::error::PipelineError;
use crate::gpu::resources::{create_render_target, RenderTarget, TargetFormat};
use crate::gpu::{shaders, GpuContext};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ThresholdUniforms {
    threshold: f32,
    _pad: [f32; 3],
}

pub struct ThresholdSettings {
    pub size: CanvasSize,
    pub format: TargetFormat,
    pub threshold: f32,
}

/// Zeroes every pixel whose brightest channel is below the threshold.
pub struct ThresholdStage {
    pass: FullscreenPass,
    params: wgpu::Buffer,
    output: RenderTarget,
    threshold: f32,
}

impl ThresholdStage {
    pub fn output(&self) -> &RenderTarget {
        &self.output
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, queue: &wgpu::Queue, threshold: f32) {
        self.threshold = threshold;
        let uniforms = ThresholdUniforms {
            threshold,
            _pad: [0.0; 3],
        };
        queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&uniforms));
    }

    pub fn resize(&mut self, gpu: &GpuContext, size: CanvasSize) {
        self.output = create_render_target(gpu, "Threshold Target", size, self.output.format);
    }
}

impl PipelineStage for ThresholdStage {
    type Settings = ThresholdSettings;
    type Inputs<'a> = &'a RenderTarget;

    const NAME: &'static str = "threshold";

    fn init(gpu: &GpuContext, settings: ThresholdSettings) -> Result<Self, PipelineError> {
        let pass = FullscreenPass::new(
            gpu,
            "Threshold",
            shaders::THRESHOLD_FRAGMENT,
            1,
            true,
            settings.format.to_wgpu(),
            None,
        )?;
        let params = gpu.uniform_buffer(
            "Threshold Params",
            std::mem::size_of::<ThresholdUniforms>() as u64,
        );
        let output = create_render_target(gpu, "Threshold Target", settings.size, settings.format);
        let mut stage = Self {
            pass,
            params,
            output,
            threshold: settings.threshold,
        };
        stage.set_threshold(&gpu.queue, settings.threshold);
        Ok(stage)
    }

    fn update(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        input: &RenderTarget,
    ) -> Result<(), PipelineError> {
        StageIo::new(input, &self.output).check(Self::NAME)?;
        let bind_group = self
            .pass
            .bind_group(&gpu.device, &[&input.view], Some(&self.params));
        self.pass.draw(
            encoder,
            &self.output.view,
            &bind_group,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
        );
        Ok(())
    }
}
