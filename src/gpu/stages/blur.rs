//! Multi-scale separable gaussian blur.
//!
//! Scale `i` runs at `canvas / 2^i` (floored, at least one pixel). Each scale
//! downsamples the full-resolution thresholded image, blurs it horizontally
//! into an intermediate target and vertically into its output target. All
//! outputs are kept for the merge.

use bytemuck::{Pod, Zeroable};

use super::{FullscreenPass, PipelineStage, StageIo};
use crate::canvas::CanvasSize;
use crate::error::PipelineError;
use crate::gpu::resources::{create_render_target, RenderTarget, TargetFormat};
use crate::gpu::{shaders, GpuContext};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ScaleUniforms {
    dst_size: [f32; 2],
    direction: [f32; 2],
}

/// One of the three passes a scale performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurPass {
    Downscale,
    Horizontal,
    Vertical,
}

impl BlurPass {
    pub fn stage_name(self) -> &'static str {
        match self {
            BlurPass::Downscale => "blur downscale",
            BlurPass::Horizontal => "blur horizontal",
            BlurPass::Vertical => "blur vertical",
        }
    }
}

struct BlurScale {
    size: CanvasSize,
    downscaled: RenderTarget,
    intermediate: RenderTarget,
    output: RenderTarget,
    downscale_params: wgpu::Buffer,
    horizontal_params: wgpu::Buffer,
    vertical_params: wgpu::Buffer,
}

impl BlurScale {
    fn new(gpu: &GpuContext, index: usize, size: CanvasSize, format: TargetFormat) -> Self {
        let target =
            |kind: &str| create_render_target(gpu, &format!("Blur {index} {kind}"), size, format);
        let params = |kind: &str, direction: [f32; 2]| {
            let buffer = gpu.uniform_buffer(
                &format!("Blur {index} {kind} Params"),
                std::mem::size_of::<ScaleUniforms>() as u64,
            );
            let uniforms = ScaleUniforms {
                dst_size: size.as_vec2(),
                direction,
            };
            gpu.queue.write_buffer(&buffer, 0, bytemuck::bytes_of(&uniforms));
            buffer
        };

        Self {
            size,
            downscaled: target("Downscaled"),
            intermediate: target("Intermediate"),
            output: target("Output"),
            downscale_params: params("Downscale", [0.0, 0.0]),
            horizontal_params: params("Horizontal", [1.0, 0.0]),
            vertical_params: params("Vertical", [0.0, 1.0]),
        }
    }
}

pub struct BlurSettings {
    pub canvas: CanvasSize,
    pub format: TargetFormat,
    pub num_scales: u32,
}

pub struct BlurStage {
    downscale: FullscreenPass,
    blur: FullscreenPass,
    scales: Vec<BlurScale>,
    format: TargetFormat,
}

impl BlurStage {
    pub fn num_scales(&self) -> u32 {
        self.scales.len() as u32
    }

    /// Blurred output of every scale, full resolution first.
    pub fn outputs(&self) -> impl Iterator<Item = &RenderTarget> {
        self.scales.iter().map(|s| &s.output)
    }

    pub fn scale_sizes(&self) -> Vec<CanvasSize> {
        self.scales.iter().map(|s| s.size).collect()
    }

    pub fn downscaled(&self, scale: u32) -> Option<&RenderTarget> {
        self.scales.get(scale as usize).map(|s| &s.downscaled)
    }

    pub fn intermediate(&self, scale: u32) -> Option<&RenderTarget> {
        self.scales.get(scale as usize).map(|s| &s.intermediate)
    }

    pub fn output(&self, scale: u32) -> Option<&RenderTarget> {
        self.scales.get(scale as usize).map(|s| &s.output)
    }

    /// Reallocate every scale for a new canvas size.
    pub fn resize(&mut self, gpu: &GpuContext, canvas: CanvasSize) {
        let count = self.num_scales();
        self.scales = build_scales(gpu, canvas, count, self.format);
    }

    /// Record a single pass of one scale. `source` is only read by
    /// [`BlurPass::Downscale`]; the blur passes read the scale's own targets.
    pub fn record(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        scale: u32,
        pass: BlurPass,
        source: &RenderTarget,
    ) -> Result<(), PipelineError> {
        let s = &self.scales[scale_index(pass.stage_name(), scale, self.num_scales())?];
        let (program, input, output, params) = match pass {
            BlurPass::Downscale => (&self.downscale, source, &s.downscaled, &s.downscale_params),
            BlurPass::Horizontal => {
                (&self.blur, &s.downscaled, &s.intermediate, &s.horizontal_params)
            }
            BlurPass::Vertical => (&self.blur, &s.intermediate, &s.output, &s.vertical_params),
        };

        StageIo::new(input, output).check(pass.stage_name())?;
        let bind_group = program.bind_group(&gpu.device, &[&input.view], Some(params));
        program.draw(
            encoder,
            &output.view,
            &bind_group,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
        );
        Ok(())
    }
}

/// Index of `scale` in a stage with `available` scales.
fn scale_index(stage: &'static str, scale: u32, available: u32) -> Result<usize, PipelineError> {
    if scale < available {
        Ok(scale as usize)
    } else {
        Err(PipelineError::MissingScale {
            stage,
            scale,
            available,
        })
    }
}

fn build_scales(
    gpu: &GpuContext,
    canvas: CanvasSize,
    count: u32,
    format: TargetFormat,
) -> Vec<BlurScale> {
    canvas
        .blur_scales(count)
        .into_iter()
        .enumerate()
        .map(|(i, size)| BlurScale::new(gpu, i, size, format))
        .collect()
}

impl PipelineStage for BlurStage {
    type Settings = BlurSettings;
    type Inputs<'a> = &'a RenderTarget;

    const NAME: &'static str = "blur";

    fn init(gpu: &GpuContext, settings: BlurSettings) -> Result<Self, PipelineError> {
        let wgpu_format = settings.format.to_wgpu();
        let downscale = FullscreenPass::new(
            gpu,
            "Blur Downscale",
            shaders::DOWNSCALE_FRAGMENT,
            1,
            true,
            wgpu_format,
            None,
        )?;
        let blur = FullscreenPass::new(
            gpu,
            "Blur",
            shaders::BLUR_FRAGMENT,
            1,
            true,
            wgpu_format,
            None,
        )?;
        log::debug!("blur with {} scales", settings.num_scales);

        Ok(Self {
            downscale,
            blur,
            scales: build_scales(gpu, settings.canvas, settings.num_scales, settings.format),
            format: settings.format,
        })
    }

    /// Run every scale's downscale, horizontal and vertical pass in order.
    fn update(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        source: &RenderTarget,
    ) -> Result<(), PipelineError> {
        for scale in 0..self.num_scales() {
            for pass in [BlurPass::Downscale, BlurPass::Horizontal, BlurPass::Vertical] {
                self.record(gpu, encoder, scale, pass, source)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_scales_resolve() {
        assert_eq!(scale_index("blur vertical", 0, 1).unwrap(), 0);
        assert_eq!(scale_index("blur vertical", 4, 5).unwrap(), 4);
    }

    #[test]
    fn missing_scale_is_an_error() {
        assert!(matches!(
            scale_index("blur downscale", 5, 5),
            Err(PipelineError::MissingScale {
                stage: "blur downscale",
                scale: 5,
                available: 5,
            })
        ));
    }

    #[test]
    fn pass_names_match_plan_stage_names() {
        use crate::schedule::Stage;
        assert_eq!(BlurPass::Downscale.stage_name(), Stage::Downscale(0).name());
        assert_eq!(BlurPass::Horizontal.stage_name(), Stage::BlurHorizontal(0).name());
        assert_eq!(BlurPass::Vertical.stage_name(), Stage::BlurVertical(0).name());
    }
}
